use super::{clamp_abs, Joint, JointLimits};
use crate::physics::{
    solver::{apply_angular_impulses, moment_sum},
    Body,
};

/// Lets body `b` turn relative to body `a` freely in one direction,
/// but only back to the last "click" in the other, like a socket wrench.
///
/// The direction is given by the sign of `ratchet`.
#[derive(Clone, Copy, Debug)]
pub struct RatchetJoint {
    /// Relative angle of the last click.
    pub angle: f64,
    /// Offset of the clicks from zero relative angle.
    pub phase: f64,
    /// Angular distance between clicks.
    pub ratchet: f64,
    i_sum: f64,
    bias: f64,
    j_acc: f64,
    j_max: f64,
}

impl RatchetJoint {
    /// Create a ratchet with its first click at the current relative angle of the bodies.
    pub fn new(a: &Body, b: &Body, phase: f64, ratchet: f64) -> Self {
        Self {
            angle: b.angle() - a.angle(),
            phase,
            ratchet,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: f64::INFINITY,
        }
    }
}

impl Joint for RatchetJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        let delta = b.angle() - a.angle();
        let diff = self.angle - delta;

        let pdist = if diff * self.ratchet > 0.0 {
            diff
        } else {
            self.angle = ((delta - self.phase) / self.ratchet).floor() * self.ratchet + self.phase;
            0.0
        };

        self.i_sum = moment_sum(a, b);
        self.bias = clamp_abs(-limits.bias_coef * pdist / dt, limits.max_bias);
        self.j_max = limits.max_impulse;

        if self.bias == 0.0 {
            self.j_acc = 0.0;
        }
    }

    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        apply_angular_impulses(a, b, self.j_acc * dt_coef);
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if self.bias == 0.0 {
            return;
        }

        let wr = b.velocity.angular - a.velocity.angular;
        let j = -(self.bias + wr) * self.i_sum;
        let j_old = self.j_acc;
        let r = self.ratchet;
        self.j_acc = ((j_old + j) * r).max(0.0).min(self.j_max * r.abs()) / r;
        apply_angular_impulses(a, b, self.j_acc - j_old);
    }

    fn impulse(&self) -> f64 {
        self.j_acc.abs()
    }
}
