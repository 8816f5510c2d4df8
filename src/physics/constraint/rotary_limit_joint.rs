use super::{clamp_abs, Joint, JointLimits};
use crate::physics::{
    solver::{apply_angular_impulses, moment_sum},
    Body,
};

/// Keeps the angle of body `b` relative to body `a` between a minimum and a maximum.
/// The range can be more than a full turn.
#[derive(Clone, Copy, Debug)]
pub struct RotaryLimitJoint {
    /// Minimum relative angle in radians.
    pub min: f64,
    /// Maximum relative angle in radians.
    pub max: f64,
    i_sum: f64,
    bias: f64,
    j_acc: f64,
    j_max: f64,
}

impl RotaryLimitJoint {
    pub fn new(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            i_sum: 0.0,
            bias: 0.0,
            j_acc: 0.0,
            j_max: f64::INFINITY,
        }
    }
}

impl Joint for RotaryLimitJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        let dist = b.angle() - a.angle();
        let pdist = if dist > self.max {
            self.max - dist
        } else if dist < self.min {
            self.min - dist
        } else {
            0.0
        };

        self.i_sum = moment_sum(a, b);
        self.bias = clamp_abs(-limits.bias_coef * pdist / dt, limits.max_bias);
        self.j_max = limits.max_impulse;

        // not at a limit
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
        // only push back towards the range
        self.j_acc = if self.bias < 0.0 {
            (j_old + j).max(0.0).min(self.j_max)
        } else {
            (j_old + j).max(-self.j_max).min(0.0)
        };
        apply_angular_impulses(a, b, self.j_acc - j_old);
    }

    fn impulse(&self) -> f64 {
        self.j_acc.abs()
    }
}
