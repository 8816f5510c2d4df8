use super::{clamp_abs, Joint, JointLimits};
use crate::{
    math as m,
    physics::{
        solver::{apply_impulses, k_scalar, normal_relative_velocity},
        Body,
    },
};

/// Keeps the anchor points of two bodies at a fixed distance, like a rigid rod.
#[derive(Clone, Copy, Debug)]
pub struct PinJoint {
    /// Anchor point in the local coordinates of body `a`.
    pub anchor_a: m::Vec2,
    /// Anchor point in the local coordinates of body `b`.
    pub anchor_b: m::Vec2,
    /// The distance to keep between the anchors.
    pub dist: f64,
    r1: m::Vec2,
    r2: m::Vec2,
    n: m::Vec2,
    n_mass: f64,
    jn_acc: f64,
    jn_max: f64,
    bias: f64,
}

impl PinJoint {
    /// Create a pin joint that keeps the anchors at their current distance.
    pub fn new(a: &Body, b: &Body, anchor_a: m::Vec2, anchor_b: m::Vec2) -> Self {
        let dist = (b.local_to_world(anchor_b) - a.local_to_world(anchor_a)).mag();
        Self::with_distance(anchor_a, anchor_b, dist)
    }

    pub fn with_distance(anchor_a: m::Vec2, anchor_b: m::Vec2, dist: f64) -> Self {
        Self {
            anchor_a,
            anchor_b,
            dist,
            r1: m::Vec2::zero(),
            r2: m::Vec2::zero(),
            n: m::Vec2::zero(),
            n_mass: 0.0,
            jn_acc: 0.0,
            jn_max: f64::INFINITY,
            bias: 0.0,
        }
    }
}

impl Joint for PinJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        self.r1 = m::rotate(self.anchor_a, *a.rotation());
        self.r2 = m::rotate(self.anchor_b, *b.rotation());

        let delta = (b.position() + self.r2) - (a.position() + self.r1);
        let dist = delta.mag();
        self.n = m::normalize_safe(delta);

        self.n_mass = 1.0 / k_scalar(a, b, self.r1, self.r2, self.n);
        self.bias = clamp_abs(
            -limits.bias_coef * (dist - self.dist) / dt,
            limits.max_bias,
        );
        self.jn_max = limits.max_impulse;
    }

    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc * dt_coef));
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        self.jn_acc = clamp_abs(jn_old + jn, self.jn_max);
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc - jn_old));
    }

    fn impulse(&self) -> f64 {
        self.jn_acc.abs()
    }
}
