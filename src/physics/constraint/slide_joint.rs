use super::{clamp_abs, Joint, JointLimits};
use crate::{
    math as m,
    physics::{
        solver::{apply_impulses, k_scalar, normal_relative_velocity},
        Body,
    },
};

/// Keeps the distance between the anchor points of two bodies
/// between a minimum and a maximum, like a rope that can't be compressed
/// past a certain point.
#[derive(Clone, Copy, Debug)]
pub struct SlideJoint {
    /// Anchor point in the local coordinates of body `a`.
    pub anchor_a: m::Vec2,
    /// Anchor point in the local coordinates of body `b`.
    pub anchor_b: m::Vec2,
    pub min: f64,
    pub max: f64,
    r1: m::Vec2,
    r2: m::Vec2,
    n: m::Vec2,
    n_mass: f64,
    jn_acc: f64,
    jn_max: f64,
    bias: f64,
}

impl SlideJoint {
    pub fn new(anchor_a: m::Vec2, anchor_b: m::Vec2, min: f64, max: f64) -> Self {
        Self {
            anchor_a,
            anchor_b,
            min,
            max,
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

impl Joint for SlideJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        self.r1 = m::rotate(self.anchor_a, *a.rotation());
        self.r2 = m::rotate(self.anchor_b, *b.rotation());

        let delta = (b.position() + self.r2) - (a.position() + self.r1);
        let dist = delta.mag();
        let mut pdist = 0.0;
        if dist > self.max {
            pdist = dist - self.max;
            self.n = m::normalize_safe(delta);
        } else if dist < self.min {
            pdist = self.min - dist;
            self.n = -m::normalize_safe(delta);
        } else {
            // within limits, nothing to do
            self.n = m::Vec2::zero();
            self.jn_acc = 0.0;
        }

        self.n_mass = 1.0 / k_scalar(a, b, self.r1, self.r2, self.n);
        self.bias = clamp_abs(-limits.bias_coef * pdist / dt, limits.max_bias);
        self.jn_max = limits.max_impulse;
    }

    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc * dt_coef));
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        if self.n == m::Vec2::zero() {
            return;
        }

        let vrn = normal_relative_velocity(a, b, self.r1, self.r2, self.n);
        let jn = (self.bias - vrn) * self.n_mass;
        let jn_old = self.jn_acc;
        // can only pull the anchors back within the limits, never push
        self.jn_acc = (jn_old + jn).max(-self.jn_max).min(0.0);
        apply_impulses(a, b, self.r1, self.r2, self.n * (self.jn_acc - jn_old));
    }

    fn impulse(&self) -> f64 {
        self.jn_acc.abs()
    }
}
