use super::{Joint, JointLimits};
use crate::{
    math as m,
    physics::{
        solver::{apply_impulses, relative_velocity, KTensor},
        Body,
    },
};

/// Holds a point on body `a` and a point on body `b` together,
/// letting the bodies rotate freely around it.
#[derive(Clone, Copy, Debug)]
pub struct PivotJoint {
    /// Anchor point in the local coordinates of body `a`.
    pub anchor_a: m::Vec2,
    /// Anchor point in the local coordinates of body `b`.
    pub anchor_b: m::Vec2,
    r1: m::Vec2,
    r2: m::Vec2,
    k: KTensor,
    j_acc: m::Vec2,
    j_max_len: f64,
    bias: m::Vec2,
}

impl PivotJoint {
    pub fn new(anchor_a: m::Vec2, anchor_b: m::Vec2) -> Self {
        Self {
            anchor_a,
            anchor_b,
            r1: m::Vec2::zero(),
            r2: m::Vec2::zero(),
            k: KTensor::default(),
            j_acc: m::Vec2::zero(),
            j_max_len: f64::INFINITY,
            bias: m::Vec2::zero(),
        }
    }

    /// Pin the bodies together at a point given in world coordinates,
    /// using their current positions.
    pub fn from_world_pivot(a: &Body, b: &Body, pivot: m::Vec2) -> Self {
        Self::new(a.world_to_local(pivot), b.world_to_local(pivot))
    }
}

impl Joint for PivotJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        self.r1 = m::rotate(self.anchor_a, *a.rotation());
        self.r2 = m::rotate(self.anchor_b, *b.rotation());
        self.k = KTensor::new(a, b, self.r1, self.r2);
        self.j_max_len = limits.max_impulse;

        let delta = (b.position() + self.r2) - (a.position() + self.r1);
        self.bias = m::clamp_mag(delta * (-limits.bias_coef / dt), limits.max_bias);
    }

    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        apply_impulses(a, b, self.r1, self.r2, self.j_acc * dt_coef);
    }

    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let vr = relative_velocity(a, b, self.r1, self.r2);
        let j = self.k.mult(self.bias - vr);
        let j_old = self.j_acc;
        self.j_acc = m::clamp_mag(self.j_acc + j, self.j_max_len);
        apply_impulses(a, b, self.r1, self.r2, self.j_acc - j_old);
    }

    fn impulse(&self) -> f64 {
        self.j_acc.mag()
    }
}
