use super::{Joint, JointLimits};
use crate::{
    math as m,
    physics::{
        solver::{apply_impulses, relative_velocity, KTensor},
        Body,
    },
};

/// Lets an anchor point on body `b` slide along a groove segment on body `a`.
#[derive(Clone, Copy, Debug)]
pub struct GrooveJoint {
    groove_a: m::Vec2,
    groove_b: m::Vec2,
    groove_n: m::Vec2,
    /// Anchor point in the local coordinates of body `b`.
    pub anchor_b: m::Vec2,
    // groove normal in world orientation
    tn: m::Vec2,
    // which end of the groove the anchor is past, if any
    clamp: f64,
    r1: m::Vec2,
    r2: m::Vec2,
    k: KTensor,
    j_acc: m::Vec2,
    j_max_len: f64,
    bias: m::Vec2,
}

impl GrooveJoint {
    /// Create a groove joint from the endpoints of the groove in body `a`'s local coordinates
    /// and the anchor point in body `b`'s local coordinates.
    pub fn new(groove_a: m::Vec2, groove_b: m::Vec2, anchor_b: m::Vec2) -> Self {
        Self {
            groove_a,
            groove_b,
            groove_n: m::left_normal(m::normalize_safe(groove_b - groove_a)),
            anchor_b,
            tn: m::Vec2::zero(),
            clamp: 0.0,
            r1: m::Vec2::zero(),
            r2: m::Vec2::zero(),
            k: KTensor::default(),
            j_acc: m::Vec2::zero(),
            j_max_len: f64::INFINITY,
            bias: m::Vec2::zero(),
        }
    }

    #[inline]
    pub fn groove(&self) -> (m::Vec2, m::Vec2) {
        (self.groove_a, self.groove_b)
    }

    pub fn set_groove(&mut self, groove_a: m::Vec2, groove_b: m::Vec2) {
        *self = Self {
            groove_a,
            groove_b,
            groove_n: m::left_normal(m::normalize_safe(groove_b - groove_a)),
            ..*self
        };
    }

    /// Limit an impulse so that it only pushes the anchor along the groove,
    /// except at the ends where it can stop the anchor from going further.
    fn constrain(&self, j: m::Vec2) -> m::Vec2 {
        let n = self.tn;
        let j_clamp = if self.clamp * m::cross(j, n) > 0.0 {
            j
        } else {
            m::project(j, n)
        };
        m::clamp_mag(j_clamp, self.j_max_len)
    }
}

impl Joint for GrooveJoint {
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits) {
        let ta = a.local_to_world(self.groove_a);
        let tb = a.local_to_world(self.groove_b);
        let n = m::rotate(self.groove_n, *a.rotation());
        let d = ta.dot(n);

        self.tn = n;
        self.r2 = m::rotate(self.anchor_b, *b.rotation());

        // position of the anchor along the groove
        let td = m::cross(b.position() + self.r2, n);
        if td <= m::cross(ta, n) {
            self.clamp = 1.0;
            self.r1 = ta - a.position();
        } else if td >= m::cross(tb, n) {
            self.clamp = -1.0;
            self.r1 = tb - a.position();
        } else {
            self.clamp = 0.0;
            self.r1 = m::left_normal(n) * -td + n * d - a.position();
        }

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
        self.j_acc = self.constrain(j_old + j);
        apply_impulses(a, b, self.r1, self.r2, self.j_acc - j_old);
    }

    fn impulse(&self) -> f64 {
        self.j_acc.mag()
    }
}
