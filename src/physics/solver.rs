//! Shared math for sequential impulse solving, used by both contacts and joints.
//!
//! Offsets `r1` and `r2` are vectors from the centers of bodies `a` and `b`
//! to the point where an impulse is applied, in world orientation.

use super::Body;
use crate::math as m;

/// Coefficient for the fraction of positional error to correct in one step of length `dt`,
/// given the fraction of error left uncorrected after one second.
#[inline]
pub fn bias_coef(error_bias: f64, dt: f64) -> f64 {
    1.0 - error_bias.powf(dt)
}

/// Velocity of the point on `b` relative to the point on `a`.
#[inline]
pub(crate) fn relative_velocity(a: &Body, b: &Body, r1: m::Vec2, r2: m::Vec2) -> m::Vec2 {
    b.velocity.point_velocity(r2) - a.velocity.point_velocity(r1)
}

#[inline]
pub(crate) fn normal_relative_velocity(
    a: &Body,
    b: &Body,
    r1: m::Vec2,
    r2: m::Vec2,
    n: m::Vec2,
) -> f64 {
    relative_velocity(a, b, r1, r2).dot(n)
}

/// Relative velocity of the points in the bias velocities of the bodies.
#[inline]
pub(crate) fn relative_bias_velocity(a: &Body, b: &Body, r1: m::Vec2, r2: m::Vec2) -> m::Vec2 {
    b.bias_velocity.point_velocity(r2) - a.bias_velocity.point_velocity(r1)
}

/// Apply `j` to `b` and its opposite to `a`.
#[inline]
pub(crate) fn apply_impulses(a: &mut Body, b: &mut Body, r1: m::Vec2, r2: m::Vec2, j: m::Vec2) {
    a.apply_impulse(-j, r1);
    b.apply_impulse(j, r2);
}

/// Apply an angular impulse `j` to `b` and its opposite to `a`.
#[inline]
pub(crate) fn apply_angular_impulses(a: &mut Body, b: &mut Body, j: f64) {
    a.velocity.angular -= j * a.moment().inv();
    b.velocity.angular += j * b.moment().inv();
}

/// Effective moment of inertia of two bodies rotating against each other.
pub(crate) fn moment_sum(a: &Body, b: &Body) -> f64 {
    let inv_sum = a.moment().inv() + b.moment().inv();
    if inv_sum == 0.0 {
        log::warn!("Unsolvable rotary constraint between two bodies of infinite moment");
        return 0.0;
    }
    1.0 / inv_sum
}

/// Like [`apply_impulses`] but for bias velocities.
#[inline]
pub(crate) fn apply_bias_impulses(
    a: &mut Body,
    b: &mut Body,
    r1: m::Vec2,
    r2: m::Vec2,
    j: m::Vec2,
) {
    a.apply_bias_impulse(-j, r1);
    b.apply_bias_impulse(j, r2);
}

#[inline]
fn k_scalar_body(body: &Body, r: m::Vec2, n: m::Vec2) -> f64 {
    let rcn = m::cross(r, n);
    body.mass().inv() + body.moment().inv() * rcn * rcn
}

/// Inverse of the effective mass of the two bodies along the direction `n`.
pub(crate) fn k_scalar(a: &Body, b: &Body, r1: m::Vec2, r2: m::Vec2, n: m::Vec2) -> f64 {
    let value = k_scalar_body(a, r1, n) + k_scalar_body(b, r2, n);
    if value == 0.0 {
        log::warn!("Unsolvable collision or constraint between two bodies of infinite mass");
    }
    value
}

/// Inverse of the 2x2 effective mass matrix of a point constraint, stored as rows.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct KTensor {
    k1: m::Vec2,
    k2: m::Vec2,
}

impl KTensor {
    pub fn new(a: &Body, b: &Body, r1: m::Vec2, r2: m::Vec2) -> Self {
        let m_sum = a.mass().inv() + b.mass().inv();

        let mut k11 = m_sum;
        let mut k12 = 0.0;
        let mut k21 = 0.0;
        let mut k22 = m_sum;

        for (i_inv, r) in [(a.moment().inv(), r1), (b.moment().inv(), r2)] {
            let rxsq = r.x * r.x * i_inv;
            let rysq = r.y * r.y * i_inv;
            let rnxy = -r.x * r.y * i_inv;
            k11 += rysq;
            k12 += rnxy;
            k21 += rnxy;
            k22 += rxsq;
        }

        let det = k11 * k22 - k12 * k21;
        if det == 0.0 {
            log::warn!("Unsolvable constraint between two bodies of infinite mass");
            return Self::default();
        }
        let det_inv = 1.0 / det;
        Self {
            k1: m::Vec2::new(k22 * det_inv, -k12 * det_inv),
            k2: m::Vec2::new(-k21 * det_inv, k11 * det_inv),
        }
    }

    #[inline]
    pub fn mult(&self, v: m::Vec2) -> m::Vec2 {
        m::Vec2::new(v.dot(self.k1), v.dot(self.k2))
    }
}
