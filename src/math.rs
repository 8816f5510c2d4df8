//! Types, aliases and helper operations for doing math with `ultraviolet`.
use std::f64::consts::PI;
pub use ultraviolet as uv;

pub type Vec2 = uv::DVec2;

/// An angle in either degrees or radians.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum Angle {
    Rad(f64),
    Deg(f64),
}
impl Angle {
    /// Get the angle as degrees.
    #[inline]
    pub fn deg(&self) -> f64 {
        match self {
            Angle::Rad(rad) => rad * 180.0 / PI,
            Angle::Deg(deg) => *deg,
        }
    }

    /// Get the angle as radians.
    #[inline]
    pub fn rad(&self) -> f64 {
        match self {
            Angle::Rad(rad) => *rad,
            Angle::Deg(deg) => deg * PI / 180.0,
        }
    }

    /// Get the unit vector pointing in this direction,
    /// which doubles as a complex-number style rotation.
    #[inline]
    pub fn to_rotation(&self) -> Unit<Vec2> {
        Unit(for_angle(self.rad()))
    }
}
impl Default for Angle {
    fn default() -> Self {
        Angle::Rad(0.0)
    }
}

/// A wrapper type to indicate a vector should always be normalized.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Unit<T>(T);

impl Unit<Vec2> {
    pub fn new_normalize(v: Vec2) -> Self {
        Unit(v.normalized())
    }

    pub const fn new_unchecked(v: Vec2) -> Self {
        Unit(v)
    }

    pub fn unit_x() -> Self {
        Unit(Vec2::unit_x())
    }

    pub fn unit_y() -> Self {
        Unit(Vec2::unit_y())
    }

    #[inline]
    pub fn into_inner(self) -> Vec2 {
        self.0
    }
}

impl<T> std::ops::Deref for Unit<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<T> std::ops::Neg for Unit<T>
where
    T: std::ops::Neg,
{
    type Output = Unit<<T as std::ops::Neg>::Output>;

    fn neg(self) -> Self::Output {
        Unit(-self.0)
    }
}

// Vec2 utils

/// Rotate 90 degrees counterclockwise.
#[inline]
pub fn left_normal(v: Vec2) -> Vec2 {
    Vec2::new(-v.y, v.x)
}
/// Rotate 90 degrees clockwise.
#[inline]
pub fn right_normal(v: Vec2) -> Vec2 {
    Vec2::new(v.y, -v.x)
}
#[inline]
pub fn unit_left_normal(u: Unit<Vec2>) -> Unit<Vec2> {
    Unit::new_unchecked(left_normal(*u))
}
#[inline]
pub fn unit_right_normal(u: Unit<Vec2>) -> Unit<Vec2> {
    Unit::new_unchecked(right_normal(*u))
}

/// The z component of the 3D cross product of two vectors on the xy plane.
#[inline]
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

/// Unit vector pointing at the given angle in radians.
#[inline]
pub fn for_angle(rad: f64) -> Vec2 {
    Vec2::new(rad.cos(), rad.sin())
}

/// Rotate `v` by the rotation represented by the unit vector `rot`
/// (complex multiplication).
#[inline]
pub fn rotate(v: Vec2, rot: Vec2) -> Vec2 {
    Vec2::new(v.x * rot.x - v.y * rot.y, v.x * rot.y + v.y * rot.x)
}

/// Inverse of [`rotate`].
#[inline]
pub fn unrotate(v: Vec2, rot: Vec2) -> Vec2 {
    Vec2::new(v.x * rot.x + v.y * rot.y, v.y * rot.x - v.x * rot.y)
}

#[inline]
pub fn lerp(a: Vec2, b: Vec2, t: f64) -> Vec2 {
    a * (1.0 - t) + b * t
}

/// Scale `v` down to length `max` if it's longer than that.
#[inline]
pub fn clamp_mag(v: Vec2, max: f64) -> Vec2 {
    let mag_sq = v.mag_sq();
    if mag_sq > max * max {
        v * (max / mag_sq.sqrt())
    } else {
        v
    }
}

/// Normalize, returning the zero vector for zero-length input instead of NaNs.
#[inline]
pub fn normalize_safe(v: Vec2) -> Vec2 {
    let mag = v.mag();
    if mag == 0.0 {
        Vec2::zero()
    } else {
        v / mag
    }
}

/// Project `v` onto `onto`.
#[inline]
pub fn project(v: Vec2, onto: Vec2) -> Vec2 {
    onto * (v.dot(onto) / onto.mag_sq())
}

/// Clamp to the range [0, 1]. NaN becomes 1.
#[inline]
pub fn clamp01(t: f64) -> f64 {
    0.0f64.max(t.min(1.0))
}
