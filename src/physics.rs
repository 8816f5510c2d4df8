use crate::math as m;

pub mod arbiter;
pub use arbiter::Arbiter;

pub mod body;
pub use body::{Body, Mass};

pub mod collision;
pub use collision::{Contact, AABB};

mod component_graph;
pub use component_graph::{ArbiterKey, BodyKey, ConstraintKey, ShapeKey};

pub mod constraint;
pub use constraint::{
    Constraint, GrooveJoint, Joint, JointLimits, PinJoint, PivotJoint, RatchetJoint,
    RotaryLimitJoint, SimpleMotor, SlideJoint,
};

pub mod handler;
pub use handler::{CollisionContext, CollisionHandler, ContactResponse};

pub mod hash_set;

pub mod post_step;
pub use post_step::{PostStepAction, PostStepQueue};

pub mod shape;
pub use shape::{Material, SegmentQueryInfo, Shape, ShapeError, ShapeKind};

mod solver;

mod space;
pub use space::{Space, SpaceParams};

/// Velocity of a body.
///
// Equivalent to a Vec3 but with names for the translational and rotational part.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Velocity {
    /// Linear velocity in units per second.
    pub linear: m::Vec2,
    /// Angular velocity in radians per second.
    pub angular: f64,
}

impl Velocity {
    /// Get the linear velocity of a point offset from the center of mass.
    #[inline]
    pub fn point_velocity(&self, offset: m::Vec2) -> m::Vec2 {
        let tangent = m::left_normal(offset) * self.angular;
        self.linear + tangent
    }
}

impl std::ops::Add for Velocity {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            linear: self.linear + other.linear,
            angular: self.angular + other.angular,
        }
    }
}
impl std::ops::AddAssign for Velocity {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}
impl std::ops::Mul<f64> for Velocity {
    type Output = Velocity;

    fn mul(self, rhs: f64) -> Self::Output {
        Velocity {
            linear: self.linear * rhs,
            angular: self.angular * rhs,
        }
    }
}
