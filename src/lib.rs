//! A 2D rigid body physics engine with impulse-based contact solving,
//! a choice of broad phase spatial indices and sleeping of resting bodies.

/// Open a profiling zone that lasts until the returned value is dropped.
/// Does nothing unless the `tracy` feature is enabled.
macro_rules! tracy_span {
    ($name:expr, $fn_name:expr) => {{
        #[cfg(feature = "tracy")]
        let span = tracy_client::Client::running()
            .map(|client| client.span_alloc(Some($name), $fn_name, file!(), line!(), 0));
        #[cfg(not(feature = "tracy"))]
        let span = ();
        span
    }};
}

pub mod math;
pub use math::{uv, Angle, Unit, Vec2};

pub mod physics;
pub use physics::{
    collision::{self, BroadPhase, Contact, SpaceHashParams, AABB},
    constraint::{
        GrooveJoint, PinJoint, PivotJoint, RatchetJoint, RotaryLimitJoint, SimpleMotor, SlideJoint,
    },
    handler::{CollisionContext, CollisionHandler, ContactResponse},
    shape::{Material, Shape, ShapeKind},
    Arbiter, Body, BodyKey, Constraint, ConstraintKey, ShapeKey, Space, SpaceParams, Velocity,
};
