//! Constraints between pairs of bodies, solved together with contacts.

use super::{solver::bias_coef, Body, BodyKey, PostStepQueue};

use std::any::Any;

mod groove_joint;
pub use groove_joint::GrooveJoint;
mod pin_joint;
pub use pin_joint::PinJoint;
mod pivot_joint;
pub use pivot_joint::PivotJoint;
mod ratchet_joint;
pub use ratchet_joint::RatchetJoint;
mod rotary_limit_joint;
pub use rotary_limit_joint::RotaryLimitJoint;
mod simple_motor;
pub use simple_motor::SimpleMotor;
mod slide_joint;
pub use slide_joint::SlideJoint;

/// Limits computed from a [`Constraint`]'s parameters for one step.
#[derive(Clone, Copy, Debug)]
pub struct JointLimits {
    /// Fraction of positional error to correct this step.
    pub bias_coef: f64,
    /// Maximum speed at which positional error is corrected.
    pub max_bias: f64,
    /// Maximum impulse the joint can apply this step.
    pub max_impulse: f64,
}

/// Conversion to `Any` for downcasting joints, implemented for every `'static` type.
pub trait AsAny {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// The math of a specific kind of constraint.
///
/// Every step the solver calls `pre_step` once, then `apply_cached_impulse` once,
/// then `apply_impulse` once per solver iteration.
/// Offsets and directions are in world orientation, body `a` first.
pub trait Joint: AsAny + std::fmt::Debug {
    /// Compute effective masses and the bias velocity for this step.
    fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, limits: JointLimits);
    /// Apply the impulse accumulated last step, scaled by `dt_coef`
    /// to account for a changed time step.
    fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64);
    fn apply_impulse(&mut self, a: &mut Body, b: &mut Body);
    /// Magnitude of the impulse applied in the last step.
    fn impulse(&self) -> f64;
}

pub type ConstraintCallback = Box<dyn FnMut(&mut Constraint, &mut PostStepQueue)>;

/// A joint between two bodies together with parameters common to all joints.
pub struct Constraint {
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    /// Maximum force the constraint can use to act on the bodies. Infinite by default.
    pub max_force: f64,
    /// Fraction of positional error left uncorrected after one second.
    pub error_bias: f64,
    /// Maximum speed at which positional error is corrected. Infinite by default.
    pub max_bias: f64,
    /// Called before solving every step the constraint is active.
    pub pre_solve: Option<ConstraintCallback>,
    /// Called after solving every step the constraint is active.
    pub post_solve: Option<ConstraintCallback>,
    joint: Box<dyn Joint>,
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint")
            .field("body_a", &self.body_a)
            .field("body_b", &self.body_b)
            .field("max_force", &self.max_force)
            .field("error_bias", &self.error_bias)
            .field("max_bias", &self.max_bias)
            .field("joint", &self.joint)
            .finish()
    }
}

impl Constraint {
    pub fn new(body_a: BodyKey, body_b: BodyKey, joint: impl Joint + 'static) -> Self {
        assert!(body_a != body_b, "Can't constrain a body to itself");
        Self {
            body_a,
            body_b,
            max_force: f64::INFINITY,
            error_bias: (1.0f64 - 0.1).powf(60.0),
            max_bias: f64::INFINITY,
            pre_solve: None,
            post_solve: None,
            joint: Box::new(joint),
        }
    }

    //
    // builder methods
    //

    pub fn with_max_force(mut self, max_force: f64) -> Self {
        self.max_force = max_force;
        self
    }

    pub fn with_error_bias(mut self, error_bias: f64) -> Self {
        self.error_bias = error_bias;
        self
    }

    pub fn with_max_bias(mut self, max_bias: f64) -> Self {
        self.max_bias = max_bias;
        self
    }

    pub fn with_pre_solve(
        mut self,
        f: impl FnMut(&mut Constraint, &mut PostStepQueue) + 'static,
    ) -> Self {
        self.pre_solve = Some(Box::new(f));
        self
    }

    pub fn with_post_solve(
        mut self,
        f: impl FnMut(&mut Constraint, &mut PostStepQueue) + 'static,
    ) -> Self {
        self.post_solve = Some(Box::new(f));
        self
    }

    //
    // accessors
    //

    #[inline]
    pub fn bodies(&self) -> (BodyKey, BodyKey) {
        (self.body_a, self.body_b)
    }

    /// Get the joint if it's of type `T`.
    pub fn joint<T: Joint + 'static>(&self) -> Option<&T> {
        (*self.joint).as_any().downcast_ref()
    }

    pub fn joint_mut<T: Joint + 'static>(&mut self) -> Option<&mut T> {
        (*self.joint).as_any_mut().downcast_mut()
    }

    /// Magnitude of the impulse applied in the last step.
    pub fn impulse(&self) -> f64 {
        self.joint.impulse()
    }

    //
    // solving
    //

    pub(crate) fn call_pre_solve(&mut self, post_step: &mut PostStepQueue) {
        if let Some(mut f) = self.pre_solve.take() {
            f(self, post_step);
            // the callback may have installed a replacement
            if self.pre_solve.is_none() {
                self.pre_solve = Some(f);
            }
        }
    }

    pub(crate) fn call_post_solve(&mut self, post_step: &mut PostStepQueue) {
        if let Some(mut f) = self.post_solve.take() {
            f(self, post_step);
            if self.post_solve.is_none() {
                self.post_solve = Some(f);
            }
        }
    }

    pub(crate) fn pre_step(&mut self, a: &Body, b: &Body, dt: f64) {
        let limits = JointLimits {
            bias_coef: bias_coef(self.error_bias, dt),
            max_bias: self.max_bias,
            max_impulse: self.max_force * dt,
        };
        self.joint.pre_step(a, b, dt, limits);
    }

    #[inline]
    pub(crate) fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        self.joint.apply_cached_impulse(a, b, dt_coef);
    }

    #[inline]
    pub(crate) fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        self.joint.apply_impulse(a, b);
    }
}

/// Clamp `value` to `[-max, max]` without panicking on bad limits.
#[inline]
pub(crate) fn clamp_abs(value: f64, max: f64) -> f64 {
    value.max(-max).min(max)
}

#[cfg(test)]
pub(crate) mod test_util {
    use super::*;
    use crate::math as m;

    /// Step two bodies connected by a joint the way a space would.
    pub fn simulate(
        joint: &mut dyn Joint,
        a: &mut Body,
        b: &mut Body,
        gravity: m::Vec2,
        steps: usize,
    ) {
        let dt = 1.0 / 60.0;
        let limits = JointLimits {
            bias_coef: bias_coef((1.0f64 - 0.1).powf(60.0), dt),
            max_bias: f64::INFINITY,
            max_impulse: f64::INFINITY,
        };
        for step in 0..steps {
            joint.pre_step(a, b, dt, limits);
            a.update_velocity(gravity, 1.0, dt);
            b.update_velocity(gravity, 1.0, dt);
            joint.apply_cached_impulse(a, b, if step == 0 { 0.0 } else { 1.0 });
            for _ in 0..10 {
                joint.apply_impulse(a, b);
            }
            a.update_position(dt);
            b.update_position(dt);
        }
    }
}
