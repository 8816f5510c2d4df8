use super::{
    component_graph::ComponentNode, ArbiterKey, ConstraintKey, ShapeKey, Velocity,
};
use crate::math::{self as m, Angle, Unit};

/// A rigid body: something with a position, an orientation and a velocity.
/// Attach [`Shape`][super::Shape]s to a body to make it collide with other things.
///
/// Bodies start out "rogue", not simulated by anything. Adding one to a
/// [`Space`][super::Space] makes the space integrate its motion every step.
#[derive(Clone, Debug)]
pub struct Body {
    mass: Mass,
    moment: Mass,
    position: m::Vec2,
    angle: f64,
    rot: Unit<m::Vec2>,
    pub velocity: Velocity,
    /// Velocity used to correct overlap between shapes, reset every step.
    pub(crate) bias_velocity: Velocity,
    /// Force applied at the center of mass during the next step.
    pub force: m::Vec2,
    pub torque: f64,
    /// Maximum speed of the body. Infinite by default.
    pub velocity_limit: f64,
    /// Maximum angular speed of the body in radians per second. Infinite by default.
    pub angular_velocity_limit: f64,
    pub(crate) node: ComponentNode,
    pub(crate) shapes: Vec<ShapeKey>,
    pub(crate) constraints: Vec<ConstraintKey>,
    /// Arbiters this body is involved in during the current step.
    pub(crate) arbiters: Vec<ArbiterKey>,
    pub(crate) in_space: bool,
}

impl Body {
    /// Create a body with the given mass and moment of inertia.
    /// Use the `moment_for_*` functions in [`shape`][super::shape] to compute moments.
    pub fn new(mass: f64, moment: f64) -> Self {
        Self {
            mass: Mass::from(mass),
            moment: Mass::from(moment),
            position: m::Vec2::zero(),
            angle: 0.0,
            rot: Unit::unit_x(),
            velocity: Velocity::default(),
            bias_velocity: Velocity::default(),
            force: m::Vec2::zero(),
            torque: 0.0,
            velocity_limit: f64::INFINITY,
            angular_velocity_limit: f64::INFINITY,
            node: ComponentNode::default(),
            shapes: Vec::new(),
            constraints: Vec::new(),
            arbiters: Vec::new(),
            in_space: false,
        }
    }

    /// A body that never moves and never sleeps.
    /// Shapes attached to it go in the static layer of the spatial index.
    pub fn new_static() -> Self {
        let mut body = Self::new_kinematic();
        body.node.idle_time = f64::INFINITY;
        body
    }

    /// Kinematic bodies have infinite mass and aren't affected by collisions,
    /// gravity or forces, but move according to their velocity.
    pub fn new_kinematic() -> Self {
        Self::new(f64::INFINITY, f64::INFINITY)
    }

    /// Set the position of the body in a builder-like chain.
    pub fn with_position(mut self, position: m::Vec2) -> Self {
        self.position = position;
        self
    }

    /// Set the angle of the body in a builder-like chain.
    pub fn with_angle(mut self, angle: Angle) -> Self {
        self.set_angle(angle);
        self
    }

    /// Set the velocity of the body in a builder-like chain.
    pub fn with_velocity(mut self, vel: Velocity) -> Self {
        self.velocity = vel;
        self
    }

    #[inline]
    pub fn mass(&self) -> Mass {
        self.mass
    }

    pub fn set_mass(&mut self, mass: f64) {
        assert!(mass > 0.0, "Mass must be positive, got {mass}");
        self.mass = Mass::from(mass);
    }

    #[inline]
    pub fn moment(&self) -> Mass {
        self.moment
    }

    pub fn set_moment(&mut self, moment: f64) {
        assert!(moment > 0.0, "Moment of inertia must be positive, got {moment}");
        self.moment = Mass::from(moment);
    }

    #[inline]
    pub fn position(&self) -> m::Vec2 {
        self.position
    }

    /// Teleport the body. Shapes attached to a static body
    /// must be reindexed after moving it.
    pub fn set_position(&mut self, position: m::Vec2) {
        self.position = position;
    }

    /// Angle of the body in radians.
    #[inline]
    pub fn angle(&self) -> f64 {
        self.angle
    }

    pub fn set_angle(&mut self, angle: Angle) {
        self.set_angle_rad(angle.rad());
    }

    #[inline]
    fn set_angle_rad(&mut self, rad: f64) {
        self.angle = rad;
        self.rot = Unit::new_unchecked(m::for_angle(rad));
    }

    /// The unit vector pointing in the direction of the body's angle.
    #[inline]
    pub fn rotation(&self) -> Unit<m::Vec2> {
        self.rot
    }

    /// Shapes attached to this body in a space.
    pub fn shapes(&self) -> &[ShapeKey] {
        &self.shapes
    }

    /// Constraints attached to this body in a space.
    pub fn constraints(&self) -> &[ConstraintKey] {
        &self.constraints
    }

    /// How long the body has been moving slower than the space's idle speed threshold.
    #[inline]
    pub fn idle_time(&self) -> f64 {
        self.node.idle_time
    }

    //
    // coordinates
    //

    #[inline]
    pub fn local_to_world(&self, point: m::Vec2) -> m::Vec2 {
        self.position + m::rotate(point, *self.rot)
    }

    #[inline]
    pub fn world_to_local(&self, point: m::Vec2) -> m::Vec2 {
        m::unrotate(point - self.position, *self.rot)
    }

    /// Velocity of a point given in world coordinates, as if it was attached to the body.
    #[inline]
    pub fn velocity_at_world_point(&self, point: m::Vec2) -> m::Vec2 {
        self.velocity.point_velocity(point - self.position)
    }

    /// Velocity of a point given in the body's local coordinates.
    #[inline]
    pub fn velocity_at_local_point(&self, point: m::Vec2) -> m::Vec2 {
        self.velocity.point_velocity(m::rotate(point, *self.rot))
    }

    //
    // forces
    //

    /// Add a force applied at an offset from the center of mass
    /// (in world orientation, relative to the body's position).
    /// Forces accumulate until [`reset_forces`][Self::reset_forces] is called.
    pub fn apply_force(&mut self, force: m::Vec2, offset: m::Vec2) {
        self.force += force;
        self.torque += m::cross(offset, force);
    }

    /// Immediately change the velocity of the body
    /// as if it was hit at an offset from the center of mass.
    pub fn apply_impulse(&mut self, impulse: m::Vec2, offset: m::Vec2) {
        self.velocity.linear += impulse * self.mass.inv();
        self.velocity.angular += self.moment.inv() * m::cross(offset, impulse);
    }

    #[inline]
    pub(crate) fn apply_bias_impulse(&mut self, impulse: m::Vec2, offset: m::Vec2) {
        self.bias_velocity.linear += impulse * self.mass.inv();
        self.bias_velocity.angular += self.moment.inv() * m::cross(offset, impulse);
    }

    pub fn reset_forces(&mut self) {
        self.force = m::Vec2::zero();
        self.torque = 0.0;
    }

    /// Kinetic energy of the body.
    /// Doesn't produce NaNs for motionless bodies with infinite mass.
    pub fn kinetic_energy(&self) -> f64 {
        let vsq = self.velocity.linear.mag_sq();
        let wsq = self.velocity.angular * self.velocity.angular;
        let linear = if vsq != 0.0 {
            vsq * self.mass.value()
        } else {
            0.0
        };
        let angular = if wsq != 0.0 {
            wsq * self.moment.value()
        } else {
            0.0
        };
        linear + angular
    }

    //
    // status
    //

    /// Static bodies never move or fall asleep.
    #[inline]
    pub fn is_static(&self) -> bool {
        self.node.idle_time == f64::INFINITY
    }

    /// Rogue bodies aren't simulated by a space.
    /// Static bodies are always rogue.
    #[inline]
    pub fn is_rogue(&self) -> bool {
        !self.in_space
    }

    #[inline]
    pub fn is_sleeping(&self) -> bool {
        self.node.root.is_some()
    }

    //
    // integration
    //

    pub(crate) fn update_velocity(&mut self, gravity: m::Vec2, damping: f64, dt: f64) {
        // kinematic bodies aren't affected by forces at all
        if self.mass.inv() != 0.0 {
            let accel = gravity + self.force * self.mass.inv();
            self.velocity.linear = m::clamp_mag(
                self.velocity.linear * damping + accel * dt,
                self.velocity_limit,
            );
        }
        if self.moment.inv() != 0.0 {
            let w_limit = self.angular_velocity_limit;
            self.velocity.angular = (self.velocity.angular * damping
                + self.torque * self.moment.inv() * dt)
                .max(-w_limit)
                .min(w_limit);
        }
    }

    pub(crate) fn update_position(&mut self, dt: f64) {
        self.position += (self.velocity.linear + self.bias_velocity.linear) * dt;
        self.set_angle_rad(
            self.angle + (self.velocity.angular + self.bias_velocity.angular) * dt,
        );
        self.bias_velocity = Velocity::default();
    }
}

/// Mass or moment of inertia of a body, which can be infinite.
///
/// This stores both a mass value and its inverse, because calculating inverse mass
/// is expensive and needed a lot in physics calculations.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Mass {
    Finite { mass: f64, inverse: f64 },
    Infinite,
}

impl From<f64> for Mass {
    #[inline]
    fn from(mass: f64) -> Self {
        if mass == f64::INFINITY {
            Mass::Infinite
        } else {
            Mass::Finite {
                mass,
                inverse: 1.0 / mass,
            }
        }
    }
}

impl Mass {
    /// Get the mass as a number, infinity if the mass is infinite.
    #[inline]
    pub fn value(&self) -> f64 {
        match self {
            Mass::Finite { mass, .. } => *mass,
            Mass::Infinite => f64::INFINITY,
        }
    }

    /// Get the inverse of the mass, which is zero if the mass is infinite.
    #[inline]
    pub fn inv(&self) -> f64 {
        match self {
            Mass::Finite { inverse, .. } => *inverse,
            Mass::Infinite => 0.0,
        }
    }
}
