use super::{
    collision::Contact,
    handler::HandlerSlot,
    hash_set::HashValue,
    solver::{
        apply_bias_impulses, apply_impulses, k_scalar, normal_relative_velocity,
        relative_bias_velocity, relative_velocity,
    },
    Body, BodyKey, Shape, ShapeKey,
};
use crate::math as m;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum ArbiterState {
    /// The shapes started touching this step.
    FirstCollision,
    /// The shapes have been touching for more than one step.
    Normal,
    /// A `begin` callback rejected the collision.
    /// Stays this way until the shapes separate.
    Ignore,
    /// The shapes aren't touching, but the arbiter is kept around
    /// in case they start touching again soon.
    Cached,
}

/// Persistent record of a pair of shapes that are colliding.
///
/// Accessors return things in the order of the collision handler's collision types,
/// so the first shape is the one with the handler's first collision type
/// and normals point from the first shape to the second.
#[derive(Clone, Debug)]
pub struct Arbiter {
    /// Coefficient of restitution, combined from the shapes' materials.
    pub elasticity: f64,
    /// Coefficient of friction, combined from the shapes' materials.
    pub friction: f64,
    /// Relative surface velocity of the shapes.
    pub surface_velocity: m::Vec2,

    // shapes in the order the narrow phase wants them
    pub(crate) shape_a: ShapeKey,
    pub(crate) shape_b: ShapeKey,
    pub(crate) body_a: BodyKey,
    pub(crate) body_b: BodyKey,
    pub(crate) contacts: Vec<Contact>,
    pub(crate) handler: HandlerSlot,
    /// Shapes are in the opposite order of the handler's collision types.
    pub(crate) swapped: bool,
    /// Time stamp of the last step the shapes were found touching.
    pub(crate) stamp: u64,
    pub(crate) state: ArbiterState,
    /// Hash of the shape pair, the arbiter's key in the space's arbiter cache.
    pub(crate) hash: HashValue,
}

impl Arbiter {
    pub(crate) fn new(
        shape_a: ShapeKey,
        a: &Shape,
        shape_b: ShapeKey,
        b: &Shape,
        hash: HashValue,
    ) -> Self {
        Self {
            elasticity: 0.0,
            friction: 0.0,
            surface_velocity: m::Vec2::zero(),
            shape_a,
            shape_b,
            body_a: a.body(),
            body_b: b.body(),
            contacts: Vec::new(),
            handler: HandlerSlot::Default,
            swapped: false,
            stamp: 0,
            state: ArbiterState::FirstCollision,
            hash,
        }
    }

    /// Replace the contacts with new ones from the narrow phase,
    /// carrying accumulated impulses over from old contacts of the same feature.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn update(
        &mut self,
        mut contacts: Vec<Contact>,
        handler: HandlerSlot,
        swapped: bool,
        shape_a: ShapeKey,
        a: &Shape,
        shape_b: ShapeKey,
        b: &Shape,
    ) -> Vec<Contact> {
        for old in &self.contacts {
            for new in contacts.iter_mut().filter(|c| c.hash == old.hash) {
                new.jn_acc = old.jn_acc;
                new.jt_acc = old.jt_acc;
            }
        }
        std::mem::swap(&mut self.contacts, &mut contacts);

        self.handler = handler;
        self.swapped = swapped;
        self.elasticity = a.material.elasticity * b.material.elasticity;
        self.friction = a.material.friction * b.material.friction;
        self.surface_velocity = a.material.surface_velocity - b.material.surface_velocity;

        // same kind shapes can come in either order
        self.shape_a = shape_a;
        self.shape_b = shape_b;
        self.body_a = a.body();
        self.body_b = b.body();

        if self.state == ArbiterState::Cached {
            self.state = ArbiterState::FirstCollision;
        }

        // hand back the old buffer for reuse
        contacts.clear();
        contacts
    }

    //
    // solving
    //

    pub(crate) fn pre_step(&mut self, a: &Body, b: &Body, dt: f64, slop: f64, bias_coef: f64) {
        for con in &mut self.contacts {
            con.r1 = con.point - a.position();
            con.r2 = con.point - b.position();

            con.n_mass = 1.0 / k_scalar(a, b, con.r1, con.r2, con.normal);
            con.t_mass = 1.0 / k_scalar(a, b, con.r1, con.r2, m::left_normal(con.normal));

            con.bias = -bias_coef * (con.dist + slop).min(0.0) / dt;
            con.j_bias = 0.0;

            con.bounce =
                normal_relative_velocity(a, b, con.r1, con.r2, con.normal) * self.elasticity;
        }
    }

    /// Apply the impulses from the previous step, scaled by `dt_coef`.
    pub(crate) fn apply_cached_impulse(&self, a: &mut Body, b: &mut Body, dt_coef: f64) {
        if self.is_first_contact() {
            return;
        }
        for con in &self.contacts {
            let j = m::rotate(con.normal, m::Vec2::new(con.jn_acc, con.jt_acc));
            apply_impulses(a, b, con.r1, con.r2, j * dt_coef);
        }
    }

    pub(crate) fn apply_impulse(&mut self, a: &mut Body, b: &mut Body) {
        let surface_vr = self.surface_velocity;
        let friction = self.friction;

        for con in &mut self.contacts {
            let n = con.normal;
            let (r1, r2) = (con.r1, con.r2);

            let vbn = relative_bias_velocity(a, b, r1, r2).dot(n);
            let vr = relative_velocity(a, b, r1, r2);
            let vrn = vr.dot(n);
            let vrt = (vr + surface_vr).dot(m::left_normal(n));

            // position correction, kept separate from the real velocity
            let jbn = (con.bias - vbn) * con.n_mass;
            let jbn_old = con.j_bias;
            con.j_bias = (jbn_old + jbn).max(0.0);

            // non-penetration
            let jn = -(con.bounce + vrn) * con.n_mass;
            let jn_old = con.jn_acc;
            con.jn_acc = (jn_old + jn).max(0.0);

            // friction within the Coulomb cone
            let jt_max = friction * con.jn_acc;
            let jt = -vrt * con.t_mass;
            let jt_old = con.jt_acc;
            con.jt_acc = (jt_old + jt).max(-jt_max).min(jt_max);

            apply_bias_impulses(a, b, r1, r2, n * (con.j_bias - jbn_old));
            apply_impulses(
                a,
                b,
                r1,
                r2,
                m::rotate(n, m::Vec2::new(con.jn_acc - jn_old, con.jt_acc - jt_old)),
            );
        }
    }

    //
    // accessors
    //

    /// Number of contact points. Zero if the shapes are no longer touching.
    #[inline]
    pub fn count(&self) -> usize {
        if self.state == ArbiterState::Cached {
            0
        } else {
            self.contacts.len()
        }
    }

    /// The raw contacts, with normals in narrow phase order.
    pub fn contacts(&self) -> &[Contact] {
        &self.contacts[..self.count()]
    }

    /// Collision normal of the `i`th contact, pointing from the first shape to the second.
    pub fn normal(&self, i: usize) -> m::Vec2 {
        let n = self.contacts()[i].normal;
        if self.swapped {
            -n
        } else {
            n
        }
    }

    pub fn point(&self, i: usize) -> m::Vec2 {
        self.contacts()[i].point
    }

    /// Penetration depth of the `i`th contact, negative when overlapping.
    pub fn depth(&self, i: usize) -> f64 {
        self.contacts()[i].dist
    }

    pub fn shapes(&self) -> (ShapeKey, ShapeKey) {
        if self.swapped {
            (self.shape_b, self.shape_a)
        } else {
            (self.shape_a, self.shape_b)
        }
    }

    pub fn bodies(&self) -> (BodyKey, BodyKey) {
        if self.swapped {
            (self.body_b, self.body_a)
        } else {
            (self.body_a, self.body_b)
        }
    }

    /// Whether this is the first step the shapes are touching.
    #[inline]
    pub fn is_first_contact(&self) -> bool {
        self.state == ArbiterState::FirstCollision
    }

    /// Ignore the collision until the shapes separate.
    pub fn ignore(&mut self) {
        self.state = ArbiterState::Ignore;
    }

    /// Sum of the normal impulses applied to the second shape in the last step.
    pub fn total_impulse(&self) -> m::Vec2 {
        let sum: m::Vec2 = self
            .contacts()
            .iter()
            .map(|con| con.normal * con.jn_acc)
            .fold(m::Vec2::zero(), |acc, j| acc + j);
        if self.swapped {
            sum
        } else {
            -sum
        }
    }

    /// Sum of the impulses applied to the second shape in the last step, including friction.
    pub fn total_impulse_with_friction(&self) -> m::Vec2 {
        let sum = self
            .contacts()
            .iter()
            .map(|con| m::rotate(con.normal, m::Vec2::new(con.jn_acc, con.jt_acc)))
            .fold(m::Vec2::zero(), |acc, j| acc + j);
        if self.swapped {
            sum
        } else {
            -sum
        }
    }

    /// Energy lost in the collision in the last step, including friction.
    pub fn total_kinetic_energy(&self) -> f64 {
        let e_coef = (1.0 - self.elasticity) / (1.0 + self.elasticity);
        self.contacts()
            .iter()
            .map(|con| {
                e_coef * con.jn_acc * con.jn_acc / con.n_mass
                    + con.jt_acc * con.jt_acc / con.t_mass
            })
            .sum()
    }
}
