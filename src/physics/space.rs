//! The simulation world: owns everything and steps it forward in time.

use super::{
    arbiter::ArbiterState,
    collision::{
        narrowphase::{self, OrderedPair},
        BoundsSource, BroadPhase, Contact, IndexLayer, SpaceHashError, SpaceHashParams,
        SpatialIndex, AABB, BBTree,
    },
    handler::{CollisionContext, ContactResponse, HandlerRegistry, HandlerSlot},
    hash_set::{hash_pair, HashSet, HashValue},
    shape::{CollisionType, NO_GROUP},
    Arbiter, ArbiterKey, Body, BodyKey, CollisionHandler, Constraint, ConstraintKey, Mass,
    PostStepAction, PostStepQueue, Shape, ShapeKey,
};
use crate::math as m;

use thunderdome as td;

mod query;

/// Parameters for the simulation.
#[derive(Clone, Copy, Debug)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct SpaceParams {
    /// Number of solver iterations per step.
    /// More iterations give stiffer contacts and joints at the cost of performance.
    pub iterations: usize,
    pub gravity: m::Vec2,
    /// Fraction of velocity a body keeps after one second.
    /// 1 means no damping, 0.9 means bodies lose 10% of their velocity per second.
    pub damping: f64,
    /// Speed below which a body is considered idle.
    /// Zero means it's derived from gravity.
    pub idle_speed_threshold: f64,
    /// Time a group of bodies must be idle before it falls asleep.
    /// Infinity disables sleeping.
    pub sleep_time_threshold: f64,
    /// Amount of overlap between shapes that is allowed without correction.
    pub collision_slop: f64,
    /// Fraction of overlap left uncorrected after one second.
    pub collision_bias: f64,
    /// Number of steps an arbiter is kept around after its shapes stop touching.
    pub collision_persistence: u64,
    /// Track which arbiters each body is involved in even when sleeping is disabled,
    /// making [`Space::arbiters_of`] work.
    pub enable_contact_graph: bool,
}

impl Default for SpaceParams {
    fn default() -> Self {
        Self {
            iterations: 10,
            gravity: m::Vec2::zero(),
            damping: 1.0,
            idle_speed_threshold: 0.0,
            sleep_time_threshold: f64::INFINITY,
            collision_slop: 0.1,
            collision_bias: (1.0f64 - 0.1).powf(60.0),
            collision_persistence: 3,
            enable_contact_graph: false,
        }
    }
}

/// Entry in the arbiter cache, identifying an arbiter by its unordered pair of shapes.
#[derive(Clone, Copy, Debug)]
pub(crate) struct CachedArbiter {
    pub shapes: (ShapeKey, ShapeKey),
    pub key: ArbiterKey,
}

impl CachedArbiter {
    #[inline]
    pub fn matches(&self, a: ShapeKey, b: ShapeKey) -> bool {
        self.shapes == (a, b) || self.shapes == (b, a)
    }
}

/// Gives the spatial index access to shape bounding boxes and body velocities.
pub(crate) struct ShapeBounds<'a> {
    pub shapes: &'a td::Arena<Shape>,
    pub bodies: &'a td::Arena<Body>,
}

impl BoundsSource<ShapeKey> for ShapeBounds<'_> {
    fn bounds(&self, key: ShapeKey) -> AABB {
        self.shapes.get(key.0).map_or_else(AABB::default, |s| s.bb)
    }

    fn velocity(&self, key: ShapeKey) -> m::Vec2 {
        self.shapes
            .get(key.0)
            .and_then(|s| self.bodies.get(s.body.0))
            .map_or_else(m::Vec2::zero, |b| b.velocity.linear)
    }
}

/// Container for bodies, shapes and constraints, and the solver that simulates them.
///
/// Everything added to the space is referred to by a key returned from the `add_*` methods.
/// The space is locked during [`step`][Self::step], and structural changes
/// requested from callbacks are queued as [`PostStepAction`]s.
pub struct Space {
    pub params: SpaceParams,
    broad_phase: BroadPhase,

    pub(super) bodies: td::Arena<Body>,
    pub(super) shapes: td::Arena<Shape>,
    pub(super) constraints: td::Arena<Constraint>,
    pub(super) arbiters: td::Arena<Arbiter>,
    static_body: BodyKey,

    pub(super) active_bodies: Vec<BodyKey>,
    pub(super) sleeping_components: Vec<BodyKey>,
    /// Bodies woken up while the space was locked.
    pub(super) roused_bodies: Vec<BodyKey>,
    /// Arbiters that will be solved in the current step.
    pub(super) active_arbiters: Vec<ArbiterKey>,
    pub(super) active_constraints: Vec<ConstraintKey>,
    pub(super) cached_arbiters: HashSet<CachedArbiter>,
    pub(super) handlers: HandlerRegistry,
    pub(super) index: Box<dyn SpatialIndex<ShapeKey>>,
    pub(super) post_step: PostStepQueue,

    locked: u32,
    pub(super) stamp: u64,
    curr_dt: f64,
    prev_dt: f64,
    next_shape_id: HashValue,
    contact_buffer: Vec<Contact>,
}

impl Space {
    /// Create a space that uses a bounding box tree as its broad phase.
    pub fn new(params: SpaceParams) -> Self {
        Self::with_index(params, BroadPhase::Tree, Box::new(BBTree::new()))
    }

    pub fn with_broad_phase(
        params: SpaceParams,
        broad_phase: BroadPhase,
    ) -> Result<Self, SpaceHashError> {
        Ok(Self::with_index(params, broad_phase, broad_phase.build()?))
    }

    fn with_index(
        params: SpaceParams,
        broad_phase: BroadPhase,
        index: Box<dyn SpatialIndex<ShapeKey>>,
    ) -> Self {
        let mut bodies = td::Arena::new();
        let static_body = BodyKey(bodies.insert(Body::new_static()));
        Self {
            params,
            broad_phase,
            bodies,
            shapes: td::Arena::new(),
            constraints: td::Arena::new(),
            arbiters: td::Arena::new(),
            static_body,
            active_bodies: Vec::new(),
            sleeping_components: Vec::new(),
            roused_bodies: Vec::new(),
            active_arbiters: Vec::new(),
            active_constraints: Vec::new(),
            cached_arbiters: HashSet::default(),
            handlers: HandlerRegistry::default(),
            index,
            post_step: PostStepQueue::default(),
            locked: 0,
            stamp: 0,
            curr_dt: 0.0,
            prev_dt: 0.0,
            next_shape_id: 1,
            contact_buffer: Vec::new(),
        }
    }

    /// Switch the broad phase to a spatial hash, moving every shape over.
    pub fn use_spatial_hash(&mut self, params: SpaceHashParams) -> Result<(), SpaceHashError> {
        self.set_broad_phase(BroadPhase::SpatialHash(params))
    }

    pub fn set_broad_phase(&mut self, broad_phase: BroadPhase) -> Result<(), SpaceHashError> {
        self.assert_unlocked();
        let mut index = broad_phase.build()?;
        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        for layer in [IndexLayer::Active, IndexLayer::Static] {
            let mut keys = Vec::with_capacity(self.index.count(layer));
            self.index.each(layer, &mut |key| keys.push(key));
            for key in keys {
                let hash = self.shapes[key.0].hash_id;
                index.insert(layer, key, hash, &bounds);
            }
        }
        log::debug!(
            "Switched broad phase from {:?} to {broad_phase:?}",
            self.broad_phase
        );
        self.index = index;
        self.broad_phase = broad_phase;
        Ok(())
    }

    #[inline]
    pub fn broad_phase(&self) -> BroadPhase {
        self.broad_phase
    }

    //
    // locking
    //

    /// Whether the space is in the middle of a step,
    /// where structural changes must go through the post-step queue.
    #[inline]
    pub fn is_locked(&self) -> bool {
        self.locked > 0
    }

    fn assert_unlocked(&self) {
        assert!(
            !self.is_locked(),
            "Tried to modify the space while it was locked, use a post-step action instead"
        );
    }

    fn lock(&mut self) {
        self.locked += 1;
    }

    fn unlock(&mut self, run_post_step: bool) {
        assert!(self.locked > 0, "Unbalanced space unlock");
        self.locked -= 1;
        if self.locked > 0 || !run_post_step {
            return;
        }

        for key in std::mem::take(&mut self.roused_bodies) {
            if self.bodies.contains(key.0) {
                self.reactivate_body(key);
            }
        }
        while let Some(action) = self.post_step.pop() {
            self.apply_post_step(action);
        }
    }

    fn apply_post_step(&mut self, action: PostStepAction) {
        log::trace!("Applying post-step action {action:?}");
        match action {
            PostStepAction::RemoveShape(key) if self.contains_shape(key) => {
                self.remove_shape(key);
            }
            PostStepAction::RemoveBody(key)
                if key != self.static_body && self.bodies.contains(key.0) =>
            {
                self.remove_body(key);
            }
            PostStepAction::RemoveConstraint(key) if self.contains_constraint(key) => {
                self.remove_constraint(key);
            }
            PostStepAction::ActivateBody(key) => self.activate_body(key),
            PostStepAction::SleepBody(key)
                if self.bodies.get(key.0).map_or(false, |b| !b.is_rogue()) =>
            {
                self.sleep_body(key);
            }
            PostStepAction::ReindexShape(key) if self.contains_shape(key) => {
                self.reindex_shape(key);
            }
            _ => log::debug!("Skipped post-step action {action:?} on a removed object"),
        }
    }

    //
    // bodies
    //

    /// Add a body to be simulated by the space.
    ///
    /// Static bodies can't be simulated. Attach static shapes to
    /// [`static_body`][Self::static_body] or add them with [`add_rogue_body`][Self::add_rogue_body].
    pub fn add_body(&mut self, mut body: Body) -> BodyKey {
        self.assert_unlocked();
        assert!(
            !body.is_static(),
            "Static bodies can't be simulated, add them as rogue bodies instead"
        );
        body.in_space = true;
        body.node = Default::default();
        let key = BodyKey(self.bodies.insert(body));
        self.active_bodies.push(key);
        key
    }

    /// Store a body that the space doesn't simulate.
    /// Shapes and constraints can be attached to it, but moving it is up to the user.
    pub fn add_rogue_body(&mut self, mut body: Body) -> BodyKey {
        self.assert_unlocked();
        body.in_space = false;
        BodyKey(self.bodies.insert(body))
    }

    /// Remove a body along with all of its shapes and constraints.
    pub fn remove_body(&mut self, key: BodyKey) -> Body {
        self.assert_unlocked();
        assert!(
            key != self.static_body,
            "The space's static body can't be removed"
        );
        assert!(self.bodies.contains(key.0), "Body isn't in this space");

        self.activate_body(key);
        for shape in self.bodies[key.0].shapes.clone() {
            self.remove_shape(shape);
        }
        for constraint in self.bodies[key.0].constraints.clone() {
            self.remove_constraint(constraint);
        }
        self.filter_arbiters(key, None);
        self.active_bodies.retain(|&k| k != key);
        self.roused_bodies.retain(|&k| k != key);

        let Some(mut body) = self.bodies.remove(key.0) else {
            unreachable!("body was checked to exist")
        };
        body.in_space = false;
        body.node = Default::default();
        body.arbiters.clear();
        body
    }

    /// Whether the body is simulated by this space. False for rogue bodies.
    pub fn contains_body(&self, key: BodyKey) -> bool {
        self.bodies.get(key.0).map_or(false, |b| b.in_space)
    }

    #[inline]
    pub fn body(&self, key: BodyKey) -> Option<&Body> {
        self.bodies.get(key.0)
    }

    /// Get a mutable reference to a body, waking it up.
    pub fn body_mut(&mut self, key: BodyKey) -> Option<&mut Body> {
        self.activate_body(key);
        self.bodies.get_mut(key.0)
    }

    /// The space's built-in static body, for attaching level geometry.
    #[inline]
    pub fn static_body(&self) -> BodyKey {
        self.static_body
    }

    /// Iterate over the bodies simulated by the space, including sleeping ones.
    pub fn bodies(&self) -> impl Iterator<Item = (BodyKey, &Body)> {
        self.bodies
            .iter()
            .filter(|(_, b)| b.in_space)
            .map(|(idx, b)| (BodyKey(idx), b))
    }

    //
    // shapes
    //

    pub fn add_shape(&mut self, mut shape: Shape) -> ShapeKey {
        self.assert_unlocked();
        let body_key = shape.body;
        assert!(
            self.bodies.contains(body_key.0),
            "Shape's body isn't in this space"
        );
        self.activate_body(body_key);

        let body = &self.bodies[body_key.0];
        let is_static = body.is_static();
        shape.hash_id = self.next_shape_id;
        self.next_shape_id += 1;
        shape.update(body.position(), *body.rotation());

        let hash = shape.hash_id;
        let key = ShapeKey(self.shapes.insert(shape));
        self.bodies[body_key.0].shapes.push(key);

        let layer = if is_static {
            IndexLayer::Static
        } else {
            IndexLayer::Active
        };
        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        self.index.insert(layer, key, hash, &bounds);

        if is_static {
            self.activate_shapes_touching(key);
        }
        key
    }

    /// Remove a shape, calling `separate` for every collision it was involved in.
    pub fn remove_shape(&mut self, key: ShapeKey) -> Shape {
        self.assert_unlocked();
        assert!(self.contains_shape(key), "Shape isn't in this space");

        let shape = &self.shapes[key.0];
        let (body_key, hash) = (shape.body, shape.hash_id);
        let is_static = self
            .bodies
            .get(body_key.0)
            .map_or(false, |b| b.is_static());

        if is_static {
            // sleeping bodies keep their arbiters out of the cache, wake them first
            self.activate_static_body(body_key, Some(key));
            self.activate_shapes_touching(key);
            self.filter_arbiters(body_key, Some(key));
            self.index.remove(IndexLayer::Static, key, hash);
        } else {
            self.activate_body(body_key);
            self.filter_arbiters(body_key, Some(key));
            self.index.remove(IndexLayer::Active, key, hash);
        }

        if let Some(body) = self.bodies.get_mut(body_key.0) {
            body.shapes.retain(|&k| k != key);
        }
        let Some(mut shape) = self.shapes.remove(key.0) else {
            unreachable!("shape was checked to exist")
        };
        shape.hash_id = 0;
        shape
    }

    #[inline]
    pub fn contains_shape(&self, key: ShapeKey) -> bool {
        self.shapes.contains(key.0)
    }

    #[inline]
    pub fn shape(&self, key: ShapeKey) -> Option<&Shape> {
        self.shapes.get(key.0)
    }

    /// Get a mutable reference to a shape, waking up its body.
    /// Changes to the shape's geometry take effect after [`reindex_shape`][Self::reindex_shape].
    pub fn shape_mut(&mut self, key: ShapeKey) -> Option<&mut Shape> {
        let body = self.shapes.get(key.0)?.body;
        self.activate_body(body);
        self.shapes.get_mut(key.0)
    }

    pub fn shapes(&self) -> impl Iterator<Item = (ShapeKey, &Shape)> {
        self.shapes.iter().map(|(idx, s)| (ShapeKey(idx), s))
    }

    //
    // constraints
    //

    pub fn add_constraint(&mut self, constraint: Constraint) -> ConstraintKey {
        self.assert_unlocked();
        let (a, b) = constraint.bodies();
        assert!(
            self.bodies.contains(a.0) && self.bodies.contains(b.0),
            "Constraint's bodies aren't in this space"
        );
        let immovable = |key: BodyKey| {
            let body = &self.bodies[key.0];
            body.mass() == Mass::Infinite && body.moment() == Mass::Infinite
        };
        assert!(
            !(immovable(a) && immovable(b)),
            "Constraints need at least one body with finite mass or moment"
        );
        self.activate_body(a);
        self.activate_body(b);

        let key = ConstraintKey(self.constraints.insert(constraint));
        self.bodies[a.0].constraints.push(key);
        self.bodies[b.0].constraints.push(key);
        self.active_constraints.push(key);
        key
    }

    pub fn remove_constraint(&mut self, key: ConstraintKey) -> Constraint {
        self.assert_unlocked();
        assert!(
            self.contains_constraint(key),
            "Constraint isn't in this space"
        );

        let (a, b) = self.constraints[key.0].bodies();
        self.activate_body(a);
        self.activate_body(b);
        self.active_constraints.retain(|&k| k != key);
        for body_key in [a, b] {
            if let Some(body) = self.bodies.get_mut(body_key.0) {
                body.constraints.retain(|&k| k != key);
            }
        }
        let Some(constraint) = self.constraints.remove(key.0) else {
            unreachable!("constraint was checked to exist")
        };
        constraint
    }

    #[inline]
    pub fn contains_constraint(&self, key: ConstraintKey) -> bool {
        self.constraints.contains(key.0)
    }

    #[inline]
    pub fn constraint(&self, key: ConstraintKey) -> Option<&Constraint> {
        self.constraints.get(key.0)
    }

    /// Get a mutable reference to a constraint, waking up both of its bodies.
    pub fn constraint_mut(&mut self, key: ConstraintKey) -> Option<&mut Constraint> {
        let (a, b) = self.constraints.get(key.0)?.bodies();
        self.activate_body(a);
        self.activate_body(b);
        self.constraints.get_mut(key.0)
    }

    pub fn constraints(&self) -> impl Iterator<Item = (ConstraintKey, &Constraint)> {
        self.constraints
            .iter()
            .map(|(idx, c)| (ConstraintKey(idx), c))
    }

    //
    // collision handlers and arbiters
    //

    /// Set the handler for collisions between shapes of the given collision types,
    /// replacing any previous handler for the pair.
    pub fn add_collision_handler(
        &mut self,
        a: CollisionType,
        b: CollisionType,
        handler: CollisionHandler,
    ) {
        self.assert_unlocked();
        self.handlers.insert(a, b, handler);
    }

    /// Remove the handler for a pair of collision types.
    /// Their collisions go to the default handler afterwards.
    pub fn remove_collision_handler(
        &mut self,
        a: CollisionType,
        b: CollisionType,
    ) -> Option<CollisionHandler> {
        self.assert_unlocked();
        self.handlers.remove(a, b)
    }

    /// Set the handler for pairs that don't have a handler of their own.
    pub fn set_default_collision_handler(&mut self, handler: CollisionHandler) {
        self.assert_unlocked();
        self.handlers.set_default(handler);
    }

    /// Arbiters the body was involved in during the last step.
    ///
    /// Only tracked when sleeping or the contact graph is enabled.
    /// For sleeping bodies, these are the arbiters they had when they fell asleep.
    pub fn arbiters_of(&self, key: BodyKey) -> impl Iterator<Item = &Arbiter> {
        self.bodies.get(key.0).into_iter().flat_map(move |body| {
            body.arbiters
                .iter()
                .filter_map(move |arb_key| self.arbiters.get(arb_key.0))
        })
    }

    /// Remove the arbiters involving a body, or only those involving one of its shapes.
    /// `separate` is called for arbiters that are still touching when a shape is removed.
    fn filter_arbiters(&mut self, body: BodyKey, filter: Option<ShapeKey>) {
        let mut removed = Vec::new();
        self.cached_arbiters.retain(|entry| {
            let Some(arb) = self.arbiters.get_mut(entry.key.0) else {
                return false;
            };
            let involved = (body == arb.body_a && filter.map_or(true, |s| s == arb.shape_a))
                || (body == arb.body_b && filter.map_or(true, |s| s == arb.shape_b));
            if !involved {
                return true;
            }
            if filter.is_some() && arb.state != ArbiterState::Cached {
                self.handlers
                    .get_mut(arb.handler)
                    .separate(&mut CollisionContext {
                        arbiter: arb,
                        post_step: &mut self.post_step,
                    });
            }
            removed.push(entry.key);
            false
        });
        for key in removed {
            self.free_arbiter(key);
        }
    }

    fn free_arbiter(&mut self, key: ArbiterKey) {
        if let Some(arb) = self.arbiters.remove(key.0) {
            for body_key in [arb.body_a, arb.body_b] {
                if let Some(body) = self.bodies.get_mut(body_key.0) {
                    body.arbiters.retain(|&k| k != key);
                }
            }
        }
        self.active_arbiters.retain(|&k| k != key);
    }

    //
    // reindexing
    //

    /// Update the bounding boxes of all static shapes after moving static bodies.
    pub fn reindex_static(&mut self) {
        self.assert_unlocked();
        let shapes = &mut self.shapes;
        let bodies = &self.bodies;
        self.index.each(IndexLayer::Static, &mut |key| {
            if let Some(shape) = shapes.get_mut(key.0) {
                if let Some(body) = bodies.get(shape.body.0) {
                    shape.update(body.position(), *body.rotation());
                }
            }
        });
        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        self.index.reindex(IndexLayer::Static, &bounds);
    }

    /// Update the bounding box of a single shape, e.g. after moving a static body
    /// or changing the shape's geometry.
    pub fn reindex_shape(&mut self, key: ShapeKey) {
        self.assert_unlocked();
        let Some(shape) = self.shapes.get_mut(key.0) else {
            return;
        };
        if let Some(body) = self.bodies.get(shape.body.0) {
            shape.update(body.position(), *body.rotation());
        }
        let hash = shape.hash_id;
        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        self.index.reindex_object(key, hash, &bounds);
    }

    pub fn reindex_shapes_for_body(&mut self, key: BodyKey) {
        let Some(body) = self.bodies.get(key.0) else {
            return;
        };
        for shape in body.shapes.clone() {
            self.reindex_shape(shape);
        }
    }

    pub(super) fn update_body_shapes(&mut self, key: BodyKey) {
        let body = &self.bodies[key.0];
        for shape_key in &body.shapes {
            if let Some(shape) = self.shapes.get_mut(shape_key.0) {
                shape.update(body.position(), *body.rotation());
            }
        }
    }

    //
    // stepping
    //

    /// Number of steps taken so far.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// Length of the latest step.
    #[inline]
    pub fn current_time_step(&self) -> f64 {
        self.curr_dt
    }

    /// Advance the simulation by `dt` seconds. A step of zero does nothing.
    pub fn step(&mut self, dt: f64) {
        if dt == 0.0 {
            return;
        }
        let _span = tracy_span!("space step", "step");

        self.stamp += 1;
        self.prev_dt = self.curr_dt;
        self.curr_dt = dt;

        self.reset_arbiters();

        self.lock();
        self.integrate_positions(dt);
        self.collide_shapes();
        self.unlock(false);

        if self.sleep_enabled()
            || self.params.enable_contact_graph
            || !self.sleeping_components.is_empty()
        {
            self.process_components(dt);
        }

        self.lock();
        self.age_arbiters();
        self.pre_step(dt);
        self.integrate_velocities(dt);
        self.warm_start(dt);
        self.solve();
        self.post_solve();
        self.unlock(true);
    }

    /// Unthread last step's arbiters from their bodies before the contact graph is rebuilt.
    fn reset_arbiters(&mut self) {
        for key in std::mem::take(&mut self.active_arbiters) {
            let Some(arb) = self.arbiters.get_mut(key.0) else {
                continue;
            };
            arb.state = ArbiterState::Normal;
            let (a, b) = (arb.body_a, arb.body_b);
            let both_awake = [a, b]
                .iter()
                .all(|k| self.bodies.get(k.0).map_or(false, |b| !b.is_sleeping()));
            if both_awake {
                for body_key in [a, b] {
                    if let Some(body) = self.bodies.get_mut(body_key.0) {
                        body.arbiters.retain(|&k| k != key);
                    }
                }
            }
        }
    }

    fn integrate_positions(&mut self, dt: f64) {
        let _span = tracy_span!("integrate positions", "integrate_positions");

        for &key in &self.active_bodies {
            if let Some(body) = self.bodies.get_mut(key.0) {
                body.update_position(dt);
            }
        }

        let shapes = &mut self.shapes;
        let bodies = &self.bodies;
        self.index.each(IndexLayer::Active, &mut |key| {
            if let Some(shape) = shapes.get_mut(key.0) {
                if let Some(body) = bodies.get(shape.body.0) {
                    shape.update(body.position(), *body.rotation());
                }
            }
        });
    }

    fn collide_shapes(&mut self) {
        let _span = tracy_span!("collide shapes", "collide_shapes");

        let bounds = ShapeBounds {
            shapes: &self.shapes,
            bodies: &self.bodies,
        };
        let mut pass = CollisionPass {
            shapes: &self.shapes,
            bodies: &self.bodies,
            arbiters: &mut self.arbiters,
            cached_arbiters: &mut self.cached_arbiters,
            active_arbiters: &mut self.active_arbiters,
            handlers: &mut self.handlers,
            post_step: &mut self.post_step,
            contact_buffer: &mut self.contact_buffer,
            stamp: self.stamp,
        };
        self.index
            .reindex_query(&bounds, &mut |a, b| pass.collide(a, b));
    }

    /// Call `separate` for arbiters whose shapes stopped touching
    /// and throw away the ones that haven't touched in a while.
    fn age_arbiters(&mut self) {
        let _span = tracy_span!("age arbiters", "age_arbiters");

        let stamp = self.stamp;
        let persistence = self.params.collision_persistence;
        let mut evicted = Vec::new();
        self.cached_arbiters.retain(|entry| {
            let Some(arb) = self.arbiters.get_mut(entry.key.0) else {
                return false;
            };
            let resting = |key: BodyKey| {
                self.bodies
                    .get(key.0)
                    .map_or(true, |b| b.is_static() || b.is_sleeping())
            };
            if resting(arb.body_a) && resting(arb.body_b) {
                return true;
            }

            let ticks = stamp.saturating_sub(arb.stamp);
            if ticks >= 1 && arb.state != ArbiterState::Cached {
                self.handlers
                    .get_mut(arb.handler)
                    .separate(&mut CollisionContext {
                        arbiter: &mut *arb,
                        post_step: &mut self.post_step,
                    });
                arb.state = ArbiterState::Cached;
            }
            if ticks >= persistence {
                evicted.push(entry.key);
                return false;
            }
            true
        });

        if !evicted.is_empty() {
            log::trace!("Evicting {} stale arbiters", evicted.len());
        }
        for key in evicted {
            if let Some(arb) = self.arbiters.get(key.0) {
                // sleeping bodies keep their threads until the arbiter is freed
                let threaded = [arb.body_a, arb.body_b].iter().any(|b| {
                    self.bodies
                        .get(b.0)
                        .map_or(false, |b| !b.is_sleeping() && b.arbiters.contains(&key))
                });
                if threaded {
                    log::warn!("Evicted arbiter {key:?} was still threaded onto a body");
                }
            }
            self.free_arbiter(key);
        }
    }

    fn pre_step(&mut self, dt: f64) {
        let _span = tracy_span!("pre-step", "pre_step");

        let slop = self.params.collision_slop;
        let bias_coef = 1.0 - self.params.collision_bias.powf(dt);
        for &key in &self.active_arbiters {
            let arb = &mut self.arbiters[key.0];
            if let (Some(a), Some(b)) = (self.bodies.get(arb.body_a.0), self.bodies.get(arb.body_b.0)) {
                arb.pre_step(a, b, dt, slop, bias_coef);
            }
        }

        for &key in &self.active_constraints {
            let constraint = &mut self.constraints[key.0];
            constraint.call_pre_solve(&mut self.post_step);
            let (a, b) = constraint.bodies();
            if let (Some(a), Some(b)) = (self.bodies.get(a.0), self.bodies.get(b.0)) {
                constraint.pre_step(a, b, dt);
            }
        }
    }

    fn integrate_velocities(&mut self, dt: f64) {
        let _span = tracy_span!("integrate velocities", "integrate_velocities");

        let damping = self.params.damping.powf(dt);
        let gravity = self.params.gravity;
        for &key in &self.active_bodies {
            if let Some(body) = self.bodies.get_mut(key.0) {
                body.update_velocity(gravity, damping, dt);
            }
        }
    }

    fn warm_start(&mut self, dt: f64) {
        let _span = tracy_span!("warm start", "warm_start");

        let dt_coef = if self.prev_dt == 0.0 {
            0.0
        } else {
            dt / self.prev_dt
        };
        for &key in &self.active_arbiters {
            let arb = &self.arbiters[key.0];
            if let (Some(a), Some(b)) = self.bodies.get2_mut(arb.body_a.0, arb.body_b.0) {
                arb.apply_cached_impulse(a, b, dt_coef);
            }
        }
        for &key in &self.active_constraints {
            let constraint = &self.constraints[key.0];
            let (a, b) = constraint.bodies();
            if let (Some(a), Some(b)) = self.bodies.get2_mut(a.0, b.0) {
                constraint.apply_cached_impulse(a, b, dt_coef);
            }
        }
    }

    fn solve(&mut self) {
        let _span = tracy_span!("solve", "solve");

        for _ in 0..self.params.iterations {
            for &key in &self.active_arbiters {
                let arb = &mut self.arbiters[key.0];
                if let (Some(a), Some(b)) = self.bodies.get2_mut(arb.body_a.0, arb.body_b.0) {
                    arb.apply_impulse(a, b);
                }
            }
            for &key in &self.active_constraints {
                let constraint = &mut self.constraints[key.0];
                let (a, b) = constraint.bodies();
                if let (Some(a), Some(b)) = self.bodies.get2_mut(a.0, b.0) {
                    constraint.apply_impulse(a, b);
                }
            }
        }
    }

    fn post_solve(&mut self) {
        let _span = tracy_span!("post-solve callbacks", "post_solve");

        for &key in &self.active_constraints {
            self.constraints[key.0].call_post_solve(&mut self.post_step);
        }
        for &key in &self.active_arbiters {
            let arb = &mut self.arbiters[key.0];
            self.handlers
                .get_mut(arb.handler)
                .post_solve(&mut CollisionContext {
                    arbiter: arb,
                    post_step: &mut self.post_step,
                });
        }
    }
}

//
// narrow phase
//

/// Early out for pairs of shapes that can't collide.
fn query_reject(a: &Shape, b: &Shape, bodies: &td::Arena<Body>) -> bool {
    let infinite_mass = |s: &Shape| {
        bodies
            .get(s.body.0)
            .map_or(true, |b| b.mass().inv() == 0.0)
    };
    !a.bb.intersects(&b.bb)
        || a.body == b.body
        || (a.group != NO_GROUP && a.group == b.group)
        || a.layers & b.layers == 0
        || (infinite_mass(a) && infinite_mass(b))
}

/// The parts of a space the narrow phase touches,
/// borrowed separately from the spatial index that drives it.
struct CollisionPass<'a> {
    shapes: &'a td::Arena<Shape>,
    bodies: &'a td::Arena<Body>,
    arbiters: &'a mut td::Arena<Arbiter>,
    cached_arbiters: &'a mut HashSet<CachedArbiter>,
    active_arbiters: &'a mut Vec<ArbiterKey>,
    handlers: &'a mut HandlerRegistry,
    post_step: &'a mut PostStepQueue,
    contact_buffer: &'a mut Vec<Contact>,
    stamp: u64,
}

impl CollisionPass<'_> {
    fn collide(&mut self, key_a: ShapeKey, key_b: ShapeKey) {
        let (Some(a), Some(b)) = (self.shapes.get(key_a.0), self.shapes.get(key_b.0)) else {
            return;
        };
        if query_reject(a, b, self.bodies) {
            return;
        }

        let (pair, swapped) = OrderedPair::new(a, b);
        let (key_a, key_b) = if swapped {
            (key_b, key_a)
        } else {
            (key_a, key_b)
        };
        let (a, b) = pair.shapes();

        let (handler, handler_swapped) = self.handlers.lookup(a.collision_type, b.collision_type);
        let sensor = a.sensor || b.sensor;
        if sensor && handler == HandlerSlot::Default {
            return;
        }

        let mut contacts = std::mem::take(self.contact_buffer);
        contacts.clear();
        if narrowphase::collide(pair, &mut contacts) == 0 {
            *self.contact_buffer = contacts;
            return;
        }

        let hash = hash_pair(a.hash_id, b.hash_id);
        let arbiters = &mut *self.arbiters;
        let entry = self.cached_arbiters.insert_with(
            hash,
            |e| e.matches(key_a, key_b),
            || CachedArbiter {
                shapes: (key_a, key_b),
                key: ArbiterKey(arbiters.insert(Arbiter::new(key_a, a, key_b, b, hash))),
            },
        );
        let arb_key = entry.key;
        let arb = &mut self.arbiters[arb_key.0];
        *self.contact_buffer = arb.update(contacts, handler, handler_swapped, key_a, a, key_b, b);

        let callbacks = self.handlers.get_mut(handler);
        let mut ctx = CollisionContext {
            arbiter: arb,
            post_step: &mut *self.post_step,
        };
        if ctx.arbiter.state == ArbiterState::FirstCollision
            && callbacks.begin(&mut ctx) == ContactResponse::Reject
        {
            ctx.arbiter.ignore();
        }

        if ctx.arbiter.state != ArbiterState::Ignore
            && callbacks.pre_solve(&mut ctx) == ContactResponse::Accept
            && !sensor
        {
            self.active_arbiters.push(arb_key);
        } else {
            // rejected for this step, keep the arbiter alive to detect separation
            ctx.arbiter.contacts.clear();
            if ctx.arbiter.state != ArbiterState::Ignore {
                ctx.arbiter.state = ArbiterState::Normal;
            }
        }

        ctx.arbiter.stamp = self.stamp;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{PivotJoint, Velocity};
    use std::{cell::Cell, rc::Rc};

    const DT: f64 = 1.0 / 60.0;

    fn gravity_params() -> SpaceParams {
        SpaceParams {
            gravity: m::Vec2::new(0.0, -10.0),
            ..Default::default()
        }
    }

    fn add_ground(space: &mut Space) -> ShapeKey {
        let static_body = space.static_body();
        space.add_shape(
            Shape::segment(
                static_body,
                m::Vec2::new(-20.0, 0.0),
                m::Vec2::new(20.0, 0.0),
                0.0,
            )
            .with_friction(1.0),
        )
    }

    fn add_ball(space: &mut Space, pos: m::Vec2, radius: f64) -> (BodyKey, ShapeKey) {
        let body = space.add_body(Body::new(1.0, 1.0).with_position(pos));
        let shape = space.add_shape(Shape::circle(body, radius, m::Vec2::zero()).with_friction(1.0));
        (body, shape)
    }

    fn counter() -> (Rc<Cell<u32>>, impl Fn() -> Box<dyn Fn()>) {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        (count, move || {
            let c = c.clone();
            Box::new(move || c.set(c.get() + 1))
        })
    }

    #[test]
    fn zero_step_does_nothing() {
        let mut space = Space::new(gravity_params());
        let (body, _) = add_ball(&mut space, m::Vec2::new(0.0, 5.0), 0.5);
        space.step(0.0);
        assert_eq!(space.stamp(), 0);
        assert_eq!(space.body(body).map(|b| b.position()), Some(m::Vec2::new(0.0, 5.0)));
    }

    #[test]
    fn ball_settles_on_ground() {
        let mut space = Space::new(gravity_params());
        add_ground(&mut space);
        let (body, _) = add_ball(&mut space, m::Vec2::new(0.0, 1.49), 0.5);

        for _ in 0..120 {
            space.step(DT);
        }
        let body = space.body(body).expect("ball exists");
        let penetration = 0.5 - body.position().y;
        assert!(
            penetration <= space.params.collision_slop + 1e-3,
            "sank by {penetration}"
        );
        assert!(penetration > -1e-3, "floating at {}", body.position().y);
        assert!(body.velocity.linear.y.abs() < 0.05);
    }

    #[test]
    fn warm_started_impulse_matches_weight() {
        let mut space = Space::new(gravity_params());
        add_ground(&mut space);
        let (_, _) = add_ball(&mut space, m::Vec2::new(0.0, 0.45), 0.5);

        for _ in 0..180 {
            space.step(DT);
        }
        assert_eq!(space.active_arbiters.len(), 1);
        let arb = &space.arbiters[space.active_arbiters[0].0];
        let jn: f64 = arb.contacts().iter().map(|c| c.jn_acc).sum();
        let expected = 1.0 * 10.0 * DT;
        assert!((jn - expected).abs() < 0.1 * expected, "impulse {jn}, expected {expected}");
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let mut space = Space::new(gravity_params());
        add_ground(&mut space);
        let (body, shape) = add_ball(&mut space, m::Vec2::new(0.0, 0.45), 0.5);
        let other = space.add_body(Body::new(1.0, 1.0));
        let constraint = space.add_constraint(Constraint::new(
            body,
            other,
            PivotJoint::new(m::Vec2::zero(), m::Vec2::zero()),
        ));
        assert!(space.contains_body(body));
        assert_eq!(space.index.count(IndexLayer::Active), 1);
        space.step(DT);
        assert_eq!(space.cached_arbiters.len(), 1);

        let removed = space.remove_body(body);
        assert!(!space.contains_body(body));
        assert!(!space.contains_shape(shape));
        assert!(!space.contains_constraint(constraint));
        assert!(removed.shapes().is_empty());
        assert_eq!(space.index.count(IndexLayer::Active), 0);
        assert_eq!(space.index.count(IndexLayer::Static), 1);
        assert_eq!(space.cached_arbiters.len(), 0);
        assert_eq!(space.arbiters.len(), 0);
        assert!(space.active_constraints.is_empty());
        assert_eq!(space.bodies[other.0].constraints().len(), 0);
        itertools::assert_equal(space.bodies().map(|(k, _)| k), [other]);

        // the removed body can be added again
        let body = space.add_body(removed);
        assert!(space.contains_body(body));
        space.step(DT);
    }

    #[test]
    #[should_panic]
    fn removing_twice_fails() {
        let mut space = Space::new(SpaceParams::default());
        let body = space.add_body(Body::new(1.0, 1.0));
        space.remove_body(body);
        space.remove_body(body);
    }

    #[test]
    #[should_panic]
    fn static_body_cant_be_simulated() {
        let mut space = Space::new(SpaceParams::default());
        space.add_body(Body::new_static());
    }

    #[test]
    #[should_panic]
    fn joint_between_immovable_bodies_is_rejected() {
        let mut space = Space::new(SpaceParams::default());
        let static_body = space.static_body();
        let kinematic = space.add_body(Body::new_kinematic());
        let joint = PivotJoint::new(m::Vec2::zero(), m::Vec2::zero());
        space.add_constraint(Constraint::new(static_body, kinematic, joint));
    }

    #[test]
    fn removed_handler_falls_back_to_default() {
        let mut space = Space::new(gravity_params());
        let rejects = Rc::new(Cell::new(0));
        space.add_collision_handler(
            1,
            2,
            CollisionHandler::new().with_begin({
                let rejects = rejects.clone();
                move |_| {
                    rejects.set(rejects.get() + 1);
                    ContactResponse::Reject
                }
            }),
        );
        let static_body = space.static_body();
        space.add_shape(
            Shape::segment(static_body, m::Vec2::new(-5.0, 0.0), m::Vec2::new(5.0, 0.0), 0.0)
                .with_collision_type(1),
        );
        let body = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(0.0, 0.45)));
        let shape = space.add_shape(Shape::circle(body, 0.5, m::Vec2::zero()).with_collision_type(2));

        space.step(DT);
        assert_eq!(rejects.get(), 1);
        assert!(space.active_arbiters.is_empty());

        // a new shape makes a new arbiter, which goes to the default handler
        space.remove_collision_handler(1, 2);
        space.remove_shape(shape);
        space.add_shape(Shape::circle(body, 0.5, m::Vec2::zero()).with_collision_type(2));
        space.step(DT);
        assert_eq!(rejects.get(), 1);
        assert_eq!(space.active_arbiters.len(), 1);
    }

    #[test]
    fn begin_rejection_lasts_until_separation() {
        let mut space = Space::new(SpaceParams::default());
        let (begins, make_inc) = counter();
        let inc = make_inc();
        space.add_collision_handler(
            1,
            1,
            CollisionHandler::new().with_begin(move |_| {
                inc();
                ContactResponse::Reject
            }),
        );
        let (a, _) = {
            let body = space.add_body(Body::new(1.0, 1.0));
            let shape = space.add_shape(Shape::circle(body, 1.0, m::Vec2::zero()).with_collision_type(1));
            (body, shape)
        };
        let b = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(1.5, 0.0)));
        space.add_shape(Shape::circle(b, 1.0, m::Vec2::zero()).with_collision_type(1));

        for _ in 0..5 {
            space.step(DT);
        }
        // ignored pairs don't push each other apart
        assert_eq!(begins.get(), 1);
        assert_eq!(space.body(a).map(|b| b.position()), Some(m::Vec2::zero()));
        assert_eq!(space.cached_arbiters.len(), 1);
    }

    #[test]
    fn separate_is_called_once() {
        let mut space = Space::new(SpaceParams::default());
        let (separates, make_inc) = counter();
        let inc = make_inc();
        space.set_default_collision_handler(CollisionHandler::new().with_separate(move |_| inc()));

        let (a, _) = add_ball(&mut space, m::Vec2::zero(), 1.0);
        let (b, _) = add_ball(&mut space, m::Vec2::new(1.5, 0.0), 1.0);
        space.step(DT);
        assert_eq!(separates.get(), 0);
        assert_eq!(space.active_arbiters.len(), 1);

        // teleport apart
        if let Some(body) = space.body_mut(b) {
            body.set_position(m::Vec2::new(10.0, 0.0));
            body.velocity = Velocity::default();
        }
        if let Some(body) = space.body_mut(a) {
            body.velocity = Velocity::default();
        }
        space.step(DT);
        assert_eq!(separates.get(), 1);
        assert_eq!(space.cached_arbiters.len(), 1);
        for _ in 0..10 {
            space.step(DT);
        }
        assert_eq!(separates.get(), 1);
        // evicted after the persistence period
        assert_eq!(space.cached_arbiters.len(), 0);
        assert_eq!(space.arbiters.len(), 0);
    }

    #[test]
    fn removing_a_shape_separates_its_arbiters() {
        let mut space = Space::new(SpaceParams::default());
        let (separates, make_inc) = counter();
        let inc = make_inc();
        space.set_default_collision_handler(CollisionHandler::new().with_separate(move |_| inc()));

        add_ball(&mut space, m::Vec2::zero(), 1.0);
        let (_, shape) = add_ball(&mut space, m::Vec2::new(1.5, 0.0), 1.0);
        space.step(DT);
        space.remove_shape(shape);
        assert_eq!(separates.get(), 1);
        assert_eq!(space.arbiters.len(), 0);
        space.step(DT);
        assert_eq!(separates.get(), 1);
    }

    #[test]
    fn sensors_report_without_responding() {
        let mut space = Space::new(SpaceParams::default());
        let (begins, make_inc) = counter();
        let inc = make_inc();
        space.add_collision_handler(
            1,
            2,
            CollisionHandler::new().with_begin(move |ctx| {
                assert!(ctx.arbiter.is_first_contact());
                inc();
                ContactResponse::Accept
            }),
        );
        let static_body = space.static_body();
        space.add_shape(Shape::circle(static_body, 1.0, m::Vec2::zero()).as_sensor().with_collision_type(1));
        let body = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(1.5, 0.0)));
        space.add_shape(Shape::circle(body, 1.0, m::Vec2::zero()).with_collision_type(2));
        // sensors never collide through the default handler
        let other = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(-1.5, 0.0)));
        space.add_shape(Shape::circle(other, 1.0, m::Vec2::zero()).with_collision_type(3));

        for _ in 0..3 {
            space.step(DT);
        }
        assert_eq!(begins.get(), 1);
        assert!(space.active_arbiters.is_empty());
        assert_eq!(space.cached_arbiters.len(), 1);
        assert_eq!(space.body(body).map(|b| b.position()), Some(m::Vec2::new(1.5, 0.0)));
    }

    #[test]
    fn handler_can_remove_shapes_after_the_step() {
        let mut space = Space::new(gravity_params());
        add_ground(&mut space);
        space.add_collision_handler(
            0,
            7,
            CollisionHandler::new().with_begin(|ctx| {
                let (_, bullet) = ctx.arbiter.shapes();
                ctx.post_step.push(PostStepAction::RemoveShape(bullet));
                // queued twice, applied once
                ctx.post_step.push(PostStepAction::RemoveShape(bullet));
                ContactResponse::Accept
            }),
        );
        let body = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(0.0, 0.45)));
        let bullet = space.add_shape(Shape::circle(body, 0.5, m::Vec2::zero()).with_collision_type(7));

        space.step(DT);
        assert!(!space.is_locked());
        assert!(!space.contains_shape(bullet));
        assert!(space.post_step.is_empty());
        assert!(space.body(body).map_or(false, |b| b.shapes().is_empty()));
    }

    #[test]
    fn pre_solve_can_override_materials() {
        let mut space = Space::new(SpaceParams::default());
        space.set_default_collision_handler(CollisionHandler::new().with_pre_solve(|ctx| {
            ctx.arbiter.elasticity = 1.0;
            ContactResponse::Accept
        }));
        let (a, _) = add_ball(&mut space, m::Vec2::zero(), 1.0);
        let (b, _) = add_ball(&mut space, m::Vec2::new(1.99, 0.0), 1.0);
        if let Some(body) = space.body_mut(a) {
            body.velocity.linear = m::Vec2::new(1.0, 0.0);
        }
        space.step(DT);
        // a perfectly elastic collision between equal masses swaps velocities
        let (va, vb) = (space.bodies[a.0].velocity.linear, space.bodies[b.0].velocity.linear);
        assert!(va.x.abs() < 1e-6, "a kept {}", va.x);
        assert!((vb.x - 1.0).abs() < 1e-6, "b got {}", vb.x);
    }

    #[test]
    fn groups_and_layers_filter_collisions() {
        let mut space = Space::new(SpaceParams::default());
        let a = space.add_body(Body::new(1.0, 1.0));
        space.add_shape(Shape::circle(a, 1.0, m::Vec2::zero()).with_group(3).with_layers(0b01));
        let b = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(1.5, 0.0)));
        space.add_shape(Shape::circle(b, 1.0, m::Vec2::zero()).with_group(3));
        let c = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(-1.5, 0.0)));
        space.add_shape(Shape::circle(c, 1.0, m::Vec2::zero()).with_layers(0b10));

        space.step(DT);
        assert!(space.active_arbiters.is_empty());
        assert_eq!(space.cached_arbiters.len(), 0);
    }

    #[test]
    fn both_broad_phases_find_the_same_contacts() {
        let build = |broad_phase| {
            let mut space = Space::with_broad_phase(gravity_params(), broad_phase)
                .expect("valid broad phase");
            add_ground(&mut space);
            // separate balls so the order contacts are solved in doesn't matter
            for i in 0..10 {
                add_ball(&mut space, m::Vec2::new(i as f64 * 1.5 - 7.5, 0.45), 0.5);
            }
            space
        };
        let mut tree = build(BroadPhase::Tree);
        let mut hash = build(BroadPhase::SpatialHash(SpaceHashParams {
            cell_size: 1.0,
            cell_count: 200,
        }));
        for _ in 0..30 {
            tree.step(DT);
            hash.step(DT);
        }
        assert_eq!(tree.active_arbiters.len(), 10);
        assert_eq!(hash.active_arbiters.len(), 10);
        itertools::assert_equal(
            tree.bodies().map(|(_, b)| b.position()),
            hash.bodies().map(|(_, b)| b.position()),
        );
    }

    #[test]
    fn switching_to_spatial_hash_keeps_shapes() {
        let mut space = Space::new(gravity_params());
        add_ground(&mut space);
        add_ball(&mut space, m::Vec2::new(0.0, 0.45), 0.5);
        space.step(DT);

        assert!(space
            .use_spatial_hash(SpaceHashParams {
                cell_size: 0.0,
                cell_count: 10,
            })
            .is_err());
        assert_eq!(space.broad_phase(), BroadPhase::Tree);

        space
            .use_spatial_hash(SpaceHashParams::default())
            .expect("valid params");
        assert_eq!(space.index.count(IndexLayer::Active), 1);
        assert_eq!(space.index.count(IndexLayer::Static), 1);
        space.step(DT);
        assert_eq!(space.active_arbiters.len(), 1);
    }

    #[test]
    fn infinite_mass_pairs_are_skipped() {
        let mut space = Space::new(SpaceParams::default());
        add_ground(&mut space);
        let kinematic = space.add_body(Body::new_kinematic().with_position(m::Vec2::new(0.0, 0.4)));
        space.add_shape(Shape::circle(kinematic, 0.5, m::Vec2::zero()));
        space.step(DT);
        assert!(space.active_arbiters.is_empty());
    }
}
