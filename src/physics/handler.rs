//! Collision handlers: user callbacks for the lifetime of a contact between two shapes.

use super::{
    hash_set::{hash_pair, HashSet, HashValue},
    shape::CollisionType,
    Arbiter, PostStepQueue,
};

/// Whether a pair of shapes should collide.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContactResponse {
    Accept,
    Reject,
}

/// What collision callbacks get to work with.
pub struct CollisionContext<'a> {
    /// The arbiter of the colliding pair, with shapes in the order the handler was registered in.
    pub arbiter: &'a mut Arbiter,
    /// Queue for changes to the world, which is locked while callbacks run.
    pub post_step: &'a mut PostStepQueue,
}

pub type ResponseCallback = Box<dyn FnMut(&mut CollisionContext<'_>) -> ContactResponse>;
pub type EventCallback = Box<dyn FnMut(&mut CollisionContext<'_>)>;

/// Callbacks for the lifetime of a contact. Any of them can be left out:
/// missing `begin` and `pre_solve` accept the collision
/// and missing `post_solve` and `separate` do nothing.
#[derive(Default)]
pub struct CollisionHandler {
    /// Called when two shapes first touch. Rejecting the collision ignores it
    /// until the shapes separate.
    pub begin: Option<ResponseCallback>,
    /// Called every step the shapes are touching, before solving.
    /// Rejecting ignores the collision for this step only.
    /// Material properties of the arbiter can be overridden here.
    pub pre_solve: Option<ResponseCallback>,
    /// Called every step the shapes are touching, after solving.
    /// Impulses applied by the collision can be read here.
    pub post_solve: Option<EventCallback>,
    /// Called once when the shapes stop touching, or when one of them is removed.
    pub separate: Option<EventCallback>,
}

impl std::fmt::Debug for CollisionHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollisionHandler")
            .field("begin", &self.begin.is_some())
            .field("pre_solve", &self.pre_solve.is_some())
            .field("post_solve", &self.post_solve.is_some())
            .field("separate", &self.separate.is_some())
            .finish()
    }
}

impl CollisionHandler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_begin(
        mut self,
        f: impl FnMut(&mut CollisionContext<'_>) -> ContactResponse + 'static,
    ) -> Self {
        self.begin = Some(Box::new(f));
        self
    }

    pub fn with_pre_solve(
        mut self,
        f: impl FnMut(&mut CollisionContext<'_>) -> ContactResponse + 'static,
    ) -> Self {
        self.pre_solve = Some(Box::new(f));
        self
    }

    pub fn with_post_solve(mut self, f: impl FnMut(&mut CollisionContext<'_>) + 'static) -> Self {
        self.post_solve = Some(Box::new(f));
        self
    }

    pub fn with_separate(mut self, f: impl FnMut(&mut CollisionContext<'_>) + 'static) -> Self {
        self.separate = Some(Box::new(f));
        self
    }

    pub(crate) fn begin(&mut self, ctx: &mut CollisionContext<'_>) -> ContactResponse {
        match &mut self.begin {
            Some(f) => f(ctx),
            None => ContactResponse::Accept,
        }
    }

    pub(crate) fn pre_solve(&mut self, ctx: &mut CollisionContext<'_>) -> ContactResponse {
        match &mut self.pre_solve {
            Some(f) => f(ctx),
            None => ContactResponse::Accept,
        }
    }

    pub(crate) fn post_solve(&mut self, ctx: &mut CollisionContext<'_>) {
        if let Some(f) = &mut self.post_solve {
            f(ctx);
        }
    }

    pub(crate) fn separate(&mut self, ctx: &mut CollisionContext<'_>) {
        if let Some(f) = &mut self.separate {
            f(ctx);
        }
    }
}

/// Which handler an arbiter uses. Looked up again from the registry on every call,
/// so removing a handler makes its arbiters fall back to the default.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum HandlerSlot {
    Registered(CollisionType, CollisionType),
    Default,
}

struct RegisteredHandler {
    types: (CollisionType, CollisionType),
    handler: CollisionHandler,
}

#[inline]
fn types_hash(a: CollisionType, b: CollisionType) -> HashValue {
    hash_pair(a as HashValue, b as HashValue)
}

#[inline]
fn types_eq(entry: &RegisteredHandler, a: CollisionType, b: CollisionType) -> bool {
    entry.types == (a, b) || entry.types == (b, a)
}

/// Collision handlers keyed by unordered pairs of collision types,
/// with a default for pairs that have none.
#[derive(Default)]
pub(crate) struct HandlerRegistry {
    handlers: HashSet<RegisteredHandler>,
    default: CollisionHandler,
}

impl HandlerRegistry {
    /// Add a handler for a pair of collision types, replacing any previous one.
    pub fn insert(&mut self, a: CollisionType, b: CollisionType, handler: CollisionHandler) {
        let hash = types_hash(a, b);
        self.handlers.remove(hash, |e| types_eq(e, a, b));
        self.handlers.insert(
            hash,
            RegisteredHandler {
                types: (a, b),
                handler,
            },
            |e| types_eq(e, a, b),
        );
    }

    pub fn remove(&mut self, a: CollisionType, b: CollisionType) -> Option<CollisionHandler> {
        self.handlers
            .remove(types_hash(a, b), |e| types_eq(e, a, b))
            .map(|e| e.handler)
    }

    pub fn set_default(&mut self, handler: CollisionHandler) {
        self.default = handler;
    }

    /// Find the handler for a pair of shapes with the given collision types.
    /// Also returns whether the shapes are in the opposite order from the handler's.
    pub fn lookup(&self, a: CollisionType, b: CollisionType) -> (HandlerSlot, bool) {
        match self.handlers.find(types_hash(a, b), |e| types_eq(e, a, b)) {
            Some(entry) => (
                HandlerSlot::Registered(entry.types.0, entry.types.1),
                a != entry.types.0,
            ),
            None => (HandlerSlot::Default, false),
        }
    }

    pub fn get_mut(&mut self, slot: HandlerSlot) -> &mut CollisionHandler {
        match slot {
            HandlerSlot::Registered(a, b) => {
                match self.handlers.find_mut(types_hash(a, b), |e| types_eq(e, a, b)) {
                    Some(entry) => &mut entry.handler,
                    None => &mut self.default,
                }
            }
            HandlerSlot::Default => &mut self.default,
        }
    }
}
