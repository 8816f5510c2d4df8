//! The spatial index is responsible for detecting pairs of possibly
//! intersecting objects for further, more accurate narrow phase inspection.

use super::{
    bb_tree::BBTree,
    space_hash::{SpaceHash, SpaceHashError, SpaceHashParams},
    AABB,
};
use crate::{math as m, physics::hash_set::HashValue};

/// Where a spatial index gets the current bounding boxes of the objects it stores.
pub trait BoundsSource<T> {
    fn bounds(&self, obj: T) -> AABB;

    /// Estimated velocity of the object, used to avoid restructuring
    /// indices every frame for moving objects. Zero if not overridden.
    fn velocity(&self, _obj: T) -> m::Vec2 {
        m::Vec2::zero()
    }
}

/// Every spatial index is split in two layers:
/// one for objects that move and one for objects that don't.
/// Static objects are never tested against each other.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndexLayer {
    Active,
    Static,
}

impl IndexLayer {
    #[inline]
    pub(crate) fn idx(self) -> usize {
        match self {
            IndexLayer::Active => 0,
            IndexLayer::Static => 1,
        }
    }
}

/// Operations every spatial index supports.
///
/// Objects are identified by a value of type `T` together with a hash of it;
/// the same hash must be given when inserting, updating and removing an object.
/// Queries cover both layers.
pub trait SpatialIndex<T> {
    /// Number of objects in the layer.
    fn count(&self, layer: IndexLayer) -> usize;

    fn contains(&self, layer: IndexLayer, obj: T, hash: HashValue) -> bool;

    /// Call `f` for every object in the layer.
    fn each(&self, layer: IndexLayer, f: &mut dyn FnMut(T));

    fn insert(&mut self, layer: IndexLayer, obj: T, hash: HashValue, src: &dyn BoundsSource<T>);

    fn remove(&mut self, layer: IndexLayer, obj: T, hash: HashValue);

    /// Update the positions of all objects in the layer.
    fn reindex(&mut self, layer: IndexLayer, src: &dyn BoundsSource<T>);

    /// Update the position of a single object in whichever layer it's in.
    fn reindex_object(&mut self, obj: T, hash: HashValue, src: &dyn BoundsSource<T>);

    /// Update the positions of all active objects and report every pair of objects
    /// that may be touching, each pair once. Pairs are either two active objects
    /// or an active and a static object, in no particular order.
    fn reindex_query(&mut self, src: &dyn BoundsSource<T>, f: &mut dyn FnMut(T, T));

    /// Call `f` for every object whose bounding box may intersect `bb`.
    fn query(&mut self, bb: AABB, f: &mut dyn FnMut(T));

    /// Call `f` for every object whose bounding box may contain `point`.
    fn point_query(&mut self, point: m::Vec2, f: &mut dyn FnMut(T)) {
        self.query(AABB::new(point, point), f)
    }

    /// Call `f` for objects whose bounding boxes may intersect the segment from `a` to `b`,
    /// roughly in order along the segment. `f` returns the fraction along the segment
    /// where it hit the object (or 1 if it didn't), and objects further away than the
    /// closest hit so far or `t_exit` may be skipped.
    fn segment_query(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        t_exit: f64,
        f: &mut dyn FnMut(T) -> f64,
    );
}

/// Choice of spatial index algorithm for a [`Space`][crate::physics::Space].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub enum BroadPhase {
    /// A dynamic bounding box tree that tracks overlapping pairs across frames.
    /// Doesn't need tuning and works well for most scenes.
    Tree,
    /// A uniform grid of cells.
    /// Can be faster than the tree when objects are similar in size
    /// and the cell size is tuned well.
    SpatialHash(SpaceHashParams),
}

impl Default for BroadPhase {
    fn default() -> Self {
        BroadPhase::Tree
    }
}

impl BroadPhase {
    /// Create an empty index of the chosen kind.
    pub fn build<T>(&self) -> Result<Box<dyn SpatialIndex<T>>, SpaceHashError>
    where
        T: Copy + PartialEq + 'static,
    {
        Ok(match self {
            BroadPhase::Tree => Box::new(BBTree::new()),
            BroadPhase::SpatialHash(params) => Box::new(SpaceHash::new(*params)?),
        })
    }
}
