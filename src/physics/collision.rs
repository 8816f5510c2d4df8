mod aabb;
pub use aabb::AABB;

mod bb_tree;
pub use bb_tree::BBTree;

pub mod narrowphase;
pub use narrowphase::{Contact, MAX_CONTACTS_PER_ARBITER};

mod space_hash;
pub use space_hash::{SpaceHash, SpaceHashError, SpaceHashParams};

mod spatial_index;
pub use spatial_index::{BoundsSource, BroadPhase, IndexLayer, SpatialIndex};
