//! A dynamic bounding volume hierarchy that remembers overlapping pairs between frames.

use thunderdome as td;

use super::{
    spatial_index::{BoundsSource, IndexLayer, SpatialIndex},
    AABB,
};
use crate::{
    math as m,
    physics::hash_set::{HashSet, HashValue},
};

type NodeId = td::Index;

/// Link from a leaf to another leaf it's paired with.
/// Each pair is reported by exactly one of its two leaves.
#[derive(Clone, Copy, Debug)]
struct PairLink {
    other: NodeId,
    reports: bool,
}

#[derive(Clone, Debug)]
struct Leaf<T> {
    obj: T,
    /// Time the leaf was last moved in the tree.
    stamp: u64,
    pairs: Vec<PairLink>,
}

#[derive(Clone, Debug)]
enum NodeKind<T> {
    Branch { a: NodeId, b: NodeId },
    Leaf(Leaf<T>),
}

#[derive(Clone, Debug)]
struct Node<T> {
    bb: AABB,
    parent: Option<NodeId>,
    kind: NodeKind<T>,
}

#[derive(Clone, Copy, Debug)]
struct LeafEntry<T> {
    obj: T,
    node: NodeId,
}

/// A bounding box tree.
///
/// Leaves of moving objects get boxes slightly larger than the objects,
/// stretched in the direction of their velocity, so that they only need to be
/// moved in the tree when they leave their box. Overlapping leaves are linked
/// to each other, and a leaf that didn't move since the last query reports its
/// stored pairs without searching the tree again.
#[derive(Clone, Debug)]
pub struct BBTree<T> {
    nodes: td::Arena<Node<T>>,
    roots: [Option<NodeId>; 2],
    leaves: [HashSet<LeafEntry<T>>; 2],
    stamp: u64,
}

impl<T: Copy + PartialEq> Default for BBTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + PartialEq> BBTree<T> {
    pub fn new() -> Self {
        Self {
            nodes: td::Arena::new(),
            roots: [None, None],
            leaves: [HashSet::new(0), HashSet::new(0)],
            stamp: 0,
        }
    }

    //
    // node helpers
    //

    #[inline]
    fn leaf(&self, id: NodeId) -> &Leaf<T> {
        match &self.nodes[id].kind {
            NodeKind::Leaf(leaf) => leaf,
            NodeKind::Branch { .. } => unreachable!("node {id:?} is not a leaf"),
        }
    }

    #[inline]
    fn leaf_mut(&mut self, id: NodeId) -> &mut Leaf<T> {
        match &mut self.nodes[id].kind {
            NodeKind::Leaf(leaf) => leaf,
            NodeKind::Branch { .. } => unreachable!("node {id:?} is not a leaf"),
        }
    }

    #[inline]
    fn children(&self, id: NodeId) -> Option<(NodeId, NodeId)> {
        match self.nodes[id].kind {
            NodeKind::Branch { a, b } => Some((a, b)),
            NodeKind::Leaf(_) => None,
        }
    }

    fn new_branch(&mut self, a: NodeId, b: NodeId) -> NodeId {
        let bb = self.nodes[a].bb.union(&self.nodes[b].bb);
        let id = self.nodes.insert(Node {
            bb,
            parent: None,
            kind: NodeKind::Branch { a, b },
        });
        self.nodes[a].parent = Some(id);
        self.nodes[b].parent = Some(id);
        id
    }

    /// Bounding box for a leaf of the given object.
    fn leaf_bounds(layer: IndexLayer, obj: T, src: &dyn BoundsSource<T>) -> AABB {
        let bb = src.bounds(obj);
        if layer == IndexLayer::Static {
            return bb;
        }
        const COEF: f64 = 0.1;
        let x = bb.width() * COEF;
        let y = bb.height() * COEF;
        let v = src.velocity(obj) * COEF;
        AABB::new(
            bb.min + m::Vec2::new((-x).min(v.x), (-y).min(v.y)),
            bb.max + m::Vec2::new(x.max(v.x), y.max(v.y)),
        )
    }

    //
    // structure
    //

    /// Insert a leaf into a subtree, returning the new root of the subtree.
    fn subtree_insert(&mut self, subtree: Option<NodeId>, leaf: NodeId) -> NodeId {
        let Some(subtree) = subtree else {
            return leaf;
        };
        let Some((a, b)) = self.children(subtree) else {
            return self.new_branch(leaf, subtree);
        };

        let leaf_bb = self.nodes[leaf].bb;
        let a_bb = self.nodes[a].bb;
        let b_bb = self.nodes[b].bb;
        let mut cost_a = b_bb.area() + a_bb.merged_area(&leaf_bb);
        let mut cost_b = a_bb.area() + b_bb.merged_area(&leaf_bb);
        if cost_a == cost_b {
            cost_a = a_bb.proximity(&leaf_bb);
            cost_b = b_bb.proximity(&leaf_bb);
        }

        if cost_b < cost_a {
            let new_b = self.subtree_insert(Some(b), leaf);
            self.nodes[new_b].parent = Some(subtree);
            self.nodes[subtree].kind = NodeKind::Branch { a, b: new_b };
        } else {
            let new_a = self.subtree_insert(Some(a), leaf);
            self.nodes[new_a].parent = Some(subtree);
            self.nodes[subtree].kind = NodeKind::Branch { a: new_a, b };
        }
        self.nodes[subtree].bb = self.nodes[subtree].bb.union(&leaf_bb);
        subtree
    }

    /// Remove a leaf from a subtree, returning the new root of the subtree.
    fn subtree_remove(&mut self, subtree: NodeId, leaf: NodeId) -> Option<NodeId> {
        if leaf == subtree {
            self.nodes[leaf].parent = None;
            return None;
        }

        let parent = self.nodes[leaf].parent?;
        let (pa, pb) = self.children(parent)?;
        let sibling = if pa == leaf { pb } else { pa };
        self.nodes[leaf].parent = None;

        if parent == subtree {
            self.nodes[sibling].parent = self.nodes[subtree].parent;
            self.nodes.remove(subtree);
            return Some(sibling);
        }

        // replace the parent with the sibling in the grandparent
        let grandparent = self.nodes[parent].parent?;
        self.nodes.remove(parent);
        self.nodes[sibling].parent = Some(grandparent);
        if let Some((ga, gb)) = self.children(grandparent) {
            self.nodes[grandparent].kind = if ga == parent {
                NodeKind::Branch { a: sibling, b: gb }
            } else {
                NodeKind::Branch { a: ga, b: sibling }
            };
        }
        let mut node = Some(grandparent);
        while let Some(id) = node {
            if let Some((a, b)) = self.children(id) {
                self.nodes[id].bb = self.nodes[a].bb.union(&self.nodes[b].bb);
            }
            node = self.nodes[id].parent;
        }
        Some(subtree)
    }

    //
    // pairs
    //

    /// Link two leaves. `b` becomes responsible for reporting the pair.
    fn pair_insert(&mut self, a: NodeId, b: NodeId) {
        self.leaf_mut(a).pairs.push(PairLink {
            other: b,
            reports: false,
        });
        self.leaf_mut(b).pairs.push(PairLink {
            other: a,
            reports: true,
        });
    }

    fn pairs_clear(&mut self, leaf: NodeId) {
        let pairs = std::mem::take(&mut self.leaf_mut(leaf).pairs);
        for link in pairs {
            if let Some(Node {
                kind: NodeKind::Leaf(other),
                ..
            }) = self.nodes.get_mut(link.other)
            {
                other.pairs.retain(|l| l.other != leaf);
            }
        }
    }

    /// Find leaves in `subtree` overlapping `leaf`.
    /// `left` tells whether the subtree is on the side of `leaf` that gets visited later,
    /// in which case the pair is only linked and reported when that side is visited.
    fn mark_leaf_query(
        &mut self,
        subtree: NodeId,
        leaf: NodeId,
        left: bool,
        f: &mut dyn FnMut(T, T),
    ) {
        if !self.nodes[leaf].bb.intersects(&self.nodes[subtree].bb) {
            return;
        }
        match self.children(subtree) {
            Some((a, b)) => {
                self.mark_leaf_query(a, leaf, left, f);
                self.mark_leaf_query(b, leaf, left, f);
            }
            None => {
                if left {
                    self.pair_insert(leaf, subtree);
                } else {
                    if self.leaf(subtree).stamp < self.leaf(leaf).stamp {
                        self.pair_insert(subtree, leaf);
                    }
                    f(self.leaf(leaf).obj, self.leaf(subtree).obj);
                }
            }
        }
    }

    /// Report the pairs of an active leaf, searching the tree if the leaf moved
    /// and using the stored pairs otherwise.
    fn mark_leaf(&mut self, leaf: NodeId, f: &mut dyn FnMut(T, T)) {
        let (obj, stamp) = {
            let l = self.leaf(leaf);
            (l.obj, l.stamp)
        };
        if stamp == self.stamp {
            if let Some(static_root) = self.roots[IndexLayer::Static.idx()] {
                self.mark_leaf_query(static_root, leaf, false, f);
            }
            let mut node = leaf;
            while let Some(parent) = self.nodes[node].parent {
                let Some((a, b)) = self.children(parent) else {
                    break;
                };
                if node == a {
                    self.mark_leaf_query(b, leaf, true, f);
                } else {
                    self.mark_leaf_query(a, leaf, false, f);
                }
                node = parent;
            }
        } else {
            for link in &self.leaf(leaf).pairs {
                if link.reports {
                    f(self.leaf(link.other).obj, obj);
                }
            }
        }
    }

    fn collect_leaves(&self, subtree: NodeId, out: &mut Vec<NodeId>) {
        match self.children(subtree) {
            Some((a, b)) => {
                self.collect_leaves(a, out);
                self.collect_leaves(b, out);
            }
            None => out.push(subtree),
        }
    }

    /// Link a newly moved or inserted leaf to everything it overlaps.
    fn add_pairs(&mut self, leaf: NodeId, layer: IndexLayer) {
        match layer {
            IndexLayer::Active => self.mark_leaf(leaf, &mut |_, _| {}),
            IndexLayer::Static => {
                if let Some(active_root) = self.roots[IndexLayer::Active.idx()] {
                    self.mark_leaf_query(active_root, leaf, true, &mut |_, _| {});
                }
            }
        }
    }

    /// Move a leaf in the tree if its object left the leaf's bounding box.
    fn leaf_update(&mut self, leaf: NodeId, layer: IndexLayer, src: &dyn BoundsSource<T>) -> bool {
        let obj = self.leaf(leaf).obj;
        if self.nodes[leaf].bb.contains(&src.bounds(obj)) {
            return false;
        }

        self.nodes[leaf].bb = Self::leaf_bounds(layer, obj, src);
        let root = self.roots[layer.idx()].and_then(|root| self.subtree_remove(root, leaf));
        self.roots[layer.idx()] = Some(self.subtree_insert(root, leaf));
        self.pairs_clear(leaf);
        let stamp = self.stamp;
        self.leaf_mut(leaf).stamp = stamp;
        true
    }

    fn find_leaf(&self, layer: IndexLayer, obj: T, hash: HashValue) -> Option<NodeId> {
        self.leaves[layer.idx()]
            .find(hash, |e| e.obj == obj)
            .map(|e| e.node)
    }

    //
    // queries
    //

    fn subtree_query(&self, subtree: NodeId, bb: &AABB, f: &mut dyn FnMut(T)) {
        if !self.nodes[subtree].bb.intersects(bb) {
            return;
        }
        match self.children(subtree) {
            Some((a, b)) => {
                self.subtree_query(a, bb, f);
                self.subtree_query(b, bb, f);
            }
            None => f(self.leaf(subtree).obj),
        }
    }

    /// Visit the closer child first and skip anything beyond `t_exit`.
    fn subtree_segment_query(
        &self,
        subtree: NodeId,
        a: m::Vec2,
        b: m::Vec2,
        mut t_exit: f64,
        f: &mut dyn FnMut(T) -> f64,
    ) -> f64 {
        let Some((child_a, child_b)) = self.children(subtree) else {
            return f(self.leaf(subtree).obj);
        };
        let t_a = self.nodes[child_a].bb.segment_query(a, b);
        let t_b = self.nodes[child_b].bb.segment_query(a, b);
        let (first, t_first, second, t_second) = if t_a < t_b {
            (child_a, t_a, child_b, t_b)
        } else {
            (child_b, t_b, child_a, t_a)
        };
        if t_first < t_exit {
            t_exit = t_exit.min(self.subtree_segment_query(first, a, b, t_exit, f));
        }
        if t_second < t_exit {
            t_exit = t_exit.min(self.subtree_segment_query(second, a, b, t_exit, f));
        }
        t_exit
    }
}

impl<T: Copy + PartialEq> SpatialIndex<T> for BBTree<T> {
    fn count(&self, layer: IndexLayer) -> usize {
        self.leaves[layer.idx()].len()
    }

    fn contains(&self, layer: IndexLayer, obj: T, hash: HashValue) -> bool {
        self.leaves[layer.idx()].contains(hash, |e| e.obj == obj)
    }

    fn each(&self, layer: IndexLayer, f: &mut dyn FnMut(T)) {
        for entry in self.leaves[layer.idx()].iter() {
            f(entry.obj);
        }
    }

    fn insert(&mut self, layer: IndexLayer, obj: T, hash: HashValue, src: &dyn BoundsSource<T>) {
        if self.contains(layer, obj, hash) {
            return;
        }
        let node = self.nodes.insert(Node {
            bb: Self::leaf_bounds(layer, obj, src),
            parent: None,
            kind: NodeKind::Leaf(Leaf {
                obj,
                stamp: self.stamp,
                pairs: Vec::new(),
            }),
        });
        self.leaves[layer.idx()].insert(hash, LeafEntry { obj, node }, |e| e.obj == obj);
        let root = self.roots[layer.idx()];
        self.roots[layer.idx()] = Some(self.subtree_insert(root, node));
        self.add_pairs(node, layer);
        self.stamp += 1;
    }

    fn remove(&mut self, layer: IndexLayer, obj: T, hash: HashValue) {
        let Some(entry) = self.leaves[layer.idx()].remove(hash, |e| e.obj == obj) else {
            return;
        };
        let root = self.roots[layer.idx()].and_then(|root| self.subtree_remove(root, entry.node));
        self.roots[layer.idx()] = root;
        self.pairs_clear(entry.node);
        self.nodes.remove(entry.node);
    }

    fn reindex(&mut self, layer: IndexLayer, src: &dyn BoundsSource<T>) {
        match layer {
            IndexLayer::Active => self.reindex_query(src, &mut |_, _| {}),
            IndexLayer::Static => {
                let leaves: Vec<NodeId> = self.leaves[layer.idx()].iter().map(|e| e.node).collect();
                for leaf in leaves {
                    if self.leaf_update(leaf, layer, src) {
                        self.add_pairs(leaf, layer);
                    }
                }
                self.stamp += 1;
            }
        }
    }

    fn reindex_object(&mut self, obj: T, hash: HashValue, src: &dyn BoundsSource<T>) {
        for layer in [IndexLayer::Active, IndexLayer::Static] {
            if let Some(leaf) = self.find_leaf(layer, obj, hash) {
                if self.leaf_update(leaf, layer, src) {
                    self.add_pairs(leaf, layer);
                }
                self.stamp += 1;
                return;
            }
        }
    }

    fn reindex_query(&mut self, src: &dyn BoundsSource<T>, f: &mut dyn FnMut(T, T)) {
        let layer = IndexLayer::Active;
        if self.roots[layer.idx()].is_none() {
            return;
        }

        let leaves: Vec<NodeId> = self.leaves[layer.idx()].iter().map(|e| e.node).collect();
        for &leaf in &leaves {
            self.leaf_update(leaf, layer, src);
        }

        // visit leaves in tree order so that the `left` logic of mark_leaf_query holds
        let mut ordered = Vec::with_capacity(leaves.len());
        if let Some(root) = self.roots[layer.idx()] {
            self.collect_leaves(root, &mut ordered);
        }
        for leaf in ordered {
            self.mark_leaf(leaf, f);
        }
        self.stamp += 1;
    }

    fn query(&mut self, bb: AABB, f: &mut dyn FnMut(T)) {
        for root in self.roots.into_iter().flatten() {
            self.subtree_query(root, &bb, f);
        }
    }

    fn segment_query(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        mut t_exit: f64,
        f: &mut dyn FnMut(T) -> f64,
    ) {
        for layer in [IndexLayer::Static, IndexLayer::Active] {
            if let Some(root) = self.roots[layer.idx()] {
                t_exit = t_exit.min(self.subtree_segment_query(root, a, b, t_exit, f));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::collision::spatial_index::test_util::*;
    use itertools::assert_equal;
    use rand::{Rng, SeedableRng};

    fn boxes_in_a_row(count: usize) -> Boxes {
        Boxes {
            bbs: (0..count)
                .map(|i| {
                    let x = i as f64;
                    AABB::new(m::Vec2::new(x, 0.0), m::Vec2::new(x + 0.75, 0.75))
                })
                .collect(),
            vels: vec![m::Vec2::zero(); count],
        }
    }

    #[test]
    fn insert_and_remove_keep_structure_valid() {
        let mut tree = BBTree::new();
        let mut rng = rand::rngs::StdRng::seed_from_u64(5);
        let boxes = Boxes {
            bbs: (0..100).map(|_| random_box(&mut rng)).collect(),
            vels: vec![m::Vec2::zero(); 100],
        };
        for i in 0..100 {
            tree.insert(IndexLayer::Active, i, i as HashValue, &boxes);
        }
        // inserting twice does nothing
        tree.insert(IndexLayer::Active, 3, 3, &boxes);
        assert_eq!(tree.count(IndexLayer::Active), 100);

        for i in (0..100).step_by(2) {
            tree.remove(IndexLayer::Active, i, i as HashValue);
        }
        assert_eq!(tree.count(IndexLayer::Active), 50);
        // one branch per pair of leaves, nothing leaked
        assert_eq!(tree.nodes.len(), 50 + 49);

        // every branch box contains its children and parent links agree
        for (id, node) in tree.nodes.iter() {
            if let NodeKind::Branch { a, b } = node.kind {
                assert!(node.bb.contains(&tree.nodes[a].bb));
                assert!(node.bb.contains(&tree.nodes[b].bb));
                assert_eq!(tree.nodes[a].parent, Some(id));
                assert_eq!(tree.nodes[b].parent, Some(id));
            }
        }

        for i in (1..100).step_by(2) {
            tree.remove(IndexLayer::Active, i, i as HashValue);
        }
        assert_eq!(tree.nodes.len(), 0);
        assert!(tree.roots[0].is_none());
    }

    #[test]
    fn leaves_are_fattened_by_velocity() {
        let mut tree = BBTree::new();
        let mut boxes = boxes_in_a_row(1);
        boxes.vels[0] = m::Vec2::new(10.0, 0.0);
        tree.insert(IndexLayer::Active, 0, 0, &boxes);
        let leaf = tree.find_leaf(IndexLayer::Active, 0, 0).unwrap();
        let bb = tree.nodes[leaf].bb;
        assert!((bb.max.x - 1.75).abs() < 1e-12);
        assert!((bb.min.x + 0.075).abs() < 1e-12);

        // small movements stay inside the fat box and don't restructure the tree
        boxes.bbs[0] = AABB::new(m::Vec2::new(0.5, 0.0), m::Vec2::new(1.25, 0.75));
        tree.reindex_query(&boxes, &mut |_, _| {});
        assert_eq!(tree.nodes[leaf].bb, bb);
    }

    #[test]
    fn stored_pairs_are_reported_without_movement() {
        let mut tree = BBTree::new();
        let boxes = Boxes {
            bbs: vec![
                AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(1.0, 1.0)),
                AABB::new(m::Vec2::new(0.5, 0.5), m::Vec2::new(1.5, 1.5)),
                AABB::new(m::Vec2::new(1.2, 1.2), m::Vec2::new(2.0, 2.0)),
                AABB::new(m::Vec2::new(-5.0, -5.0), m::Vec2::new(5.0, -0.5)),
            ],
            vels: vec![m::Vec2::zero(); 4],
        };
        for i in 0..3 {
            tree.insert(IndexLayer::Active, i, i as HashValue, &boxes);
        }
        tree.insert(IndexLayer::Static, 3, 3, &boxes);

        for _ in 0..3 {
            let mut pairs = Vec::new();
            tree.reindex_query(&boxes, &mut |a, b| pairs.push(unordered(a, b)));
            pairs.sort_unstable();
            assert_equal(pairs, [(0, 1), (1, 2)]);
        }
    }

    #[test]
    fn static_leaves_pair_with_active_leaves() {
        let mut tree = BBTree::new();
        let mut boxes = Boxes {
            bbs: vec![
                AABB::new(m::Vec2::new(0.0, 0.0), m::Vec2::new(1.0, 1.0)),
                AABB::new(m::Vec2::new(-3.0, -3.0), m::Vec2::new(3.0, 0.5)),
            ],
            vels: vec![m::Vec2::zero(); 2],
        };
        tree.insert(IndexLayer::Active, 0, 0, &boxes);
        tree.insert(IndexLayer::Static, 1, 1, &boxes);

        let mut pairs = Vec::new();
        tree.reindex_query(&boxes, &mut |a, b| pairs.push(unordered(a, b)));
        assert_eq!(pairs, vec![(0, 1)]);

        // moving the static box away breaks the pair after a reindex
        boxes.bbs[1] = AABB::new(m::Vec2::new(4.0, -3.0), m::Vec2::new(10.0, 0.5));
        tree.reindex(IndexLayer::Static, &boxes);
        pairs.clear();
        tree.reindex_query(&boxes, &mut |a, b| pairs.push(unordered(a, b)));
        assert!(pairs.is_empty());

        // and moving it back restores it
        boxes.bbs[1] = AABB::new(m::Vec2::new(-3.0, -3.0), m::Vec2::new(3.0, 0.5));
        tree.reindex_object(1, 1, &boxes);
        tree.reindex_query(&boxes, &mut |a, b| pairs.push(unordered(a, b)));
        assert_eq!(pairs, vec![(0, 1)]);
    }

    #[test]
    fn segment_query_visits_near_objects_first() {
        let mut tree = BBTree::new();
        let boxes = boxes_in_a_row(32);
        for i in 0..32 {
            tree.insert(IndexLayer::Static, i, i as HashValue, &boxes);
        }
        let a = m::Vec2::new(-1.0, 0.5);
        let b = m::Vec2::new(40.0, 0.5);
        let mut visited = Vec::new();
        tree.segment_query(a, b, 1.0, &mut |i| {
            visited.push(i);
            boxes.bbs[i].segment_query(a, b)
        });
        assert_eq!(visited.first(), Some(&0));
        // far away boxes are pruned once the first one is hit
        assert!(visited.len() < 8, "visited {visited:?}");
    }

    #[test]
    fn randomized_against_brute_force() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(99);
        for _ in 0..3 {
            let mut tree = BBTree::new();
            randomized_frames(&mut tree, rng.gen());
        }
    }
}
