//! Spatial hashing: a uniform grid of cells folded into a fixed size hash table.

use thunderdome as td;

use super::{
    spatial_index::{BoundsSource, IndexLayer, SpatialIndex},
    AABB,
};
use crate::{
    math as m,
    physics::hash_set::{next_prime, HashSet, HashValue},
};

/// Parameters for the grid of a [`SpaceHash`].
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct SpaceHashParams {
    /// Width and height of a grid cell.
    /// Should be roughly the size of a typical object.
    pub cell_size: f64,
    /// Minimum number of cells in the hash table.
    /// Rounded up to a prime number. Around ten times the number of objects is a good start.
    pub cell_count: usize,
}

impl Default for SpaceHashParams {
    fn default() -> Self {
        Self {
            cell_size: 1.0,
            cell_count: 1000,
        }
    }
}

#[derive(Debug, thiserror::Error, Clone, PartialEq)]
pub enum SpaceHashError {
    #[error("Cell size must be positive and finite, got {0}")]
    BadCellSize(f64),
    #[error("Cell count must be at least one")]
    ZeroCellCount,
}

impl SpaceHashParams {
    fn validate(&self) -> Result<(), SpaceHashError> {
        if !(self.cell_size.is_finite() && self.cell_size > 0.0) {
            return Err(SpaceHashError::BadCellSize(self.cell_size));
        }
        if self.cell_count == 0 {
            return Err(SpaceHashError::ZeroCellCount);
        }
        Ok(())
    }
}

/// A reference to an object that can be shared between several cells.
/// When the object is removed, `obj` is cleared and the handle lingers
/// in cells until the next query through them.
#[derive(Debug)]
struct Handle<T> {
    obj: Option<T>,
    retain: usize,
    stamp: u64,
}

type HandleId = td::Index;

#[derive(Clone, Copy, Debug)]
struct HandleEntry<T> {
    obj: T,
    handle: HandleId,
}

#[inline]
fn cell_hash(x: i64, y: i64, n: usize) -> usize {
    let h = (x as u64).wrapping_mul(1640531513) ^ (y as u64).wrapping_mul(2654435789);
    (h % n as u64) as usize
}

/// One layer of a space hash.
#[derive(Debug)]
struct Grid<T> {
    cell_size: f64,
    table: Vec<Vec<HandleId>>,
    handles: td::Arena<Handle<T>>,
    handle_set: HashSet<HandleEntry<T>>,
    // queries mark visited handles with this to avoid reporting objects twice
    stamp: u64,
}

impl<T: Copy + PartialEq> Grid<T> {
    fn new(params: SpaceHashParams) -> Self {
        Self {
            cell_size: params.cell_size,
            table: vec![Vec::new(); next_prime(params.cell_count)],
            handles: td::Arena::new(),
            handle_set: HashSet::new(0),
            stamp: 1,
        }
    }

    /// Range of cells a box touches, as (min x, max x, min y, max y).
    #[inline]
    fn cell_range(&self, bb: AABB) -> (i64, i64, i64, i64) {
        let dim = self.cell_size;
        (
            (bb.min.x / dim).floor() as i64,
            (bb.max.x / dim).floor() as i64,
            (bb.min.y / dim).floor() as i64,
            (bb.max.y / dim).floor() as i64,
        )
    }

    fn release(&mut self, id: HandleId) {
        if let Some(handle) = self.handles.get_mut(id) {
            handle.retain -= 1;
            if handle.retain == 0 {
                self.handles.remove(id);
            }
        }
    }

    fn clear_table(&mut self) {
        for cell in 0..self.table.len() {
            for id in std::mem::take(&mut self.table[cell]) {
                self.release(id);
            }
        }
    }

    /// Drop handles of removed objects from a cell.
    fn purge_orphans(&mut self, cell: usize) {
        let handles = &mut self.handles;
        self.table[cell].retain(|&id| {
            let orphaned = handles.get(id).map_or(true, |h| h.obj.is_none());
            if orphaned {
                if let Some(handle) = handles.get_mut(id) {
                    handle.retain -= 1;
                    if handle.retain == 0 {
                        handles.remove(id);
                    }
                }
            }
            !orphaned
        });
    }

    fn hash_handle(&mut self, id: HandleId, bb: AABB) {
        let (l, r, b, t) = self.cell_range(bb);
        let n = self.table.len();
        for i in l..=r {
            for j in b..=t {
                let cell = cell_hash(i, j, n);
                if self.table[cell].contains(&id) {
                    continue;
                }
                if let Some(handle) = self.handles.get_mut(id) {
                    handle.retain += 1;
                }
                self.table[cell].push(id);
            }
        }
    }

    fn insert(&mut self, obj: T, hash: HashValue, bb: AABB) {
        let handles = &mut self.handles;
        let entry = self.handle_set.insert_with(
            hash,
            |e| e.obj == obj,
            || HandleEntry {
                obj,
                handle: handles.insert(Handle {
                    obj: Some(obj),
                    // the handle set holds one reference
                    retain: 1,
                    stamp: 0,
                }),
            },
        );
        let id = entry.handle;
        self.hash_handle(id, bb);
    }

    fn remove(&mut self, obj: T, hash: HashValue) -> bool {
        match self.handle_set.remove(hash, |e| e.obj == obj) {
            Some(entry) => {
                if let Some(handle) = self.handles.get_mut(entry.handle) {
                    handle.obj = None;
                }
                self.release(entry.handle);
                true
            }
            None => false,
        }
    }

    fn rehash(&mut self, src: &dyn BoundsSource<T>) {
        self.clear_table();
        let entries: Vec<HandleEntry<T>> = self.handle_set.iter().copied().collect();
        for entry in entries {
            self.hash_handle(entry.handle, src.bounds(entry.obj));
        }
    }

    fn rehash_object(&mut self, obj: T, hash: HashValue, src: &dyn BoundsSource<T>) -> bool {
        if self.remove(obj, hash) {
            self.insert(obj, hash, src.bounds(obj));
            true
        } else {
            false
        }
    }

    /// Report every live object in a cell that hasn't been visited by the current query.
    fn query_cell(&mut self, cell: usize, skip: Option<T>, f: &mut dyn FnMut(T)) {
        self.purge_orphans(cell);
        for &id in &self.table[cell] {
            let Some(handle) = self.handles.get_mut(id) else {
                continue;
            };
            let Some(other) = handle.obj else {
                continue;
            };
            if handle.stamp == self.stamp || Some(other) == skip {
                continue;
            }
            handle.stamp = self.stamp;
            f(other);
        }
    }

    fn query(&mut self, skip: Option<T>, bb: AABB, f: &mut dyn FnMut(T)) {
        let (l, r, b, t) = self.cell_range(bb);
        let n = self.table.len();
        for i in l..=r {
            for j in b..=t {
                self.query_cell(cell_hash(i, j, n), skip, f);
            }
        }
        self.stamp += 1;
    }

    /// Rebuild the table, querying each object against the objects hashed before it.
    fn reindex_query(&mut self, src: &dyn BoundsSource<T>, f: &mut dyn FnMut(T, T)) {
        self.clear_table();
        let entries: Vec<HandleEntry<T>> = self.handle_set.iter().copied().collect();
        let n = self.table.len();
        for entry in entries {
            let obj = entry.obj;
            let (l, r, b, t) = self.cell_range(src.bounds(obj));
            for i in l..=r {
                for j in b..=t {
                    let cell = cell_hash(i, j, n);
                    if self.table[cell].contains(&entry.handle) {
                        continue;
                    }
                    if let Some(handle) = self.handles.get_mut(entry.handle) {
                        handle.retain += 1;
                    }
                    self.query_cell(cell, Some(obj), &mut |other| f(obj, other));
                    self.table[cell].push(entry.handle);
                }
            }
            self.stamp += 1;
        }
    }

    /// Walk the cells along the segment in order.
    fn segment_query(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        mut t_exit: f64,
        f: &mut dyn FnMut(T) -> f64,
    ) -> f64 {
        let a = a / self.cell_size;
        let b = b / self.cell_size;
        let mut cell_x = a.x.floor() as i64;
        let mut cell_y = a.y.floor() as i64;

        let (x_inc, temp_h) = if b.x > a.x {
            (1, (a.x + 1.0).floor() - a.x)
        } else {
            (-1, a.x - a.x.floor())
        };
        let (y_inc, temp_v) = if b.y > a.y {
            (1, (a.y + 1.0).floor() - a.y)
        } else {
            (-1, a.y - a.y.floor())
        };

        let dx = (b.x - a.x).abs();
        let dy = (b.y - a.y).abs();
        let dt_dx = if dx != 0.0 { 1.0 / dx } else { f64::INFINITY };
        let dt_dy = if dy != 0.0 { 1.0 / dy } else { f64::INFINITY };
        // avoid 0 * inf for segments that are axis-aligned
        let mut next_h = if temp_h != 0.0 { temp_h * dt_dx } else { dt_dx };
        let mut next_v = if temp_v != 0.0 { temp_v * dt_dy } else { dt_dy };

        let n = self.table.len();
        let mut t = 0.0;
        while t < t_exit {
            let cell = cell_hash(cell_x, cell_y, n);
            self.purge_orphans(cell);
            for &id in &self.table[cell] {
                let Some(handle) = self.handles.get_mut(id) else {
                    continue;
                };
                let Some(other) = handle.obj else {
                    continue;
                };
                if handle.stamp == self.stamp {
                    continue;
                }
                handle.stamp = self.stamp;
                t_exit = t_exit.min(f(other));
            }

            if next_v < next_h {
                cell_y += y_inc;
                t = next_v;
                next_v += dt_dy;
            } else {
                cell_x += x_inc;
                t = next_h;
                next_h += dt_dx;
            }
        }
        self.stamp += 1;
        t_exit
    }

    fn resize(&mut self, params: SpaceHashParams, src: &dyn BoundsSource<T>) {
        self.clear_table();
        self.cell_size = params.cell_size;
        self.table = vec![Vec::new(); next_prime(params.cell_count)];
        self.rehash(src);
    }
}

/// A spatial index based on a hashed uniform grid.
///
/// Objects are stored in every cell their bounding box touches.
/// Good performance requires tuning the cell size
/// to be close to the size of the objects in the index.
#[derive(Debug)]
pub struct SpaceHash<T> {
    layers: [Grid<T>; 2],
}

impl<T: Copy + PartialEq> SpaceHash<T> {
    pub fn new(params: SpaceHashParams) -> Result<Self, SpaceHashError> {
        params.validate()?;
        Ok(Self {
            layers: [Grid::new(params), Grid::new(params)],
        })
    }

    /// Change the cell size and number of cells, rehashing every object.
    pub fn resize(
        &mut self,
        params: SpaceHashParams,
        src: &dyn BoundsSource<T>,
    ) -> Result<(), SpaceHashError> {
        params.validate()?;
        for grid in &mut self.layers {
            grid.resize(params, src);
        }
        Ok(())
    }

    pub fn cell_size(&self) -> f64 {
        self.layers[0].cell_size
    }

    #[inline]
    fn layer(&self, layer: IndexLayer) -> &Grid<T> {
        &self.layers[layer.idx()]
    }

    #[inline]
    fn layer_mut(&mut self, layer: IndexLayer) -> &mut Grid<T> {
        &mut self.layers[layer.idx()]
    }
}

impl<T: Copy + PartialEq> SpatialIndex<T> for SpaceHash<T> {
    fn count(&self, layer: IndexLayer) -> usize {
        self.layer(layer).handle_set.len()
    }

    fn contains(&self, layer: IndexLayer, obj: T, hash: HashValue) -> bool {
        self.layer(layer).handle_set.contains(hash, |e| e.obj == obj)
    }

    fn each(&self, layer: IndexLayer, f: &mut dyn FnMut(T)) {
        for entry in self.layer(layer).handle_set.iter() {
            f(entry.obj);
        }
    }

    fn insert(&mut self, layer: IndexLayer, obj: T, hash: HashValue, src: &dyn BoundsSource<T>) {
        self.layer_mut(layer).insert(obj, hash, src.bounds(obj));
    }

    fn remove(&mut self, layer: IndexLayer, obj: T, hash: HashValue) {
        self.layer_mut(layer).remove(obj, hash);
    }

    fn reindex(&mut self, layer: IndexLayer, src: &dyn BoundsSource<T>) {
        self.layer_mut(layer).rehash(src);
    }

    fn reindex_object(&mut self, obj: T, hash: HashValue, src: &dyn BoundsSource<T>) {
        for grid in &mut self.layers {
            if grid.rehash_object(obj, hash, src) {
                return;
            }
        }
    }

    fn reindex_query(&mut self, src: &dyn BoundsSource<T>, f: &mut dyn FnMut(T, T)) {
        let [active, stat] = &mut self.layers;
        active.reindex_query(src, f);

        let objs: Vec<T> = active.handle_set.iter().map(|e| e.obj).collect();
        for obj in objs {
            stat.query(Some(obj), src.bounds(obj), &mut |other| f(obj, other));
        }
    }

    fn query(&mut self, bb: AABB, f: &mut dyn FnMut(T)) {
        for grid in &mut self.layers {
            grid.query(None, bb, f);
        }
    }

    fn segment_query(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        t_exit: f64,
        f: &mut dyn FnMut(T) -> f64,
    ) {
        let [active, stat] = &mut self.layers;
        let t_exit = stat.segment_query(a, b, t_exit, f);
        active.segment_query(a, b, t_exit, f);
    }
}
