//! Point, segment, box and shape queries against the shapes in a space.

use super::Space;
use crate::{
    math as m,
    physics::{
        collision::{
            narrowphase::{self, OrderedPair},
            Contact, AABB,
        },
        shape::{Group, Layers, SegmentQueryInfo, NO_GROUP},
        Shape, ShapeKey,
    },
};

/// Whether a shape passes the layer and group filter of a query.
#[inline]
fn passes_filter(shape: &Shape, layers: Layers, group: Group) -> bool {
    shape.layers & layers != 0 && (group == NO_GROUP || shape.group != group)
}

impl Space {
    /// Call `f` for every shape that contains `point`.
    /// Only shapes sharing a layer with `layers` and not in `group` are considered.
    pub fn point_query(
        &mut self,
        point: m::Vec2,
        layers: Layers,
        group: Group,
        mut f: impl FnMut(ShapeKey, &Shape),
    ) {
        let _span = tracy_span!("point query", "point_query");
        let shapes = &self.shapes;
        self.index.point_query(point, &mut |key| {
            let Some(shape) = shapes.get(key.0) else {
                return;
            };
            if passes_filter(shape, layers, group) && shape.point_query(point) {
                f(key, shape);
            }
        });
    }

    /// Find a non-sensor shape that contains `point`.
    pub fn point_query_first(
        &mut self,
        point: m::Vec2,
        layers: Layers,
        group: Group,
    ) -> Option<ShapeKey> {
        let mut found = None;
        self.point_query(point, layers, group, |key, shape| {
            if found.is_none() && !shape.sensor {
                found = Some(key);
            }
        });
        found
    }

    /// Call `f` for every shape that the segment from `a` to `b` hits,
    /// with the fraction along the segment and the surface normal at the hit.
    pub fn segment_query(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        layers: Layers,
        group: Group,
        mut f: impl FnMut(ShapeKey, &Shape, SegmentQueryInfo),
    ) {
        let _span = tracy_span!("segment query", "segment_query");
        let shapes = &self.shapes;
        self.index.segment_query(a, b, 1.0, &mut |key| {
            if let Some(shape) = shapes.get(key.0) {
                if passes_filter(shape, layers, group) {
                    if let Some(info) = shape.segment_query(a, b) {
                        f(key, shape, info);
                    }
                }
            }
            1.0
        });
    }

    /// Find the first non-sensor shape along the segment from `a` to `b`.
    pub fn segment_query_first(
        &mut self,
        a: m::Vec2,
        b: m::Vec2,
        layers: Layers,
        group: Group,
    ) -> Option<(ShapeKey, SegmentQueryInfo)> {
        let _span = tracy_span!("segment query first", "segment_query_first");
        let shapes = &self.shapes;
        let mut closest: Option<(ShapeKey, SegmentQueryInfo)> = None;
        self.index.segment_query(a, b, 1.0, &mut |key| {
            if let Some(shape) = shapes.get(key.0) {
                if !shape.sensor && passes_filter(shape, layers, group) {
                    if let Some(info) = shape.segment_query(a, b) {
                        if closest.map_or(true, |(_, c)| info.t < c.t) {
                            closest = Some((key, info));
                        }
                    }
                }
            }
            closest.map_or(1.0, |(_, c)| c.t)
        });
        closest
    }

    /// Call `f` for every shape whose bounding box intersects `bb`.
    pub fn bb_query(
        &mut self,
        bb: AABB,
        layers: Layers,
        group: Group,
        mut f: impl FnMut(ShapeKey, &Shape),
    ) {
        let _span = tracy_span!("bounding box query", "bb_query");
        let shapes = &self.shapes;
        self.index.query(bb, &mut |key| {
            let Some(shape) = shapes.get(key.0) else {
                return;
            };
            if passes_filter(shape, layers, group) && shape.bb.intersects(&bb) {
                f(key, shape);
            }
        });
    }

    /// Call `f` for every shape in the space that overlaps `shape`,
    /// with the contacts between them. Contact normals point away from `shape`.
    ///
    /// The shape is moved to its body's current position first
    /// if the body is in this space. The shape itself is skipped if it's in the space.
    /// Returns whether any non-sensor shapes were touching.
    pub fn shape_query(
        &mut self,
        shape: &mut Shape,
        mut f: impl FnMut(ShapeKey, &[Contact]),
    ) -> bool {
        let _span = tracy_span!("shape query", "shape_query");
        if let Some(body) = self.bodies.get(shape.body.0) {
            shape.update(body.position(), *body.rotation());
        }
        let shape = &*shape;

        let shapes = &self.shapes;
        let mut contacts = std::mem::take(&mut self.contact_buffer);
        let mut any_collision = false;
        self.index.query(shape.bb, &mut |key| {
            let Some(other) = shapes.get(key.0) else {
                return;
            };
            if (shape.hash_id != 0 && shape.hash_id == other.hash_id)
                || (shape.group != NO_GROUP && shape.group == other.group)
                || shape.layers & other.layers == 0
                || !shape.bb.intersects(&other.bb)
            {
                return;
            }

            contacts.clear();
            let (pair, swapped) = OrderedPair::new(shape, other);
            if narrowphase::collide(pair, &mut contacts) == 0 {
                return;
            }
            if swapped {
                for con in &mut contacts {
                    con.normal = -con.normal;
                }
            }
            any_collision |= !(shape.sensor || other.sensor);
            f(key, &contacts);
        });
        contacts.clear();
        self.contact_buffer = contacts;
        any_collision
    }

    /// Wake up every body with a shape touching the given shape.
    pub(crate) fn activate_shapes_touching(&mut self, key: ShapeKey) {
        if self.sleeping_components.is_empty() {
            return;
        }
        let Some(mut shape) = self.shapes.get(key.0).cloned() else {
            return;
        };
        let mut touching = Vec::new();
        self.shape_query(&mut shape, |other, _| touching.push(other));
        for other in touching {
            if let Some(body) = self.shapes.get(other.0).map(|s| s.body) {
                self.activate_body(body);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{Body, SpaceParams};
    use itertools::assert_equal;

    /// A row of unit boxes along the x axis, the middle one a sensor
    /// and the last one in group 5.
    fn boxes() -> (Space, Vec<ShapeKey>) {
        let mut space = Space::new(SpaceParams::default());
        let static_body = space.static_body();
        let mut keys = Vec::new();
        for i in 0..5 {
            let x = i as f64 * 2.0;
            let mut shape = Shape::rect_from_aabb(
                static_body,
                AABB::new(m::Vec2::new(x - 0.5, -0.5), m::Vec2::new(x + 0.5, 0.5)),
            );
            if i == 2 {
                shape = shape.as_sensor();
            }
            if i == 4 {
                shape = shape.with_group(5).with_layers(0b10);
            }
            keys.push(space.add_shape(shape));
        }
        (space, keys)
    }

    #[test]
    fn point_queries() {
        let (mut space, keys) = boxes();
        let mut hits = Vec::new();
        space.point_query(m::Vec2::new(2.2, 0.1), !0, NO_GROUP, |k, _| hits.push(k));
        assert_equal(hits, [keys[1]]);

        assert_eq!(space.point_query_first(m::Vec2::new(4.0, 0.0), !0, NO_GROUP), None);
        assert_eq!(
            space.point_query_first(m::Vec2::new(8.0, 0.0), !0, NO_GROUP),
            Some(keys[4])
        );
        assert_eq!(space.point_query_first(m::Vec2::new(8.0, 0.0), 0b01, NO_GROUP), None);
        assert_eq!(space.point_query_first(m::Vec2::new(8.0, 0.0), !0, 5), None);
        assert_eq!(space.point_query_first(m::Vec2::new(1.0, 0.0), !0, NO_GROUP), None);
    }

    #[test]
    fn segment_queries() {
        let (mut space, keys) = boxes();
        let (a, b) = (m::Vec2::new(-2.0, 0.0), m::Vec2::new(10.0, 0.0));

        let mut hits = Vec::new();
        space.segment_query(a, b, !0, NO_GROUP, |k, _, info| hits.push((k, info.t)));
        hits.sort_by(|x, y| x.1.total_cmp(&y.1));
        assert_equal(hits.iter().map(|(k, _)| *k), keys.iter().copied());

        let (first, info) = space
            .segment_query_first(a, b, !0, NO_GROUP)
            .expect("hits the first box");
        assert_eq!(first, keys[0]);
        assert!((info.t - 1.5 / 12.0).abs() < 1e-9);
        assert!((info.normal - m::Vec2::new(-1.0, 0.0)).mag() < 1e-9);

        // sensors are skipped
        let (first, _) = space
            .segment_query_first(m::Vec2::new(3.0, 0.0), b, !0, NO_GROUP)
            .expect("hits the fourth box");
        assert_eq!(first, keys[3]);

        assert!(space
            .segment_query_first(m::Vec2::new(-2.0, 2.0), m::Vec2::new(10.0, 2.0), !0, NO_GROUP)
            .is_none());
    }

    #[test]
    fn bb_queries() {
        let (mut space, keys) = boxes();
        let mut hits = Vec::new();
        space.bb_query(
            AABB::new(m::Vec2::new(1.0, -1.0), m::Vec2::new(4.5, 1.0)),
            !0,
            NO_GROUP,
            |k, _| hits.push(k),
        );
        hits.sort_by_key(|k| keys.iter().position(|x| x == k));
        assert_equal(hits, [keys[1], keys[2]]);
    }

    #[test]
    fn shape_query_normals_point_outward() {
        let (mut space, keys) = boxes();
        let body = space.add_body(Body::new(1.0, 1.0).with_position(m::Vec2::new(2.0, 0.9)));
        let mut probe = Shape::circle(body, 0.5, m::Vec2::zero());

        let mut hits = Vec::new();
        let any = space.shape_query(&mut probe, |k, contacts| {
            hits.push((k, contacts.to_vec()));
        });
        assert!(any);
        assert_eq!(hits.len(), 1);
        let (key, contacts) = &hits[0];
        assert_eq!(*key, keys[1]);
        assert_eq!(contacts.len(), 1);
        // from the circle above down into the box
        assert!((contacts[0].normal - m::Vec2::new(0.0, -1.0)).mag() < 1e-9);
        assert!((contacts[0].dist + 0.1).abs() < 1e-9);

        // touching only a sensor doesn't count as a collision
        let mut probe = Shape::circle(body, 0.5, m::Vec2::zero());
        if let Some(b) = space.body_mut(body) {
            b.set_position(m::Vec2::new(4.0, 0.9));
        }
        let mut count = 0;
        assert!(!space.shape_query(&mut probe, |_, _| count += 1));
        assert_eq!(count, 1);
    }
}
