//! Collision shapes attached to bodies.

use super::{collision::AABB, hash_set::HashValue, BodyKey};
use crate::math::{self as m, Vec2};

use itertools::Itertools;
use std::f64::consts::PI;

/// User-defined tag used to pick a [`CollisionHandler`][super::CollisionHandler].
pub type CollisionType = u32;
/// Shapes in the same nonzero group never collide with each other.
pub type Group = u32;
/// Bitmask of layers. Shapes only collide if they share at least one layer.
pub type Layers = u32;

pub const NO_GROUP: Group = 0;
pub const ALL_LAYERS: Layers = !0;

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ShapeError {
    #[error("a polygon needs at least 3 vertices, got {0}")]
    TooFewVertices(usize),
    #[error("polygon vertices must be convex and wound clockwise")]
    NotConvexClockwise,
}

/// Surface properties of a shape.
/// The values of two colliding shapes are multiplied together.
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct Material {
    /// Coefficient of restitution. 0 for no bounce, 1 for perfectly elastic.
    pub elasticity: f64,
    /// Coulomb friction coefficient.
    pub friction: f64,
    /// Velocity of the surface itself, used for things like conveyor belts.
    /// Only the tangential component has an effect.
    pub surface_velocity: Vec2,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            elasticity: 0.0,
            friction: 0.0,
            surface_velocity: Vec2::zero(),
        }
    }
}

/// Result of a successful segment query against a shape.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SegmentQueryInfo {
    /// Fraction along the query segment where the hit happened, between 0 and 1.
    pub t: f64,
    /// Surface normal at the hit point.
    pub normal: Vec2,
}

impl SegmentQueryInfo {
    /// The point where the hit happened.
    #[inline]
    pub fn hit_point(&self, a: Vec2, b: Vec2) -> Vec2 {
        m::lerp(a, b, self.t)
    }
}

//
// Geometry
//

#[derive(Clone, Debug)]
pub struct Circle {
    pub(crate) offset: Vec2,
    pub(crate) radius: f64,
    // world-space center, set in `update`
    pub(crate) tc: Vec2,
}

impl Circle {
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    #[inline]
    pub fn offset(&self) -> Vec2 {
        self.offset
    }

    /// Center in world space as of the last update.
    #[inline]
    pub fn world_center(&self) -> Vec2 {
        self.tc
    }

    fn update(&mut self, pos: Vec2, rot: Vec2) -> AABB {
        self.tc = pos + m::rotate(self.offset, rot);
        AABB::for_circle(self.tc, self.radius)
    }
}

/// A line segment with an optional thickness.
#[derive(Clone, Debug)]
pub struct Segment {
    pub(crate) a: Vec2,
    pub(crate) b: Vec2,
    pub(crate) n: Vec2,
    pub(crate) radius: f64,
    // world space versions of the above
    pub(crate) ta: Vec2,
    pub(crate) tb: Vec2,
    pub(crate) tn: Vec2,
    // directions to neighboring segments in a chain, zero if there is none
    pub(crate) a_tangent: Vec2,
    pub(crate) b_tangent: Vec2,
}

impl Segment {
    #[inline]
    pub fn endpoints(&self) -> (Vec2, Vec2) {
        (self.a, self.b)
    }

    #[inline]
    pub fn world_endpoints(&self) -> (Vec2, Vec2) {
        (self.ta, self.tb)
    }

    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    fn update(&mut self, pos: Vec2, rot: Vec2) -> AABB {
        self.ta = pos + m::rotate(self.a, rot);
        self.tb = pos + m::rotate(self.b, rot);
        self.tn = m::rotate(self.n, rot);
        AABB::enclosing([self.ta, self.tb]).padded(self.radius)
    }

    /// Smallest signed distance of the segment's surface along the given axis.
    #[inline]
    pub(crate) fn value_on_axis(&self, n: Vec2, d: f64) -> f64 {
        let a = n.dot(self.ta) - self.radius;
        let b = n.dot(self.tb) - self.radius;
        a.min(b) - d
    }
}

/// A line defined by a unit normal and a distance from the origin along that normal.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct SplittingPlane {
    pub n: Vec2,
    pub d: f64,
}

impl SplittingPlane {
    #[inline]
    fn compare(&self, v: Vec2) -> f64 {
        self.n.dot(v) - self.d
    }
}

/// A convex polygon with vertices wound clockwise.
#[derive(Clone, Debug)]
pub struct Poly {
    pub(crate) verts: Vec<Vec2>,
    pub(crate) axes: Vec<SplittingPlane>,
    pub(crate) t_verts: Vec<Vec2>,
    pub(crate) t_axes: Vec<SplittingPlane>,
}

impl Poly {
    fn new(verts: &[Vec2], offset: Vec2) -> Result<Self, ShapeError> {
        validate_poly(verts)?;
        Ok(Self::new_unchecked(verts, offset))
    }

    fn new_unchecked(verts: &[Vec2], offset: Vec2) -> Self {
        let verts: Vec<Vec2> = verts.iter().map(|&v| v + offset).collect();
        let axes: Vec<SplittingPlane> = verts
            .iter()
            .circular_tuple_windows()
            .map(|(&a, &b)| {
                let n = m::left_normal(b - a).normalized();
                SplittingPlane { n, d: n.dot(a) }
            })
            .collect();
        Self {
            t_verts: verts.clone(),
            t_axes: axes.clone(),
            verts,
            axes,
        }
    }

    /// Vertices in body-local coordinates.
    #[inline]
    pub fn verts(&self) -> &[Vec2] {
        &self.verts
    }

    /// Vertices in world space as of the last update.
    #[inline]
    pub fn world_verts(&self) -> &[Vec2] {
        &self.t_verts
    }

    fn update(&mut self, pos: Vec2, rot: Vec2) -> AABB {
        for (tv, &v) in self.t_verts.iter_mut().zip(&self.verts) {
            *tv = pos + m::rotate(v, rot);
        }
        for (ta, axis) in self.t_axes.iter_mut().zip(&self.axes) {
            let n = m::rotate(axis.n, rot);
            *ta = SplittingPlane {
                n,
                d: pos.dot(n) + axis.d,
            };
        }
        AABB::enclosing(self.t_verts.iter().copied())
    }

    /// Smallest signed distance of the polygon's vertices along the given axis.
    #[inline]
    pub(crate) fn value_on_axis(&self, n: Vec2, d: f64) -> f64 {
        self.t_verts
            .iter()
            .map(|v| n.dot(*v))
            .fold(f64::INFINITY, f64::min)
            - d
    }

    #[inline]
    pub(crate) fn contains_vert(&self, v: Vec2) -> bool {
        self.t_axes.iter().all(|axis| axis.compare(v) <= 0.0)
    }

    /// Like `contains_vert`, but ignores the faces facing away from `n`.
    #[inline]
    pub(crate) fn contains_vert_partial(&self, v: Vec2, n: Vec2) -> bool {
        self.t_axes
            .iter()
            .filter(|axis| axis.n.dot(n) >= 0.0)
            .all(|axis| axis.compare(v) <= 0.0)
    }
}

/// The geometric type of a shape.
///
/// The order of variants matters: narrow phase collision functions
/// are defined for pairs where the first kind is not greater than the second.
#[derive(Clone, Debug)]
pub enum ShapeKind {
    Circle(Circle),
    Segment(Segment),
    Poly(Poly),
}

impl ShapeKind {
    #[inline]
    pub(crate) fn order(&self) -> u8 {
        match self {
            ShapeKind::Circle(_) => 0,
            ShapeKind::Segment(_) => 1,
            ShapeKind::Poly(_) => 2,
        }
    }
}

//
// Shape itself
//

/// A collision shape attached to a body.
#[derive(Clone, Debug)]
pub struct Shape {
    pub(crate) body: BodyKey,
    pub(crate) kind: ShapeKind,
    pub(crate) bb: AABB,
    pub material: Material,
    pub collision_type: CollisionType,
    pub group: Group,
    pub layers: Layers,
    /// Sensors call collision handlers but never generate a physical response.
    pub sensor: bool,
    // assigned by the space when added
    pub(crate) hash_id: HashValue,
}

impl Shape {
    fn new(body: BodyKey, kind: ShapeKind) -> Self {
        Self {
            body,
            kind,
            bb: AABB::default(),
            material: Material::default(),
            collision_type: 0,
            group: NO_GROUP,
            layers: ALL_LAYERS,
            sensor: false,
            hash_id: 0,
        }
    }

    /// A circle with its center offset from the body's center of mass.
    pub fn circle(body: BodyKey, radius: f64, offset: Vec2) -> Self {
        Self::new(
            body,
            ShapeKind::Circle(Circle {
                offset,
                radius,
                tc: offset,
            }),
        )
    }

    /// A line segment between `a` and `b` with thickness `radius`.
    pub fn segment(body: BodyKey, a: Vec2, b: Vec2, radius: f64) -> Self {
        let n = m::left_normal((b - a).normalized());
        Self::new(
            body,
            ShapeKind::Segment(Segment {
                a,
                b,
                n,
                radius,
                ta: a,
                tb: b,
                tn: n,
                a_tangent: Vec2::zero(),
                b_tangent: Vec2::zero(),
            }),
        )
    }

    /// A convex polygon. Vertices must be wound clockwise.
    pub fn poly(body: BodyKey, verts: &[Vec2], offset: Vec2) -> Result<Self, ShapeError> {
        Ok(Self::new(body, ShapeKind::Poly(Poly::new(verts, offset)?)))
    }

    /// A rectangle centered on the body's center of mass.
    pub fn rect(body: BodyKey, width: f64, height: f64) -> Self {
        Self::rect_from_aabb(body, AABB::centered(width, height))
    }

    /// A rectangle covering the given box in body-local coordinates.
    pub fn rect_from_aabb(body: BodyKey, bb: AABB) -> Self {
        let verts = [
            Vec2::new(bb.min.x, bb.min.y),
            Vec2::new(bb.min.x, bb.max.y),
            Vec2::new(bb.max.x, bb.max.y),
            Vec2::new(bb.max.x, bb.min.y),
        ];
        Self::new(
            body,
            ShapeKind::Poly(Poly::new_unchecked(&verts, Vec2::zero())),
        )
    }

    //
    // builder methods
    //

    pub fn with_material(mut self, material: Material) -> Self {
        self.material = material;
        self
    }

    pub fn with_elasticity(mut self, elasticity: f64) -> Self {
        self.material.elasticity = elasticity;
        self
    }

    pub fn with_friction(mut self, friction: f64) -> Self {
        self.material.friction = friction;
        self
    }

    pub fn with_collision_type(mut self, collision_type: CollisionType) -> Self {
        self.collision_type = collision_type;
        self
    }

    pub fn with_group(mut self, group: Group) -> Self {
        self.group = group;
        self
    }

    pub fn with_layers(mut self, layers: Layers) -> Self {
        self.layers = layers;
        self
    }

    pub fn as_sensor(mut self) -> Self {
        self.sensor = true;
        self
    }

    //
    // accessors
    //

    #[inline]
    pub fn body(&self) -> BodyKey {
        self.body
    }

    #[inline]
    pub fn kind(&self) -> &ShapeKind {
        &self.kind
    }

    /// Bounding box as of the last update.
    #[inline]
    pub fn bb(&self) -> AABB {
        self.bb
    }

    #[inline]
    pub fn hash_id(&self) -> HashValue {
        self.hash_id
    }

    /// Tell a segment which points its neighbors in a chain of segments end at,
    /// so that circles sliding over the joint between them don't catch on the corner.
    /// Does nothing for other kinds of shape.
    pub fn set_segment_neighbors(&mut self, prev: Vec2, next: Vec2) {
        if let ShapeKind::Segment(seg) = &mut self.kind {
            seg.a_tangent = prev - seg.a;
            seg.b_tangent = next - seg.b;
        }
    }

    /// Move the shape's world-space geometry to the given body position and rotation
    /// and recompute its bounding box.
    pub fn update(&mut self, pos: Vec2, rot: Vec2) -> AABB {
        self.bb = match &mut self.kind {
            ShapeKind::Circle(circle) => circle.update(pos, rot),
            ShapeKind::Segment(seg) => seg.update(pos, rot),
            ShapeKind::Poly(poly) => poly.update(pos, rot),
        };
        self.bb
    }

    //
    // queries
    //

    /// Check whether a point is inside the shape.
    pub fn point_query(&self, p: Vec2) -> bool {
        match &self.kind {
            ShapeKind::Circle(circle) => (circle.tc - p).mag_sq() < circle.radius * circle.radius,
            ShapeKind::Segment(seg) => self.bb.contains_point(p) && segment_point_query(seg, p),
            ShapeKind::Poly(poly) => self.bb.contains_point(p) && poly.contains_vert(p),
        }
    }

    /// Find where a segment from `a` to `b` first hits the shape, if it does.
    pub fn segment_query(&self, a: Vec2, b: Vec2) -> Option<SegmentQueryInfo> {
        match &self.kind {
            ShapeKind::Circle(circle) => circle_segment_query(circle.tc, circle.radius, a, b),
            ShapeKind::Segment(seg) => segment_segment_query(seg, a, b),
            ShapeKind::Poly(poly) => poly_segment_query(poly, a, b),
        }
    }
}

fn segment_point_query(seg: &Segment, p: Vec2) -> bool {
    let r = seg.radius;
    // distance from the line
    let dn = seg.tn.dot(p) - seg.ta.dot(seg.tn);
    if dn.abs() - r > 0.0 {
        return false;
    }

    // position along the line
    let dir = m::right_normal(seg.tn);
    let dt = dir.dot(p);
    let dt_min = dir.dot(seg.ta);
    let dt_max = dir.dot(seg.tb);

    if dt <= dt_min {
        dt >= dt_min - r && (seg.ta - p).mag_sq() < r * r
    } else if dt < dt_max {
        true
    } else {
        dt < dt_max + r && (seg.tb - p).mag_sq() < r * r
    }
}

fn circle_segment_query(center: Vec2, r: f64, a: Vec2, b: Vec2) -> Option<SegmentQueryInfo> {
    let a = a - center;
    let b = b - center;

    let qa = a.dot(a) - 2.0 * a.dot(b) + b.dot(b);
    let qb = -2.0 * a.dot(a) + 2.0 * a.dot(b);
    let qc = a.dot(a) - r * r;

    let det = qb * qb - 4.0 * qa * qc;
    if det < 0.0 {
        return None;
    }
    let t = (-qb - det.sqrt()) / (2.0 * qa);
    if (0.0..=1.0).contains(&t) {
        Some(SegmentQueryInfo {
            t,
            normal: m::lerp(a, b, t).normalized(),
        })
    } else {
        None
    }
}

fn segment_segment_query(seg: &Segment, a: Vec2, b: Vec2) -> Option<SegmentQueryInfo> {
    let n = seg.tn;
    let r = seg.radius;
    let d = (seg.ta - a).dot(n);

    let flipped_n = if d > 0.0 { -n } else { n };
    let seg_offset = flipped_n * r - a;

    // endpoints relative to `a`, moved out by the thickness of the segment
    let seg_a = seg.ta + seg_offset;
    let seg_b = seg.tb + seg_offset;
    let delta = b - a;

    if m::cross(delta, seg_a) * m::cross(delta, seg_b) <= 0.0 {
        let d_offset = d + if d > 0.0 { -r } else { r };
        let ad = -d_offset;
        let bd = delta.dot(n) - d_offset;
        if ad * bd < 0.0 {
            return Some(SegmentQueryInfo {
                t: ad / (ad - bd),
                normal: flipped_n,
            });
        }
        None
    } else if r != 0.0 {
        // may have hit one of the rounded endcaps
        let hit_a = circle_segment_query(seg.ta, r, a, b);
        let hit_b = circle_segment_query(seg.tb, r, a, b);
        match (hit_a, hit_b) {
            (Some(ha), Some(hb)) => Some(if ha.t < hb.t { ha } else { hb }),
            (hit, None) | (None, hit) => hit,
        }
    } else {
        None
    }
}

fn poly_segment_query(poly: &Poly, a: Vec2, b: Vec2) -> Option<SegmentQueryInfo> {
    let vert_count = poly.t_verts.len();
    let mut closest: Option<SegmentQueryInfo> = None;
    for (i, axis) in poly.t_axes.iter().enumerate() {
        let n = axis.n;
        let an = a.dot(n);
        // `a` is behind this face
        if axis.d > an {
            continue;
        }
        let bn = b.dot(n);
        let t = (axis.d - an) / (bn - an);
        if !(0.0..=1.0).contains(&t) {
            continue;
        }

        let point = m::lerp(a, b, t);
        let dir = m::right_normal(n);
        let dt = dir.dot(point);
        let dt_min = dir.dot(poly.t_verts[i]);
        let dt_max = dir.dot(poly.t_verts[(i + 1) % vert_count]);
        if dt_min <= dt && dt <= dt_max && closest.map_or(true, |c| t < c.t) {
            closest = Some(SegmentQueryInfo { t, normal: n });
        }
    }
    closest
}

//
// mass properties
//

/// Check that polygon vertices are convex and wound clockwise.
pub fn validate_poly(verts: &[Vec2]) -> Result<(), ShapeError> {
    if verts.len() < 3 {
        return Err(ShapeError::TooFewVertices(verts.len()));
    }
    let convex_cw = verts
        .iter()
        .circular_tuple_windows()
        .all(|(&a, &b, &c)| m::cross(b - a, c - b) <= 0.0);
    if convex_cw {
        Ok(())
    } else {
        Err(ShapeError::NotConvexClockwise)
    }
}

/// Moment of inertia of a hollow circle with inner radius `r1` and outer radius `r2`
/// (either order works; 0 inner radius for a solid circle).
pub fn moment_for_circle(mass: f64, r1: f64, r2: f64, offset: Vec2) -> f64 {
    mass * (0.5 * (r1 * r1 + r2 * r2) + offset.mag_sq())
}

/// Moment of inertia of an infinitely thin line segment.
pub fn moment_for_segment(mass: f64, a: Vec2, b: Vec2) -> f64 {
    let offset = (a + b) * 0.5;
    mass * ((b - a).mag_sq() / 12.0 + offset.mag_sq())
}

/// Moment of inertia of a solid convex polygon.
pub fn moment_for_poly(mass: f64, verts: &[Vec2], offset: Vec2) -> f64 {
    let (numerator, denominator) = verts
        .iter()
        .map(|&v| v + offset)
        .circular_tuple_windows()
        .fold((0.0, 0.0), |(num, den), (v1, v2)| {
            let a = m::cross(v2, v1);
            let b = v1.dot(v1) + v1.dot(v2) + v2.dot(v2);
            (num + a * b, den + a)
        });
    (mass * numerator) / (6.0 * denominator)
}

/// Moment of inertia of a solid box centered on the center of mass.
pub fn moment_for_box(mass: f64, width: f64, height: f64) -> f64 {
    mass * (width * width + height * height) / 12.0
}

pub fn area_for_circle(r1: f64, r2: f64) -> f64 {
    PI * (r1 * r1 - r2 * r2).abs()
}

/// Area of a segment with rounded ends.
pub fn area_for_segment(a: Vec2, b: Vec2, radius: f64) -> f64 {
    radius * (PI * radius + 2.0 * (a - b).mag())
}

/// Area of a clockwise wound polygon.
pub fn area_for_poly(verts: &[Vec2]) -> f64 {
    let sum: f64 = verts
        .iter()
        .circular_tuple_windows()
        .map(|(&a, &b)| m::cross(a, b))
        .sum();
    -sum / 2.0
}

pub fn centroid_for_poly(verts: &[Vec2]) -> Vec2 {
    let (sum, vsum) = verts.iter().circular_tuple_windows().fold(
        (0.0, Vec2::zero()),
        |(sum, vsum), (&v1, &v2)| {
            let cross = m::cross(v1, v2);
            (sum + cross, vsum + (v1 + v2) * cross)
        },
    );
    vsum / (3.0 * sum)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Angle;
    use thunderdome as td;

    fn dummy_body() -> BodyKey {
        let mut arena = td::Arena::new();
        BodyKey(arena.insert(()))
    }

    fn square() -> [Vec2; 4] {
        [
            Vec2::new(-1.0, -1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, -1.0),
        ]
    }

    #[test]
    fn poly_validation() {
        let body = dummy_body();
        assert!(Shape::poly(body, &square(), Vec2::zero()).is_ok());

        let mut ccw = square();
        ccw.reverse();
        assert_eq!(
            Shape::poly(body, &ccw, Vec2::zero()).err(),
            Some(ShapeError::NotConvexClockwise)
        );

        let concave = [
            Vec2::new(-1.0, -1.0),
            Vec2::new(-1.0, 1.0),
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 1.0),
            Vec2::new(1.0, -1.0),
        ];
        assert_eq!(validate_poly(&concave), Err(ShapeError::NotConvexClockwise));
        assert_eq!(
            validate_poly(&square()[..2]),
            Err(ShapeError::TooFewVertices(2))
        );
    }

    #[test]
    fn poly_axes_point_outward() {
        let shape = Shape::rect(dummy_body(), 2.0, 2.0);
        let ShapeKind::Poly(poly) = shape.kind() else {
            panic!("rect should be a polygon");
        };
        let normals: Vec<Vec2> = poly.axes.iter().map(|a| a.n).collect();
        itertools::assert_equal(
            normals,
            [
                Vec2::new(-1.0, 0.0),
                Vec2::new(0.0, 1.0),
                Vec2::new(1.0, 0.0),
                Vec2::new(0.0, -1.0),
            ],
        );
        assert!(poly.axes.iter().all(|a| (a.d - 1.0).abs() < 1e-12));
    }

    #[test]
    fn point_queries() {
        let body = dummy_body();
        let rot = Angle::Deg(45.0).to_rotation();

        let mut circle = Shape::circle(body, 1.0, Vec2::new(1.0, 0.0));
        circle.update(Vec2::new(1.0, 1.0), *m::Unit::unit_x());
        assert!(circle.point_query(Vec2::new(2.0, 1.5)));
        assert!(!circle.point_query(Vec2::new(1.0, 2.0)));

        let mut rect = Shape::rect(body, 2.0, 2.0);
        rect.update(Vec2::zero(), *rot);
        // corner rotated away from the axis
        assert!(!rect.point_query(Vec2::new(0.95, 0.95)));
        assert!(rect.point_query(Vec2::new(1.3, 0.0)));

        let mut seg = Shape::segment(body, Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.5);
        seg.update(Vec2::zero(), *m::Unit::unit_x());
        assert!(seg.point_query(Vec2::new(0.0, 0.4)));
        assert!(!seg.point_query(Vec2::new(0.0, 0.6)));
        // rounded endcaps
        assert!(seg.point_query(Vec2::new(1.3, 0.0)));
        assert!(!seg.point_query(Vec2::new(1.4, 0.4)));
    }

    #[test]
    fn segment_queries() {
        let body = dummy_body();
        let ident = *m::Unit::unit_x();

        let mut circle = Shape::circle(body, 1.0, Vec2::zero());
        circle.update(Vec2::zero(), ident);
        let hit = circle
            .segment_query(Vec2::new(-3.0, 0.0), Vec2::new(1.0, 0.0))
            .expect("should hit");
        assert!((hit.t - 0.5).abs() < 1e-12);
        assert!((hit.normal - Vec2::new(-1.0, 0.0)).mag() < 1e-12);
        assert!(circle
            .segment_query(Vec2::new(-3.0, 2.0), Vec2::new(3.0, 2.0))
            .is_none());

        let mut rect = Shape::rect(body, 2.0, 2.0);
        rect.update(Vec2::zero(), ident);
        let hit = rect
            .segment_query(Vec2::new(0.0, 5.0), Vec2::new(0.0, -5.0))
            .expect("should hit");
        assert!((hit.t - 0.4).abs() < 1e-12);
        assert_eq!(hit.normal, Vec2::new(0.0, 1.0));
        assert!((hit.hit_point(Vec2::new(0.0, 5.0), Vec2::new(0.0, -5.0)).y - 1.0).abs() < 1e-12);

        let mut seg = Shape::segment(body, Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.0);
        seg.update(Vec2::zero(), ident);
        let hit = seg
            .segment_query(Vec2::new(0.5, -1.0), Vec2::new(0.5, 3.0))
            .expect("should hit");
        assert!((hit.t - 0.25).abs() < 1e-12);
        assert_eq!(hit.normal, Vec2::new(0.0, -1.0));

        let mut thick = Shape::segment(body, Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0), 0.5);
        thick.update(Vec2::zero(), ident);
        // passes by the end of the segment, clipping the rounded cap
        let hit = thick
            .segment_query(Vec2::new(3.0, 0.0), Vec2::new(-3.0, 0.0))
            .expect("should hit the endcap");
        assert!((hit.t - 0.25).abs() < 1e-12);
    }

    #[test]
    fn mass_properties() {
        let sq = square();
        assert!((area_for_poly(&sq) - 4.0).abs() < 1e-12);
        assert!(centroid_for_poly(&sq).mag() < 1e-12);
        // a polygon box agrees with the box formula
        let poly_moment = moment_for_poly(3.0, &sq, Vec2::zero());
        assert!((poly_moment - moment_for_box(3.0, 2.0, 2.0)).abs() < 1e-12);
        assert_eq!(moment_for_circle(2.0, 0.0, 1.0, Vec2::zero()), 1.0);
        assert!((area_for_circle(0.0, 1.0) - PI).abs() < 1e-12);
        assert!(
            (moment_for_segment(12.0, Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0)) - 4.0).abs()
                < 1e-12
        );
    }
}
