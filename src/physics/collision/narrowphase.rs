//! Exact collision tests between pairs of shapes.

use crate::{
    math::{self as m, Vec2},
    physics::{
        hash_set::{hash_pair, HashValue},
        shape::{Circle, Poly, Segment, Shape, ShapeKind},
    },
};

/// The most contact points a single pair of shapes can generate.
pub const MAX_CONTACTS_PER_ARBITER: usize = 10;

/// A point of contact between two shapes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Contact {
    /// Contact point in world space.
    pub point: Vec2,
    /// Unit normal pointing from the first shape towards the second.
    pub normal: Vec2,
    /// Penetration distance, negative when overlapping.
    pub dist: f64,
    /// Identifies the geometric feature that produced this contact,
    /// stable across frames as long as the same feature keeps touching.
    pub hash: HashValue,

    // solver state
    pub(crate) r1: Vec2,
    pub(crate) r2: Vec2,
    pub(crate) n_mass: f64,
    pub(crate) t_mass: f64,
    pub(crate) bounce: f64,
    pub(crate) jn_acc: f64,
    pub(crate) jt_acc: f64,
    pub(crate) j_bias: f64,
    pub(crate) bias: f64,
}

impl Contact {
    pub(crate) fn new(point: Vec2, normal: Vec2, dist: f64, hash: HashValue) -> Self {
        Self {
            point,
            normal,
            dist,
            hash,
            r1: Vec2::zero(),
            r2: Vec2::zero(),
            n_mass: 0.0,
            t_mass: 0.0,
            bounce: 0.0,
            jn_acc: 0.0,
            jt_acc: 0.0,
            j_bias: 0.0,
            bias: 0.0,
        }
    }

    /// Accumulated normal impulse from the last solve.
    #[inline]
    pub fn normal_impulse(&self) -> f64 {
        self.jn_acc
    }

    /// Accumulated friction impulse from the last solve.
    #[inline]
    pub fn tangent_impulse(&self) -> f64 {
        self.jt_acc
    }
}

/// Contact output that never grows past the maximum contact count.
/// Extra contacts overwrite the last one.
struct ContactBuffer<'a> {
    out: &'a mut Vec<Contact>,
    start: usize,
}

impl<'a> ContactBuffer<'a> {
    fn new(out: &'a mut Vec<Contact>) -> Self {
        let start = out.len();
        Self { out, start }
    }

    fn count(&self) -> usize {
        self.out.len() - self.start
    }

    fn push(&mut self, contact: Contact) {
        if self.count() < MAX_CONTACTS_PER_ARBITER {
            self.out.push(contact);
        } else if let Some(last) = self.out.last_mut() {
            *last = contact;
        }
    }
}

/// Two shapes ordered so that the first one's kind is never greater than the second's.
/// This is the only form the collision routines accept.
#[derive(Clone, Copy, Debug)]
pub struct OrderedPair<'a> {
    a: &'a Shape,
    b: &'a Shape,
}

impl<'a> OrderedPair<'a> {
    /// Order two shapes for collision.
    /// Also returns whether the shapes were swapped from the order they were given in.
    #[inline]
    pub fn new(a: &'a Shape, b: &'a Shape) -> (Self, bool) {
        if a.kind.order() <= b.kind.order() {
            (Self { a, b }, false)
        } else {
            (Self { a: b, b: a }, true)
        }
    }

    #[inline]
    pub fn shapes(&self) -> (&'a Shape, &'a Shape) {
        (self.a, self.b)
    }
}

/// Collide two shapes, appending the resulting contacts to `out`.
/// Shapes must have been updated to their current positions beforehand.
/// Returns the number of contacts generated.
pub fn collide(pair: OrderedPair<'_>, out: &mut Vec<Contact>) -> usize {
    let mut buf = ContactBuffer::new(out);
    let (a, b) = (pair.a, pair.b);
    use ShapeKind::*;
    match (&a.kind, &b.kind) {
        (Circle(c1), Circle(c2)) => circle_circle(c1, c2, &mut buf),
        (Circle(c), Segment(s)) => circle_segment(c, s, &mut buf),
        (Circle(c), Poly(p)) => circle_poly(c, p, &mut buf),
        // no collisions between segments, they're for static geometry
        (Segment(_), Segment(_)) => (),
        (Segment(s), Poly(p)) => segment_poly(s, a.hash_id, p, b.hash_id, &mut buf),
        (Poly(p1), Poly(p2)) => poly_poly(p1, a.hash_id, p2, b.hash_id, &mut buf),
        (Segment(_), Circle(_)) | (Poly(_), Circle(_)) | (Poly(_), Segment(_)) => {
            unreachable!("OrderedPair guarantees shapes are in order")
        }
    }
    buf.count()
}

//
// Individual shape pairs
//

fn circle_circle_query(p1: Vec2, p2: Vec2, r1: f64, r2: f64, hash: HashValue) -> Option<Contact> {
    let min_dist = r1 + r2;
    let delta = p2 - p1;
    let dist_sq = delta.mag_sq();
    if dist_sq >= min_dist * min_dist {
        return None;
    }

    let dist = dist_sq.sqrt();
    let safe_dist = if dist != 0.0 { dist } else { f64::INFINITY };
    let point = p1 + delta * (0.5 + (r1 - 0.5 * min_dist) / safe_dist);
    let normal = if dist != 0.0 {
        delta / dist
    } else {
        Vec2::unit_x()
    };
    Some(Contact::new(point, normal, dist - min_dist, hash))
}

fn circle_circle(c1: &Circle, c2: &Circle, out: &mut ContactBuffer) {
    if let Some(contact) = circle_circle_query(c1.tc, c2.tc, c1.radius, c2.radius, 0) {
        out.push(contact);
    }
}

fn circle_segment(circle: &Circle, seg: &Segment, out: &mut ContactBuffer) {
    let seg_delta = seg.tb - seg.ta;
    let closest_t = m::clamp01(seg_delta.dot(circle.tc - seg.ta) / seg_delta.mag_sq());
    let closest = seg.ta + seg_delta * closest_t;

    let Some(contact) = circle_circle_query(circle.tc, closest, circle.radius, seg.radius, 0) else {
        return;
    };
    // endcap collisions facing into a neighboring segment are that segment's business
    let n = contact.normal;
    let into_prev = closest_t == 0.0 && n.dot(seg.a_tangent) < 0.0;
    let into_next = closest_t == 1.0 && n.dot(seg.b_tangent) < 0.0;
    if !into_prev && !into_next {
        out.push(contact);
    }
}

fn circle_poly(circle: &Circle, poly: &Poly, out: &mut ContactBuffer) {
    // find the face with the least penetration
    let mut min = f64::NEG_INFINITY;
    let mut min_idx = 0;
    for (i, axis) in poly.t_axes.iter().enumerate() {
        let dist = axis.n.dot(circle.tc) - axis.d - circle.radius;
        if dist > 0.0 {
            return;
        } else if dist > min {
            min = dist;
            min_idx = i;
        }
    }

    let n = poly.t_axes[min_idx].n;
    let a = poly.t_verts[min_idx];
    let b = poly.t_verts[(min_idx + 1) % poly.t_verts.len()];
    let dta = m::cross(n, a);
    let dtb = m::cross(n, b);
    let dt = m::cross(n, circle.tc);

    let contact = if dt < dtb {
        circle_circle_query(circle.tc, b, circle.radius, 0.0, 0)
    } else if dt < dta {
        Some(Contact::new(
            circle.tc - n * (circle.radius + min / 2.0),
            -n,
            min,
            0,
        ))
    } else {
        circle_circle_query(circle.tc, a, circle.radius, 0.0, 0)
    };
    if let Some(contact) = contact {
        out.push(contact);
    }
}

fn segment_poly(
    seg: &Segment,
    seg_hash: HashValue,
    poly: &Poly,
    poly_hash: HashValue,
    out: &mut ContactBuffer,
) {
    let seg_d = seg.tn.dot(seg.ta);
    let min_norm = poly.value_on_axis(seg.tn, seg_d) - seg.radius;
    let min_neg = poly.value_on_axis(-seg.tn, -seg_d) - seg.radius;
    if min_neg > 0.0 || min_norm > 0.0 {
        return;
    }

    let mut poly_min = f64::NEG_INFINITY;
    let mut min_idx = 0;
    for (i, axis) in poly.t_axes.iter().enumerate() {
        let dist = seg.value_on_axis(axis.n, axis.d);
        if dist > 0.0 {
            return;
        } else if dist > poly_min {
            poly_min = dist;
            min_idx = i;
        }
    }

    let poly_n = -poly.t_axes[min_idx].n;
    // segment endpoints pushed out to the surface of its thickness
    let va = seg.ta + poly_n * seg.radius;
    let vb = seg.tb + poly_n * seg.radius;
    if poly.contains_vert(va) {
        out.push(Contact::new(va, poly_n, poly_min, hash_pair(seg_hash, 0)));
    }
    if poly.contains_vert(vb) {
        out.push(Contact::new(vb, poly_n, poly_min, hash_pair(seg_hash, 1)));
    }

    if min_norm >= poly_min || min_neg >= poly_min {
        if min_norm > min_neg {
            find_points_behind_segment(seg, poly, poly_hash, min_norm, 1.0, out);
        } else {
            find_points_behind_segment(seg, poly, poly_hash, min_neg, -1.0, out);
        }
    }

    // nothing else found, try the endpoints against the closest face's corners
    if out.count() == 0 {
        let poly_a = poly.t_verts[min_idx];
        let poly_b = poly.t_verts[(min_idx + 1) % poly.t_verts.len()];
        let endpoint_hit = [(seg.ta, poly_a), (seg.tb, poly_a), (seg.ta, poly_b), (seg.tb, poly_b)]
            .into_iter()
            .find_map(|(seg_end, corner)| {
                circle_circle_query(seg_end, corner, seg.radius, 0.0, 0)
            });
        if let Some(contact) = endpoint_hit {
            out.push(contact);
        }
    }
}

/// Polygon vertices that have gone past the segment's line,
/// within the segment's extent along its length.
fn find_points_behind_segment(
    seg: &Segment,
    poly: &Poly,
    poly_hash: HashValue,
    dist: f64,
    coef: f64,
    out: &mut ContactBuffer,
) {
    let dta = m::cross(seg.tn, seg.ta);
    let dtb = m::cross(seg.tn, seg.tb);
    let n = seg.tn * coef;
    let limit = seg.tn.dot(seg.ta) * coef + seg.radius;

    for (i, &v) in poly.t_verts.iter().enumerate() {
        if v.dot(n) < limit {
            let dt = m::cross(seg.tn, v);
            if dta >= dt && dt >= dtb {
                out.push(Contact::new(v, n, dist, hash_pair(poly_hash, i as HashValue)));
            }
        }
    }
}

/// Find the minimum separating axis of `poly` against the faces of `faces_of`.
/// Returns the index of the face and the separation along it,
/// or `None` if some face separates the polygons.
fn find_min_separating_axis(poly: &Poly, faces_of: &Poly) -> Option<(usize, f64)> {
    let mut min = f64::NEG_INFINITY;
    let mut min_idx = 0;
    for (i, axis) in faces_of.t_axes.iter().enumerate() {
        let dist = poly.value_on_axis(axis.n, axis.d);
        if dist > 0.0 {
            return None;
        } else if dist > min {
            min = dist;
            min_idx = i;
        }
    }
    Some((min_idx, min))
}

fn poly_poly(p1: &Poly, hash1: HashValue, p2: &Poly, hash2: HashValue, out: &mut ContactBuffer) {
    let Some((idx1, min1)) = find_min_separating_axis(p2, p1) else {
        return;
    };
    let Some((idx2, min2)) = find_min_separating_axis(p1, p2) else {
        return;
    };

    let (n, dist) = if min1 > min2 {
        (p1.t_axes[idx1].n, min1)
    } else {
        (-p2.t_axes[idx2].n, min2)
    };

    for (i, &v) in p1.t_verts.iter().enumerate() {
        if p2.contains_vert(v) {
            out.push(Contact::new(v, n, dist, hash_pair(hash1, i as HashValue)));
        }
    }
    for (i, &v) in p2.t_verts.iter().enumerate() {
        if p1.contains_vert(v) {
            out.push(Contact::new(v, n, dist, hash_pair(hash2, i as HashValue)));
        }
    }
    if out.count() > 0 {
        return;
    }

    // no vertex is fully inside the other polygon,
    // only test against the faces facing the collision normal
    for (i, &v) in p1.t_verts.iter().enumerate() {
        if p2.contains_vert_partial(v, -n) {
            out.push(Contact::new(v, n, dist, hash_pair(hash1, i as HashValue)));
        }
    }
    for (i, &v) in p2.t_verts.iter().enumerate() {
        if p1.contains_vert_partial(v, n) {
            out.push(Contact::new(v, n, dist, hash_pair(hash2, i as HashValue)));
        }
    }
}
