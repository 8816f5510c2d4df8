use crate::math as m;

/// An axis-aligned bounding box.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
#[cfg_attr(
    feature = "serde-types",
    derive(serde::Deserialize, serde::Serialize)
)]
pub struct AABB {
    pub min: m::Vec2,
    pub max: m::Vec2,
}

impl AABB {
    #[inline]
    pub fn new(min: m::Vec2, max: m::Vec2) -> Self {
        Self { min, max }
    }

    /// Bounding box of a circle.
    #[inline]
    pub fn for_circle(center: m::Vec2, radius: f64) -> Self {
        let r = m::Vec2::new(radius, radius);
        Self {
            min: center - r,
            max: center + r,
        }
    }

    /// Bounding box with the given extents centered on the origin.
    #[inline]
    pub fn centered(width: f64, height: f64) -> Self {
        let half = m::Vec2::new(width / 2.0, height / 2.0);
        Self {
            min: -half,
            max: half,
        }
    }

    /// Smallest bounding box containing all the given points.
    pub fn enclosing(points: impl IntoIterator<Item = m::Vec2>) -> Self {
        let mut points = points.into_iter();
        let first = points.next().unwrap_or_else(m::Vec2::zero);
        points.fold(Self::new(first, first), |bb, p| bb.expanded_to(p))
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    #[inline]
    pub fn center(&self) -> m::Vec2 {
        (self.min + self.max) * 0.5
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    #[inline]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            min: m::Vec2::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: m::Vec2::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }

    /// Area of the union of the two boxes.
    #[inline]
    pub fn merged_area(&self, other: &Self) -> f64 {
        self.union(other).area()
    }

    #[inline]
    pub fn expanded_to(&self, point: m::Vec2) -> Self {
        Self {
            min: m::Vec2::new(self.min.x.min(point.x), self.min.y.min(point.y)),
            max: m::Vec2::new(self.max.x.max(point.x), self.max.y.max(point.y)),
        }
    }

    #[inline]
    pub fn padded(&self, amount: f64) -> Self {
        let pad = m::Vec2::new(amount, amount);
        Self {
            min: self.min - pad,
            max: self.max + pad,
        }
    }

    /// Check for overlap. Boxes that touch at the edges count as overlapping.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }

    /// Check whether `other` is completely inside this box.
    #[inline]
    pub fn contains(&self, other: &Self) -> bool {
        self.min.x <= other.min.x
            && self.max.x >= other.max.x
            && self.min.y <= other.min.y
            && self.max.y >= other.max.y
    }

    #[inline]
    pub fn contains_point(&self, point: m::Vec2) -> bool {
        self.min.x <= point.x
            && self.max.x >= point.x
            && self.min.y <= point.y
            && self.max.y >= point.y
    }

    /// The point inside the box closest to `point`.
    #[inline]
    pub fn clamp_point(&self, point: m::Vec2) -> m::Vec2 {
        m::Vec2::new(
            point.x.clamp(self.min.x, self.max.x),
            point.y.clamp(self.min.y, self.max.y),
        )
    }

    /// Sum of the distances between the box centers along both axes
    /// (times two, which doesn't matter when comparing).
    #[inline]
    pub(crate) fn proximity(&self, other: &Self) -> f64 {
        (self.min.x + self.max.x - other.min.x - other.max.x).abs()
            + (self.min.y + self.max.y - other.min.y - other.max.y).abs()
    }

    /// Find the fraction along the segment from `a` to `b` where it enters this box.
    /// Returns zero if `a` is inside the box and infinity if the segment misses it.
    pub fn segment_query(&self, a: m::Vec2, b: m::Vec2) -> f64 {
        let idx = 1.0 / (b.x - a.x);
        let tx1 = if self.min.x == a.x {
            f64::NEG_INFINITY
        } else {
            (self.min.x - a.x) * idx
        };
        let tx2 = if self.max.x == a.x {
            f64::INFINITY
        } else {
            (self.max.x - a.x) * idx
        };
        let txmin = tx1.min(tx2);
        let txmax = tx1.max(tx2);

        let idy = 1.0 / (b.y - a.y);
        let ty1 = if self.min.y == a.y {
            f64::NEG_INFINITY
        } else {
            (self.min.y - a.y) * idy
        };
        let ty2 = if self.max.y == a.y {
            f64::INFINITY
        } else {
            (self.max.y - a.y) * idy
        };
        let tymin = ty1.min(ty2);
        let tymax = ty1.max(ty2);

        if tymin <= txmax && txmin <= tymax {
            let min = txmin.max(tymin);
            let max = txmax.min(tymax);
            if 0.0 <= max && min <= 1.0 {
                return min.max(0.0);
            }
        }
        f64::INFINITY
    }

    #[inline]
    pub fn intersects_segment(&self, a: m::Vec2, b: m::Vec2) -> bool {
        self.segment_query(a, b).is_finite()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::Vec2;

    fn unit_box() -> AABB {
        AABB::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0))
    }

    #[test]
    fn overlap_and_containment() {
        let bb = unit_box();
        assert!(bb.intersects(&AABB::new(Vec2::new(1.0, 0.5), Vec2::new(2.0, 2.0))));
        assert!(!bb.intersects(&AABB::new(Vec2::new(1.1, 0.5), Vec2::new(2.0, 2.0))));
        assert!(bb.contains(&AABB::new(Vec2::new(0.2, 0.2), Vec2::new(0.8, 0.9))));
        assert!(!bb.contains(&bb.padded(0.1)));
        assert!(bb.padded(0.1).contains(&bb));
        assert!(bb.contains_point(Vec2::new(1.0, 1.0)));
        assert!(!bb.contains_point(Vec2::new(1.0, 1.01)));
        assert_eq!(bb.clamp_point(Vec2::new(2.0, 0.5)), Vec2::new(1.0, 0.5));
        assert_eq!(bb.clamp_point(Vec2::new(0.2, 0.3)), Vec2::new(0.2, 0.3));
    }

    #[test]
    fn union_and_area() {
        let a = unit_box();
        let b = AABB::new(Vec2::new(2.0, -1.0), Vec2::new(3.0, 0.0));
        let u = a.union(&b);
        assert_eq!(u, AABB::new(Vec2::new(0.0, -1.0), Vec2::new(3.0, 1.0)));
        assert_eq!(a.merged_area(&b), 6.0);
        assert_eq!(u.center(), Vec2::new(1.5, 0.0));
        assert_eq!(
            AABB::enclosing([Vec2::new(1.0, 2.0), Vec2::new(-1.0, 0.5), Vec2::new(0.0, 3.0)]),
            AABB::new(Vec2::new(-1.0, 0.5), Vec2::new(1.0, 3.0))
        );
    }

    #[test]
    fn segment_queries() {
        let bb = unit_box();
        // straight through from the left
        let t = bb.segment_query(Vec2::new(-1.0, 0.5), Vec2::new(3.0, 0.5));
        assert!((t - 0.25).abs() < 1e-12);
        // starting inside
        assert_eq!(bb.segment_query(Vec2::new(0.5, 0.5), Vec2::new(3.0, 3.0)), 0.0);
        // vertical segment passing beside the box
        assert_eq!(
            bb.segment_query(Vec2::new(2.0, -1.0), Vec2::new(2.0, 3.0)),
            f64::INFINITY
        );
        // vertical segment through it
        let t = bb.segment_query(Vec2::new(0.5, -1.0), Vec2::new(0.5, 3.0));
        assert!((t - 0.25).abs() < 1e-12);
        // stops before reaching it
        assert!(!bb.intersects_segment(Vec2::new(-3.0, 0.5), Vec2::new(-1.0, 0.5)));
    }
}
