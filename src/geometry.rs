//! Low-level 2D geometry used by coordinate generation and rendering.
//!
//! Everything here is plain value math on points; the delicate parts are the
//! degenerate cases (zero-length bonds, exactly collinear points), which must
//! come out deterministic rather than NaN.

/// A point on the drawing plane.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// An atom position. The z coordinate only participates in pseudo-3D
/// rotation; all layout and rendering happens in the xy plane.
#[derive(Debug, Copy, Clone, PartialEq, Default)]
pub struct Point3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Point3 {
    /// Projection onto the drawing plane.
    pub fn xy(&self) -> Point {
        Point {
            x: self.x,
            y: self.y,
        }
    }
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: Point) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }

    /// Point at parameter `t` on the segment from `self` to `other`
    /// (`t = 0` is `self`, `t = 1` is `other`).
    pub fn lerp(&self, other: Point, t: f64) -> Point {
        Point {
            x: self.x + (other.x - self.x) * t,
            y: self.y + (other.y - self.y) * t,
        }
    }

    /// Point at `distance` from `self` in direction `angle` (radians,
    /// counterclockwise from the positive x axis).
    pub fn polar(&self, angle: f64, distance: f64) -> Point {
        Point {
            x: self.x + distance * angle.cos(),
            y: self.y + distance * angle.sin(),
        }
    }
}

/// Direction of the segment `a -> b` in radians, in `(-pi, pi]`. A
/// zero-length segment points along the positive x axis.
pub fn angle(a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    if dx == 0.0 && dy == 0.0 {
        0.0
    } else {
        dy.atan2(dx)
    }
}

/// Normalize an angle into `[0, 2*pi)`.
pub fn normalize_angle(a: f64) -> f64 {
    let two_pi = std::f64::consts::TAU;
    let mut a = a % two_pi;
    if a < 0.0 {
        a += two_pi;
    }
    a
}

/// Signed side of point `p` relative to the directed line `a -> b`: positive
/// on the left, negative on the right, zero when collinear (the 2D cross
/// product of `a->b` and `a->p`).
pub fn side_of_line(a: Point, b: Point, p: Point) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

/// Endpoints of the segment parallel to `a -> b` at signed perpendicular
/// distance `d` (positive offsets to the left of the direction of travel).
///
/// A degenerate zero-length segment offsets vertically so the caller still
/// gets two distinct points instead of NaN.
pub fn find_parallel(a: Point, b: Point, d: f64) -> (Point, Point) {
    let len = a.distance(b);
    if len == 0.0 {
        let shifted = Point::new(a.x, a.y + d);
        return (shifted, shifted);
    }
    // Unit normal, left of travel direction.
    let nx = -(b.y - a.y) / len;
    let ny = (b.x - a.x) / len;
    (
        Point::new(a.x + nx * d, a.y + ny * d),
        Point::new(b.x + nx * d, b.y + ny * d),
    )
}

/// Shrink the segment `a -> b` by `amount` at each end. Segments too short
/// to shrink collapse to their midpoint rather than inverting.
pub fn shorten(a: Point, b: Point, amount: f64) -> (Point, Point) {
    let len = a.distance(b);
    if len <= 2.0 * amount {
        let mid = a.lerp(b, 0.5);
        return (mid, mid);
    }
    let t = amount / len;
    (a.lerp(b, t), a.lerp(b, 1.0 - t))
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    #[test]
    fn parallel_is_offset_perpendicularly() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(2.0, 0.0);
        let (pa, pb) = find_parallel(a, b, 0.5);
        assert!((pa.y - 0.5).abs() < EPS && (pb.y - 0.5).abs() < EPS);
        assert!((pa.x - 0.0).abs() < EPS && (pb.x - 2.0).abs() < EPS);

        let (na, _) = find_parallel(a, b, -0.5);
        assert!((na.y + 0.5).abs() < EPS);
    }

    #[test]
    fn parallel_of_degenerate_segment_is_finite() {
        let a = Point::new(1.0, 1.0);
        let (pa, pb) = find_parallel(a, a, 0.3);
        assert!(pa.x.is_finite() && pa.y.is_finite());
        assert_eq!(pa, pb);
    }

    #[test]
    fn side_signs() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        assert!(side_of_line(a, b, Point::new(0.5, 1.0)) > 0.0);
        assert!(side_of_line(a, b, Point::new(0.5, -1.0)) < 0.0);
        assert_eq!(side_of_line(a, b, Point::new(2.0, 0.0)), 0.0);
    }

    #[test]
    fn shorten_collapses_tiny_segments() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(0.1, 0.0);
        let (sa, sb) = shorten(a, b, 0.2);
        assert_eq!(sa, sb);

        let (la, lb) = shorten(a, Point::new(1.0, 0.0), 0.2);
        assert!((la.x - 0.2).abs() < EPS && (lb.x - 0.8).abs() < EPS);
    }

    #[test]
    fn normalize_angle_range() {
        assert!((normalize_angle(-std::f64::consts::PI / 2.0)
            - 1.5 * std::f64::consts::PI)
            .abs()
            < EPS);
        assert_eq!(normalize_angle(0.0), 0.0);
    }
}
