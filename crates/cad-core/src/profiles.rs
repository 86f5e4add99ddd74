/// Point in the sketch plane.
pub type Point2 = [f64; 2];

/// Trait for 2D signed distance fields used as extrusion and revolve profiles.
pub trait Sdf2 {
    fn evaluate(&self, point: Point2) -> f64;
}

#[inline]
fn dot2(a: Point2, b: Point2) -> f64 {
    a[0] * b[0] + a[1] * b[1]
}

#[inline]
fn length2(v: Point2) -> f64 {
    dot2(v, v).sqrt()
}

#[inline]
fn sub2(a: Point2, b: Point2) -> Point2 {
    [a[0] - b[0], a[1] - b[1]]
}

/// Circle centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Circle {
    radius: f64,
}

impl Circle {
    pub fn new(radius: f64) -> Self {
        assert!(radius >= 0.0, "circle radius must be non-negative");
        Self { radius }
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }
}

impl Sdf2 for Circle {
    #[inline]
    fn evaluate(&self, point: Point2) -> f64 {
        length2(point) - self.radius
    }
}

#[inline]
pub fn circle(radius: f64) -> Circle {
    Circle::new(radius)
}

/// Axis-aligned rectangle centered at the origin.
#[derive(Debug, Clone, Copy)]
pub struct Rect {
    half_extents: Point2,
}

impl Rect {
    pub fn new(half_extents: Point2) -> Self {
        assert!(
            half_extents[0] >= 0.0 && half_extents[1] >= 0.0,
            "rect half extents must be non-negative"
        );
        Self { half_extents }
    }

    pub fn half_extents(&self) -> Point2 {
        self.half_extents
    }
}

impl Sdf2 for Rect {
    #[inline]
    fn evaluate(&self, point: Point2) -> f64 {
        let q = [
            point[0].abs() - self.half_extents[0],
            point[1].abs() - self.half_extents[1],
        ];
        let outside = length2([q[0].max(0.0), q[1].max(0.0)]);
        let inside = q[0].max(q[1]).min(0.0);
        outside + inside
    }
}

#[inline]
pub fn rect(half_extents: Point2) -> Rect {
    Rect::new(half_extents)
}

/// Simple polygon given by its vertices in order. Winding direction does
/// not matter; self-intersecting outlines use the even-odd rule.
#[derive(Debug, Clone)]
pub struct Polygon {
    vertices: Vec<Point2>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point2>) -> Self {
        assert!(vertices.len() >= 3, "polygon needs at least 3 vertices");
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Point2] {
        &self.vertices
    }
}

impl Sdf2 for Polygon {
    fn evaluate(&self, point: Point2) -> f64 {
        let vertices = &self.vertices;
        let first = sub2(point, vertices[0]);
        let mut distance_sq = dot2(first, first);
        let mut sign = 1.0;

        let mut j = vertices.len() - 1;
        for i in 0..vertices.len() {
            let edge = sub2(vertices[j], vertices[i]);
            let w = sub2(point, vertices[i]);
            let edge_sq = dot2(edge, edge);
            if edge_sq > f64::EPSILON {
                let t = (dot2(w, edge) / edge_sq).clamp(0.0, 1.0);
                let b = [w[0] - edge[0] * t, w[1] - edge[1] * t];
                distance_sq = distance_sq.min(dot2(b, b));
            }

            let above = point[1] >= vertices[i][1];
            let below = point[1] < vertices[j][1];
            let left = edge[0] * w[1] > edge[1] * w[0];
            if (above && below && left) || (!above && !below && !left) {
                sign = -sign;
            }
            j = i;
        }

        sign * distance_sq.sqrt()
    }
}

/// Vertices of a regular polygon inscribed in a circle of `radius`, first
/// vertex on the +X axis.
pub fn regular_polygon_vertices(sides: usize, radius: f64) -> Vec<Point2> {
    (0..sides)
        .map(|index| {
            let angle = std::f64::consts::TAU * index as f64 / sides as f64;
            [radius * angle.cos(), radius * angle.sin()]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{Polygon, Sdf2, circle, rect, regular_polygon_vertices};

    #[test]
    fn circle_matches_analytical_points() {
        let sdf = circle(2.0);
        assert!((sdf.evaluate([0.0, 0.0]) + 2.0).abs() < 1e-12);
        assert!(sdf.evaluate([0.0, 2.0]).abs() < 1e-12);
        assert!((sdf.evaluate([3.0, 0.0]) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn rect_is_centered() {
        let sdf = rect([2.0, 1.0]);
        assert!((sdf.evaluate([0.0, 0.0]) + 1.0).abs() < 1e-12);
        assert!(sdf.evaluate([-2.0, 0.0]).abs() < 1e-12);
        assert!((sdf.evaluate([0.0, 3.0]) - 2.0).abs() < 1e-12);
    }

    #[test]
    fn square_polygon_matches_rect() {
        let square = Polygon::new(vec![[-1.0, -1.0], [1.0, -1.0], [1.0, 1.0], [-1.0, 1.0]]);
        let reference = rect([1.0, 1.0]);
        for point in [[0.0, 0.0], [0.5, -0.25], [2.0, 0.0], [1.5, 1.5], [-0.9, 0.9]] {
            assert!(
                (square.evaluate(point) - reference.evaluate(point)).abs() < 1e-12,
                "mismatch at {point:?}"
            );
        }
    }

    #[test]
    fn polygon_sign_ignores_winding() {
        let clockwise = Polygon::new(vec![[-1.0, -1.0], [-1.0, 1.0], [1.0, 1.0], [1.0, -1.0]]);
        assert!(clockwise.evaluate([0.0, 0.0]) < 0.0);
        assert!(clockwise.evaluate([3.0, 0.0]) > 0.0);
    }

    #[test]
    fn regular_polygon_vertices_lie_on_circle() {
        let vertices = regular_polygon_vertices(6, 10.0);
        assert_eq!(vertices.len(), 6);
        for vertex in &vertices {
            assert!(((vertex[0] * vertex[0] + vertex[1] * vertex[1]).sqrt() - 10.0).abs() < 1e-9);
        }
        assert!((vertices[0][0] - 10.0).abs() < 1e-12);
    }
}
