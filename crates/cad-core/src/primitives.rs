//! Closed-form distance functions for the solid primitives. Every primitive
//! is centered on the origin with its axis along Z; callers validate the
//! dimensions before evaluating.

pub type Point3 = [f64; 3];

/// A 3D signed distance field: negative inside, positive outside.
pub trait Sdf3 {
    fn evaluate(&self, point: Point3) -> f64;
}

/// Distance from the Z axis and the height, the half-plane every
/// rotationally symmetric primitive is evaluated in.
fn radial(point: Point3) -> [f64; 2] {
    [point[0].hypot(point[1]), point[2]]
}

/// Combines per-axis slab distances into a box-style field.
fn slab_distance<const N: usize>(excess: [f64; N]) -> f64 {
    let outside = excess
        .iter()
        .map(|d| d.max(0.0).powi(2))
        .sum::<f64>()
        .sqrt();
    let inside = excess.iter().copied().fold(f64::NEG_INFINITY, f64::max).min(0.0);
    outside + inside
}

pub fn sphere_distance(point: Point3, radius: f64) -> f64 {
    point[0].hypot(point[1]).hypot(point[2]) - radius
}

pub fn cuboid_distance(point: Point3, half_extents: Point3) -> f64 {
    slab_distance([
        point[0].abs() - half_extents[0],
        point[1].abs() - half_extents[1],
        point[2].abs() - half_extents[2],
    ])
}

pub fn cylinder_distance(point: Point3, radius: f64, half_height: f64) -> f64 {
    let [r, z] = radial(point);
    slab_distance([r - radius, z.abs() - half_height])
}

pub fn torus_distance(point: Point3, major_radius: f64, minor_radius: f64) -> f64 {
    let [r, z] = radial(point);
    (r - major_radius).hypot(z) - minor_radius
}

/// Frustum spanning z in `[-height/2, height/2]`, `bottom_radius` at the
/// lower cap. Distance in the (r, z) half-plane to the trapezoid formed by
/// the two caps and the slanted side.
pub fn cone_distance(point: Point3, bottom_radius: f64, top_radius: f64, height: f64) -> f64 {
    let [r, z] = radial(point);
    let half = height * 0.5;

    let cap_radius = if z < 0.0 { bottom_radius } else { top_radius };
    let to_cap = [r - r.min(cap_radius), z.abs() - half];

    let slope = [top_radius - bottom_radius, height];
    let slope_len_sq = slope[0] * slope[0] + slope[1] * slope[1];
    let along = if slope_len_sq <= f64::EPSILON {
        0.0
    } else {
        (((top_radius - r) * slope[0] + (half - z) * slope[1]) / slope_len_sq).clamp(0.0, 1.0)
    };
    let to_side = [
        r - top_radius + slope[0] * along,
        z - half + slope[1] * along,
    ];

    let sign = if to_side[0] < 0.0 && to_cap[1] < 0.0 {
        -1.0
    } else {
        1.0
    };
    let nearest = (to_cap[0] * to_cap[0] + to_cap[1] * to_cap[1])
        .min(to_side[0] * to_side[0] + to_side[1] * to_side[1]);
    sign * nearest.sqrt()
}

#[cfg(test)]
mod tests {
    use super::{
        cone_distance, cuboid_distance, cylinder_distance, sphere_distance, torus_distance,
    };

    fn assert_close(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() < 1e-12,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn sphere_is_exact_along_an_axis() {
        assert_close(sphere_distance([0.0, 0.0, 0.0], 1.0), -1.0);
        assert_close(sphere_distance([0.0, 3.0, 4.0], 1.0), 4.0);
    }

    #[test]
    fn cuboid_uses_half_extents() {
        let half = [1.0, 2.0, 3.0];
        assert_close(cuboid_distance([0.0, 0.0, 0.0], half), -1.0);
        assert_close(cuboid_distance([1.0, 0.0, 0.0], half), 0.0);
        assert_close(cuboid_distance([4.0, 6.0, 0.0], half), 5.0);
    }

    #[test]
    fn cylinder_caps_and_wall() {
        assert!(cylinder_distance([0.0, 0.0, 0.0], 1.0, 1.0) < 0.0);
        assert_close(cylinder_distance([0.6, 0.8, 0.0], 1.0, 1.0), 0.0);
        assert_close(cylinder_distance([0.0, 0.0, -1.0], 1.0, 1.0), 0.0);
        assert_close(cylinder_distance([0.0, 0.0, 3.0], 1.0, 1.0), 2.0);
    }

    #[test]
    fn torus_tube_is_centered_on_major_radius() {
        assert_close(torus_distance([2.0, 0.0, 0.0], 2.0, 0.5), -0.5);
        assert_close(torus_distance([0.0, 2.5, 0.0], 2.0, 0.5), 0.0);
        assert_close(torus_distance([2.0, 0.0, 1.5], 2.0, 0.5), 1.0);
    }

    #[test]
    fn cone_with_equal_radii_is_a_cylinder() {
        for point in [[1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.4, -0.2, 0.7], [2.0, 1.0, 3.0]] {
            assert_close(
                cone_distance(point, 1.0, 1.0, 2.0),
                cylinder_distance(point, 1.0, 1.0),
            );
        }
    }

    #[test]
    fn cone_narrows_towards_the_top() {
        assert!(cone_distance([1.5, 0.0, -1.9], 2.0, 0.5, 4.0) < 0.0);
        assert!(cone_distance([1.5, 0.0, 1.9], 2.0, 0.5, 4.0) > 0.0);
        assert!(cone_distance([0.0, 0.0, 1.9], 2.0, 0.0, 4.0) < 0.0);
    }
}
