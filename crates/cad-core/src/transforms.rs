//! Point maps for evaluating transformed shapes. Each function takes a
//! world-space point into the shape's local frame.

use crate::primitives::Point3;
use crate::profiles::Point2;
use crate::shape::Axis;

/// Undoes a counter-clockwise turn of `angle` radians in the `[u, v]` plane.
fn unturn([u, v]: Point2, angle: f64) -> Point2 {
    let (sin, cos) = angle.sin_cos();
    [cos * u + sin * v, cos * v - sin * u]
}

pub fn inverse_translate(point: Point3, offset: Point3) -> Point3 {
    std::array::from_fn(|axis| point[axis] - offset[axis])
}

pub fn inverse_translate_2d(point: Point2, offset: Point2) -> Point2 {
    [point[0] - offset[0], point[1] - offset[1]]
}

pub fn inverse_rotate_2d(point: Point2, angle: f64) -> Point2 {
    unturn(point, angle)
}

/// Undoes a right-handed rotation of `angle` radians about `axis`.
pub fn inverse_rotate(point: Point3, axis: Axis, angle: f64) -> Point3 {
    let [x, y, z] = point;
    match axis {
        Axis::X => {
            let [y, z] = unturn([y, z], angle);
            [x, y, z]
        }
        Axis::Y => {
            let [z, x] = unturn([z, x], angle);
            [x, y, z]
        }
        Axis::Z => {
            let [x, y] = unturn([x, y], angle);
            [x, y, z]
        }
    }
}

/// Reflection across the plane through the origin with the given normal.
/// A zero normal leaves the point unchanged.
pub fn mirror_point(point: Point3, normal: Point3) -> Point3 {
    let length = normal[0].hypot(normal[1]).hypot(normal[2]);
    if length <= f64::EPSILON {
        return point;
    }
    let unit = normal.map(|component| component / length);
    let along: f64 = (0..3).map(|axis| point[axis] * unit[axis]).sum();
    std::array::from_fn(|axis| point[axis] - 2.0 * along * unit[axis])
}

#[cfg(test)]
mod tests {
    use std::f64::consts::FRAC_PI_2;

    use super::{
        inverse_rotate, inverse_rotate_2d, inverse_translate, inverse_translate_2d, mirror_point,
    };
    use crate::primitives::sphere_distance;
    use crate::shape::Axis;

    fn assert_near(actual: [f64; 3], expected: [f64; 3]) {
        for axis in 0..3 {
            assert!(
                (actual[axis] - expected[axis]).abs() < 1e-12,
                "expected {expected:?}, got {actual:?}"
            );
        }
    }

    #[test]
    fn translation_moves_into_local_space() {
        assert_eq!(inverse_translate([10.0, 5.0, -1.0], [2.0, 3.0, -4.0]), [8.0, 2.0, 3.0]);
        assert_eq!(inverse_translate_2d([1.0, 1.0], [0.5, 2.0]), [0.5, -1.0]);
    }

    #[test]
    fn quarter_turns_undo_right_handed_rotations() {
        // +90 degrees about X takes +Y to +Z, so the inverse maps +Z back to +Y.
        assert_near(inverse_rotate([0.0, 0.0, 1.0], Axis::X, FRAC_PI_2), [0.0, 1.0, 0.0]);
        assert_near(inverse_rotate([1.0, 0.0, 0.0], Axis::Y, FRAC_PI_2), [0.0, 0.0, 1.0]);
        assert_near(inverse_rotate([0.0, 1.0, 0.0], Axis::Z, FRAC_PI_2), [1.0, 0.0, 0.0]);

        let flat = inverse_rotate_2d([0.0, 1.0], FRAC_PI_2);
        assert!((flat[0] - 1.0).abs() < 1e-12 && flat[1].abs() < 1e-12);
    }

    #[test]
    fn rotation_preserves_distance_to_a_centered_sphere() {
        let point = [0.2, 0.8, -0.3];
        for axis in [Axis::X, Axis::Y, Axis::Z] {
            let local = inverse_rotate(point, axis, 0.7);
            assert!((sphere_distance(local, 1.0) - sphere_distance(point, 1.0)).abs() < 1e-12);
        }
    }

    #[test]
    fn mirror_reflects_across_plane() {
        assert_eq!(mirror_point([1.0, 2.0, 3.0], [0.0, 2.0, 0.0]), [1.0, -2.0, 3.0]);
        assert_eq!(mirror_point([1.0, 2.0, 3.0], [0.0; 3]), [1.0, 2.0, 3.0]);
    }
}
