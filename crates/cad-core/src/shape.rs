use std::error::Error;
use std::f64::consts::TAU;
use std::fmt;

use crate::bounds::Aabb;
use crate::operations::{difference, extrude, intersection, offset, union};
use crate::primitives::{
    Point3, Sdf3, cone_distance, cuboid_distance, cylinder_distance, sphere_distance,
    torus_distance,
};
use crate::profiles::{Circle, Point2, Polygon, Rect, Sdf2, regular_polygon_vertices};
use crate::transforms::{
    inverse_rotate, inverse_rotate_2d, inverse_translate, inverse_translate_2d, mirror_point,
};

/// Rejected geometry parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryError {
    message: String,
}

impl GeometryError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for GeometryError {}

fn require_positive(value: f64, label: &str) -> Result<f64, GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::new(format!("{label} must be a finite number")));
    }
    if value <= 0.0 {
        return Err(GeometryError::new(format!("{label} must be positive")));
    }
    Ok(value)
}

fn require_non_negative(value: f64, label: &str) -> Result<f64, GeometryError> {
    if !value.is_finite() {
        return Err(GeometryError::new(format!("{label} must be a finite number")));
    }
    if value < 0.0 {
        return Err(GeometryError::new(format!("{label} must be non-negative")));
    }
    Ok(value)
}

fn require_finite(value: f64, label: &str) -> Result<f64, GeometryError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(GeometryError::new(format!("{label} must be a finite number")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
    Z,
}

/// A closed 2D region in the XY sketch plane.
#[derive(Debug, Clone)]
pub enum Profile {
    Circle(Circle),
    Rect(Rect),
    Polygon(Polygon),
    Union(Box<Profile>, Box<Profile>),
    Difference(Box<Profile>, Box<Profile>),
    Intersection(Box<Profile>, Box<Profile>),
    Translate { shape: Box<Profile>, offset: Point2 },
    Rotate { shape: Box<Profile>, angle: f64 },
    Scale { shape: Box<Profile>, factor: f64 },
    Offset { shape: Box<Profile>, amount: f64 },
    Polar { shape: Box<Profile>, count: usize },
}

impl Profile {
    pub fn circle(radius: f64) -> Result<Self, GeometryError> {
        let radius = require_positive(radius, "circle radius")?;
        Ok(Profile::Circle(Circle::new(radius)))
    }

    /// Regular polygon with `sides` vertices on a circle of `radius`.
    pub fn regular_polygon(sides: usize, radius: f64) -> Result<Self, GeometryError> {
        if sides < 3 {
            return Err(GeometryError::new("polygon segment count must be at least 3"));
        }
        let radius = require_positive(radius, "polygon radius")?;
        Ok(Profile::Polygon(Polygon::new(regular_polygon_vertices(
            sides, radius,
        ))))
    }

    /// Rectangle of the given width (X) and height (Y), centered.
    pub fn rect(width: f64, height: f64) -> Result<Self, GeometryError> {
        let width = require_positive(width, "square width")?;
        let height = require_positive(height, "square height")?;
        Ok(Profile::Rect(Rect::new([width * 0.5, height * 0.5])))
    }

    pub fn polygon(points: Vec<Point2>) -> Result<Self, GeometryError> {
        if points.len() < 3 {
            return Err(GeometryError::new("polygon needs at least 3 points"));
        }
        for point in &points {
            require_finite(point[0], "polygon coordinate")?;
            require_finite(point[1], "polygon coordinate")?;
        }
        let twice_area: f64 = points
            .iter()
            .zip(points.iter().cycle().skip(1))
            .map(|(a, b)| a[0] * b[1] - b[0] * a[1])
            .sum();
        if twice_area.abs() <= f64::EPSILON {
            return Err(GeometryError::new("polygon has zero area"));
        }
        Ok(Profile::Polygon(Polygon::new(points)))
    }

    pub fn union(self, other: Profile) -> Profile {
        Profile::Union(Box::new(self), Box::new(other))
    }

    pub fn difference(self, other: Profile) -> Profile {
        Profile::Difference(Box::new(self), Box::new(other))
    }

    pub fn intersection(self, other: Profile) -> Profile {
        Profile::Intersection(Box::new(self), Box::new(other))
    }

    pub fn translated(self, x: f64, y: f64) -> Result<Profile, GeometryError> {
        Ok(Profile::Translate {
            shape: Box::new(self),
            offset: [require_finite(x, "offset x")?, require_finite(y, "offset y")?],
        })
    }

    /// Rotation about the origin, counter-clockwise, in radians.
    pub fn rotated(self, angle: f64) -> Result<Profile, GeometryError> {
        Ok(Profile::Rotate {
            shape: Box::new(self),
            angle: require_finite(angle, "rotation angle")?,
        })
    }

    pub fn scaled(self, factor: f64) -> Result<Profile, GeometryError> {
        Ok(Profile::Scale {
            shape: Box::new(self),
            factor: require_positive(factor, "scale factor")?,
        })
    }

    pub fn offset(self, amount: f64) -> Result<Profile, GeometryError> {
        Ok(Profile::Offset {
            shape: Box::new(self),
            amount: require_finite(amount, "offset distance")?,
        })
    }

    /// `count` copies evenly spaced around the origin.
    pub fn polar(self, count: usize) -> Result<Profile, GeometryError> {
        if count == 0 {
            return Err(GeometryError::new("polar count must be at least 1"));
        }
        Ok(Profile::Polar {
            shape: Box::new(self),
            count,
        })
    }

    /// Bounds in the XY plane; Z is always zero.
    pub fn bounds(&self) -> Aabb {
        match self {
            Profile::Circle(circle) => {
                let r = circle.radius();
                Aabb::symmetric([r, r, 0.0])
            }
            Profile::Rect(rect) => {
                let half = rect.half_extents();
                Aabb::symmetric([half[0], half[1], 0.0])
            }
            Profile::Polygon(polygon) => {
                let mut bounds = Aabb::new(
                    [f64::INFINITY, f64::INFINITY, 0.0],
                    [f64::NEG_INFINITY, f64::NEG_INFINITY, 0.0],
                );
                for vertex in polygon.vertices() {
                    let point = [vertex[0], vertex[1], 0.0];
                    bounds = bounds.union(&Aabb::new(point, point));
                }
                bounds
            }
            Profile::Union(a, b) => a.bounds().union(&b.bounds()),
            Profile::Difference(a, _) => a.bounds(),
            Profile::Intersection(a, b) => a.bounds().intersection(&b.bounds()),
            Profile::Translate { shape, offset } => {
                shape.bounds().translated([offset[0], offset[1], 0.0])
            }
            Profile::Rotate { shape, angle } => shape
                .bounds()
                .mapped(|corner| inverse_rotate(corner, Axis::Z, -angle)),
            Profile::Scale { shape, factor } => shape.bounds().scaled(*factor),
            Profile::Offset { shape, amount } => {
                let bounds = shape.bounds();
                let grow = amount.max(0.0);
                Aabb::new(
                    [bounds.min[0] - grow, bounds.min[1] - grow, 0.0],
                    [bounds.max[0] + grow, bounds.max[1] + grow, 0.0],
                )
            }
            Profile::Polar { shape, .. } => shape.bounds().revolved_about_z(),
        }
    }
}

impl Sdf2 for Profile {
    fn evaluate(&self, point: Point2) -> f64 {
        match self {
            Profile::Circle(circle) => circle.evaluate(point),
            Profile::Rect(rect) => rect.evaluate(point),
            Profile::Polygon(polygon) => polygon.evaluate(point),
            Profile::Union(a, b) => union(a.evaluate(point), b.evaluate(point)),
            Profile::Difference(a, b) => difference(a.evaluate(point), b.evaluate(point)),
            Profile::Intersection(a, b) => intersection(a.evaluate(point), b.evaluate(point)),
            Profile::Translate { shape, offset } => {
                shape.evaluate(inverse_translate_2d(point, *offset))
            }
            Profile::Rotate { shape, angle } => shape.evaluate(inverse_rotate_2d(point, *angle)),
            Profile::Scale { shape, factor } => {
                shape.evaluate([point[0] / factor, point[1] / factor]) * factor
            }
            Profile::Offset { shape, amount } => offset(shape.evaluate(point), *amount),
            Profile::Polar { shape, count } => (0..*count)
                .map(|index| {
                    let angle = TAU * index as f64 / *count as f64;
                    shape.evaluate(inverse_rotate_2d(point, angle))
                })
                .fold(f64::INFINITY, f64::min),
        }
    }
}

/// A closed 3D solid. This is the exportable kind of geometry.
#[derive(Debug, Clone)]
pub enum Solid {
    Sphere {
        radius: f64,
    },
    Cuboid {
        half_extents: Point3,
    },
    Cylinder {
        radius: f64,
        half_height: f64,
    },
    Cone {
        radius1: f64,
        radius2: f64,
        height: f64,
    },
    Torus {
        major_radius: f64,
        minor_radius: f64,
    },
    Extrude {
        profile: Box<Profile>,
        height: f64,
        top_scale: f64,
    },
    Revolve {
        profile: Box<Profile>,
    },
    Union(Box<Solid>, Box<Solid>),
    Difference(Box<Solid>, Box<Solid>),
    Intersection(Box<Solid>, Box<Solid>),
    Translate {
        shape: Box<Solid>,
        offset: Point3,
    },
    Rotate {
        shape: Box<Solid>,
        axis: Axis,
        angle: f64,
    },
    Scale {
        shape: Box<Solid>,
        factor: f64,
    },
    Mirror {
        shape: Box<Solid>,
        normal: Point3,
    },
    Polar {
        shape: Box<Solid>,
        count: usize,
    },
}

impl Solid {
    pub fn sphere(radius: f64) -> Result<Self, GeometryError> {
        Ok(Solid::Sphere {
            radius: require_positive(radius, "sphere radius")?,
        })
    }

    /// Box of the given size, centered at the origin.
    pub fn cuboid(width: f64, depth: f64, height: f64) -> Result<Self, GeometryError> {
        Ok(Solid::Cuboid {
            half_extents: [
                require_positive(width, "cube width")? * 0.5,
                require_positive(depth, "cube depth")? * 0.5,
                require_positive(height, "cube height")? * 0.5,
            ],
        })
    }

    /// Z-aligned cylinder centered at the origin.
    pub fn cylinder(height: f64, radius: f64) -> Result<Self, GeometryError> {
        Ok(Solid::Cylinder {
            radius: require_positive(radius, "cylinder radius")?,
            half_height: require_positive(height, "cylinder height")? * 0.5,
        })
    }

    /// Z-aligned truncated cone; `radius1` at the bottom, `radius2` at the top.
    pub fn cone(height: f64, radius1: f64, radius2: f64) -> Result<Self, GeometryError> {
        let radius1 = require_non_negative(radius1, "cone r1")?;
        let radius2 = require_non_negative(radius2, "cone r2")?;
        if radius1 <= 0.0 && radius2 <= 0.0 {
            return Err(GeometryError::new("cone needs a positive radius"));
        }
        Ok(Solid::Cone {
            radius1,
            radius2,
            height: require_positive(height, "cone height")?,
        })
    }

    pub fn torus(major_radius: f64, minor_radius: f64) -> Result<Self, GeometryError> {
        Ok(Solid::Torus {
            major_radius: require_positive(major_radius, "torus major radius")?,
            minor_radius: require_positive(minor_radius, "torus minor radius")?,
        })
    }

    /// Linear extrusion from z = 0 to z = `height`, optionally tapering the
    /// profile to `top_scale` at the top.
    pub fn extrude(profile: Profile, height: f64, top_scale: f64) -> Result<Self, GeometryError> {
        Ok(Solid::Extrude {
            profile: Box::new(profile),
            height: require_positive(height, "extrude height")?,
            top_scale: require_non_negative(top_scale, "extrude scale")?,
        })
    }

    /// Spins the profile around the Z axis; profile X becomes the radius and
    /// profile Y becomes Z.
    pub fn revolve(profile: Profile) -> Self {
        Solid::Revolve {
            profile: Box::new(profile),
        }
    }

    pub fn union(self, other: Solid) -> Solid {
        Solid::Union(Box::new(self), Box::new(other))
    }

    pub fn difference(self, other: Solid) -> Solid {
        Solid::Difference(Box::new(self), Box::new(other))
    }

    pub fn intersection(self, other: Solid) -> Solid {
        Solid::Intersection(Box::new(self), Box::new(other))
    }

    pub fn translated(self, offset: Point3) -> Result<Solid, GeometryError> {
        for value in offset {
            require_finite(value, "offset")?;
        }
        Ok(Solid::Translate {
            shape: Box::new(self),
            offset,
        })
    }

    /// Rotation about a principal axis, right-handed, in radians.
    pub fn rotated(self, axis: Axis, angle: f64) -> Result<Solid, GeometryError> {
        Ok(Solid::Rotate {
            shape: Box::new(self),
            axis,
            angle: require_finite(angle, "rotation angle")?,
        })
    }

    pub fn scaled(self, factor: f64) -> Result<Solid, GeometryError> {
        Ok(Solid::Scale {
            shape: Box::new(self),
            factor: require_positive(factor, "scale factor")?,
        })
    }

    /// Reflection across the plane through the origin with the given normal.
    pub fn mirrored(self, normal: Point3) -> Result<Solid, GeometryError> {
        for value in normal {
            require_finite(value, "mirror normal")?;
        }
        if normal.iter().all(|v| v.abs() <= f64::EPSILON) {
            return Err(GeometryError::new("mirror normal must be non-zero"));
        }
        Ok(Solid::Mirror {
            shape: Box::new(self),
            normal,
        })
    }

    /// `count` copies evenly spaced around the Z axis.
    pub fn polar(self, count: usize) -> Result<Solid, GeometryError> {
        if count == 0 {
            return Err(GeometryError::new("polar count must be at least 1"));
        }
        Ok(Solid::Polar {
            shape: Box::new(self),
            count,
        })
    }

    /// Conservative axis-aligned bounds of the solid.
    pub fn bounds(&self) -> Aabb {
        match self {
            Solid::Sphere { radius } => Aabb::symmetric([*radius, *radius, *radius]),
            Solid::Cuboid { half_extents } => Aabb::symmetric(*half_extents),
            Solid::Cylinder {
                radius,
                half_height,
            } => Aabb::symmetric([*radius, *radius, *half_height]),
            Solid::Cone {
                radius1,
                radius2,
                height,
            } => {
                let r = radius1.max(*radius2);
                Aabb::symmetric([r, r, height * 0.5])
            }
            Solid::Torus {
                major_radius,
                minor_radius,
            } => {
                let r = major_radius + minor_radius;
                Aabb::symmetric([r, r, *minor_radius])
            }
            Solid::Extrude {
                profile,
                height,
                top_scale,
            } => {
                let base = profile.bounds();
                let flat = base.union(&base.scaled(*top_scale));
                Aabb::new(
                    [flat.min[0], flat.min[1], 0.0],
                    [flat.max[0], flat.max[1], *height],
                )
            }
            Solid::Revolve { profile } => {
                let section = profile.bounds();
                let r = section.min[0].abs().max(section.max[0].abs());
                Aabb::new([-r, -r, section.min[1]], [r, r, section.max[1]])
            }
            Solid::Union(a, b) => a.bounds().union(&b.bounds()),
            Solid::Difference(a, _) => a.bounds(),
            Solid::Intersection(a, b) => a.bounds().intersection(&b.bounds()),
            Solid::Translate { shape, offset } => shape.bounds().translated(*offset),
            Solid::Rotate { shape, axis, angle } => {
                shape.bounds().mapped(|corner| inverse_rotate(corner, *axis, -angle))
            }
            Solid::Scale { shape, factor } => shape.bounds().scaled(*factor),
            Solid::Mirror { shape, normal } => {
                shape.bounds().mapped(|corner| mirror_point(corner, *normal))
            }
            Solid::Polar { shape, .. } => shape.bounds().revolved_about_z(),
        }
    }
}


impl Sdf3 for Solid {
    fn evaluate(&self, point: Point3) -> f64 {
        match self {
            Solid::Sphere { radius } => sphere_distance(point, *radius),
            Solid::Cuboid { half_extents } => cuboid_distance(point, *half_extents),
            Solid::Cylinder {
                radius,
                half_height,
            } => cylinder_distance(point, *radius, *half_height),
            Solid::Cone {
                radius1,
                radius2,
                height,
            } => cone_distance(point, *radius1, *radius2, *height),
            Solid::Torus {
                major_radius,
                minor_radius,
            } => torus_distance(point, *major_radius, *minor_radius),
            Solid::Extrude {
                profile,
                height,
                top_scale,
            } => {
                let t = (point[2] / height).clamp(0.0, 1.0);
                let s = 1.0 + (top_scale - 1.0) * t;
                let section = if s > 1e-9 {
                    profile.evaluate([point[0] / s, point[1] / s]) * s
                } else {
                    (point[0] * point[0] + point[1] * point[1]).sqrt()
                };
                extrude(section, point[2], *height)
            }
            Solid::Revolve { profile } => {
                let radial = (point[0] * point[0] + point[1] * point[1]).sqrt();
                profile.evaluate([radial, point[2]])
            }
            Solid::Union(a, b) => union(a.evaluate(point), b.evaluate(point)),
            Solid::Difference(a, b) => difference(a.evaluate(point), b.evaluate(point)),
            Solid::Intersection(a, b) => intersection(a.evaluate(point), b.evaluate(point)),
            Solid::Translate { shape, offset } => {
                shape.evaluate(inverse_translate(point, *offset))
            }
            Solid::Rotate { shape, axis, angle } => {
                shape.evaluate(inverse_rotate(point, *axis, *angle))
            }
            Solid::Scale { shape, factor } => {
                let local = [point[0] / factor, point[1] / factor, point[2] / factor];
                shape.evaluate(local) * factor
            }
            Solid::Mirror { shape, normal } => shape.evaluate(mirror_point(point, *normal)),
            Solid::Polar { shape, count } => (0..*count)
                .map(|index| {
                    let angle = TAU * index as f64 / *count as f64;
                    shape.evaluate(inverse_rotate(point, Axis::Z, angle))
                })
                .fold(f64::INFINITY, f64::min),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::primitives::Sdf3;
    use crate::profiles::Sdf2;

    use super::{Axis, Profile, Solid};

    fn assert_close(actual: f64, expected: f64, eps: f64) {
        assert!(
            (actual - expected).abs() <= eps,
            "expected {expected}, got {actual}, eps={eps}"
        );
    }

    #[test]
    fn annulus_extrusion_is_hollow() {
        let outer = Profile::circle(10.0).expect("outer circle should build");
        let inner = Profile::circle(5.0).expect("inner circle should build");
        let ring = outer.difference(inner);
        let solid = Solid::extrude(ring, 5.0, 1.0).expect("extrusion should build");

        assert!(solid.evaluate([7.5, 0.0, 2.5]) < 0.0);
        assert!(solid.evaluate([0.0, 0.0, 2.5]) > 0.0);
        assert!(solid.evaluate([7.5, 0.0, 6.0]) > 0.0);

        let bounds = solid.bounds();
        assert_eq!(bounds.min, [-10.0, -10.0, 0.0]);
        assert_eq!(bounds.max, [10.0, 10.0, 5.0]);
    }

    #[test]
    fn tapered_extrusion_narrows_to_top_scale() {
        let base = Profile::circle(10.0).expect("circle should build");
        let cone = Solid::extrude(base, 15.0, 0.05).expect("extrusion should build");
        assert!(cone.evaluate([9.0, 0.0, 0.5]) < 0.0);
        assert!(cone.evaluate([9.0, 0.0, 14.0]) > 0.0);
        assert!(cone.evaluate([0.0, 0.0, 14.0]) < 0.0);
    }

    #[test]
    fn regular_polygon_circle_is_hexagon() {
        let hex = Profile::regular_polygon(6, 10.0).expect("hexagon should build");
        assert_close(hex.evaluate([10.0, 0.0]), 0.0, 1e-9);
        let apothem = 10.0 * (std::f64::consts::PI / 6.0).cos();
        assert_close(hex.evaluate([0.0, apothem]), 0.0, 1e-9);
    }

    #[test]
    fn polar_array_places_copies_around_origin() {
        let tooth = Profile::rect(2.0, 2.0)
            .and_then(|p| p.translated(10.0, 0.0))
            .and_then(|p| p.polar(4))
            .expect("polar array should build");
        assert!(tooth.evaluate([10.0, 0.0]) < 0.0);
        assert!(tooth.evaluate([0.0, 10.0]) < 0.0);
        assert!(tooth.evaluate([-10.0, 0.0]) < 0.0);
        assert!(tooth.evaluate([7.07, 7.07]) > 0.0);
    }

    #[test]
    fn rotation_and_translation_move_bounds() {
        let bar = Solid::cuboid(10.0, 2.0, 2.0)
            .and_then(|s| s.rotated(Axis::Z, std::f64::consts::FRAC_PI_2))
            .and_then(|s| s.translated([0.0, 0.0, 5.0]))
            .expect("transforms should build");
        let bounds = bar.bounds();
        assert_close(bounds.max[1], 5.0, 1e-9);
        assert_close(bounds.max[0], 1.0, 1e-9);
        assert_close(bounds.min[2], 4.0, 1e-9);
        assert!(bar.evaluate([0.0, 4.0, 5.0]) < 0.0);
        assert!(bar.evaluate([4.0, 0.0, 5.0]) > 0.0);
    }

    #[test]
    fn revolve_turns_offset_square_into_ring() {
        let section = Profile::rect(2.0, 2.0)
            .and_then(|p| p.translated(5.0, 0.0))
            .expect("section should build");
        let ring = Solid::revolve(section);
        assert!(ring.evaluate([0.0, 5.0, 0.0]) < 0.0);
        assert!(ring.evaluate([0.0, 0.0, 0.0]) > 0.0);
        assert_close(ring.bounds().max[0], 6.0, 1e-12);
    }

    #[test]
    fn invalid_parameters_are_rejected() {
        assert!(Profile::circle(-1.0).is_err());
        assert!(Profile::circle(f64::NAN).is_err());
        assert!(Profile::regular_polygon(2, 1.0).is_err());
        assert!(Profile::polygon(vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]]).is_err());
        assert!(Solid::sphere(0.0).is_err());
        assert!(Solid::cone(5.0, 0.0, 0.0).is_err());
        let sphere = Solid::sphere(1.0).expect("sphere should build");
        assert!(sphere.clone().scaled(0.0).is_err());
        assert!(sphere.clone().mirrored([0.0, 0.0, 0.0]).is_err());
        assert!(sphere.polar(0).is_err());
    }

    #[test]
    fn mirror_reflects_solid() {
        let moved = Solid::sphere(1.0)
            .and_then(|s| s.translated([3.0, 0.0, 0.0]))
            .and_then(|s| s.mirrored([1.0, 0.0, 0.0]))
            .expect("mirror should build");
        assert!(moved.evaluate([-3.0, 0.0, 0.0]) < 0.0);
        assert!(moved.evaluate([3.0, 0.0, 0.0]) > 0.0);
        assert_close(moved.bounds().min[0], -4.0, 1e-12);
    }
}
