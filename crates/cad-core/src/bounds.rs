use crate::primitives::Point3;

/// Axis-aligned bounding box. An inverted box (`min > max` on any axis)
/// is empty.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3,
    pub max: Point3,
}

impl Aabb {
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    pub fn symmetric(half_extents: Point3) -> Self {
        Self {
            min: [-half_extents[0], -half_extents[1], -half_extents[2]],
            max: half_extents,
        }
    }

    pub fn is_empty(&self) -> bool {
        (0..3).any(|axis| self.min[axis] > self.max[axis])
    }

    pub fn is_finite(&self) -> bool {
        self.min.iter().chain(self.max.iter()).all(|v| v.is_finite())
    }

    pub fn size(&self) -> Point3 {
        [
            self.max[0] - self.min[0],
            self.max[1] - self.min[1],
            self.max[2] - self.min[2],
        ]
    }

    pub fn largest_extent(&self) -> f64 {
        let size = self.size();
        size[0].max(size[1]).max(size[2])
    }

    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [
                self.min[0].min(other.min[0]),
                self.min[1].min(other.min[1]),
                self.min[2].min(other.min[2]),
            ],
            max: [
                self.max[0].max(other.max[0]),
                self.max[1].max(other.max[1]),
                self.max[2].max(other.max[2]),
            ],
        }
    }

    pub fn intersection(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: [
                self.min[0].max(other.min[0]),
                self.min[1].max(other.min[1]),
                self.min[2].max(other.min[2]),
            ],
            max: [
                self.max[0].min(other.max[0]),
                self.max[1].min(other.max[1]),
                self.max[2].min(other.max[2]),
            ],
        }
    }

    pub fn translated(&self, offset: Point3) -> Aabb {
        Aabb {
            min: [
                self.min[0] + offset[0],
                self.min[1] + offset[1],
                self.min[2] + offset[2],
            ],
            max: [
                self.max[0] + offset[0],
                self.max[1] + offset[1],
                self.max[2] + offset[2],
            ],
        }
    }

    pub fn scaled(&self, factor: f64) -> Aabb {
        let a = [self.min[0] * factor, self.min[1] * factor, self.min[2] * factor];
        let b = [self.max[0] * factor, self.max[1] * factor, self.max[2] * factor];
        Aabb::from_points(&[a, b])
    }

    /// Grows the box by `margin` on every side.
    pub fn padded(&self, margin: f64) -> Aabb {
        Aabb {
            min: [self.min[0] - margin, self.min[1] - margin, self.min[2] - margin],
            max: [self.max[0] + margin, self.max[1] + margin, self.max[2] + margin],
        }
    }

    pub fn corners(&self) -> [Point3; 8] {
        let (a, b) = (self.min, self.max);
        [
            [a[0], a[1], a[2]],
            [b[0], a[1], a[2]],
            [b[0], b[1], a[2]],
            [a[0], b[1], a[2]],
            [a[0], a[1], b[2]],
            [b[0], a[1], b[2]],
            [b[0], b[1], b[2]],
            [a[0], b[1], b[2]],
        ]
    }

    /// Box enclosing the corners after mapping each one through `map`.
    pub fn mapped<F>(&self, map: F) -> Aabb
    where
        F: Fn(Point3) -> Point3,
    {
        let corners = self.corners().map(map);
        Aabb::from_points(&corners)
    }

    /// Box of everything reachable by spinning this box around the Z axis.
    pub fn revolved_about_z(&self) -> Aabb {
        let radius = self
            .corners()
            .iter()
            .map(|c| (c[0] * c[0] + c[1] * c[1]).sqrt())
            .fold(0.0, f64::max);
        Aabb {
            min: [-radius, -radius, self.min[2]],
            max: [radius, radius, self.max[2]],
        }
    }

    fn from_points(points: &[Point3]) -> Aabb {
        let mut min = [f64::INFINITY; 3];
        let mut max = [f64::NEG_INFINITY; 3];
        for point in points {
            for axis in 0..3 {
                min[axis] = min[axis].min(point[axis]);
                max[axis] = max[axis].max(point[axis]);
            }
        }
        Aabb { min, max }
    }
}
