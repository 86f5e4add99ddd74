use std::collections::HashMap;

use cad_core::Point3;

use crate::Mesh;

/// Cube corners in lattice steps, bottom face first.
const CUBE_CORNERS: [[usize; 3]; 8] = [
    [0, 0, 0],
    [1, 0, 0],
    [1, 1, 0],
    [0, 1, 0],
    [0, 0, 1],
    [1, 0, 1],
    [1, 1, 1],
    [0, 1, 1],
];

/// Six tetrahedra sharing the 0-6 cube diagonal. Every face diagonal runs
/// from the face's lowest corner to its highest, so neighbouring cubes agree.
const CUBE_TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 5, 1, 6],
    [0, 1, 2, 6],
    [0, 2, 3, 6],
    [0, 3, 7, 6],
    [0, 7, 4, 6],
    [0, 4, 5, 6],
];

/// Sampling box and lattice size, in points per axis.
#[derive(Debug, Clone, Copy)]
pub struct MeshConfig {
    pub min: Point3,
    pub max: Point3,
    pub resolution: [usize; 3],
    pub iso_level: f64,
}

impl MeshConfig {
    pub fn new(min: Point3, max: Point3, resolution: [usize; 3], iso_level: f64) -> Self {
        Self {
            min,
            max,
            resolution,
            iso_level,
        }
    }
}

/// Field values sampled once per lattice point, x fastest.
struct Lattice {
    origin: Point3,
    step: Point3,
    dims: [usize; 3],
    values: Vec<f64>,
}

impl Lattice {
    fn sample<F>(config: &MeshConfig, sample: &mut F) -> Self
    where
        F: FnMut(Point3) -> f64,
    {
        let dims = config.resolution;
        let step = std::array::from_fn(|axis| {
            (config.max[axis] - config.min[axis]) / (dims[axis] - 1) as f64
        });
        let mut lattice = Self {
            origin: config.min,
            step,
            dims,
            values: Vec::with_capacity(dims.iter().product()),
        };
        for z in 0..dims[2] {
            for y in 0..dims[1] {
                for x in 0..dims[0] {
                    let value = sample(lattice.position([x, y, z]));
                    lattice.values.push(value);
                }
            }
        }
        lattice
    }

    fn index(&self, [x, y, z]: [usize; 3]) -> usize {
        x + self.dims[0] * (y + self.dims[1] * z)
    }

    fn position(&self, cell: [usize; 3]) -> Point3 {
        std::array::from_fn(|axis| self.origin[axis] + cell[axis] as f64 * self.step[axis])
    }

    fn corner(&self, cell: [usize; 3]) -> Corner {
        let index = self.index(cell);
        Corner {
            index,
            point: self.position(cell),
            value: self.values[index],
        }
    }
}

/// One lattice sample: grid index, position and field value.
#[derive(Debug, Clone, Copy)]
struct Corner {
    index: usize,
    point: Point3,
    value: f64,
}

/// Deduplicates vertices by exact bit pattern so shared edges weld.
struct Welder {
    mesh: Mesh,
    seen: HashMap<[u64; 3], u32>,
}

impl Welder {
    fn new() -> Self {
        Self {
            mesh: Mesh::empty(),
            seen: HashMap::new(),
        }
    }

    fn vertex(&mut self, point: Point3) -> u32 {
        let vertices = &mut self.mesh.vertices;
        *self.seen.entry(point.map(f64::to_bits)).or_insert_with(|| {
            vertices.push(point);
            (vertices.len() - 1) as u32
        })
    }

    /// Adds the triangle wound so its normal points from the inside corners
    /// toward the outside corners. Triangles collapsed onto a shared vertex
    /// are dropped.
    fn triangle(&mut self, points: [Point3; 3], inside: &[Corner], outside: &[Corner]) {
        let [a, b, c] = points;
        let normal = cross(sub(b, a), sub(c, a));
        let outward = sub(centroid(outside), centroid(inside));

        let [i0, i1, i2] = points.map(|point| self.vertex(point));
        if i0 == i1 || i1 == i2 || i0 == i2 {
            return;
        }
        let triangle = if dot(normal, outward) < 0.0 {
            [i0, i2, i1]
        } else {
            [i0, i1, i2]
        };
        self.mesh.triangles.push(triangle);
    }

    fn tetrahedron(&mut self, tet: [Corner; 4], iso: f64) {
        let (inside, outside): (Vec<Corner>, Vec<Corner>) =
            tet.into_iter().partition(|corner| corner.value < iso);

        match (inside.as_slice(), outside.as_slice()) {
            ([lone], [p, q, r]) | ([p, q, r], [lone]) => {
                let points = [p, q, r].map(|other| edge_point(*lone, *other, iso));
                self.triangle(points, &inside, &outside);
            }
            ([a, b], [c, d]) => {
                let ac = edge_point(*a, *c, iso);
                let ad = edge_point(*a, *d, iso);
                let bd = edge_point(*b, *d, iso);
                let bc = edge_point(*b, *c, iso);
                self.triangle([ac, ad, bd], &inside, &outside);
                self.triangle([ac, bd, bc], &inside, &outside);
            }
            _ => {}
        }
    }
}

/// Extracts the `iso_level` surface of a sampled field as a closed,
/// outward-facing triangle mesh.
pub fn extract_mesh_with<F>(config: &MeshConfig, mut sample: F) -> Mesh
where
    F: FnMut(Point3) -> f64,
{
    let [nx, ny, nz] = config.resolution;
    if nx < 2 || ny < 2 || nz < 2 {
        return Mesh::empty();
    }

    let lattice = Lattice::sample(config, &mut sample);
    let mut welder = Welder::new();

    for z in 0..nz - 1 {
        for y in 0..ny - 1 {
            for x in 0..nx - 1 {
                let corners =
                    CUBE_CORNERS.map(|[dx, dy, dz]| lattice.corner([x + dx, y + dy, z + dz]));
                let inside = corners
                    .iter()
                    .filter(|corner| corner.value < config.iso_level)
                    .count();
                if inside == 0 || inside == corners.len() {
                    continue;
                }
                for tet in CUBE_TETRAHEDRA {
                    welder.tetrahedron(tet.map(|corner| corners[corner]), config.iso_level);
                }
            }
        }
    }

    welder.mesh
}

/// Edge endpoints are ordered by grid index so both tetrahedra sharing an
/// edge produce the same bits for the crossing point.
fn edge_point(a: Corner, b: Corner, iso: f64) -> Point3 {
    let (from, to) = if a.index <= b.index { (a, b) } else { (b, a) };
    let delta = to.value - from.value;
    let t = if delta.abs() <= f64::EPSILON {
        0.5
    } else {
        ((iso - from.value) / delta).clamp(0.0, 1.0)
    };
    std::array::from_fn(|axis| from.point[axis] + t * (to.point[axis] - from.point[axis]))
}

fn centroid(corners: &[Corner]) -> Point3 {
    let n = corners.len() as f64;
    std::array::from_fn(|axis| corners.iter().map(|corner| corner.point[axis]).sum::<f64>() / n)
}

fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::f64::consts::PI;

    use cad_core::{Sdf3, Solid};

    use super::{MeshConfig, cross, dot, extract_mesh_with, sub};
    use crate::Mesh;

    fn mesh_of(solid: &Solid, resolution: usize) -> Mesh {
        let config = MeshConfig::new([-1.5; 3], [1.5; 3], [resolution; 3], 0.0);
        extract_mesh_with(&config, |point| solid.evaluate(point))
    }

    fn unit_sphere() -> Solid {
        Solid::sphere(1.0).expect("sphere should build")
    }

    fn corners(mesh: &Mesh) -> impl Iterator<Item = [[f64; 3]; 3]> + '_ {
        mesh.triangles
            .iter()
            .map(|triangle| triangle.map(|index| mesh.vertices[index as usize]))
    }

    /// Signed volume by the divergence theorem; positive when facing out.
    fn volume(mesh: &Mesh) -> f64 {
        corners(mesh).map(|[a, b, c]| dot(a, cross(b, c)) / 6.0).sum()
    }

    fn area(mesh: &Mesh) -> f64 {
        corners(mesh)
            .map(|[a, b, c]| {
                let n = cross(sub(b, a), sub(c, a));
                dot(n, n).sqrt() / 2.0
            })
            .sum()
    }

    fn assert_closed_manifold(mesh: &Mesh) {
        assert!(!mesh.is_empty());
        let mut uses = HashMap::<(u32, u32), usize>::new();
        for &[a, b, c] in &mesh.triangles {
            assert!(a != b && b != c && a != c, "degenerate triangle {a} {b} {c}");
            for (p, q) in [(a, b), (b, c), (c, a)] {
                *uses.entry((p.min(q), p.max(q))).or_default() += 1;
            }
        }
        for (edge, count) in uses {
            assert_eq!(count, 2, "edge {edge:?} is shared by {count} triangles");
        }
    }

    #[test]
    fn uniform_fields_have_no_surface() {
        let config = MeshConfig::new([-1.0; 3], [1.0; 3], [10; 3], 0.0);
        assert!(extract_mesh_with(&config, |_| 1.0).vertices.is_empty());
        assert!(extract_mesh_with(&config, |_| -1.0).vertices.is_empty());
    }

    #[test]
    fn a_single_point_axis_yields_nothing() {
        let config = MeshConfig::new([0.0; 3], [1.0; 3], [1, 8, 8], 0.0);
        assert!(extract_mesh_with(&config, |_| -1.0).is_empty());
    }

    #[test]
    fn sphere_volume_and_area_are_close() {
        let mesh = mesh_of(&unit_sphere(), 32);
        let volume = volume(&mesh);
        let area = area(&mesh);
        assert!(volume > 0.0, "winding should face outward");

        let volume_error = (volume - 4.0 * PI / 3.0).abs() / (4.0 * PI / 3.0);
        let area_error = (area - 4.0 * PI).abs() / (4.0 * PI);
        assert!(volume_error < 0.1, "volume error {volume_error:.4}");
        assert!(area_error < 0.12, "area error {area_error:.4}");
    }

    #[test]
    fn finer_lattices_are_more_accurate() {
        let exact = 4.0 * PI / 3.0;
        let errors = [12, 24, 40]
            .map(|resolution| (volume(&mesh_of(&unit_sphere(), resolution)) - exact).abs());
        assert!(errors[2] < errors[1] && errors[1] < errors[0], "errors {errors:?}");
    }

    #[test]
    fn sphere_and_box_meshes_are_closed() {
        assert_closed_manifold(&mesh_of(&unit_sphere(), 28));

        let slab = Solid::cuboid(1.54, 1.04, 0.66).expect("box should build");
        let mesh = mesh_of(&slab, 21);
        assert_closed_manifold(&mesh);
        let expected = 1.54 * 1.04 * 0.66;
        assert!((volume(&mesh) - expected).abs() / expected < 0.2);
    }
}
