pub mod export;
pub mod marching_tetrahedra;

use cad_core::{Sdf3, Solid};

/// Indexed triangle mesh with outward-facing winding.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f64; 3]>,
    pub triangles: Vec<[u32; 3]>,
}

impl Mesh {
    pub fn empty() -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
        }
    }

    /// Axis-aligned box centered at the origin, two triangles per face.
    pub fn cuboid(half_extents: [f64; 3]) -> Self {
        let [x, y, z] = half_extents;
        Self {
            vertices: vec![
                [-x, -y, -z],
                [x, -y, -z],
                [x, y, -z],
                [-x, y, -z],
                [-x, -y, z],
                [x, -y, z],
                [x, y, z],
                [-x, y, z],
            ],
            triangles: vec![
                [0, 2, 1],
                [0, 3, 2],
                [4, 5, 6],
                [4, 6, 7],
                [0, 1, 5],
                [0, 5, 4],
                [3, 6, 2],
                [3, 7, 6],
                [0, 4, 7],
                [0, 7, 3],
                [1, 2, 6],
                [1, 6, 5],
            ],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }
}

pub use export::{to_ascii_stl, to_binary_stl};
pub use marching_tetrahedra::{MeshConfig, extract_mesh_with};

/// Cells padded around the solid's bounds so the surface never touches the
/// sampling boundary.
const PADDING_CELLS: f64 = 2.0;

/// Meshes a solid over its own bounds. `resolution` is the number of cells
/// along the longest axis; the other axes use the same cell size.
pub fn mesh_solid(solid: &Solid, resolution: usize) -> Mesh {
    let bounds = solid.bounds();
    if bounds.is_empty() || !bounds.is_finite() || resolution == 0 {
        return Mesh::empty();
    }
    let extent = bounds.largest_extent();
    if extent <= f64::EPSILON {
        return Mesh::empty();
    }

    let cell = extent / resolution as f64;
    let padded = bounds.padded(cell * PADDING_CELLS);
    let size = padded.size();
    let counts = size.map(|length| ((length / cell).ceil() as usize + 1).max(2));
    let max = [
        padded.min[0] + (counts[0] - 1) as f64 * cell,
        padded.min[1] + (counts[1] - 1) as f64 * cell,
        padded.min[2] + (counts[2] - 1) as f64 * cell,
    ];

    let config = MeshConfig::new(padded.min, max, counts, 0.0);
    extract_mesh_with(&config, |point| solid.evaluate(point))
}

#[cfg(test)]
mod tests {
    use cad_core::{Profile, Solid};

    use super::{Mesh, mesh_solid};

    #[test]
    fn empty_mesh_has_no_geometry() {
        let mesh = Mesh::empty();
        assert!(mesh.vertices.is_empty());
        assert!(mesh.is_empty());
    }

    #[test]
    fn cuboid_has_twelve_triangles_over_eight_vertices() {
        let mesh = Mesh::cuboid([1.0, 1.0, 1.0]);
        assert_eq!(mesh.vertices.len(), 8);
        assert_eq!(mesh.triangles.len(), 12);
    }

    #[test]
    fn meshed_ring_stays_inside_padded_bounds() {
        let ring = Profile::circle(10.0)
            .expect("outer")
            .difference(Profile::circle(5.0).expect("inner"));
        let solid = Solid::extrude(ring, 5.0, 1.0).expect("extrude");
        let mesh = mesh_solid(&solid, 32);
        assert!(!mesh.is_empty());
        for vertex in &mesh.vertices {
            assert!(vertex[0].abs() <= 10.5 && vertex[1].abs() <= 10.5);
            assert!(vertex[2] >= -0.5 && vertex[2] <= 5.5);
        }
    }

    #[test]
    fn disjoint_intersection_meshes_to_nothing() {
        let a = Solid::sphere(1.0).expect("sphere");
        let b = Solid::sphere(1.0)
            .and_then(|s| s.translated([5.0, 0.0, 0.0]))
            .expect("moved sphere");
        assert!(mesh_solid(&a.intersection(b), 16).is_empty());
    }
}
