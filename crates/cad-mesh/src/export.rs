use std::fmt::Write as _;

use crate::Mesh;

const HEADER_LEN: usize = 80;
const FACET_LEN: usize = 50;

/// One STL facet: unit normal followed by the three corners.
struct Facet {
    normal: [f64; 3],
    corners: [[f64; 3]; 3],
}

impl Facet {
    fn new(corners: [[f64; 3]; 3]) -> Self {
        let [a, b, c] = corners;
        let u = [b[0] - a[0], b[1] - a[1], b[2] - a[2]];
        let v = [c[0] - a[0], c[1] - a[1], c[2] - a[2]];
        let n = [
            u[1] * v[2] - u[2] * v[1],
            u[2] * v[0] - u[0] * v[2],
            u[0] * v[1] - u[1] * v[0],
        ];
        let len = n[0].hypot(n[1]).hypot(n[2]);
        let normal = if len <= f64::EPSILON {
            [0.0; 3]
        } else {
            n.map(|component| component / len)
        };
        Self { normal, corners }
    }
}

fn facets(mesh: &Mesh) -> impl Iterator<Item = Facet> + '_ {
    mesh.triangles
        .iter()
        .map(|triangle| Facet::new(triangle.map(|index| mesh.vertices[index as usize])))
}

/// Binary STL: 80-byte header carrying `name`, a little-endian triangle
/// count, then 50 bytes per facet.
pub fn to_binary_stl(mesh: &Mesh, name: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(HEADER_LEN + 4 + mesh.triangles.len() * FACET_LEN);

    let name = &name.as_bytes()[..name.len().min(HEADER_LEN)];
    bytes.extend_from_slice(name);
    bytes.resize(HEADER_LEN, 0);
    bytes.extend_from_slice(&(mesh.triangles.len() as u32).to_le_bytes());

    for facet in facets(mesh) {
        for vector in std::iter::once(facet.normal).chain(facet.corners) {
            for component in vector {
                bytes.extend_from_slice(&(component as f32).to_le_bytes());
            }
        }
        bytes.extend_from_slice(&[0, 0]);
    }
    bytes
}

pub fn to_ascii_stl(mesh: &Mesh, name: &str) -> String {
    let mut out = format!("solid {name}\n");
    for Facet { normal: [nx, ny, nz], corners } in facets(mesh) {
        // Writing into a String cannot fail.
        let _ = writeln!(out, "  facet normal {nx} {ny} {nz}\n    outer loop");
        for [x, y, z] in corners {
            let _ = writeln!(out, "      vertex {x} {y} {z}");
        }
        out.push_str("    endloop\n  endfacet\n");
    }
    let _ = writeln!(out, "endsolid {name}");
    out
}

#[cfg(test)]
mod tests {
    use cad_core::Solid;

    use super::{to_ascii_stl, to_binary_stl};
    use crate::{Mesh, mesh_solid};

    fn single_triangle() -> Mesh {
        Mesh {
            vertices: vec![[0.0, 0.0, 0.0], [2.0, 0.0, 0.0], [0.0, 2.0, 0.0]],
            triangles: vec![[0, 1, 2]],
        }
    }

    fn triangle_count(bytes: &[u8]) -> usize {
        u32::from_le_bytes([bytes[80], bytes[81], bytes[82], bytes[83]]) as usize
    }

    #[test]
    fn binary_layout_is_header_count_and_facets() {
        let bytes = to_binary_stl(&single_triangle(), "part");
        assert_eq!(bytes.len(), 134);
        assert_eq!(&bytes[..4], b"part");
        assert!(bytes[4..80].iter().all(|byte| *byte == 0));
        assert_eq!(triangle_count(&bytes), 1);

        let nz = f32::from_le_bytes([bytes[92], bytes[93], bytes[94], bytes[95]]);
        assert_eq!(nz, 1.0);
        let second_x = f32::from_le_bytes([bytes[108], bytes[109], bytes[110], bytes[111]]);
        assert_eq!(second_x, 2.0);
    }

    #[test]
    fn names_longer_than_the_header_are_cut() {
        let bytes = to_binary_stl(&single_triangle(), &"x".repeat(200));
        assert_eq!(bytes.len(), 134);
        assert_eq!(triangle_count(&bytes), 1);
    }

    #[test]
    fn ascii_output_wraps_facets_in_named_solid() {
        let stl = to_ascii_stl(&single_triangle(), "tri");
        assert!(stl.starts_with("solid tri\n  facet normal 0 0 1\n    outer loop\n"));
        assert!(stl.contains("      vertex 2 0 0\n"));
        assert!(stl.ends_with("    endloop\n  endfacet\nendsolid tri\n"));
    }

    #[test]
    fn default_cube_has_twelve_facets() {
        let stl = to_ascii_stl(&Mesh::cuboid([1.0, 1.0, 1.0]), "cube");
        assert_eq!(stl.matches("facet normal").count(), 12);
        assert_eq!(stl.matches("endfacet").count(), 12);
    }

    #[test]
    fn meshed_solid_round_trips_triangle_count() {
        let solid = Solid::sphere(5.0).expect("sphere should build");
        let mesh = mesh_solid(&solid, 24);
        assert!(!mesh.is_empty());

        let bytes = to_binary_stl(&mesh, "sphere");
        assert_eq!(triangle_count(&bytes), mesh.triangles.len());
        assert_eq!(bytes.len(), 84 + 50 * mesh.triangles.len());
    }
}
