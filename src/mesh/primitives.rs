//! Built-in primitive meshes.

use nalgebra::{Point3, Vector3};

use super::indexed::{AttribArray, IndexedMesh};
use super::wedge::NORMAL_ATTRIB;

const CUBE_CORNERS: [[f64; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

// Counter-clockwise seen from outside, paired with the outward normal
const CUBE_FACES: [([usize; 4], [f64; 3]); 6] = [
    ([0, 3, 2, 1], [0.0, 0.0, -1.0]),
    ([4, 5, 6, 7], [0.0, 0.0, 1.0]),
    ([0, 1, 5, 4], [0.0, -1.0, 0.0]),
    ([3, 7, 6, 2], [0.0, 1.0, 0.0]),
    ([0, 4, 7, 3], [-1.0, 0.0, 0.0]),
    ([1, 2, 6, 5], [1.0, 0.0, 0.0]),
];

/// The unit cube `[0, 1]^3` as six quads over eight shared vertices.
///
/// ```
/// let cube = topomesh::mesh::unit_cube();
/// assert_eq!(cube.num_vertices(), 8);
/// assert_eq!(cube.num_faces(), 6);
/// ```
pub fn unit_cube() -> IndexedMesh {
    let positions = CUBE_CORNERS
        .iter()
        .map(|c| Point3::new(c[0], c[1], c[2]))
        .collect();
    let quads: Vec<[usize; 4]> = CUBE_FACES.iter().map(|(q, _)| *q).collect();
    IndexedMesh::from_quads(positions, &quads)
}

/// The unit cube with a flat `"normal"` per side.
///
/// Every side has its own four vertices, so after import the eight corners
/// each carry three wedges.
pub fn faceted_cube() -> IndexedMesh {
    let mut positions = Vec::with_capacity(24);
    let mut normals = Vec::with_capacity(24);
    let mut quads = Vec::with_capacity(6);

    for (quad, n) in &CUBE_FACES {
        let base = positions.len();
        for &corner in quad {
            let c = CUBE_CORNERS[corner];
            positions.push(Point3::new(c[0], c[1], c[2]));
            normals.push(Vector3::new(n[0], n[1], n[2]));
        }
        quads.push([base, base + 1, base + 2, base + 3]);
    }

    IndexedMesh::from_quads(positions, &quads)
        .with_attrib(NORMAL_ATTRIB, AttribArray::Vec3(normals))
}

/// A flat `n` by `n` quad grid over `[0, 1]^2` in the xy plane, facing +z.
pub fn grid(n: usize) -> IndexedMesh {
    let n = n.max(1);
    let step = 1.0 / n as f64;
    let row = n + 1;

    let positions = (0..row)
        .flat_map(|j| (0..row).map(move |i| Point3::new(i as f64 * step, j as f64 * step, 0.0)))
        .collect();

    let mut quads = Vec::with_capacity(n * n);
    for j in 0..n {
        for i in 0..n {
            let v = j * row + i;
            quads.push([v, v + 1, v + row + 1, v + row]);
        }
    }

    let normals = vec![Vector3::z(); row * row];
    IndexedMesh::from_quads(positions, &quads)
        .with_attrib(NORMAL_ATTRIB, AttribArray::Vec3(normals))
}
