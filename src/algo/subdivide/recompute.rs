//! Replaying recorded stencils on new coarse data.

use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use tracing::debug;

use crate::error::{MeshError, Result};
use crate::mesh::{HalfEdgeId, HalfEdgeMesh, MeshIndex, OutputMap};

use super::catmull_clark::CatmullClarkSubdivider;
use super::stencil::{Stencil, StencilHandle};

impl<I: MeshIndex> CatmullClarkSubdivider<I> {
    /// Evaluate the subdivided surface for new coarse positions and normals.
    ///
    /// `new_positions` and `new_normals` are indexed like the vertices of the
    /// [`IndexedMesh`](crate::mesh::IndexedMesh) the mesh was imported from.
    /// `output` is the map returned by exporting the subdivided mesh; the
    /// results are written in that export's vertex order, so they line up
    /// with the exported index buffer.
    ///
    /// The mesh is only read. Blended normals are renormalized, copied ones
    /// are passed through.
    ///
    /// # Errors
    ///
    /// - [`MeshError::InvalidState`] if the subdivider was never prepared or
    ///   the mesh holds deleted elements.
    /// - [`MeshError::SizeMismatch`] if the coarse arrays differ in length,
    ///   are too short for the imported corners, or `output` was not built
    ///   from this mesh.
    pub fn recompute(
        &self,
        mesh: &HalfEdgeMesh<I>,
        output: &OutputMap,
        new_positions: &[Point3<f64>],
        new_normals: &[Vector3<f64>],
        out_positions: &mut Vec<Point3<f64>>,
        out_normals: &mut Vec<Vector3<f64>>,
    ) -> Result<()> {
        if self.coarse_vertex.is_empty() {
            return Err(MeshError::InvalidState(
                "subdivider has no coarse mesh recorded; prepare and subdivide first".into(),
            ));
        }
        if mesh.has_deleted_elements() || mesh.num_halfedges() < self.coarse_vertex.len() {
            return Err(MeshError::InvalidState(
                "mesh no longer matches the recorded subdivision".into(),
            ));
        }
        if new_normals.len() != new_positions.len() {
            return Err(MeshError::size_mismatch(
                "new_normals",
                new_positions.len(),
                new_normals.len(),
            ));
        }
        if output.len() != mesh.num_halfedges() {
            return Err(MeshError::size_mismatch(
                "output map",
                mesh.num_halfedges(),
                output.len(),
            ));
        }

        let coarse: Vec<(usize, usize, usize)> = self
            .coarse_vertex
            .iter()
            .enumerate()
            .filter_map(|(i, v)| {
                let input = mesh.halfedge(HalfEdgeId::<I>::new(i)).input_index?;
                Some((i, v.as_ref()?.index(), input))
            })
            .collect();
        let needed = coarse.iter().map(|&(_, _, input)| input + 1).max().unwrap_or(0);
        if needed > new_positions.len() {
            return Err(MeshError::size_mismatch(
                "new_positions",
                needed,
                new_positions.len(),
            ));
        }

        let mut points: Vec<Vector3<f64>> = mesh
            .vertex_ids()
            .map(|v| mesh.position(v).coords)
            .collect();
        let mut normals: Vec<Vector3<f64>> = vec![Vector3::zeros(); mesh.num_halfedges()];
        for (he, v, input) in coarse {
            points[v] = new_positions[input].coords;
            normals[he] = new_normals[input];
        }

        for it in &self.stencils.iterations {
            replay(&it.face_vertices, &mut points, self.parallel, false);
            replay(&it.edge_vertices, &mut points, self.parallel, false);
            replay(&it.old_vertices, &mut points, self.parallel, false);

            // Later edge stencils read corners written by earlier ones
            for s in &it.edge_props {
                normals[s.target.slot()] = blend_normal(s, &normals);
            }
            replay(&it.face_props, &mut normals, self.parallel, true);
        }
        for s in &self.stencils.triangulation {
            normals[s.target.slot()] = blend_normal(s, &normals);
        }

        out_positions.clear();
        out_positions.resize(output.num_outputs(), Point3::origin());
        out_normals.clear();
        out_normals.resize(output.num_outputs(), Vector3::zeros());
        for he in mesh.halfedge_ids() {
            if let Some(o) = output.output_of(he) {
                out_positions[o] = Point3::from(points[mesh.to_vertex(he).index()]);
                out_normals[o] = normals[he.index()];
            }
        }

        debug!(
            outputs = output.num_outputs(),
            stencils = self.stencils.len(),
            "recomputed subdivision surface"
        );
        Ok(())
    }
}

fn blend_normal<H: StencilHandle>(stencil: &Stencil<H>, normals: &[Vector3<f64>]) -> Vector3<f64> {
    let n = stencil.apply(normals);
    if stencil.is_copy() {
        n
    } else {
        n.try_normalize(f64::EPSILON).unwrap_or(n)
    }
}

/// Evaluate all stencils against the current values, then write them back.
fn replay<H>(stencils: &[Stencil<H>], values: &mut [Vector3<f64>], parallel: bool, normalize: bool)
where
    H: StencilHandle + Send + Sync,
{
    let snapshot = &*values;
    let eval = |s: &Stencil<H>| {
        if normalize {
            blend_normal(s, snapshot)
        } else {
            s.apply(snapshot)
        }
    };

    let results: Vec<Vector3<f64>> = if parallel {
        stencils.par_iter().map(eval).collect()
    } else {
        stencils.iter().map(eval).collect()
    };

    for (s, v) in stencils.iter().zip(results) {
        values[s.target.slot()] = v;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::subdivide::{catmull_clark_subdivide, SubdivideOptions};
    use crate::mesh::{faceted_cube, grid, unit_cube, DropNonManifoldFaces, IndexedMesh};
    use approx::assert_relative_eq;

    fn import(source: &IndexedMesh) -> HalfEdgeMesh {
        HalfEdgeMesh::from_indexed(source, &mut DropNonManifoldFaces::new()).unwrap()
    }

    fn zero_normals(n: usize) -> Vec<Vector3<f64>> {
        vec![Vector3::zeros(); n]
    }

    /// Subdivide `source` and check that replaying its own data reproduces
    /// the exported surface.
    fn assert_replay_matches(source: &IndexedMesh, options: &SubdivideOptions) {
        let mut mesh = import(source);
        let subdivider = catmull_clark_subdivide(&mut mesh, options).unwrap();
        let (exported, map) = mesh.to_triangle_mesh();

        let normals = source
            .normals()
            .map(<[_]>::to_vec)
            .unwrap_or_else(|| zero_normals(source.num_vertices()));
        let mut positions = Vec::new();
        let mut out_normals = Vec::new();
        subdivider
            .recompute(&mesh, &map, &source.positions, &normals, &mut positions, &mut out_normals)
            .unwrap();

        assert_eq!(positions.len(), exported.num_vertices());
        for (a, b) in positions.iter().zip(&exported.positions) {
            assert_relative_eq!(*a, *b, epsilon = 1e-9);
        }
        if let Some(expected) = exported.normals() {
            for (a, b) in out_normals.iter().zip(expected) {
                assert_relative_eq!(*a, *b, epsilon = 1e-9);
            }
        }
    }

    #[test]
    fn test_replay_reproduces_forward_pass() {
        assert_replay_matches(&faceted_cube(), &SubdivideOptions::new(2));
        assert_replay_matches(&grid(3), &SubdivideOptions::new(2));
        assert_replay_matches(&unit_cube(), &SubdivideOptions::new(1).with_triangulate(false));
        assert_replay_matches(
            &grid(2),
            &SubdivideOptions::new(1).with_update_points(false).sequential(),
        );
    }

    #[test]
    fn test_translation_moves_output() {
        let source = faceted_cube();
        let mut mesh = import(&source);
        let subdivider = catmull_clark_subdivide(&mut mesh, &SubdivideOptions::new(2)).unwrap();
        let (exported, map) = mesh.to_triangle_mesh();

        let t = Vector3::new(1.5, -2.0, 0.25);
        let moved: Vec<Point3<f64>> = source.positions.iter().map(|p| p + t).collect();
        let normals = source.normals().unwrap();

        let mut positions = Vec::new();
        let mut out_normals = Vec::new();
        subdivider
            .recompute(&mesh, &map, &moved, normals, &mut positions, &mut out_normals)
            .unwrap();

        for (p, q) in positions.iter().zip(&exported.positions) {
            assert_relative_eq!(*p, q + t, epsilon = 1e-9);
        }
        for (n, m) in out_normals.iter().zip(exported.normals().unwrap()) {
            assert_relative_eq!(*n, *m, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_new_normals_are_interpolated() {
        let source = grid(2);
        let mut mesh = import(&source);
        let subdivider = catmull_clark_subdivide(&mut mesh, &SubdivideOptions::new(1)).unwrap();
        let (_, map) = mesh.to_triangle_mesh();

        let tilted = vec![Vector3::new(0.0, 3.0, 4.0); source.num_vertices()];
        let mut positions = Vec::new();
        let mut normals = Vec::new();
        subdivider
            .recompute(&mesh, &map, &source.positions, &tilted, &mut positions, &mut normals)
            .unwrap();

        // Blends are renormalized, and the coarse corners are copied through
        let unit = Vector3::new(0.0, 0.6, 0.8);
        assert!(normals.iter().any(|n| *n == tilted[0]));
        for n in normals.iter().filter(|n| **n != tilted[0]) {
            assert_relative_eq!(*n, unit, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_recompute_errors() {
        let source = unit_cube();
        let mut mesh = import(&source);
        let normals = zero_normals(source.num_vertices());
        let mut positions = Vec::new();
        let mut out_normals = Vec::new();

        let fresh = CatmullClarkSubdivider::new();
        let (_, map) = mesh.to_triangle_mesh();
        assert!(matches!(
            fresh.recompute(
                &mesh,
                &map,
                &source.positions,
                &normals,
                &mut positions,
                &mut out_normals
            ),
            Err(MeshError::InvalidState(_))
        ));

        let subdivider = catmull_clark_subdivide(&mut mesh, &SubdivideOptions::new(1)).unwrap();
        assert!(matches!(
            subdivider.recompute(
                &mesh,
                &map,
                &source.positions,
                &normals,
                &mut positions,
                &mut out_normals
            ),
            Err(MeshError::SizeMismatch { what: "output map", .. })
        ));

        let (_, map) = mesh.to_triangle_mesh();
        assert!(matches!(
            subdivider.recompute(
                &mesh,
                &map,
                &source.positions,
                &normals[..3],
                &mut positions,
                &mut out_normals
            ),
            Err(MeshError::SizeMismatch { what: "new_normals", .. })
        ));
        assert!(matches!(
            subdivider.recompute(
                &mesh,
                &map,
                &source.positions[..4],
                &normals[..4],
                &mut positions,
                &mut out_normals
            ),
            Err(MeshError::SizeMismatch { what: "new_positions", expected: 8, actual: 4 })
        ));
    }
}
