//! Conversion between [`IndexedMesh`] and [`HalfEdgeMesh`].
//!
//! Import merges vertices with bit-identical positions and turns every
//! polygon corner into a wedge, so corners that differ in any attribute stay
//! apart while identical corners share storage. Faces that cannot be added
//! without breaking the manifold property are handed to a
//! [`NonManifoldPolicy`].
//!
//! Export walks the live faces and emits one output vertex per distinct
//! (vertex, wedge) pair, together with an [`OutputMap`] that tells which
//! output vertex each half-edge corner ended up in.

use std::collections::HashMap;

use nalgebra::{Point3, Vector2, Vector3, Vector4};
use tracing::{debug, info, warn};

use super::halfedge::HalfEdgeMesh;
use super::index::{HalfEdgeId, MeshIndex, VertexId, WedgeIndex};
use super::indexed::{AttribArray, IndexedMesh};
use super::wedge::WedgeData;
use crate::error::{MeshError, Result};

/// Strategy for faces that cannot be added to a manifold mesh.
pub trait NonManifoldPolicy<I: MeshIndex = u32> {
    /// Called once before any face is added.
    fn initialize(&mut self, _source: &IndexedMesh) {}

    /// Called for each rejected face with its merged corner vertices.
    fn process(&mut self, vertices: &[VertexId<I>]);

    /// Called once after all faces were added, before compaction.
    fn post_process(&mut self, _mesh: &mut HalfEdgeMesh<I>) {}
}

/// Drop rejected faces, logging each one.
#[derive(Debug, Clone, Default)]
pub struct DropNonManifoldFaces {
    dropped: usize,
}

impl DropNonManifoldFaces {
    /// Create a policy with no dropped faces.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of faces dropped so far.
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}

impl<I: MeshIndex> NonManifoldPolicy<I> for DropNonManifoldFaces {
    fn process(&mut self, vertices: &[VertexId<I>]) {
        warn!(?vertices, "dropping face that would make the mesh non-manifold");
        self.dropped += 1;
    }

    fn post_process(&mut self, _mesh: &mut HalfEdgeMesh<I>) {
        if self.dropped > 0 {
            info!(dropped = self.dropped, "non-manifold faces removed during import");
        }
    }
}

/// Collects rejected faces so the strict builders can report them.
#[derive(Default)]
struct RejectFaces {
    rejected: usize,
}

impl<I: MeshIndex> NonManifoldPolicy<I> for RejectFaces {
    fn process(&mut self, _vertices: &[VertexId<I>]) {
        self.rejected += 1;
    }
}

/// Which output vertex each half-edge corner was exported to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputMap {
    halfedge_output: Vec<Option<usize>>,
    num_outputs: usize,
}

impl OutputMap {
    /// Output vertex of the corner at the to-vertex of `he`.
    ///
    /// `None` for boundary and deleted half-edges.
    pub fn output_of<I: MeshIndex>(&self, he: HalfEdgeId<I>) -> Option<usize> {
        self.halfedge_output.get(he.index()).copied().flatten()
    }

    /// Number of exported vertices.
    pub fn num_outputs(&self) -> usize {
        self.num_outputs
    }

    /// Number of half-edge slots covered.
    pub fn len(&self) -> usize {
        self.halfedge_output.len()
    }

    /// Whether the map covers no half-edge.
    pub fn is_empty(&self) -> bool {
        self.halfedge_output.is_empty()
    }
}

/// Where an imported attribute lives in the wedge schema.
#[derive(Clone, Copy)]
enum AttribSlot {
    Float(usize),
    Vec2(usize),
    Vec3(usize),
    Vec4(usize),
}

fn position_key(p: &Point3<f64>) -> [u64; 3] {
    [p.x.to_bits(), p.y.to_bits(), p.z.to_bits()]
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Build a half-edge mesh from an indexed polygon mesh.
    ///
    /// Vertices with bit-identical positions are merged. Each polygon corner
    /// becomes a wedge carrying the source vertex's attributes and remembers
    /// the source index in [`HalfEdge::input_index`](super::HalfEdge::input_index).
    /// Attribute arrays whose length differs from the position count are
    /// skipped. Degenerate and non-manifold polygons go to `policy`.
    ///
    /// # Errors
    ///
    /// [`MeshError::EmptyMesh`] if there are no polygons and
    /// [`MeshError::InvalidVertexIndex`] if a polygon indexes past the
    /// position array.
    ///
    /// # Example
    ///
    /// ```
    /// use topomesh::mesh::{unit_cube, DropNonManifoldFaces, HalfEdgeMesh};
    ///
    /// let mut policy = DropNonManifoldFaces::new();
    /// let mesh: HalfEdgeMesh = HalfEdgeMesh::from_indexed(&unit_cube(), &mut policy).unwrap();
    /// assert_eq!(mesh.num_vertices(), 8);
    /// assert_eq!(mesh.num_faces(), 6);
    /// assert_eq!(policy.dropped(), 0);
    /// ```
    pub fn from_indexed<P>(source: &IndexedMesh, policy: &mut P) -> Result<Self>
    where
        P: NonManifoldPolicy<I>,
    {
        if source.polygons.is_empty() {
            return Err(MeshError::EmptyMesh);
        }
        let num_inputs = source.positions.len();
        for (face, polygon) in source.polygons.iter().enumerate() {
            if let Some(&vertex) = polygon.iter().find(|&&i| i >= num_inputs) {
                return Err(MeshError::InvalidVertexIndex { face, vertex });
            }
        }

        policy.initialize(source);

        let mut mesh = Self::with_capacity(num_inputs, source.polygons.len());

        let mut slots = Vec::with_capacity(source.attributes.len());
        for attrib in &source.attributes {
            if attrib.data.len() != num_inputs {
                warn!(
                    name = %attrib.name,
                    len = attrib.data.len(),
                    expected = num_inputs,
                    "skipping attribute with wrong length"
                );
                continue;
            }
            let slot = match &attrib.data {
                AttribArray::Float(_) => {
                    AttribSlot::Float(mesh.wedges.add_attrib(&attrib.name, 0.0))
                }
                AttribArray::Vec2(_) => {
                    AttribSlot::Vec2(mesh.wedges.add_attrib(&attrib.name, Vector2::zeros()))
                }
                AttribArray::Vec3(_) => {
                    AttribSlot::Vec3(mesh.wedges.add_attrib(&attrib.name, Vector3::zeros()))
                }
                AttribArray::Vec4(_) => {
                    AttribSlot::Vec4(mesh.wedges.add_attrib(&attrib.name, Vector4::zeros()))
                }
            };
            slots.push((slot, &attrib.data));
        }

        let mut merged: HashMap<[u64; 3], VertexId<I>> = HashMap::with_capacity(num_inputs);
        let vertex_of: Vec<VertexId<I>> = source
            .positions
            .iter()
            .map(|p| *merged.entry(position_key(p)).or_insert_with(|| mesh.add_vertex(*p)))
            .collect();

        let mut corners = Vec::new();
        for polygon in &source.polygons {
            corners.clear();
            corners.extend(polygon.iter().map(|&i| vertex_of[i]));

            let Some(f) = mesh.add_face(&corners) else {
                policy.process(&corners);
                continue;
            };

            // The face's half-edge ends at the first corner
            let mut he = mesh.face(f).halfedge;
            for &input in polygon {
                let mut data = mesh.wedges.new_data(source.positions[input]);
                for (slot, values) in &slots {
                    match (*slot, values) {
                        (AttribSlot::Float(k), AttribArray::Float(v)) => data.floats[k] = v[input],
                        (AttribSlot::Vec2(k), AttribArray::Vec2(v)) => data.vec2s[k] = v[input],
                        (AttribSlot::Vec3(k), AttribArray::Vec3(v)) => data.vec3s[k] = v[input],
                        (AttribSlot::Vec4(k), AttribArray::Vec4(v)) => data.vec4s[k] = v[input],
                        _ => {}
                    }
                }
                let w = mesh.wedges.add(data);
                let h = mesh.halfedge_mut(he);
                h.wedge = w;
                h.input_index = Some(input);
                he = mesh.next(he);
            }
        }

        policy.post_process(&mut mesh);
        if mesh.has_garbage() {
            mesh.garbage_collection();
        }

        debug!(
            vertices = mesh.num_vertices(),
            faces = mesh.num_faces(),
            wedges = mesh.num_wedges(),
            "imported indexed mesh"
        );
        debug_assert!(mesh.is_valid());
        Ok(mesh)
    }

    /// Export as a triangle mesh, fanning larger polygons from their first
    /// corner.
    ///
    /// The mesh itself is not modified.
    pub fn to_triangle_mesh(&self) -> (IndexedMesh, OutputMap) {
        self.export(true)
    }

    /// Export with the polygons as they are.
    pub fn to_poly_mesh(&self) -> (IndexedMesh, OutputMap) {
        self.export(false)
    }

    fn export(&self, triangulate: bool) -> (IndexedMesh, OutputMap) {
        let mut map = OutputMap {
            halfedge_output: vec![None; self.halfedges.len()],
            num_outputs: 0,
        };
        let mut outputs: HashMap<(VertexId<I>, WedgeIndex<I>), usize> = HashMap::new();
        let mut corner_data: Vec<WedgeData> = Vec::new();
        let mut polygons = Vec::with_capacity(self.faces.len());

        for f in self.face_ids() {
            let mut polygon = Vec::new();
            for he in self.face_halfedges(f) {
                let h = self.halfedge(he);
                let out = *outputs.entry((h.vertex, h.wedge)).or_insert_with(|| {
                    corner_data.push(if h.wedge.is_valid() {
                        self.wedges.data(h.wedge).clone()
                    } else {
                        self.new_wedge_data_for(he)
                    });
                    corner_data.len() - 1
                });
                map.halfedge_output[he.index()] = Some(out);
                polygon.push(out);
            }

            if triangulate && polygon.len() > 3 {
                for i in 1..polygon.len() - 1 {
                    polygons.push(vec![polygon[0], polygon[i], polygon[i + 1]]);
                }
            } else {
                polygons.push(polygon);
            }
        }
        map.num_outputs = corner_data.len();

        let positions = corner_data.iter().map(|d| d.position).collect();
        let mut mesh = IndexedMesh::new(positions, polygons);

        let schema = self.wedges.schema();
        for (k, name) in schema.names::<f64>().iter().enumerate() {
            let values = corner_data.iter().map(|d| d.floats[k]).collect();
            mesh.add_attrib(name, AttribArray::Float(values));
        }
        for (k, name) in schema.names::<Vector2<f64>>().iter().enumerate() {
            let values = corner_data.iter().map(|d| d.vec2s[k]).collect();
            mesh.add_attrib(name, AttribArray::Vec2(values));
        }
        for (k, name) in schema.names::<Vector3<f64>>().iter().enumerate() {
            let values = corner_data.iter().map(|d| d.vec3s[k]).collect();
            mesh.add_attrib(name, AttribArray::Vec3(values));
        }
        for (k, name) in schema.names::<Vector4<f64>>().iter().enumerate() {
            let values = corner_data.iter().map(|d| d.vec4s[k]).collect();
            mesh.add_attrib(name, AttribArray::Vec4(values));
        }

        (mesh, map)
    }
}

fn check_polygons<const N: usize>(vertices: &[Point3<f64>], faces: &[[usize; N]]) -> Result<()> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }
    for (fi, face) in faces.iter().enumerate() {
        if let Some(&vi) = face.iter().find(|&&vi| vi >= vertices.len()) {
            return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
        }
        if (0..N).any(|i| face[i + 1..].contains(&face[i])) {
            return Err(MeshError::DegenerateFace { face: fi });
        }
    }
    Ok(())
}

fn build_strict<I: MeshIndex>(source: &IndexedMesh) -> Result<HalfEdgeMesh<I>> {
    let mut policy = RejectFaces::default();
    let mesh = HalfEdgeMesh::from_indexed(source, &mut policy)?;
    if policy.rejected > 0 {
        return Err(MeshError::NonManifold {
            details: format!("{} faces could not be added", policy.rejected),
        });
    }
    Ok(mesh)
}

/// Build a half-edge mesh from vertices and triangle faces.
///
/// Unlike [`HalfEdgeMesh::from_indexed`], any face that cannot be added is
/// an error.
///
/// # Example
/// ```
/// use topomesh::mesh::{build_from_triangles, HalfEdgeMesh};
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(0.5, 1.0, 0.0),
/// ];
/// let faces = vec![[0, 1, 2]];
///
/// let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
/// assert_eq!(mesh.num_vertices(), 3);
/// assert_eq!(mesh.num_faces(), 1);
/// ```
pub fn build_from_triangles<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 3]],
) -> Result<HalfEdgeMesh<I>> {
    check_polygons(vertices, faces)?;
    build_strict(&IndexedMesh::from_triangles(vertices.to_vec(), faces))
}

/// Build a half-edge mesh from vertices and quad faces.
pub fn build_from_quads<I: MeshIndex>(
    vertices: &[Point3<f64>],
    faces: &[[usize; 4]],
) -> Result<HalfEdgeMesh<I>> {
    check_polygons(vertices, faces)?;
    build_strict(&IndexedMesh::from_quads(vertices.to_vec(), faces))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{faceted_cube, unit_cube, NORMAL_ATTRIB};

    fn import(source: &IndexedMesh) -> HalfEdgeMesh {
        HalfEdgeMesh::from_indexed(source, &mut DropNonManifoldFaces::new()).unwrap()
    }

    #[test]
    fn test_round_trip_preserves_geometry() {
        let source = unit_cube();
        let mesh = import(&source);
        assert!(mesh.is_valid());
        assert!(mesh.check_integrity());
        assert_eq!(mesh.num_wedges(), 8);

        let (out, map) = mesh.to_poly_mesh();
        assert_eq!(out.num_vertices(), 8);
        assert_eq!(out.num_faces(), 6);
        assert_eq!(map.num_outputs(), 8);
        for p in &source.positions {
            assert!(out.positions.contains(p));
        }

        // Each corner's output vertex sits on its half-edge's to-vertex
        for he in mesh.halfedge_ids() {
            match map.output_of(he) {
                Some(o) => assert_eq!(out.positions[o], *mesh.position(mesh.to_vertex(he))),
                None => assert!(mesh.is_boundary_halfedge(he)),
            }
        }

        let (tris, _) = mesh.to_triangle_mesh();
        assert_eq!(tris.num_faces(), 12);
        assert!(tris.is_triangle_mesh());
    }

    #[test]
    fn test_seams_survive_import() {
        let source = faceted_cube();
        let mesh = import(&source);

        assert_eq!(mesh.num_vertices(), 8);
        assert_eq!(mesh.num_faces(), 6);
        assert_eq!(mesh.num_wedges(), 24);
        for v in mesh.vertex_ids() {
            assert!(mesh.is_feature_vertex(v));
            assert_eq!(mesh.vertex_wedges(v).len(), 3);
        }
        for e in mesh.edge_ids() {
            assert!(mesh.is_feature_edge(e));
        }

        let (out, _) = mesh.to_poly_mesh();
        assert_eq!(out.num_vertices(), 24);
        let normals = out.normals().unwrap();
        assert!(normals.iter().all(|n| (n.norm() - 1.0).abs() < 1e-12));
    }

    #[test]
    fn test_input_index_recorded() {
        let source = faceted_cube();
        let mesh = import(&source);
        for f in mesh.face_ids() {
            for he in mesh.face_halfedges(f) {
                let input = mesh.halfedge(he).input_index.unwrap();
                assert_eq!(source.positions[input], *mesh.position(mesh.to_vertex(he)));
            }
        }
    }

    #[test]
    fn test_policy_receives_non_manifold_faces() {
        // Three triangles on the edge 0-1
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.5, 1.0, 0.0),
            Point3::new(0.5, -1.0, 0.0),
            Point3::new(0.5, 0.0, 1.0),
        ];
        let source =
            IndexedMesh::from_triangles(positions.clone(), &[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);

        let mut policy = DropNonManifoldFaces::new();
        let mesh: HalfEdgeMesh = HalfEdgeMesh::from_indexed(&source, &mut policy).unwrap();
        assert_eq!(policy.dropped(), 1);
        assert_eq!(mesh.num_faces(), 2);
        assert!(mesh.is_valid());

        let strict: Result<HalfEdgeMesh> =
            build_from_triangles(&positions, &[[0, 1, 2], [1, 0, 3], [0, 1, 4]]);
        assert!(matches!(strict, Err(MeshError::NonManifold { .. })));
    }

    #[test]
    fn test_degenerate_polygon_goes_to_policy() {
        // Two distinct inputs at the same position collapse into one vertex
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        ];
        let source = IndexedMesh::from_triangles(positions, &[[0, 1, 2], [0, 1, 3]]);
        let mut policy = DropNonManifoldFaces::new();
        let mesh: HalfEdgeMesh = HalfEdgeMesh::from_indexed(&source, &mut policy).unwrap();
        assert_eq!(policy.dropped(), 1);
        assert_eq!(mesh.num_faces(), 1);
    }

    #[test]
    fn test_import_errors() {
        let empty = IndexedMesh::new(vec![Point3::origin()], Vec::new());
        let result: Result<HalfEdgeMesh> =
            HalfEdgeMesh::from_indexed(&empty, &mut DropNonManifoldFaces::new());
        assert!(matches!(result, Err(MeshError::EmptyMesh)));

        let bad = IndexedMesh::new(vec![Point3::origin(); 3], vec![vec![0, 1, 7]]);
        let result: Result<HalfEdgeMesh> =
            HalfEdgeMesh::from_indexed(&bad, &mut DropNonManifoldFaces::new());
        assert!(matches!(
            result,
            Err(MeshError::InvalidVertexIndex { face: 0, vertex: 7 })
        ));

        let degenerate: Result<HalfEdgeMesh> =
            build_from_triangles(&[Point3::origin(); 3], &[[0, 0, 1]]);
        assert!(matches!(degenerate, Err(MeshError::DegenerateFace { face: 0 })));
    }

    #[test]
    fn test_wrong_sized_attribute_is_skipped() {
        let source = unit_cube()
            .with_attrib("weight", AttribArray::Float(vec![1.0; 3]))
            .with_attrib(NORMAL_ATTRIB, AttribArray::Vec3(vec![Vector3::z(); 8]));
        let mesh = import(&source);

        assert!(mesh.wedges().attrib_index::<f64>("weight").is_none());
        assert_eq!(mesh.wedges().schema().normal_index(), Some(0));

        let (out, _) = mesh.to_poly_mesh();
        assert!(out.attrib("weight").is_none());
        assert!(out.normals().is_some());
    }

    #[test]
    fn test_build_from_quads() {
        let cube = unit_cube();
        let quads: Vec<[usize; 4]> = cube
            .polygons
            .iter()
            .map(|p| [p[0], p[1], p[2], p[3]])
            .collect();
        let mesh: HalfEdgeMesh = build_from_quads(&cube.positions, &quads).unwrap();
        assert!(mesh.is_quad_mesh());
        assert!(mesh.vertex_ids().all(|v| !mesh.is_boundary_vertex(v)));
        assert_eq!(mesh.num_edges(), 12);
    }
}
