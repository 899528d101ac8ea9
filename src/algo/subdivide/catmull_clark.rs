//! Catmull-Clark subdivision with stencil recording.

use nalgebra::Point3;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::algo::Progress;
use crate::error::{MeshError, Result};
use crate::mesh::{EdgeId, FaceId, HalfEdgeId, HalfEdgeMesh, MeshIndex, VertexId, WedgeData};

use super::stencil::{IterationStencils, Stencil, SubdivisionStencils};
use super::SubdivideOptions;

/// Catmull-Clark subdivider for polygon meshes with corner attributes.
///
/// Every new vertex position and every new corner attribute is recorded as
/// an affine [`Stencil`], so the whole refinement can later be replayed on
/// new coarse positions and normals with
/// [`recompute`](CatmullClarkSubdivider::recompute) without touching the
/// topology again.
///
/// Use it in three steps:
///
/// ```
/// use topomesh::algo::subdivide::CatmullClarkSubdivider;
/// use topomesh::mesh::{unit_cube, DropNonManifoldFaces, HalfEdgeMesh};
///
/// let mut mesh: HalfEdgeMesh =
///     HalfEdgeMesh::from_indexed(&unit_cube(), &mut DropNonManifoldFaces::new()).unwrap();
///
/// let mut subdivider = CatmullClarkSubdivider::new();
/// subdivider.prepare(&mut mesh);
/// subdivider.subdivide(&mut mesh, 1, true).unwrap();
/// subdivider.cleanup(&mut mesh);
///
/// assert_eq!(mesh.num_vertices(), 26);
/// assert_eq!(mesh.num_faces(), 48);
/// ```
///
/// # Vertex Rules
///
/// - **Face point**: centroid of the face corners
/// - **Edge point**: average of the endpoints and the two face points, or the
///   midpoint for boundary edges
/// - **Interior vertex point**: `(Q + 2R + (n-3)S) / n` where Q averages the
///   adjacent face points, R the incident edge midpoints and S is the old
///   position
/// - **Boundary vertex point**: average of the old position and the edge
///   points of its boundary edges
#[derive(Debug, Clone)]
pub struct CatmullClarkSubdivider<I: MeshIndex = u32> {
    pub(super) parallel: bool,
    triangulate: bool,
    prepared: bool,

    face_vertex: Vec<VertexId<I>>,
    face_wedge: Vec<WedgeData>,
    edge_vertex: Vec<VertexId<I>>,
    scratch: Vec<Point3<f64>>,

    /// Coarse vertex at the to-end of every interior half-edge of the
    /// prepared mesh.
    pub(super) coarse_vertex: Vec<Option<VertexId<I>>>,
    pub(super) stencils: SubdivisionStencils<I>,
}

impl<I: MeshIndex> Default for CatmullClarkSubdivider<I> {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of the parallel part of the face phase.
type FacePoint<I> = (Point3<f64>, Vec<(f64, VertexId<I>)>, WedgeData);

impl<I: MeshIndex> CatmullClarkSubdivider<I> {
    /// Create a parallel subdivider that triangulates its output.
    pub fn new() -> Self {
        Self::with_options(&SubdivideOptions::default())
    }

    /// Create a subdivider using the flags of `options`.
    pub fn with_options(options: &SubdivideOptions) -> Self {
        Self {
            parallel: options.parallel,
            triangulate: options.triangulate,
            prepared: false,
            face_vertex: Vec::new(),
            face_wedge: Vec::new(),
            edge_vertex: Vec::new(),
            scratch: Vec::new(),
            coarse_vertex: Vec::new(),
            stencils: SubdivisionStencils::default(),
        }
    }

    /// The stencils recorded by the last call to
    /// [`subdivide`](Self::subdivide).
    pub fn stencils(&self) -> &SubdivisionStencils<I> {
        &self.stencils
    }

    /// Attach to `mesh`.
    ///
    /// Gives every interior corner a wedge and records which coarse vertex
    /// each half-edge points at, for later replay.
    pub fn prepare(&mut self, mesh: &mut HalfEdgeMesh<I>) {
        mesh.ensure_wedges();
        self.coarse_vertex = (0..mesh.num_halfedges())
            .map(|i| {
                let h = mesh.halfedge(HalfEdgeId::new(i));
                (!h.is_deleted() && !h.is_boundary()).then_some(h.vertex)
            })
            .collect();
        self.prepared = true;
    }

    /// Drop the per-iteration working data.
    ///
    /// The stencils and the coarse vertex map are kept for
    /// [`recompute`](Self::recompute).
    pub fn cleanup(&mut self, _mesh: &mut HalfEdgeMesh<I>) {
        self.face_vertex = Vec::new();
        self.face_wedge = Vec::new();
        self.edge_vertex = Vec::new();
        self.scratch = Vec::new();
        self.prepared = false;
    }

    /// Run `n` subdivision iterations on a prepared mesh.
    ///
    /// With `update_points == false` the old vertices keep their positions
    /// and edge points are plain midpoints. Previously recorded stencils are
    /// replaced.
    ///
    /// # Errors
    ///
    /// [`MeshError::InvalidState`] if [`prepare`](Self::prepare) was not
    /// called since the last subdivision, or if the mesh holds deleted
    /// elements.
    pub fn subdivide(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        n: usize,
        update_points: bool,
    ) -> Result<()> {
        self.subdivide_with_progress(mesh, n, update_points, &Progress::none())
    }

    /// [`subdivide`](Self::subdivide) reporting one step per iteration.
    pub fn subdivide_with_progress(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        n: usize,
        update_points: bool,
        progress: &Progress,
    ) -> Result<()> {
        if !self.prepared {
            return Err(MeshError::InvalidState(
                "subdivider must be prepared on the mesh before subdividing".into(),
            ));
        }
        if mesh.has_deleted_elements() {
            return Err(MeshError::InvalidState(
                "mesh has deleted elements; run garbage_collection first".into(),
            ));
        }

        self.stencils = SubdivisionStencils::default();
        for iter in 0..n {
            progress.report(iter, n, "Catmull-Clark subdivision");
            let mut stencils = IterationStencils::default();

            let num_vertices = mesh.num_vertices();
            let num_edges = mesh.num_edges();
            let num_faces = mesh.num_faces();

            self.compute_face_points(mesh, &mut stencils);
            self.compute_edge_points(mesh, update_points, &mut stencils);
            if update_points {
                self.update_old_vertices(mesh, num_vertices, &mut stencils);
            }

            for e in 0..num_edges {
                self.split_edge(mesh, EdgeId::new(e), &mut stencils);
            }
            for f in 0..num_faces {
                self.split_face(mesh, FaceId::new(f), &mut stencils);
            }

            debug!(
                iteration = iter,
                vertices = mesh.num_vertices(),
                faces = mesh.num_faces(),
                wedges = mesh.num_wedges(),
                "subdivision step done"
            );
            debug_assert!(mesh.is_valid());
            debug_assert!(mesh.check_integrity());
            self.stencils.iterations.push(stencils);
        }

        if self.triangulate {
            let triangulation = &mut self.stencils.triangulation;
            mesh.triangulate_with(|new, source| triangulation.push(Stencil::copy(new, source)));
            debug_assert!(mesh.check_integrity());
        }
        progress.report(n, n, "Catmull-Clark subdivision");

        info!(
            iterations = n,
            vertices = mesh.num_vertices(),
            faces = mesh.num_faces(),
            stencils = self.stencils.len(),
            "Catmull-Clark subdivision complete"
        );
        self.prepared = false;
        Ok(())
    }

    fn compute_face_points(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        stencils: &mut IterationStencils<I>,
    ) {
        let num_faces = mesh.num_faces();
        let compute = |i: usize| -> FacePoint<I> {
            let f = FaceId::new(i);
            let corners: Vec<VertexId<I>> = mesh.face_vertices(f).collect();
            let w = 1.0 / corners.len() as f64;
            let terms = corners.into_iter().map(|v| (w, v)).collect();
            (mesh.face_centroid(f), terms, mesh.face_wedge_average(f))
        };

        let points: Vec<FacePoint<I>> = if self.parallel {
            (0..num_faces).into_par_iter().map(compute).collect()
        } else {
            (0..num_faces).map(compute).collect()
        };

        self.face_vertex.clear();
        self.face_wedge.clear();
        for (centroid, terms, wedge) in points {
            let vh = mesh.add_vertex(centroid);
            self.face_vertex.push(vh);
            self.face_wedge.push(wedge);
            stencils.face_vertices.push(Stencil::new(vh, terms));
        }
    }

    fn compute_edge_points(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        update_points: bool,
        stencils: &mut IterationStencils<I>,
    ) {
        let num_edges = mesh.num_edges();
        let face_vertex = &self.face_vertex;
        let compute = |i: usize| -> Vec<(f64, VertexId<I>)> {
            let e = EdgeId::new(i);
            let heh = e.halfedge(0);
            let opp = e.halfedge(1);
            let ends = [mesh.to_vertex(heh), mesh.to_vertex(opp)];

            if mesh.is_boundary_edge(e) || !update_points {
                vec![(0.5, ends[0]), (0.5, ends[1])]
            } else {
                vec![
                    (0.25, ends[0]),
                    (0.25, ends[1]),
                    (0.25, face_vertex[mesh.face_of(heh).index()]),
                    (0.25, face_vertex[mesh.face_of(opp).index()]),
                ]
            }
        };

        let terms: Vec<Vec<(f64, VertexId<I>)>> = if self.parallel {
            (0..num_edges).into_par_iter().map(compute).collect()
        } else {
            (0..num_edges).map(compute).collect()
        };

        self.edge_vertex.clear();
        for terms in terms {
            let p = weighted_point(mesh, &terms);
            let vh = mesh.add_vertex(p);
            self.edge_vertex.push(vh);
            stencils.edge_vertices.push(Stencil::new(vh, terms));
        }
    }

    fn update_old_vertices(
        &mut self,
        mesh: &mut HalfEdgeMesh<I>,
        num_vertices: usize,
        stencils: &mut IterationStencils<I>,
    ) {
        let face_vertex = &self.face_vertex;
        let edge_vertex = &self.edge_vertex;
        let compute = |i: usize| -> Vec<(f64, VertexId<I>)> {
            let v = VertexId::new(i);
            if mesh.is_isolated(v) {
                return vec![(1.0, v)];
            }

            if mesh.is_boundary_vertex(v) {
                let boundary_points: Vec<VertexId<I>> = mesh
                    .vertex_halfedges(v)
                    .filter(|he| mesh.is_boundary_edge(he.edge()))
                    .map(|he| edge_vertex[he.edge().index()])
                    .collect();
                let w = 1.0 / (boundary_points.len() + 1) as f64;
                let mut terms = vec![(w, v)];
                terms.extend(boundary_points.into_iter().map(|p| (w, p)));
                return terms;
            }

            let n = mesh.valence(v) as f64;
            let w = 1.0 / (n * n);
            let mut terms: Vec<(f64, VertexId<I>)> =
                mesh.vertex_neighbors(v).map(|u| (w, u)).collect();
            terms.extend(mesh.vertex_faces(v).map(|f| (w, face_vertex[f.index()])));
            terms.push(((n - 2.0) / n, v));
            terms
        };

        let terms: Vec<Vec<(f64, VertexId<I>)>> = if self.parallel {
            (0..num_vertices).into_par_iter().map(compute).collect()
        } else {
            (0..num_vertices).map(compute).collect()
        };

        // All new points are computed from the old ones before any moves
        self.scratch.clear();
        self.scratch
            .extend(terms.iter().map(|t| weighted_point(mesh, t)));
        for (i, (terms, &p)) in terms.into_iter().zip(&self.scratch).enumerate() {
            let v = VertexId::new(i);
            mesh.set_position(v, p);
            mesh.refresh_wedge_positions(v);
            stencils.old_vertices.push(Stencil::new(v, terms));
        }
    }

    fn split_edge(
        &self,
        mesh: &mut HalfEdgeMesh<I>,
        e: EdgeId<I>,
        stencils: &mut IterationStencils<I>,
    ) {
        let heh = e.halfedge(0);
        let opp = e.halfedge(1);
        let vh = self.edge_vertex[e.index()];
        let vh1 = mesh.to_vertex(heh);
        let t = mesh.prev(opp);
        let p = *mesh.position(vh);

        let new = mesh.new_edge(vh, vh1);
        let opp_new = new.opposite();
        let heh_next = mesh.next(heh);
        mesh.halfedge_mut(heh).vertex = vh;

        mesh.link(t, opp_new);
        mesh.link(new, heh_next);
        mesh.link(heh, new);
        mesh.link(opp_new, opp);

        let opp_face = mesh.face_of(opp);
        if opp_face.is_valid() {
            mesh.halfedge_mut(opp_new).face = opp_face;
            mesh.face_mut(opp_face).halfedge = opp_new;

            let data = mesh.blend_wedges(&[(0.5, t), (0.5, opp)], p);
            mesh.replace_wedge(opp_new, data);
            stencils
                .edge_props
                .push(Stencil::new(opp_new, vec![(0.5, t), (0.5, opp)]));
        }

        let heh_face = mesh.face_of(heh);
        if heh_face.is_valid() {
            mesh.halfedge_mut(new).face = heh_face;
            mesh.face_mut(heh_face).halfedge = heh;

            mesh.replace_wedge_index(new, mesh.wedge_index(heh));
            stencils.edge_props.push(Stencil::copy(new, heh));

            let heh_prev = mesh.prev(heh);
            let data = mesh.blend_wedges(&[(0.5, heh_prev), (0.5, new)], p);
            mesh.replace_wedge(heh, data);
            stencils
                .edge_props
                .push(Stencil::new(heh, vec![(0.5, heh_prev), (0.5, new)]));
        }

        mesh.vertex_mut(vh).halfedge = new;
        mesh.vertex_mut(vh1).halfedge = opp_new;
        mesh.adjust_outgoing_halfedge(vh);
        mesh.adjust_outgoing_halfedge(vh1);
    }

    /// Split an n-gon whose edges were already split into n quads around
    /// its face point.
    ///
    /// The face keeps the quad at its stored half-edge; the others are new.
    fn split_face(
        &self,
        mesh: &mut HalfEdgeMesh<I>,
        f: FaceId<I>,
        stencils: &mut IterationStencils<I>,
    ) {
        let valence = mesh.face_valence(f) / 2;
        let vh = self.face_vertex[f.index()];
        let center = &self.face_wedge[f.index()];

        let hend = mesh.face(f).halfedge;
        let mut hh = mesh.next(hend);
        let first = mesh.new_edge(mesh.to_vertex(hend), vh);
        mesh.link(hend, first);
        mesh.halfedge_mut(first).face = f;
        mesh.replace_wedge(first, center.clone());

        let mut hold = first.opposite();
        mesh.replace_wedge_index(hold, mesh.wedge_index(hend));
        stencils.face_props.push(Stencil::copy(hold, hend));

        let w = 1.0 / valence as f64;
        let mut corners: Vec<(f64, HalfEdgeId<I>)> = Vec::with_capacity(valence);
        corners.push((w, hh));

        for _ in 1..valence {
            let hnext = mesh.next(hh);
            let hnew = mesh.new_edge(mesh.to_vertex(hnext), vh);

            let fnew = mesh.new_face();
            mesh.face_mut(fnew).halfedge = hh;
            for he in [hnew, hold, hh, hnext] {
                mesh.halfedge_mut(he).face = fnew;
            }
            mesh.link(hnew, hold);
            mesh.link(hold, hh);
            mesh.replace_wedge(hnew, center.clone());

            hh = mesh.next(hnext);
            hold = hnew.opposite();
            mesh.link(hnext, hnew);

            mesh.replace_wedge_index(hold, mesh.wedge_index(hnext));
            stencils.face_props.push(Stencil::copy(hold, hnext));
            corners.push((w, hh));
        }

        mesh.link(hold, hh);
        mesh.link(hh, hend);
        mesh.link(first, hold);
        mesh.halfedge_mut(hold).face = f;
        mesh.vertex_mut(vh).halfedge = hold;

        let incoming: Vec<HalfEdgeId<I>> = mesh.vertex_incoming(vh).collect();
        for he in incoming {
            stencils.face_props.push(Stencil::new(he, corners.clone()));
        }
    }
}

fn weighted_point<I: MeshIndex>(
    mesh: &HalfEdgeMesh<I>,
    terms: &[(f64, VertexId<I>)],
) -> Point3<f64> {
    Point3::from(
        terms
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, &(w, v)| acc + mesh.position(v).coords * w),
    )
}

/// Performs Catmull-Clark subdivision on a polygon mesh.
///
/// Each iteration splits every n-gon into n quads. With
/// [`SubdivideOptions::triangulate`] set, the resulting quads are split into
/// triangles at the end. Returns the subdivider holding the recorded
/// stencils, ready for [`CatmullClarkSubdivider::recompute`].
///
/// # Example
///
/// ```
/// use topomesh::algo::subdivide::{catmull_clark_subdivide, SubdivideOptions};
/// use topomesh::mesh::{unit_cube, DropNonManifoldFaces, HalfEdgeMesh};
///
/// let mut mesh: HalfEdgeMesh =
///     HalfEdgeMesh::from_indexed(&unit_cube(), &mut DropNonManifoldFaces::new()).unwrap();
///
/// let options = SubdivideOptions::new(2).with_triangulate(false);
/// catmull_clark_subdivide(&mut mesh, &options).unwrap();
/// assert_eq!(mesh.num_faces(), 96);
/// assert!(mesh.is_quad_mesh());
/// ```
pub fn catmull_clark_subdivide<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    options: &SubdivideOptions,
) -> Result<CatmullClarkSubdivider<I>> {
    catmull_clark_subdivide_with_progress(mesh, options, &Progress::none())
}

/// Catmull-Clark subdivision with progress reporting.
pub fn catmull_clark_subdivide_with_progress<I: MeshIndex>(
    mesh: &mut HalfEdgeMesh<I>,
    options: &SubdivideOptions,
    progress: &Progress,
) -> Result<CatmullClarkSubdivider<I>> {
    let mut subdivider = CatmullClarkSubdivider::with_options(options);
    subdivider.prepare(mesh);
    subdivider.subdivide_with_progress(mesh, options.iterations, options.update_points, progress)?;
    subdivider.cleanup(mesh);
    Ok(subdivider)
}
