//! Half-edge mesh data structure.
//!
//! This module provides a half-edge (doubly-connected edge list) representation
//! for polygon meshes with per-corner attributes. The structure enables O(1)
//! adjacency queries and is the foundation for the editing operations in
//! [`topology`](super::topology) and the subdivision engine.
//!
//! # Structure
//!
//! - Each edge is split into two **half-edges** pointing in opposite directions.
//!   They are allocated together, so the opposite of half-edge `h` is `h ^ 1`.
//! - Each half-edge knows the **vertex it points to**, its **next** and **prev**
//!   half-edges around the face, its **face**, and the **wedge** holding the
//!   attributes of the face corner at its to-vertex.
//! - Each vertex stores one outgoing half-edge.
//! - Each face stores one half-edge on its boundary.
//!
//! # Boundary Handling
//!
//! Boundary half-edges have an invalid face ID and an invalid wedge. The
//! outgoing half-edge stored for a boundary vertex is always a boundary
//! half-edge, which makes the boundary test O(1).
//!
//! # Deletion
//!
//! Editing operations mark elements as deleted instead of removing them, so
//! handles stay stable until [`HalfEdgeMesh::garbage_collection`] compacts the
//! arrays. The element counts returned by `num_*` include deleted elements.

use nalgebra::{Point3, Vector3};
use tracing::warn;

use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId, WedgeIndex};
use super::wedge::WedgeStore;

/// A vertex in the half-edge mesh.
#[derive(Debug, Clone)]
pub struct Vertex<I: MeshIndex = u32> {
    /// The 3D position of this vertex.
    pub position: Point3<f64>,

    /// One outgoing half-edge from this vertex.
    /// For boundary vertices, this is guaranteed to be a boundary half-edge.
    pub halfedge: HalfEdgeId<I>,

    pub(crate) deleted: bool,
}

impl<I: MeshIndex> Vertex<I> {
    /// Create a new isolated vertex at the given position.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            halfedge: HalfEdgeId::invalid(),
            deleted: false,
        }
    }

    /// Whether the vertex has been deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// A half-edge in the mesh.
#[derive(Debug, Clone, Copy)]
pub struct HalfEdge<I: MeshIndex = u32> {
    /// The vertex this half-edge points to.
    pub vertex: VertexId<I>,

    /// The next half-edge around the face (counter-clockwise).
    pub next: HalfEdgeId<I>,

    /// The previous half-edge around the face (clockwise).
    pub prev: HalfEdgeId<I>,

    /// The face this half-edge belongs to.
    /// Invalid for boundary half-edges.
    pub face: FaceId<I>,

    /// Attributes of the face corner at [`vertex`](Self::vertex).
    /// Invalid for boundary half-edges.
    pub wedge: WedgeIndex<I>,

    /// Index of the interchange-mesh vertex this corner was imported from.
    pub input_index: Option<usize>,

    pub(crate) deleted: bool,
}

impl<I: MeshIndex> HalfEdge<I> {
    /// Create a new half-edge pointing at `vertex`, not yet linked.
    pub fn new(vertex: VertexId<I>) -> Self {
        Self {
            vertex,
            next: HalfEdgeId::invalid(),
            prev: HalfEdgeId::invalid(),
            face: FaceId::invalid(),
            wedge: WedgeIndex::invalid(),
            input_index: None,
            deleted: false,
        }
    }

    /// Check if this half-edge is on the boundary.
    #[inline]
    pub fn is_boundary(&self) -> bool {
        !self.face.is_valid()
    }

    /// Whether the half-edge (and therefore its edge) has been deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// A face in the half-edge mesh.
#[derive(Debug, Clone, Copy)]
pub struct Face<I: MeshIndex = u32> {
    /// One half-edge on the boundary of this face.
    pub halfedge: HalfEdgeId<I>,

    pub(crate) deleted: bool,
}

impl<I: MeshIndex> Face<I> {
    /// Create a new face with the given half-edge.
    pub fn new(halfedge: HalfEdgeId<I>) -> Self {
        Self {
            halfedge,
            deleted: false,
        }
    }

    /// Whether the face has been deleted.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// A half-edge mesh with per-corner wedge attributes.
///
/// Vertices, half-edges and faces live in flat arrays and refer to each other
/// by index. The wedge store holds the attribute bundles referenced by the
/// half-edges.
#[derive(Debug, Clone)]
pub struct HalfEdgeMesh<I: MeshIndex = u32> {
    /// All vertices in the mesh.
    pub(crate) vertices: Vec<Vertex<I>>,

    /// All half-edges in the mesh, in opposite pairs.
    pub(crate) halfedges: Vec<HalfEdge<I>>,

    /// All faces in the mesh.
    pub(crate) faces: Vec<Face<I>>,

    /// Corner attribute bundles referenced by interior half-edges.
    pub(crate) wedges: WedgeStore<I>,
}

impl<I: MeshIndex> Default for HalfEdgeMesh<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Create a new empty mesh.
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            halfedges: Vec::new(),
            faces: Vec::new(),
            wedges: WedgeStore::new(),
        }
    }

    /// Create a mesh with pre-allocated capacity.
    pub fn with_capacity(num_vertices: usize, num_faces: usize) -> Self {
        // Closed triangle mesh: E = 3F/2, so HE = 3F; leave room for boundaries
        let num_halfedges = num_faces * 3 + num_faces / 2;

        Self {
            vertices: Vec::with_capacity(num_vertices),
            halfedges: Vec::with_capacity(num_halfedges),
            faces: Vec::with_capacity(num_faces),
            wedges: WedgeStore::new(),
        }
    }

    // ==================== Accessors ====================

    /// Number of vertex slots, deleted ones included.
    #[inline]
    pub fn num_vertices(&self) -> usize {
        self.vertices.len()
    }

    /// Number of half-edge slots, deleted ones included.
    #[inline]
    pub fn num_halfedges(&self) -> usize {
        self.halfedges.len()
    }

    /// Number of edge slots, deleted ones included.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.halfedges.len() / 2
    }

    /// Number of face slots, deleted ones included.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Whether any vertex, edge or face is marked deleted.
    pub fn has_deleted_elements(&self) -> bool {
        self.vertices.iter().any(|v| v.deleted)
            || self.halfedges.iter().any(|h| h.deleted)
            || self.faces.iter().any(|f| f.deleted)
    }

    /// Whether garbage collection would remove anything, dead wedges included.
    pub fn has_garbage(&self) -> bool {
        self.has_deleted_elements() || self.wedges.num_live() != self.wedges.len()
    }

    /// Get a vertex by ID.
    #[inline]
    pub fn vertex(&self, id: VertexId<I>) -> &Vertex<I> {
        &self.vertices[id.index()]
    }

    /// Get a mutable vertex by ID.
    #[inline]
    pub fn vertex_mut(&mut self, id: VertexId<I>) -> &mut Vertex<I> {
        &mut self.vertices[id.index()]
    }

    /// Get a half-edge by ID.
    #[inline]
    pub fn halfedge(&self, id: HalfEdgeId<I>) -> &HalfEdge<I> {
        &self.halfedges[id.index()]
    }

    /// Get a mutable half-edge by ID.
    #[inline]
    pub fn halfedge_mut(&mut self, id: HalfEdgeId<I>) -> &mut HalfEdge<I> {
        &mut self.halfedges[id.index()]
    }

    /// Get a face by ID.
    #[inline]
    pub fn face(&self, id: FaceId<I>) -> &Face<I> {
        &self.faces[id.index()]
    }

    /// Get a mutable face by ID.
    #[inline]
    pub fn face_mut(&mut self, id: FaceId<I>) -> &mut Face<I> {
        &mut self.faces[id.index()]
    }

    /// Get the position of a vertex.
    #[inline]
    pub fn position(&self, v: VertexId<I>) -> &Point3<f64> {
        &self.vertex(v).position
    }

    /// Set the position of a vertex.
    ///
    /// Wedge positions are not touched; call
    /// [`refresh_wedge_positions`](Self::refresh_wedge_positions) afterwards to
    /// keep the corner data in sync.
    #[inline]
    pub fn set_position(&mut self, v: VertexId<I>, pos: Point3<f64>) {
        self.vertex_mut(v).position = pos;
    }

    /// The wedge store.
    #[inline]
    pub fn wedges(&self) -> &WedgeStore<I> {
        &self.wedges
    }

    // ==================== Topology Queries ====================

    /// Get the opposite half-edge.
    #[inline]
    pub fn opposite(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        he.opposite()
    }

    /// Get the next half-edge around the face.
    #[inline]
    pub fn next(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).next
    }

    /// Get the previous half-edge around the face.
    #[inline]
    pub fn prev(&self, he: HalfEdgeId<I>) -> HalfEdgeId<I> {
        self.halfedge(he).prev
    }

    /// Get the vertex a half-edge points to.
    #[inline]
    pub fn to_vertex(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.halfedge(he).vertex
    }

    /// Get the vertex a half-edge starts from.
    #[inline]
    pub fn from_vertex(&self, he: HalfEdgeId<I>) -> VertexId<I> {
        self.to_vertex(he.opposite())
    }

    /// Get the face of a half-edge.
    #[inline]
    pub fn face_of(&self, he: HalfEdgeId<I>) -> FaceId<I> {
        self.halfedge(he).face
    }

    /// Get the edge a half-edge belongs to.
    #[inline]
    pub fn edge_of(&self, he: HalfEdgeId<I>) -> EdgeId<I> {
        he.edge()
    }

    /// Get one of the two half-edges of an edge.
    #[inline]
    pub fn edge_halfedge(&self, e: EdgeId<I>, side: usize) -> HalfEdgeId<I> {
        e.halfedge(side)
    }

    /// Check if a half-edge is on the boundary.
    #[inline]
    pub fn is_boundary_halfedge(&self, he: HalfEdgeId<I>) -> bool {
        self.halfedge(he).is_boundary()
    }

    /// Check if an edge has a boundary half-edge on either side.
    #[inline]
    pub fn is_boundary_edge(&self, e: EdgeId<I>) -> bool {
        self.is_boundary_halfedge(e.halfedge(0)) || self.is_boundary_halfedge(e.halfedge(1))
    }

    /// Check if a vertex is on the boundary. Isolated vertices count as boundary.
    #[inline]
    pub fn is_boundary_vertex(&self, v: VertexId<I>) -> bool {
        let h = self.vertex(v).halfedge;
        !h.is_valid() || self.is_boundary_halfedge(h)
    }

    /// Whether a vertex has no incident edge.
    #[inline]
    pub fn is_isolated(&self, v: VertexId<I>) -> bool {
        !self.vertex(v).halfedge.is_valid()
    }

    /// Whether the half-edge's edge has been deleted.
    #[inline]
    pub fn is_deleted_edge(&self, e: EdgeId<I>) -> bool {
        self.halfedge(e.halfedge(0)).deleted
    }

    // ==================== Iteration ====================

    /// Iterate over live vertex IDs.
    pub fn vertex_ids(&self) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertices
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.deleted)
            .map(|(i, _)| VertexId::new(i))
    }

    /// Iterate over live half-edge IDs.
    pub fn halfedge_ids(&self) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        self.halfedges
            .iter()
            .enumerate()
            .filter(|(_, h)| !h.deleted)
            .map(|(i, _)| HalfEdgeId::new(i))
    }

    /// Iterate over live edge IDs.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId<I>> + '_ {
        (0..self.num_edges())
            .map(EdgeId::new)
            .filter(|&e| !self.is_deleted_edge(e))
    }

    /// Iterate over live face IDs.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.faces
            .iter()
            .enumerate()
            .filter(|(_, f)| !f.deleted)
            .map(|(i, _)| FaceId::new(i))
    }

    /// Iterate over outgoing half-edges around a vertex.
    pub fn vertex_halfedges(&self, v: VertexId<I>) -> VertexHalfEdgeIter<'_, I> {
        VertexHalfEdgeIter::new(self, v)
    }

    /// Iterate over incoming half-edges around a vertex.
    pub fn vertex_incoming(&self, v: VertexId<I>) -> impl Iterator<Item = HalfEdgeId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| he.opposite())
    }

    /// Iterate over vertices adjacent to a vertex.
    pub fn vertex_neighbors(&self, v: VertexId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.vertex_halfedges(v).map(|he| self.to_vertex(he))
    }

    /// Iterate over faces adjacent to a vertex.
    pub fn vertex_faces(&self, v: VertexId<I>) -> impl Iterator<Item = FaceId<I>> + '_ {
        self.vertex_halfedges(v)
            .map(|he| self.face_of(he))
            .filter(|f| f.is_valid())
    }

    /// Iterate over half-edges around a face.
    pub fn face_halfedges(&self, f: FaceId<I>) -> FaceHalfEdgeIter<'_, I> {
        FaceHalfEdgeIter::new(self, f)
    }

    /// Iterate over the corner vertices of a face.
    pub fn face_vertices(&self, f: FaceId<I>) -> impl Iterator<Item = VertexId<I>> + '_ {
        self.face_halfedges(f).map(|he| self.to_vertex(he))
    }

    /// Number of outgoing edges of a vertex.
    pub fn valence(&self, v: VertexId<I>) -> usize {
        self.vertex_halfedges(v).count()
    }

    /// Number of corners of a face.
    pub fn face_valence(&self, f: FaceId<I>) -> usize {
        self.face_halfedges(f).count()
    }

    /// Whether every live face is a triangle.
    pub fn is_triangle_mesh(&self) -> bool {
        self.face_ids().all(|f| self.face_valence(f) == 3)
    }

    /// Whether every live face is a quad.
    pub fn is_quad_mesh(&self) -> bool {
        self.face_ids().all(|f| self.face_valence(f) == 4)
    }

    // ==================== Geometry ====================

    /// Compute the centroid of a face (average of its corners).
    pub fn face_centroid(&self, f: FaceId<I>) -> Point3<f64> {
        let mut sum = Vector3::zeros();
        let mut n = 0;
        for v in self.face_vertices(f) {
            sum += self.position(v).coords;
            n += 1;
        }
        Point3::from(sum / n.max(1) as f64)
    }

    /// Compute the unit normal of a face (Newell's method, works for n-gons).
    pub fn face_normal(&self, f: FaceId<I>) -> Vector3<f64> {
        self.face_area_vector(f)
            .try_normalize(f64::EPSILON)
            .unwrap_or_else(Vector3::zeros)
    }

    /// Compute the area of a face.
    pub fn face_area(&self, f: FaceId<I>) -> f64 {
        self.face_area_vector(f).norm()
    }

    fn face_area_vector(&self, f: FaceId<I>) -> Vector3<f64> {
        let mut n = Vector3::zeros();
        for he in self.face_halfedges(f) {
            let p0 = self.position(self.from_vertex(he));
            let p1 = self.position(self.to_vertex(he));
            n += p0.coords.cross(&p1.coords);
        }
        n * 0.5
    }

    /// Compute the midpoint of an edge.
    pub fn edge_midpoint(&self, e: EdgeId<I>) -> Point3<f64> {
        let h = e.halfedge(0);
        let p0 = self.position(self.from_vertex(h));
        let p1 = self.position(self.to_vertex(h));
        Point3::from((p0.coords + p1.coords) * 0.5)
    }

    /// Compute the bounding box of the live vertices.
    pub fn bounding_box(&self) -> Option<(Point3<f64>, Point3<f64>)> {
        let mut live = self.vertices.iter().filter(|v| !v.deleted);
        let first = live.next()?.position;
        let (mut min, mut max) = (first, first);

        for v in live {
            for i in 0..3 {
                min[i] = min[i].min(v.position[i]);
                max[i] = max[i].max(v.position[i]);
            }
        }

        Some((min, max))
    }

    // ==================== Construction ====================

    /// Add a new isolated vertex and return its ID.
    pub fn add_vertex(&mut self, position: Point3<f64>) -> VertexId<I> {
        let id = VertexId::new(self.vertices.len());
        self.vertices.push(Vertex::new(position));
        id
    }

    /// Allocate an unlinked edge and return the half-edge running `from -> to`.
    pub(crate) fn new_edge(&mut self, from: VertexId<I>, to: VertexId<I>) -> HalfEdgeId<I> {
        let h = HalfEdgeId::new(self.halfedges.len());
        self.halfedges.push(HalfEdge::new(to));
        self.halfedges.push(HalfEdge::new(from));
        h
    }

    /// Allocate a face with no half-edge yet.
    pub(crate) fn new_face(&mut self) -> FaceId<I> {
        let f = FaceId::new(self.faces.len());
        self.faces.push(Face::new(HalfEdgeId::invalid()));
        f
    }

    /// Make `b` follow `a` around their face.
    #[inline]
    pub(crate) fn link(&mut self, a: HalfEdgeId<I>, b: HalfEdgeId<I>) {
        self.halfedges[a.index()].next = b;
        self.halfedges[b.index()].prev = a;
    }

    /// Find the half-edge running `from -> to`.
    pub fn find_halfedge(&self, from: VertexId<I>, to: VertexId<I>) -> Option<HalfEdgeId<I>> {
        self.vertex_halfedges(from).find(|&he| self.to_vertex(he) == to)
    }

    /// Make a boundary vertex store a boundary half-edge as its outgoing one.
    pub fn adjust_outgoing_halfedge(&mut self, v: VertexId<I>) {
        if let Some(he) = self
            .vertex_halfedges(v)
            .find(|&he| self.is_boundary_halfedge(he))
        {
            self.vertex_mut(v).halfedge = he;
        }
    }

    /// Add a polygon through the given vertices, in counter-clockwise order.
    ///
    /// Existing edges are reused and boundary loops are relinked as needed.
    /// Returns `None` without modifying the mesh if the face would make the
    /// mesh non-manifold: a corner vertex is already surrounded by faces, an
    /// edge already has faces on both sides, or the open fans around a vertex
    /// cannot be reordered to fit the new face.
    pub fn add_face(&mut self, vertices: &[VertexId<I>]) -> Option<FaceId<I>> {
        let n = vertices.len();
        if n < 3 {
            return None;
        }
        for (i, &v) in vertices.iter().enumerate() {
            if !v.is_valid() || v.index() >= self.vertices.len() || self.vertex(v).deleted {
                return None;
            }
            if vertices[i + 1..].contains(&v) {
                return None;
            }
        }

        let mut halfedges = vec![HalfEdgeId::<I>::invalid(); n];
        let mut is_new = vec![false; n];

        for i in 0..n {
            let ii = (i + 1) % n;
            if !self.is_boundary_vertex(vertices[i]) {
                return None;
            }
            match self.find_halfedge(vertices[i], vertices[ii]) {
                Some(he) => {
                    if !self.is_boundary_halfedge(he) {
                        return None;
                    }
                    halfedges[i] = he;
                }
                None => is_new[i] = true,
            }
        }

        // Re-link open fans so the new face's existing edges become consecutive
        let mut next_cache: Vec<(HalfEdgeId<I>, HalfEdgeId<I>)> = Vec::with_capacity(6 * n);
        for i in 0..n {
            let ii = (i + 1) % n;
            if is_new[i] || is_new[ii] {
                continue;
            }

            let inner_prev = halfedges[i];
            let inner_next = halfedges[ii];
            if self.next(inner_prev) == inner_next {
                continue;
            }

            let outer_prev = inner_next.opposite();
            let mut boundary_prev = outer_prev;
            let mut guard = self.halfedges.len();
            loop {
                boundary_prev = self.next(boundary_prev).opposite();
                if self.is_boundary_halfedge(boundary_prev) && boundary_prev != inner_prev {
                    break;
                }
                guard = guard.checked_sub(1)?;
            }
            let boundary_next = self.next(boundary_prev);
            if boundary_next == inner_next {
                return None;
            }

            let patch_start = self.next(inner_prev);
            let patch_end = self.prev(inner_next);
            next_cache.push((boundary_prev, patch_start));
            next_cache.push((patch_end, boundary_next));
            next_cache.push((inner_prev, inner_next));
        }

        for i in 0..n {
            if is_new[i] {
                halfedges[i] = self.new_edge(vertices[i], vertices[(i + 1) % n]);
            }
        }

        let f = self.new_face();
        self.face_mut(f).halfedge = halfedges[n - 1];

        let mut needs_adjust = vec![false; n];
        for i in 0..n {
            let ii = (i + 1) % n;
            let vh = vertices[ii];
            let inner_prev = halfedges[i];
            let inner_next = halfedges[ii];

            let id = usize::from(is_new[i]) | (usize::from(is_new[ii]) << 1);
            if id != 0 {
                let outer_prev = inner_next.opposite();
                let outer_next = inner_prev.opposite();

                match id {
                    1 => {
                        let boundary_prev = self.prev(inner_next);
                        next_cache.push((boundary_prev, outer_next));
                        self.vertex_mut(vh).halfedge = outer_next;
                    }
                    2 => {
                        let boundary_next = self.next(inner_prev);
                        next_cache.push((outer_prev, boundary_next));
                        self.vertex_mut(vh).halfedge = boundary_next;
                    }
                    _ => {
                        let boundary_next = self.vertex(vh).halfedge;
                        if boundary_next.is_valid() {
                            let boundary_prev = self.prev(boundary_next);
                            next_cache.push((boundary_prev, outer_next));
                            next_cache.push((outer_prev, boundary_next));
                        } else {
                            self.vertex_mut(vh).halfedge = outer_next;
                            next_cache.push((outer_prev, outer_next));
                        }
                    }
                }

                next_cache.push((inner_prev, inner_next));
            } else {
                needs_adjust[ii] = self.vertex(vh).halfedge == inner_next;
            }

            self.halfedge_mut(inner_prev).face = f;
        }

        for (a, b) in next_cache {
            self.link(a, b);
        }

        for (i, &adjust) in needs_adjust.iter().enumerate() {
            if adjust {
                self.adjust_outgoing_halfedge(vertices[i]);
            }
        }

        Some(f)
    }

    // ==================== Validation ====================

    /// Full consistency walk over the connectivity.
    ///
    /// Checks opposite pairing, next/prev symmetry, face rings, vertex
    /// incidence and that boundary vertices store a boundary half-edge.
    /// Problems are logged as warnings.
    pub fn is_valid(&self) -> bool {
        if self.halfedges.len() % 2 != 0 {
            warn!("odd number of half-edges: {}", self.halfedges.len());
            return false;
        }

        for (i, he) in self.halfedges.iter().enumerate() {
            if he.deleted {
                continue;
            }
            let h = HalfEdgeId::<I>::new(i);
            let opp = self.halfedge(h.opposite());

            if opp.deleted {
                warn!(?h, "opposite half-edge is deleted");
                return false;
            }
            if !he.vertex.is_valid() || self.vertex(he.vertex).deleted {
                warn!(?h, "half-edge points to an invalid vertex");
                return false;
            }
            if he.vertex == opp.vertex {
                warn!(?h, "half-edge is a loop");
                return false;
            }
            if !he.next.is_valid() || !he.prev.is_valid() {
                warn!(?h, "half-edge is not linked");
                return false;
            }
            if self.halfedge(he.next).deleted || self.halfedge(he.prev).deleted {
                warn!(?h, "half-edge is linked to a deleted half-edge");
                return false;
            }
            if self.prev(he.next) != h || self.next(he.prev) != h {
                warn!(?h, "next/prev links are not symmetric");
                return false;
            }
            if self.from_vertex(he.next) != he.vertex {
                warn!(?h, "next half-edge does not start where this one ends");
                return false;
            }
            if self.face_of(he.next) != he.face {
                warn!(?h, "next half-edge belongs to another face");
                return false;
            }
            if he.face.is_valid() && self.face(he.face).deleted {
                warn!(?h, "half-edge belongs to a deleted face");
                return false;
            }
        }

        for (i, face) in self.faces.iter().enumerate() {
            if face.deleted {
                continue;
            }
            let f = FaceId::<I>::new(i);
            if !face.halfedge.is_valid() || self.face_of(face.halfedge) != f {
                warn!(?f, "face half-edge does not point back to the face");
                return false;
            }

            let mut he = face.halfedge;
            let mut steps = 0;
            loop {
                if self.face_of(he) != f {
                    warn!(?f, "face ring leaves the face");
                    return false;
                }
                he = self.next(he);
                steps += 1;
                if he == face.halfedge {
                    break;
                }
                if steps > self.halfedges.len() {
                    warn!(?f, "face ring does not close");
                    return false;
                }
            }
        }

        for (i, vertex) in self.vertices.iter().enumerate() {
            if vertex.deleted || !vertex.halfedge.is_valid() {
                continue;
            }
            let v = VertexId::<I>::new(i);
            let start = vertex.halfedge;
            if self.halfedge(start).deleted || self.from_vertex(start) != v {
                warn!(?v, "outgoing half-edge does not start at the vertex");
                return false;
            }

            let mut he = start;
            let mut steps = 0;
            let mut saw_boundary = false;
            loop {
                saw_boundary |= self.is_boundary_halfedge(he);
                he = self.next(he.opposite());
                steps += 1;
                if he == start {
                    break;
                }
                if steps > self.halfedges.len() {
                    warn!(?v, "vertex fan does not close");
                    return false;
                }
            }
            if saw_boundary && !self.is_boundary_halfedge(start) {
                warn!(?v, "boundary vertex does not store a boundary half-edge");
                return false;
            }
        }

        true
    }
}

/// Iterator over outgoing half-edges around a vertex.
pub struct VertexHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> VertexHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, v: VertexId<I>) -> Self {
        let start = mesh.vertex(v).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for VertexHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;

        // If he goes v -> w, its opposite goes w -> v and the half-edge after
        // the opposite leaves v again.
        self.current = self.mesh.next(self.current.opposite());

        if self.current == self.start || !self.current.is_valid() {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over half-edges around a face.
pub struct FaceHalfEdgeIter<'a, I: MeshIndex = u32> {
    mesh: &'a HalfEdgeMesh<I>,
    start: HalfEdgeId<I>,
    current: HalfEdgeId<I>,
    done: bool,
}

impl<'a, I: MeshIndex> FaceHalfEdgeIter<'a, I> {
    fn new(mesh: &'a HalfEdgeMesh<I>, f: FaceId<I>) -> Self {
        let start = mesh.face(f).halfedge;
        Self {
            mesh,
            start,
            current: start,
            done: !start.is_valid(),
        }
    }
}

impl<'a, I: MeshIndex> Iterator for FaceHalfEdgeIter<'a, I> {
    type Item = HalfEdgeId<I>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.mesh.next(self.current);

        if self.current == self.start || !self.current.is_valid() {
            self.done = true;
        }

        Some(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn add_vertices(mesh: &mut HalfEdgeMesh, points: &[[f64; 3]]) -> Vec<VertexId> {
        points
            .iter()
            .map(|p| mesh.add_vertex(Point3::new(p[0], p[1], p[2])))
            .collect()
    }

    #[test]
    fn test_vertex_creation() {
        let v = Vertex::<u32>::new(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(v.position, Point3::new(1.0, 2.0, 3.0));
        assert!(!v.halfedge.is_valid());
        assert!(!v.is_deleted());
    }

    #[test]
    fn test_empty_mesh() {
        let mesh = HalfEdgeMesh::<u32>::new();
        assert_eq!(mesh.num_vertices(), 0);
        assert_eq!(mesh.num_halfedges(), 0);
        assert_eq!(mesh.num_faces(), 0);
        assert!(mesh.is_valid());
        assert!(!mesh.has_garbage());
    }

    #[test]
    fn test_add_single_triangle() {
        let mut mesh = HalfEdgeMesh::new();
        let v = add_vertices(&mut mesh, &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]);
        let f = mesh.add_face(&v).unwrap();

        assert_eq!(mesh.num_faces(), 1);
        assert_eq!(mesh.num_edges(), 3);
        assert_eq!(mesh.face_valence(f), 3);
        assert!(mesh.is_valid());

        let corners: Vec<_> = mesh.face_vertices(f).collect();
        assert_eq!(corners.len(), 3);
        for &vi in &v {
            assert!(corners.contains(&vi));
            assert!(mesh.is_boundary_vertex(vi));
            assert_eq!(mesh.valence(vi), 2);
        }

        let normal = mesh.face_normal(f);
        assert!((normal - Vector3::z()).norm() < 1e-12);
        assert!((mesh.face_area(f) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_add_face_reuses_edges() {
        let mut mesh = HalfEdgeMesh::new();
        let v = add_vertices(
            &mut mesh,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [1.0, 1.0, 0.0], [0.0, 1.0, 0.0]],
        );
        mesh.add_face(&[v[0], v[1], v[2]]).unwrap();
        mesh.add_face(&[v[0], v[2], v[3]]).unwrap();

        assert_eq!(mesh.num_edges(), 5);
        assert!(mesh.is_valid());

        let diagonal = mesh.find_halfedge(v[0], v[2]).unwrap();
        assert!(!mesh.is_boundary_edge(diagonal.edge()));
        assert_eq!(mesh.from_vertex(diagonal), v[0]);
        assert_eq!(mesh.to_vertex(diagonal), v[2]);
    }

    #[test]
    fn test_add_face_rejects_complex_edge() {
        let mut mesh = HalfEdgeMesh::new();
        let v = add_vertices(
            &mut mesh,
            &[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -1.0, 0.0]],
        );
        mesh.add_face(&[v[0], v[1], v[2]]).unwrap();

        // Same orientation over v0 -> v1 again
        assert!(mesh.add_face(&[v[0], v[1], v[3]]).is_none());
        // Degenerate input
        assert!(mesh.add_face(&[v[0], v[1]]).is_none());
        assert!(mesh.add_face(&[v[0], v[1], v[1]]).is_none());

        assert_eq!(mesh.num_faces(), 1);
        assert!(mesh.is_valid());
    }

    #[test]
    fn test_add_face_relinks_fans() {
        // Two triangles sharing only the center vertex, then a third bridging them
        let mut mesh = HalfEdgeMesh::new();
        let v = add_vertices(
            &mut mesh,
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [1.0, 1.0, 0.0],
                [-1.0, 1.0, 0.0],
                [-1.0, 0.0, 0.0],
            ],
        );
        mesh.add_face(&[v[0], v[1], v[2]]).unwrap();
        mesh.add_face(&[v[0], v[3], v[4]]).unwrap();
        assert!(mesh.is_valid());

        mesh.add_face(&[v[0], v[2], v[3]]).unwrap();
        assert!(mesh.is_valid());
        assert_eq!(mesh.valence(v[0]), 4);
        assert!(mesh.is_boundary_vertex(v[0]));
    }

    #[test]
    fn test_closed_fan() {
        let mut mesh = HalfEdgeMesh::new();
        let v = add_vertices(
            &mut mesh,
            &[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
                [-1.0, 0.0, 0.0],
                [0.0, -1.0, 0.0],
            ],
        );
        for i in 0..4 {
            mesh.add_face(&[v[0], v[1 + i], v[1 + (i + 1) % 4]]).unwrap();
        }

        assert!(mesh.is_valid());
        assert!(!mesh.is_boundary_vertex(v[0]));
        assert_eq!(mesh.valence(v[0]), 4);
        assert_eq!(mesh.vertex_faces(v[0]).count(), 4);

        // Interior vertex cannot take another face
        let extra = mesh.add_vertex(Point3::new(5.0, 5.0, 0.0));
        assert!(mesh.add_face(&[v[0], extra, v[1]]).is_none());
    }
}
