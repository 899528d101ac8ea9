//! Topological editing operations.
//!
//! Edits keep wedge reference counts exact: every half-edge that gains a
//! wedge takes a reference, every one that loses it gives one back. Removed
//! elements are only flagged; [`HalfEdgeMesh::garbage_collection`] compacts
//! the arrays and renumbers every handle.
//!
//! Precondition failures are reported by returning `false`. Internal
//! consistency is re-checked with a full walk in debug builds.

use nalgebra::Point3;
use tracing::debug;

use super::halfedge::HalfEdgeMesh;
use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId, WedgeIndex};
use super::wedge::remap_wedge;

impl<I: MeshIndex> HalfEdgeMesh<I> {
    // ==================== Edge split ====================

    /// Split an interior edge between two triangles at parameter `f`.
    ///
    /// A new vertex is inserted at `f * p(to) + (1 - f) * p(from)` of the
    /// edge's first half-edge and connected to the two opposite corners, so
    /// the two triangles become four. Corner attributes at the new vertex are
    /// interpolated with the same parameter on each side.
    ///
    /// Returns false if `f` is outside `[0, 1]`, the edge is deleted or on the
    /// boundary, or either adjacent face is not a triangle.
    pub fn split_edge(&mut self, e: EdgeId<I>, f: f64) -> bool {
        if !(0.0..=1.0).contains(&f) {
            debug!(?e, f, "split parameter out of range");
            return false;
        }
        if e.index() >= self.num_edges() || self.is_deleted_edge(e) || self.is_boundary_edge(e) {
            debug!(?e, "edge cannot be split");
            return false;
        }

        let h0 = e.halfedge(0);
        let o0 = e.halfedge(1);
        let f0 = self.face_of(h0);
        let f1 = self.face_of(o0);
        if self.face_valence(f0) != 3 || self.face_valence(f1) != 3 {
            debug!(?e, "edge is not between two triangles");
            return false;
        }

        let h1 = self.next(h0);
        let h2 = self.next(h1);
        let o1 = self.next(o0);
        let o2 = self.next(o1);

        let v0 = self.from_vertex(h0);
        let v1 = self.to_vertex(h0);
        let va = self.to_vertex(h1);
        let vb = self.to_vertex(o1);

        let p0 = self.position(v0).coords;
        let p1 = self.position(v1).coords;
        let p = Point3::from(p1 * f + p0 * (1.0 - f));

        let with_wedges = self.halfedge(h0).wedge.is_valid();
        let h_side = with_wedges.then(|| self.blend_wedges(&[(1.0 - f, h2), (f, h0)], p));
        let o_side = with_wedges.then(|| self.blend_wedges(&[(1.0 - f, o0), (f, o2)], p));

        let v = self.add_vertex(p);
        let g0 = self.new_edge(v0, v);
        let g1 = g0.opposite();
        let a0 = self.new_edge(v, va);
        let a1 = a0.opposite();
        let b0 = self.new_edge(v, vb);
        let b1 = b0.opposite();
        let f2 = self.new_face();
        let f3 = self.new_face();

        // o0 now runs v1 -> v, h0 runs v -> v1
        self.halfedge_mut(o0).vertex = v;

        // F0 = h0 h1 a1, F2 = g0 a0 h2
        self.link(h1, a1);
        self.link(a1, h0);
        self.link(g0, a0);
        self.link(a0, h2);
        self.link(h2, g0);
        // F1 = o0 b0 o2, F3 = g1 o1 b1
        self.link(o0, b0);
        self.link(b0, o2);
        self.link(g1, o1);
        self.link(o1, b1);
        self.link(b1, g1);

        let faces = [
            (a1, f0),
            (g0, f2),
            (a0, f2),
            (h2, f2),
            (b0, f1),
            (g1, f3),
            (o1, f3),
            (b1, f3),
        ];
        for (he, face) in faces {
            self.halfedge_mut(he).face = face;
        }
        self.face_mut(f0).halfedge = h0;
        self.face_mut(f1).halfedge = o0;
        self.face_mut(f2).halfedge = g0;
        self.face_mut(f3).halfedge = g1;

        self.vertex_mut(v).halfedge = h0;
        if self.vertex(v0).halfedge == h0 {
            self.vertex_mut(v0).halfedge = g0;
        }

        if let (Some(h_side), Some(o_side)) = (h_side, o_side) {
            let hw = self.wedges.add(h_side);
            self.halfedge_mut(a1).wedge = hw;
            let w = self.wedges.new_reference(hw);
            self.halfedge_mut(g0).wedge = w;

            let w = self.wedges.new_reference(self.halfedge(h1).wedge);
            self.halfedge_mut(a0).wedge = w;

            // The v0 corner of F1 moves to g1 in F3
            let moved = *self.halfedge(o0);
            self.halfedge_mut(g1).wedge = moved.wedge;
            self.halfedge_mut(g1).input_index = moved.input_index;

            let ow = self.wedges.add(o_side);
            self.halfedge_mut(o0).wedge = ow;
            self.halfedge_mut(o0).input_index = None;
            let w = self.wedges.new_reference(ow);
            self.halfedge_mut(b1).wedge = w;

            let w = self.wedges.new_reference(self.halfedge(o1).wedge);
            self.halfedge_mut(b0).wedge = w;
        }

        debug_assert!(self.is_valid());
        debug_assert!(self.check_integrity());
        true
    }

    // ==================== Collapse ====================

    /// Whether collapsing `he` keeps the mesh a manifold of triangles.
    ///
    /// Checks the link condition: the one-rings of the two end vertices may
    /// only share the corners opposite the edge.
    pub fn is_collapse_ok(&self, he: HalfEdgeId<I>) -> bool {
        if he.index() >= self.num_halfedges() || self.halfedge(he).deleted {
            return false;
        }
        let o = he.opposite();
        let v0 = self.from_vertex(he);
        let v1 = self.to_vertex(he);
        let fh = self.face_of(he);
        let fo = self.face_of(o);

        if !fh.is_valid() && !fo.is_valid() {
            return false;
        }

        let mut apex = [VertexId::<I>::invalid(); 2];
        for (side, (h, f)) in [(he, fh), (o, fo)].into_iter().enumerate() {
            if !f.is_valid() {
                continue;
            }
            if self.face_valence(f) != 3 {
                return false;
            }
            let n = self.next(h);
            let p = self.prev(h);
            // A triangle hanging off the rest of the mesh by one vertex
            if self.is_boundary_halfedge(n.opposite()) && self.is_boundary_halfedge(p.opposite()) {
                return false;
            }
            apex[side] = self.to_vertex(n);
        }

        if apex[0].is_valid() && apex[0] == apex[1] {
            return false;
        }
        if fh.is_valid()
            && fo.is_valid()
            && self.is_boundary_vertex(v0)
            && self.is_boundary_vertex(v1)
        {
            return false;
        }

        for n in self.vertex_neighbors(v0) {
            if n == v1 || n == apex[0] || n == apex[1] {
                continue;
            }
            if self.vertex_neighbors(v1).any(|m| m == n) {
                return false;
            }
        }

        true
    }

    /// Collapse half-edge `he`, removing its from-vertex.
    ///
    /// The incoming half-edges of the removed vertex are rewired to the
    /// to-vertex and the triangles on either side of the edge disappear.
    ///
    /// With `keep_from_vertex == false` the surviving vertex keeps its
    /// position and the corners that belonged to the removed vertex take the
    /// to-vertex's wedge from the collapsed face. With `true` the surviving
    /// vertex moves to the removed vertex's position and its own corners take
    /// the removed vertex's wedge instead.
    ///
    /// Handles to the removed vertex, edge and faces become stale. Returns
    /// false if the link condition fails.
    pub fn collapse(&mut self, he: HalfEdgeId<I>, keep_from_vertex: bool) -> bool {
        if !self.is_collapse_ok(he) {
            debug!(?he, "half-edge cannot be collapsed");
            return false;
        }

        let o = he.opposite();
        let v0 = self.from_vertex(he);
        let v1 = self.to_vertex(he);
        let p0 = *self.position(v0);
        let fh = self.face_of(he);
        let fo = self.face_of(o);
        let (hn, hp) = (self.next(he), self.prev(he));
        let (on, op) = (self.next(o), self.prev(o));

        let from_incoming: Vec<HalfEdgeId<I>> = self.vertex_incoming(v0).collect();
        let va = self.to_vertex(hn);
        let vb = self.to_vertex(on);

        let target = match (keep_from_vertex, fh.is_valid()) {
            (false, true) => self.halfedge(he).wedge,
            (false, false) => self.halfedge(op).wedge,
            (true, true) => self.halfedge(hp).wedge,
            (true, false) => self.halfedge(o).wedge,
        };
        let target = self.wedges.new_reference(target);

        for &h in &from_incoming {
            self.halfedge_mut(h).vertex = v1;
        }

        if fh.is_valid() {
            for h in [he, hn, hp] {
                let w = self.halfedge(h).wedge;
                self.wedges.del(w);
            }
            let hnt = hn.opposite();
            self.take_place(hp, hnt);
            self.delete_edge(hn.edge());
            self.face_mut(fh).deleted = true;
            if self.vertex(va).halfedge == hnt {
                self.vertex_mut(va).halfedge = hp;
            }
        } else {
            self.link(hp, hn);
        }

        if fo.is_valid() {
            for h in [o, on, op] {
                let w = self.halfedge(h).wedge;
                self.wedges.del(w);
            }
            let opt = op.opposite();
            self.take_place(on, opt);
            self.delete_edge(op.edge());
            self.face_mut(fo).deleted = true;
            if self.vertex(vb).halfedge == op {
                self.vertex_mut(vb).halfedge = on.opposite();
            }
        } else {
            // `op` may have been replaced by `hp` on the boundary loop
            let before = self.prev(o);
            self.link(before, on);
        }

        self.delete_edge(he.edge());
        let vertex = self.vertex_mut(v0);
        vertex.deleted = true;
        vertex.halfedge = HalfEdgeId::invalid();

        // On a boundary corner `on` took over the deleted `op.opposite()`
        let outgoing = if fh.is_valid() {
            hp.opposite()
        } else if self.halfedge(hn).deleted {
            on
        } else {
            hn
        };
        self.vertex_mut(v1).halfedge = outgoing;
        for v in [v1, va, vb] {
            self.adjust_outgoing_halfedge(v);
        }

        if keep_from_vertex {
            self.set_position(v1, p0);
        }

        if target.is_valid() {
            let transferred = if fh.is_valid() { Some(hp) } else { None };
            let incoming: Vec<HalfEdgeId<I>> = self.vertex_incoming(v1).collect();
            for h in incoming {
                if self.is_boundary_halfedge(h) {
                    continue;
                }
                let from_side = Some(h) != transferred && from_incoming.contains(&h);
                if from_side != keep_from_vertex {
                    self.replace_wedge_index(h, target);
                }
            }
        }
        self.wedges.del(target);

        debug_assert!(self.is_valid());
        debug_assert!(self.check_integrity());
        true
    }

    /// Put `keep` into the face ring of `gone`, inheriting its corner.
    fn take_place(&mut self, keep: HalfEdgeId<I>, gone: HalfEdgeId<I>) {
        let old = *self.halfedge(gone);
        {
            let h = self.halfedge_mut(keep);
            h.face = old.face;
            h.wedge = old.wedge;
            h.input_index = old.input_index;
        }
        self.link(old.prev, keep);
        self.link(keep, old.next);
        if old.face.is_valid() && self.face(old.face).halfedge == gone {
            self.face_mut(old.face).halfedge = keep;
        }
        self.halfedge_mut(gone).wedge = WedgeIndex::invalid();
    }

    fn delete_edge(&mut self, e: EdgeId<I>) {
        for side in 0..2 {
            let h = self.halfedge_mut(e.halfedge(side));
            h.deleted = true;
            h.wedge = WedgeIndex::invalid();
        }
    }

    // ==================== Triangulation ====================

    /// Fan-triangulate every face with more than three corners.
    pub fn triangulate(&mut self) {
        self.triangulate_with(|_, _| {});
    }

    /// Fan-triangulate every face, reporting each inserted half-edge.
    ///
    /// Each new diagonal half-edge shares the wedge of an existing half-edge
    /// ending at the same corner; `on_copy(new, source)` is called for it.
    pub fn triangulate_with<F>(&mut self, mut on_copy: F)
    where
        F: FnMut(HalfEdgeId<I>, HalfEdgeId<I>),
    {
        let num_faces = self.faces.len();
        for fi in 0..num_faces {
            let mut f = FaceId::<I>::new(fi);
            if self.face(f).deleted {
                continue;
            }

            while self.face_valence(f) > 3 {
                let base = self.face(f).halfedge;
                let next = self.next(base);
                let last = self.prev(base);
                let rest = self.next(next);
                let x = self.from_vertex(base);
                let z = self.to_vertex(next);

                // Cut triangle (base, next, diag) off the front of the polygon
                let diag = self.new_edge(z, x);
                let back = diag.opposite();
                self.link(next, diag);
                self.link(diag, base);
                self.halfedge_mut(diag).face = f;

                let g = self.new_face();
                self.face_mut(g).halfedge = back;
                self.link(last, back);
                self.link(back, rest);
                let mut h = back;
                loop {
                    self.halfedge_mut(h).face = g;
                    if h == last {
                        break;
                    }
                    h = self.next(h);
                }

                let w = self.wedges.new_reference(self.halfedge(last).wedge);
                self.halfedge_mut(diag).wedge = w;
                on_copy(diag, last);
                let w = self.wedges.new_reference(self.halfedge(next).wedge);
                self.halfedge_mut(back).wedge = w;
                on_copy(back, next);

                f = g;
            }
        }

        debug_assert!(self.is_valid());
    }

    // ==================== Garbage collection ====================

    /// Remove deleted elements and dead wedges, renumbering everything.
    ///
    /// Every stored handle, wedge index and per-half-edge value is remapped
    /// together. Any handle held outside the mesh is invalid afterwards.
    pub fn garbage_collection(&mut self) {
        let vmap = compaction_map(self.vertices.iter().map(|v| v.deleted));
        let fmap = compaction_map(self.faces.iter().map(|f| f.deleted));
        let emap = compaction_map(self.halfedges.chunks(2).map(|pair| pair[0].deleted));
        let wedge_offsets = self.wedges.garbage_collection();

        let map_vertex = |v: VertexId<I>| -> VertexId<I> {
            if v.is_valid() {
                vmap[v.index()].map_or_else(VertexId::invalid, VertexId::new)
            } else {
                v
            }
        };
        let map_face = |f: FaceId<I>| -> FaceId<I> {
            if f.is_valid() {
                fmap[f.index()].map_or_else(FaceId::invalid, FaceId::new)
            } else {
                f
            }
        };
        let map_halfedge = |h: HalfEdgeId<I>| -> HalfEdgeId<I> {
            if h.is_valid() {
                emap[h.index() >> 1]
                    .map_or_else(HalfEdgeId::invalid, |e| HalfEdgeId::new(2 * e + (h.index() & 1)))
            } else {
                h
            }
        };

        self.vertices.retain(|v| !v.deleted);
        self.faces.retain(|f| !f.deleted);
        self.halfedges.retain(|h| !h.deleted);

        for v in &mut self.vertices {
            v.halfedge = map_halfedge(v.halfedge);
        }
        for f in &mut self.faces {
            f.halfedge = map_halfedge(f.halfedge);
        }
        for h in &mut self.halfedges {
            h.vertex = map_vertex(h.vertex);
            h.next = map_halfedge(h.next);
            h.prev = map_halfedge(h.prev);
            h.face = map_face(h.face);
            h.wedge = remap_wedge(&wedge_offsets, h.wedge);
        }

        debug!(
            vertices = self.vertices.len(),
            edges = self.num_edges(),
            faces = self.faces.len(),
            wedges = self.wedges.len(),
            "garbage collection done"
        );
        debug_assert!(self.is_valid());
    }
}

/// New position of every surviving slot, `None` for removed ones.
fn compaction_map(deleted: impl Iterator<Item = bool>) -> Vec<Option<usize>> {
    let mut next = 0;
    deleted
        .map(|d| {
            if d {
                None
            } else {
                next += 1;
                Some(next - 1)
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{grid, AttribArray, DropNonManifoldFaces, IndexedMesh};
    use approx::assert_relative_eq;
    use nalgebra::Vector2;

    /// Unit square made of two triangles sharing the diagonal 0-2, with a uv
    /// attribute equal to the xy position.
    fn two_triangles() -> HalfEdgeMesh {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let uv = positions.iter().map(|p| Vector2::new(p.x, p.y)).collect();
        let source = IndexedMesh::from_triangles(positions, &[[0, 1, 2], [0, 2, 3]])
            .with_attrib("uv", AttribArray::Vec2(uv));
        HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap()
    }

    /// A closed fan of six triangles around vertex 0 at the origin.
    fn hexagon_fan() -> HalfEdgeMesh {
        let mut positions = vec![Point3::new(0.0, 0.0, 0.0)];
        for k in 0..6 {
            let a = k as f64 * std::f64::consts::PI / 3.0;
            positions.push(Point3::new(a.cos(), a.sin(), 0.0));
        }
        let triangles: Vec<[usize; 3]> = (0..6).map(|k| [0, 1 + k, 1 + (k + 1) % 6]).collect();
        let source = IndexedMesh::from_triangles(positions, &triangles);
        HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap()
    }

    fn diagonal(mesh: &HalfEdgeMesh) -> EdgeId {
        mesh.edge_ids()
            .find(|&e| !mesh.is_boundary_edge(e))
            .unwrap()
    }

    #[test]
    fn test_split_edge_midpoint() {
        let mut mesh = two_triangles();
        let e = diagonal(&mesh);
        let expected = mesh.edge_midpoint(e);

        assert!(mesh.split_edge(e, 0.5));

        assert_eq!(mesh.num_vertices(), 5);
        assert_eq!(mesh.face_ids().count(), 4);
        assert!(mesh.is_valid());
        assert!(mesh.check_integrity());
        assert!(mesh.is_triangle_mesh());

        let v = VertexId::new(4);
        assert_relative_eq!(*mesh.position(v), expected, epsilon = 1e-12);
        assert_eq!(mesh.valence(v), 4);
        assert!(!mesh.is_boundary_vertex(v));

        // Interpolated corners carry interpolated uvs
        for w in mesh.vertex_wedges(v) {
            let uv: Vector2<f64> = mesh.wedge_data(w).attrib(0).unwrap();
            assert_relative_eq!(uv, Vector2::new(expected.x, expected.y), epsilon = 1e-12);
        }
    }

    #[test]
    fn test_split_edge_parameter() {
        let mut mesh = two_triangles();
        let e = diagonal(&mesh);
        let h = e.halfedge(0);
        let p0 = *mesh.position(mesh.from_vertex(h));
        let p1 = *mesh.position(mesh.to_vertex(h));

        assert!(mesh.split_edge(e, 0.25));
        let expected = Point3::from(p1.coords * 0.25 + p0.coords * 0.75);
        assert_relative_eq!(*mesh.position(VertexId::new(4)), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_split_edge_rejects_bad_input() {
        let mut mesh = two_triangles();
        let e = diagonal(&mesh);
        let boundary = mesh.edge_ids().find(|&e| mesh.is_boundary_edge(e)).unwrap();

        assert!(!mesh.split_edge(e, 1.5));
        assert!(!mesh.split_edge(e, -0.1));
        assert!(!mesh.split_edge(boundary, 0.5));
        assert_eq!(mesh.num_vertices(), 4);
        assert_eq!(mesh.num_faces(), 2);
    }

    #[test]
    fn test_triangulate_closes_rings() {
        let positions = vec![
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
            Point3::new(2.0, 0.5, 0.0),
            Point3::new(1.0, 1.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
        ];
        let source = IndexedMesh::new(positions, vec![vec![0, 1, 2, 3, 4]]);
        let mut mesh: HalfEdgeMesh =
            HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap();

        let mut copies = Vec::new();
        mesh.triangulate_with(|new, src| copies.push((new, src)));

        assert_eq!(mesh.num_faces(), 3);
        assert_eq!(copies.len(), 4);
        assert!(mesh.check_integrity());
        for f in mesh.face_ids() {
            let h = mesh.face(f).halfedge;
            assert_eq!(mesh.next(mesh.next(mesh.next(h))), h);
        }
        for h in mesh.halfedge_ids() {
            assert_eq!(mesh.opposite(mesh.opposite(h)), h);
        }
        for (new, src) in copies {
            assert_eq!(mesh.to_vertex(new), mesh.to_vertex(src));
            assert_eq!(mesh.wedge_index(new), mesh.wedge_index(src));
        }
    }

    #[test]
    fn test_collapse_interior() {
        let mut mesh = hexagon_fan();
        let center = VertexId::new(0);
        // Half-edge from the center towards vertex 1
        let h = mesh.find_halfedge(center, VertexId::new(1)).unwrap();
        let target = *mesh.position(VertexId::new(1));

        assert!(mesh.collapse(h, false));
        assert!(mesh.vertex(center).is_deleted());
        assert_eq!(mesh.face_ids().count(), 4);
        assert_relative_eq!(*mesh.position(VertexId::new(1)), target);
        assert!(mesh.is_valid());
        assert!(mesh.check_integrity());

        mesh.garbage_collection();
        assert_eq!(mesh.num_vertices(), 6);
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_edges(), 9);
        assert!(!mesh.has_garbage());
        assert!(mesh.is_valid());
        assert!(mesh.check_integrity());
    }

    #[test]
    fn test_collapse_keep_from_vertex() {
        let mut mesh = hexagon_fan();
        let h = mesh.find_halfedge(VertexId::new(1), VertexId::new(0)).unwrap();
        let kept = *mesh.position(VertexId::new(1));

        assert!(mesh.collapse(h, true));
        assert!(mesh.vertex(VertexId::new(1)).is_deleted());
        assert_relative_eq!(*mesh.position(VertexId::new(0)), kept);
        assert!(mesh.check_integrity());

        mesh.garbage_collection();
        assert_eq!(mesh.num_faces(), 4);
        assert_eq!(mesh.num_vertices(), 6);
        assert!(mesh.check_integrity());
    }

    #[test]
    fn test_collapse_boundary_edges() {
        let fresh = || {
            let mut mesh: HalfEdgeMesh =
                HalfEdgeMesh::from_indexed(&grid(3), &mut DropNonManifoldFaces::new()).unwrap();
            mesh.triangulate();
            mesh
        };
        let num_halfedges = fresh().num_halfedges();

        for keep_from_vertex in [false, true] {
            let mut collapsed = 0;
            let mut into_corner = 0;
            for i in 0..num_halfedges {
                let mut mesh = fresh();
                let h = HalfEdgeId::new(i);
                let touches_boundary =
                    mesh.is_boundary_halfedge(h) || mesh.is_boundary_halfedge(h.opposite());
                if !touches_boundary || !mesh.is_collapse_ok(h) {
                    continue;
                }
                let (v0, v1) = (mesh.from_vertex(h), mesh.to_vertex(h));
                let p0 = *mesh.position(v0);
                if mesh.valence(v1) == 2 {
                    into_corner += 1;
                }

                assert!(mesh.collapse(h, keep_from_vertex), "{h:?}");
                collapsed += 1;
                assert!(mesh.is_valid(), "{h:?} keep={keep_from_vertex}");
                assert!(mesh.check_integrity(), "{h:?} keep={keep_from_vertex}");
                assert!(mesh.vertex(v0).is_deleted());
                assert!(mesh.is_boundary_halfedge(mesh.vertex(v1).halfedge));
                if keep_from_vertex {
                    assert_relative_eq!(*mesh.position(v1), p0);
                }

                mesh.garbage_collection();
                assert_eq!(mesh.num_vertices(), 15);
                assert_eq!(mesh.num_faces(), 17);
                assert!(mesh.is_valid());
                assert!(mesh.check_integrity());
            }
            assert!(collapsed > 0);
            assert!(into_corner > 0);
        }
    }

    #[test]
    fn test_collapse_rejects_bad_edges() {
        let mut mesh = two_triangles();

        // Interior edge joining two boundary vertices would pinch the surface
        let e = diagonal(&mesh);
        assert!(!mesh.is_collapse_ok(e.halfedge(0)));
        assert!(!mesh.collapse(e.halfedge(0), false));

        assert!(!mesh.has_garbage());
        assert_eq!(mesh.num_faces(), 2);

        // A lone triangle is all ear
        let source = IndexedMesh::from_triangles(
            vec![
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
            ],
            &[[0, 1, 2]],
        );
        let lone: HalfEdgeMesh =
            HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap();
        assert!(lone.halfedge_ids().all(|h| !lone.is_collapse_ok(h)));
    }

    #[test]
    fn test_garbage_collection_renumbers_wedges() {
        let mut mesh = two_triangles();
        let e = diagonal(&mesh);
        assert!(mesh.split_edge(e, 0.5));
        let h = mesh.find_halfedge(VertexId::new(4), VertexId::new(1)).unwrap();
        assert!(mesh.collapse(h, false));

        mesh.garbage_collection();

        assert_eq!(mesh.wedges().len(), mesh.num_wedges());
        for he in mesh.halfedge_ids() {
            let w = mesh.wedge_index(he);
            if mesh.is_boundary_halfedge(he) {
                assert!(!w.is_valid());
            } else {
                assert!(w.index() < mesh.num_wedges());
            }
        }
        assert!(mesh.is_valid());
        assert!(mesh.check_integrity());
    }
}
