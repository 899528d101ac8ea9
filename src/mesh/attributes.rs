//! Wedge access on the half-edge mesh.
//!
//! Every interior half-edge references the wedge holding the attributes of
//! the face corner at its to-vertex. The methods here keep the wedge store's
//! reference counts in step with those references.

use std::borrow::Cow;
use std::collections::BTreeSet;

use nalgebra::Point3;
use tracing::warn;

use super::halfedge::HalfEdgeMesh;
use super::index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId, WedgeIndex};
use super::wedge::{WedgeAttrib, WedgeData};

impl<I: MeshIndex> HalfEdgeMesh<I> {
    /// Wedge referenced by a half-edge. Invalid on boundary half-edges.
    #[inline]
    pub fn wedge_index(&self, he: HalfEdgeId<I>) -> WedgeIndex<I> {
        self.halfedge(he).wedge
    }

    /// Attribute bundle of a wedge.
    #[inline]
    pub fn wedge_data(&self, w: WedgeIndex<I>) -> &WedgeData {
        self.wedges.data(w)
    }

    /// Number of half-edges referencing a wedge.
    #[inline]
    pub fn wedge_ref_count(&self, w: WedgeIndex<I>) -> u32 {
        self.wedges.ref_count(w)
    }

    /// Number of live wedges.
    pub fn num_wedges(&self) -> usize {
        self.wedges.num_live()
    }

    /// Replace the data of a wedge in place, for every half-edge sharing it.
    pub fn set_wedge_data(&mut self, w: WedgeIndex<I>, data: WedgeData) -> bool {
        self.wedges.set_data(w, data)
    }

    /// Set one named attribute of a wedge in place.
    ///
    /// Returns false if the attribute is not registered for `T` or the wedge
    /// index is invalid.
    pub fn set_wedge_attrib<T: WedgeAttrib>(
        &mut self,
        w: WedgeIndex<I>,
        name: &str,
        value: T,
    ) -> bool {
        if !self.wedges.is_live(w) {
            return false;
        }
        let Some(index) = self.wedges.attrib_index::<T>(name) else {
            return false;
        };
        let mut data = self.wedges.data(w).clone();
        data.set_attrib(index, value);
        self.wedges.set_data(w, data)
    }

    /// Detach a half-edge from its wedge and give it `data` instead.
    ///
    /// The data is interned, so an existing live wedge with equal data is
    /// shared. The old wedge loses one reference.
    pub fn replace_wedge(&mut self, he: HalfEdgeId<I>, data: WedgeData) -> WedgeIndex<I> {
        let w = self.wedges.add(data);
        let old = self.halfedge(he).wedge;
        self.wedges.del(old);
        self.halfedge_mut(he).wedge = w;
        w
    }

    /// Point a half-edge at an existing wedge, moving one reference over.
    pub fn replace_wedge_index(&mut self, he: HalfEdgeId<I>, w: WedgeIndex<I>) {
        let old = self.halfedge(he).wedge;
        if old == w {
            return;
        }
        self.wedges.new_reference(w);
        self.wedges.del(old);
        self.halfedge_mut(he).wedge = w;
    }

    /// Register a wedge attribute and give every existing wedge `default`.
    ///
    /// Returns the attribute index within its type.
    pub fn add_wedge_attrib<T: WedgeAttrib>(&mut self, name: &str, default: T) -> usize {
        self.wedges.add_attrib(name, default)
    }

    /// A zeroed bundle at the origin matching the current schema.
    pub fn new_wedge_data(&self) -> WedgeData {
        self.wedges.new_data(Point3::origin())
    }

    /// A zeroed bundle at the to-vertex of `he` matching the current schema.
    pub fn new_wedge_data_for(&self, he: HalfEdgeId<I>) -> WedgeData {
        self.wedges.new_data(*self.position(self.to_vertex(he)))
    }

    /// Give every interior half-edge without a wedge a zeroed one.
    pub fn ensure_wedges(&mut self) {
        for i in 0..self.halfedges.len() {
            let he = HalfEdgeId::new(i);
            let h = self.halfedge(he);
            if h.deleted || h.is_boundary() || h.wedge.is_valid() {
                continue;
            }
            let data = self.new_wedge_data_for(he);
            let w = self.wedges.add(data);
            self.halfedge_mut(he).wedge = w;
        }
    }

    fn corner_data(&self, he: HalfEdgeId<I>) -> Cow<'_, WedgeData> {
        let w = self.halfedge(he).wedge;
        if w.is_valid() {
            Cow::Borrowed(self.wedges.data(w))
        } else {
            Cow::Owned(self.new_wedge_data_for(he))
        }
    }

    /// Weighted sum of the corner data of several half-edges.
    ///
    /// The result is placed at `position`. A vec3 attribute named `"normal"`
    /// is renormalized.
    pub fn blend_wedges(&self, terms: &[(f64, HalfEdgeId<I>)], position: Point3<f64>) -> WedgeData {
        let corners: Vec<(f64, Cow<'_, WedgeData>)> = terms
            .iter()
            .map(|&(w, he)| (w, self.corner_data(he)))
            .collect();

        let mut data = WedgeData::weighted_sum(corners.iter().map(|(w, d)| (*w, d.as_ref())))
            .unwrap_or_else(|| self.wedges.new_data(position));
        data.position = position;
        if let Some(n) = self.wedges.schema().normal_index() {
            data.normalize_vec3(n);
        }
        data
    }

    /// Average of a face's corner data, placed at the face centroid.
    pub fn face_wedge_average(&self, f: FaceId<I>) -> WedgeData {
        let corners: Vec<HalfEdgeId<I>> = self.face_halfedges(f).collect();
        let weight = 1.0 / corners.len().max(1) as f64;
        let terms: Vec<(f64, HalfEdgeId<I>)> = corners.iter().map(|&he| (weight, he)).collect();
        self.blend_wedges(&terms, self.face_centroid(f))
    }

    /// Re-intern the corner data of a vertex after its position changed.
    pub fn refresh_wedge_positions(&mut self, v: VertexId<I>) {
        let p = *self.position(v);
        let incoming: Vec<HalfEdgeId<I>> = self.vertex_incoming(v).collect();
        for he in incoming {
            let w = self.halfedge(he).wedge;
            if !w.is_valid() || self.wedges.data(w).position == p {
                continue;
            }
            let mut data = self.wedges.data(w).clone();
            data.position = p;
            self.replace_wedge(he, data);
        }
    }

    /// Distinct live wedges used by the corners around a vertex.
    pub fn vertex_wedges(&self, v: VertexId<I>) -> BTreeSet<WedgeIndex<I>> {
        self.vertex_incoming(v)
            .map(|he| self.halfedge(he).wedge)
            .filter(|w| w.is_valid())
            .collect()
    }

    /// A vertex sits on an attribute seam when its corners use several wedges.
    pub fn is_feature_vertex(&self, v: VertexId<I>) -> bool {
        self.vertex_wedges(v).len() > 1
    }

    /// An edge is a seam when the corners at either end differ across it.
    ///
    /// Boundary edges always count as features.
    pub fn is_feature_edge(&self, e: EdgeId<I>) -> bool {
        if self.is_boundary_edge(e) {
            return true;
        }
        let h0 = e.halfedge(0);
        let h1 = e.halfedge(1);
        // h0 ends where h1 starts, and prev(h1) ends there too
        self.wedge_index(h0) != self.wedge_index(self.prev(h1))
            || self.wedge_index(h1) != self.wedge_index(self.prev(h0))
    }

    /// Let corners around `v` with identical data share a single wedge.
    pub fn merge_equal_wedges_at(&mut self, v: VertexId<I>) {
        let incoming: Vec<HalfEdgeId<I>> = self.vertex_incoming(v).collect();
        let mut kept: Vec<WedgeIndex<I>> = Vec::new();

        for he in incoming {
            let w = self.halfedge(he).wedge;
            if !w.is_valid() {
                continue;
            }
            let same = kept
                .iter()
                .copied()
                .find(|&k| k == w || self.wedges.data(k) == self.wedges.data(w));
            match same {
                Some(k) if k != w => self.replace_wedge_index(he, k),
                Some(_) => {}
                None => kept.push(w),
            }
        }
    }

    /// Run [`merge_equal_wedges_at`](Self::merge_equal_wedges_at) on every vertex.
    pub fn merge_equal_wedges(&mut self) {
        for i in 0..self.vertices.len() {
            if !self.vertices[i].deleted {
                self.merge_equal_wedges_at(VertexId::new(i));
            }
        }
    }

    /// Check that wedge reference counts match their use and that every
    /// wedge position equals the point of its vertex.
    ///
    /// Mismatches are logged as warnings.
    pub fn check_integrity(&self) -> bool {
        let mut ok = true;
        let mut counts = vec![0u32; self.wedges.len()];

        for (i, he) in self.halfedges.iter().enumerate() {
            if he.deleted || !he.wedge.is_valid() {
                continue;
            }
            if he.is_boundary() {
                warn!(halfedge = i, "boundary half-edge references a wedge");
                ok = false;
                continue;
            }
            if he.wedge.index() >= counts.len() {
                warn!(halfedge = i, wedge = he.wedge.index(), "wedge index out of range");
                ok = false;
                continue;
            }
            counts[he.wedge.index()] += 1;

            let position = self.wedges.data(he.wedge).position;
            if position != self.vertex(he.vertex).position {
                warn!(
                    halfedge = i,
                    wedge = he.wedge.index(),
                    "wedge position differs from its vertex"
                );
                ok = false;
            }
        }

        for (i, &count) in counts.iter().enumerate() {
            let refs = self.wedges.ref_count(WedgeIndex::new(i));
            if refs != count {
                warn!(wedge = i, refs, count, "wedge reference count does not match its use");
                ok = false;
            }
        }

        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::{faceted_cube, unit_cube, DropNonManifoldFaces, IndexedMesh, NORMAL_ATTRIB};
    use approx::assert_relative_eq;
    use nalgebra::{Vector2, Vector3};

    fn import(source: &IndexedMesh) -> HalfEdgeMesh {
        HalfEdgeMesh::from_indexed(source, &mut DropNonManifoldFaces::new()).unwrap()
    }

    #[test]
    fn test_merge_equal_wedges() {
        let mut mesh = import(&faceted_cube());
        assert_eq!(mesh.wedges().num_live(), 24);
        assert!(mesh.vertex_ids().all(|v| mesh.is_feature_vertex(v)));

        let live: Vec<WedgeIndex> = mesh.wedges().iter().map(|(w, _)| w).collect();
        for w in live {
            assert!(mesh.set_wedge_attrib(w, NORMAL_ATTRIB, Vector3::<f64>::z()));
        }
        // Equal data in separate wedges is allowed until merged
        assert_eq!(mesh.wedges().num_live(), 24);
        assert!(mesh.check_integrity());

        mesh.merge_equal_wedges();
        assert_eq!(mesh.wedges().num_live(), 8);
        assert!(mesh.check_integrity());
        assert!(mesh.vertex_ids().all(|v| !mesh.is_feature_vertex(v)));
        assert!(mesh.edge_ids().all(|e| !mesh.is_feature_edge(e)));

        mesh.garbage_collection();
        assert_eq!(mesh.num_wedges(), 8);
        assert!(mesh.check_integrity());
    }

    #[test]
    fn test_add_attrib_extends_every_wedge() {
        let mut mesh = import(&unit_cube());
        let uv = Vector2::new(0.5, 0.25);
        let index = mesh.add_wedge_attrib("uv", uv);
        assert_eq!(index, 0);

        for (_, wedge) in mesh.wedges().iter() {
            assert_eq!(wedge.data().attrib::<Vector2<f64>>(index), Some(uv));
        }
        assert!(mesh.check_integrity());

        // Registering the same name again leaves the wedges alone
        assert_eq!(mesh.add_wedge_attrib("uv", Vector2::new(1.0, 1.0)), 0);
        let w = mesh.wedge_index(HalfEdgeId::new(0));
        assert_eq!(mesh.wedge_data(w).attrib::<Vector2<f64>>(0), Some(uv));
        assert_eq!(
            mesh.new_wedge_data().attrib::<Vector2<f64>>(0),
            Some(Vector2::zeros())
        );
    }

    #[test]
    fn test_replace_wedge_refcounts() {
        let mut mesh = import(&unit_cube());
        mesh.add_wedge_attrib("weight", 0.0_f64);

        let v = VertexId::new(0);
        let corners: Vec<HalfEdgeId> = mesh.vertex_incoming(v).collect();
        assert_eq!(corners.len(), 3);
        let w = mesh.wedge_index(corners[0]);
        assert_eq!(mesh.wedge_ref_count(w), 3);

        let mut data = mesh.wedge_data(w).clone();
        data.set_attrib(0, 1.0_f64);
        let nw = mesh.replace_wedge(corners[0], data.clone());
        assert_ne!(nw, w);
        assert_eq!(mesh.wedge_ref_count(w), 2);
        assert_eq!(mesh.wedge_ref_count(nw), 1);

        // Equal data is interned into the same wedge
        assert_eq!(mesh.replace_wedge(corners[1], data), nw);
        assert_eq!(mesh.wedge_ref_count(nw), 2);
        assert!(mesh.is_feature_vertex(v));

        mesh.replace_wedge_index(corners[0], w);
        assert_eq!(mesh.wedge_ref_count(w), 2);
        assert_eq!(mesh.wedge_ref_count(nw), 1);
        assert!(mesh.check_integrity());
    }

    #[test]
    fn test_blend_wedges_normalizes() {
        let mesh = import(&faceted_cube());
        let v = VertexId::new(0);
        let corners: Vec<HalfEdgeId> = mesh.vertex_incoming(v).collect();
        let p = *mesh.position(v);

        let data = mesh.blend_wedges(&[(0.5, corners[0]), (0.5, corners[1])], p);
        let n: Vector3<f64> = data.attrib(0).unwrap();
        assert_relative_eq!(n.norm(), 1.0, epsilon = 1e-12);
        assert_eq!(data.position, p);

        let f = FaceId::new(0);
        let average = mesh.face_wedge_average(f);
        assert_eq!(average.position, mesh.face_centroid(f));
        let n: Vector3<f64> = average.attrib(0).unwrap();
        assert_relative_eq!(n, Vector3::new(0.0, 0.0, -1.0), epsilon = 1e-12);
    }

    #[test]
    fn test_refresh_wedge_positions() {
        let mut mesh = import(&faceted_cube());
        let v = VertexId::new(0);
        let moved = Point3::new(-0.5, -0.5, -0.5);
        mesh.set_position(v, moved);
        assert!(!mesh.check_integrity());

        mesh.refresh_wedge_positions(v);
        assert!(mesh.check_integrity());
        assert_eq!(mesh.vertex_wedges(v).len(), 3);
    }
}
