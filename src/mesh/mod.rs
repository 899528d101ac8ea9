//! Core mesh data structures.
//!
//! This module provides the half-edge mesh with per-corner attributes and
//! the operations that edit it.
//!
//! # Overview
//!
//! The primary type is [`HalfEdgeMesh`], a polygon mesh stored as a half-edge
//! (doubly-connected edge list) structure. Adjacency queries are O(1). Each
//! face corner references a wedge in the mesh's [`WedgeStore`], which holds
//! the position and the named interpolatable attributes (normals, texture
//! coordinates, colors) seen at that corner. Corners on either side of an
//! attribute seam reference different wedges.
//!
//! # Index Types
//!
//! Mesh elements are identified by type-safe index wrappers:
//! - [`VertexId`] - Identifies a vertex
//! - [`HalfEdgeId`] - Identifies a half-edge
//! - [`FaceId`] - Identifies a face
//! - [`EdgeId`] - Identifies a full edge
//! - [`WedgeIndex`] - Identifies a wedge
//!
//! These indices are generic over the underlying integer type ([`MeshIndex`] trait),
//! allowing you to choose `u16`, `u32`, or `u64` based on mesh size.
//!
//! # Construction
//!
//! Meshes are built from an [`IndexedMesh`] and exported back to one:
//!
//! ```
//! use topomesh::mesh::{faceted_cube, DropNonManifoldFaces, HalfEdgeMesh};
//!
//! let source = faceted_cube();
//! let mesh: HalfEdgeMesh =
//!     HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap();
//! assert_eq!(mesh.num_vertices(), 8);
//! assert_eq!(mesh.num_wedges(), 24);
//!
//! let (triangles, _map) = mesh.to_triangle_mesh();
//! assert_eq!(triangles.num_faces(), 12);
//! assert_eq!(triangles.num_vertices(), 24);
//! ```

mod attributes;
mod builder;
mod halfedge;
mod index;
mod indexed;
mod primitives;
mod topology;
mod wedge;

pub use builder::{
    build_from_quads, build_from_triangles, DropNonManifoldFaces, NonManifoldPolicy, OutputMap,
};
pub use halfedge::{
    Face, FaceHalfEdgeIter, HalfEdge, HalfEdgeMesh, Vertex, VertexHalfEdgeIter,
};
pub use index::{EdgeId, FaceId, HalfEdgeId, MeshIndex, VertexId, WedgeIndex};
pub use indexed::{AttribArray, IndexedMesh, NamedAttrib};
pub use primitives::{faceted_cube, grid, unit_cube};
pub use wedge::{
    remap_wedge, AttribSchema, Wedge, WedgeAttrib, WedgeData, WedgeStore, NORMAL_ATTRIB,
};
