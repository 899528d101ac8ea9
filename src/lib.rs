//! # Topomesh
//!
//! A half-edge polygon mesh with shared per-corner attributes and a
//! Catmull-Clark subdivider whose work can be replayed.
//!
//! Topomesh keeps connectivity in a half-edge structure and stores the
//! attributes seen at each face corner (position, normal, texture
//! coordinates, ...) as interned *wedges*. Corners that agree share a wedge;
//! corners on either side of a seam do not, so seams survive editing and
//! subdivision.
//!
//! ## Features
//!
//! - **Half-edge data structure**: O(1) adjacency queries with type-safe indices
//! - **Flexible indexing**: Support for 16-bit, 32-bit, and 64-bit indices
//! - **Wedges**: reference-counted, deduplicated corner attribute bundles
//! - **Editing**: edge split, edge collapse, triangulation, garbage collection
//! - **Subdivision**: parallel Catmull-Clark recording affine stencils, so new
//!   coarse positions and normals can be re-evaluated without re-subdividing
//!
//! ## Quick Start
//!
//! ```
//! use topomesh::prelude::*;
//! use topomesh::algo::subdivide::{catmull_clark_subdivide, SubdivideOptions};
//!
//! let source = topomesh::mesh::faceted_cube();
//! let mut mesh: HalfEdgeMesh =
//!     HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new())?;
//!
//! let subdivider = catmull_clark_subdivide(&mut mesh, &SubdivideOptions::new(1))?;
//! let (triangles, output) = mesh.to_triangle_mesh();
//! assert_eq!(triangles.num_faces(), 48);
//!
//! let (mut positions, mut normals) = (Vec::new(), Vec::new());
//! subdivider.recompute(
//!     &mesh,
//!     &output,
//!     &source.positions,
//!     source.normals().unwrap(),
//!     &mut positions,
//!     &mut normals,
//! )?;
//! # Ok::<(), MeshError>(())
//! ```
//!
//! ## Building Meshes Programmatically
//!
//! ```
//! use topomesh::prelude::*;
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(0.5, 1.0, 0.0),
//!     Point3::new(0.5, 0.5, 1.0),
//! ];
//!
//! let faces = vec![
//!     [0, 2, 1],  // bottom
//!     [0, 1, 3],  // front
//!     [1, 2, 3],  // right
//!     [2, 0, 3],  // left
//! ];
//!
//! let mesh: HalfEdgeMesh = build_from_triangles(&vertices, &faces).unwrap();
//! assert_eq!(mesh.num_vertices(), 4);
//! assert_eq!(mesh.num_faces(), 4);
//!
//! // Iterate over neighbors of a vertex
//! for neighbor in mesh.vertex_neighbors(VertexId::new(0)) {
//!     println!("Neighbor: {:?}", neighbor);
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod algo;
pub mod error;
pub mod mesh;

/// Prelude module for convenient imports.
///
/// ```
/// use topomesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{
        build_from_quads, build_from_triangles, DropNonManifoldFaces, EdgeId, Face, FaceId,
        HalfEdge, HalfEdgeId, HalfEdgeMesh, IndexedMesh, MeshIndex, NonManifoldPolicy, Vertex,
        VertexId, WedgeIndex,
    };
}

// Re-export nalgebra types for convenience
pub use nalgebra;
