//! Catmull-Clark subdivision with replayable stencils.
//!
//! Catmull-Clark subdivision (Catmull & Clark, 1978) is an approximating
//! subdivision scheme for polygon meshes. Each iteration:
//!
//! 1. Creates a face point at each face centroid
//! 2. Creates edge points from the edge endpoints and adjacent face points
//! 3. Moves the original vertices towards a weighted average of their
//!    neighbours
//! 4. Splits every n-gon into n quads around its face point
//!
//! The result converges to a C² continuous surface (C¹ at extraordinary
//! vertices). Corner attributes such as normals are interpolated along with
//! the positions, and seams between wedges are kept.
//!
//! Every value the subdivider computes is recorded as an affine
//! [`Stencil`]. Once a mesh has been subdivided, new coarse positions and
//! normals can be pushed through the same refinement with
//! [`CatmullClarkSubdivider::recompute`], which is far cheaper than
//! subdividing again:
//!
//! ```
//! use topomesh::algo::subdivide::{catmull_clark_subdivide, SubdivideOptions};
//! use topomesh::mesh::{faceted_cube, DropNonManifoldFaces, HalfEdgeMesh};
//! use nalgebra::Vector3;
//!
//! let source = faceted_cube();
//! let mut mesh: HalfEdgeMesh =
//!     HalfEdgeMesh::from_indexed(&source, &mut DropNonManifoldFaces::new()).unwrap();
//!
//! let subdivider = catmull_clark_subdivide(&mut mesh, &SubdivideOptions::new(2)).unwrap();
//! let (surface, output) = mesh.to_triangle_mesh();
//!
//! // Animate the coarse cube and re-evaluate the fine surface
//! let shift = Vector3::new(0.0, 0.0, 1.0);
//! let moved: Vec<_> = source.positions.iter().map(|p| p + shift).collect();
//! let (mut positions, mut normals) = (Vec::new(), Vec::new());
//! subdivider
//!     .recompute(&mesh, &output, &moved, source.normals().unwrap(), &mut positions, &mut normals)
//!     .unwrap();
//! assert_eq!(positions.len(), surface.num_vertices());
//! ```
//!
//! # References
//!
//! - Catmull, E. & Clark, J. (1978). "Recursively generated B-spline surfaces
//!   on arbitrary topological meshes." Computer-Aided Design, 10(6), 350-355.

mod catmull_clark;
mod recompute;
mod stencil;

pub use catmull_clark::{
    catmull_clark_subdivide, catmull_clark_subdivide_with_progress, CatmullClarkSubdivider,
};
pub use stencil::{IterationStencils, Stencil, StencilHandle, SubdivisionStencils};

/// Options for subdivision.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SubdivideOptions {
    /// Number of subdivision iterations.
    pub iterations: usize,

    /// Whether to move the original vertices (default: true).
    /// If false, they keep their positions and edge points are midpoints.
    pub update_points: bool,

    /// Whether to use parallel execution (default: true).
    pub parallel: bool,

    /// Whether to split the final quads into triangles (default: true).
    pub triangulate: bool,
}

impl Default for SubdivideOptions {
    fn default() -> Self {
        Self::new(1)
    }
}

impl SubdivideOptions {
    /// Create options with the specified number of iterations.
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            update_points: true,
            parallel: true,
            triangulate: true,
        }
    }

    /// Set whether original vertices are repositioned.
    pub fn with_update_points(mut self, update: bool) -> Self {
        self.update_points = update;
        self
    }

    /// Set whether to use parallel execution.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Set whether the result is triangulated.
    pub fn with_triangulate(mut self, triangulate: bool) -> Self {
        self.triangulate = triangulate;
        self
    }

    /// Create options for single-threaded execution.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_builders() {
        let options = SubdivideOptions::new(3)
            .with_update_points(false)
            .with_triangulate(false)
            .sequential();
        assert_eq!(options.iterations, 3);
        assert!(!options.update_points);
        assert!(!options.triangulate);
        assert!(!options.parallel);

        let options = SubdivideOptions::default().with_parallel(true);
        assert_eq!(options.iterations, 1);
        assert!(options.update_points && options.parallel && options.triangulate);
    }
}
