//! Error types for topomesh.
//!
//! Construction and subdivision report failures through [`MeshError`].
//! Editing operations on the half-edge mesh report unmet preconditions by
//! returning `false` instead.

use thiserror::Error;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur during mesh operations.
#[derive(Error, Debug)]
pub enum MeshError {
    /// The mesh has no faces.
    #[error("mesh has no faces")]
    EmptyMesh,

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// A face has duplicate vertex indices.
    #[error("face {face} is degenerate (has duplicate vertices)")]
    DegenerateFace {
        /// The face index.
        face: usize,
    },

    /// The mesh has non-manifold topology.
    #[error("mesh has non-manifold topology: {details}")]
    NonManifold {
        /// Description of the non-manifold condition.
        details: String,
    },

    /// Invalid mesh state for the requested operation.
    #[error("invalid mesh state: {0}")]
    InvalidState(String),

    /// An input or output array has the wrong length.
    #[error("{what} has {actual} entries, expected {expected}")]
    SizeMismatch {
        /// Which array.
        what: &'static str,
        /// Required length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },
}

impl MeshError {
    /// Create a size mismatch error.
    pub fn size_mismatch(what: &'static str, expected: usize, actual: usize) -> Self {
        MeshError::SizeMismatch {
            what,
            expected,
            actual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let e = MeshError::size_mismatch("new_positions", 8, 5);
        assert_eq!(e.to_string(), "new_positions has 5 entries, expected 8");
    }
}
