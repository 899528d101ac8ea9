//! Mesh processing algorithms.
//!
//! - **Subdivision**: Catmull-Clark subdivision with corner attributes and
//!   stencil replay, see [`subdivide`]
//! - **Progress**: callbacks for long-running operations, see [`Progress`]

pub mod progress;
pub mod subdivide;

pub use progress::Progress;
