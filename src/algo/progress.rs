//! Progress reporting for long-running algorithms.
//!
//! Algorithms take a [`Progress`] and call it once per step, so a caller can
//! drive a progress bar or log without the algorithm knowing about either.
//!
//! # Example
//!
//! ```
//! use topomesh::algo::subdivide::{catmull_clark_subdivide_with_progress, SubdivideOptions};
//! use topomesh::algo::Progress;
//! use topomesh::mesh::{unit_cube, DropNonManifoldFaces, HalfEdgeMesh};
//!
//! let progress = Progress::new(|current, total, message| {
//!     println!("[{}/{}] {}", current, total, message);
//! });
//!
//! let mut mesh: HalfEdgeMesh =
//!     HalfEdgeMesh::from_indexed(&unit_cube(), &mut DropNonManifoldFaces::new()).unwrap();
//! catmull_clark_subdivide_with_progress(&mut mesh, &SubdivideOptions::new(2), &progress).unwrap();
//! ```

/// A progress callback that receives updates during long-running operations.
///
/// The callback receives:
/// - `current`: Current step (0-based), equal to `total` once finished
/// - `total`: Total number of steps
/// - `message`: Description of the current operation
///
/// The callback may be invoked from any thread.
pub struct Progress {
    callback: Box<dyn Fn(usize, usize, &str) + Send + Sync>,
}

impl Progress {
    /// Create a new progress reporter with the given callback.
    pub fn new<F>(callback: F) -> Self
    where
        F: Fn(usize, usize, &str) + Send + Sync + 'static,
    {
        Self {
            callback: Box::new(callback),
        }
    }

    /// Report progress.
    #[inline]
    pub fn report(&self, current: usize, total: usize, message: &str) {
        (self.callback)(current, total, message);
    }

    /// Create a no-op progress reporter that discards all updates.
    pub fn none() -> Self {
        Self::new(|_, _, _| {})
    }
}

impl Default for Progress {
    fn default() -> Self {
        Self::none()
    }
}

impl std::fmt::Debug for Progress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Progress").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_report_forwards_to_callback() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let progress = Progress::new(move |current, total, message| {
            sink.lock().unwrap().push((current, total, message.to_string()));
        });

        progress.report(0, 2, "first");
        progress.report(2, 2, "done");
        Progress::none().report(1, 1, "ignored");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1], (2, 2, "done".to_string()));
    }
}
