//! Affine stencils recorded during subdivision.
//!
//! A stencil states that the value at `target` is the weighted sum of the
//! values at its terms. Position stencils act on vertices, attribute
//! stencils on half-edge corners. Weights of every stencil sum to one, so
//! replaying them commutes with translation.

use nalgebra::Vector3;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::mesh::{HalfEdgeId, MeshIndex, VertexId};

/// Handles that address a slot in a flat value array.
pub trait StencilHandle: Copy {
    /// Array slot of this handle.
    fn slot(self) -> usize;
}

impl<I: MeshIndex> StencilHandle for VertexId<I> {
    #[inline]
    fn slot(self) -> usize {
        self.index()
    }
}

impl<I: MeshIndex> StencilHandle for HalfEdgeId<I> {
    #[inline]
    fn slot(self) -> usize {
        self.index()
    }
}

/// `target = sum(weight * source)`.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Stencil<H> {
    /// Element receiving the value.
    pub target: H,
    /// Weighted source elements.
    pub terms: Vec<(f64, H)>,
}

impl<H: StencilHandle> Stencil<H> {
    /// Create a stencil.
    pub fn new(target: H, terms: Vec<(f64, H)>) -> Self {
        Self { target, terms }
    }

    /// A stencil that copies `source` into `target`.
    pub fn copy(target: H, source: H) -> Self {
        Self::new(target, vec![(1.0, source)])
    }

    /// Sum of the weights.
    pub fn weight_sum(&self) -> f64 {
        self.terms.iter().map(|(w, _)| w).sum()
    }

    /// Whether the stencil is a plain copy of a single source.
    pub fn is_copy(&self) -> bool {
        matches!(self.terms.as_slice(), [(w, _)] if *w == 1.0)
    }

    /// Evaluate against values indexed by handle slot.
    pub fn apply(&self, values: &[Vector3<f64>]) -> Vector3<f64> {
        self.terms
            .iter()
            .fold(Vector3::zeros(), |acc, &(w, h)| acc + values[h.slot()] * w)
    }
}

/// Stencils recorded by one subdivision iteration, in replay order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct IterationStencils<I: MeshIndex = u32> {
    /// Face-vertex positions from the corners of the coarse face.
    pub face_vertices: Vec<Stencil<VertexId<I>>>,
    /// Edge-vertex positions.
    pub edge_vertices: Vec<Stencil<VertexId<I>>>,
    /// Repositioned old vertices. Empty when points were not updated.
    pub old_vertices: Vec<Stencil<VertexId<I>>>,
    /// Corner attributes set while splitting edges. Order dependent.
    pub edge_props: Vec<Stencil<HalfEdgeId<I>>>,
    /// Corner attributes set while splitting faces.
    pub face_props: Vec<Stencil<HalfEdgeId<I>>>,
}

impl<I: MeshIndex> Default for IterationStencils<I> {
    fn default() -> Self {
        Self {
            face_vertices: Vec::new(),
            edge_vertices: Vec::new(),
            old_vertices: Vec::new(),
            edge_props: Vec::new(),
            face_props: Vec::new(),
        }
    }
}

impl<I: MeshIndex> IterationStencils<I> {
    /// Every position stencil of the iteration.
    pub fn vertex_stencils(&self) -> impl Iterator<Item = &Stencil<VertexId<I>>> + '_ {
        self.face_vertices
            .iter()
            .chain(&self.edge_vertices)
            .chain(&self.old_vertices)
    }

    /// Every corner attribute stencil of the iteration.
    pub fn halfedge_stencils(&self) -> impl Iterator<Item = &Stencil<HalfEdgeId<I>>> + '_ {
        self.edge_props.iter().chain(&self.face_props)
    }
}

/// Everything needed to replay a subdivision on new coarse data.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SubdivisionStencils<I: MeshIndex = u32> {
    /// One entry per iteration.
    pub iterations: Vec<IterationStencils<I>>,
    /// Copies made by the final triangulation pass.
    pub triangulation: Vec<Stencil<HalfEdgeId<I>>>,
}

impl<I: MeshIndex> Default for SubdivisionStencils<I> {
    fn default() -> Self {
        Self {
            iterations: Vec::new(),
            triangulation: Vec::new(),
        }
    }
}

impl<I: MeshIndex> SubdivisionStencils<I> {
    /// Whether nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.iterations.is_empty() && self.triangulation.is_empty()
    }

    /// Total number of stencils.
    pub fn len(&self) -> usize {
        self.triangulation.len()
            + self
                .iterations
                .iter()
                .map(|it| it.vertex_stencils().count() + it.halfedge_stencils().count())
                .sum::<usize>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_apply_and_weights() {
        let values = vec![
            Vector3::new(0.0, 0.0, 0.0),
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::new(0.0, 4.0, 0.0),
        ];
        let s: Stencil<VertexId> = Stencil::new(
            VertexId::new(0),
            vec![(0.5, VertexId::new(1)), (0.25, VertexId::new(2)), (0.25, VertexId::new(0))],
        );
        assert_relative_eq!(s.weight_sum(), 1.0);
        assert!(!s.is_copy());
        assert_relative_eq!(s.apply(&values), Vector3::new(1.0, 1.0, 0.0));

        let c: Stencil<HalfEdgeId> = Stencil::copy(HalfEdgeId::new(3), HalfEdgeId::new(1));
        assert!(c.is_copy());
        assert_relative_eq!(c.apply(&values[..]), values[1]);
    }

    #[test]
    fn test_counts() {
        let mut stencils: SubdivisionStencils = SubdivisionStencils::default();
        assert!(stencils.is_empty());

        let mut it = IterationStencils::default();
        it.face_vertices
            .push(Stencil::copy(VertexId::new(1), VertexId::new(0)));
        it.face_props
            .push(Stencil::copy(HalfEdgeId::new(1), HalfEdgeId::new(0)));
        stencils.iterations.push(it);
        stencils
            .triangulation
            .push(Stencil::copy(HalfEdgeId::new(2), HalfEdgeId::new(0)));

        assert_eq!(stencils.len(), 3);
    }
}
