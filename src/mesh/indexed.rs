//! Flat indexed polygon meshes.
//!
//! [`IndexedMesh`] is the interchange format between the half-edge kernel and
//! the outside world: a position array, a polygon index list and named
//! per-vertex attribute arrays.

use nalgebra::{Point3, Vector2, Vector3, Vector4};

use super::wedge::NORMAL_ATTRIB;

/// Per-vertex attribute values of one type.
#[derive(Debug, Clone, PartialEq)]
pub enum AttribArray {
    /// Scalar values.
    Float(Vec<f64>),
    /// 2-component values (texture coordinates, ...).
    Vec2(Vec<Vector2<f64>>),
    /// 3-component values (normals, tangents, ...).
    Vec3(Vec<Vector3<f64>>),
    /// 4-component values (colors, ...).
    Vec4(Vec<Vector4<f64>>),
}

impl AttribArray {
    /// Number of values.
    pub fn len(&self) -> usize {
        match self {
            AttribArray::Float(v) => v.len(),
            AttribArray::Vec2(v) => v.len(),
            AttribArray::Vec3(v) => v.len(),
            AttribArray::Vec4(v) => v.len(),
        }
    }

    /// Whether the array holds no value.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named attribute array.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAttrib {
    /// Attribute name.
    pub name: String,
    /// One value per vertex.
    pub data: AttribArray,
}

/// An indexed polygon mesh.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexedMesh {
    /// Vertex positions.
    pub positions: Vec<Point3<f64>>,
    /// Polygons as lists of indices into `positions`, counter-clockwise.
    pub polygons: Vec<Vec<usize>>,
    /// Named per-vertex attributes, each as long as `positions`.
    pub attributes: Vec<NamedAttrib>,
}

impl IndexedMesh {
    /// Create a mesh without attributes.
    pub fn new(positions: Vec<Point3<f64>>, polygons: Vec<Vec<usize>>) -> Self {
        Self {
            positions,
            polygons,
            attributes: Vec::new(),
        }
    }

    /// Create a triangle mesh.
    pub fn from_triangles(positions: Vec<Point3<f64>>, triangles: &[[usize; 3]]) -> Self {
        Self::new(positions, triangles.iter().map(|t| t.to_vec()).collect())
    }

    /// Create a quad mesh.
    pub fn from_quads(positions: Vec<Point3<f64>>, quads: &[[usize; 4]]) -> Self {
        Self::new(positions, quads.iter().map(|q| q.to_vec()).collect())
    }

    /// Add an attribute, builder style.
    pub fn with_attrib(mut self, name: &str, data: AttribArray) -> Self {
        self.add_attrib(name, data);
        self
    }

    /// Add an attribute, replacing one with the same name.
    pub fn add_attrib(&mut self, name: &str, data: AttribArray) {
        match self.attributes.iter_mut().find(|a| a.name == name) {
            Some(existing) => existing.data = data,
            None => self.attributes.push(NamedAttrib {
                name: name.to_owned(),
                data,
            }),
        }
    }

    /// Look up an attribute by name.
    pub fn attrib(&self, name: &str) -> Option<&AttribArray> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| &a.data)
    }

    /// The `"normal"` vec3 attribute, if present.
    pub fn normals(&self) -> Option<&[Vector3<f64>]> {
        match self.attrib(NORMAL_ATTRIB) {
            Some(AttribArray::Vec3(n)) => Some(n),
            _ => None,
        }
    }

    /// Number of vertices.
    pub fn num_vertices(&self) -> usize {
        self.positions.len()
    }

    /// Number of polygons.
    pub fn num_faces(&self) -> usize {
        self.polygons.len()
    }

    /// Whether every polygon is a triangle.
    pub fn is_triangle_mesh(&self) -> bool {
        self.polygons.iter().all(|p| p.len() == 3)
    }
}
