//! Per-corner attribute bundles ("wedges") and their interning store.
//!
//! A wedge is the set of interpolatable attributes a renderer sees at one
//! corner of a face: a position plus any number of named scalar, 2-, 3- and
//! 4-component attributes. Half-edges reference wedges by [`WedgeIndex`], so
//! all corners around a vertex that should look the same share one wedge, and
//! corners on either side of a hard seam carry different ones.
//!
//! [`WedgeStore`] is a value-keyed interning table with explicit reference
//! counts. A wedge whose count drops to zero is dead but keeps its slot until
//! [`WedgeStore::garbage_collection`] compacts the table.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use nalgebra::{Point3, Vector2, Vector3, Vector4};
use tracing::warn;

use super::index::{MeshIndex, WedgeIndex};

/// Name of the vec3 attribute that is treated as a unit normal when blending.
pub const NORMAL_ATTRIB: &str = "normal";

/// The mesh-global set of wedge attribute names, grouped by type.
///
/// The schema only ever grows. Every wedge in a store carries exactly one
/// value per registered name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttribSchema {
    floats: Vec<String>,
    vec2s: Vec<String>,
    vec3s: Vec<String>,
    vec4s: Vec<String>,
}

impl AttribSchema {
    /// Names registered for attribute type `T`, in index order.
    pub fn names<T: WedgeAttrib>(&self) -> &[String] {
        T::names(self)
    }

    /// Index of the attribute `name` of type `T`.
    pub fn index_of<T: WedgeAttrib>(&self, name: &str) -> Option<usize> {
        T::names(self).iter().position(|n| n == name)
    }

    /// Index of the normal attribute, if one is registered.
    pub fn normal_index(&self) -> Option<usize> {
        self.index_of::<Vector3<f64>>(NORMAL_ATTRIB)
    }

    /// Total number of registered attributes.
    pub fn len(&self) -> usize {
        self.floats.len() + self.vec2s.len() + self.vec3s.len() + self.vec4s.len()
    }

    /// Whether no attribute has been registered.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An attribute value type that can live in a wedge.
///
/// Implemented for `f64`, `Vector2<f64>`, `Vector3<f64>` and `Vector4<f64>`.
pub trait WedgeAttrib: Copy + Debug + Send + Sync + 'static {
    /// The additive identity, used when a new attribute has no default.
    fn zero() -> Self;

    /// Names of the attributes of this type.
    fn names(schema: &AttribSchema) -> &Vec<String>;

    /// Mutable names of the attributes of this type.
    fn names_mut(schema: &mut AttribSchema) -> &mut Vec<String>;

    /// Values of the attributes of this type carried by a wedge.
    fn values(data: &WedgeData) -> &Vec<Self>;

    /// Mutable values of the attributes of this type carried by a wedge.
    fn values_mut(data: &mut WedgeData) -> &mut Vec<Self>;
}

macro_rules! impl_wedge_attrib {
    ($ty:ty, $field:ident, $zero:expr) => {
        impl WedgeAttrib for $ty {
            #[inline]
            fn zero() -> Self {
                $zero
            }

            #[inline]
            fn names(schema: &AttribSchema) -> &Vec<String> {
                &schema.$field
            }

            #[inline]
            fn names_mut(schema: &mut AttribSchema) -> &mut Vec<String> {
                &mut schema.$field
            }

            #[inline]
            fn values(data: &WedgeData) -> &Vec<Self> {
                &data.$field
            }

            #[inline]
            fn values_mut(data: &mut WedgeData) -> &mut Vec<Self> {
                &mut data.$field
            }
        }
    };
}

impl_wedge_attrib!(f64, floats, 0.0);
impl_wedge_attrib!(Vector2<f64>, vec2s, Vector2::zeros());
impl_wedge_attrib!(Vector3<f64>, vec3s, Vector3::zeros());
impl_wedge_attrib!(Vector4<f64>, vec4s, Vector4::zeros());

/// The attribute bundle of one wedge.
///
/// Equality and hashing are bitwise over the position and every attribute
/// value, so two bundles compare equal exactly when they can be shared.
#[derive(Debug, Clone)]
pub struct WedgeData {
    /// Corner position. Always equal to the point of the corner's vertex.
    pub position: Point3<f64>,
    /// Scalar attributes.
    pub floats: Vec<f64>,
    /// 2-component attributes.
    pub vec2s: Vec<Vector2<f64>>,
    /// 3-component attributes.
    pub vec3s: Vec<Vector3<f64>>,
    /// 4-component attributes.
    pub vec4s: Vec<Vector4<f64>>,
}

impl WedgeData {
    /// Create a bundle with a position and no attributes.
    pub fn new(position: Point3<f64>) -> Self {
        Self {
            position,
            floats: Vec::new(),
            vec2s: Vec::new(),
            vec3s: Vec::new(),
            vec4s: Vec::new(),
        }
    }

    /// Create a bundle carrying a zero value for every attribute of `schema`.
    pub fn for_schema(schema: &AttribSchema, position: Point3<f64>) -> Self {
        Self {
            position,
            floats: vec![0.0; schema.floats.len()],
            vec2s: vec![Vector2::zeros(); schema.vec2s.len()],
            vec3s: vec![Vector3::zeros(); schema.vec3s.len()],
            vec4s: vec![Vector4::zeros(); schema.vec4s.len()],
        }
    }

    /// Value of attribute `index` of type `T`.
    pub fn attrib<T: WedgeAttrib>(&self, index: usize) -> Option<T> {
        T::values(self).get(index).copied()
    }

    /// Set attribute `index` of type `T`. Returns false if out of range.
    pub fn set_attrib<T: WedgeAttrib>(&mut self, index: usize, value: T) -> bool {
        match T::values_mut(self).get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    /// Whether this bundle carries exactly one value per schema attribute.
    pub fn matches_schema(&self, schema: &AttribSchema) -> bool {
        self.floats.len() == schema.floats.len()
            && self.vec2s.len() == schema.vec2s.len()
            && self.vec3s.len() == schema.vec3s.len()
            && self.vec4s.len() == schema.vec4s.len()
    }

    /// Linear interpolation `(1 - t) * a + t * b` of position and attributes.
    pub fn lerp(a: &WedgeData, b: &WedgeData, t: f64) -> WedgeData {
        let mut out = a.scaled(1.0 - t);
        out.accumulate(t, b);
        out
    }

    /// Weighted sum of bundles. Returns `None` for an empty term list.
    pub fn weighted_sum<'a, It>(terms: It) -> Option<WedgeData>
    where
        It: IntoIterator<Item = (f64, &'a WedgeData)>,
    {
        let mut terms = terms.into_iter();
        let (w0, first) = terms.next()?;
        let mut out = first.scaled(w0);
        for (w, data) in terms {
            out.accumulate(w, data);
        }
        Some(out)
    }

    /// Normalize vec3 attribute `index` in place, leaving zero vectors alone.
    pub fn normalize_vec3(&mut self, index: usize) {
        if let Some(v) = self.vec3s.get_mut(index) {
            if let Some(n) = v.try_normalize(f64::EPSILON) {
                *v = n;
            }
        }
    }

    fn scaled(&self, w: f64) -> WedgeData {
        WedgeData {
            position: Point3::from(self.position.coords * w),
            floats: self.floats.iter().map(|x| x * w).collect(),
            vec2s: self.vec2s.iter().map(|x| x * w).collect(),
            vec3s: self.vec3s.iter().map(|x| x * w).collect(),
            vec4s: self.vec4s.iter().map(|x| x * w).collect(),
        }
    }

    fn accumulate(&mut self, w: f64, other: &WedgeData) {
        debug_assert_eq!(self.floats.len(), other.floats.len());
        debug_assert_eq!(self.vec3s.len(), other.vec3s.len());

        self.position.coords += other.position.coords * w;
        for (a, b) in self.floats.iter_mut().zip(&other.floats) {
            *a += b * w;
        }
        for (a, b) in self.vec2s.iter_mut().zip(&other.vec2s) {
            *a += b * w;
        }
        for (a, b) in self.vec3s.iter_mut().zip(&other.vec3s) {
            *a += b * w;
        }
        for (a, b) in self.vec4s.iter_mut().zip(&other.vec4s) {
            *a += b * w;
        }
    }

    fn lengths(&self) -> [usize; 4] {
        [
            self.floats.len(),
            self.vec2s.len(),
            self.vec3s.len(),
            self.vec4s.len(),
        ]
    }

    fn bits(&self) -> impl Iterator<Item = u64> + '_ {
        self.position
            .coords
            .iter()
            .chain(self.floats.iter())
            .chain(self.vec2s.iter().flat_map(|v| v.iter()))
            .chain(self.vec3s.iter().flat_map(|v| v.iter()))
            .chain(self.vec4s.iter().flat_map(|v| v.iter()))
            .map(|x| x.to_bits())
    }
}

impl PartialEq for WedgeData {
    fn eq(&self, other: &Self) -> bool {
        self.lengths() == other.lengths() && self.bits().eq(other.bits())
    }
}

impl Eq for WedgeData {}

impl Hash for WedgeData {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.lengths().hash(state);
        for b in self.bits() {
            b.hash(state);
        }
    }
}

fn hash_of(data: &WedgeData) -> u64 {
    let mut hasher = DefaultHasher::new();
    data.hash(&mut hasher);
    hasher.finish()
}

/// A stored wedge: attribute bundle plus reference count.
#[derive(Debug, Clone)]
pub struct Wedge {
    data: WedgeData,
    ref_count: u32,
}

impl Wedge {
    /// The attribute bundle.
    #[inline]
    pub fn data(&self) -> &WedgeData {
        &self.data
    }

    /// Number of half-edges referencing this wedge.
    #[inline]
    pub fn ref_count(&self) -> u32 {
        self.ref_count
    }

    /// A dead wedge has no references and is removed by garbage collection.
    #[inline]
    pub fn is_deleted(&self) -> bool {
        self.ref_count == 0
    }
}

/// Content-addressed, reference-counted collection of wedges.
#[derive(Debug, Clone)]
pub struct WedgeStore<I: MeshIndex = u32> {
    wedges: Vec<Wedge>,
    buckets: HashMap<u64, Vec<usize>>,
    schema: AttribSchema,
    _index: PhantomData<I>,
}

impl<I: MeshIndex> Default for WedgeStore<I> {
    fn default() -> Self {
        Self::new()
    }
}

impl<I: MeshIndex> WedgeStore<I> {
    /// Create an empty store with an empty schema.
    pub fn new() -> Self {
        Self {
            wedges: Vec::new(),
            buckets: HashMap::new(),
            schema: AttribSchema::default(),
            _index: PhantomData,
        }
    }

    /// Number of slots, dead ones included.
    #[inline]
    pub fn len(&self) -> usize {
        self.wedges.len()
    }

    /// Whether the store has no slots.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.wedges.is_empty()
    }

    /// Number of live wedges.
    pub fn num_live(&self) -> usize {
        self.wedges.iter().filter(|w| !w.is_deleted()).count()
    }

    /// The attribute schema shared by all wedges.
    #[inline]
    pub fn schema(&self) -> &AttribSchema {
        &self.schema
    }

    /// Get a wedge by index.
    #[inline]
    pub fn get(&self, w: WedgeIndex<I>) -> &Wedge {
        &self.wedges[w.index()]
    }

    /// Get the attribute bundle of a wedge.
    #[inline]
    pub fn data(&self, w: WedgeIndex<I>) -> &WedgeData {
        &self.wedges[w.index()].data
    }

    /// Reference count of a wedge.
    #[inline]
    pub fn ref_count(&self, w: WedgeIndex<I>) -> u32 {
        self.wedges[w.index()].ref_count
    }

    /// Whether `w` names a live wedge.
    #[inline]
    pub fn is_live(&self, w: WedgeIndex<I>) -> bool {
        w.is_valid() && w.index() < self.wedges.len() && !self.wedges[w.index()].is_deleted()
    }

    /// Iterate over live wedges.
    pub fn iter(&self) -> impl Iterator<Item = (WedgeIndex<I>, &Wedge)> + '_ {
        self.wedges
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_deleted())
            .map(|(i, w)| (WedgeIndex::new(i), w))
    }

    /// Intern a bundle.
    ///
    /// Returns the index of a live wedge with equal data, taking a new reference
    /// to it, or stores the bundle as a new wedge with one reference.
    pub fn add(&mut self, data: WedgeData) -> WedgeIndex<I> {
        debug_assert!(
            data.matches_schema(&self.schema),
            "wedge data does not match the attribute schema"
        );

        let key = hash_of(&data);
        if let Some(slots) = self.buckets.get(&key) {
            for &i in slots {
                let wedge = &self.wedges[i];
                if !wedge.is_deleted() && wedge.data == data {
                    self.wedges[i].ref_count += 1;
                    return WedgeIndex::new(i);
                }
            }
        }

        let i = self.wedges.len();
        self.wedges.push(Wedge { data, ref_count: 1 });
        self.buckets.entry(key).or_default().push(i);
        WedgeIndex::new(i)
    }

    /// Drop one reference. Invalid indices are ignored.
    pub fn del(&mut self, w: WedgeIndex<I>) {
        if !w.is_valid() {
            return;
        }
        let wedge = &mut self.wedges[w.index()];
        debug_assert!(wedge.ref_count > 0, "wedge {:?} reference count underflow", w);
        wedge.ref_count = wedge.ref_count.saturating_sub(1);
    }

    /// Take one more reference and return the same index.
    pub fn new_reference(&mut self, w: WedgeIndex<I>) -> WedgeIndex<I> {
        if w.is_valid() {
            self.wedges[w.index()].ref_count += 1;
        }
        w
    }

    /// Replace the data of a wedge in place.
    ///
    /// Every half-edge referencing the wedge observes the change. Returns false
    /// if the bundle does not fit the schema or the index is out of range.
    pub fn set_data(&mut self, w: WedgeIndex<I>, data: WedgeData) -> bool {
        if !w.is_valid() || w.index() >= self.wedges.len() {
            return false;
        }
        if !data.matches_schema(&self.schema) {
            warn!(
                wedge = w.index(),
                "wedge data does not match the attribute schema, ignoring update"
            );
            return false;
        }

        let i = w.index();
        let old_key = hash_of(&self.wedges[i].data);
        if let Some(slots) = self.buckets.get_mut(&old_key) {
            slots.retain(|&s| s != i);
            if slots.is_empty() {
                self.buckets.remove(&old_key);
            }
        }

        self.buckets.entry(hash_of(&data)).or_default().push(i);
        self.wedges[i].data = data;
        true
    }

    /// Register an attribute of type `T` and give every wedge `default`.
    ///
    /// Returns the attribute index. If the name is already registered for `T`
    /// the existing index is returned and no wedge is touched.
    pub fn add_attrib<T: WedgeAttrib>(&mut self, name: &str, default: T) -> usize {
        if let Some(index) = self.schema.index_of::<T>(name) {
            return index;
        }

        let names = T::names_mut(&mut self.schema);
        names.push(name.to_owned());
        let index = names.len() - 1;

        for wedge in &mut self.wedges {
            T::values_mut(&mut wedge.data).push(default);
        }
        self.rebuild_buckets();
        index
    }

    /// Index of attribute `name` of type `T`.
    pub fn attrib_index<T: WedgeAttrib>(&self, name: &str) -> Option<usize> {
        self.schema.index_of::<T>(name)
    }

    /// A bundle at `position` with a zero value for every attribute.
    pub fn new_data(&self, position: Point3<f64>) -> WedgeData {
        WedgeData::for_schema(&self.schema, position)
    }

    /// Per-slot index shift for compaction.
    ///
    /// Live slot `i` moves to `i - offset[i]`; dead slots are `None`.
    pub fn compute_cleanup_offset(&self) -> Vec<Option<usize>> {
        let mut removed = 0;
        self.wedges
            .iter()
            .map(|w| {
                if w.is_deleted() {
                    removed += 1;
                    None
                } else {
                    Some(removed)
                }
            })
            .collect()
    }

    /// Remove dead wedges and renumber the survivors contiguously.
    ///
    /// Returns the offsets computed before compaction so callers can remap the
    /// indices they store.
    pub fn garbage_collection(&mut self) -> Vec<Option<usize>> {
        let offsets = self.compute_cleanup_offset();
        self.wedges.retain(|w| !w.is_deleted());
        self.rebuild_buckets();
        offsets
    }

    fn rebuild_buckets(&mut self) {
        self.buckets.clear();
        for (i, wedge) in self.wedges.iter().enumerate() {
            self.buckets.entry(hash_of(&wedge.data)).or_default().push(i);
        }
    }
}

/// Map an index through offsets returned by [`WedgeStore::garbage_collection`].
#[inline]
pub fn remap_wedge<I: MeshIndex>(offsets: &[Option<usize>], w: WedgeIndex<I>) -> WedgeIndex<I> {
    if !w.is_valid() {
        return w;
    }
    match offsets.get(w.index()).copied().flatten() {
        Some(shift) => WedgeIndex::new(w.index() - shift),
        None => WedgeIndex::invalid(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data_at(x: f64) -> WedgeData {
        WedgeData::new(Point3::new(x, 0.0, 0.0))
    }

    #[test]
    fn test_add_shares_equal_data() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(1.0));
        let b = store.add(data_at(1.0));
        let c = store.add(data_at(2.0));

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(store.ref_count(a), 2);
        assert_eq!(store.ref_count(c), 1);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_signed_zero_is_distinct() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(0.0));
        let b = store.add(data_at(-0.0));
        assert_ne!(a, b);
    }

    #[test]
    fn test_del_and_new_reference() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(1.0));
        assert_eq!(store.new_reference(a), a);
        assert_eq!(store.ref_count(a), 2);

        store.del(a);
        store.del(a);
        assert!(store.get(a).is_deleted());
        // Data stays in place until compaction
        assert_eq!(store.len(), 1);

        // Invalid handles are ignored
        store.del(WedgeIndex::invalid());
    }

    #[test]
    fn test_dead_wedge_is_not_revived() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(1.0));
        store.del(a);

        let b = store.add(data_at(1.0));
        assert_ne!(a, b);
        assert_eq!(store.ref_count(b), 1);
        assert_eq!(store.num_live(), 1);
    }

    #[test]
    fn test_set_data_updates_lookup() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(1.0));
        let b = store.add(data_at(2.0));

        assert!(store.set_data(b, data_at(3.0)));
        assert_eq!(store.data(b).position.x, 3.0);

        // The old value of b is no longer found, the new one is
        let c = store.add(data_at(2.0));
        assert_ne!(c, b);
        let d = store.add(data_at(3.0));
        assert_eq!(d, b);

        // Making two wedges equal does not merge them
        assert!(store.set_data(a, data_at(3.0)));
        assert_eq!(store.num_live(), 3);
    }

    #[test]
    fn test_set_data_rejects_schema_mismatch() {
        let mut store: WedgeStore = WedgeStore::new();
        store.add_attrib::<f64>("weight", 0.5);
        let a = store.add(store.new_data(Point3::origin()));

        assert!(!store.set_data(a, data_at(1.0)));
        assert_eq!(store.data(a).position, Point3::origin());
    }

    #[test]
    fn test_add_attrib_extends_every_wedge() {
        let mut store: WedgeStore = WedgeStore::new();
        let a = store.add(data_at(1.0));
        let b = store.add(data_at(2.0));

        let uv = store.add_attrib("uv", Vector2::new(0.25, 0.75));
        let w = store.add_attrib::<f64>("weight", 1.0);
        assert_eq!(uv, 0);
        assert_eq!(w, 0);
        assert_eq!(store.add_attrib::<f64>("weight", 7.0), 0);

        for wedge in [a, b] {
            let data = store.data(wedge);
            assert_eq!(data.attrib::<Vector2<f64>>(0), Some(Vector2::new(0.25, 0.75)));
            assert_eq!(data.attrib::<f64>(0), Some(1.0));
            assert!(data.matches_schema(store.schema()));
        }

        // Lookup still works after the schema grew
        let mut extended = data_at(1.0);
        extended.vec2s.push(Vector2::new(0.25, 0.75));
        extended.floats.push(1.0);
        assert_eq!(store.add(extended), a);
    }

    #[test]
    fn test_cleanup_offset_and_gc() {
        let mut store: WedgeStore = WedgeStore::new();
        let w: Vec<WedgeIndex> = (0..5).map(|i| store.add(data_at(i as f64))).collect();
        store.del(w[1]);
        store.del(w[3]);

        let offsets = store.compute_cleanup_offset();
        assert_eq!(offsets, vec![Some(0), None, Some(1), None, Some(2)]);

        let offsets = store.garbage_collection();
        assert_eq!(store.len(), 3);
        assert_eq!(remap_wedge(&offsets, w[4]).index(), 2);
        assert!(!remap_wedge(&offsets, w[3]).is_valid());
        assert_eq!(store.data(remap_wedge(&offsets, w[2])).position.x, 2.0);

        // Lookup table follows the renumbering
        assert_eq!(store.add(data_at(4.0)).index(), 2);
    }

    #[test]
    fn test_lerp_and_weighted_sum() {
        let mut a = data_at(0.0);
        a.floats.push(0.0);
        let mut b = data_at(2.0);
        b.floats.push(4.0);

        let mid = WedgeData::lerp(&a, &b, 0.25);
        assert!((mid.position.x - 0.5).abs() < 1e-12);
        assert!((mid.floats[0] - 1.0).abs() < 1e-12);

        let avg = WedgeData::weighted_sum([(0.5, &a), (0.5, &b)]).unwrap();
        assert!((avg.floats[0] - 2.0).abs() < 1e-12);
        assert!(WedgeData::weighted_sum(std::iter::empty()).is_none());
    }
}
