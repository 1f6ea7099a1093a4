//! Generic per-domain attribute storage.
//!
//! A [`CustomData`] set holds any number of named, typed [`Layer`]s for one
//! element domain (vertices, edges, faces or corners). Storage is
//! column-oriented: each layer owns one growable array with one entry per
//! element, addressed by element index. The same type serves both the
//! persistent mesh (index = array position) and the editable graph
//! (index = the row recorded on each element).
//!
//! Layers are kept sorted by [`LayerType`] so that the layout produced by a
//! copy is deterministic for a given input and mask.
//!
//! # Example
//!
//! ```
//! use editmesh::customdata::{CustomData, LayerType};
//!
//! let mut data = CustomData::with_len(3);
//! let weight = data.add_layer(LayerType::PropFloat);
//! data.set::<f32>(weight, 1, 0.5);
//! assert_eq!(data.get::<f32>(weight, 1), Some(0.5));
//! assert_eq!(data.get::<f32>(weight, 0), Some(0.0));
//! ```

mod types;

pub use types::{
    CustomDataMeshMasks, LayerKind, LayerType, LayerTypeInfo, LayerTypeMask, LayerValue,
    ORIGINDEX_NONE,
};

use crate::error::{MeshError, Result};

/// Column storage for one layer.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerData {
    /// `f32` values.
    Float(Vec<f32>),
    /// `i32` values.
    Int(Vec<i32>),
    /// 2D vectors.
    Float2(Vec<[f32; 2]>),
    /// 3D vectors.
    Float3(Vec<[f32; 3]>),
    /// RGBA colors.
    Color(Vec<[f32; 4]>),
    /// Booleans.
    Bool(Vec<bool>),
}

impl LayerData {
    /// A column of `len` copies of `value`.
    pub fn filled(value: LayerValue, len: usize) -> Self {
        match value {
            LayerValue::Float(v) => LayerData::Float(vec![v; len]),
            LayerValue::Int(v) => LayerData::Int(vec![v; len]),
            LayerValue::Float2(v) => LayerData::Float2(vec![v; len]),
            LayerValue::Float3(v) => LayerData::Float3(vec![v; len]),
            LayerValue::Color(v) => LayerData::Color(vec![v; len]),
            LayerValue::Bool(v) => LayerData::Bool(vec![v; len]),
        }
    }

    /// Number of elements in the column.
    pub fn len(&self) -> usize {
        match self {
            LayerData::Float(v) => v.len(),
            LayerData::Int(v) => v.len(),
            LayerData::Float2(v) => v.len(),
            LayerData::Float3(v) => v.len(),
            LayerData::Color(v) => v.len(),
            LayerData::Bool(v) => v.len(),
        }
    }

    /// Whether the column is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The value kind stored.
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerData::Float(_) => LayerKind::Float,
            LayerData::Int(_) => LayerKind::Int,
            LayerData::Float2(_) => LayerKind::Float2,
            LayerData::Float3(_) => LayerKind::Float3,
            LayerData::Color(_) => LayerKind::Color,
            LayerData::Bool(_) => LayerKind::Bool,
        }
    }

    /// Read element `i` as a dynamically typed value.
    pub fn value(&self, i: usize) -> LayerValue {
        match self {
            LayerData::Float(v) => LayerValue::Float(v[i]),
            LayerData::Int(v) => LayerValue::Int(v[i]),
            LayerData::Float2(v) => LayerValue::Float2(v[i]),
            LayerData::Float3(v) => LayerValue::Float3(v[i]),
            LayerData::Color(v) => LayerValue::Color(v[i]),
            LayerData::Bool(v) => LayerValue::Bool(v[i]),
        }
    }

    fn set_value(&mut self, i: usize, value: LayerValue) -> bool {
        match (self, value) {
            (LayerData::Float(v), LayerValue::Float(x)) => v[i] = x,
            (LayerData::Int(v), LayerValue::Int(x)) => v[i] = x,
            (LayerData::Float2(v), LayerValue::Float2(x)) => v[i] = x,
            (LayerData::Float3(v), LayerValue::Float3(x)) => v[i] = x,
            (LayerData::Color(v), LayerValue::Color(x)) => v[i] = x,
            (LayerData::Bool(v), LayerValue::Bool(x)) => v[i] = x,
            _ => return false,
        }
        true
    }

    fn resize(&mut self, len: usize, value: LayerValue) {
        match (self, value) {
            (LayerData::Float(v), LayerValue::Float(x)) => v.resize(len, x),
            (LayerData::Int(v), LayerValue::Int(x)) => v.resize(len, x),
            (LayerData::Float2(v), LayerValue::Float2(x)) => v.resize(len, x),
            (LayerData::Float3(v), LayerValue::Float3(x)) => v.resize(len, x),
            (LayerData::Color(v), LayerValue::Color(x)) => v.resize(len, x),
            (LayerData::Bool(v), LayerValue::Bool(x)) => v.resize(len, x),
            (data, value) => {
                debug_assert!(false, "kind mismatch {:?} / {:?}", data.kind(), value.kind());
            }
        }
    }

    fn copy_element(&mut self, dst_i: usize, src: &LayerData, src_i: usize) {
        match (self, src) {
            (LayerData::Float(d), LayerData::Float(s)) => d[dst_i] = s[src_i],
            (LayerData::Int(d), LayerData::Int(s)) => d[dst_i] = s[src_i],
            (LayerData::Float2(d), LayerData::Float2(s)) => d[dst_i] = s[src_i],
            (LayerData::Float3(d), LayerData::Float3(s)) => d[dst_i] = s[src_i],
            (LayerData::Color(d), LayerData::Color(s)) => d[dst_i] = s[src_i],
            (LayerData::Bool(d), LayerData::Bool(s)) => d[dst_i] = s[src_i],
            _ => debug_assert!(false, "layer kinds differ"),
        }
    }
}

/// Element types that can be read from and written to a layer column.
pub trait LayerElement: Copy + private::Sealed {
    /// Borrow the column if it stores `Self`.
    fn column(data: &LayerData) -> Option<&[Self]>;
    /// Mutably borrow the column if it stores `Self`.
    fn column_mut(data: &mut LayerData) -> Option<&mut [Self]>;
}

mod private {
    pub trait Sealed {}
}

macro_rules! impl_layer_element {
    ($ty:ty, $variant:ident) => {
        impl private::Sealed for $ty {}

        impl LayerElement for $ty {
            #[inline]
            fn column(data: &LayerData) -> Option<&[Self]> {
                match data {
                    LayerData::$variant(v) => Some(v),
                    _ => None,
                }
            }

            #[inline]
            fn column_mut(data: &mut LayerData) -> Option<&mut [Self]> {
                match data {
                    LayerData::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    };
}

impl_layer_element!(f32, Float);
impl_layer_element!(i32, Int);
impl_layer_element!([f32; 2], Float2);
impl_layer_element!([f32; 3], Float3);
impl_layer_element!([f32; 4], Color);
impl_layer_element!(bool, Bool);

/// A single named, typed attribute column.
#[derive(Debug, Clone, PartialEq)]
pub struct Layer {
    ty: LayerType,
    name: String,
    /// Stable identifier; used to pair shape key layers with key blocks.
    pub uid: u32,
    data: LayerData,
}

impl Layer {
    /// The layer type.
    #[inline]
    pub fn ty(&self) -> LayerType {
        self.ty
    }

    /// The layer name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The stored values.
    #[inline]
    pub fn data(&self) -> &LayerData {
        &self.data
    }
}

/// Position of a layer inside a [`CustomData`] set.
///
/// Handles are looked up once and stay valid until layers are added to or
/// removed from the set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LayerHandle(usize);

impl LayerHandle {
    /// The raw layer position.
    #[inline]
    pub fn index(self) -> usize {
        self.0
    }
}

/// How [`CustomData::copy_layers`] fills the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerCopyPolicy {
    /// Replace the destination with the masked layout, every value default.
    AllocateEmpty,
    /// Keep the destination's layers and values, add missing masked layers
    /// filled with defaults.
    MergePreserving,
    /// Replace the destination with a copy of the masked layers and values.
    FullCopy,
}

/// A set of attribute layers for one element domain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    layers: Vec<Layer>,
    len: usize,
}

impl CustomData {
    /// Create an empty set for zero elements.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty set for `len` elements.
    pub fn with_len(len: usize) -> Self {
        Self {
            layers: Vec::new(),
            len,
        }
    }

    /// Create a set with the layout of `src` (restricted to `mask`) for
    /// `len` elements, every value default.
    pub fn from_layout(src: &CustomData, mask: LayerTypeMask, len: usize) -> Self {
        let mut dst = Self::new();
        Self::copy_layers(src, &mut dst, mask, LayerCopyPolicy::AllocateEmpty, len);
        dst
    }

    // ==================== Accessors ====================

    /// Number of elements each layer holds.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the domain has no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of layers.
    #[inline]
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    /// All layers in storage order.
    #[inline]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// A layer by handle.
    #[inline]
    pub fn layer(&self, handle: LayerHandle) -> &Layer {
        &self.layers[handle.0]
    }

    /// Mutable access to a layer's uid.
    #[inline]
    pub fn set_layer_uid(&mut self, handle: LayerHandle, uid: u32) {
        self.layers[handle.0].uid = uid;
    }

    /// Whether a layer of the given type exists.
    pub fn has_layer(&self, ty: LayerType) -> bool {
        self.layers.iter().any(|l| l.ty == ty)
    }

    /// Number of layers of the given type.
    pub fn number_of_layers(&self, ty: LayerType) -> usize {
        self.layers.iter().filter(|l| l.ty == ty).count()
    }

    /// The first layer of the given type.
    pub fn layer_index(&self, ty: LayerType) -> Option<LayerHandle> {
        self.layers.iter().position(|l| l.ty == ty).map(LayerHandle)
    }

    /// The `n`-th layer of the given type.
    pub fn layer_index_n(&self, ty: LayerType, n: usize) -> Option<LayerHandle> {
        self.handles_of(ty).nth(n)
    }

    /// The layer of the given type and name.
    pub fn layer_index_named(&self, ty: LayerType, name: &str) -> Option<LayerHandle> {
        self.layers
            .iter()
            .position(|l| l.ty == ty && l.name == name)
            .map(LayerHandle)
    }

    /// Handles of every layer of the given type, in storage order.
    pub fn handles_of(&self, ty: LayerType) -> impl Iterator<Item = LayerHandle> + '_ {
        self.layers
            .iter()
            .enumerate()
            .filter(move |(_, l)| l.ty == ty)
            .map(|(i, _)| LayerHandle(i))
    }

    // ==================== Layer management ====================

    /// Add a layer with the type's default name.
    pub fn add_layer(&mut self, ty: LayerType) -> LayerHandle {
        self.add_layer_named(ty, ty.info().name)
    }

    /// Add a layer with the given name, made unique among layers of the
    /// same type.
    pub fn add_layer_named(&mut self, ty: LayerType, name: &str) -> LayerHandle {
        let data = LayerData::filled(ty.info().default, self.len);
        self.insert_layer(ty, name, 0, data)
    }

    /// Add a layer with caller-supplied values.
    pub fn add_layer_with_data(
        &mut self,
        ty: LayerType,
        name: &str,
        data: LayerData,
    ) -> Result<LayerHandle> {
        if data.kind() != ty.kind() {
            return Err(MeshError::LayerKind(ty));
        }
        if data.len() != self.len {
            return Err(MeshError::LayerLength {
                layer: ty,
                expected: self.len,
                found: data.len(),
            });
        }
        Ok(self.insert_layer(ty, name, 0, data))
    }

    fn insert_layer(&mut self, ty: LayerType, name: &str, uid: u32, data: LayerData) -> LayerHandle {
        let name = self.unique_name(ty, name);
        let pos = self.layers.iter().take_while(|l| l.ty <= ty).count();
        self.layers.insert(pos, Layer { ty, name, uid, data });
        LayerHandle(pos)
    }

    fn unique_name(&self, ty: LayerType, name: &str) -> String {
        let taken = |candidate: &str| {
            self.layers
                .iter()
                .any(|l| l.ty == ty && l.name == candidate)
        };
        if !taken(name) {
            return name.to_owned();
        }
        (1..)
            .map(|n| format!("{}.{:03}", name, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| name.to_owned())
    }

    /// Remove a layer, returning it.
    pub fn remove_layer(&mut self, handle: LayerHandle) -> Layer {
        self.layers.remove(handle.0)
    }

    /// Remove the first layer of the given type. Returns whether one existed.
    pub fn remove_layer_type(&mut self, ty: LayerType) -> bool {
        match self.layer_index(ty) {
            Some(handle) => {
                self.remove_layer(handle);
                true
            }
            None => false,
        }
    }

    /// Remove every layer and set the element count to zero.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.len = 0;
    }

    // ==================== Element access ====================

    /// Read one element. Returns `None` if the layer stores another kind.
    ///
    /// # Panics
    /// Panics if `elem` is out of range.
    #[inline]
    pub fn get<T: LayerElement>(&self, handle: LayerHandle, elem: usize) -> Option<T> {
        T::column(&self.layers[handle.0].data).map(|c| c[elem])
    }

    /// Write one element. Writes of the wrong kind are ignored.
    ///
    /// # Panics
    /// Panics if `elem` is out of range.
    #[inline]
    pub fn set<T: LayerElement>(&mut self, handle: LayerHandle, elem: usize, value: T) {
        let layer = &mut self.layers[handle.0];
        let ty = layer.ty;
        match T::column_mut(&mut layer.data) {
            Some(column) => column[elem] = value,
            None => debug_assert!(false, "layer {:?} kind mismatch", ty),
        }
    }

    /// Borrow a whole column.
    pub fn column<T: LayerElement>(&self, handle: LayerHandle) -> Option<&[T]> {
        T::column(&self.layers[handle.0].data)
    }

    /// Mutably borrow a whole column.
    pub fn column_mut<T: LayerElement>(&mut self, handle: LayerHandle) -> Option<&mut [T]> {
        T::column_mut(&mut self.layers[handle.0].data)
    }

    /// Read one element as a dynamically typed value.
    pub fn value(&self, handle: LayerHandle, elem: usize) -> LayerValue {
        self.layers[handle.0].data.value(elem)
    }

    /// Write one element from a dynamically typed value.
    pub fn set_value(&mut self, handle: LayerHandle, elem: usize, value: LayerValue) -> Result<()> {
        let layer = &mut self.layers[handle.0];
        if layer.data.set_value(elem, value) {
            Ok(())
        } else {
            Err(MeshError::LayerKind(layer.ty))
        }
    }

    /// Grow or shrink every layer to `len` elements. New elements are default.
    pub fn resize(&mut self, len: usize) {
        for layer in &mut self.layers {
            layer.data.resize(len, layer.ty.info().default);
        }
        self.len = len;
    }

    /// Append one default element, returning its index.
    pub fn push_default(&mut self) -> usize {
        let index = self.len;
        self.resize(index + 1);
        index
    }

    /// Reset one element to the default value in every layer.
    pub fn reset_element(&mut self, elem: usize) {
        for layer in &mut self.layers {
            layer.data.set_value(elem, layer.ty.info().default);
        }
    }

    // ==================== Copying ====================

    /// Copy layers of `src` selected by `mask` into `dst`.
    ///
    /// Source types absent from `src` are simply not copied. Returns whether
    /// `dst` gained any layer.
    pub fn copy_layers(
        src: &CustomData,
        dst: &mut CustomData,
        mask: LayerTypeMask,
        policy: LayerCopyPolicy,
        len: usize,
    ) -> bool {
        let masked = src.layers.iter().filter(|l| mask.includes(l.ty));
        match policy {
            LayerCopyPolicy::AllocateEmpty => {
                dst.layers.clear();
                dst.len = len;
                for layer in masked {
                    let data = LayerData::filled(layer.ty.info().default, len);
                    dst.insert_layer(layer.ty, &layer.name, layer.uid, data);
                }
                !dst.layers.is_empty()
            }
            LayerCopyPolicy::MergePreserving => {
                if dst.len != len {
                    dst.resize(len);
                }
                let mut changed = false;
                for layer in masked {
                    if dst.layer_index_named(layer.ty, &layer.name).is_some() {
                        continue;
                    }
                    let data = LayerData::filled(layer.ty.info().default, len);
                    dst.insert_layer(layer.ty, &layer.name, layer.uid, data);
                    changed = true;
                }
                changed
            }
            LayerCopyPolicy::FullCopy => {
                debug_assert_eq!(src.len, len);
                dst.layers = masked.cloned().collect();
                dst.len = src.len;
                !dst.layers.is_empty()
            }
        }
    }
}

/// Precomputed pairing of layers between two [`CustomData`] sets.
///
/// Layers are paired by type and name. Build once per conversion, then copy
/// any number of elements with [`LayerMap::copy_element`].
#[derive(Debug, Clone, Default)]
pub struct LayerMap {
    pairs: Vec<(usize, usize)>,
}

impl LayerMap {
    /// Pair every layer of `dst` with the layer of `src` of the same type
    /// and name.
    pub fn new(src: &CustomData, dst: &CustomData) -> Self {
        let pairs = dst
            .layers
            .iter()
            .enumerate()
            .filter_map(|(di, dl)| {
                src.layer_index_named(dl.ty, &dl.name)
                    .map(|LayerHandle(si)| (si, di))
            })
            .collect();
        Self { pairs }
    }

    /// Number of paired layers.
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Whether no layers were paired.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    /// Copy element `src_i` of `src` to element `dst_i` of `dst` for every
    /// paired layer.
    pub fn copy_element(&self, src: &CustomData, src_i: usize, dst: &mut CustomData, dst_i: usize) {
        for &(si, di) in &self.pairs {
            dst.layers[di]
                .data
                .copy_element(dst_i, &src.layers[si].data, src_i);
        }
    }
}
