//! Layer type registry.
//!
//! Every attribute layer has a [`LayerType`] tag. The registry maps a tag to
//! the kind of value it stores, its element size and its default value. The
//! conversion code only special-cases a handful of types (bevel weight,
//! crease, shape keys); everything else is copied generically.

use bitflags::bitflags;

/// Value stored in the original-index layer for vertices that did not exist
/// in the persistent mesh.
pub const ORIGINDEX_NONE: i32 = -1;

/// Tag identifying what a layer stores.
///
/// The declaration order is the order layers are kept in inside a
/// [`CustomData`](super::CustomData) set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerType {
    /// Bevel weight (0..1).
    BevelWeight,
    /// Subdivision crease (0..1).
    Crease,
    /// Paint mask value per vertex.
    PaintMask,
    /// Per-vertex shape key coordinates.
    ShapeKey,
    /// Original vertex index used to correlate shape key data.
    ShapeKeyIndex,
    /// UV coordinates per corner.
    UvMap,
    /// Byte-style color per corner.
    LoopColor,
    /// Face map index.
    FaceMap,
    /// Generic float attribute.
    PropFloat,
    /// Generic integer attribute.
    PropInt,
    /// Generic 2D vector attribute.
    PropFloat2,
    /// Generic 3D vector attribute.
    PropFloat3,
    /// Generic RGBA color attribute.
    PropColor,
    /// Generic boolean attribute.
    PropBool,
}

/// The value kind stored by a layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerKind {
    /// `f32`
    Float,
    /// `i32`
    Int,
    /// `[f32; 2]`
    Float2,
    /// `[f32; 3]`
    Float3,
    /// `[f32; 4]`
    Color,
    /// `bool`
    Bool,
}

impl LayerKind {
    /// Size in bytes of a single element.
    pub const fn size(self) -> usize {
        match self {
            LayerKind::Float | LayerKind::Int => 4,
            LayerKind::Float2 => 8,
            LayerKind::Float3 => 12,
            LayerKind::Color => 16,
            LayerKind::Bool => 1,
        }
    }
}

/// A single attribute value of any kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LayerValue {
    /// Float value.
    Float(f32),
    /// Integer value.
    Int(i32),
    /// 2D vector value.
    Float2([f32; 2]),
    /// 3D vector value.
    Float3([f32; 3]),
    /// RGBA value.
    Color([f32; 4]),
    /// Boolean value.
    Bool(bool),
}

impl LayerValue {
    /// The kind of this value.
    pub fn kind(&self) -> LayerKind {
        match self {
            LayerValue::Float(_) => LayerKind::Float,
            LayerValue::Int(_) => LayerKind::Int,
            LayerValue::Float2(_) => LayerKind::Float2,
            LayerValue::Float3(_) => LayerKind::Float3,
            LayerValue::Color(_) => LayerKind::Color,
            LayerValue::Bool(_) => LayerKind::Bool,
        }
    }
}

/// Static description of a layer type.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTypeInfo {
    /// Default layer name.
    pub name: &'static str,
    /// Kind of value stored.
    pub kind: LayerKind,
    /// Value used for newly allocated elements.
    pub default: LayerValue,
}

impl LayerTypeInfo {
    /// Size in bytes of one element.
    pub const fn size(&self) -> usize {
        self.kind.size()
    }
}

impl LayerType {
    /// All layer types in storage order.
    pub const ALL: [LayerType; 14] = [
        LayerType::BevelWeight,
        LayerType::Crease,
        LayerType::PaintMask,
        LayerType::ShapeKey,
        LayerType::ShapeKeyIndex,
        LayerType::UvMap,
        LayerType::LoopColor,
        LayerType::FaceMap,
        LayerType::PropFloat,
        LayerType::PropInt,
        LayerType::PropFloat2,
        LayerType::PropFloat3,
        LayerType::PropColor,
        LayerType::PropBool,
    ];

    /// Look up the registry entry for this type.
    pub const fn info(self) -> LayerTypeInfo {
        const fn entry(name: &'static str, kind: LayerKind, default: LayerValue) -> LayerTypeInfo {
            LayerTypeInfo { name, kind, default }
        }

        match self {
            LayerType::BevelWeight => entry("BevelWeight", LayerKind::Float, LayerValue::Float(0.0)),
            LayerType::Crease => entry("Crease", LayerKind::Float, LayerValue::Float(0.0)),
            LayerType::PaintMask => entry("Mask", LayerKind::Float, LayerValue::Float(0.0)),
            LayerType::ShapeKey => entry("Key", LayerKind::Float3, LayerValue::Float3([0.0; 3])),
            // New vertices have no persistent counterpart until proven otherwise.
            LayerType::ShapeKeyIndex => {
                entry("KeyIndex", LayerKind::Int, LayerValue::Int(ORIGINDEX_NONE))
            }
            LayerType::UvMap => entry("UVMap", LayerKind::Float2, LayerValue::Float2([0.0; 2])),
            LayerType::LoopColor => {
                entry("Col", LayerKind::Color, LayerValue::Color([1.0, 1.0, 1.0, 1.0]))
            }
            LayerType::FaceMap => entry("FaceMap", LayerKind::Int, LayerValue::Int(-1)),
            LayerType::PropFloat => entry("Float", LayerKind::Float, LayerValue::Float(0.0)),
            LayerType::PropInt => entry("Int", LayerKind::Int, LayerValue::Int(0)),
            LayerType::PropFloat2 => entry("Float2", LayerKind::Float2, LayerValue::Float2([0.0; 2])),
            LayerType::PropFloat3 => entry("Float3", LayerKind::Float3, LayerValue::Float3([0.0; 3])),
            LayerType::PropColor => {
                entry("Color", LayerKind::Color, LayerValue::Color([0.0, 0.0, 0.0, 1.0]))
            }
            LayerType::PropBool => entry("Bool", LayerKind::Bool, LayerValue::Bool(false)),
        }
    }

    /// The value kind stored by this type.
    #[inline]
    pub const fn kind(self) -> LayerKind {
        self.info().kind
    }

    /// The mask bit for this type.
    pub const fn mask(self) -> LayerTypeMask {
        match self {
            LayerType::BevelWeight => LayerTypeMask::BEVEL_WEIGHT,
            LayerType::Crease => LayerTypeMask::CREASE,
            LayerType::PaintMask => LayerTypeMask::PAINT_MASK,
            LayerType::ShapeKey => LayerTypeMask::SHAPE_KEY,
            LayerType::ShapeKeyIndex => LayerTypeMask::SHAPE_KEY_INDEX,
            LayerType::UvMap => LayerTypeMask::UV_MAP,
            LayerType::LoopColor => LayerTypeMask::LOOP_COLOR,
            LayerType::FaceMap => LayerTypeMask::FACE_MAP,
            LayerType::PropFloat => LayerTypeMask::PROP_FLOAT,
            LayerType::PropInt => LayerTypeMask::PROP_INT,
            LayerType::PropFloat2 => LayerTypeMask::PROP_FLOAT2,
            LayerType::PropFloat3 => LayerTypeMask::PROP_FLOAT3,
            LayerType::PropColor => LayerTypeMask::PROP_COLOR,
            LayerType::PropBool => LayerTypeMask::PROP_BOOL,
        }
    }
}

bitflags! {
    /// A set of layer types.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct LayerTypeMask: u32 {
        /// [`LayerType::BevelWeight`]
        const BEVEL_WEIGHT = 1 << 0;
        /// [`LayerType::Crease`]
        const CREASE = 1 << 1;
        /// [`LayerType::PaintMask`]
        const PAINT_MASK = 1 << 2;
        /// [`LayerType::ShapeKey`]
        const SHAPE_KEY = 1 << 3;
        /// [`LayerType::ShapeKeyIndex`]
        const SHAPE_KEY_INDEX = 1 << 4;
        /// [`LayerType::UvMap`]
        const UV_MAP = 1 << 5;
        /// [`LayerType::LoopColor`]
        const LOOP_COLOR = 1 << 6;
        /// [`LayerType::FaceMap`]
        const FACE_MAP = 1 << 7;
        /// [`LayerType::PropFloat`]
        const PROP_FLOAT = 1 << 8;
        /// [`LayerType::PropInt`]
        const PROP_INT = 1 << 9;
        /// [`LayerType::PropFloat2`]
        const PROP_FLOAT2 = 1 << 10;
        /// [`LayerType::PropFloat3`]
        const PROP_FLOAT3 = 1 << 11;
        /// [`LayerType::PropColor`]
        const PROP_COLOR = 1 << 12;
        /// [`LayerType::PropBool`]
        const PROP_BOOL = 1 << 13;

        /// All generic attribute types.
        const PROP_ALL = Self::PROP_FLOAT.bits()
            | Self::PROP_INT.bits()
            | Self::PROP_FLOAT2.bits()
            | Self::PROP_FLOAT3.bits()
            | Self::PROP_COLOR.bits()
            | Self::PROP_BOOL.bits();
    }
}

impl LayerTypeMask {
    /// Whether `ty` is part of this mask.
    #[inline]
    pub fn includes(self, ty: LayerType) -> bool {
        self.contains(ty.mask())
    }
}

/// Per-domain layer masks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CustomDataMeshMasks {
    /// Vertex domain.
    pub vmask: LayerTypeMask,
    /// Edge domain.
    pub emask: LayerTypeMask,
    /// Face (polygon) domain.
    pub pmask: LayerTypeMask,
    /// Corner (loop) domain.
    pub lmask: LayerTypeMask,
}

impl CustomDataMeshMasks {
    /// Layers kept by a persistent mesh.
    ///
    /// Edge bevel weight and crease live in the edge records and vertex bevel
    /// weight in the vertex records, so those layers are not part of the mask.
    pub const MESH: Self = Self {
        vmask: LayerTypeMask::PAINT_MASK
            .union(LayerTypeMask::CREASE)
            .union(LayerTypeMask::PROP_ALL),
        emask: LayerTypeMask::PROP_ALL,
        pmask: LayerTypeMask::FACE_MAP.union(LayerTypeMask::PROP_ALL),
        lmask: LayerTypeMask::UV_MAP
            .union(LayerTypeMask::LOOP_COLOR)
            .union(LayerTypeMask::PROP_ALL),
    };

    /// Layers kept by the editable graph.
    pub const BMESH: Self = Self {
        vmask: Self::MESH
            .vmask
            .union(LayerTypeMask::BEVEL_WEIGHT)
            .union(LayerTypeMask::SHAPE_KEY)
            .union(LayerTypeMask::SHAPE_KEY_INDEX),
        emask: Self::MESH
            .emask
            .union(LayerTypeMask::BEVEL_WEIGHT)
            .union(LayerTypeMask::CREASE),
        pmask: Self::MESH.pmask,
        lmask: Self::MESH.lmask,
    };

    /// Layers carried into evaluated (modifier result) meshes.
    pub const DERIVED: Self = Self {
        vmask: LayerTypeMask::PAINT_MASK
            .union(LayerTypeMask::CREASE)
            .union(LayerTypeMask::SHAPE_KEY)
            .union(LayerTypeMask::PROP_ALL),
        emask: LayerTypeMask::PROP_ALL,
        pmask: LayerTypeMask::FACE_MAP.union(LayerTypeMask::PROP_ALL),
        lmask: LayerTypeMask::UV_MAP
            .union(LayerTypeMask::LOOP_COLOR)
            .union(LayerTypeMask::PROP_ALL),
    };

    /// An empty mask.
    pub const NONE: Self = Self {
        vmask: LayerTypeMask::empty(),
        emask: LayerTypeMask::empty(),
        pmask: LayerTypeMask::empty(),
        lmask: LayerTypeMask::empty(),
    };

    /// Add every type of `other` to this mask.
    pub fn update(&mut self, other: &Self) {
        self.vmask |= other.vmask;
        self.emask |= other.emask;
        self.pmask |= other.pmask;
        self.lmask |= other.lmask;
    }

    /// Union of two masks.
    pub fn union(mut self, other: &Self) -> Self {
        self.update(other);
        self
    }
}
