//! Error types for editmesh.
//!
//! Conversions themselves never fail as a whole: malformed elements are
//! skipped and reported. The errors below come from the lower level
//! constructors and from validation.

use thiserror::Error;

use crate::customdata::LayerType;

/// Result type alias using [`MeshError`].
pub type Result<T> = std::result::Result<T, MeshError>;

/// Errors that can occur while building or validating meshes.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MeshError {
    /// A face was given fewer than three corners.
    #[error("face has {len} corners, at least 3 are required")]
    TooFewCorners {
        /// Number of corners supplied.
        len: usize,
    },

    /// Vertex and edge lists of a face have different lengths.
    #[error("face has {verts} vertices but {edges} edges")]
    CornerMismatch {
        /// Number of vertices supplied.
        verts: usize,
        /// Number of edges supplied.
        edges: usize,
    },

    /// The same vertex appears twice in a face boundary.
    #[error("face is degenerate (vertex {vertex} is used twice)")]
    DegenerateFace {
        /// The repeated vertex index.
        vertex: usize,
    },

    /// A face corner repeats a vertex used by an earlier corner.
    #[error("face corner {corner} repeats an earlier vertex")]
    RepeatedCorner {
        /// Position of the corner within the face.
        corner: usize,
    },

    /// An edge of a face does not join the corner vertex to the next one.
    #[error("face corner {corner} uses an edge that does not connect its vertices")]
    DisconnectedCorner {
        /// Position of the corner within the face.
        corner: usize,
    },

    /// A handle referred to an element that has been removed.
    #[error("element {0} does not exist")]
    DeadElement(String),

    /// A face references an invalid vertex index.
    #[error("face {face} references invalid vertex index {vertex}")]
    InvalidVertexIndex {
        /// The face index.
        face: usize,
        /// The invalid vertex index.
        vertex: usize,
    },

    /// An edge is invalid (out of range or joins a vertex to itself).
    #[error("edge {edge} is invalid: {reason}")]
    InvalidEdge {
        /// The edge index.
        edge: usize,
        /// Why the edge is invalid.
        reason: &'static str,
    },

    /// A polygon's corner range is out of bounds or malformed.
    #[error("polygon {poly} has an invalid corner range {start}..{end}")]
    InvalidLoopRange {
        /// The polygon index.
        poly: usize,
        /// First corner of the range.
        start: usize,
        /// One past the last corner of the range.
        end: usize,
    },

    /// A corner record references invalid data.
    #[error("corner {corner} is invalid: {reason}")]
    InvalidLoop {
        /// The corner index.
        corner: usize,
        /// Why the corner is invalid.
        reason: &'static str,
    },

    /// Attribute data does not match the element count of its domain.
    #[error("layer {layer:?} has {found} elements, expected {expected}")]
    LayerLength {
        /// The offending layer type.
        layer: LayerType,
        /// Expected element count.
        expected: usize,
        /// Actual element count.
        found: usize,
    },

    /// Attribute data has the wrong value kind for the layer type.
    #[error("layer {0:?} cannot store the supplied values")]
    LayerKind(LayerType),

    /// A shape key block does not cover every vertex.
    #[error("shape key {name:?} has {found} coordinates, expected {expected}")]
    ShapeKeyLength {
        /// Key block name.
        name: String,
        /// Expected coordinate count.
        expected: usize,
        /// Actual coordinate count.
        found: usize,
    },

    /// The mesh has no elements to build from.
    #[error("mesh has no faces")]
    EmptyMesh,
}
