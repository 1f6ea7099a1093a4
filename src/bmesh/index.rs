//! Handle types for editable-graph elements.
//!
//! Handles are versioned slot-map keys, one distinct type per element kind
//! so a vertex handle cannot be passed where an edge is expected. A killed
//! element's handle never resolves again, even after its slot is reused.

use slotmap::new_key_type;

new_key_type! {
    /// A vertex handle.
    pub struct VertId;

    /// An edge handle.
    pub struct EdgeId;

    /// A loop (face corner) handle.
    pub struct LoopId;

    /// A face handle.
    pub struct FaceId;
}

/// A handle to any selectable element, as stored in the selection history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElemRef {
    /// A vertex.
    Vert(VertId),
    /// An edge.
    Edge(EdgeId),
    /// A face.
    Face(FaceId),
}

impl From<VertId> for ElemRef {
    fn from(v: VertId) -> Self {
        ElemRef::Vert(v)
    }
}

impl From<EdgeId> for ElemRef {
    fn from(e: EdgeId) -> Self {
        ElemRef::Edge(e)
    }
}

impl From<FaceId> for ElemRef {
    fn from(f: FaceId) -> Self {
        ElemRef::Face(f)
    }
}
