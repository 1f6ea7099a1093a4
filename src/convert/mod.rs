//! Conversion between the persistent [`Mesh`](crate::mesh::Mesh) and the
//! editable [`BMesh`](crate::bmesh::BMesh).
//!
//! # Directions
//!
//! - [`bm_from_mesh`]: build (or extend) a graph from a mesh. Used when an
//!   edit session starts.
//! - [`bm_to_mesh`]: rebuild a mesh's arrays from a graph, reconcile shape
//!   keys and patch objects that reference vertices by index. Used when an
//!   edit session is flushed or ends.
//! - [`bm_to_mesh_for_eval`]: write a graph into an empty mesh for
//!   evaluation, without shape keys or object patching.
//!
//! Conversions are single threaded and need exclusive access to both
//! structures. They never fail as a whole: malformed faces are skipped and
//! reported, missing shape-key layers fall back to older data. Both are
//! logged through `tracing`.
//!
//! # Example
//!
//! ```
//! use editmesh::convert::{bm_from_mesh, bm_to_mesh, BMeshToMeshParams, MeshFromParams};
//! use editmesh::bmesh::BMesh;
//! use editmesh::mesh::cube;
//! use nalgebra::Vector3;
//!
//! let mut mesh = cube("Cube");
//! let mut bm = BMesh::new();
//! bm_from_mesh(&mut bm, &mesh, &MeshFromParams::default());
//!
//! let v = bm.vert_ids().next().unwrap();
//! bm.vert_mut(v).co += Vector3::new(0.0, 0.0, 1.0);
//!
//! bm_to_mesh(&mut bm, &mut mesh, None, &BMeshToMeshParams::default());
//! assert_eq!(mesh.verts[0].co.z, 0.0);
//! ```

mod flags;
mod from_mesh;
mod remap;
mod shape;
mod to_mesh;

pub use flags::{
    cd_flag_apply, cd_flag_ensure, cd_flag_from_bmesh, edge_flag_from_mflag, edge_flag_to_mflag,
    face_flag_from_mflag, face_flag_to_mflag, vert_flag_from_mflag, vert_flag_to_mflag,
    EDGE_DRAW_DOT_THRESHOLD,
};
pub use from_mesh::bm_from_mesh;
pub use remap::{patch_object_references, vertex_map};
pub use shape::{bm_to_mesh_shape, ShapeSource, ShapeSyncReport};
pub use to_mesh::{bm_to_mesh, bm_to_mesh_for_eval};

use crate::customdata::CustomDataMeshMasks;

/// Options for [`bm_from_mesh`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeshFromParams {
    /// Compute face normals on the graph.
    pub calc_face_normal: bool,
    /// Copy vertex normals from the mesh.
    pub calc_vert_normal: bool,
    /// Take vertex positions from the active shape key.
    pub use_shapekey: bool,
    /// Index of the active shape key block.
    pub active_shapekey: Option<usize>,
    /// Add the original-index layer even when the mesh has no shape keys.
    pub add_key_index: bool,
    /// Layers to copy on top of the standard mesh layers.
    pub cd_mask_extra: CustomDataMeshMasks,
}

impl Default for MeshFromParams {
    fn default() -> Self {
        Self {
            calc_face_normal: false,
            calc_vert_normal: false,
            use_shapekey: false,
            active_shapekey: None,
            add_key_index: false,
            cd_mask_extra: CustomDataMeshMasks::NONE,
        }
    }
}

impl MeshFromParams {
    /// Settings for starting an edit session with the given active shape.
    ///
    /// The original-index layer is always added so vertex references can be
    /// remapped exactly when the session ends.
    pub fn edit_mode(active_shapekey: Option<usize>) -> Self {
        Self {
            calc_face_normal: true,
            calc_vert_normal: true,
            use_shapekey: true,
            active_shapekey,
            add_key_index: true,
            ..Default::default()
        }
    }

    /// Set face normal computation.
    pub fn with_face_normals(mut self, calc: bool) -> Self {
        self.calc_face_normal = calc;
        self
    }

    /// Set vertex normal transfer.
    pub fn with_vert_normals(mut self, calc: bool) -> Self {
        self.calc_vert_normal = calc;
        self
    }

    /// Use the given shape key for vertex positions.
    pub fn with_active_shapekey(mut self, index: usize) -> Self {
        self.active_shapekey = Some(index);
        self.use_shapekey = true;
        self
    }

    /// Set whether the original-index layer is always added.
    pub fn with_key_index(mut self, add: bool) -> Self {
        self.add_key_index = add;
        self
    }

    /// Copy additional layer types.
    pub fn with_extra_mask(mut self, mask: CustomDataMeshMasks) -> Self {
        self.cd_mask_extra = mask;
        self
    }
}

/// Options for [`bm_to_mesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BMeshToMeshParams {
    /// Remap hook and vertex-parent indices of objects using the mesh.
    pub calc_object_remap: bool,
    /// Reset the graph's original indices to the new vertex order, so the
    /// graph can keep being edited and flushed again.
    pub update_shapekey_indices: bool,
    /// Keep the active shape's positions in the mesh vertices even when it
    /// is not the reference key.
    pub active_shapekey_to_mvert: bool,
    /// Layers to copy on top of the standard mesh layers.
    pub cd_mask_extra: CustomDataMeshMasks,
}

impl BMeshToMeshParams {
    /// Settings for ending an edit session.
    pub fn exit_edit_mode() -> Self {
        Self {
            calc_object_remap: true,
            ..Default::default()
        }
    }

    /// Settings for writing back while the session continues.
    pub fn flush() -> Self {
        Self {
            calc_object_remap: true,
            update_shapekey_indices: true,
            ..Default::default()
        }
    }

    /// Set object reference remapping.
    pub fn with_object_remap(mut self, remap: bool) -> Self {
        self.calc_object_remap = remap;
        self
    }

    /// Set original-index refresh.
    pub fn with_update_shapekey_indices(mut self, update: bool) -> Self {
        self.update_shapekey_indices = update;
        self
    }

    /// Set whether the active shape is written to the vertex positions.
    pub fn with_active_shapekey_to_mvert(mut self, enable: bool) -> Self {
        self.active_shapekey_to_mvert = enable;
        self
    }

    /// Copy additional layer types.
    pub fn with_extra_mask(mut self, mask: CustomDataMeshMasks) -> Self {
        self.cd_mask_extra = mask;
        self
    }
}

/// Outcome of [`bm_from_mesh`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MeshFromReport {
    /// Indices of polygons that could not be built.
    pub skipped_faces: Vec<usize>,
}

/// Outcome of [`bm_to_mesh`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshToReport {
    /// Shape key reconciliation, if the mesh has a key.
    pub shapes: Option<ShapeSyncReport>,
    /// Number of objects whose vertex references were patched.
    pub remapped_objects: usize,
}

/// Quantize a 0..1 weight to a byte, rounding to nearest.
///
/// Values at or below zero give 0; values above `1 - 0.5 / 255` give 255.
#[inline]
pub fn unit_float_to_uchar_clamp(f: f32) -> u8 {
    if f <= 0.0 {
        0
    } else if f > 1.0 - 0.5 / 255.0 {
        255
    } else {
        (255.0 * f + 0.5) as u8
    }
}

/// Expand a quantized weight back to 0..1.
#[inline]
pub fn uchar_to_unit_float(u: u8) -> f32 {
    f32::from(u) / 255.0
}
