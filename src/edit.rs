//! Edit sessions.
//!
//! An [`EditMesh`] owns the graph built from a mesh for the duration of an
//! edit, and writes it back with the right settings when flushed or
//! closed.
//!
//! ```
//! use editmesh::edit::EditMesh;
//! use editmesh::mesh::cube;
//! use editmesh::object::{Document, HookModifier, Modifier, Object};
//!
//! let mut mesh = cube("Cube");
//! let mut doc = Document::new();
//! let hooked = doc.add_object(
//!     Object::with_mesh("Cube", &mesh)
//!         .with_modifier(Modifier::Hook(HookModifier::new("Hook", vec![0, 7]))),
//! );
//!
//! let mut edit = EditMesh::enter(&mesh, None);
//! let first = edit.bm().vert_ids().next().unwrap();
//! edit.bm_mut().kill_vert(first);
//! edit.exit(&mut mesh, Some(&mut doc));
//!
//! assert_eq!(mesh.verts.len(), 7);
//! let hook = doc.objects[hooked].hooks().next().unwrap();
//! assert_eq!(hook.indexar, vec![6]);
//! ```

use crate::bmesh::BMesh;
use crate::convert::{bm_from_mesh, bm_to_mesh, BMeshToMeshParams, MeshFromParams, MeshToReport};
use crate::mesh::{Mesh, MeshId};
use crate::object::Document;

/// A graph being edited on behalf of a mesh.
#[derive(Debug)]
pub struct EditMesh {
    bm: BMesh,
    mesh: MeshId,
}

impl EditMesh {
    /// Start editing `me`.
    ///
    /// With no `active_shape`, a mesh with shape keys edits its reference
    /// key.
    pub fn enter(me: &Mesh, active_shape: Option<usize>) -> Self {
        let active = active_shape.or_else(|| me.key.as_ref().and_then(|k| k.refkey()));
        let mut bm = BMesh::new();
        bm_from_mesh(&mut bm, me, &MeshFromParams::edit_mode(active));
        Self { bm, mesh: me.id() }
    }

    /// The graph being edited.
    #[inline]
    pub fn bm(&self) -> &BMesh {
        &self.bm
    }

    /// The graph being edited, mutably.
    #[inline]
    pub fn bm_mut(&mut self) -> &mut BMesh {
        &mut self.bm
    }

    /// The mesh this session edits.
    #[inline]
    pub fn mesh_id(&self) -> MeshId {
        self.mesh
    }

    /// Write the current state to `me` and keep editing.
    ///
    /// Original indices are reset, so the next flush measures shape-key
    /// offsets against the state written here.
    pub fn flush(&mut self, me: &mut Mesh, doc: Option<&mut Document>) -> MeshToReport {
        debug_assert_eq!(me.id(), self.mesh, "flushing into a different mesh");
        bm_to_mesh(&mut self.bm, me, doc, &BMeshToMeshParams::flush())
    }

    /// Write the final state to `me` and end the session.
    pub fn exit(mut self, me: &mut Mesh, doc: Option<&mut Document>) -> MeshToReport {
        debug_assert_eq!(me.id(), self.mesh, "closing into a different mesh");
        bm_to_mesh(&mut self.bm, me, doc, &BMeshToMeshParams::exit_edit_mode())
    }
}
