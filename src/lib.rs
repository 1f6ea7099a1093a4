//! # Editmesh
//!
//! Lossless conversion between a flat-array mesh and an editable
//! topological mesh graph.
//!
//! A [`Mesh`](mesh::Mesh) stores vertices, edges, polygons and corners in
//! flat arrays, which suits storage and evaluation. Interactive editing
//! needs constant-time adjacency instead, which the [`BMesh`](bmesh::BMesh)
//! graph provides through disk, loop and radial cycles. The
//! [`convert`] module moves a mesh into a graph and back while keeping:
//!
//! - **Custom data**: per-element attribute layers on every domain
//! - **Flags**: selection, visibility, seams, sharpness and wire display
//! - **Shape keys**: edits of a basis shape propagate to dependent shapes
//! - **Selection history**: in pick order, with fresh indices
//! - **Object references**: hook modifiers and vertex parents are remapped
//!   to the new vertex order
//!
//! ## Quick Start
//!
//! ```
//! use editmesh::prelude::*;
//! use nalgebra::Vector3;
//!
//! let mut mesh = cube("Cube");
//! mesh.add_shape_key("Basis");
//! mesh.add_shape_key("Smile");
//!
//! // Enter edit mode on the basis shape and move every vertex up.
//! let mut edit = EditMesh::enter(&mesh, Some(0));
//! let verts: Vec<VertId> = edit.bm().vert_ids().collect();
//! for v in verts {
//!     edit.bm_mut().vert_mut(v).co += Vector3::new(0.0, 0.0, 1.0);
//! }
//! let report = edit.exit(&mut mesh, None);
//!
//! // The dependent shape moved along with its basis.
//! assert!(report.shapes.unwrap().basis_offset_applied);
//! let smile = &mesh.key.as_ref().unwrap().blocks()[1];
//! assert_eq!(smile.data[0].z, 0.0);
//! ```
//!
//! ## Lower-Level Conversion
//!
//! ```
//! use editmesh::prelude::*;
//!
//! let mut mesh = grid("Grid", 4);
//! let mut bm = BMesh::new();
//! let report = bm_from_mesh(&mut bm, &mesh, &MeshFromParams::default());
//! assert!(report.skipped_faces.is_empty());
//!
//! let f = bm.face_ids().next().unwrap();
//! bm.kill_face(f);
//!
//! bm_to_mesh(&mut bm, &mut mesh, None, &BMeshToMeshParams::default());
//! assert_eq!(mesh.num_polys(), 15);
//! assert!(mesh.validate().is_ok());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod bmesh;
pub mod convert;
pub mod customdata;
pub mod edit;
pub mod error;
pub mod mesh;
pub mod object;

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and functions:
///
/// ```
/// use editmesh::prelude::*;
/// ```
pub mod prelude {
    pub use crate::bmesh::{BMesh, EdgeId, ElemFlag, ElemRef, FaceId, LoopId, VertId};
    pub use crate::convert::{
        bm_from_mesh, bm_to_mesh, bm_to_mesh_for_eval, BMeshToMeshParams, MeshFromParams,
    };
    pub use crate::customdata::{CustomData, CustomDataMeshMasks, LayerType};
    pub use crate::edit::EditMesh;
    pub use crate::error::{MeshError, Result};
    pub use crate::mesh::{build_from_polygons, cube, grid, Key, Mesh};
    pub use crate::object::{Document, Object};
}

// Re-export nalgebra types for convenience
pub use nalgebra;
