//! The persistent, array-based mesh.
//!
//! This is the form meshes are stored and evaluated in: flat arrays of
//! vertices, edges, polygons and corners, with polygons referencing a
//! contiguous range of corners and corners referencing vertices and edges
//! by index.
//!
//! # Overview
//!
//! - [`Mesh`] owns the element arrays, one [`CustomData`](crate::customdata::CustomData)
//!   set per domain, optional shape keys ([`Key`]) and the selection history.
//! - [`MeshVert`], [`MeshEdge`], [`MeshPoly`] and [`MeshLoop`] are plain
//!   records with compact flag words ([`VertFlag`], [`EdgeFlag`], [`PolyFlag`]).
//! - [`MeshRuntime`] holds caches derived from the arrays.
//!
//! # Construction
//!
//! ```
//! use editmesh::mesh::{build_from_quads, Mesh};
//! use nalgebra::Point3;
//!
//! let vertices = vec![
//!     Point3::new(0.0, 0.0, 0.0),
//!     Point3::new(1.0, 0.0, 0.0),
//!     Point3::new(1.0, 1.0, 0.0),
//!     Point3::new(0.0, 1.0, 0.0),
//! ];
//! let mesh: Mesh = build_from_quads("Plane", &vertices, &[[0, 1, 2, 3]]).unwrap();
//! assert_eq!(mesh.num_edges(), 4);
//! ```

mod builder;
mod key;
mod runtime;
mod types;
mod validate;

pub use builder::{build_from_polygons, build_from_quads, build_from_triangles, cube, grid, to_polygons};
pub use key::{Key, KeyBlock, KeyType};
pub use runtime::MeshRuntime;
pub(crate) use runtime::polygon_normal;
pub use types::{
    CdFlag, EdgeFlag, Mesh, MeshEdge, MeshId, MeshLoop, MeshPoly, MeshSelect, MeshVert, PolyFlag,
    SelectType, VertFlag,
};
