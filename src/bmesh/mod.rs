//! The editable mesh graph.
//!
//! [`BMesh`] is a winged, cycle-linked mesh representation used for
//! interactive editing. Unlike the persistent [`Mesh`](crate::mesh::Mesh),
//! every element knows its neighbours directly:
//!
//! - vertex → one edge of its disk cycle ([`BMesh::vert_edges`])
//! - edge → one loop of its radial cycle ([`BMesh::edge_loops`])
//! - face → one loop of its loop cycle ([`BMesh::face_loops`])
//!
//! Elements are stored in slot maps and addressed by the typed handles
//! [`VertId`], [`EdgeId`], [`LoopId`] and [`FaceId`].
//!
//! ```
//! use editmesh::bmesh::BMesh;
//! use nalgebra::Point3;
//!
//! let mut bm = BMesh::new();
//! let a = bm.create_vert(Point3::new(0.0, 0.0, 0.0));
//! let b = bm.create_vert(Point3::new(1.0, 0.0, 0.0));
//! let c = bm.create_vert(Point3::new(0.0, 1.0, 0.0));
//! let f = bm.create_face_from_verts(&[a, b, c]).unwrap();
//!
//! assert_eq!(bm.num_edges(), 3);
//! assert_eq!(bm.face_verts(f).collect::<Vec<_>>(), vec![a, b, c]);
//! assert!(bm.is_valid());
//! ```

mod core;
mod index;
mod iter;
mod select;

pub use self::core::{BMEdge, BMFace, BMLoop, BMVert, BMesh, ElemFlag, ElemType};
pub use index::{EdgeId, ElemRef, FaceId, LoopId, VertId};
pub use iter::{DiskIter, FaceLoopIter, RadialIter};
