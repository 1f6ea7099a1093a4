//! Editable mesh graph data structure.
//!
//! # Structure
//!
//! - Each **vertex** stores one edge of its *disk cycle*, the circular list
//!   of edges using the vertex. Every edge holds a pair of disk links, one
//!   for each end.
//! - Each **edge** stores one loop of its *radial cycle*, the circular list
//!   of face corners running along the edge (one per adjacent face).
//! - Each **face** stores its first loop; loops form a circular *loop
//!   cycle* around the face with `next`/`prev`.
//! - Each **loop** knows its vertex, the edge to the next corner and its
//!   face.
//!
//! Cycles are next/prev handle pairs. Traversals stop when they come back
//! to the handle they started from.
//!
//! Elements live in [`SlotMap`]s keyed by the typed handles; iteration
//! walks slots in ascending order. Every domain has a [`CustomData`] set,
//! and each element records its row in that set ([`BMVert::row`] etc.).
//! Rows of killed elements are reset and handed to the next new element.

use bitflags::bitflags;
use nalgebra::{Point3, Vector3};
use slotmap::{SecondaryMap, SlotMap};

use super::index::{EdgeId, ElemRef, FaceId, LoopId, VertId};
use super::iter::{DiskIter, FaceLoopIter, RadialIter};
use crate::customdata::CustomData;
use crate::error::{MeshError, Result};
use crate::mesh::polygon_normal;

bitflags! {
    /// Header flags shared by every graph element.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ElemFlag: u8 {
        /// Element is selected.
        const SELECT = 1 << 0;
        /// Element is hidden.
        const HIDDEN = 1 << 1;
        /// Edge is a UV seam.
        const SEAM = 1 << 2;
        /// Face is shaded smooth, or edge is not sharp.
        const SMOOTH = 1 << 3;
        /// Scratch flag for tools.
        const TAG = 1 << 4;
        /// Edge is drawn in wireframe display.
        const DRAW = 1 << 5;
    }
}

bitflags! {
    /// A set of element domains.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ElemType: u8 {
        /// Vertices.
        const VERT = 1 << 0;
        /// Edges.
        const EDGE = 1 << 1;
        /// Loops.
        const LOOP = 1 << 2;
        /// Faces.
        const FACE = 1 << 3;
    }
}

/// A vertex in the editable graph.
#[derive(Debug, Clone)]
pub struct BMVert {
    /// Position.
    pub co: Point3<f32>,
    /// Normal.
    pub no: Vector3<f32>,
    /// Header flags.
    pub flag: ElemFlag,
    pub(crate) e: Option<EdgeId>,
    pub(crate) index: usize,
    pub(crate) row: usize,
}

impl BMVert {
    /// One edge of the disk cycle, `None` for a loose vertex.
    #[inline]
    pub fn edge(&self) -> Option<EdgeId> {
        self.e
    }

    /// Index annotation. Only meaningful while vertex indices are clean.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row in [`BMesh::vdata`].
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct DiskLink {
    pub(crate) next: EdgeId,
    pub(crate) prev: EdgeId,
}

/// An edge in the editable graph.
#[derive(Debug, Clone)]
pub struct BMEdge {
    pub(crate) v: [VertId; 2],
    pub(crate) disk: [DiskLink; 2],
    pub(crate) l: Option<LoopId>,
    /// Header flags.
    pub flag: ElemFlag,
    pub(crate) index: usize,
    pub(crate) row: usize,
}

impl BMEdge {
    /// Both end vertices.
    #[inline]
    pub fn verts(&self) -> [VertId; 2] {
        self.v
    }

    /// The end that is not `v`, or `None` if `v` is not on this edge.
    #[inline]
    pub fn other_vert(&self, v: VertId) -> Option<VertId> {
        if self.v[0] == v {
            Some(self.v[1])
        } else if self.v[1] == v {
            Some(self.v[0])
        } else {
            None
        }
    }

    /// One loop of the radial cycle, `None` for a wire edge.
    #[inline]
    pub fn first_loop(&self) -> Option<LoopId> {
        self.l
    }

    /// Index annotation.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row in [`BMesh::edata`].
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }
}

/// A face corner in the editable graph.
#[derive(Debug, Clone)]
pub struct BMLoop {
    pub(crate) v: VertId,
    pub(crate) e: EdgeId,
    pub(crate) f: FaceId,
    pub(crate) next: LoopId,
    pub(crate) prev: LoopId,
    pub(crate) radial_next: LoopId,
    pub(crate) radial_prev: LoopId,
    pub(crate) index: usize,
    pub(crate) row: usize,
}

impl BMLoop {
    /// The corner's vertex.
    #[inline]
    pub fn vert(&self) -> VertId {
        self.v
    }

    /// The edge from this corner to the next one.
    #[inline]
    pub fn edge(&self) -> EdgeId {
        self.e
    }

    /// The owning face.
    #[inline]
    pub fn face(&self) -> FaceId {
        self.f
    }

    /// Next corner around the face.
    #[inline]
    pub fn next(&self) -> LoopId {
        self.next
    }

    /// Previous corner around the face.
    #[inline]
    pub fn prev(&self) -> LoopId {
        self.prev
    }

    /// Next corner along the same edge, in another face.
    #[inline]
    pub fn radial_next(&self) -> LoopId {
        self.radial_next
    }

    /// Previous corner along the same edge.
    #[inline]
    pub fn radial_prev(&self) -> LoopId {
        self.radial_prev
    }

    /// Index annotation.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row in [`BMesh::ldata`].
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }
}

/// A face in the editable graph.
#[derive(Debug, Clone)]
pub struct BMFace {
    pub(crate) l_first: LoopId,
    pub(crate) len: usize,
    /// Normal.
    pub no: Vector3<f32>,
    /// Material slot.
    pub mat_nr: i16,
    /// Header flags.
    pub flag: ElemFlag,
    pub(crate) index: usize,
    pub(crate) row: usize,
}

impl BMFace {
    /// First corner of the loop cycle.
    #[inline]
    pub fn first_loop(&self) -> LoopId {
        self.l_first
    }

    /// Number of corners.
    #[inline]
    pub fn num_loops(&self) -> usize {
        self.len
    }

    /// Index annotation.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// Row in [`BMesh::pdata`].
    #[inline]
    pub fn row(&self) -> usize {
        self.row
    }
}

/// The editable mesh graph.
///
/// Elements live in slot maps addressed by typed handles. All topology
/// edits keep the disk, loop and radial cycles consistent; see
/// [`BMesh::is_valid`].
#[derive(Debug, Clone, Default)]
pub struct BMesh {
    pub(crate) verts: SlotMap<VertId, BMVert>,
    pub(crate) edges: SlotMap<EdgeId, BMEdge>,
    pub(crate) loops: SlotMap<LoopId, BMLoop>,
    pub(crate) faces: SlotMap<FaceId, BMFace>,
    /// Vertex attributes, addressed by [`BMVert::row`].
    pub vdata: CustomData,
    /// Edge attributes, addressed by [`BMEdge::row`].
    pub edata: CustomData,
    /// Loop attributes, addressed by [`BMLoop::row`].
    pub ldata: CustomData,
    /// Face attributes, addressed by [`BMFace::row`].
    pub pdata: CustomData,
    /// Shape key block the vertex positions were taken from.
    pub shapenr: Option<usize>,
    /// Active face.
    pub act_face: Option<FaceId>,
    pub(crate) select_history: Vec<ElemRef>,
    elem_index_dirty: ElemType,
    free_rows: FreeRows,
}

/// Custom-data rows released by killed elements, per domain.
#[derive(Debug, Clone, Default)]
struct FreeRows {
    verts: Vec<usize>,
    edges: Vec<usize>,
    loops: Vec<usize>,
    faces: Vec<usize>,
}

#[cold]
#[track_caller]
fn dead<T: std::fmt::Debug>(id: T) -> ! {
    panic!("{:?} does not exist", id)
}

/// A default custom-data row for a new element.
fn alloc_row(data: &mut CustomData, free: &mut Vec<usize>) -> usize {
    match free.pop() {
        Some(row) => {
            data.reset_element(row);
            row
        }
        None => data.push_default(),
    }
}

impl BMesh {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    // ==================== Accessors ====================

    /// Number of live vertices.
    #[inline]
    pub fn num_verts(&self) -> usize {
        self.verts.len()
    }

    /// Number of live edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of live loops.
    #[inline]
    pub fn num_loops(&self) -> usize {
        self.loops.len()
    }

    /// Number of live faces.
    #[inline]
    pub fn num_faces(&self) -> usize {
        self.faces.len()
    }

    /// Get a vertex.
    ///
    /// # Panics
    /// Panics if the vertex was killed.
    #[inline]
    #[track_caller]
    pub fn vert(&self, v: VertId) -> &BMVert {
        self.verts.get(v).unwrap_or_else(|| dead(v))
    }

    /// Get a mutable vertex.
    #[inline]
    #[track_caller]
    pub fn vert_mut(&mut self, v: VertId) -> &mut BMVert {
        self.verts.get_mut(v).unwrap_or_else(|| dead(v))
    }

    /// Get an edge.
    #[inline]
    #[track_caller]
    pub fn edge(&self, e: EdgeId) -> &BMEdge {
        self.edges.get(e).unwrap_or_else(|| dead(e))
    }

    /// Get a mutable edge.
    #[inline]
    #[track_caller]
    pub fn edge_mut(&mut self, e: EdgeId) -> &mut BMEdge {
        self.edges.get_mut(e).unwrap_or_else(|| dead(e))
    }

    /// Get a loop.
    #[inline]
    #[track_caller]
    pub fn get_loop(&self, l: LoopId) -> &BMLoop {
        self.loops.get(l).unwrap_or_else(|| dead(l))
    }

    #[inline]
    #[track_caller]
    pub(crate) fn get_loop_mut(&mut self, l: LoopId) -> &mut BMLoop {
        self.loops.get_mut(l).unwrap_or_else(|| dead(l))
    }

    /// Get a face.
    #[inline]
    #[track_caller]
    pub fn face(&self, f: FaceId) -> &BMFace {
        self.faces.get(f).unwrap_or_else(|| dead(f))
    }

    /// Get a mutable face.
    #[inline]
    #[track_caller]
    pub fn face_mut(&mut self, f: FaceId) -> &mut BMFace {
        self.faces.get_mut(f).unwrap_or_else(|| dead(f))
    }

    /// Whether the referenced element is alive.
    pub fn contains(&self, elem: ElemRef) -> bool {
        match elem {
            ElemRef::Vert(v) => self.verts.contains_key(v),
            ElemRef::Edge(e) => self.edges.contains_key(e),
            ElemRef::Face(f) => self.faces.contains_key(f),
        }
    }

    /// Header flags of any selectable element.
    #[track_caller]
    pub fn elem_flag(&self, elem: ElemRef) -> ElemFlag {
        match elem {
            ElemRef::Vert(v) => self.vert(v).flag,
            ElemRef::Edge(e) => self.edge(e).flag,
            ElemRef::Face(f) => self.face(f).flag,
        }
    }

    // ==================== Iteration ====================

    /// All live vertex handles in slot order.
    pub fn vert_ids(&self) -> impl Iterator<Item = VertId> + '_ {
        self.verts.keys()
    }

    /// All live vertices with their handles.
    pub fn verts(&self) -> impl Iterator<Item = (VertId, &BMVert)> + '_ {
        self.verts.iter()
    }

    /// All live edge handles in slot order.
    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> + '_ {
        self.edges.keys()
    }

    /// All live edges with their handles.
    pub fn edges(&self) -> impl Iterator<Item = (EdgeId, &BMEdge)> + '_ {
        self.edges.iter()
    }

    /// All live face handles in slot order.
    pub fn face_ids(&self) -> impl Iterator<Item = FaceId> + '_ {
        self.faces.keys()
    }

    /// All live faces with their handles.
    pub fn faces(&self) -> impl Iterator<Item = (FaceId, &BMFace)> + '_ {
        self.faces.iter()
    }

    /// Edges around a vertex (its disk cycle).
    pub fn vert_edges(&self, v: VertId) -> DiskIter<'_> {
        DiskIter::new(self, v)
    }

    /// Corners around a face, starting at its first loop.
    pub fn face_loops(&self, f: FaceId) -> FaceLoopIter<'_> {
        FaceLoopIter::new(self, f)
    }

    /// Corners along an edge (its radial cycle), one per adjacent face.
    pub fn edge_loops(&self, e: EdgeId) -> RadialIter<'_> {
        RadialIter::new(self, e)
    }

    /// Vertices of a face in winding order.
    pub fn face_verts(&self, f: FaceId) -> impl Iterator<Item = VertId> + '_ {
        self.face_loops(f).map(move |l| self.get_loop(l).v)
    }

    /// Edges of a face in winding order.
    pub fn face_edges(&self, f: FaceId) -> impl Iterator<Item = EdgeId> + '_ {
        self.face_loops(f).map(move |l| self.get_loop(l).e)
    }

    /// Faces using an edge.
    pub fn edge_faces(&self, e: EdgeId) -> impl Iterator<Item = FaceId> + '_ {
        self.edge_loops(e).map(move |l| self.get_loop(l).f)
    }

    /// Number of faces using an edge.
    pub fn edge_face_count(&self, e: EdgeId) -> usize {
        self.edge_loops(e).count()
    }

    /// Whether an edge has no faces.
    #[inline]
    pub fn edge_is_wire(&self, e: EdgeId) -> bool {
        self.edge(e).l.is_none()
    }

    /// The edge joining two vertices, if any.
    pub fn edge_between(&self, a: VertId, b: VertId) -> Option<EdgeId> {
        self.vert_edges(a)
            .find(|&e| self.edge(e).other_vert(a) == Some(b))
    }

    // ==================== Geometry ====================

    /// Compute the normal of a face from its vertex positions.
    pub fn face_calc_normal(&self, f: FaceId) -> Vector3<f32> {
        polygon_normal(self.face_verts(f).map(|v| self.vert(v).co))
    }

    /// Recompute every face normal, then every vertex normal as the
    /// normalized sum of its faces' normals.
    pub fn normal_update(&mut self) {
        let face_normals: Vec<(FaceId, Vector3<f32>)> = self
            .face_ids()
            .map(|f| (f, self.face_calc_normal(f)))
            .collect();

        let mut vert_normals: SecondaryMap<VertId, Vector3<f32>> =
            self.verts.keys().map(|v| (v, Vector3::zeros())).collect();
        for &(f, no) in &face_normals {
            self.face_mut(f).no = no;
            for l in self.face_loops(f) {
                vert_normals[self.get_loop(l).v] += no;
            }
        }
        for (v_id, v) in self.verts.iter_mut() {
            v.no = vert_normals[v_id]
                .try_normalize(f32::EPSILON)
                .or_else(|| v.co.coords.try_normalize(f32::EPSILON))
                .unwrap_or_else(Vector3::zeros);
        }
    }

    // ==================== Construction ====================

    /// Create a loose vertex.
    pub fn create_vert(&mut self, co: Point3<f32>) -> VertId {
        let row = alloc_row(&mut self.vdata, &mut self.free_rows.verts);
        self.elem_index_dirty |= ElemType::VERT;
        self.verts.insert(BMVert {
            co,
            no: Vector3::zeros(),
            flag: ElemFlag::empty(),
            e: None,
            index: 0,
            row,
        })
    }

    /// Create an edge between two vertices. Does not check for an existing
    /// edge; see [`BMesh::edge_between`].
    ///
    /// # Panics
    /// Panics if `v1 == v2` or either vertex does not exist.
    pub fn create_edge(&mut self, v1: VertId, v2: VertId) -> EdgeId {
        assert_ne!(v1, v2, "edge endpoints must differ");
        self.vert(v1);
        self.vert(v2);

        let unlinked = DiskLink {
            next: EdgeId::default(),
            prev: EdgeId::default(),
        };
        let row = alloc_row(&mut self.edata, &mut self.free_rows.edges);
        let e = self.edges.insert(BMEdge {
            v: [v1, v2],
            disk: [unlinked; 2],
            l: None,
            flag: ElemFlag::empty(),
            index: 0,
            row,
        });
        self.disk_append(e, v1);
        self.disk_append(e, v2);
        self.elem_index_dirty |= ElemType::EDGE;
        e
    }

    /// Create a face from its corner vertices and the edges joining each
    /// corner to the next.
    ///
    /// # Errors
    /// Fails without modifying the graph if there are fewer than three
    /// corners, the lists differ in length, a vertex repeats, an element
    /// does not exist, or an edge does not join its corner to the next.
    pub fn create_face(&mut self, verts: &[VertId], edges: &[EdgeId]) -> Result<FaceId> {
        let n = verts.len();
        if n < 3 {
            return Err(MeshError::TooFewCorners { len: n });
        }
        if edges.len() != n {
            return Err(MeshError::CornerMismatch {
                verts: n,
                edges: edges.len(),
            });
        }
        self.check_face_verts(verts)?;
        for (i, &e) in edges.iter().enumerate() {
            let Some(edge) = self.edges.get(e) else {
                return Err(MeshError::DeadElement(format!("{:?}", e)));
            };
            let (a, b) = (verts[i], verts[(i + 1) % n]);
            if edge.v != [a, b] && edge.v != [b, a] {
                return Err(MeshError::DisconnectedCorner { corner: i });
            }
        }

        let unlinked = LoopId::default();
        let row = alloc_row(&mut self.pdata, &mut self.free_rows.faces);
        let f = self.faces.insert(BMFace {
            l_first: unlinked,
            len: n,
            no: Vector3::zeros(),
            mat_nr: 0,
            flag: ElemFlag::empty(),
            index: 0,
            row,
        });

        let mut loops = Vec::with_capacity(n);
        for (&v, &e) in verts.iter().zip(edges) {
            let row = alloc_row(&mut self.ldata, &mut self.free_rows.loops);
            loops.push(self.loops.insert(BMLoop {
                v,
                e,
                f,
                next: unlinked,
                prev: unlinked,
                radial_next: unlinked,
                radial_prev: unlinked,
                index: 0,
                row,
            }));
        }

        for (i, &l) in loops.iter().enumerate() {
            let lp = self.get_loop_mut(l);
            lp.next = loops[(i + 1) % n];
            lp.prev = loops[(i + n - 1) % n];
        }
        for (&l, &e) in loops.iter().zip(edges) {
            self.radial_append(e, l);
        }
        self.face_mut(f).l_first = loops[0];
        self.elem_index_dirty |= ElemType::FACE | ElemType::LOOP;
        Ok(f)
    }

    /// Create a face through the given vertices, creating missing edges.
    pub fn create_face_from_verts(&mut self, verts: &[VertId]) -> Result<FaceId> {
        if verts.len() < 3 {
            return Err(MeshError::TooFewCorners { len: verts.len() });
        }
        self.check_face_verts(verts)?;
        let mut edges = Vec::with_capacity(verts.len());
        for i in 0..verts.len() {
            let (a, b) = (verts[i], verts[(i + 1) % verts.len()]);
            let e = match self.edge_between(a, b) {
                Some(e) => e,
                None => self.create_edge(a, b),
            };
            edges.push(e);
        }
        self.create_face(verts, &edges)
    }

    fn check_face_verts(&self, verts: &[VertId]) -> Result<()> {
        for (i, &v) in verts.iter().enumerate() {
            if !self.verts.contains_key(v) {
                return Err(MeshError::DeadElement(format!("{:?}", v)));
            }
            if verts[..i].contains(&v) {
                return Err(MeshError::RepeatedCorner { corner: i });
            }
        }
        Ok(())
    }

    // ==================== Removal ====================

    /// Remove a face and its loops. Edges and vertices stay.
    pub fn kill_face(&mut self, f: FaceId) {
        let loops: Vec<LoopId> = self.face_loops(f).collect();
        for l in loops {
            let e = self.get_loop(l).e;
            self.radial_remove(e, l);
            if let Some(lp) = self.loops.remove(l) {
                self.free_rows.loops.push(lp.row);
            }
        }
        if let Some(face) = self.faces.remove(f) {
            self.free_rows.faces.push(face.row);
        }
        self.forget(ElemRef::Face(f));
        if self.act_face == Some(f) {
            self.act_face = None;
        }
        self.elem_index_dirty |= ElemType::FACE | ElemType::LOOP;
    }

    /// Remove an edge and every face using it.
    pub fn kill_edge(&mut self, e: EdgeId) {
        let faces: Vec<FaceId> = self.edge_faces(e).collect();
        for f in faces {
            self.kill_face(f);
        }
        let [v1, v2] = self.edge(e).v;
        self.disk_remove(e, v1);
        self.disk_remove(e, v2);
        if let Some(edge) = self.edges.remove(e) {
            self.free_rows.edges.push(edge.row);
        }
        self.forget(ElemRef::Edge(e));
        self.elem_index_dirty |= ElemType::EDGE;
    }

    /// Remove a vertex with every edge and face using it.
    pub fn kill_vert(&mut self, v: VertId) {
        let edges: Vec<EdgeId> = self.vert_edges(v).collect();
        for e in edges {
            self.kill_edge(e);
        }
        if let Some(vert) = self.verts.remove(v) {
            self.free_rows.verts.push(vert.row);
        }
        self.forget(ElemRef::Vert(v));
        self.elem_index_dirty |= ElemType::VERT;
    }

    fn forget(&mut self, elem: ElemRef) {
        self.select_history.retain(|&r| r != elem);
    }

    /// Remove every element and layer.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    // ==================== Cycle maintenance ====================

    /// Which of the edge's two disk links belongs to `v`.
    #[inline]
    fn disk_side(&self, e: EdgeId, v: VertId) -> usize {
        let edge = self.edge(e);
        debug_assert!(edge.v.contains(&v), "{:?} is not on {:?}", v, e);
        usize::from(edge.v[0] != v)
    }

    /// Next edge after `e` in the disk cycle of `v`.
    #[inline]
    pub(crate) fn disk_next(&self, e: EdgeId, v: VertId) -> EdgeId {
        self.edge(e).disk[self.disk_side(e, v)].next
    }

    fn disk_append(&mut self, e: EdgeId, v: VertId) {
        let side = self.disk_side(e, v);
        match self.vert(v).e {
            None => {
                self.edge_mut(e).disk[side] = DiskLink { next: e, prev: e };
                self.vert_mut(v).e = Some(e);
            }
            Some(first) => {
                let first_side = self.disk_side(first, v);
                let last = self.edge(first).disk[first_side].prev;
                let last_side = self.disk_side(last, v);
                self.edge_mut(e).disk[side] = DiskLink {
                    next: first,
                    prev: last,
                };
                self.edge_mut(first).disk[first_side].prev = e;
                self.edge_mut(last).disk[last_side].next = e;
            }
        }
    }

    fn disk_remove(&mut self, e: EdgeId, v: VertId) {
        let link = self.edge(e).disk[self.disk_side(e, v)];
        if link.next == e {
            self.vert_mut(v).e = None;
            return;
        }
        let prev_side = self.disk_side(link.prev, v);
        self.edge_mut(link.prev).disk[prev_side].next = link.next;
        let next_side = self.disk_side(link.next, v);
        self.edge_mut(link.next).disk[next_side].prev = link.prev;
        if self.vert(v).e == Some(e) {
            self.vert_mut(v).e = Some(link.next);
        }
    }

    fn radial_append(&mut self, e: EdgeId, l: LoopId) {
        match self.edge(e).l {
            None => {
                let lp = self.get_loop_mut(l);
                lp.radial_next = l;
                lp.radial_prev = l;
                self.edge_mut(e).l = Some(l);
            }
            Some(first) => {
                let after = self.get_loop(first).radial_next;
                let lp = self.get_loop_mut(l);
                lp.radial_prev = first;
                lp.radial_next = after;
                self.get_loop_mut(after).radial_prev = l;
                self.get_loop_mut(first).radial_next = l;
            }
        }
    }

    fn radial_remove(&mut self, e: EdgeId, l: LoopId) {
        let (next, prev) = {
            let lp = self.get_loop(l);
            (lp.radial_next, lp.radial_prev)
        };
        if next == l {
            self.edge_mut(e).l = None;
            return;
        }
        self.get_loop_mut(prev).radial_next = next;
        self.get_loop_mut(next).radial_prev = prev;
        if self.edge(e).l == Some(l) {
            self.edge_mut(e).l = Some(next);
        }
    }

    // ==================== Index annotations ====================

    /// Domains whose index annotations are stale.
    #[inline]
    pub fn elem_index_dirty(&self) -> ElemType {
        self.elem_index_dirty
    }

    /// Mark index annotations of the given domains as stale.
    #[inline]
    pub fn mark_index_dirty(&mut self, types: ElemType) {
        self.elem_index_dirty |= types;
    }

    /// Declare index annotations of the given domains up to date. Used after
    /// assigning them by hand.
    #[inline]
    pub(crate) fn mark_index_clean(&mut self, types: ElemType) {
        self.elem_index_dirty &= !types;
    }

    /// Assign sequential indices, in iteration order, to every dirty domain
    /// in `types`.
    pub fn elem_index_ensure(&mut self, types: ElemType) {
        let todo = types & self.elem_index_dirty;
        if todo.contains(ElemType::VERT) {
            for (i, v) in self.verts.values_mut().enumerate() {
                v.index = i;
            }
        }
        if todo.contains(ElemType::EDGE) {
            for (i, e) in self.edges.values_mut().enumerate() {
                e.index = i;
            }
        }
        if todo.contains(ElemType::FACE) {
            for (i, f) in self.faces.values_mut().enumerate() {
                f.index = i;
            }
        }
        if todo.contains(ElemType::LOOP) {
            // Loops are numbered face by face so each face's loops are
            // contiguous.
            let firsts: Vec<(LoopId, usize)> =
                self.faces.values().map(|f| (f.l_first, f.len)).collect();
            let mut index = 0;
            for (first, len) in firsts {
                let mut l = first;
                for _ in 0..len {
                    let lp = self.get_loop_mut(l);
                    lp.index = index;
                    index += 1;
                    l = lp.next;
                }
            }
        }
        self.elem_index_dirty &= !todo;
    }

    // ==================== Validation ====================

    /// Check that all cycles are consistent and that every element has a
    /// row in its custom-data set.
    pub fn is_valid(&self) -> bool {
        let bound = self.edges.len() + self.loops.len() + 1;

        for (v_id, v) in self.verts.iter() {
            let Some(start) = v.e else { continue };
            if !self.edges.contains_key(start) {
                return false;
            }
            let mut e = start;
            let mut steps = 0;
            loop {
                let Some(edge) = self.edges.get(e) else {
                    return false;
                };
                if !edge.v.contains(&v_id) {
                    return false;
                }
                let link = edge.disk[self.disk_side(e, v_id)];
                let Some(next) = self.edges.get(link.next) else {
                    return false;
                };
                if !next.v.contains(&v_id) || next.disk[self.disk_side(link.next, v_id)].prev != e {
                    return false;
                }
                e = link.next;
                steps += 1;
                if e == start {
                    break;
                }
                if steps > bound {
                    return false;
                }
            }
        }

        for (e_id, edge) in self.edges.iter() {
            if edge.v.iter().any(|&v| !self.verts.contains_key(v)) || edge.v[0] == edge.v[1] {
                return false;
            }
            let Some(start) = edge.l else { continue };
            let mut l = start;
            let mut steps = 0;
            loop {
                let Some(lp) = self.loops.get(l) else {
                    return false;
                };
                if lp.e != e_id {
                    return false;
                }
                match self.loops.get(lp.radial_next) {
                    Some(next) if next.radial_prev == l => {}
                    _ => return false,
                }
                l = lp.radial_next;
                steps += 1;
                if l == start {
                    break;
                }
                if steps > bound {
                    return false;
                }
            }
        }

        let mut face_loops = 0;
        for (f_id, face) in self.faces.iter() {
            let mut l = face.l_first;
            for _ in 0..face.len {
                let Some(lp) = self.loops.get(l) else {
                    return false;
                };
                let Some(next) = self.loops.get(lp.next) else {
                    return false;
                };
                if lp.f != f_id || next.prev != l {
                    return false;
                }
                let Some(edge) = self.edges.get(lp.e) else {
                    return false;
                };
                if edge.other_vert(lp.v) != Some(next.v) {
                    return false;
                }
                l = lp.next;
            }
            if l != face.l_first {
                return false;
            }
            face_loops += face.len;
        }
        if face_loops != self.loops.len() {
            return false;
        }

        self.verts.values().all(|v| v.row < self.vdata.len())
            && self.edges.values().all(|e| e.row < self.edata.len())
            && self.loops.values().all(|l| l.row < self.ldata.len())
            && self.faces.values().all(|f| f.row < self.pdata.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Two quads sharing the edge 1-2.
    fn two_quads() -> (BMesh, Vec<VertId>, [FaceId; 2]) {
        let mut bm = BMesh::new();
        let v: Vec<VertId> = [
            (0.0, 0.0),
            (1.0, 0.0),
            (1.0, 1.0),
            (0.0, 1.0),
            (2.0, 0.0),
            (2.0, 1.0),
        ]
        .iter()
        .map(|&(x, y)| bm.create_vert(Point3::new(x, y, 0.0)))
        .collect();
        let f0 = bm.create_face_from_verts(&[v[0], v[1], v[2], v[3]]).unwrap();
        let f1 = bm.create_face_from_verts(&[v[1], v[4], v[5], v[2]]).unwrap();
        (bm, v, [f0, f1])
    }

    #[test]
    fn test_empty() {
        let bm = BMesh::new();
        assert_eq!(bm.num_verts(), 0);
        assert_eq!(bm.num_faces(), 0);
        assert!(bm.is_valid());
    }

    #[test]
    fn test_two_quads_topology() {
        let (bm, v, [f0, f1]) = two_quads();
        assert_eq!(bm.num_verts(), 6);
        assert_eq!(bm.num_edges(), 7);
        assert_eq!(bm.num_loops(), 8);
        assert_eq!(bm.num_faces(), 2);
        assert!(bm.is_valid());

        let shared = bm.edge_between(v[2], v[1]).unwrap();
        assert_eq!(bm.edge_face_count(shared), 2);
        let faces: Vec<_> = bm.edge_faces(shared).collect();
        assert!(faces.contains(&f0) && faces.contains(&f1));

        assert_eq!(bm.vert_edges(v[1]).count(), 3);
        assert_eq!(bm.vert_edges(v[0]).count(), 2);
        assert_eq!(
            bm.face_verts(f1).collect::<Vec<_>>(),
            vec![v[1], v[4], v[5], v[2]]
        );
    }

    #[test]
    fn test_create_face_rejects_bad_input() {
        let (mut bm, v, _) = two_quads();
        let e01 = bm.edge_between(v[0], v[1]).unwrap();
        let e12 = bm.edge_between(v[1], v[2]).unwrap();

        assert_eq!(
            bm.create_face(&[v[0], v[1]], &[e01, e01]),
            Err(MeshError::TooFewCorners { len: 2 })
        );
        assert_eq!(
            bm.create_face(&[v[0], v[1], v[2]], &[e01, e12]),
            Err(MeshError::CornerMismatch { verts: 3, edges: 2 })
        );
        assert_eq!(
            bm.create_face(&[v[0], v[1], v[2]], &[e01, e12, e12]),
            Err(MeshError::DisconnectedCorner { corner: 2 })
        );
        assert_eq!(
            bm.create_face_from_verts(&[v[0], v[1], v[0]]),
            Err(MeshError::RepeatedCorner { corner: 2 })
        );
        assert_eq!(bm.num_faces(), 2);
        assert!(bm.is_valid());
    }

    #[test]
    fn test_kill_edge_removes_faces() {
        let (mut bm, v, [f0, f1]) = two_quads();
        bm.act_face = Some(f0);
        let shared = bm.edge_between(v[1], v[2]).unwrap();
        bm.kill_edge(shared);

        assert_eq!(bm.num_faces(), 0);
        assert_eq!(bm.num_loops(), 0);
        assert_eq!(bm.num_edges(), 6);
        assert!(!bm.contains(f1.into()));
        assert_eq!(bm.act_face, None);
        assert!(bm.edge_between(v[1], v[2]).is_none());
        assert!(bm.is_valid());
    }

    #[test]
    fn test_kill_vert_then_create() {
        let (mut bm, v, _) = two_quads();
        bm.kill_vert(v[4]);
        assert_eq!(bm.num_verts(), 5);
        assert_eq!(bm.num_faces(), 1);
        assert_eq!(bm.num_edges(), 5);
        assert!(bm.is_valid());

        let fresh = bm.create_vert(Point3::new(9.0, 9.0, 9.0));
        assert_ne!(fresh, v[4]);
        assert!(!bm.contains(v[4].into()));
        assert!(bm.contains(fresh.into()));
        assert!(bm.vert(fresh).edge().is_none());
        assert!(bm.is_valid());
    }

    #[test]
    #[should_panic(expected = "does not exist")]
    fn test_killed_handle_does_not_resolve() {
        let mut bm = BMesh::new();
        let a = bm.create_vert(Point3::origin());
        bm.kill_vert(a);
        bm.create_vert(Point3::new(9.0, 9.0, 9.0));
        bm.vert(a);
    }

    #[test]
    fn test_index_ensure() {
        let (mut bm, v, [_, f1]) = two_quads();
        assert!(bm.elem_index_dirty().contains(ElemType::VERT | ElemType::FACE));
        bm.kill_vert(v[0]);
        bm.elem_index_ensure(ElemType::all());
        assert!(bm.elem_index_dirty().is_empty());

        assert_eq!(bm.vert(v[1]).index(), 0);
        assert_eq!(bm.face(f1).index(), 0);
        let indices: Vec<_> = bm.face_loops(f1).map(|l| bm.get_loop(l).index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_normal_update() {
        let (mut bm, v, [f0, _]) = two_quads();
        bm.normal_update();
        assert_relative_eq!(bm.face(f0).no, Vector3::z(), epsilon = 1e-6);
        assert_relative_eq!(bm.vert(v[1]).no, Vector3::z(), epsilon = 1e-6);
    }

    #[test]
    fn test_custom_data_rows_are_reused() {
        use crate::customdata::LayerType;

        let (mut bm, v, _) = two_quads();
        let layer = bm.vdata.add_layer(LayerType::PropFloat);
        let row = bm.vert(v[3]).row();
        bm.vdata.set::<f32>(layer, row, 7.0);
        bm.kill_vert(v[3]);
        let fresh = bm.create_vert(Point3::origin());
        assert_eq!(bm.vert(fresh).row(), row);
        assert_eq!(bm.vdata.get::<f32>(layer, row), Some(0.0));
        assert_eq!(bm.vdata.len(), 6);
    }
}
