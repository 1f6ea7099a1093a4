//! Selection state and selection history.
//!
//! Selection is flushed downwards: selecting a face selects its edges and
//! vertices, selecting an edge selects its vertices. Deselecting clears
//! lower-dimensional elements only when no other selected element still
//! uses them. Hidden elements cannot be selected.
//!
//! The selection history records the order elements were picked in. It
//! may only reference live, selected elements; killing an element removes
//! it from the history and [`BMesh::select_history_validate`] drops entries
//! that are no longer selected.

use super::core::{BMesh, ElemFlag};
use super::index::{EdgeId, ElemRef, FaceId, VertId};

impl BMesh {
    /// Select or deselect a vertex.
    pub fn vert_select_set(&mut self, v: VertId, select: bool) {
        let vert = self.vert_mut(v);
        if select {
            if !vert.flag.contains(ElemFlag::HIDDEN) {
                vert.flag.insert(ElemFlag::SELECT);
            }
        } else {
            vert.flag.remove(ElemFlag::SELECT);
        }
    }

    /// Select or deselect an edge together with its vertices.
    pub fn edge_select_set(&mut self, e: EdgeId, select: bool) {
        let [v1, v2] = self.edge(e).verts();
        if select {
            if self.edge(e).flag.contains(ElemFlag::HIDDEN) {
                return;
            }
            self.edge_mut(e).flag.insert(ElemFlag::SELECT);
            self.vert_select_set(v1, true);
            self.vert_select_set(v2, true);
        } else {
            self.edge_mut(e).flag.remove(ElemFlag::SELECT);
            for v in [v1, v2] {
                if !self.vert_has_selected_edge(v) {
                    self.vert_select_set(v, false);
                }
            }
        }
    }

    /// Select or deselect a face together with its edges and vertices.
    pub fn face_select_set(&mut self, f: FaceId, select: bool) {
        if select {
            if self.face(f).flag.contains(ElemFlag::HIDDEN) {
                return;
            }
            self.face_mut(f).flag.insert(ElemFlag::SELECT);
            let loops: Vec<_> = self.face_loops(f).collect();
            for l in loops {
                let (v, e) = {
                    let lp = self.get_loop(l);
                    (lp.vert(), lp.edge())
                };
                self.vert_select_set(v, true);
                if !self.edge(e).flag.contains(ElemFlag::HIDDEN) {
                    self.edge_mut(e).flag.insert(ElemFlag::SELECT);
                }
            }
        } else {
            self.face_mut(f).flag.remove(ElemFlag::SELECT);
            let edges: Vec<EdgeId> = self.face_edges(f).collect();
            for &e in &edges {
                let still_used = self
                    .edge_faces(e)
                    .any(|other| other != f && self.face(other).flag.contains(ElemFlag::SELECT));
                if !still_used {
                    self.edge_mut(e).flag.remove(ElemFlag::SELECT);
                }
            }
            let verts: Vec<VertId> = self.face_verts(f).collect();
            for v in verts {
                if !self.vert_has_selected_edge(v) {
                    self.vert_select_set(v, false);
                }
            }
        }
    }

    /// Select or deselect any element.
    pub fn select_set(&mut self, elem: ElemRef, select: bool) {
        match elem {
            ElemRef::Vert(v) => self.vert_select_set(v, select),
            ElemRef::Edge(e) => self.edge_select_set(e, select),
            ElemRef::Face(f) => self.face_select_set(f, select),
        }
    }

    /// Whether an element is selected.
    pub fn is_selected(&self, elem: ElemRef) -> bool {
        self.elem_flag(elem).contains(ElemFlag::SELECT)
    }

    fn vert_has_selected_edge(&self, v: VertId) -> bool {
        self.vert_edges(v)
            .any(|e| self.edge(e).flag.contains(ElemFlag::SELECT))
    }

    // ==================== History ====================

    /// The selection history, oldest first.
    #[inline]
    pub fn select_history(&self) -> &[ElemRef] {
        &self.select_history
    }

    /// Append an element to the history unless it is already recorded.
    pub fn select_history_store(&mut self, elem: ElemRef) {
        if !self.select_history.contains(&elem) {
            self.select_history_store_notest(elem);
        }
    }

    /// Append an element without checking for duplicates.
    pub fn select_history_store_notest(&mut self, elem: ElemRef) {
        debug_assert!(self.contains(elem), "{:?} does not exist", elem);
        self.select_history.push(elem);
    }

    /// Remove an element from the history. Returns whether it was present.
    pub fn select_history_remove(&mut self, elem: ElemRef) -> bool {
        let before = self.select_history.len();
        self.select_history.retain(|&r| r != elem);
        self.select_history.len() != before
    }

    /// Forget the whole history.
    pub fn select_history_clear(&mut self) {
        self.select_history.clear();
    }

    /// Drop entries that reference dead or unselected elements.
    pub fn select_history_validate(&mut self) {
        let history = std::mem::take(&mut self.select_history);
        self.select_history = history
            .into_iter()
            .filter(|&r| self.contains(r) && self.is_selected(r))
            .collect();
    }
}
