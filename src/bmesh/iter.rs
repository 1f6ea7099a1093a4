//! Cycle iterators.
//!
//! Each iterator walks one circular list and stops when it gets back to the
//! handle it started from. The graph must not be modified while iterating;
//! collect the handles first when killing elements.

use super::core::BMesh;
use super::index::{EdgeId, FaceId, LoopId, VertId};

/// Iterator over the edges around a vertex.
pub struct DiskIter<'a> {
    bm: &'a BMesh,
    v: VertId,
    start: EdgeId,
    current: EdgeId,
    done: bool,
}

impl<'a> DiskIter<'a> {
    pub(crate) fn new(bm: &'a BMesh, v: VertId) -> Self {
        let start = bm.vert(v).edge();
        Self {
            bm,
            v,
            start: start.unwrap_or(EdgeId::default()),
            current: start.unwrap_or(EdgeId::default()),
            done: start.is_none(),
        }
    }
}

impl<'a> Iterator for DiskIter<'a> {
    type Item = EdgeId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.bm.disk_next(self.current, self.v);

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over the loops around a face.
pub struct FaceLoopIter<'a> {
    bm: &'a BMesh,
    start: LoopId,
    current: LoopId,
    done: bool,
}

impl<'a> FaceLoopIter<'a> {
    pub(crate) fn new(bm: &'a BMesh, f: FaceId) -> Self {
        let start = bm.face(f).first_loop();
        Self {
            bm,
            start,
            current: start,
            done: false,
        }
    }
}

impl<'a> Iterator for FaceLoopIter<'a> {
    type Item = LoopId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.bm.get_loop(self.current).next();

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}

/// Iterator over the loops along an edge, one per face using the edge.
pub struct RadialIter<'a> {
    bm: &'a BMesh,
    start: LoopId,
    current: LoopId,
    done: bool,
}

impl<'a> RadialIter<'a> {
    pub(crate) fn new(bm: &'a BMesh, e: EdgeId) -> Self {
        let start = bm.edge(e).first_loop();
        Self {
            bm,
            start: start.unwrap_or(LoopId::default()),
            current: start.unwrap_or(LoopId::default()),
            done: start.is_none(),
        }
    }
}

impl<'a> Iterator for RadialIter<'a> {
    type Item = LoopId;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let result = self.current;
        self.current = self.bm.get_loop(self.current).radial_next();

        if self.current == self.start {
            self.done = true;
        }

        Some(result)
    }
}
