//! Persistent mesh records.

use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use nalgebra::Point3;

use super::key::Key;
use super::runtime::MeshRuntime;
use crate::customdata::CustomData;

bitflags! {
    /// Flags stored in each persistent vertex.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VertFlag: u8 {
        /// Vertex is selected.
        const SELECT = 1 << 0;
        /// Vertex is hidden.
        const HIDE = 1 << 4;
    }
}

bitflags! {
    /// Flags stored in each persistent edge.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EdgeFlag: u16 {
        /// Edge is selected.
        const SELECT = 1 << 0;
        /// Edge should be drawn in wireframe display.
        const EDGEDRAW = 1 << 1;
        /// Edge is a UV seam.
        const SEAM = 1 << 2;
        /// Edge is hidden.
        const HIDE = 1 << 4;
        /// Edge is rendered.
        const EDGERENDER = 1 << 5;
        /// Edge is not used by any face.
        const LOOSEEDGE = 1 << 7;
        /// Edge is sharp for normal splitting.
        const SHARP = 1 << 9;
    }
}

bitflags! {
    /// Flags stored in each persistent polygon.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PolyFlag: u8 {
        /// Face is shaded smooth.
        const SMOOTH = 1 << 0;
        /// Face is selected.
        const FACE_SEL = 1 << 1;
        /// Face is hidden.
        const HIDE = 1 << 4;
    }
}

bitflags! {
    /// Which optional weight layers a mesh uses.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct CdFlag: u8 {
        /// Vertex bevel weights.
        const VERT_BWEIGHT = 1 << 0;
        /// Edge bevel weights.
        const EDGE_BWEIGHT = 1 << 1;
        /// Edge creases.
        const EDGE_CREASE = 1 << 2;
        /// Vertex creases.
        const VERT_CREASE = 1 << 3;
    }
}

/// A persistent vertex.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MeshVert {
    /// Position.
    pub co: Point3<f32>,
    /// Selection and visibility flags.
    pub flag: VertFlag,
    /// Bevel weight quantized to 0..=255.
    pub bweight: u8,
}

impl MeshVert {
    /// A vertex at the given position with no flags.
    pub fn new(co: Point3<f32>) -> Self {
        Self {
            co,
            flag: VertFlag::empty(),
            bweight: 0,
        }
    }
}

/// A persistent edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshEdge {
    /// First vertex index.
    pub v1: usize,
    /// Second vertex index.
    pub v2: usize,
    /// Edge flags.
    pub flag: EdgeFlag,
    /// Crease quantized to 0..=255.
    pub crease: u8,
    /// Bevel weight quantized to 0..=255.
    pub bweight: u8,
}

impl MeshEdge {
    /// An edge between two vertices, drawn and rendered.
    pub fn new(v1: usize, v2: usize) -> Self {
        Self {
            v1,
            v2,
            flag: EdgeFlag::EDGEDRAW | EdgeFlag::EDGERENDER,
            crease: 0,
            bweight: 0,
        }
    }
}

/// A persistent polygon, referencing a contiguous range of corners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshPoly {
    /// First corner index.
    pub loopstart: usize,
    /// Number of corners.
    pub totloop: usize,
    /// Material slot.
    pub mat_nr: i16,
    /// Face flags.
    pub flag: PolyFlag,
}

impl MeshPoly {
    /// Range of corner indices used by this polygon, `None` if the end
    /// overflows.
    #[inline]
    pub fn loop_range(&self) -> Option<std::ops::Range<usize>> {
        let end = self.loopstart.checked_add(self.totloop)?;
        Some(self.loopstart..end)
    }
}

/// A persistent face corner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeshLoop {
    /// Vertex index.
    pub v: usize,
    /// Index of the edge from this corner's vertex to the next corner's.
    pub e: usize,
}

/// Element kind of a selection history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectType {
    /// A vertex.
    Vert,
    /// An edge.
    Edge,
    /// A face.
    Face,
}

/// One entry of the persistent selection history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MeshSelect {
    /// Element kind.
    pub ty: SelectType,
    /// Element index in its array.
    pub index: usize,
}

/// Identity of a mesh data-block, used by objects to reference it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshId(u32);

impl MeshId {
    fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        MeshId(NEXT.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw identifier.
    #[inline]
    pub fn raw(self) -> u32 {
        self.0
    }
}

/// The persistent, array-based mesh.
///
/// Vertex, edge, polygon and corner records are stored in flat arrays, with
/// one [`CustomData`] set per domain whose element count always matches the
/// corresponding array.
#[derive(Debug, Clone)]
pub struct Mesh {
    id: MeshId,
    /// Data-block name.
    pub name: String,
    /// Vertices.
    pub verts: Vec<MeshVert>,
    /// Edges.
    pub edges: Vec<MeshEdge>,
    /// Polygons.
    pub polys: Vec<MeshPoly>,
    /// Face corners.
    pub loops: Vec<MeshLoop>,
    /// Vertex attributes.
    pub vdata: CustomData,
    /// Edge attributes.
    pub edata: CustomData,
    /// Polygon attributes.
    pub pdata: CustomData,
    /// Corner attributes.
    pub ldata: CustomData,
    /// Optional weight layers in use.
    pub cd_flag: CdFlag,
    /// Shape keys.
    pub key: Option<Key>,
    /// Active polygon.
    pub act_face: Option<usize>,
    /// Selection history, oldest first.
    pub mselect: Vec<MeshSelect>,
    /// `false` for evaluated copies (e.g. modifier results), whose shape keys
    /// are already applied and must not be read again.
    pub is_original: bool,
    /// Derived caches.
    pub runtime: MeshRuntime,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new("Mesh")
    }
}

impl Mesh {
    /// Create an empty mesh.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: MeshId::next(),
            name: name.into(),
            verts: Vec::new(),
            edges: Vec::new(),
            polys: Vec::new(),
            loops: Vec::new(),
            vdata: CustomData::new(),
            edata: CustomData::new(),
            pdata: CustomData::new(),
            ldata: CustomData::new(),
            cd_flag: CdFlag::empty(),
            key: None,
            act_face: None,
            mselect: Vec::new(),
            is_original: true,
            runtime: MeshRuntime::default(),
        }
    }

    /// The data-block identity.
    #[inline]
    pub fn id(&self) -> MeshId {
        self.id
    }

    // ==================== Accessors ====================

    /// Number of vertices.
    #[inline]
    pub fn num_verts(&self) -> usize {
        self.verts.len()
    }

    /// Number of edges.
    #[inline]
    pub fn num_edges(&self) -> usize {
        self.edges.len()
    }

    /// Number of polygons.
    #[inline]
    pub fn num_polys(&self) -> usize {
        self.polys.len()
    }

    /// Number of face corners.
    #[inline]
    pub fn num_loops(&self) -> usize {
        self.loops.len()
    }

    /// The corners of a polygon.
    ///
    /// # Panics
    /// Panics if the polygon's corner range is out of bounds.
    #[inline]
    pub fn poly_loops(&self, poly: usize) -> &[MeshLoop] {
        match self.polys[poly].loop_range() {
            Some(range) => &self.loops[range],
            None => panic!("polygon {poly} has an overflowing corner range"),
        }
    }

    /// Vertex indices of a polygon in winding order.
    pub fn poly_verts(&self, poly: usize) -> impl Iterator<Item = usize> + '_ {
        self.poly_loops(poly).iter().map(|l| l.v)
    }

    /// Vertex positions as a vector.
    pub fn positions(&self) -> Vec<Point3<f32>> {
        self.verts.iter().map(|v| v.co).collect()
    }

    /// Find the edge joining two vertices (in either direction).
    pub fn find_edge(&self, v1: usize, v2: usize) -> Option<usize> {
        self.edges
            .iter()
            .position(|e| (e.v1 == v1 && e.v2 == v2) || (e.v1 == v2 && e.v2 == v1))
    }

    // ==================== Construction ====================

    /// Append a vertex and return its index.
    pub fn add_vert(&mut self, co: Point3<f32>) -> usize {
        self.verts.push(MeshVert::new(co));
        self.vdata.push_default()
    }

    /// Append an edge and return its index.
    pub fn add_edge(&mut self, v1: usize, v2: usize) -> usize {
        self.edges.push(MeshEdge::new(v1, v2));
        self.edata.push_default()
    }

    /// Append a polygon through the given vertices, reusing existing edges
    /// where possible. Returns the polygon index.
    ///
    /// Edge lookup is a linear scan; use the builders for large meshes.
    pub fn add_poly(&mut self, verts: &[usize]) -> usize {
        let loopstart = self.loops.len();
        for (i, &v) in verts.iter().enumerate() {
            let next = verts[(i + 1) % verts.len()];
            let e = match self.find_edge(v, next) {
                Some(e) => e,
                None => self.add_edge(v, next),
            };
            self.loops.push(MeshLoop { v, e });
            self.ldata.push_default();
        }
        self.polys.push(MeshPoly {
            loopstart,
            totloop: verts.len(),
            ..Default::default()
        });
        self.pdata.push_default()
    }

    /// Add a shape key initialized from the current vertex positions,
    /// creating a relative [`Key`] first if the mesh has none.
    ///
    /// Returns the index of the new key block.
    pub fn add_shape_key(&mut self, name: &str) -> usize {
        let positions = self.positions();
        let key = self.key.get_or_insert_with(Key::relative);
        let index = key.add_block(name);
        key.blocks_mut()[index].data = positions;
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mesh_ids_are_unique() {
        let a = Mesh::new("a");
        let b = Mesh::new("b");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.clone().id(), a.id());
    }

    #[test]
    fn test_add_poly_shares_edges() {
        let mut mesh = Mesh::new("quads");
        for (x, y) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (2.0, 0.0), (2.0, 1.0)] {
            mesh.add_vert(Point3::new(x, y, 0.0));
        }
        mesh.add_poly(&[0, 1, 2, 3]);
        mesh.add_poly(&[1, 4, 5, 2]);

        assert_eq!(mesh.num_polys(), 2);
        assert_eq!(mesh.num_loops(), 8);
        assert_eq!(mesh.num_edges(), 7);
        assert_eq!(mesh.vdata.len(), 6);
        assert_eq!(mesh.edata.len(), 7);
        assert_eq!(mesh.ldata.len(), 8);
        assert_eq!(mesh.poly_verts(1).collect::<Vec<_>>(), vec![1, 4, 5, 2]);
    }

    #[test]
    fn test_add_shape_key_creates_basis() {
        let mut mesh = Mesh::new("keyed");
        mesh.add_vert(Point3::new(1.0, 2.0, 3.0));
        let basis = mesh.add_shape_key("Basis");
        let k1 = mesh.add_shape_key("Key 1");

        let key = mesh.key.as_ref().unwrap();
        assert_eq!(basis, 0);
        assert_eq!(k1, 1);
        assert_eq!(key.refkey(), Some(0));
        assert_eq!(key.blocks()[1].relative, 0);
        assert_eq!(key.blocks()[1].data, vec![Point3::new(1.0, 2.0, 3.0)]);
    }
}
