//! Flag mapping between persistent records and graph elements.

use nalgebra::Vector3;
use slotmap::SecondaryMap;

use crate::bmesh::{BMesh, EdgeId, ElemFlag, FaceId};
use crate::customdata::LayerType;
use crate::mesh::{CdFlag, EdgeFlag, Mesh, PolyFlag, VertFlag};

/// Two faces whose normals have a dot product above this are treated as
/// coplanar, and the edge between them is not drawn in wireframe display.
///
/// Visual policy only; nothing depends on the exact value.
pub const EDGE_DRAW_DOT_THRESHOLD: f32 = 0.9995;

/// Graph flags for a persistent vertex flag word.
#[inline]
pub fn vert_flag_from_mflag(flag: VertFlag) -> ElemFlag {
    let mut out = ElemFlag::empty();
    out.set(ElemFlag::SELECT, flag.contains(VertFlag::SELECT));
    out.set(ElemFlag::HIDDEN, flag.contains(VertFlag::HIDE));
    out
}

/// Graph flags for a persistent edge flag word.
///
/// `SHARP` is stored inverted, as the graph's `SMOOTH`.
#[inline]
pub fn edge_flag_from_mflag(flag: EdgeFlag) -> ElemFlag {
    let mut out = ElemFlag::empty();
    out.set(ElemFlag::SELECT, flag.contains(EdgeFlag::SELECT));
    out.set(ElemFlag::SEAM, flag.contains(EdgeFlag::SEAM));
    out.set(ElemFlag::DRAW, flag.contains(EdgeFlag::EDGEDRAW));
    out.set(ElemFlag::SMOOTH, !flag.contains(EdgeFlag::SHARP));
    out.set(ElemFlag::HIDDEN, flag.contains(EdgeFlag::HIDE));
    out
}

/// Graph flags for a persistent polygon flag word.
#[inline]
pub fn face_flag_from_mflag(flag: PolyFlag) -> ElemFlag {
    let mut out = ElemFlag::empty();
    out.set(ElemFlag::SELECT, flag.contains(PolyFlag::FACE_SEL));
    out.set(ElemFlag::SMOOTH, flag.contains(PolyFlag::SMOOTH));
    out.set(ElemFlag::HIDDEN, flag.contains(PolyFlag::HIDE));
    out
}

/// Persistent vertex flags for graph flags.
#[inline]
pub fn vert_flag_to_mflag(flag: ElemFlag) -> VertFlag {
    let mut out = VertFlag::empty();
    out.set(VertFlag::SELECT, flag.contains(ElemFlag::SELECT));
    out.set(VertFlag::HIDE, flag.contains(ElemFlag::HIDDEN));
    out
}

/// Persistent edge flags for graph flags.
///
/// `EDGERENDER` is always set. `LOOSEEDGE` depends on topology, so the
/// caller passes whether the edge has no faces.
#[inline]
pub fn edge_flag_to_mflag(flag: ElemFlag, is_wire: bool) -> EdgeFlag {
    let mut out = EdgeFlag::EDGERENDER;
    out.set(EdgeFlag::SELECT, flag.contains(ElemFlag::SELECT));
    out.set(EdgeFlag::SEAM, flag.contains(ElemFlag::SEAM));
    out.set(EdgeFlag::EDGEDRAW, flag.contains(ElemFlag::DRAW));
    out.set(EdgeFlag::SHARP, !flag.contains(ElemFlag::SMOOTH));
    out.set(EdgeFlag::HIDE, flag.contains(ElemFlag::HIDDEN));
    out.set(EdgeFlag::LOOSEEDGE, is_wire);
    out
}

/// Persistent polygon flags for graph flags.
#[inline]
pub fn face_flag_to_mflag(flag: ElemFlag) -> PolyFlag {
    let mut out = PolyFlag::empty();
    out.set(PolyFlag::FACE_SEL, flag.contains(ElemFlag::SELECT));
    out.set(PolyFlag::SMOOTH, flag.contains(ElemFlag::SMOOTH));
    out.set(PolyFlag::HIDE, flag.contains(ElemFlag::HIDDEN));
    out
}

/// Whether an edge should be drawn in wireframe display.
///
/// Edges between exactly two nearly coplanar faces are not drawn. Every
/// other edge is.
pub(crate) fn edge_draw_hint(
    bm: &BMesh,
    e: EdgeId,
    face_normals: &SecondaryMap<FaceId, Vector3<f32>>,
) -> bool {
    let mut faces = bm.edge_faces(e);
    let (Some(a), Some(b), None) = (faces.next(), faces.next(), faces.next()) else {
        return true;
    };
    face_normals[a].dot(&face_normals[b]) <= EDGE_DRAW_DOT_THRESHOLD
}

/// Face normals of the graph.
pub(crate) fn face_normal_table(bm: &BMesh) -> SecondaryMap<FaceId, Vector3<f32>> {
    bm.face_ids().map(|f| (f, bm.face_calc_normal(f))).collect()
}

// ==================== Weight layers ====================

const WEIGHT_LAYERS: [(CdFlag, bool, LayerType); 4] = [
    (CdFlag::VERT_BWEIGHT, true, LayerType::BevelWeight),
    (CdFlag::VERT_CREASE, true, LayerType::Crease),
    (CdFlag::EDGE_BWEIGHT, false, LayerType::BevelWeight),
    (CdFlag::EDGE_CREASE, false, LayerType::Crease),
];

/// The weight layers the graph currently carries.
pub fn cd_flag_from_bmesh(bm: &BMesh) -> CdFlag {
    let mut flags = CdFlag::empty();
    for (flag, is_vert, ty) in WEIGHT_LAYERS {
        let data = if is_vert { &bm.vdata } else { &bm.edata };
        flags.set(flag, data.has_layer(ty));
    }
    flags
}

/// Make the graph's weight layers match `flags` exactly, adding missing
/// layers and removing surplus ones.
pub fn cd_flag_apply(bm: &mut BMesh, flags: CdFlag) {
    for (flag, is_vert, ty) in WEIGHT_LAYERS {
        let data = if is_vert { &mut bm.vdata } else { &mut bm.edata };
        if flags.contains(flag) {
            if !data.has_layer(ty) {
                data.add_layer(ty);
            }
        } else {
            while data.remove_layer_type(ty) {}
        }
    }
}

/// Add the weight layers named by `flags` to the graph, keeping the ones
/// it already has, and record the result on `mesh`.
pub fn cd_flag_ensure(bm: &mut BMesh, mesh: Option<&mut Mesh>, flags: CdFlag) {
    let all = cd_flag_from_bmesh(bm) | flags;
    cd_flag_apply(bm, all);
    if let Some(mesh) = mesh {
        mesh.cd_flag = all;
    }
}
