//! Persistent mesh → editable graph.

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use super::flags::{
    cd_flag_apply, cd_flag_from_bmesh, edge_flag_from_mflag, face_flag_from_mflag,
    vert_flag_from_mflag,
};
use super::shape::key_index;
use super::{uchar_to_unit_float, MeshFromParams, MeshFromReport};
use crate::bmesh::{BMesh, EdgeId, ElemRef, ElemType, FaceId, LoopId, VertId};
use crate::customdata::{
    CustomData, CustomDataMeshMasks, LayerCopyPolicy, LayerHandle, LayerMap, LayerType,
};
use crate::mesh::{CdFlag, EdgeFlag, Mesh, PolyFlag, SelectType, VertFlag};

/// Add the contents of `me` to `bm`.
///
/// When `bm` is empty (no elements, no layers) it receives the mesh's
/// layout, a shape-key layer per key block and, if requested, the
/// original-index layer. Otherwise the mesh's layers are merged into the
/// existing ones and its elements are appended.
///
/// Graph vertex, edge and face `i` is built from persistent element `i`,
/// and that is also the index annotation it receives. Polygons with an
/// invalid corner range or degenerate corners are skipped with a warning.
///
/// # Panics
///
/// If a corner or edge references a vertex or edge index outside the
/// mesh's arrays. [`Mesh::validate`] catches this beforehand.
pub fn bm_from_mesh(bm: &mut BMesh, me: &Mesh, params: &MeshFromParams) -> MeshFromReport {
    let mut report = MeshFromReport::default();

    let is_new = bm.num_verts() == 0
        && bm.vdata.num_layers() == 0
        && bm.edata.num_layers() == 0
        && bm.pdata.num_layers() == 0
        && bm.ldata.num_layers() == 0;

    let mask = CustomDataMeshMasks::MESH.union(&params.cd_mask_extra);
    let policy = if is_new {
        LayerCopyPolicy::AllocateEmpty
    } else {
        LayerCopyPolicy::MergePreserving
    };

    if me.verts.is_empty() {
        if is_new {
            copy_layouts(bm, me, &mask, policy);
        }
        return report;
    }

    let vert_normals: Option<Vec<Vector3<f32>>> = params.calc_vert_normal.then(|| {
        me.runtime
            .vert_normals()
            .map(<[_]>::to_vec)
            .unwrap_or_else(|| me.calc_vertex_normals())
    });

    copy_layouts(bm, me, &mask, policy);

    // Keys of evaluated meshes are already applied to the positions.
    let key = me.key.as_ref().filter(|_| me.is_original);
    let mut tot_shape_keys = key.map_or(0, |k| k.len());
    if !is_new {
        tot_shape_keys = tot_shape_keys.min(bm.vdata.number_of_layers(LayerType::ShapeKey));
    }

    let actkey = match (key, params.active_shapekey) {
        (Some(key), Some(active)) if active < tot_shape_keys => Some((active, &key.blocks()[active])),
        _ => None,
    };

    let add_keyindex = is_new && (tot_shape_keys > 0 || params.add_key_index);
    if add_keyindex {
        bm.vdata.add_layer(LayerType::ShapeKeyIndex);
    }

    let mut keyco: Option<&[Point3<f32>]> = None;
    if let Some((active, block)) = actkey {
        if block.totelem() == me.verts.len() {
            if params.use_shapekey {
                keyco = Some(&block.data);
            }
            if is_new {
                bm.shapenr = Some(active);
            }
        }
    }

    if is_new {
        if let Some(key) = key {
            for block in &key.blocks()[..tot_shape_keys] {
                let h = bm.vdata.add_layer_named(LayerType::ShapeKey, &block.name);
                bm.vdata.set_layer_uid(h, block.uid());
            }
        }
    }

    let cd_flag = me.cd_flag | cd_flag_from_bmesh(bm);
    cd_flag_apply(bm, cd_flag);

    // Layer handles shift while layers are added, so look them up last.
    let vert_bweight = me
        .cd_flag
        .contains(CdFlag::VERT_BWEIGHT)
        .then(|| bm.vdata.layer_index(LayerType::BevelWeight))
        .flatten();
    let edge_bweight = me
        .cd_flag
        .contains(CdFlag::EDGE_BWEIGHT)
        .then(|| bm.edata.layer_index(LayerType::BevelWeight))
        .flatten();
    let edge_crease = me
        .cd_flag
        .contains(CdFlag::EDGE_CREASE)
        .then(|| bm.edata.layer_index(LayerType::Crease))
        .flatten();
    let keyindex = if add_keyindex {
        bm.vdata.layer_index(LayerType::ShapeKeyIndex)
    } else {
        None
    };
    let shape_layers: Vec<LayerHandle> = bm
        .vdata
        .handles_of(LayerType::ShapeKey)
        .take(tot_shape_keys)
        .collect();
    let shape_tables: Vec<&[Point3<f32>]> = key
        .map(|k| k.blocks()[..tot_shape_keys].iter().map(|b| &b.data[..]).collect())
        .unwrap_or_default();

    let vmap = LayerMap::new(&me.vdata, &bm.vdata);
    let emap = LayerMap::new(&me.edata, &bm.edata);
    let pmap = LayerMap::new(&me.pdata, &bm.pdata);
    let lmap = LayerMap::new(&me.ldata, &bm.ldata);

    // ==================== Vertices ====================

    let mut vtable: Vec<VertId> = Vec::with_capacity(me.verts.len());
    for (i, mv) in me.verts.iter().enumerate() {
        let co = keyco.map_or(mv.co, |keyco| keyco[i]);
        let v = bm.create_vert(co);
        vtable.push(v);

        {
            let bv = bm.vert_mut(v);
            bv.index = i;
            bv.flag = vert_flag_from_mflag(mv.flag - VertFlag::SELECT);
            if let Some(normals) = &vert_normals {
                bv.no = normals[i];
            }
        }
        if mv.flag.contains(VertFlag::SELECT) {
            bm.vert_select_set(v, true);
        }

        let row = bm.vert(v).row();
        vmap.copy_element(&me.vdata, i, &mut bm.vdata, row);

        if let Some(h) = vert_bweight {
            bm.vdata.set(h, row, uchar_to_unit_float(mv.bweight));
        }
        if let Some(h) = keyindex {
            bm.vdata.set(h, row, key_index(i));
        }
        for (&h, table) in shape_layers.iter().zip(&shape_tables) {
            let co = table.get(i).copied().unwrap_or(mv.co);
            bm.vdata.set(h, row, [co.x, co.y, co.z]);
        }
    }

    // ==================== Edges ====================

    let mut etable: Vec<EdgeId> = Vec::with_capacity(me.edges.len());
    for (i, me_e) in me.edges.iter().enumerate() {
        let e = bm.create_edge(vtable[me_e.v1], vtable[me_e.v2]);
        etable.push(e);

        {
            let be = bm.edge_mut(e);
            be.index = i;
            be.flag = edge_flag_from_mflag(me_e.flag - EdgeFlag::SELECT);
        }
        if me_e.flag.contains(EdgeFlag::SELECT) {
            bm.edge_select_set(e, true);
        }

        let row = bm.edge(e).row();
        emap.copy_element(&me.edata, i, &mut bm.edata, row);

        if let Some(h) = edge_bweight {
            bm.edata.set(h, row, uchar_to_unit_float(me_e.bweight));
        }
        if let Some(h) = edge_crease {
            bm.edata.set(h, row, uchar_to_unit_float(me_e.crease));
        }
    }

    // ==================== Faces ====================

    let mut ftable: Vec<Option<FaceId>> = vec![None; me.polys.len()];
    let mut face_index = 0;
    let mut loop_index = 0;
    for (i, mp) in me.polys.iter().enumerate() {
        let range = match mp.loop_range() {
            Some(range) if mp.totloop != 0 && range.end <= me.loops.len() => range,
            _ => {
                warn!(
                    mesh = %me.name,
                    face = i,
                    loopstart = mp.loopstart,
                    totloop = mp.totloop,
                    "skipping face with invalid corner range"
                );
                report.skipped_faces.push(i);
                continue;
            }
        };
        let loopstart = range.start;

        let corners = &me.loops[range];
        let verts: Vec<VertId> = corners.iter().map(|ml| vtable[ml.v]).collect();
        let edges: Vec<EdgeId> = corners.iter().map(|ml| etable[ml.e]).collect();
        let f = match bm.create_face(&verts, &edges) {
            Ok(f) => f,
            Err(err) => {
                warn!(mesh = %me.name, face = i, error = %err, "skipping malformed face");
                report.skipped_faces.push(i);
                continue;
            }
        };
        ftable[i] = Some(f);

        {
            let bf = bm.face_mut(f);
            bf.index = face_index;
            bf.flag = face_flag_from_mflag(mp.flag - PolyFlag::FACE_SEL);
            bf.mat_nr = mp.mat_nr;
        }
        face_index += 1;
        if mp.flag.contains(PolyFlag::FACE_SEL) {
            bm.face_select_set(f, true);
        }
        if me.act_face == Some(i) {
            bm.act_face = Some(f);
        }

        let loops: Vec<LoopId> = bm.face_loops(f).collect();
        for (j, l) in loops.into_iter().enumerate() {
            bm.get_loop_mut(l).index = loop_index;
            loop_index += 1;
            let row = bm.get_loop(l).row();
            lmap.copy_element(&me.ldata, loopstart + j, &mut bm.ldata, row);
        }

        let row = bm.face(f).row();
        pmap.copy_element(&me.pdata, i, &mut bm.pdata, row);

        if params.calc_face_normal {
            let no = bm.face_calc_normal(f);
            bm.face_mut(f).no = no;
        }
    }

    if is_new {
        bm.mark_index_clean(ElemType::VERT | ElemType::EDGE | ElemType::FACE | ElemType::LOOP);
    }

    // ==================== Selection history ====================

    if me.mselect.is_empty() {
        bm.select_history_clear();
    } else {
        for msel in &me.mselect {
            let elem = match msel.ty {
                SelectType::Vert => vtable.get(msel.index).map(|&v| ElemRef::Vert(v)),
                SelectType::Edge => etable.get(msel.index).map(|&e| ElemRef::Edge(e)),
                SelectType::Face => ftable.get(msel.index).copied().flatten().map(ElemRef::Face),
            };
            if let Some(elem) = elem {
                bm.select_history_store(elem);
            }
        }
    }

    debug!(
        mesh = %me.name,
        verts = vtable.len(),
        edges = etable.len(),
        faces = face_index,
        skipped = report.skipped_faces.len(),
        shape_keys = tot_shape_keys,
        "mesh to graph"
    );

    report
}

fn copy_layouts(bm: &mut BMesh, me: &Mesh, mask: &CustomDataMeshMasks, policy: LayerCopyPolicy) {
    let lens = [bm.vdata.len(), bm.edata.len(), bm.pdata.len(), bm.ldata.len()];
    CustomData::copy_layers(&me.vdata, &mut bm.vdata, mask.vmask, policy, lens[0]);
    CustomData::copy_layers(&me.edata, &mut bm.edata, mask.emask, policy, lens[1]);
    CustomData::copy_layers(&me.pdata, &mut bm.pdata, mask.pmask, policy, lens[2]);
    CustomData::copy_layers(&me.ldata, &mut bm.ldata, mask.lmask, policy, lens[3]);
}

impl BMesh {
    /// Build a new graph from a mesh.
    ///
    /// Shorthand for [`bm_from_mesh`] into an empty graph; skipped faces are
    /// only logged.
    pub fn from_mesh(me: &Mesh, params: &MeshFromParams) -> Self {
        let mut bm = BMesh::new();
        bm_from_mesh(&mut bm, me, params);
        bm
    }
}
