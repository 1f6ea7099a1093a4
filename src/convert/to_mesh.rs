//! Editable graph → persistent mesh.

use nalgebra::Vector3;
use slotmap::SecondaryMap;
use tracing::debug;

use super::flags::{
    cd_flag_from_bmesh, edge_draw_hint, edge_flag_to_mflag, face_flag_to_mflag,
    face_normal_table, vert_flag_to_mflag,
};
use super::remap::patch_object_references;
use super::shape::{bm_to_mesh_shape, key_index};
use super::{unit_float_to_uchar_clamp, BMeshToMeshParams, MeshToReport};
use crate::bmesh::{BMesh, ElemRef, ElemType, FaceId, LoopId};
use crate::customdata::{
    CustomData, CustomDataMeshMasks, LayerCopyPolicy, LayerMap, LayerType, LayerTypeMask,
};
use crate::mesh::{EdgeFlag, Mesh, MeshEdge, MeshLoop, MeshPoly, MeshSelect, MeshVert, SelectType};
use crate::object::Document;

/// How the persistent draw flag of an edge is derived.
#[derive(Clone, Copy)]
enum EdgeDraw<'a> {
    /// Hide edges between nearly coplanar face pairs.
    Coplanar(&'a SecondaryMap<FaceId, Vector3<f32>>),
    /// Keep the graph's flag, but always draw edges with a single face.
    Boundary,
}

/// Rebuild `me` from `bm`.
///
/// All element arrays and custom data of the mesh are replaced. Elements
/// are written in graph iteration order, and each graph element's index
/// annotation is set to the position it was written to.
///
/// When the mesh has shape keys they are reconciled with the graph's
/// shape-key layers (see [`bm_to_mesh_shape`]). When `doc` is given and
/// `params.calc_object_remap` is set, objects referencing the mesh's
/// vertices by index are patched (see [`patch_object_references`]).
pub fn bm_to_mesh(
    bm: &mut BMesh,
    me: &mut Mesh,
    doc: Option<&mut Document>,
    params: &BMeshToMeshParams,
) -> MeshToReport {
    let mut report = MeshToReport::default();
    let ototvert = me.verts.len();
    let mask = CustomDataMeshMasks::MESH.union(&params.cd_mask_extra);

    me.vdata = CustomData::from_layout(&bm.vdata, mask.vmask, bm.num_verts());
    me.edata = CustomData::from_layout(&bm.edata, mask.emask, bm.num_edges());
    me.pdata = CustomData::from_layout(&bm.pdata, mask.pmask, bm.num_faces());
    me.ldata = CustomData::from_layout(&bm.ldata, mask.lmask, bm.num_loops());

    me.clear_derived_normals();
    me.cd_flag = cd_flag_from_bmesh(bm);

    let face_normals = face_normal_table(bm);
    write_elements(bm, me, EdgeDraw::Coplanar(&face_normals));

    me.act_face = bm.act_face.map(|f| bm.face(f).index());

    if let Some(doc) = doc {
        if params.calc_object_remap && ototvert > 0 {
            report.remapped_objects = patch_object_references(bm, me.id(), ototvert, doc);
        }
    }

    me.mselect = bm
        .select_history()
        .iter()
        .map(|&elem| match elem {
            ElemRef::Vert(v) => MeshSelect {
                ty: SelectType::Vert,
                index: bm.vert(v).index(),
            },
            ElemRef::Edge(e) => MeshSelect {
                ty: SelectType::Edge,
                index: bm.edge(e).index(),
            },
            ElemRef::Face(f) => MeshSelect {
                ty: SelectType::Face,
                index: bm.face(f).index(),
            },
        })
        .collect();

    if let Some(key) = me.key.as_mut() {
        report.shapes = Some(bm_to_mesh_shape(
            bm,
            key,
            &mut me.verts,
            params.active_shapekey_to_mvert,
        ));
    }

    if params.update_shapekey_indices {
        if let Some(keyindex) = bm.vdata.layer_index(LayerType::ShapeKeyIndex) {
            for (i, v) in bm.verts.values().enumerate() {
                bm.vdata.set(keyindex, v.row, key_index(i));
            }
        }
    }

    me.runtime.deformed_only = false;
    me.tag_topology_changed();

    debug!(
        mesh = %me.name,
        verts = me.verts.len(),
        edges = me.edges.len(),
        faces = me.polys.len(),
        loops = me.loops.len(),
        "graph to mesh"
    );

    report
}

/// Write `bm` into the empty mesh `me` for evaluation.
///
/// Unlike [`bm_to_mesh`] this leaves shape keys, selection history and
/// objects alone, and never carries shape-key layers. The result is marked
/// as deformed only.
///
/// # Panics
///
/// In debug builds, if `me` already has elements.
pub fn bm_to_mesh_for_eval(
    bm: &mut BMesh,
    me: &mut Mesh,
    cd_mask_extra: Option<&CustomDataMeshMasks>,
) {
    debug_assert!(
        me.verts.is_empty() && me.edges.is_empty() && me.polys.is_empty() && me.loops.is_empty(),
        "evaluation target must be empty"
    );

    let mut mask = CustomDataMeshMasks::DERIVED;
    if let Some(extra) = cd_mask_extra {
        mask.update(extra);
    }
    mask.vmask.remove(LayerTypeMask::SHAPE_KEY);

    let policy = LayerCopyPolicy::MergePreserving;
    CustomData::copy_layers(&bm.vdata, &mut me.vdata, mask.vmask, policy, bm.num_verts());
    CustomData::copy_layers(&bm.edata, &mut me.edata, mask.emask, policy, bm.num_edges());
    CustomData::copy_layers(&bm.pdata, &mut me.pdata, mask.pmask, policy, bm.num_faces());
    CustomData::copy_layers(&bm.ldata, &mut me.ldata, mask.lmask, policy, bm.num_loops());

    me.clear_derived_normals();
    me.runtime.deformed_only = true;

    write_elements(bm, me, EdgeDraw::Boundary);

    me.cd_flag = cd_flag_from_bmesh(bm);

    debug!(
        mesh = %me.name,
        verts = me.verts.len(),
        faces = me.polys.len(),
        "graph to evaluated mesh"
    );
}

/// Write every element of `bm` into the arrays of `me`, whose custom data
/// must already have the final layout and lengths. Assigns fresh index
/// annotations on the graph.
fn write_elements(bm: &mut BMesh, me: &mut Mesh, draw: EdgeDraw<'_>) {
    let all = ElemType::VERT | ElemType::EDGE | ElemType::FACE | ElemType::LOOP;
    bm.mark_index_dirty(all);

    let vmap = LayerMap::new(&bm.vdata, &me.vdata);
    let emap = LayerMap::new(&bm.edata, &me.edata);
    let pmap = LayerMap::new(&bm.pdata, &me.pdata);
    let lmap = LayerMap::new(&bm.ldata, &me.ldata);

    let vert_bweight = bm.vdata.layer_index(LayerType::BevelWeight);
    let edge_bweight = bm.edata.layer_index(LayerType::BevelWeight);
    let edge_crease = bm.edata.layer_index(LayerType::Crease);

    // ==================== Vertices ====================

    me.verts.clear();
    me.verts.reserve(bm.num_verts());
    for (i, bv) in bm.verts.values_mut().enumerate() {
        bv.index = i;

        let mut mv = MeshVert::new(bv.co);
        mv.flag = vert_flag_to_mflag(bv.flag);
        if let Some(h) = vert_bweight {
            mv.bweight = unit_float_to_uchar_clamp(bm.vdata.get(h, bv.row).unwrap_or(0.0));
        }
        vmap.copy_element(&bm.vdata, bv.row, &mut me.vdata, i);
        me.verts.push(mv);
    }

    // ==================== Edges ====================

    me.edges.clear();
    me.edges.reserve(bm.num_edges());
    for (i, (e, be)) in bm.edges().enumerate() {
        let [v1, v2] = be.verts();
        let face_count = bm.edge_face_count(e);

        let mut flag = edge_flag_to_mflag(be.flag, face_count == 0);
        match draw {
            EdgeDraw::Coplanar(normals) => {
                flag.set(EdgeFlag::EDGEDRAW, edge_draw_hint(bm, e, normals));
            }
            EdgeDraw::Boundary => {
                if face_count == 1 {
                    flag.insert(EdgeFlag::EDGEDRAW);
                }
            }
        }

        let mut med = MeshEdge {
            v1: bm.vert(v1).index(),
            v2: bm.vert(v2).index(),
            flag,
            crease: 0,
            bweight: 0,
        };
        if let Some(h) = edge_crease {
            med.crease = unit_float_to_uchar_clamp(bm.edata.get(h, be.row).unwrap_or(0.0));
        }
        if let Some(h) = edge_bweight {
            med.bweight = unit_float_to_uchar_clamp(bm.edata.get(h, be.row).unwrap_or(0.0));
        }
        emap.copy_element(&bm.edata, be.row, &mut me.edata, i);
        me.edges.push(med);
    }
    for (i, be) in bm.edges.values_mut().enumerate() {
        be.index = i;
    }

    // ==================== Faces and corners ====================

    me.polys.clear();
    me.loops.clear();
    me.polys.reserve(bm.num_faces());
    me.loops.reserve(bm.num_loops());
    let mut loop_order: Vec<LoopId> = Vec::with_capacity(bm.num_loops());
    for (i, (f, bf)) in bm.faces().enumerate() {
        let loopstart = me.loops.len();
        for l in bm.face_loops(f) {
            let lp = bm.get_loop(l);
            let j = me.loops.len();
            me.loops.push(MeshLoop {
                v: bm.vert(lp.vert()).index(),
                e: bm.edge(lp.edge()).index(),
            });
            lmap.copy_element(&bm.ldata, lp.row, &mut me.ldata, j);
            loop_order.push(l);
        }
        me.polys.push(MeshPoly {
            loopstart,
            totloop: bf.num_loops(),
            mat_nr: bf.mat_nr,
            flag: face_flag_to_mflag(bf.flag),
        });
        pmap.copy_element(&bm.pdata, bf.row, &mut me.pdata, i);
    }
    for (i, bf) in bm.faces.values_mut().enumerate() {
        bf.index = i;
    }
    for (j, l) in loop_order.into_iter().enumerate() {
        bm.get_loop_mut(l).index = j;
    }

    bm.mark_index_clean(all);
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    use super::*;
    use crate::bmesh::VertId;
    use crate::convert::{bm_from_mesh, MeshFromParams};
    use crate::mesh::{cube, grid, CdFlag, PolyFlag};

    fn round_trip(me: &Mesh) -> Mesh {
        let mut bm = BMesh::from_mesh(me, &MeshFromParams::default());
        let mut out = me.clone();
        bm_to_mesh(&mut bm, &mut out, None, &BMeshToMeshParams::default());
        out
    }

    #[test]
    fn test_cube_round_trip() {
        let mut me = cube("Cube");
        me.polys[2].mat_nr = 3;
        me.polys[4].flag |= PolyFlag::SMOOTH;
        let out = round_trip(&me);

        assert_eq!(out.verts, me.verts);
        assert_eq!(out.edges, me.edges);
        assert_eq!(out.polys, me.polys);
        assert_eq!(out.loops, me.loops);
        assert!(out.validate().is_ok());
    }

    #[test]
    fn test_flat_grid_hides_interior_edges() {
        let me = grid("Grid", 3);
        let out = round_trip(&me);
        for (i, med) in out.edges.iter().enumerate() {
            let faces = out
                .polys
                .iter()
                .filter(|p| out.loops[p.loop_range().unwrap()].iter().any(|l| l.e == i))
                .count();
            assert_eq!(med.flag.contains(EdgeFlag::EDGEDRAW), faces != 2, "edge {}", i);
        }
    }

    #[test]
    fn test_wire_edge_is_loose() {
        let mut me = cube("Cube");
        let a = me.add_vert(Point3::new(3.0, 0.0, 0.0));
        me.add_edge(0, a);
        let out = round_trip(&me);
        let wire = out.find_edge(0, a).unwrap();
        assert!(out.edges[wire].flag.contains(EdgeFlag::LOOSEEDGE));
        assert!(!out.edges[0].flag.contains(EdgeFlag::LOOSEEDGE));
    }

    #[test]
    fn test_weights_quantized() {
        let mut me = cube("Cube");
        me.cd_flag = CdFlag::VERT_BWEIGHT | CdFlag::EDGE_CREASE;
        let mut bm = BMesh::from_mesh(&me, &MeshFromParams::default());
        let vb = bm.vdata.layer_index(LayerType::BevelWeight).unwrap();
        let ec = bm.edata.layer_index(LayerType::Crease).unwrap();
        let vrow = bm.verts().next().unwrap().1.row();
        let erow = bm.edges().next().unwrap().1.row();
        bm.vdata.set(vb, vrow, 0.5f32);
        bm.edata.set(ec, erow, 2.0f32);

        bm_to_mesh(&mut bm, &mut me, None, &BMeshToMeshParams::default());
        assert_eq!(me.verts[0].bweight, 128);
        assert_eq!(me.edges[0].crease, 255);
        assert_eq!(me.cd_flag, CdFlag::VERT_BWEIGHT | CdFlag::EDGE_CREASE);
        assert!(!me.vdata.has_layer(LayerType::BevelWeight));
    }

    #[test]
    fn test_indices_follow_iteration_after_kill() {
        let me = cube("Cube");
        let mut bm = BMesh::from_mesh(&me, &MeshFromParams::default());
        let first = bm.vert_ids().next().unwrap();
        bm.kill_vert(first);
        let mut out = me.clone();
        bm_to_mesh(&mut bm, &mut out, None, &BMeshToMeshParams::default());

        assert_eq!(out.verts.len(), 7);
        assert_eq!(out.polys.len(), 3);
        assert!(bm.elem_index_dirty().is_empty());
        for (i, (_, v)) in bm.verts().enumerate() {
            assert_eq!(v.index(), i);
            assert_eq!(out.verts[i].co, v.co);
        }
        assert!(out.validate().is_ok());
    }

    #[test]
    fn test_history_and_active_face_written() {
        let me = cube("Cube");
        let mut bm = BMesh::from_mesh(&me, &MeshFromParams::default());
        let faces: Vec<_> = bm.face_ids().collect();
        let verts: Vec<VertId> = bm.vert_ids().collect();
        bm.face_select_set(faces[5], true);
        bm.select_history_store(faces[5].into());
        bm.select_history_store(verts[7].into());
        bm.act_face = Some(faces[5]);
        bm.kill_face(faces[0]);

        let mut out = me.clone();
        bm_to_mesh(&mut bm, &mut out, None, &BMeshToMeshParams::default());
        assert_eq!(out.act_face, Some(4));
        assert_eq!(
            out.mselect,
            vec![
                MeshSelect { ty: SelectType::Face, index: 4 },
                MeshSelect { ty: SelectType::Vert, index: 7 },
            ]
        );
        assert!(out.polys[4].flag.contains(PolyFlag::FACE_SEL));
    }

    #[test]
    fn test_topology_generation_bumped() {
        let mut me = cube("Cube");
        me.vertex_normals_ensure();
        let before = me.runtime.topology_generation();
        let mut bm = BMesh::from_mesh(&me, &MeshFromParams::default());
        bm_to_mesh(&mut bm, &mut me, None, &BMeshToMeshParams::default());
        assert!(me.runtime.topology_generation() > before);
        assert!(me.runtime.vert_normals().is_none());
    }

    #[test]
    fn test_flush_refreshes_original_indices() {
        let me = cube("Cube");
        let mut bm = BMesh::new();
        bm_from_mesh(&mut bm, &me, &MeshFromParams::default().with_key_index(true));
        let first = bm.vert_ids().next().unwrap();
        bm.kill_vert(first);

        let mut out = me.clone();
        bm_to_mesh(&mut bm, &mut out, None, &BMeshToMeshParams::flush());
        let keyindex = bm.vdata.layer_index(LayerType::ShapeKeyIndex).unwrap();
        for (i, (_, v)) in bm.verts().enumerate() {
            assert_eq!(bm.vdata.get::<i32>(keyindex, v.row()), Some(i as i32));
        }
        assert!(!out.vdata.has_layer(LayerType::ShapeKeyIndex));
    }

    #[test]
    fn test_eval_snapshot() {
        let mut me = cube("Cube");
        me.add_shape_key("Basis");
        me.edges[0].flag.remove(EdgeFlag::EDGEDRAW);
        let mut bm = BMesh::from_mesh(&me, &MeshFromParams::edit_mode(Some(0)));

        let mut eval = Mesh::new("eval");
        eval.is_original = false;
        bm_to_mesh_for_eval(&mut bm, &mut eval, None);

        assert!(eval.runtime.deformed_only);
        assert_eq!(eval.verts.len(), 8);
        assert_eq!(eval.loops.len(), 24);
        assert!(!eval.vdata.has_layer(LayerType::ShapeKey));
        assert!(eval.key.is_none());
        assert!(eval.mselect.is_empty());
        // Closed surface: no edge has a single face, so the flag is kept.
        assert!(!eval.edges[0].flag.contains(EdgeFlag::EDGEDRAW));
        assert_relative_eq!(eval.verts[3].co.x, me.verts[3].co.x);
        assert!(bm.elem_index_dirty().is_empty());
    }
}
