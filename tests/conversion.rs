//! End-to-end conversion scenarios.
//!
//! Each test drives a mesh through one or more graph round trips and checks
//! a property that must hold for the result:
//!
//! - round trips keep topology, attributes and flags
//! - shape-key edits reach the right key blocks
//! - objects referencing vertices follow the new vertex order
//! - malformed input degrades to skipped faces, never a failure

#![allow(clippy::unwrap_used)]

use approx::assert_relative_eq;
use editmesh::bmesh::{BMesh, ElemRef};
use editmesh::convert::{
    bm_from_mesh, bm_to_mesh, bm_to_mesh_for_eval, uchar_to_unit_float, BMeshToMeshParams,
    MeshFromParams, ShapeSource,
};
use editmesh::customdata::{CustomDataMeshMasks, LayerType};
use editmesh::edit::EditMesh;
use editmesh::mesh::{
    build_from_polygons, cube, grid, CdFlag, EdgeFlag, Mesh, MeshSelect, PolyFlag, SelectType,
    VertFlag,
};
use editmesh::object::{Document, HookModifier, Modifier, Object};
use nalgebra::{Point3, Vector3};

fn to_graph(me: &Mesh) -> BMesh {
    BMesh::from_mesh(me, &MeshFromParams::edit_mode(None))
}

fn back(bm: &mut BMesh, me: &mut Mesh) {
    bm_to_mesh(bm, me, None, &BMeshToMeshParams::exit_edit_mode());
}

// =============================================================================
// Round trips
// =============================================================================

mod round_trip {
    use super::*;

    #[test]
    fn topology_is_identical() {
        let original = build_from_polygons(
            "house",
            &[
                Point3::new(0.0, 0.0, 0.0),
                Point3::new(1.0, 0.0, 0.0),
                Point3::new(1.0, 1.0, 0.0),
                Point3::new(0.0, 1.0, 0.0),
                Point3::new(0.5, 1.5, 0.0),
            ],
            &[vec![0, 1, 2, 3], vec![3, 2, 4]],
        )
        .unwrap();

        let mut me = original.clone();
        let mut bm = to_graph(&me);
        back(&mut bm, &mut me);

        assert_eq!(me.verts, original.verts);
        assert_eq!(me.polys, original.polys);
        assert_eq!(me.loops, original.loops);
        for (a, b) in me.edges.iter().zip(&original.edges) {
            assert_eq!((a.v1, a.v2), (b.v1, b.v2));
        }
    }

    #[test]
    fn graph_indices_match_source_slots() {
        let me = grid("Grid", 5);
        let bm = to_graph(&me);
        for (i, (_, v)) in bm.verts().enumerate() {
            assert_eq!(v.index(), i);
            assert_eq!(v.co, me.verts[i].co);
        }
        for (i, (_, f)) in bm.faces().enumerate() {
            assert_eq!(f.index(), i);
        }
    }

    #[test]
    fn custom_data_survives() {
        let mut me = cube("Cube");
        let weight = me.vdata.add_layer_named(LayerType::PropFloat, "weight");
        let uv = me.ldata.add_layer(LayerType::UvMap);
        let fmap = me.pdata.add_layer(LayerType::FaceMap);
        let mark = me.edata.add_layer_named(LayerType::PropBool, "mark");
        for i in 0..me.num_verts() {
            me.vdata.set(weight, i, i as f32 * 0.25);
        }
        for i in 0..me.num_loops() {
            me.ldata.set(uv, i, [i as f32, -(i as f32)]);
        }
        for i in 0..me.num_polys() {
            me.pdata.set(fmap, i, i as i32);
        }
        me.edata.set(mark, 7, true);
        let original = me.clone();

        let mut bm = to_graph(&me);
        back(&mut bm, &mut me);

        assert_eq!(me.vdata.num_layers(), 1);
        assert_eq!(me.vdata, original.vdata);
        assert_eq!(me.edata, original.edata);
        assert_eq!(me.pdata, original.pdata);
        assert_eq!(me.ldata, original.ldata);
    }

    #[test]
    fn custom_data_of_survivors_after_kill() {
        let mut me = grid("Grid", 2);
        let weight = me.vdata.add_layer_named(LayerType::PropFloat, "weight");
        for i in 0..me.num_verts() {
            me.vdata.set(weight, i, i as f32);
        }

        let mut bm = to_graph(&me);
        let first = bm.vert_ids().next().unwrap();
        bm.kill_vert(first);
        back(&mut bm, &mut me);

        let weight = me.vdata.layer_index_named(LayerType::PropFloat, "weight").unwrap();
        let values = me.vdata.column::<f32>(weight).unwrap();
        assert_eq!(values, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0]);
    }

    #[test]
    fn flags_survive() {
        let mut me = cube("Cube");
        me.verts[2].flag = VertFlag::HIDE;
        me.edges[3].flag |= EdgeFlag::SEAM | EdgeFlag::SHARP;
        me.polys[1].flag |= PolyFlag::FACE_SEL | PolyFlag::SMOOTH;
        me.polys[2].mat_nr = 2;

        let original = me.clone();
        let mut bm = to_graph(&me);
        back(&mut bm, &mut me);

        assert_eq!(me.verts[2].flag, VertFlag::HIDE);
        assert!(me.edges[3].flag.contains(EdgeFlag::SEAM | EdgeFlag::SHARP));
        assert_eq!(me.polys, original.polys);
        let selected = me.verts.iter().filter(|v| v.flag.contains(VertFlag::SELECT)).count();
        assert_eq!(selected, 4);
    }

    #[test]
    fn weights_drift_at_most_one_step() {
        let mut me = cube("Cube");
        me.cd_flag = CdFlag::VERT_BWEIGHT | CdFlag::EDGE_BWEIGHT | CdFlag::EDGE_CREASE;
        for (i, v) in me.verts.iter_mut().enumerate() {
            v.bweight = (i * 37) as u8;
        }
        for (i, e) in me.edges.iter_mut().enumerate() {
            e.crease = (i * 21) as u8;
            e.bweight = 255 - (i * 13) as u8;
        }
        let original = me.clone();

        for _ in 0..3 {
            let mut bm = to_graph(&me);
            back(&mut bm, &mut me);
        }

        assert_eq!(me.cd_flag, original.cd_flag);
        for (a, b) in me.verts.iter().zip(&original.verts) {
            assert!(a.bweight.abs_diff(b.bweight) <= 1);
        }
        for (a, b) in me.edges.iter().zip(&original.edges) {
            assert!(a.crease.abs_diff(b.crease) <= 1);
            assert!(a.bweight.abs_diff(b.bweight) <= 1);
        }
        assert_relative_eq!(uchar_to_unit_float(me.edges[1].crease), 21.0 / 255.0);
    }
}

// =============================================================================
// Shape keys
// =============================================================================

mod shape_keys {
    use super::*;

    fn keyed_cube() -> Mesh {
        let mut me = cube("Cube");
        me.add_shape_key("Basis");
        me.add_shape_key("Key 1");
        me
    }

    #[test]
    fn moving_basis_vertex_moves_dependent_key() {
        let mut me = keyed_cube();
        let original = me.clone();

        let mut edit = EditMesh::enter(&me, Some(0));
        let v = edit.bm().vert_ids().nth(3).unwrap();
        edit.bm_mut().vert_mut(v).co += Vector3::new(1.0, 0.0, 0.0);
        let report = edit.exit(&mut me, None);

        let expected = original.verts[3].co + Vector3::new(1.0, 0.0, 0.0);
        let key = me.key.as_ref().unwrap();
        assert_eq!(me.verts[3].co, expected);
        assert_eq!(key.blocks()[0].data[3], expected);
        assert_eq!(key.blocks()[1].data[3], expected);
        assert_eq!(key.blocks()[1].data[4], original.verts[4].co);
        assert!(report.shapes.unwrap().basis_offset_applied);
    }

    #[test]
    fn independent_key_is_unaffected() {
        let mut me = keyed_cube();
        me.key.as_mut().unwrap().blocks_mut()[1].relative = 1;
        let original = me.clone();

        let mut edit = EditMesh::enter(&me, Some(0));
        let v = edit.bm().vert_ids().nth(3).unwrap();
        edit.bm_mut().vert_mut(v).co += Vector3::new(1.0, 0.0, 0.0);
        edit.exit(&mut me, None);

        let key = me.key.as_ref().unwrap();
        assert_relative_eq!(key.blocks()[0].data[3].x, original.verts[3].co.x + 1.0);
        assert_eq!(key.blocks()[1].data, original.key.as_ref().unwrap().blocks()[1].data);
    }

    #[test]
    fn editing_non_basis_key_keeps_basis_positions() {
        let mut me = keyed_cube();
        let original = me.clone();

        let mut edit = EditMesh::enter(&me, Some(1));
        for v in edit.bm().vert_ids().collect::<Vec<_>>() {
            edit.bm_mut().vert_mut(v).co += Vector3::new(0.0, 0.0, 2.0);
        }
        edit.exit(&mut me, None);

        let key = me.key.as_ref().unwrap();
        assert_eq!(me.verts, original.verts);
        assert_eq!(key.blocks()[0].data, original.positions());
        for (co, orig) in key.blocks()[1].data.iter().zip(&original.verts) {
            assert_relative_eq!(co.z, orig.co.z + 2.0);
        }
    }

    #[test]
    fn added_geometry_is_not_offset() {
        let mut me = keyed_cube();
        let mut edit = EditMesh::enter(&me, Some(0));
        let ids: Vec<_> = edit.bm().vert_ids().collect();
        let bm = edit.bm_mut();
        for &v in &ids {
            bm.vert_mut(v).co.y += 1.0;
        }
        let extra = bm.create_vert(Point3::new(9.0, 9.0, 9.0));
        bm.create_edge(ids[0], extra);
        let report = edit.exit(&mut me, None);

        assert!(!report.shapes.unwrap().basis_offset_applied);
        let key = me.key.as_ref().unwrap();
        assert_eq!(key.blocks()[1].data.len(), 9);
        assert_eq!(key.blocks()[0].data[8], Point3::new(9.0, 9.0, 9.0));
    }

    #[test]
    fn session_layer_becomes_key_block() {
        let mut me = keyed_cube();
        let mut edit = EditMesh::enter(&me, Some(0));
        let h = edit.bm_mut().vdata.add_layer_named(LayerType::ShapeKey, "Imported");
        edit.bm_mut().vdata.set_layer_uid(h, 500);
        let report = edit.exit(&mut me, None).shapes.unwrap();

        assert_eq!(report.created, vec![500]);
        let key = me.key.as_ref().unwrap();
        assert_eq!(key.len(), 3);
        assert_eq!(key.block_index_by_uid(500), Some(2));
    }

    #[test]
    fn missing_layer_is_reported() {
        let mut me = keyed_cube();
        let mut edit = EditMesh::enter(&me, Some(0));
        let second = edit.bm().vdata.layer_index_n(LayerType::ShapeKey, 1).unwrap();
        edit.bm_mut().vdata.remove_layer(second);
        let uid = me.key.as_ref().unwrap().blocks()[1].uid();
        let report = edit.exit(&mut me, None).shapes.unwrap();

        assert_eq!(report.source_of(uid), Some(ShapeSource::FallbackOriginal));
        let basis_uid = me.key.as_ref().unwrap().blocks()[0].uid();
        assert_eq!(report.source_of(basis_uid), Some(ShapeSource::Found));
    }

    #[test]
    fn evaluated_mesh_snapshot_drops_shapes() {
        let me = keyed_cube();
        let mut bm = to_graph(&me);
        let mut eval = Mesh::new("eval");
        bm_to_mesh_for_eval(&mut bm, &mut eval, Some(&CustomDataMeshMasks::NONE));

        assert!(eval.runtime.deformed_only);
        assert!(!eval.vdata.has_layer(LayerType::ShapeKey));
        assert_eq!(eval.num_polys(), 6);
        assert!(eval.validate().is_ok());
    }
}

// =============================================================================
// Selection history
// =============================================================================

mod selection {
    use super::*;

    #[test]
    fn history_round_trips() {
        let mut me = cube("Cube");
        me.polys[2].flag |= PolyFlag::FACE_SEL;
        me.verts[7].flag |= VertFlag::SELECT;
        me.mselect = vec![
            MeshSelect { ty: SelectType::Face, index: 2 },
            MeshSelect { ty: SelectType::Vert, index: 7 },
        ];
        let original = me.clone();

        let mut bm = to_graph(&me);
        back(&mut bm, &mut me);
        assert_eq!(me.mselect, original.mselect);
    }

    #[test]
    fn killed_elements_leave_history() {
        let mut me = cube("Cube");
        me.verts[0].flag |= VertFlag::SELECT;
        me.verts[6].flag |= VertFlag::SELECT;
        me.mselect = vec![
            MeshSelect { ty: SelectType::Vert, index: 0 },
            MeshSelect { ty: SelectType::Vert, index: 6 },
        ];

        let mut bm = to_graph(&me);
        let first = bm.vert_ids().next().unwrap();
        bm.kill_vert(first);
        bm.select_history_validate();
        assert!(bm.select_history().iter().all(|&r| bm.contains(r)));
        assert_eq!(bm.select_history().len(), 1);

        back(&mut bm, &mut me);
        assert_eq!(me.mselect, vec![MeshSelect { ty: SelectType::Vert, index: 5 }]);
    }

    #[test]
    fn unselected_entries_are_validated_away() {
        let me = cube("Cube");
        let mut bm = to_graph(&me);
        let f = bm.face_ids().next().unwrap();
        bm.select_history_store(ElemRef::Face(f));
        bm.select_history_validate();
        assert!(bm.select_history().is_empty());
    }
}

// =============================================================================
// Object references
// =============================================================================

mod objects {
    use super::*;

    #[test]
    fn hooks_and_vertex_parents_follow_vertices() {
        let mut me = grid("Grid", 2);
        let mut doc = Document::new();
        let owner = doc.add_object(
            Object::with_mesh("Grid", &me)
                .with_modifier(Modifier::Hook(HookModifier::new("Hook", vec![0, 4, 8]))),
        );
        let child = doc.add_object(Object::new("Child").with_vertex_parent(owner, &[8, 0, 4]));
        let single = doc.add_object(Object::new("Single").with_vertex_parent(owner, &[5]));

        let mut edit = EditMesh::enter(&me, None);
        let first = edit.bm().vert_ids().next().unwrap();
        edit.bm_mut().kill_vert(first);
        let report = edit.exit(&mut me, Some(&mut doc));

        assert_eq!(report.remapped_objects, 3);
        let hook = doc.objects[owner].hooks().next().unwrap();
        assert_eq!(hook.indexar, vec![3, 7]);
        // Vertex 0 is gone; the stale index stays.
        assert_eq!(doc.objects[child].par, [7, 0, 3]);
        assert_eq!(doc.objects[single].par, [4, 0, 0]);
    }

    #[test]
    fn flush_keeps_remapping_consistent() {
        let mut me = grid("Grid", 2);
        let mut doc = Document::new();
        let owner = doc.add_object(
            Object::with_mesh("Grid", &me)
                .with_modifier(Modifier::Hook(HookModifier::new("Hook", vec![8]))),
        );

        let mut edit = EditMesh::enter(&me, None);
        let ids: Vec<_> = edit.bm().vert_ids().collect();
        edit.bm_mut().kill_vert(ids[0]);
        edit.flush(&mut me, Some(&mut doc));
        assert_eq!(doc.objects[owner].hooks().next().unwrap().indexar, vec![7]);

        edit.bm_mut().kill_vert(ids[1]);
        edit.exit(&mut me, Some(&mut doc));
        assert_eq!(doc.objects[owner].hooks().next().unwrap().indexar, vec![6]);
    }

    #[test]
    fn other_meshes_are_left_alone() {
        let mut me = grid("Grid", 1);
        let other = grid("Other", 1);
        let mut doc = Document::new();
        let stranger = doc.add_object(
            Object::with_mesh("Other", &other)
                .with_modifier(Modifier::Hook(HookModifier::new("Hook", vec![3]))),
        );

        let mut bm = to_graph(&me);
        let first = bm.vert_ids().next().unwrap();
        bm.kill_vert(first);
        bm_to_mesh(&mut bm, &mut me, Some(&mut doc), &BMeshToMeshParams::exit_edit_mode());
        assert_eq!(doc.objects[stranger].hooks().next().unwrap().indexar, vec![3]);
    }
}

// =============================================================================
// Malformed input
// =============================================================================

mod malformed {
    use super::*;

    #[test]
    fn bad_faces_are_skipped() {
        let mut me = grid("Grid", 2);
        me.polys[1].totloop = 2;
        me.polys[3].loopstart = 1000;

        let mut bm = BMesh::new();
        let report = bm_from_mesh(&mut bm, &me, &MeshFromParams::default());
        assert_eq!(report.skipped_faces, vec![1, 3]);
        assert_eq!(bm.num_faces(), 2);
        assert!(bm.is_valid());

        bm_to_mesh(&mut bm, &mut me, None, &BMeshToMeshParams::default());
        assert_eq!(me.num_polys(), 2);
        assert_eq!(me.num_loops(), 8);
        assert!(me.validate().is_ok());
    }

    #[test]
    fn validate_reports_bad_ranges() {
        let mut me = grid("Grid", 1);
        me.polys[0].loopstart = 3;
        assert!(me.validate().is_err());
    }
}
