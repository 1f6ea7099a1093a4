//! Shape-key reconciliation when writing a graph back to a mesh.
//!
//! Every key block is matched with the graph's shape-key layer carrying the
//! same uid. Blocks with a layer take that layer's values; the active
//! block takes the live vertex positions. When the active block is the
//! basis of other relative blocks, the edit made to it is added to those
//! blocks as a per-vertex offset.

use std::collections::HashMap;

use nalgebra::{Point3, Vector3};
use tracing::{debug, warn};

use crate::bmesh::{BMesh, VertId};
use crate::customdata::{LayerHandle, LayerType, ORIGINDEX_NONE};
use crate::mesh::{Key, KeyType, MeshVert};

/// Where a key block's new data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeSource {
    /// The graph carried a layer for the block.
    Found,
    /// No layer; values were taken from the block's previous data through
    /// the original-index layer.
    FallbackOriginal,
    /// No layer and no usable previous data; values are the live vertex
    /// positions.
    FallbackLive,
}

/// Outcome of [`bm_to_mesh_shape`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShapeSyncReport {
    /// Uids of key blocks created for layers the key did not know.
    pub created: Vec<u32>,
    /// Whether the edit of a basis block was added to its dependents.
    pub basis_offset_applied: bool,
    /// Data source of every key block, in block order, by uid.
    pub sources: Vec<(u32, ShapeSource)>,
}

impl ShapeSyncReport {
    /// Source of the block with the given uid.
    pub fn source_of(&self, uid: u32) -> Option<ShapeSource> {
        self.sources
            .iter()
            .find(|&&(u, _)| u == uid)
            .map(|&(_, source)| source)
    }
}

/// The original-index value recorded for mesh vertex `i`.
///
/// Indices past `i32::MAX` cannot be recorded and map to
/// [`ORIGINDEX_NONE`].
pub(crate) fn key_index(i: usize) -> i32 {
    let keyi = i32::try_from(i);
    debug_assert!(keyi.is_ok(), "vertex index {i} does not fit a key index");
    keyi.unwrap_or(ORIGINDEX_NONE)
}

/// The original index of `v`, if it has one.
fn orig_index(bm: &BMesh, keyindex: Option<LayerHandle>, v: VertId) -> Option<usize> {
    let keyi: i32 = bm.vdata.get(keyindex?, bm.vert(v).row())?;
    usize::try_from(keyi).ok()
}

fn read_co(bm: &BMesh, h: LayerHandle, v: VertId) -> Point3<f32> {
    bm.vdata
        .get::<[f32; 3]>(h, bm.vert(v).row())
        .map(|co| Point3::new(co[0], co[1], co[2]))
        .unwrap_or_else(|| bm.vert(v).co)
}

/// Write the graph's shape-key layers into `key`.
///
/// `mverts` holds the freshly written persistent vertices, in graph
/// iteration order. When the active shape is not the reference key, their
/// positions are replaced with the reference key's, unless
/// `active_shapekey_to_mvert` is set.
///
/// Every written block value is also stored back into its layer, so a
/// second write without re-entering edit mode does not apply offsets twice.
pub fn bm_to_mesh_shape(
    bm: &mut BMesh,
    key: &mut Key,
    mverts: &mut [MeshVert],
    active_shapekey_to_mvert: bool,
) -> ShapeSyncReport {
    let mut report = ShapeSyncReport::default();
    let verts: Vec<VertId> = bm.vert_ids().collect();
    debug_assert_eq!(verts.len(), mverts.len());

    let keyindex = bm.vdata.layer_index(LayerType::ShapeKeyIndex);
    let layer_by_uid: HashMap<u32, LayerHandle> = bm
        .vdata
        .handles_of(LayerType::ShapeKey)
        .map(|h| (bm.vdata.layer(h).uid, h))
        .collect();

    let actkey = bm.shapenr.filter(|&i| i < key.len());
    let mut actkey_has_layer = false;

    // Layers added during the session get a block of their own.
    for h in bm.vdata.handles_of(LayerType::ShapeKey) {
        let layer = bm.vdata.layer(h);
        match key.block_index_by_uid(layer.uid) {
            Some(index) => {
                if Some(index) == actkey {
                    actkey_has_layer = true;
                }
            }
            None => {
                let index = key.add_block_with_uid(layer.name(), layer.uid);
                report.created.push(key.blocks()[index].uid());
            }
        }
    }

    let block_layer = |uid: u32| layer_by_uid.get(&uid).copied();

    // Offsets of the edited basis, for blocks relative to it.
    let mut ofs: Option<Vec<Vector3<f32>>> = None;
    if let Some(act) = actkey {
        if key.kind == KeyType::Relative
            && actkey_has_layer
            && keyindex.is_some()
            && key.is_basis(act)
        {
            if let Some(act_layer) = block_layer(key.blocks()[act].uid()) {
                let mut offsets = Vec::with_capacity(verts.len());
                for &v in &verts {
                    if orig_index(bm, keyindex, v).is_none() {
                        // New geometry cannot be propagated.
                        offsets.clear();
                        break;
                    }
                    offsets.push(bm.vert(v).co - read_co(bm, act_layer, v));
                }
                if offsets.len() == verts.len() {
                    ofs = Some(offsets);
                }
            }
        }
    }

    let refkey_layer = key
        .refkey()
        .and_then(|r| block_layer(key.blocks()[r].uid()));
    let update_from_refkey = !active_shapekey_to_mvert
        && actkey != key.refkey()
        && keyindex.is_some()
        && refkey_layer.is_some();

    for (bi, block) in key.blocks_mut().iter_mut().enumerate() {
        let uid = block.uid();
        let is_active = Some(bi) == actkey;

        if let Some(h) = block_layer(uid) {
            let apply_offset =
                ofs.is_some() && !is_active && Some(block.relative) == actkey;
            if apply_offset {
                report.basis_offset_applied = true;
            }

            let mut data = Vec::with_capacity(verts.len());
            for (i, &v) in verts.iter().enumerate() {
                let mut co = if is_active {
                    if update_from_refkey && orig_index(bm, keyindex, v).is_some() {
                        if let Some(refkey_layer) = refkey_layer {
                            mverts[i].co = read_co(bm, refkey_layer, v);
                        }
                    }
                    bm.vert(v).co
                } else {
                    read_co(bm, h, v)
                };
                if apply_offset {
                    if let Some(ofs) = &ofs {
                        co += ofs[i];
                    }
                }
                let row = bm.vert(v).row();
                bm.vdata.set(h, row, [co.x, co.y, co.z]);
                data.push(co);
            }
            block.data = data;
            report.sources.push((uid, ShapeSource::Found));
        } else {
            let use_old = !block.data.is_empty() && keyindex.is_some();
            let fallback = if use_old {
                "existing shape-key data"
            } else {
                "live positions"
            };
            warn!(block = %block.name, fallback, "shape-key layer missing from edit mesh");

            let mut used_old = false;
            let data: Vec<Point3<f32>> = verts
                .iter()
                .map(|&v| {
                    let old = orig_index(bm, keyindex, v)
                        .filter(|_| use_old)
                        .and_then(|keyi| block.data.get(keyi).copied());
                    used_old |= old.is_some();
                    old.unwrap_or_else(|| bm.vert(v).co)
                })
                .collect();
            block.data = data;
            let source = if used_old {
                ShapeSource::FallbackOriginal
            } else {
                ShapeSource::FallbackLive
            };
            report.sources.push((uid, source));
        }
    }

    if report.basis_offset_applied {
        debug!(
            basis = ?actkey,
            verts = verts.len(),
            "propagated basis edit to relative shape keys"
        );
    }

    report
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;
    use crate::convert::{bm_from_mesh, MeshFromParams};
    use crate::mesh::{cube, Mesh};

    fn keyed_cube() -> Mesh {
        let mut me = cube("Cube");
        me.add_shape_key("Basis");
        let k1 = me.add_shape_key("Key 1");
        for co in &mut me.key.as_mut().unwrap().blocks_mut()[k1].data {
            co.z += 1.0;
        }
        me
    }

    fn edit(me: &Mesh, active: usize) -> BMesh {
        let mut bm = BMesh::new();
        bm_from_mesh(&mut bm, me, &MeshFromParams::edit_mode(Some(active)));
        bm
    }

    fn mverts(bm: &BMesh) -> Vec<MeshVert> {
        bm.verts().map(|(_, v)| MeshVert::new(v.co)).collect()
    }

    #[test]
    fn test_basis_edit_propagates() {
        let me = keyed_cube();
        let mut bm = edit(&me, 0);
        for (_, v) in bm.verts.iter_mut() {
            v.co.x += 0.5;
        }
        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);

        assert!(report.basis_offset_applied);
        for (i, co) in key.blocks()[1].data.iter().enumerate() {
            assert_relative_eq!(co.x, me.verts[i].co.x + 0.5);
            assert_relative_eq!(co.z, me.verts[i].co.z + 1.0);
        }
        for (i, co) in key.blocks()[0].data.iter().enumerate() {
            assert_relative_eq!(co.x, me.verts[i].co.x + 0.5);
        }
    }

    #[test]
    fn test_second_write_does_not_reapply_offset() {
        let me = keyed_cube();
        let mut bm = edit(&me, 0);
        for (_, v) in bm.verts.iter_mut() {
            v.co.y -= 2.0;
        }
        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        let first = key.blocks()[1].data.clone();
        bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        assert_eq!(key.blocks()[1].data, first);
    }

    #[test]
    fn test_key_index_in_range() {
        assert_eq!(key_index(0), 0);
        assert_eq!(key_index(7), 7);
        assert_eq!(key_index(i32::MAX as usize), i32::MAX);
    }

    #[test]
    #[cfg_attr(debug_assertions, should_panic(expected = "does not fit a key index"))]
    fn test_key_index_out_of_range() {
        assert_eq!(key_index(i32::MAX as usize + 1), ORIGINDEX_NONE);
    }

    #[test]
    fn test_new_vertex_cancels_offsets() {
        let me = keyed_cube();
        let mut bm = edit(&me, 0);
        let keyindex = bm.vdata.layer_index(LayerType::ShapeKeyIndex).unwrap();
        let v = bm.create_vert(Point3::new(5.0, 5.0, 5.0));
        let row = bm.vert(v).row();
        bm.vdata.set(keyindex, row, ORIGINDEX_NONE);

        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        assert!(!report.basis_offset_applied);
        assert_eq!(key.blocks()[1].data.len(), 9);
        assert_eq!(key.blocks()[0].data[8], Point3::new(5.0, 5.0, 5.0));
    }

    #[test]
    fn test_non_basis_active_keeps_basis_in_mverts() {
        let me = keyed_cube();
        let mut bm = edit(&me, 1);
        for (_, v) in bm.verts.iter_mut() {
            v.co.x += 3.0;
        }
        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);

        assert!(!report.basis_offset_applied);
        for (i, m) in mv.iter().enumerate() {
            assert_eq!(m.co, me.verts[i].co);
            assert_relative_eq!(key.blocks()[1].data[i].x, me.verts[i].co.x + 3.0);
            assert_eq!(key.blocks()[0].data[i], me.verts[i].co);
        }

        let mut mv = mverts(&bm);
        bm_to_mesh_shape(&mut bm, &mut key, &mut mv, true);
        assert_relative_eq!(mv[0].co.x, me.verts[0].co.x + 3.0);
    }

    #[test]
    fn test_unknown_layer_creates_block() {
        let me = keyed_cube();
        let mut bm = edit(&me, 0);
        let h = bm.vdata.add_layer_named(LayerType::ShapeKey, "Imported");
        bm.vdata.set_layer_uid(h, 77);

        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        assert_eq!(report.created, vec![77]);
        assert_eq!(key.len(), 3);
        assert_eq!(key.blocks()[2].name, "Imported");
        assert_eq!(report.source_of(77), Some(ShapeSource::Found));
    }

    #[test]
    fn test_missing_layer_falls_back() {
        let me = keyed_cube();
        let mut bm = edit(&me, 0);
        let k1_layer = bm.vdata.layer_index_n(LayerType::ShapeKey, 1).unwrap();
        bm.vdata.remove_layer(k1_layer);

        let mut key = me.key.clone().unwrap();
        let k1_uid = key.blocks()[1].uid();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        assert_eq!(report.source_of(k1_uid), Some(ShapeSource::FallbackOriginal));
        assert_eq!(key.blocks()[1].data, me.key.as_ref().unwrap().blocks()[1].data);

        // Without the original-index layer only live positions are left.
        let mut bm = edit(&me, 0);
        let k1_layer = bm.vdata.layer_index_n(LayerType::ShapeKey, 1).unwrap();
        bm.vdata.remove_layer(k1_layer);
        bm.vdata.remove_layer_type(LayerType::ShapeKeyIndex);
        let mut key = me.key.clone().unwrap();
        let mut mv = mverts(&bm);
        let report = bm_to_mesh_shape(&mut bm, &mut key, &mut mv, false);
        assert_eq!(report.source_of(k1_uid), Some(ShapeSource::FallbackLive));
        assert_eq!(key.blocks()[1].data, me.verts.iter().map(|v| v.co).collect::<Vec<_>>());
    }
}
