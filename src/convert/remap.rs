//! Patching objects that reference mesh vertices by index.

use crate::bmesh::{BMesh, VertId};
use crate::customdata::{LayerType, ORIGINDEX_NONE};
use crate::mesh::MeshId;
use crate::object::Document;

/// Map from pre-edit vertex index to the graph vertex built from it.
///
/// Uses the original-index layer when the graph has one; the first vertex
/// claiming an index wins. Without the layer, the first `ototvert` graph
/// vertices are assumed to be the pre-edit ones, in order.
pub fn vertex_map(bm: &BMesh, ototvert: usize) -> Vec<Option<VertId>> {
    let mut map = vec![None; ototvert];
    match bm.vdata.layer_index(LayerType::ShapeKeyIndex) {
        Some(keyindex) => {
            for v in bm.vert_ids() {
                let keyi: i32 = bm
                    .vdata
                    .get(keyindex, bm.vert(v).row())
                    .unwrap_or(ORIGINDEX_NONE);
                let Ok(keyi) = usize::try_from(keyi) else {
                    continue;
                };
                match map.get_mut(keyi) {
                    Some(slot) if slot.is_none() => *slot = Some(v),
                    _ => {}
                }
            }
        }
        None => {
            for (slot, v) in map.iter_mut().zip(bm.vert_ids()) {
                *slot = Some(v);
            }
        }
    }
    map
}

/// Rewrite vertex indices stored in objects after `mesh` was rebuilt from
/// `bm`.
///
/// The graph's vertex index annotations must hold the new persistent
/// indices. `ototvert` is the vertex count before the rebuild.
///
/// - Vertex-parented objects whose parent uses `mesh` get their parent
///   indices remapped. Indices of deleted vertices are left as they are.
/// - Hook modifiers on objects using `mesh` get their index lists
///   remapped. Indices of deleted vertices are dropped; indices that were
///   already out of range are kept.
///
/// Returns the number of objects that were changed.
pub fn patch_object_references(
    bm: &BMesh,
    mesh: MeshId,
    ototvert: usize,
    doc: &mut Document,
) -> usize {
    let mut vmap: Option<Vec<Option<VertId>>> = None;
    let mut changed = 0;

    let parent_uses_mesh: Vec<bool> = doc
        .objects
        .iter()
        .map(|ob| {
            ob.parent
                .and_then(|p| doc.objects.get(p))
                .is_some_and(|parent| parent.data == Some(mesh))
        })
        .collect();

    for (ob, parent_uses_mesh) in doc.objects.iter_mut().zip(parent_uses_mesh) {
        let mut touched = false;

        if parent_uses_mesh && ob.parent_type.uses_vertices() {
            let map = vmap.get_or_insert_with(|| vertex_map(bm, ototvert));
            for par in &mut ob.par {
                if let Some(Some(v)) = map.get(*par) {
                    let index = bm.vert(*v).index();
                    touched |= *par != index;
                    *par = index;
                }
            }
        }

        if ob.data == Some(mesh) {
            for hook in ob.hooks_mut() {
                let map = vmap.get_or_insert_with(|| vertex_map(bm, ototvert));
                let indexar: Vec<usize> = hook
                    .indexar
                    .iter()
                    .filter_map(|&i| match map.get(i) {
                        Some(v) => v.map(|v| bm.vert(v).index()),
                        None => Some(i),
                    })
                    .collect();
                touched |= indexar != hook.indexar;
                hook.indexar = indexar;
            }
        }

        if touched {
            changed += 1;
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use nalgebra::Point3;

    use super::*;
    use crate::bmesh::ElemType;
    use crate::mesh::Mesh;
    use crate::object::{HookModifier, Modifier, Object};

    fn line(n: usize, keyindex: Option<&[i32]>) -> BMesh {
        let mut bm = BMesh::new();
        let h = keyindex.map(|_| bm.vdata.add_layer(LayerType::ShapeKeyIndex));
        for i in 0..n {
            let v = bm.create_vert(Point3::new(i as f32, 0.0, 0.0));
            if let (Some(h), Some(ki)) = (h, keyindex) {
                let row = bm.vert(v).row();
                bm.vdata.set(h, row, ki[i]);
            }
        }
        bm.elem_index_ensure(ElemType::VERT);
        bm
    }

    #[test]
    fn test_vertex_map_by_original_index() {
        let bm = line(4, Some(&[2, ORIGINDEX_NONE, 0, 2]));
        let ids: Vec<VertId> = bm.vert_ids().collect();
        let map = vertex_map(&bm, 3);
        assert_eq!(map, vec![Some(ids[2]), None, Some(ids[0])]);
    }

    #[test]
    fn test_vertex_map_without_layer() {
        let bm = line(2, None);
        let ids: Vec<VertId> = bm.vert_ids().collect();
        assert_eq!(vertex_map(&bm, 3), vec![Some(ids[0]), Some(ids[1]), None]);
    }

    #[test]
    fn test_patch_hooks_and_parents() {
        let mesh = Mesh::new("m");
        let mut doc = Document::new();
        let owner = doc.add_object(
            Object::with_mesh("owner", &mesh).with_modifier(Modifier::Hook(HookModifier::new(
                "Hook",
                vec![0, 1, 2, 9],
            ))),
        );
        let child = doc.add_object(Object::new("child").with_vertex_parent(owner, &[2, 1, 0]));
        let bystander = doc.add_object(Object::new("bystander").with_vertex_parent(99, &[0]));

        // Old vertex 1 was deleted; 0 and 2 swapped places.
        let bm = line(2, Some(&[2, 0]));
        let changed = patch_object_references(&bm, mesh.id(), 3, &mut doc);

        assert_eq!(changed, 2);
        let hooks: Vec<_> = doc.objects[owner].hooks().collect();
        assert_eq!(hooks[0].indexar, vec![1, 0, 9]);
        assert_eq!(doc.objects[child].par, [0, 1, 1]);
        assert_eq!(doc.objects[bystander].par, [0, 0, 0]);
    }
}
