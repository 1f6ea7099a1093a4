//! Structural validation of persistent meshes.

use super::types::Mesh;
use crate::error::{MeshError, Result};

impl Mesh {
    /// Check the mesh's structural invariants.
    ///
    /// Verifies that edges reference existing, distinct vertices, that every
    /// polygon's corner range is in bounds with at least three corners, that
    /// each corner's edge joins its vertex to the next corner's vertex, that
    /// attribute layers match their domain sizes and that shape key blocks
    /// cover every vertex.
    pub fn validate(&self) -> Result<()> {
        let totvert = self.verts.len();

        for (i, e) in self.edges.iter().enumerate() {
            if e.v1 >= totvert || e.v2 >= totvert {
                return Err(MeshError::InvalidEdge {
                    edge: i,
                    reason: "vertex index out of range",
                });
            }
            if e.v1 == e.v2 {
                return Err(MeshError::InvalidEdge {
                    edge: i,
                    reason: "both ends use the same vertex",
                });
            }
        }

        for (pi, poly) in self.polys.iter().enumerate() {
            let range = match poly.loop_range() {
                Some(range) if poly.totloop >= 3 && range.end <= self.loops.len() => range,
                _ => {
                    return Err(MeshError::InvalidLoopRange {
                        poly: pi,
                        start: poly.loopstart,
                        end: poly.loopstart.saturating_add(poly.totloop),
                    })
                }
            };
            let corners = &self.loops[range.clone()];
            for (i, l) in corners.iter().enumerate() {
                let corner = range.start + i;
                if l.v >= totvert {
                    return Err(MeshError::InvalidVertexIndex { face: pi, vertex: l.v });
                }
                let Some(edge) = self.edges.get(l.e) else {
                    return Err(MeshError::InvalidLoop {
                        corner,
                        reason: "edge index out of range",
                    });
                };
                let next = corners[(i + 1) % corners.len()].v;
                let joins = (edge.v1 == l.v && edge.v2 == next) || (edge.v2 == l.v && edge.v1 == next);
                if !joins {
                    return Err(MeshError::InvalidLoop {
                        corner,
                        reason: "edge does not join the corner to the next one",
                    });
                }
            }
        }

        let domains = [
            (&self.vdata, totvert),
            (&self.edata, self.edges.len()),
            (&self.pdata, self.polys.len()),
            (&self.ldata, self.loops.len()),
        ];
        for (data, expected) in domains {
            for layer in data.layers() {
                if layer.data().len() != expected {
                    return Err(MeshError::LayerLength {
                        layer: layer.ty(),
                        expected,
                        found: layer.data().len(),
                    });
                }
            }
        }

        if let Some(key) = &self.key {
            for block in key.blocks() {
                if block.data.len() != totvert {
                    return Err(MeshError::ShapeKeyLength {
                        name: block.name.clone(),
                        expected: totvert,
                        found: block.data.len(),
                    });
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::customdata::LayerType;
    use crate::mesh::builder::cube;
    use nalgebra::Point3;

    #[test]
    fn test_valid_cube() {
        assert_eq!(cube("Cube").validate(), Ok(()));
    }

    #[test]
    fn test_bad_edge() {
        let mut mesh = cube("Cube");
        mesh.edges[3].v2 = mesh.edges[3].v1;
        assert!(matches!(mesh.validate(), Err(MeshError::InvalidEdge { edge: 3, .. })));

        let mut mesh = cube("Cube");
        mesh.edges[0].v1 = 100;
        assert!(matches!(mesh.validate(), Err(MeshError::InvalidEdge { edge: 0, .. })));
    }

    #[test]
    fn test_bad_loop_range() {
        let mut mesh = cube("Cube");
        mesh.polys[5].totloop = 5;
        assert_eq!(
            mesh.validate(),
            Err(MeshError::InvalidLoopRange { poly: 5, start: 20, end: 25 })
        );
    }

    #[test]
    fn test_overflowing_loop_range() {
        let mut mesh = cube("Cube");
        mesh.polys[2].loopstart = usize::MAX;
        mesh.polys[2].totloop = 3;
        assert_eq!(
            mesh.validate(),
            Err(MeshError::InvalidLoopRange { poly: 2, start: usize::MAX, end: usize::MAX })
        );
    }

    #[test]
    fn test_corner_edge_mismatch() {
        let mut mesh = cube("Cube");
        mesh.loops.swap(0, 1);
        assert!(matches!(mesh.validate(), Err(MeshError::InvalidLoop { .. })));
    }

    #[test]
    fn test_layer_length() {
        let mut mesh = cube("Cube");
        mesh.vdata.add_layer(LayerType::PaintMask);
        mesh.vdata.resize(3);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::LayerLength { layer: LayerType::PaintMask, expected: 8, found: 3 })
        ));
    }

    #[test]
    fn test_shape_key_length() {
        let mut mesh = cube("Cube");
        mesh.add_shape_key("Basis");
        mesh.verts.push(crate::mesh::MeshVert::new(Point3::origin()));
        mesh.vdata.push_default();
        assert!(matches!(mesh.validate(), Err(MeshError::ShapeKeyLength { expected: 9, found: 8, .. })));
    }
}
