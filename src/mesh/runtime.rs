//! Derived data attached to a persistent mesh.
//!
//! The conversion functions assume exclusive ownership of the mesh; callers
//! must make sure no reader is traversing these caches while a conversion
//! rebuilds the arrays.

use nalgebra::{Point3, Vector3};

use super::types::Mesh;

/// Caches and bookkeeping that are not part of the stored mesh.
#[derive(Debug, Clone, Default)]
pub struct MeshRuntime {
    vert_normals: Option<Vec<Vector3<f32>>>,
    topology_generation: u64,
    /// Set for meshes produced from an evaluated graph, whose topology
    /// matches the original and only positions may differ.
    pub deformed_only: bool,
}

impl MeshRuntime {
    /// Counter incremented each time the mesh's arrays are rebuilt.
    ///
    /// Caches keyed on corner indices (e.g. subdivision displacement) compare
    /// this against the value they were built for.
    #[inline]
    pub fn topology_generation(&self) -> u64 {
        self.topology_generation
    }

    /// Cached vertex normals, if computed.
    #[inline]
    pub fn vert_normals(&self) -> Option<&[Vector3<f32>]> {
        self.vert_normals.as_deref()
    }
}

/// Newell normal of a polygon, normalized. Degenerate polygons give zero.
pub(crate) fn polygon_normal(points: impl IntoIterator<Item = Point3<f32>>) -> Vector3<f32> {
    let points: Vec<Point3<f32>> = points.into_iter().collect();
    let mut n = Vector3::zeros();
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    n.try_normalize(f32::EPSILON).unwrap_or_else(Vector3::zeros)
}

impl Mesh {
    /// Compute area-weighted vertex normals without touching the cache.
    pub fn calc_vertex_normals(&self) -> Vec<Vector3<f32>> {
        let mut normals = vec![Vector3::zeros(); self.verts.len()];
        for (pi, poly) in self.polys.iter().enumerate() {
            match poly.loop_range() {
                Some(range) if poly.totloop >= 3 && range.end <= self.loops.len() => {}
                _ => continue,
            }
            let n = polygon_normal(self.poly_verts(pi).map(|v| self.verts[v].co));
            for l in self.poly_loops(pi) {
                normals[l.v] += n;
            }
        }
        for (n, v) in normals.iter_mut().zip(&self.verts) {
            // Loose vertices point away from the origin.
            *n = n
                .try_normalize(f32::EPSILON)
                .or_else(|| v.co.coords.try_normalize(f32::EPSILON))
                .unwrap_or_else(Vector3::zeros);
        }
        normals
    }

    /// Vertex normals, computed and cached on first use.
    pub fn vertex_normals_ensure(&mut self) -> &[Vector3<f32>] {
        if self.runtime.vert_normals.is_none() {
            self.runtime.vert_normals = Some(self.calc_vertex_normals());
        }
        self.runtime.vert_normals.as_deref().unwrap_or_default()
    }

    /// Drop cached normals, e.g. after the vertex count changed.
    pub fn clear_derived_normals(&mut self) {
        self.runtime.vert_normals = None;
    }

    /// Notify caches keyed on element indices that the topology was rebuilt.
    pub fn tag_topology_changed(&mut self) {
        self.runtime.topology_generation += 1;
        self.runtime.vert_normals = None;
    }
}
