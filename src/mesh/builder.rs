//! Mesh construction utilities.
//!
//! Builds persistent meshes from face-vertex lists, sharing one edge between
//! every pair of faces that use it.

use std::collections::HashMap;

use nalgebra::Point3;

use super::types::{Mesh, MeshEdge, MeshLoop, MeshPoly, MeshVert};
use crate::error::{MeshError, Result};

/// Build a mesh from vertex positions and polygons of any size.
///
/// # Arguments
/// * `name` - Data-block name
/// * `vertices` - Vertex positions
/// * `faces` - Polygons, each a list of vertex indices in winding order
///
/// # Example
/// ```
/// use editmesh::mesh::build_from_polygons;
/// use nalgebra::Point3;
///
/// let vertices = vec![
///     Point3::new(0.0, 0.0, 0.0),
///     Point3::new(1.0, 0.0, 0.0),
///     Point3::new(1.0, 1.0, 0.0),
///     Point3::new(0.0, 1.0, 0.0),
///     Point3::new(0.5, 2.0, 0.0),
/// ];
/// let faces: Vec<Vec<usize>> = vec![vec![0, 1, 2, 3], vec![3, 2, 4]];
///
/// let mesh = build_from_polygons("house", &vertices, &faces).unwrap();
/// assert_eq!(mesh.num_polys(), 2);
/// assert_eq!(mesh.num_edges(), 6);
/// ```
pub fn build_from_polygons<F: AsRef<[usize]>>(
    name: &str,
    vertices: &[Point3<f32>],
    faces: &[F],
) -> Result<Mesh> {
    if faces.is_empty() {
        return Err(MeshError::EmptyMesh);
    }

    for (fi, face) in faces.iter().enumerate() {
        let face = face.as_ref();
        if face.len() < 3 {
            return Err(MeshError::TooFewCorners { len: face.len() });
        }
        for (i, &vi) in face.iter().enumerate() {
            if vi >= vertices.len() {
                return Err(MeshError::InvalidVertexIndex { face: fi, vertex: vi });
            }
            if face[..i].contains(&vi) {
                return Err(MeshError::DegenerateFace { vertex: vi });
            }
        }
    }

    let mut mesh = Mesh::new(name);
    mesh.verts = vertices.iter().map(|&co| MeshVert::new(co)).collect();

    // Undirected edge (min, max) to edge index
    let mut edge_map: HashMap<(usize, usize), usize> = HashMap::new();

    for face in faces {
        let face = face.as_ref();
        let loopstart = mesh.loops.len();
        for (i, &v) in face.iter().enumerate() {
            let next = face[(i + 1) % face.len()];
            let key = (v.min(next), v.max(next));
            let e = *edge_map.entry(key).or_insert_with(|| {
                mesh.edges.push(MeshEdge::new(v, next));
                mesh.edges.len() - 1
            });
            mesh.loops.push(MeshLoop { v, e });
        }
        mesh.polys.push(MeshPoly {
            loopstart,
            totloop: face.len(),
            ..Default::default()
        });
    }

    mesh.vdata.resize(mesh.verts.len());
    mesh.edata.resize(mesh.edges.len());
    mesh.pdata.resize(mesh.polys.len());
    mesh.ldata.resize(mesh.loops.len());

    Ok(mesh)
}

/// Build a mesh from vertices and triangle faces.
pub fn build_from_triangles(
    name: &str,
    vertices: &[Point3<f32>],
    faces: &[[usize; 3]],
) -> Result<Mesh> {
    build_from_polygons(name, vertices, faces)
}

/// Build a mesh from vertices and quad faces (counter-clockwise).
pub fn build_from_quads(
    name: &str,
    vertices: &[Point3<f32>],
    faces: &[[usize; 4]],
) -> Result<Mesh> {
    build_from_polygons(name, vertices, faces)
}

/// Convert a mesh back to a face-vertex representation.
///
/// Returns (vertices, faces) tuple.
pub fn to_polygons(mesh: &Mesh) -> (Vec<Point3<f32>>, Vec<Vec<usize>>) {
    let faces = (0..mesh.num_polys())
        .map(|p| mesh.poly_verts(p).collect())
        .collect();
    (mesh.positions(), faces)
}

/// An axis-aligned cube of edge length 2 centered at the origin, with
/// outward-facing quads.
pub fn cube(name: &str) -> Mesh {
    let vertices: Vec<Point3<f32>> = (0..8)
        .map(|i| {
            let x = if i & 1 == 0 { -1.0 } else { 1.0 };
            let y = if i & 2 == 0 { -1.0 } else { 1.0 };
            let z = if i & 4 == 0 { -1.0 } else { 1.0 };
            Point3::new(x, y, z)
        })
        .collect();
    let faces = [
        [0, 2, 3, 1], // -z
        [4, 5, 7, 6], // +z
        [0, 1, 5, 4], // -y
        [2, 6, 7, 3], // +y
        [0, 4, 6, 2], // -x
        [1, 3, 7, 5], // +x
    ];
    match build_from_quads(name, &vertices, &faces) {
        Ok(mesh) => mesh,
        Err(_) => unreachable!("cube faces are well formed"),
    }
}

/// A flat `n` x `n` grid of quads in the XY plane spanning [0, 1].
///
/// Returns an empty mesh for `n == 0`.
pub fn grid(name: &str, n: usize) -> Mesh {
    if n == 0 {
        return Mesh::new(name);
    }
    let step = 1.0 / n as f32;
    let row = n + 1;
    let vertices: Vec<Point3<f32>> = (0..row * row)
        .map(|i| Point3::new((i % row) as f32 * step, (i / row) as f32 * step, 0.0))
        .collect();
    let faces: Vec<[usize; 4]> = (0..n * n)
        .map(|i| {
            let (x, y) = (i % n, i / n);
            let v = y * row + x;
            [v, v + 1, v + row + 1, v + row]
        })
        .collect();
    match build_from_quads(name, &vertices, &faces) {
        Ok(mesh) => mesh,
        Err(_) => unreachable!("grid faces are well formed"),
    }
}
