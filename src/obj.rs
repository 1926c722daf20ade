use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

/// Interleaved vertex exactly as the GPU buffers expect it.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
}

impl Vertex {
    fn new(position: Vec3, normal: Vec3) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
        }
    }
}

/// Triangle mesh produced from a Wavefront OBJ source.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Mesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
}

impl Mesh {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Reads and parses an OBJ file from disk.
pub fn load_obj(path: &Path) -> Result<Mesh> {
    let data = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read mesh file {}", path.display()))?;
    parse_obj(&data).with_context(|| format!("failed to parse mesh file {}", path.display()))
}

/// Parses OBJ text. Supports `v`, `vn` and polygonal `f` records; faces are
/// fan-triangulated and vertices deduplicated per position/normal pair.
pub fn parse_obj(data: &str) -> Result<Mesh> {
    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut corners: Vec<[Corner; 3]> = Vec::new();

    for (line_no, line) in data.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let mut parts = trimmed.split_whitespace();
        let Some(tag) = parts.next() else {
            continue;
        };
        match tag {
            "v" => positions.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid vertex on line {}", line_no + 1))?,
            ),
            "vn" => normals.push(
                parse_vec3(parts)
                    .with_context(|| format!("invalid normal on line {}", line_no + 1))?,
            ),
            "f" => {
                let polygon = parse_face(parts)
                    .with_context(|| format!("invalid face on line {}", line_no + 1))?;
                for i in 1..polygon.len() - 1 {
                    corners.push([polygon[0], polygon[i], polygon[i + 1]]);
                }
            }
            _ => {}
        }
    }

    if positions.is_empty() {
        return Err(anyhow!("OBJ source does not define any vertices"));
    }

    let mut mesh = assemble(&positions, &normals, &corners)?;
    if mesh.vertices.iter().any(|v| v.normal == [0.0; 3]) {
        reconstruct_normals(&mut mesh);
    }
    Ok(mesh)
}

fn parse_vec3<'a>(mut parts: impl Iterator<Item = &'a str>) -> Result<Vec3> {
    let mut component = || -> Result<f32> {
        Ok(parts
            .next()
            .ok_or_else(|| anyhow!("missing vector component"))?
            .parse::<f32>()?)
    };
    Ok(Vec3::new(component()?, component()?, component()?))
}

/// One `f` record entry: raw OBJ indices, which may be negative (relative).
#[derive(Debug, Clone, Copy)]
struct Corner {
    position: i32,
    normal: i32,
}

fn parse_face<'a>(parts: impl Iterator<Item = &'a str>) -> Result<Vec<Corner>> {
    let mut polygon = Vec::new();
    for part in parts {
        let mut segments = part.split('/');
        let position = segments
            .next()
            .ok_or_else(|| anyhow!("missing vertex index"))?
            .parse::<i32>()?;
        // Texture coordinates are skipped; the shading model has no UVs.
        let _ = segments.next();
        let normal = match segments.next() {
            Some("") | None => 0,
            Some(index) => index.parse::<i32>()?,
        };
        polygon.push(Corner { position, normal });
    }
    if polygon.len() < 3 {
        return Err(anyhow!("faces must reference at least 3 vertices"));
    }
    Ok(polygon)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct VertexKey {
    position: usize,
    normal: Option<usize>,
}

fn assemble(positions: &[Vec3], normals: &[Vec3], corners: &[[Corner; 3]]) -> Result<Mesh> {
    let mut lookup: HashMap<VertexKey, u32> = HashMap::new();
    let mut mesh = Mesh::default();

    for triangle in corners {
        for corner in triangle {
            let position = resolve_index(corner.position, positions.len())
                .ok_or_else(|| anyhow!("vertex index {} out of range", corner.position))?;
            let normal = resolve_index(corner.normal, normals.len());
            let key = VertexKey { position, normal };
            let next = mesh.vertices.len() as u32;
            let entry = lookup.entry(key).or_insert_with(|| {
                mesh.vertices.push(Vertex::new(
                    positions[position],
                    normal.map(|i| normals[i]).unwrap_or(Vec3::ZERO),
                ));
                next
            });
            mesh.indices.push(*entry);
        }
    }

    Ok(mesh)
}

/// Maps a one-based, possibly negative OBJ index to a zero-based offset.
fn resolve_index(index: i32, len: usize) -> Option<usize> {
    if index > 0 {
        let zero_based = index as usize - 1;
        (zero_based < len).then_some(zero_based)
    } else if index < 0 {
        let back = (-index) as usize;
        (back <= len).then_some(len - back)
    } else {
        None
    }
}

/// Area-weighted face normals accumulated onto vertices with none of their own.
fn reconstruct_normals(mesh: &mut Mesh) {
    let mut accum = vec![Vec3::ZERO; mesh.vertices.len()];

    for triangle in mesh.indices.chunks_exact(3) {
        let [i0, i1, i2] = [triangle[0] as usize, triangle[1] as usize, triangle[2] as usize];
        let p0 = Vec3::from_array(mesh.vertices[i0].position);
        let p1 = Vec3::from_array(mesh.vertices[i1].position);
        let p2 = Vec3::from_array(mesh.vertices[i2].position);
        let face = (p1 - p0).cross(p2 - p0);
        if face.length_squared() > f32::EPSILON {
            accum[i0] += face;
            accum[i1] += face;
            accum[i2] += face;
        }
    }

    for (vertex, normal) in mesh.vertices.iter_mut().zip(accum) {
        if vertex.normal == [0.0; 3] {
            vertex.normal = normal.normalize_or_zero().to_array();
        }
    }
}

/// Unit cube centered on the origin, used when a scene object names no mesh.
pub fn builtin_cube() -> Mesh {
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Y, Vec3::NEG_Z),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::NEG_Z, Vec3::X),
        (Vec3::Z, Vec3::Y, Vec3::NEG_X),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut mesh = Mesh::default();
    for (normal, up, right) in faces {
        let base = mesh.vertices.len() as u32;
        let center = normal * 0.5;
        // Counterclockwise seen from outside: cross(up, right) equals the normal.
        for (u, r) in [(-0.5, -0.5), (0.5, -0.5), (0.5, 0.5), (-0.5, 0.5)] {
            mesh.vertices
                .push(Vertex::new(center + up * u + right * r, normal));
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_triangle() {
        let obj = "\nv 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
        assert_eq!(mesh.vertices.len(), 3);
        assert_eq!(mesh.triangle_count(), 1);
    }

    #[test]
    fn quads_are_fan_triangulated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nf 1 2 3 4\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        assert_eq!(mesh.vertices.len(), 4);
    }

    #[test]
    fn negative_indices_count_from_the_end() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }

    #[test]
    fn explicit_normals_are_kept() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 0 -1\nvn 0 1 0\nf 1//1 2//1 3//1\n";
        let mesh = parse_obj(obj).unwrap();
        for vertex in &mesh.vertices {
            assert_eq!(vertex.normal, [0.0, 1.0, 0.0]);
        }
    }

    #[test]
    fn missing_normals_are_reconstructed_as_unit_vectors() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = parse_obj(obj).unwrap();
        for vertex in &mesh.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal.length() - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn shared_corners_are_deduplicated() {
        let obj = "v 0 0 0\nv 1 0 0\nv 1 1 0\nv 0 1 0\nvn 0 0 1\n\
                   f 1//1 2//1 3//1\nf 1//1 3//1 4//1\n";
        let mesh = parse_obj(obj).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices.len(), 6);
    }

    #[test]
    fn rejects_out_of_range_face_index() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 9\n";
        assert!(parse_obj(obj).is_err());
    }

    #[test]
    fn rejects_empty_source() {
        assert!(parse_obj("# nothing here\n").is_err());
    }

    #[test]
    fn builtin_cube_is_watertight_box() {
        let cube = builtin_cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.triangle_count(), 12);
        for vertex in &cube.vertices {
            let normal = Vec3::from_array(vertex.normal);
            assert!((normal.length() - 1.0).abs() < 1e-6);
            // Position projected on its face normal sits on the cube surface.
            let along = Vec3::from_array(vertex.position).dot(normal);
            assert!((along - 0.5).abs() < 1e-6);
        }
    }

    #[test]
    fn builtin_cube_faces_wind_outward() {
        let cube = builtin_cube();
        for triangle in cube.indices.chunks_exact(3) {
            let p0 = Vec3::from_array(cube.vertices[triangle[0] as usize].position);
            let p1 = Vec3::from_array(cube.vertices[triangle[1] as usize].position);
            let p2 = Vec3::from_array(cube.vertices[triangle[2] as usize].position);
            let face = (p1 - p0).cross(p2 - p0);
            let stored = Vec3::from_array(cube.vertices[triangle[0] as usize].normal);
            assert!(face.dot(stored) > 0.0);
        }
    }
}
