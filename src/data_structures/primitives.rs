//! Tessellation of the built-in primitive geometries.
//!
//! All generators produce counter-clockwise front faces centred on the origin, with
//! texture coordinates whose v axis points down (wgpu convention).

use std::f32::consts::PI;

use cgmath::InnerSpace;

use crate::data_structures::model::{MeshData, ModelVertex};

/// Axis-aligned box with one quad per face so every face gets its own normal.
pub fn cuboid(width: f32, height: f32, depth: f32) -> MeshData {
    let half = [width / 2.0, height / 2.0, depth / 2.0];
    // (normal, u axis, v axis) with u x v == normal
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
    ];
    let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv) in corners {
            let position = [0, 1, 2].map(|i| (normal[i] + u[i] * su + v[i] * sv) * half[i]);
            vertices.push(ModelVertex {
                position,
                tex_coords: [(su + 1.0) / 2.0, (1.0 - sv) / 2.0],
                normal,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    MeshData {
        name: "box".to_string(),
        vertices,
        indices,
        material: 0,
    }
}

/// UV sphere; the poles sit on the y axis.
pub fn sphere(radius: f32, width_segments: u32, height_segments: u32) -> MeshData {
    let width_segments = width_segments.max(3);
    let height_segments = height_segments.max(2);
    let mut vertices = Vec::new();
    let mut grid = Vec::with_capacity(height_segments as usize + 1);

    for iy in 0..=height_segments {
        let v = iy as f32 / height_segments as f32;
        let mut row = Vec::with_capacity(width_segments as usize + 1);
        for ix in 0..=width_segments {
            let u = ix as f32 / width_segments as f32;
            let position = [
                -radius * (u * 2.0 * PI).cos() * (v * PI).sin(),
                radius * (v * PI).cos(),
                radius * (u * 2.0 * PI).sin() * (v * PI).sin(),
            ];
            let normal = cgmath::Vector3::from(position).normalize();
            row.push(vertices.len() as u32);
            vertices.push(ModelVertex {
                position,
                tex_coords: [u, v],
                normal: normal.into(),
            });
        }
        grid.push(row);
    }

    let mut indices = Vec::new();
    for iy in 0..height_segments as usize {
        for ix in 0..width_segments as usize {
            let a = grid[iy][ix + 1];
            let b = grid[iy][ix];
            let c = grid[iy + 1][ix];
            let d = grid[iy + 1][ix + 1];
            // the pole rows collapse to single triangles
            if iy != 0 {
                indices.extend_from_slice(&[a, b, d]);
            }
            if iy != height_segments as usize - 1 {
                indices.extend_from_slice(&[b, c, d]);
            }
        }
    }

    MeshData {
        name: "sphere".to_string(),
        vertices,
        indices,
        material: 0,
    }
}

/// Upright cylinder (or cone) along the y axis with capped ends.
pub fn cylinder(radius_top: f32, radius_bottom: f32, height: f32, radial_segments: u32) -> MeshData {
    let radial_segments = radial_segments.max(3);
    let half_height = height / 2.0;
    let slope = (radius_bottom - radius_top) / height;
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    // torso, two rings
    let mut rings = Vec::with_capacity(2);
    for y in 0..=1u32 {
        let v = y as f32;
        let radius = v * (radius_bottom - radius_top) + radius_top;
        let mut ring = Vec::with_capacity(radial_segments as usize + 1);
        for x in 0..=radial_segments {
            let u = x as f32 / radial_segments as f32;
            let theta = u * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            ring.push(vertices.len() as u32);
            vertices.push(ModelVertex {
                position: [radius * sin, -v * height + half_height, radius * cos],
                tex_coords: [u, v],
                normal: cgmath::Vector3::new(sin, slope, cos).normalize().into(),
            });
        }
        rings.push(ring);
    }
    for x in 0..radial_segments as usize {
        let a = rings[0][x];
        let b = rings[1][x];
        let c = rings[1][x + 1];
        let d = rings[0][x + 1];
        indices.extend_from_slice(&[a, b, d, b, c, d]);
    }

    for top in [true, false] {
        let radius = if top { radius_top } else { radius_bottom };
        if radius <= 0.0 {
            continue;
        }
        let sign = if top { 1.0 } else { -1.0 };
        let y = half_height * sign;
        let normal = [0.0, sign, 0.0];

        let center_start = vertices.len() as u32;
        for _ in 0..radial_segments {
            vertices.push(ModelVertex {
                position: [0.0, y, 0.0],
                tex_coords: [0.5, 0.5],
                normal,
            });
        }
        let ring_start = vertices.len() as u32;
        for x in 0..=radial_segments {
            let theta = x as f32 / radial_segments as f32 * 2.0 * PI;
            let (sin, cos) = theta.sin_cos();
            vertices.push(ModelVertex {
                position: [radius * sin, y, radius * cos],
                tex_coords: [cos * 0.5 + 0.5, 0.5 - sin * 0.5 * sign],
                normal,
            });
        }
        for x in 0..radial_segments {
            let c = center_start + x;
            let i = ring_start + x;
            if top {
                indices.extend_from_slice(&[i, i + 1, c]);
            } else {
                indices.extend_from_slice(&[i + 1, i, c]);
            }
        }
    }

    MeshData {
        name: "cylinder".to_string(),
        vertices,
        indices,
        material: 0,
    }
}

/// Single quad in the XY plane facing +Z.
pub fn plane(width: f32, height: f32) -> MeshData {
    let (hw, hh) = (width / 2.0, height / 2.0);
    let mut vertices = Vec::with_capacity(4);
    for iy in 0..=1 {
        for ix in 0..=1 {
            vertices.push(ModelVertex {
                position: [ix as f32 * width - hw, hh - iy as f32 * height, 0.0],
                tex_coords: [ix as f32, iy as f32],
                normal: [0.0, 0.0, 1.0],
            });
        }
    }
    // a: top left, d: top right, b: bottom left, c: bottom right
    let (a, d, b, c) = (0, 1, 2, 3);

    MeshData {
        name: "plane".to_string(),
        vertices,
        indices: vec![a, b, d, b, c, d],
        material: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector3;

    fn front_face_normals_agree(mesh: &MeshData) {
        for tri in mesh.indices.chunks(3) {
            let [p0, p1, p2] = [tri[0], tri[1], tri[2]]
                .map(|i| Vector3::from(mesh.vertices[i as usize].position));
            let face = (p1 - p0).cross(p2 - p0);
            if face.magnitude2() < 1e-10 {
                continue;
            }
            let n = Vector3::from(mesh.vertices[tri[0] as usize].normal);
            assert!(face.dot(n) > 0.0, "triangle {tri:?} winds against its normal");
        }
    }

    #[test]
    fn cuboid_spans_its_dimensions() {
        let mesh = cuboid(5.0, 3.0, 15.0);
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.triangle_count(), 12);
        let max_z = mesh
            .vertices
            .iter()
            .map(|v| v.position[2])
            .fold(f32::MIN, f32::max);
        assert_eq!(max_z, 7.5);
        front_face_normals_agree(&mesh);
    }

    #[test]
    fn sphere_vertices_lie_on_radius() {
        let mesh = sphere(1.0, 16, 8);
        for v in &mesh.vertices {
            assert!((Vector3::from(v.position).magnitude() - 1.0).abs() < 1e-5);
        }
        front_face_normals_agree(&mesh);
    }

    #[test]
    fn cylinder_is_closed_and_outward_facing() {
        let mesh = cylinder(1.0, 1.0, 5.0, 12);
        let ys: Vec<f32> = mesh.vertices.iter().map(|v| v.position[1]).collect();
        assert!(ys.iter().all(|y| (y.abs() - 2.5).abs() < 1e-5));
        // torso plus both caps
        assert_eq!(mesh.triangle_count(), 12 * 2 + 12 * 2);
        front_face_normals_agree(&mesh);
    }

    #[test]
    fn plane_faces_positive_z() {
        let mesh = plane(10.0, 4.0);
        assert_eq!(mesh.triangle_count(), 2);
        front_face_normals_agree(&mesh);
    }
}
