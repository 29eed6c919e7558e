//! Node transforms and their GPU representation.
//!
//! Every scene node carries one absolute [`Instance`]. The renderer packs it into an
//! [`InstanceRaw`] which the vertex shader reads as a per-instance attribute.

use cgmath::{Euler, One, Rad};

use crate::data_structures::model;

/// Absolute transform of a scene node: position, rotation (as quaternion) and scale.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Instance {
    pub position: cgmath::Vector3<f32>,
    pub rotation: cgmath::Quaternion<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl Instance {
    /// Identity transformation (no move, rotate, or scale).
    pub fn new() -> Self {
        Self {
            position: cgmath::Vector3::new(0.0, 0.0, 0.0),
            rotation: cgmath::Quaternion::one(),
            scale: cgmath::Vector3::new(1.0, 1.0, 1.0),
        }
    }

    pub fn with_scale(mut self, scale: impl Into<cgmath::Vector3<f32>>) -> Self {
        self.scale = scale.into();
        self
    }

    pub fn with_euler(mut self, x: f32, y: f32, z: f32) -> Self {
        self.set_euler(x, y, z);
        self
    }

    /// Replaces the rotation with an XYZ euler rotation given in radians.
    pub fn set_euler(&mut self, x: f32, y: f32, z: f32) {
        self.rotation = Euler::new(Rad(x), Rad(y), Rad(z)).into();
    }

    pub fn to_matrix(&self) -> cgmath::Matrix4<f32> {
        cgmath::Matrix4::from_translation(self.position)
            * cgmath::Matrix4::from(self.rotation)
            * cgmath::Matrix4::from_nonuniform_scale(self.scale.x, self.scale.y, self.scale.z)
    }

    /// Packs the transform for the vertex shader. `receive_shadow` tells the lit shader
    /// whether to sample the shadow map for this node.
    pub fn to_raw(&self, receive_shadow: bool) -> InstanceRaw {
        InstanceRaw {
            model: self.to_matrix().into(),
            normal: cgmath::Matrix3::from(self.rotation).into(),
            receive_shadow: if receive_shadow { 1.0 } else { 0.0 },
        }
    }
}

impl From<cgmath::Vector3<f32>> for Instance {
    fn from(position: cgmath::Vector3<f32>) -> Self {
        Instance {
            position,
            ..Default::default()
        }
    }
}

impl From<[f32; 3]> for Instance {
    fn from(position: [f32; 3]) -> Self {
        cgmath::Vector3::from(position).into()
    }
}

impl Default for Instance {
    fn default() -> Self {
        Self::new()
    }
}

/// The data actually stored in the per-node instance buffer.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct InstanceRaw {
    model: [[f32; 4]; 4],
    normal: [[f32; 3]; 3],
    receive_shadow: f32,
}

/**
 * A mat4 takes four vertex slots and a mat3 three, one per column. Locations 0-4 are
 * left to `ModelVertex`, the shadow flag follows the matrices.
 */
impl model::Vertex for InstanceRaw {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<InstanceRaw>() as wgpu::BufferAddress,
            // Advance once per instance instead of once per vertex
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 5,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 4]>() as wgpu::BufferAddress,
                    shader_location: 6,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 8]>() as wgpu::BufferAddress,
                    shader_location: 7,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 12]>() as wgpu::BufferAddress,
                    shader_location: 8,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 16]>() as wgpu::BufferAddress,
                    shader_location: 9,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 19]>() as wgpu::BufferAddress,
                    shader_location: 10,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 22]>() as wgpu::BufferAddress,
                    shader_location: 11,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 25]>() as wgpu::BufferAddress,
                    shader_location: 12,
                    format: wgpu::VertexFormat::Float32,
                },
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{InnerSpace, Transform, Vector3, Point3};

    #[test]
    fn identity_keeps_points() {
        let p = Instance::new().to_matrix().transform_point(Point3::new(1.0, 2.0, 3.0));
        assert_eq!(p, Point3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn scale_is_applied_before_translation() {
        let instance = Instance::from([10.0, 0.0, 0.0]).with_scale([2.0, 2.0, 2.0]);
        let p = instance.to_matrix().transform_point(Point3::new(1.0, 0.0, 0.0));
        assert!((p - Point3::new(12.0, 0.0, 0.0)).magnitude() < 1e-5);
    }

    #[test]
    fn quarter_turn_about_x_lays_y_onto_z() {
        let instance = Instance::new().with_euler(std::f32::consts::FRAC_PI_2, 0.0, 0.0);
        let v = instance.to_matrix().transform_vector(Vector3::unit_y());
        assert!((v - Vector3::unit_z()).magnitude() < 1e-5, "{v:?}");
    }
}
