use cgmath::{EuclideanSpace, InnerSpace, Matrix4, Point3, Vector3};
use wgpu::util::DeviceExt;

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    data_structures::{scene_graph::SceneGraph, texture::Texture},
    lighting::LightSet,
};

/// All three lights packed for the shaders. Every field is a vec4 so the layout needs
/// no explicit padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct LightUniform {
    ambient: [f32; 4],
    sky: [f32; 4],
    ground: [f32; 4],
    /// Unit vector pointing towards the directional light.
    sun_direction: [f32; 4],
    sun_color: [f32; 4],
    /// x: shadows on, y: depth bias, z: texel size of the shadow map
    shadow: [f32; 4],
    view_proj: [[f32; 4]; 4],
}

fn scaled(color: [f32; 3], intensity: f32) -> [f32; 4] {
    [color[0] * intensity, color[1] * intensity, color[2] * intensity, 1.0]
}

impl LightUniform {
    pub fn new(lights: &LightSet, graph: &SceneGraph) -> Self {
        let directional = &lights.directional;
        let target = graph
            .node(directional.target)
            .map(|node| Point3::from_vec(node.transform.position))
            .unwrap_or_else(|| Point3::new(0.0, 0.0, 0.0));
        let eye = directional.position;
        let towards_light = {
            let d = eye - target;
            if d.magnitude2() > 0.0 {
                d.normalize()
            } else {
                Vector3::unit_y()
            }
        };
        // look_at degenerates when looking straight down the up vector
        let up = if towards_light.y.abs() > 0.99 {
            Vector3::unit_z()
        } else {
            Vector3::unit_y()
        };
        let shadow = &directional.shadow;
        let e = shadow.half_extent;
        let view_proj = OPENGL_TO_WGPU_MATRIX
            * cgmath::ortho(-e, e, -e, e, shadow.near, shadow.far)
            * Matrix4::look_at_rh(eye, target, up);

        Self {
            ambient: scaled(lights.ambient.color, lights.ambient.intensity),
            sky: scaled(lights.hemisphere.sky_color, lights.hemisphere.intensity),
            ground: scaled(lights.hemisphere.ground_color, lights.hemisphere.intensity),
            sun_direction: [towards_light.x, towards_light.y, towards_light.z, 0.0],
            sun_color: scaled(directional.color, directional.intensity),
            shadow: [
                if directional.cast_shadow { 1.0 } else { 0.0 },
                shadow.bias,
                1.0 / shadow.map_size.max(1) as f32,
                0.0,
            ],
            view_proj: view_proj.into(),
        }
    }

    pub fn casts_shadow(&self) -> bool {
        self.shadow[0] > 0.0
    }
}

/// Light uniform and shadow map, with the two bind groups that use them: the shadow
/// pass reads only the uniform, the lit pass also samples the map.
#[derive(Debug)]
pub struct LightResources {
    pub uniform: LightUniform,
    pub buffer: wgpu::Buffer,
    pub shadow_map: Texture,
    pub bind_group_layout: wgpu::BindGroupLayout,
    pub bind_group: wgpu::BindGroup,
    pub shadow_bind_group_layout: wgpu::BindGroupLayout,
    pub shadow_bind_group: wgpu::BindGroup,
}

impl LightResources {
    pub fn new(device: &wgpu::Device, lights: &LightSet, graph: &SceneGraph) -> Self {
        let uniform = LightUniform::new(lights, graph);
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Light Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let size = lights.directional.shadow.map_size;
        let shadow_map = Texture::create_depth_texture(device, [size, size], "shadow_map");

        let bind_group_layout = mk_bind_group_layout(device);
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&shadow_map.view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&shadow_map.sampler),
                },
            ],
            label: Some("light_bind_group"),
        });

        let shadow_bind_group_layout = mk_shadow_bind_group_layout(device);
        let shadow_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &shadow_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("shadow_bind_group"),
        });

        Self {
            uniform,
            buffer,
            shadow_map,
            bind_group_layout,
            bind_group,
            shadow_bind_group_layout,
            shadow_bind_group,
        }
    }

    /// Uploads the current light values; the debug panel may have changed them.
    pub fn update(&mut self, queue: &wgpu::Queue, lights: &LightSet, graph: &SceneGraph) {
        self.uniform = LightUniform::new(lights, graph);
        queue.write_buffer(&self.buffer, 0, bytemuck::cast_slice(&[self.uniform]));
    }
}

pub fn mk_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[
            wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 1,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    multisampled: false,
                    view_dimension: wgpu::TextureViewDimension::D2,
                    sample_type: wgpu::TextureSampleType::Depth,
                },
                count: None,
            },
            wgpu::BindGroupLayoutEntry {
                binding: 2,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                count: None,
            },
        ],
        label: Some("light_bind_group_layout"),
    })
}

pub fn mk_shadow_bind_group_layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
        label: Some("shadow_bind_group_layout"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lighting::init_lights;

    #[test]
    fn sun_direction_points_from_target_to_light() {
        let mut graph = SceneGraph::new();
        let lights = init_lights(&mut graph);
        let uniform = LightUniform::new(&lights, &graph);
        let expected = (lights.directional.position - Point3::new(0.0, 0.0, 0.0)).normalize();
        let d = uniform.sun_direction;
        assert!((Vector3::new(d[0], d[1], d[2]) - expected).magnitude() < 1e-5);
        assert!(uniform.casts_shadow());
    }
}
