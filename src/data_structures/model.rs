//! CPU-side geometry, material and image resources held by the scene graph.
//!
//! Nothing in here touches the GPU. The renderer turns these into buffers, bind
//! groups and textures the first time a node referencing them is drawn.

use anyhow::ensure;

use crate::data_structures::primitives;

pub trait Vertex {
    fn desc() -> wgpu::VertexBufferLayout<'static>;
}

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct ModelVertex {
    pub position: [f32; 3],
    pub tex_coords: [f32; 2],
    pub normal: [f32; 3],
}

impl Vertex for ModelVertex {
    fn desc() -> wgpu::VertexBufferLayout<'static> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<ModelVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x2,
                },
                wgpu::VertexAttribute {
                    offset: mem::size_of::<[f32; 5]>() as wgpu::BufferAddress,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x3,
                },
            ],
        }
    }
}

/// Triangle list ready for upload. `material` indexes into the owning model's
/// material list and is ignored for primitives.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<ModelVertex>,
    pub indices: Vec<u32>,
    pub material: usize,
}

impl MeshData {
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// The geometry kinds a scene node can reference.
#[derive(Clone, Debug, PartialEq)]
pub enum Geometry {
    Box {
        width: f32,
        height: f32,
        depth: f32,
    },
    Sphere {
        radius: f32,
        width_segments: u32,
        height_segments: u32,
    },
    Cylinder {
        radius_top: f32,
        radius_bottom: f32,
        height: f32,
        radial_segments: u32,
    },
    /// Lies in the XY plane facing +Z, rotate the node to lay it flat.
    Plane { width: f32, height: f32 },
    /// Meshes decoded from an OBJ file, each with its own material index.
    Model(Vec<MeshData>),
}

impl Geometry {
    pub fn cuboid(width: f32, height: f32, depth: f32) -> Self {
        Geometry::Box {
            width,
            height,
            depth,
        }
    }

    pub fn sphere(radius: f32) -> Self {
        Geometry::Sphere {
            radius,
            width_segments: 32,
            height_segments: 16,
        }
    }

    pub fn cylinder(radius: f32, height: f32) -> Self {
        Geometry::Cylinder {
            radius_top: radius,
            radius_bottom: radius,
            height,
            radial_segments: 32,
        }
    }

    pub fn plane(width: f32, height: f32) -> Self {
        Geometry::Plane { width, height }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Geometry::Box { .. } => "box",
            Geometry::Sphere { .. } => "sphere",
            Geometry::Cylinder { .. } => "cylinder",
            Geometry::Plane { .. } => "plane",
            Geometry::Model(_) => "model",
        }
    }

    /// Rejects dimensions the mesh generators cannot turn into a sensible surface.
    pub fn validate(&self) -> anyhow::Result<()> {
        let dims: Vec<f32> = match self {
            Geometry::Box {
                width,
                height,
                depth,
            } => vec![*width, *height, *depth],
            Geometry::Sphere { radius, .. } => vec![*radius],
            Geometry::Cylinder {
                radius_top,
                radius_bottom,
                height,
                ..
            } => {
                // a cone may close at one end, but not at both
                ensure!(
                    radius_top.is_finite()
                        && radius_bottom.is_finite()
                        && *radius_top >= 0.0
                        && *radius_bottom >= 0.0
                        && (*radius_top > 0.0 || *radius_bottom > 0.0),
                    "cylinder radii must be finite, non-negative and not both zero, got {} / {}",
                    radius_top,
                    radius_bottom
                );
                vec![*height]
            }
            Geometry::Plane { width, height } => vec![*width, *height],
            Geometry::Model(meshes) => {
                ensure!(!meshes.is_empty(), "model geometry holds no meshes");
                vec![]
            }
        };
        for dim in dims {
            ensure!(
                dim.is_finite() && dim > 0.0,
                "{} dimension must be finite and positive, got {}",
                self.kind(),
                dim
            );
        }
        Ok(())
    }

    /// Tessellates the geometry. Models return their meshes unchanged.
    pub fn to_meshes(&self) -> Vec<MeshData> {
        match self {
            Geometry::Box {
                width,
                height,
                depth,
            } => vec![primitives::cuboid(*width, *height, *depth)],
            Geometry::Sphere {
                radius,
                width_segments,
                height_segments,
            } => vec![primitives::sphere(*radius, *width_segments, *height_segments)],
            Geometry::Cylinder {
                radius_top,
                radius_bottom,
                height,
                radial_segments,
            } => vec![primitives::cylinder(
                *radius_top,
                *radius_bottom,
                *height,
                *radial_segments,
            )],
            Geometry::Plane { width, height } => vec![primitives::plane(*width, *height)],
            Geometry::Model(meshes) => meshes.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    Clamp,
    Repeat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Filter {
    Nearest,
    Linear,
}

/// Sampling options attached to an image when it is requested.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextureOptions {
    pub wrap: Wrap,
    pub repeat: [f32; 2],
    pub mag_filter: Filter,
    /// Colour textures are sRGB, data textures are linear.
    pub srgb: bool,
}

impl TextureOptions {
    pub fn repeating(u: f32, v: f32) -> Self {
        Self {
            wrap: Wrap::Repeat,
            repeat: [u, v],
            ..Default::default()
        }
    }

    pub fn with_mag_filter(mut self, filter: Filter) -> Self {
        self.mag_filter = filter;
        self
    }
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            wrap: Wrap::Clamp,
            repeat: [1.0, 1.0],
            mag_filter: Filter::Linear,
            srgb: true,
        }
    }
}

/// A decoded RGBA8 image.
#[derive(Clone, Debug, PartialEq)]
pub struct TextureImage {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
    pub options: TextureOptions,
    /// Set when the image stands in for one that failed to load.
    pub placeholder: bool,
}

impl TextureImage {
    /// One magenta texel, loud enough to spot a missing asset on screen.
    pub fn placeholder(label: &str, options: TextureOptions) -> Self {
        Self {
            label: label.to_string(),
            width: 1,
            height: 1,
            rgba: vec![255, 0, 255, 255],
            options,
            placeholder: true,
        }
    }
}

/// Surface description shared by every node that references it.
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGB multiplier, also used alone when there is no texture.
    pub color: [f32; 3],
    pub emissive: [f32; 3],
    pub texture: Option<super::scene_graph::TextureId>,
    /// Disables back-face culling.
    pub double_sided: bool,
}

impl Material {
    pub fn colored(name: &str, color: [f32; 3]) -> Self {
        Self {
            name: name.to_string(),
            color,
            emissive: [0.0; 3],
            texture: None,
            double_sided: false,
        }
    }

    pub fn textured(name: &str, texture: super::scene_graph::TextureId) -> Self {
        Self {
            texture: Some(texture),
            ..Self::colored(name, [1.0; 3])
        }
    }

    pub fn with_emissive(mut self, emissive: [f32; 3]) -> Self {
        self.emissive = emissive;
        self
    }
}

/// Converts a `0xRRGGBB` literal into linear-ish float RGB.
pub fn hex_color(hex: u32) -> [f32; 3] {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn degenerate_dimensions_are_rejected() {
        assert!(Geometry::cuboid(5.0, 0.5, 5.0).validate().is_ok());
        assert!(Geometry::cuboid(5.0, 0.0, 5.0).validate().is_err());
        assert!(Geometry::sphere(f32::NAN).validate().is_err());
        assert!(Geometry::cylinder(1.0, -5.0).validate().is_err());
        assert!(Geometry::Model(vec![]).validate().is_err());
    }

    #[test]
    fn hex_colors_split_into_channels() {
        assert_eq!(hex_color(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_color(0x0000ff), [0.0, 0.0, 1.0]);
    }
}
