//! The wgpu frame backend.
//!
//! [`GpuRenderer`] owns the [`Context`] and mirrors the scene graph on the GPU. Because
//! the graph is append-only, every cache here is a vector indexed by the graph's ids
//! and only ever extended: geometry, materials and images are uploaded the first
//! frame they exist, per-node instance data is rewritten every frame.
//!
//! A frame is three passes: the shadow map from the directional light, the scene
//! itself (panorama first, then lit meshes), and the debug panel.

use anyhow::Context as _;
use wgpu::util::DeviceExt;

use crate::{
    builder::SceneState,
    camera::CameraUniform,
    context::Context,
    controls::debug_panel,
    data_structures::{
        model::{Geometry, MeshData},
        scene_graph::{NodeKind, SceneGraph, TextureId},
        texture::Texture,
    },
    frame::{DisplaySurface, FrameRenderer},
    overlay::{DebugOverlay, PreparedOverlay},
    pipelines::{
        background,
        basic::{self, MaterialUniform},
        light::LightResources,
        shadow,
    },
};

struct GpuMesh {
    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    num_elements: u32,
    material: usize,
}

struct GpuMaterial {
    bind_group: wgpu::BindGroup,
    double_sided: bool,
}

struct CameraBinding {
    uniform: CameraUniform,
    buffer: wgpu::Buffer,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

impl CameraBinding {
    fn new(device: &wgpu::Device) -> Self {
        let uniform = CameraUniform::new();
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
            label: Some("camera_bind_group_layout"),
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
            label: Some("camera_bind_group"),
        });
        Self {
            uniform,
            buffer,
            bind_group_layout,
            bind_group,
        }
    }
}

pub struct GpuRenderer {
    ctx: Context,
    camera: CameraBinding,
    lights: LightResources,
    material_layout: wgpu::BindGroupLayout,
    background_layout: wgpu::BindGroupLayout,
    single_sided_pipeline: wgpu::RenderPipeline,
    double_sided_pipeline: wgpu::RenderPipeline,
    shadow_pipeline: wgpu::RenderPipeline,
    background_pipeline: wgpu::RenderPipeline,
    white: Texture,
    textures: Vec<Texture>,
    materials: Vec<GpuMaterial>,
    geometries: Vec<Vec<GpuMesh>>,
    /// One per node; `None` for nodes that draw nothing.
    instances: Vec<Option<wgpu::Buffer>>,
    background: Option<(TextureId, wgpu::BindGroup)>,
    overlay: DebugOverlay,
    prepared: Option<PreparedOverlay>,
}

impl std::fmt::Debug for GpuRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuRenderer")
            .field("textures", &self.textures.len())
            .field("materials", &self.materials.len())
            .field("geometries", &self.geometries.len())
            .field("instances", &self.instances.len())
            .finish()
    }
}

impl GpuRenderer {
    pub fn new(ctx: Context, scene: &SceneState, overlay_key: winit::keyboard::KeyCode) -> Self {
        let device = &ctx.device;
        let format = ctx.config.format;

        let camera = CameraBinding::new(device);
        let lights = LightResources::new(device, &scene.lights, &scene.graph);
        let material_layout = basic::material_layout(device);
        let background_layout = background::mk_bind_group_layout(device);

        let single_sided_pipeline = basic::mk_basic_pipeline(
            device,
            format,
            &material_layout,
            &camera.bind_group_layout,
            &lights.bind_group_layout,
            Some(wgpu::Face::Back),
        );
        let double_sided_pipeline = basic::mk_basic_pipeline(
            device,
            format,
            &material_layout,
            &camera.bind_group_layout,
            &lights.bind_group_layout,
            None,
        );
        let shadow_pipeline = shadow::mk_shadow_pipeline(device, &lights.shadow_bind_group_layout);
        let background_pipeline = background::mk_background_pipeline(
            device,
            format,
            &background_layout,
            &camera.bind_group_layout,
        );
        let white = Texture::white(device, &ctx.queue);
        let overlay = DebugOverlay::new(device, format, &ctx.window, overlay_key, debug_panel());

        Self {
            ctx,
            camera,
            lights,
            material_layout,
            background_layout,
            single_sided_pipeline,
            double_sided_pipeline,
            shadow_pipeline,
            background_pipeline,
            white,
            textures: Vec::new(),
            materials: Vec::new(),
            geometries: Vec::new(),
            instances: Vec::new(),
            background: None,
            overlay,
            prepared: None,
        }
    }

    pub fn window(&self) -> &std::sync::Arc<winit::window::Window> {
        self.ctx.window()
    }

    /// Forwards a window event to the debug panel. Returns true when the panel used it.
    pub fn handle_window_event(&mut self, event: &winit::event::WindowEvent) -> bool {
        self.overlay.handle_window_event(&self.ctx.window, event)
    }

    /// Runs the debug panel against the scene. Its output is drawn by the next `render`.
    pub fn prepare_overlay(&mut self, scene: &mut SceneState) {
        let prepared = self.overlay.prepare(&self.ctx.window, scene);
        if let Some(stale) = self.prepared.replace(prepared) {
            // never drawn, but its textures still have to be released
            self.overlay.cleanup(&stale);
        }
    }

    /// Uploads whatever was appended to the graph since the last frame.
    fn sync(&mut self, graph: &SceneGraph) {
        let device = &self.ctx.device;
        let queue = &self.ctx.queue;

        for (_, img) in graph.textures().skip(self.textures.len()) {
            self.textures.push(Texture::from_image(device, queue, img));
        }

        for (_, material) in graph.materials().skip(self.materials.len()) {
            let (view, sampler, repeat) = match material.texture {
                Some(id) => match (self.textures.get(id.index()), graph.texture(id)) {
                    (Some(texture), Some(img)) => {
                        (&texture.view, &texture.sampler, img.options.repeat)
                    }
                    _ => {
                        log::warn!("material {} references a missing texture", material.name);
                        (&self.white.view, &self.white.sampler, [1.0, 1.0])
                    }
                },
                None => (&self.white.view, &self.white.sampler, [1.0, 1.0]),
            };
            let uniform = MaterialUniform::new(material, repeat);
            let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&format!("{} material", material.name)),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM,
            });
            let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                layout: &self.material_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: buffer.as_entire_binding(),
                    },
                ],
                label: Some(&material.name),
            });
            self.materials.push(GpuMaterial {
                bind_group,
                double_sided: material.double_sided,
            });
        }

        for (_, geometry) in graph.geometries().skip(self.geometries.len()) {
            self.geometries.push(upload_geometry(device, geometry));
        }

        for (_, node) in graph.nodes().skip(self.instances.len()) {
            let buffer = node.is_mesh().then(|| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(&format!("{} instance", node.name)),
                    contents: bytemuck::cast_slice(&[node.transform.to_raw(node.receive_shadow)]),
                    usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                })
            });
            self.instances.push(buffer);
        }

        if let Some(env) = graph.environment() {
            let current = self.background.as_ref().map(|(id, _)| *id);
            if current != Some(env) {
                if let Some(texture) = self.textures.get(env.index()) {
                    let group = background::mk_bind_group(device, &self.background_layout, texture);
                    self.background = Some((env, group));
                }
            }
        }
    }

    fn update_uniforms(&mut self, scene: &SceneState) {
        let queue = &self.ctx.queue;
        self.camera.uniform.update_view_proj(&scene.camera);
        queue.write_buffer(
            &self.camera.buffer,
            0,
            bytemuck::cast_slice(&[self.camera.uniform]),
        );
        self.lights.update(queue, &scene.lights, &scene.graph);

        for ((_, node), buffer) in scene.graph.nodes().zip(&self.instances) {
            if let Some(buffer) = buffer {
                let raw = node.transform.to_raw(node.receive_shadow);
                queue.write_buffer(buffer, 0, bytemuck::cast_slice(&[raw]));
            }
        }
    }

    /// Meshes of every drawable node, paired with the node's instance buffer and the
    /// resolved material index.
    fn draw_list<'a>(&'a self, graph: &'a SceneGraph) -> Vec<DrawItem<'a>> {
        let mut items = Vec::new();
        for ((_, node), instance) in graph.nodes().zip(&self.instances) {
            let (NodeKind::Mesh { geometry, materials }, Some(instance)) = (&node.kind, instance)
            else {
                continue;
            };
            let Some(meshes) = self.geometries.get(geometry.index()) else {
                continue;
            };
            for mesh in meshes {
                let material = materials
                    .get(mesh.material)
                    .or_else(|| materials.first())
                    .and_then(|id| self.materials.get(id.index()));
                let Some(material) = material else {
                    log::warn!("{} has no material, skipping", node.name);
                    continue;
                };
                items.push(DrawItem {
                    mesh,
                    material,
                    instance,
                    cast_shadow: node.cast_shadow,
                });
            }
        }
        items
    }
}

struct DrawItem<'a> {
    mesh: &'a GpuMesh,
    material: &'a GpuMaterial,
    instance: &'a wgpu::Buffer,
    cast_shadow: bool,
}

fn upload_geometry(device: &wgpu::Device, geometry: &Geometry) -> Vec<GpuMesh> {
    geometry
        .to_meshes()
        .iter()
        .filter_map(|mesh| upload_mesh(device, mesh))
        .collect()
}

fn upload_mesh(device: &wgpu::Device, mesh: &MeshData) -> Option<GpuMesh> {
    if mesh.indices.is_empty() || mesh.vertices.is_empty() {
        log::warn!("mesh {:?} has nothing to draw", mesh.name);
        return None;
    }
    let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Vertex Buffer", mesh.name)),
        contents: bytemuck::cast_slice(&mesh.vertices),
        usage: wgpu::BufferUsages::VERTEX,
    });
    let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(&format!("{:?} Index Buffer", mesh.name)),
        contents: bytemuck::cast_slice(&mesh.indices),
        usage: wgpu::BufferUsages::INDEX,
    });
    Some(GpuMesh {
        vertex_buffer,
        index_buffer,
        num_elements: mesh.indices.len() as u32,
        material: mesh.material,
    })
}

impl DisplaySurface for GpuRenderer {
    fn displayed_size(&self) -> (u32, u32) {
        let size = self.ctx.window.inner_size();
        (size.width, size.height)
    }

    fn buffer_size(&self) -> (u32, u32) {
        (self.ctx.config.width, self.ctx.config.height)
    }

    fn resize_buffer(&mut self, width: u32, height: u32) {
        self.ctx.resize(width, height);
    }
}

impl FrameRenderer for GpuRenderer {
    fn render(&mut self, scene: &SceneState) -> anyhow::Result<()> {
        self.sync(&scene.graph);
        self.update_uniforms(scene);
        let prepared = self.prepared.take();

        let output = match self.ctx.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                log::warn!("surface lost, reconfiguring");
                self.ctx.reconfigure();
                if let Some(prepared) = prepared {
                    self.overlay.cleanup(&prepared);
                }
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("timed out waiting for the next frame");
                if let Some(prepared) = prepared {
                    self.overlay.cleanup(&prepared);
                }
                return Ok(());
            }
            Err(e) => return Err(e).context("could not acquire the next frame"),
        };
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self
            .ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });

        {
            let items = self.draw_list(&scene.graph);

            if self.lights.uniform.casts_shadow() {
                let mut shadow_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Shadow Pass"),
                    color_attachments: &[],
                    depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                        view: &self.lights.shadow_map.view,
                        depth_ops: Some(wgpu::Operations {
                            load: wgpu::LoadOp::Clear(1.0),
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }),
                    occlusion_query_set: None,
                    timestamp_writes: None,
                });
                shadow_pass.set_pipeline(&self.shadow_pipeline);
                shadow_pass.set_bind_group(0, &self.lights.shadow_bind_group, &[]);
                for item in items.iter().filter(|item| item.cast_shadow) {
                    shadow_pass.set_vertex_buffer(0, item.mesh.vertex_buffer.slice(..));
                    shadow_pass.set_vertex_buffer(1, item.instance.slice(..));
                    shadow_pass.set_index_buffer(
                        item.mesh.index_buffer.slice(..),
                        wgpu::IndexFormat::Uint32,
                    );
                    shadow_pass.draw_indexed(0..item.mesh.num_elements, 0, 0..1);
                }
            }

            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(self.ctx.clear_colour),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.ctx.depth_texture.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            render_pass.set_bind_group(1, &self.camera.bind_group, &[]);
            if let Some((_, background)) = &self.background {
                render_pass.set_pipeline(&self.background_pipeline);
                render_pass.set_bind_group(0, background, &[]);
                render_pass.draw(0..3, 0..1);
            }

            render_pass.set_bind_group(2, &self.lights.bind_group, &[]);
            let mut double_sided = None;
            for item in &items {
                if double_sided != Some(item.material.double_sided) {
                    double_sided = Some(item.material.double_sided);
                    render_pass.set_pipeline(if item.material.double_sided {
                        &self.double_sided_pipeline
                    } else {
                        &self.single_sided_pipeline
                    });
                    // a pipeline switch may invalidate groups from another layout
                    render_pass.set_bind_group(1, &self.camera.bind_group, &[]);
                    render_pass.set_bind_group(2, &self.lights.bind_group, &[]);
                }
                render_pass.set_bind_group(0, &item.material.bind_group, &[]);
                render_pass.set_vertex_buffer(0, item.mesh.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, item.instance.slice(..));
                render_pass.set_index_buffer(
                    item.mesh.index_buffer.slice(..),
                    wgpu::IndexFormat::Uint32,
                );
                render_pass.draw_indexed(0..item.mesh.num_elements, 0, 0..1);
            }
        }

        if let Some(prepared) = &prepared {
            let screen_descriptor = egui_wgpu::ScreenDescriptor {
                size_in_pixels: [self.ctx.config.width, self.ctx.config.height],
                pixels_per_point: prepared.pixels_per_point,
            };
            self.overlay.upload(
                &self.ctx.device,
                &self.ctx.queue,
                &mut encoder,
                prepared,
                &screen_descriptor,
            );
            let mut overlay_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("Debug Panel Pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view: &view,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.overlay
                .paint(&mut overlay_pass, prepared, &screen_descriptor);
        }

        self.ctx.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        if let Some(prepared) = prepared {
            self.overlay.cleanup(&prepared);
        }
        Ok(())
    }
}
