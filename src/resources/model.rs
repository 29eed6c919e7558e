//! Asynchronous OBJ/MTL model loading.
//!
//! A load runs as a detached task on the platform executor. It only produces values: the
//! finished model (or the reason it failed) is sent through a channel and attached to the
//! scene graph by whoever drains that channel, which is always the frame thread.

use std::sync::Arc;

use futures::channel::mpsc;

use crate::{
    config::RetryPolicy,
    data_structures::{
        instance::Instance,
        model::{Geometry, Material, MeshData, TextureImage, TextureOptions},
        scene_graph::{NodeId, SceneGraph},
    },
    resources::{
        AssetFuture, AssetSource, load_string,
        mesh::{MaterialLibrary, parse_obj},
        texture::{load_texture, try_load_texture},
    },
};

/// One roadside model to place: its paired files and where it goes.
#[derive(Clone, Debug, PartialEq)]
pub struct ModelRequest {
    pub material_file: String,
    pub geometry_file: String,
    pub position: cgmath::Vector3<f32>,
    pub scale: cgmath::Vector3<f32>,
}

impl ModelRequest {
    /// `name.mtl` and `name.obj` under `models/`.
    pub fn named(name: &str, position: [f32; 3], scale: f32) -> Self {
        Self {
            material_file: format!("models/{name}.mtl"),
            geometry_file: format!("models/{name}.obj"),
            position: position.into(),
            scale: cgmath::Vector3::new(scale, scale, scale),
        }
    }

    pub fn name(&self) -> &str {
        let file = self
            .geometry_file
            .rsplit('/')
            .next()
            .unwrap_or(&self.geometry_file);
        file.strip_suffix(".obj").unwrap_or(file)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedMaterial {
    pub material: Material,
    pub texture: Option<TextureImage>,
}

/// Geometry and materials of a finished load, not yet part of any scene.
#[derive(Clone, Debug, PartialEq)]
pub struct LoadedModel {
    pub meshes: Vec<MeshData>,
    pub materials: Vec<LoadedMaterial>,
}

impl LoadedModel {
    /// Adds the model to `graph` as one shadow-casting node placed by `request`.
    pub fn attach(self, graph: &mut SceneGraph, request: &ModelRequest) -> NodeId {
        let mut materials: Vec<_> = self
            .materials
            .into_iter()
            .map(|loaded| {
                let mut material = loaded.material;
                if let Some(texture) = loaded.texture {
                    material.texture = Some(graph.add_texture(texture));
                }
                graph.add_material(material)
            })
            .collect();
        if materials.is_empty() {
            let mut fallback = Material::colored(request.name(), [1.0, 1.0, 1.0]);
            fallback.double_sided = true;
            materials.push(graph.add_material(fallback));
        }

        let geometry = graph.add_geometry(Geometry::Model(self.meshes));
        let transform = Instance::from(request.position).with_scale(request.scale);
        graph.add(
            crate::data_structures::scene_graph::Node::model(request.name(), geometry, materials)
                .with_transform(transform)
                .casting_shadow(),
        )
    }
}

/// Lifecycle of one requested model.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelSlot {
    Pending,
    Attached(NodeId),
    Failed(String),
}

/// Results handed from loader tasks to the frame thread.
#[derive(Debug)]
pub enum LoadEvent {
    Model {
        slot: usize,
        request: ModelRequest,
        result: anyhow::Result<LoadedModel>,
    },
    Background(anyhow::Result<TextureImage>),
}

pub type LoadEvents = mpsc::UnboundedReceiver<LoadEvent>;

/// Spawns nothing itself: it hands out `'static` futures the caller puts on its executor.
pub struct ModelLoader<S: AssetSource> {
    source: Arc<S>,
    policy: RetryPolicy,
    events: mpsc::UnboundedSender<LoadEvent>,
}

impl<S: AssetSource> Clone for ModelLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            policy: self.policy.clone(),
            events: self.events.clone(),
        }
    }
}

impl<S: AssetSource> ModelLoader<S> {
    pub fn new(source: Arc<S>, policy: RetryPolicy) -> (Self, LoadEvents) {
        let (events, receiver) = mpsc::unbounded();
        (
            Self {
                source,
                policy,
                events,
            },
            receiver,
        )
    }

    /// Loads the material library, then the geometry, then reports on the channel.
    pub fn load_model(&self, slot: usize, request: ModelRequest) -> AssetFuture<()> {
        let source = self.source.clone();
        let policy = self.policy.clone();
        let events = self.events.clone();
        Box::pin(async move {
            let result = fetch_model(&*source, &request, &policy).await;
            match &result {
                Ok(model) => log::debug!(
                    "{} loaded with {} meshes",
                    request.name(),
                    model.meshes.len()
                ),
                Err(e) => log::error!("model {} failed to load: {:#}", request.name(), e),
            }
            // the receiver is gone once the window closed, the result is then dropped
            let _ = events.unbounded_send(LoadEvent::Model {
                slot,
                request,
                result,
            });
        })
    }

    /// Decodes the panorama background. Unlike material maps, a failure is reported
    /// rather than replaced by a placeholder.
    pub fn load_background(&self, path: &str) -> AssetFuture<()> {
        let source = self.source.clone();
        let policy = self.policy.clone();
        let events = self.events.clone();
        let path = path.to_string();
        Box::pin(async move {
            let result = try_load_texture(&*source, &path, TextureOptions::default(), &policy).await;
            let _ = events.unbounded_send(LoadEvent::Background(result));
        })
    }
}

/// Paths inside an MTL file are relative to the MTL file itself.
fn sibling_path(file: &str, name: &str) -> String {
    match file.rfind('/') {
        Some(i) => format!("{}/{}", &file[..i], name),
        None => name.to_string(),
    }
}

pub async fn fetch_model<S: AssetSource + ?Sized>(
    source: &S,
    request: &ModelRequest,
    policy: &RetryPolicy,
) -> anyhow::Result<LoadedModel> {
    let mtl_text = load_string(source, &request.material_file, policy).await?;
    let library = MaterialLibrary::parse(&mtl_text)?;

    let mut materials = Vec::with_capacity(library.len());
    for def in library.definitions() {
        let mut material = def.material;
        material.double_sided = true;
        let texture = match &def.diffuse_texture {
            Some(map) => {
                let path = sibling_path(&request.material_file, map);
                Some(load_texture(source, &path, TextureOptions::default(), policy).await)
            }
            None => None,
        };
        materials.push(LoadedMaterial { material, texture });
    }

    let obj_text = load_string(source, &request.geometry_file, policy).await?;
    let meshes = parse_obj(&obj_text, &library)?;

    Ok(LoadedModel { meshes, materials })
}
