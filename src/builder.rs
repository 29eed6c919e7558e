//! Scene construction.
//!
//! Everything static is created here in one pass: the tiled road and grass rows, the
//! vehicle, the sun, the ground plane and the lights. The result is a [`SceneState`]
//! that the frame scheduler owns from then on. Loaded models are attached later, as
//! their loads complete.

use std::collections::HashMap;

use anyhow::{Context as _, ensure};
use cgmath::{Point3, Vector3};

use crate::{
    camera::{OrbitControls, PerspectiveCamera},
    config::RetryPolicy,
    data_structures::{
        instance::Instance,
        model::{Geometry, Material, TextureImage, TextureOptions, hex_color},
        scene_graph::{GeometryId, MaterialId, Node, NodeId, NodeKind, SceneGraph, TextureId},
    },
    frame::AnimationPhases,
    layout::{PlacementSpec, SceneLayout, Surface, TILE_WIDTH, TileRowSpec, VehicleSpec},
    lighting::{LightSet, init_lights},
    resources::{AssetSource, model::ModelSlot, texture::load_texture},
};

/// One road or grass segment: three tiles sharing a material and a z offset.
#[derive(Clone, Debug, PartialEq)]
pub struct TileGroup {
    /// Position in its row, seeds the animation speed.
    pub index: usize,
    pub z: f32,
    pub tiles: [NodeId; 3],
}

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleAssembly {
    pub body: NodeId,
    pub wheels: [NodeId; 4],
    pub tank: NodeId,
}

impl VehicleAssembly {
    pub fn nodes(&self) -> [NodeId; 6] {
        [
            self.body,
            self.wheels[0],
            self.wheels[1],
            self.wheels[2],
            self.wheels[3],
            self.tank,
        ]
    }
}

/// The panorama behind the scene, loaded at most once.
#[derive(Clone, Debug, PartialEq)]
pub enum BackgroundSlot {
    NotRequested,
    Loading,
    Ready(TextureId),
    Failed(String),
}

/// Everything the frame loop reads and mutates.
#[derive(Debug)]
pub struct SceneState {
    pub graph: SceneGraph,
    pub road: Vec<TileGroup>,
    pub grass_left: Vec<TileGroup>,
    pub grass_right: Vec<TileGroup>,
    pub vehicle: VehicleAssembly,
    pub sun: NodeId,
    pub ground: NodeId,
    pub lights: LightSet,
    pub camera: PerspectiveCamera,
    pub orbit: OrbitControls,
    pub models: Vec<ModelSlot>,
    pub background: BackgroundSlot,
    pub phases: AnimationPhases,
}

impl SceneState {
    pub fn attached_models(&self) -> usize {
        self.models
            .iter()
            .filter(|slot| matches!(slot, ModelSlot::Attached(_)))
            .count()
    }

    pub fn pending_models(&self) -> usize {
        self.models
            .iter()
            .filter(|slot| matches!(slot, ModelSlot::Pending))
            .count()
    }
}

/// Places three tiles per position, at x - 5, x and x + 5. All tiles share `material`
/// and receive shadows.
pub fn build_tile_row(
    graph: &mut SceneGraph,
    name: &str,
    geometry: GeometryId,
    material: MaterialId,
    positions: &[Vector3<f32>],
) -> Vec<TileGroup> {
    positions
        .iter()
        .enumerate()
        .map(|(index, p)| {
            let tiles = [-TILE_WIDTH, 0.0, TILE_WIDTH].map(|dx| {
                graph.add(
                    Node::mesh(&format!("{name} {index}"), geometry, material)
                        .at(*p + Vector3::new(dx, 0.0, 0.0))
                        .receiving_shadow(),
                )
            });
            TileGroup {
                index,
                z: p.z,
                tiles,
            }
        })
        .collect()
}

pub const BODY_SIZE: [f32; 3] = [5.0, 3.0, 15.0];
pub const WHEEL_RADIUS: f32 = 1.0;
pub const TANK_RADIUS: f32 = 1.0;
pub const TANK_LENGTH: f32 = 5.0;

/// Lateral and longitudinal wheel offsets from the vehicle origin.
pub const WHEEL_OFFSETS: [[f32; 2]; 4] = [[2.5, 7.0], [-2.5, 7.0], [2.5, -7.0], [-2.5, -7.0]];
/// The wheels hang below the body's centre line.
pub const WHEEL_DROP: f32 = 1.5;
pub const TANK_OFFSET: [f32; 3] = [0.0, 2.5, 4.0];

/// Body, four wheels and a tank lying along the vehicle, all shadow casting and all
/// placed with absolute transforms derived from `origin`.
pub fn build_vehicle(
    graph: &mut SceneGraph,
    origin: Vector3<f32>,
    material: MaterialId,
) -> VehicleAssembly {
    let body_geometry = graph.add_geometry(Geometry::cuboid(BODY_SIZE[0], BODY_SIZE[1], BODY_SIZE[2]));
    let wheel_geometry = graph.add_geometry(Geometry::sphere(WHEEL_RADIUS));
    let tank_geometry = graph.add_geometry(Geometry::cylinder(TANK_RADIUS, TANK_LENGTH));

    let body = graph.add(
        Node::mesh("vehicle body", body_geometry, material)
            .at(origin)
            .casting_shadow(),
    );
    let wheels = WHEEL_OFFSETS.map(|[x, z]| {
        graph.add(
            Node::mesh("vehicle wheel", wheel_geometry, material)
                .at(origin + Vector3::new(x, -WHEEL_DROP, z))
                .casting_shadow(),
        )
    });
    // the cylinder is upright by default, lay it along z
    let tank_transform = Instance::from(origin + Vector3::from(TANK_OFFSET)).with_euler(
        std::f32::consts::FRAC_PI_2,
        0.0,
        0.0,
    );
    let tank = graph.add(
        Node::mesh("vehicle tank", tank_geometry, material)
            .with_transform(tank_transform)
            .casting_shadow(),
    );

    VehicleAssembly { body, wheels, tank }
}

fn ensure_finite_positive(name: &str, what: &str, v: Vector3<f32>) -> anyhow::Result<()> {
    ensure!(
        [v.x, v.y, v.z].iter().all(|c| c.is_finite() && *c > 0.0),
        "placement '{}': {} must be finite and positive, got {:?}",
        name,
        what,
        v
    );
    Ok(())
}

fn ensure_finite(name: &str, v: Vector3<f32>) -> anyhow::Result<()> {
    ensure!(
        [v.x, v.y, v.z].iter().all(|c| c.is_finite()),
        "placement '{}': position must be finite, got {:?}",
        name,
        v
    );
    Ok(())
}

fn validate_placement(name: &str, placement: &PlacementSpec) -> anyhow::Result<()> {
    placement
        .geometry
        .validate()
        .with_context(|| format!("placement '{}'", name))?;
    ensure_finite(name, placement.position)?;
    ensure_finite_positive(name, "scale", placement.scale)?;
    ensure!(
        placement.rotation.iter().all(|r| r.is_finite()),
        "placement '{}': rotation must be finite",
        name
    );
    Ok(())
}

fn validate_row(row: &TileRowSpec) -> anyhow::Result<()> {
    row.geometry
        .validate()
        .with_context(|| format!("placement '{}'", row.name))?;
    for p in &row.positions {
        ensure_finite(row.name, *p)?;
    }
    Ok(())
}

fn validate_vehicle(vehicle: &VehicleSpec) -> anyhow::Result<()> {
    ensure_finite("vehicle", vehicle.origin)
}

/// Rejects layouts the renderer could not draw sensibly. Nothing is built if this fails.
pub fn validate_layout(layout: &SceneLayout) -> anyhow::Result<()> {
    validate_row(&layout.road)?;
    validate_row(&layout.grass_left)?;
    validate_row(&layout.grass_right)?;
    validate_vehicle(&layout.vehicle)?;
    validate_placement("sun", &layout.sun)?;
    validate_placement("ground", &layout.ground)?;
    for request in &layout.models {
        ensure_finite(request.name(), request.position)?;
        ensure_finite_positive(request.name(), "scale", request.scale)?;
    }
    Ok(())
}

/// Texture paths referenced by static placements, each listed once.
pub fn texture_paths(layout: &SceneLayout) -> Vec<(String, TextureOptions)> {
    let surfaces = [
        &layout.road.surface,
        &layout.grass_left.surface,
        &layout.grass_right.surface,
        &layout.vehicle.surface,
        &layout.sun.surface,
        &layout.ground.surface,
    ];
    let mut paths: Vec<(String, _)> = Vec::new();
    for surface in surfaces {
        if let Surface::Texture { path, options } = surface {
            if !paths.iter().any(|(p, _)| p == path) {
                paths.push((path.clone(), *options));
            }
        }
    }
    paths
}

/// Fetches the textures of every static placement. Failures degrade to placeholders.
pub async fn load_layout_textures<S: AssetSource + ?Sized>(
    source: &S,
    layout: &SceneLayout,
    policy: &RetryPolicy,
) -> HashMap<String, TextureImage> {
    let loads = texture_paths(layout).into_iter().map(|(path, options)| async move {
        let img = load_texture(source, &path, options, policy).await;
        (path, img)
    });
    futures::future::join_all(loads).await.into_iter().collect()
}

/// Resolves a surface to a material, reusing one per distinct texture path.
struct MaterialCache<'a> {
    textures: &'a HashMap<String, TextureImage>,
    by_path: HashMap<String, MaterialId>,
}

impl MaterialCache<'_> {
    fn material(&mut self, graph: &mut SceneGraph, name: &str, surface: &Surface) -> MaterialId {
        match surface {
            Surface::Color(hex) => graph.add_material(Material::colored(name, hex_color(*hex))),
            Surface::Texture { path, options } => {
                if let Some(id) = self.by_path.get(path) {
                    return *id;
                }
                let img = match self.textures.get(path) {
                    Some(img) => img.clone(),
                    None => {
                        log::warn!("texture {} was not loaded, using placeholder", path);
                        TextureImage::placeholder(path, *options)
                    }
                };
                let texture = graph.add_texture(img);
                let id = graph.add_material(Material::textured(name, texture));
                self.by_path.insert(path.clone(), id);
                id
            }
        }
    }
}

/// Builds the complete static scene from `layout` and already decoded textures.
pub fn assemble_scene(
    layout: &SceneLayout,
    textures: &HashMap<String, TextureImage>,
    aspect: f32,
) -> anyhow::Result<SceneState> {
    validate_layout(layout).context("invalid scene layout")?;

    let mut graph = SceneGraph::new();
    let mut materials = MaterialCache {
        textures,
        by_path: HashMap::new(),
    };

    let mut row = |graph: &mut SceneGraph, spec: &TileRowSpec| {
        let geometry = graph.add_geometry(spec.geometry.clone());
        let material = materials.material(graph, spec.name, &spec.surface);
        build_tile_row(graph, spec.name, geometry, material, &spec.positions)
    };
    let road = row(&mut graph, &layout.road);
    let grass_left = row(&mut graph, &layout.grass_left);
    let grass_right = row(&mut graph, &layout.grass_right);

    let vehicle_material = materials.material(&mut graph, "vehicle", &layout.vehicle.surface);
    let vehicle = build_vehicle(&mut graph, layout.vehicle.origin, vehicle_material);

    let sun = place(&mut graph, &mut materials, "sun", &layout.sun, |node| node);
    if let Some(material) = first_material(&graph, sun) {
        glow(&mut graph, material);
    }
    let ground = place(&mut graph, &mut materials, "ground", &layout.ground, Node::receiving_shadow);

    let lights = init_lights(&mut graph);

    let mut camera = PerspectiveCamera::new(45.0, aspect, 0.1, 1000.0);
    camera.position = Point3::new(-35.0, 30.0, 45.0);
    let mut orbit = OrbitControls::new(&camera, Point3::new(0.0, 0.0, 0.0));
    orbit.update(&mut camera);

    log::info!(
        "scene built: {} nodes ({} meshes), {} textures",
        graph.len(),
        graph.mesh_count(),
        graph.texture_count()
    );

    Ok(SceneState {
        graph,
        road,
        grass_left,
        grass_right,
        vehicle,
        sun,
        ground,
        lights,
        camera,
        orbit,
        models: vec![ModelSlot::Pending; layout.models.len()],
        background: BackgroundSlot::NotRequested,
        phases: AnimationPhases::default(),
    })
}

fn place(
    graph: &mut SceneGraph,
    materials: &mut MaterialCache<'_>,
    name: &str,
    spec: &PlacementSpec,
    decorate: impl FnOnce(Node) -> Node,
) -> NodeId {
    let geometry = graph.add_geometry(spec.geometry.clone());
    let material = materials.material(graph, name, &spec.surface);
    let [rx, ry, rz] = spec.rotation;
    let transform = Instance::from(spec.position)
        .with_scale(spec.scale)
        .with_euler(rx, ry, rz);
    graph.add(decorate(
        Node::mesh(name, geometry, material).with_transform(transform),
    ))
}

fn first_material(graph: &SceneGraph, node: NodeId) -> Option<MaterialId> {
    match &graph.node(node)?.kind {
        NodeKind::Mesh { materials, .. } => materials.first().copied(),
        NodeKind::Target => None,
    }
}

/// The sun is lit by nothing, it shines in its own colour.
fn glow(graph: &mut SceneGraph, material: MaterialId) {
    if let Some(m) = graph.material_mut(material) {
        m.emissive = m.color;
    }
}

/// Loads the layout's textures through `source`, then assembles the scene.
pub async fn build_scene<S: AssetSource + ?Sized>(
    source: &S,
    layout: &SceneLayout,
    policy: &RetryPolicy,
    aspect: f32,
) -> anyhow::Result<SceneState> {
    // fail before fetching anything if the literals are broken
    validate_layout(layout).context("invalid scene layout")?;
    let textures = load_layout_textures(source, layout, policy).await;
    assemble_scene(layout, &textures, aspect)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_row_offsets_are_symmetric() {
        let mut graph = SceneGraph::new();
        let geometry = graph.add_geometry(Geometry::cuboid(5.0, 0.5, 5.0));
        let material = graph.add_material(Material::colored("road", [0.3; 3]));
        let positions = crate::layout::row_positions(15.0);
        let groups = build_tile_row(&mut graph, "grass", geometry, material, &positions);

        assert_eq!(groups.len(), 11);
        for (group, base) in groups.iter().zip(&positions) {
            let dx: Vec<f32> = group
                .tiles
                .iter()
                .map(|id| graph.node(*id).unwrap().transform.position.x - base.x)
                .collect();
            assert_eq!(dx, vec![-5.0, 0.0, 5.0]);
            assert!(group.tiles.iter().all(|id| graph.node(*id).unwrap().receive_shadow));
        }
    }

    #[test]
    fn vehicle_is_six_shadow_casters() {
        let mut graph = SceneGraph::new();
        let material = graph.add_material(Material::colored("paint", [1.0, 0.0, 0.0]));
        let vehicle = build_vehicle(&mut graph, Vector3::new(-3.0, 10.0, 42.0), material);
        assert_eq!(graph.len(), 6);
        for id in vehicle.nodes() {
            assert!(graph.node(id).unwrap().cast_shadow);
        }
        let wheel = graph.node(vehicle.wheels[3]).unwrap();
        assert_eq!(wheel.transform.position, Vector3::new(-5.5, 8.5, 35.0));
    }

    #[test]
    fn degenerate_scale_aborts_construction() {
        let mut layout = SceneLayout::default();
        layout.ground.scale = Vector3::new(1.0, 0.0, 1.0);
        let err = assemble_scene(&layout, &HashMap::new(), 1.0).unwrap_err();
        assert!(format!("{err:#}").contains("ground"), "{err:#}");
    }
}
