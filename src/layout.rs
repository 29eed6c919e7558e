//! Placement literals for the roadside scene.

use std::f32::consts::FRAC_PI_2;

use cgmath::Vector3;

use crate::{
    data_structures::model::{Geometry, TextureOptions},
    resources::model::ModelRequest,
};

/// Width of one tile; a segment is three tiles side by side.
pub const TILE_WIDTH: f32 = 5.0;
pub const TILE_HEIGHT: f32 = 0.5;
pub const TILE_DEPTH: f32 = 5.0;

/// How a placement is shaded.
#[derive(Clone, Debug, PartialEq)]
pub enum Surface {
    Texture {
        path: String,
        options: TextureOptions,
    },
    Color(u32),
}

impl Surface {
    pub fn texture(path: &str) -> Self {
        Surface::Texture {
            path: path.to_string(),
            options: TextureOptions::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct PlacementSpec {
    pub geometry: Geometry,
    pub surface: Surface,
    pub position: Vector3<f32>,
    pub scale: Vector3<f32>,
    /// XYZ euler angles in radians.
    pub rotation: [f32; 3],
}

impl PlacementSpec {
    pub fn new(geometry: Geometry, surface: Surface, position: [f32; 3]) -> Self {
        Self {
            geometry,
            surface,
            position: position.into(),
            scale: Vector3::new(1.0, 1.0, 1.0),
            rotation: [0.0; 3],
        }
    }

    pub fn rotated(mut self, x: f32, y: f32, z: f32) -> Self {
        self.rotation = [x, y, z];
        self
    }

    pub fn scaled(mut self, scale: [f32; 3]) -> Self {
        self.scale = scale.into();
        self
    }
}

/// One longitudinal strip of segments.
#[derive(Clone, Debug, PartialEq)]
pub struct TileRowSpec {
    pub name: &'static str,
    pub geometry: Geometry,
    pub surface: Surface,
    /// Centre of each segment; tiles go at -5, 0 and +5 on x from here.
    pub positions: Vec<Vector3<f32>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VehicleSpec {
    pub origin: Vector3<f32>,
    pub surface: Surface,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SceneLayout {
    pub road: TileRowSpec,
    pub grass_left: TileRowSpec,
    pub grass_right: TileRowSpec,
    pub vehicle: VehicleSpec,
    pub sun: PlacementSpec,
    pub ground: PlacementSpec,
    pub models: Vec<ModelRequest>,
}

/// z = -25, -20, ..., 25
pub fn row_positions(x: f32) -> Vec<Vector3<f32>> {
    (-5..=5)
        .map(|i| Vector3::new(x, 0.0, i as f32 * TILE_DEPTH))
        .collect()
}

fn tile_row(name: &'static str, texture: &str, x: f32) -> TileRowSpec {
    TileRowSpec {
        name,
        geometry: Geometry::cuboid(TILE_WIDTH, TILE_HEIGHT, TILE_DEPTH),
        surface: Surface::texture(texture),
        positions: row_positions(x),
    }
}

impl Default for SceneLayout {
    fn default() -> Self {
        Self {
            road: tile_row("road", "textures/road.png", 0.0),
            grass_left: tile_row("grass left", "textures/grass.png", -15.0),
            grass_right: tile_row("grass right", "textures/grass.png", 15.0),
            vehicle: VehicleSpec {
                origin: Vector3::new(0.0, 2.75, 0.0),
                surface: Surface::Color(0xb22222),
            },
            sun: PlacementSpec::new(
                Geometry::sphere(3.0),
                Surface::Color(0xffd700),
                crate::lighting::SUN_POSITION,
            ),
            ground: PlacementSpec::new(
                Geometry::plane(200.0, 200.0),
                Surface::Texture {
                    path: "textures/ground.png".to_string(),
                    options: TextureOptions::repeating(20.0, 20.0),
                },
                [0.0, -0.05, 0.0],
            )
            .rotated(-FRAC_PI_2, 0.0, 0.0),
            models: roadside_models(),
        }
    }
}

/// The sixteen props placed beyond the grass strips.
pub fn roadside_models() -> Vec<ModelRequest> {
    vec![
        ModelRequest::named("pine_tree", [-30.0, 0.0, -22.0], 2.0),
        ModelRequest::named("pine_tree", [-28.0, 0.0, 4.0], 2.4),
        ModelRequest::named("pine_tree", [31.0, 0.0, -8.0], 2.2),
        ModelRequest::named("pine_tree", [27.0, 0.0, 19.0], 1.8),
        ModelRequest::named("oak_tree", [-34.0, 0.0, -9.0], 1.6),
        ModelRequest::named("oak_tree", [35.0, 0.0, 6.0], 1.5),
        ModelRequest::named("oak_tree", [-26.0, 0.0, 23.0], 1.7),
        ModelRequest::named("rock", [-11.0, 0.25, 16.0], 0.8),
        ModelRequest::named("rock", [19.0, 0.25, -18.0], 1.2),
        ModelRequest::named("rock", [40.0, 0.0, 25.0], 2.0),
        ModelRequest::named("house", [-45.0, 0.0, -30.0], 3.0),
        ModelRequest::named("house", [45.0, 0.0, -26.0], 3.0),
        ModelRequest::named("street_lamp", [-8.5, 0.25, -10.0], 1.0),
        ModelRequest::named("street_lamp", [8.5, 0.25, 10.0], 1.0),
        ModelRequest::named("road_sign", [9.0, 0.25, -20.0], 1.0),
        ModelRequest::named("road_sign", [-9.0, 0.25, 20.0], 1.0),
    ]
}
