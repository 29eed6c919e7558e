//! The scene's three lights.
//!
//! Lights are plain data owned by the scene state; the renderer reads them every frame
//! and the debug panel writes them through its bindings.

use cgmath::Point3;

use crate::data_structures::{
    model::hex_color,
    scene_graph::{Node, NodeId, SceneGraph},
};

#[derive(Clone, Debug, PartialEq)]
pub struct AmbientLight {
    pub color: [f32; 3],
    pub intensity: f32,
}

/// Sky colour from above, ground colour from below, blended by the surface normal.
#[derive(Clone, Debug, PartialEq)]
pub struct HemisphereLight {
    pub sky_color: [f32; 3],
    pub ground_color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct DirectionalLight {
    pub color: [f32; 3],
    pub intensity: f32,
    pub position: Point3<f32>,
    /// Invisible node the light is aimed at.
    pub target: NodeId,
    pub cast_shadow: bool,
    pub shadow: ShadowCamera,
}

/// Orthographic volume the shadow map covers, centred on the light's target.
#[derive(Clone, Debug, PartialEq)]
pub struct ShadowCamera {
    pub half_extent: f32,
    pub near: f32,
    pub far: f32,
    pub map_size: u32,
    pub bias: f32,
}

impl Default for ShadowCamera {
    fn default() -> Self {
        Self {
            half_extent: 60.0,
            near: 0.5,
            far: 200.0,
            map_size: 2048,
            bias: 0.002,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LightSet {
    pub ambient: AmbientLight,
    pub hemisphere: HemisphereLight,
    pub directional: DirectionalLight,
}

pub const SUN_POSITION: [f32; 3] = [30.0, 50.0, 20.0];

/// Creates the ambient, hemisphere and directional lights. The directional light's
/// shadow target is added to `graph`.
pub fn init_lights(graph: &mut SceneGraph) -> LightSet {
    let target = graph.add(Node::target("sun target").at([0.0, 0.0, 0.0]));

    LightSet {
        ambient: AmbientLight {
            color: [1.0, 1.0, 1.0],
            intensity: 0.1,
        },
        hemisphere: HemisphereLight {
            sky_color: hex_color(0x87ceeb),
            ground_color: hex_color(0x4b6b2f),
            intensity: 0.6,
            position: Point3::new(0.0, 50.0, 0.0),
        },
        directional: DirectionalLight {
            color: hex_color(0xfff4e0),
            intensity: 1.0,
            position: SUN_POSITION.into(),
            target,
            cast_shadow: true,
            shadow: ShadowCamera::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directional_light_aims_at_a_node_in_the_graph() {
        let mut graph = SceneGraph::new();
        let lights = init_lights(&mut graph);
        assert_eq!(graph.len(), 1);
        assert_eq!(graph.mesh_count(), 0);
        assert!(graph.node(lights.directional.target).is_some());
        assert!(lights.directional.cast_shadow);
        assert!(lights.ambient.intensity < lights.directional.intensity);
    }
}
