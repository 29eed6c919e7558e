use std::collections::HashMap;

use cgmath::{InnerSpace, Vector3};
use roadscape::{
    builder::{BackgroundSlot, assemble_scene, build_scene},
    config::RetryPolicy,
    data_structures::{
        model::{Geometry, hex_color},
        scene_graph::NodeKind,
    },
    layout::SceneLayout,
    resources::model::ModelSlot,
};

use crate::common::test_utils::{MockSource, default_scene};

mod common;

#[test]
fn static_scene_holds_one_hundred_seven_meshes() {
    let scene = default_scene();
    // 3 rows * 11 segments * 3 tiles, 6 vehicle parts, sun and ground
    assert_eq!(scene.graph.mesh_count(), 107);
    assert_eq!(scene.models.len(), 16);
    assert!(scene.models.iter().all(|slot| *slot == ModelSlot::Pending));
    assert_eq!(scene.background, BackgroundSlot::NotRequested);
    assert_eq!(scene.graph.environment(), None);
}

#[test]
fn every_row_has_thirty_three_tiles() {
    let scene = default_scene();
    for (row, x) in [(&scene.road, 0.0), (&scene.grass_left, -15.0), (&scene.grass_right, 15.0)] {
        assert_eq!(row.iter().map(|group| group.tiles.len()).sum::<usize>(), 33);
        for (i, group) in row.iter().enumerate() {
            assert_eq!(group.index, i);
            assert_eq!(group.z, -25.0 + 5.0 * i as f32);
            let xs: Vec<f32> = group
                .tiles
                .iter()
                .map(|id| scene.graph.node(*id).unwrap().transform.position.x)
                .collect();
            assert_eq!(xs, vec![x - 5.0, x, x + 5.0]);
        }
    }
}

#[test]
fn tiles_share_one_material_per_texture() {
    let scene = default_scene();
    let material_of = |id| match &scene.graph.node(id).unwrap().kind {
        NodeKind::Mesh { materials, .. } => materials[0],
        NodeKind::Target => panic!("tile is not a mesh"),
    };
    let left = material_of(scene.grass_left[0].tiles[0]);
    let right = material_of(scene.grass_right[10].tiles[2]);
    let road = material_of(scene.road[3].tiles[1]);
    assert_eq!(left, right);
    assert_ne!(left, road);
}

#[test]
fn vehicle_parts_sit_around_its_origin() {
    let scene = default_scene();
    let graph = &scene.graph;
    let nodes = scene.vehicle.nodes();
    assert_eq!(nodes.len(), 6);
    assert!(nodes.iter().all(|id| graph.node(*id).unwrap().cast_shadow));

    let body = graph.node(scene.vehicle.body).unwrap();
    assert_eq!(body.transform.position, Vector3::new(0.0, 2.75, 0.0));

    for wheel in scene.vehicle.wheels {
        let position = graph.node(wheel).unwrap().transform.position;
        assert_eq!(position.x.abs(), 2.5);
        assert_eq!(position.z.abs(), 7.0);
        assert_eq!(position.y, 2.75 - 1.5);
    }

    let tank = graph.node(scene.vehicle.tank).unwrap();
    assert_eq!(tank.transform.position, Vector3::new(0.0, 5.25, 4.0));
}

#[test]
fn sun_glows_in_its_own_colour() {
    let scene = default_scene();
    let sun = scene.graph.node(scene.sun).unwrap();
    let NodeKind::Mesh { materials, geometry } = &sun.kind else {
        panic!("sun is not a mesh");
    };
    let material = scene.graph.material(materials[0]).unwrap();
    assert_eq!(material.color, hex_color(0xffd700));
    assert_eq!(material.emissive, material.color);
    assert!(matches!(
        scene.graph.geometry(*geometry),
        Some(Geometry::Sphere { radius, .. }) if *radius == 3.0
    ));
}

#[test]
fn ground_lies_flat_and_receives_shadows() {
    let scene = default_scene();
    let ground = scene.graph.node(scene.ground).unwrap();
    assert!(ground.receive_shadow);
    assert!(!ground.cast_shadow);
    // the plane faces +z until rotated; afterwards its normal points up
    let up = ground.transform.rotation * Vector3::unit_z();
    assert!((up - Vector3::unit_y()).magnitude() < 1e-5);
}

#[test]
fn directional_light_targets_a_graph_node() {
    let scene = default_scene();
    let target = scene.graph.node(scene.lights.directional.target).unwrap();
    assert!(matches!(target.kind, NodeKind::Target));
    assert!(scene.lights.directional.cast_shadow);
}

#[test]
fn broken_layout_builds_nothing() {
    let mut layout = SceneLayout::default();
    layout.road.geometry = Geometry::cuboid(5.0, 0.0, 5.0);
    let err = assemble_scene(&layout, &HashMap::new(), 1.0).unwrap_err();
    assert!(format!("{:#}", err).contains("invalid scene layout"));

    // nothing is fetched for a layout that cannot be built
    let source = MockSource::new();
    let result = futures::executor::block_on(build_scene(&source, &layout, &RetryPolicy::once(), 1.0));
    assert!(result.is_err());
    assert!(source.fetched().is_empty());
}

#[test]
fn missing_textures_fall_back_to_placeholders() {
    let source = MockSource::new();
    let layout = SceneLayout::default();
    let scene = futures::executor::block_on(build_scene(&source, &layout, &RetryPolicy::once(), 1.5))
        .expect("missing textures are not fatal");
    assert_eq!(scene.graph.mesh_count(), 107);
    // road, grass and ground each requested once
    let mut fetched = source.fetched();
    fetched.sort();
    assert_eq!(
        fetched,
        vec!["textures/grass.png", "textures/ground.png", "textures/road.png"]
    );
    assert!(scene.graph.textures().all(|(_, img)| img.placeholder));
}
