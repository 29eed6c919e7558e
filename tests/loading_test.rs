use std::{sync::Arc, time::Duration};

use futures::executor::block_on;
use roadscape::{
    config::RetryPolicy,
    data_structures::scene_graph::NodeKind,
    frame::{CancellationToken, FrameScheduler},
    layout::SceneLayout,
    resources::{
        fetch_with_retry,
        model::{ModelLoader, ModelRequest, ModelSlot, fetch_model},
    },
};

use crate::common::test_utils::{CUBE_MTL, CUBE_OBJ, MockBackend, MockSource, default_scene};

mod common;

fn cube_source() -> MockSource {
    MockSource::new()
        .with_file("models/cube.mtl", CUBE_MTL)
        .with_file("models/cube.obj", CUBE_OBJ)
}

#[test]
fn material_library_is_fetched_before_geometry() {
    let source = MockSource::new()
        .with_file(
            "models/cube.mtl",
            format!("{}map_Kd paint.png\n", CUBE_MTL),
        )
        .with_file("models/cube.obj", CUBE_OBJ);
    let request = ModelRequest::named("cube", [0.0, 0.0, 0.0], 1.0);

    let model = block_on(fetch_model(&source, &request, &RetryPolicy::once())).unwrap();

    assert_eq!(
        source.fetched(),
        vec!["models/cube.mtl", "models/paint.png", "models/cube.obj"]
    );
    assert_eq!(model.materials.len(), 1);
    assert!(model.materials[0].material.double_sided);
    // the map is missing, a placeholder stands in
    assert!(model.materials[0].texture.as_ref().unwrap().placeholder);
    assert_eq!(model.meshes.len(), 1);
    assert_eq!(model.meshes[0].triangle_count(), 12);
}

#[test]
fn geometry_is_not_fetched_without_materials() {
    let source = MockSource::new()
        .with_missing("models/cube.mtl")
        .with_file("models/cube.obj", CUBE_OBJ);
    let request = ModelRequest::named("cube", [0.0, 0.0, 0.0], 1.0);

    let err = block_on(fetch_model(&source, &request, &RetryPolicy::once())).unwrap_err();
    assert!(format!("{:#}", err).contains("models/cube.mtl"));
    assert_eq!(source.fetched(), vec!["models/cube.mtl"]);
}

#[test]
fn finished_model_is_attached_on_the_next_tick() {
    let (loader, events) = ModelLoader::new(Arc::new(cube_source()), RetryPolicy::once());
    let mut scheduler = FrameScheduler::new(events, CancellationToken::new());
    let mut scene = default_scene();
    let mut backend = MockBackend::sized(640, 480);

    let request = ModelRequest::named("cube", [30.0, 0.0, -20.0], 2.0);
    block_on(loader.load_model(4, request));
    assert_eq!(scene.models[4], ModelSlot::Pending);

    scheduler.tick(0.0, &mut scene, &mut backend);

    let ModelSlot::Attached(id) = scene.models[4] else {
        panic!("model not attached: {:?}", scene.models[4]);
    };
    let node = scene.graph.node(id).unwrap();
    assert!(node.cast_shadow);
    assert_eq!(node.transform.position, cgmath::Vector3::new(30.0, 0.0, -20.0));
    assert!(matches!(node.kind, NodeKind::Mesh { .. }));
    assert_eq!(scene.graph.mesh_count(), 108);
    assert_eq!(scene.attached_models(), 1);
    assert_eq!(scene.pending_models(), 15);
    // the frame that attached it also drew it
    assert_eq!(backend.frames[0].mesh_count, 108);
}

#[test]
fn failed_model_is_skipped_and_the_rest_still_load() {
    let source = cube_source().with_missing("models/rock.obj").with_file("models/rock.mtl", CUBE_MTL);
    let (loader, events) = ModelLoader::new(Arc::new(source), RetryPolicy::once());
    let mut scheduler = FrameScheduler::new(events, CancellationToken::new());
    let mut scene = default_scene();
    let mut backend = MockBackend::sized(640, 480);

    block_on(loader.load_model(0, ModelRequest::named("rock", [1.0, 0.0, 1.0], 1.0)));
    block_on(loader.load_model(1, ModelRequest::named("cube", [2.0, 0.0, 2.0], 1.0)));
    scheduler.run_for(2, 0.0, 16.0, &mut scene, &mut backend);

    assert!(matches!(&scene.models[0], ModelSlot::Failed(reason) if reason.contains("models/rock.obj")));
    assert!(matches!(scene.models[1], ModelSlot::Attached(_)));
    assert_eq!(scene.graph.mesh_count(), 108);
}

#[test]
fn late_completion_for_a_resolved_slot_is_ignored() {
    let (loader, events) = ModelLoader::new(Arc::new(cube_source()), RetryPolicy::once());
    let mut scheduler = FrameScheduler::new(events, CancellationToken::new());
    let mut scene = default_scene();
    let mut backend = MockBackend::sized(640, 480);

    let request = ModelRequest::named("cube", [0.0, 0.0, 30.0], 1.0);
    block_on(loader.load_model(2, request.clone()));
    block_on(loader.load_model(2, request.clone()));
    // no such slot
    block_on(loader.load_model(99, request));
    scheduler.tick(0.0, &mut scene, &mut backend);

    assert_eq!(scene.graph.mesh_count(), 108);
    assert_eq!(scene.attached_models(), 1);
}

#[test]
fn flaky_fetches_are_retried_with_backoff() {
    let source = MockSource::new()
        .with_file("textures/road.png", vec![1, 2, 3])
        .failing_first("textures/road.png", 2);
    let policy = RetryPolicy::default();

    let bytes = block_on(fetch_with_retry(&source, "textures/road.png", &policy)).unwrap();
    assert_eq!(bytes, vec![1, 2, 3]);
    assert_eq!(source.fetched().len(), 3);
}

#[test]
fn retries_give_up_after_the_last_attempt() {
    let source = MockSource::new().with_missing("textures/sky.png");
    let policy = RetryPolicy::default();

    let err = block_on(fetch_with_retry(&source, "textures/sky.png", &policy)).unwrap_err();
    assert_eq!(source.fetched().len() as u32, policy.max_attempts);
    assert!(format!("{:#}", err).contains("giving up on textures/sky.png"));
}

/// Serves the props shipped under `assets/models` from memory.
fn shipped_models() -> MockSource {
    let dir = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join("assets/models");
    let mut source = MockSource::new();
    for entry in std::fs::read_dir(dir).unwrap() {
        let path = entry.unwrap().path();
        let name = path.file_name().unwrap().to_str().unwrap().to_string();
        source = source.with_file(&format!("models/{}", name), std::fs::read(&path).unwrap());
    }
    source
}

fn load_all_in_order(order: &[usize]) -> roadscape::builder::SceneState {
    let requests = SceneLayout::default().models;
    let (loader, events) = ModelLoader::new(Arc::new(shipped_models()), RetryPolicy::once());
    let mut scheduler = FrameScheduler::new(events, CancellationToken::new());
    let mut scene = default_scene();
    let mut backend = MockBackend::sized(640, 480);

    for &slot in order {
        block_on(loader.load_model(slot, requests[slot].clone()));
    }
    scheduler.tick(0.0, &mut scene, &mut backend);
    scene
}

#[test]
fn every_roadside_model_attaches_whatever_the_completion_order() {
    let requests = SceneLayout::default().models;
    let forward: Vec<usize> = (0..requests.len()).collect();
    let reversed: Vec<usize> = forward.iter().rev().copied().collect();
    let interleaved: Vec<usize> = forward
        .iter()
        .filter(|i| *i % 2 == 1)
        .chain(forward.iter().filter(|i| *i % 2 == 0))
        .copied()
        .collect();

    let scenes: Vec<_> = [forward, reversed, interleaved]
        .iter()
        .map(|order| load_all_in_order(order))
        .collect();

    for scene in &scenes {
        assert_eq!(scene.attached_models(), 16);
        assert_eq!(scene.pending_models(), 0);
        assert_eq!(scene.graph.mesh_count(), 107 + 16);
        for (slot, request) in requests.iter().enumerate() {
            let ModelSlot::Attached(id) = scene.models[slot] else {
                panic!("slot {} not attached: {:?}", slot, scene.models[slot]);
            };
            let node = scene.graph.node(id).unwrap();
            assert!(node.cast_shadow);
            assert_eq!(node.transform.position, request.position);
        }
    }
}

#[test]
fn retries_wait_longer_after_each_failure() {
    let source = MockSource::new()
        .with_file("models/rock.obj", vec![0])
        .failing_first("models/rock.obj", 3);
    let policy = RetryPolicy {
        max_attempts: 5,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(300),
    };

    block_on(fetch_with_retry(&source, "models/rock.obj", &policy)).unwrap();
    assert_eq!(
        source.backoffs(),
        vec![
            Duration::from_millis(100),
            Duration::from_millis(200),
            Duration::from_millis(300),
        ]
    );
}
