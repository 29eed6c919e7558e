use roadscape::controls::{CLIP_MIN_DIF, Control, ORBIT_MIN_DIF, debug_panel};

use crate::common::test_utils::default_scene;

mod common;

fn control(folder: &str, label: &str) -> Control {
    debug_panel()
        .into_iter()
        .find(|c| c.folder == folder && c.label == label)
        .unwrap_or_else(|| panic!("no control {folder}/{label}"))
}

#[test]
fn raising_orbit_minimum_pushes_the_maximum() {
    let mut scene = default_scene();
    scene.orbit.max_distance = 20.0;

    control("orbit", "min distance").set_number(&mut scene, 30.0);
    assert_eq!(scene.orbit.min_distance, 30.0);
    assert_eq!(scene.orbit.max_distance, 30.0 + ORBIT_MIN_DIF);
}

#[test]
fn lowering_orbit_maximum_below_the_minimum_is_clamped() {
    let mut scene = default_scene();
    scene.orbit.min_distance = 10.0;

    let max = control("orbit", "max distance");
    max.set_number(&mut scene, 4.0);
    assert_eq!(scene.orbit.min_distance, 10.0);
    assert_eq!(scene.orbit.max_distance, 10.0 + ORBIT_MIN_DIF);

    // setting the same value again changes nothing
    max.set_number(&mut scene, 4.0);
    assert_eq!(scene.orbit.max_distance, 10.0 + ORBIT_MIN_DIF);
}

#[test]
fn clip_planes_keep_their_gap_and_update_the_projection() {
    let mut scene = default_scene();
    let before = scene.camera.projection();

    control("camera", "far").set_number(&mut scene, 0.05);
    assert_eq!(scene.camera.far, scene.camera.near + CLIP_MIN_DIF);
    assert_ne!(scene.camera.projection(), before);

    control("camera", "near").set_number(&mut scene, 5.0);
    assert_eq!(scene.camera.near, 5.0);
    assert_eq!(scene.camera.far, 5.0 + CLIP_MIN_DIF);
}

#[test]
fn fov_change_rebuilds_the_projection() {
    let mut scene = default_scene();
    let before = scene.camera.projection();
    let fov = control("camera", "fov");

    assert!(fov.set_number(&mut scene, 70.0));
    assert_eq!(fov.read_number(&scene), Some(70.0));
    assert_ne!(scene.camera.projection(), before);
}

#[test]
fn light_controls_write_through_to_the_scene() {
    let mut scene = default_scene();

    assert!(control("directional", "cast shadow").set_toggle(&mut scene, false));
    assert!(!scene.lights.directional.cast_shadow);

    assert!(control("hemisphere", "sky color").set_color(&mut scene, [0.1, 0.2, 0.3]));
    assert_eq!(scene.lights.hemisphere.sky_color, [0.1, 0.2, 0.3]);

    control("directional", "y").set_number(&mut scene, 80.0);
    assert_eq!(scene.lights.directional.position.y, 80.0);

    // a colour control does not take numbers
    assert!(!control("ambient", "color").set_number(&mut scene, 1.0));
}

#[test]
fn panel_groups_controls_by_folder() {
    let folders: Vec<_> = debug_panel().iter().map(|c| c.folder).collect();
    for folder in ["camera", "orbit", "ambient", "hemisphere", "directional"] {
        assert!(folders.contains(&folder), "missing folder {folder}");
    }
}
