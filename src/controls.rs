//! Data-bound debug controls.
//!
//! A [`Control`] is a label plus explicit read and write functions over the scene state
//! and an optional callback that runs after every write. The panel owns no values of its
//! own, so whatever edits the state (the overlay, a test) goes through the same bindings.

use crate::builder::SceneState;

pub type Read<T> = fn(&SceneState) -> T;
pub type Write<T> = fn(&mut SceneState, T);

#[derive(Clone, Copy)]
pub enum Binding {
    Number {
        read: Read<f32>,
        write: Write<f32>,
        range: (f32, f32),
        step: f32,
    },
    Color {
        read: Read<[f32; 3]>,
        write: Write<[f32; 3]>,
    },
    Toggle {
        read: Read<bool>,
        write: Write<bool>,
    },
}

#[derive(Clone, Copy)]
pub struct Control {
    pub folder: &'static str,
    pub label: &'static str,
    pub binding: Binding,
    pub on_change: Option<fn(&mut SceneState)>,
}

impl std::fmt::Debug for Control {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Control")
            .field("folder", &self.folder)
            .field("label", &self.label)
            .finish()
    }
}

impl Control {
    pub fn number(
        folder: &'static str,
        label: &'static str,
        read: Read<f32>,
        write: Write<f32>,
        range: (f32, f32),
        step: f32,
    ) -> Self {
        Self {
            folder,
            label,
            binding: Binding::Number {
                read,
                write,
                range,
                step,
            },
            on_change: None,
        }
    }

    pub fn color(
        folder: &'static str,
        label: &'static str,
        read: Read<[f32; 3]>,
        write: Write<[f32; 3]>,
    ) -> Self {
        Self {
            folder,
            label,
            binding: Binding::Color { read, write },
            on_change: None,
        }
    }

    pub fn toggle(
        folder: &'static str,
        label: &'static str,
        read: Read<bool>,
        write: Write<bool>,
    ) -> Self {
        Self {
            folder,
            label,
            binding: Binding::Toggle { read, write },
            on_change: None,
        }
    }

    pub fn on_change(mut self, callback: fn(&mut SceneState)) -> Self {
        self.on_change = Some(callback);
        self
    }

    pub fn read_number(&self, state: &SceneState) -> Option<f32> {
        match self.binding {
            Binding::Number { read, .. } => Some(read(state)),
            _ => None,
        }
    }

    /// Writes through the binding and fires `on_change`. Returns false when the
    /// control holds a different kind of value.
    pub fn set_number(&self, state: &mut SceneState, value: f32) -> bool {
        match self.binding {
            Binding::Number { write, .. } => {
                write(state, value);
                self.changed(state);
                true
            }
            _ => false,
        }
    }

    pub fn set_color(&self, state: &mut SceneState, value: [f32; 3]) -> bool {
        match self.binding {
            Binding::Color { write, .. } => {
                write(state, value);
                self.changed(state);
                true
            }
            _ => false,
        }
    }

    pub fn set_toggle(&self, state: &mut SceneState, value: bool) -> bool {
        match self.binding {
            Binding::Toggle { write, .. } => {
                write(state, value);
                self.changed(state);
                true
            }
            _ => false,
        }
    }

    fn changed(&self, state: &mut SceneState) {
        if let Some(callback) = self.on_change {
            callback(state);
        }
    }
}

/// Lower and upper bound kept at least `min_dif` apart.
///
/// Raising `min` pushes `max` up. Lowering `max` below the gap is undone by re-running
/// the `min` setter, so `max` ends up at `min + min_dif`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MinMax {
    pub min: f32,
    pub max: f32,
    pub min_dif: f32,
}

impl MinMax {
    pub fn new(min: f32, max: f32, min_dif: f32) -> Self {
        let mut range = Self { min, max, min_dif };
        range.set_min(min);
        range
    }

    pub fn set_min(&mut self, v: f32) {
        self.min = v;
        self.max = self.max.max(self.min + self.min_dif);
    }

    pub fn set_max(&mut self, v: f32) {
        self.max = v;
        self.set_min(self.min);
    }
}

fn update_projection(state: &mut SceneState) {
    state.camera.update_projection_matrix();
}

fn orbit_range(state: &SceneState) -> MinMax {
    MinMax {
        min: state.orbit.min_distance,
        max: state.orbit.max_distance,
        min_dif: ORBIT_MIN_DIF,
    }
}

fn store_orbit_range(state: &mut SceneState, range: MinMax) {
    state.orbit.min_distance = range.min;
    state.orbit.max_distance = range.max;
}

fn camera_range(state: &SceneState) -> MinMax {
    MinMax {
        min: state.camera.near,
        max: state.camera.far,
        min_dif: CLIP_MIN_DIF,
    }
}

fn store_camera_range(state: &mut SceneState, range: MinMax) {
    state.camera.near = range.min;
    state.camera.far = range.max;
}

pub const ORBIT_MIN_DIF: f32 = 1.0;
pub const CLIP_MIN_DIF: f32 = 0.1;

/// Every control the debug panel shows.
pub fn debug_panel() -> Vec<Control> {
    vec![
        Control::number(
            "camera",
            "fov",
            |s| s.camera.fov,
            |s, v| s.camera.fov = v,
            (10.0, 120.0),
            1.0,
        )
        .on_change(update_projection),
        Control::number(
            "camera",
            "near",
            |s| s.camera.near,
            |s, v| {
                let mut range = camera_range(s);
                range.set_min(v);
                store_camera_range(s, range);
            },
            (0.01, 10.0),
            0.01,
        )
        .on_change(update_projection),
        Control::number(
            "camera",
            "far",
            |s| s.camera.far,
            |s, v| {
                let mut range = camera_range(s);
                range.set_max(v);
                store_camera_range(s, range);
            },
            (1.0, 2000.0),
            1.0,
        )
        .on_change(update_projection),
        Control::number(
            "orbit",
            "min distance",
            |s| s.orbit.min_distance,
            |s, v| {
                let mut range = orbit_range(s);
                range.set_min(v);
                store_orbit_range(s, range);
            },
            (0.5, 200.0),
            0.5,
        ),
        Control::number(
            "orbit",
            "max distance",
            |s| s.orbit.max_distance,
            |s, v| {
                let mut range = orbit_range(s);
                range.set_max(v);
                store_orbit_range(s, range);
            },
            (1.0, 500.0),
            0.5,
        ),
        Control::color(
            "ambient",
            "color",
            |s| s.lights.ambient.color,
            |s, v| s.lights.ambient.color = v,
        ),
        Control::number(
            "ambient",
            "intensity",
            |s| s.lights.ambient.intensity,
            |s, v| s.lights.ambient.intensity = v,
            (0.0, 2.0),
            0.01,
        ),
        Control::color(
            "hemisphere",
            "sky color",
            |s| s.lights.hemisphere.sky_color,
            |s, v| s.lights.hemisphere.sky_color = v,
        ),
        Control::color(
            "hemisphere",
            "ground color",
            |s| s.lights.hemisphere.ground_color,
            |s, v| s.lights.hemisphere.ground_color = v,
        ),
        Control::number(
            "hemisphere",
            "intensity",
            |s| s.lights.hemisphere.intensity,
            |s, v| s.lights.hemisphere.intensity = v,
            (0.0, 2.0),
            0.01,
        ),
        Control::color(
            "directional",
            "color",
            |s| s.lights.directional.color,
            |s, v| s.lights.directional.color = v,
        ),
        Control::number(
            "directional",
            "intensity",
            |s| s.lights.directional.intensity,
            |s, v| s.lights.directional.intensity = v,
            (0.0, 4.0),
            0.01,
        ),
        Control::number(
            "directional",
            "x",
            |s| s.lights.directional.position.x,
            |s, v| s.lights.directional.position.x = v,
            (-100.0, 100.0),
            0.5,
        ),
        Control::number(
            "directional",
            "y",
            |s| s.lights.directional.position.y,
            |s, v| s.lights.directional.position.y = v,
            (1.0, 100.0),
            0.5,
        ),
        Control::number(
            "directional",
            "z",
            |s| s.lights.directional.position.z,
            |s, v| s.lights.directional.position.z = v,
            (-100.0, 100.0),
            0.5,
        ),
        Control::toggle(
            "directional",
            "cast shadow",
            |s| s.lights.directional.cast_shadow,
            |s, v| s.lights.directional.cast_shadow = v,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raising_min_pushes_max() {
        let mut range = MinMax::new(1.0, 10.0, 0.5);
        range.set_min(12.0);
        assert_eq!(range.max, 12.5);
        range.set_min(2.0);
        assert_eq!(range.max, 12.5);
    }

    #[test]
    fn max_below_min_is_clamped_to_gap() {
        let mut range = MinMax::new(4.0, 10.0, 1.0);
        range.set_max(2.0);
        assert_eq!(range, MinMax::new(4.0, 5.0, 1.0));
        assert_eq!(range.max, 5.0);
    }

    #[test]
    fn setters_are_idempotent() {
        let mut range = MinMax::new(3.0, 8.0, 1.0);
        range.set_max(3.5);
        let once = range;
        range.set_max(3.5);
        assert_eq!(range, once);
        range.set_min(7.5);
        let once = range;
        range.set_min(7.5);
        assert_eq!(range, once);
    }
}
