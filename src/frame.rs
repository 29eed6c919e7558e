//! The per-frame loop.
//!
//! The platform calls [`FrameScheduler::tick`] once per display refresh. Each tick
//! folds finished asset loads into the scene, follows surface resizes, advances the
//! animation phases, assigns the background, updates the orbit camera and renders one
//! frame. Ticking stops for good once the [`CancellationToken`] fires.

use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};

use futures::{FutureExt, StreamExt};

use crate::{
    builder::{BackgroundSlot, SceneState},
    camera::PerspectiveCamera,
    resources::model::{LoadEvent, LoadEvents, ModelSlot},
};

/// Where frames end up. Sizes are in physical pixels.
pub trait DisplaySurface {
    /// Size the surface currently occupies on screen.
    fn displayed_size(&self) -> (u32, u32);
    /// Size of the buffer frames are rendered into.
    fn buffer_size(&self) -> (u32, u32);
    fn resize_buffer(&mut self, width: u32, height: u32);
}

pub trait FrameRenderer {
    /// Draws the scene once from its camera.
    fn render(&mut self, scene: &SceneState) -> anyhow::Result<()>;
}

/// Shared stop flag. Clones observe the same cancellation.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    Scheduled,
    Rendering,
    TornDown,
}

/// Animation values of the last tick, in radians.
///
/// Only the wheel and sun phases are applied to transforms. The tile, body and tank
/// phases are computed and kept here but move nothing.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct AnimationPhases {
    pub time: f32,
    pub road: Vec<f32>,
    pub grass_left: Vec<f32>,
    pub grass_right: Vec<f32>,
    pub body: f32,
    pub tank: f32,
    pub wheel: f32,
    pub sun: f32,
}

/// Speed multiplier of the tile group at `index`.
pub fn tile_speed(index: usize) -> f32 {
    1.0 + index as f32 * 0.1
}

pub struct FrameScheduler {
    state: SchedulerState,
    token: CancellationToken,
    events: LoadEvents,
    request_background: Option<Box<dyn FnOnce()>>,
    frames: u64,
}

impl std::fmt::Debug for FrameScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameScheduler")
            .field("state", &self.state)
            .field("frames", &self.frames)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}

impl FrameScheduler {
    /// `events` is the receiving end the asset loaders report to.
    pub fn new(events: LoadEvents, token: CancellationToken) -> Self {
        Self {
            state: SchedulerState::Idle,
            token,
            events,
            request_background: None,
            frames: 0,
        }
    }

    /// Called the first time a tick finds the background unrequested.
    pub fn with_background_request(mut self, request: impl FnOnce() + 'static) -> Self {
        self.request_background = Some(Box::new(request));
        self
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn start(&mut self) {
        if self.state == SchedulerState::Idle {
            self.state = SchedulerState::Scheduled;
        }
    }

    /// Runs one frame. Returns the state afterwards: `Scheduled` means the caller
    /// should ask for the next frame, `TornDown` that it must not.
    pub fn tick<B>(&mut self, timestamp_ms: f64, scene: &mut SceneState, backend: &mut B) -> SchedulerState
    where
        B: DisplaySurface + FrameRenderer,
    {
        if self.token.is_cancelled() {
            self.tear_down();
        }
        match self.state {
            SchedulerState::TornDown => return self.state,
            SchedulerState::Idle => self.start(),
            _ => {}
        }
        self.state = SchedulerState::Rendering;

        self.drain_completions(scene);

        let time = (timestamp_ms / 1000.0) as f32;
        handle_resize(backend, &mut scene.camera);
        advance_animation(scene, time);
        self.update_background(scene);
        scene.orbit.update(&mut scene.camera);

        if let Err(e) = backend.render(scene) {
            log::error!("frame {} failed to render: {:#}", self.frames, e);
        }
        self.frames += 1;

        if self.token.is_cancelled() {
            self.tear_down();
        } else {
            self.state = SchedulerState::Scheduled;
        }
        self.state
    }

    /// Ticks up to `frames` times with evenly spaced timestamps and returns how many
    /// frames were rendered.
    pub fn run_for<B>(
        &mut self,
        frames: usize,
        start_ms: f64,
        frame_ms: f64,
        scene: &mut SceneState,
        backend: &mut B,
    ) -> u64
    where
        B: DisplaySurface + FrameRenderer,
    {
        let before = self.frames;
        self.start();
        for i in 0..frames {
            if self.tick(start_ms + i as f64 * frame_ms, scene, backend) == SchedulerState::TornDown {
                break;
            }
        }
        self.frames - before
    }

    fn tear_down(&mut self) {
        if self.state != SchedulerState::TornDown {
            log::info!("frame loop stopped after {} frames", self.frames);
        }
        self.state = SchedulerState::TornDown;
    }

    /// Attaches whatever the loaders finished since the last frame.
    fn drain_completions(&mut self, scene: &mut SceneState) {
        while let Some(Some(event)) = self.events.next().now_or_never() {
            apply_load_event(scene, event);
        }
    }

    fn update_background(&mut self, scene: &mut SceneState) {
        match scene.background {
            BackgroundSlot::NotRequested => {
                if let Some(request) = self.request_background.take() {
                    request();
                    scene.background = BackgroundSlot::Loading;
                }
            }
            BackgroundSlot::Ready(texture) => {
                if scene.graph.environment() != Some(texture) {
                    scene.graph.set_environment(texture);
                    log::info!("background assigned");
                }
            }
            BackgroundSlot::Loading | BackgroundSlot::Failed(_) => {}
        }
    }
}

pub fn apply_load_event(scene: &mut SceneState, event: LoadEvent) {
    match event {
        LoadEvent::Model {
            slot,
            request,
            result,
        } => {
            let Some(current) = scene.models.get(slot) else {
                log::warn!("dropping {}: no model slot {}", request.name(), slot);
                return;
            };
            if *current != ModelSlot::Pending {
                log::warn!("model slot {} already resolved, ignoring {}", slot, request.name());
                return;
            }
            scene.models[slot] = match result {
                Ok(model) => {
                    let id = model.attach(&mut scene.graph, &request);
                    log::info!("attached {} at {:?}", request.name(), request.position);
                    ModelSlot::Attached(id)
                }
                Err(e) => ModelSlot::Failed(format!("{:#}", e)),
            };
        }
        LoadEvent::Background(result) => {
            if scene.background != BackgroundSlot::Loading {
                log::warn!("unexpected background completion while {:?}", scene.background);
                return;
            }
            scene.background = match result {
                Ok(img) => BackgroundSlot::Ready(scene.graph.add_texture(img)),
                Err(e) => {
                    log::error!("background failed to load: {:#}", e);
                    BackgroundSlot::Failed(format!("{:#}", e))
                }
            };
        }
    }
}

/// Resizes the buffer to the displayed size when they differ. Returns whether it did.
pub fn handle_resize<S: DisplaySurface + ?Sized>(surface: &mut S, camera: &mut PerspectiveCamera) -> bool {
    let (width, height) = surface.displayed_size();
    if width == 0 || height == 0 || surface.buffer_size() == (width, height) {
        return false;
    }
    surface.resize_buffer(width, height);
    camera.aspect = width as f32 / height as f32;
    camera.update_projection_matrix();
    log::info!("resized to {}x{}", width, height);
    true
}

pub fn advance_animation(scene: &mut SceneState, time: f32) {
    let phases = &mut scene.phases;
    phases.time = time;

    // stored for inspection, no transform reads them
    let row = |groups: &[crate::builder::TileGroup]| {
        groups
            .iter()
            .map(|group| time * tile_speed(group.index))
            .collect::<Vec<_>>()
    };
    phases.road = row(&scene.road);
    phases.grass_left = row(&scene.grass_left);
    phases.grass_right = row(&scene.grass_right);
    phases.body = time;
    phases.tank = time;

    phases.wheel = time;
    for wheel in scene.vehicle.wheels {
        scene.graph.transform(wheel, |t| t.set_euler(time, time, 0.0));
    }
    phases.sun = time;
    scene.graph.transform(scene.sun, |t| t.set_euler(time, time, 0.0));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tile_speed_grows_with_index() {
        assert_eq!(tile_speed(0), 1.0);
        assert!((tile_speed(10) - 2.0).abs() < 1e-6);
    }

    #[test]
    fn cancelling_a_clone_cancels_the_original() {
        let token = CancellationToken::new();
        let clone = token.clone();
        assert!(!token.is_cancelled());
        clone.cancel();
        assert!(token.is_cancelled());
    }
}
