//! Application event loop.
//!
//! [`run`] opens the window, builds the scene and drives the [`FrameScheduler`] from
//! winit's redraw requests. Model and background loads run on the async executor of
//! the platform (a tokio runtime natively, the browser's microtask queue on the web)
//! and report back over the scheduler's channel.
//!
//! # Lifecycle
//!
//! 1. `resumed` creates the window, GPU context and scene, then spawns the model loads
//! 2. every `RedrawRequested` runs the debug panel and one scheduler tick
//! 3. a `Scheduled` tick requests the next redraw, a torn-down one exits the loop
//! 4. closing the window cancels the scheduler's token

use std::{fmt::Debug, sync::Arc};

use instant::Instant;
use winit::{
    application::ApplicationHandler,
    event::{DeviceEvent, DeviceId, WindowEvent},
    event_loop::{ActiveEventLoop, EventLoop},
    window::{Window, WindowId},
};

use crate::{
    builder::{SceneState, build_scene},
    config::SceneConfig,
    context::Context,
    frame::{CancellationToken, FrameScheduler, SchedulerState},
    layout::SceneLayout,
    render::GpuRenderer,
    resources::{AssetFuture, model::ModelLoader},
};

#[cfg(not(target_arch = "wasm32"))]
type Source = crate::resources::FileSource;
#[cfg(target_arch = "wasm32")]
type Source = crate::resources::HttpSource;

#[cfg(not(target_arch = "wasm32"))]
fn asset_source(config: &SceneConfig) -> Source {
    crate::resources::FileSource::new(config.asset_root.clone())
}

#[cfg(target_arch = "wasm32")]
fn asset_source(_config: &SceneConfig) -> Source {
    crate::resources::HttpSource
}

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

/// Puts asset futures on the platform's executor.
#[derive(Clone)]
struct Spawner {
    #[cfg(not(target_arch = "wasm32"))]
    handle: tokio::runtime::Handle,
}

impl Spawner {
    fn spawn(&self, task: AssetFuture<()>) {
        #[cfg(not(target_arch = "wasm32"))]
        {
            self.handle.spawn(task);
        }
        #[cfg(target_arch = "wasm32")]
        {
            wasm_bindgen_futures::spawn_local(task);
        }
    }
}

/// Everything that exists once initialisation finished.
pub(crate) struct Running {
    renderer: GpuRenderer,
    scene: SceneState,
    scheduler: FrameScheduler,
}

impl Running {
    /// Spawns the roadside model loads and wires the background request.
    fn start(
        renderer: GpuRenderer,
        scene: SceneState,
        source: Source,
        layout: &SceneLayout,
        config: &SceneConfig,
        spawner: Spawner,
    ) -> Self {
        let (loader, events) = ModelLoader::new(Arc::new(source), config.retry.clone());
        for (slot, request) in layout.models.iter().cloned().enumerate() {
            spawner.spawn(loader.load_model(slot, request));
        }
        log::info!("requested {} roadside models", layout.models.len());

        let background = config.background.clone();
        let mut scheduler = FrameScheduler::new(events, CancellationToken::new())
            .with_background_request(move || {
                log::info!("requesting background {}", background);
                spawner.spawn(loader.load_background(&background));
            });
        scheduler.start();

        Self {
            renderer,
            scene,
            scheduler,
        }
    }
}

pub(crate) enum FlowEvent {
    /// Sent by the web build once the async initialisation finished.
    #[allow(dead_code)]
    Initialized(Box<Running>),
    #[allow(dead_code)]
    Failed(anyhow::Error),
}

impl Debug for FlowEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Initialized(_) => f.write_str("Initialized"),
            Self::Failed(e) => f.debug_tuple("Failed").field(e).finish(),
        }
    }
}

pub(crate) struct App {
    #[cfg(not(target_arch = "wasm32"))]
    async_runtime: tokio::runtime::Runtime,
    #[allow(dead_code)]
    proxy: winit::event_loop::EventLoopProxy<FlowEvent>,
    config: Option<SceneConfig>,
    running: Option<Running>,
    started_at: Instant,
    error: Option<anyhow::Error>,
}

impl App {
    fn new(event_loop: &EventLoop<FlowEvent>, config: SceneConfig) -> anyhow::Result<Self> {
        let proxy = event_loop.create_proxy();
        #[cfg(not(target_arch = "wasm32"))]
        let async_runtime = tokio::runtime::Runtime::new()?;
        Ok(Self {
            #[cfg(not(target_arch = "wasm32"))]
            async_runtime,
            proxy,
            config: Some(config),
            running: None,
            started_at: Instant::now(),
            error: None,
        })
    }

    fn spawner(&self) -> Spawner {
        Spawner {
            #[cfg(not(target_arch = "wasm32"))]
            handle: self.async_runtime.handle().clone(),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: anyhow::Error) {
        log::error!("could not start: {:#}", error);
        self.error = Some(error);
        event_loop.exit();
    }

    fn on_initialized(&mut self, running: Running) {
        running.renderer.window().request_redraw();
        log::info!(
            "scene ready with {} meshes, waiting for {} models",
            running.scene.graph.mesh_count(),
            running.scene.pending_models()
        );
        self.running = Some(running);
    }

    fn redraw(&mut self, event_loop: &ActiveEventLoop) {
        let Some(running) = &mut self.running else {
            return;
        };
        running.renderer.prepare_overlay(&mut running.scene);
        let now_ms = self.started_at.elapsed().as_secs_f64() * 1000.0;
        match running
            .scheduler
            .tick(now_ms, &mut running.scene, &mut running.renderer)
        {
            SchedulerState::Scheduled => running.renderer.window().request_redraw(),
            SchedulerState::TornDown => event_loop.exit(),
            SchedulerState::Idle | SchedulerState::Rendering => {}
        }
    }
}

impl ApplicationHandler<FlowEvent> for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        // resumed fires again after a suspend on some platforms
        let Some(config) = self.config.take() else {
            return;
        };

        #[allow(unused_mut)]
        let mut window_attributes = Window::default_attributes()
            .with_title(config.title.clone())
            .with_inner_size(winit::dpi::LogicalSize::new(config.width, config.height));

        #[cfg(target_arch = "wasm32")]
        {
            use wasm_bindgen::JsCast;
            use winit::platform::web::WindowAttributesExtWebSys;

            const CANVAS_ID: &str = "canvas";

            let canvas = web_sys::window()
                .and_then(|window| window.document())
                .and_then(|document| document.get_element_by_id(CANVAS_ID));
            match canvas {
                Some(canvas) => {
                    window_attributes =
                        window_attributes.with_canvas(Some(canvas.unchecked_into()));
                }
                None => log::warn!("no #{} element, letting winit create a canvas", CANVAS_ID),
            }
        }

        let window = match event_loop.create_window(window_attributes) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                return self.fail(event_loop, anyhow::anyhow!("could not create window: {}", e));
            }
        };

        let spawner = self.spawner();
        let init_future = async move {
            let ctx = Context::new(window, config.clear_color).await?;
            let (width, height) = (ctx.config.width, ctx.config.height);
            let aspect = width as f32 / height.max(1) as f32;

            let layout = SceneLayout::default();
            let source = asset_source(&config);
            let scene = build_scene(&source, &layout, &config.retry, aspect).await?;
            let renderer = GpuRenderer::new(ctx, &scene, config.overlay_key);
            anyhow::Ok(Running::start(
                renderer, scene, source, &layout, &config, spawner,
            ))
        };

        #[cfg(not(target_arch = "wasm32"))]
        {
            match self.async_runtime.block_on(init_future) {
                Ok(running) => self.on_initialized(running),
                Err(e) => self.fail(event_loop, e),
            }
        }

        #[cfg(target_arch = "wasm32")]
        {
            let proxy = self.proxy.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let event = match init_future.await {
                    Ok(running) => FlowEvent::Initialized(Box::new(running)),
                    Err(e) => FlowEvent::Failed(e),
                };
                if proxy.send_event(event).is_err() {
                    log::error!("event loop closed before the scene was ready");
                }
            });
        }
    }

    fn user_event(&mut self, event_loop: &ActiveEventLoop, event: FlowEvent) {
        match event {
            FlowEvent::Initialized(running) => self.on_initialized(*running),
            FlowEvent::Failed(e) => self.fail(event_loop, e),
        }
    }

    fn device_event(
        &mut self,
        _event_loop: &ActiveEventLoop,
        _device_id: DeviceId,
        event: DeviceEvent,
    ) {
        if let (Some(running), DeviceEvent::MouseMotion { delta }) = (&mut self.running, event) {
            running.scene.orbit.handle_mouse_motion(delta.0, delta.1);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if matches!(event, WindowEvent::RedrawRequested) {
            return self.redraw(event_loop);
        }
        let Some(running) = &mut self.running else {
            if matches!(event, WindowEvent::CloseRequested) {
                event_loop.exit();
            }
            return;
        };

        match event {
            WindowEvent::CloseRequested => {
                running.scheduler.token().cancel();
                event_loop.exit();
            }
            // the next tick compares sizes and resizes the buffer itself
            WindowEvent::Resized(_) => running.renderer.window().request_redraw(),
            event => {
                if running.renderer.handle_window_event(&event) {
                    running.scene.orbit.handle_captured_event(&event);
                } else {
                    running.scene.orbit.handle_window_event(&event);
                }
            }
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(running) = &self.running {
            running.scheduler.token().cancel();
            log::info!("rendered {} frames", running.scheduler.frames());
        }
    }
}

fn init_logging() {
    #[cfg(not(target_arch = "wasm32"))]
    {
        if let Err(e) = env_logger::try_init() {
            println!("Warning: Could not initialize logger: {}", e);
        };
    }

    #[cfg(target_arch = "wasm32")]
    {
        if console_log::init_with_level(log::Level::Info).is_err() {
            log::warn!("logger was already initialized");
        }
    }
}

/// Opens the window and renders the roadside scene until it is closed.
pub fn run(config: SceneConfig) -> anyhow::Result<()> {
    init_logging();

    let event_loop: EventLoop<FlowEvent> = EventLoop::with_user_event().build()?;
    let mut app = App::new(&event_loop, config)?;

    event_loop.run_app(&mut app)?;

    match app.error.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}

#[cfg(target_arch = "wasm32")]
#[wasm_bindgen(start)]
pub fn run_web() -> Result<(), JsValue> {
    run(SceneConfig::default()).map_err(|e| JsValue::from_str(&format!("{:#}", e)))
}
