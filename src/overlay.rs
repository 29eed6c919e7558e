//! Debug panel drawn with egui on top of the scene.
//!
//! The panel renders [`crate::controls::debug_panel`] grouped by folder and edits the
//! scene state through the controls' bindings. Rendering is split into phases because
//! `egui_wgpu::Renderer::render()` needs a `RenderPass<'static>`:
//!
//!   1. `prepare()` runs the UI against the scene state and tessellates
//!   2. `upload()` updates textures and buffers through the frame's encoder
//!   3. `paint()` draws into a pass created with `forget_lifetime()`
//!   4. `cleanup()` frees textures egui no longer references

use winit::{
    event::{ElementState, KeyEvent, WindowEvent},
    keyboard::{KeyCode, PhysicalKey},
    window::Window,
};

use crate::{
    builder::SceneState,
    controls::{Binding, Control},
};

/// Tessellated output of one `prepare()`, consumed by the next frame.
pub struct PreparedOverlay {
    pub primitives: Vec<egui::ClippedPrimitive>,
    pub textures_delta: egui::TexturesDelta,
    pub pixels_per_point: f32,
}

pub struct DebugOverlay {
    pub egui_ctx: egui::Context,
    pub egui_winit_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,
    pub visible: bool,
    toggle_key: KeyCode,
    controls: Vec<Control>,
}

impl DebugOverlay {
    pub fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        window: &Window,
        toggle_key: KeyCode,
        controls: Vec<Control>,
    ) -> Self {
        let egui_ctx = egui::Context::default();
        let egui_winit_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui_ctx.viewport_id(),
            window,
            None,
            None,
            None,
        );
        let egui_renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self {
            egui_ctx,
            egui_winit_state,
            egui_renderer,
            visible: true,
            toggle_key,
            controls,
        }
    }

    /// Returns true when the event was used by the panel and should not reach the
    /// orbit controls.
    pub fn handle_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        if let WindowEvent::KeyboardInput {
            event:
                KeyEvent {
                    physical_key: PhysicalKey::Code(code),
                    state: ElementState::Pressed,
                    repeat: false,
                    ..
                },
            ..
        } = event
        {
            if *code == self.toggle_key {
                self.toggle();
                return true;
            }
        }
        let response = self.egui_winit_state.on_window_event(window, event);
        self.visible && response.consumed
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
        log::info!("debug panel: {}", if self.visible { "on" } else { "off" });
    }

    pub fn prepare(&mut self, window: &Window, scene: &mut SceneState) -> PreparedOverlay {
        let raw_input = self.egui_winit_state.take_egui_input(window);
        let visible = self.visible;
        let controls = &self.controls;
        let full_output = self.egui_ctx.run(raw_input, |ctx| {
            if !visible {
                return;
            }
            egui::Window::new("Debug")
                .default_pos([10.0, 10.0])
                .show(ctx, |ui| {
                    let mut folders: Vec<&'static str> = Vec::new();
                    for control in controls {
                        if !folders.contains(&control.folder) {
                            folders.push(control.folder);
                        }
                    }
                    for folder in folders {
                        egui::CollapsingHeader::new(folder)
                            .default_open(true)
                            .show(ui, |ui| {
                                for control in controls.iter().filter(|c| c.folder == folder) {
                                    control_widget(ui, control, scene);
                                }
                            });
                    }
                });
        });

        self.egui_winit_state
            .handle_platform_output(window, full_output.platform_output);

        let primitives = self
            .egui_ctx
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        PreparedOverlay {
            primitives,
            textures_delta: full_output.textures_delta,
            pixels_per_point: full_output.pixels_per_point,
        }
    }

    /// Upload textures and update buffers. Call before creating the egui render pass.
    pub fn upload(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        prepared: &PreparedOverlay,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        for (id, image_delta) in &prepared.textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer.update_buffers(
            device,
            queue,
            encoder,
            &prepared.primitives,
            screen_descriptor,
        );
    }

    pub fn paint(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        prepared: &PreparedOverlay,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, &prepared.primitives, screen_descriptor);
    }

    pub fn cleanup(&mut self, prepared: &PreparedOverlay) {
        for id in &prepared.textures_delta.free {
            self.egui_renderer.free_texture(id);
        }
    }
}

fn control_widget(ui: &mut egui::Ui, control: &Control, scene: &mut SceneState) {
    match control.binding {
        Binding::Number {
            read, range, step, ..
        } => {
            let mut value = read(scene);
            let slider = egui::Slider::new(&mut value, range.0..=range.1)
                .step_by(step as f64)
                .text(control.label);
            if ui.add(slider).changed() {
                control.set_number(scene, value);
            }
        }
        Binding::Color { read, .. } => {
            let mut value = read(scene);
            let changed = ui
                .horizontal(|ui| {
                    let changed = ui.color_edit_button_rgb(&mut value).changed();
                    ui.label(control.label);
                    changed
                })
                .inner;
            if changed {
                control.set_color(scene, value);
            }
        }
        Binding::Toggle { read, .. } => {
            let mut value = read(scene);
            if ui.checkbox(&mut value, control.label).changed() {
                control.set_toggle(scene, value);
            }
        }
    }
}
