//! Perspective camera, orbit control and the camera uniform.

use std::f32::consts::FRAC_PI_2;

use cgmath::{InnerSpace, Matrix4, Point3, Vector3, perspective};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

const SAFE_FRAC_PI_2: f32 = FRAC_PI_2 - 0.0001;

/// Camera with a vertical field of view in degrees. After changing `fov`, `aspect`,
/// `near` or `far`, call [`PerspectiveCamera::update_projection_matrix`].
#[derive(Clone, Debug, PartialEq)]
pub struct PerspectiveCamera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub fov: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4<f32>,
}

impl PerspectiveCamera {
    pub fn new(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut camera = Self {
            position: Point3::new(0.0, 20.0, 40.0),
            target: Point3::new(0.0, 0.0, 0.0),
            fov,
            aspect,
            near,
            far,
            projection: Matrix4::from_scale(1.0),
        };
        camera.update_projection_matrix();
        camera
    }

    pub fn update_projection_matrix(&mut self) {
        self.projection = perspective(cgmath::Deg(self.fov), self.aspect, self.near, self.far);
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn view(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.position, self.target, Vector3::unit_y())
    }

    pub fn view_proj(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * self.projection * self.view()
    }
}

#[repr(C)]
#[derive(Debug, Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
pub struct CameraUniform {
    pub view_position: [f32; 4],
    pub view_proj: [[f32; 4]; 4],
    /// Inverse of the rotation-only view projection, used to look up the panorama.
    pub inv_view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    pub fn new() -> Self {
        use cgmath::SquareMatrix;
        Self {
            view_position: [0.0; 4],
            view_proj: Matrix4::identity().into(),
            inv_view_proj: Matrix4::identity().into(),
        }
    }

    pub fn update_view_proj(&mut self, camera: &PerspectiveCamera) {
        use cgmath::SquareMatrix;
        self.view_position = camera.position.to_homogeneous().into();
        self.view_proj = camera.view_proj().into();
        let mut rotation_only = camera.view();
        rotation_only.w = cgmath::Vector4::unit_w();
        let inv = (OPENGL_TO_WGPU_MATRIX * camera.projection() * rotation_only)
            .invert()
            .unwrap_or_else(Matrix4::identity);
        self.inv_view_proj = inv.into();
    }
}

impl Default for CameraUniform {
    fn default() -> Self {
        Self::new()
    }
}

/// Rotates around `target` with the left mouse button, zooms with the wheel.
///
/// Input is accumulated as it arrives and only applied in [`OrbitControls::update`],
/// once per frame.
#[derive(Clone, Debug)]
pub struct OrbitControls {
    pub target: Point3<f32>,
    pub min_distance: f32,
    pub max_distance: f32,
    pub rotate_speed: f32,
    pub zoom_speed: f32,
    pub enabled: bool,
    yaw: f32,
    pitch: f32,
    distance: f32,
    dragging: bool,
    pending_rotation: (f32, f32),
    pending_zoom: f32,
}

impl OrbitControls {
    /// Starts from the camera's current placement relative to `target`.
    pub fn new(camera: &PerspectiveCamera, target: Point3<f32>) -> Self {
        let offset = camera.position - target;
        let distance = offset.magnitude().max(f32::EPSILON);
        Self {
            target,
            min_distance: 1.0,
            max_distance: 250.0,
            rotate_speed: 0.005,
            zoom_speed: 0.1,
            enabled: true,
            yaw: offset.x.atan2(offset.z),
            pitch: (offset.y / distance).clamp(-1.0, 1.0).asin(),
            distance,
            dragging: false,
            pending_rotation: (0.0, 0.0),
            pending_zoom: 0.0,
        }
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    pub fn handle_window_event(&mut self, event: &WindowEvent) {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.dragging = *state == ElementState::Pressed,
            WindowEvent::MouseWheel { delta, .. } => {
                let scroll = match delta {
                    MouseScrollDelta::LineDelta(_, y) => *y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                self.pending_zoom += scroll;
            }
            _ => {}
        }
    }

    /// For events the debug panel kept. A left-button release still ends a drag that
    /// started over the scene.
    pub fn handle_captured_event(&mut self, event: &WindowEvent) {
        if let WindowEvent::MouseInput {
            state: ElementState::Released,
            button: MouseButton::Left,
            ..
        } = event
        {
            self.dragging = false;
        }
    }

    /// Raw mouse motion; only counts while the rotate button is held.
    pub fn handle_mouse_motion(&mut self, dx: f64, dy: f64) {
        if self.dragging {
            self.pending_rotation.0 += dx as f32;
            self.pending_rotation.1 += dy as f32;
        }
    }

    pub fn update(&mut self, camera: &mut PerspectiveCamera) {
        if self.enabled {
            let (dx, dy) = std::mem::take(&mut self.pending_rotation);
            self.yaw -= dx * self.rotate_speed;
            self.pitch = (self.pitch + dy * self.rotate_speed).clamp(-SAFE_FRAC_PI_2, SAFE_FRAC_PI_2);
            let zoom = std::mem::take(&mut self.pending_zoom);
            self.distance *= 1.0 - zoom * self.zoom_speed;
        } else {
            self.pending_rotation = (0.0, 0.0);
            self.pending_zoom = 0.0;
        }
        self.distance = self
            .distance
            .clamp(self.min_distance, self.max_distance.max(self.min_distance));

        let (sin_pitch, cos_pitch) = self.pitch.sin_cos();
        let (sin_yaw, cos_yaw) = self.yaw.sin_cos();
        let offset = Vector3::new(cos_pitch * sin_yaw, sin_pitch, cos_pitch * cos_yaw) * self.distance;
        camera.position = self.target + offset;
        camera.target = self.target;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::EuclideanSpace;

    #[test]
    fn orbit_keeps_distance_to_target() {
        let mut camera = PerspectiveCamera::new(45.0, 1.5, 0.1, 1000.0);
        camera.position = Point3::new(0.0, 30.0, 40.0);
        let mut controls = OrbitControls::new(&camera, Point3::origin());
        controls.handle_window_event(&WindowEvent::MouseInput {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        controls.handle_mouse_motion(120.0, -40.0);
        controls.update(&mut camera);
        assert!(((camera.position - Point3::origin()).magnitude() - 50.0).abs() < 1e-3);
        assert_eq!(camera.target, Point3::origin());
    }

    #[test]
    fn release_over_the_panel_ends_the_drag() {
        let mut camera = PerspectiveCamera::new(45.0, 1.5, 0.1, 1000.0);
        camera.position = Point3::new(0.0, 30.0, 40.0);
        let mut controls = OrbitControls::new(&camera, Point3::origin());
        let button = |state| WindowEvent::MouseInput {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            state,
            button: MouseButton::Left,
        };
        controls.handle_window_event(&button(ElementState::Pressed));
        controls.handle_captured_event(&button(ElementState::Released));
        controls.handle_mouse_motion(120.0, -40.0);
        controls.update(&mut camera);
        assert!((camera.position - Point3::new(0.0, 30.0, 40.0)).magnitude() < 1e-3);

        // a press the panel kept never starts a drag
        controls.handle_captured_event(&button(ElementState::Pressed));
        controls.handle_mouse_motion(120.0, -40.0);
        controls.update(&mut camera);
        assert!((camera.position - Point3::new(0.0, 30.0, 40.0)).magnitude() < 1e-3);
    }

    #[test]
    fn zoom_is_clamped() {
        let mut camera = PerspectiveCamera::new(45.0, 1.5, 0.1, 1000.0);
        let mut controls = OrbitControls::new(&camera, Point3::origin());
        controls.max_distance = 60.0;
        controls.handle_window_event(&WindowEvent::MouseWheel {
            device_id: unsafe { winit::event::DeviceId::dummy() },
            delta: MouseScrollDelta::LineDelta(0.0, -100.0),
            phase: winit::event::TouchPhase::Moved,
        });
        controls.update(&mut camera);
        assert_eq!(controls.distance(), 60.0);
    }
}
