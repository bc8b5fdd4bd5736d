use std::f32::consts::FRAC_PI_2;

use nalgebra::{Isometry3, Point3, Rotation3, Vector2, Vector3};
use winit::dpi::PhysicalPosition;
use winit::event::{ElementState, MouseButton, WindowEvent};

use crate::lantern::params::CameraParams;

// strictly above the pole so up never lines up with the view
pub const MIN_PITCH: f32 = 0.01;
pub const MAX_PITCH: f32 = FRAC_PI_2;
pub const MAX_PAN_STEP: f32 = FRAC_PI_2;

const INITIAL_PITCH: f32 = 0.07;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraConfig {
    // focal plane extent, in scene units
    pub screen_size: Vector2<f32>,
    pub radius: f32,
    pub focal_distance: f32,
    pub aperture: f32,
    // radians per pixel
    pub sensitivity: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanPhase {
    Moved,
    Ended,
}

pub struct Camera {
    config: CameraConfig,
    pitch: f32,
    yaw: f32,

    dragging: bool,
    last_mouse: PhysicalPosition<f64>,
}

impl Camera {
    pub fn new(config: CameraConfig) -> Self {
        Self {
            config,
            pitch: INITIAL_PITCH,
            yaw: 0.0,
            dragging: false,
            last_mouse: Default::default(),
        }
    }

    pub fn config(&self) -> &CameraConfig {
        &self.config
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn is_dragging(&self) -> bool {
        self.dragging
    }

    pub fn resize(&mut self, screen_size: Vector2<f32>) {
        self.config.screen_size = screen_size;
    }

    // x turns yaw, y turns pitch
    pub fn on_pan(&mut self, delta: Vector2<f32>) {
        if !delta.iter().all(|d| d.is_finite()) {
            return;
        }

        self.yaw += self.pan_step(-delta.x);
        let pitch = self.pitch + self.pan_step(-delta.y);
        self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
    }

    fn pan_step(&self, delta: f32) -> f32 {
        (delta * self.config.sensitivity).clamp(-MAX_PAN_STEP, MAX_PAN_STEP)
    }

    pub fn params(&self) -> CameraParams {
        // yaw after pitch
        let rotation = Rotation3::from_axis_angle(&Vector3::y_axis(), self.yaw)
            * Rotation3::from_axis_angle(&Vector3::x_axis(), self.pitch);

        let eye_offset = Vector3::new(0.0, 0.0, -self.config.radius);
        let target_direction = Vector3::new(0.0, 0.0, self.config.focal_distance);

        let eye = Point3::from(rotation * eye_offset);
        let target = Point3::from(rotation * (eye_offset + target_direction));
        let up = rotation * Vector3::y();

        let view = Isometry3::look_at_rh(&eye, &target, &up);
        let inverse_view = view.inverse();

        // view space looks down -z
        let u = Vector3::new(self.config.screen_size.x, 0.0, 0.0);
        let v = Vector3::new(0.0, self.config.screen_size.y, 0.0);
        let focal_plane_origin = Point3::origin() - target_direction - (u + v) * 0.5;

        CameraParams {
            position: (inverse_view * Point3::origin()).coords,
            focal_plane_origin: (inverse_view * focal_plane_origin).coords,
            u: inverse_view * u,
            v: inverse_view * v,
            aperture: self.config.aperture,
        }
    }

    pub fn input(&mut self, event: &WindowEvent) -> Option<PanPhase> {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => match state {
                ElementState::Pressed => {
                    self.press();
                    None
                }
                ElementState::Released => self.release(),
            },
            WindowEvent::CursorMoved { position, .. } => self.cursor_moved(*position),
            WindowEvent::CursorLeft { .. } => self.release(),
            _ => None,
        }
    }

    pub(crate) fn press(&mut self) {
        self.dragging = true;
    }

    fn release(&mut self) -> Option<PanPhase> {
        if !self.dragging {
            return None;
        }

        self.dragging = false;
        Some(PanPhase::Ended)
    }

    fn cursor_moved(&mut self, position: PhysicalPosition<f64>) -> Option<PanPhase> {
        let delta = Vector2::new(
            (position.x - self.last_mouse.x) as f32,
            (position.y - self.last_mouse.y) as f32,
        );
        self.last_mouse = position;

        if !self.dragging {
            return None;
        }

        self.on_pan(delta);
        Some(PanPhase::Moved)
    }
}
