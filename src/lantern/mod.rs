use log::info;
use nalgebra::Vector2;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;

use crate::camera::{Camera, CameraConfig, PanPhase};
use crate::lantern::scene::Geometry;
use crate::lantern::scheduler::{FrameTarget, RenderScheduler, RenderState, SchedulerConfig};
use crate::lantern::serialize::encode;

pub mod params;
pub mod scene;
pub mod scheduler;
pub mod serialize;
mod texture;
pub mod tracer;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Settings {
    pub camera: CameraConfig,
    pub scheduler: SchedulerConfig,
}

impl Settings {
    // orbit radius and focal distance follow the surface height
    pub fn for_surface(size: PhysicalSize<u32>) -> Self {
        let screen_size = screen_extent(size);

        Self {
            camera: CameraConfig {
                screen_size,
                radius: screen_size.y,
                focal_distance: screen_size.y,
                aperture: 12.0,
                sensitivity: 0.005,
            },
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::for_surface(PhysicalSize::new(800, 600))
    }
}

pub fn screen_extent(size: PhysicalSize<u32>) -> Vector2<f32> {
    Vector2::new(size.width as f32, size.height as f32)
}

pub struct Lantern {
    camera: Camera,
    scheduler: RenderScheduler,
    scene: Geometry,
}

impl Lantern {
    pub fn new(settings: Settings, scene: Geometry) -> Self {
        let camera = Camera::new(settings.camera);
        let encoded = encode(&scene);
        info!(
            "scene ready: {} primitives, {} bytes encoded",
            scene.primitive_count(),
            encoded.len()
        );
        let scheduler = RenderScheduler::new(settings.scheduler, camera.params(), encoded);

        Self {
            camera,
            scheduler,
            scene,
        }
    }

    // true if the event moved or released the camera
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        match self.camera.input(event) {
            Some(PanPhase::Moved) => {
                self.scheduler.update_camera(self.camera.params());
                true
            }
            Some(PanPhase::Ended) => {
                self.end_pan();
                true
            }
            None => false,
        }
    }

    pub fn pan(&mut self, delta: Vector2<f32>) {
        self.camera.on_pan(delta);
        self.scheduler.update_camera(self.camera.params());
    }

    pub fn end_pan(&mut self) {
        self.scheduler.finish_camera_update();
    }

    pub fn replace_scene(&mut self, scene: Geometry) {
        let encoded = encode(&scene);
        info!(
            "scene replaced: {} primitives, {} bytes encoded",
            scene.primitive_count(),
            encoded.len()
        );

        self.scheduler.replace_geometry(encoded);
        self.scene = scene;
    }

    pub fn resize(&mut self, size: PhysicalSize<u32>) {
        self.camera.resize(screen_extent(size));

        // a drag in progress stays in preview until the button is released
        if self.camera.is_dragging() {
            self.scheduler.update_camera(self.camera.params());
        } else {
            self.scheduler.reset_camera(self.camera.params());
        }
    }

    pub fn render<T: FrameTarget>(&mut self, target: &mut T) -> Result<bool, T::Error> {
        self.scheduler.render(target)
    }

    pub fn needs_frame(&self) -> bool {
        self.scheduler.needs_frame()
    }

    pub fn state(&self) -> RenderState {
        self.scheduler.state()
    }

    pub fn batch_index(&self) -> i32 {
        self.scheduler.params().cur_batch_idx
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn scene(&self) -> &Geometry {
        &self.scene
    }
}
