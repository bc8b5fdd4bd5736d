use log::{debug, info};
use nalgebra::Vector2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use winit::dpi::PhysicalSize;

use crate::lantern::params::{CameraParams, RayTracingParams};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchedulerConfig {
    // cur_batch_idx is ignored, accumulation always starts at 0
    pub ray_tracing: RayTracingParams,
    pub max_render_iter: i32,
    // bounce limit while dragging
    pub preview_depth: i32,
    pub restart_on_scene_edit: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            ray_tracing: RayTracingParams::default(),
            max_render_iter: 128,
            preview_depth: 4,
            restart_on_scene_edit: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    // no accumulation target yet
    Uninitialized,
    FullQuality,
    // one cheap frame per drag update
    Interactive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quality {
    Full,
    Interactive,
}

// Device side of a frame. submit_frame returns only after the GPU finished,
// so uploads never race an in-flight frame.
pub trait FrameTarget {
    type Error;

    fn surface_size(&self) -> PhysicalSize<u32>;

    // called once per distinct surface size
    fn allocate_accumulation(&mut self, size: PhysicalSize<u32>);

    fn upload_geometry(&mut self, encoded: &[u8]);

    fn upload_params(&mut self, ray_tracing: &RayTracingParams, camera: &CameraParams);

    fn upload_seed(&mut self, seed: u32);

    fn submit_frame(&mut self) -> Result<(), Self::Error>;
}

pub struct RenderScheduler {
    config: SchedulerConfig,
    params: RayTracingParams,
    camera: CameraParams,
    quality: Quality,
    accumulation_size: Option<PhysicalSize<u32>>,
    pending_geometry: Option<Vec<u8>>,
    preview_pending: bool,
    rng: StdRng,
}

impl RenderScheduler {
    pub fn new(config: SchedulerConfig, camera: CameraParams, geometry: Vec<u8>) -> Self {
        Self::with_rng(config, camera, geometry, StdRng::from_entropy())
    }

    pub fn with_rng(
        config: SchedulerConfig,
        camera: CameraParams,
        geometry: Vec<u8>,
        rng: StdRng,
    ) -> Self {
        let params = RayTracingParams {
            cur_batch_idx: 0,
            ..config.ray_tracing
        };

        Self {
            config,
            params,
            camera,
            quality: Quality::Full,
            accumulation_size: None,
            pending_geometry: Some(geometry),
            preview_pending: false,
            rng,
        }
    }

    pub fn state(&self) -> RenderState {
        match (self.accumulation_size, self.quality) {
            (None, _) => RenderState::Uninitialized,
            (Some(_), Quality::Full) => RenderState::FullQuality,
            (Some(_), Quality::Interactive) => RenderState::Interactive,
        }
    }

    pub fn params(&self) -> &RayTracingParams {
        &self.params
    }

    pub fn camera(&self) -> &CameraParams {
        &self.camera
    }

    // true when the next render call would submit a frame
    pub fn needs_frame(&self) -> bool {
        match self.quality {
            Quality::Full => {
                self.params.cur_batch_idx < self.config.max_render_iter
                    || (self.pending_geometry.is_some() && self.params.cur_batch_idx > 0)
            }
            Quality::Interactive => self.preview_pending,
        }
    }

    // Ok(false) means no more frames are needed
    pub fn render<T: FrameTarget>(&mut self, target: &mut T) -> Result<bool, T::Error> {
        let size = target.surface_size();
        if self.accumulation_size != Some(size) {
            info!("allocating accumulation target {}x{}", size.width, size.height);
            target.allocate_accumulation(size);
            self.accumulation_size = Some(size);
            self.params.screen_size = Vector2::new(size.width as f32, size.height as f32);
            self.params.cur_batch_idx = 0;
        }

        let scene_changed = match self.pending_geometry.take() {
            Some(encoded) => {
                debug!("uploading {} bytes of geometry", encoded.len());
                target.upload_geometry(&encoded);
                true
            }
            None => false,
        };

        match self.quality {
            Quality::Interactive => {
                if !self.preview_pending {
                    return Ok(false);
                }
                self.submit(target, self.params)?;
                self.preview_pending = false;
                Ok(false)
            }
            Quality::Full => {
                if self.params.cur_batch_idx >= self.config.max_render_iter {
                    if scene_changed && self.params.cur_batch_idx > 0 {
                        // budget spent: show the new scene once at full weight, keep the counter
                        let single = RayTracingParams {
                            cur_batch_idx: 0,
                            ..self.params
                        };
                        self.submit(target, single)?;
                    }
                    return Ok(false);
                }
                self.submit(target, self.params)?;
                self.params.cur_batch_idx += 1;

                if self.params.cur_batch_idx == self.config.max_render_iter {
                    info!("accumulated {} batches", self.params.cur_batch_idx);
                }
                Ok(true)
            }
        }
    }

    fn submit<T: FrameTarget>(
        &mut self,
        target: &mut T,
        params: RayTracingParams,
    ) -> Result<(), T::Error> {
        target.upload_seed(self.rng.gen::<u32>());
        target.upload_params(&params, &self.camera);
        target.submit_frame()
    }

    // new pose while dragging: one cheap preview frame
    pub fn update_camera(&mut self, camera: CameraParams) {
        if self.quality != Quality::Interactive {
            debug!("entering interactive preview");
        }

        self.camera = camera;
        self.quality = Quality::Interactive;
        self.params.sample_batch_size = 1;
        self.params.cur_batch_idx = 0;
        self.params.max_depth = self.config.preview_depth;
        self.preview_pending = true;
    }

    // the accumulation target keeps its contents, batch 0 gets full weight in the kernel
    pub fn finish_camera_update(&mut self) {
        debug!("resuming full quality accumulation");

        self.quality = Quality::Full;
        self.params.sample_batch_size = self.config.ray_tracing.sample_batch_size;
        self.params.max_depth = self.config.ray_tracing.max_depth;
        self.params.cur_batch_idx = 0;
        self.preview_pending = false;
    }

    // camera moved outside a drag
    pub fn reset_camera(&mut self, camera: CameraParams) {
        self.camera = camera;
        self.finish_camera_update();
    }

    // uploaded before the next frame
    pub fn replace_geometry(&mut self, encoded: Vec<u8>) {
        self.pending_geometry = Some(encoded);
        self.preview_pending |= self.quality == Quality::Interactive;

        if self.config.restart_on_scene_edit {
            self.params.cur_batch_idx = 0;
        }
    }
}
