use log::info;
use wgpu::{
    Backends, CompositeAlphaMode, DeviceDescriptor, Dx12Compiler, Features, Instance,
    InstanceDescriptor, Limits, PowerPreference, PresentMode, RequestAdapterOptions,
    SurfaceConfiguration, SurfaceError, TextureUsages,
};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::window::Window;

use crate::error::SetupError;
use crate::lantern::scene::{showcase, ScenePreset};
use crate::lantern::tracer::GpuTracer;
use crate::lantern::{screen_extent, Lantern, Settings};

pub struct Application {
    tracer: GpuTracer,
    lantern: Lantern,
    pub size: PhysicalSize<u32>,
    // the surface refers to the window, so the window is declared (and dropped) last
    pub window: Window,
}

impl Application {
    pub async fn new(window: Window) -> Result<Self, SetupError> {
        let size = window.inner_size();

        let instance = Instance::new(InstanceDescriptor {
            backends: Backends::all(),
            dx12_shader_compiler: Dx12Compiler::default(),
        });

        // SAFETY: `window` is stored next to the surface and outlives it
        let surface = unsafe { instance.create_surface(&window) }?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: PowerPreference::HighPerformance,
                force_fallback_adapter: false,
                compatible_surface: Some(&surface),
            })
            .await
            .ok_or(SetupError::NoAdapter)?;
        info!("using adapter {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &DeviceDescriptor {
                    features: Features::empty(),
                    // fragment-stage storage buffers rule out the WebGL2 limits on the web
                    limits: if cfg!(target_arch = "wasm32") {
                        Limits::downlevel_defaults()
                    } else {
                        Limits::default()
                    },
                    label: Some("Lantern GPU"),
                },
                None,
            )
            .await?;

        // the kernel applies its own gamma, so a linear surface format is preferred
        let capabilities = surface.get_capabilities(&adapter);
        let surface_format = capabilities
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .or_else(|| capabilities.formats.first().copied())
            .ok_or(SetupError::NoSurfaceFormat)?;

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: PresentMode::AutoVsync,
            alpha_mode: CompositeAlphaMode::Auto,
            view_formats: vec![],
        };

        let tracer = GpuTracer::new(surface, device, queue, config);
        let lantern = Lantern::new(Settings::for_surface(size), showcase(screen_extent(size)));

        Ok(Self {
            tracer,
            lantern,
            size,
            window,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }

        self.size = new_size;
        self.tracer.resize(new_size);
        self.lantern.resize(new_size);
    }

    // surface lost or outdated
    pub fn reconfigure(&mut self) {
        self.tracer.resize(self.size);
    }

    // true: handled here
    pub fn input(&mut self, event: &WindowEvent) -> bool {
        if self.lantern.input(event) {
            return true;
        }

        let WindowEvent::KeyboardInput {
            input:
                KeyboardInput {
                    state: ElementState::Pressed,
                    virtual_keycode: Some(key),
                    ..
                },
            ..
        } = event
        else {
            return false;
        };

        let preset = match key {
            VirtualKeyCode::Key1 => ScenePreset::Showcase,
            VirtualKeyCode::Key2 => ScenePreset::RandomSpheres,
            VirtualKeyCode::Key3 => ScenePreset::MirrorHall,
            _ => return false,
        };

        info!("loading {preset:?} scene");
        let scene = preset.build(self.lantern.camera().config().screen_size);
        self.lantern.replace_scene(scene);
        true
    }

    pub fn render(&mut self) -> Result<bool, SurfaceError> {
        self.lantern.render(&mut self.tracer)
    }

    pub fn needs_frame(&self) -> bool {
        self.lantern.needs_frame()
    }

    pub fn shutdown(self) {
        info!(
            "shutting down at batch {} ({:?})",
            self.lantern.batch_index(),
            self.lantern.state()
        );

        let Self { tracer, window, .. } = self;
        drop(tracer);
        drop(window);
    }
}
