use cfg_if::cfg_if;
use log::{error, warn};
use wgpu::SurfaceError;
use winit::event::{ElementState, Event, KeyboardInput, VirtualKeyCode, WindowEvent};
use winit::event_loop::EventLoop;
use winit::window::WindowBuilder;

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::prelude::*;

use crate::app::Application;
use crate::error::SetupError;

mod app;
pub mod camera;
pub mod error;
pub mod lantern;
mod util;

// entry point when loaded as wasm
#[cfg_attr(target_arch = "wasm32", wasm_bindgen(start))]
pub fn run() {
    cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            std::panic::set_hook(Box::new(console_error_panic_hook::hook));
            console_log::init_with_level(log::Level::Debug).expect("failed to initialise logger");
            wasm_bindgen_futures::spawn_local(start());
        } else {
            env_logger::init();
            pollster::block_on(start());
        }
    }
}

async fn setup(event_loop: &EventLoop<()>) -> Result<Application, SetupError> {
    let window = WindowBuilder::new()
        .with_title("Lantern: Ray Tracer")
        .build(event_loop)?;

    #[cfg(target_arch = "wasm32")]
    {
        use winit::dpi::PhysicalSize;
        use winit::platform::web::WindowExtWebSys;

        window.set_inner_size(PhysicalSize::new(800, 600));
        web_sys::window()
            .and_then(|win| win.document())
            .and_then(|doc| {
                let host = doc.get_element_by_id("lantern")?;
                let canvas = web_sys::Element::from(window.canvas());
                host.append_child(&canvas).ok()?;
                Some(())
            })
            .ok_or(SetupError::NoCanvasHost)?;
    }

    Application::new(window).await
}

async fn start() {
    let event_loop = EventLoop::new();

    let app = match setup(&event_loop).await {
        Ok(app) => app,
        Err(err) => {
            error!("{err}");
            cfg_if! {
                if #[cfg(target_arch = "wasm32")] {
                    return;
                } else {
                    std::process::exit(1);
                }
            }
        }
    };

    let mut app = Some(app);
    event_loop.run(move |event, _, control_flow| {
        let Some(state) = app.as_mut() else {
            return;
        };

        match event {
            Event::WindowEvent {
                ref event,
                window_id,
            } if window_id == state.window.id() => {
                if state.input(event) {
                    return;
                }

                match event {
                    WindowEvent::CloseRequested
                    | WindowEvent::KeyboardInput {
                        input:
                            KeyboardInput {
                                state: ElementState::Pressed,
                                virtual_keycode: Some(VirtualKeyCode::Escape),
                                ..
                            },
                        ..
                    } => control_flow.set_exit(),
                    WindowEvent::Resized(physical_size) => state.resize(*physical_size),
                    WindowEvent::ScaleFactorChanged { new_inner_size, .. } => {
                        state.resize(**new_inner_size)
                    }
                    _ => {}
                }
            }
            Event::RedrawRequested(window_id) if window_id == state.window.id() => {
                match state.render() {
                    Ok(_) => {}
                    Err(SurfaceError::Lost | SurfaceError::Outdated) => state.reconfigure(),
                    Err(SurfaceError::OutOfMemory) => {
                        error!("GPU out of memory");
                        control_flow.set_exit_with_code(1);
                    }
                    Err(err) => warn!("{err:?}"),
                }
            }
            Event::MainEventsCleared => {
                // redraw only while there is something left to accumulate
                if state.needs_frame() {
                    control_flow.set_poll();
                    state.window.request_redraw();
                } else {
                    control_flow.set_wait();
                }
            }
            Event::LoopDestroyed => {
                if let Some(state) = app.take() {
                    state.shutdown();
                }
            }
            _ => {}
        }
    });
}
