pub mod args;
pub mod config;
mod camera_controller;
mod frame_clock;
mod input_state;

use std::sync::Arc;
use color_eyre::eyre::{Report, WrapErr};
use color_eyre::Result;
use winit::application::ApplicationHandler;
use winit::dpi::PhysicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowId};
use crate::app::camera_controller::CameraController;
use crate::app::config::AppConfig;
use crate::app::frame_clock::FrameClock;
use crate::app::input_state::{ButtonAction, InputEvent, InputState};
use crate::renderer::camera::Camera;
use crate::renderer::shader_data::UniformBlock;
use crate::renderer::Renderer;
use crate::scene::Scene;

pub struct App {
    config: AppConfig,
    scene: Scene,
    renderer: Option<Renderer>,
    window: Option<Arc<Window>>,
    camera_controller: CameraController,

    // State
    input_state: InputState,
    frame_clock: FrameClock,
    delta_time_secs: f32,
    close_requested: bool,
    error: Option<Report>,
}

impl App {
    /// Loads the scene up front so a bad file fails before any window or GPU work
    pub fn new(config: AppConfig) -> Result<Self> {
        let scene = Scene::load(&config.scene_path)?;
        if scene.is_empty() {
            log::warn!("Scene {:?} has no models, only the clear color will be drawn", config.scene_path);
        }
        let camera_controller = CameraController::new(Camera::new(config.camera_distance));

        Ok(Self {
            config,
            scene,
            renderer: None,
            window: None,
            camera_controller,

            input_state: InputState::default(),
            frame_clock: FrameClock::new(),
            delta_time_secs: 0.0,
            close_requested: false,
            error: None,
        })
    }

    pub fn run(mut self) -> Result<()> {
        let event_loop = EventLoop::new()?;
        event_loop.set_control_flow(ControlFlow::Poll);
        event_loop.run_app(&mut self)?;

        match self.error.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn init_graphics(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let window = match &self.window {
            Some(window) => window.clone(),
            None => {
                let attributes = Window::default_attributes()
                    .with_title(self.config.window.title.as_str())
                    .with_inner_size(PhysicalSize::new(
                        self.config.window.width,
                        self.config.window.height,
                    ));
                let window = Arc::new(
                    event_loop
                        .create_window(attributes)
                        .wrap_err("Failed to create window")?
                );
                self.window = Some(window.clone());
                window
            }
        };

        if self.renderer.is_none() {
            self.renderer = Some(Renderer::new(window, &self.scene, self.config.render.clone())?);
            self.frame_clock = FrameClock::new();
        }

        Ok(())
    }

    fn draw(&mut self) -> Result<()> {
        let Some(renderer) = self.renderer.as_mut() else {
            return Ok(());
        };

        // dt of this frame drives the camera for the next one
        self.delta_time_secs = self.frame_clock.tick();

        let camera = self.camera_controller.get_camera();
        let block = UniformBlock {
            mvp: camera.get_view_proj_mat(renderer.aspect_ratio()),
        };
        renderer.draw(&block)
    }

    fn handle_input(&mut self, event: &InputEvent) {
        match event {
            InputEvent::Key {
                key: Key::Named(NamedKey::Escape),
                action: ButtonAction::Press,
            } => {
                self.close_requested = true;
            }
            _ => self.camera_controller.handle(event, self.delta_time_secs),
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, err: Report) {
        log::error!("Stopping after error: {}", err);
        self.error = Some(err);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if let Err(err) = self.init_graphics(event_loop) {
            self.fail(event_loop, err);
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent
    ) {
        if self.window.as_ref().is_none_or(|window| window.id() != window_id) {
            return;
        }

        if let Some(input) = self.input_state.translate(&event) {
            self.handle_input(&input);
        }

        match event {
            WindowEvent::CloseRequested => {
                self.close_requested = true;
            }
            WindowEvent::Resized(_) | WindowEvent::ScaleFactorChanged { .. } => {
                if let Some(renderer) = self.renderer.as_mut() {
                    renderer.request_resize();
                }
            }
            WindowEvent::RedrawRequested if self.error.is_none() => {
                if let Err(err) = self.draw() {
                    self.fail(event_loop, err);
                }
            }
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.close_requested {
            event_loop.exit();
            return;
        }

        if let Some(window) = self.window.as_ref() {
            window.request_redraw();
        }
    }

    fn exiting(&mut self, _event_loop: &ActiveEventLoop) {
        // The renderer waits for the GPU and releases everything before the window goes away
        self.renderer = None;
        log::info!("Exiting");
    }
}
