use std::path::PathBuf;
use clap::Parser;
use crate::app::config::{AppConfig, WindowConfig};
use crate::renderer::config::RenderConfig;

/// Interactive viewer for the meshes described in a scene file
#[derive(Parser, Debug)]
#[command(name = "meshview", version)]
pub struct Args {
    /// Scene description (JSON) to load
    #[arg(value_name = "SCENE")]
    pub scene: PathBuf,

    /// Initial window width in pixels
    #[arg(long, default_value = "1280")]
    pub width: u32,

    /// Initial window height in pixels
    #[arg(long, default_value = "720")]
    pub height: u32,

    /// Frames the CPU may record ahead of the GPU (1 to 3)
    #[arg(long, default_value = "2")]
    pub frames_in_flight: usize,

    /// Present with MAILBOX instead of FIFO when available
    #[arg(long)]
    pub no_vsync: bool,

    /// Initial distance of the camera from the origin
    #[arg(long, default_value_t = AppConfig::DEFAULT_CAMERA_DISTANCE)]
    pub distance: f32,

    /// Do not request the Vulkan validation layer
    #[arg(long)]
    pub no_validation: bool,
}

impl Args {
    pub fn into_config(self) -> AppConfig {
        let render = RenderConfig {
            vsync: !self.no_vsync,
            validation: RenderConfig::default().validation && !self.no_validation,
            ..Default::default()
        }
        .with_frames_in_flight(self.frames_in_flight);

        AppConfig {
            scene_path: self.scene,
            window: WindowConfig {
                width: self.width,
                height: self.height,
                ..Default::default()
            },
            camera_distance: self.distance,
            render,
        }
    }
}
