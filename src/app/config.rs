use std::path::PathBuf;
use crate::renderer::config::RenderConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "meshview".to_string(),
            width: 1280,
            height: 720,
        }
    }
}

/// Everything the viewer needs to start, resolved once from the command line
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub scene_path: PathBuf,
    pub window: WindowConfig,
    pub camera_distance: f32,
    pub render: RenderConfig,
}

impl AppConfig {
    pub const DEFAULT_CAMERA_DISTANCE: f32 = 4.0;
}
