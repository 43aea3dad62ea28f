use std::path::PathBuf;

/// Contains configuration options for the renderer like vsync and the number of frames in flight
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub vsync: bool,
    pub frames_in_flight: usize,
    pub clear_color: [f32; 4],
    /// Directory holding the compiled `<name>.<stage>.spv` shaders
    pub shader_dir: PathBuf,
    pub validation: bool,
}

impl RenderConfig {
    pub const MAX_FRAMES_IN_FLIGHT: usize = 3;

    pub fn with_frames_in_flight(mut self, frames_in_flight: usize) -> Self {
        self.frames_in_flight = frames_in_flight.clamp(1, Self::MAX_FRAMES_IN_FLIGHT);
        self
    }

    /// Brings fields set directly back into their supported range
    pub fn validated(self) -> Self {
        let frames_in_flight = self.frames_in_flight;
        self.with_frames_in_flight(frames_in_flight)
    }

    pub fn shader_path(&self, file_name: &str) -> PathBuf {
        self.shader_dir.join(file_name)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            vsync: true,
            frames_in_flight: 2,
            clear_color: [0.0, 0.5, 0.0, 1.0],
            shader_dir: PathBuf::from(concat!(env!("CARGO_MANIFEST_DIR"), "/shaders-built")),
            validation: cfg!(debug_assertions),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_in_flight_is_clamped() {
        assert_eq!(RenderConfig::default().with_frames_in_flight(0).frames_in_flight, 1);
        assert_eq!(RenderConfig::default().with_frames_in_flight(2).frames_in_flight, 2);
        assert_eq!(RenderConfig::default().with_frames_in_flight(8).frames_in_flight, 3);
    }

    #[test]
    fn directly_set_fields_are_validated() {
        let config = RenderConfig {
            frames_in_flight: 0,
            ..Default::default()
        };
        assert_eq!(config.validated().frames_in_flight, 1);

        let config = RenderConfig {
            frames_in_flight: 7,
            clear_color: [1.0, 0.0, 0.0, 1.0],
            ..Default::default()
        };
        let validated = config.validated();
        assert_eq!(validated.frames_in_flight, RenderConfig::MAX_FRAMES_IN_FLIGHT);
        assert_eq!(validated.clear_color, [1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn shaders_resolve_inside_the_shader_dir() {
        let config = RenderConfig {
            shader_dir: PathBuf::from("/tmp/spv"),
            ..Default::default()
        };
        assert_eq!(config.shader_path("mesh.vert.spv"), PathBuf::from("/tmp/spv/mesh.vert.spv"));
    }
}
