use glam::Vec2;
use crate::app::input_state::{ButtonAction, InputEvent, PointerButton};
use crate::renderer::camera::Camera;

/// Drag-to-orbit and scroll-to-zoom on top of a `Camera`
pub struct CameraController {
    camera: Camera,

    rotation_sensitivity: f32,
    zoom_sensitivity: f32,

    rotating: bool,
    // None until the first movement after a press arrives
    prev_pointer_pos: Option<Vec2>,
}

impl CameraController {
    pub fn new(camera: Camera) -> Self {
        Self {
            camera,

            rotation_sensitivity: 0.5,
            zoom_sensitivity: 25.0,

            rotating: false,
            prev_pointer_pos: None,
        }
    }

    pub fn get_camera(&self) -> &Camera {
        &self.camera
    }

    pub fn handle(&mut self, event: &InputEvent, delta_time: f32) {
        match *event {
            InputEvent::Button { button: PointerButton::Primary, action, .. } => {
                self.rotating = action == ButtonAction::Press;
                self.prev_pointer_pos = None;
            }
            InputEvent::Moved { x, y } if self.rotating => {
                let pos = Vec2::new(x, y);
                if let Some(prev) = self.prev_pointer_pos {
                    let delta = (pos - prev) * self.rotation_sensitivity * delta_time;
                    // Dragging right swings the eye left around the pivot
                    self.camera.orbit(-delta.x, delta.y);
                }
                self.prev_pointer_pos = Some(pos);
            }
            InputEvent::Scroll { dy } => {
                self.camera.zoom(dy * self.zoom_sensitivity * delta_time);
            }
            _ => {}
        }
    }
}
