use glam::Vec2;
use winit::event::{ElementState, MouseButton, MouseScrollDelta, Touch, TouchPhase, WindowEvent};
use winit::keyboard::Key;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Secondary,
    Middle,
    Other(u16),
}

impl From<MouseButton> for PointerButton {
    fn from(button: MouseButton) -> Self {
        match button {
            MouseButton::Left => Self::Primary,
            MouseButton::Right => Self::Secondary,
            MouseButton::Middle => Self::Middle,
            MouseButton::Back => Self::Other(3),
            MouseButton::Forward => Self::Other(4),
            MouseButton::Other(id) => Self::Other(id),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ButtonAction {
    Press,
    Release,
}

impl From<ElementState> for ButtonAction {
    fn from(state: ElementState) -> Self {
        match state {
            ElementState::Pressed => Self::Press,
            ElementState::Released => Self::Release,
        }
    }
}

/// Window input reduced to what the viewer reacts to
#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    Button {
        button: PointerButton,
        action: ButtonAction,
        x: f32,
        y: f32,
    },
    Moved {
        x: f32,
        y: f32,
    },
    Scroll {
        dy: f32,
    },
    Key {
        key: Key,
        action: ButtonAction,
    },
}

/// Tracks the pointer so button events can carry the position they happened at
#[derive(Debug, Default)]
pub struct InputState {
    pub cursor_pos: Vec2,
}

impl InputState {
    pub fn translate(&mut self, event: &WindowEvent) -> Option<InputEvent> {
        match event {
            WindowEvent::MouseInput { state, button, .. } => {
                Some(InputEvent::Button {
                    button: (*button).into(),
                    action: (*state).into(),
                    x: self.cursor_pos.x,
                    y: self.cursor_pos.y,
                })
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_pos = Vec2::new(position.x as f32, position.y as f32);
                Some(InputEvent::Moved {
                    x: self.cursor_pos.x,
                    y: self.cursor_pos.y,
                })
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_x, y) => *y,
                    // Pixel deltas vary wildly between devices, only the direction is kept
                    MouseScrollDelta::PixelDelta(pos) => pos.y.signum() as f32,
                };
                Some(InputEvent::Scroll { dy })
            }
            WindowEvent::Touch(touch) => self.translate_touch(touch),
            WindowEvent::KeyboardInput { event, .. } => {
                Some(InputEvent::Key {
                    key: event.logical_key.clone(),
                    action: event.state.into(),
                })
            }
            _ => None,
        }
    }

    /// A single finger acts as the primary pointer button
    fn translate_touch(&mut self, touch: &Touch) -> Option<InputEvent> {
        self.cursor_pos = Vec2::new(touch.location.x as f32, touch.location.y as f32);
        let (x, y) = (self.cursor_pos.x, self.cursor_pos.y);

        let event = match touch.phase {
            TouchPhase::Started => InputEvent::Button {
                button: PointerButton::Primary,
                action: ButtonAction::Press,
                x,
                y,
            },
            TouchPhase::Moved => InputEvent::Moved { x, y },
            TouchPhase::Ended | TouchPhase::Cancelled => InputEvent::Button {
                button: PointerButton::Primary,
                action: ButtonAction::Release,
                x,
                y,
            },
        };
        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use winit::dpi::PhysicalPosition;
    use winit::event::DeviceId;

    fn device_id() -> DeviceId {
        DeviceId::dummy()
    }

    fn cursor_moved(x: f64, y: f64) -> WindowEvent {
        WindowEvent::CursorMoved {
            device_id: device_id(),
            position: PhysicalPosition::new(x, y),
        }
    }

    fn touch(phase: TouchPhase, x: f64, y: f64) -> WindowEvent {
        WindowEvent::Touch(Touch {
            device_id: device_id(),
            phase,
            location: PhysicalPosition::new(x, y),
            force: None,
            id: 0,
        })
    }

    #[test]
    fn button_events_carry_the_last_cursor_position() {
        let mut input = InputState::default();
        assert_eq!(
            input.translate(&cursor_moved(12.0, 34.0)),
            Some(InputEvent::Moved { x: 12.0, y: 34.0 })
        );

        let pressed = input.translate(&WindowEvent::MouseInput {
            device_id: device_id(),
            state: ElementState::Pressed,
            button: MouseButton::Left,
        });
        assert_eq!(
            pressed,
            Some(InputEvent::Button {
                button: PointerButton::Primary,
                action: ButtonAction::Press,
                x: 12.0,
                y: 34.0,
            })
        );
    }

    #[test]
    fn line_scroll_keeps_magnitude_and_pixel_scroll_keeps_sign() {
        let mut input = InputState::default();
        let lines = input.translate(&WindowEvent::MouseWheel {
            device_id: device_id(),
            delta: MouseScrollDelta::LineDelta(0.0, 2.0),
            phase: TouchPhase::Moved,
        });
        assert_eq!(lines, Some(InputEvent::Scroll { dy: 2.0 }));

        let pixels = input.translate(&WindowEvent::MouseWheel {
            device_id: device_id(),
            delta: MouseScrollDelta::PixelDelta(PhysicalPosition::new(0.0, -37.0)),
            phase: TouchPhase::Moved,
        });
        assert_eq!(pixels, Some(InputEvent::Scroll { dy: -1.0 }));
    }

    #[test]
    fn touch_maps_to_the_primary_button() {
        let mut input = InputState::default();
        assert!(matches!(
            input.translate(&touch(TouchPhase::Started, 5.0, 6.0)),
            Some(InputEvent::Button { button: PointerButton::Primary, action: ButtonAction::Press, .. })
        ));
        assert_eq!(
            input.translate(&touch(TouchPhase::Moved, 7.0, 8.0)),
            Some(InputEvent::Moved { x: 7.0, y: 8.0 })
        );
        assert!(matches!(
            input.translate(&touch(TouchPhase::Cancelled, 7.0, 8.0)),
            Some(InputEvent::Button { action: ButtonAction::Release, .. })
        ));
    }

    #[test]
    fn unrelated_events_are_ignored() {
        let mut input = InputState::default();
        assert_eq!(input.translate(&WindowEvent::CloseRequested), None);
        assert_eq!(input.translate(&WindowEvent::Focused(true)), None);
    }
}
