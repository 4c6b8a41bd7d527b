//! Translation of winit window events into display input.

use jumbotron_core::{Modifiers, PinchAccumulator, PointerInput, TouchTracker};
use kurbo::Point;
use winit::event::{ElementState, MouseButton, TouchPhase, WindowEvent};
use winit::keyboard::{Key, ModifiersState};

/// What the application should do in response to a window event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BridgeEvent {
    /// Feed to the display controller.
    Pointer(PointerInput),
    /// Log the current viewport.
    DescribeViewport,
}

/// Tracks device state across window events.
#[derive(Debug, Default)]
pub struct InputBridge {
    cursor: Point,
    modifiers: Modifiers,
    mouse_down: bool,
    touches: TouchTracker,
    pinch: PinchAccumulator,
}

impl InputBridge {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last known cursor position in surface pixels.
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    /// Translate one window event.
    pub fn handle(&mut self, event: &WindowEvent) -> Vec<BridgeEvent> {
        match event {
            WindowEvent::ModifiersChanged(modifiers) => {
                self.set_modifiers(modifiers.state());
                Vec::new()
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(Point::new(position.x, position.y))
            }
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => self.mouse_button(*state == ElementState::Pressed),
            WindowEvent::Touch(touch) => self.touch(
                touch.phase,
                touch.id,
                Point::new(touch.location.x, touch.location.y),
            ),
            WindowEvent::PinchGesture { delta, phase, .. } => self.pinch(*phase, *delta),
            WindowEvent::KeyboardInput { event, .. } => {
                if event.state == ElementState::Pressed && !event.repeat {
                    self.key_pressed(&event.logical_key)
                } else {
                    Vec::new()
                }
            }
            _ => Vec::new(),
        }
    }

    pub fn set_modifiers(&mut self, state: ModifiersState) {
        self.modifiers = Modifiers {
            shift: state.shift_key(),
        };
    }

    pub fn cursor_moved(&mut self, position: Point) -> Vec<BridgeEvent> {
        self.cursor = position;
        if self.mouse_down {
            vec![BridgeEvent::Pointer(PointerInput::MouseMove { position })]
        } else {
            Vec::new()
        }
    }

    pub fn mouse_button(&mut self, pressed: bool) -> Vec<BridgeEvent> {
        if pressed == self.mouse_down {
            return Vec::new();
        }
        self.mouse_down = pressed;
        let input = if pressed {
            PointerInput::MouseDown {
                position: self.cursor,
                modifiers: self.modifiers,
            }
        } else {
            PointerInput::MouseUp
        };
        vec![BridgeEvent::Pointer(input)]
    }

    pub fn touch(&mut self, phase: TouchPhase, id: u64, position: Point) -> Vec<BridgeEvent> {
        let inputs = match phase {
            TouchPhase::Started => self.touches.started(id, position),
            TouchPhase::Moved => self.touches.moved(id, position),
            TouchPhase::Ended | TouchPhase::Cancelled => self.touches.ended(id),
        };
        inputs.into_iter().map(BridgeEvent::Pointer).collect()
    }

    /// Trackpad magnification, anchored at the cursor.
    pub fn pinch(&mut self, phase: TouchPhase, delta: f64) -> Vec<BridgeEvent> {
        let mut inputs = Vec::new();
        match phase {
            TouchPhase::Started => {
                inputs.push(self.pinch.begin(self.cursor));
                if delta != 0.0 {
                    inputs.extend(self.pinch.update(delta));
                }
            }
            TouchPhase::Moved => inputs.extend(self.pinch.update(delta)),
            TouchPhase::Ended | TouchPhase::Cancelled => {
                if delta != 0.0 {
                    self.pinch.update(delta);
                }
                inputs.extend(self.pinch.end());
            }
        }
        inputs.into_iter().map(BridgeEvent::Pointer).collect()
    }

    pub fn key_pressed(&mut self, key: &Key) -> Vec<BridgeEvent> {
        match key {
            Key::Character(c) if c.eq_ignore_ascii_case("v") => vec![BridgeEvent::DescribeViewport],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pointers(events: Vec<BridgeEvent>) -> Vec<PointerInput> {
        events
            .into_iter()
            .filter_map(|e| match e {
                BridgeEvent::Pointer(p) => Some(p),
                BridgeEvent::DescribeViewport => None,
            })
            .collect()
    }

    #[test]
    fn test_mouse_sequence() {
        let mut bridge = InputBridge::new();
        assert!(bridge.cursor_moved(Point::new(5.0, 5.0)).is_empty());

        assert_eq!(
            pointers(bridge.mouse_button(true)),
            vec![PointerInput::MouseDown {
                position: Point::new(5.0, 5.0),
                modifiers: Modifiers::default(),
            }]
        );
        assert_eq!(
            pointers(bridge.cursor_moved(Point::new(8.0, 9.0))),
            vec![PointerInput::MouseMove {
                position: Point::new(8.0, 9.0)
            }]
        );
        let up = pointers(bridge.mouse_button(false));
        assert_eq!(up, vec![PointerInput::MouseUp]);
        assert!(bridge.mouse_button(false).is_empty());
    }

    #[test]
    fn test_shift_is_carried_on_press() {
        let mut bridge = InputBridge::new();
        bridge.set_modifiers(ModifiersState::SHIFT);
        let down = pointers(bridge.mouse_button(true));
        assert!(matches!(
            down[0],
            PointerInput::MouseDown {
                modifiers: Modifiers { shift: true, .. },
                ..
            }
        ));
    }

    #[test]
    fn test_touch_pinch_ends_drag_first() {
        let mut bridge = InputBridge::new();
        bridge.touch(TouchPhase::Started, 1, Point::new(0.0, 0.0));
        let second = pointers(bridge.touch(TouchPhase::Started, 2, Point::new(100.0, 0.0)));
        assert_eq!(
            second,
            vec![
                PointerInput::TouchEnd,
                PointerInput::GestureStart {
                    origin: Point::new(50.0, 0.0)
                },
            ]
        );
    }

    #[test]
    fn test_trackpad_pinch_accumulates() {
        let mut bridge = InputBridge::new();
        bridge.cursor_moved(Point::new(20.0, 30.0));

        assert_eq!(
            pointers(bridge.pinch(TouchPhase::Started, 0.0)),
            vec![PointerInput::GestureStart {
                origin: Point::new(20.0, 30.0)
            }]
        );
        assert_eq!(
            pointers(bridge.pinch(TouchPhase::Moved, 0.5)),
            vec![PointerInput::GestureChange { scale: 1.5 }]
        );
        assert_eq!(
            pointers(bridge.pinch(TouchPhase::Moved, 1.0)),
            vec![PointerInput::GestureChange { scale: 3.0 }]
        );
        assert_eq!(
            pointers(bridge.pinch(TouchPhase::Ended, 0.0)),
            vec![PointerInput::GestureEnd { scale: 3.0 }]
        );
        assert!(bridge.pinch(TouchPhase::Moved, 0.5).is_empty());
    }

    #[test]
    fn test_v_key_describes_viewport() {
        let mut bridge = InputBridge::new();
        assert_eq!(
            bridge.key_pressed(&Key::Character("v".into())),
            vec![BridgeEvent::DescribeViewport]
        );
        assert!(bridge.key_pressed(&Key::Character("x".into())).is_empty());
    }
}
