//! Device input: mouse, touch and native pinch events.
//!
//! Platform layers translate their events into [`PointerInput`]; the
//! [`TouchTracker`] and [`PinchAccumulator`] help platforms that report raw
//! fingers or incremental magnification instead of a cumulative gesture.

use kurbo::Point;
use std::collections::HashMap;

/// Modifier keys held when a press starts. Shift turns a drag into a scale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
}

/// A device event in surface pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerInput {
    /// Primary button pressed. Shift turns the drag into a scale.
    MouseDown {
        position: Point,
        modifiers: Modifiers,
    },
    MouseMove { position: Point },
    MouseUp,
    /// A finger touched down; `touches` is how many fingers changed.
    TouchStart { position: Point, touches: usize },
    TouchMove { position: Point },
    TouchEnd,
    /// Native pinch started, anchored at `origin`.
    GestureStart { origin: Point },
    /// Cumulative finger spread since the gesture started (1.0 = unchanged).
    GestureChange { scale: f64 },
    GestureEnd { scale: f64 },
}

/// Identifier of a touch point as reported by the platform.
pub type TouchId = u64;

#[derive(Debug, Clone, Copy)]
struct Pinch {
    fingers: (TouchId, TouchId),
    initial_distance: f64,
    last_scale: f64,
}

/// Turns per-finger touch events into drag and pinch input.
///
/// One finger drags. A second finger ends the drag and starts a pinch
/// anchored at the midpoint of the two fingers; the pinch ends as soon as
/// either of its fingers lifts. A finger left over from a pinch never drags.
#[derive(Debug, Clone, Default)]
pub struct TouchTracker {
    fingers: HashMap<TouchId, Point>,
    pinch: Option<Pinch>,
    /// Finger that started the current one-finger drag.
    drag_finger: Option<TouchId>,
}

/// Pinch distances below this are treated as this, to keep ratios sane.
const MIN_PINCH_DISTANCE: f64 = 1.0;

impl TouchTracker {
    /// Create a tracker with no fingers down.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fingers currently down.
    pub fn finger_count(&self) -> usize {
        self.fingers.len()
    }

    /// Whether a two-finger pinch is in progress.
    pub fn is_pinching(&self) -> bool {
        self.pinch.is_some()
    }

    /// A finger touched down.
    pub fn started(&mut self, id: TouchId, position: Point) -> Vec<PointerInput> {
        self.fingers.insert(id, position);
        match self.fingers.len() {
            1 => {
                self.drag_finger = Some(id);
                vec![PointerInput::TouchStart {
                    position,
                    touches: 1,
                }]
            }
            2 if self.pinch.is_none() => {
                let other = self
                    .fingers
                    .iter()
                    .find(|(finger, _)| **finger != id)
                    .map(|(finger, pos)| (*finger, *pos));
                let Some((other_id, other_pos)) = other else {
                    return Vec::new();
                };
                self.drag_finger = None;
                self.pinch = Some(Pinch {
                    fingers: (other_id, id),
                    initial_distance: other_pos.distance(position).max(MIN_PINCH_DISTANCE),
                    last_scale: 1.0,
                });
                vec![
                    PointerInput::TouchEnd,
                    PointerInput::GestureStart {
                        origin: other_pos.midpoint(position),
                    },
                ]
            }
            _ => Vec::new(),
        }
    }

    /// A finger moved.
    pub fn moved(&mut self, id: TouchId, position: Point) -> Vec<PointerInput> {
        if let Some(slot) = self.fingers.get_mut(&id) {
            *slot = position;
        } else {
            return Vec::new();
        }

        if let Some(pinch) = self.pinch.as_mut() {
            let (a, b) = pinch.fingers;
            if id != a && id != b {
                return Vec::new();
            }
            let (Some(pa), Some(pb)) = (self.fingers.get(&a), self.fingers.get(&b)) else {
                return Vec::new();
            };
            let scale = pa.distance(*pb).max(MIN_PINCH_DISTANCE) / pinch.initial_distance;
            pinch.last_scale = scale;
            return vec![PointerInput::GestureChange { scale }];
        }

        if self.drag_finger == Some(id) {
            vec![PointerInput::TouchMove { position }]
        } else {
            Vec::new()
        }
    }

    /// A finger lifted or the platform cancelled it.
    pub fn ended(&mut self, id: TouchId) -> Vec<PointerInput> {
        if self.fingers.remove(&id).is_none() {
            return Vec::new();
        }
        if self.drag_finger == Some(id) {
            self.drag_finger = None;
        }

        let mut out = Vec::new();
        if let Some(pinch) = self.pinch {
            let (a, b) = pinch.fingers;
            if id == a || id == b {
                self.pinch = None;
                out.push(PointerInput::GestureEnd {
                    scale: pinch.last_scale,
                });
            }
        }
        if self.fingers.is_empty() {
            out.push(PointerInput::TouchEnd);
        }
        out
    }
}

/// Accumulates incremental magnification (as reported by trackpads) into a
/// cumulative finger-spread factor.
#[derive(Debug, Clone, Copy, Default)]
pub struct PinchAccumulator {
    scale: Option<f64>,
}

impl PinchAccumulator {
    /// Create an idle accumulator.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pinch is in progress.
    pub fn is_active(&self) -> bool {
        self.scale.is_some()
    }

    /// Start a pinch anchored at `origin`.
    pub fn begin(&mut self, origin: Point) -> PointerInput {
        self.scale = Some(1.0);
        PointerInput::GestureStart { origin }
    }

    /// Apply a magnification delta (positive spreads, negative pinches).
    pub fn update(&mut self, delta: f64) -> Option<PointerInput> {
        let scale = self.scale.as_mut()?;
        *scale = (*scale * (1.0 + delta)).max(f64::EPSILON);
        Some(PointerInput::GestureChange { scale: *scale })
    }

    /// Finish the pinch.
    pub fn end(&mut self) -> Option<PointerInput> {
        let scale = self.scale.take()?;
        Some(PointerInput::GestureEnd { scale })
    }
}
