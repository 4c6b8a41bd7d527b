//! Gesture interpretation: turning device movement into viewport changes.
//!
//! Mouse, touch and native pinch input are adapted into one
//! [`SessionEvent`] shape. A [`PointerSession`] then holds the
//! interaction-local reference state (first contact point, what has already
//! been applied) and converts each move into an incremental viewport
//! mutation.
//!
//! Both drag and scale re-derive the cumulative change from the first contact
//! point on every move and apply only the difference from what was applied
//! before. Summing per-move deltas instead would accumulate rounding drift.

use kurbo::{Point, Size, Vec2};

use crate::input::PointerInput;
use crate::mode::InteractionKind;
use crate::viewport::Viewport;

/// Smallest scale factor accepted on either axis.
pub const MIN_SCALE_FACTOR: f64 = 0.1;

/// The device family that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputSource {
    Mouse,
    Touch,
    Gesture,
}

/// Device-independent interaction event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionEvent {
    Start {
        source: InputSource,
        kind: InteractionKind,
        point: Point,
    },
    Move {
        source: InputSource,
        point: Option<Point>,
        native_scale: Option<f64>,
    },
    End {
        source: InputSource,
        native_scale: Option<f64>,
    },
}

impl SessionEvent {
    /// Adapt a device event. Multi-finger touch starts yield `None`; those
    /// are handled as native gestures.
    pub fn from_input(input: PointerInput) -> Option<Self> {
        let event = match input {
            PointerInput::MouseDown {
                position,
                modifiers,
            } => SessionEvent::Start {
                source: InputSource::Mouse,
                kind: if modifiers.shift {
                    InteractionKind::Scale
                } else {
                    InteractionKind::Drag
                },
                point: position,
            },
            PointerInput::MouseMove { position } => SessionEvent::Move {
                source: InputSource::Mouse,
                point: Some(position),
                native_scale: None,
            },
            PointerInput::MouseUp => SessionEvent::End {
                source: InputSource::Mouse,
                native_scale: None,
            },
            PointerInput::TouchStart { position, touches } => {
                if touches != 1 {
                    return None;
                }
                SessionEvent::Start {
                    source: InputSource::Touch,
                    kind: InteractionKind::Drag,
                    point: position,
                }
            }
            PointerInput::TouchMove { position } => SessionEvent::Move {
                source: InputSource::Touch,
                point: Some(position),
                native_scale: None,
            },
            PointerInput::TouchEnd => SessionEvent::End {
                source: InputSource::Touch,
                native_scale: None,
            },
            PointerInput::GestureStart { origin } => SessionEvent::Start {
                source: InputSource::Gesture,
                kind: InteractionKind::Scale,
                point: origin,
            },
            PointerInput::GestureChange { scale } => SessionEvent::Move {
                source: InputSource::Gesture,
                point: None,
                native_scale: Some(scale),
            },
            PointerInput::GestureEnd { scale } => SessionEvent::End {
                source: InputSource::Gesture,
                native_scale: Some(scale),
            },
        };
        Some(event)
    }
}

/// Uniform scale proposed by a shift-drag.
///
/// Movement is normalised by the larger surface side; moving down/left
/// zooms out (the viewport grows), up/right zooms in.
pub fn mouse_scale_factor(surface: Size, displacement: Vec2) -> f64 {
    let extent = surface.width.max(surface.height);
    if extent <= 0.0 {
        return 1.0;
    }
    1.0 + (displacement.y - displacement.x) / extent
}

/// Scale to apply for a native pinch.
///
/// The platform reports how far the fingers spread; spreading should show
/// less of the image, so the viewport scales by the inverse. Returns `None`
/// for unusable spreads.
pub fn native_scale_factor(spread: f64) -> Option<f64> {
    (spread.is_finite() && spread > 0.0).then(|| 1.0 / spread)
}

/// Interaction-local state for one drag or scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerSession {
    source: InputSource,
    kind: InteractionKind,
    origin: Point,
    applied_translation: Vec2,
    applied_scale: Vec2,
}

impl PointerSession {
    /// Start a session at the first contact point (surface pixels).
    pub fn new(source: InputSource, kind: InteractionKind, origin: Point) -> Self {
        Self {
            source,
            kind,
            origin,
            applied_translation: Vec2::ZERO,
            applied_scale: Vec2::new(1.0, 1.0),
        }
    }

    pub fn source(&self) -> InputSource {
        self.source
    }

    pub fn kind(&self) -> InteractionKind {
        self.kind
    }

    /// First contact point in surface pixels.
    pub fn origin(&self) -> Point {
        self.origin
    }

    /// Cumulative scale applied so far.
    pub fn applied_scale(&self) -> Vec2 {
        self.applied_scale
    }

    /// Displacement of `point` from the first contact point.
    pub fn displacement(&self, point: Point) -> Vec2 {
        point - self.origin
    }

    /// Drag the image so that the content under the first contact point
    /// follows `point`. Returns the step applied to the viewport.
    pub fn drag_to(&mut self, viewport: &mut Viewport, surface: Size, point: Point) -> Vec2 {
        if surface.width <= 0.0 || surface.height <= 0.0 {
            return Vec2::ZERO;
        }

        // Content moves with the finger, so the viewport moves against it.
        let moved = -self.displacement(point);
        let extent = viewport.display_extent();
        let total = Vec2::new(
            moved.x * extent.width / surface.width,
            moved.y * extent.height / surface.height,
        );

        let step = viewport.rotation.orient(total - self.applied_translation);
        viewport.translate(step.x, step.y);
        self.applied_translation = total;
        step
    }

    /// Scale the viewport to `proposed` relative to its size at session start,
    /// anchored at the first contact point. Returns the incremental factor
    /// applied.
    ///
    /// The anchor mapping does not account for rotation.
    pub fn scale_to(&mut self, viewport: &mut Viewport, surface: Size, proposed: Vec2) -> Vec2 {
        if surface.width <= 0.0 || surface.height <= 0.0 {
            return Vec2::new(1.0, 1.0);
        }

        let target = Vec2::new(
            proposed.x.max(MIN_SCALE_FACTOR),
            proposed.y.max(MIN_SCALE_FACTOR),
        );
        let anchor = Point::new(
            self.origin.x * viewport.width / surface.width + viewport.x,
            self.origin.y * viewport.height / surface.height + viewport.y,
        );
        let step = Vec2::new(
            target.x / self.applied_scale.x,
            target.y / self.applied_scale.y,
        );

        viewport.scale(step.x, step.y, anchor.x, anchor.y);
        self.applied_scale = target;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::Modifiers;
    use crate::viewport::Rotation;

    const EPS: f64 = 1e-9;

    fn surface() -> Size {
        Size::new(800.0, 600.0)
    }

    #[test]
    fn test_adapt_mouse() {
        let down = SessionEvent::from_input(PointerInput::MouseDown {
            position: Point::new(1.0, 2.0),
            modifiers: Modifiers::default(),
        });
        assert_eq!(
            down,
            Some(SessionEvent::Start {
                source: InputSource::Mouse,
                kind: InteractionKind::Drag,
                point: Point::new(1.0, 2.0),
            })
        );

        let shift_down = SessionEvent::from_input(PointerInput::MouseDown {
            position: Point::ZERO,
            modifiers: Modifiers { shift: true },
        });
        assert!(matches!(
            shift_down,
            Some(SessionEvent::Start {
                kind: InteractionKind::Scale,
                ..
            })
        ));
    }

    #[test]
    fn test_adapt_multi_touch_start_ignored() {
        let event = SessionEvent::from_input(PointerInput::TouchStart {
            position: Point::ZERO,
            touches: 2,
        });
        assert!(event.is_none());
    }

    #[test]
    fn test_adapt_gesture() {
        let change = SessionEvent::from_input(PointerInput::GestureChange { scale: 2.0 });
        assert_eq!(
            change,
            Some(SessionEvent::Move {
                source: InputSource::Gesture,
                point: None,
                native_scale: Some(2.0),
            })
        );
    }

    #[test]
    fn test_drag_moves_viewport_against_pointer() {
        let mut vp = Viewport::new(0.0, 0.0, 400.0, 300.0, Rotation::Deg0);
        let start = Point::new(100.0, 100.0);
        let mut session = PointerSession::new(InputSource::Mouse, InteractionKind::Drag, start);
        let step = session.drag_to(&mut vp, surface(), Point::new(180.0, 160.0));
        // 80px right at 0.5 image px per surface px => viewport 40px left.
        assert!((step.x + 40.0).abs() < EPS);
        assert!((step.y + 30.0).abs() < EPS);
        assert!((vp.x + 40.0).abs() < EPS);
        assert!((vp.y + 30.0).abs() < EPS);
    }

    #[test]
    fn test_drag_steps_sum_to_total_without_drift() {
        let path = [
            Point::new(103.3, 99.1),
            Point::new(117.9, 88.4),
            Point::new(151.2, 71.7),
            Point::new(140.0, 120.3),
            Point::new(222.2, 133.3),
        ];
        let origin = Point::new(100.0, 100.0);
        for rotation in Rotation::ALL {
            let start = Viewport::new(10.0, 20.0, 400.0, 300.0, rotation);
            let mut vp = start;
            let mut session =
                PointerSession::new(InputSource::Touch, InteractionKind::Drag, origin);
            let mut sum = Vec2::ZERO;
            for point in path {
                sum += session.drag_to(&mut vp, surface(), point);
            }

            let last = path[path.len() - 1];
            let extent = start.display_extent();
            let expected = rotation.orient(Vec2::new(
                -(last.x - origin.x) * extent.width / 800.0,
                -(last.y - origin.y) * extent.height / 600.0,
            ));
            assert!((sum.x - expected.x).abs() < 1e-9, "{:?}", rotation);
            assert!((sum.y - expected.y).abs() < 1e-9, "{:?}", rotation);
            let moved = Vec2::new(vp.x - start.x, vp.y - start.y);
            assert!((moved.x - expected.x).abs() < 1e-9, "{:?}", rotation);
            assert!((moved.y - expected.y).abs() < 1e-9, "{:?}", rotation);
        }
    }

    #[test]
    fn test_drag_back_to_origin_restores_viewport() {
        let start = Viewport::new(5.0, 5.0, 300.0, 200.0, Rotation::Deg90);
        let mut vp = start;
        let origin = Point::new(50.0, 50.0);
        let mut session = PointerSession::new(InputSource::Mouse, InteractionKind::Drag, origin);
        session.drag_to(&mut vp, surface(), Point::new(90.0, 10.0));
        session.drag_to(&mut vp, surface(), Point::new(50.0, 50.0));
        assert!((vp.x - start.x).abs() < EPS);
        assert!((vp.y - start.y).abs() < EPS);
    }

    #[test]
    fn test_sideways_drag_uses_swapped_extent_and_rotation() {
        // Sideways: surface x maps to viewport height.
        let mut vp = Viewport::new(0.0, 0.0, 300.0, 400.0, Rotation::Deg90);
        let mut session =
            PointerSession::new(InputSource::Mouse, InteractionKind::Drag, Point::ZERO);
        let step = session.drag_to(&mut vp, surface(), Point::new(80.0, 0.0));
        // total = (-80 * 400/800, 0) = (-40, 0); 90° maps (dx, dy) to (dy, -dx).
        assert!((step.x - 0.0).abs() < EPS);
        assert!((step.y - 40.0).abs() < EPS);
    }

    #[test]
    fn test_scale_compounds_against_last_applied() {
        let start = Viewport::new(0.0, 0.0, 400.0, 300.0, Rotation::Deg0);
        let mut vp = start;
        let mut session =
            PointerSession::new(InputSource::Gesture, InteractionKind::Scale, Point::ZERO);

        session.scale_to(&mut vp, surface(), Vec2::new(2.0, 2.0));
        assert!((vp.width - 800.0).abs() < EPS);
        session.scale_to(&mut vp, surface(), Vec2::new(3.0, 3.0));
        assert!((vp.width - 1200.0).abs() < EPS);
        assert!((vp.height - 900.0).abs() < EPS);

        // Back to 1.0 restores the starting extent.
        session.scale_to(&mut vp, surface(), Vec2::new(1.0, 1.0));
        assert!((vp.width - start.width).abs() < EPS);
        assert!((vp.height - start.height).abs() < EPS);
    }

    #[test]
    fn test_scale_keeps_anchor_fixed() {
        let mut vp = Viewport::new(100.0, 100.0, 400.0, 300.0, Rotation::Deg0);
        // Surface point (400, 300) is image point (300, 250).
        let mut session = PointerSession::new(
            InputSource::Mouse,
            InteractionKind::Scale,
            Point::new(400.0, 300.0),
        );
        session.scale_to(&mut vp, surface(), Vec2::new(0.5, 0.5));
        let anchor_after = Point::new(
            400.0 * vp.width / 800.0 + vp.x,
            300.0 * vp.height / 600.0 + vp.y,
        );
        assert!((anchor_after.x - 300.0).abs() < EPS);
        assert!((anchor_after.y - 250.0).abs() < EPS);
    }

    #[test]
    fn test_scale_clamps_to_floor() {
        let mut vp = Viewport::new(0.0, 0.0, 400.0, 300.0, Rotation::Deg0);
        let mut session =
            PointerSession::new(InputSource::Gesture, InteractionKind::Scale, Point::ZERO);
        let step = session.scale_to(&mut vp, surface(), Vec2::new(0.01, 0.01));
        assert!((step.x - MIN_SCALE_FACTOR).abs() < EPS);
        assert!((session.applied_scale().y - MIN_SCALE_FACTOR).abs() < EPS);
        assert!((vp.width - 40.0).abs() < EPS);
        assert!(vp.height > 0.0);
    }

    #[test]
    fn test_mouse_scale_factor() {
        let down = mouse_scale_factor(surface(), Vec2::new(0.0, 80.0));
        assert!((down - 1.1).abs() < EPS);
        let right = mouse_scale_factor(surface(), Vec2::new(80.0, 0.0));
        assert!((right - 0.9).abs() < EPS);
        assert_eq!(mouse_scale_factor(Size::ZERO, Vec2::new(5.0, 5.0)), 1.0);
    }

    #[test]
    fn test_native_scale_factor_inverts_spread() {
        assert_eq!(native_scale_factor(2.0), Some(0.5));
        assert_eq!(native_scale_factor(0.0), None);
        assert_eq!(native_scale_factor(f64::NAN), None);
    }
}
