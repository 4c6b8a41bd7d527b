//! Jumbotron Core Library
//!
//! Platform-agnostic viewport state, gesture handling and server protocol for
//! a Jumbotron display: one screen showing a window onto a large shared image.

pub mod controller;
pub mod gesture;
pub mod input;
pub mod mode;
pub mod projector;
pub mod sync;
pub mod throttle;
pub mod viewport;

pub use controller::{DisplayController, DisplayIdentity, LoadRequest, LoadTicket};
pub use gesture::{InputSource, MIN_SCALE_FACTOR, PointerSession, SessionEvent};
pub use input::{Modifiers, PinchAccumulator, PointerInput, TouchId, TouchTracker};
pub use mode::{InteractionGate, InteractionKind, Mode};
pub use projector::{Placement, Projector, RenderSink};
pub use sync::{
    ClientMessage, ConnectionState, PlatformWebSocket, ServerMessage, SyncError, SyncEvent,
    Transport,
};
pub use throttle::{Throttle, VIEWPORT_THROTTLE};
pub use viewport::{Rotation, Viewport};
