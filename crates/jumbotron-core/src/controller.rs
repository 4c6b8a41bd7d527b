//! The display controller: one owner for the viewport, the interaction mode
//! and the conversation with the remote authority.
//!
//! Three sources mutate the viewport: local drags, local scaling and remote
//! pushes. Local input goes through the [`InteractionGate`]; remote viewports
//! always replace local state but are only drawn when the user is not
//! interacting and no local change is still waiting to go out. Drawing them
//! earlier would make the image fight the user's finger.

use kurbo::{Size, Vec2};
use std::fmt;

#[cfg(not(target_arch = "wasm32"))]
use std::time::Instant;

#[cfg(target_arch = "wasm32")]
use web_time::Instant;

use crate::gesture::{
    InputSource, PointerSession, SessionEvent, mouse_scale_factor, native_scale_factor,
};
use crate::input::PointerInput;
use crate::mode::{InteractionGate, InteractionKind, Mode};
use crate::projector::{Projector, RenderSink};
use crate::sync::{ClientMessage, ServerMessage, SyncError, SyncEvent, Transport};
use crate::throttle::Throttle;
use crate::viewport::Viewport;

/// Message sent upstream when an image cannot be loaded.
pub const LOAD_FAILED_MESSAGE: &str = "Can't load image";

/// Who this display is, as announced on connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayIdentity {
    pub id: String,
    pub name: String,
}

/// Identifies one image load; completions for older tickets are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadTicket(u64);

/// An image the platform layer should fetch and decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: LoadTicket,
    pub image_ref: String,
}

/// Coordinates local input, remote updates and image loading.
pub struct DisplayController<S: RenderSink> {
    identity: DisplayIdentity,
    sink: S,
    viewport: Viewport,
    gate: InteractionGate,
    session: Option<PointerSession>,
    surface: Size,
    projector: Projector,
    outbound: Throttle,
    outgoing: Vec<ClientMessage>,
    /// Image most recently requested by the remote authority.
    image_ref: Option<String>,
    /// Load not yet picked up by the platform layer.
    pending_load: Option<LoadRequest>,
    /// Load whose completion is awaited.
    awaited: Option<LoadTicket>,
    next_ticket: u64,
    /// A remote viewport arrived while drawing was suppressed.
    deferred_render: bool,
    renders: u64,
    /// Outbound messages are only queued while connected.
    connected: bool,
}

impl<S: RenderSink> DisplayController<S> {
    /// Create an idle controller for a surface of the given size.
    pub fn new(identity: DisplayIdentity, surface: Size, sink: S) -> Self {
        Self {
            identity,
            sink,
            viewport: Viewport::default(),
            gate: InteractionGate::new(),
            session: None,
            surface,
            projector: Projector::new(),
            outbound: Throttle::default(),
            outgoing: Vec::new(),
            image_ref: None,
            pending_load: None,
            awaited: None,
            next_ticket: 0,
            deferred_render: false,
            renders: 0,
            connected: false,
        }
    }

    pub fn identity(&self) -> &DisplayIdentity {
        &self.identity
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn mode(&self) -> Mode {
        self.gate.mode()
    }

    pub fn is_frozen(&self) -> bool {
        self.gate.is_frozen()
    }

    pub fn surface(&self) -> Size {
        self.surface
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Image most recently requested by the remote authority.
    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    /// Number of placements pushed to the sink so far.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Whether an outbound viewport message is waiting for its slot.
    pub fn is_outbound_scheduled(&self) -> bool {
        self.outbound.is_scheduled()
    }

    /// When [`DisplayController::tick`] next needs to run.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.outbound.deadline()
    }

    /// Diagnostic one-liner describing the current state.
    pub fn describe(&self) -> String {
        let frozen = if self.gate.is_frozen() { ", frozen" } else { "" };
        format!("{} [{:?}{}]", self.viewport, self.gate.mode(), frozen)
    }

    // --- Rendering ---

    /// Project the current viewport and push it to the sink.
    pub fn render(&mut self) {
        let placement = self
            .projector
            .project(&self.viewport, self.surface, || self.sink.natural_size());
        self.sink.apply(&placement);
        self.renders += 1;
        self.deferred_render = false;
    }

    fn render_if_deferred(&mut self) {
        if self.deferred_render && self.gate.mode() == Mode::Idle && !self.outbound.is_scheduled() {
            log::debug!("Drawing deferred remote viewport {}", self.viewport);
            self.render();
        }
    }

    /// The surface changed size.
    pub fn resize(&mut self, surface: Size) {
        self.surface = surface;
        self.render();
        self.send_surface_size();
    }

    // --- Outbound ---

    /// Announce this display: identity, then surface size.
    pub fn send_initial(&mut self) {
        let (width, height) = surface_pixels(self.surface);
        self.queue(ClientMessage::Connect {
            id: self.identity.id.clone(),
            name: self.identity.name.clone(),
            width,
            height,
        });
        self.send_surface_size();
    }

    /// Queue the current surface size. Not throttled.
    pub fn send_surface_size(&mut self) {
        let (width, height) = surface_pixels(self.surface);
        self.queue(ClientMessage::Size { width, height });
    }

    /// Queue `msg` for the next flush. Dropped while disconnected.
    fn queue(&mut self, msg: ClientMessage) {
        if self.connected {
            self.outgoing.push(msg);
        } else {
            log::debug!("Not connected, dropping {:?}", msg);
        }
    }

    /// Arrange for the viewport to be sent once the throttle window closes.
    pub fn schedule_outbound_viewport(&mut self, now: Instant) {
        self.outbound.schedule(now);
    }

    /// Fire the outbound viewport message if its time has come.
    pub fn tick(&mut self, now: Instant) {
        if self.outbound.poll(now) {
            self.queue(ClientMessage::viewport(&self.viewport));
            self.render_if_deferred();
        }
    }

    /// Take pending outgoing messages (drains the queue).
    pub fn take_outgoing(&mut self) -> Vec<ClientMessage> {
        std::mem::take(&mut self.outgoing)
    }

    /// Check if there are pending outgoing messages.
    pub fn has_outgoing(&self) -> bool {
        !self.outgoing.is_empty()
    }

    /// Send queued messages over `transport`.
    ///
    /// Messages stay queued while the transport is not connected. A message
    /// that fails to send is dropped. Returns how many were handed over.
    pub fn flush(&mut self, transport: &impl Transport) -> Result<usize, SyncError> {
        if !transport.is_connected() {
            return Ok(0);
        }
        let mut sent = 0;
        for msg in self.take_outgoing() {
            match transport.send(&msg.to_json()?) {
                Ok(()) => sent += 1,
                Err(e) => log::warn!("Dropping outgoing {:?}: {}", msg, e),
            }
        }
        Ok(sent)
    }

    // --- Local input ---

    /// Feed a device event. Returns whether the viewport changed.
    pub fn handle_pointer(&mut self, input: PointerInput, now: Instant) -> bool {
        let Some(event) = SessionEvent::from_input(input) else {
            return false;
        };

        match event {
            SessionEvent::Start {
                source,
                kind,
                point,
            } => {
                if self.gate.begin(kind) {
                    self.session = Some(PointerSession::new(source, kind, point));
                } else {
                    log::trace!(
                        "Ignoring {:?} start in {:?} (frozen: {})",
                        source,
                        self.gate.mode(),
                        self.gate.is_frozen()
                    );
                }
                false
            }
            SessionEvent::Move {
                source,
                point,
                native_scale,
            } => self.apply_move(source, point, native_scale, now),
            SessionEvent::End {
                source,
                native_scale,
            } => {
                if self.session.is_some_and(|s| s.source() != source) {
                    return false;
                }
                let changed =
                    native_scale.is_some() && self.apply_move(source, None, native_scale, now);
                self.session = None;
                if self.gate.end() {
                    self.render_if_deferred();
                }
                changed
            }
        }
    }

    fn apply_move(
        &mut self,
        source: InputSource,
        point: Option<kurbo::Point>,
        native_scale: Option<f64>,
        now: Instant,
    ) -> bool {
        let Some(mut session) = self.session else {
            return false;
        };
        if session.source() != source || !self.gate.is_active(session.kind()) {
            return false;
        }

        let changed = match (session.kind(), point, native_scale) {
            (InteractionKind::Drag, Some(point), _) => {
                session.drag_to(&mut self.viewport, self.surface, point);
                true
            }
            (InteractionKind::Scale, _, Some(spread)) => match native_scale_factor(spread) {
                Some(factor) => {
                    session.scale_to(&mut self.viewport, self.surface, Vec2::new(factor, factor));
                    true
                }
                None => false,
            },
            (InteractionKind::Scale, Some(point), None) => {
                let factor = mouse_scale_factor(self.surface, session.displacement(point));
                session.scale_to(&mut self.viewport, self.surface, Vec2::new(factor, factor));
                true
            }
            _ => false,
        };
        self.session = Some(session);

        if changed {
            self.render();
            self.schedule_outbound_viewport(now);
        }
        changed
    }

    // --- Remote input ---

    /// React to a transport event.
    pub fn handle_event(&mut self, event: SyncEvent) {
        match event {
            SyncEvent::Connected => {
                let identity = &self.identity;
                log::info!("Connected as '{}' ({})", identity.name, identity.id);
                self.outgoing.clear();
                self.connected = true;
                self.send_initial();
            }
            SyncEvent::Disconnected => {
                log::warn!("Disconnected from server");
                self.connected = false;
            }
            SyncEvent::Message(msg) => self.handle_message(msg),
            SyncEvent::Error { message } => {
                log::error!("Connection error: {}", message);
                self.connected = false;
            }
        }
    }

    /// Apply a message from the remote authority.
    pub fn handle_message(&mut self, msg: ServerMessage) {
        match msg {
            ServerMessage::Load {
                image_ref,
                frozen,
                viewport,
            } => {
                if self.image_ref.as_deref() == Some(image_ref.as_str()) {
                    self.apply_remote_viewport(viewport);
                } else {
                    self.begin_load(image_ref, frozen, viewport);
                }
            }
            ServerMessage::Viewport(viewport) => {
                self.apply_remote_viewport(viewport);
            }
            ServerMessage::Error { message, detail } => {
                log::error!("ERROR from server: {} {}", message, detail);
            }
        }
    }

    /// Adopt an authoritative viewport. Returns whether it differed.
    pub fn apply_remote_viewport(&mut self, viewport: Viewport) -> bool {
        let viewport = viewport.sanitized();
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        if self.gate.mode() == Mode::Idle && !self.outbound.is_scheduled() {
            self.render();
        } else {
            let mode = self.gate.mode();
            log::debug!("Deferring remote viewport {} while {:?}", viewport, mode);
            self.deferred_render = true;
        }
        true
    }

    fn begin_load(&mut self, image_ref: String, frozen: bool, viewport: Viewport) {
        log::info!("Loading image {}", image_ref);
        self.gate.enter_loading();
        self.gate.set_frozen(frozen);
        self.viewport = viewport.sanitized();
        self.session = None;

        self.next_ticket += 1;
        let ticket = LoadTicket(self.next_ticket);
        self.awaited = Some(ticket);
        self.pending_load = Some(LoadRequest {
            ticket,
            image_ref: image_ref.clone(),
        });
        self.image_ref = Some(image_ref);
    }

    // --- Image loading ---

    /// Take the image load the platform layer should start, if any.
    pub fn take_load_request(&mut self) -> Option<LoadRequest> {
        self.pending_load.take()
    }

    /// Resolve a load. Returns false if the ticket was superseded.
    pub fn finish_load<E: fmt::Display>(
        &mut self,
        ticket: LoadTicket,
        outcome: Result<S::Content, E>,
    ) -> bool {
        if self.awaited != Some(ticket) {
            log::debug!("Ignoring superseded image load {:?}", ticket);
            return false;
        }
        self.awaited = None;
        self.gate.finish_loading();

        let image_ref = self.image_ref.clone().unwrap_or_default();
        match outcome {
            Ok(content) => {
                log::info!("Loaded image {}", image_ref);
                self.sink.set_content(content);
                self.projector.reset();
                self.render();
            }
            Err(e) => {
                log::error!("Failed to load image {}: {}", image_ref, e);
                self.queue(ClientMessage::Error {
                    message: LOAD_FAILED_MESSAGE.to_string(),
                    detail: image_ref,
                });
                self.render_if_deferred();
            }
        }
        true
    }
}

impl<S: RenderSink + fmt::Debug> fmt::Debug for DisplayController<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayController")
            .field("identity", &self.identity)
            .field("viewport", &self.viewport)
            .field("gate", &self.gate)
            .field("surface", &self.surface)
            .field("image_ref", &self.image_ref)
            .field("sink", &self.sink)
            .finish_non_exhaustive()
    }
}

fn surface_pixels(surface: Size) -> (u32, u32) {
    (
        surface.width.round().max(0.0) as u32,
        surface.height.round().max(0.0) as u32,
    )
}
