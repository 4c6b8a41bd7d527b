//! Wire protocol and WebSocket transport to the remote authority.
//!
//! Messages are JSON text frames tagged by a `type` field:
//! ```json
//! { "type": "connect", "id": "…", "name": "lobby", "width": 1280, "height": 800 }
//! { "type": "viewport", "x": 0, "y": 0, "width": 400, "height": 300 }
//! { "type": "load", "imageRef": "/images/a.jpg", "frozen": false, "viewport": { … } }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::viewport::Viewport;

/// Messages sent to the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Introduce this display.
    Connect {
        id: String,
        name: String,
        width: u32,
        height: u32,
    },
    /// Surface size changed.
    Size { width: u32, height: u32 },
    /// Local viewport changed. Rotation is remote-authoritative and omitted.
    Viewport {
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    /// Something went wrong locally (e.g. an image failed to load).
    Error { message: String, detail: String },
}

impl ClientMessage {
    /// Snapshot a viewport for sending.
    pub fn viewport(viewport: &Viewport) -> Self {
        ClientMessage::Viewport {
            x: viewport.x,
            y: viewport.y,
            width: viewport.width,
            height: viewport.height,
        }
    }

    /// Encode as a JSON text frame.
    pub fn to_json(&self) -> Result<String, SyncError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Messages received from the remote authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Show an image.
    Load {
        #[serde(rename = "imageRef", alias = "src")]
        image_ref: String,
        #[serde(default)]
        frozen: bool,
        #[serde(default)]
        viewport: Viewport,
    },
    /// Authoritative viewport update.
    Viewport(Viewport),
    /// Error report from the server.
    #[serde(alias = "errorMsg")]
    Error {
        #[serde(default)]
        message: String,
        #[serde(default)]
        detail: serde_json::Value,
    },
}

impl ServerMessage {
    /// Decode a JSON text frame.
    pub fn from_json(text: &str) -> Result<Self, SyncError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Decode a frame, logging and dropping anything malformed.
pub fn parse_server_message(text: &str) -> Option<ServerMessage> {
    match ServerMessage::from_json(text) {
        Ok(msg) => Some(msg),
        Err(e) => {
            let shown = truncate(text, 200);
            log::warn!("Dropping malformed server message ({}): {}", e, shown);
            None
        }
    }
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Transport errors.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),
    #[error("Invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Already connected")]
    AlreadyConnected,
    #[error("Not connected")]
    NotConnected,
    #[error("Send failed: {0}")]
    Send(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Events from the WebSocket client
#[derive(Debug, Clone, PartialEq)]
pub enum SyncEvent {
    /// Connected to server
    Connected,
    /// Disconnected from server
    Disconnected,
    /// A well-formed message arrived
    Message(ServerMessage),
    /// Error occurred
    Error { message: String },
}

/// A bidirectional message channel to the remote authority.
pub trait Transport {
    /// Send a text frame.
    fn send(&self, text: &str) -> Result<(), SyncError>;

    /// Drain pending events (non-blocking).
    fn poll_events(&mut self) -> Vec<SyncEvent>;

    /// Current connection state.
    fn state(&self) -> ConnectionState;

    /// Check if connected.
    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

fn next_state(current: ConnectionState, event: &SyncEvent) -> ConnectionState {
    match event {
        SyncEvent::Connected => ConnectionState::Connected,
        SyncEvent::Disconnected => ConnectionState::Disconnected,
        SyncEvent::Error { .. } => ConnectionState::Error,
        SyncEvent::Message(_) => current,
    }
}

// ----------------------------------------------------------------------------
// Browser client
// ----------------------------------------------------------------------------

#[cfg(target_arch = "wasm32")]
mod wasm_client {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::{BinaryType, CloseEvent, ErrorEvent, MessageEvent, WebSocket};

    type Inbox = Rc<RefCell<Vec<SyncEvent>>>;

    /// Socket callbacks; dropping them detaches the handlers.
    struct Handlers {
        _open: Closure<dyn FnMut()>,
        _message: Closure<dyn FnMut(MessageEvent)>,
        _close: Closure<dyn FnMut(CloseEvent)>,
        _error: Closure<dyn FnMut(ErrorEvent)>,
    }

    impl Handlers {
        fn attach(ws: &WebSocket, inbox: &Inbox) -> Self {
            let open = {
                let inbox = inbox.clone();
                Closure::<dyn FnMut()>::new(move || inbox.borrow_mut().push(SyncEvent::Connected))
            };
            let message = {
                let inbox = inbox.clone();
                Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
                    let Some(text) = event.data().as_string() else {
                        log::debug!("Ignoring non-text frame");
                        return;
                    };
                    if let Some(msg) = parse_server_message(&text) {
                        inbox.borrow_mut().push(SyncEvent::Message(msg));
                    }
                })
            };
            let close = {
                let inbox = inbox.clone();
                Closure::<dyn FnMut(CloseEvent)>::new(move |event: CloseEvent| {
                    log::info!("WebSocket closed (code {})", event.code());
                    inbox.borrow_mut().push(SyncEvent::Disconnected);
                })
            };
            let error = {
                let inbox = inbox.clone();
                Closure::<dyn FnMut(ErrorEvent)>::new(move |event: ErrorEvent| {
                    inbox.borrow_mut().push(SyncEvent::Error {
                        message: event.message(),
                    });
                })
            };

            ws.set_onopen(Some(open.as_ref().unchecked_ref()));
            ws.set_onmessage(Some(message.as_ref().unchecked_ref()));
            ws.set_onclose(Some(close.as_ref().unchecked_ref()));
            ws.set_onerror(Some(error.as_ref().unchecked_ref()));

            Self {
                _open: open,
                _message: message,
                _close: close,
                _error: error,
            }
        }
    }

    /// Browser WebSocket transport. Callbacks queue events for
    /// [`Transport::poll_events`].
    pub struct WasmWebSocket {
        socket: Option<(WebSocket, Handlers)>,
        state: ConnectionState,
        inbox: Inbox,
    }

    impl WasmWebSocket {
        pub fn new() -> Self {
            Self {
                socket: None,
                state: ConnectionState::Disconnected,
                inbox: Rc::new(RefCell::new(Vec::new())),
            }
        }

        /// Open a connection to `url`.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.socket.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            let ws = WebSocket::new(url).map_err(|e| SyncError::InvalidUrl(format!("{:?}", e)))?;
            ws.set_binary_type(BinaryType::Arraybuffer);
            let handlers = Handlers::attach(&ws, &self.inbox);
            self.socket = Some((ws, handlers));
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        /// Close the connection, if any.
        pub fn disconnect(&mut self) {
            if let Some((ws, _handlers)) = self.socket.take() {
                ws.set_onclose(None);
                let _ = ws.close();
            }
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Transport for WasmWebSocket {
        fn send(&self, text: &str) -> Result<(), SyncError> {
            let (ws, _) = self.socket.as_ref().ok_or(SyncError::NotConnected)?;
            ws.send_with_str(text)
                .map_err(|e| SyncError::Send(format!("{:?}", e)))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let events = self.inbox.take();
            self.state = events.iter().fold(self.state, next_state);
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for WasmWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }
}

#[cfg(target_arch = "wasm32")]
pub use wasm_client::WasmWebSocket;

// ----------------------------------------------------------------------------
// Native client
// ----------------------------------------------------------------------------

#[cfg(not(target_arch = "wasm32"))]
mod native_client {
    use super::*;
    use std::net::TcpStream;
    use std::ops::ControlFlow;
    use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
    use std::thread::{self, JoinHandle};
    use std::time::Duration;
    use tungstenite::stream::MaybeTlsStream;
    use tungstenite::{Message, WebSocket};
    use url::Url;

    /// Read timeout on the socket; bounds how long a queued send can wait.
    const READ_POLL: Duration = Duration::from_millis(20);
    const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

    type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

    enum Command {
        Send(String),
        Close,
    }

    /// Channels to a running connection thread.
    struct Link {
        commands: Sender<Command>,
        events: Receiver<SyncEvent>,
        _thread: JoinHandle<()>,
    }

    /// Native WebSocket transport.
    ///
    /// The socket lives on its own thread; frames travel over channels so
    /// that neither sending nor polling blocks the caller.
    pub struct NativeWebSocket {
        state: ConnectionState,
        link: Option<Link>,
    }

    /// Validate that `url` is a ws:// or wss:// URL.
    pub fn validate_url(url: &str) -> Result<Url, SyncError> {
        let parsed = Url::parse(url).map_err(|e| SyncError::InvalidUrl(e.to_string()))?;
        match parsed.scheme() {
            "ws" | "wss" => Ok(parsed),
            other => Err(SyncError::UnsupportedScheme(other.to_string())),
        }
    }

    impl NativeWebSocket {
        pub fn new() -> Self {
            Self {
                state: ConnectionState::Disconnected,
                link: None,
            }
        }

        /// Start connecting to `url` in the background.
        pub fn connect(&mut self, url: &str) -> Result<(), SyncError> {
            if self.link.is_some() {
                return Err(SyncError::AlreadyConnected);
            }
            let url = validate_url(url)?;

            let (command_tx, command_rx) = channel();
            let (event_tx, event_rx) = channel();
            let thread = thread::Builder::new()
                .name("jumbotron-ws".to_string())
                .spawn(move || run_connection(url, command_rx, event_tx))
                .map_err(|e| {
                    SyncError::Send(format!("Failed to spawn connection thread: {}", e))
                })?;

            self.link = Some(Link {
                commands: command_tx,
                events: event_rx,
                _thread: thread,
            });
            self.state = ConnectionState::Connecting;
            Ok(())
        }

        /// Close the connection, if any.
        pub fn disconnect(&mut self) {
            if let Some(link) = self.link.take() {
                let _ = link.commands.send(Command::Close);
            }
            self.state = ConnectionState::Disconnected;
        }
    }

    impl Transport for NativeWebSocket {
        fn send(&self, text: &str) -> Result<(), SyncError> {
            let link = self.link.as_ref().ok_or(SyncError::NotConnected)?;
            link.commands
                .send(Command::Send(text.to_string()))
                .map_err(|e| SyncError::Send(e.to_string()))
        }

        fn poll_events(&mut self) -> Vec<SyncEvent> {
            let Some(link) = &self.link else {
                return Vec::new();
            };
            let events: Vec<_> = link.events.try_iter().collect();
            self.state = events.iter().fold(self.state, next_state);
            events
        }

        fn state(&self) -> ConnectionState {
            self.state
        }
    }

    impl Default for NativeWebSocket {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Drop for NativeWebSocket {
        fn drop(&mut self) {
            self.disconnect();
        }
    }

    /// Body of the connection thread.
    fn run_connection(url: Url, commands: Receiver<Command>, events: Sender<SyncEvent>) {
        log::info!("Connecting to {}", url);
        let mut socket = match tungstenite::connect(url.as_str()) {
            Ok((socket, response)) => {
                log::info!("Connected to {} ({})", url, response.status());
                socket
            }
            Err(e) => {
                log::error!("Connection to {} failed: {}", url, e);
                let _ = events.send(SyncEvent::Error {
                    message: format!("Connection failed: {}", e),
                });
                return;
            }
        };
        set_poll_timeouts(&mut socket);
        let _ = events.send(SyncEvent::Connected);

        loop {
            if drain_commands(&mut socket, &commands).is_break() {
                break;
            }
            if read_frame(&mut socket, &events).is_break() {
                break;
            }
        }

        log::info!("Connection to {} closed", url);
        let _ = events.send(SyncEvent::Disconnected);
    }

    fn set_poll_timeouts(socket: &mut Socket) {
        match socket.get_mut() {
            MaybeTlsStream::Plain(tcp) => {
                let _ = tcp.set_read_timeout(Some(READ_POLL));
                let _ = tcp.set_write_timeout(Some(WRITE_TIMEOUT));
            }
            #[allow(unreachable_patterns)]
            _ => log::debug!("Non-plain stream, keeping default timeouts"),
        }
    }

    /// Forward queued outgoing frames to the socket.
    fn drain_commands(socket: &mut Socket, commands: &Receiver<Command>) -> ControlFlow<()> {
        loop {
            match commands.try_recv() {
                Ok(Command::Send(text)) => {
                    log::debug!("-> {}", truncate(&text, 100));
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("WebSocket send failed: {}", e);
                        return ControlFlow::Break(());
                    }
                }
                Ok(Command::Close) => {
                    let _ = socket.close(None);
                    return ControlFlow::Break(());
                }
                Err(TryRecvError::Empty) => return ControlFlow::Continue(()),
                Err(TryRecvError::Disconnected) => return ControlFlow::Break(()),
            }
        }
    }

    /// Wait briefly for one incoming frame and dispatch it.
    fn read_frame(socket: &mut Socket, events: &Sender<SyncEvent>) -> ControlFlow<()> {
        match socket.read() {
            Ok(Message::Text(text)) => {
                log::debug!("<- {}", truncate(&text, 100));
                if let Some(msg) = parse_server_message(&text) {
                    let _ = events.send(SyncEvent::Message(msg));
                }
                ControlFlow::Continue(())
            }
            Ok(Message::Ping(payload)) => {
                let _ = socket.send(Message::Pong(payload));
                ControlFlow::Continue(())
            }
            Ok(Message::Close(frame)) => {
                log::info!("Server closed the connection: {:?}", frame);
                ControlFlow::Break(())
            }
            Ok(_) => ControlFlow::Continue(()),
            Err(tungstenite::Error::Io(e))
                if matches!(
                    e.kind(),
                    std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
                ) =>
            {
                ControlFlow::Continue(())
            }
            Err(e) => {
                log::error!("WebSocket read failed: {}", e);
                ControlFlow::Break(())
            }
        }
    }
}

#[cfg(not(target_arch = "wasm32"))]
pub use native_client::{NativeWebSocket, validate_url};

// ----------------------------------------------------------------------------
// Platform alias
// ----------------------------------------------------------------------------

/// Platform-specific WebSocket client type.
#[cfg(target_arch = "wasm32")]
pub type PlatformWebSocket = WasmWebSocket;

#[cfg(not(target_arch = "wasm32"))]
pub type PlatformWebSocket = NativeWebSocket;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewport::Rotation;

    #[test]
    fn test_connect_message_serialize() {
        let msg = ClientMessage::Connect {
            id: "abc".to_string(),
            name: "lobby".to_string(),
            width: 800,
            height: 600,
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "connect");
        assert_eq!(value["id"], "abc");
        assert_eq!(value["name"], "lobby");
        assert_eq!(value["width"], 800);
    }

    #[test]
    fn test_viewport_message_omits_rotation() {
        let vp = Viewport::new(1.0, 2.0, 3.0, 4.0, Rotation::Deg90);
        let json = ClientMessage::viewport(&vp).to_json().unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["type"], "viewport");
        assert_eq!(value["x"], 1.0);
        assert_eq!(value["height"], 4.0);
        assert!(value.get("rotation").is_none());
    }

    #[test]
    fn test_load_message_deserialize() {
        let json = r#"{"type":"load","imageRef":"/img/a.jpg","frozen":true,
            "viewport":{"x":10,"y":20,"width":300,"height":200,"rotation":3}}"#;
        let msg = ServerMessage::from_json(json).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Load {
                image_ref: "/img/a.jpg".to_string(),
                frozen: true,
                viewport: Viewport::new(10.0, 20.0, 300.0, 200.0, Rotation::Deg270),
            }
        );
    }

    #[test]
    fn test_load_accepts_src_alias_and_defaults() {
        let json = r#"{"type":"load","src":"b.png"}"#;
        match ServerMessage::from_json(json).unwrap() {
            ServerMessage::Load {
                image_ref,
                frozen,
                viewport,
            } => {
                assert_eq!(image_ref, "b.png");
                assert!(!frozen);
                assert_eq!(viewport, Viewport::default());
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_viewport_message_deserialize() {
        let json = r#"{"type":"viewport","x":-5,"y":0.5,"width":640,"height":480,"rotation":1}"#;
        let msg = ServerMessage::from_json(json).unwrap();
        assert_eq!(
            msg,
            ServerMessage::Viewport(Viewport::new(-5.0, 0.5, 640.0, 480.0, Rotation::Deg90))
        );
    }

    #[test]
    fn test_error_message_aliases() {
        let json = r#"{"type":"errorMsg","message":"boom","detail":{"code":3}}"#;
        match ServerMessage::from_json(json).unwrap() {
            ServerMessage::Error { message, detail } => {
                assert_eq!(message, "boom");
                assert_eq!(detail["code"], 3);
            }
            other => panic!("Wrong message type: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_message_dropped() {
        assert!(parse_server_message("not json").is_none());
        assert!(parse_server_message(r#"{"type":"teleport"}"#).is_none());
        let bad_rotation = r#"{"type":"viewport","rotation":9}"#;
        assert!(parse_server_message(bad_rotation).is_none());
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_validate_url() {
        assert!(validate_url("ws://localhost:8080/display/lobby").is_ok());
        assert!(matches!(
            validate_url("http://localhost"),
            Err(SyncError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            validate_url("::nope"),
            Err(SyncError::InvalidUrl(_))
        ));
    }

    #[cfg(not(target_arch = "wasm32"))]
    #[test]
    fn test_send_without_connection_fails() {
        let ws = NativeWebSocket::new();
        assert!(matches!(ws.send("{}"), Err(SyncError::NotConnected)));
        assert_eq!(ws.state(), ConnectionState::Disconnected);
    }
}
