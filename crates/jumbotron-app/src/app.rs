//! Application state and lifecycle.

use jumbotron_core::sync::{NativeWebSocket, Transport};
use jumbotron_core::{ConnectionState, DisplayController};
use jumbotron_render::VelloSink;
use kurbo::Size;
use peniko::Color;
use std::sync::Arc;
use std::time::{Duration, Instant};
use vello::util::{RenderContext, RenderSurface};
use vello::wgpu::PresentMode;
use winit::application::ApplicationHandler;
use winit::dpi::LogicalSize;
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::bridge::{BridgeEvent, InputBridge};
use crate::config::DisplayConfig;
use crate::loader::{ImageLoader, LoadError};
use crate::present::Presenter;

/// How often the connection and loader are checked while nothing else is due.
const POLL_INTERVAL: Duration = Duration::from_millis(16);

/// Pause between reconnection attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Surface fill outside the image.
const BACKGROUND: Color = Color::BLACK;

/// Runtime state, created once the window exists.
struct AppState {
    // Windowing
    window: Arc<Window>,
    surface: RenderSurface<'static>,

    // Rendering
    presenter: Presenter,
    /// Controller render count at the last redraw request.
    drawn: u64,

    // State
    controller: DisplayController<VelloSink>,
    bridge: InputBridge,

    // Connection
    websocket: NativeWebSocket,
    next_connect: Option<Instant>,
}

/// Main application struct.
pub struct App {
    config: DisplayConfig,
    loader: ImageLoader,
    state: Option<AppState>,
    render_cx: Option<RenderContext>,
}

impl App {
    /// Create the application. Fails if the HTTP client cannot be set up.
    pub fn new(config: DisplayConfig) -> Result<Self, LoadError> {
        let loader = ImageLoader::new(config.image_base())?;
        if let Some(base) = loader.base() {
            log::info!("Resolving relative images against {}", base);
        }
        Ok(Self {
            config,
            loader,
            state: None,
            render_cx: None,
        })
    }

    /// Run the event loop until the window closes.
    pub fn run(mut self) -> Result<(), winit::error::EventLoopError> {
        let event_loop = EventLoop::new()?;
        event_loop.run_app(&mut self)
    }

    /// Finish initialization after the surface is created.
    fn finish_init(
        &mut self,
        window: Arc<Window>,
        surface: RenderSurface<'static>,
    ) -> Result<(), vello::Error> {
        let Some(render_cx) = self.render_cx.as_ref() else {
            return Ok(());
        };
        let device = &render_cx.devices[surface.dev_id].device;
        let presenter = Presenter::new(device, surface.config.format, BACKGROUND)?;

        let size = Size::new(surface.config.width as f64, surface.config.height as f64);
        let identity = self.config.identity();
        log::info!(
            "Display '{}' ({}) initialized - {}x{}",
            identity.name,
            identity.id,
            surface.config.width,
            surface.config.height
        );

        let sink = VelloSink::new().with_background(BACKGROUND);
        let mut controller = DisplayController::new(identity, size, sink);
        controller.render();

        self.state = Some(AppState {
            window: window.clone(),
            surface,
            presenter,
            drawn: 0,
            controller,
            bridge: InputBridge::new(),
            websocket: NativeWebSocket::new(),
            next_connect: Some(Instant::now()),
        });

        window.request_redraw();
        Ok(())
    }
}

impl AppState {
    /// Show the controller's current scene.
    fn redraw(&mut self, render_cx: &RenderContext) {
        let handle = &render_cx.devices[self.surface.dev_id];
        let scene = self.controller.sink().scene();
        if let Err(e) = self.presenter.present(handle, &self.surface, scene) {
            log::warn!("Failed to present frame: {}", e);
        }
    }

    /// Exchange messages with the server, collect finished loads and fire
    /// due timers.
    fn pump(&mut self, loader: &mut ImageLoader, server: &str, now: Instant) {
        self.maintain_connection(server, now);

        for event in self.websocket.poll_events() {
            self.controller.handle_event(event);
        }

        if let Some(request) = self.controller.take_load_request() {
            loader.request(request);
        }
        for outcome in loader.poll() {
            self.controller.finish_load(outcome.ticket, outcome.result);
        }

        self.controller.tick(now);

        if let Err(e) = self.controller.flush(&self.websocket) {
            log::error!("Failed to encode outgoing message: {}", e);
        }

        self.request_redraw_if_changed();
    }

    fn maintain_connection(&mut self, server: &str, now: Instant) {
        match self.websocket.state() {
            ConnectionState::Disconnected | ConnectionState::Error => {
                let due = self.next_connect.get_or_insert(now + RECONNECT_DELAY);
                if now < *due {
                    return;
                }
                self.next_connect = None;
                self.websocket.disconnect();
                log::info!("Connecting to {}", server);
                if let Err(e) = self.websocket.connect(server) {
                    log::error!("WebSocket connect failed: {}", e);
                    self.next_connect = Some(now + RECONNECT_DELAY);
                }
            }
            ConnectionState::Connecting | ConnectionState::Connected => {}
        }
    }

    fn request_redraw_if_changed(&mut self) {
        let renders = self.controller.render_count();
        if renders != self.drawn {
            self.drawn = renders;
            self.window.request_redraw();
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title(&self.config.title)
            .with_inner_size(LogicalSize::new(self.config.width, self.config.height));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                log::error!("Failed to create window: {}", e);
                event_loop.exit();
                return;
            }
        };

        let size = window.inner_size();
        let (width, height) = if size.width == 0 || size.height == 0 {
            (self.config.width, self.config.height)
        } else {
            (size.width, size.height)
        };
        log::info!("Surface size: {}x{}", width, height);

        let render_cx = self.render_cx.get_or_insert_with(RenderContext::new);
        let surface = match pollster::block_on(render_cx.create_surface(
            window.clone(),
            width,
            height,
            PresentMode::AutoVsync,
        )) {
            Ok(surface) => surface,
            Err(e) => {
                log::error!("Failed to create surface: {:?}", e);
                event_loop.exit();
                return;
            }
        };

        if let Err(e) = self.finish_init(window, surface) {
            log::error!("Failed to create renderer: {:?}", e);
            event_loop.exit();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                if size.width == 0 || size.height == 0 {
                    return;
                }
                let Some(state) = &mut self.state else {
                    return;
                };
                if let Some(render_cx) = self.render_cx.as_mut() {
                    render_cx.resize_surface(&mut state.surface, size.width, size.height);
                }
                state
                    .controller
                    .resize(Size::new(size.width as f64, size.height as f64));
                state.request_redraw_if_changed();
            }

            WindowEvent::RedrawRequested => {
                if let (Some(state), Some(render_cx)) = (&mut self.state, &self.render_cx) {
                    state.redraw(render_cx);
                }
            }

            event => {
                let Some(state) = &mut self.state else {
                    return;
                };
                let now = Instant::now();
                for action in state.bridge.handle(&event) {
                    match action {
                        BridgeEvent::Pointer(input) => {
                            state.controller.handle_pointer(input, now);
                        }
                        BridgeEvent::DescribeViewport => {
                            log::info!("Viewport: {}", state.controller.describe());
                        }
                    }
                }
                state.request_redraw_if_changed();
            }
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = &mut self.state else {
            return;
        };
        let now = Instant::now();
        state.pump(&mut self.loader, &self.config.server, now);

        let mut wake = now + POLL_INTERVAL;
        if let Some(deadline) = state.controller.next_deadline() {
            wake = wake.min(deadline);
        }
        event_loop.set_control_flow(ControlFlow::WaitUntil(wake));
    }
}
