//! Interaction mode state machine.
//!
//! ```text
//! idle ──start──▶ dragging | scaling ──end──▶ idle
//!   any ──load──▶ loading ──done/failed──▶ idle
//! ```
//!
//! Only `idle` accepts a new interaction, and never while frozen. Loading can
//! be entered from any state; an interaction that was in progress then finds
//! its `end` to be a no-op.

/// What the display is currently doing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Mode {
    #[default]
    Idle,
    Dragging,
    Scaling,
    Loading,
}

impl Mode {
    /// Whether this mode belongs to a local interaction.
    pub fn is_interacting(self) -> bool {
        matches!(self, Mode::Dragging | Mode::Scaling)
    }
}

/// Interaction that a pointer session can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InteractionKind {
    Drag,
    Scale,
}

impl InteractionKind {
    fn mode(self) -> Mode {
        match self {
            InteractionKind::Drag => Mode::Dragging,
            InteractionKind::Scale => Mode::Scaling,
        }
    }
}

/// Single owner of the mode and the remote "frozen" flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InteractionGate {
    mode: Mode,
    frozen: bool,
}

impl InteractionGate {
    /// Create an idle, unfrozen gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current mode.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Whether the remote authority has disabled panning and zooming.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Set by the remote authority alongside a new image.
    pub fn set_frozen(&mut self, frozen: bool) {
        self.frozen = frozen;
    }

    /// Whether a new interaction could start right now.
    pub fn can_start(&self) -> bool {
        self.mode == Mode::Idle && !self.frozen
    }

    /// Try to start an interaction. Returns false if the gate is closed.
    pub fn begin(&mut self, kind: InteractionKind) -> bool {
        if !self.can_start() {
            return false;
        }
        self.mode = kind.mode();
        true
    }

    /// Whether an interaction of `kind` is the one in progress.
    pub fn is_active(&self, kind: InteractionKind) -> bool {
        self.mode == kind.mode()
    }

    /// End the current interaction.
    ///
    /// Only leaves `dragging` or `scaling`; returns whether the mode changed.
    pub fn end(&mut self) -> bool {
        if self.mode.is_interacting() {
            self.mode = Mode::Idle;
            true
        } else {
            false
        }
    }

    /// Enter loading unconditionally.
    pub fn enter_loading(&mut self) {
        self.mode = Mode::Loading;
    }

    /// Leave loading after the image settled, either way.
    pub fn finish_loading(&mut self) {
        if self.mode == Mode::Loading {
            self.mode = Mode::Idle;
        }
    }
}
