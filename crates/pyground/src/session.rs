//! Run sessions and the generation counter that orders them.
//!
//! Every press of Run creates a [`RunSession`] tagged with a fresh
//! [`Generation`]. Anything scheduled on behalf of a session (display flushes,
//! status writes) captures that generation and becomes a no-op as soon as a
//! newer session is active, so superseded runs can never leak output into the
//! current one.

use std::{cell::Cell, fmt, rc::Rc};

/// Monotonic id distinguishing a run from the runs it superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Generation(u64);

impl Generation {
    /// The generation before any run has started.
    pub const INITIAL: Self = Self(0);

    /// Returns the next generation.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// Raw counter value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Shared cell holding the generation of the session currently allowed to
/// touch the display.
///
/// Cloned into every sink and flush callback of a controller.
#[derive(Debug, Clone, Default)]
pub struct ActiveGeneration(Rc<Cell<Generation>>);

impl ActiveGeneration {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current active generation.
    #[must_use]
    pub fn get(&self) -> Generation {
        self.0.get()
    }

    /// Starts a new generation and returns it.
    pub fn advance(&self) -> Generation {
        let next = self.0.get().next();
        self.0.set(next);
        next
    }

    /// Whether `generation` is still the active one.
    #[must_use]
    pub fn is_current(&self, generation: Generation) -> bool {
        self.0.get() == generation
    }
}

/// Lifecycle state of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RunStatus {
    Pending,
    Running,
    Succeeded,
    Terminated,
    Failed,
}

impl RunStatus {
    /// Whether this status ends the session.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Terminated | Self::Failed)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Terminated => "terminated",
            Self::Failed => "failed",
        })
    }
}

/// One execution attempt.
///
/// The source is snapshotted when the session is created. The status only
/// moves forward: `Pending → Running → {Succeeded, Terminated, Failed}`, and a
/// terminal status is reached exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSession {
    generation: Generation,
    source: String,
    status: RunStatus,
    termination_reason: Option<String>,
}

impl RunSession {
    /// Creates a pending session for `source`.
    #[must_use]
    pub fn new(generation: Generation, source: impl Into<String>) -> Self {
        Self {
            generation,
            source: source.into(),
            status: RunStatus::Pending,
            termination_reason: None,
        }
    }

    #[must_use]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// The code snapshot this session executes.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Diagnostic or fixed explanation attached to a Failed/Terminated session.
    #[must_use]
    pub fn termination_reason(&self) -> Option<&str> {
        self.termination_reason.as_deref()
    }

    /// Moves a pending session to Running.
    pub(crate) fn start(&mut self) {
        debug_assert_eq!(self.status, RunStatus::Pending, "session {} started twice", self.generation);
        self.status = RunStatus::Running;
    }

    /// Records the terminal status. Later calls are ignored.
    pub(crate) fn finish(&mut self, status: RunStatus, reason: Option<String>) {
        debug_assert!(status.is_terminal(), "{status} is not a terminal status");
        if self.status.is_terminal() {
            return;
        }
        self.status = status;
        self.termination_reason = reason;
    }
}
