//! User-visible status reporting.
//!
//! [`describe`] is the pure half: it maps a [`Status`] to the message and
//! colour class shown in the status indicator. [`StatusReporter`] is the
//! side-effecting half: it writes those views to the display, appends
//! diagnostic blocks for failed and terminated runs, and owns the
//! controls-disabled transition while the engine loads.

use std::{borrow::Cow, fmt};

use crate::{
    controller::RunOutcome,
    display::SharedDisplay,
    editor::SharedEditor,
    error::EngineLoadError,
};

/// Notice appended to the output panel when a run hits the output ceiling.
pub const TERMINATION_NOTICE: &str = "--- Execution Stopped: Output limit exceeded (possible infinite loop) ---";

/// Colour class of the status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusClass {
    /// Neutral dot: loading, running, cleared, reset.
    Idle,
    /// Green dot.
    Ok,
    /// Red dot.
    Error,
}

impl StatusClass {
    /// CSS-style class name (`""`, `"ok"`, `"err"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "",
            Self::Ok => "ok",
            Self::Error => "err",
        }
    }
}

/// Everything the status indicator shows at one moment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusView {
    pub message: Cow<'static, str>,
    pub class: StatusClass,
}

impl StatusView {
    #[must_use]
    pub fn new(message: impl Into<Cow<'static, str>>, class: StatusClass) -> Self {
        Self {
            message: message.into(),
            class,
        }
    }
}

impl fmt::Display for StatusView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// States the status indicator can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Loading,
    Ready,
    LoadFailed,
    Running,
    Succeeded,
    Failed,
    Terminated,
    Cleared,
    Reset,
}

/// Maps a status to its indicator view.
#[must_use]
pub fn describe(status: Status) -> StatusView {
    let (message, class) = match status {
        Status::Loading => ("Loading engine…", StatusClass::Idle),
        Status::Ready => ("Engine ready", StatusClass::Ok),
        Status::LoadFailed => ("Error loading engine", StatusClass::Error),
        Status::Running => ("Running…", StatusClass::Idle),
        Status::Succeeded => ("Execution successful", StatusClass::Ok),
        Status::Failed => ("Error", StatusClass::Error),
        Status::Terminated => ("Terminated", StatusClass::Error),
        Status::Cleared => ("Cleared", StatusClass::Idle),
        Status::Reset => ("Reset", StatusClass::Idle),
    };
    StatusView::new(message, class)
}

/// Status the indicator settles on after a run, if the run may still touch the UI.
#[must_use]
pub fn status_for_outcome(outcome: &RunOutcome) -> Option<Status> {
    match outcome {
        RunOutcome::Succeeded => Some(Status::Succeeded),
        RunOutcome::Failed { .. } => Some(Status::Failed),
        RunOutcome::Terminated { .. } => Some(Status::Terminated),
        RunOutcome::EngineUnavailable { .. } => Some(Status::LoadFailed),
        RunOutcome::Superseded => None,
    }
}

/// Writes statuses and run diagnostics to a display.
#[derive(Clone)]
pub struct StatusReporter {
    display: SharedDisplay,
    editor: Option<SharedEditor>,
}

impl StatusReporter {
    #[must_use]
    pub fn new(display: SharedDisplay) -> Self {
        Self { display, editor: None }
    }

    /// Also locks this editor while controls are disabled.
    #[must_use]
    pub fn with_editor(mut self, editor: SharedEditor) -> Self {
        self.editor = Some(editor);
        self
    }

    /// Shows `status` in the indicator.
    pub fn set(&self, status: Status) {
        self.display.borrow_mut().set_status(&describe(status));
    }

    /// Enters the loading state: controls disabled, editor read-only.
    pub fn begin_loading(&self) {
        self.set_controls_disabled(true);
        self.set(Status::Loading);
    }

    /// Leaves the loading state. Controls are re-enabled whether or not the load worked.
    pub fn finish_loading(&self, result: Result<(), &EngineLoadError>) {
        self.set_controls_disabled(false);
        match result {
            Ok(()) => self.set(Status::Ready),
            Err(err) => {
                tracing::warn!(%err, "engine failed to load");
                self.set(Status::LoadFailed);
            }
        }
    }

    /// Reports the terminal state of a run.
    ///
    /// Failed runs get their diagnostic appended to the output panel, and
    /// terminated runs get [`TERMINATION_NOTICE`]. Superseded runs report nothing.
    pub fn report(&self, outcome: &RunOutcome) {
        let Some(status) = status_for_outcome(outcome) else {
            return;
        };
        match outcome {
            RunOutcome::Failed { diagnostic } => self.display.borrow_mut().append_diagnostic(diagnostic),
            RunOutcome::Terminated { .. } => self.display.borrow_mut().append_diagnostic(TERMINATION_NOTICE),
            _ => {}
        }
        self.set(status);
    }

    fn set_controls_disabled(&self, disabled: bool) {
        self.display.borrow_mut().set_controls_enabled(!disabled);
        if let Some(editor) = &self.editor {
            editor.borrow_mut().set_read_only(disabled);
        }
    }
}
