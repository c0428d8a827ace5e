use std::{cell::RefCell, rc::Rc};

use crate::status::{StatusClass, StatusView};

/// Display surface shared between a controller, its sinks and their flush callbacks.
pub type SharedDisplay = Rc<RefCell<dyn DisplaySurface>>;

/// The visible side of a playground: output panel, status indicator and controls.
///
/// Implement this trait to render a playground somewhere. The harness calls
/// it from a single thread; `render_output` is only ever called from a
/// coalesced flush or a forced final flush, never once per printed line.
pub trait DisplaySurface {
    /// Replaces the output panel with the full buffered output.
    fn render_output(&mut self, text: &str);

    /// Appends a diagnostic block (error text, termination notice) below the output.
    fn append_diagnostic(&mut self, text: &str);

    /// Updates the status indicator.
    fn set_status(&mut self, view: &StatusView);

    /// Enables or disables the Run / Clear / Reset controls.
    fn set_controls_enabled(&mut self, enabled: bool);
}

/// A `DisplaySurface` that records everything in memory.
///
/// Useful for tests and headless hosts that read the final state after a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryDisplay {
    output: String,
    diagnostics: Vec<String>,
    status: StatusView,
    controls_enabled: bool,
    render_count: usize,
}

impl Default for MemoryDisplay {
    fn default() -> Self {
        Self {
            output: String::new(),
            diagnostics: Vec::new(),
            status: StatusView::new("", StatusClass::Idle),
            controls_enabled: true,
            render_count: 0,
        }
    }
}

impl MemoryDisplay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wraps a new display for sharing with a controller.
    #[must_use]
    pub fn shared() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Text currently shown in the output panel (without diagnostics).
    #[must_use]
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Diagnostic blocks appended since the output was last replaced.
    #[must_use]
    pub fn diagnostics(&self) -> &[String] {
        &self.diagnostics
    }

    #[must_use]
    pub fn status(&self) -> &StatusView {
        &self.status
    }

    #[must_use]
    pub fn controls_enabled(&self) -> bool {
        self.controls_enabled
    }

    /// How many times the output panel has been rewritten.
    #[must_use]
    pub fn render_count(&self) -> usize {
        self.render_count
    }
}

impl DisplaySurface for MemoryDisplay {
    fn render_output(&mut self, text: &str) {
        text.clone_into(&mut self.output);
        self.diagnostics.clear();
        self.render_count += 1;
    }

    fn append_diagnostic(&mut self, text: &str) {
        self.diagnostics.push(text.to_owned());
    }

    fn set_status(&mut self, view: &StatusView) {
        self.status = view.clone();
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        self.controls_enabled = enabled;
    }
}
