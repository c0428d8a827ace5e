use std::io::{self, Write};

use pyground::{DisplaySurface, StatusView};

/// Display surface backed by the terminal.
///
/// Program output goes to stdout. Since a terminal cannot repaint, each
/// render prints only what was appended since the previous one; a render
/// that does not extend the shown text (Clear, a new run) starts over.
/// Diagnostics and status lines go to stderr.
pub struct TerminalDisplay {
    out: Box<dyn Write>,
    err: Box<dyn Write>,
    shown: String,
}

impl TerminalDisplay {
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(Box::new(io::stdout()), Box::new(io::stderr()))
    }

    #[must_use]
    pub fn new(out: Box<dyn Write>, err: Box<dyn Write>) -> Self {
        Self {
            out,
            err,
            shown: String::new(),
        }
    }

    fn emit(stream: &mut dyn Write, text: &str) {
        if let Err(err) = stream.write_all(text.as_bytes()).and_then(|()| stream.flush()) {
            tracing::warn!(%err, "cannot write to terminal");
        }
    }
}

impl DisplaySurface for TerminalDisplay {
    fn render_output(&mut self, text: &str) {
        let delta = output_delta(&self.shown, text);
        Self::emit(self.out.as_mut(), delta);
        text.clone_into(&mut self.shown);
    }

    fn append_diagnostic(&mut self, text: &str) {
        Self::emit(self.err.as_mut(), &format!("{text}\n"));
    }

    fn set_status(&mut self, view: &StatusView) {
        Self::emit(self.err.as_mut(), &format!("{}\n", status_line(view)));
    }

    fn set_controls_enabled(&mut self, enabled: bool) {
        tracing::debug!(enabled, "controls toggled");
    }
}

/// Part of `text` not yet on screen, given that `shown` already is.
#[must_use]
pub fn output_delta<'a>(shown: &str, text: &'a str) -> &'a str {
    text.strip_prefix(shown).unwrap_or(text)
}

/// `[ok] Execution successful`, `[err] Error`, `[..] Running…`.
#[must_use]
pub fn status_line(view: &StatusView) -> String {
    let tag = match view.class.as_str() {
        "" => "..",
        class => class,
    };
    format!("[{tag}] {}", view.message)
}
