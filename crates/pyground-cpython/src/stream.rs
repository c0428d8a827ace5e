//! Python-side output capture.
//!
//! A [`StreamWriter`] stands in for `sys.stdout` and `sys.stderr` while guest
//! code runs. It cuts whatever Python writes into lines and hands each line
//! to the session's [`OutputSink`]. When the sink refuses a line, the write
//! raises [`OutputAborted`], which unwinds the guest program.

use pyground::{AbortReason, OutputSink};
use pyo3::{create_exception, exceptions::PyBaseException, prelude::*};

create_exception!(
    pyground,
    OutputAborted,
    PyBaseException,
    "Raised inside guest code when the harness stops the run.\n\n\
     Derives from BaseException so `except Exception:` cannot swallow it."
);

/// File-like object installed as `sys.stdout` / `sys.stderr`.
///
/// `print("a")` arrives as two writes (`"a"` and `"\n"`), so text is held
/// until a newline completes the line. A held line that could no longer fit
/// under the ceiling goes to the sink right away, so output without newlines
/// still trips the limit.
#[pyclass(module = "pyground", unsendable)]
pub struct StreamWriter {
    sink: OutputSink,
    partial: String,
    partial_chars: usize,
}

impl StreamWriter {
    #[must_use]
    pub fn new(sink: OutputSink) -> Self {
        Self {
            sink,
            partial: String::new(),
            partial_chars: 0,
        }
    }

    /// Hands a trailing unterminated line to the sink.
    pub fn finish(&mut self) -> Result<(), AbortReason> {
        if self.partial.is_empty() {
            return Ok(());
        }
        self.emit_partial()
    }

    fn emit_partial(&mut self) -> Result<(), AbortReason> {
        let line = std::mem::take(&mut self.partial);
        self.partial_chars = 0;
        self.sink.append(&line)
    }

    /// Splits `text` into lines, looking only at the new text for newlines.
    fn accept(&mut self, text: &str) -> Result<(), AbortReason> {
        let mut rest = text;
        while let Some(end) = rest.find('\n') {
            self.partial.push_str(&rest[..end]);
            self.emit_partial()?;
            rest = &rest[end + 1..];
        }
        self.partial.push_str(rest);
        self.partial_chars += rest.chars().count();

        // The sink counts a newline after the held text, so once the held
        // text fills `room` the line is bound to cross the ceiling.
        if self.partial_chars > 0 && self.partial_chars >= self.sink.room()? {
            self.emit_partial()?;
        }
        Ok(())
    }
}

#[pymethods]
impl StreamWriter {
    /// Returns the number of characters written, like `io.TextIOBase.write`.
    fn write(&mut self, text: &str) -> PyResult<usize> {
        self.accept(text)
            .map_err(|reason| OutputAborted::new_err(reason.to_string()))?;
        Ok(text.chars().count())
    }

    fn flush(&self) {}

    fn isatty(&self) -> bool {
        false
    }

    fn writable(&self) -> bool {
        true
    }

    #[getter]
    fn encoding(&self) -> &'static str {
        "utf-8"
    }
}
