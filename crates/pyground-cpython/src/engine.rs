use std::ffi::CString;

use async_trait::async_trait;
use pyground::{AbortReason, EngineError, EngineLoadError, EngineLoader, ExecError, OutputSink, ScriptEngine};
use pyo3::{prelude::*, types::PyDict};

use crate::stream::{OutputAborted, StreamWriter};

// =============================================================================
// Loader
// =============================================================================

/// Loads the embedded interpreter and imports the configured packages.
#[derive(Debug, Clone, Default)]
pub struct CpythonLoader {
    preload: Vec<String>,
}

impl CpythonLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Modules imported once at load time so the first run does not pay for them.
    #[must_use]
    pub fn with_preload(mut self, packages: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.preload.extend(packages.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn preload(&self) -> &[String] {
        &self.preload
    }
}

#[async_trait(?Send)]
impl EngineLoader for CpythonLoader {
    type Engine = CpythonEngine;

    async fn load(&self) -> Result<CpythonEngine, EngineLoadError> {
        Python::attach(|py| {
            let version = py.version().to_owned();
            for package in &self.preload {
                py.import(package.as_str())
                    .map_err(|err| EngineLoadError::new(format!("cannot import `{package}`: {err}")))?;
                tracing::debug!(%package, "preloaded");
            }
            let globals = fresh_globals(py).map_err(|err| EngineLoadError::new(err.to_string()))?;
            tracing::info!(%version, "python interpreter ready");
            Ok(CpythonEngine { globals, sink: None })
        })
    }
}

/// Builds the `__main__`-like namespace guest code runs in.
fn fresh_globals(py: Python<'_>) -> PyResult<Py<PyDict>> {
    let globals = PyDict::new(py);
    globals.set_item("__name__", "__main__")?;
    globals.set_item("__builtins__", py.import("builtins")?)?;
    Ok(globals.unbind())
}

// =============================================================================
// Engine
// =============================================================================

/// A CPython interpreter with one persistent global namespace.
///
/// Stdout and stderr are redirected into the installed [`OutputSink`] for
/// the duration of each `execute` call, and stdin reads as empty so
/// `input()` fails with `EOFError` instead of blocking.
#[derive(Debug)]
pub struct CpythonEngine {
    globals: Py<PyDict>,
    sink: Option<OutputSink>,
}

impl CpythonEngine {
    /// Names currently bound in the global namespace.
    #[must_use]
    pub fn global_names(&self) -> Vec<String> {
        Python::attach(|py| {
            self.globals
                .bind(py)
                .keys()
                .iter()
                .filter_map(|key| key.extract::<String>().ok())
                .collect()
        })
    }

    fn run_captured(&self, py: Python<'_>, source: &CString, sink: &OutputSink) -> Result<(), ExecError> {
        let sys = py.import("sys").map_err(|err| host_error(py, &err))?;
        let writer = Bound::new(py, StreamWriter::new(sink.clone())).map_err(|err| host_error(py, &err))?;
        let redirect = Redirect::install(&sys, &writer).map_err(|err| host_error(py, &err))?;

        let result = py.run(source.as_c_str(), Some(self.globals.bind(py)), None);
        let tail = writer.borrow_mut().finish();
        redirect.restore().map_err(|err| host_error(py, &err))?;

        match result {
            Ok(()) => tail.map_err(ExecError::from),
            Err(err) if err.is_instance_of::<OutputAborted>(py) => {
                Err(ExecError::Aborted(sink.abort_reason().unwrap_or(AbortReason::Superseded)))
            }
            Err(err) => Err(ExecError::guest(format_exception(py, &err))),
        }
    }
}

#[async_trait(?Send)]
impl ScriptEngine for CpythonEngine {
    fn reset_globals(&mut self, reserved_prefix: &str) -> Result<(), EngineError> {
        Python::attach(|py| -> PyResult<usize> {
            let globals = self.globals.bind(py);
            let doomed: Vec<Bound<'_, PyAny>> = globals
                .keys()
                .iter()
                .filter(|key| !key.extract::<String>().is_ok_and(|name| name.starts_with(reserved_prefix)))
                .collect();
            for key in &doomed {
                globals.del_item(key)?;
            }
            Ok(doomed.len())
        })
        .map(|purged| tracing::debug!(purged, "globals reset"))
        .map_err(|err| EngineError::Reset(err.to_string()))
    }

    fn set_output_sink(&mut self, sink: OutputSink) {
        self.sink = Some(sink);
    }

    async fn execute(&mut self, code: &str) -> Result<(), ExecError> {
        let sink = self
            .sink
            .clone()
            .ok_or_else(|| ExecError::guest("RuntimeError: no output sink installed"))?;
        let source =
            CString::new(code).map_err(|_| ExecError::guest("SyntaxError: source code cannot contain null bytes"))?;
        Python::attach(|py| self.run_captured(py, &source, &sink))
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// Saved `sys` streams, put back by [`Redirect::restore`].
struct Redirect<'py> {
    sys: Bound<'py, PyModule>,
    stdout: Bound<'py, PyAny>,
    stderr: Bound<'py, PyAny>,
    stdin: Bound<'py, PyAny>,
}

impl<'py> Redirect<'py> {
    /// Points the `sys` streams at `writer`. If any swap fails, the streams
    /// already swapped are put back before the error is returned.
    fn install(sys: &Bound<'py, PyModule>, writer: &Bound<'py, StreamWriter>) -> PyResult<Self> {
        let saved = Self {
            sys: sys.clone(),
            stdout: sys.getattr("stdout")?,
            stderr: sys.getattr("stderr")?,
            stdin: sys.getattr("stdin")?,
        };
        if let Err(err) = saved.redirect(writer) {
            if let Err(restore_err) = saved.restore() {
                tracing::error!(%restore_err, "cannot restore sys streams");
            }
            return Err(err);
        }
        Ok(saved)
    }

    fn redirect(&self, writer: &Bound<'py, StreamWriter>) -> PyResult<()> {
        self.sys.setattr("stdout", writer)?;
        self.sys.setattr("stderr", writer)?;
        let empty_stdin = self.sys.py().import("io")?.getattr("StringIO")?.call0()?;
        self.sys.setattr("stdin", empty_stdin)
    }

    /// Puts every saved stream back, reporting the first failure.
    fn restore(&self) -> PyResult<()> {
        let stdout = self.sys.setattr("stdout", &self.stdout);
        let stderr = self.sys.setattr("stderr", &self.stderr);
        let stdin = self.sys.setattr("stdin", &self.stdin);
        stdout.and(stderr).and(stdin)
    }
}

/// Renders an exception the way Python prints an uncaught one.
fn format_exception(py: Python<'_>, err: &PyErr) -> String {
    let formatted = py
        .import("traceback")
        .and_then(|traceback| traceback.call_method1("format_exception", (err.value(py),)))
        .and_then(|lines| lines.extract::<Vec<String>>());
    match formatted {
        Ok(lines) => lines.concat().trim_end().to_owned(),
        Err(_) => err.to_string(),
    }
}

fn host_error(py: Python<'_>, err: &PyErr) -> ExecError {
    tracing::error!(%err, "interpreter plumbing failed");
    ExecError::guest(format_exception(py, err))
}
