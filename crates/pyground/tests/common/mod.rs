//! Scripted stand-in for an embedded interpreter.
//!
//! `ScriptedEngine` understands a tiny line-oriented language, enough to
//! exercise every harness path without a real Python:
//!
//! | Line | Effect |
//! |------|--------|
//! | `name = 5` / `name = 'text'` / `name = other` | bind a global |
//! | `print(arg)` | write one line; `arg` is a literal or a global name |
//! | `repeat N: print(arg)` | write N lines |
//! | `while True: print(arg)` | write lines until the sink refuses |
//! | `await` | yield to the scheduler once |
//! | `sleep MS` | suspend for MS milliseconds |
//! | `raise message` | fail with `RuntimeError: message` |
//!
//! Anything else is a `SyntaxError`.

use std::{cell::Cell, collections::BTreeMap, rc::Rc, time::Duration};

use async_trait::async_trait;
use pyground::{EngineError, EngineLoadError, EngineLoader, ExecError, OutputSink, ScriptEngine};

#[derive(Debug, Default)]
pub struct ScriptedEngine {
    globals: BTreeMap<String, String>,
    sink: Option<OutputSink>,
}

impl ScriptedEngine {
    pub fn new() -> Self {
        let mut globals = BTreeMap::new();
        globals.insert("__name__".to_owned(), "__main__".to_owned());
        Self { globals, sink: None }
    }

    /// Value bound to a global, if any.
    pub fn global(&self, name: &str) -> Option<&str> {
        self.globals.get(name).map(String::as_str)
    }

    fn write(&self, text: &str) -> Result<(), ExecError> {
        let sink = self
            .sink
            .as_ref()
            .ok_or_else(|| ExecError::guest("RuntimeError: no output sink installed"))?;
        sink.append(text)?;
        Ok(())
    }

    fn eval(&self, arg: &str) -> Result<String, ExecError> {
        let arg = arg.trim();
        if let Some(text) = arg.strip_prefix('\'').and_then(|rest| rest.strip_suffix('\'')) {
            return Ok(text.to_owned());
        }
        if arg.parse::<i64>().is_ok() {
            return Ok(arg.to_owned());
        }
        self.globals
            .get(arg)
            .cloned()
            .ok_or_else(|| ExecError::guest(format!("NameError: name '{arg}' is not defined")))
    }
}

fn print_arg(statement: &str) -> Option<&str> {
    statement.strip_prefix("print(")?.strip_suffix(')')
}

fn syntax_error(line_no: usize) -> ExecError {
    ExecError::guest(format!("SyntaxError: invalid syntax (line {line_no})"))
}

#[async_trait(?Send)]
impl ScriptEngine for ScriptedEngine {
    fn reset_globals(&mut self, reserved_prefix: &str) -> Result<(), EngineError> {
        self.globals.retain(|name, _| name.starts_with(reserved_prefix));
        Ok(())
    }

    fn set_output_sink(&mut self, sink: OutputSink) {
        self.sink = Some(sink);
    }

    async fn execute(&mut self, code: &str) -> Result<(), ExecError> {
        for (index, line) in code.lines().enumerate() {
            let line_no = index + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            if line == "await" {
                tokio::task::yield_now().await;
            } else if let Some(ms) = line.strip_prefix("sleep ") {
                let ms = ms.trim().parse::<u64>().map_err(|_| syntax_error(line_no))?;
                tokio::time::sleep(Duration::from_millis(ms)).await;
            } else if let Some(message) = line.strip_prefix("raise ") {
                return Err(ExecError::guest(format!("RuntimeError: {message}")));
            } else if let Some(body) = line.strip_prefix("while True:") {
                let arg = print_arg(body.trim()).ok_or_else(|| syntax_error(line_no))?;
                loop {
                    let text = self.eval(arg)?;
                    self.write(&text)?;
                }
            } else if let Some(rest) = line.strip_prefix("repeat ") {
                let (count, body) = rest.split_once(':').ok_or_else(|| syntax_error(line_no))?;
                let count = count.trim().parse::<usize>().map_err(|_| syntax_error(line_no))?;
                let arg = print_arg(body.trim()).ok_or_else(|| syntax_error(line_no))?;
                for _ in 0..count {
                    let text = self.eval(arg)?;
                    self.write(&text)?;
                }
            } else if let Some(arg) = print_arg(line) {
                let text = self.eval(arg)?;
                self.write(&text)?;
            } else if let Some((name, value)) = line.split_once('=') {
                let name = name.trim();
                if name.is_empty() || !name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                    return Err(syntax_error(line_no));
                }
                let value = self.eval(value)?;
                self.globals.insert(name.to_owned(), value);
            } else {
                return Err(syntax_error(line_no));
            }
        }
        Ok(())
    }
}

/// Loader for [`ScriptedEngine`] that counts its invocations.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoader {
    pub loads: Rc<Cell<usize>>,
    pub fail: bool,
    pub delay: Option<Duration>,
}

impl ScriptedLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait(?Send)]
impl EngineLoader for ScriptedLoader {
    type Engine = ScriptedEngine;

    async fn load(&self) -> Result<ScriptedEngine, EngineLoadError> {
        self.loads.set(self.loads.get() + 1);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(EngineLoadError::new("interpreter bundle unavailable"));
        }
        Ok(ScriptedEngine::new())
    }
}

/// Runs `future` inside a fresh `LocalSet`, as the harness expects.
pub async fn local<F: std::future::Future>(future: F) -> F::Output {
    tokio::task::LocalSet::new().run_until(future).await
}
