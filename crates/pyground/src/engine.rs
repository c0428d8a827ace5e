//! The embedded script engine seam.
//!
//! The harness treats the interpreter as an opaque capability described by
//! two traits: an [`EngineLoader`] that produces the engine once, and the
//! [`ScriptEngine`] itself. [`EngineHandle`] owns the lazily loaded engine and
//! shares it between every run and every playground in the process.

use std::cell::Cell;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};

use crate::{
    error::{EngineError, EngineLoadError, ExecError},
    sink::OutputSink,
};

/// An embedded interpreter with a persistent global namespace.
#[async_trait(?Send)]
pub trait ScriptEngine {
    /// Deletes every global binding whose name does not start with `reserved_prefix`.
    ///
    /// Called before each run so that variables from one run are never
    /// visible to the next.
    fn reset_globals(&mut self, reserved_prefix: &str) -> Result<(), EngineError>;

    /// Routes everything the guest program writes to `sink`.
    ///
    /// The engine must call [`OutputSink::append`] once per output line and
    /// abort the running program when it returns an error.
    fn set_output_sink(&mut self, sink: OutputSink);

    /// Runs `code` to completion.
    ///
    /// Guest failures are returned as [`ExecError::Guest`]; a program stopped
    /// because the sink refused output is returned as [`ExecError::Aborted`].
    async fn execute(&mut self, code: &str) -> Result<(), ExecError>;
}

/// Produces a [`ScriptEngine`]; called at most once per successful load.
#[async_trait(?Send)]
pub trait EngineLoader {
    type Engine: ScriptEngine;

    async fn load(&self) -> Result<Self::Engine, EngineLoadError>;
}

/// Process-wide, lazily loaded engine.
///
/// Loading is memoized: concurrent callers of [`get`](Self::get) share one
/// in-flight load and all observe the same engine. A failed load leaves the
/// handle empty, so the next caller tries again.
pub struct EngineHandle<L: EngineLoader> {
    loader: L,
    engine: OnceCell<Mutex<L::Engine>>,
    load_attempts: Cell<usize>,
}

impl<L: EngineLoader> EngineHandle<L> {
    #[must_use]
    pub fn new(loader: L) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
            load_attempts: Cell::new(0),
        }
    }

    /// Whether the engine has finished loading.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.engine.initialized()
    }

    /// Returns the engine, loading it first if needed.
    pub async fn get(&self) -> Result<&Mutex<L::Engine>, EngineLoadError> {
        self.engine
            .get_or_try_init(|| async {
                let attempt = self.load_attempts.get() + 1;
                self.load_attempts.set(attempt);
                tracing::info!(attempt, "loading engine");
                let engine = self.loader.load().await?;
                tracing::info!(attempt, "engine ready");
                Ok::<_, EngineLoadError>(Mutex::new(engine))
            })
            .await
    }

    /// How many times the loader has been invoked.
    #[must_use]
    pub fn load_attempts(&self) -> usize {
        self.load_attempts.get()
    }

    #[must_use]
    pub fn loader(&self) -> &L {
        &self.loader
    }
}
