//! The execution controller: drives one run from Run click to terminal status.
//!
//! Each call to [`ExecutionController::run`] starts a new session that
//! supersedes whatever ran before it:
//!
//! 1. cancel the previous session's scheduled flush and advance the generation
//! 2. clear the output panel and mark the new session Running
//! 3. load the engine if needed (controls disabled meanwhile)
//! 4. purge non-reserved interpreter globals
//! 5. install the session's sink as the engine's output channel
//! 6. execute the code
//! 7. reconcile: final flush and exactly one terminal status
//!
//! A superseded session stops touching the display the moment a newer
//! generation becomes active, and its sink refuses further output so an
//! engine that is still running it stops at its next write.

use std::{cell::RefCell, rc::Rc};

use tokio::sync::Mutex;

use crate::{
    config::PlaygroundConfig,
    display::SharedDisplay,
    editor::SharedEditor,
    engine::{EngineHandle, EngineLoader, ScriptEngine},
    error::{AbortReason, EngineLoadError, ExecError},
    frames::FrameScheduler,
    session::{ActiveGeneration, Generation, RunSession, RunStatus},
    sink::OutputSink,
    status::{Status, StatusReporter},
};

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// The program ran to completion.
    Succeeded,
    /// The program failed with a guest diagnostic, or the pre-run reset failed.
    Failed { diagnostic: String },
    /// The harness stopped the program at the output ceiling.
    Terminated { limit: usize },
    /// The engine could not be loaded.
    EngineUnavailable { message: String },
    /// A newer run started before this one finished.
    Superseded,
}

impl RunOutcome {
    /// Session status and termination reason recorded for this outcome.
    fn session_status(&self) -> (RunStatus, Option<String>) {
        match self {
            Self::Succeeded => (RunStatus::Succeeded, None),
            Self::Failed { diagnostic } => (RunStatus::Failed, Some(diagnostic.clone())),
            Self::Terminated { limit } => (
                RunStatus::Terminated,
                Some(AbortReason::OutputLimitExceeded { limit: *limit }.to_string()),
            ),
            Self::EngineUnavailable { message } => (RunStatus::Failed, Some(message.clone())),
            Self::Superseded => (RunStatus::Terminated, Some(AbortReason::Superseded.to_string())),
        }
    }
}

/// Result of one [`ExecutionController::run`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// The finished session, in a terminal status.
    pub session: RunSession,
    pub outcome: RunOutcome,
    /// Everything the session buffered, up to and including the chunk that tripped the ceiling.
    pub output: String,
}

/// Drives runs against a shared engine and reports them on one display.
pub struct ExecutionController<L: EngineLoader> {
    engine: Rc<EngineHandle<L>>,
    max_output_chars: usize,
    reserved_prefix: String,
    frames: Rc<dyn FrameScheduler>,
    display: SharedDisplay,
    reporter: StatusReporter,
    active: ActiveGeneration,
    current: RefCell<Option<OutputSink>>,
}

// =============================================================================
// Construction
// =============================================================================

impl<L: EngineLoader> ExecutionController<L> {
    #[must_use]
    pub fn new(
        config: &PlaygroundConfig,
        engine: Rc<EngineHandle<L>>,
        frames: Rc<dyn FrameScheduler>,
        display: SharedDisplay,
    ) -> Self {
        Self {
            engine,
            max_output_chars: config.max_output_chars,
            reserved_prefix: config.reserved_prefix.clone(),
            frames,
            reporter: StatusReporter::new(Rc::clone(&display)),
            display,
            active: ActiveGeneration::new(),
            current: RefCell::new(None),
        }
    }

    /// Locks `editor` whenever the controls are disabled for engine loading.
    #[must_use]
    pub fn with_editor(mut self, editor: SharedEditor) -> Self {
        self.reporter = self.reporter.with_editor(editor);
        self
    }

    #[must_use]
    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    #[must_use]
    pub fn engine(&self) -> &Rc<EngineHandle<L>> {
        &self.engine
    }

    /// Generation of the most recently started run.
    #[must_use]
    pub fn active_generation(&self) -> Generation {
        self.active.get()
    }
}

// =============================================================================
// Running
// =============================================================================

impl<L: EngineLoader> ExecutionController<L> {
    /// Runs `source` as a new session, superseding any run still in flight.
    ///
    /// Never fails: every error is folded into the returned [`RunOutcome`] and
    /// reported on the display.
    pub async fn run(&self, source: &str) -> RunReport {
        let sink = self.begin_session();
        let generation = sink.generation();
        let mut session = RunSession::new(generation, source);
        session.start();
        tracing::info!(%generation, bytes = source.len(), "run started");

        let outcome = self.drive(session.source(), &sink).await;
        let (status, reason) = outcome.session_status();
        session.finish(status, reason);
        self.reporter.report(&outcome);
        tracing::info!(%generation, %status, chunks = sink.chunk_count(), "run finished");

        RunReport {
            session,
            outcome,
            output: sink.output(),
        }
    }

    /// Loads the engine if needed, with controls disabled while the load is in flight.
    pub async fn ensure_engine(&self) -> Result<&Mutex<L::Engine>, EngineLoadError> {
        self.load_engine(None).await
    }

    /// Like [`ensure_engine`](Self::ensure_engine) on behalf of the run owning
    /// `sink`. If that run is superseded while the load is in flight, it
    /// leaves the controls and status to the newer run.
    async fn load_engine(&self, sink: Option<&OutputSink>) -> Result<&Mutex<L::Engine>, EngineLoadError> {
        if self.engine.is_ready() {
            return self.engine.get().await;
        }
        self.reporter.begin_loading();
        let result = self.engine.get().await;
        if sink.is_none_or(OutputSink::is_current) {
            self.reporter.finish_loading(result.as_ref().map(|_| ()));
        }
        result
    }

    /// Empties the active session's buffer and the output panel.
    ///
    /// Leaves engine globals and any running program alone.
    pub fn clear_output(&self) {
        match self.current.borrow().as_ref() {
            Some(sink) => sink.clear(),
            None => self.display.borrow_mut().render_output(""),
        }
    }

    /// Copy of the active session's buffered output.
    #[must_use]
    pub fn current_output(&self) -> String {
        self.current.borrow().as_ref().map(OutputSink::output).unwrap_or_default()
    }

    fn begin_session(&self) -> OutputSink {
        if let Some(previous) = self.current.borrow_mut().take() {
            previous.cancel_pending();
        }
        let generation = self.active.advance();
        let sink = OutputSink::new(
            generation,
            self.max_output_chars,
            self.active.clone(),
            Rc::clone(&self.frames),
            Rc::clone(&self.display),
        );
        *self.current.borrow_mut() = Some(sink.clone());
        self.display.borrow_mut().render_output("");
        sink
    }

    async fn drive(&self, source: &str, sink: &OutputSink) -> RunOutcome {
        let engine = match self.load_engine(Some(sink)).await {
            Ok(engine) => engine,
            Err(err) if sink.is_current() => {
                return RunOutcome::EngineUnavailable {
                    message: err.to_string(),
                };
            }
            Err(_) => return RunOutcome::Superseded,
        };
        if !sink.is_current() {
            return RunOutcome::Superseded;
        }
        self.reporter.set(Status::Running);

        let mut engine = engine.lock().await;
        if !sink.is_current() {
            return RunOutcome::Superseded;
        }
        if let Err(err) = engine.reset_globals(&self.reserved_prefix) {
            sink.flush_now();
            return RunOutcome::Failed {
                diagnostic: err.to_string(),
            };
        }
        engine.set_output_sink(sink.clone());
        let result = engine.execute(source).await;
        drop(engine);

        if !sink.is_current() {
            return RunOutcome::Superseded;
        }
        reconcile(result, sink)
    }
}

/// Maps an execution result to an outcome and performs the final flush.
///
/// A sink that tripped its ceiling always means Terminated, even when the
/// guest caught the abort and finished or failed some other way.
fn reconcile(result: Result<(), ExecError>, sink: &OutputSink) -> RunOutcome {
    sink.cancel_pending();
    sink.flush_now();
    if let Some(AbortReason::OutputLimitExceeded { limit }) = sink.abort_reason() {
        return RunOutcome::Terminated { limit };
    }
    match result {
        Ok(()) => RunOutcome::Succeeded,
        Err(ExecError::Guest { diagnostic }) => RunOutcome::Failed { diagnostic },
        Err(ExecError::Aborted(AbortReason::OutputLimitExceeded { limit })) => RunOutcome::Terminated { limit },
        Err(ExecError::Aborted(AbortReason::Superseded)) => RunOutcome::Superseded,
    }
}
