use std::rc::Rc;

use crate::{
    config::PlaygroundConfig,
    controller::{ExecutionController, RunReport},
    display::SharedDisplay,
    editor::{SharedEditor, normalize_line_endings, normalize_source},
    engine::{EngineHandle, EngineLoader},
    error::EngineLoadError,
    frames::FrameScheduler,
    status::Status,
};

/// One playground widget: an editor and a display bound to a run controller.
///
/// Several playgrounds can share one [`EngineHandle`]; each keeps its own
/// sessions, output and status.
pub struct Playground<L: EngineLoader> {
    id: String,
    initial_code: String,
    expand_tabs: bool,
    editor: SharedEditor,
    controller: ExecutionController<L>,
}

impl<L: EngineLoader> Playground<L> {
    /// Mounts a playground.
    ///
    /// The snippet restored by Reset is the editor's current content, or the
    /// configured starter code when the editor starts out empty.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        config: &PlaygroundConfig,
        engine: Rc<EngineHandle<L>>,
        editor: SharedEditor,
        display: SharedDisplay,
        frames: Rc<dyn FrameScheduler>,
    ) -> Self {
        let existing = normalize_line_endings(&editor.borrow().value());
        let initial_code = if existing.is_empty() {
            config.starter_code.clone()
        } else {
            existing
        };
        editor.borrow_mut().set_value(&initial_code);

        let controller = ExecutionController::new(config, engine, frames, display).with_editor(Rc::clone(&editor));
        Self {
            id: id.into(),
            initial_code,
            expand_tabs: config.expand_tabs,
            editor,
            controller,
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The snippet Reset restores.
    #[must_use]
    pub fn initial_code(&self) -> &str {
        &self.initial_code
    }

    #[must_use]
    pub fn controller(&self) -> &ExecutionController<L> {
        &self.controller
    }

    /// Loads the engine up front, with controls disabled until it is ready.
    pub async fn boot(&self) -> Result<(), EngineLoadError> {
        tracing::debug!(playground = %self.id, "booting");
        self.controller.ensure_engine().await.map(|_| ())
    }

    /// Runs the editor's current content.
    pub async fn run(&self) -> RunReport {
        let source = normalize_source(&self.editor.borrow().value(), self.expand_tabs);
        tracing::debug!(playground = %self.id, "run requested");
        self.controller.run(&source).await
    }

    /// Empties the output panel and buffer. The editor and engine globals are untouched.
    pub fn clear(&self) {
        self.controller.clear_output();
        self.controller.reporter().set(Status::Cleared);
    }

    /// Restores the initial snippet and clears output and status.
    pub fn reset(&self) {
        self.editor.borrow_mut().set_value(&self.initial_code);
        self.controller.clear_output();
        self.controller.reporter().set(Status::Reset);
    }
}
