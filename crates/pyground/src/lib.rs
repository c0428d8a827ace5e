#![doc = include_str!("../../../README.md")]

mod config;
mod controller;
mod display;
mod editor;
mod engine;
mod error;
pub mod frames;
mod playground;
pub mod session;
mod sink;
pub mod status;

pub use crate::{
    config::{
        DEFAULT_FRAME_INTERVAL_MS, DEFAULT_MAX_OUTPUT_CHARS, DEFAULT_RESERVED_PREFIX, DEFAULT_STARTER_CODE,
        PlaygroundConfig,
    },
    controller::{ExecutionController, RunOutcome, RunReport},
    display::{DisplaySurface, MemoryDisplay, SharedDisplay},
    editor::{Editor, SharedEditor, TextEditor, normalize_line_endings, normalize_source},
    engine::{EngineHandle, EngineLoader, ScriptEngine},
    error::{AbortReason, ConfigError, EngineError, EngineLoadError, ExecError},
    frames::{FrameCallback, FrameId, FrameScheduler, ManualFrames, TokioFrames},
    playground::Playground,
    session::{Generation, RunSession, RunStatus},
    sink::{OutputBuffer, OutputSink},
    status::{Status, StatusClass, StatusReporter, StatusView},
};
