use std::{io, path::PathBuf};

use thiserror::Error;

/// Why the harness stopped a running guest program.
///
/// Aborts are initiated by the harness itself through the output sink, which is
/// the only point where a running program can be interrupted. They are kept
/// apart from guest diagnostics so callers never have to inspect message text
/// to tell "your code is wrong" from "your code printed too much".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AbortReason {
    /// The session's output buffer reached its character ceiling.
    #[error("output limit exceeded (possible infinite loop)")]
    OutputLimitExceeded {
        /// The configured ceiling, in characters.
        limit: usize,
    },
    /// A newer run started while this one was still writing output.
    #[error("superseded by a newer run")]
    Superseded,
}

/// Failure of one `ScriptEngine::execute` call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The guest program failed on its own: syntax error, uncaught exception, etc.
    ///
    /// The diagnostic is shown to the user verbatim.
    #[error("{diagnostic}")]
    Guest {
        /// Engine-formatted diagnostic text (usually a traceback).
        diagnostic: String,
    },
    /// The harness stopped the program through the output sink.
    #[error(transparent)]
    Aborted(#[from] AbortReason),
}

impl ExecError {
    /// Builds a guest failure from any displayable diagnostic.
    #[must_use]
    pub fn guest(diagnostic: impl Into<String>) -> Self {
        Self::Guest {
            diagnostic: diagnostic.into(),
        }
    }
}

/// The embedded engine could not be initialized.
///
/// Surfaced as the terminal "Error loading engine" status. The load is not
/// retried automatically; the next run request attempts it again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("failed to load engine: {message}")]
pub struct EngineLoadError {
    /// Human-readable cause reported by the loader.
    pub message: String,
}

impl EngineLoadError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Failure of an engine operation other than running guest code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Purging interpreter globals before a run failed.
    #[error("failed to reset interpreter globals: {0}")]
    Reset(String),
}

/// Errors raised while loading or validating a [`PlaygroundConfig`](crate::PlaygroundConfig).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("cannot read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The config text is not valid TOML for this schema.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    /// A field holds a value the harness cannot work with.
    #[error("invalid config value for `{field}`: {reason}")]
    Invalid { field: &'static str, reason: String },
}
