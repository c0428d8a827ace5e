use std::{fs, path::Path, time::Duration};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default ceiling on buffered output per run, in characters.
pub const DEFAULT_MAX_OUTPUT_CHARS: usize = 10_000;

/// Default delay between display frames (roughly one 60 Hz refresh).
pub const DEFAULT_FRAME_INTERVAL_MS: u64 = 16;

/// Globals whose names start with this prefix survive the pre-run reset.
pub const DEFAULT_RESERVED_PREFIX: &str = "_";

/// Snippet placed in an editor that starts out empty.
pub const DEFAULT_STARTER_CODE: &str = r#"# Welcome to the Playground
# This is a real Python environment. Edit the code and press Run.

def greet(name):
    return f"Hello, {name}!"

students = ["Alice", "Bob", "Charlie"]

print("--- Class Roster ---")
for s in students:
    print(greet(s))

print(f"Total students: {len(students)}")
"#;

/// Operator-tunable settings for a playground and its run harness.
///
/// Every field has a default, so an empty TOML document is a valid config.
/// Use the builder methods to override individual values in code:
///
/// ```
/// use pyground::PlaygroundConfig;
///
/// let config = PlaygroundConfig::new().max_output_chars(2_000).preload_package("math");
/// assert_eq!(config.max_output_chars, 2_000);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaygroundConfig {
    /// Ceiling on buffered output per run. Reaching it terminates the run.
    pub max_output_chars: usize,
    /// Delay between coalesced display flushes, in milliseconds.
    pub frame_interval_ms: u64,
    /// Name prefix of interpreter globals that are kept between runs.
    pub reserved_prefix: String,
    /// Code shown in an editor that has no initial content.
    pub starter_code: String,
    /// Packages imported once when the engine loads.
    pub preload_packages: Vec<String>,
    /// Expand tabs in submitted code to four spaces.
    pub expand_tabs: bool,
}

impl Default for PlaygroundConfig {
    fn default() -> Self {
        Self {
            max_output_chars: DEFAULT_MAX_OUTPUT_CHARS,
            frame_interval_ms: DEFAULT_FRAME_INTERVAL_MS,
            reserved_prefix: DEFAULT_RESERVED_PREFIX.to_owned(),
            starter_code: DEFAULT_STARTER_CODE.to_owned(),
            preload_packages: Vec::new(),
            expand_tabs: true,
        }
    }
}

impl PlaygroundConfig {
    /// Creates a config with all defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks that every value is usable by the harness.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_output_chars == 0 {
            return Err(ConfigError::Invalid {
                field: "max_output_chars",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "frame_interval_ms",
                reason: "must be greater than zero".to_owned(),
            });
        }
        if self.reserved_prefix.is_empty() {
            return Err(ConfigError::Invalid {
                field: "reserved_prefix",
                reason: "an empty prefix would keep every global between runs".to_owned(),
            });
        }
        Ok(())
    }

    /// Frame interval as a [`Duration`].
    #[must_use]
    pub fn frame_interval(&self) -> Duration {
        Duration::from_millis(self.frame_interval_ms)
    }

    /// Sets the output ceiling.
    #[must_use]
    pub fn max_output_chars(mut self, limit: usize) -> Self {
        self.max_output_chars = limit;
        self
    }

    /// Sets the frame interval in milliseconds.
    #[must_use]
    pub fn frame_interval_ms(mut self, interval: u64) -> Self {
        self.frame_interval_ms = interval;
        self
    }

    /// Sets the reserved globals prefix.
    #[must_use]
    pub fn reserved_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.reserved_prefix = prefix.into();
        self
    }

    /// Sets the starter snippet.
    #[must_use]
    pub fn starter_code(mut self, code: impl Into<String>) -> Self {
        self.starter_code = code.into();
        self
    }

    /// Adds a package to import when the engine loads.
    #[must_use]
    pub fn preload_package(mut self, package: impl Into<String>) -> Self {
        self.preload_packages.push(package.into());
        self
    }

    /// Enables or disables tab expansion of submitted code.
    #[must_use]
    pub fn expand_tabs(mut self, expand: bool) -> Self {
        self.expand_tabs = expand;
        self
    }
}
