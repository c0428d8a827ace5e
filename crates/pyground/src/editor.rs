use std::{cell::RefCell, rc::Rc};

/// Editor surface shared between a playground and its status reporter.
pub type SharedEditor = Rc<RefCell<dyn Editor>>;

/// Source of the code text a playground runs.
pub trait Editor {
    /// Current editor content.
    fn value(&self) -> String;

    /// Replaces the editor content.
    fn set_value(&mut self, value: &str);

    /// Locks or unlocks editing.
    fn set_read_only(&mut self, read_only: bool);
}

/// In-memory [`Editor`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextEditor {
    text: String,
    read_only: bool,
}

impl TextEditor {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            read_only: false,
        }
    }

    /// Wraps a new editor for sharing with a playground.
    #[must_use]
    pub fn shared(text: impl Into<String>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Self::new(text)))
    }

    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Appends one line, ignored while read-only.
    pub fn push_line(&mut self, line: &str) {
        if self.read_only {
            return;
        }
        if !self.text.is_empty() && !self.text.ends_with('\n') {
            self.text.push('\n');
        }
        self.text.push_str(line);
        self.text.push('\n');
    }
}

impl Editor for TextEditor {
    fn value(&self) -> String {
        self.text.clone()
    }

    fn set_value(&mut self, value: &str) {
        value.clone_into(&mut self.text);
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }
}

/// Normalizes line endings to `\n`.
#[must_use]
pub fn normalize_line_endings(source: &str) -> String {
    source.replace("\r\n", "\n").replace('\r', "\n")
}

/// Cleans code pasted from web pages before it is executed.
///
/// Line endings become `\n` and non-breaking spaces become plain spaces.
/// With `expand_tabs`, each tab becomes four spaces so mixed indentation
/// copied from slides does not trip the parser.
#[must_use]
pub fn normalize_source(source: &str, expand_tabs: bool) -> String {
    let normalized = normalize_line_endings(source).replace('\u{a0}', " ");
    if expand_tabs {
        normalized.replace('\t', "    ")
    } else {
        normalized
    }
}
