//! Classification of process output lines.

use serde::{Deserialize, Serialize};

/// Substrings marking a line as an error report. Matched case-sensitively.
pub const DEFAULT_ERROR_PATTERNS: &[&str] = &["Failed to", "Error", "Exception"];

/// Substrings announcing a server is up, used when a service declares none.
pub const DEFAULT_READY_PATTERNS: &[&str] = &["Server starting", "listening on"];

/// Category of one line of process output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    ReadySignal,
    ErrorSignal,
    Informational,
}

impl LogCategory {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ReadySignal => "ready",
            Self::ErrorSignal => "error",
            Self::Informational => "info",
        }
    }
}

/// Maps lines to [`LogCategory`] by substring matching.
///
/// The error check runs before the ready check, so a failure mentioning
/// startup text is still an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogClassifier {
    error_patterns: Vec<String>,
    ready_patterns: Vec<String>,
    highlight_patterns: Vec<String>,
}

impl Default for LogClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_READY_PATTERNS.iter().copied())
    }
}

impl LogClassifier {
    /// Classifier with the default error patterns and the given ready phrases.
    pub fn new<I, S>(ready_patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            error_patterns: DEFAULT_ERROR_PATTERNS.iter().map(|p| (*p).to_string()).collect(),
            ready_patterns: ready_patterns.into_iter().map(Into::into).collect(),
            highlight_patterns: Vec::new(),
        }
    }

    /// Ready phrases from a service's log profile, falling back to the defaults.
    pub fn for_phrases(ready: &[String], highlights: &[String]) -> Self {
        let classifier = if ready.is_empty() {
            Self::default()
        } else {
            Self::new(ready.iter().cloned())
        };
        classifier.with_highlights(highlights.iter().cloned())
    }

    #[must_use]
    pub fn with_highlights<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.highlight_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    pub fn classify(&self, line: &str) -> LogCategory {
        if contains_any(line, &self.error_patterns) {
            LogCategory::ErrorSignal
        } else if contains_any(line, &self.ready_patterns) {
            LogCategory::ReadySignal
        } else {
            LogCategory::Informational
        }
    }

    /// Whether an informational line is worth surfacing prominently.
    pub fn is_highlighted(&self, line: &str) -> bool {
        contains_any(line, &self.highlight_patterns)
    }
}

fn contains_any(line: &str, patterns: &[String]) -> bool {
    patterns.iter().any(|p| line.contains(p.as_str()))
}
