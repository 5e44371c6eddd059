//! Configuration types for the directive parser.

use crate::error::ConfigError;

/// Default opening fence for a visualization directive.
pub const DEFAULT_OPEN_FENCE: &str = "[[VIZ]]";
/// Default closing fence for a visualization directive.
pub const DEFAULT_CLOSE_FENCE: &str = "[[/VIZ]]";
/// Default number of repairs the recovery engine may apply per directive.
pub const DEFAULT_MAX_REPAIR_PASSES: usize = 8;

/// The pair of tokens delimiting a directive in model output.
///
/// Fences are part of the prompt contract with the upstream model, so they
/// are validated once on construction and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fences {
    open: String,
    close: String,
}

impl Fences {
    /// Build a fence pair, rejecting tokens the scanner could confuse.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when either token is blank or spans lines,
    /// when both are identical, or when one occurs inside the other.
    pub fn new(open: impl Into<String>, close: impl Into<String>) -> Result<Self, ConfigError> {
        let open = open.into();
        let close = close.into();

        if open.trim().is_empty() {
            return Err(ConfigError::EmptyFence { which: "opening" });
        }
        if close.trim().is_empty() {
            return Err(ConfigError::EmptyFence { which: "closing" });
        }
        for token in [&open, &close] {
            if token.contains(['\n', '\r']) {
                return Err(ConfigError::MultilineFence(token.clone()));
            }
        }
        if open == close {
            return Err(ConfigError::IdenticalFences(open));
        }
        if close.contains(open.as_str()) {
            return Err(ConfigError::OverlappingFences {
                inner: open,
                outer: close,
            });
        }
        if open.contains(close.as_str()) {
            return Err(ConfigError::OverlappingFences {
                inner: close,
                outer: open,
            });
        }

        Ok(Self { open, close })
    }

    /// The opening token.
    pub fn open(&self) -> &str {
        &self.open
    }

    /// The closing token.
    pub fn close(&self) -> &str {
        &self.close
    }
}

impl Default for Fences {
    fn default() -> Self {
        Self {
            open: DEFAULT_OPEN_FENCE.to_owned(),
            close: DEFAULT_CLOSE_FENCE.to_owned(),
        }
    }
}

/// Complete parser configuration: fences + repair budget.
#[non_exhaustive]
#[derive(Debug, Clone)]
pub struct ParserConfig {
    /// Directive delimiters.
    pub fences: Fences,
    /// Maximum number of repairs applied to a single directive before it is
    /// abandoned. `0` disables recovery (strict decoding only).
    pub max_repair_passes: usize,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            fences: Fences::default(),
            max_repair_passes: DEFAULT_MAX_REPAIR_PASSES,
        }
    }
}

impl ParserConfig {
    /// Replace the fence pair.
    #[must_use]
    pub fn with_fences(mut self, fences: Fences) -> Self {
        self.fences = fences;
        self
    }

    /// Replace the repair budget.
    #[must_use]
    pub fn with_max_repair_passes(mut self, passes: usize) -> Self {
        self.max_repair_passes = passes;
        self
    }
}
