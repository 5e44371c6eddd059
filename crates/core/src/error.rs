//! Typed errors for caller contract violations.
//!
//! Malformed model output is never an error here; it is reported through
//! diagnostics on the parse result. Only a misconfigured parser is.

/// Invalid parser configuration.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A fence token is empty or consists only of whitespace.
    #[error("{which} fence must not be empty")]
    EmptyFence {
        /// `"opening"` or `"closing"`.
        which: &'static str,
    },

    /// The opening and closing fences are the same token.
    #[error("opening and closing fences are identical: {0:?}")]
    IdenticalFences(String),

    /// One fence occurs inside the other, so the scanner could not tell them apart.
    #[error("fence {inner:?} occurs inside fence {outer:?}")]
    OverlappingFences {
        /// The shorter token.
        inner: String,
        /// The token that contains it.
        outer: String,
    },

    /// A fence token contains a line break.
    #[error("fence {0:?} must not contain line breaks")]
    MultilineFence(String),
}
