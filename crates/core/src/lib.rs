//! Viz toolchain core library.
//!
//! Finds visualization directives embedded in language-model output, decodes
//! them into typed commands, repairs common malformations, and reports the
//! byte span each directive occupied. The main entry points are
//! [`parse_str`] / [`parse_with_config`] for parsing and [`render_with`] for
//! splicing rendered widgets back into the surrounding text.
//!
//! Parsing is stateless: callers re-parse the whole buffer as a stream grows
//! and hold back text from [`ParseResult::pending`] onwards.

#![warn(missing_docs)]

/// Parser configuration: fences and repair budget.
pub mod config;
/// Typed errors for invalid configuration.
pub mod error;
/// Directive grammar: scanner, decoder, recovery engine, and splicing.
pub mod grammar;

// ── Convenience re-exports ──────────────────────────────────────────────────
// Flat imports for the most common entry points. The full module paths
// remain available for less common types.

// Parser
pub use grammar::parser::{ParseResult, parse_str, parse_with_config};

// Commands
pub use grammar::command::{
    ChartCommand, ChartData, ChartKind, Dataset, ParsedViz, PieCommand, PieOptions, PieSlice,
    Scalar, TableCommand, TableOptions, TableRow, VizCommand, VizType,
};

// Decoding
pub use grammar::decode::{DecodeError, decode_payload};

// Splicing
pub use grammar::splice::{Segment, render_with, segments, strip_directives};

// Configuration
pub use config::{Fences, ParserConfig};
pub use error::ConfigError;

// Diagnostics (re-exported from the diagnostics crate)
pub use grammar::diag::{Diagnostic, Severity, Span, codes};
