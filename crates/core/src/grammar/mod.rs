/// Typed visualization commands and the accepted-directive record.
pub mod command;
/// Strict payload decoding into [`command::VizCommand`].
pub mod decode;
/// Re-exports from the diagnostics crate.
pub mod diag;
/// Directive parser: scan, decode, recover, track spans.
pub mod parser;
/// Ordered, bounded repairs for malformed payloads.
pub mod repair;
/// Fence scanner that locates directive candidates.
pub mod scanner;
/// Rebuilding display text around accepted directives.
pub mod splice;
