//! Diagnostic types and codes, re-exported from `viz_toolchain_diagnostics`.

pub use viz_toolchain_diagnostics::{Diagnostic, Severity, Span, codes};
