//! Diagnostic ID constants (`VIZ1xxx` decoding, `VIZ2xxx` scanning,
//! `VIZ3xxx` recovery).
//!
//! Generated from `registry/diagnostics.jsonc` by the build script; refer to
//! codes through these constants rather than string literals.

include!(concat!(env!("OUT_DIR"), "/generated_codes.rs"));
