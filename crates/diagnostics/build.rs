//! Build script for generating diagnostic code data structures at compile time.
//!
//! This script reads `registry/diagnostics.jsonc` and generates Rust files:
//! - `generated_codes.rs`: public constants mapping constant names to diagnostic IDs
//! - `generated_explain.rs`: a match expression mapping IDs to their descriptions
//! - `generated_severity.rs`: a match expression mapping IDs to their default severity

use std::collections::HashSet;
use std::env;
use std::fs;
use std::path::Path;
use viz_toolchain_jsonc_strip::strip_jsonc;

fn main() {
    let registry_path = Path::new("registry/diagnostics.jsonc");
    println!("cargo:rerun-if-changed={}", registry_path.display());

    let raw = fs::read_to_string(registry_path)
        .unwrap_or_else(|e| panic!("failed to read {}: {e}", registry_path.display()));

    let stripped = strip_jsonc(&raw);

    let registry: serde_json::Value =
        serde_json::from_str(&stripped).expect("failed to parse diagnostics.jsonc as JSON");

    let diagnostics = registry["diagnostics"]
        .as_array()
        .expect("diagnostics.jsonc: expected `diagnostics` array");

    let out_dir = env::var("OUT_DIR").unwrap();
    let out_path = Path::new(&out_dir);

    let mut seen_ids: HashSet<String> = HashSet::new();
    let mut seen_names: HashSet<String> = HashSet::new();

    let mut codes =
        String::from("// Auto-generated from registry/diagnostics.jsonc. DO NOT EDIT.\n\n");
    let mut explain = String::from("match id {\n");
    let mut severity = String::from("match id {\n");

    for (i, entry) in diagnostics.iter().enumerate() {
        let id = entry["id"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] missing `id`"));
        let const_name = entry["constName"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `constName`"));
        let summary = entry["summary"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `summary`"));
        let description = entry["description"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `description`"));
        let sev = entry["severity"]
            .as_str()
            .unwrap_or_else(|| panic!("diagnostics[{i}] (id={id}) missing `severity`"));

        assert!(
            id.len() == 7 && id.starts_with("VIZ") && id[3..].bytes().all(|b| b.is_ascii_digit()),
            "diagnostics[{i}]: id '{id}' must look like VIZ0000"
        );
        assert!(
            !const_name.is_empty()
                && const_name
                    .bytes()
                    .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit() || b == b'_')
                && const_name.as_bytes()[0].is_ascii_uppercase(),
            "diagnostics[{i}] (id={id}): constName '{const_name}' is not a valid SCREAMING_SNAKE_CASE identifier"
        );
        assert!(
            seen_ids.insert(id.to_string()),
            "diagnostics[{i}]: duplicate id '{id}'"
        );
        assert!(
            seen_names.insert(const_name.to_string()),
            "diagnostics[{i}] (id={id}): duplicate constName '{const_name}'"
        );

        let sev_rs = match sev {
            "error" => "Severity::Error",
            "warn" => "Severity::Warn",
            "info" => "Severity::Info",
            other => panic!("diagnostics[{i}] (id={id}): invalid severity '{other}'"),
        };

        codes.push_str(&format!("/// {summary}\n"));
        codes.push_str(&format!("pub const {const_name}: &str = \"{id}\";\n\n"));

        let escaped = escape_rust_string_literal(description);
        explain.push_str(&format!("    \"{id}\" => Some(\"{escaped}\"),\n"));

        severity.push_str(&format!("    \"{id}\" => Some({sev_rs}),\n"));
    }

    explain.push_str("    _ => None,\n}\n");
    severity.push_str("    _ => None,\n}\n");

    fs::write(out_path.join("generated_codes.rs"), &codes)
        .expect("failed to write generated_codes.rs");
    fs::write(out_path.join("generated_explain.rs"), &explain)
        .expect("failed to write generated_explain.rs");
    fs::write(out_path.join("generated_severity.rs"), &severity)
        .expect("failed to write generated_severity.rs");
}

fn escape_rust_string_literal(value: &str) -> String {
    value.chars().flat_map(char::escape_default).collect()
}
