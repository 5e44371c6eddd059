mod render;

use std::fs;
use std::io::{self, Read};
use std::process;

use anyhow::{Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};
use viz_toolchain_core::config::{
    DEFAULT_CLOSE_FENCE, DEFAULT_MAX_REPAIR_PASSES, DEFAULT_OPEN_FENCE,
};
use viz_toolchain_core::{Fences, ParseResult, ParserConfig, Segment, parse_with_config, segments};
use viz_toolchain_diagnostics::{self as diag, Diagnostic, Severity};

use crate::render::{Format, placeholder, print_summary, render_diagnostics};

// ── CLI definition ──────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "viz",
    version,
    about = "Viz toolchain: find, repair, and inspect visualization directives in model output"
)]
struct Cli {
    /// Output mode: "pretty" for coloured terminal output, "json" for
    /// machine-readable JSON. Defaults to "pretty" when stdout is a TTY,
    /// "json" otherwise.
    #[arg(long, global = true, value_parser = ["pretty", "json"])]
    output: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace). `VIZ_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Parse a transcript and print the accepted directives.
    Parse {
        /// Input file, or `-` for stdin.
        file: String,
        #[command(flatten)]
        parser: ParserArgs,
    },

    /// Print the transcript with each directive replaced by a placeholder.
    Render {
        /// Input file, or `-` for stdin.
        file: String,
        #[command(flatten)]
        parser: ParserArgs,
    },

    /// Report directive counts; exit 1 if any directive was abandoned.
    Check {
        /// Input file, or `-` for stdin.
        file: String,
        #[command(flatten)]
        parser: ParserArgs,
    },

    /// Explain a diagnostic ID (e.g. VIZ1101).
    Explain { id: String },
}

/// Parser configuration shared by the file commands.
#[derive(Args, Debug)]
struct ParserArgs {
    /// Token that opens a directive.
    #[arg(long, default_value = DEFAULT_OPEN_FENCE)]
    open_fence: String,
    /// Token that closes a directive.
    #[arg(long, default_value = DEFAULT_CLOSE_FENCE)]
    close_fence: String,
    /// Maximum repairs per directive; 0 disables recovery.
    #[arg(long, default_value_t = DEFAULT_MAX_REPAIR_PASSES)]
    max_repairs: usize,
}

impl ParserArgs {
    fn config(&self) -> Result<ParserConfig> {
        let fences = Fences::new(self.open_fence.as_str(), self.close_fence.as_str())
            .context("invalid fence configuration")?;
        Ok(ParserConfig::default()
            .with_fences(fences)
            .with_max_repair_passes(self.max_repairs))
    }
}

// ── Main ────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    let format = Format::resolve_or_detect(cli.output.as_deref());

    match cli.cmd {
        Cmd::Parse { file, parser } => cmd_parse(&file, &parser.config()?, format)?,
        Cmd::Render { file, parser } => cmd_render(&file, &parser.config()?, format)?,
        Cmd::Check { file, parser } => cmd_check(&file, &parser.config()?, format)?,
        Cmd::Explain { id } => cmd_explain(&id, format)?,
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("VIZ_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr)
        .with_filter(filter);
    tracing_subscriber::registry().with(stderr_layer).init();
}

// ── Commands ────────────────────────────────────────────────────────────

fn cmd_parse(file: &str, config: &ParserConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_with_config(&input, config);
    tracing::debug!(
        directives = res.directives.len(),
        diagnostics = res.diagnostics.len(),
        "parsed input"
    );

    match format {
        Format::Json => {
            // Single valid JSON object to stdout.
            println!("{}", serde_json::to_string_pretty(&res)?);
        }
        Format::Pretty => {
            // Directives to stdout, diagnostics to stderr.
            let out = serde_json::json!({
                "directives": res.directives,
                "pending": res.pending,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
            render_diagnostics(&input, display_name(file), &res.diagnostics);
            print_summary(&res.diagnostics);
        }
    }

    exit_on_errors(&res.diagnostics);
    Ok(())
}

fn cmd_render(file: &str, config: &ParserConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_with_config(&input, config);

    // A file is complete input, so a pending tail is shown as written.
    let mut text = String::with_capacity(input.len());
    for segment in segments(&input, &res) {
        match segment {
            Segment::Text(t) | Segment::Pending(t) => text.push_str(t),
            Segment::Viz(viz) => text.push_str(&placeholder(viz)),
        }
    }

    match format {
        Format::Json => {
            let out = serde_json::json!({
                "text": text,
                "directives": res.directives.len(),
                "diagnostics": res.diagnostics,
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            print!("{text}");
            if !text.ends_with('\n') {
                println!();
            }
            render_diagnostics(&input, display_name(file), &res.diagnostics);
            print_summary(&res.diagnostics);
        }
    }
    Ok(())
}

/// Counts reported by `viz check`.
#[derive(Debug, serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct CheckReport<'a> {
    ok: bool,
    directives: usize,
    auto_fixed: usize,
    abandoned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pending: Option<usize>,
    diagnostics: &'a [Diagnostic],
}

impl<'a> CheckReport<'a> {
    fn new(res: &'a ParseResult) -> Self {
        let abandoned = res.diagnostics.iter().filter(|d| d.is_error()).count();
        Self {
            ok: abandoned == 0,
            directives: res.directives.len(),
            auto_fixed: res.auto_fixed_count(),
            abandoned,
            pending: res.pending,
            diagnostics: &res.diagnostics,
        }
    }
}

fn cmd_check(file: &str, config: &ParserConfig, format: Format) -> Result<()> {
    let input = read_input(file)?;
    let res = parse_with_config(&input, config);
    let report = CheckReport::new(&res);

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        Format::Pretty => {
            render_diagnostics(&input, display_name(file), &res.diagnostics);
            print_summary(&res.diagnostics);
            let status = if report.ok { "check ok" } else { "check failed" };
            eprintln!(
                "{status}: {} directives ({} auto-fixed, {} abandoned)",
                report.directives, report.auto_fixed, report.abandoned
            );
        }
    }

    exit_on_errors(&res.diagnostics);
    Ok(())
}

fn cmd_explain(id: &str, format: Format) -> Result<()> {
    match format {
        Format::Json => {
            let out = serde_json::json!({
                "id": id,
                "explanation": diag::explain(id),
            });
            println!("{}", serde_json::to_string_pretty(&out)?);
        }
        Format::Pretty => {
            // Explanation is the expected output, so write to stdout, not stderr.
            if let Some(text) = diag::explain(id) {
                use ariadne::Fmt;
                println!("{}: {}", id.fg(ariadne::Color::Cyan), text);
            } else {
                println!("{id}: (no explanation available)");
            }
        }
    }
    Ok(())
}

// ── Helpers ─────────────────────────────────────────────────────────────

/// Read the input file, or stdin when `file` is `-`.
fn read_input(file: &str) -> Result<String> {
    if file == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("failed to read stdin")?;
        Ok(buf)
    } else {
        fs::read_to_string(file).with_context(|| format!("failed to read {file}"))
    }
}

fn display_name(file: &str) -> &str {
    if file == "-" { "<stdin>" } else { file }
}

/// Exit with code 1 if any diagnostic is an error.
/// Warnings and info do not cause a non-zero exit.
fn exit_on_errors(diagnostics: &[Diagnostic]) {
    if diagnostics
        .iter()
        .any(|d| matches!(d.severity, Severity::Error))
    {
        process::exit(1);
    }
}
