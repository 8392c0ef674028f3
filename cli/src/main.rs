//! attesta — standalone claim bundle verifier.
//!
//! Verifies exported claim bundles offline. No server connection is
//! required; verification is cryptographic.
//!
//! Usage:
//!   attesta verify bundle.json
//!   attesta verify bundle.json --verbose
//!   attesta verify bundle.json --json
//!
//! Exit codes (contractual):
//!   0 — VERIFIED: all checks passed
//!   1 — TAMPERED: hash or signature mismatch
//!   2 — INCOMPLETE: missing required data
//!   3 — INVALID_FORMAT: unreadable or structurally wrong bundle

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use attesta_bundle::{verify_bundle_file, BundleReport, Verdict};

// ── CLI definition ────────────────────────────────────────────────────────────

/// attesta — tamper-evident claim accountability ledger tools.
#[derive(Parser)]
#[command(
    name = "attesta",
    about = "Verify attesta claim bundles offline",
    long_about = "Standalone verification of exported claim bundles.\n\n\
                  Checks, in order: structural completeness, hash recomputation\n\
                  over the canonical payload bytes, chain linkage, Ed25519 editor\n\
                  signatures, and Merkle inclusion-proof replay."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Verify a claim bundle file.
    Verify {
        /// Path to the bundle JSON file.
        bundle: PathBuf,

        /// Print every individual check as it is evaluated.
        #[arg(long)]
        verbose: bool,

        /// Emit a machine-readable JSON report instead of text.
        #[arg(long)]
        json: bool,
    },
}

// ── Entry point ───────────────────────────────────────────────────────────────

fn main() {
    init_logging();

    let cli = Cli::parse();
    let exit_code = match cli.command {
        Command::Verify { bundle, verbose, json } => run_verify(&bundle, verbose, json),
    };
    std::process::exit(exit_code);
}

fn run_verify(bundle: &PathBuf, verbose: bool, json: bool) -> i32 {
    let report = verify_bundle_file(bundle);

    if json {
        // to_string_pretty on a Value cannot fail.
        println!(
            "{}",
            serde_json::to_string_pretty(&report.to_json()).unwrap_or_default()
        );
    } else {
        print_report(&report, verbose);
    }

    report.verdict.exit_code()
}

fn print_report(report: &BundleReport, verbose: bool) {
    if verbose {
        for check in &report.checks_passed {
            println!("  ok   {check}");
        }
    }
    for check in &report.checks_failed {
        println!("  FAIL {check}");
    }
    for warning in &report.warnings {
        println!("  warn {warning}");
    }

    println!();
    match report.verdict {
        Verdict::Verified => println!(
            "VERIFIED — {} checks passed{}",
            report.checks_passed.len(),
            if report.warnings.is_empty() {
                String::new()
            } else {
                format!(", {} warning(s)", report.warnings.len())
            }
        ),
        verdict => println!(
            "{verdict} — {} check(s) failed, {} passed",
            report.checks_failed.len(),
            report.checks_passed.len()
        ),
    }
}

// ── Logging ───────────────────────────────────────────────────────────────────

/// Structured logging per LOG_LEVEL / LOG_FORMAT (`json` | `text`), with
/// RUST_LOG taking precedence when set.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(std::env::var("LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()))
    });

    let json_format = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json_format {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
