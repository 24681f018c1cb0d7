// Copyright (c) 2026 ALAS Technology. MIT License.
// See LICENSE for details.

//! # chain-tool
//!
//! Entry point for the `chain-tool` binary. Parses CLI arguments,
//! initializes logging, runs one consistency check over a data directory,
//! and maps the outcome onto the process exit code.
//!
//! The report goes to stdout (findings to stderr in text mode); logs always
//! go to stderr.

mod cli;
mod logging;

use std::io::Write;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;

use ledger_fsck::storage::{Digest, HeadPointer};
use ledger_fsck::{FatalError, Report, Verifier};

use cli::{ChainToolCli, ReportFormat};

/// Exit code for failures outside the check itself.
const EXIT_INTERNAL: u8 = 1;

fn main() -> ExitCode {
    let cli = ChainToolCli::parse();
    logging::init_logging(logging::DEFAULT_FILTER, cli.log_format);

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("ERROR: {err:#}");
            ExitCode::from(EXIT_INTERNAL)
        }
    }
}

/// Runs the requested action and returns the exit code to use.
fn run(cli: &ChainToolCli) -> Result<u8> {
    let config = cli.check_config();

    if let Some(hex) = &cli.reset_head {
        let head = Digest::from_hex(hex)
            .with_context(|| format!("invalid head digest {hex:?}: expected 64 hex characters"))?;
        let path = config.head_pointer_path();
        HeadPointer::write(&path, &head)
            .with_context(|| format!("failed to reset head pointer at {}", path.display()))?;
        println!("Head pointer {} set to {head}", path.display());
        return Ok(0);
    }

    match Verifier::new(config).run() {
        Ok(report) => {
            render(&report, cli.report_format)?;
            Ok(exit_byte(report.exit_code()))
        }
        Err(fatal) => Ok(report_fatal(&fatal)),
    }
}

fn render(report: &Report, format: ReportFormat) -> Result<()> {
    match format {
        ReportFormat::Text => {
            let stdout = std::io::stdout();
            let stderr = std::io::stderr();
            report
                .render_text(&mut stdout.lock(), &mut stderr.lock())
                .context("failed to write report")?;
        }
        ReportFormat::Json => {
            let json = report.to_json().context("failed to serialize report")?;
            let mut out = std::io::stdout().lock();
            writeln!(out, "{json}").context("failed to write report")?;
        }
    }
    Ok(())
}

/// Prints the one `FATAL:` line for an aborted check.
fn report_fatal(fatal: &FatalError) -> u8 {
    eprintln!("FATAL: [{}] {fatal}", fatal.category());
    exit_byte(fatal.exit_code())
}

fn exit_byte(code: i32) -> u8 {
    u8::try_from(code).unwrap_or(EXIT_INTERNAL)
}
