//! Report the structural differences between two models.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "relgen-diff",
    about = "Report structural differences between two models"
)]
struct Args {
    /// Schema file to diff from.
    from: PathBuf,
    /// Schema file to diff into.
    into: PathBuf,
}

/// Returns true when the models are equal.
fn run(args: &Args) -> Result<bool> {
    let from = relgen_cli::load_config(std::slice::from_ref(&args.from))?;
    let into = relgen_cli::load_config(std::slice::from_ref(&args.into))?;
    let q = relgen_core::diff::diff(&from, &into);
    relgen_report::write_diff_report(&from, &into, &q, &mut io::stdout().lock())?;
    Ok(q.iter().all(|d| d.is_same()))
}

fn main() -> ExitCode {
    relgen_cli::init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("relgen-diff: {:#}", e);
            ExitCode::from(2)
        }
    }
}
