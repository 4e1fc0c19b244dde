//! Emit the SQL migration between two models.

use anyhow::Result;
use clap::Parser;
use relgen_core::write_msgs;
use relgen_sql::MigrationOutcome;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(
    name = "relgen-sqldiff",
    about = "Emit the SQL migration between two models"
)]
struct Args {
    /// Allow data-losing statements (dropped tables and columns).
    #[arg(short = 'd', long = "destructive")]
    destructive: bool,
    /// Schema file describing the current database.
    from: PathBuf,
    /// Schema file describing the desired database.
    into: PathBuf,
}

fn run(args: &Args) -> Result<MigrationOutcome> {
    let from = relgen_cli::load_config(std::slice::from_ref(&args.from))?;
    let into = relgen_cli::load_config(std::slice::from_ref(&args.into))?;
    let q = relgen_core::diff::diff(&from, &into);

    let mut msgs = Vec::new();
    let outcome = relgen_sql::write_migration(
        &from,
        &into,
        &q,
        args.destructive,
        &mut io::stdout().lock(),
        &mut msgs,
    )?;
    write_msgs(&mut io::stderr().lock(), &msgs)?;
    Ok(outcome)
}

fn main() -> ExitCode {
    relgen_cli::init_tracing();
    let args = Args::parse();

    match run(&args) {
        Ok(MigrationOutcome::Refused) => ExitCode::FAILURE,
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("relgen-sqldiff: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
