//! Dump a whole model as JSON.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relgen-json", about = "Dump a parsed model as JSON")]
struct Args {
    /// Schema files; standard input when empty.
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    relgen_cli::init_tracing();
    let args = Args::parse();

    let cfg = relgen_cli::load_config(&args.files)?;
    relgen_report::write_model_json(&cfg, &mut io::stdout().lock())?;
    Ok(())
}
