//! Emit the full SQL schema of a model.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "relgen-sql", about = "Emit the SQL schema of a model")]
struct Args {
    /// Schema files; standard input when empty.
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    relgen_cli::init_tracing();
    let args = Args::parse();

    let cfg = relgen_cli::load_config(&args.files)?;
    relgen_sql::write_schema(&cfg, &mut io::stdout().lock())?;
    Ok(())
}
