//! JSON audit of what a role can do.

use anyhow::Result;
use clap::Parser;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "relgen-audit-json",
    about = "Audit role access over a schema, as JSON"
)]
struct Args {
    /// Role to audit.
    #[arg(short = 'r', long = "role", default_value = "default")]
    role: String,
    /// Wrap the report in a standalone script.
    #[arg(short = 's', long = "standalone")]
    standalone: bool,
    /// Schema files; standard input when empty.
    files: Vec<PathBuf>,
}

fn main() -> Result<()> {
    relgen_cli::init_tracing();
    let args = Args::parse();

    let cfg = relgen_cli::load_config(&args.files)?;
    let role = relgen_cli::find_role(&cfg, &args.role)?;
    let queue = relgen_core::audit::audit(&cfg, role);
    relgen_report::write_audit_json(
        &cfg,
        &queue,
        role,
        args.standalone,
        &mut io::stdout().lock(),
    )?;
    Ok(())
}
