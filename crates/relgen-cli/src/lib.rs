//! Shared plumbing for the relgen command-line tools.

use anyhow::{bail, Context, Result};
use relgen_core::{write_msgs, Config, Loader, RoleId};
use std::io::{self, Read};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Install the tracing subscriber; `RUST_LOG` overrides the default
/// `relgen=info` filter.
pub fn init_tracing() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "relgen=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

/// Parse and link the given schema files, or standard input when none
/// are given. Diagnostics go to standard error.
pub fn load_config(files: &[PathBuf]) -> Result<Config> {
    let mut loader = Loader::new();

    let mut failed = None;
    if files.is_empty() {
        let mut src = String::new();
        io::stdin()
            .read_to_string(&mut src)
            .context("reading standard input")?;
        if let Err(e) = loader.parse_str(&src, "<stdin>") {
            failed = Some(anyhow::Error::new(e));
        }
    } else {
        for f in files {
            if let Err(e) = loader.parse_file(f) {
                failed = Some(anyhow::Error::new(e).context(f.display().to_string()));
                break;
            }
        }
    }

    if let Some(e) = failed {
        write_msgs(&mut io::stderr().lock(), &loader.config().msgs)?;
        return Err(e);
    }

    match loader.link() {
        Ok(cfg) => {
            write_msgs(&mut io::stderr().lock(), &cfg.msgs)?;
            Ok(cfg)
        }
        Err(e) => {
            write_msgs(&mut io::stderr().lock(), &e.msgs)?;
            bail!("{}", e.error);
        }
    }
}

/// Resolve a role by name, requiring role support to be enabled.
pub fn find_role(cfg: &Config, name: &str) -> Result<RoleId> {
    if !cfg.roles_enabled() {
        bail!("{}", relgen_core::Error::RolesNotEnabled);
    }
    match cfg.find_role(name) {
        Some(r) => Ok(r.id),
        None => bail!("{}", relgen_core::Error::UnknownRole(name.into())),
    }
}
