//! Normalized JSON dump of a whole model.

use relgen_core::Config;
use std::io::{self, Write};

/// Serialize the configuration as pretty-printed JSON: entities in
/// declaration order, positions as `{file, line, column}` objects.
pub fn write_model_json<W: Write>(cfg: &Config, sink: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *sink, cfg).map_err(io::Error::other)?;
    writeln!(sink)
}
