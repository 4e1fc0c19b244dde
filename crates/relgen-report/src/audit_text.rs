//! Plain-text audit listing, one line per operation.

use relgen_core::{Audit, AuditQueue, Config, UpdateKind};
use std::io::{self, Write};

/// Write the audit queue as `<op> <target> <pos>` lines. The operation
/// column is left-justified to a fixed width.
pub fn write_audit<W: Write>(cfg: &Config, queue: &AuditQueue, sink: &mut W) -> io::Result<()> {
    for entry in queue {
        match entry {
            Audit::Insert(st) => {
                let ins = st.insert.as_ref().expect("insert entries carry an insert");
                writeln!(sink, "{:<11} {} {}", "insert", st.name, ins.pos)?;
            }
            Audit::Update(up) => {
                writeln!(
                    sink,
                    "{:<11} {}:{} {}",
                    match up.kind {
                        UpdateKind::Delete => "delete",
                        UpdateKind::Modify => "update",
                    },
                    cfg.strct(up.parent).name,
                    up.name.as_deref().unwrap_or("-"),
                    up.pos
                )?;
            }
            Audit::Query(sr) => {
                writeln!(
                    sink,
                    "{:<11} {}:{} {}",
                    sr.kind.name(),
                    cfg.strct(sr.parent).name,
                    sr.name.as_deref().unwrap_or("<anonymous>"),
                    sr.pos
                )?;
            }
            Audit::Reachable(r) => {
                for p in &r.paths {
                    writeln!(
                        sink,
                        "{:<11} {}:{}:{} {}",
                        if p.exported { "readwrite" } else { "read" },
                        r.strct.name,
                        p.search.name.as_deref().unwrap_or("-"),
                        p.path.as_deref().unwrap_or("-"),
                        r.strct.pos
                    )?;
                }
            }
        }
    }
    Ok(())
}
