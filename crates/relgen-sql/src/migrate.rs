//! SQL migration from a diff queue.
//!
//! The validation phase classifies every diff entry as safe,
//! destructive, or irreconcilable and refuses to emit anything when an
//! entry is not allowed; diagnostics go to the caller's message queue,
//! never into the SQL output. The emission phase writes new tables,
//! then new columns, then (destructively) dropped tables and
//! commented-out column drops.

use crate::schema::write_create_table;
use crate::types::{action_sql, default_literal, sql_type};
use relgen_core::{Config, Diff, DiffQueue, Field, FieldType, Msg, MsgKind, MsgQueue, Pos};
use std::io::{self, Write};
use tracing::debug;

/// What the migrator did.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// Nothing to migrate; no output written.
    Unchanged,
    /// Statements were written.
    Migrated,
    /// Irreconcilable changes; diagnostics queued, no output written.
    Refused,
}

fn warn(msgs: &mut MsgQueue, pos: &Pos, text: &str) {
    msgs.push(Msg::new(Some(pos.clone()), MsgKind::Warn, text));
}

/// An error spanning both models: the `into` position is folded into
/// the text, the message itself points at the `from` side.
fn err_pair(msgs: &mut MsgQueue, from: &Pos, into: &Pos, text: &str) {
    msgs.push(Msg::new(
        Some(from.clone()),
        MsgKind::Error,
        format!("{}: {}", into, text),
    ));
}

fn check(q: &DiffQueue, destructive: bool, msgs: &mut MsgQueue) -> usize {
    let mut errors = 0;

    for d in q {
        match d {
            Diff::DelField(f) => {
                if destructive || f.ftype == FieldType::Struct {
                    continue;
                }
                warn(msgs, &f.pos, "field column was dropped");
                errors += 1;
            }
            Diff::ModFieldType(p) | Diff::ModFieldBitf(p) | Diff::ModFieldEnm(p) => {
                err_pair(msgs, &p.from.pos, &p.into.pos, "field type has changed");
                errors += 1;
            }
            Diff::ModFieldFlags(p) => {
                // Only the column-shaping flags matter here.
                if p.from.sql_flags() == p.into.sql_flags() {
                    continue;
                }
                err_pair(msgs, &p.from.pos, &p.into.pos, "field flag has changed");
                errors += 1;
            }
            Diff::ModFieldActions(p) => {
                err_pair(msgs, &p.from.pos, &p.into.pos, "field action has changed");
                errors += 1;
            }
            Diff::ModFieldReference(p) => {
                if p.from.ftype == FieldType::Struct || p.into.ftype == FieldType::Struct {
                    continue;
                }
                err_pair(msgs, &p.from.pos, &p.into.pos, "field reference has changed");
                errors += 1;
            }
            Diff::DelBitf(b) => {
                if destructive {
                    continue;
                }
                warn(msgs, &b.pos, "deleted bitfield");
                errors += 1;
            }
            Diff::DelBitidx(b) => {
                if destructive {
                    continue;
                }
                warn(msgs, &b.pos, "deleted bitfield item");
                errors += 1;
            }
            Diff::ModBitidxValue(p) => {
                err_pair(
                    msgs,
                    &p.from.pos,
                    &p.into.pos,
                    "bitfield item has changed value",
                );
                errors += 1;
            }
            Diff::DelEnm(e) => {
                if destructive {
                    continue;
                }
                warn(msgs, &e.pos, "deleted enumeration");
                errors += 1;
            }
            Diff::DelEitem(e) => {
                if destructive {
                    continue;
                }
                warn(msgs, &e.pos, "deleted enumeration item");
                errors += 1;
            }
            Diff::ModEitemValue(p) => {
                err_pair(msgs, &p.from.pos, &p.into.pos, "item has changed value");
                errors += 1;
            }
            Diff::DelStrct(s) => {
                if destructive {
                    continue;
                }
                warn(msgs, &s.pos, "deleted table");
                errors += 1;
            }
            Diff::AddUnique(u) => {
                warn(msgs, &u.pos, "new unique field");
                errors += 1;
            }
            _ => {}
        }
    }

    errors
}

/// The `ALTER TABLE ... ADD COLUMN` form of a new field.
fn write_add_column<W: Write>(cfg: &Config, field: &Field, sink: &mut W) -> io::Result<()> {
    let ty = sql_type(field.ftype).expect("struct fields are not columns");
    write!(
        sink,
        "ALTER TABLE {} ADD COLUMN {} {}",
        cfg.strct(field.parent).name,
        field.name,
        ty
    )?;
    if field.rowid {
        write!(sink, " PRIMARY KEY")?;
    }
    if field.unique {
        write!(sink, " UNIQUE")?;
    }
    if !field.rowid && !field.nullable {
        write!(sink, " NOT NULL")?;
    }
    if let Some(r) = field.reference {
        write!(
            sink,
            " REFERENCES {}({})",
            cfg.strct(r.target.strct).name,
            cfg.field(r.target).name
        )?;
    }
    if let Some(act) = action_sql(field.actup) {
        write!(sink, " ON UPDATE {}", act)?;
    }
    if let Some(act) = action_sql(field.actdel) {
        write!(sink, " ON DELETE {}", act)?;
    }
    if let Some(lit) = default_literal(cfg, field) {
        write!(sink, " DEFAULT {}", lit)?;
    }
    writeln!(sink, ";")
}

fn prologue<W: Write>(sink: &mut W, emitted: &mut bool) -> io::Result<()> {
    if !*emitted {
        *emitted = true;
        write!(sink, "PRAGMA foreign_keys=ON;\n\n")?;
    }
    Ok(())
}

/// Validate the diff queue and, when clean, emit the migration.
///
/// `from` and `into` are the models the queue was built from;
/// diagnostics for refused migrations go to `msgs`.
pub fn write_migration<W: Write>(
    from: &Config,
    into: &Config,
    q: &DiffQueue,
    destructive: bool,
    sink: &mut W,
    msgs: &mut MsgQueue,
) -> io::Result<MigrationOutcome> {
    let errors = check(q, destructive, msgs);
    if errors > 0 {
        debug!(errors, "migration refused");
        return Ok(MigrationOutcome::Refused);
    }

    let mut emitted = false;

    for d in q {
        if let Diff::AddStrct(s) = d {
            prologue(sink, &mut emitted)?;
            write_create_table(into, s, sink, false)?;
        }
    }

    for d in q {
        if let Diff::AddField(f) = d {
            if f.ftype == FieldType::Struct {
                continue;
            }
            prologue(sink, &mut emitted)?;
            write_add_column(into, f, sink)?;
        }
    }

    if destructive {
        for d in q {
            if let Diff::DelStrct(s) = d {
                prologue(sink, &mut emitted)?;
                writeln!(sink, "DROP TABLE {};", s.name)?;
            }
        }
        for d in q {
            if let Diff::DelField(f) = d {
                if f.ftype == FieldType::Struct {
                    continue;
                }
                prologue(sink, &mut emitted)?;
                writeln!(
                    sink,
                    "-- ALTER TABLE {} DROP COLUMN {};",
                    from.strct(f.parent).name,
                    f.name
                )?;
            }
        }
    }

    Ok(if emitted {
        MigrationOutcome::Migrated
    } else {
        MigrationOutcome::Unchanged
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relgen_core::diff::diff;
    use relgen_core::load_str;

    fn migrate(from: &str, into: &str, destructive: bool) -> (String, MigrationOutcome, MsgQueue) {
        let from = load_str(from, "old.rgn").unwrap();
        let into = load_str(into, "new.rgn").unwrap();
        let q = diff(&from, &into);
        let mut out = Vec::new();
        let mut msgs = Vec::new();
        let outcome =
            write_migration(&from, &into, &q, destructive, &mut out, &mut msgs).unwrap();
        (String::from_utf8(out).unwrap(), outcome, msgs)
    }

    #[test]
    fn test_migrate_unchanged() {
        let src = "struct a { field id int rowid; };";
        let (out, outcome, msgs) = migrate(src, src, false);
        assert_eq!(out, "");
        assert_eq!(outcome, MigrationOutcome::Unchanged);
        assert!(msgs.is_empty());
    }

    #[test]
    fn test_migrate_add_column() {
        let (out, outcome, _) = migrate(
            "struct a { field id int rowid; };",
            "struct a { field id int rowid; field n int default 3; };",
            false,
        );
        assert_eq!(outcome, MigrationOutcome::Migrated);
        assert_eq!(
            out,
            "PRAGMA foreign_keys=ON;\n\n\
             ALTER TABLE a ADD COLUMN n INTEGER NOT NULL DEFAULT 3;\n"
        );
    }

    #[test]
    fn test_migrate_add_column_with_reference() {
        let (out, _, _) = migrate(
            "struct b { field id int rowid; };\
             struct a { field id int rowid; };",
            "struct b { field id int rowid; };\
             struct a { field id int rowid; field bid:b.id int null actdel cascade; };",
            false,
        );
        assert!(out.contains(
            "ALTER TABLE a ADD COLUMN bid INTEGER REFERENCES b(id) ON DELETE CASCADE;"
        ));
    }

    #[test]
    fn test_migrate_refuses_dropped_column() {
        let (out, outcome, msgs) = migrate(
            "struct a { field id int rowid; field name text; };",
            "struct a { field id int rowid; };",
            false,
        );
        assert_eq!(outcome, MigrationOutcome::Refused);
        assert_eq!(out, "");
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].text.contains("field column was dropped"));
    }

    #[test]
    fn test_migrate_destructive_drop_column() {
        let (out, outcome, msgs) = migrate(
            "struct a { field id int rowid; field name text; };",
            "struct a { field id int rowid; };",
            true,
        );
        assert_eq!(outcome, MigrationOutcome::Migrated);
        assert!(msgs.is_empty());
        assert!(out.contains("-- ALTER TABLE a DROP COLUMN name;\n"));
    }

    #[test]
    fn test_migrate_destructive_drop_table() {
        let (out, outcome, _) = migrate(
            "struct a { field id int rowid; };\
             struct b { field id int rowid; };",
            "struct a { field id int rowid; };",
            true,
        );
        assert_eq!(outcome, MigrationOutcome::Migrated);
        assert!(out.contains("DROP TABLE b;\n"));
    }

    #[test]
    fn test_migrate_never_allows_type_change() {
        for destructive in [false, true] {
            let (out, outcome, msgs) = migrate(
                "struct a { field id int rowid; field x int; };",
                "struct a { field id int rowid; field x text; };",
                destructive,
            );
            assert_eq!(outcome, MigrationOutcome::Refused);
            assert_eq!(out, "");
            assert!(msgs.iter().any(|m| m.text.contains("field type has changed")));
        }
    }

    #[test]
    fn test_migrate_never_allows_new_unique() {
        let (_, outcome, msgs) = migrate(
            "struct a { field id int rowid; field x int; field y int; };",
            "struct a { field id int rowid; field x int; field y int; unique x, y; };",
            true,
        );
        assert_eq!(outcome, MigrationOutcome::Refused);
        assert!(msgs.iter().any(|m| m.text.contains("new unique field")));
    }

    #[test]
    fn test_migrate_never_allows_value_change() {
        let (_, outcome, msgs) = migrate(
            "enum e { item a 0; }; struct s { field id int rowid; };",
            "enum e { item a 1; }; struct s { field id int rowid; };",
            true,
        );
        assert_eq!(outcome, MigrationOutcome::Refused);
        assert!(msgs.iter().any(|m| m.text.contains("item has changed value")));
    }

    #[test]
    fn test_migrate_dual_position_diagnostic() {
        let (_, _, msgs) = migrate(
            "struct a { field id int rowid; field x int; };",
            "struct a { field id int rowid; field x int unique; };",
            false,
        );
        let m = &msgs[0];
        assert_eq!(m.pos.as_ref().unwrap().file, "old.rgn");
        assert!(m.text.contains("new.rgn:"));
        assert!(m.text.contains("field flag has changed"));
    }

    #[test]
    fn test_migrate_default_change_emits_nothing() {
        let (out, outcome, msgs) = migrate(
            "struct a { field id int rowid; field x int default 1; };",
            "struct a { field id int rowid; field x int default 2; };",
            false,
        );
        assert_eq!(outcome, MigrationOutcome::Unchanged);
        assert_eq!(out, "");
        assert!(msgs.is_empty());
    }
}
