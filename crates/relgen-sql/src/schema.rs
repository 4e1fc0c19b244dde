//! Full SQL schema emission.

use crate::types::{action_sql, sql_type};
use relgen_core::{Config, FieldType, Strct};
use std::io::{self, Write};

/// One `-- ` comment line per line of documentation.
fn write_doc<W: Write>(sink: &mut W, tab: bool, doc: &str) -> io::Result<()> {
    for line in doc.lines() {
        writeln!(sink, "{}-- {}", if tab { "\t" } else { "" }, line)?;
    }
    Ok(())
}

/// Emit one `CREATE TABLE` statement: columns, then foreign keys, then
/// unique clauses.
pub(crate) fn write_create_table<W: Write>(
    cfg: &Config,
    strct: &Strct,
    sink: &mut W,
    comments: bool,
) -> io::Result<()> {
    if comments {
        if let Some(doc) = &strct.doc {
            write_doc(sink, false, doc)?;
        }
    }
    write!(sink, "CREATE TABLE {} (", strct.name)?;

    let mut first = true;
    for field in &strct.fields {
        let Some(ty) = sql_type(field.ftype) else {
            continue;
        };
        writeln!(sink, "{}", if first { "" } else { "," })?;
        if comments {
            if let Some(doc) = &field.doc {
                write_doc(sink, true, doc)?;
            }
            if matches!(field.ftype, FieldType::Epoch | FieldType::Date) {
                write_doc(sink, true, "(Stored as a UNIX epoch value.)")?;
            }
        }
        write!(sink, "\t{} {}", field.name, ty)?;
        if field.rowid {
            write!(sink, " PRIMARY KEY")?;
        }
        if field.unique {
            write!(sink, " UNIQUE")?;
        }
        if !field.rowid && !field.nullable {
            write!(sink, " NOT NULL")?;
        }
        first = false;
    }

    for field in &strct.fields {
        if field.ftype == FieldType::Struct {
            continue;
        }
        let Some(r) = field.reference else { continue };
        let source = cfg.field(r.source);
        let target = cfg.field(r.target);
        write!(
            sink,
            "{}\n\tFOREIGN KEY({}) REFERENCES {}({})",
            if first { "" } else { "," },
            source.name,
            cfg.strct(r.target.strct).name,
            target.name
        )?;
        if let Some(act) = action_sql(field.actdel) {
            write!(sink, " ON DELETE {}", act)?;
        }
        if let Some(act) = action_sql(field.actup) {
            write!(sink, " ON UPDATE {}", act)?;
        }
        first = false;
    }

    for unique in &strct.uniques {
        write!(sink, "{}\n\tUNIQUE(", if first { "" } else { "," })?;
        for (i, name) in unique.fields.iter().enumerate() {
            write!(sink, "{}{}", if i == 0 { "" } else { ", " }, name)?;
        }
        write!(sink, ")")?;
        first = false;
    }

    write!(sink, "\n);\n\n")
}

/// Emit the full schema: the foreign-key pragma prologue, then one
/// `CREATE TABLE` per structure in declaration order.
pub fn write_schema<W: Write>(cfg: &Config, sink: &mut W) -> io::Result<()> {
    write!(sink, "PRAGMA foreign_keys=ON;\n\n")?;
    for strct in &cfg.strcts {
        write_create_table(cfg, strct, sink, true)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relgen_core::load_str;

    fn schema(src: &str) -> String {
        let cfg = load_str(src, "t.rgn").unwrap();
        let mut out = Vec::new();
        write_schema(&cfg, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_schema_single_table() {
        let out = schema(
            "struct user {\
               field id int rowid;\
               field email email unique;\
               field bio text null;\
             };",
        );
        assert_eq!(
            out,
            "PRAGMA foreign_keys=ON;\n\n\
             CREATE TABLE user (\n\
             \tid INTEGER PRIMARY KEY,\n\
             \temail TEXT UNIQUE NOT NULL,\n\
             \tbio TEXT\n\
             );\n\n"
        );
    }

    #[test]
    fn test_schema_foreign_keys_and_uniques() {
        let out = schema(
            "struct company { field id int rowid; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int actdel cascade actup restrict;\
               field company struct companyid;\
               field a int;\
               field b int;\
               unique a, b;\
             };",
        );
        assert!(out.contains(
            "\tFOREIGN KEY(companyid) REFERENCES company(id) ON DELETE CASCADE ON UPDATE RESTRICT"
        ));
        assert!(out.contains("\tUNIQUE(a, b)"));
        // Struct-typed fields produce no column.
        assert!(!out.contains("company INTEGER"));
    }

    #[test]
    fn test_schema_comments_and_epoch_note() {
        let out = schema(
            "struct log {\
               comment \"Audit log.\";\
               field id int rowid;\
               field at epoch comment \"Creation time.\";\
             };",
        );
        assert!(out.contains("-- Audit log.\nCREATE TABLE log ("));
        assert!(out.contains("\t-- Creation time.\n"));
        assert!(out.contains("\t-- (Stored as a UNIX epoch value.)\n\tat INTEGER NOT NULL"));
    }

    #[test]
    fn test_schema_one_table_per_struct_in_order() {
        let out = schema(
            "struct b { field id int rowid; };\
             struct a { field id int rowid; };",
        );
        let b_at = out.find("CREATE TABLE b").unwrap();
        let a_at = out.find("CREATE TABLE a").unwrap();
        assert!(b_at < a_at);
        assert_eq!(out.matches("CREATE TABLE").count(), 2);
    }
}
