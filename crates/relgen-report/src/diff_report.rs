//! Plain-text diff report.
//!
//! Unified-diff-flavored listing of a diff queue: `---`/`+++` header
//! lines naming the input files, then one section per entity kind that
//! changed. Added and deleted entities print as `+`/`-` lines, matched
//! pairs as position pairs, and fine-grained modifications as `!`
//! lines naming the changed attribute.

use relgen_core::{Config, Diff, DiffQueue, Pair, Pos, Strct};
use std::io::{self, Write};

fn one<W: Write>(sink: &mut W, add: bool, kind: &str, pos: &Pos) -> io::Result<()> {
    writeln!(sink, "{} {} {}", if add { "+" } else { "-" }, kind, pos)
}

fn pair_line<W: Write>(
    sink: &mut W,
    changed: bool,
    kind: &str,
    from: &Pos,
    into: &Pos,
) -> io::Result<()> {
    if changed {
        writeln!(sink, "@@ {} {} -> {} @@", kind, from, into)
    } else {
        writeln!(sink, "  {} {} -> {}", kind, from, into)
    }
}

fn attr_line<W: Write>(
    sink: &mut W,
    attr: &str,
    kind: &str,
    from: &Pos,
    into: &Pos,
) -> io::Result<()> {
    writeln!(sink, "! {} {} {} -> {}", attr, kind, from, into)
}

fn insert_pos(strct: &Strct) -> &Pos {
    &strct.insert.as_ref().expect("insert diffed on this structure").pos
}

// ============================================================================
// Roles
// ============================================================================

fn write_role_mods<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, relgen_core::Role>) -> io::Result<()> {
    for d in q {
        let (attr, p) = match d {
            Diff::ModRoleChildren(p) => ("children", p),
            Diff::ModRoleComment(p) => ("comment", p),
            Diff::ModRoleParent(p) => ("parent", p),
            _ => continue,
        };
        if std::ptr::eq(p.into, pair.into) {
            attr_line(sink, attr, "role", &p.from.pos, &p.into.pos)?;
        }
    }
    Ok(())
}

fn write_roles_section<W: Write>(sink: &mut W, q: &DiffQueue) -> io::Result<()> {
    writeln!(sink, "@@ roles @@")?;
    for d in q {
        match d {
            Diff::AddRoles(r) => one(sink, true, "roles", &r.pos)?,
            Diff::DelRoles(r) => one(sink, false, "roles", &r.pos)?,
            Diff::SameRoles(p) => pair_line(sink, false, "roles", &p.from.pos, &p.into.pos)?,
            Diff::ModRoles(p) => {
                pair_line(sink, true, "roles", &p.from.pos, &p.into.pos)?;
                for dd in q {
                    match dd {
                        Diff::AddRole(r) => one(sink, true, "role", &r.pos)?,
                        Diff::DelRole(r) => one(sink, false, "role", &r.pos)?,
                        Diff::SameRole(p) => {
                            pair_line(sink, false, "role", &p.from.pos, &p.into.pos)?
                        }
                        Diff::ModRole(p) => {
                            pair_line(sink, true, "role", &p.from.pos, &p.into.pos)?;
                            write_role_mods(sink, q, p)?;
                        }
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Enumerations
// ============================================================================

fn write_enm_body<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, relgen_core::Enum>) -> io::Result<()> {
    for d in q {
        match d {
            Diff::ModEnmComment(p) if std::ptr::eq(p.into, pair.into) => {
                attr_line(sink, "comment", "enm", &p.from.pos, &p.into.pos)?;
            }
            Diff::ModEnmLabels(p) if std::ptr::eq(p.into, pair.into) => {
                attr_line(sink, "labels", "enm", &p.from.pos, &p.into.pos)?;
            }
            Diff::AddEitem(i) if i.parent == pair.into.id => {
                one(sink, true, "eitem", &i.pos)?;
            }
            Diff::DelEitem(i) if i.parent == pair.from.id => {
                one(sink, false, "eitem", &i.pos)?;
            }
            Diff::SameEitem(p) if p.into.parent == pair.into.id => {
                pair_line(sink, false, "eitem", &p.from.pos, &p.into.pos)?;
            }
            Diff::ModEitem(p) if p.into.parent == pair.into.id => {
                pair_line(sink, true, "eitem", &p.from.pos, &p.into.pos)?;
                for dd in q {
                    let (attr, pp) = match dd {
                        Diff::ModEitemComment(pp) => ("comment", pp),
                        Diff::ModEitemLabels(pp) => ("labels", pp),
                        Diff::ModEitemValue(pp) => ("value", pp),
                        _ => continue,
                    };
                    if std::ptr::eq(pp.into, p.into) {
                        attr_line(sink, attr, "eitem", &pp.from.pos, &pp.into.pos)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn write_enms_section<W: Write>(sink: &mut W, q: &DiffQueue) -> io::Result<()> {
    writeln!(sink, "@@ enumerations @@")?;
    for d in q {
        match d {
            Diff::AddEnm(e) => one(sink, true, "enm", &e.pos)?,
            Diff::DelEnm(e) => one(sink, false, "enm", &e.pos)?,
            Diff::SameEnm(p) => pair_line(sink, false, "enm", &p.from.pos, &p.into.pos)?,
            Diff::ModEnm(p) => {
                pair_line(sink, true, "enm", &p.from.pos, &p.into.pos)?;
                write_enm_body(sink, q, p)?;
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Bitfields
// ============================================================================

fn write_bitf_body<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, relgen_core::Bitf>) -> io::Result<()> {
    for d in q {
        match d {
            Diff::ModBitfComment(p) if std::ptr::eq(p.into, pair.into) => {
                attr_line(sink, "comment", "bitf", &p.from.pos, &p.into.pos)?;
            }
            Diff::ModBitfLabels(p) if std::ptr::eq(p.into, pair.into) => {
                attr_line(sink, "labels", "bitf", &p.from.pos, &p.into.pos)?;
            }
            Diff::AddBitidx(i) if i.parent == pair.into.id => {
                one(sink, true, "bitidx", &i.pos)?;
            }
            Diff::DelBitidx(i) if i.parent == pair.from.id => {
                one(sink, false, "bitidx", &i.pos)?;
            }
            Diff::SameBitidx(p) if p.into.parent == pair.into.id => {
                pair_line(sink, false, "bitidx", &p.from.pos, &p.into.pos)?;
            }
            Diff::ModBitidx(p) if p.into.parent == pair.into.id => {
                pair_line(sink, true, "bitidx", &p.from.pos, &p.into.pos)?;
                for dd in q {
                    let (attr, pp) = match dd {
                        Diff::ModBitidxComment(pp) => ("comment", pp),
                        Diff::ModBitidxLabels(pp) => ("labels", pp),
                        Diff::ModBitidxValue(pp) => ("value", pp),
                        _ => continue,
                    };
                    if std::ptr::eq(pp.into, p.into) {
                        attr_line(sink, attr, "bitidx", &pp.from.pos, &pp.into.pos)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn write_bitfs_section<W: Write>(sink: &mut W, q: &DiffQueue) -> io::Result<()> {
    writeln!(sink, "@@ bitfields @@")?;
    for d in q {
        match d {
            Diff::AddBitf(b) => one(sink, true, "bitf", &b.pos)?,
            Diff::DelBitf(b) => one(sink, false, "bitf", &b.pos)?,
            Diff::SameBitf(p) => pair_line(sink, false, "bitf", &p.from.pos, &p.into.pos)?,
            Diff::ModBitf(p) => {
                pair_line(sink, true, "bitf", &p.from.pos, &p.into.pos)?;
                write_bitf_body(sink, q, p)?;
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Structures
// ============================================================================

fn write_field_mods<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, relgen_core::Field>) -> io::Result<()> {
    for d in q {
        let (attr, p) = match d {
            Diff::ModFieldActions(p) => ("actions", p),
            Diff::ModFieldBitf(p) => ("bitf", p),
            Diff::ModFieldComment(p) => ("comment", p),
            Diff::ModFieldDef(p) => ("def", p),
            Diff::ModFieldEnm(p) => ("enum", p),
            Diff::ModFieldFlags(p) => ("flags", p),
            Diff::ModFieldReference(p) => ("ref", p),
            Diff::ModFieldRolemap(p) => ("rolemap", p),
            Diff::ModFieldType(p) => ("type", p),
            Diff::ModFieldValids(p) => ("valids", p),
            _ => continue,
        };
        if std::ptr::eq(p.into, pair.into) {
            attr_line(sink, attr, "field", &p.from.pos, &p.into.pos)?;
        }
    }
    Ok(())
}

fn write_update_mods<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, relgen_core::Update>) -> io::Result<()> {
    for d in q {
        let (attr, p) = match d {
            Diff::ModUpdateComment(p) => ("comment", p),
            Diff::ModUpdateFlags(p) => ("flags", p),
            Diff::ModUpdateParams(p) => ("params", p),
            Diff::ModUpdateRolemap(p) => ("rolemap", p),
            _ => continue,
        };
        if std::ptr::eq(p.into, pair.into) {
            attr_line(sink, attr, "update", &p.from.pos, &p.into.pos)?;
        }
    }
    Ok(())
}

fn write_strct_body<W: Write>(sink: &mut W, q: &DiffQueue, pair: &Pair<'_, Strct>) -> io::Result<()> {
    for d in q {
        match d {
            Diff::AddInsert(s) if std::ptr::eq(*s, pair.into) => {
                one(sink, true, "insert", insert_pos(s))?;
            }
            Diff::AddField(f) if f.parent == pair.into.id => {
                one(sink, true, "field", &f.pos)?;
            }
            Diff::AddUnique(u) if u.parent == pair.into.id => {
                one(sink, true, "unique", &u.pos)?;
            }
            Diff::AddUpdate(u) if u.parent == pair.into.id => {
                one(sink, true, "update", &u.pos)?;
            }
            Diff::DelField(f) if f.parent == pair.from.id => {
                one(sink, false, "field", &f.pos)?;
            }
            Diff::DelInsert(s) if std::ptr::eq(*s, pair.from) => {
                one(sink, false, "insert", insert_pos(s))?;
            }
            Diff::DelUnique(u) if u.parent == pair.from.id => {
                one(sink, false, "unique", &u.pos)?;
            }
            Diff::DelUpdate(u) if u.parent == pair.from.id => {
                one(sink, false, "update", &u.pos)?;
            }
            Diff::ModField(p) if p.into.parent == pair.into.id => {
                pair_line(sink, true, "field", &p.from.pos, &p.into.pos)?;
                write_field_mods(sink, q, p)?;
            }
            Diff::ModInsert(p) if std::ptr::eq(p.into, pair.into) => {
                pair_line(sink, true, "insert", insert_pos(p.from), insert_pos(p.into))?;
                for dd in q {
                    if let Diff::ModInsertRolemap(pp) = dd {
                        if std::ptr::eq(pp.into, pair.into) {
                            attr_line(
                                sink,
                                "rolemap",
                                "insert",
                                insert_pos(pp.from),
                                insert_pos(pp.into),
                            )?;
                        }
                    }
                }
            }
            Diff::ModStrctComment(p) if std::ptr::eq(p.into, pair.into) => {
                attr_line(sink, "comment", "strct", &p.from.pos, &p.into.pos)?;
            }
            Diff::ModUpdate(p) if p.into.parent == pair.into.id => {
                pair_line(sink, true, "update", &p.from.pos, &p.into.pos)?;
                write_update_mods(sink, q, p)?;
            }
            Diff::SameField(p) if p.into.parent == pair.into.id => {
                pair_line(sink, false, "field", &p.from.pos, &p.into.pos)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn write_strcts_section<W: Write>(sink: &mut W, q: &DiffQueue) -> io::Result<()> {
    writeln!(sink, "@@ strcts @@")?;
    for d in q {
        match d {
            Diff::AddStrct(s) => one(sink, true, "strct", &s.pos)?,
            Diff::DelStrct(s) => one(sink, false, "strct", &s.pos)?,
            Diff::SameStrct(p) => pair_line(sink, false, "strct", &p.from.pos, &p.into.pos)?,
            Diff::ModStrct(p) => {
                pair_line(sink, true, "strct", &p.from.pos, &p.into.pos)?;
                write_strct_body(sink, q, p)?;
            }
            _ => {}
        }
    }
    Ok(())
}

// ============================================================================
// Entry
// ============================================================================

/// Write the diff report. File names for the header lines come from
/// the two configurations; a configuration parsed from standard input
/// has no file names and is shown as `<stdin>`.
pub fn write_diff_report<W: Write>(
    from: &Config,
    into: &Config,
    q: &DiffQueue,
    sink: &mut W,
) -> io::Result<()> {
    if from.fnames.is_empty() {
        writeln!(sink, "--- <stdin>")?;
    }
    for name in &from.fnames {
        writeln!(sink, "--- {}", name)?;
    }
    if into.fnames.is_empty() {
        writeln!(sink, "+++ <stdin>")?;
    }
    for name in &into.fnames {
        writeln!(sink, "+++ {}", name)?;
    }

    if q.iter()
        .any(|d| matches!(d, Diff::AddRoles(_) | Diff::DelRoles(_) | Diff::ModRoles(_)))
    {
        write_roles_section(sink, q)?;
    }
    if q.iter()
        .any(|d| matches!(d, Diff::AddEnm(_) | Diff::DelEnm(_) | Diff::ModEnm(_)))
    {
        write_enms_section(sink, q)?;
    }
    if q.iter()
        .any(|d| matches!(d, Diff::AddBitf(_) | Diff::DelBitf(_) | Diff::ModBitf(_)))
    {
        write_bitfs_section(sink, q)?;
    }
    if q.iter()
        .any(|d| matches!(d, Diff::AddStrct(_) | Diff::DelStrct(_) | Diff::ModStrct(_)))
    {
        write_strcts_section(sink, q)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relgen_core::diff::diff;
    use relgen_core::load_str;

    fn report(from: &str, into: &str) -> String {
        let from = load_str(from, "old.rgn").unwrap();
        let into = load_str(into, "new.rgn").unwrap();
        let q = diff(&from, &into);
        let mut out = Vec::new();
        write_diff_report(&from, &into, &q, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_report_equal_models() {
        let src = "struct a { field id int rowid; };";
        let out = report(src, src);
        assert_eq!(out, "--- old.rgn\n+++ new.rgn\n");
    }

    #[test]
    fn test_report_added_struct() {
        let out = report(
            "struct a { field id int rowid; };",
            "struct a { field id int rowid; };\
             struct b { field id int rowid; };",
        );
        assert_eq!(
            out,
            "--- old.rgn\n\
             +++ new.rgn\n\
             @@ strcts @@\n\
             \u{20} strct old.rgn:1:8 -> new.rgn:1:8\n\
             + strct new.rgn:1:41\n"
        );
    }

    #[test]
    fn test_report_field_change_lines() {
        let out = report(
            "struct a { field id int rowid; field x int; };",
            "struct a { field id int rowid; field x text; };",
        );
        assert!(out.contains("@@ strcts @@\n"));
        assert!(out.contains("@@ strct old.rgn:1:8 -> new.rgn:1:8 @@\n"));
        assert!(out.contains("@@ field old.rgn:1:38 -> new.rgn:1:38 @@\n"));
        assert!(out.contains("! type field old.rgn:1:38 -> new.rgn:1:38\n"));
        assert!(out.contains("  field old.rgn:1:18 -> new.rgn:1:18\n"));
    }

    #[test]
    fn test_report_sections_only_when_changed() {
        let out = report(
            "enum e { item a 0; }; struct s { field id int rowid; };",
            "enum e { item a 1; }; struct s { field id int rowid; };",
        );
        assert!(out.contains("@@ enumerations @@\n"));
        assert!(out.contains("! value eitem"));
        assert!(!out.contains("@@ strcts @@"));
        assert!(!out.contains("@@ roles @@"));
    }

    #[test]
    fn test_report_roles_section() {
        let out = report(
            "roles { role a; }; struct s { field id int rowid; };",
            "roles { role a; role b; }; struct s { field id int rowid; };",
        );
        assert!(out.contains("@@ roles @@\n"));
        assert!(out.contains("+ role "));
    }
}
