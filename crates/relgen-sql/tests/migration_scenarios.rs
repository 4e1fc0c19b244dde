//! End-to-end migration scenarios: parse two schemas, diff, migrate.

use pretty_assertions::assert_eq;
use relgen_core::diff::diff;
use relgen_core::load_str;
use relgen_core::MsgQueue;
use relgen_sql::{write_migration, write_schema, MigrationOutcome};

fn migrate(from: &str, into: &str, destructive: bool) -> (String, MigrationOutcome, MsgQueue) {
    let from = load_str(from, "old.rgn").unwrap();
    let into = load_str(into, "new.rgn").unwrap();
    let q = diff(&from, &into);
    let mut out = Vec::new();
    let mut msgs = Vec::new();
    let outcome = write_migration(&from, &into, &q, destructive, &mut out, &mut msgs).unwrap();
    (String::from_utf8(out).unwrap(), outcome, msgs)
}

#[test]
fn test_added_structure_creates_table() {
    let (out, outcome, msgs) = migrate(
        "struct a { field id int rowid; };",
        "struct a { field id int rowid; };\
         struct b { field id int rowid; field label text; };",
        false,
    );
    assert_eq!(outcome, MigrationOutcome::Migrated);
    assert!(msgs.is_empty());
    assert_eq!(
        out,
        "PRAGMA foreign_keys=ON;\n\n\
         CREATE TABLE b (\n\
         \tid INTEGER PRIMARY KEY,\n\
         \tlabel TEXT NOT NULL\n\
         );\n\n"
    );
    // The unchanged table is not re-created.
    assert!(!out.contains("CREATE TABLE a"));
}

#[test]
fn test_dropped_column_refused_then_allowed() {
    let from = "struct a { field id int rowid; field name text; };";
    let into = "struct a { field id int rowid; };";

    let (out, outcome, msgs) = migrate(from, into, false);
    assert_eq!(outcome, MigrationOutcome::Refused);
    assert_eq!(out, "");
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].text.contains("field column was dropped"));

    let (out, outcome, msgs) = migrate(from, into, true);
    assert_eq!(outcome, MigrationOutcome::Migrated);
    assert!(msgs.is_empty());
    assert_eq!(
        out,
        "PRAGMA foreign_keys=ON;\n\n-- ALTER TABLE a DROP COLUMN name;\n"
    );
}

#[test]
fn test_default_change_is_not_migrated() {
    let (out, outcome, msgs) = migrate(
        "struct a { field id int rowid; field x int default 1; };",
        "struct a { field id int rowid; field x int default 2; };",
        false,
    );
    assert_eq!(outcome, MigrationOutcome::Unchanged);
    assert_eq!(out, "");
    assert!(msgs.is_empty());
}

#[test]
fn test_dropped_structure_refused_then_dropped() {
    let from = "struct a { field id int rowid; };\
                struct b { field id int rowid; };";
    let into = "struct a { field id int rowid; };";

    let (_, outcome, msgs) = migrate(from, into, false);
    assert_eq!(outcome, MigrationOutcome::Refused);
    assert!(msgs.iter().any(|m| m.text.contains("deleted table")));

    let (out, outcome, _) = migrate(from, into, true);
    assert_eq!(outcome, MigrationOutcome::Migrated);
    assert!(out.contains("DROP TABLE b;\n"));
}

#[test]
fn test_struct_field_addition_emits_no_column() {
    // Adding a struct-typed accessor over an existing foreign key only
    // changes the model, not the database.
    let (out, outcome, msgs) = migrate(
        "struct b { field id int rowid; };\
         struct a { field id int rowid; field bid:b.id int; };",
        "struct b { field id int rowid; };\
         struct a { field id int rowid; field bid:b.id int; field b struct bid; };",
        false,
    );
    assert_eq!(outcome, MigrationOutcome::Unchanged);
    assert_eq!(out, "");
    assert!(msgs.is_empty());
}

#[test]
fn test_new_table_carries_foreign_keys_and_defaults() {
    let (out, _, _) = migrate(
        "struct owner { field id int rowid; };",
        "enum kind { item plain 7; };\
         struct owner { field id int rowid; };\
         struct pet {\
           field id int rowid;\
           field kind enum kind default plain;\
           field ownerid:owner.id int actdel cascade;\
           field owner struct ownerid;\
         };",
        false,
    );
    assert!(out.contains("CREATE TABLE pet ("));
    assert!(out.contains("\tkind INTEGER NOT NULL,"));
    assert!(out.contains("\tFOREIGN KEY(ownerid) REFERENCES owner(id) ON DELETE CASCADE"));
    // Migration tables carry no doc comments.
    assert!(!out.contains("--"));
}

#[test]
fn test_full_schema_columns_match_model() {
    let cfg = load_str(
        "struct b { field id int rowid; };\
         struct a {\
           field id int rowid;\
           field bid:b.id int;\
           field b struct bid;\
           field blobby blob null;\
         };",
        "t.rgn",
    )
    .unwrap();
    let mut out = Vec::new();
    write_schema(&cfg, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert_eq!(text.matches("CREATE TABLE").count(), 2);
    assert!(text.contains("\tid INTEGER PRIMARY KEY"));
    assert!(text.contains("\tbid INTEGER NOT NULL"));
    assert!(text.contains("\tblobby BLOB\n"));
    // Struct-typed fields never become columns.
    assert!(!text.contains("\tb INTEGER"));
}
