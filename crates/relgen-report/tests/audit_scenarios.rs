//! End-to-end audit scenarios: parse, audit, render.

use pretty_assertions::assert_eq;
use relgen_core::audit::audit;
use relgen_core::load_str;
use relgen_report::{write_audit, write_audit_json};
use serde_json::Value;

#[test]
fn test_noexport_field_is_listed_but_not_exported() {
    let cfg = load_str(
        "roles { role viewer; };\
         struct account {\
           field id int rowid;\
           field secret password;\
           search id: name byid;\
           roles viewer { search byid; noexport secret; };\
         };",
        "t.rgn",
    )
    .unwrap();
    let viewer = cfg.find_role("viewer").unwrap().id;
    let q = audit(&cfg, viewer);

    let mut out = Vec::new();
    write_audit_json(&cfg, &q, viewer, false, &mut out).unwrap();
    let v: Value = serde_json::from_slice(&out).unwrap();

    let data = &v["access"][0]["access"]["data"];
    assert!(data.as_array().unwrap().iter().any(|f| f == "secret"));
    assert_eq!(v["fields"]["account.secret"]["export"], false);
    assert_eq!(v["fields"]["account.id"]["export"], true);
}

#[test]
fn test_reference_cycle_yields_two_reachable_entries() {
    let cfg = load_str(
        "roles { role r; };\
         struct a {\
           field id int rowid;\
           field bid:b.id int null;\
           field b struct bid;\
           search id: name byid;\
           roles r { search byid; };\
         };\
         struct b {\
           field id int rowid;\
           field aid:a.id int null;\
           field a struct aid;\
         };",
        "t.rgn",
    )
    .unwrap();
    let r = cfg.find_role("r").unwrap().id;
    let q = audit(&cfg, r);

    let mut out = Vec::new();
    write_audit(&cfg, &q, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    // Both structures are reached at least once and the walk stops.
    assert!(text.contains("readwrite   a:byid:-"));
    assert!(text.contains("readwrite   b:byid:b"));
    assert!(text.contains("readwrite   a:byid:b.a"));
}

#[test]
fn test_audit_json_byte_identical_across_runs() {
    let src = "roles { role r; };\
               struct a {\
                 field id int rowid;\
                 field x int;\
                 search x: name byx;\
                 update x: id: name setx;\
                 insert;\
                 roles r { all; };\
               };";
    let cfg = load_str(src, "t.rgn").unwrap();
    let r = cfg.find_role("r").unwrap().id;

    let mut a = Vec::new();
    write_audit_json(&cfg, &audit(&cfg, r), r, false, &mut a).unwrap();
    let mut b = Vec::new();
    write_audit_json(&cfg, &audit(&cfg, r), r, false, &mut b).unwrap();
    assert_eq!(a, b);
}

#[test]
fn test_distinct_query_reaches_subtree_structure() {
    let cfg = load_str(
        "roles { role r; };\
         struct company { field id int rowid; field name text; };\
         struct user {\
           field id int rowid;\
           field companyid:company.id int;\
           field company struct companyid;\
           search id: name bycompany distinct company;\
           roles r { search bycompany; };\
         };",
        "t.rgn",
    )
    .unwrap();
    let r = cfg.find_role("r").unwrap().id;
    let q = audit(&cfg, r);

    let mut out = Vec::new();
    write_audit(&cfg, &q, &mut out).unwrap();
    let text = String::from_utf8(out).unwrap();

    // The query's result structure is the distinct target, not the
    // declaring structure.
    assert!(text.contains("search      user:bycompany"));
    assert!(text.contains("readwrite   company:bycompany:-"));
    assert!(!text.contains("readwrite   user:"));
}
