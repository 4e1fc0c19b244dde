//! JSON audit report.
//!
//! Renders an audit queue as one JSON object: per-structure access
//! summaries, a map of invocable operations keyed by their derived
//! function names, and a map of reachable fields with their export
//! flags. Standalone mode wraps the object in a small script that
//! installs it as `root.audit`.

use indexmap::IndexMap;
use relgen_core::{
    Audit, AuditQueue, Config, QueryKind, Reachable, RoleId, Search, Strct, Update, UpdateKind,
};
use serde::Serialize;
use std::io::{self, Write};

#[derive(Serialize)]
struct AuditJson<'a> {
    role: &'a str,
    doc: Option<&'a str>,
    access: Vec<AccessEntry<'a>>,
    functions: IndexMap<String, FunctionProto<'a>>,
    fields: IndexMap<String, FieldProto<'a>>,
}

#[derive(Serialize)]
struct AccessEntry<'a> {
    name: &'a str,
    access: Access<'a>,
}

#[derive(Serialize)]
struct Access<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    exportable: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Vec<&'a str>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    accessfrom: Option<Vec<AccessFrom>>,
    insert: Option<String>,
    update: Vec<String>,
    delete: Vec<String>,
    count: Vec<String>,
    get: Vec<String>,
    list: Vec<String>,
    iterate: Vec<String>,
}

#[derive(Serialize)]
struct AccessFrom {
    function: String,
    exporting: bool,
    path: String,
}

#[derive(Serialize)]
struct FunctionProto<'a> {
    doc: Option<&'a str>,
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Serialize)]
struct FieldProto<'a> {
    export: bool,
    doc: Option<&'a str>,
}

// ============================================================================
// Derived function names
// ============================================================================

pub(crate) fn insert_fn_name(strct: &Strct) -> String {
    format!("db_{}_insert", strct.name)
}

pub(crate) fn search_fn_name(cfg: &Config, search: &Search) -> String {
    let mut name = format!(
        "db_{}_{}",
        cfg.strct(search.parent).name,
        search.kind.proto_name()
    );
    if let Some(n) = &search.name {
        name.push('_');
        name.push_str(n);
    } else if !search.sents.is_empty() {
        name.push_str("_by");
        for sent in &search.sents {
            name.push('_');
            name.push_str(&sent.uname());
            name.push('_');
            name.push_str(sent.op.name());
        }
    }
    name
}

pub(crate) fn update_fn_name(cfg: &Config, up: &Update) -> String {
    let mut name = format!("db_{}_{}", cfg.strct(up.parent).name, up.kind.name());
    if let Some(n) = &up.name {
        name.push('_');
        name.push_str(n);
        return name;
    }
    if up.kind == UpdateKind::Modify && !up.all {
        for m in &up.mrq {
            name.push('_');
            name.push_str(&m.field);
            name.push('_');
            name.push_str(m.modifier.name());
        }
    }
    if !up.crq.is_empty() {
        name.push_str("_by");
        for c in &up.crq {
            name.push('_');
            name.push_str(&c.field);
            name.push('_');
            name.push_str(c.op.name());
        }
    }
    name
}

// ============================================================================
// Report assembly
// ============================================================================

fn reachable_for<'q, 'a>(queue: &'q AuditQueue<'a>, strct: &Strct) -> Option<&'q Reachable<'a>> {
    queue.iter().find_map(|a| match a {
        Audit::Reachable(r) if std::ptr::eq(r.strct, strct) => Some(r),
        _ => None,
    })
}

fn access_for<'a>(cfg: &'a Config, queue: &AuditQueue<'a>, strct: &'a Strct) -> Access<'a> {
    let reachable = reachable_for(queue, strct);

    let query_names = |kind: QueryKind| -> Vec<String> {
        queue
            .iter()
            .filter_map(|a| match a {
                Audit::Query(s) if s.parent == strct.id && s.kind == kind => {
                    Some(search_fn_name(cfg, s))
                }
                _ => None,
            })
            .collect()
    };
    let update_names = |kind: UpdateKind| -> Vec<String> {
        queue
            .iter()
            .filter_map(|a| match a {
                Audit::Update(u) if u.parent == strct.id && u.kind == kind => {
                    Some(update_fn_name(cfg, u))
                }
                _ => None,
            })
            .collect()
    };

    Access {
        exportable: reachable.map(|r| r.exported),
        data: reachable.map(|_| strct.fields.iter().map(|f| f.name.as_str()).collect()),
        accessfrom: reachable.map(|r| {
            r.paths
                .iter()
                .map(|p| AccessFrom {
                    function: search_fn_name(cfg, p.search),
                    exporting: p.exported,
                    path: p.path.clone().unwrap_or_default(),
                })
                .collect()
        }),
        insert: queue.iter().find_map(|a| match a {
            Audit::Insert(s) if std::ptr::eq(*s, strct) => Some(insert_fn_name(s)),
            _ => None,
        }),
        update: update_names(UpdateKind::Modify),
        delete: update_names(UpdateKind::Delete),
        count: query_names(QueryKind::Count),
        get: query_names(QueryKind::Search),
        list: query_names(QueryKind::List),
        iterate: query_names(QueryKind::Iterate),
    }
}

/// Write the audit JSON report for `role`.
pub fn write_audit_json<W: Write>(
    cfg: &Config,
    queue: &AuditQueue,
    role: RoleId,
    standalone: bool,
    sink: &mut W,
) -> io::Result<()> {
    let mut functions = IndexMap::new();
    for entry in queue {
        match entry {
            Audit::Insert(s) => {
                functions.insert(
                    insert_fn_name(s),
                    FunctionProto {
                        doc: None,
                        kind: "insert",
                    },
                );
            }
            Audit::Update(u) => {
                functions.insert(
                    update_fn_name(cfg, u),
                    FunctionProto {
                        doc: u.doc.as_deref(),
                        kind: u.kind.name(),
                    },
                );
            }
            Audit::Query(s) => {
                functions.insert(
                    search_fn_name(cfg, s),
                    FunctionProto {
                        doc: s.doc.as_deref(),
                        kind: s.kind.proto_name(),
                    },
                );
            }
            Audit::Reachable(_) => {}
        }
    }

    let mut fields = IndexMap::new();
    for entry in queue {
        if let Audit::Reachable(r) = entry {
            for af in &r.fields {
                fields.insert(
                    format!("{}.{}", r.strct.name, af.field.name),
                    FieldProto {
                        export: af.exported,
                        doc: af.field.doc.as_deref(),
                    },
                );
            }
        }
    }

    let report = AuditJson {
        role: &cfg.role(role).name,
        doc: cfg.role(role).doc.as_deref(),
        access: cfg
            .strcts
            .iter()
            .map(|s| AccessEntry {
                name: &s.name,
                access: access_for(cfg, queue, s),
            })
            .collect(),
        functions,
        fields,
    };

    if standalone {
        write!(sink, "(function(root) {{\n 'use strict';\n var audit = ")?;
    }
    serde_json::to_writer_pretty(&mut *sink, &report).map_err(io::Error::other)?;
    if standalone {
        write!(sink, ";\n root.audit = audit;\n}})(this);")?;
    }
    writeln!(sink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relgen_core::audit::audit;
    use relgen_core::load_str;
    use serde_json::Value;

    fn report(src: &str, role: &str, standalone: bool) -> String {
        let cfg = load_str(src, "t.rgn").unwrap();
        let role = cfg.find_role(role).unwrap().id;
        let q = audit(&cfg, role);
        let mut out = Vec::new();
        write_audit_json(&cfg, &q, role, standalone, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    const SRC: &str = "roles { role admin comment \"Operators.\"; };\
         struct user {\
           field id int rowid;\
           field secret text noexport;\
           field email email unique comment \"Login address.\";\
           search email: name byemail comment \"Lookup by address.\";\
           list: name everyone;\
           count: name total;\
           iterate: name each;\
           update email: id: name setemail;\
           delete id: name rm;\
           insert;\
           roles admin { all; };\
         };";

    #[test]
    fn test_audit_json_shape() {
        let text = report(SRC, "admin", false);
        let v: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(v["role"], "admin");
        assert_eq!(v["doc"], "Operators.");
        let access = &v["access"][0];
        assert_eq!(access["name"], "user");
        let a = &access["access"];
        assert_eq!(a["exportable"], true);
        assert_eq!(a["data"], serde_json::json!(["id", "secret", "email"]));
        assert_eq!(a["insert"], "db_user_insert");
        assert_eq!(a["update"][0], "db_user_update_setemail");
        assert_eq!(a["delete"][0], "db_user_delete_rm");
        assert_eq!(a["count"][0], "db_user_count_total");
        assert_eq!(a["get"][0], "db_user_get_byemail");
        assert_eq!(a["list"][0], "db_user_list_everyone");
        assert_eq!(a["iterate"][0], "db_user_iterate_each");
        assert_eq!(a["accessfrom"][0]["function"], "db_user_get_byemail");
        assert_eq!(a["accessfrom"][0]["exporting"], true);
        assert_eq!(a["accessfrom"][0]["path"], "");
        // noexport field is listed in data but not exported.
        assert_eq!(v["fields"]["user.secret"]["export"], false);
        assert_eq!(v["fields"]["user.email"]["export"], true);
        assert_eq!(v["fields"]["user.email"]["doc"], "Login address.");
        assert_eq!(v["functions"]["db_user_get_byemail"]["type"], "get");
        assert_eq!(
            v["functions"]["db_user_get_byemail"]["doc"],
            "Lookup by address."
        );
        assert_eq!(v["functions"]["db_user_insert"]["type"], "insert");
        assert_eq!(v["functions"]["db_user_delete_rm"]["type"], "delete");
    }

    #[test]
    fn test_audit_json_standalone_wrapper() {
        let text = report(SRC, "admin", true);
        assert!(text.starts_with("(function(root) {\n 'use strict';\n var audit = {"));
        assert!(text.ends_with(";\n root.audit = audit;\n})(this);\n"));
    }

    #[test]
    fn test_derived_names_for_unnamed_operations() {
        let cfg = load_str(
            "roles { role r; };\
             struct user {\
               field id int rowid;\
               field email email;\
               field hits int;\
               search email eq;\
               update hits inc: id;\
               roles r { all; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let st = cfg.find_strct("user").unwrap();
        assert_eq!(
            search_fn_name(&cfg, &st.searches[0]),
            "db_user_get_by_email_eq"
        );
        assert_eq!(
            update_fn_name(&cfg, &st.updates[0]),
            "db_user_update_hits_inc_by_id_eq"
        );
    }

    #[test]
    fn test_unreachable_struct_has_no_export_keys() {
        let text = report(
            "roles { role r; };\
             struct a { field id int rowid; insert; roles r { insert; }; };",
            "r",
            false,
        );
        let v: Value = serde_json::from_str(&text).unwrap();
        let a = &v["access"][0]["access"];
        assert!(a.get("exportable").is_none());
        assert!(a.get("data").is_none());
        assert_eq!(a["insert"], "db_a_insert");
    }
}
