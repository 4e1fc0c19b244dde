//! Per-role access audit.
//!
//! For a chosen role, [`audit`] walks the model in declaration order and
//! queues every operation the role may invoke. Each permitted query
//! additionally extends the queue with one [`Reachable`] entry per
//! structure observable from the query's result, tracking per-field and
//! per-path export decisions.

use crate::model::{rolemap_permits, Config, Field, FieldType, RoleId, Search, Strct, Update};
use tracing::debug;

/// One entry of the audit queue. Entries borrow the model, which must
/// outlive the queue.
#[derive(Debug)]
pub enum Audit<'a> {
    /// The role may insert into this structure.
    Insert(&'a Strct),
    /// The role may run this update or delete operation.
    Update(&'a Update),
    /// The role may run this query.
    Query(&'a Search),
    /// The structure is observable from some permitted query.
    Reachable(Reachable<'a>),
}

/// Export decision for one field of a reachable structure, computed
/// once at first reach.
#[derive(Debug)]
pub struct AuditField<'a> {
    pub field: &'a Field,
    pub exported: bool,
}

/// One way a query reaches a structure: the dotted path from the
/// query's result (`None` for the result itself) and whether data is
/// still exported along it.
#[derive(Debug)]
pub struct AuditPath<'a> {
    pub search: &'a Search,
    pub exported: bool,
    pub path: Option<String>,
}

/// A structure reachable from at least one permitted query.
#[derive(Debug)]
pub struct Reachable<'a> {
    pub strct: &'a Strct,
    /// True iff at least one recorded path reaches the structure
    /// exported. Promoted, never demoted.
    pub exported: bool,
    pub fields: Vec<AuditField<'a>>,
    pub paths: Vec<AuditPath<'a>>,
}

/// Ordered audit queue; one [`Audit::Reachable`] per structure, placed
/// where the first query reached it.
pub type AuditQueue<'a> = Vec<Audit<'a>>;

/// Record a reach of `strct` and recurse through its struct-typed
/// fields. The path depth is capped by the model's total field count so
/// cyclic reference graphs terminate.
#[allow(clippy::too_many_arguments)]
fn follow<'a>(
    cfg: &'a Config,
    role: RoleId,
    queue: &mut AuditQueue<'a>,
    search: &'a Search,
    strct: &'a Strct,
    exported: bool,
    path: Option<String>,
    depth: usize,
) {
    let found = queue.iter().position(
        |a| matches!(a, Audit::Reachable(r) if std::ptr::eq(r.strct as *const _, strct as *const _)),
    );
    let idx = match found {
        Some(i) => i,
        None => {
            let fields = strct
                .fields
                .iter()
                .map(|f| AuditField {
                    field: f,
                    exported: !f.noexport && !rolemap_permits(cfg, f.rolemap.as_ref(), role),
                })
                .collect();
            queue.push(Audit::Reachable(Reachable {
                strct,
                exported,
                fields,
                paths: Vec::new(),
            }));
            queue.len() - 1
        }
    };

    if let Audit::Reachable(r) = &mut queue[idx] {
        r.paths.push(AuditPath {
            search,
            exported,
            path: path.clone(),
        });
        // A later query may reach an otherwise unexported structure as
        // exported, e.g. through a distinct clause; never the reverse.
        if exported {
            r.exported = true;
        }
    }

    if depth >= cfg.total_fields() {
        return;
    }

    for f in &strct.fields {
        if f.ftype != FieldType::Struct {
            continue;
        }
        let Some(r) = f.reference else { continue };

        let next_path = match &path {
            Some(p) => format!("{}.{}", p, f.name),
            None => f.name.clone(),
        };
        let next_exported =
            exported && !f.noexport && !rolemap_permits(cfg, f.rolemap.as_ref(), role);
        let target = cfg.strct(r.target.strct);
        follow(cfg, role, queue, search, target, next_exported, Some(next_path), depth + 1);
    }
}

/// Build the audit queue for `role` over `cfg`.
///
/// Structures are walked in declaration order: first the permitted
/// insert, then updates, deletes, and queries in declaration order.
/// Each permitted query is followed by the reachability walk starting
/// at its result structure (the distinct target when present).
pub fn audit<'a>(cfg: &'a Config, role: RoleId) -> AuditQueue<'a> {
    let mut queue = Vec::new();

    for st in &cfg.strcts {
        let exported = !st.noexports.iter().any(|rm| rm.permits(cfg, role));

        if let Some(ins) = &st.insert {
            if rolemap_permits(cfg, ins.rolemap.as_ref(), role) {
                queue.push(Audit::Insert(st));
            }
        }
        for up in &st.updates {
            if rolemap_permits(cfg, up.rolemap.as_ref(), role) {
                queue.push(Audit::Update(up));
            }
        }
        for del in &st.deletes {
            if rolemap_permits(cfg, del.rolemap.as_ref(), role) {
                queue.push(Audit::Update(del));
            }
        }
        for sr in &st.searches {
            if rolemap_permits(cfg, sr.rolemap.as_ref(), role) {
                queue.push(Audit::Query(sr));
                let start = match &sr.distinct {
                    Some(d) => cfg.strct(d.strct),
                    None => st,
                };
                follow(cfg, role, &mut queue, sr, start, exported, None, 0);
            }
        }
    }

    debug!(
        role = %cfg.role(role).name,
        entries = queue.len(),
        "built audit queue"
    );
    queue
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load_str;
    use pretty_assertions::assert_eq;

    fn reachables<'a>(q: &'a AuditQueue) -> Vec<&'a Reachable<'a>> {
        q.iter()
            .filter_map(|a| match a {
                Audit::Reachable(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_audit_orders_operations() {
        let cfg = load_str(
            "roles { role admin; };\
             struct a {\
               field id int rowid;\
               search id: name byid;\
               update: id: name up;\
               delete id: name rm;\
               insert;\
               roles admin { all; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        assert!(matches!(q[0], Audit::Insert(_)));
        assert!(matches!(q[1], Audit::Update(u) if u.name.as_deref() == Some("up")));
        assert!(matches!(q[2], Audit::Update(u) if u.name.as_deref() == Some("rm")));
        assert!(matches!(q[3], Audit::Query(_)));
        assert!(matches!(q[4], Audit::Reachable(_)));
        assert_eq!(q.len(), 5);
    }

    #[test]
    fn test_audit_denies_unlisted_role() {
        let cfg = load_str(
            "roles { role admin; role user; };\
             struct a {\
               field id int rowid;\
               search id: name byid;\
               roles admin { search byid; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let user = cfg.find_role("user").unwrap().id;
        assert!(audit(&cfg, user).is_empty());
    }

    #[test]
    fn test_audit_role_inherits_from_parent() {
        let cfg = load_str(
            "roles { role staff { role admin; }; };\
             struct a {\
               field id int rowid;\
               search id: name byid;\
               roles staff { search byid; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        assert_eq!(q.len(), 2);
    }

    #[test]
    fn test_audit_reachability_through_references() {
        let cfg = load_str(
            "roles { role admin; };\
             struct company { field id int rowid; field name text; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int;\
               field company struct companyid;\
               search id: name byid;\
               roles admin { search byid; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        let rs = reachables(&q);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs[0].strct.name, "user");
        assert_eq!(rs[0].paths[0].path, None);
        assert_eq!(rs[1].strct.name, "company");
        assert_eq!(rs[1].paths[0].path.as_deref(), Some("company"));
        assert!(rs[1].exported);
    }

    #[test]
    fn test_audit_noexport_field_blocks_path() {
        let cfg = load_str(
            "roles { role admin; };\
             struct company { field id int rowid; field name text; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int;\
               field company struct companyid noexport;\
               search id: name byid;\
               roles admin { search byid; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        let rs = reachables(&q);
        assert!(rs[0].exported);
        // Reached only through the noexport hop.
        assert!(!rs[1].exported);
        assert!(!rs[1].paths[0].exported);
    }

    #[test]
    fn test_audit_terminates_on_reference_cycle() {
        let cfg = load_str(
            "roles { role admin; };\
             struct a {\
               field id int rowid;\
               field bid:b.id int null;\
               field b struct bid;\
               search id: name byid;\
               roles admin { search byid; };\
             };\
             struct b {\
               field id int rowid;\
               field aid:a.id int null;\
               field a struct aid;\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        let rs = reachables(&q);
        assert_eq!(rs.len(), 2);
        assert!(!rs[0].paths.is_empty());
        assert!(!rs[1].paths.is_empty());
    }

    #[test]
    fn test_audit_export_promotion_via_distinct() {
        // The structure itself is marked noexport for the role, but the
        // distinct query exports its subtree.
        let cfg = load_str(
            "roles { role admin; };\
             struct company { field id int rowid; field name text; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int;\
               field company struct companyid noexport;\
               search id: name byid;\
               search id: name codistinct distinct company;\
               roles admin { search byid; search codistinct; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        let q = audit(&cfg, admin);
        let rs = reachables(&q);
        let company = rs.iter().find(|r| r.strct.name == "company").unwrap();
        // First reached unexported through the noexport hop, then
        // promoted by the distinct query.
        assert!(company.exported);
        assert_eq!(company.paths.len(), 2);
        assert!(!company.paths[0].exported);
        assert!(company.paths[1].exported);
    }
}
