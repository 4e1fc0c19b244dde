//! Cross-entity resolution after all files have parsed.
//!
//! Binds enum/bitfield names, resolves references to the rowid of their
//! target structure, walks dotted query chains, checks unique members,
//! and attaches role maps to their operations.

use super::Pending;
use crate::model::{
    Config, DefaultValue, EitemRef, FieldId, FieldType, QueryKind, Reference, RoleId, RoleMap,
    RoleMapKind, StrctId,
};
use crate::msg::{Msg, MsgKind, Pos};
use tracing::debug;

struct Linker<'a> {
    cfg: &'a mut Config,
    errors: usize,
}

impl<'a> Linker<'a> {
    fn error(&mut self, pos: &Pos, text: impl Into<String>) {
        self.cfg
            .msgs
            .push(Msg::new(Some(pos.clone()), MsgKind::Error, text));
        self.errors += 1;
    }
}

/// Resolve everything deferred during parsing. Returns false and leaves
/// diagnostics on the queue if the configuration does not link.
pub(crate) fn link(cfg: &mut Config, pending: Pending) -> bool {
    let mut lk = Linker { cfg, errors: 0 };

    resolve_enum_binds(&mut lk, &pending);
    resolve_field_refs(&mut lk, &pending);
    resolve_struct_sources(&mut lk, &pending);
    resolve_enum_defaults(&mut lk, &pending);
    resolve_chains(&mut lk);
    check_uniques(&mut lk);
    resolve_rolemaps(&mut lk, &pending);

    if lk.errors > 0 {
        debug!(errors = lk.errors, "link failed");
        return false;
    }
    true
}

fn resolve_enum_binds(lk: &mut Linker, pending: &Pending) {
    for req in &pending.enum_binds {
        match lk.cfg.find_enum(&req.name) {
            Some(e) => {
                let id = e.id;
                field_mut(lk.cfg, req.field).enm = Some(id);
            }
            None => lk.error(&req.pos, format!("unknown enumeration `{}`", req.name)),
        }
    }
    for req in &pending.bitf_binds {
        match lk.cfg.find_bitf(&req.name) {
            Some(b) => {
                let id = b.id;
                field_mut(lk.cfg, req.field).bitf = Some(id);
            }
            None => lk.error(&req.pos, format!("unknown bitfield `{}`", req.name)),
        }
    }
}

fn resolve_field_refs(lk: &mut Linker, pending: &Pending) {
    for req in &pending.field_refs {
        let target = match lk.cfg.find_strct(&req.strct) {
            Some(st) => match st.field_named(&req.target) {
                Some((idx, f)) => {
                    if !f.rowid {
                        lk.error(
                            &req.pos,
                            format!("reference target `{}.{}` is not a rowid", req.strct, req.target),
                        );
                        continue;
                    }
                    FieldId {
                        strct: st.id,
                        field: idx,
                    }
                }
                None => {
                    lk.error(
                        &req.pos,
                        format!("unknown reference field `{}.{}`", req.strct, req.target),
                    );
                    continue;
                }
            },
            None => {
                lk.error(&req.pos, format!("unknown reference structure `{}`", req.strct));
                continue;
            }
        };
        field_mut(lk.cfg, req.field).reference = Some(Reference {
            source: req.field,
            target,
        });
    }
}

fn resolve_struct_sources(lk: &mut Linker, pending: &Pending) {
    for req in &pending.struct_sources {
        let sibling = lk
            .cfg
            .strct(req.field.strct)
            .field_named(&req.source)
            .map(|(idx, f)| (idx, f.reference));
        match sibling {
            Some((idx, Some(r))) => {
                field_mut(lk.cfg, req.field).reference = Some(Reference {
                    source: FieldId {
                        strct: req.field.strct,
                        field: idx,
                    },
                    target: r.target,
                });
            }
            Some((_, None)) => lk.error(
                &req.pos,
                format!("source field `{}` has no reference", req.source),
            ),
            None => lk.error(&req.pos, format!("unknown source field `{}`", req.source)),
        }
    }
}

fn resolve_enum_defaults(lk: &mut Linker, pending: &Pending) {
    for req in &pending.enum_defaults {
        let resolved = match field_ref(lk.cfg, req.field).enm {
            Some(eid) => lk
                .cfg
                .enm(eid)
                .items
                .iter()
                .position(|i| i.name.eq_ignore_ascii_case(&req.name))
                .map(|item| EitemRef { enm: eid, item }),
            None => None,
        };
        match resolved {
            Some(er) => field_mut(lk.cfg, req.field).def = Some(DefaultValue::Enum(er)),
            None => lk.error(&req.pos, format!("unknown enumeration item `{}`", req.name)),
        }
    }
}

/// Which terminal a dotted chain must end on.
#[derive(Clone, Copy, PartialEq)]
enum ChainEnd {
    Scalar,
    Strct,
}

/// Walk `a.b.c` from `start`: every hop but the last must be a
/// struct-typed field with a resolved reference.
fn resolve_chain(
    cfg: &Config,
    start: StrctId,
    fname: &str,
    end: ChainEnd,
) -> Result<FieldId, String> {
    let comps: Vec<&str> = fname.split('.').collect();
    let mut cur = start;
    for (i, comp) in comps.iter().enumerate() {
        let st = cfg.strct(cur);
        let (idx, f) = st
            .field_named(comp)
            .ok_or_else(|| format!("unknown field `{}` in `{}`", comp, fname))?;
        let last = i + 1 == comps.len();
        if last {
            match end {
                ChainEnd::Scalar if f.ftype == FieldType::Struct => {
                    return Err(format!("`{}` does not end on a scalar field", fname));
                }
                ChainEnd::Strct if f.ftype != FieldType::Struct => {
                    return Err(format!("`{}` does not end on a struct field", fname));
                }
                _ => {}
            }
            return Ok(FieldId {
                strct: cur,
                field: idx,
            });
        }
        if f.ftype != FieldType::Struct {
            return Err(format!("`{}` is not a struct field in `{}`", comp, fname));
        }
        let r = f
            .reference
            .ok_or_else(|| format!("`{}` has no reference in `{}`", comp, fname))?;
        cur = r.target.strct;
    }
    unreachable!("empty chain")
}

fn resolve_chains(lk: &mut Linker) {
    for si in 0..lk.cfg.strcts.len() {
        let start = StrctId(si);
        for qi in 0..lk.cfg.strcts[si].searches.len() {
            for ti in 0..lk.cfg.strcts[si].searches[qi].sents.len() {
                let (fname, pos) = {
                    let s = &lk.cfg.strcts[si].searches[qi].sents[ti];
                    (s.fname.clone(), s.pos.clone())
                };
                match resolve_chain(lk.cfg, start, &fname, ChainEnd::Scalar) {
                    Ok(fid) => lk.cfg.strcts[si].searches[qi].sents[ti].field = fid,
                    Err(msg) => lk.error(&pos, msg),
                }
            }
            for oi in 0..lk.cfg.strcts[si].searches[qi].ords.len() {
                let (fname, pos) = {
                    let o = &lk.cfg.strcts[si].searches[qi].ords[oi];
                    (o.fname.clone(), o.pos.clone())
                };
                match resolve_chain(lk.cfg, start, &fname, ChainEnd::Scalar) {
                    Ok(fid) => lk.cfg.strcts[si].searches[qi].ords[oi].field = fid,
                    Err(msg) => lk.error(&pos, msg),
                }
            }
            if let Some((fname, pos)) = lk.cfg.strcts[si].searches[qi]
                .aggr
                .as_ref()
                .map(|a| (a.fname.clone(), a.pos.clone()))
            {
                match resolve_chain(lk.cfg, start, &fname, ChainEnd::Scalar) {
                    Ok(fid) => {
                        lk.cfg.strcts[si].searches[qi].aggr.as_mut().unwrap().field = fid
                    }
                    Err(msg) => lk.error(&pos, msg),
                }
            }
            if let Some((fname, pos)) = lk.cfg.strcts[si].searches[qi]
                .group
                .as_ref()
                .map(|g| (g.fname.clone(), g.pos.clone()))
            {
                match resolve_chain(lk.cfg, start, &fname, ChainEnd::Scalar) {
                    Ok(fid) => {
                        lk.cfg.strcts[si].searches[qi].group.as_mut().unwrap().field = fid
                    }
                    Err(msg) => lk.error(&pos, msg),
                }
            }
            if let Some((fname, pos)) = lk.cfg.strcts[si].searches[qi]
                .distinct
                .as_ref()
                .map(|d| (d.fname.clone(), d.pos.clone()))
            {
                match resolve_chain(lk.cfg, start, &fname, ChainEnd::Strct) {
                    Ok(fid) => {
                        // Terminal is struct-typed, so the reference exists.
                        let target = field_ref(lk.cfg, fid).reference.unwrap().target.strct;
                        lk.cfg.strcts[si].searches[qi].distinct.as_mut().unwrap().strct = target;
                    }
                    Err(msg) => lk.error(&pos, msg),
                }
            }
        }

        for list in [0, 1] {
            let len = if list == 0 {
                lk.cfg.strcts[si].updates.len()
            } else {
                lk.cfg.strcts[si].deletes.len()
            };
            for ui in 0..len {
                let refs: Vec<(String, Pos)> = {
                    let up = if list == 0 {
                        &lk.cfg.strcts[si].updates[ui]
                    } else {
                        &lk.cfg.strcts[si].deletes[ui]
                    };
                    up.mrq
                        .iter()
                        .chain(up.crq.iter())
                        .map(|u| (u.field.clone(), u.pos.clone()))
                        .collect()
                };
                for (name, pos) in refs {
                    if lk.cfg.strcts[si].field_named(&name).is_none() {
                        lk.error(&pos, format!("unknown field `{}`", name));
                    }
                }
            }
        }
    }
}

fn check_uniques(lk: &mut Linker) {
    for si in 0..lk.cfg.strcts.len() {
        for ui in 0..lk.cfg.strcts[si].uniques.len() {
            let (fields, pos) = {
                let u = &lk.cfg.strcts[si].uniques[ui];
                (u.fields.clone(), u.pos.clone())
            };
            for name in fields {
                match lk.cfg.strcts[si].field_named(&name) {
                    Some((_, f)) if f.ftype == FieldType::Struct => {
                        lk.error(&pos, format!("unique field `{}` is a struct", name));
                    }
                    Some(_) => {}
                    None => lk.error(&pos, format!("unknown unique field `{}`", name)),
                }
            }
        }
    }
}

fn resolve_rolemaps(lk: &mut Linker, pending: &Pending) {
    if pending.rolemaps.is_empty() {
        return;
    }
    if !lk.cfg.roles_enabled() {
        let pos = pending.rolemaps[0].pos.clone();
        lk.error(&pos, "role map without a roles block");
        return;
    }

    for req in &pending.rolemaps {
        let mut roles: Vec<RoleId> = Vec::new();
        let mut bad = false;
        for name in &req.roles {
            match lk.cfg.find_role(name) {
                Some(r) => {
                    if !roles.contains(&r.id) {
                        roles.push(r.id);
                    }
                }
                None => {
                    lk.error(&req.pos, format!("unknown role `{}`", name));
                    bad = true;
                }
            }
        }
        if bad {
            continue;
        }

        let si = req.strct.0;
        match req.kind {
            RoleMapKind::All => {
                for qi in 0..lk.cfg.strcts[si].searches.len() {
                    let kind = query_map_kind(lk.cfg.strcts[si].searches[qi].kind);
                    merge(&mut lk.cfg.strcts[si].searches[qi].rolemap, kind, &roles);
                }
                for ui in 0..lk.cfg.strcts[si].updates.len() {
                    merge(
                        &mut lk.cfg.strcts[si].updates[ui].rolemap,
                        RoleMapKind::Update,
                        &roles,
                    );
                }
                for di in 0..lk.cfg.strcts[si].deletes.len() {
                    merge(
                        &mut lk.cfg.strcts[si].deletes[di].rolemap,
                        RoleMapKind::Delete,
                        &roles,
                    );
                }
                if let Some(ins) = lk.cfg.strcts[si].insert.as_mut() {
                    merge(&mut ins.rolemap, RoleMapKind::Insert, &roles);
                }
            }
            RoleMapKind::Insert => match lk.cfg.strcts[si].insert.as_mut() {
                Some(ins) => merge(&mut ins.rolemap, RoleMapKind::Insert, &roles),
                None => lk.error(&req.pos, "structure has no insert"),
            },
            RoleMapKind::Count | RoleMapKind::Search | RoleMapKind::List | RoleMapKind::Iterate => {
                let qkind = match req.kind {
                    RoleMapKind::Count => QueryKind::Count,
                    RoleMapKind::Search => QueryKind::Search,
                    RoleMapKind::List => QueryKind::List,
                    _ => QueryKind::Iterate,
                };
                let Some(target) = req.target.as_deref() else {
                    lk.error(&req.pos, "role map needs a named query");
                    continue;
                };
                let found = lk.cfg.strcts[si].searches.iter().position(|s| {
                    s.kind == qkind && s.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(target))
                });
                match found {
                    Some(qi) => merge(
                        &mut lk.cfg.strcts[si].searches[qi].rolemap,
                        req.kind,
                        &roles,
                    ),
                    None => lk.error(&req.pos, format!("unknown query `{}`", target)),
                }
            }
            RoleMapKind::Update | RoleMapKind::Delete => {
                let Some(target) = req.target.as_deref() else {
                    lk.error(&req.pos, "role map needs a named operation");
                    continue;
                };
                let list = if req.kind == RoleMapKind::Update {
                    &lk.cfg.strcts[si].updates
                } else {
                    &lk.cfg.strcts[si].deletes
                };
                let found = list
                    .iter()
                    .position(|u| u.name.as_deref().is_some_and(|n| n.eq_ignore_ascii_case(target)));
                match (found, req.kind) {
                    (Some(ui), RoleMapKind::Update) => merge(
                        &mut lk.cfg.strcts[si].updates[ui].rolemap,
                        req.kind,
                        &roles,
                    ),
                    (Some(ui), _) => merge(
                        &mut lk.cfg.strcts[si].deletes[ui].rolemap,
                        req.kind,
                        &roles,
                    ),
                    (None, _) => lk.error(&req.pos, format!("unknown operation `{}`", target)),
                }
            }
            RoleMapKind::Noexport => match req.target.as_deref() {
                Some(target) => match lk.cfg.strcts[si].field_named(target) {
                    Some((fi, _)) => merge(
                        &mut lk.cfg.strcts[si].fields[fi].rolemap,
                        RoleMapKind::Noexport,
                        &roles,
                    ),
                    None => lk.error(&req.pos, format!("unknown field `{}`", target)),
                },
                None => lk.cfg.strcts[si].noexports.push(RoleMap {
                    kind: RoleMapKind::Noexport,
                    roles: roles.clone(),
                }),
            },
        }
    }
}

fn query_map_kind(kind: QueryKind) -> RoleMapKind {
    match kind {
        QueryKind::Count => RoleMapKind::Count,
        QueryKind::Search => RoleMapKind::Search,
        QueryKind::List => RoleMapKind::List,
        QueryKind::Iterate => RoleMapKind::Iterate,
    }
}

fn merge(slot: &mut Option<RoleMap>, kind: RoleMapKind, roles: &[RoleId]) {
    match slot {
        Some(rm) => {
            for &r in roles {
                if !rm.roles.contains(&r) {
                    rm.roles.push(r);
                }
            }
        }
        None => {
            *slot = Some(RoleMap {
                kind,
                roles: roles.to_vec(),
            });
        }
    }
}

fn field_mut(cfg: &mut Config, id: FieldId) -> &mut crate::model::Field {
    &mut cfg.strcts[id.strct.0].fields[id.field]
}

fn field_ref(cfg: &Config, id: FieldId) -> &crate::model::Field {
    &cfg.strcts[id.strct.0].fields[id.field]
}

#[cfg(test)]
mod tests {
    use super::super::load_str;
    use crate::model::FieldType;

    #[test]
    fn test_link_references() {
        let cfg = load_str(
            "struct company { field id int rowid; field name text; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int actdel cascade;\
               field company struct companyid;\
             };",
            "t.rgn",
        )
        .unwrap();
        let user = cfg.find_strct("user").unwrap();
        let company = cfg.find_strct("company").unwrap();
        let fk = user.field_named("companyid").unwrap().1;
        let r = fk.reference.unwrap();
        assert_eq!(r.target.strct, company.id);
        let sf = user.field_named("company").unwrap().1;
        assert_eq!(sf.ftype, FieldType::Struct);
        assert_eq!(sf.reference.unwrap().target.strct, company.id);
        // The struct field borrows its sibling as reference source.
        assert_eq!(
            sf.reference.unwrap().source,
            crate::model::FieldId {
                strct: user.id,
                field: 1
            }
        );
    }

    #[test]
    fn test_link_dotted_chain() {
        let cfg = load_str(
            "struct company { field id int rowid; field name text; };\
             struct user {\
               field id int rowid;\
               field companyid:company.id int;\
               field company struct companyid;\
               list company.name eq: name byco;\
               search id: name byid distinct company;\
             };",
            "t.rgn",
        )
        .unwrap();
        let user = cfg.find_strct("user").unwrap();
        let company = cfg.find_strct("company").unwrap();
        let sent = &user.searches[0].sents[0];
        assert_eq!(sent.fname, "company.name");
        assert_eq!(sent.field.strct, company.id);
        let dst = user.searches[1].distinct.as_ref().unwrap();
        assert_eq!(dst.strct, company.id);
    }

    #[test]
    fn test_link_rejects_non_rowid_target() {
        let err = load_str(
            "struct company { field id int rowid; field name text; };\
             struct user { field id int rowid; field cname:company.name text; };",
            "t.rgn",
        )
        .unwrap_err();
        assert!(err
            .msgs
            .iter()
            .any(|m| m.text.contains("not a rowid")));
    }

    #[test]
    fn test_link_rejects_unknown_chain() {
        let err = load_str(
            "struct a { field id int rowid; search nosuch: name q; };",
            "t.rgn",
        )
        .unwrap_err();
        assert!(err.msgs.iter().any(|m| m.text.contains("unknown field")));
    }

    #[test]
    fn test_link_rolemap_all() {
        let cfg = load_str(
            "roles { role admin; };\
             struct a {\
               field id int rowid;\
               search id: name byid;\
               delete id: name rm;\
               insert;\
               roles admin { all; };\
             };",
            "t.rgn",
        )
        .unwrap();
        let st = cfg.find_strct("a").unwrap();
        let admin = cfg.find_role("admin").unwrap().id;
        assert_eq!(st.searches[0].rolemap.as_ref().unwrap().roles, vec![admin]);
        assert_eq!(st.deletes[0].rolemap.as_ref().unwrap().roles, vec![admin]);
        assert_eq!(
            st.insert.as_ref().unwrap().rolemap.as_ref().unwrap().roles,
            vec![admin]
        );
    }
}
