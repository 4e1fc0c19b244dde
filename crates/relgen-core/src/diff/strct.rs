//! Structure-level diffing: fields, queries, updates, inserts, uniques.

use super::{comment_eq, rolemap_eq, Ctx, Diff, DiffQueue, Pair};
use crate::model::{Config, DefaultValue, Field, Ord, Search, Sent, Strct, Unique, Update, Uref};

pub(super) fn diff_strcts<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>) {
    for sinto in &ctx.into.strcts {
        match ctx.from.find_strct(&sinto.name) {
            None => q.push(Diff::AddStrct(sinto)),
            Some(sfrom) => diff_strct(q, ctx, sfrom, sinto),
        }
    }
    for sfrom in &ctx.from.strcts {
        if ctx.into.find_strct(&sfrom.name).is_none() {
            q.push(Diff::DelStrct(sfrom));
        }
    }
}

fn diff_strct<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, sfrom: &'a Strct, sinto: &'a Strct) {
    let mut changed = false;

    if !diff_searchq(q, ctx, sfrom, sinto) {
        changed = true;
    }
    if !diff_updateq(q, ctx, &sfrom.updates, &sinto.updates) {
        changed = true;
    }
    if !diff_updateq(q, ctx, &sfrom.deletes, &sinto.deletes) {
        changed = true;
    }
    if !diff_insert(q, ctx, sfrom, sinto) {
        changed = true;
    }
    if !diff_fields(q, ctx, sfrom, sinto) {
        changed = true;
    }

    for u in &sinto.uniques {
        if !has_unique(u, sfrom) {
            q.push(Diff::AddUnique(u));
            changed = true;
        }
    }
    for u in &sfrom.uniques {
        if !has_unique(u, sinto) {
            q.push(Diff::DelUnique(u));
            changed = true;
        }
    }

    let pair = Pair::new(sfrom, sinto);
    if !comment_eq(sfrom.doc.as_deref(), sinto.doc.as_deref()) {
        q.push(Diff::ModStrctComment(pair));
        changed = true;
    }

    q.push(if changed {
        Diff::ModStrct(pair)
    } else {
        Diff::SameStrct(pair)
    });
}

/// Unordered clause equality: some clause of `strct` has the same
/// member count and contains every member of `u` by field name.
fn has_unique(u: &Unique, strct: &Strct) -> bool {
    strct.uniques.iter().any(|ou| {
        ou.fields.len() == u.fields.len()
            && u.fields
                .iter()
                .all(|nf| ou.fields.iter().any(|of| of.eq_ignore_ascii_case(nf)))
    })
}

// ============================================================================
// Queries
// ============================================================================

/// Returns true when the query sets are similar.
fn diff_searchq<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, sfrom: &'a Strct, sinto: &'a Strct) -> bool {
    let mut similar = true;

    // Named queries can modify; match by name and kind.
    for qfrom in sfrom.searches.iter().filter(|s| s.name.is_some()) {
        let found = sinto.searches.iter().find(|s| {
            s.name.is_some()
                && s.kind == qfrom.kind
                && s.name
                    .as_deref()
                    .unwrap()
                    .eq_ignore_ascii_case(qfrom.name.as_deref().unwrap())
        });
        let Some(qinto) = found else {
            q.push(Diff::DelSearch(qfrom));
            similar = false;
            continue;
        };
        let pair = Pair::new(qfrom, qinto);
        if diff_search(q, true, ctx, qfrom, qinto) {
            q.push(Diff::SameSearch(pair));
        } else {
            q.push(Diff::ModSearch(pair));
            similar = false;
        }
    }
    for qinto in sinto.searches.iter().filter(|s| s.name.is_some()) {
        let found = sfrom.searches.iter().any(|s| {
            s.name.is_some()
                && s.kind == qinto.kind
                && s.name
                    .as_deref()
                    .unwrap()
                    .eq_ignore_ascii_case(qinto.name.as_deref().unwrap())
        });
        if !found {
            q.push(Diff::AddSearch(qinto));
            similar = false;
        }
    }

    // Unnamed queries only match whole: added, deleted, or the same.
    for qfrom in sfrom.searches.iter().filter(|s| s.name.is_none()) {
        let found = sinto.searches.iter().any(|s| {
            s.name.is_none() && s.kind == qfrom.kind && diff_search(q, false, ctx, qfrom, s)
        });
        if !found {
            q.push(Diff::DelSearch(qfrom));
            similar = false;
        }
    }
    for qinto in sinto.searches.iter().filter(|s| s.name.is_none()) {
        let found = sfrom.searches.iter().any(|s| {
            s.name.is_none() && s.kind == qinto.kind && diff_search(q, false, ctx, s, qinto)
        });
        if !found {
            q.push(Diff::AddSearch(qinto));
            similar = false;
        }
    }

    similar
}

/// Order-preserving sent-clause equality on `(fname, op)`, both
/// sequences consumed together.
fn sentq_eq(from: &[Sent], into: &[Sent]) -> bool {
    from.len() == into.len()
        && from
            .iter()
            .zip(into)
            .all(|(f, i)| f.op == i.op && f.fname == i.fname)
}

/// Order-preserving order-clause equality on `(fname, direction)`.
fn ordq_eq(from: &[Ord], into: &[Ord]) -> bool {
    from.len() == into.len()
        && from
            .iter()
            .zip(into)
            .all(|(f, i)| f.op == i.op && f.fname == i.fname)
}

/// Compare two queries; with `emit`, push a fine-grained entry per
/// differing attribute. Returns true when similar.
fn diff_search<'a>(
    q: &mut DiffQueue<'a>,
    emit: bool,
    ctx: &Ctx<'a>,
    from: &'a Search,
    into: &'a Search,
) -> bool {
    let pair = Pair::new(from, into);
    let mut similar = true;
    let mut record = |q: &mut DiffQueue<'a>, d: Diff<'a>| {
        if emit {
            q.push(d);
        }
    };

    if !sentq_eq(&from.sents, &into.sents) {
        record(q, Diff::ModSearchParams(pair));
        similar = false;
    }
    if !ordq_eq(&from.ords, &into.ords) {
        record(q, Diff::ModSearchOrder(pair));
        similar = false;
    }

    let aggr_eq = match (&from.aggr, &into.aggr) {
        (None, None) => true,
        (Some(f), Some(i)) => f.op == i.op && f.fname == i.fname,
        _ => false,
    };
    if !aggr_eq {
        record(q, Diff::ModSearchAggr(pair));
        similar = false;
    }

    let group_eq = match (&from.group, &into.group) {
        (None, None) => true,
        (Some(f), Some(i)) => f.fname == i.fname,
        _ => false,
    };
    if !group_eq {
        record(q, Diff::ModSearchGroup(pair));
        similar = false;
    }

    let dst_eq = match (&from.distinct, &into.distinct) {
        (None, None) => true,
        (Some(f), Some(i)) => f.fname == i.fname,
        _ => false,
    };
    if !dst_eq {
        record(q, Diff::ModSearchDistinct(pair));
        similar = false;
    }

    if !comment_eq(from.doc.as_deref(), into.doc.as_deref()) {
        record(q, Diff::ModSearchComment(pair));
        similar = false;
    }
    if from.limit != into.limit {
        record(q, Diff::ModSearchLimit(pair));
        similar = false;
    }
    if from.offset != into.offset {
        record(q, Diff::ModSearchOffset(pair));
        similar = false;
    }
    if !rolemap_eq(ctx, from.rolemap.as_ref(), into.rolemap.as_ref()) {
        record(q, Diff::ModSearchRolemap(pair));
        similar = false;
    }

    similar
}

// ============================================================================
// Updates and deletes
// ============================================================================

fn uref_eq(from: &Uref, into: &Uref) -> bool {
    from.field.eq_ignore_ascii_case(&into.field)
        && from.op == into.op
        && from.modifier == into.modifier
}

/// Order-preserving reference-list equality; leftover entries on either
/// side make the lists dissimilar. With `emit`, a params entry is
/// pushed on mismatch.
fn diff_urefq<'a>(
    q: &mut DiffQueue<'a>,
    emit: bool,
    pair: Pair<'a, Update>,
    from: &[Uref],
    into: &[Uref],
) -> bool {
    let similar =
        from.len() == into.len() && from.iter().zip(into).all(|(f, i)| uref_eq(f, i));
    if !similar && emit {
        q.push(Diff::ModUpdateParams(pair));
    }
    similar
}

/// Compare two update operations; with `emit`, push fine-grained
/// entries. Returns true when similar.
fn diff_update<'a>(
    q: &mut DiffQueue<'a>,
    emit: bool,
    ctx: &Ctx<'a>,
    from: &'a Update,
    into: &'a Update,
) -> bool {
    let pair = Pair::new(from, into);
    let mut similar = true;

    if !diff_urefq(q, emit, pair, &from.mrq, &into.mrq) {
        similar = false;
    }
    if !diff_urefq(q, emit, pair, &from.crq, &into.crq) {
        similar = false;
    }

    if !comment_eq(from.doc.as_deref(), into.doc.as_deref()) {
        if emit {
            q.push(Diff::ModUpdateComment(pair));
        }
        similar = false;
    }
    if !rolemap_eq(ctx, from.rolemap.as_ref(), into.rolemap.as_ref()) {
        if emit {
            q.push(Diff::ModUpdateRolemap(pair));
        }
        similar = false;
    }
    if from.all != into.all {
        if emit {
            q.push(Diff::ModUpdateFlags(pair));
        }
        similar = false;
    }

    similar
}

/// Returns true when the operation sets are similar.
fn diff_updateq<'a>(
    q: &mut DiffQueue<'a>,
    ctx: &Ctx<'a>,
    fromq: &'a [Update],
    intoq: &'a [Update],
) -> bool {
    let mut similar = true;

    // Named operations can modify.
    for ufrom in fromq.iter().filter(|u| u.name.is_some()) {
        let found = intoq.iter().find(|u| {
            u.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(ufrom.name.as_deref().unwrap()))
        });
        let Some(uinto) = found else {
            q.push(Diff::DelUpdate(ufrom));
            similar = false;
            continue;
        };
        let pair = Pair::new(ufrom, uinto);
        if diff_update(q, true, ctx, ufrom, uinto) {
            q.push(Diff::SameUpdate(pair));
        } else {
            q.push(Diff::ModUpdate(pair));
            similar = false;
        }
    }
    for uinto in intoq.iter().filter(|u| u.name.is_some()) {
        let found = fromq.iter().any(|u| {
            u.name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(uinto.name.as_deref().unwrap()))
        });
        if !found {
            q.push(Diff::AddUpdate(uinto));
            similar = false;
        }
    }

    // Unnamed operations match whole: added, deleted, or the same.
    for ufrom in fromq.iter().filter(|u| u.name.is_none()) {
        let found = intoq
            .iter()
            .find(|&u| u.name.is_none() && diff_update(q, false, ctx, ufrom, u));
        match found {
            Some(uinto) => q.push(Diff::SameUpdate(Pair::new(ufrom, uinto))),
            None => {
                q.push(Diff::DelUpdate(ufrom));
                similar = false;
            }
        }
    }
    for uinto in intoq.iter().filter(|u| u.name.is_none()) {
        let found = fromq
            .iter()
            .any(|u| u.name.is_none() && diff_update(q, false, ctx, u, uinto));
        if !found {
            q.push(Diff::AddUpdate(uinto));
            similar = false;
        }
    }

    similar
}

// ============================================================================
// Insert
// ============================================================================

/// Returns true when the insert declarations are similar.
fn diff_insert<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, sfrom: &'a Strct, sinto: &'a Strct) -> bool {
    match (&sfrom.insert, &sinto.insert) {
        (None, None) => true,
        (None, Some(_)) => {
            q.push(Diff::AddInsert(sinto));
            false
        }
        (Some(_), None) => {
            q.push(Diff::DelInsert(sfrom));
            false
        }
        (Some(fins), Some(iins)) => {
            let pair = Pair::new(sfrom, sinto);
            if rolemap_eq(ctx, fins.rolemap.as_ref(), iins.rolemap.as_ref()) {
                q.push(Diff::SameInsert(pair));
                true
            } else {
                q.push(Diff::ModInsertRolemap(pair));
                q.push(Diff::ModInsert(pair));
                false
            }
        }
    }
}

// ============================================================================
// Fields
// ============================================================================

/// Returns true when the field sets are similar.
fn diff_fields<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, sfrom: &'a Strct, sinto: &'a Strct) -> bool {
    let mut similar = true;

    for finto in &sinto.fields {
        match sfrom
            .fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(&finto.name))
        {
            None => {
                q.push(Diff::AddField(finto));
                similar = false;
            }
            Some(ffrom) => {
                if !diff_field(q, ctx, ffrom, finto) {
                    similar = false;
                }
            }
        }
    }
    for ffrom in &sfrom.fields {
        if !sinto
            .fields
            .iter()
            .any(|f| f.name.eq_ignore_ascii_case(&ffrom.name))
        {
            q.push(Diff::DelField(ffrom));
            similar = false;
        }
    }

    similar
}

fn binding_name(cfg: &Config, field: &Field) -> (Option<String>, Option<String>) {
    (
        field.bitf.map(|b| cfg.bitf(b).name.clone()),
        field.enm.map(|e| cfg.enm(e).name.clone()),
    )
}

/// Defaults compare only when both are present and the types match.
fn default_eq(ctx: &Ctx, ffrom: &Field, finto: &Field) -> bool {
    let (Some(df), Some(di)) = (&ffrom.def, &finto.def) else {
        return true;
    };
    if ffrom.ftype != finto.ftype {
        return true;
    }
    match (df, di) {
        (DefaultValue::Integer(a), DefaultValue::Integer(b)) => a == b,
        (DefaultValue::Decimal(a), DefaultValue::Decimal(b)) => a == b,
        (DefaultValue::String(a), DefaultValue::String(b)) => a == b,
        (DefaultValue::Enum(a), DefaultValue::Enum(b)) => {
            let ea = ctx.from.enm(a.enm);
            let eb = ctx.into.enm(b.enm);
            ea.name.eq_ignore_ascii_case(&eb.name)
                && ea.items[a.item]
                    .name
                    .eq_ignore_ascii_case(&eb.items[b.item].name)
        }
        _ => false,
    }
}

/// Reference equality by presence plus source and target names.
fn reference_eq(ctx: &Ctx, ffrom: &Field, finto: &Field) -> bool {
    match (&ffrom.reference, &finto.reference) {
        (None, None) => true,
        (Some(rf), Some(ri)) => {
            let sf = ctx.from.field(rf.source);
            let si = ctx.into.field(ri.source);
            let tf = ctx.from.field(rf.target);
            let ti = ctx.into.field(ri.target);
            ctx.from
                .strct(rf.source.strct)
                .name
                .eq_ignore_ascii_case(&ctx.into.strct(ri.source.strct).name)
                && sf.name.eq_ignore_ascii_case(&si.name)
                && ctx
                    .from
                    .strct(rf.target.strct)
                    .name
                    .eq_ignore_ascii_case(&ctx.into.strct(ri.target.strct).name)
                && tf.name.eq_ignore_ascii_case(&ti.name)
        }
        _ => false,
    }
}

/// Unordered validation-queue equality; queues under differing field
/// types only compare equal when empty.
fn valids_eq(ffrom: &Field, finto: &Field) -> bool {
    if ffrom.valids.len() != finto.valids.len() {
        return false;
    }
    if ffrom.ftype != finto.ftype && !finto.valids.is_empty() {
        return false;
    }
    ffrom
        .valids
        .iter()
        .all(|vf| finto.valids.iter().any(|vi| vf == vi))
}

/// Compare one matched field pair, emitting fine-grained entries and
/// the coarse entry. Returns true when similar.
fn diff_field<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, ffrom: &'a Field, finto: &'a Field) -> bool {
    let pair = Pair::new(ffrom, finto);
    let mut similar = true;

    if !rolemap_eq(ctx, ffrom.rolemap.as_ref(), finto.rolemap.as_ref()) {
        q.push(Diff::ModFieldRolemap(pair));
        similar = false;
    }
    if ffrom.ftype != finto.ftype {
        q.push(Diff::ModFieldType(pair));
        similar = false;
    }
    if ffrom.actdel != finto.actdel || ffrom.actup != finto.actup {
        q.push(Diff::ModFieldActions(pair));
        similar = false;
    }
    if ffrom.flags() != finto.flags() {
        q.push(Diff::ModFieldFlags(pair));
        similar = false;
    }

    let (bf_from, enm_from) = binding_name(ctx.from, ffrom);
    let (bf_into, enm_into) = binding_name(ctx.into, finto);
    if let (Some(a), Some(b)) = (&bf_from, &bf_into) {
        if !a.eq_ignore_ascii_case(b) {
            q.push(Diff::ModFieldBitf(pair));
            similar = false;
        }
    }
    if let (Some(a), Some(b)) = (&enm_from, &enm_into) {
        if !a.eq_ignore_ascii_case(b) {
            q.push(Diff::ModFieldEnm(pair));
            similar = false;
        }
    }

    if !default_eq(ctx, ffrom, finto) {
        q.push(Diff::ModFieldDef(pair));
        similar = false;
    }
    if !reference_eq(ctx, ffrom, finto) {
        q.push(Diff::ModFieldReference(pair));
        similar = false;
    }
    if !valids_eq(ffrom, finto) {
        q.push(Diff::ModFieldValids(pair));
        similar = false;
    }
    if !comment_eq(ffrom.doc.as_deref(), finto.doc.as_deref()) {
        q.push(Diff::ModFieldComment(pair));
        similar = false;
    }

    q.push(if similar {
        Diff::SameField(pair)
    } else {
        Diff::ModField(pair)
    });
    similar
}
