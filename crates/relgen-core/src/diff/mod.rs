//! Structural diff between two models.
//!
//! [`diff`] compares a `from` and an `into` configuration and produces
//! a flat, ordered queue of typed entries: coarse
//! add/delete/modify/same entries per entity, with attribute-granular
//! modification entries emitted before the coarse entry that owns them.
//! Matching is by case-insensitive name throughout; traversal follows
//! declaration order, so equal inputs always produce identical queues.
//!
//! Queue entries borrow both models; the models must outlive the queue.

mod strct;

use crate::model::{
    BitIndex, Bitf, Config, Enum, EnumItem, Field, Label, Role, RoleMap, Search, Strct, Unique,
    Update,
};
use tracing::debug;

/// A matched pair of entities, one from each model.
#[derive(Debug)]
pub struct Pair<'a, T> {
    pub from: &'a T,
    pub into: &'a T,
}

impl<'a, T> Clone for Pair<'a, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<'a, T> Copy for Pair<'a, T> {}

impl<'a, T> Pair<'a, T> {
    fn new(from: &'a T, into: &'a T) -> Self {
        Self { from, into }
    }
}

/// One entry of the diff queue.
///
/// `Add*` entries borrow from the `into` model, `Del*` entries from the
/// `from` model, and pair entries from both.
#[derive(Debug, Clone, Copy)]
pub enum Diff<'a> {
    AddBitf(&'a Bitf),
    AddBitidx(&'a BitIndex),
    AddEitem(&'a EnumItem),
    AddEnm(&'a Enum),
    AddField(&'a Field),
    AddInsert(&'a Strct),
    AddRole(&'a Role),
    AddRoles(&'a Role),
    AddSearch(&'a Search),
    AddStrct(&'a Strct),
    AddUnique(&'a Unique),
    AddUpdate(&'a Update),
    DelBitf(&'a Bitf),
    DelBitidx(&'a BitIndex),
    DelEitem(&'a EnumItem),
    DelEnm(&'a Enum),
    DelField(&'a Field),
    DelInsert(&'a Strct),
    DelRole(&'a Role),
    DelRoles(&'a Role),
    DelSearch(&'a Search),
    DelStrct(&'a Strct),
    DelUnique(&'a Unique),
    DelUpdate(&'a Update),
    ModBitf(Pair<'a, Bitf>),
    ModBitfComment(Pair<'a, Bitf>),
    ModBitfLabels(Pair<'a, Bitf>),
    ModBitidx(Pair<'a, BitIndex>),
    ModBitidxComment(Pair<'a, BitIndex>),
    ModBitidxLabels(Pair<'a, BitIndex>),
    ModBitidxValue(Pair<'a, BitIndex>),
    ModEitem(Pair<'a, EnumItem>),
    ModEitemComment(Pair<'a, EnumItem>),
    ModEitemLabels(Pair<'a, EnumItem>),
    ModEitemValue(Pair<'a, EnumItem>),
    ModEnm(Pair<'a, Enum>),
    ModEnmComment(Pair<'a, Enum>),
    ModEnmLabels(Pair<'a, Enum>),
    ModField(Pair<'a, Field>),
    ModFieldActions(Pair<'a, Field>),
    ModFieldBitf(Pair<'a, Field>),
    ModFieldComment(Pair<'a, Field>),
    ModFieldDef(Pair<'a, Field>),
    ModFieldEnm(Pair<'a, Field>),
    ModFieldFlags(Pair<'a, Field>),
    ModFieldReference(Pair<'a, Field>),
    ModFieldRolemap(Pair<'a, Field>),
    ModFieldType(Pair<'a, Field>),
    ModFieldValids(Pair<'a, Field>),
    ModInsert(Pair<'a, Strct>),
    ModInsertRolemap(Pair<'a, Strct>),
    ModRole(Pair<'a, Role>),
    ModRoleChildren(Pair<'a, Role>),
    ModRoleComment(Pair<'a, Role>),
    ModRoleParent(Pair<'a, Role>),
    ModRoles(Pair<'a, Role>),
    ModSearch(Pair<'a, Search>),
    ModSearchAggr(Pair<'a, Search>),
    ModSearchComment(Pair<'a, Search>),
    ModSearchDistinct(Pair<'a, Search>),
    ModSearchGroup(Pair<'a, Search>),
    ModSearchLimit(Pair<'a, Search>),
    ModSearchOffset(Pair<'a, Search>),
    ModSearchOrder(Pair<'a, Search>),
    ModSearchParams(Pair<'a, Search>),
    ModSearchRolemap(Pair<'a, Search>),
    ModStrct(Pair<'a, Strct>),
    ModStrctComment(Pair<'a, Strct>),
    ModUpdate(Pair<'a, Update>),
    ModUpdateComment(Pair<'a, Update>),
    ModUpdateFlags(Pair<'a, Update>),
    ModUpdateParams(Pair<'a, Update>),
    ModUpdateRolemap(Pair<'a, Update>),
    SameBitf(Pair<'a, Bitf>),
    SameBitidx(Pair<'a, BitIndex>),
    SameEitem(Pair<'a, EnumItem>),
    SameEnm(Pair<'a, Enum>),
    SameField(Pair<'a, Field>),
    SameInsert(Pair<'a, Strct>),
    SameRole(Pair<'a, Role>),
    SameRoles(Pair<'a, Role>),
    SameSearch(Pair<'a, Search>),
    SameStrct(Pair<'a, Strct>),
    SameUpdate(Pair<'a, Update>),
}

impl<'a> Diff<'a> {
    /// Whether this is a `Same*` correlation marker.
    pub fn is_same(&self) -> bool {
        matches!(
            self,
            Diff::SameBitf(_)
                | Diff::SameBitidx(_)
                | Diff::SameEitem(_)
                | Diff::SameEnm(_)
                | Diff::SameField(_)
                | Diff::SameInsert(_)
                | Diff::SameRole(_)
                | Diff::SameRoles(_)
                | Diff::SameSearch(_)
                | Diff::SameStrct(_)
                | Diff::SameUpdate(_)
        )
    }
}

/// Ordered diff queue.
pub type DiffQueue<'a> = Vec<Diff<'a>>;

/// Both models, for resolving ids to names during comparison.
pub(crate) struct Ctx<'a> {
    pub from: &'a Config,
    pub into: &'a Config,
}

/// Compare two configurations: enumerations, bitfields, structures,
/// then roles.
pub fn diff<'a>(from: &'a Config, into: &'a Config) -> DiffQueue<'a> {
    let ctx = Ctx { from, into };
    let mut q = Vec::new();

    diff_enums(&mut q, &ctx);
    diff_bitfs(&mut q, &ctx);
    strct::diff_strcts(&mut q, &ctx);
    diff_roles(&mut q, &ctx);

    debug!(entries = q.len(), "built diff queue");
    q
}

// ============================================================================
// Shared comparisons
// ============================================================================

/// Both absent, or both present with equal text.
pub(crate) fn comment_eq(from: Option<&str>, into: Option<&str>) -> bool {
    from == into
}

/// Same number of labels and every `from` label present in `into`, with
/// languages compared by name and text compared exactly.
pub(crate) fn labels_eq(ctx: &Ctx, from: &[Label], into: &[Label]) -> bool {
    if from.len() != into.len() {
        return false;
    }
    from.iter().all(|lf| {
        into.iter().any(|li| {
            ctx.from.langs[lf.lang] == ctx.into.langs[li.lang] && lf.text == li.text
        })
    })
}

/// Both absent, or both present with the same number of roles and every
/// `from` role name present in the `into` set.
pub(crate) fn rolemap_eq(ctx: &Ctx, from: Option<&RoleMap>, into: Option<&RoleMap>) -> bool {
    match (from, into) {
        (None, None) => true,
        (Some(f), Some(i)) => {
            f.roles.len() == i.roles.len()
                && f.roles.iter().all(|&fr| {
                    i.roles.iter().any(|&ir| {
                        ctx.into
                            .role(ir)
                            .name
                            .eq_ignore_ascii_case(&ctx.from.role(fr).name)
                    })
                })
        }
        _ => false,
    }
}

// ============================================================================
// Enumerations
// ============================================================================

fn diff_enums<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>) {
    for einto in &ctx.into.enums {
        match ctx.from.find_enum(&einto.name) {
            None => q.push(Diff::AddEnm(einto)),
            Some(efrom) => diff_enm(q, ctx, efrom, einto),
        }
    }
    for efrom in &ctx.from.enums {
        if ctx.into.find_enum(&efrom.name).is_none() {
            q.push(Diff::DelEnm(efrom));
        }
    }
}

fn diff_enm<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, efrom: &'a Enum, einto: &'a Enum) {
    let mut changed = false;

    for iinto in &einto.items {
        let ifrom = efrom
            .items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(&iinto.name));
        if diff_eitem(q, ctx, ifrom, iinto) {
            changed = true;
        }
    }
    for ifrom in &efrom.items {
        if !einto
            .items
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&ifrom.name))
        {
            q.push(Diff::DelEitem(ifrom));
            changed = true;
        }
    }

    let pair = Pair::new(efrom, einto);
    if !comment_eq(efrom.doc.as_deref(), einto.doc.as_deref()) {
        q.push(Diff::ModEnmComment(pair));
        changed = true;
    }
    if !labels_eq(ctx, &efrom.labels_null, &einto.labels_null) {
        q.push(Diff::ModEnmLabels(pair));
        changed = true;
    }

    q.push(if changed {
        Diff::ModEnm(pair)
    } else {
        Diff::SameEnm(pair)
    });
}

/// Returns true if the item was added or modified.
fn diff_eitem<'a>(
    q: &mut DiffQueue<'a>,
    ctx: &Ctx<'a>,
    ifrom: Option<&'a EnumItem>,
    iinto: &'a EnumItem,
) -> bool {
    let Some(ifrom) = ifrom else {
        q.push(Diff::AddEitem(iinto));
        return true;
    };

    let pair = Pair::new(ifrom, iinto);
    let mut changed = false;
    if ifrom.value != iinto.value {
        q.push(Diff::ModEitemValue(pair));
        changed = true;
    }
    if !comment_eq(ifrom.doc.as_deref(), iinto.doc.as_deref()) {
        q.push(Diff::ModEitemComment(pair));
        changed = true;
    }
    if !labels_eq(ctx, &ifrom.labels, &iinto.labels) {
        q.push(Diff::ModEitemLabels(pair));
        changed = true;
    }

    q.push(if changed {
        Diff::ModEitem(pair)
    } else {
        Diff::SameEitem(pair)
    });
    changed
}

// ============================================================================
// Bitfields
// ============================================================================

fn diff_bitfs<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>) {
    for binto in &ctx.into.bitfs {
        match ctx.from.find_bitf(&binto.name) {
            None => q.push(Diff::AddBitf(binto)),
            Some(bfrom) => diff_bitf(q, ctx, bfrom, binto),
        }
    }
    for bfrom in &ctx.from.bitfs {
        if ctx.into.find_bitf(&bfrom.name).is_none() {
            q.push(Diff::DelBitf(bfrom));
        }
    }
}

fn diff_bitf<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, bfrom: &'a Bitf, binto: &'a Bitf) {
    let mut changed = false;

    for iinto in &binto.items {
        let ifrom = bfrom
            .items
            .iter()
            .find(|i| i.name.eq_ignore_ascii_case(&iinto.name));
        if diff_bitidx(q, ctx, ifrom, iinto) {
            changed = true;
        }
    }
    for ifrom in &bfrom.items {
        if !binto
            .items
            .iter()
            .any(|i| i.name.eq_ignore_ascii_case(&ifrom.name))
        {
            q.push(Diff::DelBitidx(ifrom));
            changed = true;
        }
    }

    let pair = Pair::new(bfrom, binto);
    if !comment_eq(bfrom.doc.as_deref(), binto.doc.as_deref()) {
        q.push(Diff::ModBitfComment(pair));
        changed = true;
    }
    if !labels_eq(ctx, &bfrom.labels_unset, &binto.labels_unset)
        || !labels_eq(ctx, &bfrom.labels_null, &binto.labels_null)
    {
        q.push(Diff::ModBitfLabels(pair));
        changed = true;
    }

    q.push(if changed {
        Diff::ModBitf(pair)
    } else {
        Diff::SameBitf(pair)
    });
}

/// Returns true if the index was added or modified.
fn diff_bitidx<'a>(
    q: &mut DiffQueue<'a>,
    ctx: &Ctx<'a>,
    ifrom: Option<&'a BitIndex>,
    iinto: &'a BitIndex,
) -> bool {
    let Some(ifrom) = ifrom else {
        q.push(Diff::AddBitidx(iinto));
        return true;
    };

    let pair = Pair::new(ifrom, iinto);
    let mut changed = false;
    if ifrom.value != iinto.value {
        q.push(Diff::ModBitidxValue(pair));
        changed = true;
    }
    if !labels_eq(ctx, &ifrom.labels, &iinto.labels) {
        q.push(Diff::ModBitidxLabels(pair));
        changed = true;
    }
    if !comment_eq(ifrom.doc.as_deref(), iinto.doc.as_deref()) {
        q.push(Diff::ModBitidxComment(pair));
        changed = true;
    }

    q.push(if changed {
        Diff::ModBitidx(pair)
    } else {
        Diff::SameBitidx(pair)
    });
    changed
}

// ============================================================================
// Roles
// ============================================================================

fn diff_roles<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>) {
    let from_roles = &ctx.from.roles;
    let into_roles = &ctx.into.roles;

    if from_roles.is_empty() && into_roles.is_empty() {
        return;
    }
    if from_roles.is_empty() {
        q.push(Diff::AddRoles(&into_roles[0]));
        return;
    }
    if into_roles.is_empty() {
        q.push(Diff::DelRoles(&from_roles[0]));
        return;
    }

    let similar = diff_roleq(q, ctx);
    let pair = Pair::new(&from_roles[0], &into_roles[0]);
    q.push(if similar {
        Diff::SameRoles(pair)
    } else {
        Diff::ModRoles(pair)
    });
}

fn diff_roleq<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>) -> bool {
    let mut similar = true;

    for rfrom in &ctx.from.roles {
        let Some(rinto) = ctx.into.find_role(&rfrom.name) else {
            q.push(Diff::DelRole(rfrom));
            similar = false;
            continue;
        };
        // Virtual roles are fixed by the language and never modified.
        if rfrom.parent.is_none() {
            continue;
        }
        let pair = Pair::new(rfrom, rinto);
        if diff_role(q, ctx, rfrom, rinto) {
            q.push(Diff::SameRole(pair));
        } else {
            q.push(Diff::ModRole(pair));
            similar = false;
        }
    }

    for rinto in &ctx.into.roles {
        if ctx.from.find_role(&rinto.name).is_none() {
            q.push(Diff::AddRole(rinto));
            similar = false;
        }
    }

    similar
}

/// Returns true when the two roles are similar.
fn diff_role<'a>(q: &mut DiffQueue<'a>, ctx: &Ctx<'a>, rfrom: &'a Role, rinto: &'a Role) -> bool {
    let pair = Pair::new(rfrom, rinto);
    let mut similar = true;

    if let (Some(pf), Some(pi)) = (rfrom.parent, rinto.parent) {
        if !ctx
            .from
            .role(pf)
            .name
            .eq_ignore_ascii_case(&ctx.into.role(pi).name)
        {
            q.push(Diff::ModRoleParent(pair));
            similar = false;
        }
    }

    if !comment_eq(rfrom.doc.as_deref(), rinto.doc.as_deref()) {
        q.push(Diff::ModRoleComment(pair));
        similar = false;
    }

    if rfrom.children.len() != rinto.children.len() {
        q.push(Diff::ModRoleChildren(pair));
        similar = false;
    } else {
        let missing = rfrom.children.iter().any(|&cf| {
            !rinto.children.iter().any(|&ci| {
                ctx.into
                    .role(ci)
                    .name
                    .eq_ignore_ascii_case(&ctx.from.role(cf).name)
            })
        });
        if missing {
            q.push(Diff::ModRoleChildren(pair));
            similar = false;
        }
    }

    similar
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::load_str;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_diff_reflexive() {
        let src = "enum status { item ok 0; item bad 1; };\
                   bits flags { item a 0; item b 1; };\
                   roles { role admin { role auditor; }; };\
                   struct a {\
                     field id int rowid;\
                     field s enum status;\
                     search id: name byid;\
                     insert;\
                     roles admin { all; };\
                   };";
        let from = load_str(src, "a.rgn").unwrap();
        let into = load_str(src, "b.rgn").unwrap();
        let q = diff(&from, &into);
        assert!(!q.is_empty());
        assert!(q.iter().all(|d| d.is_same()));
    }

    #[test]
    fn test_diff_enum_add_del_mod() {
        let from = load_str(
            "enum a { item x 0; item gone 1; };\
             enum dead { item x 0; };\
             struct s { field id int rowid; };",
            "a.rgn",
        )
        .unwrap();
        let into = load_str(
            "enum a { item x 2; item fresh 1; };\
             enum born { item x 0; };\
             struct s { field id int rowid; };",
            "b.rgn",
        )
        .unwrap();
        let q = diff(&from, &into);
        assert!(q.iter().any(|d| matches!(d, Diff::ModEitemValue(_))));
        assert!(q.iter().any(|d| matches!(d, Diff::AddEitem(i) if i.name == "fresh")));
        assert!(q.iter().any(|d| matches!(d, Diff::DelEitem(i) if i.name == "gone")));
        assert!(q.iter().any(|d| matches!(d, Diff::ModEnm(_))));
        assert!(q.iter().any(|d| matches!(d, Diff::AddEnm(e) if e.name == "born")));
        assert!(q.iter().any(|d| matches!(d, Diff::DelEnm(e) if e.name == "dead")));
    }

    #[test]
    fn test_diff_enum_label_change() {
        let from = load_str(
            "enum a { item x 0 jslabel \"Ex\"; }; struct s { field id int rowid; };",
            "a.rgn",
        )
        .unwrap();
        let into = load_str(
            "enum a { item x 0 jslabel \"Why\"; }; struct s { field id int rowid; };",
            "b.rgn",
        )
        .unwrap();
        let q = diff(&from, &into);
        assert!(q.iter().any(|d| matches!(d, Diff::ModEitemLabels(_))));
        assert!(q.iter().any(|d| matches!(d, Diff::ModEitem(_))));
    }

    #[test]
    fn test_diff_add_symmetry() {
        let a = load_str("struct s { field id int rowid; };", "a.rgn").unwrap();
        let b = load_str(
            "struct s { field id int rowid; };\
             struct t { field id int rowid; };",
            "b.rgn",
        )
        .unwrap();
        let fwd = diff(&a, &b);
        let bwd = diff(&b, &a);
        assert!(fwd.iter().any(|d| matches!(d, Diff::AddStrct(s) if s.name == "t")));
        assert!(bwd.iter().any(|d| matches!(d, Diff::DelStrct(s) if s.name == "t")));
        assert_eq!(
            fwd.iter().filter(|d| !d.is_same()).count(),
            bwd.iter().filter(|d| !d.is_same()).count()
        );
    }

    #[test]
    fn test_diff_roles() {
        let from = load_str(
            "roles { role a { role child; }; role doomed; };\
             struct s { field id int rowid; };",
            "a.rgn",
        )
        .unwrap();
        let into = load_str(
            "roles { role a; role newcomer; };\
             struct s { field id int rowid; };",
            "b.rgn",
        )
        .unwrap();
        let q = diff(&from, &into);
        assert!(q.iter().any(|d| matches!(d, Diff::ModRoleChildren(p) if p.from.name == "a")));
        assert!(q.iter().any(|d| matches!(d, Diff::DelRole(r) if r.name == "child")));
        assert!(q.iter().any(|d| matches!(d, Diff::DelRole(r) if r.name == "doomed")));
        assert!(q.iter().any(|d| matches!(d, Diff::AddRole(r) if r.name == "newcomer")));
        assert!(q.iter().any(|d| matches!(d, Diff::ModRoles(_))));
    }

    #[test]
    fn test_diff_roles_presence() {
        let without = load_str("struct s { field id int rowid; };", "a.rgn").unwrap();
        let with = load_str(
            "roles { role a; }; struct s { field id int rowid; };",
            "b.rgn",
        )
        .unwrap();
        let q = diff(&without, &with);
        assert!(q.iter().any(|d| matches!(d, Diff::AddRoles(_))));
        let q = diff(&with, &without);
        assert!(q.iter().any(|d| matches!(d, Diff::DelRoles(_))));
    }
}
