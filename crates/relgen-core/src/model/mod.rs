//! In-memory model of a parsed schema.
//!
//! A [`Config`] owns every entity of a schema: structures with their
//! fields and operations, enumerations, bitfields, and the role forest.
//! Entities refer to each other through stable arena indices
//! ([`StrctId`], [`FieldId`], ...) rather than pointers, so reference
//! graphs may be cyclic while the model stays a plain owned value.
//!
//! A model is built once by the parser and linker and never mutated by
//! the analysis passes; audit and diff queues borrow from it.

mod field;
mod ops;
mod role;

pub use field::{
    Action, DefaultValue, EitemRef, Field, FieldFlags, FieldType, Reference, Valid, ValidOp,
    ValidValue,
};
pub use ops::{Aggr, AggrOp, Distinct, Group, ModType, Op, Ord, OrdDir, QueryKind, Search, Sent, Unique, Update, UpdateKind, Uref};
pub use role::{Insert, Role, RoleMap, RoleMapKind};
pub(crate) use role::rolemap_permits;

use crate::msg::{Msg, Pos};
use serde::Serialize;

/// Index of a structure in [`Config::strcts`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct StrctId(pub usize);

/// Index of an enumeration in [`Config::enums`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct EnmId(pub usize);

/// Index of a bitfield in [`Config::bitfs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct BitfId(pub usize);

/// Index of a role in [`Config::roles`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RoleId(pub usize);

/// A field addressed by owning structure and position within it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct FieldId {
    pub strct: StrctId,
    pub field: usize,
}

/// A human-readable label in one natural language.
///
/// `lang` indexes [`Config::langs`]; index zero is the unnamed default
/// language. Label text comparisons are exact.
#[derive(Clone, Debug, Serialize)]
pub struct Label {
    pub lang: usize,
    pub text: String,
    pub pos: Pos,
}

/// One item of an enumeration.
#[derive(Clone, Debug, Serialize)]
pub struct EnumItem {
    pub name: String,
    pub value: i64,
    /// Value was auto-assigned rather than written in the schema.
    pub auto: bool,
    pub doc: Option<String>,
    pub labels: Vec<Label>,
    pub pos: Pos,
    pub parent: EnmId,
}

/// A named enumeration: integer constants with labels.
#[derive(Clone, Debug, Serialize)]
pub struct Enum {
    pub id: EnmId,
    pub name: String,
    pub doc: Option<String>,
    pub items: Vec<EnumItem>,
    /// Labels shown when a value is null.
    pub labels_null: Vec<Label>,
    pub pos: Pos,
}

/// One bit position of a bitfield.
#[derive(Clone, Debug, Serialize)]
pub struct BitIndex {
    pub name: String,
    pub value: i64,
    pub doc: Option<String>,
    pub labels: Vec<Label>,
    pub pos: Pos,
    pub parent: BitfId,
}

/// A named bitfield: bit positions with labels.
#[derive(Clone, Debug, Serialize)]
pub struct Bitf {
    pub id: BitfId,
    pub name: String,
    pub doc: Option<String>,
    pub items: Vec<BitIndex>,
    /// Labels shown when no bits are set.
    pub labels_unset: Vec<Label>,
    /// Labels shown when a value is null.
    pub labels_null: Vec<Label>,
    pub pos: Pos,
}

/// A structure (table): fields plus the operations defined on them.
#[derive(Clone, Debug, Serialize)]
pub struct Strct {
    pub id: StrctId,
    pub name: String,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    /// Queries in declaration order.
    pub searches: Vec<Search>,
    /// Update operations in declaration order.
    pub updates: Vec<Update>,
    /// Delete operations in declaration order.
    pub deletes: Vec<Update>,
    pub insert: Option<Insert>,
    pub uniques: Vec<Unique>,
    /// Structure-wide noexport role maps (not bound to a field).
    pub noexports: Vec<RoleMap>,
    pub pos: Pos,
}

impl Strct {
    /// Look up a field by (case-insensitive) name.
    pub fn field_named(&self, name: &str) -> Option<(usize, &Field)> {
        self.fields
            .iter()
            .enumerate()
            .find(|(_, f)| f.name.eq_ignore_ascii_case(name))
    }

    /// The rowid field, if declared.
    pub fn rowid(&self) -> Option<&Field> {
        self.fields.iter().find(|f| f.rowid)
    }
}

/// A fully parsed and linked schema.
#[derive(Clone, Debug, Default, Serialize)]
pub struct Config {
    pub strcts: Vec<Strct>,
    pub enums: Vec<Enum>,
    pub bitfs: Vec<Bitf>,
    /// All roles, virtual ones first, then in declaration order. Empty
    /// when role support is not enabled.
    pub roles: Vec<Role>,
    /// Language names for labels; index zero is the default language.
    pub langs: Vec<String>,
    /// Input file names in parse order.
    pub fnames: Vec<String>,
    /// Diagnostics accumulated while parsing and linking.
    #[serde(skip)]
    pub msgs: Vec<Msg>,
}

impl Config {
    pub fn new() -> Self {
        Self {
            langs: vec![String::new()],
            ..Self::default()
        }
    }

    pub fn strct(&self, id: StrctId) -> &Strct {
        &self.strcts[id.0]
    }

    pub fn field(&self, id: FieldId) -> &Field {
        &self.strcts[id.strct.0].fields[id.field]
    }

    pub fn enm(&self, id: EnmId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn bitf(&self, id: BitfId) -> &Bitf {
        &self.bitfs[id.0]
    }

    pub fn role(&self, id: RoleId) -> &Role {
        &self.roles[id.0]
    }

    pub fn find_strct(&self, name: &str) -> Option<&Strct> {
        self.strcts.iter().find(|s| s.name.eq_ignore_ascii_case(name))
    }

    pub fn find_enum(&self, name: &str) -> Option<&Enum> {
        self.enums.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    pub fn find_bitf(&self, name: &str) -> Option<&Bitf> {
        self.bitfs.iter().find(|b| b.name.eq_ignore_ascii_case(name))
    }

    pub fn find_role(&self, name: &str) -> Option<&Role> {
        self.roles.iter().find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Whether role support was enabled by a `roles` block.
    pub fn roles_enabled(&self) -> bool {
        !self.roles.is_empty()
    }

    /// True when `role` equals `ancestor` or `ancestor` appears on its
    /// parent chain. Roles form a forest, so the walk is finite.
    pub fn role_is(&self, role: RoleId, ancestor: RoleId) -> bool {
        let mut cur = Some(role);
        while let Some(id) = cur {
            if id == ancestor {
                return true;
            }
            cur = self.roles[id.0].parent;
        }
        false
    }

    /// Total field count across all structures; bounds reachability
    /// walks on cyclic reference graphs.
    pub fn total_fields(&self) -> usize {
        self.strcts.iter().map(|s| s.fields.len()).sum()
    }
}
