//! Operations on structures: queries, updates, deletes, uniques.

use super::{FieldId, RoleMap, StrctId};
use crate::msg::Pos;
use serde::Serialize;

/// Comparison operator of a sent-clause or update constraint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    #[default]
    Eq,
    Ge,
    Gt,
    Le,
    Lt,
    Neq,
    Like,
    And,
    Or,
    Streq,
    Strneq,
    // Unary operators.
    Isnull,
    Notnull,
}

impl Op {
    pub fn is_unary(self) -> bool {
        matches!(self, Op::Isnull | Op::Notnull)
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Eq => "eq",
            Op::Ge => "ge",
            Op::Gt => "gt",
            Op::Le => "le",
            Op::Lt => "lt",
            Op::Neq => "neq",
            Op::Like => "like",
            Op::And => "and",
            Op::Or => "or",
            Op::Streq => "streq",
            Op::Strneq => "strneq",
            Op::Isnull => "isnull",
            Op::Notnull => "notnull",
        }
    }
}

/// How an update modifies a column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModType {
    Concat,
    Dec,
    Inc,
    #[default]
    Set,
    Strset,
}

impl ModType {
    pub fn name(self) -> &'static str {
        match self {
            ModType::Concat => "cat",
            ModType::Dec => "dec",
            ModType::Inc => "inc",
            ModType::Set => "set",
            ModType::Strset => "strset",
        }
    }
}

/// Kind of a query.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryKind {
    Count,
    /// Single-row lookup.
    Search,
    List,
    Iterate,
}

impl QueryKind {
    /// Name used in audit text output.
    pub fn name(self) -> &'static str {
        match self {
            QueryKind::Count => "count",
            QueryKind::Search => "search",
            QueryKind::List => "list",
            QueryKind::Iterate => "iterate",
        }
    }

    /// Name used in audit JSON output and derived function names.
    pub fn proto_name(self) -> &'static str {
        match self {
            QueryKind::Count => "count",
            QueryKind::Search => "get",
            QueryKind::List => "list",
            QueryKind::Iterate => "iterate",
        }
    }

    pub const ALL: [QueryKind; 4] = [
        QueryKind::Count,
        QueryKind::Search,
        QueryKind::List,
        QueryKind::Iterate,
    ];
}

/// One predicate of a query: a dotted field chain and an operator.
#[derive(Clone, Debug, Serialize)]
pub struct Sent {
    /// Canonical dotted lower-case chain, e.g. `user.company.name`.
    pub fname: String,
    pub op: Op,
    /// Resolved terminal field.
    pub field: FieldId,
    pub pos: Pos,
}

impl Sent {
    /// The dotted chain with underscores, used in derived names.
    pub fn uname(&self) -> String {
        self.fname.replace('.', "_")
    }
}

/// Sort direction of an order clause.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrdDir {
    #[default]
    Asc,
    Desc,
}

/// An order clause: dotted chain plus direction.
#[derive(Clone, Debug, Serialize)]
pub struct Ord {
    pub fname: String,
    pub op: OrdDir,
    pub field: FieldId,
    pub pos: Pos,
}

/// Row-wide aggregate function.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AggrOp {
    Maxrow,
    Minrow,
}

/// An aggregate clause: pick the row with the extreme value of a field.
#[derive(Clone, Debug, Serialize)]
pub struct Aggr {
    pub fname: String,
    pub op: AggrOp,
    pub field: FieldId,
    pub pos: Pos,
}

/// A grouping clause.
#[derive(Clone, Debug, Serialize)]
pub struct Group {
    pub fname: String,
    pub field: FieldId,
    pub pos: Pos,
}

/// A distinct clause: the query returns the structure at the end of the
/// dotted chain instead of its own.
#[derive(Clone, Debug, Serialize)]
pub struct Distinct {
    pub fname: String,
    /// Resolved result structure.
    pub strct: StrctId,
    pub pos: Pos,
}

/// A query over a structure.
#[derive(Clone, Debug, Serialize)]
pub struct Search {
    pub kind: QueryKind,
    /// Predicates in declaration order; order matters for equality.
    pub sents: Vec<Sent>,
    pub ords: Vec<Ord>,
    pub aggr: Option<Aggr>,
    pub group: Option<Group>,
    pub distinct: Option<Distinct>,
    pub name: Option<String>,
    pub doc: Option<String>,
    pub limit: i64,
    pub offset: i64,
    pub rolemap: Option<RoleMap>,
    pub parent: StrctId,
    pub pos: Pos,
}

/// Whether an update operation modifies or deletes rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    Modify,
    Delete,
}

impl UpdateKind {
    pub fn name(self) -> &'static str {
        match self {
            UpdateKind::Modify => "update",
            UpdateKind::Delete => "delete",
        }
    }
}

/// A modifier or constraint reference of an update operation.
#[derive(Clone, Debug, Serialize)]
pub struct Uref {
    /// Field name within the operation's structure.
    pub field: String,
    /// Constraint operator (constraint references only).
    pub op: Op,
    /// Modifier kind (modifier references only).
    pub modifier: ModType,
    pub pos: Pos,
}

/// An update or delete operation.
#[derive(Clone, Debug, Serialize)]
pub struct Update {
    pub kind: UpdateKind,
    /// Modified fields; empty for deletes and for update-all.
    pub mrq: Vec<Uref>,
    /// Constraint fields.
    pub crq: Vec<Uref>,
    pub name: Option<String>,
    pub doc: Option<String>,
    /// Update all fields by direct set.
    pub all: bool,
    pub rolemap: Option<RoleMap>,
    pub parent: StrctId,
    pub pos: Pos,
}

/// A multi-field unique constraint.
#[derive(Clone, Debug, Serialize)]
pub struct Unique {
    /// Member field names in declaration order; equality is unordered.
    pub fields: Vec<String>,
    pub parent: StrctId,
    pub pos: Pos,
}
