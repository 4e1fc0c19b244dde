//! Fields: types, flags, defaults, references, and validations.

use super::{BitfId, EnmId, FieldId, RoleMap, StrctId};
use crate::msg::Pos;
use serde::Serialize;

/// Semantic type of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Bit,
    Date,
    Epoch,
    Int,
    Real,
    Blob,
    Text,
    Password,
    Email,
    /// A nested structure reached through a local reference field.
    Struct,
    Enum,
    Bitfield,
}

impl FieldType {
    /// Types stored as integers (for default and validation literals).
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            FieldType::Bit | FieldType::Bitfield | FieldType::Date | FieldType::Epoch | FieldType::Int
        )
    }

    /// Types whose validations constrain a length rather than a value.
    pub fn is_sized(self) -> bool {
        matches!(
            self,
            FieldType::Blob | FieldType::Email | FieldType::Text | FieldType::Password
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            FieldType::Bit => "bit",
            FieldType::Date => "date",
            FieldType::Epoch => "epoch",
            FieldType::Int => "int",
            FieldType::Real => "real",
            FieldType::Blob => "blob",
            FieldType::Text => "text",
            FieldType::Password => "password",
            FieldType::Email => "email",
            FieldType::Struct => "struct",
            FieldType::Enum => "enum",
            FieldType::Bitfield => "bits",
        }
    }
}

/// Action taken on a foreign key when the referenced row is updated or
/// deleted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    #[default]
    None,
    Restrict,
    Nullify,
    Cascade,
    Default,
}

/// An item of an enumeration addressed by enum and position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct EitemRef {
    pub enm: EnmId,
    pub item: usize,
}

/// A field's default value, typed by the field's semantic type.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DefaultValue {
    Integer(i64),
    Decimal(f64),
    String(String),
    Enum(EitemRef),
}

/// A reference from a source field to the rowid field of another
/// structure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Reference {
    pub source: FieldId,
    pub target: FieldId,
}

/// Comparison kind of a validation clause.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidOp {
    Ge,
    Le,
    Gt,
    Lt,
    Eq,
}

/// The constrained quantity of a validation clause: a value for numeric
/// fields, a length for sized ones.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidValue {
    Integer(i64),
    Decimal(f64),
    Length(usize),
}

/// A field validation clause beyond plain type checking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Valid {
    pub op: ValidOp,
    pub value: ValidValue,
}

/// Boolean field attributes, comparable as a unit.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldFlags {
    pub rowid: bool,
    pub unique: bool,
    pub nullable: bool,
    pub noexport: bool,
    pub has_default: bool,
}

/// A single field of a structure.
#[derive(Clone, Debug, Serialize)]
pub struct Field {
    pub name: String,
    pub doc: Option<String>,
    pub ftype: FieldType,
    /// Implicit primary key; forces non-null.
    pub rowid: bool,
    pub unique: bool,
    pub nullable: bool,
    /// Never exported regardless of role.
    pub noexport: bool,
    pub def: Option<DefaultValue>,
    /// Bound enumeration for `FieldType::Enum`.
    pub enm: Option<EnmId>,
    /// Bound bitfield for `FieldType::Bitfield`.
    pub bitf: Option<BitfId>,
    /// Foreign (or local, for struct-typed fields) reference.
    pub reference: Option<Reference>,
    pub actdel: Action,
    pub actup: Action,
    /// Roles for which this field is not exported.
    pub rolemap: Option<RoleMap>,
    pub valids: Vec<Valid>,
    pub parent: StrctId,
    pub pos: Pos,
}

impl Field {
    /// All boolean attributes as one comparable value.
    pub fn flags(&self) -> FieldFlags {
        FieldFlags {
            rowid: self.rowid,
            unique: self.unique,
            nullable: self.nullable,
            noexport: self.noexport,
            has_default: self.def.is_some(),
        }
    }

    /// The flags that affect the SQL column definition.
    pub fn sql_flags(&self) -> (bool, bool, bool) {
        (self.rowid, self.unique, self.nullable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_type_classes() {
        assert!(FieldType::Epoch.is_integral());
        assert!(FieldType::Bitfield.is_integral());
        assert!(!FieldType::Real.is_integral());
        assert!(FieldType::Password.is_sized());
        assert!(!FieldType::Int.is_sized());
    }
}
