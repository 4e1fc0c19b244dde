//! SQL type, action, and literal maps.

use relgen_core::{Action, Config, DefaultValue, Field, FieldType};

/// SQL column type for a field type; struct-typed fields have no
/// column of their own.
pub fn sql_type(ftype: FieldType) -> Option<&'static str> {
    match ftype {
        FieldType::Bit
        | FieldType::Date
        | FieldType::Epoch
        | FieldType::Int
        | FieldType::Enum
        | FieldType::Bitfield => Some("INTEGER"),
        FieldType::Real => Some("REAL"),
        FieldType::Blob => Some("BLOB"),
        FieldType::Text | FieldType::Password | FieldType::Email => Some("TEXT"),
        FieldType::Struct => None,
    }
}

/// Foreign-key action clause; `None` for the default action, which is
/// never emitted.
pub fn action_sql(action: Action) -> Option<&'static str> {
    match action {
        Action::None => None,
        Action::Restrict => Some("RESTRICT"),
        Action::Nullify => Some("SET NULL"),
        Action::Cascade => Some("CASCADE"),
        Action::Default => Some("SET DEFAULT"),
    }
}

/// Render a field's default as an SQL literal. Text is single-quoted
/// without escaping; the parser rejects embedded quotes. Enum defaults
/// render as the item's integer value.
pub fn default_literal(cfg: &Config, field: &Field) -> Option<String> {
    field.def.as_ref().map(|def| match def {
        DefaultValue::Integer(v) => v.to_string(),
        DefaultValue::Decimal(v) => v.to_string(),
        DefaultValue::String(s) => format!("'{}'", s),
        DefaultValue::Enum(er) => cfg.enm(er.enm).items[er.item].value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use relgen_core::load_str;

    #[test]
    fn test_sql_type_map() {
        assert_eq!(sql_type(FieldType::Epoch), Some("INTEGER"));
        assert_eq!(sql_type(FieldType::Bitfield), Some("INTEGER"));
        assert_eq!(sql_type(FieldType::Real), Some("REAL"));
        assert_eq!(sql_type(FieldType::Password), Some("TEXT"));
        assert_eq!(sql_type(FieldType::Struct), None);
    }

    #[test]
    fn test_default_literals() {
        let cfg = load_str(
            "enum status { item ok 4; };\
             struct a {\
               field id int rowid;\
               field x int default -2;\
               field t text default \"hi\";\
               field s enum status default ok;\
             };",
            "t.rgn",
        )
        .unwrap();
        let st = &cfg.strcts[0];
        assert_eq!(default_literal(&cfg, &st.fields[1]).unwrap(), "-2");
        assert_eq!(default_literal(&cfg, &st.fields[2]).unwrap(), "'hi'");
        assert_eq!(default_literal(&cfg, &st.fields[3]).unwrap(), "4");
        assert_eq!(default_literal(&cfg, &st.fields[0]), None);
    }
}
