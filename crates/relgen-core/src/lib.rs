//! relgen core - schema model, parser, and analysis passes.
//!
//! relgen reads a small declarative language describing relational data
//! models (structures, fields, enumerations, bitfields, operations,
//! roles, labels) and derives artifacts from the parsed model.
//!
//! # Architecture
//!
//! The processing pipeline:
//!
//! 1. **Parsing** (`parse`) - Tokenize and parse schema files into a
//!    [`Config`], then link cross-entity references
//! 2. **Audit** (`audit`) - Per-role reachability and export analysis
//! 3. **Diff** (`diff`) - Structural comparison of two models
//! 4. **Emission** - The `relgen-sql` and `relgen-report` crates
//!    consume the model and the audit/diff queues
//!
//! # Example
//!
//! ```
//! use relgen_core::parse::load_str;
//! use relgen_core::{audit, diff};
//!
//! let old = load_str("struct user { field id int rowid; };", "old.rgn").unwrap();
//! let new = load_str(
//!     "roles { role admin; };\
//!      struct user {\
//!        field id int rowid;\
//!        search id: name byid;\
//!        roles admin { search byid; };\
//!      };",
//!     "new.rgn",
//! )
//! .unwrap();
//!
//! let changes = diff::diff(&old, &new);
//! assert!(!changes.iter().all(|d| d.is_same()));
//!
//! let admin = new.find_role("admin").unwrap().id;
//! let queue = audit::audit(&new, admin);
//! assert!(!queue.is_empty());
//! ```

pub mod audit;
pub mod diff;
pub mod error;
pub mod model;
pub mod msg;
pub mod parse;

// Re-export main types
pub use audit::{Audit, AuditField, AuditPath, AuditQueue, Reachable};
pub use diff::{Diff, DiffQueue, Pair};
pub use error::{Error, Result};
pub use model::{
    Action, Aggr, AggrOp, BitIndex, Bitf, BitfId, Config, DefaultValue, Distinct, EitemRef, EnmId,
    Enum, EnumItem, Field, FieldFlags, FieldId, FieldType, Group, Insert, Label, ModType, Op, Ord,
    OrdDir, QueryKind, Reference, Role, RoleId, RoleMap, RoleMapKind, Search, Sent, Strct, StrctId,
    Unique, Update, UpdateKind, Uref, Valid, ValidOp, ValidValue,
};
pub use msg::{write_msgs, Msg, MsgKind, MsgQueue, Pos};
pub use parse::{load_str, LoadError, Loader};
