//! SQL emission for relgen models.
//!
//! Two emitters over the core model:
//!
//! - [`write_schema`] renders a whole model as `CREATE TABLE`
//!   statements in declaration order.
//! - [`write_migration`] consumes a diff queue and renders the SQL
//!   delta, refusing irreconcilable changes.

mod migrate;
mod schema;
mod types;

pub use migrate::{write_migration, MigrationOutcome};
pub use schema::write_schema;
pub use types::{action_sql, default_literal, sql_type};
