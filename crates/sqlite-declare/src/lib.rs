//! Declarative schema migrations for SQLite.
//!
//! `sqlite-declare` migrates a live SQLite database so its schema matches a
//! target schema expressed as a single SQL script. The caller states the
//! desired end state; the engine diffs it against the live catalog and
//! executes the minimal set of statements required to reach it, preserving
//! data and foreign-key integrity.
//!
//! # Architecture
//!
//! The target schema is materialized into a throwaway in-memory database (the
//! *pristine*). One write transaction is opened on the live database; both
//! catalogs are read, the delta is planned, modified tables are rebuilt with
//! the create-copy-drop-rename procedure, standalone indices, triggers, and
//! views are reconciled, foreign keys are validated, and the transaction
//! commits. A VACUUM runs afterwards when anything changed.
//!
//! - **normalize** - canonicalizes SQL text for semantic comparison
//! - **ident** - identifier quoting and the pragma whitelist
//! - **inspect** - reads `sqlite_master` and `table_info` on either side
//! - **validate** - rejects unsafe target scripts
//! - **planner** - classifies objects and columns as created/dropped/modified
//! - **rebuild** - the table-recreation procedure for modified tables
//! - **migrator** - transaction lifecycle, phase ordering, VACUUM
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlite_declare::prelude::*;
//! use sqlx::sqlite::SqlitePoolOptions;
//!
//! let pool = SqlitePoolOptions::new()
//!     .max_connections(1)
//!     .connect("sqlite:app.db")
//!     .await?;
//!
//! let changed = Migrator::new(pool)
//!     .migrate("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
//!     .await?;
//! ```
//!
//! By default the engine refuses to drop tables or columns; opt in with
//! [`Migrator::allow_deletions`] when the target schema really does shrink.

pub mod error;
pub mod ident;
pub mod inspect;
pub mod migrator;
pub mod normalize;
pub mod planner;
pub mod rebuild;
pub mod validate;

/// Prelude for convenient imports.
pub mod prelude {
    pub use crate::error::{MigrateError, Result};
    pub use crate::migrator::Migrator;
    pub use crate::normalize::normalize;
    pub use crate::validate::validate_schema;
}
