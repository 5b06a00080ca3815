//! Error types for the migration engine.

/// Errors that can occur while migrating a database to a target schema.
///
/// Every variant is fatal: the orchestrator rolls back the write transaction,
/// restores the original `foreign_keys` setting, and propagates the error.
#[derive(Debug, thiserror::Error)]
pub enum MigrateError {
    /// The target schema was rejected, either by the validator or by SQLite
    /// while populating the pristine database.
    #[error("Invalid schema SQL: {0}")]
    InvalidSchema(String),

    /// The migration would drop tables and deletions were not allowed.
    #[error("Refusing to delete tables [{}]", .0.join(", "))]
    RefusedTableDeletion(Vec<String>),

    /// The migration would remove columns and deletions were not allowed.
    #[error("Refusing to remove columns [{}] from table {table}", .columns.join(", "))]
    RefusedColumnDeletion {
        /// The table that would lose columns.
        table: String,
        /// The columns the target schema no longer declares.
        columns: Vec<String>,
    },

    /// `PRAGMA foreign_key_check` reported violations before commit.
    #[error("Would fail foreign_key_check: {0} violation(s)")]
    ForeignKeyViolation(usize),

    /// A pragma outside the whitelist reached the pragma helpers.
    #[error("Unsafe pragma name: {0}")]
    UnsafePragma(String),

    /// Database error from the underlying driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for migration operations.
pub type Result<T> = std::result::Result<T, MigrateError>;
