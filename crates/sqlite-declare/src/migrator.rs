//! Migration orchestration.
//!
//! [`Migrator`] owns the whole migration lifecycle: it materializes the
//! target schema into a pristine in-memory database, opens one write
//! transaction on the live database, diffs the two catalogs, applies the
//! delta (rebuilding modified tables), validates foreign keys, commits, and
//! finally reconciles the `foreign_keys` pragma and runs VACUUM when anything
//! changed.

use std::collections::HashSet;

use sqlx::sqlite::{Sqlite, SqliteConnection, SqlitePool};
use sqlx::{Connection, Transaction};
use tracing::{debug, info, warn};

use crate::error::{MigrateError, Result};
use crate::ident::{self, quote};
use crate::inspect::{self, ObjectKind};
use crate::normalize::normalize;
use crate::planner::{self, ColumnDelta};
use crate::rebuild;
use crate::validate::validate_schema;

/// Declaratively migrates a live database toward a target schema.
///
/// The caller states the desired end state as a single SQL script; the
/// migrator computes and executes the minimal set of statements required to
/// reach it, preserving data. By default it refuses to drop tables or
/// columns; see [`allow_deletions`](Self::allow_deletions).
pub struct Migrator {
    pool: SqlitePool,
    allow_deletions: bool,
}

impl Migrator {
    /// Creates a migrator for the given database.
    ///
    /// The migrator acquires a single pooled connection for the whole
    /// migration so that pragma state and the write transaction share a
    /// connection.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            allow_deletions: false,
        }
    }

    /// Permits the migration to drop tables and columns absent from the
    /// target schema.
    #[must_use]
    pub fn allow_deletions(mut self, enabled: bool) -> Self {
        self.allow_deletions = enabled;
        self
    }

    /// Migrates the live database to match `schema`.
    ///
    /// Returns `true` iff at least one change was applied. On any failure the
    /// live database is left exactly as it was and `foreign_keys` is restored
    /// to its original value.
    pub async fn migrate(&self, schema: &str) -> Result<bool> {
        validate_schema(schema)?;

        let mut pristine = SqliteConnection::connect(":memory:").await?;
        let outcome = self.run(&mut pristine, schema).await;
        // The pristine is private to this migration; discard it on every path.
        let _ = pristine.close().await;
        outcome
    }

    async fn run(&self, pristine: &mut SqliteConnection, schema: &str) -> Result<bool> {
        if !schema.trim().is_empty() {
            sqlx::raw_sql(schema)
                .execute(&mut *pristine)
                .await
                .map_err(|e| MigrateError::InvalidSchema(e.to_string()))?;
        }

        let mut conn = self.pool.acquire().await?;
        let orig_foreign_keys = read_pragma(&mut *conn, "foreign_keys").await? != 0;

        // `PRAGMA foreign_keys` is a no-op inside a transaction, so it has to
        // be turned off before the write transaction opens.
        if orig_foreign_keys {
            let sql = ident::pragma_set("foreign_keys", "OFF")?;
            sqlx::query(&sql).execute(&mut *conn).await?;
        }

        match self.apply(&mut conn, pristine, orig_foreign_keys).await {
            Ok(mut changes) => {
                // Reconcile the foreign_keys pragma outside the transaction.
                // Restoring the pre-migration value is not a schema change
                // and must not trigger a VACUUM on an otherwise clean run.
                let live_fk = read_pragma(&mut *conn, "foreign_keys").await?;
                let pristine_fk = read_pragma(&mut *pristine, "foreign_keys").await?;
                if pristine_fk != live_fk {
                    let sql = ident::pragma_set("foreign_keys", pristine_fk)?;
                    sqlx::query(&sql).execute(&mut *conn).await?;
                    if (pristine_fk != 0) != orig_foreign_keys {
                        changes += 1;
                    }
                }
                if changes > 0 {
                    debug!(changes, "running VACUUM");
                    sqlx::query("VACUUM").execute(&mut *conn).await?;
                }
                info!(changes, "migration committed");
                Ok(changes > 0)
            }
            Err(err) => {
                if orig_foreign_keys
                    && let Ok(sql) = ident::pragma_set("foreign_keys", "ON")
                {
                    let _ = sqlx::query(&sql).execute(&mut *conn).await;
                }
                Err(err)
            }
        }
    }

    /// Opens the write transaction, applies every phase, and commits.
    /// Any error rolls the transaction back before propagating.
    async fn apply(
        &self,
        conn: &mut SqliteConnection,
        pristine: &mut SqliteConnection,
        orig_foreign_keys: bool,
    ) -> Result<u64> {
        let tx = conn.begin().await?;
        let mut run = Run { tx, changes: 0 };
        match self
            .apply_phases(&mut run, pristine, orig_foreign_keys)
            .await
        {
            Ok(()) => {
                run.tx.commit().await?;
                Ok(run.changes)
            }
            Err(err) => {
                let _ = run.tx.rollback().await;
                Err(err)
            }
        }
    }

    async fn apply_phases(
        &self,
        run: &mut Run<'_>,
        pristine: &mut SqliteConnection,
        orig_foreign_keys: bool,
    ) -> Result<()> {
        let sql = ident::pragma_set("defer_foreign_keys", "TRUE")?;
        run.exec_untracked(&sql).await?;

        // Plan against both catalogs before the first mutation.
        let pristine_tables = inspect::list_objects(&mut *pristine, ObjectKind::Table).await?;
        let live_tables = inspect::list_objects(&mut *run.tx, ObjectKind::Table).await?;
        let tables = planner::diff_objects(&pristine_tables, &live_tables);

        let mut column_deltas: Vec<(String, ColumnDelta)> = Vec::new();
        for table in &tables.modified {
            let live_columns = inspect::columns_of(&mut *run.tx, table).await?;
            let pristine_columns = inspect::columns_of(&mut *pristine, table).await?;
            column_deltas.push((
                table.clone(),
                planner::diff_columns(&live_columns, &pristine_columns),
            ));
        }
        planner::ensure_deletions_allowed(self.allow_deletions, &tables, &column_deltas)?;

        // 1. Views may reference tables about to be rebuilt; drop them all
        //    and recreate from the pristine afterwards. A drop whose pristine
        //    definition is identical does not count as a change.
        let pristine_views = inspect::list_objects(&mut *pristine, ObjectKind::View).await?;
        let live_views = inspect::list_objects(&mut *run.tx, ObjectKind::View).await?;
        let mut unchanged_views: HashSet<String> = HashSet::new();
        for (name, live_sql) in &live_views {
            let unchanged = pristine_views
                .get(name)
                .is_some_and(|p| normalize(p) == normalize(live_sql));
            let sql = format!("DROP VIEW {}", quote(name));
            if unchanged {
                unchanged_views.insert(name.clone());
                run.exec_untracked(&sql).await?;
            } else {
                run.exec(&sql).await?;
            }
        }

        // 2. New tables come straight from their pristine definitions.
        for name in &tables.created {
            run.exec(&pristine_tables[name]).await?;
        }

        // 3. Removed tables. The deletion guard has already passed.
        if !tables.dropped.is_empty() {
            warn!(tables = ?tables.dropped, "dropping tables");
        }
        for name in &tables.dropped {
            run.exec(&format!("DROP TABLE {}", quote(name))).await?;
        }

        // 4. Modified tables go through the rebuild procedure.
        for name in &tables.modified {
            info!(table = %name, "recreating modified table");
            rebuild::recreate_table(run, pristine, name, &pristine_tables[name]).await?;
        }

        // 5-6. Standalone indices and triggers.
        self.reconcile_objects(run, pristine, ObjectKind::Index)
            .await?;
        self.reconcile_objects(run, pristine, ObjectKind::Trigger)
            .await?;

        // 7. Views come back from their pristine definitions.
        let pristine_views = inspect::list_objects(&mut *pristine, ObjectKind::View).await?;
        for (name, sql) in &pristine_views {
            if unchanged_views.contains(name) {
                run.exec_untracked(sql).await?;
            } else {
                run.exec(sql).await?;
            }
        }

        // 8. user_version travels with the schema.
        let live_version = read_pragma(&mut *run.tx, "user_version").await?;
        let pristine_version = read_pragma(&mut *pristine, "user_version").await?;
        if live_version != pristine_version {
            let sql = ident::pragma_set("user_version", pristine_version)?;
            run.exec(&sql).await?;
        }

        // 9. Validate foreign keys before commit when either side wants them
        //    enforced.
        let pristine_fk = read_pragma(&mut *pristine, "foreign_keys").await? != 0;
        if orig_foreign_keys || pristine_fk {
            let sql = ident::pragma_query("foreign_key_check")?;
            let violations = sqlx::query(&sql).fetch_all(&mut *run.tx).await?;
            if !violations.is_empty() {
                return Err(MigrateError::ForeignKeyViolation(violations.len()));
            }
        }
        Ok(())
    }

    /// Drops objects absent from the pristine, creates missing ones, and
    /// recreates any whose normalized definitions differ.
    async fn reconcile_objects(
        &self,
        run: &mut Run<'_>,
        pristine: &mut SqliteConnection,
        kind: ObjectKind,
    ) -> Result<()> {
        let pristine_objects = inspect::list_objects(&mut *pristine, kind).await?;
        let live_objects = inspect::list_objects(&mut *run.tx, kind).await?;
        let diff = planner::diff_objects(&pristine_objects, &live_objects);

        for name in &diff.dropped {
            run.exec(&format!("DROP {} {}", kind.keyword(), quote(name)))
                .await?;
        }
        for name in &diff.modified {
            run.exec(&format!("DROP {} {}", kind.keyword(), quote(name)))
                .await?;
            run.exec(&pristine_objects[name]).await?;
        }
        for name in &diff.created {
            run.exec(&pristine_objects[name]).await?;
        }
        Ok(())
    }
}

/// The live write transaction plus an exact count of the changes emitted
/// through it. Every statement the orchestrator executes against the live
/// database goes through these two methods, so the counter stays exact.
pub(crate) struct Run<'c> {
    pub(crate) tx: Transaction<'c, Sqlite>,
    pub(crate) changes: u64,
}

impl Run<'_> {
    /// Executes a statement that counts toward `didChange` and VACUUM.
    pub(crate) async fn exec(&mut self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "executing");
        sqlx::query(sql).execute(&mut *self.tx).await?;
        self.changes += 1;
        Ok(())
    }

    /// Executes bookkeeping SQL that is not a user-visible schema change.
    pub(crate) async fn exec_untracked(&mut self, sql: &str) -> Result<()> {
        debug!(sql = %sql, "executing (untracked)");
        sqlx::query(sql).execute(&mut *self.tx).await?;
        Ok(())
    }
}

/// Reads an integer-valued whitelisted pragma.
async fn read_pragma<'e, E>(executor: E, name: &str) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = ident::pragma_query(name)?;
    let (value,): (i64,) = sqlx::query_as(&sql).fetch_one(executor).await?;
    Ok(value)
}
