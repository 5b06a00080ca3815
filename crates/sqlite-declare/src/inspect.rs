//! Schema inspection over `sqlite_master` and `PRAGMA table_info`.
//!
//! Every reader is generic over a sqlx executor so the same code serves both
//! the pristine in-memory connection and the live write transaction.

use std::collections::BTreeMap;

use sqlx::sqlite::Sqlite;

use crate::error::Result;
use crate::ident;

/// The schema object kinds the engine manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjectKind {
    Table,
    Index,
    Trigger,
    View,
}

impl ObjectKind {
    /// The `type` value used in `sqlite_master`.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Index => "index",
            Self::Trigger => "trigger",
            Self::View => "view",
        }
    }

    /// The keyword used in `DROP <keyword> <name>` statements.
    #[must_use]
    pub fn keyword(self) -> &'static str {
        match self {
            Self::Table => "TABLE",
            Self::Index => "INDEX",
            Self::Trigger => "TRIGGER",
            Self::View => "VIEW",
        }
    }

    fn from_catalog(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(Self::Table),
            "index" => Some(Self::Index),
            "trigger" => Some(Self::Trigger),
            "view" => Some(Self::View),
            _ => None,
        }
    }
}

/// An index, trigger, or view attached to a table.
#[derive(Debug, Clone)]
pub struct Dependency {
    /// Catalog kind of the dependent object.
    pub kind: ObjectKind,
    /// Its stored `CREATE` statement.
    pub sql: String,
}

/// Lists objects of one kind as an ordered `name -> sql` map.
///
/// Internal objects are excluded: their names start with `sqlite_`
/// (`sqlite_sequence`, auto-created PK/UNIQUE indices) or their `sql` is
/// NULL, and SQLite manages them on its own.
pub async fn list_objects<'e, E>(executor: E, kind: ObjectKind) -> Result<BTreeMap<String, String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, String)> = sqlx::query_as(
        "SELECT name, sql FROM sqlite_master \
         WHERE type = ? AND name NOT LIKE 'sqlite_%' AND sql IS NOT NULL \
         ORDER BY name",
    )
    .bind(kind.as_str())
    .fetch_all(executor)
    .await?;
    Ok(rows.into_iter().collect())
}

/// Returns the column names of a table in declaration (`table_info`) order.
pub async fn columns_of<'e, E>(executor: E, table: &str) -> Result<Vec<String>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let sql = ident::pragma_call("table_info", &ident::quote(table))?;
    let rows: Vec<(i64, String, String, i64, Option<String>, i64)> =
        sqlx::query_as(&sql).fetch_all(executor).await?;
    Ok(rows.into_iter().map(|(_, name, ..)| name).collect())
}

/// Returns the dependencies of a table: indices, triggers, and views whose
/// `tbl_name` matches. Auto-created indices carry a NULL `sql` and are
/// skipped; they reappear on their own when the table is recreated.
pub async fn dependencies_of<'e, E>(
    executor: E,
    table: &str,
) -> Result<BTreeMap<String, Dependency>>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let rows: Vec<(String, String, String)> = sqlx::query_as(
        "SELECT name, type, sql FROM sqlite_master \
         WHERE tbl_name = ? AND type IN ('index', 'trigger', 'view') \
         AND sql IS NOT NULL \
         ORDER BY name",
    )
    .bind(table)
    .fetch_all(executor)
    .await?;
    Ok(rows
        .into_iter()
        .filter_map(|(name, kind, sql)| {
            ObjectKind::from_catalog(&kind).map(|kind| (name, Dependency { kind, sql }))
        })
        .collect())
}
