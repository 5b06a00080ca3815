//! Diff planning between the pristine and live catalogs.
//!
//! The planner is pure: it consumes the inspector's maps and classifies every
//! object as created, dropped, or modified, with the normalizer deciding what
//! counts as a semantic difference. The deletion guard runs here, before the
//! orchestrator emits its first mutating statement.

use std::collections::BTreeMap;

use crate::error::{MigrateError, Result};
use crate::normalize::normalize;

/// Classification of one object kind across the two catalogs.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ObjectDiff {
    /// Present in the pristine only.
    pub created: Vec<String>,
    /// Present in the live database only.
    pub dropped: Vec<String>,
    /// Present in both with semantically different definitions.
    pub modified: Vec<String>,
}

impl ObjectDiff {
    /// Returns true when the two catalogs agree for this kind.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.dropped.is_empty() && self.modified.is_empty()
    }
}

/// Classifies each named object as created, dropped, or modified.
///
/// An object with an empty live definition is never "modified"; the table
/// recreator's column diff decides what happens to it.
#[must_use]
pub fn diff_objects(
    pristine: &BTreeMap<String, String>,
    live: &BTreeMap<String, String>,
) -> ObjectDiff {
    let mut diff = ObjectDiff::default();
    for name in pristine.keys() {
        if !live.contains_key(name) {
            diff.created.push(name.clone());
        }
    }
    for (name, live_sql) in live {
        match pristine.get(name) {
            None => diff.dropped.push(name.clone()),
            Some(pristine_sql) => {
                if !live_sql.is_empty() && normalize(live_sql) != normalize(pristine_sql) {
                    diff.modified.push(name.clone());
                }
            }
        }
    }
    diff
}

/// Column-level classification for one modified table.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ColumnDelta {
    /// Columns present on both sides, in live declaration order. These govern
    /// the data-copy INSERT during a rebuild.
    pub common: Vec<String>,
    /// Columns the target schema removes.
    pub removed: Vec<String>,
}

/// Splits a live column list against the pristine one.
#[must_use]
pub fn diff_columns(live: &[String], pristine: &[String]) -> ColumnDelta {
    let mut delta = ColumnDelta::default();
    for column in live {
        if pristine.contains(column) {
            delta.common.push(column.clone());
        } else {
            delta.removed.push(column.clone());
        }
    }
    delta
}

/// The deletion guard: refuses dropped tables or removed columns unless the
/// caller opted in.
pub fn ensure_deletions_allowed(
    allow_deletions: bool,
    tables: &ObjectDiff,
    column_deltas: &[(String, ColumnDelta)],
) -> Result<()> {
    if allow_deletions {
        return Ok(());
    }
    if !tables.dropped.is_empty() {
        return Err(MigrateError::RefusedTableDeletion(tables.dropped.clone()));
    }
    for (table, delta) in column_deltas {
        if !delta.removed.is_empty() {
            return Err(MigrateError::RefusedColumnDeletion {
                table: table.clone(),
                columns: delta.removed.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(&str, &str)]) -> BTreeMap<String, String> {
        entries
            .iter()
            .map(|(name, sql)| (name.to_string(), sql.to_string()))
            .collect()
    }

    #[test]
    fn test_detects_created_and_dropped() {
        let pristine = map(&[("a", "CREATE TABLE a (x)"), ("b", "CREATE TABLE b (x)")]);
        let live = map(&[("b", "CREATE TABLE b (x)"), ("c", "CREATE TABLE c (x)")]);

        let diff = diff_objects(&pristine, &live);
        assert_eq!(diff.created, vec!["a"]);
        assert_eq!(diff.dropped, vec!["c"]);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn test_detects_modified() {
        let pristine = map(&[("a", "CREATE TABLE a (x INTEGER, y TEXT)")]);
        let live = map(&[("a", "CREATE TABLE a (x INTEGER)")]);

        let diff = diff_objects(&pristine, &live);
        assert_eq!(diff.modified, vec!["a"]);
    }

    #[test]
    fn test_normalization_equal_is_not_modified() {
        let pristine = map(&[("a", "CREATE TABLE a (\n  x INTEGER -- comment\n)")]);
        let live = map(&[("a", r#"CREATE TABLE "a" (x INTEGER)"#)]);

        let diff = diff_objects(&pristine, &live);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_empty_live_sql_is_not_modified() {
        let pristine = map(&[("a", "CREATE TABLE a (x INTEGER)")]);
        let live = map(&[("a", "")]);

        let diff = diff_objects(&pristine, &live);
        assert!(diff.modified.is_empty());
    }

    #[test]
    fn test_column_delta_orders_common_by_live() {
        let live = vec!["z".to_string(), "a".to_string(), "gone".to_string()];
        let pristine = vec!["a".to_string(), "z".to_string(), "fresh".to_string()];

        let delta = diff_columns(&live, &pristine);
        assert_eq!(delta.common, vec!["z", "a"]);
        assert_eq!(delta.removed, vec!["gone"]);
    }

    #[test]
    fn test_guard_refuses_dropped_tables() {
        let tables = ObjectDiff {
            dropped: vec!["to_remove".to_string()],
            ..ObjectDiff::default()
        };
        let err = ensure_deletions_allowed(false, &tables, &[]).unwrap_err();
        assert!(err.to_string().contains("Refusing to delete tables"));
        assert!(err.to_string().contains("to_remove"));
    }

    #[test]
    fn test_guard_refuses_removed_columns() {
        let deltas = vec![(
            "users".to_string(),
            ColumnDelta {
                common: vec!["id".to_string()],
                removed: vec!["email".to_string()],
            },
        )];
        let err = ensure_deletions_allowed(false, &ObjectDiff::default(), &deltas).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Refusing to remove columns"));
        assert!(message.contains("email"));
        assert!(message.contains("users"));
    }

    #[test]
    fn test_guard_passes_when_opted_in() {
        let tables = ObjectDiff {
            dropped: vec!["to_remove".to_string()],
            ..ObjectDiff::default()
        };
        assert!(ensure_deletions_allowed(true, &tables, &[]).is_ok());
    }
}
