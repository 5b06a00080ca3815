//! Table recreation.
//!
//! A modified table is rebuilt with the classic SQLite procedure: create a
//! staging table from the pristine definition, copy the surviving columns,
//! drop the old table, rename the staging table into place, and reinstall the
//! pristine indices and triggers. The whole sequence runs inside the
//! orchestrator's write transaction with foreign keys off.

use sqlx::sqlite::SqliteConnection;
use tracing::debug;

use crate::error::Result;
use crate::ident::quote;
use crate::inspect::{self, ObjectKind};
use crate::migrator::Run;
use crate::normalize::scan_quoted;
use crate::planner;

/// Suffix of the staging table used while a table is rebuilt.
const STAGING_SUFFIX: &str = "_migration_new";

/// Rebuilds one table whose definition changed, preserving rows for every
/// column that survives in the target definition.
///
/// Precondition: the write transaction is open, `foreign_keys` is OFF, and
/// `defer_foreign_keys` is TRUE.
pub(crate) async fn recreate_table(
    run: &mut Run<'_>,
    pristine: &mut SqliteConnection,
    table: &str,
    pristine_sql: &str,
) -> Result<()> {
    let live_deps = inspect::dependencies_of(&mut *run.tx, table).await?;
    let pristine_deps = inspect::dependencies_of(&mut *pristine, table).await?;

    // Triggers go first. Indices vanish with the DROP TABLE below, and views
    // were already dropped globally by the orchestrator.
    for (name, dep) in &live_deps {
        if dep.kind == ObjectKind::Trigger {
            run.exec(&format!("DROP TRIGGER {}", quote(name))).await?;
        }
    }

    let staging = format!("{table}{STAGING_SUFFIX}");
    run.exec(&rewrite_table_name(pristine_sql, table, &staging))
        .await?;

    let live_columns = inspect::columns_of(&mut *run.tx, table).await?;
    let pristine_columns = inspect::columns_of(&mut *pristine, table).await?;
    let delta = planner::diff_columns(&live_columns, &pristine_columns);
    debug!(
        table = %table,
        common = delta.common.len(),
        removed = delta.removed.len(),
        "rebuilding table"
    );
    if !delta.common.is_empty() {
        let columns = delta
            .common
            .iter()
            .map(|c| quote(c))
            .collect::<Vec<_>>()
            .join(", ");
        run.exec(&format!(
            "INSERT INTO {} ({columns}) SELECT {columns} FROM {}",
            quote(&staging),
            quote(table)
        ))
        .await?;
    }

    run.exec(&format!("DROP TABLE {}", quote(table))).await?;
    run.exec(&format!(
        "ALTER TABLE {} RENAME TO {}",
        quote(&staging),
        quote(table)
    ))
    .await?;

    // Reinstall the authoritative dependents from the pristine catalog.
    for dep in pristine_deps.values() {
        if matches!(dep.kind, ObjectKind::Index | ObjectKind::Trigger) {
            run.exec(&dep.sql).await?;
        }
    }
    Ok(())
}

/// Replaces every identifier equal to `table` in a `CREATE` statement with
/// `replacement`, preserving the original quoting style.
///
/// The statement is tokenized rather than pattern-matched: string literals
/// are skipped, bare words match on whole-word boundaries, and `"..."`,
/// `` `...` `` and `[...]` identifiers match on their unescaped content, so
/// names like `my-table` are rewritten correctly.
#[must_use]
pub fn rewrite_table_name(create_sql: &str, table: &str, replacement: &str) -> String {
    let bytes = create_sql.as_bytes();
    let mut out = String::with_capacity(create_sql.len() + STAGING_SUFFIX.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let end = scan_quoted(create_sql, i, b'\'');
                out.push_str(&create_sql[i..end]);
                i = end;
            }
            open @ (b'"' | b'`' | b'[') => {
                let close = if open == b'[' { b']' } else { open };
                let end = scan_quoted(create_sql, i, close);
                out.push_str(&rewrite_quoted(
                    &create_sql[i..end],
                    open as char,
                    close as char,
                    table,
                    replacement,
                ));
                i = end;
            }
            _ => {
                let c = head_char(create_sql, i);
                if is_ident_char(c) {
                    let mut j = i + c.len_utf8();
                    while j < bytes.len() {
                        let next = head_char(create_sql, j);
                        if is_ident_char(next) {
                            j += next.len_utf8();
                        } else {
                            break;
                        }
                    }
                    let word = &create_sql[i..j];
                    if word.eq_ignore_ascii_case(table) {
                        out.push_str(replacement);
                    } else {
                        out.push_str(word);
                    }
                    i = j;
                } else {
                    out.push(c);
                    i += c.len_utf8();
                }
            }
        }
    }
    out
}

fn rewrite_quoted(chunk: &str, open: char, close: char, table: &str, replacement: &str) -> String {
    let Some(inner) = chunk
        .strip_prefix(open)
        .and_then(|rest| rest.strip_suffix(close))
    else {
        // Unterminated; leave it alone.
        return chunk.to_string();
    };
    let escape: String = [close, close].iter().collect();
    let unescaped = inner.replace(&escape, &close.to_string());
    if unescaped.eq_ignore_ascii_case(table) {
        let escaped = replacement.replace(close, &escape);
        format!("{open}{escaped}{close}")
    } else {
        chunk.to_string()
    }
}

fn head_char(s: &str, i: usize) -> char {
    s[i..].chars().next().unwrap_or('\0')
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$' || !c.is_ascii()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rewrites_bare_name() {
        let sql = "CREATE TABLE foo (id INTEGER PRIMARY KEY)";
        assert_eq!(
            rewrite_table_name(sql, "foo", "foo_migration_new"),
            "CREATE TABLE foo_migration_new (id INTEGER PRIMARY KEY)"
        );
    }

    #[test]
    fn test_rewrite_is_case_insensitive() {
        let sql = "CREATE TABLE Foo (id INTEGER)";
        assert_eq!(
            rewrite_table_name(sql, "foo", "foo_migration_new"),
            "CREATE TABLE foo_migration_new (id INTEGER)"
        );
    }

    #[test]
    fn test_rewrites_self_reference() {
        let sql = "CREATE TABLE node (id INTEGER PRIMARY KEY, parent INTEGER REFERENCES node(id))";
        let rewritten = rewrite_table_name(sql, "node", "node_migration_new");
        assert_eq!(
            rewritten,
            "CREATE TABLE node_migration_new (id INTEGER PRIMARY KEY, \
             parent INTEGER REFERENCES node_migration_new(id))"
        );
    }

    #[test]
    fn test_does_not_touch_partial_words() {
        let sql = "CREATE TABLE food (foo_id INTEGER)";
        assert_eq!(
            rewrite_table_name(sql, "foo", "foo_migration_new"),
            "CREATE TABLE food (foo_id INTEGER)"
        );
    }

    #[test]
    fn test_rewrites_quoted_exotic_name() {
        let sql = r#"CREATE TABLE "my-table" ("user name" TEXT)"#;
        assert_eq!(
            rewrite_table_name(sql, "my-table", "my-table_migration_new"),
            r#"CREATE TABLE "my-table_migration_new" ("user name" TEXT)"#
        );
    }

    #[test]
    fn test_rewrites_bracket_and_backtick_styles() {
        assert_eq!(
            rewrite_table_name("CREATE TABLE [foo] (x)", "foo", "bar"),
            "CREATE TABLE [bar] (x)"
        );
        assert_eq!(
            rewrite_table_name("CREATE TABLE `foo` (x)", "foo", "bar"),
            "CREATE TABLE `bar` (x)"
        );
    }

    #[test]
    fn test_quoted_name_with_embedded_quote() {
        let sql = r#"CREATE TABLE "a""b" (x INTEGER)"#;
        let rewritten = rewrite_table_name(sql, "a\"b", "a\"b_migration_new");
        assert_eq!(rewritten, r#"CREATE TABLE "a""b_migration_new" (x INTEGER)"#);
    }

    #[test]
    fn test_string_literals_are_skipped() {
        let sql = "CREATE TABLE foo (label TEXT DEFAULT 'foo')";
        assert_eq!(
            rewrite_table_name(sql, "foo", "foo_migration_new"),
            "CREATE TABLE foo_migration_new (label TEXT DEFAULT 'foo')"
        );
    }

    #[test]
    fn test_other_quoted_identifiers_untouched() {
        let sql = r#"CREATE TABLE "foo" ("foot" TEXT, "foo" TEXT)"#;
        let rewritten = rewrite_table_name(sql, "foo", "foo_migration_new");
        assert_eq!(
            rewritten,
            r#"CREATE TABLE "foo_migration_new" ("foot" TEXT, "foo_migration_new" TEXT)"#
        );
    }
}
