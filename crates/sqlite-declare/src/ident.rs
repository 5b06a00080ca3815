//! Identifier quoting and the pragma whitelist.
//!
//! Every identifier interpolated into generated SQL goes through [`quote`],
//! and every pragma statement is built by the helpers here, which refuse any
//! pragma name outside [`SAFE_PRAGMAS`].

use crate::error::{MigrateError, Result};

/// The pragmas the engine may read, set, or call. Everything else is refused
/// with [`MigrateError::UnsafePragma`].
pub const SAFE_PRAGMAS: &[&str] = &[
    "foreign_keys",
    "user_version",
    "defer_foreign_keys",
    "foreign_key_check",
    "table_info",
];

/// Quotes an identifier for interpolation into SQL, doubling any embedded
/// double quotes.
#[must_use]
pub fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn ensure_safe(name: &str) -> Result<()> {
    if SAFE_PRAGMAS.contains(&name) {
        Ok(())
    } else {
        Err(MigrateError::UnsafePragma(name.to_string()))
    }
}

/// Builds a `PRAGMA <name>` read statement.
pub fn pragma_query(name: &str) -> Result<String> {
    ensure_safe(name)?;
    Ok(format!("PRAGMA {name}"))
}

/// Builds a `PRAGMA <name> = <value>` statement.
pub fn pragma_set(name: &str, value: impl std::fmt::Display) -> Result<String> {
    ensure_safe(name)?;
    Ok(format!("PRAGMA {name} = {value}"))
}

/// Builds a `PRAGMA <name>(<arg>)` call. The argument must already be quoted
/// by the caller.
pub fn pragma_call(name: &str, quoted_arg: &str) -> Result<String> {
    ensure_safe(name)?;
    Ok(format!("PRAGMA {name}({quoted_arg})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_plain_name() {
        assert_eq!(quote("users"), "\"users\"");
    }

    #[test]
    fn test_quote_doubles_embedded_quotes() {
        assert_eq!(quote("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_quote_keeps_punctuation() {
        assert_eq!(quote("my-table"), "\"my-table\"");
        assert_eq!(quote("email@address"), "\"email@address\"");
    }

    #[test]
    fn test_whitelisted_pragmas_pass() {
        for name in SAFE_PRAGMAS {
            assert!(pragma_query(name).is_ok());
        }
        assert_eq!(pragma_set("user_version", 3).unwrap(), "PRAGMA user_version = 3");
        assert_eq!(
            pragma_call("table_info", "\"users\"").unwrap(),
            "PRAGMA table_info(\"users\")"
        );
    }

    #[test]
    fn test_unlisted_pragma_is_refused() {
        let err = pragma_set("journal_mode", "WAL").unwrap_err();
        assert!(matches!(err, MigrateError::UnsafePragma(_)));
        assert!(err.to_string().contains("Unsafe pragma name"));
    }
}
