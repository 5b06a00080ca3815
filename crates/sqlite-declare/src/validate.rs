//! Target-script validation.
//!
//! Rejects schema scripts containing statements the engine refuses to feed to
//! the pristine database: `ATTACH DATABASE`, `DETACH DATABASE`, and pragmas
//! outside the whitelist. The scan is lexical and case-insensitive.

use crate::error::{MigrateError, Result};
use crate::ident::SAFE_PRAGMAS;

/// Validates a schema script before pristine initialization.
///
/// Empty or whitespace-only scripts pass; the orchestrator then skips
/// pristine initialization entirely.
pub fn validate_schema(schema: &str) -> Result<()> {
    let lower = schema.to_ascii_lowercase();
    let words: Vec<&str> = lower
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .collect();

    for (i, word) in words.iter().enumerate() {
        let next = words.get(i + 1).copied();
        match *word {
            "attach" if next == Some("database") => {
                return Err(MigrateError::InvalidSchema(
                    "ATTACH DATABASE not allowed".into(),
                ));
            }
            "detach" if next == Some("database") => {
                return Err(MigrateError::InvalidSchema(
                    "DETACH DATABASE not allowed".into(),
                ));
            }
            "pragma" => {
                if let Some(name) = next
                    && !SAFE_PRAGMAS.contains(&name)
                {
                    return Err(MigrateError::InvalidSchema(format!("unsafe PRAGMA {name}")));
                }
            }
            _ => {}
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_script_passes() {
        assert!(validate_schema("").is_ok());
        assert!(validate_schema("   \n\t  ").is_ok());
    }

    #[test]
    fn test_plain_ddl_passes() {
        let schema = "CREATE TABLE users (id INTEGER PRIMARY KEY);\n\
                      CREATE INDEX idx_users ON users (id);";
        assert!(validate_schema(schema).is_ok());
    }

    #[test]
    fn test_attach_database_is_rejected() {
        let err = validate_schema("ATTACH DATABASE 'other.db' AS other;").unwrap_err();
        assert!(err.to_string().contains("ATTACH DATABASE"));
    }

    #[test]
    fn test_detach_database_is_rejected() {
        let err = validate_schema("detach database other;").unwrap_err();
        assert!(err.to_string().contains("DETACH DATABASE"));
    }

    #[test]
    fn test_rejection_is_case_insensitive() {
        assert!(validate_schema("AtTaCh DaTaBaSe 'x' AS y;").is_err());
    }

    #[test]
    fn test_whitelisted_pragmas_pass() {
        let schema = "PRAGMA user_version = 3;\nPRAGMA foreign_keys = ON;";
        assert!(validate_schema(schema).is_ok());
    }

    #[test]
    fn test_unlisted_pragma_is_rejected() {
        let err = validate_schema("PRAGMA journal_mode = WAL;").unwrap_err();
        assert!(err.to_string().contains("unsafe PRAGMA"));
    }

    #[test]
    fn test_table_named_like_keyword_passes() {
        assert!(validate_schema("CREATE TABLE attach_log (id INTEGER);").is_ok());
    }
}
