//! SQL text normalization for semantic comparison.
//!
//! Two `CREATE` statements are considered equivalent iff their normalized
//! forms are byte-equal. The normalizer is lexical and conservative:
//! identifiers made of plain word characters lose their double quotes, while
//! anything else (e.g. `"my-table"`) keeps round-tripping unchanged.

/// Canonicalizes a SQL string for equality comparison.
///
/// Applied in order: `--` line comments are deleted, whitespace runs collapse
/// to a single space, whitespace around `(`, `)` and `,` is dropped, double
/// quotes around word-only identifiers are stripped, and the result is
/// trimmed.
#[must_use]
pub fn normalize(sql: &str) -> String {
    let stripped = strip_line_comments(sql);
    let collapsed = collapse_whitespace(&stripped);
    strip_identifier_quotes(&collapsed).trim().to_string()
}

/// Deletes `--` comments up to and including the following newline.
fn strip_line_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut rest = sql;
    while let Some(pos) = rest.find("--") {
        out.push_str(&rest[..pos]);
        rest = match rest[pos..].find('\n') {
            Some(newline) => &rest[pos + newline + 1..],
            None => "",
        };
    }
    out.push_str(rest);
    out
}

/// Collapses whitespace runs to one space and drops the space entirely when
/// it touches `(`, `)` or `,`.
fn collapse_whitespace(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut pending = false;
    for c in sql.chars() {
        if c.is_whitespace() {
            pending = true;
            continue;
        }
        if pending {
            pending = false;
            let tight = matches!(c, '(' | ')' | ',')
                || matches!(out.chars().last(), None | Some('(' | ')' | ','));
            if !tight {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Removes double quotes around identifiers that consist purely of word
/// characters. Single-quoted string literals are copied verbatim.
fn strip_identifier_quotes(sql: &str) -> String {
    let bytes = sql.as_bytes();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\'' => {
                let end = scan_quoted(sql, i, b'\'');
                out.push_str(&sql[i..end]);
                i = end;
            }
            b'"' => {
                let end = scan_quoted(sql, i, b'"');
                let chunk = &sql[i..end];
                match chunk.strip_prefix('"').and_then(|c| c.strip_suffix('"')) {
                    Some(inner) if is_plain_identifier(inner) => out.push_str(inner),
                    _ => out.push_str(chunk),
                }
                i = end;
            }
            _ => {
                let c = sql[i..].chars().next().unwrap_or_default();
                out.push(c);
                i += c.len_utf8().max(1);
            }
        }
    }
    out
}

/// Scans past a quoted region starting at `start` (which must point at the
/// opening quote). Doubled quote characters are treated as escapes. Returns
/// the index one past the closing quote, or the end of the string when the
/// region is unterminated.
pub(crate) fn scan_quoted(sql: &str, start: usize, quote: u8) -> usize {
    let bytes = sql.as_bytes();
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn is_plain_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
