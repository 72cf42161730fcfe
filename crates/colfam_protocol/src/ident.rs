//! Identifier quoting and literal escaping.

/// Keywords that cannot appear bare as keyspace, table or column names.
pub const RESERVED_KEYWORDS: &[&str] = &[
    "add", "allow", "alter", "and", "apply", "asc", "authorize", "batch", "begin", "by",
    "columnfamily", "create", "default", "delete", "desc", "describe", "drop", "entries",
    "execute", "from", "full", "grant", "if", "in", "index", "infinity", "insert", "into",
    "is", "keyspace", "limit", "materialized", "mbean", "mbeans", "modify", "nan",
    "norecursive", "not", "null", "of", "on", "or", "order", "primary", "rename", "replace",
    "revoke", "schema", "select", "set", "table", "to", "token", "truncate", "unlogged",
    "unset", "update", "use", "using", "view", "where", "with",
];

pub fn is_reserved_keyword(word: &str) -> bool {
    let lower = word.to_ascii_lowercase();
    RESERVED_KEYWORDS.contains(&lower.as_str())
}

/// True when `name` cannot be written bare without changing its meaning.
///
/// Unquoted identifiers are case-folded by the server, so anything with an
/// upper-case letter has to be quoted to survive.
pub fn needs_quoting(name: &str) -> bool {
    let mut chars = name.chars();
    let starts_ok = matches!(chars.next(), Some(c) if c.is_ascii_lowercase());
    let rest_ok = chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_');
    !(starts_ok && rest_ok) || is_reserved_keyword(name)
}

/// Always double-quote; embedded quotes are doubled.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote only when [`needs_quoting`] says so.
pub fn format_identifier(name: &str) -> String {
    if needs_quoting(name) {
        quote_identifier(name)
    } else {
        name.to_string()
    }
}

/// Strip one level of double quotes, undoing [`quote_identifier`].
///
/// Bare identifiers are returned unchanged (the catalog already reports
/// their folded form).
pub fn unquote_identifier(raw: &str) -> String {
    let trimmed = raw.trim();
    match trimmed
        .strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
    {
        Some(inner) => inner.replace("\"\"", "\""),
        None => trimmed.to_string(),
    }
}

/// Render a string literal with single quotes doubled.
pub fn escape_string_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
