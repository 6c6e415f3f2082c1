//! Structured query compiler
//!
//! Turns a [`SearchRequest`] into a parameterised SQL statement against the
//! `symbols` table. Text terms match as literal, ASCII-case-insensitive
//! substrings (`LIKE '%term%' ESCAPE '\'`); the FTS5 shadow table is not
//! consulted here.

use rusqlite::types::Value;

use crate::model::{SearchRequest, DEFAULT_SEARCH_LIMIT};

/// Separator that scopes a name search to a container: `Outer::inner`.
pub const CONTAINER_SEPARATOR: &str = "::";

pub(crate) const SELECT_COLUMNS: &str =
    "SELECT name, class_name, package_name, kind, file_path, line, signature, reference_to FROM symbols";

/// Compiled, ready-to-run query
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub limit: usize,
}

/// Compile a search request. Never fails: a request whose filters conflict
/// simply compiles to a query that returns no rows.
pub fn compile(request: &SearchRequest) -> CompiledQuery {
    let mut sql = String::from(SELECT_COLUMNS);
    sql.push_str(" WHERE 1=1");
    let mut params: Vec<Value> = Vec::new();

    if let Some(query) = non_blank(&request.query) {
        match query.split_once(CONTAINER_SEPARATOR) {
            Some((container, symbol)) => {
                sql.push_str(
                    " AND name LIKE ? ESCAPE '\\' AND (class_name LIKE ? ESCAPE '\\' OR package_name LIKE ? ESCAPE '\\')",
                );
                let container = contains_pattern(container.trim());
                params.push(Value::Text(contains_pattern(symbol.trim())));
                params.push(Value::Text(container.clone()));
                params.push(Value::Text(container));
            }
            None => {
                sql.push_str(
                    " AND (name LIKE ? ESCAPE '\\' OR class_name LIKE ? ESCAPE '\\' OR package_name LIKE ? ESCAPE '\\')",
                );
                let pattern = contains_pattern(query);
                for _ in 0..3 {
                    params.push(Value::Text(pattern.clone()));
                }
            }
        }
    }

    if let Some(class_name) = non_blank(&request.class_name) {
        sql.push_str(" AND class_name LIKE ? ESCAPE '\\'");
        params.push(Value::Text(contains_pattern(class_name)));
    }

    if let Some(package_name) = non_blank(&request.package_name) {
        sql.push_str(" AND package_name LIKE ? ESCAPE '\\'");
        params.push(Value::Text(contains_pattern(package_name)));
    }

    if let Some(glob) = non_blank(&request.file_path_glob) {
        sql.push_str(" AND file_path GLOB ?");
        params.push(Value::Text(glob.to_string()));
    }

    if let Some(kinds) = request.kinds.as_ref().filter(|kinds| !kinds.is_empty()) {
        let placeholders = vec!["?"; kinds.len()].join(", ");
        sql.push_str(&format!(" AND kind IN ({})", placeholders));
        params.extend(kinds.iter().map(|kind| Value::Text(kind.as_str().to_string())));
    }

    let limit = effective_limit(request.limit);
    sql.push_str(" LIMIT ?");
    params.push(Value::Integer(limit as i64));

    CompiledQuery { sql, params, limit }
}

/// A limit of zero means "unset" and falls back to the default bound.
fn effective_limit(limit: usize) -> usize {
    if limit == 0 {
        DEFAULT_SEARCH_LIMIT
    } else {
        limit
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// `%term%` with LIKE wildcards in `term` escaped.
fn contains_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
