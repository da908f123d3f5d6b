//! Placeholder discovery and rewriting.
//!
//! Templates use one of two dialects: bare `?` markers bound by position, or `:name` markers bound
//! from a map. Either way the output is positional-only SQL plus a flat value list, with list
//! values expanded into one `?` per element. `:groupby` and `:orderby` name columns rather than
//! values, so they are validated against an identifier allow-list and spliced into the text.

use std::collections::HashSet;

use lazy_static::lazy_static;
use regex::Regex;

mod parsers;
mod scanner;

use parsers::{is_block_comment_end, is_block_comment_start, is_double_colon, is_line_comment_start};
use scanner::{State, scan_digits, scan_word};

use crate::error::BindingError;
use crate::params::{NamedParams, ParamValue, Params};
use crate::types::RowValues;

lazy_static! {
    static ref IDENTIFIER_ALLOW_LIST: Regex =
        Regex::new(r"^[a-zA-Z0-9_ ]*$").expect("identifier allow-list is a valid regex");
}

/// Named placeholders that designate column identifiers instead of bound values.
pub const IDENTIFIER_CLAUSES: [&str; 2] = ["groupby", "orderby"];

/// A placeholder found in a SQL template, with its byte offset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placeholder {
    Positional { offset: usize },
    Named { offset: usize, name: String },
}

impl Placeholder {
    #[must_use]
    pub fn offset(&self) -> usize {
        match self {
            Placeholder::Positional { offset } | Placeholder::Named { offset, .. } => *offset,
        }
    }

    /// Byte offset just past the placeholder.
    #[must_use]
    pub fn end(&self) -> usize {
        match self {
            Placeholder::Positional { offset } => offset + 1,
            Placeholder::Named { offset, name } => offset + 1 + name.len(),
        }
    }
}

/// Placeholder dialect of a template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// No placeholders at all.
    None,
    /// `?` markers.
    Positional,
    /// `:name` markers.
    Named,
}

/// Positional SQL and the values to bind to it, in marker order.
#[derive(Debug, Clone, PartialEq)]
pub struct RewrittenQuery {
    pub sql: String,
    pub params: Vec<RowValues>,
}

/// Find every placeholder outside string literals, quoted identifiers and comments.
///
/// # Errors
/// Returns [`BindingError::NumberedPlaceholder`] for `?NNN` markers.
pub fn scan_placeholders(sql: &str) -> Result<Vec<Placeholder>, BindingError> {
    let bytes = sql.as_bytes();
    let mut found = Vec::new();
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match state {
            State::Normal => match b {
                b'\'' => state = State::SingleQuoted,
                b'"' => state = State::DoubleQuoted,
                b'`' => state = State::BacktickQuoted,
                _ if is_line_comment_start(bytes, idx) => {
                    state = State::LineComment;
                    idx += 1;
                }
                _ if is_block_comment_start(bytes, idx) => {
                    state = State::BlockComment;
                    idx += 1;
                }
                b'?' => {
                    if let Some((_, digits)) = scan_digits(bytes, idx + 1) {
                        return Err(BindingError::NumberedPlaceholder(digits.to_string()));
                    }
                    found.push(Placeholder::Positional { offset: idx });
                }
                b':' if !is_double_colon(bytes, idx) => {
                    if let Some((end, name)) = scan_word(bytes, idx + 1) {
                        found.push(Placeholder::Named {
                            offset: idx,
                            name: name.to_string(),
                        });
                        idx = end - 1;
                    }
                }
                _ => {}
            },
            State::SingleQuoted => state = close_quote(bytes, &mut idx, b'\'', state),
            State::DoubleQuoted => state = close_quote(bytes, &mut idx, b'"', state),
            State::BacktickQuoted => state = close_quote(bytes, &mut idx, b'`', state),
            State::LineComment => {
                if b == b'\n' {
                    state = State::Normal;
                }
            }
            State::BlockComment => {
                if is_block_comment_end(bytes, idx) {
                    state = State::Normal;
                    idx += 1;
                }
            }
        }
        idx += 1;
    }

    Ok(found)
}

fn close_quote(bytes: &[u8], idx: &mut usize, quote: u8, current: State) -> State {
    if bytes[*idx] != quote {
        return current;
    }
    if bytes.get(*idx + 1) == Some(&quote) {
        *idx += 1; // doubled quote is an escape
        current
    } else {
        State::Normal
    }
}

/// Classify a template's placeholders.
///
/// # Errors
/// Returns [`BindingError::MixedPlaceholders`] when `?` and `:name` both appear.
pub fn detect_dialect(placeholders: &[Placeholder]) -> Result<Dialect, BindingError> {
    let positional = placeholders
        .iter()
        .any(|p| matches!(p, Placeholder::Positional { .. }));
    let named = placeholders
        .iter()
        .any(|p| matches!(p, Placeholder::Named { .. }));
    match (positional, named) {
        (true, true) => Err(BindingError::MixedPlaceholders),
        (true, false) => Ok(Dialect::Positional),
        (false, true) => Ok(Dialect::Named),
        (false, false) => Ok(Dialect::None),
    }
}

fn prepare(sql: &str) -> Result<(Vec<Placeholder>, Dialect), BindingError> {
    let placeholders = scan_placeholders(sql)?;
    let dialect = detect_dialect(&placeholders)?;
    Ok((placeholders, dialect))
}

/// Rewrite a template against a normalized parameter set.
///
/// ```rust
/// use sql_decorate::params;
/// use sql_decorate::rewrite::rewrite;
///
/// let out = rewrite(
///     "update t set cnt=? where name in (?) limit ?;",
///     params!["x", vec!["a", "b"], 1],
/// )
/// .unwrap();
/// assert_eq!(out.sql, "update t set cnt=? where name in (?, ?) limit ?;");
/// assert_eq!(out.params.len(), 4);
/// ```
///
/// # Errors
/// Returns a [`BindingError`] when the parameters do not fit the template.
pub fn rewrite(sql: &str, params: Params) -> Result<RewrittenQuery, BindingError> {
    let (placeholders, dialect) = prepare(sql)?;
    match (dialect, params) {
        (_, Params::Batch(_)) => Err(BindingError::DialectMismatch(
            "batch parameters are only accepted by batch inserts".into(),
        )),
        (Dialect::Positional, Params::Named(_)) => Err(BindingError::DialectMismatch(
            "query uses `?` placeholders but named parameters were supplied".into(),
        )),
        (Dialect::Named, Params::Positional(_)) => Err(BindingError::DialectMismatch(
            "query uses `:name` placeholders but positional parameters were supplied".into(),
        )),
        (_, Params::Named(map)) => bind_named(sql, &placeholders, &map),
        (_, Params::Positional(values)) => bind_positional(sql, &placeholders, values),
    }
}

/// Rewrite a `?` template, expanding list entries.
///
/// # Errors
/// Returns a [`BindingError`] on count mismatches, empty lists, or a `:name` template.
pub fn rewrite_positional(sql: &str, values: Vec<ParamValue>) -> Result<RewrittenQuery, BindingError> {
    rewrite(sql, Params::Positional(values))
}

/// Rewrite a `:name` template from a parameter map.
///
/// # Errors
/// Returns a [`BindingError`] on missing or unused keys, bad identifier values, or a `?` template.
pub fn rewrite_named(sql: &str, params: &NamedParams) -> Result<RewrittenQuery, BindingError> {
    let (placeholders, dialect) = prepare(sql)?;
    if dialect == Dialect::Positional {
        return Err(BindingError::DialectMismatch(
            "query uses `?` placeholders but named parameters were supplied".into(),
        ));
    }
    bind_named(sql, &placeholders, params)
}

/// Check a batch of rows against a `?` template. Batch rows never expand lists.
///
/// # Errors
/// Returns a [`BindingError`] for named templates, empty batches, or rows of the wrong width.
pub fn validate_batch(sql: &str, rows: &[Vec<RowValues>]) -> Result<(), BindingError> {
    let (placeholders, dialect) = prepare(sql)?;
    if dialect == Dialect::Named {
        return Err(BindingError::DialectMismatch(
            "batch inserts only accept `?` placeholders".into(),
        ));
    }
    if rows.is_empty() {
        return Err(BindingError::EmptyBatch);
    }
    let expected = placeholders.len();
    if let Some(row) = rows.iter().find(|row| row.len() != expected) {
        return Err(BindingError::PlaceholderCountMismatch {
            expected,
            supplied: row.len(),
        });
    }
    Ok(())
}

fn bind_positional(
    sql: &str,
    placeholders: &[Placeholder],
    values: Vec<ParamValue>,
) -> Result<RewrittenQuery, BindingError> {
    if values.len() != placeholders.len() {
        return Err(BindingError::PlaceholderCountMismatch {
            expected: placeholders.len(),
            supplied: values.len(),
        });
    }

    let mut out = String::with_capacity(sql.len() + 8);
    let mut bound = Vec::with_capacity(values.len());
    let mut cursor = 0;
    for (position, (placeholder, value)) in placeholders.iter().zip(values).enumerate() {
        out.push_str(&sql[cursor..placeholder.offset()]);
        match value {
            ParamValue::Scalar(v) => {
                out.push('?');
                bound.push(v);
            }
            ParamValue::List(list) => {
                if list.is_empty() {
                    return Err(BindingError::EmptyList(format!("position {position}")));
                }
                push_markers(&mut out, list.len());
                bound.extend(list);
            }
        }
        cursor = placeholder.end();
    }
    out.push_str(&sql[cursor..]);

    Ok(RewrittenQuery {
        sql: out,
        params: bound,
    })
}

fn bind_named(
    sql: &str,
    placeholders: &[Placeholder],
    params: &NamedParams,
) -> Result<RewrittenQuery, BindingError> {
    let mut referenced = HashSet::new();
    let mut out = String::with_capacity(sql.len() + 8);
    let mut bound = Vec::new();
    let mut cursor = 0;

    for placeholder in placeholders {
        let Placeholder::Named { offset, name } = placeholder else {
            continue;
        };
        let value = params
            .get(name)
            .ok_or_else(|| BindingError::MissingNamedParam(name.clone()))?;
        referenced.insert(name.as_str());

        out.push_str(&sql[cursor..*offset]);
        if IDENTIFIER_CLAUSES.contains(&name.as_str()) {
            out.push_str(&identifier_text(name, value)?);
        } else {
            match value {
                ParamValue::Scalar(v) => {
                    out.push('?');
                    bound.push(v.clone());
                }
                ParamValue::List(list) => {
                    if list.is_empty() {
                        return Err(BindingError::EmptyList(format!(":{name}")));
                    }
                    push_markers(&mut out, list.len());
                    bound.extend(list.iter().cloned());
                }
            }
        }
        cursor = placeholder.end();
    }
    out.push_str(&sql[cursor..]);

    let mut unused: Vec<&String> = params
        .keys()
        .filter(|key| !referenced.contains(key.as_str()))
        .collect();
    unused.sort();
    if let Some(key) = unused.first() {
        return Err(BindingError::UnusedNamedParam((*key).clone()));
    }

    Ok(RewrittenQuery {
        sql: out,
        params: bound,
    })
}

fn push_markers(out: &mut String, count: usize) {
    for i in 0..count {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('?');
    }
}

fn identifier_text(name: &str, value: &ParamValue) -> Result<String, BindingError> {
    match value {
        ParamValue::Scalar(v) => identifier_part(name, v).map(str::to_string),
        ParamValue::List(list) => {
            if list.is_empty() {
                return Err(BindingError::EmptyList(format!(":{name}")));
            }
            let parts = list
                .iter()
                .map(|v| identifier_part(name, v))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(parts.join(","))
        }
    }
}

fn identifier_part<'v>(name: &str, value: &'v RowValues) -> Result<&'v str, BindingError> {
    match value.as_text() {
        Some(text) if IDENTIFIER_ALLOW_LIST.is_match(text) => Ok(text),
        Some(text) => Err(BindingError::InvalidIdentifier {
            name: name.to_string(),
            value: text.to_string(),
        }),
        None => Err(BindingError::InvalidIdentifier {
            name: name.to_string(),
            value: format!("{value:?}"),
        }),
    }
}
