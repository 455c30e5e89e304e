//! SQL text generation and size accounting for multi-row INSERT statements.

use crate::database::value::Value;

/// Reserved SQL keywords that need quoting.
const RESERVED_KEYWORDS: &[&str] = &[
    "all", "analyse", "analyze", "and", "any", "as", "asc", "case", "check", "column", "constraint",
    "create", "default", "desc", "distinct", "do", "else", "end", "for", "foreign", "from", "grant",
    "group", "having", "in", "index", "key", "limit", "not", "null", "offset", "on", "or", "order",
    "primary", "references", "select", "table", "then", "to", "union", "unique", "user", "using",
    "when", "where", "with",
];

/// Bytes between two tuples in a VALUES list.
pub const TUPLE_SEPARATOR_LEN: usize = 1;

#[derive(thiserror::Error, Debug, PartialEq)]
#[error("{param_count} parameters can not be split into rows of {fields_per_row} fields")]
pub struct UnevenParamsError {
    pub param_count: usize,
    pub fields_per_row: usize,
}

/// Quotes an identifier if it's a reserved keyword.
#[inline]
pub fn quote_identifier(name: &str) -> String {
    if RESERVED_KEYWORDS.contains(&name.to_ascii_lowercase().as_str()) {
        format!("\"{}\"", name)
    } else {
        name.to_string()
    }
}

/// Formats a table name, handling schema.table format. The prefix is applied to the
/// table part only.
pub fn format_table_name(prefix: &str, table_name: &str) -> String {
    match table_name.split_once('.') {
        Some((schema, table)) => {
            let schema = schema.trim_matches('"');
            let table = table.trim_matches('"');
            format!("\"{}\".\"{}{}\"", schema, prefix, table)
        }
        None => quote_identifier(&format!("{}{}", prefix, table_name)),
    }
}

/// Builds `INSERT INTO table (col1,col2) VALUES ` including the trailing space.
pub fn build_insert_header(formatted_table_name: &str, columns: &[String]) -> String {
    let formatted_columns =
        columns.iter().map(|col| quote_identifier(col)).collect::<Vec<_>>().join(",");

    format!("INSERT INTO {} ({}) VALUES ", formatted_table_name, formatted_columns)
}

/// Builds `($1,$2),($3,$4)` for `rows` rows of `total_columns` placeholders.
pub fn build_placeholder_rows(rows: usize, total_columns: usize) -> String {
    let mut query = String::new();
    for i in 0..rows {
        if i > 0 {
            query.push(',');
        }
        let placeholders: Vec<String> =
            (0..total_columns).map(|j| format!("${}", i * total_columns + j + 1)).collect();
        query.push_str(&format!("({})", placeholders.join(",")));
    }
    query
}

/// Length of `(v1,v2,...)` with every value rendered as a SQL literal.
pub fn tuple_literal_len(values: &[Value]) -> usize {
    let commas = values.len().saturating_sub(1);
    values.iter().map(Value::sql_literal_len).sum::<usize>() + commas + 2
}

/// Length of a flat parameter list rendered as comma separated tuples of
/// `fields_per_row` literals, e.g. `('a',NULL),('c','d')`.
pub fn sql_length_for_params(
    params: &[Value],
    fields_per_row: usize,
) -> Result<usize, UnevenParamsError> {
    if fields_per_row == 0 || params.len() % fields_per_row != 0 {
        return Err(UnevenParamsError { param_count: params.len(), fields_per_row });
    }

    let rows = params.len() / fields_per_row;
    let tuples: usize = params.chunks(fields_per_row).map(tuple_literal_len).sum();

    Ok(tuples + rows.saturating_sub(1) * TUPLE_SEPARATOR_LEN)
}
