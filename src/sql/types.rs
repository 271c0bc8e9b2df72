//! Column type mapping between SQL text and the schema graph.

use super::Dialect;

/// A parsed type reduced to its graph form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedType {
    pub base: String,
    /// SERIAL family: auto-increment with an implicit primary key.
    pub serial: bool,
}

/// Normalize a raw base type (without parameters) as read from SQL.
pub fn normalize_type(raw: &str) -> NormalizedType {
    let lower = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase();

    let (base, serial) = match lower.as_str() {
        "serial" | "serial4" => ("integer", true),
        "bigserial" | "serial8" => ("bigint", true),
        "smallserial" | "serial2" => ("smallint", true),
        "character varying" => ("varchar", false),
        "character" => ("char", false),
        "double precision" => ("double", false),
        "bool" => ("boolean", false),
        "timestamp with time zone" => ("timestamptz", false),
        "timestamp without time zone" => ("timestamp", false),
        other => (other, false),
    };

    NormalizedType {
        base: base.to_string(),
        serial,
    }
}

/// Render a graph base type for a dialect.
pub fn map_type(base: &str, params: &[String], dialect: Dialect) -> String {
    let lower = base.to_lowercase();
    let mapped = match dialect {
        Dialect::PostgreSQL => map_postgres_type(&lower),
        Dialect::MySQL => map_mysql_type(&lower, params),
        Dialect::SQLite => map_sqlite_type(&lower),
    };

    match mapped {
        Some(fixed) => fixed.to_string(),
        None => with_params(&lower.to_uppercase(), params),
    }
}

/// Integer type used with an auto-increment column.
pub fn map_auto_increment_type(base: &str, dialect: Dialect) -> String {
    let lower = base.to_lowercase();
    match dialect {
        Dialect::PostgreSQL => match lower.as_str() {
            "bigint" | "bigserial" => "BIGSERIAL",
            "smallint" | "smallserial" => "SMALLSERIAL",
            _ => "SERIAL",
        },
        Dialect::MySQL => match lower.as_str() {
            "bigint" | "bigserial" => "BIGINT",
            "smallint" | "smallserial" => "SMALLINT",
            _ => "INT",
        },
        Dialect::SQLite => "INTEGER",
    }
    .to_string()
}

/// Whether a graph type implies auto-increment on its own.
pub fn is_serial_type(base: &str) -> bool {
    normalize_type(base).serial
}

/// Base type words recognised when no parser context is available.
pub const KNOWN_TYPES: &[&str] = &[
    "int", "integer", "int2", "int4", "int8", "bigint", "smallint", "tinyint", "mediumint",
    "serial", "serial4", "serial8", "bigserial", "smallserial", "decimal", "numeric", "real",
    "float", "double", "money", "bool", "boolean", "char", "character", "varchar", "nvarchar",
    "text", "tinytext", "mediumtext", "longtext", "uuid", "date", "time", "timestamp",
    "timestamptz", "datetime", "interval", "json", "jsonb", "blob", "longblob", "bytea", "inet",
    "cidr", "enum",
];

pub fn is_known_type(word: &str) -> bool {
    KNOWN_TYPES.iter().any(|t| t.eq_ignore_ascii_case(word))
}

/// Words that may continue a multi-word type name.
const TYPE_CONTINUATIONS: &[&str] = &["precision", "varying", "with", "without", "time", "zone"];

/// Whether `word` can only extend the type before it (`timestamp WITH time zone`).
pub fn is_type_continuation(word: &str) -> bool {
    TYPE_CONTINUATIONS.iter().any(|w| w.eq_ignore_ascii_case(word))
}

/// A definition line opening with this word carries on the type of the line
/// before it rather than starting a new column.
pub fn continues_previous_type(word: &str) -> bool {
    is_type_continuation(word) && !is_known_type(word)
}

/// `VARCHAR` + `[20]` -> `VARCHAR(20)`; array suffixes stay after the parameters.
fn with_params(name: &str, params: &[String]) -> String {
    if params.is_empty() {
        return name.to_string();
    }
    let element = name.trim_end_matches("[]");
    format!("{}({}){}", element, params.join(","), &name[element.len()..])
}

fn map_postgres_type(base: &str) -> Option<&'static str> {
    let mapped = match base {
        "double" => "DOUBLE PRECISION",
        "datetime" => "TIMESTAMP",
        "tinyint" => "SMALLINT",
        "blob" | "longblob" => "BYTEA",
        "longtext" | "mediumtext" | "tinytext" => "TEXT",
        _ => return None,
    };
    Some(mapped)
}

fn map_mysql_type(base: &str, params: &[String]) -> Option<&'static str> {
    let mapped = match base {
        "uuid" => "VARCHAR(36)",
        "varchar" if params.is_empty() => "VARCHAR(255)",
        "integer" | "int4" => "INT",
        "int8" => "BIGINT",
        "int2" => "SMALLINT",
        "serial" => "INT",
        "bigserial" => "BIGINT",
        "boolean" => "BOOLEAN",
        "timestamptz" => "TIMESTAMP",
        "json" | "jsonb" => "JSON",
        "bytea" => "BLOB",
        "real" => "FLOAT",
        "inet" | "cidr" => "VARCHAR(45)",
        "interval" => "VARCHAR(64)",
        t if t.ends_with("[]") => "JSON",
        _ => return None,
    };
    Some(mapped)
}

fn map_sqlite_type(base: &str) -> Option<&'static str> {
    let mapped = match base {
        "uuid" => "TEXT",
        "int" | "integer" | "int4" | "int8" | "serial" | "bigserial" => "INTEGER",
        "json" | "jsonb" => "TEXT",
        "bytea" => "BLOB",
        "double" => "REAL",
        "inet" | "cidr" | "interval" => "TEXT",
        t if t.ends_with("[]") => "TEXT",
        _ => return None,
    };
    Some(mapped)
}
