//! Rendering of a schema graph as dialect-specific DDL.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use tracing::debug;
use unicode_width::UnicodeWidthStr;

use super::lexer::is_plain_identifier;
use super::types::{is_serial_type, map_auto_increment_type, map_type};
use super::Dialect;
use crate::graph::{Column, ColumnConstraint, EnumType, SchemaGraph, Settings, Table};
use crate::reconcile::slug;

/// Marker line opening the out-of-line foreign key section.
pub const FOREIGN_KEY_SECTION: &str = "-- Foreign Key Constraints";

/// Render `graph` with `settings`, stamping the current time in the header.
pub fn generate_sql(graph: &SchemaGraph, settings: &Settings) -> String {
    SqlGenerator::new(*settings).generate(graph)
}

/// A foreign key as it will be emitted.
#[derive(Debug, Clone, PartialEq)]
struct ForeignKeySpec {
    source_table: String,
    source_column: String,
    target_table: String,
    target_column: String,
    on_delete: Option<String>,
    on_update: Option<String>,
}

impl ForeignKeySpec {
    fn canonical_key(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.source_table, self.source_column, self.target_table, self.target_column
        )
        .to_lowercase()
    }
}

pub struct SqlGenerator {
    settings: Settings,
    timestamp: Option<String>,
}

impl SqlGenerator {
    pub fn new(settings: Settings) -> Self {
        Self {
            settings,
            timestamp: None,
        }
    }

    /// Use a fixed header timestamp instead of the current time.
    pub fn with_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.timestamp = Some(timestamp.into());
        self
    }

    fn dialect(&self) -> Dialect {
        self.settings.dialect
    }

    /// SQLite cannot add constraints after the fact, so it always inlines.
    fn inline(&self) -> bool {
        self.settings.use_inline_constraints || !self.dialect().supports_alter_constraint()
    }

    pub fn generate(&self, graph: &SchemaGraph) -> String {
        let mut sql = String::new();
        self.write_header(&mut sql);

        if self.dialect() == Dialect::PostgreSQL && !graph.enums.is_empty() {
            for enum_type in &graph.enums {
                self.write_enum(&mut sql, enum_type);
            }
            sql.push('\n');
        }

        let foreign_keys = collect_foreign_keys(graph);
        let mut inline_refs: HashMap<&str, Vec<&ForeignKeySpec>> = HashMap::new();
        if self.inline() {
            for fk in &foreign_keys {
                inline_refs.entry(fk.source_table.as_str()).or_default().push(fk);
            }
        }

        for table in &graph.tables {
            let refs = inline_refs.get(table.name.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            self.write_table(&mut sql, graph, table, refs);
        }

        if !self.inline() && !foreign_keys.is_empty() {
            self.write_foreign_key_section(&mut sql, &foreign_keys);
        }

        debug!(
            dialect = %self.dialect(),
            tables = graph.tables.len(),
            foreign_keys = foreign_keys.len(),
            "Generated SQL"
        );

        sql
    }

    fn write_header(&self, sql: &mut String) {
        let timestamp = self
            .timestamp
            .clone()
            .unwrap_or_else(|| chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));

        let _ = writeln!(sql, "-- Generated by schemasync");
        let _ = writeln!(sql, "-- Dialect: {}", self.dialect());
        let _ = writeln!(sql, "-- Generated at: {}", timestamp);
        sql.push('\n');
    }

    fn write_enum(&self, sql: &mut String, enum_type: &EnumType) {
        let _ = writeln!(
            sql,
            "CREATE TYPE {} AS ENUM ({});",
            self.quote(&enum_type.name),
            string_list(&enum_type.values, self.dialect())
        );
    }

    fn write_table(
        &self,
        sql: &mut String,
        graph: &SchemaGraph,
        table: &Table,
        inline_refs: &[&ForeignKeySpec],
    ) {
        let references: HashMap<&str, &ForeignKeySpec> = inline_refs
            .iter()
            .map(|fk| (fk.source_column.as_str(), *fk))
            .collect();

        let primary: Vec<&Column> = table.columns.iter().filter(|c| c.is_primary()).collect();
        let promote_primary = primary.len() > 1
            || primary
                .iter()
                .any(|c| references.contains_key(c.title.as_str()));

        let names: Vec<String> = table.columns.iter().map(|c| self.quote(&c.title)).collect();
        let width = names.iter().map(|n| n.width()).max().unwrap_or(0);

        let mut items: Vec<String> = table
            .columns
            .iter()
            .zip(&names)
            .map(|(column, name)| {
                let padding = " ".repeat(width - name.width());
                let definition = self.column_definition(
                    graph,
                    column,
                    promote_primary,
                    references.get(column.title.as_str()).copied(),
                );
                format!("{}{} {}", name, padding, definition)
            })
            .collect();

        if promote_primary {
            let cols: Vec<String> = primary.iter().map(|c| self.quote(&c.title)).collect();
            items.push(format!("PRIMARY KEY ({})", cols.join(", ")));
        }

        if self.dialect() == Dialect::MySQL {
            // MySQL parses but ignores column-level REFERENCES
            for fk in inline_refs {
                items.push(format!(
                    "FOREIGN KEY ({}) {}",
                    self.quote(&fk.source_column),
                    self.references_clause(fk)
                ));
            }
        }

        let _ = writeln!(sql, "CREATE TABLE IF NOT EXISTS {} (", self.quote(&table.name));
        for (i, item) in items.iter().enumerate() {
            let separator = if i + 1 < items.len() { "," } else { "" };
            let _ = writeln!(sql, "    {}{}", item, separator);
        }
        sql.push_str(");\n");

        for column in &table.columns {
            if column.has(ColumnConstraint::Index) && !column.is_primary() {
                self.write_index(sql, table, column);
            }
        }
        sql.push('\n');
    }

    fn column_definition(
        &self,
        graph: &SchemaGraph,
        column: &Column,
        promote_primary: bool,
        reference: Option<&ForeignKeySpec>,
    ) -> String {
        let mut parts = Vec::new();
        let auto_increment = column.auto_increment || is_serial_type(&column.data_type);
        let inline_primary = column.is_primary() && !promote_primary;
        let mut primary_emitted = false;

        if let Some(enum_name) = column.enum_name() {
            parts.push(self.enum_column_type(graph, enum_name, &column.title));
        } else if auto_increment {
            let base = map_auto_increment_type(&column.data_type, self.dialect());
            match self.dialect() {
                Dialect::SQLite if inline_primary => {
                    parts.push(format!("{} PRIMARY KEY AUTOINCREMENT", base));
                    primary_emitted = true;
                }
                Dialect::MySQL => parts.push(format!("{} AUTO_INCREMENT", base)),
                _ => parts.push(base),
            }
        } else {
            parts.push(map_type(&column.data_type, &column.params, self.dialect()));
        }

        if let Some(default) = &column.default {
            parts.push(format!("DEFAULT {}", default_literal(default, self.dialect())));
        }
        if column.has(ColumnConstraint::NotNull) {
            parts.push("NOT NULL".to_string());
        }
        if column.has(ColumnConstraint::Unique) {
            parts.push("UNIQUE".to_string());
        }
        if inline_primary && !primary_emitted {
            parts.push("PRIMARY KEY".to_string());
        }
        if let Some(fk) = reference {
            if self.dialect() != Dialect::MySQL {
                parts.push(self.references_clause(fk));
            }
        }

        parts.join(" ")
    }

    fn enum_column_type(&self, graph: &SchemaGraph, enum_name: &str, column: &str) -> String {
        let enum_type = graph.enum_by_name(enum_name);
        match (self.dialect(), enum_type) {
            (Dialect::PostgreSQL, Some(e)) => self.quote(&e.name),
            (Dialect::PostgreSQL, None) => self.quote(enum_name),
            (Dialect::MySQL, Some(e)) => {
                format!("ENUM({})", string_list(&e.values, Dialect::MySQL))
            }
            (Dialect::MySQL, None) => "VARCHAR(255)".to_string(),
            (Dialect::SQLite, Some(e)) => format!(
                "TEXT CHECK ({} IN ({}))",
                self.quote(column),
                string_list(&e.values, Dialect::SQLite)
            ),
            (Dialect::SQLite, None) => "TEXT".to_string(),
        }
    }

    fn references_clause(&self, fk: &ForeignKeySpec) -> String {
        let mut clause = format!(
            "REFERENCES {}({})",
            self.quote(&fk.target_table),
            self.quote(&fk.target_column)
        );
        if let Some(action) = &fk.on_delete {
            let _ = write!(clause, " ON DELETE {}", action);
        }
        if let Some(action) = &fk.on_update {
            let _ = write!(clause, " ON UPDATE {}", action);
        }
        clause
    }

    fn write_index(&self, sql: &mut String, table: &Table, column: &Column) {
        let name = format!("idx_{}_{}", slug(&table.name), slug(&column.title));
        let if_not_exists = match self.dialect() {
            Dialect::MySQL => "",
            _ => "IF NOT EXISTS ",
        };
        let _ = writeln!(
            sql,
            "CREATE INDEX {}{} ON {} ({});",
            if_not_exists,
            self.quote(&name),
            self.quote(&table.name),
            self.quote(&column.title)
        );
    }

    fn write_foreign_key_section(&self, sql: &mut String, foreign_keys: &[ForeignKeySpec]) {
        let _ = writeln!(sql, "{}", FOREIGN_KEY_SECTION);

        let mut names = HashSet::new();
        for fk in foreign_keys {
            let base = format!("fk_{}_{}", slug(&fk.source_table), slug(&fk.source_column));
            let mut name = base.clone();
            let mut n = 2;
            while !names.insert(name.clone()) {
                name = format!("{}_{}", base, n);
                n += 1;
            }

            let _ = writeln!(
                sql,
                "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) {};",
                self.quote(&fk.source_table),
                self.quote(&name),
                self.quote(&fk.source_column),
                self.references_clause(fk)
            );
        }
    }

    /// Quote an identifier per dialect and settings.
    ///
    /// Names the lexer would not read back as a single bare identifier
    /// (whitespace, punctuation, keywords) are always quoted.
    pub fn quote(&self, name: &str) -> String {
        if !self.settings.case_sensitive_identifiers && is_plain_identifier(name) {
            return name.to_string();
        }
        let q = self.dialect().quote_char();
        let escaped = name.replace(q, &format!("{}{}", q, q));
        format!("{}{}{}", q, escaped, q)
    }
}

/// Foreign keys from non-enum edges plus unresolved column references,
/// deduplicated by a lowercase canonical key.
fn collect_foreign_keys(graph: &SchemaGraph) -> Vec<ForeignKeySpec> {
    let mut seen = HashSet::new();
    let mut specs = Vec::new();

    for edge in graph.foreign_keys() {
        let (Some(source), Some(target)) = (graph.table(&edge.source), graph.table(&edge.target))
        else {
            continue;
        };
        let source_column = edge.source_column();
        let actions = source
            .column(source_column)
            .and_then(|c| c.foreign_key.as_ref())
            .filter(|fk| fk.table.eq_ignore_ascii_case(&target.name));

        let spec = ForeignKeySpec {
            source_table: source.name.clone(),
            source_column: source_column.to_string(),
            target_table: target.name.clone(),
            target_column: edge.target_column().to_string(),
            on_delete: actions.and_then(|fk| fk.on_delete.clone()),
            on_update: actions.and_then(|fk| fk.on_update.clone()),
        };
        if seen.insert(spec.canonical_key()) {
            specs.push(spec);
        }
    }

    for table in &graph.tables {
        for column in &table.columns {
            let Some(fk) = column.foreign_key.as_ref().filter(|fk| !fk.resolved) else {
                continue;
            };
            let spec = ForeignKeySpec {
                source_table: table.name.clone(),
                source_column: column.title.clone(),
                target_table: fk.table.clone(),
                target_column: fk.column.clone(),
                on_delete: fk.on_delete.clone(),
                on_update: fk.on_update.clone(),
            };
            if seen.insert(spec.canonical_key()) {
                specs.push(spec);
            }
        }
    }

    specs
}

/// A single-quoted literal. MySQL reads backslashes as escapes, so they
/// are doubled there; the other dialects take them literally.
fn string_literal(value: &str, dialect: Dialect) -> String {
    let escaped = value.replace('\'', "''");
    match dialect {
        Dialect::MySQL => format!("'{}'", escaped.replace('\\', "\\\\")),
        _ => format!("'{}'", escaped),
    }
}

fn string_list(values: &[String], dialect: Dialect) -> String {
    values
        .iter()
        .map(|v| string_literal(v, dialect))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Defaults are stored unquoted; expressions and literals that SQL reads
/// as-is go out raw, everything else as a string literal.
fn default_literal(value: &str, dialect: Dialect) -> String {
    let upper = value.to_uppercase();
    let is_number = value.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '-' | '+' | '.'))
        && value.parse::<f64>().is_ok();
    let is_keyword = matches!(upper.as_str(), "NULL" | "TRUE" | "FALSE")
        || upper.starts_with("CURRENT_")
        || upper == "LOCALTIMESTAMP";
    let is_call = value.ends_with(')')
        && value
            .find('(')
            .is_some_and(|i| i > 0 && is_plain_identifier(&value[..i]));
    let is_expression = value.starts_with('(') && value.ends_with(')');

    if is_number || is_keyword || is_call || is_expression {
        value.to_string()
    } else {
        string_literal(value, dialect)
    }
}
