//! Recovery of a schema graph from SQL text.
//!
//! Runs in five ordered phases over the parsed statements: enum extraction,
//! table extraction, out-of-line relationship extraction, pending foreign key
//! resolution and identity reconciliation against the previous graph.

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use tracing::{debug, warn};

use super::parser::{ColumnDef, ForeignKeyDef, ReferenceDef, Script, Statement, TableDef, parse_statements};
use super::types::normalize_type;
use crate::error::{ApplyError, ParseError, SchemaError};
use crate::graph::{
    Cardinality, Column, ColumnConstraint, ENUM_TYPE_PREFIX, EnumType, ForeignKeyRef, SchemaGraph,
    Table,
};
use crate::reconcile::{
    EdgeCandidate, IdAllocator, PriorSnapshot, place_enum, place_table, reconcile_edges,
};

static CREATE_TABLE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bCREATE\s+TABLE\b").expect("valid regex"));

/// A successfully recovered graph plus non-blocking findings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParseOutcome {
    pub graph: SchemaGraph,
    /// Unresolved references, duplicate definitions and similar.
    pub warnings: Vec<String>,
}

/// Parse SQL text into a new graph, reconciling identity with `previous`.
///
/// Never returns a partial graph: either every phase succeeds or an error
/// describes why nothing can be applied.
pub fn parse_sql(input: &str, previous: Option<&SchemaGraph>) -> Result<ParseOutcome, SchemaError> {
    let script = parse_statements(input);
    let mut importer = Importer::new(previous);

    importer.extract_enums(&script);
    importer.extract_tables(&script);
    importer.extract_relationships(&script);
    let candidates = importer.resolve_foreign_keys();

    if importer.graph.tables.is_empty() {
        return Err(importer.failure(input, &script));
    }

    let previous_edges = importer.prior.edges();
    let mut graph = importer.graph;
    graph.relationships = reconcile_edges(previous_edges, candidates);

    debug!(
        tables = graph.tables.len(),
        enums = graph.enums.len(),
        relationships = graph.relationships.len(),
        "Recovered schema graph"
    );

    Ok(ParseOutcome {
        graph,
        warnings: importer.warnings,
    })
}

/// A foreign key waiting for the complete table map.
#[derive(Debug, Clone)]
struct PendingForeignKey {
    table_id: String,
    column: String,
    reference: ReferenceDef,
    target_column: String,
}

struct Importer<'a> {
    prior: PriorSnapshot<'a>,
    ids: IdAllocator,
    graph: SchemaGraph,
    warnings: Vec<String>,
    /// Exact table name -> id.
    table_ids: HashMap<String, String>,
    /// Lowercase table name -> id.
    table_ids_folded: HashMap<String, String>,
    pending: Vec<PendingForeignKey>,
    /// (enum id, enum name, table id, column)
    enum_links: Vec<(String, String, String, String)>,
}

impl<'a> Importer<'a> {
    fn new(previous: Option<&'a SchemaGraph>) -> Self {
        Self {
            prior: PriorSnapshot::new(previous),
            ids: IdAllocator::new(previous),
            graph: SchemaGraph::default(),
            warnings: Vec::new(),
            table_ids: HashMap::new(),
            table_ids_folded: HashMap::new(),
            pending: Vec::new(),
            enum_links: Vec::new(),
        }
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Phase 1: `CREATE TYPE .. AS ENUM`.
    fn extract_enums(&mut self, script: &Script) {
        for statement in &script.statements {
            let Statement::CreateType(def) = statement else {
                continue;
            };
            if self.graph.enum_by_name(&def.name).is_some() {
                self.warn(format!("Duplicate enum type '{}' ignored", def.name));
                continue;
            }
            self.add_enum(&def.name, &def.values);
        }
        debug!(enums = self.graph.enums.len(), "Extracted enums");
    }

    fn add_enum(&mut self, name: &str, values: &[String]) -> EnumType {
        let index = self.graph.enums.len();
        let placement = place_enum(&self.prior, &mut self.ids, name, index);

        let mut enum_type = EnumType::new(placement.id, name);
        enum_type.position = placement.position;
        for value in values {
            enum_type.push_value(value.clone());
        }
        self.graph.enums.push(enum_type.clone());
        enum_type
    }

    /// Phase 2: `CREATE TABLE` bodies and `CREATE INDEX`.
    fn extract_tables(&mut self, script: &Script) {
        for statement in &script.statements {
            if let Statement::CreateTable(def) = statement {
                self.add_table(def);
            }
        }

        for statement in &script.statements {
            let Statement::CreateIndex(index) = statement else {
                continue;
            };
            let [column] = index.columns.as_slice() else {
                debug!(table = %index.table, "Skipping composite index");
                continue;
            };
            let Some(table_id) = self.resolve_table(&index.table) else {
                self.warn(format!("Index on unknown table '{}' ignored", index.table));
                continue;
            };
            let constraint = if index.unique {
                ColumnConstraint::Unique
            } else {
                ColumnConstraint::Index
            };
            if let Some(col) = self.column_mut(&table_id, column) {
                col.add_constraint(constraint);
            }
        }

        debug!(tables = self.graph.tables.len(), "Extracted tables");
    }

    fn add_table(&mut self, def: &TableDef) {
        if self.resolve_table(&def.name).is_some() {
            self.warn(format!(
                "Duplicate table '{}' at line {} ignored",
                def.name, def.line
            ));
            return;
        }

        let index = self.graph.tables.len();
        let placement = place_table(&self.prior, &mut self.ids, &def.name, index);
        let mut table = Table::new(placement.id, def.name.clone());
        table.position = placement.position;
        table.color = placement.color;

        for column_def in &def.columns {
            let column = self.build_column(&def.name, column_def);
            let enum_name = column.enum_name().map(str::to_string);
            let title = table.add_column(column);

            if let Some(enum_name) = enum_name {
                if let Some(enum_type) = self.graph.enum_by_name(&enum_name) {
                    self.enum_links.push((
                        enum_type.id.clone(),
                        enum_type.name.clone(),
                        table.id.clone(),
                        title.clone(),
                    ));
                }
            }
            if let Some(reference) = &column_def.references {
                self.pending.push(PendingForeignKey {
                    table_id: table.id.clone(),
                    column: title,
                    target_column: reference.columns[0].clone(),
                    reference: reference.clone(),
                });
            }
        }

        for name in &def.primary_key {
            match find_title(&table, name) {
                Some(title) => {
                    if let Some(col) = table.column_mut(&title) {
                        col.add_constraint(ColumnConstraint::Primary);
                    }
                }
                None => debug!(table = %def.name, column = %name, "PRIMARY KEY column not found"),
            }
        }

        for columns in &def.unique {
            let [name] = columns.as_slice() else {
                debug!(table = %def.name, "Skipping composite UNIQUE constraint");
                continue;
            };
            if let Some(title) = find_title(&table, name) {
                if let Some(col) = table.column_mut(&title) {
                    col.add_constraint(ColumnConstraint::Unique);
                }
            }
        }

        let table_id = table.id.clone();
        self.table_ids.insert(def.name.clone(), table_id.clone());
        self.table_ids_folded
            .insert(def.name.to_lowercase(), table_id.clone());
        self.graph.tables.push(table);

        for foreign_key in &def.foreign_keys {
            self.queue_foreign_key(&table_id, &def.name, foreign_key);
        }
    }

    fn build_column(&mut self, table_name: &str, def: &ColumnDef) -> Column {
        let mut column = Column::new(def.name.clone(), String::new());

        if let Some(values) = &def.inline_values {
            column.data_type = self.inline_enum(table_name, &def.name, values).column_type();
        } else if let Some(enum_type) = self.known_enum(&def.type_name) {
            column.data_type = enum_type.column_type();
        } else {
            let normalized = normalize_type(&def.type_name);
            column.data_type = normalized.base;
            column.params = def.params.clone();
            if normalized.serial {
                column.auto_increment = true;
                column.add_constraint(ColumnConstraint::Primary);
            }
        }

        if def.primary {
            column.add_constraint(ColumnConstraint::Primary);
        }
        if def.unique {
            column.add_constraint(ColumnConstraint::Unique);
        }
        if def.not_null {
            column.add_constraint(ColumnConstraint::NotNull);
        }
        column.auto_increment |= def.auto_increment;
        column.default = def.default.clone();
        column
    }

    /// An enum declared in the text, by bare name or `enum_<name>`.
    fn known_enum(&self, type_name: &str) -> Option<&EnumType> {
        if type_name.is_empty() {
            return None;
        }
        self.graph.enum_by_name(type_name).or_else(|| {
            let lower = type_name.to_lowercase();
            lower
                .strip_prefix(ENUM_TYPE_PREFIX)
                .and_then(|name| self.graph.enum_by_name(name))
        })
    }

    /// Enum for an inline value list: an identical declared or previous enum,
    /// else a new `<table>_<column>` enum.
    fn inline_enum(&mut self, table: &str, column: &str, values: &[String]) -> EnumType {
        if let Some(existing) = self.graph.enums.iter().find(|e| e.values == values) {
            return existing.clone();
        }
        if let Some(previous) = self.prior.enum_with_values(values) {
            if self.graph.enum_by_name(&previous.name).is_none() {
                let name = previous.name.clone();
                return self.add_enum(&name, values);
            }
        }

        let mut name = format!("{}_{}", table, column);
        let mut n = 2;
        while self.graph.enum_by_name(&name).is_some() {
            name = format!("{}_{}_{}", table, column, n);
            n += 1;
        }
        self.add_enum(&name, values)
    }

    /// Phase 3: `ALTER TABLE .. ADD CONSTRAINT .. FOREIGN KEY`.
    fn extract_relationships(&mut self, script: &Script) {
        for statement in &script.statements {
            let Statement::AlterTableForeignKey { table, foreign_key } = statement else {
                continue;
            };
            match self.resolve_table(table) {
                Some(table_id) => self.queue_foreign_key(&table_id, table, foreign_key),
                None => self.warn(format!(
                    "Warning: ALTER TABLE references unknown table '{}'",
                    table
                )),
            }
        }
        debug!(pending = self.pending.len(), "Collected foreign keys");
    }

    fn queue_foreign_key(&mut self, table_id: &str, table_name: &str, foreign_key: &ForeignKeyDef) {
        for (i, column) in foreign_key.columns.iter().enumerate() {
            let title = self
                .graph
                .table(table_id)
                .and_then(|table| find_title(table, column));
            let Some(title) = title else {
                self.warn(format!(
                    "Warning: foreign key column '{}' not found in table '{}'",
                    column, table_name
                ));
                continue;
            };
            let target_column = foreign_key
                .reference
                .columns
                .get(i)
                .or_else(|| foreign_key.reference.columns.first())
                .cloned()
                .unwrap_or_else(|| "id".to_string());

            self.pending.push(PendingForeignKey {
                table_id: table_id.to_string(),
                column: title,
                reference: foreign_key.reference.clone(),
                target_column,
            });
        }
    }

    /// Phase 4: resolve every pending reference against the complete table map.
    fn resolve_foreign_keys(&mut self) -> Vec<EdgeCandidate> {
        let mut candidates = Vec::new();

        for pending in std::mem::take(&mut self.pending) {
            let target = self
                .resolve_table(&pending.reference.table)
                .and_then(|id| self.graph.table(&id))
                .and_then(|table| {
                    let column = table.find_column(&pending.target_column)?;
                    Some((table.id.clone(), table.name.clone(), column.title.clone(), column.is_unique()))
                });

            let Some(source_unique) = self
                .graph
                .table(&pending.table_id)
                .and_then(|t| t.column(&pending.column))
                .map(Column::is_unique)
            else {
                continue;
            };

            let reference = match &target {
                Some((_, table_name, column, _)) => ForeignKeyRef {
                    table: table_name.clone(),
                    column: column.clone(),
                    on_delete: pending.reference.on_delete.clone(),
                    on_update: pending.reference.on_update.clone(),
                    resolved: true,
                },
                None => {
                    self.warn(format!(
                        "Warning: foreign key {}.{} references unknown {}({})",
                        self.table_name(&pending.table_id),
                        pending.column,
                        pending.reference.table,
                        pending.target_column
                    ));
                    ForeignKeyRef {
                        table: pending.reference.table.clone(),
                        column: pending.target_column.clone(),
                        on_delete: pending.reference.on_delete.clone(),
                        on_update: pending.reference.on_update.clone(),
                        resolved: false,
                    }
                }
            };

            if let Some(col) = self.column_mut(&pending.table_id, &pending.column) {
                col.foreign_key = Some(reference);
            }

            if let Some((target_id, _, target_column, target_unique)) = target {
                candidates.push(EdgeCandidate {
                    source: pending.table_id.clone(),
                    source_column: pending.column.clone(),
                    target: target_id,
                    target_column,
                    cardinality: Cardinality::from_uniqueness(source_unique, target_unique),
                    enum_link: false,
                });
            }
        }

        for (enum_id, enum_name, table_id, column) in std::mem::take(&mut self.enum_links) {
            candidates.push(EdgeCandidate {
                source: enum_id,
                source_column: enum_name,
                target: table_id,
                target_column: column,
                cardinality: Cardinality::OneToMany,
                enum_link: true,
            });
        }

        candidates
    }

    /// Exact name first, then case-insensitive.
    fn resolve_table(&self, name: &str) -> Option<String> {
        self.table_ids
            .get(name)
            .or_else(|| self.table_ids_folded.get(&name.to_lowercase()))
            .cloned()
    }

    fn table_name(&self, id: &str) -> String {
        self.graph
            .table(id)
            .map(|t| t.name.clone())
            .unwrap_or_else(|| id.to_string())
    }

    fn column_mut(&mut self, table_id: &str, column: &str) -> Option<&mut Column> {
        let table = self.graph.table_mut(table_id)?;
        let title = find_title(table, column)?;
        table.column_mut(&title)
    }

    fn failure(&self, input: &str, script: &Script) -> SchemaError {
        let malformed = script.statements.iter().find_map(|s| match s {
            Statement::MalformedCreateTable { name, line } => Some((name.clone(), *line)),
            _ => None,
        });

        if let Some((name, line)) = malformed {
            return ParseError::MalformedCreateTable {
                name: name.unwrap_or_else(|| "<unnamed>".to_string()),
                line,
            }
            .into();
        }

        if CREATE_TABLE_RE.is_match(input) {
            let message = script
                .errors
                .first()
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no CREATE TABLE statement could be parsed".to_string());
            return ParseError::Syntax { message }.into();
        }

        ApplyError::NoValidTables.into()
    }
}

/// Title of a column matched exactly, then case-insensitively.
fn find_title(table: &Table, name: &str) -> Option<String> {
    table.find_column(name).map(|c| c.title.clone())
}
