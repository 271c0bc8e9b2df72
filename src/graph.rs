//! In-memory schema graph shared by the generator, parser and host canvas.

use serde::{Deserialize, Serialize};

use crate::sql::Dialect;

/// Prefix of the pseudo-type given to columns typed by an enum.
pub const ENUM_TYPE_PREFIX: &str = "enum_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaGraph {
    pub tables: Vec<Table>,
    #[serde(default)]
    pub enums: Vec<EnumType>,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableColor {
    pub light: String,
    pub dark: String,
    pub border: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Table {
    pub id: String,
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub position: Position,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<TableColor>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnConstraint {
    Primary,
    Unique,
    NotNull,
    Index,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKeyRef {
    pub table: String,
    pub column: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_delete: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_update: Option<String>,
    /// False when the target table or column could not be found.
    #[serde(default = "default_true")]
    pub resolved: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub title: String,
    pub data_type: String,
    /// Type parameters such as length or precision/scale.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub params: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<ColumnConstraint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub foreign_key: Option<ForeignKeyRef>,
    #[serde(default)]
    pub auto_increment: bool,
}

impl Column {
    pub fn new(title: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data_type: data_type.into(),
            params: Vec::new(),
            constraints: Vec::new(),
            default: None,
            foreign_key: None,
            auto_increment: false,
        }
    }

    pub fn with_params(mut self, params: &[&str]) -> Self {
        self.params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_constraint(mut self, constraint: ColumnConstraint) -> Self {
        self.add_constraint(constraint);
        self
    }

    /// Adds a constraint, keeping the set ordered and free of duplicates.
    pub fn add_constraint(&mut self, constraint: ColumnConstraint) {
        if !self.constraints.contains(&constraint) {
            self.constraints.push(constraint);
        }
    }

    pub fn has(&self, constraint: ColumnConstraint) -> bool {
        self.constraints.contains(&constraint)
    }

    pub fn is_primary(&self) -> bool {
        self.has(ColumnConstraint::Primary)
    }

    /// Primary keys are unique too.
    pub fn is_unique(&self) -> bool {
        self.is_primary() || self.has(ColumnConstraint::Unique)
    }

    /// Name of the enum this column is typed by, if any.
    pub fn enum_name(&self) -> Option<&str> {
        self.data_type
            .strip_prefix(ENUM_TYPE_PREFIX)
            .filter(|name| !name.is_empty())
    }
}

impl Table {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            columns: Vec::new(),
            position: Position::default(),
            color: None,
        }
    }

    /// Appends a column, suffixing its title when it collides with an existing
    /// one. Titles collide case-insensitively, as table names do.
    /// Returns the title the column was stored under.
    pub fn add_column(&mut self, mut column: Column) -> String {
        let taken = |title: &str| self.columns.iter().any(|c| c.title.eq_ignore_ascii_case(title));
        if taken(&column.title) {
            let base = column.title.clone();
            let mut n = 2;
            while taken(&format!("{}_{}", base, n)) {
                n += 1;
            }
            column.title = format!("{}_{}", base, n);
        }
        let title = column.title.clone();
        self.columns.push(column);
        title
    }

    pub fn column(&self, title: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.title == title)
    }

    pub fn column_mut(&mut self, title: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.title == title)
    }

    /// Exact match first, then case-insensitive.
    pub fn find_column(&self, title: &str) -> Option<&Column> {
        self.column(title)
            .or_else(|| self.columns.iter().find(|c| c.title.eq_ignore_ascii_case(title)))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumType {
    pub id: String,
    pub name: String,
    pub values: Vec<String>,
    #[serde(default)]
    pub position: Position,
}

impl EnumType {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            values: Vec::new(),
            position: Position::default(),
        }
    }

    /// Appends a value unless already present. Returns whether it was added.
    pub fn push_value(&mut self, value: impl Into<String>) -> bool {
        let value = value.into();
        if self.values.contains(&value) {
            return false;
        }
        self.values.push(value);
        true
    }

    /// Pseudo-type used by columns of this enum.
    pub fn column_type(&self) -> String {
        format!("{}{}", ENUM_TYPE_PREFIX, self.name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    /// Derived from whether each end of the edge is unique.
    pub fn from_uniqueness(source_unique: bool, target_unique: bool) -> Self {
        match (source_unique, target_unique) {
            (true, true) => Self::OneToOne,
            (true, false) => Self::OneToMany,
            (false, true) => Self::ManyToOne,
            (false, false) => Self::ManyToMany,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrokeStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub stroke: StrokeStyle,
    #[serde(default)]
    pub animated: bool,
}

impl EdgeStyle {
    pub fn enum_link() -> Self {
        Self {
            label: None,
            stroke: StrokeStyle::Dashed,
            animated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub id: String,
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
    pub cardinality: Cardinality,
    /// Connects an enum to a column typed by it; never a foreign key.
    #[serde(default)]
    pub enum_link: bool,
    #[serde(default)]
    pub style: EdgeStyle,
}

/// Handle naming shared by the parser and the canvas.
pub fn source_handle(column: &str) -> String {
    format!("source-{}", column)
}

pub fn target_handle(column: &str) -> String {
    format!("target-{}", column)
}

/// Column name encoded in a `source-<col>` / `target-<col>` handle.
pub fn handle_column(handle: &str) -> &str {
    handle
        .strip_prefix("source-")
        .or_else(|| handle.strip_prefix("target-"))
        .unwrap_or(handle)
}

impl Relationship {
    pub fn source_column(&self) -> &str {
        handle_column(&self.source_handle)
    }

    pub fn target_column(&self) -> &str {
        handle_column(&self.target_handle)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub case_sensitive_identifiers: bool,
    pub use_inline_constraints: bool,
    pub dialect: Dialect,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            case_sensitive_identifiers: true,
            use_inline_constraints: false,
            dialect: Dialect::PostgreSQL,
        }
    }
}

impl SchemaGraph {
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.enums.is_empty()
    }

    pub fn table(&self, id: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.id == id)
    }

    pub fn table_mut(&mut self, id: &str) -> Option<&mut Table> {
        self.tables.iter_mut().find(|t| t.id == id)
    }

    /// Case-insensitive lookup by table name.
    pub fn table_by_name(&self, name: &str) -> Option<&Table> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn enum_type(&self, id: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.id == id)
    }

    /// Case-insensitive lookup by enum name.
    pub fn enum_by_name(&self, name: &str) -> Option<&EnumType> {
        self.enums.iter().find(|e| e.name.eq_ignore_ascii_case(name))
    }

    /// Relationships that are real foreign keys.
    pub fn foreign_keys(&self) -> impl Iterator<Item = &Relationship> {
        self.relationships.iter().filter(|r| !r.enum_link)
    }
}
