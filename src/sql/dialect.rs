//! SQL dialect detection and handling.

use serde::{Deserialize, Serialize};

/// SQL dialect variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// PostgreSQL
    #[default]
    PostgreSQL,
    /// MySQL
    MySQL,
    /// SQLite
    SQLite,
}

impl std::str::FromStr for Dialect {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(Self::PostgreSQL),
            "mysql" | "mariadb" => Ok(Self::MySQL),
            "sqlite" | "sqlite3" => Ok(Self::SQLite),
            other => Err(format!("unknown dialect: {}", other)),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl Dialect {
    pub fn name(self) -> &'static str {
        match self {
            Self::PostgreSQL => "postgresql",
            Self::MySQL => "mysql",
            Self::SQLite => "sqlite",
        }
    }

    /// Identifier quote character.
    pub fn quote_char(self) -> char {
        match self {
            Self::MySQL => '`',
            _ => '"',
        }
    }

    /// Whether foreign keys can be added after the fact with ALTER TABLE.
    pub fn supports_alter_constraint(self) -> bool {
        !matches!(self, Self::SQLite)
    }

    /// Detect dialect from SQL content, falling back to PostgreSQL.
    pub fn detect(content: &str) -> Self {
        let lower = content.to_lowercase();

        // Check header comments
        if lower.contains("-- dialect: mysql") || lower.contains("mysql dump") {
            return Self::MySQL;
        }
        if lower.contains("-- dialect: sqlite") {
            return Self::SQLite;
        }
        if lower.contains("-- dialect: postgresql") || lower.contains("postgresql database dump") {
            return Self::PostgreSQL;
        }

        // Check quoting and type keywords
        if content.contains('`')
            || lower.contains("auto_increment")
            || lower.contains("engine=")
            || lower.contains("unsigned")
        {
            return Self::MySQL;
        }
        if lower.contains("autoincrement") || lower.contains("without rowid") {
            return Self::SQLite;
        }

        Self::PostgreSQL
    }
}
