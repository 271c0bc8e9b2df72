//! Recursive-descent parser for the DDL statements the schema graph understands.
//!
//! The parser is tolerant: statements it does not recognise are skipped up to
//! the next `;`, and a statement that fails half-way records an error and
//! resumes at the next statement.

use super::Dialect;
use super::lexer::{Lexer, Spanned, Token};
use super::types::is_type_continuation;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SqlParseError {
    #[error("line {line}: unexpected token {found:?}")]
    UnexpectedToken { line: usize, found: Token },
    #[error("line {line}: expected {expected}, found {found:?}")]
    Expected {
        line: usize,
        expected: &'static str,
        found: Token,
    },
    #[error("unexpected end of input")]
    UnexpectedEof,
}

/// `CREATE TYPE name AS ENUM (...)`
#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

/// `REFERENCES table (column) [ON DELETE ..] [ON UPDATE ..]`
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceDef {
    pub table: String,
    pub columns: Vec<String>,
    pub on_delete: Option<String>,
    pub on_update: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDef {
    pub name: String,
    /// Base type as written, without parameters.
    pub type_name: String,
    pub params: Vec<String>,
    /// Values of an inline `ENUM(..)` type or a `CHECK (col IN (..))` clause.
    pub inline_values: Option<Vec<String>>,
    pub primary: bool,
    pub not_null: bool,
    pub unique: bool,
    pub auto_increment: bool,
    pub default: Option<String>,
    pub references: Option<ReferenceDef>,
}

impl ColumnDef {
    fn new(name: String) -> Self {
        Self {
            name,
            type_name: String::new(),
            params: Vec::new(),
            inline_values: None,
            primary: false,
            not_null: false,
            unique: false,
            auto_increment: false,
            default: None,
            references: None,
        }
    }
}

/// Table-level or `ALTER TABLE` foreign key.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyDef {
    pub columns: Vec<String>,
    pub reference: ReferenceDef,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TableDef {
    pub name: String,
    pub line: usize,
    pub columns: Vec<ColumnDef>,
    pub primary_key: Vec<String>,
    pub unique: Vec<Vec<String>>,
    pub foreign_keys: Vec<ForeignKeyDef>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    pub table: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    CreateType(EnumDef),
    CreateTable(TableDef),
    /// `CREATE TABLE` without a parenthesised body.
    MalformedCreateTable { name: Option<String>, line: usize },
    AlterTableForeignKey { table: String, foreign_key: ForeignKeyDef },
    CreateIndex(IndexDef),
}

/// Result of parsing a whole script.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Script {
    pub statements: Vec<Statement>,
    pub errors: Vec<SqlParseError>,
}

/// Parse SQL text into recognised DDL statements.
pub fn parse_statements(input: &str) -> Script {
    let tokens = Lexer::new(input)
        .with_backslash_escapes(Dialect::detect(input) == Dialect::MySQL)
        .tokenize_spanned();
    Parser::new(tokens).parse()
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn current(&self) -> &Token {
        self.tokens.get(self.pos).map(|s| &s.token).unwrap_or(&Token::Eof)
    }

    fn lookahead(&self, n: usize) -> &Token {
        self.tokens
            .get(self.pos + n)
            .map(|s| &s.token)
            .unwrap_or(&Token::Eof)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|s| s.line)
            .unwrap_or(1)
    }

    fn advance(&mut self) {
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.current() == token {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_word(&mut self, word: &str) -> bool {
        if self.current().is_word(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> Result<(), SqlParseError> {
        if self.eat(&token) {
            Ok(())
        } else {
            Err(self.expected(expected))
        }
    }

    fn expected(&self, expected: &'static str) -> SqlParseError {
        match self.current() {
            Token::Eof => SqlParseError::UnexpectedEof,
            found => SqlParseError::Expected {
                line: self.line(),
                expected,
                found: found.clone(),
            },
        }
    }

    fn parse(&mut self) -> Script {
        let mut script = Script::default();

        while self.current() != &Token::Eof {
            let start = self.pos;
            let result = match self.current() {
                Token::Create => self.parse_create(),
                Token::Alter => self.parse_alter_table(),
                _ => {
                    self.advance();
                    Ok(None)
                }
            };

            match result {
                Ok(Some(statement)) => script.statements.push(statement),
                Ok(None) => {}
                Err(err) => {
                    script.errors.push(err);
                    if self.pos == start {
                        self.advance();
                    }
                    self.skip_statement();
                }
            }
        }

        script
    }

    fn parse_create(&mut self) -> Result<Option<Statement>, SqlParseError> {
        let line = self.line();
        self.advance(); // CREATE

        // OR REPLACE, TEMPORARY, UNLOGGED ...
        if self.eat_word("or") {
            self.eat_word("replace");
        }
        while self.eat_word("temporary") || self.eat_word("temp") || self.eat_word("unlogged") {}

        match self.current() {
            Token::Table => {
                self.advance();
                self.skip_if_not_exists();
                self.parse_create_table(line)
            }
            Token::Type => {
                self.advance();
                self.parse_create_type()
            }
            Token::Unique if self.lookahead(1) == &Token::Index => {
                self.advance();
                self.advance();
                self.parse_create_index(true)
            }
            Token::Index => {
                self.advance();
                self.parse_create_index(false)
            }
            _ => {
                // Skip other CREATE statements (VIEW, FUNCTION, etc.)
                self.skip_statement();
                Ok(None)
            }
        }
    }

    fn skip_if_not_exists(&mut self) {
        if self.current() == &Token::If {
            self.advance(); // IF
            self.eat(&Token::Not);
            self.eat(&Token::Exists);
        }
    }

    /// Object name, possibly schema-qualified; the last part is kept.
    fn parse_object_name(&mut self) -> Option<String> {
        let mut name = self.current().name_text()?;
        self.advance();
        while self.current() == &Token::Dot {
            self.advance();
            match self.current().name_text() {
                Some(part) => {
                    name = part;
                    self.advance();
                }
                None => break,
            }
        }
        Some(name)
    }

    fn parse_create_type(&mut self) -> Result<Option<Statement>, SqlParseError> {
        let name = self
            .parse_object_name()
            .ok_or_else(|| self.expected("type name"))?;

        if !(self.eat(&Token::As) && self.eat(&Token::Enum)) {
            // Composite and range types are not part of the graph
            self.skip_statement();
            return Ok(None);
        }

        let values = self.parse_string_list()?;
        self.skip_statement();
        Ok(Some(Statement::CreateType(EnumDef { name, values })))
    }

    /// `( 'a', 'b', ... )`
    fn parse_string_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.expect(Token::LParen, "(")?;
        let mut values = Vec::new();
        loop {
            match self.current().clone() {
                Token::Str(s) => {
                    values.push(s);
                    self.advance();
                }
                Token::Comma => self.advance(),
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                found => {
                    return Err(SqlParseError::UnexpectedToken {
                        line: self.line(),
                        found,
                    });
                }
            }
        }
        Ok(values)
    }

    fn parse_create_table(&mut self, line: usize) -> Result<Option<Statement>, SqlParseError> {
        let name = self.parse_object_name();

        if name.is_none() || self.current() != &Token::LParen {
            self.skip_statement();
            return Ok(Some(Statement::MalformedCreateTable { name, line }));
        }
        let name = name.unwrap_or_default();
        self.advance(); // (

        let mut table = TableDef {
            name,
            line,
            columns: Vec::new(),
            primary_key: Vec::new(),
            unique: Vec::new(),
            foreign_keys: Vec::new(),
        };
        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                }
                Token::Semicolon | Token::Eof => {
                    // Unterminated body: keep what was read
                    break;
                }
                Token::Constraint => {
                    // Named constraint; the name itself is not kept
                    self.advance();
                    if self.current().name_text().is_some() {
                        self.advance();
                    }
                }
                Token::Primary => {
                    // PRIMARY KEY (col1, col2, ...)
                    self.advance();
                    self.eat(&Token::Key);
                    table.primary_key.extend(self.parse_column_list()?);
                    self.skip_item();
                }
                Token::Foreign => {
                    let foreign_key = self.parse_foreign_key()?;
                    table.foreign_keys.push(foreign_key);
                }
                Token::Unique => {
                    // UNIQUE [KEY name] (col1, col2, ...)
                    self.advance();
                    if matches!(self.current(), Token::Key | Token::Index) {
                        self.advance();
                    }
                    if self.current() != &Token::LParen && self.current().name_text().is_some() {
                        self.advance();
                    }
                    let cols = self.parse_column_list()?;
                    if !cols.is_empty() {
                        table.unique.push(cols);
                    }
                    self.skip_item();
                }
                Token::Check => {
                    // CHECK constraint
                    self.advance();
                    self.skip_parenthesized();
                }
                Token::Index | Token::Key if self.is_index_definition() => {
                    // MySQL INDEX / KEY definition
                    self.skip_item();
                }
                token if token.name_text().is_some() => {
                    if token.is_word("like") || token.is_word("exclude") {
                        self.skip_item();
                        continue;
                    }
                    let column = self.parse_column()?;
                    table.columns.push(column);
                }
                _ => {
                    self.advance();
                }
            }
        }

        // Skip table options (ENGINE=, WITHOUT ROWID, etc.)
        self.skip_statement();

        Ok(Some(Statement::CreateTable(table)))
    }

    /// `KEY name (cols)` / `INDEX (cols)` as opposed to a column called `key`.
    fn is_index_definition(&self) -> bool {
        match self.lookahead(1) {
            Token::LParen => true,
            next if next.name_text().is_some() => {
                self.lookahead(2) == &Token::LParen
                    && matches!(self.lookahead(3), Token::Ident(_) | Token::QuotedIdent(_))
            }
            _ => false,
        }
    }

    fn parse_column(&mut self) -> Result<ColumnDef, SqlParseError> {
        let name = self
            .current()
            .name_text()
            .ok_or_else(|| self.expected("column name"))?;
        self.advance();

        let mut column = ColumnDef::new(name);
        self.parse_data_type(&mut column)?;

        // Parse modifiers
        loop {
            match self.current() {
                Token::Primary => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.primary = true;
                }
                Token::Not => {
                    self.advance();
                    if self.eat(&Token::Null) {
                        column.not_null = true;
                    }
                }
                Token::Null => {
                    self.advance();
                    // Nullable (no modifier needed)
                }
                Token::Unique => {
                    self.advance();
                    self.eat(&Token::Key);
                    column.unique = true;
                }
                Token::Default => {
                    self.advance();
                    column.default = Some(self.parse_default_value());
                }
                Token::References => {
                    // Inline FK reference
                    self.advance();
                    column.references = Some(self.parse_reference()?);
                }
                Token::Auto => {
                    self.advance();
                    if self.eat(&Token::Increment) {
                        column.auto_increment = true;
                    }
                }
                Token::Increment => {
                    self.advance();
                    column.auto_increment = true;
                }
                Token::Check => {
                    self.advance();
                    if let Some(values) = self.parse_check_in_list(&column.name) {
                        column.inline_values = Some(values);
                    }
                }
                Token::Constraint => {
                    // Inline constraint name
                    self.advance();
                    if self.current().name_text().is_some() {
                        self.advance();
                    }
                }
                Token::On => {
                    // MySQL ON UPDATE CURRENT_TIMESTAMP
                    self.advance();
                    if matches!(self.current(), Token::Update | Token::Delete) {
                        self.advance();
                    }
                }
                Token::LParen => self.skip_parenthesized(),
                Token::Comma | Token::RParen | Token::Semicolon | Token::Eof => break,
                _ => {
                    self.advance();
                }
            }
        }

        Ok(column)
    }

    fn parse_data_type(&mut self, column: &mut ColumnDef) -> Result<(), SqlParseError> {
        match self.current().clone() {
            Token::Enum => {
                // MySQL ENUM('a', 'b')
                self.advance();
                column.type_name = "enum".to_string();
                column.inline_values = Some(self.parse_string_list()?);
                return Ok(());
            }
            Token::Ident(t) | Token::QuotedIdent(t) => {
                column.type_name = t;
                self.advance();
            }
            // Column without a type (SQLite allows it)
            _ => return Ok(()),
        }

        loop {
            match self.current() {
                Token::Ident(word) if is_type_continuation(word) => {
                    column.type_name.push(' ');
                    column.type_name.push_str(word);
                    self.advance();
                }
                token if token.is_word("unsigned") || token.is_word("signed") => self.advance(),
                Token::Dot => {
                    // schema-qualified type
                    self.advance();
                    if let Some(part) = self.current().name_text() {
                        column.type_name = part;
                        self.advance();
                    }
                }
                Token::LParen if column.params.is_empty() => {
                    column.params = self.parse_type_params()?;
                }
                Token::ArraySuffix => {
                    column.type_name.push_str("[]");
                    self.advance();
                }
                _ => break,
            }
        }

        Ok(())
    }

    /// `(255)`, `(10, 2)`: commas inside never end the column.
    fn parse_type_params(&mut self) -> Result<Vec<String>, SqlParseError> {
        self.advance(); // (
        let mut params = Vec::new();
        let mut current = String::new();
        loop {
            match self.current().clone() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    params.push(std::mem::take(&mut current));
                    self.advance();
                }
                Token::Num(n) | Token::Ident(n) => {
                    if !current.is_empty() {
                        current.push(' ');
                    }
                    current.push_str(&n);
                    self.advance();
                }
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                _ => self.advance(),
            }
        }
        if !current.is_empty() {
            params.push(current);
        }
        Ok(params)
    }

    /// `CHECK (col IN ('a', 'b'))`; any other check is skipped.
    fn parse_check_in_list(&mut self, column: &str) -> Option<Vec<String>> {
        let start = self.pos;
        let matches_shape = self.current() == &Token::LParen
            && self
                .lookahead(1)
                .name_text()
                .is_some_and(|name| name.eq_ignore_ascii_case(column))
            && self.lookahead(2).is_word("in")
            && self.lookahead(3) == &Token::LParen;

        if matches_shape {
            self.pos += 3;
            if let Ok(values) = self.parse_string_list() {
                if self.eat(&Token::RParen) {
                    return Some(values);
                }
            }
            self.pos = start;
        }
        self.skip_parenthesized();
        None
    }

    fn parse_default_value(&mut self) -> String {
        match self.current().clone() {
            Token::Str(s) => {
                self.advance();
                s
            }
            Token::Num(n) => {
                self.advance();
                n
            }
            Token::Null => {
                self.advance();
                "NULL".to_string()
            }
            Token::Ident(s) => {
                let mut val = s;
                self.advance();
                // Handle function calls like NOW()
                if self.current() == &Token::LParen {
                    self.advance();
                    let inner = self.collect_until_paren();
                    val.push('(');
                    val.push_str(&inner);
                    val.push(')');
                }
                val
            }
            Token::LParen => {
                // Expression in parentheses
                self.advance();
                let inner = self.collect_until_paren();
                format!("({})", inner)
            }
            _ => String::new(),
        }
    }

    fn collect_until_paren(&mut self) -> String {
        let mut parts = Vec::new();
        let mut depth = 1;

        loop {
            match self.current().clone() {
                Token::LParen => {
                    depth += 1;
                    parts.push("(".to_string());
                    self.advance();
                }
                Token::RParen => {
                    depth -= 1;
                    self.advance();
                    if depth == 0 {
                        break;
                    }
                    parts.push(")".to_string());
                }
                Token::Ident(s) | Token::Num(s) => {
                    parts.push(s);
                    self.advance();
                }
                Token::Str(s) => {
                    parts.push(format!("'{}'", s.replace('\'', "''")));
                    self.advance();
                }
                Token::Comma => {
                    parts.push(",".to_string());
                    self.advance();
                }
                Token::Eof | Token::Semicolon => break,
                _ => {
                    self.advance();
                }
            }
        }

        parts.join(" ")
    }

    fn parse_reference(&mut self) -> Result<ReferenceDef, SqlParseError> {
        let table = self
            .parse_object_name()
            .ok_or_else(|| self.expected("referenced table"))?;

        let mut columns = self.parse_column_list()?;
        if columns.is_empty() {
            columns.push("id".to_string());
        }

        let (on_delete, on_update) = self.parse_on_actions();

        Ok(ReferenceDef {
            table,
            columns,
            on_delete,
            on_update,
        })
    }

    fn parse_foreign_key(&mut self) -> Result<ForeignKeyDef, SqlParseError> {
        self.advance(); // FOREIGN
        self.expect(Token::Key, "KEY")?;

        // (columns)
        let columns = self.parse_column_list()?;
        if columns.is_empty() {
            return Err(self.expected("foreign key column list"));
        }

        self.expect(Token::References, "REFERENCES")?;
        let reference = self.parse_reference()?;

        Ok(ForeignKeyDef { columns, reference })
    }

    fn parse_column_list(&mut self) -> Result<Vec<String>, SqlParseError> {
        let mut cols = Vec::new();

        if self.current() != &Token::LParen {
            return Ok(cols);
        }
        self.advance();

        loop {
            match self.current() {
                Token::RParen => {
                    self.advance();
                    break;
                }
                Token::Comma => {
                    self.advance();
                }
                Token::LParen => self.skip_parenthesized(),
                Token::Eof => return Err(SqlParseError::UnexpectedEof),
                token => {
                    if let Some(name) = token.name_text() {
                        // Skip ASC / DESC and similar trailing words
                        let previous_was_separator = matches!(
                            self.tokens.get(self.pos.wrapping_sub(1)).map(|s| &s.token),
                            Some(Token::LParen) | Some(Token::Comma)
                        );
                        if previous_was_separator {
                            cols.push(name);
                        }
                    }
                    self.advance();
                }
            }
        }

        Ok(cols)
    }

    /// `ON DELETE <action>` / `ON UPDATE <action>` in any order.
    fn parse_on_actions(&mut self) -> (Option<String>, Option<String>) {
        let mut on_delete = None;
        let mut on_update = None;

        while self.current() == &Token::On {
            self.advance();
            let is_delete = match self.current() {
                Token::Delete => true,
                Token::Update => false,
                _ => break,
            };
            self.advance();

            // Action: CASCADE, RESTRICT, SET NULL, SET DEFAULT, NO ACTION
            let action = match self.current() {
                Token::Cascade => {
                    self.advance();
                    Some("CASCADE".to_string())
                }
                Token::Restrict => {
                    self.advance();
                    Some("RESTRICT".to_string())
                }
                token if token.is_word("set") => {
                    self.advance();
                    let action = match self.current() {
                        Token::Null => Some("SET NULL".to_string()),
                        Token::Default => Some("SET DEFAULT".to_string()),
                        _ => None,
                    };
                    if action.is_some() {
                        self.advance();
                    }
                    action
                }
                token if token.is_word("no") => {
                    self.advance();
                    self.eat_word("action");
                    Some("NO ACTION".to_string())
                }
                _ => None,
            };

            if is_delete {
                on_delete = action;
            } else {
                on_update = action;
            }
        }

        (on_delete, on_update)
    }

    fn parse_create_index(&mut self, unique: bool) -> Result<Option<Statement>, SqlParseError> {
        self.eat_word("concurrently");
        self.skip_if_not_exists();

        // Optional index name
        if self.current() != &Token::On {
            self.parse_object_name();
        }
        if !self.eat(&Token::On) {
            self.skip_statement();
            return Ok(None);
        }
        self.eat(&Token::Only);

        let table = self
            .parse_object_name()
            .ok_or_else(|| self.expected("indexed table"))?;

        // USING btree
        if self.eat_word("using") {
            self.advance();
        }

        let columns = self.parse_column_list()?;
        self.skip_statement();

        if columns.is_empty() {
            return Ok(None);
        }
        Ok(Some(Statement::CreateIndex(IndexDef {
            table,
            columns,
            unique,
        })))
    }

    /// Parse ALTER TABLE ... ADD [CONSTRAINT name] FOREIGN KEY
    fn parse_alter_table(&mut self) -> Result<Option<Statement>, SqlParseError> {
        self.advance(); // ALTER

        if !self.eat(&Token::Table) {
            self.skip_statement();
            return Ok(None);
        }
        self.skip_if_not_exists();
        self.eat(&Token::Only);

        let table = match self.parse_object_name() {
            Some(name) => name,
            None => {
                self.skip_statement();
                return Ok(None);
            }
        };

        if !self.eat(&Token::Add) {
            self.skip_statement();
            return Ok(None);
        }

        if self.eat(&Token::Constraint) && self.current().name_text().is_some() {
            self.advance();
        }

        if self.current() != &Token::Foreign {
            self.skip_statement();
            return Ok(None);
        }

        let foreign_key = self.parse_foreign_key()?;
        self.skip_statement();
        Ok(Some(Statement::AlterTableForeignKey { table, foreign_key }))
    }

    fn skip_parenthesized(&mut self) {
        if self.current() != &Token::LParen {
            return;
        }
        self.advance();
        let mut depth = 1;
        while depth > 0 {
            match self.current() {
                Token::LParen => {
                    depth += 1;
                    self.advance();
                }
                Token::RParen => {
                    depth -= 1;
                    self.advance();
                }
                Token::Eof | Token::Semicolon => break,
                _ => {
                    self.advance();
                }
            }
        }
    }

    /// Skip to the end of the current table item without consuming its delimiter.
    fn skip_item(&mut self) {
        while !matches!(
            self.current(),
            Token::Comma | Token::RParen | Token::Semicolon | Token::Eof
        ) {
            if self.current() == &Token::LParen {
                self.skip_parenthesized();
            } else {
                self.advance();
            }
        }
    }

    fn skip_statement(&mut self) {
        while !matches!(self.current(), Token::Semicolon | Token::Eof) {
            self.advance();
        }
        if self.current() == &Token::Semicolon {
            self.advance();
        }
    }
}
