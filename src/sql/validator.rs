//! Structural checks run on SQL text before it is parsed into a graph.

use std::collections::{HashMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::Dialect;
use super::lexer::{Lexer, Spanned, Token};
use super::types::{continues_previous_type, is_known_type};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single problem found in the text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub line: Option<usize>,
    pub message: String,
}

impl Finding {
    fn error(line: Option<usize>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            line,
            message: message.into(),
        }
    }

    fn warning(line: usize, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            line: Some(line),
            message: message.into(),
        }
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_warning() {
            f.write_str("Warning: ")?;
        }
        if let Some(line) = self.line {
            write!(f, "Line {}: ", line)?;
        }
        f.write_str(&self.message)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub findings: Vec<Finding>,
}

impl ValidationReport {
    fn from_findings(findings: Vec<Finding>) -> Self {
        Self {
            is_valid: findings.iter().all(Finding::is_warning),
            findings,
        }
    }

    /// Rendered findings that make the text invalid.
    pub fn blocking(&self) -> impl Iterator<Item = String> + '_ {
        self.findings
            .iter()
            .filter(|f| !f.is_warning())
            .map(ToString::to_string)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(|f| f.is_warning())
    }
}

/// A foreign key target found anywhere in the text.
#[derive(Debug)]
struct Reference {
    line: usize,
    table: String,
    column: String,
}

#[derive(Default)]
struct Validator {
    findings: Vec<Finding>,
    /// Lowercase table name to its lowercase column names.
    tables: HashMap<String, HashSet<String>>,
    enum_types: HashSet<String>,
    references: Vec<Reference>,
}

pub fn validate_sql(text: &str) -> ValidationReport {
    if text.trim().is_empty() {
        return ValidationReport::from_findings(vec![Finding::error(None, "SQL is empty")]);
    }

    let tokens = Lexer::new(text)
        .with_backslash_escapes(Dialect::detect(text) == Dialect::MySQL)
        .tokenize_spanned();
    let mut validator = Validator::default();

    if !tokens
        .iter()
        .enumerate()
        .any(|(i, t)| t.token == Token::Create && is_create_table(&tokens[i..]))
    {
        validator
            .findings
            .push(Finding::error(None, "No CREATE TABLE statement found"));
    }

    validator.check_parentheses(&tokens);

    let statements = split_statements(&tokens);
    validator
        .enum_types
        .extend(statements.iter().filter_map(|s| enum_type_name(s)));

    for statement in &statements {
        match statement.first().map(|t| &t.token) {
            Some(Token::Create) if is_create_table(statement) => {
                validator.check_create_table(statement)
            }
            Some(Token::Alter) => validator.collect_alter_reference(statement),
            _ => {}
        }
    }

    validator.check_references();

    let report = ValidationReport::from_findings(validator.findings);
    debug!(
        is_valid = report.is_valid,
        findings = report.findings.len(),
        "Validated SQL"
    );
    report
}

/// `CREATE [TEMP | TEMPORARY | OR REPLACE] TABLE`
fn is_create_table(tokens: &[Spanned]) -> bool {
    tokens
        .iter()
        .skip(1)
        .take(3)
        .take_while(|t| t.token != Token::Semicolon)
        .any(|t| t.token == Token::Table)
}

/// Name declared by `CREATE TYPE name AS ENUM (...)`.
fn enum_type_name(statement: &[Spanned]) -> Option<String> {
    match statement {
        [create, ty, name, ..] if create.token == Token::Create && ty.token == Token::Type => {
            name.token.name_text().map(|n| n.to_lowercase())
        }
        _ => None,
    }
}

/// Split on semicolons outside parentheses; strings and comments are
/// already gone at the token level.
fn split_statements(tokens: &[Spanned]) -> Vec<&[Spanned]> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, spanned) in tokens.iter().enumerate() {
        match spanned.token {
            Token::LParen => depth += 1,
            Token::RParen => depth = depth.saturating_sub(1),
            Token::Semicolon | Token::Eof if depth == 0 || spanned.token == Token::Eof => {
                if i > start {
                    statements.push(&tokens[start..i]);
                }
                start = i + 1;
            }
            _ => {}
        }
    }

    statements
}

fn name_at(tokens: &[Spanned], i: usize) -> Option<String> {
    tokens.get(i).and_then(|t| t.token.name_text())
}

/// Read `name` or `schema.name`, returning the bare name and the index after it.
fn qualified_name(tokens: &[Spanned], mut i: usize) -> Option<(String, usize)> {
    let mut name = name_at(tokens, i)?;
    i += 1;
    while tokens.get(i).map(|t| &t.token) == Some(&Token::Dot) {
        name = name_at(tokens, i + 1)?;
        i += 2;
    }
    Some((name, i))
}

/// Names inside a parenthesised list starting at `i` (which must be `(`).
fn name_list(tokens: &[Spanned], i: usize) -> Option<(Vec<String>, usize)> {
    if tokens.get(i)?.token != Token::LParen {
        return None;
    }
    let mut names = Vec::new();
    let mut j = i + 1;
    while let Some(t) = tokens.get(j) {
        match &t.token {
            Token::RParen => return Some((names, j + 1)),
            Token::Comma => {}
            other => names.extend(other.name_text()),
        }
        j += 1;
    }
    Some((names, j))
}

impl Validator {
    fn check_parentheses(&mut self, tokens: &[Spanned]) {
        let mut open: Vec<usize> = Vec::new();
        for spanned in tokens {
            match spanned.token {
                Token::LParen => open.push(spanned.line),
                Token::RParen => {
                    if open.pop().is_none() {
                        self.findings.push(Finding::error(
                            Some(spanned.line),
                            "Unbalanced parentheses: unexpected ')'",
                        ));
                    }
                }
                _ => {}
            }
        }
        if let Some(&line) = open.first() {
            self.findings.push(Finding::error(
                Some(line),
                format!("Unbalanced parentheses: {} '(' never closed", open.len()),
            ));
        }
    }

    fn check_create_table(&mut self, statement: &[Spanned]) {
        let line = statement[0].line;
        let Some(mut i) = statement.iter().position(|t| t.token == Token::Table).map(|i| i + 1)
        else {
            return;
        };
        if statement.get(i).map(|t| &t.token) == Some(&Token::If) {
            i += 3;
        }

        let Some((name, after)) = qualified_name(statement, i) else {
            self.findings
                .push(Finding::error(Some(line), "CREATE TABLE is missing a table name"));
            return;
        };

        if statement.get(after).map(|t| &t.token) != Some(&Token::LParen) {
            self.findings.push(Finding::error(
                Some(line),
                format!("CREATE TABLE {} is missing '(' before its column list", name),
            ));
            return;
        }

        let key = name.to_lowercase();
        if self.tables.contains_key(&key) {
            self.findings.push(Finding::error(
                Some(line),
                format!("Duplicate table '{}'", name),
            ));
            return;
        }

        let mut columns = HashSet::new();
        for item in split_items(&statement[after + 1..]) {
            self.check_item(&name, item, &mut columns);
        }
        self.tables.insert(key, columns);
    }

    /// One comma-separated entry of a column list.
    fn check_item(&mut self, table: &str, item: &[Spanned], columns: &mut HashSet<String>) {
        let Some(first) = item.first() else {
            return;
        };

        match first.token {
            Token::Constraint | Token::Primary | Token::Unique | Token::Check | Token::Key
            | Token::Index | Token::Foreign => {
                self.collect_table_reference(item);
                return;
            }
            _ => {}
        }

        let mut starts = vec![0];
        starts.extend(self.missing_commas(table, item));

        for &start in &starts {
            let Some(name) = name_at(item, start) else {
                continue;
            };
            if !columns.insert(name.to_lowercase()) {
                self.findings.push(Finding::error(
                    Some(item[start].line),
                    format!("Duplicate column '{}' in table '{}'", name, table),
                ));
            }
        }

        if let Some(r) = item.iter().position(|t| t.token == Token::References) {
            self.collect_reference(item, r);
        }
    }

    /// Positions inside `item` where a new column definition starts on a
    /// fresh line without a separating comma.
    fn missing_commas(&mut self, table: &str, item: &[Spanned]) -> Vec<usize> {
        let mut starts = Vec::new();
        let mut depth = 0usize;

        for i in 1..item.len() {
            match item[i].token {
                Token::LParen => depth += 1,
                Token::RParen => depth = depth.saturating_sub(1),
                Token::Ident(ref word) if continues_previous_type(word) => {}
                Token::Ident(_) | Token::QuotedIdent(_) if depth == 0 => {
                    let new_line = item[i].line > item[i - 1].line;
                    let typed = item.get(i + 1).is_some_and(|next| match &next.token {
                        Token::Ident(word) => {
                            is_known_type(word) || self.enum_types.contains(&word.to_lowercase())
                        }
                        _ => false,
                    });
                    if new_line && typed {
                        let name = item[i].token.name_text().unwrap_or_default();
                        self.findings.push(Finding::error(
                            Some(item[i].line),
                            format!(
                                "Possible missing comma before column '{}' in table '{}'",
                                name, table
                            ),
                        ));
                        starts.push(i);
                    }
                }
                _ => {}
            }
        }

        starts
    }

    /// `[CONSTRAINT name] FOREIGN KEY (cols) REFERENCES t (cols)` inside a table body.
    fn collect_table_reference(&mut self, item: &[Spanned]) {
        if !item.iter().any(|t| t.token == Token::Foreign) {
            return;
        }
        if let Some(r) = item.iter().position(|t| t.token == Token::References) {
            self.collect_reference(item, r);
        }
    }

    fn collect_alter_reference(&mut self, statement: &[Spanned]) {
        if statement.iter().any(|t| t.token == Token::Foreign)
            && let Some(r) = statement.iter().position(|t| t.token == Token::References)
        {
            self.collect_reference(statement, r);
        }
    }

    /// Record the target of the `REFERENCES` token at index `r`.
    fn collect_reference(&mut self, tokens: &[Spanned], r: usize) {
        let line = tokens[r].line;
        let Some((table, after)) = qualified_name(tokens, r + 1) else {
            self.findings
                .push(Finding::error(Some(line), "REFERENCES is missing a table name"));
            return;
        };
        let column = name_list(tokens, after)
            .and_then(|(names, _)| names.into_iter().next())
            .unwrap_or_else(|| "id".to_string());

        self.references.push(Reference { line, table, column });
    }

    fn check_references(&mut self) {
        for reference in &self.references {
            if reference.column.eq_ignore_ascii_case("id") {
                continue;
            }
            match self.tables.get(&reference.table.to_lowercase()) {
                None => self.findings.push(Finding::warning(
                    reference.line,
                    format!(
                        "Foreign key references table '{}' which is not defined",
                        reference.table
                    ),
                )),
                Some(columns) if !columns.contains(&reference.column.to_lowercase()) => {
                    self.findings.push(Finding::warning(
                        reference.line,
                        format!(
                            "Foreign key references column '{}' which does not exist in table '{}'",
                            reference.column, reference.table
                        ),
                    ))
                }
                Some(_) => {}
            }
        }
    }
}

/// Split a column list (tokens after the opening paren) on top-level commas,
/// stopping at the closing paren.
fn split_items(body: &[Spanned]) -> Vec<&[Spanned]> {
    let mut items = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;

    for (i, spanned) in body.iter().enumerate() {
        match spanned.token {
            Token::LParen => depth += 1,
            Token::RParen if depth == 0 => {
                items.push(&body[start..i]);
                return items;
            }
            Token::RParen => depth -= 1,
            Token::Comma if depth == 0 => {
                items.push(&body[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    items.push(&body[start..]);
    items
}
