//! SQL text on one side of the translator: tokenizing, parsing into a
//! schema graph, rendering a graph back to DDL, and the checks and repairs
//! applied to hand-edited text.

mod dialect;
mod generator;
mod import;
mod lexer;
mod normalizer;
mod parser;
mod types;
mod validator;

pub use dialect::Dialect;
pub use generator::{FOREIGN_KEY_SECTION, SqlGenerator, generate_sql};
pub use import::{ParseOutcome, parse_sql};
pub use normalizer::normalize_sql;
pub use parser::{SqlParseError, Statement, parse_statements};
pub use validator::{Finding, Severity, ValidationReport, validate_sql};
