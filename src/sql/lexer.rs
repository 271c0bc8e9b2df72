//! SQL lexer for tokenizing DDL statements.

use std::iter::Peekable;
use std::str::Chars;

/// SQL token types.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    // Keywords
    Create,
    Alter,
    Add,
    Table,
    Type,
    As,
    Enum,
    Only,
    Primary,
    Key,
    Foreign,
    References,
    Not,
    Null,
    Unique,
    Default,
    On,
    Delete,
    Update,
    Cascade,
    Restrict,
    Constraint,
    Index,
    If,
    Exists,
    Auto,       // For AUTO INCREMENT
    Increment,  // AUTO_INCREMENT, AUTOINCREMENT
    Check,

    // Identifiers and literals
    Ident(String),
    QuotedIdent(String),
    Str(String),
    Num(String),

    // Symbols
    LParen,
    RParen,
    Comma,
    Semicolon,
    Dot,
    ArraySuffix, // []

    // End of input
    Eof,
}

impl Token {
    /// Text of a token usable as an object name.
    ///
    /// Non-reserved keywords (`type`, `key`, `index`, ...) are commonly used as
    /// column names, so they are accepted here in their lowercase spelling.
    pub fn name_text(&self) -> Option<String> {
        let word = match self {
            Token::Ident(s) | Token::QuotedIdent(s) => return Some(s.clone()),
            Token::Type => "type",
            Token::Enum => "enum",
            Token::Key => "key",
            Token::Index => "index",
            Token::Only => "only",
            Token::Update => "update",
            Token::Delete => "delete",
            Token::Cascade => "cascade",
            Token::Restrict => "restrict",
            Token::Exists => "exists",
            Token::Auto => "auto",
            _ => return None,
        };
        Some(word.to_string())
    }

    /// Case-insensitive comparison against a bare (unquoted) word.
    pub fn is_word(&self, word: &str) -> bool {
        matches!(self, Token::Ident(s) if s.eq_ignore_ascii_case(word))
    }
}

/// A token with the 1-based line it starts on.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub line: usize,
}

/// SQL lexer.
pub struct Lexer<'a> {
    chars: Peekable<Chars<'a>>,
    current_char: Option<char>,
    line: usize,
    /// MySQL reads `\'` and friends inside every string literal.
    backslash_escapes: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        let mut chars = input.chars().peekable();
        let current_char = chars.next();
        Self {
            chars,
            current_char,
            line: 1,
            backslash_escapes: false,
        }
    }

    /// Treat backslashes in `'...'` literals as escapes, as MySQL does.
    /// Standard SQL only escapes a quote by doubling it; `E'...'` literals
    /// honour backslashes either way.
    pub fn with_backslash_escapes(mut self, enabled: bool) -> Self {
        self.backslash_escapes = enabled;
        self
    }

    fn advance(&mut self) {
        if self.current_char == Some('\n') {
            self.line += 1;
        }
        self.current_char = self.chars.next();
    }

    fn peek(&mut self) -> Option<&char> {
        self.chars.peek()
    }

    /// Consume characters while `keep` holds.
    fn take_while(&mut self, keep: impl Fn(char) -> bool) -> String {
        let mut taken = String::new();
        while let Some(c) = self.current_char.filter(|&c| keep(c)) {
            taken.push(c);
            self.advance();
        }
        taken
    }

    fn skip_block_comment(&mut self) {
        self.advance(); // *
        let mut star = false;
        while let Some(c) = self.current_char {
            self.advance();
            if star && c == '/' {
                return;
            }
            star = c == '*';
        }
    }

    /// Read up to `close`, treating a doubled `close` as a literal one.
    /// With `backslash`, also honour backslash escapes.
    fn read_delimited(&mut self, close: char, backslash: bool) -> String {
        self.advance(); // opening delimiter
        let mut text = String::new();
        while let Some(c) = self.current_char {
            self.advance();
            match c {
                c if c == close => {
                    if self.current_char != Some(close) {
                        break;
                    }
                    text.push(c);
                    self.advance();
                }
                '\\' if backslash => {
                    if let Some(escaped) = self.current_char {
                        text.push(match escaped {
                            'n' => '\n',
                            't' => '\t',
                            'r' => '\r',
                            other => other,
                        });
                        self.advance();
                    }
                }
                c => text.push(c),
            }
        }
        text
    }

    fn read_number(&mut self) -> String {
        let mut num = String::new();
        if self.current_char == Some('-') {
            num.push('-');
            self.advance();
        }
        num += &self.take_while(|c| c.is_ascii_digit());
        if self.current_char == Some('.') {
            self.advance();
            num.push('.');
            num += &self.take_while(|c| c.is_ascii_digit());
        }
        num
    }

    fn keyword_or_ident(&self, s: &str) -> Token {
        match s.to_uppercase().as_str() {
            "CREATE" => Token::Create,
            "ALTER" => Token::Alter,
            "ADD" => Token::Add,
            "TABLE" => Token::Table,
            "TYPE" => Token::Type,
            "AS" => Token::As,
            "ENUM" => Token::Enum,
            "ONLY" => Token::Only,
            "PRIMARY" => Token::Primary,
            "KEY" => Token::Key,
            "FOREIGN" => Token::Foreign,
            "REFERENCES" => Token::References,
            "NOT" => Token::Not,
            "NULL" => Token::Null,
            "UNIQUE" => Token::Unique,
            "DEFAULT" => Token::Default,
            "ON" => Token::On,
            "DELETE" => Token::Delete,
            "UPDATE" => Token::Update,
            "CASCADE" => Token::Cascade,
            "RESTRICT" => Token::Restrict,
            "CONSTRAINT" => Token::Constraint,
            "INDEX" => Token::Index,
            "IF" => Token::If,
            "EXISTS" => Token::Exists,
            "AUTO" => Token::Auto,
            "INCREMENT" | "AUTO_INCREMENT" | "AUTOINCREMENT" => Token::Increment,
            "CHECK" => Token::Check,
            _ => Token::Ident(s.to_string()),
        }
    }

    /// Returns the next token and the line it starts on.
    pub fn next_spanned(&mut self) -> Spanned {
        loop {
            self.take_while(char::is_whitespace);
            let line = self.line;
            let Some(c) = self.current_char else {
                return Spanned { token: Token::Eof, line };
            };

            let token = match c {
                '-' if self.peek() == Some(&'-') => {
                    self.take_while(|c| c != '\n');
                    continue;
                }
                '-' if self.peek().is_some_and(|c| c.is_ascii_digit()) => {
                    Token::Num(self.read_number())
                }
                '#' => {
                    self.take_while(|c| c != '\n');
                    continue;
                }
                '/' => {
                    self.advance();
                    if self.current_char == Some('*') {
                        self.skip_block_comment();
                    }
                    continue;
                }
                '(' | ')' | ',' | ';' | '.' => {
                    self.advance();
                    match c {
                        '(' => Token::LParen,
                        ')' => Token::RParen,
                        ',' => Token::Comma,
                        ';' => Token::Semicolon,
                        _ => Token::Dot,
                    }
                }
                '"' | '`' => Token::QuotedIdent(self.read_delimited(c, false)),
                '[' if self.peek() == Some(&']') => {
                    self.advance();
                    self.advance();
                    Token::ArraySuffix
                }
                // SQL Server style [identifier]
                '[' => Token::QuotedIdent(self.read_delimited(']', false)),
                '\'' => Token::Str(self.read_delimited('\'', self.backslash_escapes)),
                c if c.is_ascii_digit() => Token::Num(self.read_number()),
                c if c.is_alphabetic() || c == '_' => {
                    let word = self.take_while(|c| c.is_alphanumeric() || c == '_' || c == '$');
                    if word.eq_ignore_ascii_case("e") && self.current_char == Some('\'') {
                        Token::Str(self.read_delimited('\'', true))
                    } else {
                        self.keyword_or_ident(&word)
                    }
                }
                _ => {
                    // Stray characters, including a lone '-', carry no structure
                    self.advance();
                    continue;
                }
            };

            return Spanned { token, line };
        }
    }

    /// Collect all tokens with their lines, ending with `Eof`.
    pub fn tokenize_spanned(&mut self) -> Vec<Spanned> {
        let mut tokens = Vec::new();
        loop {
            let spanned = self.next_spanned();
            let done = spanned.token == Token::Eof;
            tokens.push(spanned);
            if done {
                break;
            }
        }
        tokens
    }

    /// Collect all tokens.
    pub fn tokenize(&mut self) -> Vec<Token> {
        self.tokenize_spanned().into_iter().map(|s| s.token).collect()
    }
}

/// Whether `name` reads back as exactly one bare identifier token.
pub fn is_plain_identifier(name: &str) -> bool {
    match Lexer::new(name).tokenize().as_slice() {
        [Token::Ident(s), Token::Eof] => s == name,
        _ => false,
    }
}
