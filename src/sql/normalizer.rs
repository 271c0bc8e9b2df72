//! Text-level repairs applied to SQL before validation and parsing.
//!
//! Every rewrite is idempotent: normalizing already normalized text is a no-op.

use std::collections::HashSet;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use super::Dialect;
use super::generator::FOREIGN_KEY_SECTION;
use super::lexer::is_plain_identifier;
use super::types::{KNOWN_TYPES, continues_previous_type};

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)--[^\n]*|/\*.*?\*/").expect("valid regex"));

static ALTER_FK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?is)\bALTER\s+TABLE\s+(?:ONLY\s+)?(?:"[^"]+"|`[^`]+`|[\w.]+)\s+ADD\s+(?:CONSTRAINT\s+(?:"[^"]+"|`[^`]+`|\w+)\s+)?FOREIGN\s+KEY\s*\([^;()]*\)\s*REFERENCES\s+(?:"[^"]+"|`[^`]+`|[\w.]+)\s*\([^;()]*\)[^;]*;"#,
    )
    .expect("valid regex")
});

static CREATE_TABLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bCREATE\s+(?:TEMP\s+|TEMPORARY\s+)?TABLE\b").expect("valid regex")
});

static IF_NOT_EXISTS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*IF\s+NOT\s+EXISTS\b").expect("valid regex"));

static CREATE_TYPE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\bCREATE\s+TYPE\s+["`]?(\w+)["`]?\s+AS\s+ENUM\b"#).expect("valid regex")
});

static REFERENCES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\bREFERENCES\s+)([A-Za-z_]\w*(?:[ \t]+[A-Za-z_]\w*)+)([ \t]*\()")
        .expect("valid regex")
});

static ALTER_STATEMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\bALTER\s+TABLE\b[^;]*;[ \t]*\n?").expect("valid regex"));

static PLACEHOLDER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\x00\d+\x00").expect("valid regex"));

static WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_]\w*").expect("valid regex"));

/// Matchers that depend on the type names in scope for one text.
struct ColumnPatterns {
    /// Lowercase built-in type words and declared enum names.
    types: HashSet<String>,
    /// Any line that opens a column definition.
    start: Regex,
}

impl ColumnPatterns {
    fn new(enum_types: &[String]) -> Result<Self, regex::Error> {
        let alternatives = KNOWN_TYPES
            .iter()
            .map(|t| regex::escape(t))
            .chain(enum_types.iter().map(|t| regex::escape(t)))
            .collect::<Vec<_>>()
            .join("|");

        Ok(Self {
            types: KNOWN_TYPES
                .iter()
                .map(|t| t.to_string())
                .chain(enum_types.iter().map(|t| t.to_lowercase()))
                .collect(),
            start: Regex::new(&format!(
                r#"(?i)^[ \t]*(?:"[^"]+"|`[^`]+`|\[[^\]]+\]|[A-Za-z_]\w*(?:[ \t]+[A-Za-z_]\w*)*?)[ \t]+(?:{})\b"#,
                alternatives
            ))?,
        })
    }

    fn is_type(&self, word: &str) -> bool {
        self.types.contains(&word.to_lowercase())
    }

    /// Byte range of a bare multi-word column name at the start of `part`.
    ///
    /// The name ends before the first type word following its first word,
    /// so `created_at timestamp with time zone` has the one-word name
    /// `created_at`. Only names of two or more plain words qualify.
    fn multiword_name(&self, part: &str) -> Option<Range<usize>> {
        let start = part.len() - part.trim_start_matches([' ', '\t']).len();
        let mut end = start;
        let mut words = 0;

        loop {
            let rest = &part[end..];
            let gap = rest.len() - rest.trim_start_matches([' ', '\t']).len();
            if words > 0 && gap == 0 {
                return None;
            }
            let word = WORD_RE.find(&rest[gap..])?.as_str();
            if words > 0 && self.is_type(word) {
                return (words >= 2).then_some(start..end);
            }
            if !is_plain_identifier(word) {
                return None;
            }
            end += gap + word.len();
            words += 1;
        }
    }

    fn starts_column(&self, line: &str) -> bool {
        self.start.captures(line).is_some_and(|caps| {
            let head = caps[0].trim();
            // A leading keyword (NOT NULL, PRIMARY KEY, WITH TIME ZONE, ...)
            // continues the previous item
            head.split_whitespace().next().is_some_and(|w| {
                w.starts_with(['"', '`', '['])
                    || (is_plain_identifier(w) && !continues_previous_type(w))
            })
        })
    }
}

/// Placeholder store for text that must pass through untouched.
#[derive(Default)]
struct Protected {
    originals: Vec<String>,
}

impl Protected {
    fn protect(&mut self, text: &str, re: &Regex) -> String {
        re.replace_all(text, |caps: &regex::Captures| {
            self.originals.push(caps[0].to_string());
            format!("\x00{}\x00", self.originals.len() - 1)
        })
        .into_owned()
    }

    fn restore(&self, text: &str) -> String {
        PLACEHOLDER_RE
            .replace_all(text, |caps: &regex::Captures| {
                caps[0]
                    .trim_matches('\x00')
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| self.originals.get(i))
                    .cloned()
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Repair common hand-editing mistakes so the text has a chance to parse.
///
/// Bare identifiers with spaces in table headers, column definitions and
/// `REFERENCES` targets are quoted, missing commas between column
/// definitions are inserted, and repeated `ALTER TABLE ... ADD CONSTRAINT`
/// statements after the foreign key marker are dropped.
pub fn normalize_sql(text: &str) -> String {
    let quote = match Dialect::detect(text) {
        Dialect::MySQL => '`',
        _ => '"',
    };
    let enum_types: Vec<String> = CREATE_TYPE_RE
        .captures_iter(text)
        .map(|caps| caps[1].to_string())
        .collect();
    let patterns = match ColumnPatterns::new(&enum_types) {
        Ok(patterns) => patterns,
        Err(e) => {
            debug!(error = %e, "Skipping column repairs");
            return dedupe_foreign_keys(text);
        }
    };

    let mut protected = Protected::default();
    let masked = protected.protect(text, &COMMENT_RE);
    let masked = protected.protect(&masked, &ALTER_FK_RE);

    let repaired = repair_create_tables(&masked, &patterns, quote);
    let repaired = REFERENCES_RE
        .replace_all(&repaired, |caps: &regex::Captures| {
            if caps[2].split_whitespace().all(is_plain_identifier) {
                format!("{}{}{}", &caps[1], quoted(caps[2].trim(), quote), &caps[3])
            } else {
                caps[0].to_string()
            }
        })
        .into_owned();

    let restored = protected.restore(&repaired);
    let normalized = dedupe_foreign_keys(&restored);

    if normalized != text {
        debug!("Normalized SQL text");
    }
    normalized
}

fn quoted(name: &str, quote: char) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    format!("{}{}{}", quote, words.join(" "), quote)
}

/// Rewrite the header and column list of every CREATE TABLE statement.
fn repair_create_tables(text: &str, patterns: &ColumnPatterns, quote: char) -> String {
    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;

    for m in CREATE_TABLE_RE.find_iter(text) {
        if m.start() < cursor {
            continue;
        }
        let Some(open) = find_outside_quotes(text, m.end(), '(') else {
            continue;
        };
        let close = matching_paren(text, open).unwrap_or(text.len());

        out.push_str(&text[cursor..m.end()]);
        out.push_str(&repair_header(&text[m.end()..open], quote));
        out.push('(');
        out.push_str(&repair_body(&text[open + 1..close], patterns, quote));
        cursor = close;
    }

    out.push_str(&text[cursor..]);
    out
}

fn repair_header(header: &str, quote: char) -> String {
    let (prefix, name) = match IF_NOT_EXISTS_RE.find(header) {
        Some(m) => header.split_at(m.end()),
        None => ("", header),
    };
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() < 2 || !words.iter().all(|w| is_plain_identifier(w)) {
        return header.to_string();
    }
    let lead = &name[..name.len() - name.trim_start().len()];
    let trail = &name[name.trim_end().len()..];
    format!("{}{}{}{}", prefix, lead, quoted(name, quote), trail)
}

/// Comma insertion first, so that every definition starts its own item,
/// then quoting of multi-word names at the start of each item.
fn repair_body(body: &str, patterns: &ColumnPatterns, quote: char) -> String {
    let mut lines: Vec<String> = body.split_inclusive('\n').map(str::to_string).collect();
    let depths = line_depths(&lines);

    let mut previous: Option<usize> = None;
    for i in 0..lines.len() {
        let content = PLACEHOLDER_RE.replace_all(&lines[i], "").into_owned();
        if content.trim().is_empty() {
            continue;
        }
        if depths[i] == 0
            && let Some(p) = previous
            && patterns.starts_column(&content)
        {
            insert_comma(&mut lines[p]);
        }
        previous = Some(i);
    }

    lines
        .iter()
        .zip(&depths)
        .map(|(line, &depth)| {
            if depth == 0 {
                quote_definitions(line, patterns, quote)
            } else {
                line.clone()
            }
        })
        .collect()
}

/// Append a comma to the code part of `line` unless it already ends an item.
fn insert_comma(line: &mut String) {
    let code_end = trailing_code_end(line);
    let code = line[..code_end].trim_end();
    if code.is_empty() || code.ends_with(',') || code.ends_with('(') {
        return;
    }
    line.insert(code.len(), ',');
}

/// Byte offset where trailing placeholders and whitespace begin.
fn trailing_code_end(line: &str) -> usize {
    let mut end = line.trim_end().len();
    loop {
        let head = line[..end].trim_end();
        match PLACEHOLDER_RE
            .find_iter(head)
            .last()
            .filter(|m| m.end() == head.len())
        {
            Some(m) => end = m.start(),
            None => return head.len(),
        }
    }
}

/// Quote multi-word names at the start of each comma-separated part of a line.
fn quote_definitions(line: &str, patterns: &ColumnPatterns, quote: char) -> String {
    split_top_level(line)
        .into_iter()
        .map(|part| match patterns.multiword_name(part) {
            Some(name) => format!(
                "{}{}{}",
                &part[..name.start],
                quoted(&part[name.start..name.end], quote),
                &part[name.end..]
            ),
            None => part.to_string(),
        })
        .collect::<Vec<_>>()
        .join(",")
}

/// Split on commas outside parentheses and quotes.
fn split_top_level(line: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut in_quote: Option<char> = None;

    for (i, c) in line.char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => in_quote = Some(c),
                '(' => depth += 1,
                ')' => depth -= 1,
                ',' if depth == 0 => {
                    parts.push(&line[start..i]);
                    start = i + 1;
                }
                _ => {}
            },
        }
    }

    parts.push(&line[start..]);
    parts
}

/// Parenthesis depth at the start of each line, relative to the column list.
fn line_depths(lines: &[String]) -> Vec<i32> {
    let mut depths = Vec::with_capacity(lines.len());
    let mut depth = 0i32;
    let mut in_quote: Option<char> = None;

    for line in lines {
        depths.push(depth);
        for c in line.chars() {
            match in_quote {
                Some(q) if c == q => in_quote = None,
                Some(_) => {}
                None => match c {
                    '\'' | '"' | '`' => in_quote = Some(c),
                    '(' => depth += 1,
                    ')' => depth -= 1,
                    _ => {}
                },
            }
        }
    }

    depths
}

fn find_outside_quotes(text: &str, from: usize, target: char) -> Option<usize> {
    let mut in_quote: Option<char> = None;
    for (i, c) in text[from..].char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None if c == target => return Some(from + i),
            None if c == ';' => return None,
            None if matches!(c, '\'' | '"' | '`') => in_quote = Some(c),
            None => {}
        }
    }
    None
}

/// Index of the `)` closing the `(` at `open`.
fn matching_paren(text: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    for (i, c) in text[open..].char_indices() {
        match in_quote {
            Some(q) if c == q => in_quote = None,
            Some(_) => {}
            None => match c {
                '\'' | '"' | '`' => in_quote = Some(c),
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(open + i);
                    }
                }
                _ => {}
            },
        }
    }
    None
}

/// Drop byte-identical ALTER TABLE statements after the foreign key marker.
fn dedupe_foreign_keys(text: &str) -> String {
    let Some(marker) = text.find(FOREIGN_KEY_SECTION) else {
        return text.to_string();
    };
    let (head, tail) = text.split_at(marker);

    let mut seen = HashSet::new();
    let mut out = String::with_capacity(text.len());
    out.push_str(head);
    let mut cursor = 0;

    for m in ALTER_STATEMENT_RE.find_iter(tail) {
        let statement = m.as_str().trim_end();
        if !statement.to_uppercase().contains("ADD CONSTRAINT") {
            continue;
        }
        if !seen.insert(statement.to_string()) {
            out.push_str(&tail[cursor..m.start()]);
            cursor = m.end();
        }
    }

    out.push_str(&tail[cursor..]);
    out
}
