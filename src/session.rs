//! The editing session that keeps the graph and its SQL text in step.
//!
//! Text reaches the graph only through [`SchemaSession::apply_text`] or a
//! chunked apply ending in [`SchemaSession::commit_apply`]. Both run the
//! same pipeline (normalize, validate, parse against the current graph)
//! and replace the graph in one assignment, so a failure never leaves a
//! half-applied graph behind.

use tracing::{debug, info};

use crate::error::{ApplyError, SchemaError};
use crate::graph::{SchemaGraph, Settings};
use crate::sql::{generate_sql, normalize_sql, parse_sql, validate_sql};

/// An apply whose text is still being revealed.
#[derive(Debug, Clone)]
struct PendingApply {
    target: String,
    previous_text: String,
    revealed: usize,
    chunk_size: usize,
}

impl PendingApply {
    fn is_complete(&self) -> bool {
        self.revealed >= self.target.len()
    }

    /// Advance by `chunk_size` characters, returning the newly revealed slice.
    fn advance(&mut self) -> Option<&str> {
        if self.is_complete() {
            return None;
        }
        let start = self.revealed;
        let end = self.target[start..]
            .char_indices()
            .nth(self.chunk_size)
            .map(|(i, _)| start + i)
            .unwrap_or(self.target.len());
        self.revealed = end;
        Some(&self.target[start..end])
    }
}

/// Result of a successful apply.
struct Applied {
    graph: SchemaGraph,
    text: String,
    warnings: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SchemaSession {
    graph: SchemaGraph,
    settings: Settings,
    text: String,
    warnings: Vec<String>,
    pending: Option<PendingApply>,
}

impl SchemaSession {
    pub fn new(settings: Settings) -> Self {
        Self::with_graph(SchemaGraph::default(), settings)
    }

    pub fn with_graph(graph: SchemaGraph, settings: Settings) -> Self {
        let mut session = Self {
            graph,
            settings,
            ..Default::default()
        };
        session.regenerate();
        session
    }

    pub fn graph(&self) -> &SchemaGraph {
        &self.graph
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The text as currently shown, including a partially revealed apply.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Non-blocking findings from the last successful apply.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn is_applying(&self) -> bool {
        self.pending.is_some()
    }

    /// Replace the text with the generator's rendering of the graph.
    pub fn regenerate(&mut self) -> &str {
        self.text = generate_sql(&self.graph, &self.settings);
        &self.text
    }

    /// Change settings and regenerate the text.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), ApplyError> {
        if self.is_applying() {
            return Err(ApplyError::Editing);
        }
        self.settings = settings;
        self.regenerate();
        Ok(())
    }

    /// Edit the graph directly, as the canvas does, then regenerate the text.
    pub fn edit_graph<F>(&mut self, edit: F) -> Result<(), ApplyError>
    where
        F: FnOnce(&mut SchemaGraph),
    {
        if self.is_applying() {
            return Err(ApplyError::Editing);
        }
        edit(&mut self.graph);
        self.regenerate();
        Ok(())
    }

    /// Apply a complete SQL string to the graph in one step.
    pub fn apply_text(&mut self, text: &str) -> Result<&SchemaGraph, SchemaError> {
        if self.is_applying() {
            return Err(ApplyError::InProgress.into());
        }
        let applied = self.run_pipeline(text)?;
        self.commit(applied);
        Ok(&self.graph)
    }

    /// Start revealing `text` in chunks of `chunk_size` characters.
    pub fn begin_apply(&mut self, text: impl Into<String>, chunk_size: usize) -> Result<(), ApplyError> {
        if self.is_applying() {
            return Err(ApplyError::InProgress);
        }
        self.pending = Some(PendingApply {
            target: text.into(),
            previous_text: std::mem::take(&mut self.text),
            revealed: 0,
            chunk_size: chunk_size.max(1),
        });
        debug!(chunk_size, "Began chunked apply");
        Ok(())
    }

    /// Reveal the next chunk. Returns `None` once the whole text is shown.
    pub fn next_chunk(&mut self) -> Result<Option<String>, ApplyError> {
        let pending = self.pending.as_mut().ok_or(ApplyError::NotApplying)?;
        let chunk = pending.advance().map(str::to_string);
        if let Some(chunk) = &chunk {
            self.text.push_str(chunk);
        }
        Ok(chunk)
    }

    /// Abort the apply and restore the text shown before it began.
    pub fn cancel_apply(&mut self) -> Result<(), ApplyError> {
        let pending = self.pending.take().ok_or(ApplyError::NotApplying)?;
        self.text = pending.previous_text;
        info!("Cancelled SQL apply");
        Ok(())
    }

    /// Parse the full pending text and replace the graph.
    ///
    /// Any unrevealed remainder is shown first. On failure the previous
    /// text is restored and the graph is left as it was.
    pub fn commit_apply(&mut self) -> Result<&SchemaGraph, SchemaError> {
        let pending = self.pending.take().ok_or(ApplyError::NotApplying)?;

        match self.run_pipeline(&pending.target) {
            Ok(applied) => {
                self.commit(applied);
                Ok(&self.graph)
            }
            Err(e) => {
                info!(error = %e, "SQL apply failed, restoring previous text");
                self.text = pending.previous_text;
                Err(e)
            }
        }
    }

    fn run_pipeline(&self, text: &str) -> Result<Applied, SchemaError> {
        let normalized = normalize_sql(text);

        let report = validate_sql(&normalized);
        if !report.is_valid {
            return Err(SchemaError::Validation(report));
        }

        let outcome = parse_sql(&normalized, Some(&self.graph))?;

        let warnings = report
            .warnings()
            .map(ToString::to_string)
            .chain(outcome.warnings)
            .collect();

        Ok(Applied {
            graph: outcome.graph,
            text: normalized,
            warnings,
        })
    }

    fn commit(&mut self, applied: Applied) {
        info!(
            tables = applied.graph.tables.len(),
            enums = applied.graph.enums.len(),
            relationships = applied.graph.relationships.len(),
            warnings = applied.warnings.len(),
            "Applied SQL to graph"
        );
        self.graph = applied.graph;
        self.text = applied.text;
        self.warnings = applied.warnings;
    }
}
