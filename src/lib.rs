pub mod error;
pub mod graph;
pub mod layout;
pub mod reconcile;
pub mod session;
pub mod sql;

use wasm_bindgen::prelude::*;

pub use error::{ApplyError, ParseError, SchemaError};
pub use graph::{SchemaGraph, Settings};
pub use session::SchemaSession;
pub use sql::{Dialect, ParseOutcome, ValidationReport, generate_sql, normalize_sql, parse_sql, validate_sql};

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Render a graph (JSON) as SQL for the given settings (JSON).
#[wasm_bindgen(js_name = "graphToSql")]
pub fn graph_to_sql(graph_json: &str, settings_json: Option<String>) -> Result<String, String> {
    let graph: SchemaGraph = serde_json::from_str(graph_json).map_err(|e| e.to_string())?;
    let settings: Settings = match settings_json.as_deref() {
        Some(json) if !json.trim().is_empty() => {
            serde_json::from_str(json).map_err(|e| e.to_string())?
        }
        _ => Settings::default(),
    };

    Ok(generate_sql(&graph, &settings))
}

/// Parse SQL into graph JSON, reconciling against an optional previous graph.
///
/// Returns `{ "graph": ..., "warnings": [...] }`.
#[wasm_bindgen(js_name = "sqlToGraph")]
pub fn sql_to_graph(sql: &str, previous_json: Option<String>) -> Result<String, String> {
    let previous: Option<SchemaGraph> = match previous_json.as_deref() {
        Some(json) if !json.trim().is_empty() => {
            Some(serde_json::from_str(json).map_err(|e| e.to_string())?)
        }
        _ => None,
    };

    let outcome = parse_sql(sql, previous.as_ref()).map_err(|e| e.to_string())?;
    serde_json::to_string(&outcome).map_err(|e| e.to_string())
}

/// Validate SQL, returning the report as JSON.
#[wasm_bindgen(js_name = "validateSql")]
pub fn validate_sql_json(sql: &str) -> Result<String, String> {
    serde_json::to_string(&validate_sql(sql)).map_err(|e| e.to_string())
}

#[wasm_bindgen(js_name = "normalizeSql")]
pub fn normalize_sql_text(sql: &str) -> String {
    normalize_sql(sql)
}
