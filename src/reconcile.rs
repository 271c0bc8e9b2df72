//! Identity reconciliation between a previous graph and freshly parsed entities.
//!
//! Everything here is a pure function of the previous snapshot and the new
//! candidates; nothing mutates the previous graph.

use std::collections::{HashMap, HashSet};

use sha2::{Digest, Sha256};

use crate::graph::{
    Cardinality, EdgeStyle, EnumType, Position, Relationship, SchemaGraph, Table, TableColor,
    handle_column, source_handle, target_handle,
};
use crate::layout;

/// Read-only view of the graph being replaced.
#[derive(Debug, Default)]
pub struct PriorSnapshot<'a> {
    tables: HashMap<String, &'a Table>,
    enums: HashMap<String, &'a EnumType>,
    edges: &'a [Relationship],
}

impl<'a> PriorSnapshot<'a> {
    pub fn new(previous: Option<&'a SchemaGraph>) -> Self {
        let Some(graph) = previous else {
            return Self::default();
        };

        let mut tables = HashMap::new();
        for table in &graph.tables {
            tables.entry(table.name.to_lowercase()).or_insert(table);
        }
        let mut enums = HashMap::new();
        for enum_type in &graph.enums {
            enums.entry(enum_type.name.to_lowercase()).or_insert(enum_type);
        }

        Self {
            tables,
            enums,
            edges: &graph.relationships,
        }
    }

    /// Case-insensitive lookup of a previous table.
    pub fn table(&self, name: &str) -> Option<&'a Table> {
        self.tables.get(&name.to_lowercase()).copied()
    }

    /// Case-insensitive lookup of a previous enum.
    pub fn enum_type(&self, name: &str) -> Option<&'a EnumType> {
        self.enums.get(&name.to_lowercase()).copied()
    }

    /// A previous enum with exactly these values, in order.
    pub fn enum_with_values(&self, values: &[String]) -> Option<&'a EnumType> {
        let mut matches: Vec<_> = self.enums.values().filter(|e| e.values == values).collect();
        matches.sort_by(|a, b| a.name.cmp(&b.name));
        matches.first().copied().copied()
    }

    pub fn edges(&self) -> &'a [Relationship] {
        self.edges
    }
}

/// Hands out ids that never clash with ids of the previous graph.
#[derive(Debug, Default)]
pub struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    pub fn new(previous: Option<&SchemaGraph>) -> Self {
        let mut taken = HashSet::new();
        if let Some(graph) = previous {
            taken.extend(graph.tables.iter().map(|t| t.id.clone()));
            taken.extend(graph.enums.iter().map(|e| e.id.clone()));
        }
        Self { taken }
    }

    /// `<prefix>-<slug>`, suffixed with `-2`, `-3`, ... on collision.
    pub fn allocate(&mut self, prefix: &str, name: &str) -> String {
        let base = format!("{}-{}", prefix, slug(name));
        let mut id = base.clone();
        let mut n = 2;
        while self.taken.contains(&id) {
            id = format!("{}-{}", base, n);
            n += 1;
        }
        self.taken.insert(id.clone());
        id
    }
}

/// Lowercase name with every non-alphanumeric run collapsed to `_`.
pub fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.chars() {
        if c.is_alphanumeric() {
            out.extend(c.to_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "unnamed".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Identity and cosmetic state assigned to a parsed table.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub id: String,
    pub position: Position,
    pub color: Option<TableColor>,
}

/// Reuse a previous table's identity, or place a new one at grid slot `index`.
pub fn place_table(
    prior: &PriorSnapshot<'_>,
    ids: &mut IdAllocator,
    name: &str,
    index: usize,
) -> Placement {
    match prior.table(name) {
        Some(table) => Placement {
            id: table.id.clone(),
            position: table.position,
            color: table.color.clone(),
        },
        None => Placement {
            id: ids.allocate("table", name),
            position: layout::table_slot(index),
            color: None,
        },
    }
}

/// Reuse a previous enum's identity, or place a new one at enum slot `index`.
pub fn place_enum(
    prior: &PriorSnapshot<'_>,
    ids: &mut IdAllocator,
    name: &str,
    index: usize,
) -> Placement {
    match prior.enum_type(name) {
        Some(enum_type) => Placement {
            id: enum_type.id.clone(),
            position: enum_type.position,
            color: None,
        },
        None => Placement {
            id: ids.allocate("enum", name),
            position: layout::enum_slot(index),
            color: None,
        },
    }
}

/// An edge the parser wants to create, before identity is assigned.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeCandidate {
    pub source: String,
    pub source_column: String,
    pub target: String,
    pub target_column: String,
    pub cardinality: Cardinality,
    pub enum_link: bool,
}

impl EdgeCandidate {
    pub fn key(&self) -> String {
        edge_key(
            &self.source,
            &source_handle(&self.source_column),
            &self.target,
            &target_handle(&self.target_column),
        )
    }

    /// Key of the same connection drawn in the opposite direction.
    pub fn reverse_key(&self) -> String {
        edge_key(
            &self.target,
            &source_handle(&self.target_column),
            &self.source,
            &target_handle(&self.source_column),
        )
    }
}

pub fn edge_key(source: &str, source_handle: &str, target: &str, target_handle: &str) -> String {
    format!("{}|{}|{}|{}", source, source_handle, target, target_handle)
}

/// Stable edge id derived from its key.
pub fn edge_id(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("edge-{}", &hex::encode(digest)[..16])
}

fn relationship_key(edge: &Relationship) -> String {
    edge_key(
        &edge.source,
        &source_handle(handle_column(&edge.source_handle)),
        &edge.target,
        &target_handle(handle_column(&edge.target_handle)),
    )
}

/// Turn candidates into relationships, inheriting the style of any previous
/// edge with the same key or its exact reverse. Duplicate candidates collapse.
pub fn reconcile_edges(previous: &[Relationship], candidates: Vec<EdgeCandidate>) -> Vec<Relationship> {
    let previous_by_key: HashMap<String, &Relationship> =
        previous.iter().map(|e| (relationship_key(e), e)).collect();

    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for candidate in candidates {
        let key = candidate.key();
        if !seen.insert(key.clone()) {
            continue;
        }

        let inherited = previous_by_key
            .get(&key)
            .or_else(|| previous_by_key.get(&candidate.reverse_key()));

        let style = match inherited {
            Some(edge) => edge.style.clone(),
            None if candidate.enum_link => EdgeStyle::enum_link(),
            None => EdgeStyle::default(),
        };

        edges.push(Relationship {
            id: edge_id(&key),
            source_handle: source_handle(&candidate.source_column),
            target_handle: target_handle(&candidate.target_column),
            source: candidate.source,
            target: candidate.target,
            cardinality: candidate.cardinality,
            enum_link: candidate.enum_link,
            style,
        });
    }

    edges
}
