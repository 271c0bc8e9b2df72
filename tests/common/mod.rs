//! Common test utilities for schemasync tests

use std::collections::{BTreeSet, HashMap};

use schemasync::graph::{
    Cardinality, Column, ColumnConstraint, EdgeStyle, EnumType, ForeignKeyRef, Position,
    Relationship, Table, TableColor,
};
use schemasync::{Dialect, SchemaGraph, Settings};

pub const STAMP: &str = "2024-01-01T00:00:00Z";

pub fn settings(dialect: Dialect, inline: bool) -> Settings {
    Settings {
        dialect,
        use_inline_constraints: inline,
        ..Settings::default()
    }
}

/// Customers and Orders joined by a foreign key, plus a status enum.
pub fn shop_graph() -> SchemaGraph {
    let mut status = EnumType::new("enum-status", "status");
    status.push_value("active");
    status.push_value("inactive");
    status.position = Position::new(1150.0, 100.0);

    let mut customers = Table::new("t-customers", "Customers");
    customers.position = Position::new(40.0, 60.0);
    customers.color = Some(TableColor {
        light: "#e0f2fe".to_string(),
        dark: "#0c4a6e".to_string(),
        border: "#0284c7".to_string(),
    });
    customers.add_column(Column::new("id", "uuid").with_constraint(ColumnConstraint::Primary));
    let mut email = Column::new("email", "varchar").with_params(&["255"]);
    email.add_constraint(ColumnConstraint::Unique);
    email.add_constraint(ColumnConstraint::NotNull);
    customers.add_column(email);
    let mut created = Column::new("created_at", "timestamptz").with_constraint(ColumnConstraint::NotNull);
    created.default = Some("now()".to_string());
    customers.add_column(created);

    let mut orders = Table::new("t-orders", "Orders");
    orders.position = Position::new(500.0, 60.0);
    let mut id = Column::new("id", "integer").with_constraint(ColumnConstraint::Primary);
    id.auto_increment = true;
    orders.add_column(id);
    let mut customer_id = Column::new("customer_id", "uuid");
    customer_id.add_constraint(ColumnConstraint::NotNull);
    customer_id.add_constraint(ColumnConstraint::Index);
    customer_id.foreign_key = Some(ForeignKeyRef {
        table: "Customers".to_string(),
        column: "id".to_string(),
        on_delete: Some("CASCADE".to_string()),
        on_update: None,
        resolved: true,
    });
    orders.add_column(customer_id);
    let mut state = Column::new("status", "enum_status");
    state.default = Some("active".to_string());
    orders.add_column(state);
    let mut total = Column::new("total", "numeric").with_params(&["10", "2"]);
    total.default = Some("0".to_string());
    orders.add_column(total);
    orders.add_column(Column::new("first note", "text"));

    let fk = Relationship {
        id: "e1".to_string(),
        source: "t-orders".to_string(),
        source_handle: "source-customer_id".to_string(),
        target: "t-customers".to_string(),
        target_handle: "target-id".to_string(),
        cardinality: Cardinality::ManyToOne,
        enum_link: false,
        style: EdgeStyle {
            label: Some("places".to_string()),
            ..EdgeStyle::default()
        },
    };
    let link = Relationship {
        id: "e2".to_string(),
        source: "enum-status".to_string(),
        source_handle: "source-status".to_string(),
        target: "t-orders".to_string(),
        target_handle: "target-status".to_string(),
        cardinality: Cardinality::OneToMany,
        enum_link: true,
        style: EdgeStyle::enum_link(),
    };

    SchemaGraph {
        tables: vec![customers, orders],
        enums: vec![status],
        relationships: vec![fk, link],
    }
}

/// Column structure with constraints compared as a set.
#[derive(Debug, PartialEq)]
pub struct ColumnShape {
    pub title: String,
    pub data_type: String,
    pub params: Vec<String>,
    pub constraints: BTreeSet<String>,
    pub default: Option<String>,
    pub auto_increment: bool,
    pub foreign_key: Option<(String, String, Option<String>)>,
}

/// Edge endpoints by name instead of id.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct EdgeShape {
    pub source: String,
    pub source_handle: String,
    pub target: String,
    pub target_handle: String,
    pub cardinality: String,
    pub enum_link: bool,
}

pub fn column_shapes(table: &Table) -> Vec<ColumnShape> {
    table
        .columns
        .iter()
        .map(|c| ColumnShape {
            title: c.title.clone(),
            data_type: c.data_type.clone(),
            params: c.params.clone(),
            constraints: c.constraints.iter().map(|k| format!("{:?}", k)).collect(),
            default: c.default.clone(),
            auto_increment: c.auto_increment,
            foreign_key: c
                .foreign_key
                .as_ref()
                .map(|fk| (fk.table.clone(), fk.column.clone(), fk.on_delete.clone())),
        })
        .collect()
}

pub fn edge_shapes(graph: &SchemaGraph) -> Vec<EdgeShape> {
    let names: HashMap<&str, &str> = graph
        .tables
        .iter()
        .map(|t| (t.id.as_str(), t.name.as_str()))
        .chain(graph.enums.iter().map(|e| (e.id.as_str(), e.name.as_str())))
        .collect();
    let name = |id: &str| names.get(id).copied().unwrap_or(id).to_string();

    let mut shapes: Vec<EdgeShape> = graph
        .relationships
        .iter()
        .map(|r| EdgeShape {
            source: name(&r.source),
            source_handle: r.source_handle.clone(),
            target: name(&r.target),
            target_handle: r.target_handle.clone(),
            cardinality: format!("{:?}", r.cardinality),
            enum_link: r.enum_link,
        })
        .collect();
    shapes.sort();
    shapes
}

pub fn table_names(graph: &SchemaGraph) -> Vec<&str> {
    graph.tables.iter().map(|t| t.name.as_str()).collect()
}
