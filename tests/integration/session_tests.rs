//! Session behaviour over generated text

use pretty_assertions::assert_eq;

use schemasync::graph::{Column, Table};
use schemasync::{ApplyError, SchemaError, SchemaGraph, SchemaSession, Settings};

use crate::common::shop_graph;

#[test]
fn test_applying_generated_text_keeps_the_graph() {
    let graph = shop_graph();
    let mut session = SchemaSession::with_graph(graph.clone(), Settings::default());
    let text = session.text().to_string();

    session.apply_text(&text).unwrap();
    let applied = session.graph();

    assert_eq!(applied.tables.len(), graph.tables.len());
    for (before, after) in graph.tables.iter().zip(&applied.tables) {
        assert_eq!(after.id, before.id);
        assert_eq!(after.position, before.position);
        assert_eq!(after.color, before.color);
        assert_eq!(after.columns, before.columns);
    }
    assert_eq!(applied.enums, graph.enums);
    assert_eq!(session.text(), text);
    assert!(session.warnings().is_empty());
}

#[test]
fn test_chunked_apply_of_suggestion() {
    let mut session = SchemaSession::with_graph(shop_graph(), Settings::default());
    let suggestion = format!("{}\nCREATE TABLE \"Reviews\" (\"id\" INT PRIMARY KEY);\n", session.text());

    session.begin_apply(suggestion.clone(), 64).unwrap();
    let mut chunks = 0;
    while session.next_chunk().unwrap().is_some() {
        chunks += 1;
    }
    assert!(chunks > 1);
    assert_eq!(session.text(), suggestion);

    let graph = session.commit_apply().unwrap();
    let names: Vec<_> = graph.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["Customers", "Orders", "Reviews"]);
    assert_eq!(graph.tables[0].id, "t-customers");
}

#[test]
fn test_graph_is_locked_during_apply() {
    let mut session = SchemaSession::new(Settings::default());
    session.begin_apply("CREATE TABLE a (id INT);", 8).unwrap();

    assert_eq!(session.edit_graph(|_| {}), Err(ApplyError::Editing));
    assert_eq!(
        session.update_settings(Settings::default()),
        Err(ApplyError::Editing)
    );
    assert!(matches!(
        session.apply_text("CREATE TABLE b (id INT);"),
        Err(SchemaError::Apply(ApplyError::InProgress))
    ));

    session.commit_apply().unwrap();
    assert!(session.edit_graph(|_| {}).is_ok());
}

#[test]
fn test_titles_differing_in_case_reapply_cleanly() {
    let mut table = Table::new("t1", "people");
    table.add_column(Column::new("Name", "text"));
    assert_eq!(table.add_column(Column::new("name", "text")), "name_2");
    let graph = SchemaGraph {
        tables: vec![table],
        ..Default::default()
    };
    let mut session = SchemaSession::with_graph(graph, Settings::default());
    let text = session.text().to_string();

    let applied = session.apply_text(&text).unwrap();
    let titles: Vec<_> = applied.tables[0].columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Name", "name_2"]);
}

#[test]
fn test_multiword_type_is_not_taken_for_a_name() {
    let mut session = SchemaSession::new(Settings::default());
    let text = "CREATE TABLE events (\n  id INT PRIMARY KEY,\n  created_at timestamp with time zone,\n  updated_at TIMESTAMP\n    WITH TIME ZONE NOT NULL\n);\n";

    let graph = session.apply_text(text).unwrap();
    let columns: Vec<_> = graph.tables[0]
        .columns
        .iter()
        .map(|c| (c.title.as_str(), c.data_type.as_str()))
        .collect();
    assert_eq!(
        columns,
        vec![("id", "int"), ("created_at", "timestamptz"), ("updated_at", "timestamptz")]
    );
    assert_eq!(session.text(), text);
}
