//! Generate-then-parse round trips across dialects

use pretty_assertions::assert_eq;

use schemasync::graph::{Column, EnumType, Table};
use schemasync::sql::SqlGenerator;
use schemasync::{Dialect, SchemaGraph, Settings, normalize_sql, parse_sql};

use crate::common::{STAMP, column_shapes, edge_shapes, settings, shop_graph, table_names};

fn generate(graph: &SchemaGraph, settings: Settings) -> String {
    SqlGenerator::new(settings).with_timestamp(STAMP).generate(graph)
}

fn assert_same_structure(expected: &SchemaGraph, actual: &SchemaGraph) {
    assert_eq!(table_names(actual), table_names(expected));
    for (e, a) in expected.tables.iter().zip(&actual.tables) {
        assert_eq!(column_shapes(a), column_shapes(e), "table {}", e.name);
    }
    let enums = |g: &SchemaGraph| -> Vec<(String, Vec<String>)> {
        g.enums.iter().map(|e| (e.name.clone(), e.values.clone())).collect()
    };
    assert_eq!(enums(actual), enums(expected));
    assert_eq!(edge_shapes(actual), edge_shapes(expected));
}

#[test]
fn test_postgres_round_trip_is_exact() {
    let graph = shop_graph();
    let sql = generate(&graph, settings(Dialect::PostgreSQL, false));

    let outcome = parse_sql(&sql, None).unwrap();
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
    assert_same_structure(&graph, &outcome.graph);
}

#[test]
fn test_postgres_inline_round_trip() {
    let graph = shop_graph();
    let sql = generate(&graph, settings(Dialect::PostgreSQL, true));
    assert!(!sql.contains("ALTER TABLE"));

    let outcome = parse_sql(&sql, None).unwrap();
    assert_same_structure(&graph, &outcome.graph);
}

#[test]
fn test_case_insensitive_round_trip() {
    let graph = shop_graph();
    let settings = Settings {
        case_sensitive_identifiers: false,
        ..Settings::default()
    };
    let sql = generate(&graph, settings);
    assert!(sql.contains("CREATE TABLE IF NOT EXISTS Customers ("));
    assert!(sql.contains("\"first note\""));

    let outcome = parse_sql(&sql, None).unwrap();
    assert_same_structure(&graph, &outcome.graph);
}

#[test]
fn test_round_trip_keeps_identity_and_cosmetics() {
    let graph = shop_graph();
    let sql = generate(&graph, settings(Dialect::PostgreSQL, false));

    let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
    for (before, after) in graph.tables.iter().zip(&reparsed.tables) {
        assert_eq!(after.id, before.id);
        assert_eq!(after.position, before.position);
        assert_eq!(after.color, before.color);
    }
    assert_eq!(reparsed.enums[0].id, graph.enums[0].id);
    assert_eq!(reparsed.enums[0].position, graph.enums[0].position);

    let fk = reparsed.relationships.iter().find(|r| !r.enum_link).unwrap();
    assert_eq!(fk.style.label.as_deref(), Some("places"));

    // Re-parsing the same text against its own output is a fixed point
    let again = parse_sql(&sql, Some(&reparsed)).unwrap().graph;
    assert_eq!(again, reparsed);
}

#[test]
fn test_mysql_round_trip_modulo_types() {
    let graph = shop_graph();
    let sql = generate(&graph, settings(Dialect::MySQL, false));
    assert!(sql.contains("`status`      ENUM('active', 'inactive') DEFAULT 'active'"));
    assert!(sql.contains("`id`          INT AUTO_INCREMENT PRIMARY KEY"));

    let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
    assert_eq!(table_names(&reparsed), table_names(&graph));
    for (e, a) in graph.tables.iter().zip(&reparsed.tables) {
        let expected: Vec<_> = column_shapes(e)
            .into_iter()
            .map(|c| (c.title, c.constraints, c.auto_increment, c.foreign_key))
            .collect();
        let actual: Vec<_> = column_shapes(a)
            .into_iter()
            .map(|c| (c.title, c.constraints, c.auto_increment, c.foreign_key))
            .collect();
        assert_eq!(actual, expected);
    }

    // The inline value list maps back onto the previous enum
    assert_eq!(reparsed.enums.len(), 1);
    assert_eq!(reparsed.enums[0].id, "enum-status");
    assert_eq!(reparsed.tables[1].columns[2].data_type, "enum_status");
    assert_eq!(edge_shapes(&reparsed), edge_shapes(&graph));
}

#[test]
fn test_sqlite_round_trip_modulo_types() {
    let graph = shop_graph();
    let sql = generate(&graph, settings(Dialect::SQLite, false));
    assert!(!sql.contains("ALTER TABLE"));
    assert_eq!(sql.matches("INTEGER PRIMARY KEY AUTOINCREMENT").count(), 1);
    assert!(sql.contains(r#""customer_id" TEXT NOT NULL REFERENCES "Customers"("id") ON DELETE CASCADE"#));

    let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
    assert_eq!(table_names(&reparsed), table_names(&graph));
    let orders = &reparsed.tables[1];
    assert_eq!(orders.columns[0].data_type, "integer");
    assert!(orders.columns[0].auto_increment);
    assert!(orders.columns[0].is_primary());
    assert_eq!(orders.columns[2].data_type, "enum_status");
    assert_eq!(edge_shapes(&reparsed), edge_shapes(&graph));
}

#[test]
fn test_generated_text_is_stable_under_normalization() {
    let graph = shop_graph();
    for dialect in [Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite] {
        for inline in [false, true] {
            let sql = generate(&graph, settings(dialect, inline));
            assert_eq!(normalize_sql(&sql), sql, "{} inline={}", dialect, inline);
        }
    }
}

#[test]
fn test_colliding_column_names_survive_round_trip() {
    let mut table = Table::new("t1", "events");
    assert_eq!(table.add_column(Column::new("id", "int")), "id");
    assert_eq!(table.add_column(Column::new("id", "int")), "id_2");
    let graph = SchemaGraph {
        tables: vec![table],
        ..Default::default()
    };

    let sql = generate(&graph, Settings::default());
    let reparsed = parse_sql(&sql, None).unwrap().graph;
    let titles: Vec<_> = reparsed.tables[0].columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["id", "id_2"]);
}

#[test]
fn test_quotes_and_backslashes_survive_round_trip() {
    let mut kind = EnumType::new("enum-kind", "kind");
    kind.push_value(r"C:\temp");
    kind.push_value("it's");
    let mut table = Table::new("t1", "files");
    let mut path = Column::new("path", "text");
    path.default = Some(r"a\nb".to_string());
    table.add_column(path);
    table.add_column(Column::new("kind", kind.column_type()));
    let graph = SchemaGraph {
        tables: vec![table],
        enums: vec![kind],
        ..Default::default()
    };

    for dialect in [Dialect::PostgreSQL, Dialect::MySQL] {
        let sql = generate(&graph, settings(dialect, false));
        let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
        let columns = &reparsed.tables[0].columns;
        assert_eq!(columns[0].default.as_deref(), Some(r"a\nb"), "{}", dialect);
        assert_eq!(reparsed.enums[0].values, vec![r"C:\temp", "it's"], "{}", dialect);
    }
}

#[test]
fn test_array_type_keeps_its_parameters() {
    let mut table = Table::new("t1", "posts");
    let mut tags = Column::new("tags", "varchar[]");
    tags.params = vec!["20".to_string()];
    table.add_column(tags);
    let graph = SchemaGraph {
        tables: vec![table],
        ..Default::default()
    };

    let sql = generate(&graph, Settings::default());
    assert!(sql.contains("VARCHAR(20)[]"), "{}", sql);

    let reparsed = parse_sql(&sql, None).unwrap().graph;
    assert_eq!(column_shapes(&reparsed.tables[0]), column_shapes(&graph.tables[0]));
}
