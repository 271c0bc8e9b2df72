//! End-to-end scenarios for the generator, parser, validator and normalizer

use pretty_assertions::assert_eq;

use schemasync::graph::{Cardinality, ColumnConstraint, Column, EdgeStyle, Relationship, Table};
use schemasync::sql::{FOREIGN_KEY_SECTION, SqlGenerator};
use schemasync::{Dialect, SchemaGraph, normalize_sql, parse_sql, validate_sql};

use crate::common::{STAMP, settings};

#[test]
fn test_scenario_create_table_with_inline_constraints() {
    let sql = r#"CREATE TABLE IF NOT EXISTS "Users" (id uuid PRIMARY KEY, email varchar(255) UNIQUE NOT NULL);"#;
    let graph = parse_sql(sql, None).unwrap().graph;

    assert_eq!(graph.tables.len(), 1);
    let users = &graph.tables[0];
    assert_eq!(users.name, "Users");

    let id = &users.columns[0];
    assert_eq!((id.title.as_str(), id.data_type.as_str()), ("id", "uuid"));
    assert_eq!(id.constraints, vec![ColumnConstraint::Primary]);

    let email = &users.columns[1];
    assert_eq!((email.title.as_str(), email.data_type.as_str()), ("email", "varchar"));
    assert_eq!(email.params, vec!["255".to_string()]);
    assert_eq!(
        email.constraints,
        vec![ColumnConstraint::Unique, ColumnConstraint::NotNull]
    );
}

#[test]
fn test_scenario_out_of_line_foreign_key() {
    let mut orders = Table::new("o", "Orders");
    orders.add_column(Column::new("id", "uuid").with_constraint(ColumnConstraint::Primary));
    orders.add_column(Column::new("customer_id", "uuid"));
    let mut customers = Table::new("c", "Customers");
    customers.add_column(Column::new("id", "uuid").with_constraint(ColumnConstraint::Primary));
    let graph = SchemaGraph {
        tables: vec![orders, customers],
        enums: vec![],
        relationships: vec![Relationship {
            id: "e".to_string(),
            source: "o".to_string(),
            source_handle: "source-customer_id".to_string(),
            target: "c".to_string(),
            target_handle: "target-id".to_string(),
            cardinality: Cardinality::ManyToOne,
            enum_link: false,
            style: EdgeStyle::default(),
        }],
    };

    let sql = SqlGenerator::new(settings(Dialect::PostgreSQL, false))
        .with_timestamp(STAMP)
        .generate(&graph);

    assert_eq!(sql.matches("CREATE TABLE").count(), 2);
    let alters: Vec<&str> = sql.lines().filter(|l| l.starts_with("ALTER TABLE")).collect();
    assert_eq!(alters.len(), 1);
    assert!(alters[0].starts_with(r#"ALTER TABLE "Orders" ADD CONSTRAINT "#));
    assert!(alters[0].ends_with(r#"FOREIGN KEY ("customer_id") REFERENCES "Customers"("id");"#));
}

#[test]
fn test_scenario_duplicate_column_blocks() {
    let report = validate_sql("CREATE TABLE A (id int, id int);");
    assert!(!report.is_valid);
    assert_eq!(
        report.blocking().collect::<Vec<_>>(),
        vec!["Line 1: Duplicate column 'id' in table 'A'".to_string()]
    );
}

#[test]
fn test_scenario_enum_type_and_link() {
    let sql = "CREATE TYPE status AS ENUM ('active','inactive'); CREATE TABLE t (s status);";
    let graph = parse_sql(sql, None).unwrap().graph;

    assert_eq!(graph.enums.len(), 1);
    let status = &graph.enums[0];
    assert_eq!(status.name, "status");
    assert_eq!(status.values, vec!["active".to_string(), "inactive".to_string()]);

    assert_eq!(graph.tables.len(), 1);
    let t = &graph.tables[0];
    assert_eq!(t.name, "t");
    assert_eq!(t.columns[0].title, "s");
    assert_eq!(t.columns[0].data_type, "enum_status");

    assert_eq!(graph.relationships.len(), 1);
    let link = &graph.relationships[0];
    assert!(link.enum_link);
    assert_eq!(link.source, status.id);
    assert_eq!(link.target, t.id);
    assert_eq!(link.target_handle, "target-s");
}

#[test]
fn test_scenario_duplicate_alter_statements_collapse() {
    let alter = r#"ALTER TABLE "Orders" ADD CONSTRAINT "fk_orders_customer_id" FOREIGN KEY ("customer_id") REFERENCES "Customers"("id");"#;
    let sql = format!(
        "CREATE TABLE \"Customers\" (\"id\" UUID PRIMARY KEY);\nCREATE TABLE \"Orders\" (\"customer_id\" UUID);\n\n{}\n{}\n{}\n",
        FOREIGN_KEY_SECTION, alter, alter
    );

    let normalized = normalize_sql(&sql);
    assert_eq!(normalized.matches("ALTER TABLE").count(), 1);
    assert_eq!(normalize_sql(&normalized), normalized);

    let graph = parse_sql(&normalized, None).unwrap().graph;
    assert_eq!(graph.relationships.len(), 1);
}

#[test]
fn test_hand_edited_text_is_repaired_then_parsed() {
    let sql = "CREATE TABLE order items (\n  id INT PRIMARY KEY\n  unit price NUMERIC(10, 2)\n  order id INT REFERENCES orders(id)\n);\nCREATE TABLE orders (id INT PRIMARY KEY);";
    assert!(!validate_sql(sql).is_valid);

    let normalized = normalize_sql(sql);
    let report = validate_sql(&normalized);
    assert!(report.is_valid, "{:?}", report.findings);

    let graph = parse_sql(&normalized, None).unwrap().graph;
    let names: Vec<_> = graph.tables.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, vec!["order items", "orders"]);
    let titles: Vec<_> = graph.tables[0].columns.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["id", "unit price", "order id"]);
    assert_eq!(graph.foreign_keys().count(), 1);
}

#[test]
fn test_unresolved_reference_warns_without_blocking() {
    let outcome = parse_sql("CREATE TABLE posts (author_id INT REFERENCES users(id));", None).unwrap();
    assert_eq!(outcome.graph.tables.len(), 1);
    assert!(outcome.graph.relationships.is_empty());
    assert_eq!(outcome.warnings.len(), 1);

    let fk = outcome.graph.tables[0].columns[0].foreign_key.as_ref().unwrap();
    assert!(!fk.resolved);
}
