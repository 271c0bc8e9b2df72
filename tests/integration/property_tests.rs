//! Property-based tests over generated graphs and hand-edited text

use std::collections::BTreeSet;

use proptest::prelude::*;

use schemasync::graph::{Column, ColumnConstraint, EnumType, Table};
use schemasync::sql::SqlGenerator;
use schemasync::{Dialect, SchemaGraph, Settings, normalize_sql, parse_sql};

use crate::common::{STAMP, column_shapes, table_names};

// ============================================================================
// Strategies
// ============================================================================

/// Distinct ignoring case, with spaces, keywords and mixed case.
const TABLE_NAMES: &[&str] = &["users", "line items", "order", "Audit Log", "key", "select"];
const COLUMN_NAMES: &[&str] = &[
    "id", "name", "first note", "order", "user", "default", "Created At", "key", "table",
];
const ENUM_NAMES: &[&str] = &["status", "mood"];

#[derive(Debug, Clone)]
enum Kind {
    Integer,
    Text,
    Boolean,
    Uuid,
    Varchar(u16),
    Numeric(u8, u8),
    Enum(usize),
}

#[derive(Debug, Clone)]
struct ColumnSpec {
    kind: Kind,
    not_null: bool,
    unique: bool,
    default: Option<String>,
}

/// Starts with a letter so a default never reads as NULL, a number or a call.
fn literal() -> impl Strategy<Value = String> {
    r"[a-z][a-z '\\]{0,8}"
}

fn kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        Just(Kind::Integer),
        Just(Kind::Text),
        Just(Kind::Boolean),
        Just(Kind::Uuid),
        (1u16..=255).prop_map(Kind::Varchar),
        (1u8..=18, 0u8..=4).prop_map(|(p, s)| Kind::Numeric(p, s)),
        (0..ENUM_NAMES.len()).prop_map(Kind::Enum),
    ]
}

fn column_spec() -> impl Strategy<Value = ColumnSpec> {
    (kind(), any::<bool>(), any::<bool>(), prop::option::of(literal())).prop_map(
        |(kind, not_null, unique, default)| ColumnSpec {
            kind,
            not_null,
            unique,
            default,
        },
    )
}

fn schema() -> impl Strategy<Value = SchemaGraph> {
    (
        prop::collection::vec(prop::collection::btree_set(literal(), 1..4), ENUM_NAMES.len()),
        prop::sample::subsequence(TABLE_NAMES, 1..=3),
    )
        .prop_flat_map(|(values, names)| {
            let columns = prop::collection::vec(
                (
                    prop::sample::subsequence(COLUMN_NAMES, 1..=4),
                    prop::collection::vec(column_spec(), 4),
                ),
                names.len(),
            );
            (Just(values), Just(names), columns)
        })
        .prop_map(|(values, names, columns)| build_graph(values, &names, columns))
}

fn build_graph(
    values: Vec<BTreeSet<String>>,
    names: &[&str],
    columns: Vec<(Vec<&str>, Vec<ColumnSpec>)>,
) -> SchemaGraph {
    let enums: Vec<EnumType> = ENUM_NAMES
        .iter()
        .zip(values)
        .map(|(name, values)| {
            let mut enum_type = EnumType::new(format!("enum-{}", name), *name);
            for value in values {
                enum_type.push_value(value);
            }
            enum_type
        })
        .collect();

    let tables = names
        .iter()
        .zip(columns)
        .enumerate()
        .map(|(i, (name, (titles, specs)))| {
            let mut table = Table::new(format!("t-{}", i), *name);
            for (title, spec) in titles.iter().zip(specs) {
                table.add_column(build_column(title, spec, &enums));
            }
            table
        })
        .collect();

    SchemaGraph {
        tables,
        enums,
        relationships: Vec::new(),
    }
}

fn build_column(title: &str, spec: ColumnSpec, enums: &[EnumType]) -> Column {
    let mut column = match spec.kind {
        Kind::Integer => Column::new(title, "integer"),
        Kind::Text => Column::new(title, "text"),
        Kind::Boolean => Column::new(title, "boolean"),
        Kind::Uuid => Column::new(title, "uuid"),
        Kind::Varchar(n) => {
            let mut column = Column::new(title, "varchar");
            column.params = vec![n.to_string()];
            column
        }
        Kind::Numeric(p, s) => {
            let mut column = Column::new(title, "numeric");
            column.params = vec![p.to_string(), s.to_string()];
            column
        }
        Kind::Enum(i) => Column::new(title, enums[i].column_type()),
    };

    if spec.not_null {
        column.add_constraint(ColumnConstraint::NotNull);
    }
    if spec.unique {
        column.add_constraint(ColumnConstraint::Unique);
    }
    column.default = match spec.kind {
        Kind::Text | Kind::Varchar(_) => spec.default,
        Kind::Enum(i) => spec.default.and(enums[i].values.first().cloned()),
        _ => None,
    };
    column
}

const TABLE_HEADERS: &[&str] = &["orders", "line items", "\"Audit Log\""];
const DIALECTS: &[Dialect] = &[Dialect::PostgreSQL, Dialect::MySQL, Dialect::SQLite];

const BODY_NAMES: &[&str] = &[
    "id",
    "first name",
    "created at",
    "date of birth",
    "order",
    "user",
    "\"Quoted Name\"",
];
const BODY_TYPES: &[&str] = &["INT", "varchar(20)", "TEXT", "timestamp", "numeric(10,2)", "DATE"];
const BODY_MODIFIERS: &[&str] = &[
    "",
    " NOT NULL",
    " PRIMARY KEY",
    " UNIQUE",
    " DEFAULT 'it''s'",
    " DEFAULT 'a, b'",
];
const BODY_TRAILERS: &[&str] = &["", " -- note", " /* note */"];
const BODY_EXTRAS: &[&str] = &[
    "",
    "    WITH TIME ZONE\n",
    "  -- section\n",
    "  PRIMARY KEY (id)\n",
    "\n",
];

/// One or two lines of a column list, commas optional.
fn body_line() -> impl Strategy<Value = String> {
    (
        prop::sample::select(BODY_NAMES),
        prop::sample::select(BODY_TYPES),
        prop::sample::select(BODY_MODIFIERS),
        any::<bool>(),
        prop::sample::select(BODY_TRAILERS),
        prop::sample::select(BODY_EXTRAS),
    )
        .prop_map(|(name, data_type, modifier, comma, trailer, extra)| {
            format!(
                "  {} {}{}{}{}\n{}",
                name,
                data_type,
                modifier,
                if comma { "," } else { "" },
                trailer,
                extra
            )
        })
}

fn hand_edited_table() -> impl Strategy<Value = String> {
    (
        prop::sample::select(TABLE_HEADERS),
        any::<bool>(),
        prop::collection::vec(body_line(), 1..6),
    )
        .prop_map(|(name, if_not_exists, lines)| {
            format!(
                "CREATE TABLE {}{} (\n{});\n",
                if if_not_exists { "IF NOT EXISTS " } else { "" },
                name,
                lines.concat()
            )
        })
}

fn generate(graph: &SchemaGraph, settings: Settings) -> String {
    SqlGenerator::new(settings).with_timestamp(STAMP).generate(graph)
}

fn enum_values(graph: &SchemaGraph) -> Vec<(String, Vec<String>)> {
    graph
        .enums
        .iter()
        .map(|e| (e.name.clone(), e.values.clone()))
        .collect()
}

// ============================================================================
// Round trips
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(128))]

    #[test]
    fn postgres_round_trip_keeps_structure(
        graph in schema(),
        case_sensitive in any::<bool>(),
        inline in any::<bool>(),
    ) {
        let settings = Settings {
            dialect: Dialect::PostgreSQL,
            case_sensitive_identifiers: case_sensitive,
            use_inline_constraints: inline,
        };
        let sql = generate(&graph, settings);

        let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
        prop_assert_eq!(table_names(&reparsed), table_names(&graph));
        for (expected, actual) in graph.tables.iter().zip(&reparsed.tables) {
            prop_assert_eq!(column_shapes(actual), column_shapes(expected));
        }
        prop_assert_eq!(enum_values(&reparsed), enum_values(&graph));
    }

    #[test]
    fn mysql_round_trip_keeps_values(graph in schema()) {
        let sql = generate(&graph, Settings {
            dialect: Dialect::MySQL,
            ..Settings::default()
        });

        let reparsed = parse_sql(&sql, Some(&graph)).unwrap().graph;
        prop_assert_eq!(table_names(&reparsed), table_names(&graph));
        for (expected, actual) in graph.tables.iter().zip(&reparsed.tables) {
            prop_assert_eq!(actual.columns.len(), expected.columns.len());
            for (e, a) in expected.columns.iter().zip(&actual.columns) {
                prop_assert_eq!(&a.title, &e.title);
                prop_assert_eq!(&a.default, &e.default);
                if let Some(name) = e.enum_name() {
                    let declared = graph.enum_by_name(name).map(|t| &t.values);
                    let read = a.enum_name().and_then(|n| reparsed.enum_by_name(n)).map(|t| &t.values);
                    prop_assert_eq!(read, declared);
                }
            }
        }
    }
}

// ============================================================================
// Normalization
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn normalizing_twice_changes_nothing(text in hand_edited_table()) {
        let once = normalize_sql(&text);
        prop_assert_eq!(normalize_sql(&once), once);
    }

    #[test]
    fn normalizing_generated_text_changes_nothing(graph in schema(), dialect in prop::sample::select(DIALECTS)) {
        let sql = generate(&graph, Settings {
            dialect,
            ..Settings::default()
        });
        prop_assert_eq!(normalize_sql(&sql), sql);
    }
}
