use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use schemasync::sql::SqlGenerator;
use schemasync::{Dialect, SchemaGraph, Settings, normalize_sql, parse_sql, validate_sql};

#[derive(Parser)]
#[command(name = "schemasync")]
#[command(author, version, about = "Translate between SQL DDL and a schema graph")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Render a graph JSON file as SQL
    Generate {
        /// Path to the graph JSON file
        graph: PathBuf,

        /// Target dialect (postgresql, mysql, sqlite)
        #[arg(short, long)]
        dialect: Option<Dialect>,

        /// Emit foreign keys inline instead of as ALTER TABLE statements
        #[arg(long)]
        inline: bool,

        /// Only quote identifiers that need it
        #[arg(long)]
        case_insensitive: bool,

        /// Settings JSON file; flags override its values
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Fixed header timestamp, for reproducible output
        #[arg(long)]
        timestamp: Option<String>,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Parse SQL into graph JSON
    Parse {
        /// Path to the SQL file
        sql: PathBuf,

        /// Previous graph whose ids, positions and styles should be kept
        #[arg(short, long)]
        previous: Option<PathBuf>,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Check SQL for structural problems
    Validate {
        /// Path to the SQL file
        sql: PathBuf,
    },

    /// Apply text repairs (quoting, missing commas, duplicate constraints)
    Normalize {
        /// Path to the SQL file
        sql: PathBuf,

        /// Output path (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            graph,
            dialect,
            inline,
            case_insensitive,
            config,
            timestamp,
            output,
        } => {
            let graph: SchemaGraph = read_json(&graph)?;

            let mut settings: Settings = match config {
                Some(path) => read_json(&path)?,
                None => Settings::default(),
            };
            if let Some(dialect) = dialect {
                settings.dialect = dialect;
            }
            if inline {
                settings.use_inline_constraints = true;
            }
            if case_insensitive {
                settings.case_sensitive_identifiers = false;
            }

            let mut generator = SqlGenerator::new(settings);
            if let Some(timestamp) = timestamp {
                generator = generator.with_timestamp(timestamp);
            }
            write_output(output.as_deref(), &generator.generate(&graph))?;
        }

        Commands::Parse {
            sql,
            previous,
            output,
        } => {
            let text = read_text(&sql)?;
            let previous: Option<SchemaGraph> = previous.as_deref().map(read_json).transpose()?;

            let outcome = parse_sql(&text, previous.as_ref())
                .with_context(|| format!("Failed to parse {}", sql.display()))?;
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning);
            }

            let json = serde_json::to_string_pretty(&outcome.graph)?;
            write_output(output.as_deref(), &json)?;
        }

        Commands::Validate { sql } => {
            let report = validate_sql(&read_text(&sql)?);
            for finding in &report.findings {
                println!("{}", finding);
            }
            if !report.is_valid {
                bail!("{} is not valid", sql.display());
            }
            println!("{} is valid", sql.display());
        }

        Commands::Normalize { sql, output } => {
            let text = read_text(&sql)?;
            write_output(output.as_deref(), &normalize_sql(&text))?;
        }
    }

    Ok(())
}

fn read_text(path: &Path) -> Result<String> {
    fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).with_context(|| format!("Invalid JSON in {}", path.display()))
}

fn write_output(path: Option<&Path>, content: &str) -> Result<()> {
    match path {
        Some(path) => fs::write(path, content)
            .with_context(|| format!("Failed to write {}", path.display())),
        None => {
            print!("{}", content);
            Ok(())
        }
    }
}
