//! fixture-sync Library
//!
//! Loads declarative test fixtures from YAML, CSV and one-file-per-record
//! datasets into relational databases, and gives test code access to the
//! loaded records.
//!
//! # Crates
//!
//! - `fixture_core` - values, records, record sets, schemas and errors
//! - `fixture_source` - dataset resolution, templates and file parsing
//! - `fixture_sink` - quoting, connections and table synchronization
//!
//! # Library Usage
//!
//! ```rust,no_run
//! use fixture_sync::sink::PostgresConnection;
//! use fixture_sync::FixtureSession;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let mut conn = PostgresConnection::connect("postgresql://postgres@localhost/app_test").await?;
//! let mut session = FixtureSession::new("test/fixtures");
//! session.create_fixtures(&mut conn, &["sites", "topics"]).await?;
//!
//! let google = session.record("sites", "google")?;
//! println!("{:?}", google.get("url"));
//! # Ok(())
//! # }
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # Load two tables into PostgreSQL
//! fixture-sync load --fixtures-path test/fixtures --tables sites,topics \
//!   --database-url postgresql://postgres@localhost/app_test
//!
//! # Print the statements instead of running them
//! fixture-sync load --fixtures-path test/fixtures --tables sites --dry-run
//!
//! # Show how a dataset parses
//! fixture-sync show --fixtures-path test/fixtures --table web_sites
//! ```

use clap::Parser;
use std::path::PathBuf;

pub mod connect;
pub mod resolver;
pub mod session;

pub use resolver::{EntityResolver, NoMetadata, SchemaResolver};
pub use session::{FixtureSession, Fixtures};

// Re-export the member crates for convenience
pub use fixture_core as core;
pub use fixture_sink as sink;
pub use fixture_source as source;

#[derive(Parser, Clone, Debug)]
pub struct FixtureOpts {
    /// Directory holding the fixture files
    #[arg(long, env = "FIXTURES_PATH", default_value = "test/fixtures")]
    pub fixtures_path: PathBuf,

    /// Entity name for a table whose name does not follow the naming
    /// convention (format: table=Entity, repeatable)
    #[arg(long = "class", value_name = "TABLE=ENTITY", value_parser = parse_class_mapping)]
    pub class_names: Vec<(String, String)>,

    /// Schema file with primary keys and column types for type-aware quoting
    #[arg(long, value_name = "PATH")]
    pub schema_file: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
pub struct DatabaseOpts {
    /// Database URL (postgresql://... or mysql://...)
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Dry run mode - print statements instead of executing them
    #[arg(long)]
    pub dry_run: bool,
}

/// Parse `table=Entity`.
pub fn parse_class_mapping(value: &str) -> Result<(String, String), String> {
    match value.split_once('=') {
        Some((table, entity)) if !table.trim().is_empty() && !entity.trim().is_empty() => {
            Ok((table.trim().to_string(), entity.trim().to_string()))
        }
        _ => Err(format!("expected TABLE=ENTITY, got '{value}'")),
    }
}
