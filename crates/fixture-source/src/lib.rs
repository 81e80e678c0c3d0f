//! Fixture file loading.
//!
//! Turns a dataset path stem into a [`RecordSet`](fixture_core::RecordSet).
//! The stem may resolve to a YAML file (with optional sub-fixtures), a CSV
//! file, or a directory holding one file per record. See [`loader`] for the
//! resolution rules.
//!
//! Every fixture file is passed through a small template expander before it
//! is parsed, so fixtures can generate repetitive rows:
//!
//! ```yaml
//! <% for i in 1..3 %>
//! site_<%= i %>:
//!   id: <%= i %>
//!   name: Site <%= i %>
//! <% end %>
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use fixture_source::RecordSetLoader;
//! use std::path::Path;
//!
//! # async fn run() -> fixture_core::Result<()> {
//! let loader = RecordSetLoader::default();
//! let sites = loader.load(Path::new("test/fixtures/sites"), "Site").await?;
//! println!("loaded {} sites", sites.len());
//! # Ok(())
//! # }
//! ```

pub mod delimited;
pub mod loader;
pub mod local;
pub mod per_record;
pub mod template;
pub mod yaml;

pub use loader::{DatasetSource, LoaderConfig, RecordSetLoader};
pub use template::{TemplateContext, TemplateError, TemplateValue};
