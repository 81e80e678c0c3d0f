//! Dataset resolution and loading.
//!
//! A dataset is named by a path stem such as `test/fixtures/web_sites`. The
//! stem resolves to exactly one representation, probed in this order:
//!
//! 1. `web_sites.yml`, preceded by every `web_sites/**/*.yml` sub-fixture
//! 2. `web_sites.csv`
//! 3. `web_sites.yaml`, which is rejected with a rename instruction
//! 4. the `web_sites/` directory, one record per non-YAML file
//!
//! A stem that matches none of them loads as an empty record set.

use crate::template::{self, TemplateContext};
use crate::{delimited, local, per_record, yaml};
use fixture_core::naming::underscore;
use fixture_core::{FixtureError, RecordSet, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Configuration for fixture loading
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Variables available to `<%= %>` directives
    pub template_context: TemplateContext,

    /// Whether fixture text is template-expanded before parsing (default: true)
    pub expand_templates: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            template_context: TemplateContext::new(),
            expand_templates: true,
        }
    }
}

/// The representation a dataset stem resolved to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasetSource {
    /// Primary YAML file plus sub-fixture files to prepend, in order
    Yaml {
        primary: PathBuf,
        fragments: Vec<PathBuf>,
    },
    /// CSV file
    Csv(PathBuf),
    /// Directory holding one file per record, in name order
    PerRecord { dir: PathBuf, files: Vec<PathBuf> },
    /// Nothing exists under the stem
    Missing,
}

/// Loads datasets into [`RecordSet`]s.
#[derive(Debug, Clone, Default)]
pub struct RecordSetLoader {
    config: LoaderConfig,
}

impl RecordSetLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &LoaderConfig {
        &self.config
    }

    /// Work out which representation `dataset` uses.
    pub async fn resolve(&self, dataset: &Path) -> Result<DatasetSource> {
        let yml = with_suffix(dataset, "yml");
        if local::is_file(&yml).await {
            let fragments = local::list_recursive(dataset, "yml").await?;
            return Ok(DatasetSource::Yaml {
                primary: yml,
                fragments,
            });
        }

        let csv = with_suffix(dataset, "csv");
        if local::is_file(&csv).await {
            return Ok(DatasetSource::Csv(csv));
        }

        let deprecated = with_suffix(dataset, "yaml");
        if local::is_file(&deprecated).await {
            return Err(FixtureError::format(
                &deprecated,
                format!(
                    ".yml extension required: rename {} to {}",
                    deprecated.display(),
                    yml.display()
                ),
            ));
        }

        if local::is_dir(dataset).await {
            let files = local::list_directory(dataset)
                .await?
                .into_iter()
                .filter(|path| !is_yaml_file(path))
                .collect();
            return Ok(DatasetSource::PerRecord {
                dir: dataset.to_path_buf(),
                files,
            });
        }

        Ok(DatasetSource::Missing)
    }

    /// Load the dataset at `dataset` for `entity`.
    ///
    /// `entity` names CSV records and appears in error messages; it never has
    /// to exist anywhere.
    pub async fn load(&self, dataset: &Path, entity: &str) -> Result<RecordSet> {
        let source = self.resolve(dataset).await?;
        debug!("Resolved {} to {source:?}", dataset.display());

        let set = match &source {
            DatasetSource::Yaml { primary, fragments } => {
                let mut combined = String::new();
                for path in fragments.iter().chain(std::iter::once(primary)) {
                    let text = local::read_to_string(path).await?;
                    combined.push_str(&text);
                    if !combined.is_empty() && !combined.ends_with('\n') {
                        combined.push('\n');
                    }
                }
                let text = self.expand(&combined, primary)?;
                yaml::parse(&text, entity, primary)?
            }
            DatasetSource::Csv(path) => {
                let text = self.expand(&local::read_to_string(path).await?, path)?;
                delimited::parse(&text, &underscore(entity), path)?
            }
            DatasetSource::PerRecord { files, .. } => {
                let mut set = RecordSet::new();
                for path in files {
                    let text = self.expand(&local::read_to_string(path).await?, path)?;
                    let record = per_record::parse(&text, path)?;
                    let name = path
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_default();
                    set.insert(name, record)
                        .map_err(|dup| FixtureError::format(path, dup.to_string()))?;
                }
                set
            }
            DatasetSource::Missing => {
                debug!("No fixtures found for {}", dataset.display());
                RecordSet::new()
            }
        };

        info!(
            "Loaded {} {entity} fixtures from {}",
            set.len(),
            dataset.display()
        );
        Ok(set)
    }

    /// Names of the datasets directly inside `dir`: `*.yml` and `*.csv`
    /// stems plus subdirectories, sorted and without duplicates.
    pub async fn discover(&self, dir: &Path) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = tokio::fs::read_dir(dir)
            .await
            .map_err(|e| FixtureError::io(dir, e))?;

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FixtureError::io(dir, e))?
        {
            let path = entry.path();
            let stem = if local::is_dir(&path).await {
                path.file_name()
            } else if matches!(
                path.extension().and_then(|e| e.to_str()),
                // `.yaml` stems are listed so loading them reports the rename.
                Some("yml" | "yaml" | "csv")
            ) {
                path.file_stem()
            } else {
                None
            };
            if let Some(stem) = stem {
                names.push(stem.to_string_lossy().into_owned());
            }
        }

        names.sort();
        names.dedup();
        Ok(names)
    }

    fn expand(&self, text: &str, path: &Path) -> Result<String> {
        if !self.config.expand_templates {
            return Ok(text.to_string());
        }
        template::render(text, &self.config.template_context)
            .map_err(|e| FixtureError::format(path, e.to_string()))
    }
}

/// `a/b` + `yml` -> `a/b.yml`, keeping any dots already in the stem.
fn with_suffix(stem: &Path, extension: &str) -> PathBuf {
    let mut name = OsString::from(stem.as_os_str());
    name.push(".");
    name.push(extension);
    PathBuf::from(name)
}

fn is_yaml_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yml" | "yaml")
    )
}
