//! `--config` file handling.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sparqled_autocomplete::RecommendationTemplate;
use sparqled_eval::EndpointConfig;

/// Settings read from the JSON file given with `--config`.
///
/// ```json
/// {
///   "endpoint": { "url": "https://dbpedia.org/sparql", "timeout_secs": 30 },
///   "default_graph": "http://dbpedia.org",
///   "template": "templates/recommend.hbs"
/// }
/// ```
///
/// Every field is optional. A relative `template` path is resolved against the
/// directory of the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    pub endpoint: EndpointConfig,
    pub default_graph: Option<String>,
    pub template: Option<PathBuf>,
}

impl CliConfig {
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let mut config: CliConfig = serde_json::from_str(&text)
            .with_context(|| format!("invalid config {}", path.display()))?;

        if let (Some(template), Some(dir)) = (config.template.as_mut(), path.parent()) {
            if template.is_relative() {
                *template = dir.join(&*template);
            }
        }
        tracing::debug!(config = ?config, "loaded {}", path.display());
        Ok(config)
    }

    /// Template from `flag`, else from the config file, else `fallback`.
    pub fn template(
        &self,
        flag: Option<&Path>,
        fallback: fn() -> RecommendationTemplate,
    ) -> Result<RecommendationTemplate> {
        let Some(path) = flag.or(self.template.as_deref()) else {
            return Ok(fallback());
        };
        let source = fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display()))?;
        RecommendationTemplate::new(source)
            .with_context(|| format!("invalid template {}", path.display()))
    }
}
