use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use serde::Deserialize;
use taxonomy::{HttpTaxonomySource, StaticTaxonomySource, TaxonomySource};
use wizard_core::{SampleCatalogue, SequencerTimings, SessionOptions, UnknownIdPolicy};

pub const DEFAULT_CONFIG_FILE: &str = "wizard.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub taxonomy_file: Option<PathBuf>,
    pub taxonomy_url: Option<String>,
    pub seed: Option<u64>,
    pub unknown_ids: UnknownIdPolicy,
    pub log_filter: String,
    pub timings: SequencerTimings,
    pub samples: Option<SampleCatalogue>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            taxonomy_file: Some(PathBuf::from("fixtures/taxonomy.json")),
            taxonomy_url: None,
            seed: None,
            unknown_ids: UnknownIdPolicy::Degrade,
            log_filter: "info".into(),
            timings: SequencerTimings::default(),
            samples: None,
        }
    }
}

impl Settings {
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions {
            unknown_ids: self.unknown_ids,
            timings: self.timings,
            samples: self.samples.clone().unwrap_or_default(),
            seed: self.seed,
        }
    }

    /// A configured URL wins over a file.
    pub async fn taxonomy_source(&self) -> anyhow::Result<Arc<dyn TaxonomySource>> {
        if let Some(url) = &self.taxonomy_url {
            let source = HttpTaxonomySource::new(url)
                .with_context(|| format!("invalid taxonomy url '{url}'"))?;
            return Ok(Arc::new(source));
        }
        match &self.taxonomy_file {
            Some(path) => Ok(Arc::new(StaticTaxonomySource::from_json_file(path).await?)),
            None => bail!("no taxonomy configured; set taxonomy_file or taxonomy_url"),
        }
    }
}

/// Defaults, then the TOML file, then environment overrides.
///
/// An explicit `config_path` must exist. Without one, `wizard.toml` in the
/// working directory is read if present.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match config_path {
        Some(path) => read_settings_file(path)?,
        None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
            read_settings_file(Path::new(DEFAULT_CONFIG_FILE))?
        }
        None => Settings::default(),
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

fn read_settings_file(path: &Path) -> anyhow::Result<Settings> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read settings file '{}'", path.display()))?;
    toml::from_str(&raw)
        .with_context(|| format!("failed to parse settings file '{}'", path.display()))
}

pub fn apply_env_overrides(settings: &mut Settings, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("WIZARD_TAXONOMY_FILE") {
        settings.taxonomy_file = Some(PathBuf::from(v));
    }
    if let Some(v) = var("APP__TAXONOMY_FILE") {
        settings.taxonomy_file = Some(PathBuf::from(v));
    }

    if let Some(v) = var("WIZARD_TAXONOMY_URL") {
        settings.taxonomy_url = Some(v);
    }
    if let Some(v) = var("APP__TAXONOMY_URL") {
        settings.taxonomy_url = Some(v);
    }

    if let Some(v) = var("APP__SEED") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.seed = Some(parsed);
        }
    }

    if let Some(v) = var("APP__UNKNOWN_IDS") {
        match v.trim().to_ascii_lowercase().as_str() {
            "degrade" => settings.unknown_ids = UnknownIdPolicy::Degrade,
            "reject" => settings.unknown_ids = UnknownIdPolicy::Reject,
            _ => {}
        }
    }

    if let Some(v) = var("APP__LOG_FILTER") {
        settings.log_filter = v;
    }

    if let Some(v) = var("APP__TYPING_PER_CHAR_MS") {
        if let Ok(parsed) = v.parse::<u64>() {
            settings.timings.typing_per_char_ms = parsed;
        }
    }
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
