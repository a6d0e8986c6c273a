//! Remote reads backing a [`crate::CategoryTree`] load.

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use shared::protocol::{TaxonomyDocument, TaxonomyResource};
use url::Url;

/// Opaque async key-value fetch of the two taxonomy resources.
#[async_trait]
pub trait TaxonomySource: Send + Sync {
    async fn fetch(&self, resource: TaxonomyResource) -> Result<Value>;
}

pub struct MissingTaxonomySource;

#[async_trait]
impl TaxonomySource for MissingTaxonomySource {
    async fn fetch(&self, resource: TaxonomyResource) -> Result<Value> {
        Err(anyhow!("no taxonomy source configured for {resource}"))
    }
}

/// In-memory source, typically read from a bundled JSON document.
#[derive(Debug, Clone)]
pub struct StaticTaxonomySource {
    definitions: Value,
    hierarchy: Value,
}

impl StaticTaxonomySource {
    pub fn new(definitions: Value, hierarchy: Value) -> Self {
        Self {
            definitions,
            hierarchy,
        }
    }

    pub fn from_document(document: TaxonomyDocument) -> Self {
        Self::new(document.definitions, document.hierarchy)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let document: TaxonomyDocument =
            serde_json::from_str(raw).context("taxonomy document is not valid JSON")?;
        Ok(Self::from_document(document))
    }

    pub async fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read taxonomy file '{}'", path.display()))?;
        Self::from_json_str(&raw)
            .with_context(|| format!("failed to parse taxonomy file '{}'", path.display()))
    }
}

#[async_trait]
impl TaxonomySource for StaticTaxonomySource {
    async fn fetch(&self, resource: TaxonomyResource) -> Result<Value> {
        Ok(match resource {
            TaxonomyResource::Definitions => self.definitions.clone(),
            TaxonomyResource::Hierarchy => self.hierarchy.clone(),
        })
    }
}

/// Reads both resources from a realtime-database style REST endpoint
/// (`<base>/<path>.json`).
pub struct HttpTaxonomySource {
    http: Client,
    base_url: Url,
}

impl HttpTaxonomySource {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(http: Client, base_url: &str) -> Result<Self> {
        let mut base_url = Url::parse(base_url.trim())
            .with_context(|| format!("invalid taxonomy base url '{base_url}'"))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn resource_url(&self, resource: TaxonomyResource) -> Result<Url> {
        self.base_url
            .join(&format!("{}.json", resource.remote_path()))
            .with_context(|| format!("failed to build url for taxonomy {resource}"))
    }
}

#[async_trait]
impl TaxonomySource for HttpTaxonomySource {
    async fn fetch(&self, resource: TaxonomyResource) -> Result<Value> {
        let url = self.resource_url(resource)?;
        let response = self
            .http
            .get(url.clone())
            .send()
            .await
            .with_context(|| format!("request to {url} failed"))?
            .error_for_status()?;
        let body = response
            .json::<Value>()
            .await
            .with_context(|| format!("response from {url} is not JSON"))?;
        Ok(body)
    }
}

#[cfg(test)]
#[path = "tests/source_tests.rs"]
mod tests;
