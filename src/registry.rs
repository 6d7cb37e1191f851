//! HTTP-backed [`Provider`]: looks up package versions and their
//! dependencies from a JSON registry API.

use serde::Deserialize;
use thiserror::Error;

use crate::provider::Provider;
use crate::spec::{Requirement, RequirementParseError, Specification};
use crate::version::{Version, VersionError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("registry returned an invalid version: {0}")]
    Version(#[from] VersionError),
    #[error("registry returned an invalid dependency: {0}")]
    Requirement(#[from] RequirementParseError),
}

#[derive(Debug, Deserialize)]
struct RegistryRelease {
    version: String,
    #[serde(default)]
    dependencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RegistryResponse {
    releases: Vec<RegistryRelease>,
}

/// A provider backed by a registry speaking a small JSON API:
/// `GET {base_url}/packages/{name}` returns `{"releases": [{"version": ..,
/// "dependencies": [..]}]}`.
pub struct RegistryProvider {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl RegistryProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn fetch(&self, name: &str) -> Result<RegistryResponse, RegistryError> {
        let url = format!("{}/packages/{name}", self.base_url.trim_end_matches('/'));
        let response = self.client.get(url).send()?.error_for_status()?;
        Ok(response.json()?)
    }
}

impl Provider for RegistryProvider {
    type Error = RegistryError;

    fn search_for(&self, requirement: &Requirement) -> Result<Vec<Specification>, Self::Error> {
        let response = self.fetch(requirement.name())?;
        let mut specs = Vec::with_capacity(response.releases.len());
        for release in response.releases {
            let version = Version::parse(&release.version)?;
            let dependencies = release
                .dependencies
                .iter()
                .map(|d| Requirement::parse(d))
                .collect::<Result<Vec<_>, _>>()?;
            specs.push(Specification::new(
                requirement.name(),
                version,
                dependencies,
                self.base_url.clone(),
            ));
        }
        specs.sort_by(|a, b| a.version.compare(&b.version));
        Ok(specs)
    }
}
