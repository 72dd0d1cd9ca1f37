//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Static fixture inputs loaded once at startup."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fs;

use bytes::Bytes;
use jobload_common::{ArtifactConfig, ArtifactKind, FixtureConfig};
use sha2::{Digest, Sha256};
use tracing::info;

use crate::template::PackageTemplate;
use crate::HarnessError;

/// An artifact held in memory; `content` is shared read-only by every task.
#[derive(Debug, Clone)]
pub struct LoadedArtifact {
    pub name: String,
    pub kind: ArtifactKind,
    pub content: Bytes,
    pub sha256: String,
}

impl LoadedArtifact {
    pub fn new(name: impl Into<String>, kind: ArtifactKind, content: Bytes) -> Self {
        let sha256 = hex::encode(Sha256::digest(&content));
        Self {
            name: name.into(),
            kind,
            content,
            sha256,
        }
    }

    fn read(config: &ArtifactConfig) -> Result<Self, HarnessError> {
        let content = fs::read(&config.path).map_err(|source| HarnessError::FixtureRead {
            path: config.path.clone(),
            source,
        })?;
        let artifact = Self::new(config.name.clone(), config.kind, Bytes::from(content));
        info!(
            artifact = %artifact.name,
            kind = %artifact.kind,
            bytes = artifact.content.len(),
            sha256 = %artifact.sha256,
            "fixture artifact loaded"
        );
        Ok(artifact)
    }
}

/// Artifacts in declaration order plus the package template.
#[derive(Debug, Clone)]
pub struct FixtureSet {
    artifacts: Vec<LoadedArtifact>,
    template: PackageTemplate,
}

impl FixtureSet {
    pub fn load(config: &FixtureConfig) -> Result<Self, HarnessError> {
        let artifacts = config
            .artifacts
            .iter()
            .map(LoadedArtifact::read)
            .collect::<Result<Vec<_>, _>>()?;
        let template = PackageTemplate::load(&config.package_template)?;
        Ok(Self::new(artifacts, template))
    }

    pub fn new(artifacts: Vec<LoadedArtifact>, template: PackageTemplate) -> Self {
        Self {
            artifacts,
            template,
        }
    }

    pub fn artifacts(&self) -> &[LoadedArtifact] {
        &self.artifacts
    }

    pub fn template(&self) -> &PackageTemplate {
        &self.template
    }
}
