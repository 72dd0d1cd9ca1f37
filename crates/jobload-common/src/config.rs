//! ---
//! jl_section: "01-core-functionality"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Harness configuration model and loader."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use strum::{Display, EnumString};
use tracing::debug;

use crate::logging::LogFormat;

fn default_control_endpoint() -> String {
    "localhost:50052".to_owned()
}

fn default_repository_endpoint() -> String {
    "localhost:50053".to_owned()
}

fn default_listener_endpoint() -> String {
    "localhost:8080".to_owned()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(5)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_event_type() -> String {
    "event_id_1".to_owned()
}

fn default_event_actors() -> usize {
    30
}

fn default_event_duration() -> Duration {
    Duration::from_secs(30)
}

fn default_catalog_actors() -> usize {
    1
}

fn default_catalog_iterations() -> u64 {
    10
}

fn default_catalog_start_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_catalog_max_duration() -> Duration {
    Duration::from_secs(120)
}

fn default_catalog_pacing() -> Duration {
    Duration::from_millis(5_000)
}

fn default_seed_bound() -> u32 {
    1_000
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

fn default_metrics_listen() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 9899))
}

/// Root configuration for a harness run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarnessConfig {
    #[serde(default)]
    pub target: TargetConfig,
    pub tenant: TenantConfig,
    pub fixture: FixtureConfig,
    #[serde(default)]
    pub scenario: ScenarioConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where a [`HarnessConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedHarnessConfig {
    pub config: HarnessConfig,
    pub source: PathBuf,
}

impl HarnessConfig {
    pub const ENV_CONFIG_PATH: &'static str = "JOBLOAD_CONFIG";

    /// Load configuration from disk, respecting the `JOBLOAD_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    ///
    /// Relative fixture paths are resolved against the directory holding the file.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedHarnessConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedHarnessConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let mut config = toml::from_str::<HarnessConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if let Some(base) = path.parent() {
            config.fixture.resolve_relative_to(base);
        }
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.target.validate()?;
        self.tenant.validate()?;
        self.fixture.validate()?;
        self.scenario.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for HarnessConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: HarnessConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// Transport security applied to every boundary.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default, Display, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SecurityMode {
    #[default]
    Plaintext,
    Tls,
}

impl SecurityMode {
    pub fn is_tls(&self) -> bool {
        matches!(self, SecurityMode::Tls)
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    #[serde(default = "default_control_endpoint")]
    pub control: String,
    #[serde(default = "default_repository_endpoint")]
    pub repository: String,
    #[serde(default = "default_listener_endpoint")]
    pub listener: String,
    #[serde(default)]
    pub security: SecurityMode,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub connect_timeout: Duration,
    #[serde(default = "default_request_timeout")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,
}

impl Default for TargetConfig {
    fn default() -> Self {
        Self {
            control: default_control_endpoint(),
            repository: default_repository_endpoint(),
            listener: default_listener_endpoint(),
            security: SecurityMode::default(),
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
        }
    }
}

impl TargetConfig {
    pub fn validate(&self) -> Result<()> {
        for (label, endpoint) in [
            ("control", &self.control),
            ("repository", &self.repository),
            ("listener", &self.listener),
        ] {
            if endpoint.trim().is_empty() {
                return Err(anyhow!("target.{} endpoint must not be empty", label));
            }
        }
        if self.connect_timeout.is_zero() {
            return Err(anyhow!("target.connect_timeout must be greater than zero"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantConfig {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_event_type")]
    pub event_type: String,
}

impl TenantConfig {
    /// Display name registered with the tenant; falls back to the identifier.
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }

    /// Switch to another tenant. The configured display name belonged to the old
    /// identifier, so it is dropped and the new identifier is used instead.
    pub fn override_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
        self.name = None;
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(anyhow!("tenant.id must not be empty"));
        }
        if self.event_type.trim().is_empty() {
            return Err(anyhow!("tenant.event_type must not be empty"));
        }
        Ok(())
    }
}

/// Kind tag attached to an uploaded artifact.
#[derive(
    Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ArtifactKind {
    Schema,
    Module,
}

impl ArtifactKind {
    /// Integer tag understood by the repository service.
    pub fn wire_code(&self) -> i32 {
        match self {
            ArtifactKind::Schema => 1,
            ArtifactKind::Module => 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactConfig {
    pub name: String,
    pub kind: ArtifactKind,
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureConfig {
    #[serde(default)]
    pub artifacts: Vec<ArtifactConfig>,
    pub package_template: PathBuf,
}

impl FixtureConfig {
    fn resolve_relative_to(&mut self, base: &Path) {
        for artifact in &mut self.artifacts {
            if artifact.path.is_relative() {
                artifact.path = base.join(&artifact.path);
            }
        }
        if self.package_template.is_relative() {
            self.package_template = base.join(&self.package_template);
        }
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = IndexSet::new();
        for artifact in &self.artifacts {
            if artifact.name.trim().is_empty() {
                return Err(anyhow!("fixture artifact names must not be empty"));
            }
            if !seen.insert(artifact.name.as_str()) {
                return Err(anyhow!(
                    "fixture artifact '{}' is declared more than once",
                    artifact.name
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ScenarioConfig {
    #[serde(default)]
    pub events: Option<EventPopulationConfig>,
    #[serde(default)]
    pub catalog: Option<CatalogPopulationConfig>,
}

impl ScenarioConfig {
    pub fn validate(&self) -> Result<()> {
        if let Some(events) = &self.events {
            events.validate()?;
        }
        if let Some(catalog) = &self.catalog {
            catalog.validate()?;
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_none() && self.catalog.is_none()
    }
}

/// Constant population of event senders running for a wall-clock duration.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPopulationConfig {
    #[serde(default = "default_event_actors")]
    pub actors: usize,
    #[serde(default = "default_event_duration")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub duration: Duration,
    #[serde(default)]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub start_delay: Duration,
    #[serde(default, rename = "pacing_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub pacing: Duration,
}

impl Default for EventPopulationConfig {
    fn default() -> Self {
        Self {
            actors: default_event_actors(),
            duration: default_event_duration(),
            start_delay: Duration::ZERO,
            pacing: Duration::ZERO,
        }
    }
}

impl EventPopulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.actors == 0 {
            return Err(anyhow!("scenario.events.actors must be greater than zero"));
        }
        if self.duration.is_zero() {
            return Err(anyhow!("scenario.events.duration must be greater than zero"));
        }
        Ok(())
    }
}

/// Delayed population of catalog mutators running a fixed number of iterations.
#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogPopulationConfig {
    #[serde(default = "default_catalog_actors")]
    pub actors: usize,
    #[serde(default = "default_catalog_iterations")]
    pub iterations: u64,
    #[serde(default = "default_catalog_start_delay")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub start_delay: Duration,
    #[serde(default = "default_catalog_max_duration")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub max_duration: Duration,
    #[serde(default = "default_catalog_pacing", rename = "pacing_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub pacing: Duration,
    #[serde(default = "default_seed_bound")]
    pub seed_bound: u32,
}

impl Default for CatalogPopulationConfig {
    fn default() -> Self {
        Self {
            actors: default_catalog_actors(),
            iterations: default_catalog_iterations(),
            start_delay: default_catalog_start_delay(),
            max_duration: default_catalog_max_duration(),
            pacing: default_catalog_pacing(),
            seed_bound: default_seed_bound(),
        }
    }
}

impl CatalogPopulationConfig {
    pub fn validate(&self) -> Result<()> {
        if self.actors == 0 {
            return Err(anyhow!("scenario.catalog.actors must be greater than zero"));
        }
        if self.iterations == 0 {
            return Err(anyhow!(
                "scenario.catalog.iterations must be greater than zero"
            ));
        }
        if self.max_duration.is_zero() {
            return Err(anyhow!(
                "scenario.catalog.max_duration must be greater than zero"
            ));
        }
        if self.seed_bound == 0 {
            return Err(anyhow!(
                "scenario.catalog.seed_bound must be greater than zero"
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory for the rolling log file. Stdout only when unset.
    #[serde(default)]
    pub directory: Option<PathBuf>,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: None,
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_listen")]
    pub listen: SocketAddr,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            listen: default_metrics_listen(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = r#"
        [tenant]
        id = "tenant_1"

        [fixture]
        package_template = "testdata/job.yml"

        [[fixture.artifacts]]
        name = "run1"
        kind = "module"
        path = "testdata/echo.wasm"

        [[fixture.artifacts]]
        name = "sch1"
        kind = "schema"
        path = "testdata/schema.json"
    "#;

    #[test]
    fn minimal_config_applies_defaults() {
        let config: HarnessConfig = MINIMAL.parse().unwrap();
        assert_eq!(config.target.control, "localhost:50052");
        assert_eq!(config.target.security, SecurityMode::Plaintext);
        assert_eq!(config.tenant.display_name(), "tenant_1");
        assert_eq!(config.tenant.event_type, "event_id_1");
        assert_eq!(config.fixture.artifacts.len(), 2);
        assert_eq!(config.fixture.artifacts[0].kind, ArtifactKind::Module);
        assert!(config.scenario.is_empty());
        assert!(!config.metrics.enabled);
    }

    #[test]
    fn scenario_sections_parse_durations() {
        let content = format!(
            "{MINIMAL}
            [scenario.events]
            actors = 5
            duration = 10
            pacing_ms = 250

            [scenario.catalog]
            actors = 2
            iterations = 3
            start_delay = 1
            max_duration = 20
            "
        );
        let config: HarnessConfig = content.parse().unwrap();
        let events = config.scenario.events.unwrap();
        assert_eq!(events.actors, 5);
        assert_eq!(events.duration, Duration::from_secs(10));
        assert_eq!(events.pacing, Duration::from_millis(250));
        let catalog = config.scenario.catalog.unwrap();
        assert_eq!(catalog.iterations, 3);
        assert_eq!(catalog.pacing, Duration::from_secs(5));
        assert_eq!(catalog.seed_bound, 1_000);
    }

    #[test]
    fn duplicate_artifact_names_are_rejected() {
        let content = format!(
            "{MINIMAL}
            [[fixture.artifacts]]
            name = \"run1\"
            kind = \"schema\"
            path = \"other.json\"
            "
        );
        let err = content.parse::<HarnessConfig>().unwrap_err();
        assert!(err.to_string().contains("declared more than once"));
    }

    #[test]
    fn zero_actor_population_is_rejected() {
        let content = format!(
            "{MINIMAL}
            [scenario.events]
            actors = 0
            "
        );
        assert!(content.parse::<HarnessConfig>().is_err());
    }

    #[test]
    fn tenant_override_drops_the_configured_name() {
        let mut config: HarnessConfig = MINIMAL.parse().unwrap();
        config.tenant.name = Some("tenant_1".into());
        config.tenant.override_id("tenant_2");
        assert_eq!(config.tenant.id, "tenant_2");
        assert_eq!(config.tenant.display_name(), "tenant_2");
    }

    #[test]
    fn artifact_kind_wire_codes() {
        assert_eq!(ArtifactKind::Schema.wire_code(), 1);
        assert_eq!(ArtifactKind::Module.wire_code(), 2);
        assert_eq!("module".parse::<ArtifactKind>().unwrap(), ArtifactKind::Module);
    }

    #[test]
    fn relative_fixture_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobload.toml");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = HarnessConfig::load(&[path.as_path()]).unwrap();
        assert_eq!(
            config.fixture.package_template,
            dir.path().join("testdata/job.yml")
        );
        assert_eq!(
            config.fixture.artifacts[1].path,
            dir.path().join("testdata/schema.json")
        );
    }
}
