//! ---
//! jl_section: "04-orchestration"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Package template parsing and per-submission identifier rewriting."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use jobload_transport::PackageDocument;

use crate::HarnessError;

/// Package document loaded once and cloned for every submission.
///
/// Only the shape the harness rewrites is validated: a package with an id and a name, and
/// at least one queue. Everything deeper is left for the platform to judge.
#[derive(Debug, Clone)]
pub struct PackageTemplate {
    document: PackageDocument,
}

impl PackageTemplate {
    pub fn load(path: &Path) -> Result<Self, HarnessError> {
        let raw = fs::read_to_string(path).map_err(|source| HarnessError::FixtureRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw, &path.display().to_string())
    }

    pub fn parse(raw: &str, origin: &str) -> Result<Self, HarnessError> {
        let invalid = |reason: String| HarnessError::Template {
            origin: origin.to_owned(),
            reason,
        };
        let document: PackageDocument =
            serde_yaml::from_str(raw).map_err(|err| invalid(err.to_string()))?;
        let package = &document.package;
        if package.id.trim().is_empty() {
            return Err(invalid("package.ID is missing".into()));
        }
        if package.name.trim().is_empty() {
            return Err(invalid("package.name is missing".into()));
        }
        if package.queues.is_empty() {
            return Err(invalid("package.queues needs at least one queue".into()));
        }
        Ok(Self { document })
    }

    /// Fails when the package names a tenant other than `tenant`. A blank package tenant
    /// is accepted.
    pub fn ensure_tenant(&self, tenant: &str) -> Result<(), HarnessError> {
        let declared = self.document.package.tenant.trim();
        if declared.is_empty() || declared == tenant {
            return Ok(());
        }
        Err(HarnessError::Template {
            origin: self.document.package.id.clone(),
            reason: format!("package.tenant is '{declared}' but the run targets '{tenant}'"),
        })
    }

    /// The document as loaded, submitted verbatim during provisioning.
    pub fn document(&self) -> &PackageDocument {
        &self.document
    }

    /// Clone with the package identity and the first queue's identity replaced.
    pub fn mutated(&self, ids: &CatalogIdentifiers) -> PackageDocument {
        let mut document = self.document.clone();
        document.package.id = ids.package_id.clone();
        document.package.name = ids.package_name.clone();
        if let Some(queue) = document.package.queues.first_mut() {
            queue.id = ids.queue_id.clone();
            queue.name = ids.queue_name.clone();
        }
        document
    }
}

/// The four labelled identifiers written into a mutated package.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogIdentifiers {
    pub package_id: String,
    pub package_name: String,
    pub queue_id: String,
    pub queue_name: String,
}

impl CatalogIdentifiers {
    /// `seed` is the bounded random draw; `sequence` is unique per submission within a run.
    pub fn derive(seed: u32, sequence: u64) -> Self {
        Self {
            package_id: format!("job_id_{seed}_{sequence}"),
            package_name: format!("job_name_{seed}_{sequence}"),
            queue_id: format!("queue_id_{seed}_{sequence}"),
            queue_name: format!("queue_name_{seed}_{sequence}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEMPLATE: &str = r#"
package:
  ID: pkg_1
  name: Package One
  tenant: tenant_1
  queues:
    - ID: queue_1
      name: Queue One
    - ID: queue_2
      name: Queue Two
  jobs:
    - event:
        ID: event_id_1
        name: event
        supplierqueue: queue_1
        runtime: run1
        schema:
          ID: sch1
          name: schema
"#;

    #[test]
    fn mutation_rewrites_only_package_and_first_queue() {
        let template = PackageTemplate::parse(TEMPLATE, "inline").unwrap();
        let ids = CatalogIdentifiers::derive(7, 3);
        let mutated = template.mutated(&ids);

        assert_eq!(mutated.package.id, "job_id_7_3");
        assert_eq!(mutated.package.name, "job_name_7_3");
        assert_eq!(mutated.package.queues[0].id, "queue_id_7_3");
        assert_eq!(mutated.package.queues[0].name, "queue_name_7_3");
        assert_eq!(mutated.package.queues[1].id, "queue_2");
        assert_eq!(mutated.package.jobs, template.document().package.jobs);
        assert_eq!(template.document().package.id, "pkg_1");
    }

    #[test]
    fn package_tenant_must_match_the_run_tenant() {
        let template = PackageTemplate::parse(TEMPLATE, "inline").unwrap();
        assert!(template.ensure_tenant("tenant_1").is_ok());
        let err = template.ensure_tenant("tenant_2").unwrap_err();
        assert!(err.to_string().contains("tenant_2"));

        let unscoped = "package:\n  ID: pkg\n  name: p\n  queues:\n    - ID: q\n      name: q\n";
        let template = PackageTemplate::parse(unscoped, "inline").unwrap();
        assert!(template.ensure_tenant("tenant_2").is_ok());
    }

    #[test]
    fn templates_without_queues_are_rejected() {
        let raw = "package:\n  ID: pkg\n  name: p\n  queues: []\n";
        let err = PackageTemplate::parse(raw, "inline").unwrap_err();
        assert!(matches!(err, HarnessError::Template { .. }));
    }

    #[test]
    fn templates_without_package_block_are_rejected() {
        assert!(PackageTemplate::parse("queues: []\n", "inline").is_err());
    }

    #[test]
    fn sequence_keeps_identical_seeds_distinct() {
        assert_ne!(
            CatalogIdentifiers::derive(5, 0).package_id,
            CatalogIdentifiers::derive(5, 1).package_id
        );
    }
}
