//! ---
//! jl_section: "05-boundary-contracts"
//! jl_subsection: "module"
//! jl_type: "source"
//! jl_scope: "code"
//! jl_description: "Typed request and response messages for each boundary operation."
//! jl_version: "v0.1.0"
//! jl_owner: "tbd"
//! ---
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use jobload_common::ArtifactKind;
use serde::{Deserialize, Serialize};

use crate::proto;
use crate::TransportError;

/// Tenant identity registered with the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tenant {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "Name")]
    name: String,
}

impl Tenant {
    /// Build a tenant, rejecting blank identifiers.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Result<Self, TransportError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TransportError::InvalidMessage(
                "tenant id must not be empty".into(),
            ));
        }
        let name = name.into();
        let name = if name.trim().is_empty() {
            id.clone()
        } else {
            name
        };
        Ok(Self { id, name })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl From<proto::Tenant> for Tenant {
    fn from(value: proto::Tenant) -> Self {
        Self {
            id: value.id,
            name: value.name,
        }
    }
}

impl From<&Tenant> for proto::Tenant {
    fn from(value: &Tenant) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}

/// One artifact upload addressed to a tenant.
#[derive(Debug, Clone)]
pub struct ArtifactUpload {
    tenant: String,
    name: String,
    kind: ArtifactKind,
    content: Bytes,
}

impl ArtifactUpload {
    pub fn new(
        tenant: impl Into<String>,
        name: impl Into<String>,
        kind: ArtifactKind,
        content: Bytes,
    ) -> Result<Self, TransportError> {
        let tenant = tenant.into();
        let name = name.into();
        if tenant.trim().is_empty() || name.trim().is_empty() {
            return Err(TransportError::InvalidMessage(
                "artifact upload requires a tenant and a name".into(),
            ));
        }
        Ok(Self {
            tenant,
            name,
            kind,
            content,
        })
    }

    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> ArtifactKind {
        self.kind
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    /// JSON mapping of the request as the platform documents it, content base64-encoded.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "tenantFile": {
                "file": {
                    "content": STANDARD.encode(&self.content),
                    "name": self.name,
                    "type": self.kind.wire_code(),
                },
                "tenant": self.tenant,
            }
        })
    }
}

impl From<&ArtifactUpload> for proto::AddFileRequest {
    fn from(value: &ArtifactUpload) -> Self {
        Self {
            tenant_file: Some(proto::TenantFile {
                tenant: value.tenant.clone(),
                file: Some(proto::File {
                    name: value.name.clone(),
                    r#type: value.kind.wire_code(),
                    content: value.content.to_vec(),
                }),
            }),
        }
    }
}

/// Package submission document: a package block with its queues, jobs and runtimes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDocument {
    pub package: JobPackage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobPackage {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub tenant: String,
    #[serde(default)]
    pub queues: Vec<QueueDefinition>,
    #[serde(default)]
    pub jobs: Vec<JobDefinition>,
    #[serde(default)]
    pub runtimes: Vec<RuntimeDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueDefinition {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaReference {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeDefinition {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "moduleref", alias = "moduleRef", default)]
    pub module_ref: String,
    #[serde(rename = "mainfuncname", alias = "mainFuncName", default)]
    pub main_func_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDefinition {
    #[serde(rename = "ID", alias = "id", default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "supplierqueue", alias = "supplierQueue", default)]
    pub supplier_queue: String,
    #[serde(default)]
    pub runtime: String,
    #[serde(default)]
    pub schema: Option<SchemaReference>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultDefinition {
    #[serde(default)]
    pub ok: Option<EventDefinition>,
    #[serde(default)]
    pub error: Option<EventDefinition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDefinition {
    pub event: EventDefinition,
    #[serde(default)]
    pub result: Option<ResultDefinition>,
}

impl From<&QueueDefinition> for proto::QueueDef {
    fn from(value: &QueueDefinition) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}

impl From<&SchemaReference> for proto::SchemaDef {
    fn from(value: &SchemaReference) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
        }
    }
}

impl From<&RuntimeDefinition> for proto::RuntimeDef {
    fn from(value: &RuntimeDefinition) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            module_ref: value.module_ref.clone(),
            main_func_name: value.main_func_name.clone(),
        }
    }
}

impl From<&EventDefinition> for proto::EventDef {
    fn from(value: &EventDefinition) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            supplier_queue: value.supplier_queue.clone(),
            runtime: value.runtime.clone(),
            schema: value.schema.as_ref().map(Into::into),
        }
    }
}

impl From<&JobDefinition> for proto::JobDefinition {
    fn from(value: &JobDefinition) -> Self {
        Self {
            event: Some((&value.event).into()),
            result: value.result.as_ref().map(|result| proto::ResultDef {
                ok: result.ok.as_ref().map(Into::into),
                error: result.error.as_ref().map(Into::into),
            }),
        }
    }
}

impl From<&JobPackage> for proto::JobPackage {
    fn from(value: &JobPackage) -> Self {
        Self {
            id: value.id.clone(),
            name: value.name.clone(),
            tenant: value.tenant.clone(),
            queues: value.queues.iter().map(Into::into).collect(),
            jobs: value.jobs.iter().map(Into::into).collect(),
            runtimes: value.runtimes.iter().map(Into::into).collect(),
        }
    }
}

impl From<proto::JobPackage> for JobPackage {
    fn from(value: proto::JobPackage) -> Self {
        Self {
            id: value.id,
            name: value.name,
            tenant: value.tenant,
            queues: value
                .queues
                .into_iter()
                .map(|queue| QueueDefinition {
                    id: queue.id,
                    name: queue.name,
                })
                .collect(),
            // Replies only echo identity; job and runtime bodies are not read back.
            jobs: Vec::new(),
            runtimes: Vec::new(),
        }
    }
}

impl From<&PackageDocument> for proto::AddPackageRequest {
    fn from(value: &PackageDocument) -> Self {
        Self {
            package: Some((&value.package).into()),
        }
    }
}

/// Single record carried inside an event payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventRecord {
    pub first_name: String,
    pub last_name: String,
    pub age: u8,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// `{ "data": [...] }` envelope posted to the ingestion endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub data: Vec<EventRecord>,
}

impl EventEnvelope {
    pub fn single(record: EventRecord) -> Self {
        Self { data: vec![record] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tenant_requires_identifier_and_defaults_name() {
        assert!(Tenant::new("  ", "x").is_err());
        let tenant = Tenant::new("tenant_1", "").unwrap();
        assert_eq!(tenant.name(), "tenant_1");
    }

    #[test]
    fn artifact_upload_maps_kind_to_wire_code() {
        let upload = ArtifactUpload::new(
            "tenant_1",
            "run1",
            ArtifactKind::Module,
            Bytes::from_static(b"\0asm"),
        )
        .unwrap();
        let request = proto::AddFileRequest::from(&upload);
        let file = request.tenant_file.unwrap().file.unwrap();
        assert_eq!(file.r#type, 2);
        assert_eq!(file.content, b"\0asm".to_vec());

        let json = upload.to_json();
        assert_eq!(json["tenantFile"]["file"]["content"], "AGFzbQ==");
        assert_eq!(json["tenantFile"]["tenant"], "tenant_1");
    }

    #[test]
    fn event_envelope_uses_camel_case_fields() {
        let envelope = EventEnvelope::single(EventRecord {
            first_name: "ada".into(),
            last_name: "lovelace".into(),
            age: 36,
            extra: Default::default(),
        });
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"data": [{"firstName": "ada", "lastName": "lovelace", "age": 36}]})
        );
    }

    #[test]
    fn package_document_converts_nested_definitions() {
        let document = PackageDocument {
            package: JobPackage {
                id: "pkg".into(),
                name: "Package".into(),
                tenant: "tenant_1".into(),
                queues: vec![QueueDefinition {
                    id: "q1".into(),
                    name: "Queue".into(),
                }],
                jobs: vec![JobDefinition {
                    event: EventDefinition {
                        id: "event_id_1".into(),
                        name: "event".into(),
                        supplier_queue: "q1".into(),
                        runtime: "rt".into(),
                        schema: Some(SchemaReference {
                            id: "sch1".into(),
                            name: "schema".into(),
                        }),
                    },
                    result: None,
                }],
                runtimes: vec![],
            },
        };
        let request = proto::AddPackageRequest::from(&document);
        let package = request.package.unwrap();
        assert_eq!(package.queues[0].id, "q1");
        let event = package.jobs[0].event.as_ref().unwrap();
        assert_eq!(event.schema.as_ref().unwrap().id, "sch1");
    }
}
