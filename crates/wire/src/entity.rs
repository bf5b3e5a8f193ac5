// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `batch_get_job_entity` request/response shapes (spec §4.2, §6).

use serde::{Deserialize, Serialize};
use wa_core::{EnvironmentId, JobId, PathMappingRule, StepId};

/// Template schema version this agent implements. A job entity declaring
/// anything else fails step-script assembly with `UNSUPPORTED_SCHEMA`.
pub const ENTITY_SCHEMA_VERSION: &str = "openjd-1.0";

/// One job-entity record the action queue needs before it can start actions
/// referencing it (spec §4.1 `list_identifiers`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum EntityIdentifier {
    Environment { environment_id: EnvironmentId },
    Step { step_id: StepId },
    JobAttachmentDetails { job_id: JobId },
}

/// A single embedded step-script file, referenced by name from
/// [`ScriptTemplate::command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddedFile {
    pub name: String,
    pub contents: String,
}

/// The declarative command a step or environment action runs. The real
/// openjd template language supports far more than this; we model exactly
/// what step-script assembly (spec §4.2) needs: a command line and zero or
/// more embedded files materialized alongside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptTemplate {
    pub template_schema_version: String,
    pub command: String,
    pub args: Vec<String>,
    #[serde(default)]
    pub embedded_files: Vec<EmbeddedFile>,
    /// Cooperative cancel timeline: seconds to wait after notifying the
    /// subprocess before escalating to a hard terminate.
    #[serde(default)]
    pub cancel_notify_period_seconds: Option<u64>,
}

impl ScriptTemplate {
    pub fn is_supported(&self) -> bool {
        self.template_schema_version == ENTITY_SCHEMA_VERSION
    }
}

/// A single manifest root reference as recorded on a job/step attachment
/// settings entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestReference {
    pub root_path: String,
    pub manifest_s3_key: String,
}

/// How job attachment inputs are to be materialized into the session
/// working directory (spec §4.2 `AttachmentDownload` step 3). `Copied` runs
/// the ordinary download helper step-script; `Virtual` short-circuits
/// assembly into a VFS mount when the host and the resolved OS user support
/// it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobAttachmentsFileSystem {
    #[default]
    Copied,
    Virtual,
}

/// The authoritative per-id entity record returned by `batch_get_job_entity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum JobEntity {
    Environment {
        environment_id: EnvironmentId,
        script: ScriptTemplate,
    },
    Step {
        step_id: StepId,
        script: ScriptTemplate,
        #[serde(default)]
        step_dependencies: Vec<StepId>,
    },
    JobAttachmentDetails {
        job_id: JobId,
        manifests: Vec<ManifestReference>,
        #[serde(default)]
        path_mapping_rules: Vec<PathMappingRule>,
        blob_store_root_uri: String,
        #[serde(default)]
        file_system: JobAttachmentsFileSystem,
    },
}

impl JobEntity {
    pub fn identifier(&self) -> EntityIdentifier {
        match self {
            JobEntity::Environment { environment_id, .. } => EntityIdentifier::Environment {
                environment_id: environment_id.clone(),
            },
            JobEntity::Step { step_id, .. } => EntityIdentifier::Step { step_id: step_id.clone() },
            JobEntity::JobAttachmentDetails { job_id, .. } => {
                EntityIdentifier::JobAttachmentDetails { job_id: job_id.clone() }
            }
        }
    }
}

/// Request body for `batch_get_job_entity`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetJobEntityRequest {
    pub identifiers: Vec<EntityIdentifier>,
}

/// One failed lookup within a batch-get response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityError {
    pub identifier: EntityIdentifier,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchGetJobEntityResponse {
    pub entities: Vec<JobEntity>,
    #[serde(default)]
    pub errors: Vec<EntityError>,
}

#[cfg(test)]
#[path = "entity_tests.rs"]
mod tests;
