//! Domain records persisted by the Circuit state store.
//!
//! Every record carries a string id and a creation timestamp. Related
//! rows point at each other by id; hydrated children (ports, probes,
//! resolved secret values) are filled in by readers and default to empty
//! when a row is loaded on its own.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use circuit_core::{ExtensionType, SecretScope, SecretType, State};

use crate::snapshot::Snapshot;

// ── Identity ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

// ── Projects & environments ───────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub repository: String,
    pub git_url: String,
    pub git_protocol: String,
    pub rsa_private_key: String,
    pub rsa_public_key: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub id: String,
    pub name: String,
    /// Short machine name, e.g. `production`.
    pub key: String,
    pub is_default: bool,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

/// Grant: the project may release into the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectEnvironment {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub created_at: DateTime<Utc>,
}

/// Per-environment project settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub git_branch: String,
    pub continuous_deploy: bool,
    pub created_at: DateTime<Utc>,
}

/// A commit known to the platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    pub id: String,
    pub project_id: String,
    pub message: String,
    pub user: String,
    pub hash: String,
    pub parent_hash: String,
    pub git_ref: String,
    /// Commit time.
    pub created: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

// ── Extensions ────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Extension {
    pub id: String,
    #[serde(rename = "type")]
    pub extension_type: ExtensionType,
    pub key: String,
    pub name: String,
    pub component: String,
    pub environment_id: String,
    #[serde(default)]
    pub config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// An extension installed on a (project, environment).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectExtension {
    pub id: String,
    pub project_id: String,
    pub extension_id: String,
    pub environment_id: String,
    pub state: State,
    pub state_message: String,
    #[serde(default)]
    pub artifacts: serde_json::Value,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default)]
    pub custom_config: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ── Secrets ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Secret {
    pub id: String,
    pub key: String,
    /// Latest value, resolved by the reader.
    #[serde(default)]
    pub value: SecretValue,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
    pub project_id: Option<String>,
    pub scope: SecretScope,
    pub environment_id: String,
    pub is_secret: bool,
    pub created_at: DateTime<Utc>,
}

/// One version in a secret's append-only value chain.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SecretValue {
    pub id: String,
    pub secret_id: String,
    pub value: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
}

// ── Services ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub service_spec_id: String,
    pub name: String,
    pub command: String,
    /// `general` or `one-shot`.
    #[serde(rename = "type")]
    pub service_type: String,
    /// Replica count.
    pub count: u32,
    #[serde(default)]
    pub ports: Vec<ServicePort>,
    #[serde(default)]
    pub deployment_strategy: Option<DeploymentStrategy>,
    #[serde(default)]
    pub readiness_probe: Option<HealthProbe>,
    #[serde(default)]
    pub liveness_probe: Option<HealthProbe>,
    #[serde(default)]
    pub spec: Option<ServiceSpec>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServicePort {
    pub id: String,
    pub service_id: String,
    pub protocol: String,
    pub port: u16,
    pub created_at: DateTime<Utc>,
}

/// Resource envelope for a service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceSpec {
    pub id: String,
    pub name: String,
    /// Millicores.
    pub cpu_request: String,
    pub cpu_limit: String,
    /// Mebibytes.
    pub memory_request: String,
    pub memory_limit: String,
    /// Seconds.
    pub termination_grace_period: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentStrategy {
    pub id: String,
    pub service_id: String,
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub max_unavailable: String,
    pub max_surge: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ProbeKind {
    ReadinessProbe,
    LivenessProbe,
}

impl ProbeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeKind::ReadinessProbe => "readinessProbe",
            ProbeKind::LivenessProbe => "livenessProbe",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthProbe {
    pub id: String,
    pub service_id: String,
    pub kind: ProbeKind,
    /// `http`, `tcp` or `exec`.
    pub method: String,
    pub command: String,
    pub port: i32,
    pub scheme: String,
    pub path: String,
    pub initial_delay_seconds: i32,
    pub period_seconds: i32,
    pub timeout_seconds: i32,
    pub success_threshold: i32,
    pub failure_threshold: i32,
    #[serde(default)]
    pub http_headers: Vec<HttpHeader>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpHeader {
    pub id: String,
    pub health_probe_id: String,
    pub name: String,
    pub value: String,
    pub created_at: DateTime<Utc>,
}

// ── Releases ──────────────────────────────────────────────────────

/// One deployment attempt with its configuration frozen at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    pub id: String,
    pub project_id: String,
    pub environment_id: String,
    pub head_feature_id: String,
    pub tail_feature_id: String,
    pub user_id: String,
    pub state: State,
    pub state_message: String,
    pub secrets: Snapshot,
    pub services: Snapshot,
    pub project_extensions: Snapshot,
    /// Hex SHA-1 of the gathered secrets, before env-var injection.
    pub secrets_signature: String,
    /// Hex SHA-1 of the gathered services.
    pub services_signature: String,
    pub is_rollback: bool,
    pub redeployable: bool,
    pub force_rebuild: bool,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Per-release, per-extension work unit tracked by the extension runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseExtension {
    pub id: String,
    pub release_id: String,
    pub project_extension_id: String,
    pub feature_hash: String,
    pub services_signature: String,
    pub secrets_signature: String,
    pub state: State,
    pub state_message: String,
    #[serde(rename = "type")]
    pub extension_type: ExtensionType,
    #[serde(default)]
    pub artifacts: serde_json::Value,
    pub started: Option<DateTime<Utc>>,
    pub finished: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}
