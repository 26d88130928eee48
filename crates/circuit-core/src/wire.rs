//! Payloads handed to extensions over the event bus.
//!
//! Field names follow the extension runtime's JSON contract (camelCase).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{Action, SecretType, State};

/// A release, as seen by extensions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleasePayload {
    pub id: String,
    pub action: Action,
    pub state: State,
    pub state_message: String,
    pub project: ProjectPayload,
    pub git: GitPayload,
    pub head_feature: FeaturePayload,
    pub tail_feature: FeaturePayload,
    /// Email of the initiating user.
    pub user: String,
    pub services: Vec<ServicePayload>,
    pub secrets: Vec<SecretPayload>,
    pub artifacts: BTreeMap<String, String>,
    /// Environment key (e.g. `production`).
    pub environment: String,
    pub is_rollback: bool,
    pub force_rebuild: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectPayload {
    pub id: String,
    pub slug: String,
    pub repository: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitPayload {
    #[serde(rename = "gitUrl")]
    pub url: String,
    pub protocol: String,
    pub branch: String,
    pub rsa_private_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeaturePayload {
    pub id: String,
    pub hash: String,
    pub parent_hash: String,
    pub user: String,
    pub message: String,
    pub created: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecretPayload {
    pub key: String,
    pub value: String,
    #[serde(rename = "type")]
    pub secret_type: SecretType,
}

/// A service descriptor in the shape deployers consume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePayload {
    pub id: String,
    pub action: Action,
    pub state: State,
    pub name: String,
    pub command: String,
    pub listeners: Vec<ListenerPayload>,
    pub replicas: i64,
    pub spec: ServiceSpecPayload,
    #[serde(rename = "type")]
    pub service_type: String,
    pub deployment_strategy: DeploymentStrategyPayload,
    pub readiness_probe: HealthProbePayload,
    pub liveness_probe: HealthProbePayload,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListenerPayload {
    pub port: i32,
    pub protocol: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSpecPayload {
    pub id: String,
    pub cpu_request: String,
    pub cpu_limit: String,
    pub memory_request: String,
    pub memory_limit: String,
    pub termination_grace_period_seconds: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentStrategyPayload {
    #[serde(rename = "type")]
    pub strategy_type: String,
    pub max_unavailable: String,
    pub max_surge: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthProbePayload {
    pub service_id: String,
    #[serde(rename = "type")]
    pub probe_type: String,
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
    pub http_headers: Vec<HttpHeaderPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpHeaderPayload {
    pub name: String,
    pub value: String,
}

/// Minimal release-extension payload used for targeted cancellation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReleaseExtensionPayload {
    pub id: String,
    pub project: ProjectPayload,
    pub release: ReleaseRef,
    pub environment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRef {
    pub id: String,
}
