//! Release builder: resolves the tail feature, freezes the configuration
//! into snapshots and persists the new release.

use chrono::{DateTime, Utc};
use circuit_core::wire::{
    DeploymentStrategyPayload, HealthProbePayload, HttpHeaderPayload, ListenerPayload,
    ServicePayload, ServiceSpecPayload,
};
use circuit_core::{Action, State};
use circuit_state::{HealthProbe, Release, Repository, Service, Snapshot};
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{ReleaseError, ReleaseResult};
use crate::prepare::ReleaseComponents;

pub const RELEASE_CREATED: &str = "Release created";

/// Head feature of the newest complete release for the pair, or the new
/// head itself when the pair has never completed a release.
pub fn tail_feature_id<R: Repository>(
    repo: &R,
    project_id: &str,
    environment_id: &str,
    head_feature_id: &str,
) -> ReleaseResult<String> {
    let previous = repo.latest::<Release>(|r| {
        r.project_id == project_id
            && r.environment_id == environment_id
            && r.state == State::Complete
    })?;
    Ok(previous
        .map(|r| r.head_feature_id)
        .unwrap_or_else(|| head_feature_id.to_string()))
}

/// Persist a new `waiting` release frozen from `components`.
pub fn build<R: Repository>(
    repo: &R,
    user_id: &str,
    components: &ReleaseComponents,
    force_rebuild: bool,
    now: DateTime<Utc>,
) -> ReleaseResult<Release> {
    let id = uuid::Uuid::new_v4().to_string();

    let (secrets, services, project_extensions) = match &components.rollback_of {
        Some(source) => (
            source.secrets.clone(),
            source.services.clone(),
            source.project_extensions.clone(),
        ),
        None => (
            freeze(&id, "secrets", &components.secrets),
            freeze(&id, "services", &components.services),
            freeze(&id, "project_extensions", &components.project_extensions),
        ),
    };

    let release = Release {
        id,
        project_id: components.project.id.clone(),
        environment_id: components.environment.id.clone(),
        head_feature_id: components.head_feature.id.clone(),
        tail_feature_id: components.tail_feature.id.clone(),
        user_id: user_id.to_string(),
        state: State::Waiting,
        state_message: RELEASE_CREATED.to_string(),
        secrets,
        services,
        project_extensions,
        secrets_signature: components.signatures.secrets.clone(),
        services_signature: components.signatures.services.clone(),
        is_rollback: components.is_rollback(),
        redeployable: false,
        force_rebuild,
        started: None,
        finished: None,
        created_at: now,
    };
    repo.put(&release)?;

    info!(
        release = %release.id,
        project = %release.project_id,
        environment = %release.environment_id,
        rollback = release.is_rollback,
        "release created"
    );
    Ok(release)
}

/// Encode a snapshot. A failure leaves the snapshot empty rather than
/// failing the release.
fn freeze<T: Serialize>(release_id: &str, what: &str, value: &[T]) -> Snapshot {
    Snapshot::encode(value).unwrap_or_else(|e| {
        warn!(release = %release_id, snapshot = what, error = %e, "snapshot encoding failed, storing empty");
        Snapshot::default()
    })
}

// ── Wire mapping ──────────────────────────────────────────────────

/// Map hydrated services to the descriptors deployers consume.
pub fn wire_services(services: &[Service]) -> ReleaseResult<Vec<ServicePayload>> {
    services.iter().map(wire_service).collect()
}

fn wire_service(service: &Service) -> ReleaseResult<ServicePayload> {
    let spec = service
        .spec
        .as_ref()
        .ok_or_else(|| ReleaseError::not_found("ServiceSpec", &service.service_spec_id))?;

    Ok(ServicePayload {
        id: service.id.clone(),
        action: Action::Create,
        state: State::Waiting,
        name: service.name.clone(),
        command: service.command.clone(),
        listeners: service
            .ports
            .iter()
            .map(|p| ListenerPayload {
                port: i32::from(p.port),
                protocol: p.protocol.clone(),
            })
            .collect(),
        replicas: i64::from(service.count),
        spec: ServiceSpecPayload {
            id: spec.id.clone(),
            cpu_request: format!("{}m", spec.cpu_request),
            cpu_limit: format!("{}m", spec.cpu_limit),
            memory_request: format!("{}Mi", spec.memory_request),
            memory_limit: format!("{}Mi", spec.memory_limit),
            termination_grace_period_seconds: spec
                .termination_grace_period
                .trim()
                .parse()
                .unwrap_or_default(),
        },
        service_type: service.service_type.clone(),
        deployment_strategy: service
            .deployment_strategy
            .as_ref()
            .map(|d| DeploymentStrategyPayload {
                strategy_type: d.strategy_type.clone(),
                max_unavailable: d.max_unavailable.clone(),
                max_surge: d.max_surge.clone(),
            })
            .unwrap_or_default(),
        readiness_probe: wire_probe(service.readiness_probe.as_ref()),
        liveness_probe: wire_probe(service.liveness_probe.as_ref()),
    })
}

fn wire_probe(probe: Option<&HealthProbe>) -> HealthProbePayload {
    let Some(p) = probe else {
        return HealthProbePayload::default();
    };
    HealthProbePayload {
        service_id: p.service_id.clone(),
        probe_type: p.kind.as_str().to_string(),
        method: p.method.clone(),
        command: p.command.clone(),
        port: p.port,
        scheme: p.scheme.clone(),
        path: p.path.clone(),
        initial_delay_seconds: p.initial_delay_seconds,
        period_seconds: p.period_seconds,
        timeout_seconds: p.timeout_seconds,
        success_threshold: p.success_threshold,
        failure_threshold: p.failure_threshold,
        http_headers: p
            .http_headers
            .iter()
            .map(|h| HttpHeaderPayload {
                name: h.name.clone(),
                value: h.value.clone(),
            })
            .collect(),
    }
}
