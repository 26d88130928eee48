//! Release preparation: validation gates, duplicate detection and
//! rollback reuse.
//!
//! Each gate is a hard stop. Nothing is written here, so a rejected
//! request leaves no trace in the store.

use chrono::{DateTime, Utc};
use circuit_core::State;
use circuit_state::{
    Environment, Feature, Project, ProjectEnvironment, ProjectExtension, Release, Repository,
    Secret, Service, Snapshot,
};
use tracing::{debug, info, warn};

use crate::builder;
use crate::envvars;
use crate::error::{ReleaseError, ReleaseResult};
use crate::gather::Gatherer;
use crate::signature::Signatures;

/// What a caller asks to release.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrepareRequest {
    pub project_id: String,
    pub environment_id: String,
    pub head_feature_id: String,
    /// Reuse this release's frozen configuration instead of the live one.
    pub rollback_release_id: Option<String>,
}

/// Everything needed to persist and dispatch a release.
#[derive(Debug, Clone)]
pub struct ReleaseComponents {
    pub project: Project,
    pub environment: Environment,
    pub services: Vec<Service>,
    pub secrets: Vec<Secret>,
    pub project_extensions: Vec<ProjectExtension>,
    pub head_feature: Feature,
    pub tail_feature: Feature,
    /// Fingerprints of the gathered (pre-injection) configuration.
    pub signatures: Signatures,
    /// The release whose snapshots are being reused, if this is a rollback.
    pub rollback_of: Option<Release>,
}

impl ReleaseComponents {
    pub fn is_rollback(&self) -> bool {
        self.rollback_of.is_some()
    }
}

/// Run the preparation gates in order.
///
/// `dedup` enables the duplicate-in-flight check; rollbacks never take it.
/// `now` stamps the injected `*_CREATED_AT` variables.
pub fn prepare<R: Repository>(
    repo: &R,
    request: &PrepareRequest,
    dedup: bool,
    now: DateTime<Utc>,
) -> ReleaseResult<ReleaseComponents> {
    let project_id = request.project_id.as_str();
    let environment_id = request.environment_id.as_str();

    let project = repo.get::<Project>(project_id)?.ok_or_else(|| {
        warn!(project = %project_id, "project not found");
        ReleaseError::not_found("Project", project_id)
    })?;

    let rollback_of = match request.rollback_release_id.as_deref() {
        Some(id) => Some(repo.get::<Release>(id)?.ok_or_else(|| {
            warn!(release = %id, "rollback target not found");
            ReleaseError::not_found("Release", id)
        })?),
        None => None,
    };

    let granted = repo
        .first::<ProjectEnvironment>(|g| {
            g.project_id == project_id && g.environment_id == environment_id
        })?
        .is_some();
    if !granted {
        warn!(project = %project_id, environment = %environment_id, "project not allowed in environment");
        return Err(ReleaseError::EnvironmentNotAllowed);
    }

    let gatherer = Gatherer::new(repo);
    let mut project_extensions = gatherer.extensions(project_id, environment_id)?;
    let mut services = gatherer.services(project_id, environment_id)?;
    let mut secrets = gatherer.secrets(project_id, environment_id)?;
    let mut signatures = Signatures::compute(&secrets, &services)?;

    if dedup && rollback_of.is_none() {
        reject_duplicate(repo, request, &signatures)?;
    }

    let environment = repo.get::<Environment>(environment_id)?.ok_or_else(|| {
        warn!(environment = %environment_id, "environment not found");
        ReleaseError::not_found("Environment", environment_id)
    })?;
    let head_feature = repo
        .get::<Feature>(&request.head_feature_id)?
        .ok_or_else(|| {
            warn!(feature = %request.head_feature_id, "head feature not found");
            ReleaseError::not_found("head feature", &request.head_feature_id)
        })?;

    match &rollback_of {
        Some(source) => {
            info!(release = %source.id, project = %project_id, "rolling back to frozen configuration");
            secrets = decode(&source.secrets, "secrets")?;
            services = decode(&source.services, "services")?;
            project_extensions = decode(&source.project_extensions, "project extensions")?;
            signatures = Signatures {
                secrets: source.secrets_signature.clone(),
                services: source.services_signature.clone(),
            };
        }
        None => envvars::inject(&mut secrets, &project, environment_id, &head_feature, now),
    }

    let tail_id = builder::tail_feature_id(repo, project_id, environment_id, &head_feature.id)?;
    let tail_feature = match repo.get::<Feature>(&tail_id)? {
        Some(feature) => feature,
        None => {
            warn!(feature = %tail_id, "tail feature missing, using head");
            head_feature.clone()
        }
    };

    debug!(
        project = %project_id,
        environment = %environment_id,
        services = services.len(),
        secrets = secrets.len(),
        extensions = project_extensions.len(),
        "release components prepared"
    );

    Ok(ReleaseComponents {
        project,
        environment,
        services,
        secrets,
        project_extensions,
        head_feature,
        tail_feature,
        signatures,
        rollback_of,
    })
}

/// Components of an already persisted release, read back from its own
/// snapshots. Live configuration is never consulted, so a queued release
/// (rollback or not) dispatches exactly what was frozen when it was built.
pub fn frozen<R: Repository>(repo: &R, release: &Release) -> ReleaseResult<ReleaseComponents> {
    let project = repo.get::<Project>(&release.project_id)?.ok_or_else(|| {
        warn!(release = %release.id, project = %release.project_id, "project not found");
        ReleaseError::not_found("Project", &release.project_id)
    })?;
    let environment = repo
        .get::<Environment>(&release.environment_id)?
        .ok_or_else(|| {
            warn!(release = %release.id, environment = %release.environment_id, "environment not found");
            ReleaseError::not_found("Environment", &release.environment_id)
        })?;
    let head_feature = repo
        .get::<Feature>(&release.head_feature_id)?
        .ok_or_else(|| {
            warn!(release = %release.id, feature = %release.head_feature_id, "head feature not found");
            ReleaseError::not_found("head feature", &release.head_feature_id)
        })?;
    let tail_feature = match repo.get::<Feature>(&release.tail_feature_id)? {
        Some(feature) => feature,
        None => {
            warn!(release = %release.id, feature = %release.tail_feature_id, "tail feature missing, using head");
            head_feature.clone()
        }
    };

    Ok(ReleaseComponents {
        project,
        environment,
        services: decode(&release.services, "services")?,
        secrets: decode(&release.secrets, "secrets")?,
        project_extensions: decode(&release.project_extensions, "project extensions")?,
        head_feature,
        tail_feature,
        signatures: Signatures {
            secrets: release.secrets_signature.clone(),
            services: release.services_signature.clone(),
        },
        rollback_of: None,
    })
}

/// Reject when the newest waiting/running release for the pair carries the
/// same configuration and head commit.
fn reject_duplicate<R: Repository>(
    repo: &R,
    request: &PrepareRequest,
    signatures: &Signatures,
) -> ReleaseResult<()> {
    let Some(in_flight) = repo.latest::<Release>(|r| {
        r.project_id == request.project_id
            && r.environment_id == request.environment_id
            && matches!(r.state, State::Waiting | State::Running)
    })?
    else {
        return Ok(());
    };

    if in_flight.secrets_signature != signatures.secrets
        || in_flight.services_signature != signatures.services
    {
        return Ok(());
    }

    let candidate = repo.get::<Feature>(&request.head_feature_id)?;
    let pending = repo.get::<Feature>(&in_flight.head_feature_id)?;
    match (candidate, pending) {
        (Some(candidate), Some(pending)) if candidate.hash == pending.hash => {
            warn!(
                release = %in_flight.id,
                hash = %candidate.hash,
                "found an in-flight release with the same configuration"
            );
            Err(ReleaseError::DuplicateInFlight {
                release_id: in_flight.id,
            })
        }
        _ => Ok(()),
    }
}

fn decode<T: serde::de::DeserializeOwned>(snapshot: &Snapshot, what: &str) -> ReleaseResult<T> {
    snapshot
        .decode()
        .map_err(|e| ReleaseError::Snapshot(format!("could not decode {what}: {e}")))
}
