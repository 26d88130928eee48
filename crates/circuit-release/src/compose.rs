//! Dispatch event composer.
//!
//! Turns a persisted release and its resolved components into the single
//! `release` event extension runtimes subscribe to.

use circuit_core::event::RELEASE_EVENT;
use circuit_core::wire::{FeaturePayload, GitPayload, ProjectPayload, ReleasePayload, SecretPayload};
use circuit_core::{Action, Event, EventPayload};
use circuit_state::{Feature, Project, ProjectSettings, Release, Repository, User};
use tracing::{debug, warn};

use crate::builder::wire_services;
use crate::error::{ReleaseError, ReleaseResult};
use crate::prepare::ReleaseComponents;

/// Artifact listing project extension ids in dispatch order.
pub const EXTENSION_ORDER_ARTIFACT: &str = "project_extensions";

/// Git branch configured for the project in the environment.
pub fn branch<R: Repository>(repo: &R, project_id: &str, environment_id: &str) -> ReleaseResult<String> {
    repo.first::<ProjectSettings>(|s| s.project_id == project_id && s.environment_id == environment_id)?
        .map(|s| s.git_branch)
        .ok_or_else(|| {
            warn!(project = %project_id, environment = %environment_id, "no env project branch found");
            ReleaseError::NoBranch
        })
}

/// Email shown for a user: the user row, then `fallback`, then the id.
pub fn user_email<R: Repository>(repo: &R, user_id: &str, fallback: &str) -> ReleaseResult<String> {
    Ok(match repo.get::<User>(user_id)? {
        Some(user) if !user.email.is_empty() => user.email,
        _ if !fallback.is_empty() => fallback.to_string(),
        _ => user_id.to_string(),
    })
}

/// Build the `release:create` event for `release`.
pub fn compose<R: Repository>(
    repo: &R,
    release: &Release,
    components: &ReleaseComponents,
    branch: &str,
) -> ReleaseResult<Event> {
    let project = &components.project;

    let payload = ReleasePayload {
        id: release.id.clone(),
        action: Action::Create,
        state: release.state,
        state_message: release.state_message.clone(),
        project: project_payload(project),
        git: GitPayload {
            url: project.git_url.clone(),
            protocol: project.git_protocol.clone(),
            branch: branch.to_string(),
            rsa_private_key: project.rsa_private_key.clone(),
        },
        head_feature: feature_payload(&components.head_feature),
        tail_feature: feature_payload(&components.tail_feature),
        user: user_email(repo, &release.user_id, "")?,
        services: wire_services(&components.services)?,
        secrets: components
            .secrets
            .iter()
            .map(|s| SecretPayload {
                key: s.key.clone(),
                value: s.value.value.clone(),
                secret_type: s.secret_type,
            })
            .collect(),
        artifacts: Default::default(),
        environment: components.environment.key.clone(),
        is_rollback: release.is_rollback,
        force_rebuild: release.force_rebuild,
    };

    let mut event = Event::new(RELEASE_EVENT, Action::Create, EventPayload::Release(Box::new(payload)));
    let order: Vec<&str> = components
        .project_extensions
        .iter()
        .map(|pe| pe.id.as_str())
        .collect();
    event.add_artifact(EXTENSION_ORDER_ARTIFACT, serde_json::json!(order), false);

    debug!(release = %release.id, event = %event.id, "release event composed");
    Ok(event)
}

pub(crate) fn project_payload(project: &Project) -> ProjectPayload {
    ProjectPayload {
        id: project.id.clone(),
        slug: project.slug.clone(),
        repository: project.repository.clone(),
    }
}

fn feature_payload(feature: &Feature) -> FeaturePayload {
    FeaturePayload {
        id: feature.id.clone(),
        hash: feature.hash.clone(),
        parent_hash: feature.parent_hash.clone(),
        user: feature.user.clone(),
        message: feature.message.clone(),
        created: feature.created,
    }
}
