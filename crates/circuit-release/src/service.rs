//! Release service: authorized entry points over the pipeline.
//!
//! `create` chains prepare → build → compose → publish; `stop` and `get`
//! are the other caller-facing operations. `start`, `complete` and `fail`
//! are driven by the extension runtime reporting progress.

use std::sync::Arc;

use chrono::Utc;
use circuit_core::config::ReleaseConfig;
use circuit_core::{Authorizer, Claims, EventBus, State};
use circuit_state::{Release, Repository};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::builder;
use crate::compose;
use crate::error::{ReleaseError, ReleaseResult};
use crate::lifecycle;
use crate::prepare::{PrepareRequest, prepare};
use crate::queue::{self, Startable};

/// Inbound request to create a release.
///
/// A non-empty `id` names an existing release to roll back to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReleaseInput {
    #[serde(rename = "ID", default)]
    pub id: Option<String>,
    #[serde(rename = "headFeatureID")]
    pub head_feature_id: String,
    #[serde(rename = "projectID")]
    pub project_id: String,
    #[serde(rename = "environmentID")]
    pub environment_id: String,
    #[serde(default)]
    pub force_rebuild: bool,
}

pub struct ReleaseService<R> {
    repo: R,
    authorizer: Arc<dyn Authorizer>,
    bus: Arc<dyn EventBus>,
    config: ReleaseConfig,
}

impl<R: Repository> ReleaseService<R> {
    pub fn new(
        repo: R,
        authorizer: Arc<dyn Authorizer>,
        bus: Arc<dyn EventBus>,
        config: ReleaseConfig,
    ) -> Self {
        Self {
            repo,
            authorizer,
            bus,
            config,
        }
    }

    pub fn repository(&self) -> &R {
        &self.repo
    }

    fn authorize(&self, claims: &Claims, operation: &str) -> ReleaseResult<String> {
        self.authorizer.authorize(claims, &[]).map_err(|e| {
            warn!(user = e.principal().unwrap_or(""), operation, error = %e, "request not authorized");
            ReleaseError::Auth(e)
        })
    }

    /// Create and dispatch a release. Exactly one `release:create` event is
    /// published on success.
    pub fn create(&self, claims: &Claims, input: CreateReleaseInput) -> ReleaseResult<Release> {
        let user_id = self.authorize(claims, "create_release")?;

        let request = PrepareRequest {
            project_id: input.project_id,
            environment_id: input.environment_id,
            head_feature_id: input.head_feature_id,
            rollback_release_id: input.id.filter(|id| !id.is_empty()),
        };
        let now = Utc::now();
        let components = prepare(&self.repo, &request, self.config.dedup_in_flight, now)?;
        let branch = compose::branch(&self.repo, &request.project_id, &request.environment_id)?;

        let release = builder::build(&self.repo, &user_id, &components, input.force_rebuild, now)?;

        let dispatched = compose::compose(&self.repo, &release, &components, &branch)
            .and_then(|event| self.bus.publish(event).map_err(ReleaseError::from));
        if let Err(err) = dispatched {
            self.mark_failed(&release, &err);
            return Err(err);
        }

        info!(
            release = %release.id,
            project = %release.project_id,
            environment = %release.environment_id,
            user = %user_id,
            "release dispatched"
        );
        Ok(release)
    }

    fn mark_failed(&self, release: &Release, cause: &ReleaseError) {
        error!(release = %release.id, error = %cause, "release dispatch failed");
        let mut failed = release.clone();
        failed.state = State::Failed;
        failed.state_message = cause.to_string();
        failed.finished = Some(Utc::now());
        if let Err(e) = self.repo.put(&failed) {
            error!(release = %release.id, error = %e, "could not record dispatch failure");
        }
    }

    /// Cancel a release. Any authenticated caller may stop any release.
    pub fn stop(&self, claims: &Claims, release_id: &str) -> ReleaseResult<Release> {
        let user_id = self.authorize(claims, "stop_release")?;
        let email = compose::user_email(&self.repo, &user_id, &claims.email)?;
        lifecycle::stop(&self.repo, self.bus.as_ref(), release_id, &email)
    }

    pub fn get(&self, claims: &Claims, release_id: &str) -> ReleaseResult<Release> {
        self.authorize(claims, "get_release")?;
        self.repo
            .get::<Release>(release_id)?
            .ok_or_else(|| ReleaseError::not_found("Release", release_id))
    }

    // ── Runtime callbacks ──────────────────────────────────────────

    pub fn start(&self, release_id: &str) -> ReleaseResult<Release> {
        lifecycle::start(&self.repo, release_id, Utc::now())
    }

    pub fn complete(&self, release_id: &str) -> ReleaseResult<Option<Startable>> {
        lifecycle::complete(&self.repo, release_id, Utc::now())
    }

    pub fn fail(&self, release_id: &str, message: &str) -> ReleaseResult<Option<Startable>> {
        lifecycle::fail(&self.repo, release_id, message, Utc::now())
    }

    pub fn next_startable(
        &self,
        project_id: &str,
        environment_id: &str,
        current: Option<&str>,
    ) -> ReleaseResult<Option<Startable>> {
        queue::next_startable(&self.repo, project_id, environment_id, current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use circuit_core::{AllowAll, AuthError, ChannelBus, Event, ScopeAuthorizer};
    use circuit_state::StateStore;
    use tokio::sync::mpsc::UnboundedReceiver;

    fn service(
        store: StateStore,
        authorizer: Arc<dyn Authorizer>,
    ) -> (ReleaseService<StateStore>, UnboundedReceiver<Event>) {
        let (bus, rx) = ChannelBus::channel();
        let svc = ReleaseService::new(store, authorizer, Arc::new(bus), ReleaseConfig::default());
        (svc, rx)
    }

    fn input() -> CreateReleaseInput {
        CreateReleaseInput {
            id: None,
            head_feature_id: fixtures::FEATURE.to_string(),
            project_id: fixtures::PROJECT.to_string(),
            environment_id: fixtures::ENVIRONMENT.to_string(),
            force_rebuild: false,
        }
    }

    fn claims() -> Claims {
        Claims::new(fixtures::USER, "kim@checkr.com", &[])
    }

    #[test]
    fn input_uses_graphql_field_names() {
        let json = r#"{"ID":"","headFeatureID":"f-1","projectID":"p-1","environmentID":"e-1","forceRebuild":true}"#;
        let parsed: CreateReleaseInput = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.id.as_deref(), Some(""));
        assert!(parsed.force_rebuild);

        let minimal = r#"{"headFeatureID":"f-1","projectID":"p-1","environmentID":"e-1"}"#;
        let parsed: CreateReleaseInput = serde_json::from_str(minimal).unwrap();
        assert_eq!(parsed.id, None);
    }

    #[test]
    fn create_publishes_one_event() {
        let (svc, mut rx) = service(fixtures::seeded(), Arc::new(ScopeAuthorizer));

        let release = svc.create(&claims(), input()).unwrap();

        assert_eq!(release.state, State::Waiting);
        assert_eq!(release.user_id, fixtures::USER);
        let event = rx.try_recv().unwrap();
        assert!(event.matches("release:create"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn unauthenticated_create_is_rejected() {
        let (svc, mut rx) = service(fixtures::seeded(), Arc::new(ScopeAuthorizer));

        let err = svc
            .create(&Claims::unauthenticated("No JWT was provided"), input())
            .unwrap_err();

        assert!(matches!(err, ReleaseError::Auth(AuthError::Unauthenticated(_))));
        assert_eq!(err.to_string(), "No JWT was provided");
        assert!(rx.try_recv().is_err());
        assert!(svc.repository().find::<Release>(|_| true).unwrap().is_empty());
    }

    #[test]
    fn missing_branch_creates_nothing() {
        let store = fixtures::seeded();
        store.delete::<circuit_state::ProjectSettings>("ps-1").unwrap();
        let (svc, _rx) = service(store, Arc::new(AllowAll));

        let err = svc.create(&claims(), input()).unwrap_err();
        assert!(matches!(err, ReleaseError::NoBranch));
        assert!(svc.repository().find::<Release>(|_| true).unwrap().is_empty());
    }

    #[test]
    fn closed_bus_marks_release_failed() {
        let (svc, rx) = service(fixtures::seeded(), Arc::new(AllowAll));
        drop(rx);

        let err = svc.create(&claims(), input()).unwrap_err();
        assert!(matches!(err, ReleaseError::Publish(_)));
        let releases = svc.repository().find::<Release>(|_| true).unwrap();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].state, State::Failed);
    }

    #[test]
    fn rollback_copies_snapshots_verbatim() {
        let (svc, _rx) = service(fixtures::seeded(), Arc::new(AllowAll));
        let original = svc.create(&claims(), input()).unwrap();
        svc.start(&original.id).unwrap();
        svc.complete(&original.id).unwrap();

        // Live configuration drifts after the release.
        let mut live: circuit_state::Service = svc.repository().require(fixtures::SERVICE).unwrap();
        live.count = 5;
        svc.repository().put(&live).unwrap();

        let rollback = svc
            .create(
                &claims(),
                CreateReleaseInput {
                    id: Some(original.id.clone()),
                    ..input()
                },
            )
            .unwrap();

        assert!(rollback.is_rollback);
        assert_eq!(rollback.services, original.services);
        assert_eq!(rollback.secrets, original.secrets);
        assert_eq!(rollback.project_extensions, original.project_extensions);
    }

    #[test]
    fn stop_uses_user_email() {
        let (svc, mut rx) = service(fixtures::seeded(), Arc::new(AllowAll));
        let release = svc.create(&claims(), input()).unwrap();
        rx.try_recv().unwrap();
        svc.repository()
            .put(&fixtures::release_extension("re-1", &release.id, State::Waiting))
            .unwrap();

        let stopped = svc
            .stop(&Claims::new(fixtures::USER, "", &[]), &release.id)
            .unwrap();
        assert_eq!(stopped.state_message, "Release canceled by kim@checkr.com");
        assert!(rx.try_recv().unwrap().matches("release:dockerbuilder:create"));
    }

    #[test]
    fn get_missing_release() {
        let (svc, _rx) = service(fixtures::seeded(), Arc::new(AllowAll));
        let err = svc.get(&claims(), "rel-404").unwrap_err();
        assert!(matches!(err, ReleaseError::NotFound { entity: "Release", .. }));
    }
}
