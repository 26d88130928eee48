//! Startable-release queue.
//!
//! Releases for one (project, environment) run one at a time, oldest
//! first. The head of the queue is startable only while it is still
//! `waiting`; a `running` head blocks everything behind it.

use circuit_core::{Event, State};
use circuit_state::{Release, Repository};
use tracing::{debug, info};

use crate::compose;
use crate::error::ReleaseResult;
use crate::prepare;

/// A release ready to start, with a freshly composed dispatch event when
/// the caller does not already hold one.
#[derive(Debug, Clone)]
pub struct Startable {
    pub release: Release,
    pub event: Option<Event>,
}

/// The release to start next for the pair, if any.
///
/// `current` is the release the caller is handling; every other release
/// gets its event recomposed from its own frozen snapshots.
pub fn next_startable<R: Repository>(
    repo: &R,
    project_id: &str,
    environment_id: &str,
    current: Option<&str>,
) -> ReleaseResult<Option<Startable>> {
    let Some(head) = repo.first::<Release>(|r| {
        r.project_id == project_id
            && r.environment_id == environment_id
            && matches!(r.state, State::Waiting | State::Running)
    })?
    else {
        debug!(project = %project_id, environment = %environment_id, "release queue empty");
        return Ok(None);
    };

    if head.state != State::Waiting {
        debug!(release = %head.id, "queue head already running");
        return Ok(None);
    }

    if current == Some(head.id.as_str()) {
        return Ok(Some(Startable {
            release: head,
            event: None,
        }));
    }

    info!(release = %head.id, rollback = head.is_rollback, "rebuilding release event for queued release");
    let components = prepare::frozen(repo, &head)?;
    let branch = compose::branch(repo, project_id, environment_id)?;
    let event = compose::compose(repo, &head, &components, &branch)?;

    Ok(Some(Startable {
        release: head,
        event: Some(event),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::build;
    use crate::fixtures::{self, at};
    use crate::prepare::{PrepareRequest, prepare};
    use circuit_core::EventPayload;
    use circuit_state::Service;

    fn queued(store: &circuit_state::StateStore, secs: i64) -> Release {
        queued_from(store, None, secs)
    }

    fn queued_from(store: &circuit_state::StateStore, rollback: Option<&str>, secs: i64) -> Release {
        let request = PrepareRequest {
            project_id: fixtures::PROJECT.to_string(),
            environment_id: fixtures::ENVIRONMENT.to_string(),
            head_feature_id: fixtures::FEATURE.to_string(),
            rollback_release_id: rollback.map(str::to_string),
        };
        let c = prepare(store, &request, false, at(secs)).unwrap();
        build(store, fixtures::USER, &c, false, at(secs)).unwrap()
    }

    #[test]
    fn empty_queue() {
        let store = fixtures::seeded();
        assert!(next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .is_none());
    }

    #[test]
    fn oldest_waiting_release_is_next() {
        let store = fixtures::seeded();
        let older = queued(&store, 60);
        queued(&store, 70);

        let next = next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .unwrap();
        assert_eq!(next.release.id, older.id);
        assert!(next.event.is_some());

        let same = next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, Some(&older.id))
            .unwrap()
            .unwrap();
        assert!(same.event.is_none());
    }

    #[test]
    fn running_head_blocks_queue() {
        let store = fixtures::seeded();
        let mut older = queued(&store, 60);
        queued(&store, 70);
        older.state = State::Running;
        store.put(&older).unwrap();

        assert!(next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .is_none());
    }

    fn scale_live_service(store: &circuit_state::StateStore, count: u32) {
        let mut service: Service = store.get(fixtures::SERVICE).unwrap().unwrap();
        service.count = count;
        store.put(&service).unwrap();
    }

    fn dispatched_replicas(startable: &Startable) -> Vec<i64> {
        let Some(event) = &startable.event else {
            panic!("expected a recomposed event");
        };
        let EventPayload::Release(payload) = &event.payload else {
            panic!("expected a release payload");
        };
        payload.services.iter().map(|s| s.replicas).collect()
    }

    #[test]
    fn queued_release_dispatches_its_own_snapshot() {
        let store = fixtures::seeded();
        let older = queued(&store, 60);
        queued(&store, 70);
        scale_live_service(&store, 5);

        let next = next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .unwrap();
        assert_eq!(next.release.id, older.id);
        assert_eq!(dispatched_replicas(&next), vec![1]);

        let Some(event) = &next.event else { unreachable!() };
        let EventPayload::Release(payload) = &event.payload else { unreachable!() };
        let created_at = payload
            .secrets
            .iter()
            .find(|s| s.key == "CODEAMP_CREATED_AT")
            .unwrap();
        assert_eq!(created_at.value, "2023-11-14T22:14:20Z");
    }

    #[test]
    fn queued_rollback_behind_running_release_keeps_frozen_config() {
        let store = fixtures::seeded();

        let mut original = queued(&store, 60);
        original.state = State::Complete;
        store.put(&original).unwrap();

        scale_live_service(&store, 5);
        let mut running = queued(&store, 70);
        let rollback = queued_from(&store, Some(&original.id), 80);
        assert!(rollback.is_rollback);

        running.state = State::Running;
        store.put(&running).unwrap();
        assert!(next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .is_none());

        running.state = State::Complete;
        store.put(&running).unwrap();
        let next = next_startable(&store, fixtures::PROJECT, fixtures::ENVIRONMENT, None)
            .unwrap()
            .unwrap();

        assert_eq!(next.release.id, rollback.id);
        assert_eq!(dispatched_replicas(&next), vec![1]);
        let Some(event) = &next.event else { unreachable!() };
        let EventPayload::Release(payload) = &event.payload else { unreachable!() };
        assert!(payload.is_rollback);
    }
}
