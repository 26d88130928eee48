//! Release lifecycle controller.
//!
//! Cancellation is cooperative: a stop marks the release canceled and
//! notifies only the extensions that have not started yet. Work already
//! running is left to finish.

use chrono::{DateTime, Utc};
use circuit_core::event::extension_channel;
use circuit_core::wire::{ReleaseExtensionPayload, ReleaseRef};
use circuit_core::{Action, Event, EventBus, EventPayload, State};
use circuit_state::{
    Environment, Extension, Project, ProjectExtension, Release, ReleaseExtension, Repository,
};
use tracing::{info, warn};

use crate::compose::project_payload;
use crate::error::{ReleaseError, ReleaseResult};
use crate::queue::{self, Startable};

pub const RUNNING_RELEASE: &str = "Running Release";
pub const COMPLETED: &str = "Completed";

fn load<R: Repository>(repo: &R, release_id: &str) -> ReleaseResult<Release> {
    repo.get::<Release>(release_id)?.ok_or_else(|| {
        warn!(release = %release_id, "release not found");
        ReleaseError::not_found("Release", release_id)
    })
}

/// Cancel a release on behalf of `email`.
///
/// Every extension lookup is resolved before anything is written, so a
/// dangling reference aborts the stop without side effects.
pub fn stop<R: Repository>(
    repo: &R,
    bus: &dyn EventBus,
    release_id: &str,
    email: &str,
) -> ReleaseResult<Release> {
    let mut release = load(repo, release_id)?;

    let release_extensions = repo.find::<ReleaseExtension>(|re| re.release_id == release_id)?;
    if release_extensions.is_empty() {
        warn!(release = %release_id, "no release extensions found");
        return Err(ReleaseError::NoReleaseExtensions {
            release_id: release_id.to_string(),
        });
    }

    let mut pending = Vec::new();
    for re in release_extensions {
        let pe = repo
            .get::<ProjectExtension>(&re.project_extension_id)?
            .ok_or_else(|| {
                warn!(release = %release_id, release_extension = %re.id, "project extension not found");
                ReleaseError::not_found("ProjectExtension", &re.project_extension_id)
            })?;
        let extension = repo.get::<Extension>(&pe.extension_id)?.ok_or_else(|| {
            warn!(release = %release_id, release_extension = %re.id, "extension not found");
            ReleaseError::not_found("Extension", &pe.extension_id)
        })?;
        if re.state == State::Waiting {
            pending.push((re, extension.key));
        }
    }

    let project = repo.get::<Project>(&release.project_id)?;
    let environment = repo
        .get::<Environment>(&release.environment_id)?
        .map(|e| e.key)
        .unwrap_or_default();

    release.state = State::Canceled;
    release.state_message = format!("Release canceled by {email}");
    repo.put(&release)?;

    let message = format!("Deployment Stopped By User {email}");
    let mut canceled = Vec::with_capacity(pending.len());
    let mut events = Vec::with_capacity(pending.len());
    for (mut re, key) in pending {
        re.state = State::Canceled;
        re.state_message = message.clone();
        let payload = ReleaseExtensionPayload {
            id: re.id.clone(),
            project: project.as_ref().map(project_payload).unwrap_or_default(),
            release: ReleaseRef {
                id: release.id.clone(),
            },
            environment: environment.clone(),
        };
        events.push(
            Event::new(
                extension_channel(&key),
                Action::Create,
                EventPayload::ReleaseExtension(payload),
            )
            .with_state(State::Canceled, message.clone()),
        );
        canceled.push(re);
    }
    repo.put_all(&canceled)?;

    for event in events {
        bus.publish(event)?;
    }

    info!(release = %release.id, by = %email, notified = canceled.len(), "release canceled");
    Ok(release)
}

/// The next startable release once `finished` has left the queue. The
/// transition is already committed, so a failure here is logged and
/// reported as "nothing to start".
fn next_after<R: Repository>(repo: &R, finished: &Release) -> Option<Startable> {
    queue::next_startable(repo, &finished.project_id, &finished.environment_id, None)
        .unwrap_or_else(|e| {
            warn!(release = %finished.id, error = %e, "could not resolve next queued release");
            None
        })
}

/// Mark a waiting release as running.
pub fn start<R: Repository>(repo: &R, release_id: &str, now: DateTime<Utc>) -> ReleaseResult<Release> {
    let mut release = load(repo, release_id)?;
    if release.state != State::Waiting {
        warn!(release = %release_id, state = %release.state, "release not waiting, not starting");
        return Ok(release);
    }

    release.state = State::Running;
    release.state_message = RUNNING_RELEASE.to_string();
    release.started = Some(now);
    repo.put(&release)?;

    info!(release = %release.id, "release started");
    Ok(release)
}

/// Record a successful release and return whatever is next in its queue.
pub fn complete<R: Repository>(
    repo: &R,
    release_id: &str,
    now: DateTime<Utc>,
) -> ReleaseResult<Option<Startable>> {
    let mut release = load(repo, release_id)?;
    if release.state == State::Canceled {
        info!(release = %release.id, "release was canceled, not marking complete");
    } else {
        release.state = State::Complete;
        release.state_message = COMPLETED.to_string();
        release.finished = Some(now);
        release.redeployable = true;
        repo.put(&release)?;
        info!(release = %release.id, "release completed");
    }

    Ok(next_after(repo, &release))
}

/// Record a failed release, fail its unfinished extension work and return
/// whatever is next in its queue.
pub fn fail<R: Repository>(
    repo: &R,
    release_id: &str,
    message: &str,
    now: DateTime<Utc>,
) -> ReleaseResult<Option<Startable>> {
    let mut release = load(repo, release_id)?;
    release.state = State::Failed;
    release.state_message = message.to_string();
    release.finished = Some(now);
    repo.put(&release)?;

    let unfinished: Vec<ReleaseExtension> = repo
        .find::<ReleaseExtension>(|re| re.release_id == release_id && re.state != State::Complete)?
        .into_iter()
        .map(|mut re| {
            re.state = State::Failed;
            re.state_message = message.to_string();
            re.finished = Some(now);
            re
        })
        .collect();
    repo.put_all(&unfinished)?;

    warn!(release = %release.id, failed_extensions = unfinished.len(), %message, "release failed");
    Ok(next_after(repo, &release))
}
