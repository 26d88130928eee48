//! Synthetic environment variables stamped into every fresh release.
//!
//! They live only inside the release's secrets snapshot and are never
//! written as standalone `Secret` rows.

use chrono::{DateTime, SecondsFormat, Utc};
use circuit_core::{SecretScope, SecretType};
use circuit_state::{Feature, Project, Secret, SecretValue};

/// Current prefix first, then the legacy alias kept for older workloads.
const PREFIXES: [&str; 2] = ["CODEAMP", "CODEFLOW"];

/// Length of the abbreviated commit hash.
const SHORT_HASH_LEN: usize = 7;

pub fn short_hash(hash: &str) -> String {
    hash.chars().take(SHORT_HASH_LEN).collect()
}

/// Append `<PREFIX>_SLUG`, `<PREFIX>_HASH` and `<PREFIX>_CREATED_AT` for
/// both prefixes.
pub fn inject(
    secrets: &mut Vec<Secret>,
    project: &Project,
    environment_id: &str,
    head_feature: &Feature,
    created_at: DateTime<Utc>,
) {
    let hash = short_hash(&head_feature.hash);
    let stamp = created_at.to_rfc3339_opts(SecondsFormat::Secs, true);

    for prefix in PREFIXES {
        for (name, value) in [("SLUG", &project.slug), ("HASH", &hash), ("CREATED_AT", &stamp)] {
            secrets.push(synthetic(
                format!("{prefix}_{name}"),
                value.clone(),
                project,
                environment_id,
                created_at,
            ));
        }
    }
}

fn synthetic(
    key: String,
    value: String,
    project: &Project,
    environment_id: &str,
    created_at: DateTime<Utc>,
) -> Secret {
    Secret {
        id: String::new(),
        key,
        value: SecretValue {
            value,
            created_at,
            ..SecretValue::default()
        },
        secret_type: SecretType::Env,
        project_id: Some(project.id.clone()),
        scope: SecretScope::Project,
        environment_id: environment_id.to_string(),
        is_secret: false,
        created_at,
    }
}
