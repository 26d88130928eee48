//! The storage contract the release pipeline is written against.
//!
//! Filtering is by predicate over typed records and ordering is by
//! creation time. That is the whole query surface the pipeline needs:
//! equality filters, "oldest/newest matching row", and single-table
//! batch writes.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::{StateError, StateResult};
use crate::tables::{self, RecordTable};
use crate::types::*;

/// A persisted domain type.
pub trait Record: Serialize + DeserializeOwned {
    const TABLE: RecordTable;
    /// Entity name for diagnostics (`Release`, `Project`, ...).
    const KIND: &'static str;

    fn id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
}

/// Filtered reads and writes over [`Record`] tables.
pub trait Repository: Send + Sync {
    fn get<T: Record>(&self, id: &str) -> StateResult<Option<T>>;

    /// Like [`get`](Repository::get), but a missing row is an error.
    fn require<T: Record>(&self, id: &str) -> StateResult<T> {
        self.get(id)?.ok_or_else(|| StateError::NotFound {
            kind: T::KIND,
            id: id.to_string(),
        })
    }

    /// Insert or replace.
    fn put<T: Record>(&self, record: &T) -> StateResult<()>;

    /// Insert or replace several records in one transaction.
    fn put_all<T: Record>(&self, records: &[T]) -> StateResult<()>;

    fn find<T: Record>(&self, filter: impl Fn(&T) -> bool) -> StateResult<Vec<T>>;

    /// Returns true if the record existed.
    fn delete<T: Record>(&self, id: &str) -> StateResult<bool>;

    /// Oldest matching record by creation time, then id.
    fn first<T: Record>(&self, filter: impl Fn(&T) -> bool) -> StateResult<Option<T>> {
        Ok(self.find(filter)?.into_iter().min_by(creation_order))
    }

    /// Newest matching record by creation time, then id.
    fn latest<T: Record>(&self, filter: impl Fn(&T) -> bool) -> StateResult<Option<T>> {
        Ok(self.find(filter)?.into_iter().max_by(creation_order))
    }
}

/// Total order over records: creation time, ties broken by id, so the
/// result never depends on the order a backend yields rows in.
pub fn creation_order<T: Record>(a: &T, b: &T) -> Ordering {
    a.created_at()
        .cmp(&b.created_at())
        .then_with(|| a.id().cmp(b.id()))
}

macro_rules! record {
    ($ty:ty, $table:ident, $kind:literal) => {
        impl Record for $ty {
            const TABLE: RecordTable = tables::$table;
            const KIND: &'static str = $kind;

            fn id(&self) -> &str {
                &self.id
            }

            fn created_at(&self) -> DateTime<Utc> {
                self.created_at
            }
        }
    };
}

record!(User, USERS, "User");
record!(Project, PROJECTS, "Project");
record!(Environment, ENVIRONMENTS, "Environment");
record!(ProjectEnvironment, PROJECT_ENVIRONMENTS, "ProjectEnvironment");
record!(ProjectSettings, PROJECT_SETTINGS, "ProjectSettings");
record!(Feature, FEATURES, "Feature");
record!(Extension, EXTENSIONS, "Extension");
record!(ProjectExtension, PROJECT_EXTENSIONS, "ProjectExtension");
record!(Secret, SECRETS, "Secret");
record!(SecretValue, SECRET_VALUES, "SecretValue");
record!(Service, SERVICES, "Service");
record!(ServicePort, SERVICE_PORTS, "ServicePort");
record!(ServiceSpec, SERVICE_SPECS, "ServiceSpec");
record!(DeploymentStrategy, DEPLOYMENT_STRATEGIES, "DeploymentStrategy");
record!(HealthProbe, HEALTH_PROBES, "HealthProbe");
record!(HttpHeader, HTTP_HEADERS, "HttpHeader");
record!(Release, RELEASES, "Release");
record!(ReleaseExtension, RELEASE_EXTENSIONS, "ReleaseExtension");

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn user(id: &str, secs: i64) -> User {
        User {
            id: id.to_string(),
            email: format!("{id}@checkr.com"),
            created_at: Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap(),
        }
    }

    #[test]
    fn creation_order_breaks_ties_by_id() {
        let mut users = vec![user("b", 5), user("c", 0), user("a", 5)];
        users.sort_by(creation_order);
        let ids: Vec<&str> = users.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }
}
