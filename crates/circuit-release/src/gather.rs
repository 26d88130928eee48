//! Configuration snapshot gatherer.
//!
//! Reads the live configuration of a (project, environment) pair: the
//! services that will be deployed, the secrets they see, and the
//! extensions that will run. Every list comes back in a deterministic
//! order so that two gathers over unchanged rows hash identically.

use circuit_core::{SecretScope, State};
use circuit_state::{
    DeploymentStrategy, Extension, HealthProbe, HttpHeader, ProbeKind, ProjectExtension,
    Repository, Secret, SecretValue, Service, ServicePort, ServiceSpec,
};
use tracing::{debug, warn};

use crate::error::{ReleaseError, ReleaseResult};

/// Read-only view over the repository for one release request.
pub struct Gatherer<'a, R> {
    repo: &'a R,
}

impl<'a, R: Repository> Gatherer<'a, R> {
    pub fn new(repo: &'a R) -> Self {
        Self { repo }
    }

    /// All services for the pair, hydrated with ports, deployment
    /// strategy, health probes and resource spec, ordered by name.
    pub fn services(&self, project_id: &str, environment_id: &str) -> ReleaseResult<Vec<Service>> {
        let mut services = self.repo.find::<Service>(|s| {
            s.project_id == project_id && s.environment_id == environment_id
        })?;

        if services.is_empty() {
            warn!(project = %project_id, environment = %environment_id, "no services found");
            return Err(ReleaseError::NoServices);
        }

        for service in &mut services {
            self.hydrate(service)?;
        }
        services.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));

        debug!(project = %project_id, count = services.len(), "services gathered");
        Ok(services)
    }

    fn hydrate(&self, service: &mut Service) -> ReleaseResult<()> {
        let mut ports = self
            .repo
            .find::<ServicePort>(|p| p.service_id == service.id)?;
        ports.sort_by(|a, b| a.port.cmp(&b.port).then_with(|| a.protocol.cmp(&b.protocol)));
        service.ports = ports;

        service.deployment_strategy = self
            .repo
            .latest::<DeploymentStrategy>(|d| d.service_id == service.id)?;
        service.readiness_probe = self.probe(&service.id, ProbeKind::ReadinessProbe)?;
        service.liveness_probe = self.probe(&service.id, ProbeKind::LivenessProbe)?;

        let spec = self
            .repo
            .get::<ServiceSpec>(&service.service_spec_id)?
            .ok_or_else(|| {
                warn!(service = %service.id, spec = %service.service_spec_id, "service spec not found");
                ReleaseError::not_found("ServiceSpec", &service.service_spec_id)
            })?;
        service.spec = Some(spec);
        Ok(())
    }

    fn probe(&self, service_id: &str, kind: ProbeKind) -> ReleaseResult<Option<HealthProbe>> {
        let Some(mut probe) = self
            .repo
            .latest::<HealthProbe>(|p| p.service_id == service_id && p.kind == kind)?
        else {
            return Ok(None);
        };

        let mut headers = self
            .repo
            .find::<HttpHeader>(|h| h.health_probe_id == probe.id)?;
        headers.sort_by(|a, b| a.name.cmp(&b.name));
        probe.http_headers = headers;
        Ok(Some(probe))
    }

    /// Secrets visible to the pair: project-scoped secrets of this project
    /// first, then global ones, each resolved to its newest value.
    pub fn secrets(&self, project_id: &str, environment_id: &str) -> ReleaseResult<Vec<Secret>> {
        let mut project = self.repo.find::<Secret>(|s| {
            s.environment_id == environment_id
                && s.scope == SecretScope::Project
                && s.project_id.as_deref() == Some(project_id)
        })?;
        let mut global = self.repo.find::<Secret>(|s| {
            s.environment_id == environment_id && s.scope == SecretScope::Global
        })?;
        project.sort_by(|a, b| a.key.cmp(&b.key));
        global.sort_by(|a, b| a.key.cmp(&b.key));

        let mut secrets = project;
        secrets.append(&mut global);
        for secret in &mut secrets {
            secret.value = self
                .repo
                .latest::<SecretValue>(|v| v.secret_id == secret.id)?
                .unwrap_or_default();
        }

        debug!(project = %project_id, count = secrets.len(), "secrets gathered");
        Ok(secrets)
    }

    /// Installed extensions in `complete` state, ordered workflow first,
    /// then deployment, then everything else, ties broken by key.
    pub fn extensions(
        &self,
        project_id: &str,
        environment_id: &str,
    ) -> ReleaseResult<Vec<ProjectExtension>> {
        let installed = self.repo.find::<ProjectExtension>(|pe| {
            pe.project_id == project_id
                && pe.environment_id == environment_id
                && pe.state == State::Complete
        })?;

        let mut ranked = Vec::with_capacity(installed.len());
        for pe in installed {
            let extension = self.repo.get::<Extension>(&pe.extension_id)?.ok_or_else(|| {
                warn!(extension = %pe.extension_id, "extension spec not found");
                ReleaseError::not_found("extension spec", &pe.extension_id)
            })?;
            ranked.push(((extension.extension_type.rank(), extension.key), pe));
        }

        if ranked.is_empty() {
            warn!(project = %project_id, environment = %environment_id, "project has no extensions");
            return Err(ReleaseError::NoProjectExtensions);
        }

        ranked.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(ranked.into_iter().map(|(_, pe)| pe).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, at};
    use circuit_core::ExtensionType;
    use circuit_state::StateStore;

    #[test]
    fn services_are_hydrated() {
        let store = fixtures::seeded();
        store
            .put(&HealthProbe {
                id: "hp-1".to_string(),
                service_id: fixtures::SERVICE.to_string(),
                kind: ProbeKind::ReadinessProbe,
                method: "http".to_string(),
                command: String::new(),
                port: 8080,
                scheme: "HTTP".to_string(),
                path: "/healthz".to_string(),
                initial_delay_seconds: 5,
                period_seconds: 10,
                timeout_seconds: 1,
                success_threshold: 1,
                failure_threshold: 3,
                http_headers: Vec::new(),
                created_at: at(0),
            })
            .unwrap();
        store
            .put(&HttpHeader {
                id: "h-1".to_string(),
                health_probe_id: "hp-1".to_string(),
                name: "X-Probe".to_string(),
                value: "1".to_string(),
                created_at: at(0),
            })
            .unwrap();

        let services = Gatherer::new(&store)
            .services(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap();

        assert_eq!(services.len(), 1);
        let svc = &services[0];
        assert_eq!(svc.ports.len(), 1);
        assert_eq!(svc.spec.as_ref().unwrap().cpu_request, "100");
        let readiness = svc.readiness_probe.as_ref().unwrap();
        assert_eq!(readiness.http_headers[0].name, "X-Probe");
        assert!(svc.liveness_probe.is_none());
    }

    #[test]
    fn no_services_is_an_error() {
        let store = fixtures::seeded();
        store.delete::<Service>(fixtures::SERVICE).unwrap();

        let err = Gatherer::new(&store)
            .services(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NoServices));
        assert_eq!(err.to_string(), "No services found");
    }

    #[test]
    fn missing_service_spec_is_named() {
        let store = fixtures::seeded();
        store.delete::<ServiceSpec>("ss-1").unwrap();

        let err = Gatherer::new(&store)
            .services(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap_err();
        assert_eq!(err.to_string(), "ServiceSpec not found");
    }

    #[test]
    fn secrets_take_newest_value_and_include_globals() {
        let store = fixtures::seeded();
        store
            .put(&SecretValue {
                id: "sv-2".to_string(),
                secret_id: "s-1".to_string(),
                value: "postgres://new".to_string(),
                user_id: fixtures::USER.to_string(),
                created_at: at(100),
            })
            .unwrap();
        store
            .put(&fixtures::secret("s-g", "LOG_LEVEL", SecretScope::Global, None))
            .unwrap();
        // Another project's secret must stay invisible.
        store
            .put(&fixtures::secret(
                "s-x",
                "OTHER",
                SecretScope::Project,
                Some("p-other"),
            ))
            .unwrap();

        let secrets = Gatherer::new(&store)
            .secrets(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap();

        let keys: Vec<&str> = secrets.iter().map(|s| s.key.as_str()).collect();
        assert_eq!(keys, vec!["DATABASE_URL", "LOG_LEVEL"]);
        assert_eq!(secrets[0].value.value, "postgres://new");
        assert_eq!(secrets[1].value, SecretValue::default());
    }

    #[test]
    fn extensions_filtered_and_ordered() {
        let store = fixtures::seeded();
        store
            .put(&fixtures::extension("x-dep", ExtensionType::Deployment, "kubernetes"))
            .unwrap();
        store
            .put(&fixtures::extension("x-note", ExtensionType::Notification, "slack"))
            .unwrap();
        store
            .put(&fixtures::extension("x-wf2", ExtensionType::Workflow, "a-builder"))
            .unwrap();
        store
            .put_all(&[
                fixtures::project_extension("pe-note", "x-note", State::Complete),
                fixtures::project_extension("pe-dep", "x-dep", State::Complete),
                fixtures::project_extension("pe-wf2", "x-wf2", State::Complete),
                fixtures::project_extension("pe-failed", "x-dep", State::Failed),
            ])
            .unwrap();

        let ordered = Gatherer::new(&store)
            .extensions(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap();

        let ids: Vec<&str> = ordered.iter().map(|pe| pe.id.as_str()).collect();
        assert_eq!(ids, vec!["pe-wf2", "pe-1", "pe-dep", "pe-note"]);
    }

    #[test]
    fn no_complete_extensions_is_an_error() {
        let store = fixtures::seeded();
        let mut pe: ProjectExtension = store.require("pe-1").unwrap();
        pe.state = State::Waiting;
        store.put(&pe).unwrap();

        let err = Gatherer::new(&store)
            .extensions(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap_err();
        assert!(matches!(err, ReleaseError::NoProjectExtensions));
    }

    #[test]
    fn dangling_extension_reference_fails() {
        let store = StateStore::open_in_memory().unwrap();
        store
            .put(&fixtures::project_extension("pe-1", "x-gone", State::Complete))
            .unwrap();

        let err = Gatherer::new(&store)
            .extensions(fixtures::PROJECT, fixtures::ENVIRONMENT)
            .unwrap_err();
        assert_eq!(err.to_string(), "extension spec not found");
    }
}
