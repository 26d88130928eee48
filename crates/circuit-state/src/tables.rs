//! redb table definitions for the Circuit state store.
//!
//! Each table uses `&str` keys (record ids) and `&[u8]` values
//! (JSON-serialized domain types).

use redb::TableDefinition;

pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;

pub const USERS: RecordTable = TableDefinition::new("users");
pub const PROJECTS: RecordTable = TableDefinition::new("projects");
pub const ENVIRONMENTS: RecordTable = TableDefinition::new("environments");
pub const PROJECT_ENVIRONMENTS: RecordTable = TableDefinition::new("project_environments");
pub const PROJECT_SETTINGS: RecordTable = TableDefinition::new("project_settings");
pub const FEATURES: RecordTable = TableDefinition::new("features");
pub const EXTENSIONS: RecordTable = TableDefinition::new("extensions");
pub const PROJECT_EXTENSIONS: RecordTable = TableDefinition::new("project_extensions");
pub const SECRETS: RecordTable = TableDefinition::new("secrets");
pub const SECRET_VALUES: RecordTable = TableDefinition::new("secret_values");
pub const SERVICES: RecordTable = TableDefinition::new("services");
pub const SERVICE_PORTS: RecordTable = TableDefinition::new("service_ports");
pub const SERVICE_SPECS: RecordTable = TableDefinition::new("service_specs");
pub const DEPLOYMENT_STRATEGIES: RecordTable = TableDefinition::new("deployment_strategies");
pub const HEALTH_PROBES: RecordTable = TableDefinition::new("health_probes");
pub const HTTP_HEADERS: RecordTable = TableDefinition::new("health_probe_http_headers");
pub const RELEASES: RecordTable = TableDefinition::new("releases");
pub const RELEASE_EXTENSIONS: RecordTable = TableDefinition::new("release_extensions");

/// Every table, created on open.
pub const ALL_TABLES: [RecordTable; 18] = [
    USERS,
    PROJECTS,
    ENVIRONMENTS,
    PROJECT_ENVIRONMENTS,
    PROJECT_SETTINGS,
    FEATURES,
    EXTENSIONS,
    PROJECT_EXTENSIONS,
    SECRETS,
    SECRET_VALUES,
    SERVICES,
    SERVICE_PORTS,
    SERVICE_SPECS,
    DEPLOYMENT_STRATEGIES,
    HEALTH_PROBES,
    HTTP_HEADERS,
    RELEASES,
    RELEASE_EXTENSIONS,
];
