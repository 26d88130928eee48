//! Shared enums used across Circuit crates.

use serde::{Deserialize, Serialize};

/// Lifecycle state of a release, a release extension, or an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Waiting,
    Running,
    Complete,
    Canceled,
    Failed,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Waiting => "waiting",
            State::Running => "running",
            State::Complete => "complete",
            State::Canceled => "canceled",
            State::Failed => "failed",
        }
    }

    /// True for states that no further transition leaves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, State::Complete | State::Canceled | State::Failed)
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verb attached to an outbound event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    Delete,
    Status,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Create => "create",
            Action::Update => "update",
            Action::Delete => "delete",
            Action::Status => "status",
        }
    }
}

/// Kind of an installable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionType {
    Workflow,
    Deployment,
    Notification,
    Once,
}

impl ExtensionType {
    /// Dispatch precedence: workflow < deployment < everything else.
    pub fn rank(&self) -> u8 {
        match self {
            ExtensionType::Workflow => 0,
            ExtensionType::Deployment => 1,
            _ => 2,
        }
    }
}

/// How a secret is delivered to the workload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretType {
    Env,
    File,
    Build,
}

/// Visibility of a secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecretScope {
    Project,
    Global,
    Extension,
}
