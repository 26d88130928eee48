//! circuit-core: shared building blocks for the Circuit release control plane.
//!
//! - **`auth`**: token claims and the hierarchical scope authorizer
//! - **`event`**: outbound event envelope and the `EventBus` seam
//! - **`wire`**: payloads handed to extensions (release, services, secrets)
//! - **`config`**: `circuit.toml` parsing
//! - **`types`**: state, action, and type enums shared by every crate

pub mod auth;
pub mod config;
pub mod event;
pub mod types;
pub mod wire;

pub use auth::{AllowAll, AuthError, Authorizer, Claims, ScopeAuthorizer};
pub use config::CircuitConfig;
pub use event::{ChannelBus, Event, EventBus, EventError, EventPayload};
pub use types::*;
