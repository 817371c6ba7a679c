//! SCP Replacer Library
//!
//! Replaces one AWS Organizations service control policy with another on an
//! account or organizational unit, either from an EventBridge-triggered
//! Lambda or from the command line.
//!
//! - [`event`]: resolve the target node from an Organizations event
//! - [`credentials`]: optional cross-account role assumption
//! - [`replacer`]: attach/detach ordering that never leaves a node without an SCP

pub mod config;
pub mod credentials;
pub mod event;
pub mod logging;
pub mod organizations;
pub mod replacer;
pub mod runner;
pub mod types;

pub use config::ReplaceConfig;
pub use credentials::{CredentialBroker, RoleSelection};
pub use event::{resolve_target, ResolutionMode};
pub use organizations::{ClientFactory, OrganizationsClient, PolicyClient, SdkClientFactory};
pub use replacer::{replace_scp, ExecutionMode, ReplaceOutcome};
pub use runner::ScpReplacementAgent;
pub use types::{NodeId, PolicyId, PolicyPair, ScpError};
