//! SCP Replacement Agent
//!
//! Wires configuration, target resolution, the optional credential broker and
//! the replacer together for one invocation.

use aws_config::{BehaviorVersion, SdkConfig};
use serde_json::Value;
use tracing::{debug, info};

use crate::config::ReplaceConfig;
use crate::credentials::{CredentialBroker, IdentityService, StsIdentityService};
use crate::event::resolve_target;
use crate::organizations::{ClientFactory, PolicyClient, SdkClientFactory};
use crate::replacer::{replace_scp, ExecutionMode, ReplaceOutcome};
use crate::types::{NodeId, ScpError};

/// Replaces the configured SCP on targets named by CLI arguments or events.
///
/// Clients are built per target: from ambient credentials, or from a session
/// assumed through the broker when a role is configured.
pub struct ScpReplacementAgent<F = SdkClientFactory, I = StsIdentityService> {
    clients: F,
    broker: Option<CredentialBroker<I>>,
    config: ReplaceConfig,
}

impl ScpReplacementAgent {
    /// Create an agent using the default AWS credential chain and region
    pub async fn new(config: ReplaceConfig) -> Self {
        let sdk_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
        Self::with_sdk_config(sdk_config, config)
    }

    pub fn with_sdk_config(sdk_config: SdkConfig, config: ReplaceConfig) -> Self {
        let identity = StsIdentityService::new(&sdk_config);
        Self::with_clients(SdkClientFactory::new(sdk_config), identity, config)
    }
}

impl<F, I> ScpReplacementAgent<F, I>
where
    F: ClientFactory,
    I: IdentityService,
{
    /// Create an agent from explicit client sources
    pub fn with_clients(clients: F, identity: I, config: ReplaceConfig) -> Self {
        info!(
            attach = %config.policies.attach,
            detach = %config.policies.detach,
            dry_run = config.dry_run,
            assume_role = config.assume_role.is_some(),
            "SCP replacement agent initialized"
        );

        let broker = config
            .assume_role
            .clone()
            .map(|role| CredentialBroker::new(identity, role, config.session_name.clone()));

        Self {
            clients,
            broker,
            config,
        }
    }

    pub fn config(&self) -> &ReplaceConfig {
        &self.config
    }

    /// Resolve the target from an event and replace the SCP on it
    pub async fn handle_event(&self, event: &Value) -> Result<ReplaceOutcome, ScpError> {
        let target = resolve_target(event, self.config.resolution)?;
        self.replace(&target).await
    }

    /// Replace the SCP on `target`
    pub async fn replace(&self, target: &NodeId) -> Result<ReplaceOutcome, ScpError> {
        let client = self.policy_client(target).await?;
        execute(&client, &self.config, target).await
    }

    /// Organizations client for `target`, assuming a role first when configured
    async fn policy_client(&self, target: &NodeId) -> Result<F::Client, ScpError> {
        let Some(broker) = &self.broker else {
            debug!("Using ambient credentials for Organizations");
            return Ok(self.clients.ambient());
        };

        let credentials = broker.acquire(target).await?;
        Ok(self.clients.scoped(&credentials))
    }
}

/// Run the replacement for `target` with an already-built client
pub async fn execute<C>(
    client: &C,
    config: &ReplaceConfig,
    target: &NodeId,
) -> Result<ReplaceOutcome, ScpError>
where
    C: PolicyClient + ?Sized,
{
    let outcome = replace_scp(
        client,
        target,
        &config.policies,
        ExecutionMode::from_dry_run(config.dry_run),
    )
    .await?;

    if outcome.dry_run {
        info!(node = %target, "Dry run complete, no policies changed");
    } else {
        info!(
            node = %target,
            attached = %config.policies.attach,
            detached = %config.policies.detach,
            "SCP replaced"
        );
    }
    Ok(outcome)
}
