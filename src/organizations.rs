//! AWS Organizations Policy Client
//!
//! Trait-based abstraction over the three Organizations calls the replacer
//! needs, with an implementation on top of `aws-sdk-organizations`.

use async_trait::async_trait;
use aws_config::SdkConfig;
use std::sync::Arc;
use aws_sdk_organizations::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_organizations::types::PolicyType;
use aws_sdk_organizations::Client;
use tracing::debug;

use crate::credentials::TemporaryCredentials;
use crate::types::{
    AttachedPolicy, AttachmentSnapshot, NodeId, PolicyApiError, PolicyId, PolicyOperation,
    ScpError,
};

/// Provider name recorded on credentials obtained through role assumption
const ASSUMED_ROLE_PROVIDER: &str = "scp-replacer-assume-role";

/// Policy management calls against an organization
#[async_trait]
pub trait PolicyClient: Send + Sync {
    /// List the service control policies attached directly to a node
    async fn list_policies_for_target(&self, target: &NodeId)
        -> Result<AttachmentSnapshot, ScpError>;

    /// Attach a policy to a node
    async fn attach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError>;

    /// Detach a policy from a node
    async fn detach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError>;
}

/// Organizations client backed by the AWS SDK
#[derive(Debug, Clone)]
pub struct OrganizationsClient {
    client: Client,
}

impl OrganizationsClient {
    /// Client using the ambient credentials of the process
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: Client::new(sdk_config),
        }
    }

    /// Client bound to temporary credentials from an assumed role
    pub fn with_credentials(sdk_config: &SdkConfig, credentials: &TemporaryCredentials) -> Self {
        let provider = aws_sdk_organizations::config::Credentials::new(
            credentials.access_key_id.clone(),
            credentials.secret_access_key.clone(),
            Some(credentials.session_token.clone()),
            credentials.expires_at,
            ASSUMED_ROLE_PROVIDER,
        );

        let config = aws_sdk_organizations::config::Builder::from(sdk_config)
            .credentials_provider(provider)
            .build();

        Self::from_conf(config)
    }

    /// Client from a fully built service config
    pub fn from_conf(config: aws_sdk_organizations::Config) -> Self {
        Self {
            client: Client::from_conf(config),
        }
    }
}

/// Builds policy clients for ambient or assumed-role credentials
pub trait ClientFactory: Send + Sync {
    type Client: PolicyClient;

    /// Client using the process's own credentials
    fn ambient(&self) -> Self::Client;

    /// Client bound to an assumed role session
    fn scoped(&self, credentials: &TemporaryCredentials) -> Self::Client;
}

/// Factory producing SDK-backed clients from one shared AWS config
#[derive(Debug, Clone)]
pub struct SdkClientFactory {
    sdk_config: SdkConfig,
}

impl SdkClientFactory {
    pub fn new(sdk_config: SdkConfig) -> Self {
        Self { sdk_config }
    }
}

impl ClientFactory for SdkClientFactory {
    type Client = OrganizationsClient;

    fn ambient(&self) -> OrganizationsClient {
        OrganizationsClient::new(&self.sdk_config)
    }

    fn scoped(&self, credentials: &TemporaryCredentials) -> OrganizationsClient {
        OrganizationsClient::with_credentials(&self.sdk_config, credentials)
    }
}

fn api_error<E>(
    operation: PolicyOperation,
    target: &NodeId,
    policy: Option<&PolicyId>,
    err: E,
) -> ScpError
where
    E: ProvideErrorMetadata + std::error::Error,
{
    let code = err.code().map(str::to_string);
    let message = err
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| DisplayErrorContext(&err).to_string());

    ScpError::PolicyOperation(PolicyApiError {
        operation,
        target: target.to_string(),
        policy: policy.map(PolicyId::to_string),
        code,
        message,
    })
}

#[async_trait]
impl PolicyClient for OrganizationsClient {
    async fn list_policies_for_target(
        &self,
        target: &NodeId,
    ) -> Result<AttachmentSnapshot, ScpError> {
        let mut policies = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let page = self
                .client
                .list_policies_for_target()
                .target_id(target.as_str())
                .filter(PolicyType::ServiceControlPolicy)
                .set_next_token(next_token.take())
                .send()
                .await
                .map_err(|e| api_error(PolicyOperation::List, target, None, e))?;

            for summary in page.policies() {
                if let Some(id) = summary.id() {
                    policies.push(AttachedPolicy {
                        id: PolicyId::new(id)?,
                        name: summary.name().map(str::to_string),
                    });
                }
            }

            match page.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        debug!(node = %target, count = policies.len(), "Listed attached SCPs");
        Ok(AttachmentSnapshot::new(policies))
    }

    async fn attach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError> {
        self.client
            .attach_policy()
            .policy_id(policy.as_str())
            .target_id(target.as_str())
            .send()
            .await
            .map_err(|e| api_error(PolicyOperation::Attach, target, Some(policy), e))?;
        Ok(())
    }

    async fn detach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError> {
        self.client
            .detach_policy()
            .policy_id(policy.as_str())
            .target_id(target.as_str())
            .send()
            .await
            .map_err(|e| api_error(PolicyOperation::Detach, target, Some(policy), e))?;
        Ok(())
    }
}

#[async_trait]
impl<T: PolicyClient + ?Sized> PolicyClient for Arc<T> {
    async fn list_policies_for_target(
        &self,
        target: &NodeId,
    ) -> Result<AttachmentSnapshot, ScpError> {
        (**self).list_policies_for_target(target).await
    }

    async fn attach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError> {
        (**self).attach_policy(policy, target).await
    }

    async fn detach_policy(&self, policy: &PolicyId, target: &NodeId) -> Result<(), ScpError> {
        (**self).detach_policy(policy, target).await
    }
}
