//! Cross-Account Credential Broker
//!
//! Resolves the role to assume for a target node and exchanges it for
//! temporary credentials through STS.
//!
//! - Partition comes from the caller's own ARN (`GetCallerIdentity`), so the
//!   same binary works in `aws`, `aws-us-gov` and `aws-cn`.
//! - Sessions are named after the invoking function so CloudTrail entries in
//!   the target account trace back to it.

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_sts::error::DisplayErrorContext;
use aws_sdk_sts::Client as StsClient;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info};

use crate::types::{NodeId, NodeKind, ScpError};

/// Role created in member accounts by Organizations account vending
pub const DEFAULT_ASSUME_ROLE_NAME: &str = "OrganizationAccountAccessRole";

/// Session name used when no function name is available
pub const DEFAULT_SESSION_NAME: &str = "replace-scp";

const MAX_SESSION_NAME_LEN: usize = 64;

/// Which role to assume before touching policies
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleSelection {
    /// Role name, combined with the partition and the target account id
    Name(String),
    /// Fully qualified role ARN, used as given
    Arn(String),
}

/// Temporary credentials for an assumed role session
#[derive(Clone)]
pub struct TemporaryCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: String,
    pub expires_at: Option<SystemTime>,
}

impl std::fmt::Debug for TemporaryCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TemporaryCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &"<redacted>")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Identity calls needed to assume a role
#[async_trait]
pub trait IdentityService: Send + Sync {
    /// ARN of the principal making the calls
    async fn caller_arn(&self) -> Result<String, ScpError>;

    /// Exchange a role ARN for temporary credentials
    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ScpError>;
}

#[async_trait]
impl<T: IdentityService + ?Sized> IdentityService for Arc<T> {
    async fn caller_arn(&self) -> Result<String, ScpError> {
        (**self).caller_arn().await
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ScpError> {
        (**self).assume_role(role_arn, session_name).await
    }
}

/// STS-backed identity service
pub struct StsIdentityService {
    client: StsClient,
}

impl StsIdentityService {
    pub fn new(sdk_config: &SdkConfig) -> Self {
        Self {
            client: StsClient::new(sdk_config),
        }
    }
}

#[async_trait]
impl IdentityService for StsIdentityService {
    async fn caller_arn(&self) -> Result<String, ScpError> {
        let out = self.client.get_caller_identity().send().await.map_err(|e| {
            ScpError::AssumeRole(format!("GetCallerIdentity failed: {}", DisplayErrorContext(&e)))
        })?;

        out.arn()
            .map(str::to_string)
            .ok_or_else(|| ScpError::AssumeRole("GetCallerIdentity returned no ARN".to_string()))
    }

    async fn assume_role(
        &self,
        role_arn: &str,
        session_name: &str,
    ) -> Result<TemporaryCredentials, ScpError> {
        let out = self
            .client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name)
            .send()
            .await
            .map_err(|e| {
                ScpError::AssumeRole(format!(
                    "AssumeRole {} failed: {}",
                    role_arn,
                    DisplayErrorContext(&e)
                ))
            })?;

        let creds = out.credentials().ok_or_else(|| {
            ScpError::AssumeRole(format!("AssumeRole {} returned no credentials", role_arn))
        })?;

        Ok(TemporaryCredentials {
            access_key_id: creds.access_key_id().to_string(),
            secret_access_key: creds.secret_access_key().to_string(),
            session_token: creds.session_token().to_string(),
            expires_at: SystemTime::try_from(*creds.expiration()).ok(),
        })
    }
}

/// Extract the partition segment from an ARN (`arn:<partition>:...`)
pub fn partition_from_arn(arn: &str) -> Result<&str, ScpError> {
    let mut parts = arn.split(':');
    match (parts.next(), parts.next()) {
        (Some("arn"), Some(partition)) if !partition.is_empty() => Ok(partition),
        _ => Err(ScpError::AssumeRole(format!("cannot read partition from ARN {:?}", arn))),
    }
}

/// Role ARN for a role name in the target account
pub fn role_arn(partition: &str, target: &NodeId, role_name: &str) -> Result<String, ScpError> {
    if target.kind() != NodeKind::Account {
        return Err(ScpError::AssumeRole(format!(
            "cannot assume role {} in {} {}: roles live in accounts",
            role_name,
            target.kind(),
            target
        )));
    }

    Ok(format!("arn:{}:iam::{}:role/{}", partition, target, role_name))
}

/// Session name derived from the invoking function's name.
///
/// Characters outside `[A-Za-z0-9+=,.@_-]` become `-` and the result is
/// capped at 64 characters.
pub fn session_name(function_name: &str) -> String {
    let sanitized: String = function_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || "+=,.@_-".contains(c) {
                c
            } else {
                '-'
            }
        })
        .take(MAX_SESSION_NAME_LEN)
        .collect();

    if sanitized.len() < 2 {
        DEFAULT_SESSION_NAME.to_string()
    } else {
        sanitized
    }
}

/// Assumes the configured role for a target node
pub struct CredentialBroker<I> {
    identity: I,
    role: RoleSelection,
    session_name: String,
}

impl<I: IdentityService> CredentialBroker<I> {
    pub fn new(identity: I, role: RoleSelection, session_name: impl Into<String>) -> Self {
        Self {
            identity,
            role,
            session_name: session_name.into(),
        }
    }

    /// Role ARN to assume for `target`
    pub async fn role_arn_for(&self, target: &NodeId) -> Result<String, ScpError> {
        match &self.role {
            RoleSelection::Arn(arn) => Ok(arn.clone()),
            RoleSelection::Name(name) => {
                let caller = self.identity.caller_arn().await?;
                let partition = partition_from_arn(&caller)?;
                debug!(caller = %caller, partition = %partition, "Resolved partition");
                role_arn(partition, target, name)
            }
        }
    }

    /// Assume the role for `target` and return the session credentials
    pub async fn acquire(&self, target: &NodeId) -> Result<TemporaryCredentials, ScpError> {
        let role_arn = self.role_arn_for(target).await?;
        let credentials = self
            .identity
            .assume_role(&role_arn, &self.session_name)
            .await?;

        info!(
            role_arn = %role_arn,
            session_name = %self.session_name,
            "Assumed role"
        );
        Ok(credentials)
    }
}
