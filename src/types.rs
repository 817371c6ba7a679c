//! Types for service control policy replacement
//!
//! Identifiers, attachment snapshots and the error taxonomy shared by the
//! resolver, the credential broker and the replacer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of node in the organization hierarchy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Account,
    OrganizationalUnit,
    Root,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Account => write!(f, "account"),
            NodeKind::OrganizationalUnit => write!(f, "organizational_unit"),
            NodeKind::Root => write!(f, "root"),
        }
    }
}

/// Account, OU or root id that policies are attached to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct NodeId {
    value: String,
    kind: NodeKind,
}

impl NodeId {
    /// Parse a target id.
    ///
    /// Accepts a 12-digit account id, `ou-<root>-<suffix>` or `r-<suffix>`,
    /// matching what Organizations accepts as a `TargetId`.
    pub fn parse(raw: &str) -> Result<Self, ScpError> {
        let value = raw.trim();
        let kind = classify_node(value).ok_or_else(|| ScpError::InvalidTargetId(raw.to_string()))?;

        Ok(Self {
            value: value.to_string(),
            kind,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.value
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.value)
    }
}

impl TryFrom<String> for NodeId {
    type Error = ScpError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<NodeId> for String {
    fn from(id: NodeId) -> Self {
        id.value
    }
}

fn classify_node(value: &str) -> Option<NodeKind> {
    let is_segment = |s: &str, min: usize, max: usize| {
        (min..=max).contains(&s.len())
            && s.chars().all(|c| c.is_ascii_digit() || c.is_ascii_lowercase())
    };

    if value.len() == 12 && value.chars().all(|c| c.is_ascii_digit()) {
        return Some(NodeKind::Account);
    }

    if let Some(rest) = value.strip_prefix("ou-") {
        let (root, suffix) = rest.split_once('-')?;
        return (is_segment(root, 4, 32) && is_segment(suffix, 8, 32))
            .then_some(NodeKind::OrganizationalUnit);
    }

    if let Some(rest) = value.strip_prefix("r-") {
        return is_segment(rest, 4, 32).then_some(NodeKind::Root);
    }

    None
}

/// Opaque policy id supplied by the operator
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyId(String);

impl PolicyId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ScpError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ScpError::Config("policy id must not be empty".to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PolicyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The policy to attach and the policy it replaces
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyPair {
    pub attach: PolicyId,
    pub detach: PolicyId,
}

impl PolicyPair {
    pub fn new(attach: PolicyId, detach: PolicyId) -> Result<Self, ScpError> {
        if attach == detach {
            return Err(ScpError::Config(format!(
                "attach and detach policy ids are both {}",
                attach
            )));
        }
        Ok(Self { attach, detach })
    }
}

/// A policy currently attached to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachedPolicy {
    pub id: PolicyId,
    pub name: Option<String>,
}

/// Service control policies attached to a node at one point in time
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSnapshot {
    pub policies: Vec<AttachedPolicy>,
}

impl AttachmentSnapshot {
    pub fn new(policies: Vec<AttachedPolicy>) -> Self {
        Self { policies }
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn contains(&self, id: &PolicyId) -> bool {
        self.policies.iter().any(|p| &p.id == id)
    }

    pub fn ids(&self) -> Vec<&str> {
        self.policies.iter().map(|p| p.id.as_str()).collect()
    }
}

/// Organizations call that produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyOperation {
    List,
    Attach,
    Detach,
}

impl std::fmt::Display for PolicyOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyOperation::List => write!(f, "ListPoliciesForTarget"),
            PolicyOperation::Attach => write!(f, "AttachPolicy"),
            PolicyOperation::Detach => write!(f, "DetachPolicy"),
        }
    }
}

/// Error code returned when attaching a policy that is already attached
pub const DUPLICATE_ATTACHMENT_CODE: &str = "DuplicatePolicyAttachmentException";

/// Error code returned when detaching a policy that is not attached
pub const NOT_ATTACHED_CODE: &str = "PolicyNotAttachedException";

/// Rejection from the policy management API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyApiError {
    pub operation: PolicyOperation,
    pub target: String,
    pub policy: Option<String>,
    pub code: Option<String>,
    pub message: String,
}

impl PolicyApiError {
    /// True when the rejection means the requested state already holds.
    pub fn is_already_done(&self) -> bool {
        match (self.operation, self.code.as_deref()) {
            (PolicyOperation::Attach, Some(DUPLICATE_ATTACHMENT_CODE)) => true,
            (PolicyOperation::Detach, Some(NOT_ATTACHED_CODE)) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for PolicyApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} on {}", self.operation, self.target)?;
        if let Some(policy) = &self.policy {
            write!(f, " (policy {})", policy)?;
        }
        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Errors that can occur while replacing a policy
#[derive(Debug, Error)]
pub enum ScpError {
    /// Event name has no extraction rule
    #[error("Unsupported event kind: {0}")]
    UnsupportedEventKind(String),

    /// Supported event without the expected id field
    #[error("{kind} event is missing {path}")]
    MissingEventField { kind: String, path: &'static str },

    /// Target id is not an account, OU or root id
    #[error("Invalid target id: {0:?}")]
    InvalidTargetId(String),

    /// Identity lookup or role assumption failed
    #[error("Assume role failed: {0}")]
    AssumeRole(String),

    /// Organizations rejected a list, attach or detach call
    #[error("Policy operation failed: {0}")]
    PolicyOperation(PolicyApiError),

    /// Missing or inconsistent configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_id_kinds() {
        assert_eq!(NodeId::parse("111122223333").unwrap().kind(), NodeKind::Account);
        assert_eq!(
            NodeId::parse("ou-ab12-cdef5678").unwrap().kind(),
            NodeKind::OrganizationalUnit
        );
        assert_eq!(NodeId::parse("r-ab12").unwrap().kind(), NodeKind::Root);
    }

    #[test]
    fn test_node_id_trims_whitespace() {
        let id = NodeId::parse(" 111122223333\n").unwrap();
        assert_eq!(id.as_str(), "111122223333");
    }

    #[test]
    fn test_node_id_rejects_malformed() {
        for raw in ["", "12345", "1111222233334", "ou-AB12-cdef5678", "ou-ab12", "r-ab", "p-abcdefgh"] {
            assert!(
                matches!(NodeId::parse(raw), Err(ScpError::InvalidTargetId(_))),
                "expected {:?} to be rejected",
                raw
            );
        }
    }

    #[test]
    fn test_policy_pair_rejects_identical_ids() {
        let a = PolicyId::new("p-same1234").unwrap();
        let err = PolicyPair::new(a.clone(), a).unwrap_err();
        assert!(matches!(err, ScpError::Config(_)));
    }

    #[test]
    fn test_policy_id_rejects_blank() {
        assert!(PolicyId::new("   ").is_err());
        assert_eq!(PolicyId::new(" P-NEW ").unwrap().as_str(), "P-NEW");
    }

    #[test]
    fn test_snapshot_contains() {
        let snapshot = AttachmentSnapshot::new(vec![AttachedPolicy {
            id: PolicyId::new("P-OLD").unwrap(),
            name: Some("FullAWSAccess".to_string()),
        }]);

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot.contains(&PolicyId::new("P-OLD").unwrap()));
        assert!(!snapshot.contains(&PolicyId::new("P-NEW").unwrap()));
    }

    #[test]
    fn test_already_done_codes() {
        let mut err = PolicyApiError {
            operation: PolicyOperation::Attach,
            target: "111122223333".to_string(),
            policy: Some("P-NEW".to_string()),
            code: Some(DUPLICATE_ATTACHMENT_CODE.to_string()),
            message: "already attached".to_string(),
        };
        assert!(err.is_already_done());

        err.operation = PolicyOperation::Detach;
        assert!(!err.is_already_done());

        err.code = Some(NOT_ATTACHED_CODE.to_string());
        assert!(err.is_already_done());

        err.code = Some("ConstraintViolationException".to_string());
        assert!(!err.is_already_done());
    }

    #[test]
    fn test_policy_api_error_display() {
        let err = PolicyApiError {
            operation: PolicyOperation::Detach,
            target: "111122223333".to_string(),
            policy: Some("P-OLD".to_string()),
            code: Some("ConstraintViolationException".to_string()),
            message: "cannot detach the last policy".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "DetachPolicy on 111122223333 (policy P-OLD) [ConstraintViolationException]: cannot detach the last policy"
        );
    }
}
