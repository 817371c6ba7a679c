//! Target Resolution
//!
//! Extracts the node to operate on from an EventBridge notification for an
//! Organizations CloudTrail event.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::{NodeId, ScpError};

const EVENT_NAME_POINTER: &str = "/detail/eventName";
const RECIPIENT_ACCOUNT_POINTER: &str = "/detail/recipientAccountId";

/// How the target node is read from an inbound event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResolutionMode {
    /// Dispatch on `detail.eventName`
    #[default]
    EventName,
    /// Always use `detail.recipientAccountId`
    RecipientAccount,
}

impl std::str::FromStr for ResolutionMode {
    type Err = ScpError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "event-name" => Ok(Self::EventName),
            "recipient-account" => Ok(Self::RecipientAccount),
            other => Err(ScpError::Config(format!(
                "unknown target resolution mode {:?} (expected event-name or recipient-account)",
                other
            ))),
        }
    }
}

/// Organizations events that name a node to act on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SupportedEvent {
    CreateAccountResult,
    InviteAccountToOrganization,
    CreateOrganizationalUnit,
}

impl SupportedEvent {
    pub fn from_event_name(name: &str) -> Result<Self, ScpError> {
        match name {
            "CreateAccountResult" => Ok(Self::CreateAccountResult),
            "InviteAccountToOrganization" => Ok(Self::InviteAccountToOrganization),
            "CreateOrganizationalUnit" => Ok(Self::CreateOrganizationalUnit),
            other => Err(ScpError::UnsupportedEventKind(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SupportedEvent::CreateAccountResult => "CreateAccountResult",
            SupportedEvent::InviteAccountToOrganization => "InviteAccountToOrganization",
            SupportedEvent::CreateOrganizationalUnit => "CreateOrganizationalUnit",
        }
    }

    /// JSON pointer to the node id inside the event
    pub fn target_pointer(&self) -> &'static str {
        match self {
            SupportedEvent::CreateAccountResult => {
                "/detail/serviceEventDetails/createAccountStatus/accountId"
            }
            SupportedEvent::InviteAccountToOrganization => "/detail/requestParameters/target/id",
            SupportedEvent::CreateOrganizationalUnit => {
                "/detail/responseElements/organizationalUnit/id"
            }
        }
    }
}

/// Resolve the node id for an event.
pub fn resolve_target(event: &Value, mode: ResolutionMode) -> Result<NodeId, ScpError> {
    let (kind, pointer) = match mode {
        ResolutionMode::RecipientAccount => ("recipientAccountId", RECIPIENT_ACCOUNT_POINTER),
        ResolutionMode::EventName => {
            let name = event
                .pointer(EVENT_NAME_POINTER)
                .and_then(Value::as_str)
                .ok_or_else(|| ScpError::UnsupportedEventKind("<missing eventName>".to_string()))?;
            let supported = SupportedEvent::from_event_name(name)?;
            (supported.name(), supported.target_pointer())
        }
    };

    let raw = event
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| ScpError::MissingEventField {
            kind: kind.to_string(),
            path: pointer,
        })?;

    let target = NodeId::parse(raw)?;
    debug!(event = kind, node = %target, "Resolved target from event");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_account_result() {
        let event = json!({
            "detail": {
                "eventName": "CreateAccountResult",
                "serviceEventDetails": {"createAccountStatus": {"accountId": "111122223333"}}
            }
        });

        let target = resolve_target(&event, ResolutionMode::EventName).unwrap();
        assert_eq!(target.as_str(), "111122223333");
    }

    #[test]
    fn test_invite_account() {
        let event = json!({
            "detail": {
                "eventName": "InviteAccountToOrganization",
                "requestParameters": {"target": {"id": "444455556666", "type": "ACCOUNT"}}
            }
        });

        let target = resolve_target(&event, ResolutionMode::EventName).unwrap();
        assert_eq!(target.as_str(), "444455556666");
    }

    #[test]
    fn test_create_organizational_unit() {
        let event = json!({
            "detail": {
                "eventName": "CreateOrganizationalUnit",
                "responseElements": {"organizationalUnit": {"id": "ou-ab12-cdef5678", "name": "Sandbox"}}
            }
        });

        let target = resolve_target(&event, ResolutionMode::EventName).unwrap();
        assert_eq!(target.as_str(), "ou-ab12-cdef5678");
        assert_eq!(target.kind(), crate::types::NodeKind::OrganizationalUnit);
    }

    #[test]
    fn test_unknown_event_kind_fails() {
        let event = json!({
            "detail": {"eventName": "SomethingElse", "recipientAccountId": "111122223333"}
        });

        match resolve_target(&event, ResolutionMode::EventName) {
            Err(ScpError::UnsupportedEventKind(name)) => assert_eq!(name, "SomethingElse"),
            other => panic!("expected UnsupportedEventKind, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_event_name_fails() {
        let event = json!({"detail": {"recipientAccountId": "111122223333"}});

        assert!(matches!(
            resolve_target(&event, ResolutionMode::EventName),
            Err(ScpError::UnsupportedEventKind(_))
        ));
    }

    #[test]
    fn test_supported_event_missing_field() {
        let event = json!({
            "detail": {"eventName": "CreateAccountResult", "serviceEventDetails": {}}
        });

        match resolve_target(&event, ResolutionMode::EventName) {
            Err(ScpError::MissingEventField { kind, path }) => {
                assert_eq!(kind, "CreateAccountResult");
                assert_eq!(path, "/detail/serviceEventDetails/createAccountStatus/accountId");
            }
            other => panic!("expected MissingEventField, got {:?}", other),
        }
    }

    #[test]
    fn test_recipient_account_mode_ignores_event_name() {
        let event = json!({
            "detail": {"eventName": "SomethingElse", "recipientAccountId": "111122223333"}
        });

        let target = resolve_target(&event, ResolutionMode::RecipientAccount).unwrap();
        assert_eq!(target.as_str(), "111122223333");
    }

    #[test]
    fn test_malformed_id_in_event() {
        let event = json!({"detail": {"recipientAccountId": "not-an-account"}});

        assert!(matches!(
            resolve_target(&event, ResolutionMode::RecipientAccount),
            Err(ScpError::InvalidTargetId(_))
        ));
    }

    #[test]
    fn test_resolution_mode_parse() {
        assert_eq!("event-name".parse::<ResolutionMode>().unwrap(), ResolutionMode::EventName);
        assert_eq!(
            "Recipient-Account".parse::<ResolutionMode>().unwrap(),
            ResolutionMode::RecipientAccount
        );
        assert!("other".parse::<ResolutionMode>().is_err());
    }
}
