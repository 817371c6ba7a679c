//! Replacement Configuration
//!
//! Built once at process entry and passed down explicitly. The Lambda reads it
//! from the environment; the CLI builds it from arguments.

use tracing::Level;

use crate::credentials::{
    session_name, RoleSelection, DEFAULT_ASSUME_ROLE_NAME, DEFAULT_SESSION_NAME,
};
use crate::event::ResolutionMode;
use crate::logging::parse_log_level;
use crate::types::{PolicyId, PolicyPair, ScpError};

pub const ATTACH_SCP_ID_VAR: &str = "ATTACH_SCP_ID";
pub const DETACH_SCP_ID_VAR: &str = "DETACH_SCP_ID";
pub const DRY_RUN_VAR: &str = "DRY_RUN";
pub const LOG_LEVEL_VAR: &str = "LOG_LEVEL";
pub const ASSUME_ROLE_VAR: &str = "ASSUME_ROLE";
pub const ASSUME_ROLE_NAME_VAR: &str = "ASSUME_ROLE_NAME";
pub const ASSUME_ROLE_ARN_VAR: &str = "ASSUME_ROLE_ARN";
pub const TARGET_RESOLUTION_VAR: &str = "TARGET_RESOLUTION";
pub const FUNCTION_NAME_VAR: &str = "AWS_LAMBDA_FUNCTION_NAME";

/// Settings for one process
#[derive(Debug, Clone)]
pub struct ReplaceConfig {
    /// Policy to attach and policy to detach
    pub policies: PolicyPair,
    /// Log would-be attach/detach calls instead of sending them
    pub dry_run: bool,
    /// Role to assume before calling Organizations, if any
    pub assume_role: Option<RoleSelection>,
    /// STS session name for assumed roles
    pub session_name: String,
    /// How Lambda events are mapped to a target
    pub resolution: ResolutionMode,
    pub log_level: Level,
}

impl ReplaceConfig {
    /// Config with defaults: dry run on, no role assumption, INFO logging.
    pub fn new(policies: PolicyPair) -> Self {
        Self {
            policies,
            dry_run: true,
            assume_role: None,
            session_name: DEFAULT_SESSION_NAME.to_string(),
            resolution: ResolutionMode::default(),
            log_level: Level::INFO,
        }
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn with_assume_role(mut self, role: Option<RoleSelection>) -> Self {
        self.assume_role = role;
        self
    }

    pub fn with_session_name(mut self, function_name: &str) -> Self {
        self.session_name = session_name(function_name);
        self
    }

    pub fn with_resolution(mut self, resolution: ResolutionMode) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn with_log_level(mut self, level: Level) -> Self {
        self.log_level = level;
        self
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ScpError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through `lookup`; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ScpError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let require = |key: &str| {
            get(key).ok_or_else(|| ScpError::Config(format!("{} is not set", key)))
        };

        let policies = PolicyPair::new(
            PolicyId::new(require(ATTACH_SCP_ID_VAR)?)?,
            PolicyId::new(require(DETACH_SCP_ID_VAR)?)?,
        )?;

        let dry_run = match get(DRY_RUN_VAR) {
            Some(raw) => parse_bool(&raw)?,
            None => true,
        };

        let switch = get(ASSUME_ROLE_VAR).map(|raw| parse_bool(&raw)).transpose()?;
        let assume_role = match (switch, get(ASSUME_ROLE_ARN_VAR), get(ASSUME_ROLE_NAME_VAR)) {
            (_, Some(_), Some(_)) => {
                return Err(ScpError::Config(format!(
                    "{} and {} are mutually exclusive",
                    ASSUME_ROLE_ARN_VAR, ASSUME_ROLE_NAME_VAR
                )))
            }
            (Some(false), Some(_), None) | (Some(false), None, Some(_)) => {
                return Err(ScpError::Config(format!(
                    "{} is false but a role is configured",
                    ASSUME_ROLE_VAR
                )))
            }
            (_, Some(arn), None) => Some(RoleSelection::Arn(arn.trim().to_string())),
            (_, None, Some(name)) => Some(RoleSelection::Name(name.trim().to_string())),
            (Some(true), None, None) => {
                Some(RoleSelection::Name(DEFAULT_ASSUME_ROLE_NAME.to_string()))
            }
            (_, None, None) => None,
        };

        let resolution = match get(TARGET_RESOLUTION_VAR) {
            Some(raw) => raw.parse()?,
            None => ResolutionMode::default(),
        };

        let function_name = get(FUNCTION_NAME_VAR).unwrap_or_else(|| DEFAULT_SESSION_NAME.to_string());
        let log_level = parse_log_level(get(LOG_LEVEL_VAR).as_deref());

        Ok(Self::new(policies)
            .with_dry_run(dry_run)
            .with_assume_role(assume_role)
            .with_session_name(&function_name)
            .with_resolution(resolution)
            .with_log_level(log_level))
    }
}

/// Parse a boolean flag (`true/false`, `1/0`, `yes/no`, `on/off`)
pub fn parse_bool(raw: &str) -> Result<bool, ScpError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        other => Err(ScpError::Config(format!("expected a boolean, got {:?}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_minimal_env_uses_defaults() {
        let config = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
        ]))
        .unwrap();

        assert_eq!(config.policies.attach.as_str(), "p-new12345");
        assert_eq!(config.policies.detach.as_str(), "p-old12345");
        assert!(config.dry_run);
        assert_eq!(config.assume_role, None);
        assert_eq!(config.session_name, DEFAULT_SESSION_NAME);
        assert_eq!(config.resolution, ResolutionMode::EventName);
        assert_eq!(config.log_level, Level::INFO);
    }

    #[test]
    fn test_missing_policy_id() {
        let err = ReplaceConfig::from_lookup(lookup(&[("ATTACH_SCP_ID", "p-new12345")])).unwrap_err();
        assert!(err.to_string().contains("DETACH_SCP_ID"));

        let err = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "  "),
            ("DETACH_SCP_ID", "p-old12345"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ATTACH_SCP_ID"));
    }

    #[test]
    fn test_full_env() {
        let config = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("DRY_RUN", "False"),
            ("ASSUME_ROLE_NAME", "OrganizationAccountAccessRole"),
            ("TARGET_RESOLUTION", "recipient-account"),
            ("LOG_LEVEL", "debug"),
            ("AWS_LAMBDA_FUNCTION_NAME", "new-account-replace-scp"),
        ]))
        .unwrap();

        assert!(!config.dry_run);
        assert_eq!(
            config.assume_role,
            Some(RoleSelection::Name("OrganizationAccountAccessRole".to_string()))
        );
        assert_eq!(config.resolution, ResolutionMode::RecipientAccount);
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.session_name, "new-account-replace-scp");
    }

    #[test]
    fn test_assume_role_switch_uses_default_role_name() {
        let config = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE", "true"),
        ]))
        .unwrap();
        assert_eq!(
            config.assume_role,
            Some(RoleSelection::Name(DEFAULT_ASSUME_ROLE_NAME.to_string()))
        );

        let config = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE", "yes"),
            ("ASSUME_ROLE_NAME", "ScpAdmin"),
        ]))
        .unwrap();
        assert_eq!(config.assume_role, Some(RoleSelection::Name("ScpAdmin".to_string())));

        let config = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE", "false"),
        ]))
        .unwrap();
        assert_eq!(config.assume_role, None);
    }

    #[test]
    fn test_assume_role_switch_off_with_role_is_rejected() {
        let err = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE", "off"),
            ("ASSUME_ROLE_ARN", "arn:aws:iam::111122223333:role/Admin"),
        ]))
        .unwrap_err();
        assert!(err.to_string().contains("ASSUME_ROLE"));

        let err = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScpError::Config(_)));
    }

    #[test]
    fn test_role_arn_and_name_conflict() {
        let err = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("ASSUME_ROLE_NAME", "Admin"),
            ("ASSUME_ROLE_ARN", "arn:aws:iam::111122223333:role/Admin"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScpError::Config(_)));
    }

    #[test]
    fn test_invalid_dry_run_value() {
        let err = ReplaceConfig::from_lookup(lookup(&[
            ("ATTACH_SCP_ID", "p-new12345"),
            ("DETACH_SCP_ID", "p-old12345"),
            ("DRY_RUN", "maybe"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ScpError::Config(_)));
    }

    #[test]
    fn test_parse_bool() {
        assert!(parse_bool("TRUE").unwrap());
        assert!(parse_bool(" yes ").unwrap());
        assert!(!parse_bool("0").unwrap());
        assert!(!parse_bool("off").unwrap());
        assert!(parse_bool("").is_err());
    }
}
