use std::num::NonZeroU32;
use std::time::Duration;

pub const TABLE_NAME_VAR: &str = "DYNAMO_TABLE_NAME";
pub const READ_ROLE_VAR: &str = "DYNAMO_READ_ROLE";
pub const PAGE_LIMIT_VAR: &str = "DYNAMO_PAGE_LIMIT";
pub const TARGET_FUNCTION_VAR: &str = "LAMBDA_FUNCTION_ARN";
pub const SAFETY_MARGIN_VAR: &str = "REPLAY_SAFETY_MARGIN_MS";
pub const INVALID_CHECKPOINT_POLICY_VAR: &str = "INVALID_CHECKPOINT_POLICY";

pub const DEFAULT_SAFETY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be configured")]
    Missing(&'static str),
    #[error("{name} has invalid value '{value}': {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// What to do when the backing store rejects a well-formed checkpoint.
/// Checkpoints that fail local validation always fail the invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InvalidCheckpointPolicy {
    #[default]
    Fail,
    RestartFromBeginning,
}

impl InvalidCheckpointPolicy {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Some(Self::Fail),
            "restart" => Some(Self::RestartFromBeginning),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunMode<'a> {
    Replay { target_function: &'a str },
    DryRun,
}

/// Process-level settings, loaded once at start-up and passed to every
/// invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayConfig {
    pub table_name: String,
    pub read_role_arn: Option<String>,
    pub page_limit: NonZeroU32,
    pub target_function: Option<String>,
    pub safety_margin: Duration,
    pub invalid_checkpoint_policy: InvalidCheckpointPolicy,
}

impl ReplayConfig {
    pub fn new(table_name: impl Into<String>, page_limit: NonZeroU32) -> Self {
        Self {
            table_name: table_name.into(),
            read_role_arn: None,
            page_limit,
            target_function: None,
            safety_margin: DEFAULT_SAFETY_MARGIN,
            invalid_checkpoint_policy: InvalidCheckpointPolicy::Fail,
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let read = |name: &str| {
            lookup(name)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let table_name = read(TABLE_NAME_VAR).ok_or(ConfigError::Missing(TABLE_NAME_VAR))?;

        let raw_limit = read(PAGE_LIMIT_VAR).ok_or(ConfigError::Missing(PAGE_LIMIT_VAR))?;
        let page_limit = raw_limit
            .parse::<NonZeroU32>()
            .map_err(|error| ConfigError::Invalid {
                name: PAGE_LIMIT_VAR,
                value: raw_limit.clone(),
                reason: error.to_string(),
            })?;

        let safety_margin = match read(SAFETY_MARGIN_VAR) {
            None => DEFAULT_SAFETY_MARGIN,
            Some(raw) => raw
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|error| ConfigError::Invalid {
                    name: SAFETY_MARGIN_VAR,
                    value: raw.clone(),
                    reason: error.to_string(),
                })?,
        };

        let invalid_checkpoint_policy = match read(INVALID_CHECKPOINT_POLICY_VAR) {
            None => InvalidCheckpointPolicy::default(),
            Some(raw) => {
                InvalidCheckpointPolicy::parse(&raw).ok_or_else(|| ConfigError::Invalid {
                    name: INVALID_CHECKPOINT_POLICY_VAR,
                    value: raw.clone(),
                    reason: "expected 'fail' or 'restart'".to_string(),
                })?
            }
        };

        Ok(Self {
            table_name,
            read_role_arn: read(READ_ROLE_VAR),
            page_limit,
            target_function: read(TARGET_FUNCTION_VAR),
            safety_margin,
            invalid_checkpoint_policy,
        })
    }

    pub fn run_mode(&self) -> RunMode<'_> {
        match self.target_function.as_deref() {
            Some(target_function) => RunMode::Replay { target_function },
            None => RunMode::DryRun,
        }
    }
}
