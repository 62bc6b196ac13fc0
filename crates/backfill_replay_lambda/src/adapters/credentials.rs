use std::time::SystemTime;

use aws_config::SdkConfig;
use aws_sdk_dynamodb::config::Credentials;
use aws_sdk_sts::error::DisplayErrorContext;
use backfill_replay_core::controller::CredentialProvider;
use backfill_replay_core::error::ReplayError;

use crate::adapters::dynamodb::DynamoScanBackend;

pub const READ_ROLE_SESSION_NAME: &str = "table-backfill-replay";
const ASSUMED_ROLE_PROVIDER_NAME: &str = "BackfillReadRole";

/// Builds the DynamoDB client for one invocation, either from ambient
/// credentials or from a temporarily assumed read role.
pub struct DynamoCredentials {
    sdk_config: SdkConfig,
    read_role_arn: Option<String>,
}

impl DynamoCredentials {
    pub fn new(sdk_config: SdkConfig, read_role_arn: Option<String>) -> Self {
        Self {
            sdk_config,
            read_role_arn,
        }
    }

    fn assume_read_role(&self, role_arn: &str) -> Result<Credentials, ReplayError> {
        let client = aws_sdk_sts::Client::new(&self.sdk_config);
        let role = role_arn.to_string();

        let output = tokio::task::block_in_place(|| {
            tokio::runtime::Handle::current().block_on(async move {
                client
                    .assume_role()
                    .role_arn(role)
                    .role_session_name(READ_ROLE_SESSION_NAME)
                    .send()
                    .await
            })
        })
        .map_err(|error| {
            ReplayError::auth_failure(format!(
                "failed to assume read role {role_arn}: {}",
                DisplayErrorContext(&error)
            ))
        })?;

        let credentials = output.credentials().ok_or_else(|| {
            ReplayError::auth_failure(format!(
                "assuming {role_arn} returned no credentials"
            ))
        })?;

        Ok(Credentials::new(
            credentials.access_key_id(),
            credentials.secret_access_key(),
            Some(credentials.session_token().to_string()),
            SystemTime::try_from(*credentials.expiration()).ok(),
            ASSUMED_ROLE_PROVIDER_NAME,
        ))
    }
}

impl CredentialProvider for DynamoCredentials {
    type Backend = DynamoScanBackend;

    fn resolve(&self) -> Result<Self::Backend, ReplayError> {
        let Some(role_arn) = self.read_role_arn.as_deref() else {
            return Ok(DynamoScanBackend::new(aws_sdk_dynamodb::Client::new(
                &self.sdk_config,
            )));
        };

        let credentials = self.assume_read_role(role_arn)?;
        tracing::info!(
            event = "read_role_assumed",
            role_arn,
            "using assumed role credentials for table reads"
        );
        let scoped = aws_sdk_dynamodb::config::Builder::from(&self.sdk_config)
            .credentials_provider(credentials)
            .build();
        Ok(DynamoScanBackend::new(aws_sdk_dynamodb::Client::from_conf(
            scoped,
        )))
    }
}
