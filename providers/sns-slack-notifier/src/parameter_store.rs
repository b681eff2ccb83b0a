use crate::error::RelayError;
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_config::BehaviorVersion;
use aws_sdk_ssm::error::DisplayErrorContext;
use aws_sdk_ssm::Client;
use tracing::{debug, info};

#[cfg(test)]
use mockall::automock;

/// Region used when neither the environment nor the AWS profile names one
pub const DEFAULT_REGION: &str = "us-east-1";

/// Source of secret configuration values, keyed by parameter name
#[cfg_attr(test, automock)]
#[async_trait]
pub trait ParameterStore: Send + Sync {
    /// Fetch a parameter value as an opaque string
    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String, RelayError>;
}

/// AWS Systems Manager Parameter Store
pub struct SsmParameterStore {
    client: Client,
}

impl SsmParameterStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Build an SSM client from the ambient AWS configuration
    pub async fn from_env() -> Self {
        let region = RegionProviderChain::default_provider().or_else(DEFAULT_REGION);
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(region)
            .load()
            .await;

        info!(
            region = ?sdk_config.region(),
            "Initialized SSM parameter store client"
        );

        Self::new(Client::new(&sdk_config))
    }
}

#[async_trait]
impl ParameterStore for SsmParameterStore {
    async fn get_parameter(&self, name: &str, with_decryption: bool) -> Result<String, RelayError> {
        debug!(parameter = %name, with_decryption, "Fetching SSM parameter");

        let output = self
            .client
            .get_parameter()
            .name(name)
            .with_decryption(with_decryption)
            .send()
            .await
            .map_err(|e| {
                RelayError::Configuration(format!(
                    "Failed to fetch SSM parameter {}: {}",
                    name,
                    DisplayErrorContext(&e)
                ))
            })?;

        output
            .parameter()
            .and_then(|parameter| parameter.value())
            .map(str::to_string)
            .ok_or_else(|| {
                RelayError::Configuration(format!("SSM parameter {} has no value", name))
            })
    }
}
