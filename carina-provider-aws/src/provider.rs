//! AWS Provider implementation
//!
//! Holds one client per service behind the service traits, so tests can
//! swap in fakes without touching the network.

use std::collections::HashMap;
use std::sync::Arc;

use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::verify::ExistenceCheck;
use log::debug;

use crate::acmpca::{self, AcmPcaApi, CertificateExistence, WaitConfig};
use crate::config::ProviderConfig;
use crate::imagebuilder::{self, ImageBuilderApi};
use crate::resources::find_type;
use crate::sns::{self, SnsApi, TopicExistence};
use crate::validation::{into_provider_error, validate_resource};

/// AWS Provider
pub struct AwsProvider {
    imagebuilder: Arc<dyn ImageBuilderApi>,
    sns: Arc<dyn SnsApi>,
    acmpca: Arc<dyn AcmPcaApi>,
    region: String,
    wait: WaitConfig,
}

impl AwsProvider {
    /// Create a new AWS Provider
    ///
    /// Fails when no region can be resolved from the configuration, the
    /// environment, or the active profile.
    pub async fn new(config: &ProviderConfig) -> ProviderResult<Self> {
        let sdk_config = config.load().await;
        let region = sdk_config
            .region()
            .map(|r| r.to_string())
            .ok_or_else(|| {
                ProviderError::configuration(
                    "no AWS region configured; set region in the provider block, pass --region, or set AWS_REGION",
                )
            })?;
        debug!("AWS provider using region {}", region);

        Ok(Self::with_clients(
            Arc::new(aws_sdk_imagebuilder::Client::new(&sdk_config)),
            Arc::new(aws_sdk_sns::Client::new(&sdk_config)),
            Arc::new(aws_sdk_acmpca::Client::new(&sdk_config)),
            region,
        ))
    }

    /// Create with specific clients (for testing)
    pub fn with_clients(
        imagebuilder: Arc<dyn ImageBuilderApi>,
        sns: Arc<dyn SnsApi>,
        acmpca: Arc<dyn AcmPcaApi>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            imagebuilder,
            sns,
            acmpca,
            region: region.into(),
            wait: WaitConfig::default(),
        }
    }

    /// Override certificate issuance polling
    pub fn with_wait_config(mut self, wait: WaitConfig) -> Self {
        self.wait = wait;
        self
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Existence check for a managed resource type
    pub fn existence_check(&self, resource_type: &str) -> Option<Box<dyn ExistenceCheck>> {
        match resource_type {
            sns::TOPIC => Some(Box::new(TopicExistence::new(self.sns.clone()))),
            acmpca::CERTIFICATE => Some(Box::new(CertificateExistence::new(self.acmpca.clone()))),
            _ => None,
        }
    }

    /// Check declared attributes against the type schema and service rules
    ///
    /// The single place input is validated; it runs before any remote call.
    fn validate(&self, resource: &Resource) -> ProviderResult<()> {
        let Some(resource_type) = find_type(&resource.id.resource_type) else {
            return Err(unknown_type(&resource.id));
        };

        resource_type
            .schema()
            .validate(&resource.attributes)
            .map_err(|errors| {
                let message = errors
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; ");
                ProviderError::configuration(message).for_resource(resource.id.clone())
            })?;

        validate_resource(&resource.id.resource_type, &resource.attributes)
            .map_err(|errors| into_provider_error(errors).for_resource(resource.id.clone()))
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    pub(crate) async fn read_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        attributes: &HashMap<String, Value>,
    ) -> ProviderResult<State> {
        match id.resource_type.as_str() {
            sns::TOPIC => sns::read_topic(self.sns.as_ref(), id, identifier).await,
            acmpca::CERTIFICATE => {
                acmpca::read_certificate(self.acmpca.as_ref(), id, identifier, attributes).await
            }
            _ => Err(unknown_type(id)),
        }
    }

    pub(crate) async fn read_data_source_resource(
        &self,
        resource: &Resource,
    ) -> ProviderResult<State> {
        match resource.id.resource_type.as_str() {
            imagebuilder::DISTRIBUTION_CONFIGURATIONS => {
                imagebuilder::check_data_source(resource)?;
                self.validate(resource)?;
                imagebuilder::read_distribution_configurations(
                    self.imagebuilder.as_ref(),
                    &self.region,
                    resource,
                )
                .await
            }
            _ => Err(unknown_type(&resource.id)),
        }
    }

    pub(crate) async fn create_resource(&self, resource: &Resource) -> ProviderResult<State> {
        self.validate(resource)?;
        match resource.id.resource_type.as_str() {
            sns::TOPIC => sns::create_topic(self.sns.as_ref(), resource).await,
            acmpca::CERTIFICATE => {
                acmpca::create_certificate(self.acmpca.as_ref(), resource, self.wait).await
            }
            _ => Err(unknown_type(&resource.id)),
        }
    }

    pub(crate) async fn update_resource(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> ProviderResult<State> {
        self.validate(to)?;
        match id.resource_type.as_str() {
            sns::TOPIC => sns::update_topic(self.sns.as_ref(), id, identifier, from, to).await,
            acmpca::CERTIFICATE => Err(ProviderError::configuration(
                "certificates cannot be updated in place; the resource must be replaced",
            )
            .for_resource(id.clone())),
            _ => Err(unknown_type(id)),
        }
    }

    pub(crate) async fn delete_resource(&self, state: &State) -> ProviderResult<()> {
        match state.id.resource_type.as_str() {
            sns::TOPIC => {
                let arn = state.identifier.as_deref().ok_or_else(|| {
                    ProviderError::configuration("topic ARN is not set")
                        .for_resource(state.id.clone())
                })?;
                sns::delete_topic(self.sns.as_ref(), &state.id, arn).await
            }
            acmpca::CERTIFICATE => acmpca::delete_certificate(self.acmpca.as_ref(), state).await,
            _ => Err(unknown_type(&state.id)),
        }
    }
}

fn unknown_type(id: &ResourceId) -> ProviderError {
    ProviderError::configuration(format!("Unknown resource type: {}", id.resource_type))
        .for_resource(id.clone())
}
