//! Carina AWS Provider
//!
//! AWS Provider implementation.
//!
//! ## Module Structure
//!
//! - `provider` - AwsProvider and per-type dispatch
//! - `resources` - Resource and data source type definitions
//! - `imagebuilder` - Image Builder distribution configurations data source
//! - `sns` - SNS topic resource
//! - `acmpca` - ACM Private CA certificate resource
//! - `config` - Provider settings and SDK configuration loading
//! - `errors` - SDK error classification
//! - `validation` - Attribute validation run before any API call

pub mod acmpca;
pub mod config;
pub mod errors;
pub mod imagebuilder;
pub mod provider;
pub mod resources;
pub mod sns;
pub mod validation;

// Re-export main types
pub use config::{ProviderConfig, normalize_region};
pub use provider::AwsProvider;
pub use validation::validate_template_arn;

use std::collections::HashMap;

use carina_core::provider::{BoxFuture, Provider, ProviderResult, ResourceType};
use carina_core::resource::{Resource, ResourceId, State, Value};

// =============================================================================
// Provider Trait Implementation
// =============================================================================

impl Provider for AwsProvider {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::resource_types()
    }

    fn data_source_types(&self) -> Vec<Box<dyn ResourceType>> {
        resources::data_source_types()
    }

    fn read(
        &self,
        id: &ResourceId,
        identifier: &str,
        attributes: &HashMap<String, Value>,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let attributes = attributes.clone();
        Box::pin(async move { self.read_resource(&id, &identifier, &attributes).await })
    }

    fn read_data_source(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.read_data_source_resource(&resource).await })
    }

    fn create(&self, resource: &Resource) -> BoxFuture<'_, ProviderResult<State>> {
        let resource = resource.clone();
        Box::pin(async move { self.create_resource(&resource).await })
    }

    fn update(
        &self,
        id: &ResourceId,
        identifier: &str,
        from: &State,
        to: &Resource,
    ) -> BoxFuture<'_, ProviderResult<State>> {
        let id = id.clone();
        let identifier = identifier.to_string();
        let from = from.clone();
        let to = to.clone();
        Box::pin(async move { self.update_resource(&id, &identifier, &from, &to).await })
    }

    fn delete(&self, state: &State) -> BoxFuture<'_, ProviderResult<()>> {
        let state = state.clone();
        Box::pin(async move { self.delete_resource(&state).await })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use carina_core::pagination::Page;
    use carina_core::provider::ErrorKind;
    use carina_core::verify::{assert_destroyed, assert_exists};

    use crate::acmpca::WaitConfig;
    use crate::acmpca::tests::{CA_ARN, FakeAcmPca};
    use crate::imagebuilder::ImageBuilderApi;
    use crate::sns::tests::FakeSns;

    struct EmptyImageBuilder;

    #[async_trait::async_trait]
    impl ImageBuilderApi for EmptyImageBuilder {
        async fn list_distribution_configurations_page(
            &self,
            _filters: Option<Vec<aws_sdk_imagebuilder::types::Filter>>,
            _next_token: Option<String>,
        ) -> ProviderResult<Page<aws_sdk_imagebuilder::types::DistributionConfigurationSummary>>
        {
            Ok(Page::last(vec![]))
        }
    }

    fn provider(sns: Arc<FakeSns>, acmpca: Arc<FakeAcmPca>) -> AwsProvider {
        AwsProvider::with_clients(Arc::new(EmptyImageBuilder), sns, acmpca, "us-east-1")
            .with_wait_config(WaitConfig {
                max_attempts: 2,
                delay: std::time::Duration::ZERO,
            })
    }

    fn default_provider() -> AwsProvider {
        provider(Arc::new(FakeSns::default()), Arc::new(FakeAcmPca::default()))
    }

    #[test]
    fn lists_types() {
        let provider = default_provider();
        assert_eq!(provider.name(), "aws");
        let names: Vec<_> = provider.resource_types().iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["sns.topic", "acmpca.certificate"]);
        let names: Vec<_> = provider
            .data_source_types()
            .iter()
            .map(|t| t.name())
            .collect();
        assert_eq!(names, vec!["imagebuilder.distribution_configurations"]);
    }

    #[tokio::test]
    async fn data_source_identifier_is_region() {
        let provider = default_provider();
        let resource =
            Resource::new("imagebuilder.distribution_configurations", "all").with_read_only(true);
        let state = provider.read_data_source(&resource).await.unwrap();
        assert_eq!(state.identifier.as_deref(), Some("us-east-1"));
        assert_eq!(state.attributes.get("arns"), Some(&Value::List(vec![])));
    }

    #[tokio::test]
    async fn unknown_type_is_configuration_error() {
        let provider = default_provider();
        let err = provider
            .create(&Resource::new("s3.bucket", "b"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert_eq!(err.to_string(), "[s3.bucket.b] Unknown resource type: s3.bucket");
    }

    #[tokio::test]
    async fn create_rejects_computed_attributes() {
        let provider = default_provider();
        let resource = Resource::new("sns.topic", "t")
            .with_attribute("owner", Value::String("123456789012".to_string()));
        let err = provider.create(&resource).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn data_source_rejects_computed_input() {
        let provider = default_provider();
        let resource = Resource::new("imagebuilder.distribution_configurations", "all")
            .with_read_only(true)
            .with_attribute("arns", Value::string_list(["bogus"]));
        let err = provider.read_data_source(&resource).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message.contains("arns"), "{}", err.message);
    }

    #[tokio::test]
    async fn data_source_rejects_malformed_filter_block() {
        let provider = default_provider();
        let resource = Resource::new("imagebuilder.distribution_configurations", "all")
            .with_read_only(true)
            .with_attribute(
                "filter",
                Value::List(vec![Value::Map(HashMap::from([(
                    "name".to_string(),
                    Value::String("name".to_string()),
                )]))]),
            );
        let err = provider.read_data_source(&resource).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn create_rejects_invalid_template_arn() {
        let acmpca = Arc::new(FakeAcmPca::default());
        let provider = provider(Arc::new(FakeSns::default()), acmpca.clone());
        let resource = certificate().with_attribute(
            "template_arn",
            Value::String("arn:aws:acm-pca:us-east-1::template/EndEntityCertificate/V1".to_string()),
        );
        let err = provider.create(&resource).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(err.message.contains("template_arn"), "{}", err.message);
        assert!(acmpca.issued.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_invalid_topic_policy() {
        let sns = Arc::new(FakeSns::default());
        let provider = provider(sns.clone(), Arc::new(FakeAcmPca::default()));
        let resource = Resource::new("sns.topic", "alerts")
            .with_attribute("name", Value::String("alerts".to_string()))
            .with_attribute("policy", Value::String("{not json".to_string()));
        let err = provider.create(&resource).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(sns.created_names.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn certificate_update_is_rejected() {
        let provider = default_provider();
        let id = ResourceId::new("acmpca.certificate", "leaf");
        let from = State::existing(id.clone(), HashMap::new());
        let to = Resource::new("acmpca.certificate", "leaf");
        let err = provider
            .update(&id, "arn", &from, &to)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn topic_lifecycle_with_verification() {
        let sns = Arc::new(FakeSns::default());
        let provider = provider(sns.clone(), Arc::new(FakeAcmPca::default()));
        let resource = Resource::new("sns.topic", "alerts")
            .with_attribute("name", Value::String("alerts".to_string()));

        let state = provider.create(&resource).await.unwrap();
        let checker = provider.existence_check("sns.topic").unwrap();
        assert!(assert_exists(checker.as_ref(), &state).await.is_ok());

        provider.delete(&state).await.unwrap();
        assert!(
            assert_destroyed(checker.as_ref(), std::slice::from_ref(&state))
                .await
                .is_ok()
        );
    }

    fn certificate() -> Resource {
        Resource::new("acmpca.certificate", "leaf")
            .with_attribute(
                "certificate_authority_arn",
                Value::String(CA_ARN.to_string()),
            )
            .with_attribute(
                "certificate_signing_request",
                Value::String("-----BEGIN CERTIFICATE REQUEST-----".to_string()),
            )
            .with_attribute("signing_algorithm", Value::String("SHA256WITHRSA".to_string()))
            .with_attribute(
                "validity",
                Value::Map(HashMap::from([
                    ("type".to_string(), Value::String("YEARS".to_string())),
                    ("value".to_string(), Value::Int(1)),
                ])),
            )
    }

    #[tokio::test]
    async fn certificate_lifecycle_with_verification() {
        let acmpca = Arc::new(FakeAcmPca::default());
        let provider = provider(Arc::new(FakeSns::default()), acmpca.clone());

        let state = provider.create(&certificate()).await.unwrap();
        let checker = provider.existence_check("acmpca.certificate").unwrap();
        assert!(assert_exists(checker.as_ref(), &state).await.is_ok());

        provider.delete(&state).await.unwrap();
        assert_eq!(acmpca.revoked.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_existence_check_for_data_sources() {
        let provider = default_provider();
        assert!(
            provider
                .existence_check("imagebuilder.distribution_configurations")
                .is_none()
        );
    }
}
