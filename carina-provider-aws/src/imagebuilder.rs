//! EC2 Image Builder data sources

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_imagebuilder::types::{DistributionConfigurationSummary, Filter};
use carina_core::filter::FilterSpec;
use carina_core::pagination::{Page, collect_pages};
use carina_core::projection::project;
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::{Resource, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use log::debug;

use crate::errors::from_sdk_error;

pub const DISTRIBUTION_CONFIGURATIONS: &str = "imagebuilder.distribution_configurations";

/// Image Builder calls used by this provider
#[async_trait]
pub trait ImageBuilderApi: Send + Sync {
    /// One page of `ListDistributionConfigurations`
    async fn list_distribution_configurations_page(
        &self,
        filters: Option<Vec<Filter>>,
        next_token: Option<String>,
    ) -> ProviderResult<Page<DistributionConfigurationSummary>>;
}

#[async_trait]
impl ImageBuilderApi for aws_sdk_imagebuilder::Client {
    async fn list_distribution_configurations_page(
        &self,
        filters: Option<Vec<Filter>>,
        next_token: Option<String>,
    ) -> ProviderResult<Page<DistributionConfigurationSummary>> {
        let output = self
            .list_distribution_configurations()
            .set_filters(filters)
            .set_next_token(next_token)
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(Page::new(
            output.distribution_configuration_summary_list().to_vec(),
            output.next_token().map(str::to_string),
        ))
    }
}

pub fn distribution_configurations_schema() -> ResourceSchema {
    ResourceSchema::new(DISTRIBUTION_CONFIGURATIONS)
        .with_description("ARNs and names of Image Builder distribution configurations")
        .attribute(
            AttributeSchema::new("filter", types::filters())
                .with_description("Server-side filters (name, values)"),
        )
        .attribute(
            AttributeSchema::new("arns", AttributeType::List(Box::new(AttributeType::String)))
                .computed(),
        )
        .attribute(
            AttributeSchema::new("names", AttributeType::List(Box::new(AttributeType::String)))
                .computed(),
        )
}

/// Read the `imagebuilder.distribution_configurations` data source
///
/// Lists every distribution configuration matching the declared filters.
/// The resulting state is keyed by region since the listing has no
/// natural identifier of its own.
pub async fn read_distribution_configurations(
    api: &dyn ImageBuilderApi,
    region: &str,
    resource: &Resource,
) -> ProviderResult<State> {
    let spec = match resource.attributes.get("filter") {
        Some(value) => FilterSpec::from_value(value)?,
        None => FilterSpec::new(),
    };

    let filters = if spec.is_empty() {
        None
    } else {
        Some(spec.to_wire(|name, values| {
            Filter::builder().name(name).set_values(Some(values)).build()
        }))
    };

    let summaries = collect_pages(|token| {
        let filters = filters.clone();
        async move {
            api.list_distribution_configurations_page(filters, token)
                .await
        }
    })
    .await
    .map_err(|e| {
        e.context("reading Image Builder Distribution Configurations")
            .for_resource(resource.id.clone())
    })?;

    let projection = project(&summaries, |s| (s.arn(), s.name()));
    debug!(
        "{}: {} distribution configurations in {}",
        resource.id,
        projection.len(),
        region
    );

    let mut attributes = HashMap::new();
    attributes.insert("arns".to_string(), projection.arns_value());
    attributes.insert("names".to_string(), projection.names_value());
    if let Some(filter) = resource.attributes.get("filter") {
        attributes.insert("filter".to_string(), filter.clone());
    }

    Ok(State::existing(resource.id.clone(), attributes).with_identifier(region))
}

/// Data sources must be declared read-only
pub fn check_data_source(resource: &Resource) -> ProviderResult<()> {
    if !resource.is_data_source() {
        return Err(ProviderError::configuration(format!(
            "{} is a data source and must be declared read-only",
            resource.id.resource_type
        ))
        .for_resource(resource.id.clone()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use carina_core::provider::ErrorKind;

    /// Serves canned pages and records every request
    struct FakeImageBuilder {
        pages: Mutex<Vec<ProviderResult<Page<DistributionConfigurationSummary>>>>,
        requests: Mutex<Vec<(Option<Vec<Filter>>, Option<String>)>>,
    }

    impl FakeImageBuilder {
        fn new(pages: Vec<ProviderResult<Page<DistributionConfigurationSummary>>>) -> Self {
            Self {
                pages: Mutex::new(pages.into_iter().rev().collect()),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ImageBuilderApi for FakeImageBuilder {
        async fn list_distribution_configurations_page(
            &self,
            filters: Option<Vec<Filter>>,
            next_token: Option<String>,
        ) -> ProviderResult<Page<DistributionConfigurationSummary>> {
            self.requests.lock().unwrap().push((filters, next_token));
            self.pages
                .lock()
                .unwrap()
                .pop()
                .unwrap_or_else(|| Ok(Page::last(vec![])))
        }
    }

    fn summary(arn: Option<String>, name: Option<&str>) -> DistributionConfigurationSummary {
        DistributionConfigurationSummary::builder()
            .set_arn(arn)
            .set_name(name.map(str::to_string))
            .build()
    }

    fn arn(name: &str) -> String {
        format!(
            "arn:aws:imagebuilder:us-east-1:123456789012:distribution-configuration/{}",
            name
        )
    }

    fn data_source() -> Resource {
        Resource::new(DISTRIBUTION_CONFIGURATIONS, "all").with_read_only(true)
    }

    fn strings(state: &State, key: &str) -> Vec<String> {
        match state.attributes.get(key) {
            Some(Value::List(items)) => items
                .iter()
                .map(|v| v.as_str().unwrap().to_string())
                .collect(),
            other => panic!("Expected list for {}, got {:?}", key, other),
        }
    }

    #[tokio::test]
    async fn reads_all_pages_in_order() {
        let api = FakeImageBuilder::new(vec![
            Ok(Page::new(
                vec![
                    summary(Some(arn("a")), Some("a")),
                    summary(Some(arn("b")), Some("b")),
                ],
                Some("t1".to_string()),
            )),
            Ok(Page::new(
                vec![summary(Some(arn("c")), Some("c"))],
                None,
            )),
        ]);

        let state = read_distribution_configurations(&api, "us-east-1", &data_source())
            .await
            .unwrap();

        assert_eq!(state.identifier.as_deref(), Some("us-east-1"));
        assert_eq!(strings(&state, "arns"), vec![arn("a"), arn("b"), arn("c")]);
        assert_eq!(strings(&state, "names"), vec!["a", "b", "c"]);

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], (None, None));
        assert_eq!(requests[1].1.as_deref(), Some("t1"));
    }

    #[tokio::test]
    async fn empty_listing_yields_empty_lists() {
        let api = FakeImageBuilder::new(vec![Ok(Page::last(vec![]))]);

        let state = read_distribution_configurations(&api, "eu-west-1", &data_source())
            .await
            .unwrap();

        assert!(state.exists);
        assert_eq!(state.identifier.as_deref(), Some("eu-west-1"));
        assert!(strings(&state, "arns").is_empty());
        assert!(strings(&state, "names").is_empty());
    }

    #[tokio::test]
    async fn missing_fields_keep_positions_aligned() {
        let api = FakeImageBuilder::new(vec![Ok(Page::last(vec![
            summary(Some(arn("a")), None),
            summary(None, Some("b")),
        ]))]);

        let state = read_distribution_configurations(&api, "us-east-1", &data_source())
            .await
            .unwrap();

        assert_eq!(strings(&state, "arns"), vec![arn("a"), String::new()]);
        assert_eq!(strings(&state, "names"), vec![String::new(), "b".to_string()]);
    }

    #[tokio::test]
    async fn filters_are_sent_on_every_page() {
        let api = FakeImageBuilder::new(vec![
            Ok(Page::new(vec![], Some("t1".to_string()))),
            Ok(Page::last(vec![summary(Some(arn("web")), Some("web"))])),
        ]);
        let resource = data_source().with_attribute(
            "filter",
            Value::List(vec![Value::Map(HashMap::from([
                ("name".to_string(), Value::String("name".to_string())),
                ("values".to_string(), Value::string_list(["web", "api"])),
            ]))]),
        );

        let state = read_distribution_configurations(&api, "us-east-1", &resource)
            .await
            .unwrap();
        assert_eq!(strings(&state, "names"), vec!["web"]);
        assert!(state.attributes.contains_key("filter"));

        let requests = api.requests.lock().unwrap();
        assert_eq!(requests.len(), 2);
        for (filters, _) in requests.iter() {
            let filters = filters.as_ref().expect("filters should be sent");
            assert_eq!(filters.len(), 1);
            assert_eq!(filters[0].name(), Some("name"));
            assert_eq!(filters[0].values(), ["web", "api"]);
        }
    }

    #[tokio::test]
    async fn invalid_filter_fails_before_listing() {
        let api = FakeImageBuilder::new(vec![]);
        let resource =
            data_source().with_attribute("filter", Value::String("name=web".to_string()));

        let err = read_distribution_configurations(&api, "us-east-1", &resource)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
        assert!(api.requests.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn page_error_is_wrapped() {
        let api = FakeImageBuilder::new(vec![
            Ok(Page::new(
                vec![summary(Some(arn("a")), Some("a"))],
                Some("t1".to_string()),
            )),
            Err(ProviderError::new("AccessDeniedException: not authorized")),
        ]);

        let err = read_distribution_configurations(&api, "us-east-1", &data_source())
            .await
            .unwrap_err();
        assert_eq!(
            err.message,
            "reading Image Builder Distribution Configurations: AccessDeniedException: not authorized"
        );
        assert_eq!(err.kind(), ErrorKind::Transient);
    }

    #[test]
    fn data_source_must_be_read_only() {
        assert!(check_data_source(&data_source()).is_ok());
        let err = check_data_source(&Resource::new(DISTRIBUTION_CONFIGURATIONS, "x")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn schema_rejects_computed_input() {
        let attrs = HashMap::from([("arns".to_string(), Value::string_list(["x"]))]);
        assert!(distribution_configurations_schema().validate(&attrs).is_err());
    }
}
