//! SNS topic resource
//!
//! Topics are identified by ARN. Attributes are read and written through
//! `GetTopicAttributes`/`SetTopicAttributes` using the mapping table below;
//! tags go through the tagging API.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_sdk_sns::types::Tag;
use carina_core::provider::{BoxFuture, ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use carina_core::verify::ExistenceCheck;
use log::{debug, info};

use crate::errors::from_sdk_error;
use crate::validation::validate_topic_name;

pub const TOPIC: &str = "sns.topic";

const FIFO_SUFFIX: &str = ".fifo";

/// How a topic attribute is represented on the SNS side
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrKind {
    String,
    Bool,
    Int,
}

impl AttrKind {
    /// Value SNS assumes when the attribute is not set
    fn unset(self) -> &'static str {
        match self {
            AttrKind::String => "",
            AttrKind::Bool => "false",
            AttrKind::Int => "0",
        }
    }
}

/// Mapping between a DSL attribute and a `SetTopicAttributes` name
#[derive(Debug, Clone, Copy)]
pub struct TopicAttribute {
    pub dsl_name: &'static str,
    pub aws_name: &'static str,
    pub kind: AttrKind,
    /// Accepted by `CreateTopic`; the rest are set once the topic exists
    pub on_create: bool,
}

const fn attr(dsl_name: &'static str, aws_name: &'static str, kind: AttrKind) -> TopicAttribute {
    TopicAttribute {
        dsl_name,
        aws_name,
        kind,
        on_create: true,
    }
}

const fn feedback(dsl_name: &'static str, aws_name: &'static str, kind: AttrKind) -> TopicAttribute {
    TopicAttribute {
        dsl_name,
        aws_name,
        kind,
        on_create: false,
    }
}

pub const TOPIC_ATTRIBUTES: &[TopicAttribute] = &[
    attr("display_name", "DisplayName", AttrKind::String),
    attr("policy", "Policy", AttrKind::String),
    attr("delivery_policy", "DeliveryPolicy", AttrKind::String),
    attr("kms_master_key_id", "KmsMasterKeyId", AttrKind::String),
    attr("fifo_topic", "FifoTopic", AttrKind::Bool),
    attr("content_based_deduplication", "ContentBasedDeduplication", AttrKind::Bool),
    // Delivery status logging
    feedback("application_success_feedback_role_arn", "ApplicationSuccessFeedbackRoleArn", AttrKind::String),
    feedback("application_success_feedback_sample_rate", "ApplicationSuccessFeedbackSampleRate", AttrKind::Int),
    feedback("application_failure_feedback_role_arn", "ApplicationFailureFeedbackRoleArn", AttrKind::String),
    feedback("http_success_feedback_role_arn", "HTTPSuccessFeedbackRoleArn", AttrKind::String),
    feedback("http_success_feedback_sample_rate", "HTTPSuccessFeedbackSampleRate", AttrKind::Int),
    feedback("http_failure_feedback_role_arn", "HTTPFailureFeedbackRoleArn", AttrKind::String),
    feedback("lambda_success_feedback_role_arn", "LambdaSuccessFeedbackRoleArn", AttrKind::String),
    feedback("lambda_success_feedback_sample_rate", "LambdaSuccessFeedbackSampleRate", AttrKind::Int),
    feedback("lambda_failure_feedback_role_arn", "LambdaFailureFeedbackRoleArn", AttrKind::String),
    feedback("sqs_success_feedback_role_arn", "SQSSuccessFeedbackRoleArn", AttrKind::String),
    feedback("sqs_success_feedback_sample_rate", "SQSSuccessFeedbackSampleRate", AttrKind::Int),
    feedback("sqs_failure_feedback_role_arn", "SQSFailureFeedbackRoleArn", AttrKind::String),
    feedback("firehose_success_feedback_role_arn", "FirehoseSuccessFeedbackRoleArn", AttrKind::String),
    feedback("firehose_success_feedback_sample_rate", "FirehoseSuccessFeedbackSampleRate", AttrKind::Int),
    feedback("firehose_failure_feedback_role_arn", "FirehoseFailureFeedbackRoleArn", AttrKind::String),
];

/// Delivery protocols with status logging
const FEEDBACK_PROTOCOLS: &[&str] = &["application", "http", "lambda", "sqs", "firehose"];

/// Attributes holding JSON documents, compared semantically
const JSON_ATTRIBUTES: &[&str] = &["policy", "delivery_policy"];

/// SNS calls used by this provider
#[async_trait]
pub trait SnsApi: Send + Sync {
    async fn get_attributes(&self, topic_arn: &str) -> ProviderResult<HashMap<String, String>>;

    /// Create a topic and return its ARN
    async fn create(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
        tags: Vec<(String, String)>,
    ) -> ProviderResult<String>;

    async fn set_attribute(&self, topic_arn: &str, name: &str, value: &str)
    -> ProviderResult<()>;

    async fn list_tags(&self, topic_arn: &str) -> ProviderResult<HashMap<String, String>>;

    async fn tag(&self, topic_arn: &str, tags: Vec<(String, String)>) -> ProviderResult<()>;

    async fn untag(&self, topic_arn: &str, keys: Vec<String>) -> ProviderResult<()>;

    async fn delete(&self, topic_arn: &str) -> ProviderResult<()>;
}

fn build_tags(tags: Vec<(String, String)>) -> ProviderResult<Vec<Tag>> {
    tags.into_iter()
        .map(|(key, value)| {
            Tag::builder().key(key).value(value).build().map_err(|e| {
                ProviderError::configuration(format!("invalid tag: {}", e)).with_cause(e)
            })
        })
        .collect()
}

#[async_trait]
impl SnsApi for aws_sdk_sns::Client {
    async fn get_attributes(&self, topic_arn: &str) -> ProviderResult<HashMap<String, String>> {
        let output = self
            .get_topic_attributes()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(output.attributes().cloned().unwrap_or_default())
    }

    async fn create(
        &self,
        name: &str,
        attributes: HashMap<String, String>,
        tags: Vec<(String, String)>,
    ) -> ProviderResult<String> {
        let tags = if tags.is_empty() {
            None
        } else {
            Some(build_tags(tags)?)
        };
        let output = self
            .create_topic()
            .name(name)
            .set_attributes(Some(attributes))
            .set_tags(tags)
            .send()
            .await
            .map_err(from_sdk_error)?;
        output
            .topic_arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new(format!("CreateTopic returned no ARN for {}", name)))
    }

    async fn set_attribute(
        &self,
        topic_arn: &str,
        name: &str,
        value: &str,
    ) -> ProviderResult<()> {
        self.set_topic_attributes()
            .topic_arn(topic_arn)
            .attribute_name(name)
            .attribute_value(value)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }

    async fn list_tags(&self, topic_arn: &str) -> ProviderResult<HashMap<String, String>> {
        let output = self
            .list_tags_for_resource()
            .resource_arn(topic_arn)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(output
            .tags()
            .iter()
            .map(|t| (t.key().to_string(), t.value().to_string()))
            .collect())
    }

    async fn tag(&self, topic_arn: &str, tags: Vec<(String, String)>) -> ProviderResult<()> {
        self.tag_resource()
            .resource_arn(topic_arn)
            .set_tags(Some(build_tags(tags)?))
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }

    async fn untag(&self, topic_arn: &str, keys: Vec<String>) -> ProviderResult<()> {
        self.untag_resource()
            .resource_arn(topic_arn)
            .set_tag_keys(Some(keys))
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }

    async fn delete(&self, topic_arn: &str) -> ProviderResult<()> {
        self.delete_topic()
            .topic_arn(topic_arn)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }
}

pub fn topic_schema() -> ResourceSchema {
    let schema = ResourceSchema::new(TOPIC)
        .with_description("An SNS topic")
        .attribute(AttributeSchema::new("name", AttributeType::String).conflicts_with("name_prefix"))
        .attribute(AttributeSchema::new("name_prefix", AttributeType::String))
        .attribute(
            AttributeSchema::new("fifo_topic", AttributeType::Bool)
                .with_default(Value::Bool(false)),
        )
        .attribute(AttributeSchema::new(
            "content_based_deduplication",
            AttributeType::Bool,
        ))
        .attribute(AttributeSchema::new("display_name", AttributeType::String))
        .attribute(
            AttributeSchema::new("policy", AttributeType::String)
                .with_description("Access policy (JSON)"),
        )
        .attribute(
            AttributeSchema::new("delivery_policy", AttributeType::String)
                .with_description("Delivery retry policy (JSON)"),
        )
        .attribute(AttributeSchema::new("kms_master_key_id", AttributeType::String))
        .attribute(AttributeSchema::new(
            "tags",
            AttributeType::Map(Box::new(AttributeType::String)),
        ))
        .attribute(AttributeSchema::new("arn", types::arn()).computed())
        .attribute(AttributeSchema::new("owner", AttributeType::String).computed());

    FEEDBACK_PROTOCOLS.iter().fold(schema, |schema, protocol| {
        schema
            .attribute(AttributeSchema::new(
                format!("{}_success_feedback_role_arn", protocol),
                types::arn(),
            ))
            .attribute(AttributeSchema::new(
                format!("{}_failure_feedback_role_arn", protocol),
                types::arn(),
            ))
            .attribute(
                AttributeSchema::new(
                    format!("{}_success_feedback_sample_rate", protocol),
                    types::percentage(),
                )
                .with_description("Percentage of successful deliveries to log (0-100)"),
            )
    })
}

// =============================================================================
// Lookup
// =============================================================================

/// Fetch topic attributes by ARN
///
/// A missing topic and an empty attribute map both come back as a
/// not-found error.
pub async fn find_topic_attributes_by_arn(
    api: &dyn SnsApi,
    arn: &str,
) -> ProviderResult<HashMap<String, String>> {
    let attributes = api.get_attributes(arn).await?;
    if attributes.is_empty() {
        return Err(ProviderError::not_found(format!("SNS Topic {} not found", arn)));
    }
    Ok(attributes)
}

/// Convert raw topic attributes into DSL attributes
fn topic_attributes_to_dsl(arn: &str, raw: &HashMap<String, String>) -> HashMap<String, Value> {
    let mut attributes = HashMap::new();
    attributes.insert("arn".to_string(), Value::String(arn.to_string()));
    if let Some(name) = arn.rsplit(':').next() {
        attributes.insert("name".to_string(), Value::String(name.to_string()));
    }
    if let Some(owner) = raw.get("Owner") {
        attributes.insert("owner".to_string(), Value::String(owner.clone()));
    }

    for mapping in TOPIC_ATTRIBUTES {
        let Some(raw_value) = raw.get(mapping.aws_name) else {
            continue;
        };
        let value = match mapping.kind {
            AttrKind::Bool => Some(Value::Bool(raw_value == "true")),
            AttrKind::Int => raw_value.parse().ok().map(Value::Int),
            AttrKind::String if raw_value.is_empty() => None,
            AttrKind::String => Some(Value::String(raw_value.clone())),
        };
        if let Some(value) = value {
            attributes.insert(mapping.dsl_name.to_string(), value);
        }
    }

    // SNS only reports FifoTopic for FIFO topics
    attributes
        .entry("fifo_topic".to_string())
        .or_insert(Value::Bool(false));

    attributes
}

fn tags_to_dsl(tags: HashMap<String, String>) -> Value {
    Value::Map(
        tags.into_iter()
            .map(|(k, v)| (k, Value::String(v)))
            .collect(),
    )
}

fn dsl_tags(value: Option<&Value>) -> HashMap<String, String> {
    match value {
        Some(Value::Map(map)) => map
            .iter()
            .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
            .collect(),
        _ => HashMap::new(),
    }
}

/// Convert a DSL attribute into the string form SNS expects
fn dsl_value_to_aws(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Int(i) => Some(i.to_string()),
        _ => None,
    }
}

/// SNS-side value of a mapped attribute, with unset resolved to the service default
fn resolved_value(attributes: &HashMap<String, Value>, mapping: &TopicAttribute) -> String {
    attributes
        .get(mapping.dsl_name)
        .and_then(dsl_value_to_aws)
        .unwrap_or_else(|| mapping.kind.unset().to_string())
}

/// Whether two JSON documents are equivalent, ignoring formatting and key order
pub fn json_equivalent(a: &str, b: &str) -> bool {
    match (
        serde_json::from_str::<serde_json::Value>(a),
        serde_json::from_str::<serde_json::Value>(b),
    ) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

// =============================================================================
// Operations
// =============================================================================

/// Read a topic by ARN
pub async fn read_topic(api: &dyn SnsApi, id: &ResourceId, arn: &str) -> ProviderResult<State> {
    let raw = match find_topic_attributes_by_arn(api, arn).await {
        Ok(raw) => raw,
        Err(e) if e.is_not_found() => return Ok(State::not_found(id.clone())),
        Err(e) => return Err(e.context("reading SNS Topic").for_resource(id.clone())),
    };

    let mut attributes = topic_attributes_to_dsl(arn, &raw);
    let tags = api
        .list_tags(arn)
        .await
        .map_err(|e| e.context("listing SNS Topic tags").for_resource(id.clone()))?;
    if !tags.is_empty() {
        attributes.insert("tags".to_string(), tags_to_dsl(tags));
    }

    Ok(State::existing(id.clone(), attributes).with_identifier(arn))
}

/// Resolve the topic name from `name`, `name_prefix`, or a generated one
pub fn topic_name(resource: &Resource) -> String {
    let fifo = resource.get_bool("fifo_topic").unwrap_or(false);
    if let Some(name) = resource.get_string("name") {
        return name.to_string();
    }

    let prefix = resource.get_string("name_prefix").unwrap_or("carina-");
    let unique = uuid::Uuid::new_v4().simple().to_string();
    if fifo {
        format!("{}{}{}", prefix, unique, FIFO_SUFFIX)
    } else {
        format!("{}{}", prefix, unique)
    }
}

/// Create a topic
///
/// Attributes `CreateTopic` does not accept are set right after creation.
pub async fn create_topic(api: &dyn SnsApi, resource: &Resource) -> ProviderResult<State> {
    let id = resource.id.clone();
    let fifo = resource.get_bool("fifo_topic").unwrap_or(false);
    let name = topic_name(resource);
    validate_topic_name(&name, fifo).map_err(|e| {
        ProviderError::configuration(e.to_string()).for_resource(id.clone())
    })?;

    // Only values that differ from the service default are sent
    let declared: Vec<(&TopicAttribute, String)> = TOPIC_ATTRIBUTES
        .iter()
        .filter(|m| resource.attributes.contains_key(m.dsl_name))
        .map(|m| (m, resolved_value(&resource.attributes, m)))
        .filter(|(m, value)| value != m.kind.unset())
        .collect();

    let attributes: HashMap<String, String> = declared
        .iter()
        .filter(|(m, _)| m.on_create)
        .map(|(m, value)| (m.aws_name.to_string(), value.clone()))
        .collect();
    let tags: Vec<(String, String)> = dsl_tags(resource.attributes.get("tags"))
        .into_iter()
        .collect();

    let arn = api
        .create(&name, attributes, tags)
        .await
        .map_err(|e| e.context("creating SNS Topic").for_resource(id.clone()))?;
    info!("created SNS Topic {}", arn);

    for (mapping, value) in declared.iter().filter(|(m, _)| !m.on_create) {
        debug!("{}: setting {} on {}", id, mapping.aws_name, arn);
        api.set_attribute(&arn, mapping.aws_name, value)
            .await
            .map_err(|e| {
                e.context(format!(
                    "setting SNS Topic ({}) attribute {}",
                    arn, mapping.aws_name
                ))
                .for_resource(id.clone())
            })?;
    }

    let state = read_topic(api, &id, &arn).await?;
    if !state.exists {
        return Err(ProviderError::new(format!(
            "SNS Topic {} not found after creation",
            arn
        ))
        .for_resource(id));
    }
    Ok(state)
}

/// Update a topic in place
///
/// The name and FIFO-ness are fixed at creation; every other mapped
/// attribute is set individually when it differs.
pub async fn update_topic(
    api: &dyn SnsApi,
    id: &ResourceId,
    arn: &str,
    from: &State,
    to: &Resource,
) -> ProviderResult<State> {
    let current_name = from.get_string("name").unwrap_or_default();
    let renamed = match (to.get_string("name"), to.get_string("name_prefix")) {
        (Some(name), _) => name != current_name,
        (None, Some(prefix)) => !current_name.starts_with(prefix),
        (None, None) => false,
    };
    if renamed {
        return Err(ProviderError::configuration(
            "name cannot be changed; the topic must be replaced",
        )
        .for_resource(id.clone()));
    }

    let current_fifo = from
        .attributes
        .get("fifo_topic")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    if to.get_bool("fifo_topic").unwrap_or(false) != current_fifo {
        return Err(ProviderError::configuration(
            "fifo_topic cannot be changed; the topic must be replaced",
        )
        .for_resource(id.clone()));
    }

    for mapping in TOPIC_ATTRIBUTES {
        if mapping.dsl_name == "fifo_topic" {
            continue;
        }
        let aws_name = mapping.aws_name;
        let desired = resolved_value(&to.attributes, mapping);
        let current = resolved_value(&from.attributes, mapping);

        let unchanged = if JSON_ATTRIBUTES.contains(&mapping.dsl_name) {
            json_equivalent(&current, &desired)
        } else {
            current == desired
        };
        if unchanged {
            continue;
        }

        debug!("{}: setting {} on {}", id, aws_name, arn);
        api.set_attribute(arn, aws_name, &desired)
            .await
            .map_err(|e| {
                e.context(format!("setting SNS Topic ({}) attribute {}", arn, aws_name))
                    .for_resource(id.clone())
            })?;
    }

    let current_tags = dsl_tags(from.attributes.get("tags"));
    let desired_tags = dsl_tags(to.attributes.get("tags"));

    let removed: Vec<String> = current_tags
        .keys()
        .filter(|k| !desired_tags.contains_key(*k))
        .cloned()
        .collect();
    if !removed.is_empty() {
        api.untag(arn, removed)
            .await
            .map_err(|e| e.context("untagging SNS Topic").for_resource(id.clone()))?;
    }

    let changed: Vec<(String, String)> = desired_tags
        .into_iter()
        .filter(|(k, v)| current_tags.get(k) != Some(v))
        .collect();
    if !changed.is_empty() {
        api.tag(arn, changed)
            .await
            .map_err(|e| e.context("tagging SNS Topic").for_resource(id.clone()))?;
    }

    read_topic(api, id, arn).await
}

/// Delete a topic; a topic that is already gone counts as deleted
pub async fn delete_topic(api: &dyn SnsApi, id: &ResourceId, arn: &str) -> ProviderResult<()> {
    match api.delete(arn).await {
        Ok(()) => {
            info!("deleted SNS Topic {}", arn);
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("SNS Topic {} already deleted", arn);
            Ok(())
        }
        Err(e) => Err(e.context("deleting SNS Topic").for_resource(id.clone())),
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Existence check for `sns.topic`
pub struct TopicExistence {
    api: Arc<dyn SnsApi>,
}

impl TopicExistence {
    pub fn new(api: Arc<dyn SnsApi>) -> Self {
        Self { api }
    }
}

impl ExistenceCheck for TopicExistence {
    fn resource_type(&self) -> &'static str {
        TOPIC
    }

    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        _tracked: &'a State,
    ) -> BoxFuture<'a, ProviderResult<HashMap<String, Value>>> {
        Box::pin(async move {
            let raw = find_topic_attributes_by_arn(self.api.as_ref(), identifier).await?;
            Ok(topic_attributes_to_dsl(identifier, &raw))
        })
    }
}
