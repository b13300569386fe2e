//! Input validation for AWS resources
//!
//! Runs before any API call so malformed configuration fails fast.

use std::collections::HashMap;
use std::sync::LazyLock;

use carina_core::provider::ProviderError;
use carina_core::resource::Value;
use regex::Regex;

/// ACM PCA template ARNs carry no region or account
static TEMPLATE_ARN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^arn:aws(-[a-z]+)*:acm-pca:::template/[A-Za-z0-9_]+/V[0-9]+$")
        .expect("template ARN pattern is valid")
});

static TOPIC_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{1,256}$").expect("topic name pattern is valid"));

static FIFO_TOPIC_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]{1,251}\.fifo$").expect("FIFO topic name pattern is valid")
});

pub const SIGNING_ALGORITHMS: &[&str] = &[
    "SHA256WITHECDSA",
    "SHA384WITHECDSA",
    "SHA512WITHECDSA",
    "SHA256WITHRSA",
    "SHA384WITHRSA",
    "SHA512WITHRSA",
];

pub const VALIDITY_TYPES: &[&str] = &["ABSOLUTE", "DAYS", "END_DATE", "MONTHS", "YEARS"];

/// Validation error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{path}: {message}")]
pub struct ValidationError {
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for validation
pub type ValidationResult = Result<(), Vec<ValidationError>>;

/// Validate an ACM PCA certificate template ARN
pub fn validate_template_arn(value: &str) -> Result<(), ValidationError> {
    if TEMPLATE_ARN.is_match(value) {
        Ok(())
    } else {
        Err(ValidationError::new(
            "template_arn",
            format!("'{}' is not a valid ACM PCA template ARN", value),
        ))
    }
}

/// Validate an SNS topic name
pub fn validate_topic_name(name: &str, fifo: bool) -> Result<(), ValidationError> {
    let valid = if fifo {
        FIFO_TOPIC_NAME.is_match(name)
    } else {
        TOPIC_NAME.is_match(name)
    };

    if valid {
        Ok(())
    } else if fifo {
        Err(ValidationError::new(
            "name",
            format!(
                "'{}' must be 1-251 alphanumeric, hyphen or underscore characters followed by .fifo",
                name
            ),
        ))
    } else {
        Err(ValidationError::new(
            "name",
            format!(
                "'{}' must be 1-256 alphanumeric, hyphen or underscore characters",
                name
            ),
        ))
    }
}

/// Validate SNS topic attributes
pub fn validate_sns_topic(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();
    let fifo = matches!(attributes.get("fifo_topic"), Some(Value::Bool(true)));

    if let Some(Value::String(name)) = attributes.get("name")
        && let Err(e) = validate_topic_name(name, fifo)
    {
        errors.push(e);
    }

    if matches!(
        attributes.get("content_based_deduplication"),
        Some(Value::Bool(true))
    ) && !fifo
    {
        errors.push(ValidationError::new(
            "content_based_deduplication",
            "content-based deduplication can only be set for FIFO topics",
        ));
    }

    for key in ["policy", "delivery_policy"] {
        if let Some(Value::String(doc)) = attributes.get(key)
            && serde_json::from_str::<serde_json::Value>(doc).is_err()
        {
            errors.push(ValidationError::new(key, "must be a valid JSON document"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate ACM PCA certificate attributes
pub fn validate_acmpca_certificate(attributes: &HashMap<String, Value>) -> ValidationResult {
    let mut errors = Vec::new();

    if let Some(Value::String(arn)) = attributes.get("template_arn")
        && let Err(e) = validate_template_arn(arn)
    {
        errors.push(e);
    }

    if let Some(Value::String(algorithm)) = attributes.get("signing_algorithm")
        && !SIGNING_ALGORITHMS.contains(&algorithm.as_str())
    {
        errors.push(ValidationError::new(
            "signing_algorithm",
            format!(
                "Invalid value '{}'. Must be one of: {}",
                algorithm,
                SIGNING_ALGORITHMS.join(", ")
            ),
        ));
    }

    if let Some(Value::Map(validity)) = attributes.get("validity") {
        match validity.get("type") {
            Some(Value::String(t)) if VALIDITY_TYPES.contains(&t.as_str()) => {}
            Some(Value::String(t)) => errors.push(ValidationError::new(
                "validity.type",
                format!(
                    "Invalid value '{}'. Must be one of: {}",
                    t,
                    VALIDITY_TYPES.join(", ")
                ),
            )),
            _ => errors.push(ValidationError::new(
                "validity.type",
                "validity type is required",
            )),
        }
        match validity.get("value") {
            Some(Value::Int(v)) if *v > 0 => {}
            _ => errors.push(ValidationError::new(
                "validity.value",
                "validity value must be a positive integer",
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate a resource based on its type
pub fn validate_resource(
    resource_type: &str,
    attributes: &HashMap<String, Value>,
) -> ValidationResult {
    match resource_type {
        crate::sns::TOPIC => validate_sns_topic(attributes),
        crate::acmpca::CERTIFICATE => validate_acmpca_certificate(attributes),
        _ => Ok(()), // Unknown types pass validation (for extensibility)
    }
}

/// Join validation errors into a single configuration error
pub fn into_provider_error(errors: Vec<ValidationError>) -> ProviderError {
    let message = errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    ProviderError::configuration(message)
}
