//! AWS error classification
//!
//! SDK errors are turned into [`ProviderError`]s here, once, at the point
//! where the API call is made. The error code decides the [`ErrorKind`];
//! the original code and message are kept verbatim.

use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_types::error::display::DisplayErrorContext;
use aws_smithy_types::error::metadata::ProvideErrorMetadata;
use carina_core::provider::{ErrorKind, ProviderError};

/// Error codes that mean the remote object does not exist
const NOT_FOUND_CODES: &[&str] = &[
    "ResourceNotFoundException",
    "NotFound",
    "NotFoundException",
    "NoSuchEntity",
];

/// Error codes that mean the remote object is in the wrong lifecycle state
const INVALID_STATE_CODES: &[&str] = &["InvalidStateException"];

/// Error codes for malformed requests that retrying will not fix
const CONFIGURATION_CODES: &[&str] = &[
    "InvalidParameter",
    "InvalidParameterException",
    "InvalidParameterValue",
    "InvalidArnException",
    "MalformedCSRException",
    "MalformedCertificateException",
    "ValidationException",
];

/// Map an AWS error code to an error kind
pub fn classify_code(code: Option<&str>) -> ErrorKind {
    match code {
        Some(code) if NOT_FOUND_CODES.contains(&code) => ErrorKind::NotFound,
        Some(code) if INVALID_STATE_CODES.contains(&code) => ErrorKind::InvalidState,
        Some(code) if CONFIGURATION_CODES.contains(&code) => ErrorKind::Configuration,
        // Throttling, internal failures and unknown codes
        _ => ErrorKind::Transient,
    }
}

/// Convert an SDK error into a classified provider error
pub fn from_sdk_error<E, R>(err: SdkError<E, R>) -> ProviderError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let (kind, code, message) = match &err {
        SdkError::ServiceError(service_err) => {
            let source = service_err.err();
            let code = source.code().map(str::to_string);
            let message = match (source.code(), source.message()) {
                (Some(code), Some(message)) => format!("{}: {}", code, message),
                (Some(code), None) => code.to_string(),
                _ => DisplayErrorContext(&err).to_string(),
            };
            (classify_code(code.as_deref()), code, message)
        }
        SdkError::ConstructionFailure(_) => (
            ErrorKind::Configuration,
            None,
            DisplayErrorContext(&err).to_string(),
        ),
        // Timeouts, dispatch and response failures
        _ => (
            ErrorKind::Transient,
            None,
            DisplayErrorContext(&err).to_string(),
        ),
    };

    let mut error = ProviderError::new(message).with_kind(kind).with_cause(err);
    if let Some(code) = code {
        error = error.with_code(code);
    }
    error
}

/// Whether the error carries the given AWS error code
pub fn has_code(err: &ProviderError, code: &str) -> bool {
    err.code.as_deref() == Some(code)
}
