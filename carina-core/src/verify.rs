//! Verify - Existence and destroy checks for tracked resources
//!
//! After an apply, every tracked resource should resolve remotely; after a
//! destroy, none should. Each resource type supplies an [`ExistenceCheck`]
//! that knows how to look itself up and which errors mean "absent".

use std::collections::HashMap;

use log::debug;
use thiserror::Error;

use crate::provider::{BoxFuture, ProviderError, ProviderResult};
use crate::resource::{State, Value};

/// Result of looking up one tracked resource
#[derive(Debug)]
pub enum VerificationOutcome {
    Found(HashMap<String, Value>),
    NotFound,
    TransientError(ProviderError),
}

impl VerificationOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, VerificationOutcome::Found(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, VerificationOutcome::NotFound)
    }
}

/// Errors from existence and destroy verification
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("No {resource_type} ID is set for {name}")]
    MissingIdentifier { resource_type: String, name: String },

    #[error("{resource_type} ({identifier}) does not exist")]
    DoesNotExist {
        resource_type: String,
        identifier: String,
    },

    #[error("{resource_type} ({identifier}) still exists")]
    StillExists {
        resource_type: String,
        identifier: String,
    },

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Per-resource-type lookup used by verification
pub trait ExistenceCheck: Send + Sync {
    /// Resource type this check applies to (e.g., "sns.topic")
    fn resource_type(&self) -> &'static str;

    /// Fetch the remote attributes of a tracked resource
    ///
    /// `identifier` is the tracked identifier; `tracked` gives access to
    /// any other attributes the lookup needs.
    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        tracked: &'a State,
    ) -> BoxFuture<'a, ProviderResult<HashMap<String, Value>>>;

    /// Whether a lookup error means the resource is absent
    fn treats_as_absent(&self, err: &ProviderError) -> bool {
        err.is_not_found()
    }

    /// Attribute that must be present and non-empty for the resource to
    /// count as existing (e.g., the issued certificate body)
    fn artifact_attribute(&self) -> Option<&'static str> {
        None
    }
}

/// Look up one tracked resource by identifier
pub async fn check(
    checker: &dyn ExistenceCheck,
    identifier: &str,
    tracked: &State,
) -> VerificationOutcome {
    match checker.lookup(identifier, tracked).await {
        Ok(attributes) => VerificationOutcome::Found(attributes),
        Err(err) if checker.treats_as_absent(&err) => {
            debug!(
                "{} ({}) resolved as absent: {}",
                checker.resource_type(),
                identifier,
                err
            );
            VerificationOutcome::NotFound
        }
        Err(err) => VerificationOutcome::TransientError(err),
    }
}

/// Assert that a tracked resource exists remotely
///
/// Returns the remote attributes on success.
pub async fn assert_exists(
    checker: &dyn ExistenceCheck,
    tracked: &State,
) -> Result<HashMap<String, Value>, VerifyError> {
    let identifier = tracked
        .identifier
        .as_deref()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| VerifyError::MissingIdentifier {
            resource_type: checker.resource_type().to_string(),
            name: tracked.id.name.clone(),
        })?;

    let does_not_exist = || VerifyError::DoesNotExist {
        resource_type: checker.resource_type().to_string(),
        identifier: identifier.to_string(),
    };

    match check(checker, identifier, tracked).await {
        VerificationOutcome::Found(attributes) => match checker.artifact_attribute() {
            Some(key) => match attributes.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Ok(attributes),
                _ => Err(does_not_exist()),
            },
            None => Ok(attributes),
        },
        VerificationOutcome::NotFound => Err(does_not_exist()),
        VerificationOutcome::TransientError(err) => Err(VerifyError::Provider(err)),
    }
}

/// Assert that every tracked resource of the checker's type is gone
///
/// Tracked resources of other types are skipped, as are entries without
/// an identifier (nothing was ever created for them). Stops at the first
/// surviving resource or unexpected error.
pub async fn assert_destroyed(
    checker: &dyn ExistenceCheck,
    tracked: &[State],
) -> Result<(), VerifyError> {
    for state in tracked {
        if state.id.resource_type != checker.resource_type() {
            continue;
        }
        let Some(identifier) = state.identifier.as_deref().filter(|id| !id.is_empty()) else {
            continue;
        };

        match check(checker, identifier, state).await {
            VerificationOutcome::NotFound => continue,
            VerificationOutcome::Found(_) => {
                return Err(VerifyError::StillExists {
                    resource_type: checker.resource_type().to_string(),
                    identifier: identifier.to_string(),
                });
            }
            VerificationOutcome::TransientError(err) => return Err(VerifyError::Provider(err)),
        }
    }

    Ok(())
}
