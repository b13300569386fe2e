//! Provider configuration
//!
//! Settings come from a `provider aws { ... }` block or from CLI flags.
//! Anything left unset falls back to the standard AWS environment and
//! profile chain.

use std::collections::HashMap;

use aws_config::{BehaviorVersion, Region, SdkConfig};
use carina_core::provider::{ProviderError, ProviderResult};
use carina_core::resource::Value;

/// AWS provider settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderConfig {
    /// AWS region (e.g., "us-east-1")
    pub region: Option<String>,
    /// Named profile from the shared config files
    pub profile: Option<String>,
    /// Endpoint override (e.g., a local emulator)
    pub endpoint_url: Option<String>,
}

impl ProviderConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from provider block attributes
    ///
    /// The region may use DSL form (`aws.Region.ap_northeast_1`).
    pub fn from_attributes(attributes: &HashMap<String, Value>) -> ProviderResult<Self> {
        let get = |key: &str| -> ProviderResult<Option<String>> {
            match attributes.get(key) {
                None => Ok(None),
                Some(Value::String(s)) if s.is_empty() => Ok(None),
                Some(Value::String(s)) => Ok(Some(s.clone())),
                Some(_) => Err(ProviderError::configuration(format!(
                    "provider attribute '{}' must be a string",
                    key
                ))),
            }
        };

        Ok(Self {
            region: get("region")?.map(|r| normalize_region(&r)),
            profile: get("profile")?,
            endpoint_url: get("endpoint_url")?,
        })
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = Some(normalize_region(&region.into()));
        self
    }

    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.profile = Some(profile.into());
        self
    }

    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Resolve the shared SDK configuration
    pub async fn load(&self) -> SdkConfig {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = &self.region {
            loader = loader.region(Region::new(region.clone()));
        }
        if let Some(profile) = &self.profile {
            loader = loader.profile_name(profile);
        }
        if let Some(endpoint_url) = &self.endpoint_url {
            loader = loader.endpoint_url(endpoint_url);
        }
        loader.load().await
    }
}

/// Normalize region value (e.g., "aws.Region.ap_northeast_1" -> "ap-northeast-1")
pub fn normalize_region(s: &str) -> String {
    let region_part = if s.contains('.') {
        s.split('.').next_back().unwrap_or(s)
    } else {
        s
    };
    region_part.replace('_', "-")
}
