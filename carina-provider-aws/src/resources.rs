//! Resource and data source type definitions
//!
//! Schemas live next to the service code in each module; this table ties
//! the DSL type names to them.

use carina_core::provider::ResourceType;
use carina_core::schema::ResourceSchema;

use crate::{acmpca, imagebuilder, sns};

// =============================================================================
// Type Definitions
// =============================================================================

macro_rules! define_resource_type {
    ($name:ident, $type_name:expr, $schema:path) => {
        pub struct $name;
        impl ResourceType for $name {
            fn name(&self) -> &'static str {
                $type_name
            }
            fn schema(&self) -> ResourceSchema {
                $schema()
            }
        }
    };
}

define_resource_type!(SnsTopicType, sns::TOPIC, sns::topic_schema);
define_resource_type!(
    AcmPcaCertificateType,
    acmpca::CERTIFICATE,
    acmpca::certificate_schema
);
define_resource_type!(
    DistributionConfigurationsType,
    imagebuilder::DISTRIBUTION_CONFIGURATIONS,
    imagebuilder::distribution_configurations_schema
);

/// Managed resource types supported by this provider
pub fn resource_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(SnsTopicType), Box::new(AcmPcaCertificateType)]
}

/// Data source types supported by this provider
pub fn data_source_types() -> Vec<Box<dyn ResourceType>> {
    vec![Box::new(DistributionConfigurationsType)]
}

/// Look up a resource or data source type by name
pub fn find_type(name: &str) -> Option<Box<dyn ResourceType>> {
    resource_types()
        .into_iter()
        .chain(data_source_types())
        .find(|t| t.name() == name)
}
