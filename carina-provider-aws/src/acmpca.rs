//! ACM Private CA certificate resource
//!
//! Certificates are issued asynchronously: `IssueCertificate` returns an ARN
//! right away and `GetCertificate` answers `RequestInProgressException`
//! until the CA has signed it. Destroying a certificate means revoking it.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_acmpca::primitives::Blob;
use aws_sdk_acmpca::types::{RevocationReason, SigningAlgorithm, Validity, ValidityPeriodType};
use carina_core::provider::{BoxFuture, ErrorKind, ProviderError, ProviderResult};
use carina_core::resource::{Resource, ResourceId, State, Value};
use carina_core::schema::{AttributeSchema, AttributeType, ResourceSchema, types};
use carina_core::verify::ExistenceCheck;
use log::{debug, info, warn};

use crate::errors::{from_sdk_error, has_code};
use crate::validation::{SIGNING_ALGORITHMS, VALIDITY_TYPES};

pub const CERTIFICATE: &str = "acmpca.certificate";

const REQUEST_IN_PROGRESS: &str = "RequestInProgressException";
const REQUEST_ALREADY_PROCESSED: &str = "RequestAlreadyProcessedException";
const INVALID_REQUEST: &str = "InvalidRequestException";
const SELF_SIGNED_NOT_REVOCABLE: &str = "Self-signed certificate can not be revoked";

/// Message ACM PCA returns when the CA is being deleted or was never activated
pub const CA_WRONG_STATE: &str = "not in the correct state to have issued certificates";

/// Inputs to `IssueCertificate`
#[derive(Debug, Clone, PartialEq)]
pub struct IssueCertificateRequest {
    pub certificate_authority_arn: String,
    pub csr: String,
    pub signing_algorithm: String,
    pub validity_type: String,
    pub validity_value: i64,
    pub template_arn: Option<String>,
}

/// Output of `GetCertificate`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IssuedCertificate {
    pub certificate: String,
    pub certificate_chain: Option<String>,
}

/// ACM PCA calls used by this provider
#[async_trait]
pub trait AcmPcaApi: Send + Sync {
    /// Request a certificate and return its ARN
    async fn issue(&self, request: &IssueCertificateRequest) -> ProviderResult<String>;

    async fn get(
        &self,
        certificate_arn: &str,
        certificate_authority_arn: &str,
    ) -> ProviderResult<IssuedCertificate>;

    async fn revoke(&self, certificate_authority_arn: &str, serial: &str) -> ProviderResult<()>;
}

#[async_trait]
impl AcmPcaApi for aws_sdk_acmpca::Client {
    async fn issue(&self, request: &IssueCertificateRequest) -> ProviderResult<String> {
        let validity = Validity::builder()
            .r#type(ValidityPeriodType::from(request.validity_type.as_str()))
            .value(request.validity_value)
            .build()
            .map_err(|e| {
                ProviderError::configuration(format!("invalid validity: {}", e)).with_cause(e)
            })?;

        let output = self
            .issue_certificate()
            .certificate_authority_arn(&request.certificate_authority_arn)
            .csr(Blob::new(request.csr.as_bytes()))
            .signing_algorithm(SigningAlgorithm::from(request.signing_algorithm.as_str()))
            .validity(validity)
            .set_template_arn(request.template_arn.clone())
            .send()
            .await
            .map_err(from_sdk_error)?;

        output
            .certificate_arn()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::new("IssueCertificate returned no certificate ARN"))
    }

    async fn get(
        &self,
        certificate_arn: &str,
        certificate_authority_arn: &str,
    ) -> ProviderResult<IssuedCertificate> {
        let output = self
            .get_certificate()
            .certificate_arn(certificate_arn)
            .certificate_authority_arn(certificate_authority_arn)
            .send()
            .await
            .map_err(from_sdk_error)?;

        Ok(IssuedCertificate {
            certificate: output.certificate().unwrap_or_default().to_string(),
            certificate_chain: output.certificate_chain().map(str::to_string),
        })
    }

    async fn revoke(&self, certificate_authority_arn: &str, serial: &str) -> ProviderResult<()> {
        self.revoke_certificate()
            .certificate_authority_arn(certificate_authority_arn)
            .certificate_serial(serial)
            .revocation_reason(RevocationReason::Unspecified)
            .send()
            .await
            .map_err(from_sdk_error)?;
        Ok(())
    }
}

/// Polling settings for certificate issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaitConfig {
    pub max_attempts: u32,
    pub delay: Duration,
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            delay: Duration::from_secs(5),
        }
    }
}

pub fn certificate_schema() -> ResourceSchema {
    let enum_of = |values: &[&str]| AttributeType::Enum(values.iter().map(|s| s.to_string()).collect());

    ResourceSchema::new(CERTIFICATE)
        .with_description("A certificate issued by an ACM Private CA")
        .attribute(AttributeSchema::new("certificate_authority_arn", types::arn()).required())
        .attribute(
            AttributeSchema::new("certificate_signing_request", AttributeType::String)
                .required()
                .with_description("PEM-encoded CSR"),
        )
        .attribute(
            AttributeSchema::new("signing_algorithm", enum_of(SIGNING_ALGORITHMS)).required(),
        )
        .attribute(
            AttributeSchema::new(
                "validity",
                AttributeType::Block(vec![
                    AttributeSchema::new("type", enum_of(VALIDITY_TYPES)).required(),
                    AttributeSchema::new("value", types::positive_int()).required(),
                ]),
            )
            .required(),
        )
        .attribute(AttributeSchema::new("template_arn", AttributeType::String))
        .attribute(AttributeSchema::new("arn", types::arn()).computed())
        .attribute(AttributeSchema::new("certificate", AttributeType::String).computed())
        .attribute(AttributeSchema::new("certificate_chain", AttributeType::String).computed())
}

// =============================================================================
// Helpers
// =============================================================================

/// Hex serial number of a PEM-encoded certificate, as `RevokeCertificate` expects
pub fn certificate_serial(pem: &str) -> ProviderResult<String> {
    let (_, pem) = x509_parser::pem::parse_x509_pem(pem.as_bytes()).map_err(|e| {
        ProviderError::configuration(format!("failed to decode certificate PEM: {}", e))
    })?;
    let certificate = pem.parse_x509().map_err(|e| {
        ProviderError::configuration(format!("failed to parse certificate: {}", e))
    })?;
    Ok(format!("{:x}", certificate.tbs_certificate.serial))
}

/// CA ARN embedded in a certificate ARN
///
/// `arn:aws:acm-pca:<region>:<account>:certificate-authority/<ca>/certificate/<id>`
pub fn certificate_authority_arn_from(certificate_arn: &str) -> ProviderResult<String> {
    match certificate_arn.split_once("/certificate/") {
        Some((ca_arn, id)) if !ca_arn.is_empty() && !id.is_empty() => Ok(ca_arn.to_string()),
        _ => Err(ProviderError::configuration(format!(
            "'{}' is not an ACM PCA certificate ARN",
            certificate_arn
        ))),
    }
}

/// CA ARN from tracked attributes, falling back to the certificate ARN
fn resolve_ca_arn(certificate_arn: &str, attributes: &HashMap<String, Value>) -> ProviderResult<String> {
    match attributes.get("certificate_authority_arn") {
        Some(Value::String(arn)) if !arn.is_empty() => Ok(arn.clone()),
        _ => certificate_authority_arn_from(certificate_arn),
    }
}

/// Revocation errors that mean the certificate needs no further action
pub fn revocation_settled(err: &ProviderError) -> bool {
    err.is_not_found()
        || has_code(err, REQUEST_ALREADY_PROCESSED)
        || has_code(err, REQUEST_IN_PROGRESS)
        || (has_code(err, INVALID_REQUEST) && err.message.contains(SELF_SIGNED_NOT_REVOCABLE))
}

fn request_from_resource(resource: &Resource) -> ProviderResult<IssueCertificateRequest> {
    let required = |key: &str| -> ProviderResult<String> {
        resource.get_string(key).map(str::to_string).ok_or_else(|| {
            ProviderError::configuration(format!("{} is required", key))
                .for_resource(resource.id.clone())
        })
    };

    let Some(Value::Map(validity)) = resource.attributes.get("validity") else {
        return Err(ProviderError::configuration("validity is required")
            .for_resource(resource.id.clone()));
    };
    let validity_type = validity
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let validity_value = validity.get("value").and_then(Value::as_int).unwrap_or_default();

    Ok(IssueCertificateRequest {
        certificate_authority_arn: required("certificate_authority_arn")?,
        csr: required("certificate_signing_request")?,
        signing_algorithm: required("signing_algorithm")?,
        validity_type,
        validity_value,
        template_arn: resource.get_string("template_arn").map(str::to_string),
    })
}

/// State attributes for an issued certificate
///
/// Inputs the API cannot return are carried over from `declared`.
fn certificate_attributes(
    certificate_arn: &str,
    ca_arn: &str,
    issued: IssuedCertificate,
    declared: &HashMap<String, Value>,
) -> HashMap<String, Value> {
    let mut attributes: HashMap<String, Value> = [
        "certificate_signing_request",
        "signing_algorithm",
        "validity",
        "template_arn",
    ]
    .into_iter()
    .filter_map(|key| declared.get(key).map(|v| (key.to_string(), v.clone())))
    .collect();

    attributes.insert("arn".to_string(), Value::String(certificate_arn.to_string()));
    attributes.insert(
        "certificate_authority_arn".to_string(),
        Value::String(ca_arn.to_string()),
    );
    attributes.insert("certificate".to_string(), Value::String(issued.certificate));
    if let Some(chain) = issued.certificate_chain {
        attributes.insert("certificate_chain".to_string(), Value::String(chain));
    }
    attributes
}

/// Wait until the CA has issued the certificate
async fn wait_for_certificate(
    api: &dyn AcmPcaApi,
    certificate_arn: &str,
    ca_arn: &str,
    wait: WaitConfig,
) -> ProviderResult<IssuedCertificate> {
    for attempt in 1..=wait.max_attempts {
        match api.get(certificate_arn, ca_arn).await {
            Ok(issued) => return Ok(issued),
            Err(e) if has_code(&e, REQUEST_IN_PROGRESS) => {
                debug!(
                    "certificate {} not issued yet (attempt {}/{})",
                    certificate_arn, attempt, wait.max_attempts
                );
                if attempt < wait.max_attempts {
                    tokio::time::sleep(wait.delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    Err(ProviderError::new(format!(
        "timed out waiting for certificate {} to be issued",
        certificate_arn
    )))
}

// =============================================================================
// Operations
// =============================================================================

/// Read a certificate by ARN
pub async fn read_certificate(
    api: &dyn AcmPcaApi,
    id: &ResourceId,
    certificate_arn: &str,
    declared: &HashMap<String, Value>,
) -> ProviderResult<State> {
    let ca_arn = resolve_ca_arn(certificate_arn, declared).map_err(|e| e.for_resource(id.clone()))?;

    let issued = match api.get(certificate_arn, &ca_arn).await {
        Ok(issued) if issued.certificate.is_empty() => return Ok(State::not_found(id.clone())),
        Ok(issued) => issued,
        Err(e) if e.is_not_found() => return Ok(State::not_found(id.clone())),
        Err(e) => {
            return Err(e
                .context("reading ACM PCA Certificate")
                .for_resource(id.clone()));
        }
    };

    Ok(State::existing(
        id.clone(),
        certificate_attributes(certificate_arn, &ca_arn, issued, declared),
    )
    .with_identifier(certificate_arn))
}

/// Issue a certificate and wait for it
pub async fn create_certificate(
    api: &dyn AcmPcaApi,
    resource: &Resource,
    wait: WaitConfig,
) -> ProviderResult<State> {
    let id = resource.id.clone();
    let request = request_from_resource(resource)?;

    let certificate_arn = api
        .issue(&request)
        .await
        .map_err(|e| e.context("issuing ACM PCA Certificate").for_resource(id.clone()))?;
    info!("requested certificate {}", certificate_arn);

    let issued = wait_for_certificate(api, &certificate_arn, &request.certificate_authority_arn, wait)
        .await
        .map_err(|e| {
            e.context(format!("waiting for ACM PCA Certificate ({})", certificate_arn))
                .for_resource(id.clone())
        })?;

    Ok(State::existing(
        id,
        certificate_attributes(
            &certificate_arn,
            &request.certificate_authority_arn,
            issued,
            &resource.attributes,
        ),
    )
    .with_identifier(certificate_arn))
}

/// Revoke a certificate
///
/// A certificate that is gone, already revoked, mid-revocation, or
/// self-signed needs nothing more.
pub async fn delete_certificate(api: &dyn AcmPcaApi, state: &State) -> ProviderResult<()> {
    let id = state.id.clone();
    let certificate_arn = state.identifier.as_deref().ok_or_else(|| {
        ProviderError::configuration("certificate ARN is not set").for_resource(id.clone())
    })?;
    let ca_arn = resolve_ca_arn(certificate_arn, &state.attributes)
        .map_err(|e| e.for_resource(id.clone()))?;

    let pem = match state.get_string("certificate").filter(|s| !s.is_empty()) {
        Some(pem) => pem.to_string(),
        None => match api.get(certificate_arn, &ca_arn).await {
            Ok(issued) => issued.certificate,
            Err(e) if e.is_not_found() => return Ok(()),
            Err(e) => {
                return Err(e
                    .context("reading ACM PCA Certificate")
                    .for_resource(id));
            }
        },
    };
    let serial = certificate_serial(&pem).map_err(|e| e.for_resource(id.clone()))?;

    match api.revoke(&ca_arn, &serial).await {
        Ok(()) => {
            info!("revoked certificate {} (serial {})", certificate_arn, serial);
            Ok(())
        }
        Err(e) if revocation_settled(&e) => {
            debug!("certificate {} needs no revocation: {}", certificate_arn, e);
            Ok(())
        }
        Err(e) => Err(e
            .context(format!("revoking ACM PCA Certificate ({})", certificate_arn))
            .for_resource(id)),
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Existence check for `acmpca.certificate`
///
/// A CA that is being deleted refuses to return its certificates; that
/// counts as the certificate being gone.
pub struct CertificateExistence {
    api: Arc<dyn AcmPcaApi>,
}

impl CertificateExistence {
    pub fn new(api: Arc<dyn AcmPcaApi>) -> Self {
        Self { api }
    }
}

impl ExistenceCheck for CertificateExistence {
    fn resource_type(&self) -> &'static str {
        CERTIFICATE
    }

    fn lookup<'a>(
        &'a self,
        identifier: &'a str,
        tracked: &'a State,
    ) -> BoxFuture<'a, ProviderResult<HashMap<String, Value>>> {
        Box::pin(async move {
            let ca_arn = resolve_ca_arn(identifier, &tracked.attributes)?;
            let issued = self.api.get(identifier, &ca_arn).await?;
            Ok(certificate_attributes(identifier, &ca_arn, issued, &HashMap::new()))
        })
    }

    fn treats_as_absent(&self, err: &ProviderError) -> bool {
        if err.is_not_found() {
            return true;
        }
        if err.kind() == ErrorKind::InvalidState && err.message.contains(CA_WRONG_STATE) {
            warn!("treating certificate as absent: {}", err);
            return true;
        }
        false
    }

    fn artifact_attribute(&self) -> Option<&'static str> {
        Some("certificate")
    }
}
