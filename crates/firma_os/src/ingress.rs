#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use firma_contracts::pattern::{
    EnrollmentRequest, FeatureDeviations, OperatorId, SignatureFeatures, SignaturePayload,
    VerificationRequest, VerificationResult,
};
use firma_contracts::ContractViolation;

#[derive(Debug)]
pub enum IngressError {
    Json(serde_json::Error),
    Contract(ContractViolation),
}

impl std::fmt::Display for IngressError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::Contract(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for IngressError {}

impl From<serde_json::Error> for IngressError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<ContractViolation> for IngressError {
    fn from(v: ContractViolation) -> Self {
        Self::Contract(v)
    }
}

/// Wire shape of an enrollment request:
/// `{ownerId, rawPayload, totalPoints, meanVelocity, meanPressure}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentInput {
    pub owner_id: String,
    pub raw_payload: String,
    #[serde(flatten)]
    pub features: SignatureFeatures,
}

/// Wire shape of a verification request:
/// `{ownerId, totalPoints, meanVelocity, meanPressure}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationInput {
    pub owner_id: String,
    #[serde(flatten)]
    pub features: SignatureFeatures,
}

/// Wire shape of a verification response: the boolean outcome plus the three
/// deviation ratios for the caller's diagnostics.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutcome {
    pub matched: bool,
    #[serde(flatten)]
    pub deviations: FeatureDeviations,
}

pub fn parse_enrollment_input(json: &str) -> Result<EnrollmentRequest, IngressError> {
    let input: EnrollmentInput = serde_json::from_str(json)?;
    let operator_id = OperatorId::new(input.owner_id)?;
    let payload = SignaturePayload::new(input.raw_payload)?;
    Ok(EnrollmentRequest::v1(operator_id, payload, input.features)?)
}

pub fn parse_verification_input(json: &str) -> Result<VerificationRequest, IngressError> {
    let input: VerificationInput = serde_json::from_str(json)?;
    let operator_id = OperatorId::new(input.owner_id)?;
    Ok(VerificationRequest::v1(operator_id, input.features)?)
}

pub fn encode_verification_outcome(result: &VerificationResult) -> Result<String, IngressError> {
    let outcome = VerificationOutcome {
        matched: result.matched,
        deviations: result.deviations,
    };
    Ok(serde_json::to_string(&outcome)?)
}
