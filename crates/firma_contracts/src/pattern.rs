#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::{ContractViolation, MonotonicTimeNs, SchemaVersion, Validate};

pub const PATTERN_CONTRACT_VERSION: SchemaVersion = SchemaVersion(1);

/// Upper bound on serialized stroke payloads (SVG text from the capture pad).
pub const MAX_PAYLOAD_BYTES: usize = 262_144;

/// base64(SHA-256) is always 44 chars including padding.
pub const DIGEST_B64_LEN: usize = 44;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OperatorId(String);

impl OperatorId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(id.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for OperatorId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_id("operator_id", &self.0, 64)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PatternId(pub u64);

/// Opaque serialized stroke data as captured by the signature pad.
/// Never interpreted by this subsystem; hashed at enrollment for integrity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload(String);

impl SignaturePayload {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(raw.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Validate for SignaturePayload {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "signature_payload",
                reason: "must not be empty",
            });
        }
        if self.0.len() > MAX_PAYLOAD_BYTES {
            return Err(ContractViolation::InvalidValue {
                field: "signature_payload",
                reason: "exceeds maximum payload size",
            });
        }
        Ok(())
    }
}

/// Textual integrity digest stamped on a pattern at enrollment time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternDigest(String);

impl PatternDigest {
    pub fn new(digest: impl Into<String>) -> Result<Self, ContractViolation> {
        let v = Self(digest.into());
        v.validate()?;
        Ok(v)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for PatternDigest {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.0.len() != DIGEST_B64_LEN {
            return Err(ContractViolation::InvalidValue {
                field: "pattern_digest",
                reason: "must be 44 chars (base64 of a 32-byte digest)",
            });
        }
        let valid = self
            .0
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'+' || b == b'/' || b == b'=');
        if !valid {
            return Err(ContractViolation::InvalidValue {
                field: "pattern_digest",
                reason: "must be standard base64",
            });
        }
        Ok(())
    }
}

/// The three aggregate features derived upstream from a raw capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignatureFeatures {
    pub total_points: u32,
    pub mean_velocity: f32,
    pub mean_pressure: f32,
}

impl SignatureFeatures {
    pub fn v1(
        total_points: u32,
        mean_velocity: f32,
        mean_pressure: f32,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            total_points,
            mean_velocity,
            mean_pressure,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for SignatureFeatures {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.total_points > 1_000_000 {
            return Err(ContractViolation::InvalidValue {
                field: "signature_features.total_points",
                reason: "must be <= 1000000",
            });
        }
        if !self.mean_velocity.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "signature_features.mean_velocity",
            });
        }
        if self.mean_velocity < 0.0 {
            return Err(ContractViolation::InvalidValue {
                field: "signature_features.mean_velocity",
                reason: "must be >= 0",
            });
        }
        if !self.mean_pressure.is_finite() {
            return Err(ContractViolation::NotFinite {
                field: "signature_features.mean_pressure",
            });
        }
        if self.mean_pressure < 0.0 {
            return Err(ContractViolation::InvalidValue {
                field: "signature_features.mean_pressure",
                reason: "must be >= 0",
            });
        }
        Ok(())
    }
}

/// An operator's enrolled reference signature.
///
/// Created only by enrollment. Payload, digest and features are immutable for
/// the life of the row; `active` only ever flips true -> false when a newer
/// enrollment for the same operator supersedes this one.
#[derive(Debug, Clone, PartialEq)]
pub struct SignaturePattern {
    pub schema_version: SchemaVersion,
    pub pattern_id: PatternId,
    pub operator_id: OperatorId,
    pub payload: SignaturePayload,
    pub digest: PatternDigest,
    pub features: SignatureFeatures,
    pub created_at: MonotonicTimeNs,
    pub active: bool,
}

impl SignaturePattern {
    pub fn v1(
        pattern_id: PatternId,
        operator_id: OperatorId,
        payload: SignaturePayload,
        digest: PatternDigest,
        features: SignatureFeatures,
        created_at: MonotonicTimeNs,
        active: bool,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: PATTERN_CONTRACT_VERSION,
            pattern_id,
            operator_id,
            payload,
            digest,
            features,
            created_at,
            active,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for SignaturePattern {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.operator_id.validate()?;
        self.payload.validate()?;
        self.digest.validate()?;
        self.features.validate()?;
        Ok(())
    }
}

/// Input to the enrollment service: a fresh capture plus its derived features.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrollmentRequest {
    pub schema_version: SchemaVersion,
    pub operator_id: OperatorId,
    pub payload: SignaturePayload,
    pub features: SignatureFeatures,
}

impl EnrollmentRequest {
    pub fn v1(
        operator_id: OperatorId,
        payload: SignaturePayload,
        features: SignatureFeatures,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: PATTERN_CONTRACT_VERSION,
            operator_id,
            payload,
            features,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for EnrollmentRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.operator_id.validate()?;
        self.payload.validate()?;
        self.features.validate()?;
        Ok(())
    }
}

/// Input to the verification service. Ephemeral; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationRequest {
    pub schema_version: SchemaVersion,
    pub operator_id: OperatorId,
    pub features: SignatureFeatures,
}

impl VerificationRequest {
    pub fn v1(
        operator_id: OperatorId,
        features: SignatureFeatures,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: PATTERN_CONTRACT_VERSION,
            operator_id,
            features,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for VerificationRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.operator_id.validate()?;
        self.features.validate()?;
        Ok(())
    }
}

/// Per-feature relative deviation ratios, kept for diagnostics even when a
/// single feature already rejects the candidate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureDeviations {
    pub points_deviation: f32,
    pub velocity_deviation: f32,
    pub pressure_deviation: f32,
}

impl Validate for FeatureDeviations {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            (
                "feature_deviations.points_deviation",
                self.points_deviation,
            ),
            (
                "feature_deviations.velocity_deviation",
                self.velocity_deviation,
            ),
            (
                "feature_deviations.pressure_deviation",
                self.pressure_deviation,
            ),
        ] {
            if !value.is_finite() {
                return Err(ContractViolation::NotFinite { field });
            }
            if value < 0.0 {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "must be >= 0",
                });
            }
        }
        Ok(())
    }
}

/// Outcome of one verification call. Ephemeral; returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VerificationResult {
    pub schema_version: SchemaVersion,
    pub matched: bool,
    pub deviations: FeatureDeviations,
}

impl VerificationResult {
    pub fn v1(matched: bool, deviations: FeatureDeviations) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: PATTERN_CONTRACT_VERSION,
            matched,
            deviations,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for VerificationResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.deviations.validate()
    }
}

fn validate_id(field: &'static str, s: &str, max_len: usize) -> Result<(), ContractViolation> {
    if s.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if s.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "too long",
        });
    }
    if !s.is_ascii() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must be ASCII",
        });
    }
    Ok(())
}
