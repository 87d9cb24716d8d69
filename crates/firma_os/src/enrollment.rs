#![forbid(unsafe_code)]

use firma_contracts::pattern::{EnrollmentRequest, PatternDigest, SignaturePattern};
use firma_contracts::{ContractViolation, MonotonicTimeNs, Validate};
use firma_engines::payload_digest::digest_b64;
use firma_storage::patterns::StorageError;
use firma_storage::repo::{OperatorRepo, PatternRepo};

pub mod reason_codes {
    use firma_contracts::ReasonCodeId;

    // Signature subsystem reason-code namespace ("SG").
    pub const SIG_ENROLLED_OK: ReasonCodeId = ReasonCodeId(0x5347_0001);
    pub const SIG_FAIL_OPERATOR_UNKNOWN: ReasonCodeId = ReasonCodeId(0x5347_0002);
}

#[derive(Debug)]
pub enum EnrollmentError {
    /// The owner does not reference a registered operator. Distinct from a
    /// registered operator that simply never enrolled.
    OperatorNotFound { operator_id: String },
    InvalidFeatureInput(ContractViolation),
    Storage(StorageError),
}

impl std::fmt::Display for EnrollmentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OperatorNotFound { operator_id } => {
                write!(f, "operator not found: {operator_id}")
            }
            Self::InvalidFeatureInput(v) => write!(f, "invalid enrollment input: {v}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for EnrollmentError {}

impl From<ContractViolation> for EnrollmentError {
    fn from(v: ContractViolation) -> Self {
        Self::InvalidFeatureInput(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnrollmentWiringConfig {
    /// When true the wiring verifies operator existence itself instead of
    /// trusting the surrounding system to have done so.
    pub verify_operator_exists: bool,
}

impl EnrollmentWiringConfig {
    pub fn mvp_v1() -> Self {
        Self {
            verify_operator_exists: true,
        }
    }
}

/// Enrollment service: deactivate prior active patterns for the owner, stamp
/// the integrity digest, persist the new pattern as the single active one.
#[derive(Debug, Clone)]
pub struct EnrollmentWiring {
    config: EnrollmentWiringConfig,
}

impl EnrollmentWiring {
    pub fn new(config: EnrollmentWiringConfig) -> Self {
        Self { config }
    }

    /// Runs one enrollment as a single logical transaction. The
    /// deactivate-then-insert pair happens inside one store call under the
    /// store's exclusive borrow, so a failed insert cannot strand the owner
    /// with every pattern deactivated.
    pub fn run_enroll<S>(
        &self,
        store: &mut S,
        now: MonotonicTimeNs,
        req: &EnrollmentRequest,
    ) -> Result<SignaturePattern, EnrollmentError>
    where
        S: OperatorRepo + PatternRepo,
    {
        req.validate()?;

        if self.config.verify_operator_exists && store.operator_row(&req.operator_id).is_none() {
            return Err(EnrollmentError::OperatorNotFound {
                operator_id: req.operator_id.as_str().to_string(),
            });
        }

        let digest = PatternDigest::new(digest_b64(req.payload.as_bytes()))?;

        store
            .enroll_pattern_commit_row(
                now,
                req.operator_id.clone(),
                req.payload.clone(),
                digest,
                req.features,
            )
            .map_err(|e| match e {
                // The store's own FK check, surfaced when the existence check
                // is delegated down.
                StorageError::ForeignKeyViolation { key, .. } => {
                    EnrollmentError::OperatorNotFound { operator_id: key }
                }
                other => EnrollmentError::Storage(other),
            })
    }
}
