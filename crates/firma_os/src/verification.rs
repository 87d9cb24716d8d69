#![forbid(unsafe_code)]

use firma_contracts::pattern::{
    OperatorId, SignaturePattern, VerificationRequest, VerificationResult,
};
use firma_contracts::{ContractViolation, MonotonicTimeNs, ReasonCodeId, Validate};
use firma_engines::signature_match::{evaluate, FeatureKind, SignatureMatchConfig};
use firma_storage::patterns::{StorageError, VerificationAuditInput};
use firma_storage::repo::{PatternRepo, VerificationAuditRepo};

pub mod reason_codes {
    use firma_contracts::ReasonCodeId;

    // Signature subsystem reason-code namespace ("SG").
    pub const SIG_OK_MATCHED: ReasonCodeId = ReasonCodeId(0x5347_0010);
    pub const SIG_FAIL_POINTS_DEVIATION: ReasonCodeId = ReasonCodeId(0x5347_0011);
    pub const SIG_FAIL_VELOCITY_DEVIATION: ReasonCodeId = ReasonCodeId(0x5347_0012);
    pub const SIG_FAIL_PRESSURE_DEVIATION: ReasonCodeId = ReasonCodeId(0x5347_0013);
    pub const SIG_FAIL_NO_ACTIVE_PATTERN: ReasonCodeId = ReasonCodeId(0x5347_0014);
}

#[derive(Debug)]
pub enum VerificationError {
    /// The operator has no active enrolled pattern; verification cannot
    /// proceed and never substitutes a default outcome.
    PatternNotFound { operator_id: String },
    InvalidFeatureInput(ContractViolation),
    Storage(StorageError),
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PatternNotFound { operator_id } => {
                write!(f, "no active pattern for operator: {operator_id}")
            }
            Self::InvalidFeatureInput(v) => write!(f, "invalid verification input: {v}"),
            Self::Storage(e) => write!(f, "storage error: {e}"),
        }
    }
}

impl std::error::Error for VerificationError {}

impl From<ContractViolation> for VerificationError {
    fn from(v: ContractViolation) -> Self {
        Self::InvalidFeatureInput(v)
    }
}

impl From<StorageError> for VerificationError {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

/// Verification service: compares a candidate capture against the owner's
/// active pattern. Never mutates pattern state.
#[derive(Debug, Clone)]
pub struct VerificationWiring {
    config: SignatureMatchConfig,
}

impl VerificationWiring {
    pub fn new(config: SignatureMatchConfig) -> Self {
        Self { config }
    }

    pub fn mvp_v1() -> Self {
        Self::new(SignatureMatchConfig::mvp_v1())
    }

    /// Pure decision: takes the store read-only and returns the result plus
    /// the audit row it would record. A concurrent enrollment may race this
    /// read; the store hands back either the old or the new active pattern,
    /// never an interim state.
    pub fn run_verify<S>(
        &self,
        store: &S,
        req: &VerificationRequest,
    ) -> Result<(VerificationResult, VerificationAuditInput), VerificationError>
    where
        S: PatternRepo,
    {
        req.validate()?;

        let pattern = store.get_active_pattern_row(&req.operator_id).ok_or_else(|| {
            VerificationError::PatternNotFound {
                operator_id: req.operator_id.as_str().to_string(),
            }
        })?;

        let eval = evaluate(self.config, &pattern.features, &req.features);
        let result = VerificationResult::v1(eval.matched, eval.deviations)?;
        let audit = VerificationAuditInput {
            operator_id: req.operator_id.clone(),
            pattern_id: pattern.pattern_id,
            matched: eval.matched,
            deviations: eval.deviations,
            reason_code: reason_code_for(eval.rejected_on),
        };
        Ok((result, audit))
    }

    /// Decision plus audit-ledger append. Pattern rows stay untouched; only
    /// the append-only verification ledger grows.
    pub fn run_verify_recorded<S>(
        &self,
        store: &mut S,
        now: MonotonicTimeNs,
        req: &VerificationRequest,
    ) -> Result<VerificationResult, VerificationError>
    where
        S: PatternRepo + VerificationAuditRepo,
    {
        let (result, audit) = self.run_verify(store, req)?;
        store.append_verification_audit_row(now, audit)?;
        Ok(result)
    }
}

/// Lookup half of the exposed surface: the owner's single active pattern,
/// or `PatternNotFound` when the operator never enrolled (or was superseded
/// and deactivated without replacement).
pub fn get_active_pattern<'a, S>(
    store: &'a S,
    operator_id: &OperatorId,
) -> Result<&'a SignaturePattern, VerificationError>
where
    S: PatternRepo,
{
    store
        .get_active_pattern_row(operator_id)
        .ok_or_else(|| VerificationError::PatternNotFound {
            operator_id: operator_id.as_str().to_string(),
        })
}

fn reason_code_for(rejected_on: Option<FeatureKind>) -> ReasonCodeId {
    match rejected_on {
        None => reason_codes::SIG_OK_MATCHED,
        Some(FeatureKind::TotalPoints) => reason_codes::SIG_FAIL_POINTS_DEVIATION,
        Some(FeatureKind::MeanVelocity) => reason_codes::SIG_FAIL_VELOCITY_DEVIATION,
        Some(FeatureKind::MeanPressure) => reason_codes::SIG_FAIL_PRESSURE_DEVIATION,
    }
}
