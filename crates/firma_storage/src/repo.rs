#![forbid(unsafe_code)]

use firma_contracts::pattern::{
    OperatorId, PatternDigest, PatternId, SignatureFeatures, SignaturePattern, SignaturePayload,
};
use firma_contracts::MonotonicTimeNs;

use crate::patterns::{
    AuditRecordId, OperatorRecord, StorageError, VerificationAuditInput, VerificationAuditRecord,
};

/// Typed repository interface for the operator registry consumed as a
/// foreign-key target by enrollment.
pub trait OperatorRepo {
    fn insert_operator_row(&mut self, record: OperatorRecord) -> Result<(), StorageError>;
    fn operator_row(&self, operator_id: &OperatorId) -> Option<&OperatorRecord>;
}

/// Typed repository interface for signature-pattern persistence.
///
/// At most one pattern per operator is active at any observable point.
/// `insert_pattern_row` refuses to create a second active row;
/// `enroll_pattern_commit_row` performs deactivate-then-insert as one
/// storage-level transaction.
pub trait PatternRepo {
    fn get_active_pattern_row(&self, operator_id: &OperatorId) -> Option<&SignaturePattern>;

    /// Idempotent. Returns the number of rows flipped; tolerates more than
    /// one active row if the invariant was ever violated externally.
    fn deactivate_active_pattern_rows(&mut self, operator_id: &OperatorId) -> u32;

    fn insert_pattern_row(
        &mut self,
        now: MonotonicTimeNs,
        operator_id: OperatorId,
        payload: SignaturePayload,
        digest: PatternDigest,
        features: SignatureFeatures,
    ) -> Result<SignaturePattern, StorageError>;

    fn enroll_pattern_commit_row(
        &mut self,
        now: MonotonicTimeNs,
        operator_id: OperatorId,
        payload: SignaturePayload,
        digest: PatternDigest,
        features: SignatureFeatures,
    ) -> Result<SignaturePattern, StorageError>;

    fn pattern_rows(&self) -> &[SignaturePattern];

    /// Patterns are immutable once inserted (only the active flag ever
    /// changes, and only via deactivation). Any overwrite attempt fails.
    fn attempt_overwrite_pattern_row(&mut self, pattern_id: PatternId)
        -> Result<(), StorageError>;
}

/// Typed repository interface for the append-only verification audit ledger.
pub trait VerificationAuditRepo {
    fn append_verification_audit_row(
        &mut self,
        now: MonotonicTimeNs,
        input: VerificationAuditInput,
    ) -> Result<AuditRecordId, StorageError>;

    fn verification_audit_rows(&self) -> &[VerificationAuditRecord];

    fn verification_audit_rows_by_operator(
        &self,
        operator_id: &OperatorId,
    ) -> Vec<&VerificationAuditRecord>;
}
