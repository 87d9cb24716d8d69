#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use firma_contracts::pattern::{
    FeatureDeviations, OperatorId, PatternDigest, PatternId, SignatureFeatures, SignaturePattern,
    SignaturePayload, PATTERN_CONTRACT_VERSION,
};
use firma_contracts::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};

use crate::repo::{OperatorRepo, PatternRepo, VerificationAuditRepo};

#[derive(Debug, Clone, PartialEq)]
pub enum StorageError {
    ForeignKeyViolation {
        table: &'static str,
        key: String,
    },
    DuplicateKey {
        table: &'static str,
        key: String,
    },
    AppendOnlyViolation {
        table: &'static str,
    },
    ActiveInvariantViolation {
        table: &'static str,
        key: String,
    },
    ContractViolation(ContractViolation),
}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        StorageError::ContractViolation(v)
    }
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignKeyViolation { table, key } => {
                write!(f, "foreign key violation on {table}: {key}")
            }
            Self::DuplicateKey { table, key } => write!(f, "duplicate key on {table}: {key}"),
            Self::AppendOnlyViolation { table } => write!(f, "append-only violation on {table}"),
            Self::ActiveInvariantViolation { table, key } => {
                write!(f, "active-pattern invariant violation on {table}: {key}")
            }
            Self::ContractViolation(v) => write!(f, "contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

/// Registry row for an operator, the foreign-key target of enrollment.
/// The wider audit backend owns the full operator lifecycle; this store only
/// needs existence plus the identification fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OperatorRecord {
    pub schema_version: SchemaVersion,
    pub operator_id: OperatorId,
    pub full_name: String,
    pub file_number: u32,
    pub email: Option<String>,
    pub created_at: MonotonicTimeNs,
}

impl OperatorRecord {
    pub fn v1(
        operator_id: OperatorId,
        full_name: impl Into<String>,
        file_number: u32,
        email: Option<String>,
        created_at: MonotonicTimeNs,
    ) -> Result<Self, ContractViolation> {
        let v = Self {
            schema_version: PATTERN_CONTRACT_VERSION,
            operator_id,
            full_name: full_name.into(),
            file_number,
            email,
            created_at,
        };
        v.validate()?;
        Ok(v)
    }
}

impl Validate for OperatorRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.operator_id.validate()?;
        if self.full_name.trim().is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "operator_record.full_name",
                reason: "must not be empty",
            });
        }
        if self.full_name.len() > 100 {
            return Err(ContractViolation::InvalidValue {
                field: "operator_record.full_name",
                reason: "must be <= 100 chars",
            });
        }
        if let Some(email) = &self.email {
            if email.len() > 100 {
                return Err(ContractViolation::InvalidValue {
                    field: "operator_record.email",
                    reason: "must be <= 100 chars",
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct AuditRecordId(pub u64);

/// Input for one verification audit row; validated before append.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationAuditInput {
    pub operator_id: OperatorId,
    pub pattern_id: PatternId,
    pub matched: bool,
    pub deviations: FeatureDeviations,
    pub reason_code: ReasonCodeId,
}

impl Validate for VerificationAuditInput {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.operator_id.validate()?;
        self.deviations.validate()?;
        if self.reason_code.0 == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "verification_audit_input.reason_code",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Append-only record of one verification decision, with the per-feature
/// deviation ratios kept for later review.
#[derive(Debug, Clone, PartialEq)]
pub struct VerificationAuditRecord {
    pub schema_version: SchemaVersion,
    pub audit_id: AuditRecordId,
    pub operator_id: OperatorId,
    pub pattern_id: PatternId,
    pub matched: bool,
    pub deviations: FeatureDeviations,
    pub reason_code: ReasonCodeId,
    pub recorded_at: MonotonicTimeNs,
}

/// Deterministic in-memory store for operators, signature patterns and the
/// verification audit ledger.
///
/// All mutations take `&mut self`; the enroll commit performs the whole
/// deactivate-then-insert sequence inside one call, so under exclusive
/// access no caller can observe a deactivated-but-not-reinserted interim
/// state. Share the store behind a lock when requests run concurrently.
#[derive(Debug, Clone, Default)]
pub struct PatternStore {
    operators: BTreeMap<OperatorId, OperatorRecord>,
    patterns: Vec<SignaturePattern>,
    audit_rows: Vec<VerificationAuditRecord>,
}

impl PatternStore {
    pub fn new_in_memory() -> Self {
        Self::default()
    }

    fn next_pattern_id(&self) -> PatternId {
        PatternId(self.patterns.len() as u64 + 1)
    }

    fn next_audit_id(&self) -> AuditRecordId {
        AuditRecordId(self.audit_rows.len() as u64 + 1)
    }
}

impl OperatorRepo for PatternStore {
    fn insert_operator_row(&mut self, record: OperatorRecord) -> Result<(), StorageError> {
        record.validate()?;
        if self.operators.contains_key(&record.operator_id) {
            return Err(StorageError::DuplicateKey {
                table: "operators",
                key: record.operator_id.as_str().to_string(),
            });
        }
        self.operators.insert(record.operator_id.clone(), record);
        Ok(())
    }

    fn operator_row(&self, operator_id: &OperatorId) -> Option<&OperatorRecord> {
        self.operators.get(operator_id)
    }
}

impl PatternRepo for PatternStore {
    fn get_active_pattern_row(&self, operator_id: &OperatorId) -> Option<&SignaturePattern> {
        // Newest-first so an externally violated invariant still yields a
        // single deterministic row.
        self.patterns
            .iter()
            .rev()
            .find(|p| p.operator_id == *operator_id && p.active)
    }

    fn deactivate_active_pattern_rows(&mut self, operator_id: &OperatorId) -> u32 {
        let mut affected = 0;
        for p in self
            .patterns
            .iter_mut()
            .filter(|p| p.operator_id == *operator_id && p.active)
        {
            p.active = false;
            affected += 1;
        }
        affected
    }

    fn insert_pattern_row(
        &mut self,
        now: MonotonicTimeNs,
        operator_id: OperatorId,
        payload: SignaturePayload,
        digest: PatternDigest,
        features: SignatureFeatures,
    ) -> Result<SignaturePattern, StorageError> {
        if !self.operators.contains_key(&operator_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "signature_patterns",
                key: operator_id.as_str().to_string(),
            });
        }
        if self.get_active_pattern_row(&operator_id).is_some() {
            return Err(StorageError::ActiveInvariantViolation {
                table: "signature_patterns",
                key: operator_id.as_str().to_string(),
            });
        }
        let row = SignaturePattern::v1(
            self.next_pattern_id(),
            operator_id,
            payload,
            digest,
            features,
            now,
            true,
        )?;
        self.patterns.push(row.clone());
        Ok(row)
    }

    fn enroll_pattern_commit_row(
        &mut self,
        now: MonotonicTimeNs,
        operator_id: OperatorId,
        payload: SignaturePayload,
        digest: PatternDigest,
        features: SignatureFeatures,
    ) -> Result<SignaturePattern, StorageError> {
        if !self.operators.contains_key(&operator_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "signature_patterns",
                key: operator_id.as_str().to_string(),
            });
        }
        // Validate the full row before touching existing state so a rejected
        // input cannot leave prior patterns deactivated.
        let row = SignaturePattern::v1(
            self.next_pattern_id(),
            operator_id.clone(),
            payload,
            digest,
            features,
            now,
            true,
        )?;
        self.deactivate_active_pattern_rows(&operator_id);
        self.patterns.push(row.clone());
        Ok(row)
    }

    fn pattern_rows(&self) -> &[SignaturePattern] {
        &self.patterns
    }

    fn attempt_overwrite_pattern_row(
        &mut self,
        pattern_id: PatternId,
    ) -> Result<(), StorageError> {
        if self.patterns.iter().any(|p| p.pattern_id == pattern_id) {
            return Err(StorageError::AppendOnlyViolation {
                table: "signature_patterns",
            });
        }
        Err(StorageError::ForeignKeyViolation {
            table: "signature_patterns",
            key: pattern_id.0.to_string(),
        })
    }
}

impl VerificationAuditRepo for PatternStore {
    fn append_verification_audit_row(
        &mut self,
        now: MonotonicTimeNs,
        input: VerificationAuditInput,
    ) -> Result<AuditRecordId, StorageError> {
        input.validate()?;
        if !self.operators.contains_key(&input.operator_id) {
            return Err(StorageError::ForeignKeyViolation {
                table: "verification_audit",
                key: input.operator_id.as_str().to_string(),
            });
        }
        let audit_id = self.next_audit_id();
        self.audit_rows.push(VerificationAuditRecord {
            schema_version: PATTERN_CONTRACT_VERSION,
            audit_id,
            operator_id: input.operator_id,
            pattern_id: input.pattern_id,
            matched: input.matched,
            deviations: input.deviations,
            reason_code: input.reason_code,
            recorded_at: now,
        });
        Ok(audit_id)
    }

    fn verification_audit_rows(&self) -> &[VerificationAuditRecord] {
        &self.audit_rows
    }

    fn verification_audit_rows_by_operator(
        &self,
        operator_id: &OperatorId,
    ) -> Vec<&VerificationAuditRecord> {
        self.audit_rows
            .iter()
            .filter(|r| r.operator_id == *operator_id)
            .collect()
    }
}
