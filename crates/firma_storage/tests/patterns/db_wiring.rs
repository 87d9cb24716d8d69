#![forbid(unsafe_code)]

use firma_contracts::pattern::{
    FeatureDeviations, OperatorId, PatternDigest, PatternId, SignatureFeatures, SignaturePayload,
};
use firma_contracts::{MonotonicTimeNs, ReasonCodeId};
use firma_storage::patterns::{
    OperatorRecord, PatternStore, StorageError, VerificationAuditInput,
};
use firma_storage::repo::{OperatorRepo, PatternRepo, VerificationAuditRepo};

fn operator(id: &str) -> OperatorId {
    OperatorId::new(id).unwrap()
}

fn payload(svg: &str) -> SignaturePayload {
    SignaturePayload::new(svg).unwrap()
}

fn digest() -> PatternDigest {
    PatternDigest::new("47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=").unwrap()
}

fn features(total_points: u32, mean_velocity: f32, mean_pressure: f32) -> SignatureFeatures {
    SignatureFeatures::v1(total_points, mean_velocity, mean_pressure).unwrap()
}

fn seed_operator(store: &mut PatternStore, id: &str) -> OperatorId {
    let operator_id = operator(id);
    store
        .insert_operator_row(
            OperatorRecord::v1(
                operator_id.clone(),
                "Maria Gonzalez",
                4_211,
                Some("maria.gonzalez@example.com".to_string()),
                MonotonicTimeNs(1),
            )
            .unwrap(),
        )
        .unwrap();
    operator_id
}

#[test]
fn at_pat_db_01_enroll_commit_keeps_one_active_row() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    s.enroll_pattern_commit_row(
        MonotonicTimeNs(10),
        op.clone(),
        payload("<svg>first</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    )
    .unwrap();
    s.enroll_pattern_commit_row(
        MonotonicTimeNs(20),
        op.clone(),
        payload("<svg>second</svg>"),
        digest(),
        features(110, 11.0, 5.5),
    )
    .unwrap();
    s.enroll_pattern_commit_row(
        MonotonicTimeNs(30),
        op.clone(),
        payload("<svg>third</svg>"),
        digest(),
        features(120, 12.0, 6.0),
    )
    .unwrap();

    let active: Vec<_> = s
        .pattern_rows()
        .iter()
        .filter(|p| p.operator_id == op && p.active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].pattern_id, PatternId(3));
    assert_eq!(s.pattern_rows().len(), 3);
}

#[test]
fn at_pat_db_02_enrollment_supersedes_previous_pattern() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    let first = s
        .enroll_pattern_commit_row(
            MonotonicTimeNs(10),
            op.clone(),
            payload("<svg>first</svg>"),
            digest(),
            features(100, 10.0, 5.0),
        )
        .unwrap();
    let second = s
        .enroll_pattern_commit_row(
            MonotonicTimeNs(20),
            op.clone(),
            payload("<svg>second</svg>"),
            digest(),
            features(140, 9.0, 4.0),
        )
        .unwrap();

    let active = s.get_active_pattern_row(&op).unwrap();
    assert_eq!(active.pattern_id, second.pattern_id);
    assert_eq!(active.features, features(140, 9.0, 4.0));

    let first_row = s
        .pattern_rows()
        .iter()
        .find(|p| p.pattern_id == first.pattern_id)
        .unwrap();
    assert!(!first_row.active);
}

#[test]
fn at_pat_db_03_get_active_is_idempotent() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    s.enroll_pattern_commit_row(
        MonotonicTimeNs(10),
        op.clone(),
        payload("<svg>only</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    )
    .unwrap();

    let a = s.get_active_pattern_row(&op).unwrap().clone();
    let b = s.get_active_pattern_row(&op).unwrap().clone();
    assert_eq!(a, b);
}

#[test]
fn at_pat_db_04_deactivate_is_idempotent() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    s.enroll_pattern_commit_row(
        MonotonicTimeNs(10),
        op.clone(),
        payload("<svg>only</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    )
    .unwrap();

    assert_eq!(s.deactivate_active_pattern_rows(&op), 1);
    assert_eq!(s.deactivate_active_pattern_rows(&op), 0);
    assert!(s.get_active_pattern_row(&op).is_none());
}

#[test]
fn at_pat_db_05_insert_refuses_second_active_row() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    s.insert_pattern_row(
        MonotonicTimeNs(10),
        op.clone(),
        payload("<svg>first</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    )
    .unwrap();

    let second = s.insert_pattern_row(
        MonotonicTimeNs(20),
        op.clone(),
        payload("<svg>second</svg>"),
        digest(),
        features(110, 11.0, 5.5),
    );
    assert!(matches!(
        second,
        Err(StorageError::ActiveInvariantViolation { .. })
    ));

    // After explicit deactivation the insert is accepted again.
    s.deactivate_active_pattern_rows(&op);
    assert!(s
        .insert_pattern_row(
            MonotonicTimeNs(30),
            op,
            payload("<svg>second</svg>"),
            digest(),
            features(110, 11.0, 5.5),
        )
        .is_ok());
}

#[test]
fn at_pat_db_06_enroll_rejects_unknown_operator() {
    let mut s = PatternStore::new_in_memory();

    let r = s.enroll_pattern_commit_row(
        MonotonicTimeNs(10),
        operator("ghost"),
        payload("<svg>first</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    );
    assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
    assert!(s.pattern_rows().is_empty());
}

#[test]
fn at_pat_db_07_operator_rows_enforce_unique_key() {
    let mut s = PatternStore::new_in_memory();
    seed_operator(&mut s, "op_1");

    let dup = s.insert_operator_row(
        OperatorRecord::v1(
            operator("op_1"),
            "Maria Gonzalez",
            4_211,
            None,
            MonotonicTimeNs(2),
        )
        .unwrap(),
    );
    assert!(matches!(dup, Err(StorageError::DuplicateKey { .. })));
}

#[test]
fn at_pat_db_08_pattern_rows_are_append_only() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");

    let row = s
        .enroll_pattern_commit_row(
            MonotonicTimeNs(10),
            op,
            payload("<svg>only</svg>"),
            digest(),
            features(100, 10.0, 5.0),
        )
        .unwrap();

    assert!(matches!(
        s.attempt_overwrite_pattern_row(row.pattern_id),
        Err(StorageError::AppendOnlyViolation { .. })
    ));
}

#[test]
fn at_pat_db_09_owners_are_isolated() {
    let mut s = PatternStore::new_in_memory();
    let op_a = seed_operator(&mut s, "op_a");
    let op_b = seed_operator(&mut s, "op_b");

    s.enroll_pattern_commit_row(
        MonotonicTimeNs(10),
        op_a.clone(),
        payload("<svg>a</svg>"),
        digest(),
        features(100, 10.0, 5.0),
    )
    .unwrap();
    s.enroll_pattern_commit_row(
        MonotonicTimeNs(20),
        op_b.clone(),
        payload("<svg>b</svg>"),
        digest(),
        features(200, 20.0, 9.0),
    )
    .unwrap();

    // Re-enrolling one owner leaves the other owner's active pattern alone.
    s.enroll_pattern_commit_row(
        MonotonicTimeNs(30),
        op_a.clone(),
        payload("<svg>a2</svg>"),
        digest(),
        features(105, 10.5, 5.2),
    )
    .unwrap();

    assert_eq!(
        s.get_active_pattern_row(&op_b).unwrap().features,
        features(200, 20.0, 9.0)
    );
    assert_eq!(
        s.get_active_pattern_row(&op_a).unwrap().features,
        features(105, 10.5, 5.2)
    );
}

#[test]
fn at_pat_db_10_audit_ledger_appends_in_order() {
    let mut s = PatternStore::new_in_memory();
    let op = seed_operator(&mut s, "op_1");
    let row = s
        .enroll_pattern_commit_row(
            MonotonicTimeNs(10),
            op.clone(),
            payload("<svg>only</svg>"),
            digest(),
            features(100, 10.0, 5.0),
        )
        .unwrap();

    let deviations = FeatureDeviations {
        points_deviation: 0.2,
        velocity_deviation: 0.3,
        pressure_deviation: 0.3,
    };
    let first = s
        .append_verification_audit_row(
            MonotonicTimeNs(40),
            VerificationAuditInput {
                operator_id: op.clone(),
                pattern_id: row.pattern_id,
                matched: true,
                deviations,
                reason_code: ReasonCodeId(1),
            },
        )
        .unwrap();
    let second = s
        .append_verification_audit_row(
            MonotonicTimeNs(50),
            VerificationAuditInput {
                operator_id: op.clone(),
                pattern_id: row.pattern_id,
                matched: false,
                deviations,
                reason_code: ReasonCodeId(2),
            },
        )
        .unwrap();

    assert!(first < second);
    let rows = s.verification_audit_rows_by_operator(&op);
    assert_eq!(rows.len(), 2);
    assert!(rows[0].recorded_at < rows[1].recorded_at);
    assert!(rows[0].matched);
    assert!(!rows[1].matched);
}

#[test]
fn at_pat_db_11_audit_append_rejects_unknown_operator() {
    let mut s = PatternStore::new_in_memory();

    let r = s.append_verification_audit_row(
        MonotonicTimeNs(10),
        VerificationAuditInput {
            operator_id: operator("ghost"),
            pattern_id: PatternId(1),
            matched: false,
            deviations: FeatureDeviations {
                points_deviation: 0.0,
                velocity_deviation: 0.0,
                pressure_deviation: 0.0,
            },
            reason_code: ReasonCodeId(1),
        },
    );
    assert!(matches!(r, Err(StorageError::ForeignKeyViolation { .. })));
}
