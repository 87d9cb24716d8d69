#![forbid(unsafe_code)]

use firma_contracts::pattern::{FeatureDeviations, SignatureFeatures};
use firma_contracts::ContractViolation;

/// Maximum allowed relative deviation per feature before a candidate is
/// rejected. Point counts get a tighter limit than the two kinematic means.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignatureMatchConfig {
    pub max_points_deviation: f32,
    pub max_velocity_deviation: f32,
    pub max_pressure_deviation: f32,
}

impl SignatureMatchConfig {
    pub fn mvp_v1() -> Self {
        Self {
            max_points_deviation: 0.30,
            max_velocity_deviation: 0.40,
            max_pressure_deviation: 0.40,
        }
    }

    pub fn new(
        max_points_deviation: f32,
        max_velocity_deviation: f32,
        max_pressure_deviation: f32,
    ) -> Result<Self, ContractViolation> {
        for (field, value) in [
            ("signature_match_config.max_points_deviation", max_points_deviation),
            (
                "signature_match_config.max_velocity_deviation",
                max_velocity_deviation,
            ),
            (
                "signature_match_config.max_pressure_deviation",
                max_pressure_deviation,
            ),
        ] {
            if !value.is_finite() {
                return Err(ContractViolation::NotFinite { field });
            }
            if value <= 0.0 {
                return Err(ContractViolation::InvalidValue {
                    field,
                    reason: "must be > 0",
                });
            }
        }
        Ok(Self {
            max_points_deviation,
            max_velocity_deviation,
            max_pressure_deviation,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FeatureKind {
    TotalPoints,
    MeanVelocity,
    MeanPressure,
}

/// Engine verdict for one candidate against one enrolled reference.
/// `deviations` always carries all three ratios, whether or not the first
/// feature already rejected the candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchEvaluation {
    pub matched: bool,
    pub deviations: FeatureDeviations,
    /// First feature over its limit, in (points, velocity, pressure) order.
    pub rejected_on: Option<FeatureKind>,
}

/// Relative deviation of `candidate` from `reference`.
///
/// Zero-reference rule: a reference value of exactly 0 cannot be divided
/// through, so the candidate passes with deviation 0 only when it is also
/// exactly 0; any other candidate is scored as 100% deviation, which exceeds
/// every configured limit.
pub fn relative_deviation(candidate: f32, reference: f32) -> f32 {
    if reference == 0.0 {
        if candidate == 0.0 {
            0.0
        } else {
            1.0
        }
    } else {
        (candidate - reference).abs() / reference
    }
}

pub fn evaluate(
    config: SignatureMatchConfig,
    reference: &SignatureFeatures,
    candidate: &SignatureFeatures,
) -> MatchEvaluation {
    let deviations = FeatureDeviations {
        points_deviation: relative_deviation(
            candidate.total_points as f32,
            reference.total_points as f32,
        ),
        velocity_deviation: relative_deviation(candidate.mean_velocity, reference.mean_velocity),
        pressure_deviation: relative_deviation(candidate.mean_pressure, reference.mean_pressure),
    };

    let checks = [
        (
            FeatureKind::TotalPoints,
            deviations.points_deviation,
            config.max_points_deviation,
        ),
        (
            FeatureKind::MeanVelocity,
            deviations.velocity_deviation,
            config.max_velocity_deviation,
        ),
        (
            FeatureKind::MeanPressure,
            deviations.pressure_deviation,
            config.max_pressure_deviation,
        ),
    ];

    let rejected_on = checks
        .iter()
        .find(|(_, deviation, limit)| deviation > limit)
        .map(|(kind, _, _)| *kind);

    MatchEvaluation {
        matched: rejected_on.is_none(),
        deviations,
        rejected_on,
    }
}
