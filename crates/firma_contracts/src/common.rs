#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimeNs(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ReasonCodeId(pub u32);

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    NotFinite {
        field: &'static str,
    },
}

impl std::fmt::Display for ContractViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidValue { field, reason } => {
                write!(f, "invalid value for {field}: {reason}")
            }
            Self::InvalidRange {
                field,
                min,
                max,
                got,
            } => write!(f, "value for {field} out of range [{min}, {max}]: {got}"),
            Self::NotFinite { field } => write!(f, "value for {field} must be finite"),
        }
    }
}

impl std::error::Error for ContractViolation {}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}
