#![forbid(unsafe_code)]

pub mod common;
pub mod pattern;

pub use common::{ContractViolation, MonotonicTimeNs, ReasonCodeId, SchemaVersion, Validate};
