#![forbid(unsafe_code)]

pub mod payload_digest;
pub mod signature_match;
