#![forbid(unsafe_code)]

pub mod enrollment;
pub mod ingress;
pub mod verification;
