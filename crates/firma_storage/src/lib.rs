#![forbid(unsafe_code)]

pub mod patterns;
pub mod repo;
