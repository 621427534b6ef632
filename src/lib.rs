//! Gatekeeper - HTTP Admission-Control Gateway
//!
//! This crate implements the request-admission front of an HTTP API
//! gateway: a per-client token-bucket rate limiter installed ahead of
//! every route. State is purely in-memory and single-process; a restart
//! grants every key a fresh full bucket.

pub mod admission;
pub mod config;
pub mod error;
pub mod http;
