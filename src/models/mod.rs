//! Response models for the worker control API
//!
//! Defines the DTOs serialized by the `/_worker/` endpoints.

pub mod responses;

pub use responses::{HealthResponse, StateResponse, StatsResponse};
