//! Infrastructure adapters and runtime bootstrap.

pub mod broker;
pub mod error;
pub mod http;
pub mod telemetry;
