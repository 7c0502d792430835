//! Domain layer: validated requests and parameter classification.

pub mod error;
pub mod request;
pub mod value;
