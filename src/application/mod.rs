//! Application services: decoding, rendering, webhook delivery and orchestration.

pub mod decode;
pub mod error;
pub mod jobs;
pub mod queue;
pub mod render;
pub mod webhook;
