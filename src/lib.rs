//! Queue-driven report worker.
//!
//! Requests arrive on a durable AMQP queue, their parameter tree is rendered into a
//! PDF, and the outcome is posted to the caller's webhook. An optional HTTP
//! ingestion endpoint validates and publishes requests onto the same queue.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
