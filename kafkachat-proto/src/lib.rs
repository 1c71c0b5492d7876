//! Shared wire definitions for the `KafkaChat` record format.

pub mod clock;
pub mod codec;
pub mod envelope;
