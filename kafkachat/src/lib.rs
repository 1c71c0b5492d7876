//! `KafkaChat`: terminal chat over a shared Apache Kafka topic.

pub mod app;
pub mod chat;
pub mod config;
pub mod crypto;
pub mod log;
pub mod ui;
