//! zkwatch - alerting core for a coordination-service path monitor
//!
//! A compliance evaluator classifies each watched path and reports it to the
//! [`Dispatcher`](notification::Dispatcher), which debounces, cancels and fans
//! out alerts to the configured backends. A cluster lock decides which of a
//! redundant set of zkwatch processes is the active alerter.
//!
//! The bundled [`MemoryRegistry`](registry::MemoryRegistry) is in-process, so
//! the `zkwatch` binary must run as a single instance. Redundant deployments
//! need a [`Registry`](core::Registry) backed by the shared coordination
//! service.
pub mod cli;
pub mod cluster;
pub mod config;
pub mod core;
pub mod formatting;
pub mod notification;
pub mod registry;
pub mod status;

// Re-export core types for convenience
pub use crate::core::*;
