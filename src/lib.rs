//! alertreach - notification recipient reports for Zabbix hosts
//!
//! This library resolves which actions fire for the triggers of a monitored
//! host and which users those actions would actually reach, and serves the
//! result as a small web interface.

pub mod api;
pub mod app;
pub mod cli;
pub mod conditions;
pub mod config;
pub mod core;
pub mod escalation;
pub mod formatting;
pub mod internal_metrics;
pub mod permissions;
pub mod resolver;
pub mod web;

// Re-export core types for convenience
pub use core::*;
