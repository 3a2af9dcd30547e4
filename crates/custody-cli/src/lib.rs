//! Custody CLI library
//!
//! Command handlers and configuration for the `custody` binary. Handlers
//! read and write JSON files so each hop of a delegation can be driven by
//! hand or from scripts.

/// Command handlers for CLI operations
pub mod commands;

/// Configuration management for the CLI
pub mod config;
