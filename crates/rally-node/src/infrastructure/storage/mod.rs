//! Storage infrastructure: configuration file persistence.
//!
//! The `config` sub-module reads the node's TOML configuration from the
//! platform config directory (or an explicit path), fills absent fields with
//! defaults, validates the discovery timings, and writes changes back.

pub mod config;
