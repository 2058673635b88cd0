//! # lazarus-core
//!
//! Core library for the Lazarus recovery orchestrator providing:
//! - The recovery data model (recovery points, operations, their state machine)
//! - Configuration file parsing (lazarus.yaml) with built-in defaults
//! - Error types shared by the other Lazarus crates

pub mod config;
pub mod error;
pub mod types;

pub use config::LazarusConfig;
pub use error::{Error, Result};
