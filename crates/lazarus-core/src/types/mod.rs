//! Type definitions for Lazarus

pub mod config_types;
pub mod health;
pub mod operation;
pub mod recovery;

pub use config_types::*;
pub use health::*;
pub use operation::*;
pub use recovery::*;
