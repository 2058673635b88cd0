//! Configuration loading

mod loader;

pub use loader::{LazarusConfig, CONFIG_FILE_NAMES};
