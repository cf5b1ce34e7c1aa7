//! Core module
//!
//! Contains registry configuration and logger setup

mod config;
pub mod logging;

pub use config::RegistryConfig;
