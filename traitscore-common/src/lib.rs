//! # traitscore common library
//!
//! Shared code for the trait scoring engine:
//! - Common error type
//! - TOML bootstrap configuration and data folder resolution
//! - SQLite initialization for the score cache

pub mod config;
pub mod db;
pub mod error;

pub use error::{Error, Result};
