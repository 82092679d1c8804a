//! Database initialization for the score cache

pub mod init;

pub use init::*;
