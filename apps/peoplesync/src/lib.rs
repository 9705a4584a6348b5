//! peoplesync CLI library
//!
//! This library exposes internal modules for integration testing.
//! The main CLI binary is in main.rs.

pub mod alert;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
