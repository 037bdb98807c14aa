//! murmur CLI library
//!
//! The binary lives in main.rs; the modules are exposed here for
//! integration testing.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod logging;
