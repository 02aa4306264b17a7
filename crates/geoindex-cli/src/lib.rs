//! geoindex CLI library.
//!
//! This crate provides the CLI interface for geoindex.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, GroupArgs};
pub use config::Config;
