//! Command-line front end for stowage workspaces
//!
//! Argument parsing ([`cli`]) and the optional `stowage.kdl` configuration
//! file ([`config`]). The binary in `main.rs` wires these to
//! [`stowage_repo`].

pub mod cli;
pub mod config;

pub use cli::{Args, Command};
pub use config::Config;
