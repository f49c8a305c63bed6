//! CLI module for flowlog - command-line interface and subcommands.
//!
//! Provides the main entry point with subcommands for projecting history
//! files, managing the history store, and talking to the executor.

pub mod commands;

pub use commands::Cli;
