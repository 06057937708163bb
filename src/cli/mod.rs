//! CLI module for boostr - command-line interface and subcommands.

pub mod commands;

pub use commands::Cli;
