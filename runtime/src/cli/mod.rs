//! CLI subcommand implementations for the `cardharvest` binary.

pub mod doctor;
pub mod interactive;
pub mod output;
pub mod parse_cmd;
pub mod prompt_cmd;
pub mod run_cmd;
pub mod session;
