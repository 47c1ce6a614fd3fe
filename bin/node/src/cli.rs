//! This module contains all CLI-specific code for the node binary.

use clap::{CommandFactory, Parser};
use std::path::PathBuf;

/// The node binary CLI application arguments.
///
/// Every flag accepts both `--flag value` and `--flag=value`. Environment
/// variables provide defaults; explicit CLI flags override them.
#[derive(Parser, Debug, Clone)]
#[command(name = "guillotine-node", disable_help_flag = true, disable_version_flag = true)]
pub struct Cli {
    /// Named chain configuration to run.
    #[arg(long, env = "GUILLOTINE_CONFIG", default_value = "mainnet")]
    pub config: String,
    /// Directory holding named chain configurations.
    #[arg(long, env = "GUILLOTINE_CONFIGS_DIR", default_value = "configs")]
    pub configs_dir: PathBuf,
    /// Data directory for node state.
    #[arg(long, env = "GUILLOTINE_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,
    /// Database directory.
    #[arg(long, env = "GUILLOTINE_DB_DIR", default_value = "./db")]
    pub db_dir: PathBuf,
    /// Print help and exit.
    #[arg(long, short = 'h', conflicts_with = "version")]
    pub help: bool,
    /// Print version and exit.
    #[arg(long, short = 'v')]
    pub version: bool,
}

impl Cli {
    /// Handles `--help` and `--version`, returning `true` if the process
    /// should exit. Requesting both at once is a usage error that clap
    /// rejects with exit code 2 before this runs.
    pub fn handle_info_flags(&self) -> bool {
        if self.help {
            let _ = Self::command().print_help();
            return true;
        }
        if self.version {
            println!("guillotine-node {}", env!("CARGO_PKG_VERSION"));
            return true;
        }
        false
    }
}
