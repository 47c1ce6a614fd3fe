//! Runner configuration: CLI flags over environment variables over defaults,
//! with an optional named configuration file on top.

use crate::cli::Cli;
use anyhow::{Context, Result};
use guillotine_chain::ChainSpec;
use guillotine_rpc::RpcConfig;
use serde_json::Value;
use std::path::PathBuf;
use tracing::{debug, warn};

/// The resolved node configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// The named chain configuration.
    pub network: String,
    /// The data directory.
    pub data_dir: PathBuf,
    /// The database directory.
    pub db_dir: PathBuf,
    /// The chain parameters.
    pub spec: ChainSpec,
    /// The RPC surface configuration.
    pub rpc: RpcConfig,
}

impl RunnerConfig {
    /// Resolves the configuration. Precedence, lowest to highest: built-in
    /// defaults, the named file under `configs_dir` (if present), environment
    /// variables, CLI flags — the CLI layer already folds the last two.
    pub fn resolve(cli: &Cli) -> Result<Self> {
        let spec = match cli.config.as_str() {
            "mainnet" => ChainSpec::mainnet(),
            "dev" => ChainSpec::dev(),
            other => {
                debug!(target: "node", network = other, "Unknown network name, using dev spec");
                ChainSpec::dev()
            }
        };

        let mut config = Self {
            network: cli.config.clone(),
            data_dir: cli.data_dir.clone(),
            db_dir: cli.db_dir.clone(),
            spec,
            rpc: RpcConfig::default(),
        };

        let file = cli.configs_dir.join(format!("{}.json", cli.config));
        if file.is_file() {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read config file {}", file.display()))?;
            let overrides: Value = serde_json::from_str(&raw)
                .with_context(|| format!("config file {} is not valid JSON", file.display()))?;
            config.apply_file_overrides(&overrides);
        } else {
            debug!(target: "node", file = %file.display(), "No config file, using built-ins");
        }

        Ok(config)
    }

    /// Applies recognized keys from a named configuration file. Unknown keys
    /// are ignored with a warning so that configs stay forward-compatible.
    fn apply_file_overrides(&mut self, overrides: &Value) {
        let Some(object) = overrides.as_object() else {
            warn!(target: "node", "Config file root is not an object, ignoring");
            return;
        };
        for (key, value) in object {
            match (key.as_str(), value) {
                ("chain_id", Value::Number(number)) => {
                    if let Some(chain_id) = number.as_u64() {
                        self.spec.chain_id = chain_id;
                    }
                }
                ("http_host", Value::String(host)) => self.rpc.host = host.clone(),
                ("http_port", Value::Number(number)) => {
                    if let Some(port) = number.as_u64() {
                        self.rpc.port = port as u16;
                    }
                }
                ("ws_port", Value::Number(number)) => {
                    if let Some(port) = number.as_u64() {
                        self.rpc.ws_port = Some(port as u16);
                    }
                }
                ("strict_hex_format", Value::Bool(strict)) => {
                    self.rpc.strict_hex_format = *strict;
                }
                _ => warn!(target: "node", key, "Ignoring unrecognized config key"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from([&["guillotine-node"], args].concat()).unwrap()
    }

    #[test]
    fn test_defaults_resolve_to_mainnet() {
        let config = RunnerConfig::resolve(&cli(&[])).unwrap();
        assert_eq!(config.network, "mainnet");
        assert_eq!(config.spec.chain_id, 1);
        assert_eq!(config.rpc.port, 8545);
        assert_eq!(config.rpc.host, "127.0.0.1");
    }

    #[test]
    fn test_file_overrides() {
        let dir = std::env::temp_dir().join(format!("guillotine-cfg-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("dev.json"),
            r#"{"chain_id": 777, "http_port": 9545, "unknown_key": 1}"#,
        )
        .unwrap();

        let config = RunnerConfig::resolve(&cli(&[
            "--config",
            "dev",
            "--configs-dir",
            dir.to_str().unwrap(),
        ]))
        .unwrap();
        assert_eq!(config.spec.chain_id, 777);
        assert_eq!(config.rpc.port, 9545);

        std::fs::remove_dir_all(dir).unwrap();
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let dir = std::env::temp_dir().join(format!("guillotine-bad-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("dev.json"), "{nope").unwrap();

        let result = RunnerConfig::resolve(&cli(&[
            "--config",
            "dev",
            "--configs-dir",
            dir.to_str().unwrap(),
        ]));
        assert!(result.is_err());

        std::fs::remove_dir_all(dir).unwrap();
    }
}
