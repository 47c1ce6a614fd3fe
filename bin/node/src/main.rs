//! The guillotine execution-client node binary.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

mod backend;
mod cli;
mod config;
mod node;

use cli::Cli;
use config::RunnerConfig;
use node::Node;

/// Initializes the tracing subscriber. `RUST_LOG` drives per-target filters;
/// the default keeps the node's own targets at info.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.handle_info_flags() {
        return Ok(());
    }

    init_tracing();

    let config = RunnerConfig::resolve(&cli)?;
    let node = Node::assemble(config).await?;
    node.run().await
}
