mod api;
mod cli;
mod config;
mod detect;
mod download;
mod error;
mod install;
mod models;
mod shell;
mod store;
mod uninstall;
mod update;
mod utils;
mod version_manager;

#[cfg(test)]
mod test_support;

use anyhow::Context;
use cli::Cli;
use config::{Config, Environment};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

async fn run() -> anyhow::Result<()> {
    let env = Environment::capture().context("Failed to read the environment")?;
    let config = Config::load(&env).context("Failed to load configuration")?;

    let cli = Cli::new(config)?;
    cli.run(env).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    if let Err(e) = run().await {
        utils::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
