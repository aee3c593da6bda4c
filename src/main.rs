use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use diffuzr::cli::RunArgs;

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries only the leader's output
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "diffuzr=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = RunArgs::parse();
    diffuzr::cli::run(&args)
}
