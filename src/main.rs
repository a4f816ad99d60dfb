use clap::Parser;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

mod analyzer;
mod cleanup;
mod cli;
mod config;
mod controller;
mod error;
mod library;
mod persist;
mod pipeline;
mod queue;
mod remote;
mod runtime;
mod schedule;
mod timing;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = cli::Cli::parse();
    runtime::run(cli)
}
