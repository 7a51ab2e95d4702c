//! s3mirror binary entry point.

use anyhow::{Context, Result};
use clap::Parser;
use s3mirror_agent::config::{Cli, Command};
use s3mirror_agent::{client, server, transport};
use s3mirror_core::BucketFilter;
use s3mirror_store::HttpStore;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting s3mirror");

    let cli = Cli::parse();
    match cli.command {
        Command::Server(args) => {
            let store = HttpStore::new(args.store.to_config())
                .context("create target store client")?;
            let server = server::Server::bind(&args.listen, store).await?;
            server.serve().await
        }
        Command::Client(args) => {
            let store = HttpStore::new(args.store.to_config())
                .context("create source store client")?;
            let options = client::ClientOptions {
                transport: transport::TransportConfig::new(&args.connect),
                filter: BucketFilter::parse(&args.skip_buckets),
                append_only: args.append_only,
                resync_period: args.resync_period(),
            };
            client::run_client(store, options).await
        }
    }
}
