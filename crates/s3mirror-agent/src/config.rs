//! Command-line interface.

use clap::{Args, Parser, Subcommand};
use s3mirror_store::HttpStoreConfig;
use std::time::Duration;

/// Replicate one object-storage cluster onto another.
#[derive(Debug, Parser)]
#[command(name = "s3mirror", version, about)]
pub struct Cli {
    /// Which end of the replication link to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Agent role.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run the ingestion server in front of the target cluster.
    Server(ServerArgs),
    /// Run the replication client against the source cluster.
    Client(ClientArgs),
}

/// Connection details for the local object-storage cluster.
#[derive(Debug, Args)]
pub struct StoreArgs {
    /// Store admin API endpoint.
    #[arg(short = 'a', long = "address", default_value = "http://127.0.0.1:9000")]
    pub address: String,

    /// Store access key.
    #[arg(short = 'u', long = "access-key", default_value = "minio")]
    pub access_key: String,

    /// Store secret key.
    #[arg(short = 'p', long = "secret-key", default_value = "minio")]
    pub secret_key: String,
}

impl StoreArgs {
    /// Build the HTTP store configuration.
    #[must_use]
    pub fn to_config(&self) -> HttpStoreConfig {
        HttpStoreConfig {
            endpoint: self.address.clone(),
            access_key: self.access_key.clone(),
            secret_key: self.secret_key.clone(),
            ..HttpStoreConfig::default()
        }
    }
}

/// `server` subcommand flags.
#[derive(Debug, Args)]
pub struct ServerArgs {
    /// Address to listen on for replication links.
    #[arg(short = 'l', long, default_value = "0.0.0.0:9010")]
    pub listen: String,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// `client` subcommand flags.
#[derive(Debug, Args)]
pub struct ClientArgs {
    /// Replication server address to connect to.
    #[arg(short = 'c', long, default_value = "127.0.0.1:9010")]
    pub connect: String,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Comma-separated buckets to exclude from replication.
    #[arg(long = "skip-buckets", default_value = "")]
    pub skip_buckets: String,

    /// Stream only live changes; skip the startup object and metadata
    /// exports.
    #[arg(long = "append-only")]
    pub append_only: bool,

    /// Seconds between periodic IAM/metadata resyncs.
    #[arg(long = "resync-secs", default_value_t = 7200)]
    pub resync_secs: u64,
}

impl ClientArgs {
    /// Interval between resync runs.
    #[must_use]
    pub fn resync_period(&self) -> Duration {
        Duration::from_secs(self.resync_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_defaults() {
        let cli = Cli::parse_from(["s3mirror", "server"]);
        let Command::Server(args) = cli.command else {
            panic!("expected server command");
        };
        assert_eq!(args.listen, "0.0.0.0:9010");
        assert_eq!(args.store.address, "http://127.0.0.1:9000");
    }

    #[test]
    fn client_flags_parse() {
        let cli = Cli::parse_from([
            "s3mirror",
            "client",
            "--connect",
            "10.0.0.2:9010",
            "--skip-buckets",
            "logs,tmp",
            "--append-only",
            "--resync-secs",
            "60",
        ]);
        let Command::Client(args) = cli.command else {
            panic!("expected client command");
        };
        assert_eq!(args.connect, "10.0.0.2:9010");
        assert_eq!(args.skip_buckets, "logs,tmp");
        assert!(args.append_only);
        assert_eq!(args.resync_period(), Duration::from_secs(60));
    }

    #[test]
    fn missing_subcommand_is_an_error() {
        assert!(Cli::try_parse_from(["s3mirror"]).is_err());
    }
}
