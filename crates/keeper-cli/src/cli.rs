use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "keeper",
    about = "Keeper: an event ledger with replay validation",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Ledger file, overriding the configuration
    #[arg(long, global = true, conflicts_with = "in_memory")]
    pub ledger: Option<PathBuf>,

    /// Keep the ledger in memory only
    #[arg(long, global = true)]
    pub in_memory: bool,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ServeArgs),
    /// Create an organizer and print a pairing key for its first device
    CreateOrga(CreateOrgaArgs),
    /// Replay the whole ledger and persist corrected statuses
    Reconcile(ReconcileArgs),
    /// Show the history visible to an actor
    History(HistoryArgs),
}

#[derive(Args)]
pub struct ServeArgs {
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    #[arg(long)]
    pub no_cors: bool,
}

#[derive(Args)]
pub struct CreateOrgaArgs {
    pub handle: String,
}

#[derive(Args)]
pub struct ReconcileArgs {}

#[derive(Args)]
pub struct HistoryArgs {
    #[arg(long, default_value = "0")]
    pub actor: u64,
    #[arg(long, default_value = "0")]
    pub from: u64,
}
