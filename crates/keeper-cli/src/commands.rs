use anyhow::Context;
use colored::Colorize;

use keeper_ledger::Keeper;
use keeper_server::{KeeperConfig, KeeperServer};
use keeper_types::{ActorId, Sequence};

use crate::cli::*;

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;
    match cli.command {
        Command::Serve(args) => cmd_serve(config, args),
        Command::CreateOrga(args) => cmd_create_orga(&config, args, &cli.format),
        Command::Reconcile(_) => cmd_reconcile(&config, &cli.format),
        Command::History(args) => cmd_history(&config, args, &cli.format),
    }
}

/// Configuration file (or defaults) with command-line overrides applied.
fn load_config(cli: &Cli) -> anyhow::Result<KeeperConfig> {
    let mut config = match &cli.config {
        Some(path) => KeeperConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => KeeperConfig::default(),
    };
    if let Some(ledger) = &cli.ledger {
        config.ledger_path = Some(ledger.clone());
    }
    if cli.in_memory {
        config.ledger_path = None;
    }
    Ok(config)
}

fn open(config: &KeeperConfig) -> anyhow::Result<Keeper> {
    config.open_keeper().context("opening ledger")
}

fn cmd_serve(mut config: KeeperConfig, args: ServeArgs) -> anyhow::Result<()> {
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if args.no_cors {
        config.allow_cors = false;
    }

    let server = KeeperServer::new(config).context("starting server")?;
    let runtime = tokio::runtime::Runtime::new()?;
    runtime.block_on(server.serve())?;
    Ok(())
}

fn cmd_create_orga(
    config: &KeeperConfig,
    args: CreateOrgaArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let keeper = open(config)?;
    let bootstrap = keeper
        .create_orga(&args.handle)
        .with_context(|| format!("creating organizer {:?}", args.handle))?;

    match format {
        OutputFormat::Json => println!(
            "{}",
            serde_json::json!({
                "actor_id": bootstrap.actor_id,
                "handle": args.handle,
                "pairing_key": bootstrap.pairing_key,
            })
        ),
        OutputFormat::Text => {
            println!(
                "{} Created organizer {} ({})",
                "✓".green().bold(),
                args.handle.yellow().bold(),
                bootstrap.actor_id.to_string().cyan()
            );
            println!("  Pairing key: {}", bootstrap.pairing_key.bold());
        }
    }
    Ok(())
}

fn cmd_reconcile(config: &KeeperConfig, format: &OutputFormat) -> anyhow::Result<()> {
    let keeper = open(config)?;
    let report = keeper.reconcile().context("reconciling ledger")?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&report)?),
        OutputFormat::Text => {
            println!("{} Ledger reconciled", "✓".green().bold());
            println!("  Events: {}", report.replayed.to_string().bold());
            println!("  Accepted: {}", report.accepted.to_string().green());
            println!("  Rejected: {}", report.rejected.to_string().red());
            println!("  Updated: {}", report.updated.to_string().yellow());
        }
    }
    Ok(())
}

fn cmd_history(
    config: &KeeperConfig,
    args: HistoryArgs,
    format: &OutputFormat,
) -> anyhow::Result<()> {
    let keeper = open(config)?;
    let events = keeper.history(ActorId(args.actor), Sequence(args.from))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string(&events)?),
        OutputFormat::Text => {
            if events.is_empty() {
                println!("No visible events.");
            }
            for event in &events {
                println!(
                    "{}  {}  {}  {}",
                    event.sequence.to_string().yellow(),
                    event.source.to_string().dimmed(),
                    event.payload.kind().cyan(),
                    serde_json::to_string(&event.payload)?
                );
            }
        }
    }
    Ok(())
}
