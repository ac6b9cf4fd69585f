//! # corepos
//!
//! Command line front for the register engine.
//!
//! ```text
//! corepos board --section kitchen [--watch 5]
//! corepos complete --section bar 42 [--line 7]
//! corepos holds
//! corepos convert 17 --store 1 --register 2
//! corepos reconcile
//! corepos history
//! corepos login <token> <company-id>
//! corepos logout
//! corepos init-config
//! ```
//!
//! Results are printed to stdout as JSON; logs go to stderr
//! (`RUST_LOG`, default `info`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use corepos_client::{KitchenService, OrderScope, PosClient, PosConfig};
use corepos_core::invoice::InvoiceContext;
use corepos_core::types::SectionType;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "corepos")]
#[command(about = "CorePOS register engine")]
#[command(version)]
struct Cli {
    /// Path to corepos.toml (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch and print a section board
    Board {
        #[arg(long, default_value = "kitchen")]
        section: SectionType,

        #[arg(long)]
        store: Option<i64>,

        #[arg(long)]
        register: Option<i64>,

        /// Refresh every N seconds until interrupted
        #[arg(long)]
        watch: Option<u64>,
    },

    /// Mark an order, or one of its lines, completed
    Complete {
        #[arg(long, default_value = "kitchen")]
        section: SectionType,

        order: i64,

        #[arg(long)]
        line: Option<i64>,
    },

    /// List hold orders
    Holds,

    /// Convert a hold order into an invoice
    Convert {
        hold_id: i64,

        #[arg(long)]
        store: Option<i64>,

        #[arg(long)]
        register: Option<i64>,

        #[arg(long)]
        reference: Option<String>,
    },

    /// Retry hold deletions left over from earlier conversions
    Reconcile,

    /// Show conversions recorded on this register
    History,

    /// Store session credentials
    Login { token: String, company_id: String },

    /// Clear the stored session
    Logout,

    /// Write a config file with default values
    InitConfig,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn watch_board(kitchen: &KitchenService, every: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(every);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping board watch");
                return Ok(());
            }
            _ = ticker.tick() => match kitchen.refresh().await {
                Ok(board) => print_json(&board)?,
                Err(e) => warn!(error = %e, "Board refresh failed"),
            },
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    let cli = Cli::parse();

    if let Command::InitConfig = cli.command {
        let path = PosConfig::default()
            .save(cli.config)
            .context("Failed to write config")?;
        println!("{}", path.display());
        return Ok(());
    }

    let config = PosConfig::load(cli.config).context("Failed to load config")?;
    let client = PosClient::connect(config).await?;

    match cli.command {
        Command::Board { section, store, register, watch } => {
            let scope = OrderScope { store_id: store, cash_register_id: register };
            let kitchen = client.kitchen(section, scope);
            match watch {
                Some(secs) => watch_board(&kitchen, Duration::from_secs(secs.max(1))).await?,
                None => print_json(&kitchen.refresh().await?)?,
            }
        }
        Command::Complete { section, order, line } => {
            let kitchen = client.kitchen(section, OrderScope::default());
            kitchen.refresh().await?;
            match line {
                Some(line) => kitchen.complete_item(order, line).await?,
                None => kitchen.complete_order(order).await?,
            }
            print_json(&kitchen.board().await)?;
        }
        Command::Holds => {
            print_json(&client.hold_orders().list_hold_orders().await?)?;
        }
        Command::Convert { hold_id, store, register, reference } => {
            let mut ctx = InvoiceContext::new(Local::now().date_naive());
            ctx.store_id = store;
            ctx.cash_register_id = register;
            ctx.reference = reference;

            let outcome = client.hold_orders().convert_hold_to_invoice(hold_id, &ctx).await?;
            if outcome.reconciliation_pending {
                warn!(hold_id, "Hold order still exists; run `corepos reconcile` later");
            }
            print_json(&outcome)?;
        }
        Command::Reconcile => {
            print_json(&client.hold_orders().reconcile_pending().await?)?;
        }
        Command::History => {
            print_json(&client.hold_orders().order_history().await?)?;
        }
        Command::Login { token, company_id } => {
            client.login(&token, &company_id).await?;
        }
        Command::Logout => {
            client.logout().await?;
        }
        Command::InitConfig => {}
    }

    client.close().await;
    Ok(())
}
