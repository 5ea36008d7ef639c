mod render;
mod settings;

use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    AutoApprove, Dashboard, DashboardEvent, DashboardSettings, HttpContract, LocalWallet,
    PlaceholderFhe, TerminalApprover, TransactionApprover, Wallet,
};
use settings::{load_settings, Overrides};
use shared::domain::{RecordId, DEFAULT_CONDITION};
use tokio::time::{interval, Instant, MissedTickBehavior};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Heritage site registry dashboard")]
struct Args {
    /// Settings file; defaults to an optional `heritage.toml`.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    contract_url: Option<String>,
    #[arg(long)]
    wallet_key: Option<PathBuf>,
    #[arg(long)]
    simulation_delay_ms: Option<u64>,
    /// Sign every transaction without prompting.
    #[arg(long, short = 'y')]
    yes: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List registered sites, newest first.
    List {
        #[arg(long)]
        details: bool,
    },
    /// Register a new site.
    Register {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        location: String,
        #[arg(
            long,
            default_value_t = DEFAULT_CONDITION,
            value_parser = clap::value_parser!(u8).range(0..=100)
        )]
        condition: u8,
        #[arg(long, default_value = "")]
        description: String,
    },
    /// Run an environmental simulation step on a site you own.
    Simulate { id: String },
    Stats,
    /// Refresh periodically and print changes until interrupted.
    Watch {
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    Whoami,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let settings = load_settings(
        args.config.as_deref(),
        &Overrides {
            contract_url: args.contract_url.clone(),
            wallet_key_path: args.wallet_key.clone(),
            simulation_delay_ms: args.simulation_delay_ms,
        },
    )?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&settings.log_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    let approver: Arc<dyn TransactionApprover> = if args.yes {
        Arc::new(AutoApprove)
    } else {
        Arc::new(TerminalApprover)
    };
    let wallet = Arc::new(LocalWallet::load_or_create(
        &settings.wallet_key_path,
        approver,
    )?);

    let contract = HttpContract::new(&settings.contract_url)
        .with_context(|| format!("invalid contract url '{}'", settings.contract_url))?;
    info!(contract = %contract.base_url(), "desktop: using contract");
    let dashboard = Dashboard::new(
        Arc::new(contract),
        Arc::new(PlaceholderFhe),
        DashboardSettings {
            simulation_delay: Duration::from_millis(settings.simulation_delay_ms),
        },
    );
    let mut events = dashboard.subscribe_events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                DashboardEvent::Notice(message) => eprintln!("{message}"),
                DashboardEvent::Status(status) => {
                    if let Some(line) = render::status(&status) {
                        eprintln!("{line}");
                    }
                }
                DashboardEvent::AccountChanged(_) | DashboardEvent::RecordsUpdated { .. } => {}
            }
        }
    });

    match args.command {
        Command::List { details } => {
            connect(&dashboard, wallet).await;
            dashboard.refresh().await;
            let state = dashboard.snapshot().await;
            println!("{}", render::site_table(&state, &PlaceholderFhe, details));
        }
        Command::Register {
            name,
            location,
            condition,
            description,
        } => {
            connect_required(&dashboard, wallet).await?;
            dashboard.open_create().await;
            dashboard
                .update_form(|form| {
                    form.site_name = name;
                    form.location = location;
                    form.condition = condition;
                    form.description = description;
                })
                .await;
            let id = match dashboard.submit().await {
                Ok(id) => id,
                Err(err) => {
                    dashboard.close_create().await;
                    return Err(err.into());
                }
            };
            println!("registered {id}");
        }
        Command::Simulate { id } => {
            connect_required(&dashboard, wallet).await?;
            dashboard.refresh().await;
            let updated = dashboard.simulate(&RecordId::from(id)).await?;
            let impact = updated.environmental_impact;
            println!(
                "{}: condition {}% ({}), wind {:.1}%, rain {:.1}%, temperature {:.1}%",
                updated.site_name,
                updated.condition,
                updated.band().label(),
                impact.wind,
                impact.rain,
                impact.temperature
            );
        }
        Command::Stats => {
            dashboard.refresh().await;
            println!("{}", render::stats(&dashboard.snapshot().await));
        }
        Command::Watch { interval_secs } => {
            connect(&dashboard, wallet).await;
            if !dashboard.is_following_accounts().await {
                warn!("desktop: watching without a wallet; ownership is not shown");
            }
            let every = interval_secs.unwrap_or(settings.watch_interval_secs).max(1);
            watch(&dashboard, Duration::from_secs(every)).await?;
        }
        Command::Whoami => {
            let address = wallet.address().await.context("wallet is locked")?;
            println!("{address}");
        }
    }

    Ok(())
}

/// Read-only commands work without an account.
async fn connect(dashboard: &Arc<Dashboard>, wallet: Arc<LocalWallet>) {
    let wallet: Arc<dyn Wallet> = wallet;
    if let Err(err) = dashboard.connect_wallet(wallet).await {
        warn!(error = %err, "desktop: wallet not connected");
    }
}

async fn connect_required(dashboard: &Arc<Dashboard>, wallet: Arc<LocalWallet>) -> Result<()> {
    let wallet: Arc<dyn Wallet> = wallet;
    let account = dashboard.connect_wallet(wallet).await?;
    info!(account = %account, "desktop: wallet connected");
    Ok(())
}

async fn watch(dashboard: &Arc<Dashboard>, every: Duration) -> Result<()> {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_seen = None;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                dashboard.refresh().await;
                dashboard.expire_status(Instant::now().into_std()).await;
                let state = dashboard.snapshot().await;
                let seen: Vec<(RecordId, u8)> = state
                    .records
                    .iter()
                    .map(|r| (r.id.clone(), r.condition))
                    .collect();
                if last_seen.as_ref() != Some(&seen) {
                    last_seen = Some(seen);
                    println!("{}\n", render::site_table(&state, &PlaceholderFhe, false));
                    println!("{}\n", render::stats(&state));
                }
            }
            signal = tokio::signal::ctrl_c() => {
                if let Err(err) = signal {
                    bail!("failed to listen for ctrl-c: {err}");
                }
                info!("desktop: watch stopped");
                return Ok(());
            }
        }
    }
}
