mod index;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shared::domain::RECORD_KEY_PREFIX;
use storage::Storage;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Operator commands against the contract store")]
struct Cli {
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://./data/contract.db")]
    database_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stored keys.
    Keys {
        #[arg(long, default_value = RECORD_KEY_PREFIX)]
        prefix: String,
    },
    /// Print one entry with its last writer.
    Show { key: String },
    /// Report records missing from the site index and index entries with no record.
    Orphans,
    /// Rewrite the site index so every stored record is listed.
    Reindex {
        #[arg(long)]
        dry_run: bool,
    },
    /// Stop accepting writes; the contract reports itself unavailable.
    Pause,
    Resume,
    /// Most recent committed transactions.
    History {
        #[arg(long)]
        key: Option<String>,
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();
    let storage = Storage::new(&cli.database_url).await?;

    match cli.command {
        Command::Keys { prefix } => {
            for key in storage.list_keys(&prefix).await? {
                println!("{key}");
            }
        }
        Command::Show { key } => match storage.get_entry(&key).await? {
            Some(entry) => {
                println!("key:        {}", entry.key);
                println!("updated_by: {}", entry.updated_by);
                println!("updated_at: {}", entry.updated_at.format("%Y-%m-%d %H:%M:%S"));
                println!("bytes:      {}", entry.value.len());
                println!("{}", String::from_utf8_lossy(&entry.value));
            }
            None => println!("{key} is not set"),
        },
        Command::Orphans => {
            let report = index::inspect(&storage).await?;
            if report.index_malformed {
                println!("site index is malformed");
            }
            for id in &report.orphans {
                println!("orphan {id}");
            }
            for id in &report.dangling {
                println!("dangling {id}");
            }
            if report.is_consistent() {
                println!("index consistent ({} sites)", report.indexed.len());
            }
        }
        Command::Reindex { dry_run } => {
            let report = index::inspect(&storage).await?;
            match index::repaired_index(&report) {
                None => println!("index consistent ({} sites)", report.indexed.len()),
                Some(ids) if dry_run => {
                    println!("would write {} ids: {}", ids.len(), join_ids(&ids));
                }
                Some(ids) => {
                    let tx = index::write_index(&storage, &ids).await?;
                    println!(
                        "rewrote index with {} ids in block {} ({})",
                        ids.len(),
                        tx.block_number,
                        tx.tx_hash
                    );
                }
            }
        }
        Command::Pause => {
            storage.set_paused(true).await?;
            println!("contract paused");
        }
        Command::Resume => {
            storage.set_paused(false).await?;
            println!("contract resumed");
        }
        Command::History { key, limit } => {
            for tx in storage.list_transactions(key.as_deref(), limit).await? {
                println!(
                    "#{:<6} {} {:<32} {:>6}B {} {}",
                    tx.block_number,
                    tx.committed_at.format("%Y-%m-%d %H:%M:%S"),
                    tx.key,
                    tx.value_len,
                    tx.signer,
                    tx.tx_hash
                );
            }
        }
    }

    Ok(())
}

fn join_ids(ids: &[shared::domain::RecordId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
