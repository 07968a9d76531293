//! Seed-phrase wallet recovery tool.
//!
//! Generates recovery phrases, derives addresses offline, and scans a chain
//! indexer for every address a seed has ever used.

use std::io::{self, BufRead};
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::info;

use sextant::client::IndexerClient;
use sextant::config::SextantConfig;
use sextant::dictionary::Dictionary;
use sextant::scanner::{RecoveryScanner, ScanProgress};
use sextant::SeedWallet;

#[derive(Parser, Debug)]
#[clap(name = "recover", version)]
struct Args {
    /// Path to the configuration file
    #[clap(long, default_value = "sextant.toml")]
    config: String,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a fresh seed and print its recovery phrase
    Generate,
    /// Derive addresses from a phrase without touching the network
    Addresses {
        /// First derivation index
        #[clap(long, default_value = "0")]
        start: u64,
        /// Number of addresses to print
        #[clap(long, default_value = "10")]
        count: u64,
    },
    /// Scan the indexer for every used address of a phrase
    Recover {
        /// Derivation index to start scanning from
        #[clap(long, default_value = "0")]
        start_index: u64,
        /// Highest index known to be used from a previous scan
        #[clap(long, default_value = "0")]
        last_known_index: u64,
        /// Override the configured lookahead
        #[clap(long)]
        lookahead: Option<u64>,
        /// Override the configured batch size
        #[clap(long)]
        batch_size: Option<u64>,
        /// Override the configured worker count
        #[clap(long)]
        workers: Option<usize>,
        /// Override the configured indexer URL
        #[clap(long)]
        api_url: Option<String>,
    },
}

/// Reads the phrase from stdin so it never lands in shell history.
fn read_phrase() -> Result<String, io::Error> {
    eprintln!("enter recovery phrase:");
    let mut phrase = String::new();
    io::stdin().lock().read_line(&mut phrase)?;
    Ok(phrase.trim().to_string())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let mut config = SextantConfig::load_or_default(&args.config);
    let dict = Dictionary::english();

    match args.command {
        Command::Generate => {
            let wallet = SeedWallet::generate();
            println!("{}", wallet.recovery_phrase(dict));
        }
        Command::Addresses { start, count } => {
            let phrase = read_phrase()?;
            let wallet = SeedWallet::from_phrase(&phrase, dict)?;
            for key in wallet.keys(start, count) {
                println!("{}", key.address());
            }
        }
        Command::Recover {
            start_index,
            last_known_index,
            lookahead,
            batch_size,
            workers,
            api_url,
        } => {
            if let Some(lookahead) = lookahead {
                config.scan.lookahead = lookahead;
            }
            if let Some(batch_size) = batch_size {
                config.scan.batch_size = batch_size;
            }
            if let Some(workers) = workers {
                config.scan.workers = workers;
            }
            if let Some(api_url) = api_url {
                config.indexer.base_url = api_url;
            }
            let phrase = read_phrase()?;
            let wallet = SeedWallet::from_phrase(&phrase, dict)?;

            let oracle = Arc::new(IndexerClient::new(&config.indexer)?);
            let height = oracle.block_height().await?;
            info!("indexer reachable, chain height {}", height);

            let scanner = RecoveryScanner::new(oracle, config.scan.clone());
            let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ScanProgress>();
            let printer = tokio::spawn(async move {
                while let Some(progress) = progress_rx.recv().await {
                    for addr in progress.addresses {
                        println!(
                            "{}\t{}\t{}",
                            addr.index,
                            addr.address,
                            addr.usage_type
                                .map(|t| format!("{:?}", t).to_lowercase())
                                .unwrap_or_default()
                        );
                    }
                }
            });

            let summary = scanner
                .recover(&wallet, start_index, last_known_index, progress_tx)
                .await?;
            printer.await?;

            for addr in &summary.addresses {
                println!("{}\t{}\tnext", addr.index, addr.address);
            }
            info!(
                "scan complete, last used index {}, scanned through {}",
                summary.frontier.last_used_index, summary.frontier.last_scanned_index
            );
        }
    }

    Ok(())
}
