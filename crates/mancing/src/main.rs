//! # MANCING
//!
//! Command-line front end for the fishing gacha.
//!
//! ```text
//! mancing draw --count 5          # five paid draws
//! mancing draw --force secret     # operator override
//! mancing balance
//! mancing reset
//! mancing catalog --simulate 100000
//! ```
//!
//! The balance lives in a journal file (`--store`), so it survives restarts.
//! History is per invocation.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mancing_economy::{
    GachaConfig, GachaError, GachaMachine, JournalStore, PullBatch, RarityCatalog, RarityTier,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "mancing")]
#[command(about = "Fishing gacha with a persisted coin balance", long_about = None)]
struct Cli {
    /// Path to a TOML config (uses the built-in table if not specified)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Journal file holding the balance
    #[arg(short, long, global = true, default_value = "mancing.journal")]
    store: PathBuf,

    /// Ignore the [remote] section and draw locally
    #[arg(long, global = true)]
    offline: bool,

    /// Fixed RNG seed (overrides the config)
    #[arg(long, global = true)]
    seed: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Pay for and perform draws
    Draw {
        /// Number of draws
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,

        /// Force a rarity tier (e.g. "secret", "mythic")
        #[arg(short, long)]
        force: Option<RarityTier>,
    },

    /// Show the current balance
    Balance,

    /// Restore the starting balance
    Reset,

    /// Show the catalog and its odds
    Catalog {
        /// Also sample this many times and show observed shares
        #[arg(long)]
        simulate: Option<u32>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Draw { count, force } => {
            let mut machine = open_machine(&config, &cli.store)?;
            let batch = machine.pull_many(count, force).await;
            print_batch(&machine, &batch)?;
        }
        Commands::Balance => {
            let machine = open_machine(&config, &cli.store)?;
            println!("balance: {}", machine.balance());
            println!(
                "draw cost: {} ({} draws left)",
                machine.draw_cost(),
                machine.balance() / machine.draw_cost().max(1)
            );
        }
        Commands::Reset => {
            let mut machine = open_machine(&config, &cli.store)?;
            machine.reset_balance()?;
            println!("balance reset to {}", machine.balance());
        }
        Commands::Catalog { simulate } => {
            let catalog = config.build_catalog()?;
            print_catalog(&catalog);
            if let Some(iterations) = simulate {
                print_simulation(&catalog, iterations, config.seed);
            }
        }
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<GachaConfig> {
    let mut config = match &cli.config {
        Some(path) => GachaConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => GachaConfig::default(),
    };
    if cli.offline {
        config.remote = None;
    }
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }
    tracing::info!(
        config = %cli.config.as_deref().map_or_else(|| "built-in".into(), |p| p.display().to_string()),
        remote = config.remote.as_ref().map_or("offline", |r| r.url.as_str()),
        seed = ?config.seed,
        "config loaded"
    );
    Ok(config)
}

fn open_machine(config: &GachaConfig, store: &Path) -> Result<GachaMachine> {
    let store = JournalStore::open(store)
        .with_context(|| format!("Failed to open journal {}", store.display()))?;
    tracing::info!(path = %store.path().display(), records = store.record_count(), "journal opened");
    let machine = GachaMachine::from_config(config, Arc::new(store))?;
    Ok(machine)
}

fn print_batch(machine: &GachaMachine, batch: &PullBatch) -> Result<()> {
    for outcome in &batch.outcomes {
        let entry = outcome.entry();
        let mark = if entry.rarity.is_celebrated() { " !!" } else { "" };
        println!(
            "{:<24} {:<9} {:>6} coins  [{}]{}",
            entry.name,
            entry.rarity.as_str(),
            entry.price,
            outcome.source().as_str(),
            mark
        );
    }

    match &batch.stopped {
        None => {}
        Some(GachaError::InsufficientBalance { balance, cost }) => {
            println!("not enough coins: have {balance}, a draw costs {cost}");
        }
        Some(other) => return Err(other.clone().into()),
    }

    println!();
    println!("balance: {}", machine.balance());
    println!(
        "history ({} draws, {} coins of fish, newest first):",
        machine.history().len(),
        machine.history().total_value()
    );
    for record in machine.history().all() {
        println!(
            "  #{:<4} {} ({})",
            record.sequence,
            record.outcome.entry().name,
            record.outcome.rarity()
        );
    }
    Ok(())
}

fn print_catalog(catalog: &RarityCatalog) {
    println!("{:<24} {:<9} {:>8} {:>7}", "NAME", "TIER", "CHANCE", "PRICE");
    for entry in catalog.entries() {
        println!(
            "{:<24} {:<9} {:>7.2}% {:>7}",
            entry.name,
            entry.rarity.as_str(),
            entry.weight * 100.0,
            entry.price
        );
    }
}

fn print_simulation(catalog: &RarityCatalog, iterations: u32, seed: Option<u64>) {
    let mut rng = match seed {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_entropy(),
    };
    let stats = catalog.simulate(iterations, &mut rng);

    println!();
    println!("simulated {} draws:", stats.total_rolls);
    for tier in RarityTier::ALL {
        let expected: f64 = catalog
            .entries()
            .iter()
            .filter(|e| e.rarity == tier)
            .map(|e| e.weight)
            .sum();
        if expected <= 0.0 && !stats.tier_counts.contains_key(&tier) {
            continue;
        }
        println!(
            "  {:<9} observed {:>7.3}%  expected {:>7.3}%",
            tier.as_str(),
            stats.share(tier) * 100.0,
            expected * 100.0
        );
    }
}
