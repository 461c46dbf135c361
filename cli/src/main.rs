use anyhow::{bail, Result};
use clap::Parser;
use log::{info, warn};
use serde_json::json;
use station_cli::utils::*;
use station_service::{
    candidates::CandidateRoster,
    config::{StationConfig, TimingConfig},
    database::SqliteDurableStore,
    identity::{validate_voter_id, DigestKind, IdentityHasher},
    integrity,
    ledger::LedgerEntry,
    reconcile::{merge_ledgers, reconcile},
    results::aggregate,
    store::{DurableStore, FastStore, FileFastStore},
    Station,
};
use std::path::PathBuf;
use tokio::runtime::Builder;

#[derive(Clone, Parser)]
#[command(author, version, about)]
struct Cli {
    #[arg(long, env, default_value = "station.db")]
    pub db_path: String,

    #[arg(long, env, default_value = "station_fast.json")]
    pub fast_store_path: PathBuf,

    #[arg(long, env)]
    pub candidates_path: Option<PathBuf>,

    #[arg(long, env = "IDENTITY_DIGEST", default_value = "sha256", value_parser = parse_digest_kind)]
    pub digest: DigestKind,

    #[arg(short, long, help = "Write the JSON report here instead of stdout")]
    pub output: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    fn station_config(&self) -> StationConfig {
        StationConfig {
            db_path: self.db_path.clone(),
            fast_store_path: self.fast_store_path.clone(),
            candidates_path: self.candidates_path.clone(),
            timing: TimingConfig::immediate(),
            digest: self.digest,
            ..StationConfig::default()
        }
    }

    fn roster(&self) -> Result<CandidateRoster> {
        Ok(match &self.candidates_path {
            Some(path) => CandidateRoster::load(path)?,
            None => CandidateRoster::default(),
        })
    }
}

#[derive(clap::Subcommand, Clone)]
pub enum Commands {
    /// Print the identity hash of a voter id.
    Hash {
        #[arg(long)]
        voter_id: String,
    },
    /// Run startup reconciliation and write the merged ledger back to both stores.
    Reconcile {},
    /// Read-only report over the merged stores.
    Show {
        #[arg(long, value_parser = parse_view, help = "ledger | results | integrity")]
        view: View,
    },
    /// Cast one vote through the full session flow, without feedback delays.
    Vote {
        #[arg(long)]
        voter_id: String,

        #[arg(long)]
        candidate: String,
    },
}

fn main() -> Result<()> {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .is_test(false)
        .try_init();

    let runtime = Builder::new_multi_thread().enable_all().build()?;
    let cli = Cli::parse();
    runtime.block_on(run(cli))
}

async fn open_durable(db_path: &str) -> Option<SqliteDurableStore> {
    match SqliteDurableStore::open(db_path).await {
        Ok(store) => Some(store),
        Err(e) => {
            warn!("Durable store unavailable, using the fast store only: {}", e);
            None
        }
    }
}

/// Merged ledger and expected count, without writing to either store.
async fn read_merged(cli: &Cli) -> Result<(Vec<LedgerEntry>, usize)> {
    let fast = FileFastStore::open(&cli.fast_store_path).await?;
    let baseline = fast.load_ledger().await.unwrap_or_else(|e| {
        warn!("Fast store ledger unreadable: {}", e);
        Vec::new()
    });
    let durable = match open_durable(&cli.db_path).await {
        Some(store) => store.get_all().await?,
        None => Vec::new(),
    };
    let expected = fast.load_expected_count().await.unwrap_or(0);
    Ok((merge_ledgers(baseline, durable), expected))
}

async fn run(cli: Cli) -> Result<()> {
    let output = cli.output.clone();

    match &cli.command {
        Commands::Hash { voter_id } => {
            validate_voter_id(voter_id)?;
            let hasher = IdentityHasher::from_kind(cli.digest);
            let hash = hasher.hash(voter_id).await?;
            write_report(
                &json!({ "algorithm": hasher.algorithm(), "identity_hash": hash }),
                output.as_deref(),
            )?;
        }
        Commands::Reconcile {} => {
            info!("Reconcile...");
            let fast = FileFastStore::open(&cli.fast_store_path).await?;
            let durable = open_durable(&cli.db_path).await;
            let report = reconcile(&fast, durable.as_ref().map(|d| d as &dyn DurableStore)).await;
            let expected = fast.load_expected_count().await.unwrap_or(0);
            let status = integrity::check(report.ledger.len(), expected);

            write_report(
                &json!({
                    "ledger": report.ledger.len(),
                    "baseline": report.baseline_len,
                    "recovered_from_durable": report.recovered_from_durable,
                    "durable_repair_failures": report.durable_repair_failures,
                    "durable_available": report.durable_available,
                    "baseline_unreadable": report.baseline_unreadable,
                    "fast_write_failed": report.fast_write_failed,
                    "integrity": status,
                }),
                output.as_deref(),
            )?;
        }
        Commands::Show { view } => {
            let (entries, expected) = read_merged(&cli).await?;
            match view {
                View::Ledger => write_report(&entries, output.as_deref())?,
                View::Results => {
                    let summary = aggregate(&entries, &cli.roster()?);
                    write_report(&summary, output.as_deref())?;
                }
                View::Integrity => {
                    let status = integrity::check(entries.len(), expected);
                    write_report(
                        &json!({ "integrity": status, "banner": status.banner() }),
                        output.as_deref(),
                    )?;
                }
            }
        }
        Commands::Vote {
            voter_id,
            candidate,
        } => {
            info!("Vote...");
            let station = Station::open(&cli.station_config()).await?;
            station.initialize().await?;

            let view = station.login(voter_id).await?;
            if view.state != "ballot_open" {
                bail!("voter cannot vote, station is {}", view.state);
            }
            station.select_candidate(candidate)?;
            let entry = station.confirm_cast().await?;
            station.flush_replication().await;

            info!("Vote recorded for candidate {}", candidate);
            write_report(&entry, output.as_deref())?;
        }
    }

    Ok(())
}
