use clap::Parser;
use miette::{IntoDiagnostic, Result};
use order_ledger::config::LedgerConfig;
use order_ledger::domain::ports::TransactionStoreRef;
use order_ledger::domain::transaction::UserId;
use order_ledger::infrastructure::in_memory::InMemoryTransactionStore;
#[cfg(feature = "storage-rocksdb")]
use order_ledger::infrastructure::rocksdb::RocksDBStore;
use order_ledger::interfaces::csv::operation_reader::OperationReader;
use order_ledger::interfaces::csv::report_writer::ReportWriter;
use order_ledger::interfaces::session::Session;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input operations CSV file
    input: PathBuf,

    /// JSON file with wallet limits, gateway rates and payable order statuses.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the simulated card gateways; overrides the config file.
    #[arg(long)]
    seed: Option<u64>,

    /// Admin id recorded on admin credits and debits.
    #[arg(long, default_value_t = 1)]
    admin_id: UserId,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn open_store(db_path: Option<PathBuf>) -> Result<TransactionStoreRef> {
    #[cfg(feature = "storage-rocksdb")]
    if let Some(path) = db_path {
        let store = RocksDBStore::open(path).into_diagnostic()?;
        return Ok(Arc::new(store));
    }

    #[cfg(not(feature = "storage-rocksdb"))]
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }

    Ok(Arc::new(InMemoryTransactionStore::new()))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "order_ledger=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => LedgerConfig::from_path(path).into_diagnostic()?,
        None => LedgerConfig::default(),
    };
    if cli.seed.is_some() {
        config.gateway.seed = cli.seed;
    }

    let store = open_store(cli.db_path)?;
    let session = Session::new(store, config, cli.admin_id).into_diagnostic()?;

    let file = File::open(cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for (index, op_result) in reader.operations().enumerate() {
        let row = index + 1;
        match op_result {
            Ok(op) => {
                if let Err(e) = session.apply(op).await {
                    eprintln!("Error processing operation {row}: {e}");
                }
            }
            Err(e) => {
                eprintln!("Error reading operation {row}: {e}");
            }
        }
    }

    let reports = session.report().await.into_diagnostic()?;

    let stdout = io::stdout();
    let mut writer = ReportWriter::new(stdout.lock());
    writer.write_reports(reports).into_diagnostic()?;

    Ok(())
}
