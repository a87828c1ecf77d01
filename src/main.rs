//! # Media Batch Converter - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del logging su file (append) con `tracing-appender`
//! - Caricamento e validazione della configurazione (errore fatale se invalida)
//! - Verifica dei tool esterni e avvio del converter
//! - Ctrl-C: stop ordinato dei worker
//!
//! ## Flusso di esecuzione:
//! 1. Parsa gli argomenti CLI (file di configurazione, override)
//! 2. Carica `config.yaml` e applica gli override
//! 3. Configura il logging (INFO o DEBUG con `--verbose`, `RUST_LOG` vince)
//! 4. Istanzia MediaConverter e avvia la conversione
//! 5. Stampa il tempo totale di conversione
//!
//! ## Esempio di utilizzo:
//! ```bash
//! media-converter config.yaml --workers 4 --batch-size 10 --verbose
//! ```

use anyhow::{Context, Result};
use clap::Parser;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use media_batch_converter::{stop_channel, Config, MediaConverter};

#[derive(Parser)]
#[command(name = "media-converter")]
#[command(about = "Convert a media tree into fixed-size WebP images and re-encoded videos")]
struct Args {
    /// Configuration file (YAML, or JSON with a .json extension)
    #[arg(default_value = "config.yaml")]
    config: PathBuf,

    /// Override the number of parallel workers per batch
    #[arg(short, long)]
    workers: Option<usize>,

    /// Override the number of files per batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Override the log file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(log_file: &Path, verbose: bool) -> Result<WorkerGuard> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("Failed to open log file {}", log_file.display()))?;
    let (writer, guard) = tracing_appender::non_blocking(file);

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .with(filter)
        .try_init()?;

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let start_time = Instant::now();
    let args = Args::parse();

    let mut config = Config::from_file(&args.config).await?;
    if let Some(workers) = args.workers {
        config.max_workers = workers;
    }
    if let Some(batch_size) = args.batch_size {
        config.max_batch_size = batch_size;
    }
    if let Some(log_file) = args.log_file {
        config.log_file = log_file;
    }
    config.validate()?;

    let _guard = init_logging(&config.log_file, args.verbose)?;
    info!("Loaded configuration from {}", args.config.display());

    let converter = MediaConverter::new(config).await?;

    let (stop_handle, stop) = stop_channel();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after in-flight tasks are aborted");
            stop_handle.stop();
        }
    });

    converter.run(stop).await?;

    println!(
        "Total conversion time: {:.2} seconds",
        start_time.elapsed().as_secs_f64()
    );
    Ok(())
}
