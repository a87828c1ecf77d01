//! # Media Batch Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri consumatori
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom per diverse operazioni
//! - `file_manager`: Discovery dei file e classificazione per estensione
//! - `engine`: Contratti verso ImageMagick e FFmpeg e loro implementazioni
//! - `image_processor`: Policy crop → resize → qualità verso WebP
//! - `video_processor`: Tabella codec/container e pipeline GIF
//! - `converter`: Scheduler a batch, task runner e orchestratore
//! - `platform`: Nomi dei tool specifici per piattaforma
//! - `progress`: Progress bar e statistiche
//!
//! ## Utilizzo:
//! ```rust,no_run
//! use media_batch_converter::{Config, MediaConverter, StopSignal};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file(Path::new("config.yaml")).await?;
//! let converter = MediaConverter::new(config).await?;
//! converter.run(StopSignal::never()).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod converter;
pub mod engine;
pub mod error;
pub mod file_manager;
pub mod image_processor;
pub mod platform;
pub mod progress;
pub mod video_processor;

pub use config::Config;
pub use converter::{stop_channel, MediaConverter, StopHandle, StopSignal};
pub use error::ConvertError;
pub use file_manager::{MediaFile, MediaKind};
