//! # Error Types Module
//!
//! Questo modulo definisce tutti i tipi di errore custom dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare tutti gli errori possibili
//! - Distingue errori fatali (configurazione) da errori per singolo file
//! - Porta con sé il contesto (path, dimensioni, tool) necessario al log
//!
//! ## Categorie di errori:
//! - `Config`: Configurazione invalida, interrompe l'intera esecuzione
//! - `MissingDependency`: Tool esterno mancante (magick, ffmpeg, ffprobe)
//! - `Validation`: Input del singolo file invalido (path vuoti, sorgente mancante)
//! - `Read`: Buffer immagine vuoto o illeggibile
//! - `InvalidCrop`: Rettangolo di crop fuori dai limiti della sorgente
//! - `Engine`: Fallimento di un engine esterno (read/process/write/probe/run)
//! - `UnsupportedFormat`: Container video di destinazione sconosciuto
//! - `Timeout`: Task abbandonato dopo la deadline
//! - `PanicRecovered`: Panic catturato al confine del task
//! - `Cancelled`: Task interrotto dallo stop (Ctrl-C)
//! - `Io`: Errori di I/O generici
//!
//! Solo `Config` e `MissingDependency` sono fatali: tutti gli altri restano
//! confinati al file che li ha prodotti.

use std::path::PathBuf;
use std::time::Duration;

/// Custom error types for media conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("File validation error: {0}")]
    Validation(String),

    #[error("Failed to read image {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error(
        "Invalid crop area: image size {source_width}x{source_height}, crop area {left},{top} {crop_width}x{crop_height}"
    )]
    InvalidCrop {
        source_width: u32,
        source_height: u32,
        left: u32,
        top: u32,
        crop_width: u32,
        crop_height: u32,
    },

    #[error("{tool} error: {message}")]
    Engine { tool: String, message: String },

    #[error("Unsupported video format: {0}")]
    UnsupportedFormat(String),

    #[error("Processing timed out after {timeout:?}: {path}")]
    Timeout { path: PathBuf, timeout: Duration },

    #[error("Task panicked while processing {path}: {message}")]
    PanicRecovered { path: PathBuf, message: String },

    #[error("Processing cancelled: {path}")]
    Cancelled { path: PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConvertError {
    /// Shorthand for engine failures
    pub fn engine(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Engine {
            tool: tool.into(),
            message: message.into(),
        }
    }
}

pub type Result<T, E = ConvertError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_crop_message_carries_geometry() {
        let err = ConvertError::InvalidCrop {
            source_width: 100,
            source_height: 50,
            left: 10,
            top: 0,
            crop_width: 95,
            crop_height: 50,
        };
        assert_eq!(
            err.to_string(),
            "Invalid crop area: image size 100x50, crop area 10,0 95x50"
        );
    }
}
