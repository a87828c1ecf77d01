//! # Configuration Management Module
//!
//! Questo modulo gestisce tutta la configurazione dell'applicazione.
//!
//! ## Responsabilità:
//! - Definisce la struct `Config` con tutti i parametri di conversione
//! - Carica la configurazione da file YAML (default `config.yaml`) o JSON
//! - Fornisce valori di default per i parametri opzionali
//! - Valida i parametri prima che qualsiasi file venga toccato
//!
//! ## Parametri di configurazione:
//! - `input_path` / `output_path`: Directory sorgente e destinazione
//! - `width` / `height`: Dimensioni target delle immagini (e scala dei video)
//! - `image_size_kb`: Budget in KB per ogni immagine WebP
//! - `video_size_kb`: Bitrate video target (kbit/s)
//! - `video_format`: Container video di destinazione (mp4, webm, gif, ...)
//! - `conversion_timeout`: Timeout per singolo file in millisecondi (default: 300000)
//! - `max_batch_size`: File per batch (default: 5)
//! - `max_workers`: Worker paralleli per batch (default: 1)
//! - `batch_pause_ms`: Pausa tra un batch e il successivo (default: 250)
//! - `log_file`: File di log in append (default: `conversion.log`)
//!
//! ## Esempio (`config.yaml`):
//! ```yaml
//! input_path: ./input
//! output_path: ./output
//! width: 1080
//! height: 1920
//! image_size_kb: 300
//! video_size_kb: 2500
//! video_format: mp4
//! conversion_timeout: 120000
//! ```

use crate::error::{ConvertError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

fn default_conversion_timeout() -> u64 {
    300_000
}

fn default_max_batch_size() -> usize {
    5
}

fn default_max_workers() -> usize {
    1
}

fn default_batch_pause_ms() -> u64 {
    250
}

fn default_log_file() -> PathBuf {
    PathBuf::from("conversion.log")
}

/// Configuration for a conversion run
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    /// Root of the tree to convert
    pub input_path: PathBuf,
    /// Root of the output tree (mirrors the input directory layout)
    pub output_path: PathBuf,
    /// Target width in pixels
    pub width: u32,
    /// Target height in pixels
    pub height: u32,
    /// Byte budget for each image, in KB
    pub image_size_kb: u64,
    /// Target video bitrate, in kbit/s
    pub video_size_kb: u64,
    /// Target video container (mp4, webm, avi, mov, mkv, flv, wmv, m4v, 3gp, gif)
    pub video_format: String,
    /// Per-file timeout in milliseconds
    #[serde(default = "default_conversion_timeout")]
    pub conversion_timeout: u64,
    /// Files per batch
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,
    /// Parallel workers per batch
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Pause between batches in milliseconds
    #[serde(default = "default_batch_pause_ms")]
    pub batch_pause_ms: u64,
    /// Append-only log file
    #[serde(default = "default_log_file")]
    pub log_file: PathBuf,
}

impl Config {
    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.input_path.as_os_str().is_empty() {
            return Err(ConvertError::Config("input_path must not be empty".into()));
        }
        if self.output_path.as_os_str().is_empty() {
            return Err(ConvertError::Config("output_path must not be empty".into()));
        }
        if !self.input_path.is_dir() {
            return Err(ConvertError::Config(format!(
                "Input path is not a directory: {}",
                self.input_path.display()
            )));
        }
        if self.width == 0 || self.height == 0 {
            return Err(ConvertError::Config(format!(
                "Target size must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        if self.image_size_kb == 0 {
            return Err(ConvertError::Config("image_size_kb must be greater than 0".into()));
        }
        if self.video_size_kb == 0 {
            return Err(ConvertError::Config("video_size_kb must be greater than 0".into()));
        }
        if self.conversion_timeout == 0 {
            return Err(ConvertError::Config("conversion_timeout must be greater than 0".into()));
        }
        if self.max_batch_size == 0 {
            return Err(ConvertError::Config("max_batch_size must be greater than 0".into()));
        }
        if self.max_workers == 0 {
            return Err(ConvertError::Config("max_workers must be greater than 0".into()));
        }

        Ok(())
    }

    /// Per-file timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.conversion_timeout)
    }

    /// Pause between batches as a `Duration`
    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    /// Image byte budget
    pub fn image_budget_bytes(&self) -> usize {
        (self.image_size_kb as usize).saturating_mul(1024)
    }

    /// Load configuration from a YAML or JSON file
    pub async fn from_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConvertError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let is_json = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let config: Config = if is_json {
            serde_json::from_str(&content)
                .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            serde_yaml::from_str(&content)
                .map_err(|e| ConvertError::Config(format!("{}: {}", path.display(), e)))?
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
pub(crate) fn test_config(input: &Path, output: &Path) -> Config {
    Config {
        input_path: input.to_path_buf(),
        output_path: output.to_path_buf(),
        width: 1080,
        height: 1920,
        image_size_kb: 300,
        video_size_kb: 2500,
        video_format: "mp4".to_string(),
        conversion_timeout: default_conversion_timeout(),
        max_batch_size: default_max_batch_size(),
        max_workers: default_max_workers(),
        batch_pause_ms: 0,
        log_file: default_log_file(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_validation() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config(temp_dir.path(), &temp_dir.path().join("out"));
        assert!(config.validate().is_ok());

        config.width = 0;
        assert!(matches!(config.validate(), Err(ConvertError::Config(_))));

        config.width = 1080;
        config.max_workers = 0;
        assert!(config.validate().is_err());

        config.max_workers = 2;
        config.max_batch_size = 0;
        assert!(config.validate().is_err());

        config.max_batch_size = 5;
        config.input_path = temp_dir.path().join("missing");
        assert!(config.validate().is_err());
    }

    #[tokio::test]
    async fn test_yaml_defaults_applied() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml = format!(
            "input_path: {}\noutput_path: {}\nwidth: 1080\nheight: 1920\nimage_size_kb: 300\nvideo_size_kb: 2500\nvideo_format: webm\n",
            input.display(),
            temp_dir.path().join("out").display()
        );
        std::fs::write(&config_path, yaml).unwrap();

        let config = Config::from_file(&config_path).await.unwrap();
        assert_eq!(config.video_format, "webm");
        assert_eq!(config.max_batch_size, 5);
        assert_eq!(config.max_workers, 1);
        assert_eq!(config.conversion_timeout, 300_000);
        assert_eq!(config.timeout(), Duration::from_secs(300));
        assert_eq!(config.image_budget_bytes(), 300 * 1024);
        assert_eq!(config.log_file, PathBuf::from("conversion.log"));
    }

    #[tokio::test]
    async fn test_missing_required_key_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "input_path: /tmp\nwidth: 10\n").unwrap();

        let result = Config::from_file(&config_path).await;
        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[tokio::test]
    async fn test_missing_file_is_config_error() {
        let temp_dir = TempDir::new().unwrap();
        let result = Config::from_file(&temp_dir.path().join("nope.yaml")).await;
        assert!(matches!(result, Err(ConvertError::Config(_))));
    }

    #[tokio::test]
    async fn test_config_yaml_and_json_load() {
        let temp_dir = TempDir::new().unwrap();
        let original_config = Config {
            max_workers: 4,
            video_format: "mkv".to_string(),
            ..test_config(temp_dir.path(), &temp_dir.path().join("out"))
        };

        for name in ["config.yaml", "config.json"] {
            let config_path = temp_dir.path().join(name);
            let content = if name.ends_with(".json") {
                serde_json::to_string_pretty(&original_config).unwrap()
            } else {
                serde_yaml::to_string(&original_config).unwrap()
            };
            std::fs::write(&config_path, content).unwrap();
            let loaded_config = Config::from_file(&config_path).await.unwrap();
            assert_eq!(loaded_config, original_config);
        }
    }
}
