//! # Progress Tracking and Statistics Module
//!
//! Questo modulo gestisce la progress bar e le statistiche di conversione.
//!
//! ## Responsabilità:
//! - Progress bar visuale con `indicatif` per feedback real-time
//! - Conteggio degli esiti per tipo (convertiti, saltati, falliti, timeout, panic)
//! - Riepilogo finale da loggare a fine esecuzione
//!
//! ## Componenti principali:
//! - `ProgressManager`: Gestisce la progress bar principale
//! - `ConversionStats`: Traccia i contatori cumulativi
//!
//! ## Visual feedback:
//! ```text
//! ⠋ [00:02:15] [========================================] 150/150 (100%) [OK] photo.jpg
//! ```

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Manages progress reporting for a conversion run
#[derive(Clone)]
pub struct ProgressManager {
    bar: ProgressBar,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(total_files: u64) -> Self {
        let bar = ProgressBar::new(total_files);

        if let Ok(style) = ProgressStyle::default_bar().template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg}",
        ) {
            bar.set_style(style.progress_chars("=>-"));
        }

        bar.enable_steady_tick(Duration::from_millis(100));

        Self { bar }
    }

    /// A manager that never draws, for tests and non-interactive runs
    pub fn hidden(total_files: u64) -> Self {
        let bar = ProgressBar::hidden();
        bar.set_length(total_files);
        Self { bar }
    }

    /// Update progress with a message
    pub fn update(&self, message: &str) {
        self.bar.inc(1);
        self.bar.set_message(message.to_string());
    }

    /// Finish with a final message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

/// Outcome counters for one run
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConversionStats {
    pub images_converted: usize,
    pub videos_converted: usize,
    pub files_skipped: usize,
    pub errors: usize,
    pub timeouts: usize,
    pub panics: usize,
    pub cancelled: usize,
    pub total_output_bytes: u64,
}

impl ConversionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn files_processed(&self) -> usize {
        self.images_converted
            + self.videos_converted
            + self.files_skipped
            + self.errors
            + self.timeouts
            + self.panics
            + self.cancelled
    }

    pub fn files_failed(&self) -> usize {
        self.errors + self.timeouts + self.panics
    }

    pub fn format_summary(&self) -> String {
        format!(
            "Processed: {} files | Images: {} | Videos: {} | Skipped: {} | Failed: {} | Output: {}",
            self.files_processed(),
            self.images_converted,
            self.videos_converted,
            self.files_skipped,
            self.files_failed(),
            crate::file_manager::FileManager::format_size(self.total_output_bytes),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_counts_every_outcome() {
        let stats = ConversionStats {
            images_converted: 3,
            videos_converted: 1,
            files_skipped: 2,
            errors: 1,
            timeouts: 1,
            panics: 1,
            cancelled: 0,
            total_output_bytes: 2048,
        };
        assert_eq!(stats.files_processed(), 9);
        assert_eq!(stats.files_failed(), 3);
        assert!(stats.format_summary().starts_with("Processed: 9 files | Images: 3"));
    }

    #[test]
    fn hidden_manager_still_counts() {
        let progress = ProgressManager::hidden(4);
        progress.update("one");
        progress.update("two");
        assert_eq!(progress.position(), 2);
    }
}
