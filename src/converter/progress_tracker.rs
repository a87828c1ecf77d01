//! # Progress Tracking Module
//!
//! Unifica progress bar e contatori degli esiti in un singolo tracker
//! thread-safe, condiviso dai worker dello scheduler.

use crate::{
    converter::task_runner::TaskOutcome,
    error::ConvertError,
    file_manager::{MediaFile, MediaKind},
    progress::{ConversionStats, ProgressManager},
};
use tokio::sync::Mutex;

pub struct ProgressTracker {
    stats: Mutex<ConversionStats>,
    progress_manager: ProgressManager,
}

impl ProgressTracker {
    pub fn new(total_files: usize) -> Self {
        Self::with_manager(ProgressManager::new(total_files as u64))
    }

    pub fn with_manager(progress_manager: ProgressManager) -> Self {
        Self {
            stats: Mutex::new(ConversionStats::new()),
            progress_manager,
        }
    }

    /// Count one finished task and advance the bar
    pub async fn record(&self, file: &MediaFile, outcome: &TaskOutcome) {
        let name = file
            .path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .into_owned();

        let output_bytes = match outcome {
            TaskOutcome::Converted { output, .. } => tokio::fs::metadata(output)
                .await
                .map(|m| m.len())
                .unwrap_or(0),
            _ => 0,
        };

        let message = {
            let mut stats = self.stats.lock().await;
            match outcome {
                TaskOutcome::Converted { kind, .. } => {
                    match kind {
                        MediaKind::Video => stats.videos_converted += 1,
                        _ => stats.images_converted += 1,
                    }
                    stats.total_output_bytes += output_bytes;
                    format!("[OK] {}", name)
                }
                TaskOutcome::Skipped => {
                    stats.files_skipped += 1;
                    format!("[SKIP] {}", name)
                }
                TaskOutcome::Failed(ConvertError::Timeout { .. }) => {
                    stats.timeouts += 1;
                    format!("[TIMEOUT] {}", name)
                }
                TaskOutcome::Failed(ConvertError::PanicRecovered { .. }) => {
                    stats.panics += 1;
                    format!("[PANIC] {}", name)
                }
                TaskOutcome::Failed(ConvertError::Cancelled { .. }) => {
                    stats.cancelled += 1;
                    format!("[STOP] {}", name)
                }
                TaskOutcome::Failed(_) => {
                    stats.errors += 1;
                    format!("[ERROR] {}", name)
                }
            }
        };

        self.progress_manager.update(&message);
    }

    pub fn finish(&self, summary: &str) {
        self.progress_manager.finish(summary);
    }

    pub async fn get_stats(&self) -> ConversionStats {
        self.stats.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[tokio::test]
    async fn tallies_each_outcome_kind() {
        let tracker = ProgressTracker::with_manager(ProgressManager::hidden(4));
        let image = MediaFile::new(PathBuf::from("/in/a.jpg"));
        let video = MediaFile::new(PathBuf::from("/in/b.mp4"));

        tracker
            .record(
                &image,
                &TaskOutcome::Converted {
                    kind: MediaKind::Image,
                    output: PathBuf::from("/nowhere/a_0001.webp"),
                },
            )
            .await;
        tracker.record(&image, &TaskOutcome::Skipped).await;
        tracker
            .record(
                &video,
                &TaskOutcome::Failed(ConvertError::Timeout {
                    path: video.path.clone(),
                    timeout: Duration::from_secs(1),
                }),
            )
            .await;
        tracker
            .record(
                &video,
                &TaskOutcome::Failed(ConvertError::UnsupportedFormat("ogv".into())),
            )
            .await;

        let stats = tracker.get_stats().await;
        assert_eq!(stats.images_converted, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.timeouts, 1);
        assert_eq!(stats.errors, 1);
        assert_eq!(stats.files_processed(), 4);
        assert_eq!(stats.total_output_bytes, 0);
    }
}
