//! # Media Converter Main Orchestrator
//!
//! Orchestratore principale: scopre i file, li passa allo scheduler a batch e
//! riporta tempi e statistiche finali.

use crate::{
    config::Config,
    converter::{
        batch_scheduler::BatchScheduler,
        progress_tracker::ProgressTracker,
        shutdown::StopSignal,
        task_runner::{FileConverter, Processors},
    },
    engine::{FfmpegEngine, ImageEngine, ImageSize, MagickEngine, MediaEngine},
    error::Result as ConvertResult,
    file_manager::{FileManager, MediaKind},
    image_processor::ImageProcessor,
    progress::ConversionStats,
    video_processor::{VideoFormat, VideoProcessor},
};
use anyhow::Result;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Pipeline driver
pub struct MediaConverter {
    config: Config,
    converter: Arc<dyn FileConverter>,
}

impl MediaConverter {
    /// Detect the external tools and build the converter
    pub async fn new(config: Config) -> ConvertResult<Self> {
        let image_engine = MagickEngine::detect().await?;
        let media_engine = FfmpegEngine::detect().await?;
        Ok(Self::with_engines(
            config,
            Arc::new(image_engine),
            Arc::new(media_engine),
        ))
    }

    pub fn with_engines(
        config: Config,
        image_engine: Arc<dyn ImageEngine>,
        media_engine: Arc<dyn MediaEngine>,
    ) -> Self {
        let target = ImageSize::new(config.width, config.height);
        let processors = Processors {
            images: ImageProcessor::new(image_engine, target, config.image_budget_bytes()),
            videos: VideoProcessor::new(
                media_engine,
                target,
                config.video_size_kb,
                config.video_format.clone(),
            ),
        };
        Self::with_converter(config, Arc::new(processors))
    }

    pub fn with_converter(config: Config, converter: Arc<dyn FileConverter>) -> Self {
        Self { config, converter }
    }

    /// Convert the whole input tree
    pub async fn run(&self, stop: StopSignal) -> Result<ConversionStats> {
        let start_time = Instant::now();
        info!(
            "Starting media conversion in: {}",
            self.config.input_path.display()
        );
        self.log_configuration();

        let files = FileManager::find_media_files(&self.config.input_path)?;
        let images = files.iter().filter(|f| f.kind == MediaKind::Image).count();
        let videos = files.iter().filter(|f| f.kind == MediaKind::Video).count();
        info!(
            "Found {} files ({} images, {} videos, {} other)",
            files.len(),
            images,
            videos,
            files.len() - images - videos
        );

        if files.is_empty() {
            info!("No media files found to process");
            return Ok(ConversionStats::new());
        }

        tokio::fs::create_dir_all(&self.config.output_path).await?;

        let tracker = ProgressTracker::new(files.len());
        let scheduler = BatchScheduler::new(self.converter.clone(), &self.config);
        let batches = scheduler.run(&files, &tracker, stop).await;

        let stats = tracker.get_stats().await;
        tracker.finish(&stats.format_summary());
        self.print_final_stats(&stats, batches.len(), start_time.elapsed().as_secs_f64());

        Ok(stats)
    }

    fn log_configuration(&self) {
        let config = &self.config;
        info!("Output directory: {}", config.output_path.display());
        info!(
            "Images: {}x{} WebP, budget {} KB",
            config.width, config.height, config.image_size_kb
        );
        info!(
            "Videos: {} at {}k",
            config.video_format, config.video_size_kb
        );
        info!(
            "Batches of {} with {} workers, timeout {:?}",
            config.max_batch_size,
            config.max_workers,
            config.timeout()
        );

        if config.video_format.parse::<VideoFormat>().is_err() {
            warn!(
                "Unsupported video format '{}': every video will fail",
                config.video_format
            );
        }
    }

    fn print_final_stats(&self, stats: &ConversionStats, batches: usize, duration: f64) {
        info!("=== Conversion Complete ===");
        info!("Batches run: {}", batches);
        info!("Images converted: {}", stats.images_converted);
        info!("Videos converted: {}", stats.videos_converted);
        info!("Files skipped: {}", stats.files_skipped);
        info!("Errors: {}", stats.errors);
        info!("Timeouts: {}", stats.timeouts);
        info!("Panics recovered: {}", stats.panics);
        if stats.cancelled > 0 {
            info!("Cancelled: {}", stats.cancelled);
        }
        info!(
            "Total output size: {}",
            FileManager::format_size(stats.total_output_bytes)
        );
        info!("Total conversion time: {:.2} seconds", duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_config;
    use crate::engine::{
        ImageMetadata, MockImageEngine, MockMediaEngine, StreamDescriptor, StreamKind,
    };
    use crate::error::ConvertError;
    use tempfile::TempDir;

    fn image_engine() -> MockImageEngine {
        let mut engine = MockImageEngine::new();
        engine.expect_read().returning(|_| Ok(vec![7u8; 32]));
        engine
            .expect_size()
            .returning(|_| Ok(ImageSize::new(1080, 1920)));
        engine
            .expect_metadata()
            .returning(|_| Ok(ImageMetadata::default()));
        engine.expect_process().returning(|_, _| Ok(vec![1u8; 128]));
        engine
            .expect_write()
            .returning(|path, buffer| std::fs::write(path, buffer).map_err(ConvertError::from));
        engine
    }

    fn media_engine() -> MockMediaEngine {
        let mut engine = MockMediaEngine::new();
        engine
            .expect_probe()
            .returning(|_| Ok(vec![StreamDescriptor::new(0, StreamKind::Video)]));
        engine.expect_run().returning(|_| Ok(()));
        engine
    }

    #[tokio::test]
    async fn converts_a_tree_and_mirrors_directories() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        let output = temp_dir.path().join("out");
        std::fs::create_dir_all(input.join("sub")).unwrap();
        std::fs::write(input.join("a.jpg"), b"jpeg").unwrap();
        std::fs::write(input.join("b.mp4"), b"video").unwrap();
        std::fs::write(input.join("c.txt"), b"notes").unwrap();
        std::fs::write(input.join("sub/d.png"), b"png").unwrap();

        let converter = MediaConverter::with_engines(
            test_config(&input, &output),
            Arc::new(image_engine()),
            Arc::new(media_engine()),
        );
        let stats = converter.run(StopSignal::never()).await.unwrap();

        assert_eq!(stats.images_converted, 2);
        assert_eq!(stats.videos_converted, 1);
        assert_eq!(stats.files_skipped, 1);
        assert_eq!(stats.files_failed(), 0);

        assert!(output.join("out_0001.webp").exists());
        assert!(output.join("sub/sub_0002.webp").exists());
        assert!(output.join("vid_0.mp4").exists());
        assert_eq!(stats.total_output_bytes, 256);
    }

    #[tokio::test]
    async fn unsupported_video_format_fails_per_file() {
        let temp_dir = TempDir::new().unwrap();
        let input = temp_dir.path().join("in");
        std::fs::create_dir_all(&input).unwrap();
        std::fs::write(input.join("a.mov"), b"video").unwrap();
        std::fs::write(input.join("b.jpg"), b"jpeg").unwrap();

        let config = Config {
            video_format: "ogv".to_string(),
            ..test_config(&input, &temp_dir.path().join("out"))
        };
        let converter = MediaConverter::with_engines(
            config,
            Arc::new(image_engine()),
            Arc::new(MockMediaEngine::new()),
        );
        let stats = converter.run(StopSignal::never()).await.unwrap();

        assert_eq!(stats.errors, 1);
        assert_eq!(stats.images_converted, 1);
    }

    #[tokio::test]
    async fn empty_input_is_not_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let converter = MediaConverter::with_engines(
            test_config(temp_dir.path(), &temp_dir.path().join("out")),
            Arc::new(MockImageEngine::new()),
            Arc::new(MockMediaEngine::new()),
        );
        let stats = tokio_test::assert_ok!(converter.run(StopSignal::never()).await);
        assert_eq!(stats, ConversionStats::new());
    }
}
