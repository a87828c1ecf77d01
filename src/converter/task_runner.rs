//! # Task Runner Module
//!
//! Worker per la conversione di un singolo file, separato dall'orchestratore.
//!
//! ## Responsabilità:
//! - Salta i file di tipo sconosciuto (solo una nota nel log)
//! - Esegue la conversione su un task dedicato, in gara con il timeout e con
//!   il segnale di stop
//! - Allo scadere del timeout abortisce il task e ne attende la terminazione:
//!   i processi esterni muoiono con il task (kill-on-drop) e i file temporanei
//!   vengono rimossi dal drop
//! - Cattura i panic al confine del task (`PanicRecovered`)

use crate::{
    converter::{path_resolver::PathResolver, sequence::IndexSequences, shutdown::StopSignal},
    error::{ConvertError, Result},
    file_manager::{MediaFile, MediaKind},
    image_processor::ImageProcessor,
    video_processor::VideoProcessor,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinError;
use tracing::{debug, error, info, warn};

/// Converts one classified file into an output directory
#[async_trait]
pub trait FileConverter: Send + Sync {
    async fn convert(
        &self,
        file: &MediaFile,
        output_dir: &Path,
        sequences: &IndexSequences,
    ) -> Result<PathBuf>;
}

/// Dispatches by media kind to the image and video policies
pub struct Processors {
    pub images: ImageProcessor,
    pub videos: VideoProcessor,
}

#[async_trait]
impl FileConverter for Processors {
    async fn convert(
        &self,
        file: &MediaFile,
        output_dir: &Path,
        sequences: &IndexSequences,
    ) -> Result<PathBuf> {
        match file.kind {
            MediaKind::Image => {
                self.images
                    .process(&file.path, output_dir, &sequences.images)
                    .await
            }
            MediaKind::Video => {
                self.videos
                    .process(&file.path, output_dir, &sequences.videos)
                    .await
            }
            MediaKind::Unknown => Err(ConvertError::Validation(format!(
                "not a media file: {}",
                file.path.display()
            ))),
        }
    }
}

/// Result of one task
#[derive(Debug)]
pub enum TaskOutcome {
    Converted { kind: MediaKind, output: PathBuf },
    Skipped,
    Failed(ConvertError),
}

enum Race {
    Finished(std::result::Result<Result<PathBuf>, JoinError>),
    TimedOut,
    Stopped,
}

/// Runs single files with timeout, cancellation and panic recovery
#[derive(Clone)]
pub struct TaskRunner {
    converter: Arc<dyn FileConverter>,
    resolver: Arc<PathResolver>,
    sequences: Arc<IndexSequences>,
    timeout: Duration,
}

impl TaskRunner {
    pub fn new(
        converter: Arc<dyn FileConverter>,
        resolver: Arc<PathResolver>,
        sequences: Arc<IndexSequences>,
        timeout: Duration,
    ) -> Self {
        Self {
            converter,
            resolver,
            sequences,
            timeout,
        }
    }

    /// Convert one file end-to-end; never panics and never returns early with work still running
    pub async fn run(&self, file: MediaFile, mut stop: StopSignal) -> TaskOutcome {
        if file.kind == MediaKind::Unknown {
            info!("Skipping unsupported file: {}", file.path.display());
            return TaskOutcome::Skipped;
        }

        let path = file.path.clone();
        let kind = file.kind;

        if stop.is_stopped() {
            return TaskOutcome::Failed(ConvertError::Cancelled { path });
        }

        let output_dir = self.resolver.output_dir(&file.path);
        debug!(
            "Processing {} {} -> {}",
            kind,
            path.display(),
            output_dir.display()
        );

        let converter = self.converter.clone();
        let sequences = self.sequences.clone();
        let mut handle = tokio::spawn(async move {
            converter.convert(&file, &output_dir, &sequences).await
        });

        let race = tokio::select! {
            joined = tokio::time::timeout(self.timeout, &mut handle) => match joined {
                Ok(joined) => Race::Finished(joined),
                Err(_) => Race::TimedOut,
            },
            _ = stop.stopped() => Race::Stopped,
        };

        let result = match race {
            Race::Finished(Ok(result)) => result,
            Race::Finished(Err(join_error)) => Err(Self::recover(join_error, &path)),
            Race::TimedOut => {
                error!(
                    "File processing timed out after {:?}: {}",
                    self.timeout,
                    path.display()
                );
                Self::abandon(handle, &path).await;
                Err(ConvertError::Timeout {
                    path: path.clone(),
                    timeout: self.timeout,
                })
            }
            Race::Stopped => {
                warn!("Stop requested, aborting {}", path.display());
                Self::abandon(handle, &path).await;
                Err(ConvertError::Cancelled { path: path.clone() })
            }
        };

        match result {
            Ok(output) => TaskOutcome::Converted { kind, output },
            Err(e) => {
                error!("Failed to process {}: {}", path.display(), e);
                TaskOutcome::Failed(e)
            }
        }
    }

    /// Abort the task and wait until it has actually terminated
    async fn abandon(handle: tokio::task::JoinHandle<Result<PathBuf>>, path: &Path) {
        handle.abort();
        match handle.await {
            Err(e) if e.is_cancelled() => debug!("Task for {} cancelled", path.display()),
            Err(e) => debug!("Task for {} ended while aborting: {}", path.display(), e),
            Ok(_) => debug!("Task for {} finished before the abort landed", path.display()),
        }
    }

    fn recover(join_error: JoinError, path: &Path) -> ConvertError {
        if join_error.is_cancelled() {
            return ConvertError::Cancelled {
                path: path.to_path_buf(),
            };
        }

        let message = match join_error.try_into_panic() {
            Ok(payload) => payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic payload".to_string()),
            Err(e) => e.to_string(),
        };

        ConvertError::PanicRecovered {
            path: path.to_path_buf(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::converter::shutdown::stop_channel;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Converter with scripted delay or panic
    struct ScriptedConverter {
        delay: Duration,
        panic: bool,
        dropped: Arc<AtomicBool>,
    }

    impl ScriptedConverter {
        fn quick() -> Self {
            Self {
                delay: Duration::ZERO,
                panic: false,
                dropped: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    struct DropFlag(Arc<AtomicBool>);

    impl Drop for DropFlag {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl FileConverter for ScriptedConverter {
        async fn convert(
            &self,
            file: &MediaFile,
            output_dir: &Path,
            sequences: &IndexSequences,
        ) -> Result<PathBuf> {
            let _guard = DropFlag(self.dropped.clone());
            if self.panic {
                panic!("decoder blew up");
            }
            tokio::time::sleep(self.delay).await;

            let index = match file.kind {
                MediaKind::Image => sequences.images.next(),
                _ => sequences.videos.next(),
            };
            Ok(output_dir.join(format!("out_{index}")))
        }
    }

    fn runner(converter: ScriptedConverter, timeout: Duration) -> TaskRunner {
        TaskRunner::new(
            Arc::new(converter),
            Arc::new(PathResolver::new("/in", "/out")),
            Arc::new(IndexSequences::new()),
            timeout,
        )
    }

    #[tokio::test]
    async fn converts_through_the_converter() {
        let runner = runner(ScriptedConverter::quick(), Duration::from_secs(5));
        let outcome = runner
            .run(MediaFile::new(PathBuf::from("/in/a/photo.jpg")), StopSignal::never())
            .await;

        match outcome {
            TaskOutcome::Converted { kind, output } => {
                assert_eq!(kind, MediaKind::Image);
                assert_eq!(output, PathBuf::from("/out/a/out_1"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_files_are_skipped() {
        let runner = runner(ScriptedConverter::quick(), Duration::from_secs(5));
        let outcome = runner
            .run(MediaFile::new(PathBuf::from("/in/notes.txt")), StopSignal::never())
            .await;
        assert!(matches!(outcome, TaskOutcome::Skipped));
    }

    #[tokio::test]
    async fn panic_is_recovered() {
        let converter = ScriptedConverter {
            panic: true,
            ..ScriptedConverter::quick()
        };
        let runner = runner(converter, Duration::from_secs(5));
        let outcome = runner
            .run(MediaFile::new(PathBuf::from("/in/clip.mp4")), StopSignal::never())
            .await;

        match outcome {
            TaskOutcome::Failed(ConvertError::PanicRecovered { path, message }) => {
                assert_eq!(path, PathBuf::from("/in/clip.mp4"));
                assert_eq!(message, "decoder blew up");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn timeout_aborts_and_releases_the_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let converter = ScriptedConverter {
            delay: Duration::from_secs(60),
            panic: false,
            dropped: dropped.clone(),
        };
        let runner = runner(converter, Duration::from_millis(50));
        let outcome = runner
            .run(MediaFile::new(PathBuf::from("/in/long.mov")), StopSignal::never())
            .await;

        assert!(matches!(
            outcome,
            TaskOutcome::Failed(ConvertError::Timeout { .. })
        ));
        // The task has been torn down by the time the runner reports
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn stop_cancels_in_flight_work() {
        let dropped = Arc::new(AtomicBool::new(false));
        let converter = ScriptedConverter {
            delay: Duration::from_secs(60),
            panic: false,
            dropped: dropped.clone(),
        };
        let runner = runner(converter, Duration::from_secs(120));
        let (handle, signal) = stop_channel();

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            handle.stop();
        });

        let outcome = runner
            .run(MediaFile::new(PathBuf::from("/in/long.mov")), signal)
            .await;
        stopper.await.unwrap();

        assert!(matches!(
            outcome,
            TaskOutcome::Failed(ConvertError::Cancelled { .. })
        ));
        assert!(dropped.load(Ordering::SeqCst));
    }
}
