//! # Batch Scheduler Module
//!
//! Divide la lista dei file in batch di `max_batch_size` e li esegue in
//! sequenza; dentro ogni batch al massimo `max_workers` task girano in
//! parallelo.
//!
//! ## Responsabilità:
//! - Possiede le sequenze di indici (immagini da 1, video da 0) e le passa ai task
//! - Attende il completamento dell'intero batch prima di passare al successivo
//! - Breve pausa tra un batch e l'altro (`batch_pause_ms`)
//! - Smette di prendere nuovi file quando arriva lo stop

use crate::{
    config::Config,
    converter::{
        path_resolver::PathResolver,
        progress_tracker::ProgressTracker,
        sequence::IndexSequences,
        shutdown::StopSignal,
        task_runner::{FileConverter, TaskRunner},
    },
    file_manager::MediaFile,
};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct BatchScheduler {
    runner: TaskRunner,
    max_batch_size: usize,
    max_workers: usize,
    pause: Duration,
}

impl BatchScheduler {
    pub fn new(converter: Arc<dyn FileConverter>, config: &Config) -> Self {
        let sequences = Arc::new(IndexSequences::new());
        let resolver = Arc::new(PathResolver::new(
            &config.input_path,
            &config.output_path,
        ));
        let runner = TaskRunner::new(converter, resolver, sequences, config.timeout());

        Self {
            runner,
            max_batch_size: config.max_batch_size.max(1),
            max_workers: config.max_workers.max(1),
            pause: config.batch_pause(),
        }
    }

    /// Run every batch to completion, returning the size of each batch started
    pub async fn run(
        &self,
        files: &[MediaFile],
        tracker: &ProgressTracker,
        stop: StopSignal,
    ) -> Vec<usize> {
        let total_batches = files.len().div_ceil(self.max_batch_size);
        let mut completed = Vec::with_capacity(total_batches);

        for (batch_index, batch) in files.chunks(self.max_batch_size).enumerate() {
            if stop.is_stopped() {
                warn!(
                    "Stop requested, skipping {} remaining batches",
                    total_batches - batch_index
                );
                break;
            }

            info!(
                "Processing batch {}/{} ({} files)",
                batch_index + 1,
                total_batches,
                batch.len()
            );

            stream::iter(batch)
                .for_each_concurrent(self.max_workers, |file| {
                    let stop = stop.clone();
                    async move {
                        let outcome = self.runner.run(file.clone(), stop).await;
                        tracker.record(file, &outcome).await;
                    }
                })
                .await;

            completed.push(batch.len());

            if batch_index + 1 < total_batches && !self.pause.is_zero() {
                let mut stop = stop.clone();
                tokio::select! {
                    _ = tokio::time::sleep(self.pause) => {}
                    _ = stop.stopped() => {}
                }
            }
        }

        completed
    }
}
