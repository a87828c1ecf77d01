//! # Converter Module
//!
//! Orchestrazione della pipeline, separata in sottomoduli:
//! - `media_converter`: Orchestratore principale (driver)
//! - `batch_scheduler`: Batch sequenziali con worker pool limitato
//! - `task_runner`: Worker per singoli file (timeout, stop, panic)
//! - `progress_tracker`: Progress bar e conteggio esiti
//! - `path_resolver`: Calcolo della directory di output
//! - `sequence`: Contatori atomici per i nomi di output
//! - `shutdown`: Segnale di stop (Ctrl-C)

pub mod batch_scheduler;
pub mod media_converter;
pub mod path_resolver;
pub mod progress_tracker;
pub mod sequence;
pub mod shutdown;
pub mod task_runner;

pub use batch_scheduler::BatchScheduler;
pub use media_converter::MediaConverter;
pub use path_resolver::PathResolver;
pub use progress_tracker::ProgressTracker;
pub use sequence::{IndexSequence, IndexSequences};
pub use shutdown::{stop_channel, StopHandle, StopSignal};
pub use task_runner::{FileConverter, Processors, TaskOutcome, TaskRunner};
