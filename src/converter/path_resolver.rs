//! # Path Resolution Module
//!
//! Centralizza il calcolo della directory di output di ogni file: la struttura
//! relativa delle directory di input viene replicata sotto `output_path`.
//!
//! ```text
//! input_path/trip/day1/a.jpg  →  output_path/trip/day1/
//! input_path/b.mov            →  output_path/
//! ```

use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Maps input files to their output directory
#[derive(Debug, Clone)]
pub struct PathResolver {
    input_root: PathBuf,
    output_root: PathBuf,
}

impl PathResolver {
    pub fn new(input_root: impl Into<PathBuf>, output_root: impl Into<PathBuf>) -> Self {
        let input_root = input_root.into();
        // Discovered files carry canonical paths, so compare against the canonical root
        let input_root = input_root.canonicalize().unwrap_or(input_root);

        Self {
            input_root,
            output_root: output_root.into(),
        }
    }

    /// Output directory mirroring the input file's parent directory
    pub fn output_dir(&self, input_path: &Path) -> PathBuf {
        let parent = input_path.parent().unwrap_or(Path::new(""));

        let relative = match parent.strip_prefix(&self.input_root) {
            Ok(rel) => rel,
            Err(_) => {
                debug!(
                    "{} is outside {}, writing to output root",
                    input_path.display(),
                    self.input_root.display()
                );
                Path::new("")
            }
        };

        // Never let a relative component climb out of the output tree
        let relative: PathBuf = relative
            .components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect();

        self.output_root.join(relative)
    }
}
