//! # File Management Module
//!
//! Questo modulo gestisce la discovery dei file e la loro classificazione.
//!
//! ## Responsabilità:
//! - Discovery ricorsiva di tutti i file nella directory di input
//! - Classificazione file (immagine / video / sconosciuto) dall'estensione
//! - Formattazione human-readable delle dimensioni per i log
//!
//! ## Formati riconosciuti:
//! - **Immagini**: PNG, JPG, JPEG, WebP, TIFF, BMP, DNG
//! - **Video**: MP4, AVI, MOV, MKV, FLV, WMV, WebM, M4V, 3GP, GIF
//!
//! La classificazione è una funzione pura dell'estensione (case-insensitive):
//! nessun I/O, nessun errore. I file sconosciuti vengono comunque enumerati e
//! saltati più avanti dal task runner con una nota nel log.
//!
//! ## Esempio:
//! ```rust,no_run
//! use media_batch_converter::file_manager::{FileManager, MediaKind};
//! use std::path::Path;
//!
//! # fn main() -> anyhow::Result<()> {
//! let files = FileManager::find_media_files(Path::new("/path/to/media"))?;
//! for file in files {
//!     if file.kind == MediaKind::Image {
//!         // process image
//!     }
//! }
//! # Ok(())
//! # }
//! ```

use anyhow::Result;
use std::fmt;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "tiff", "bmp", "dng"];
const VIDEO_EXTENSIONS: &[&str] = &[
    "mp4", "avi", "mov", "mkv", "flv", "wmv", "webm", "m4v", "3gp", "gif",
];

/// Kind of media inferred from the file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
    Unknown,
}

impl MediaKind {
    /// Classify a path by its extension
    pub fn classify(path: &Path) -> Self {
        let Some(ext) = path.extension() else {
            return Self::Unknown;
        };
        let ext_lower = ext.to_string_lossy().to_lowercase();

        if IMAGE_EXTENSIONS.contains(&ext_lower.as_str()) {
            Self::Image
        } else if VIDEO_EXTENSIONS.contains(&ext_lower.as_str()) {
            Self::Video
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => write!(f, "image"),
            Self::Video => write!(f, "video"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

/// A discovered input file and its inferred kind
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

impl MediaFile {
    pub fn new(path: PathBuf) -> Self {
        let kind = MediaKind::classify(&path);
        Self { path, kind }
    }
}

/// Manages file discovery
pub struct FileManager;

impl FileManager {
    /// Find every non-directory entry under `media_dir`, in a stable order.
    ///
    /// Symlinks are listed as-is and not followed; one pointing at a media
    /// file is converted through the link.
    pub fn find_media_files(media_dir: &Path) -> Result<Vec<MediaFile>> {
        let root = media_dir
            .canonicalize()
            .map_err(|e| anyhow::anyhow!("Failed to canonicalize {}: {}", media_dir.display(), e))?;

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!("Error walking through directory: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_dir() {
                files.push(MediaFile::new(entry.into_path()));
            }
        }

        Ok(files)
    }

    /// Get human-readable file size
    pub fn format_size(size: u64) -> String {
        const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
        let mut size = size as f64;
        let mut unit_index = 0;

        while size >= 1024.0 && unit_index < UNITS.len() - 1 {
            size /= 1024.0;
            unit_index += 1;
        }

        if unit_index == 0 {
            format!("{} {}", size as u64, UNITS[unit_index])
        } else {
            format!("{:.2} {}", size, UNITS[unit_index])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn classifies_known_extensions_case_insensitively() {
        for name in ["a.png", "b.JPG", "c.jpeg", "d.WebP", "e.tiff", "f.bmp", "g.DNG"] {
            assert_eq!(MediaKind::classify(Path::new(name)), MediaKind::Image, "{name}");
        }
        for name in [
            "a.mp4", "b.AVI", "c.mov", "d.mkv", "e.flv", "f.wmv", "g.webm", "h.m4v", "i.3gp",
            "j.GIF",
        ] {
            assert_eq!(MediaKind::classify(Path::new(name)), MediaKind::Video, "{name}");
        }
    }

    #[test]
    fn unknown_extensions_are_not_errors() {
        assert_eq!(MediaKind::classify(Path::new("notes.txt")), MediaKind::Unknown);
        assert_eq!(MediaKind::classify(Path::new("Makefile")), MediaKind::Unknown);
        assert_eq!(MediaKind::classify(Path::new("scan.tif")), MediaKind::Unknown);
        assert_eq!(MediaKind::classify(Path::new(".png")), MediaKind::Unknown);
    }

    #[test]
    fn finds_all_files_recursively() {
        let temp_dir = TempDir::new().unwrap();
        let nested = temp_dir.path().join("trip").join("day1");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(temp_dir.path().join("a.jpg"), b"x").unwrap();
        std::fs::write(nested.join("b.mp4"), b"x").unwrap();
        std::fs::write(nested.join("c.txt"), b"x").unwrap();

        let files = FileManager::find_media_files(temp_dir.path()).unwrap();
        assert_eq!(files.len(), 3);
        assert!(files.iter().all(|f| f.path.is_absolute()));

        let kinds: Vec<MediaKind> = files.iter().map(|f| f.kind).collect();
        assert!(kinds.contains(&MediaKind::Image));
        assert!(kinds.contains(&MediaKind::Video));
        assert!(kinds.contains(&MediaKind::Unknown));
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_listed() {
        let temp_dir = TempDir::new().unwrap();
        let elsewhere = TempDir::new().unwrap();
        let real = elsewhere.path().join("real.jpg");
        std::fs::write(&real, b"x").unwrap();
        std::os::unix::fs::symlink(&real, temp_dir.path().join("link.jpg")).unwrap();
        std::os::unix::fs::symlink(elsewhere.path(), temp_dir.path().join("album")).unwrap();

        let files = FileManager::find_media_files(temp_dir.path()).unwrap();
        let names: Vec<String> = files
            .iter()
            .map(|f| f.path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();

        // The directory link is listed but not descended into
        assert_eq!(names, vec!["album", "link.jpg"]);
        assert_eq!(files[1].kind, MediaKind::Image);
        assert_eq!(files[0].kind, MediaKind::Unknown);
    }

    #[test]
    fn test_format_size() {
        assert_eq!(FileManager::format_size(512), "512 B");
        assert_eq!(FileManager::format_size(2048), "2.00 KB");
        assert_eq!(FileManager::format_size(5 * 1024 * 1024), "5.00 MB");
    }
}
