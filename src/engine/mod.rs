//! # Engine Module
//!
//! Contratti verso i due collaboratori esterni che fanno il lavoro pesante:
//! - `ImageEngine`: decode, crop, resize, re-encode, lettura metadata
//! - `MediaEngine`: probe degli stream e pipeline di transcodifica
//!
//! Le policy di conversione (`image_processor`, `video_processor`) decidono
//! *cosa* chiedere; gli engine lo eseguono. Le implementazioni reali
//! (`MagickEngine`, `FfmpegEngine`) delegano a ImageMagick e FFmpeg tramite
//! processi esterni; nei test vengono sostituite dai mock generati da
//! `mockall`.

pub mod command;
pub mod ffmpeg;
pub mod magick;

pub use command::{ToolCommand, ToolOutput};
pub use ffmpeg::FfmpegEngine;
pub use magick::MagickEngine;

use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Pixel dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Metadata relevant to geometry planning
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageMetadata {
    /// EXIF orientation tag (1-8), if present
    pub orientation: Option<u8>,
}

/// Crop rectangle in oriented source coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CropPlan {
    pub crop_width: u32,
    pub crop_height: u32,
    pub left: u32,
    pub top: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gravity {
    Center,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputCodec {
    Webp,
}

impl OutputCodec {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Webp => "webp",
        }
    }
}

/// One image engine operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessRequest {
    /// Crop the source and encode it
    Crop {
        rect: CropPlan,
        gravity: Gravity,
        quality: u8,
        codec: OutputCodec,
    },
    /// Force-resize to exact dimensions, ignoring aspect ratio
    Resize {
        width: u32,
        height: u32,
        quality: u8,
        codec: OutputCodec,
    },
}

/// Image processing engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ImageEngine: Send + Sync {
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;
    async fn size(&self, buffer: &[u8]) -> Result<ImageSize>;
    async fn metadata(&self, buffer: &[u8]) -> Result<ImageMetadata>;
    async fn process(&self, buffer: &[u8], request: &ProcessRequest) -> Result<Vec<u8>>;
    /// Durable write: the file either appears complete or not at all
    async fn write(&self, path: &Path, buffer: &[u8]) -> Result<()>;
}

/// Kind of a probed stream, from ffprobe's `codec_type`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Data,
    Attachment,
    #[serde(other)]
    Other,
}

/// One stream of a probed media file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StreamDescriptor {
    #[serde(default)]
    pub index: u32,
    #[serde(rename = "codec_type", default = "other_kind")]
    pub kind: StreamKind,
    #[serde(default)]
    pub codec_name: Option<String>,
}

fn other_kind() -> StreamKind {
    StreamKind::Other
}

impl StreamDescriptor {
    pub fn new(index: u32, kind: StreamKind) -> Self {
        Self {
            index,
            kind,
            codec_name: None,
        }
    }
}

/// Whether any stream in a probe result carries audio
pub fn has_audio(streams: &[StreamDescriptor]) -> bool {
    streams.iter().any(|s| s.kind == StreamKind::Audio)
}

/// One stage of a filter chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    Scale { width: u32, height: u32 },
    Fps(u32),
    PaletteGen,
    /// Applies the palette supplied as the second input
    PaletteUse,
}

impl Filter {
    pub fn render(&self) -> String {
        match self {
            Self::Scale { width, height } => format!("scale={}:{}", width, height),
            Self::Fps(fps) => format!("fps={}", fps),
            Self::PaletteGen => "palettegen".to_string(),
            Self::PaletteUse => "paletteuse".to_string(),
        }
    }
}

/// A single media engine run: inputs → filter chain → output with options
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub inputs: Vec<PathBuf>,
    pub filters: Vec<Filter>,
    pub output: PathBuf,
    /// Ordered output options; `None` marks a bare flag such as `-an`
    pub options: Vec<(String, Option<String>)>,
    pub maps: Vec<String>,
    pub overwrite: bool,
}

impl Invocation {
    pub fn new(input: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            inputs: vec![input.into()],
            filters: Vec::new(),
            output: output.into(),
            options: Vec::new(),
            maps: Vec::new(),
            overwrite: false,
        }
    }

    pub fn input(mut self, input: impl Into<PathBuf>) -> Self {
        self.inputs.push(input.into());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn option(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.options.push((key.into(), Some(value.into())));
        self
    }

    pub fn flag(mut self, key: impl Into<String>) -> Self {
        self.options.push((key.into(), None));
        self
    }

    pub fn map(mut self, spec: impl Into<String>) -> Self {
        self.maps.push(spec.into());
        self
    }

    pub fn overwrite_output(mut self) -> Self {
        self.overwrite = true;
        self
    }

    /// Value of an output option, `Some(None)` for a bare flag
    pub fn get_option(&self, key: &str) -> Option<Option<&str>> {
        self.options
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_deref())
    }

    pub fn has_option(&self, key: &str) -> bool {
        self.get_option(key).is_some()
    }
}

/// Media transcoding engine
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MediaEngine: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Vec<StreamDescriptor>>;
    async fn run(&self, invocation: &Invocation) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_descriptors_deserialize_from_ffprobe_json() {
        let json = r#"{"streams":[
            {"index":0,"codec_type":"video","codec_name":"h264"},
            {"index":1,"codec_type":"audio","codec_name":"aac"},
            {"index":2,"codec_type":"timecode"}
        ]}"#;

        #[derive(Deserialize)]
        struct Probe {
            streams: Vec<StreamDescriptor>,
        }

        let probe: Probe = serde_json::from_str(json).unwrap();
        assert_eq!(probe.streams.len(), 3);
        assert_eq!(probe.streams[0].kind, StreamKind::Video);
        assert_eq!(probe.streams[2].kind, StreamKind::Other);
        assert!(has_audio(&probe.streams));
        assert!(!has_audio(&probe.streams[..1]));
    }

    #[test]
    fn invocation_options_keep_insertion_order() {
        let invocation = Invocation::new("in.mov", "out.mp4")
            .filter(Filter::Scale { width: 640, height: 360 })
            .option("c:v", "libx264")
            .flag("an");

        assert_eq!(invocation.get_option("c:v"), Some(Some("libx264")));
        assert_eq!(invocation.get_option("an"), Some(None));
        assert!(!invocation.has_option("c:a"));
        assert_eq!(invocation.filters[0].render(), "scale=640:360");
    }
}
