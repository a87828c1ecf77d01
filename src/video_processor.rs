//! # Video Processing Module
//!
//! Questo modulo implementa la policy di trasformazione dei video: sceglie
//! codec, bitrate e flag del container e costruisce le `Invocation` che il
//! `MediaEngine` esegue.
//!
//! ## Responsabilità:
//! - Tabella di decisione `VideoFormat → CodecProfile` (record `'static` immutabili)
//! - Probe dell'audio prima di costruire le opzioni (fail-soft: se il probe
//!   fallisce si assume che l'audio ci sia)
//! - Transcodifica diretta con `scale=<w>:<h>` e `b:v=<video_size_kb>k`
//! - Pipeline GIF in 3 stadi (scale → palettegen → paletteuse)
//! - Verifica post-encode della traccia audio (solo warning)
//!
//! ## Tabella codec:
//! | formato | video        | audio      | flag                                   |
//! |---------|--------------|------------|----------------------------------------|
//! | mp4     | libx264      | aac        | preset=medium, crf=23                  |
//! | webm    | libvpx-vp9   | libopus    | crf=30, b:a=128k                       |
//! | avi     | libxvid      | libmp3lame | q:v=5, q:a=3                           |
//! | mov     | libx264      | aac        | preset=medium, crf=23, +faststart      |
//! | mkv     | libx264      | libopus    | preset=medium, crf=23, b:a=192k        |
//! | flv     | flv          | libmp3lame | ar=44100                               |
//! | wmv     | wmv2         | wmav2      | b:a=128k                               |
//! | m4v     | libx264      | aac        | preset=medium, crf=23, +faststart      |
//! | 3gp     | libx264      | aac        | preset=veryfast, crf=28, strict=-2     |
//!
//! ## Stati:
//! `Probing → PlanBuilt → Encoding → (Verifying) → Done`; solo il probe
//! fallisce in modo "soft".
//!
//! ## Output:
//! `<output_dir>/vid_<indice>.<formato>`. L'encode scrive su un file
//! temporaneo nella directory di destinazione che viene rinominato solo a
//! successo: un encode abortito non lascia mai output parziali.

use crate::converter::IndexSequence;
use crate::engine::{has_audio, Filter, ImageSize, Invocation, MediaEngine};
use crate::error::{ConvertError, Result};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use tempfile::TempPath;
use tracing::{debug, info, warn};

/// Frame rate of GIF output
pub const GIF_FPS: u32 = 10;

/// Target container
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoFormat {
    Mp4,
    Webm,
    Avi,
    Mov,
    Mkv,
    Flv,
    Wmv,
    M4v,
    ThreeGp,
    Gif,
}

impl VideoFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Mp4 => "mp4",
            Self::Webm => "webm",
            Self::Avi => "avi",
            Self::Mov => "mov",
            Self::Mkv => "mkv",
            Self::Flv => "flv",
            Self::Wmv => "wmv",
            Self::M4v => "m4v",
            Self::ThreeGp => "3gp",
            Self::Gif => "gif",
        }
    }

    /// Codec record for direct transcodes; GIF goes through the palette pipeline instead
    pub fn profile(&self) -> Option<&'static CodecProfile> {
        match self {
            Self::Mp4 => Some(&MP4),
            Self::Webm => Some(&WEBM),
            Self::Avi => Some(&AVI),
            Self::Mov => Some(&MOV),
            Self::Mkv => Some(&MKV),
            Self::Flv => Some(&FLV),
            Self::Wmv => Some(&WMV),
            Self::M4v => Some(&M4V),
            Self::ThreeGp => Some(&THREE_GP),
            Self::Gif => None,
        }
    }
}

impl FromStr for VideoFormat {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "mp4" => Ok(Self::Mp4),
            "webm" => Ok(Self::Webm),
            "avi" => Ok(Self::Avi),
            "mov" => Ok(Self::Mov),
            "mkv" => Ok(Self::Mkv),
            "flv" => Ok(Self::Flv),
            "wmv" => Ok(Self::Wmv),
            "m4v" => Ok(Self::M4v),
            "3gp" => Ok(Self::ThreeGp),
            "gif" => Ok(Self::Gif),
            _ => Err(ConvertError::UnsupportedFormat(s.to_string())),
        }
    }
}

impl fmt::Display for VideoFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

type Flags = &'static [(&'static str, &'static str)];

/// Codec choice and extra flags for one container
#[derive(Debug, PartialEq, Eq)]
pub struct CodecProfile {
    pub video_codec: &'static str,
    pub audio_codec: &'static str,
    pub video_flags: Flags,
    /// Only emitted when the source has audio
    pub audio_flags: Flags,
    pub container_flags: Flags,
}

const H264_MEDIUM: Flags = &[("preset", "medium"), ("crf", "23")];

static MP4: CodecProfile = CodecProfile {
    video_codec: "libx264",
    audio_codec: "aac",
    video_flags: H264_MEDIUM,
    audio_flags: &[],
    container_flags: &[],
};

static WEBM: CodecProfile = CodecProfile {
    video_codec: "libvpx-vp9",
    audio_codec: "libopus",
    video_flags: &[("crf", "30")],
    audio_flags: &[("b:a", "128k")],
    container_flags: &[],
};

static AVI: CodecProfile = CodecProfile {
    video_codec: "libxvid",
    audio_codec: "libmp3lame",
    video_flags: &[("q:v", "5")],
    audio_flags: &[("q:a", "3")],
    container_flags: &[],
};

static MOV: CodecProfile = CodecProfile {
    video_codec: "libx264",
    audio_codec: "aac",
    video_flags: H264_MEDIUM,
    audio_flags: &[],
    container_flags: &[("movflags", "+faststart")],
};

static MKV: CodecProfile = CodecProfile {
    video_codec: "libx264",
    audio_codec: "libopus",
    video_flags: H264_MEDIUM,
    audio_flags: &[("b:a", "192k")],
    container_flags: &[],
};

static FLV: CodecProfile = CodecProfile {
    video_codec: "flv",
    audio_codec: "libmp3lame",
    video_flags: &[],
    audio_flags: &[("ar", "44100")],
    container_flags: &[],
};

static WMV: CodecProfile = CodecProfile {
    video_codec: "wmv2",
    audio_codec: "wmav2",
    video_flags: &[],
    audio_flags: &[("b:a", "128k")],
    container_flags: &[],
};

static M4V: CodecProfile = CodecProfile {
    video_codec: "libx264",
    audio_codec: "aac",
    video_flags: H264_MEDIUM,
    audio_flags: &[],
    container_flags: &[("movflags", "+faststart")],
};

static THREE_GP: CodecProfile = CodecProfile {
    video_codec: "libx264",
    audio_codec: "aac",
    video_flags: &[("preset", "veryfast"), ("crf", "28")],
    audio_flags: &[],
    container_flags: &[("strict", "-2")],
};

/// Audio handling for one encode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioPlan {
    Encode { codec: &'static str, flags: Flags },
    Drop,
}

/// Everything needed to encode one file, built once from the decision table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeOptions {
    pub video_codec: &'static str,
    pub video_flags: Flags,
    pub audio: AudioPlan,
    pub bitrate: String,
    pub container_flags: Flags,
}

impl EncodeOptions {
    pub fn new(profile: &'static CodecProfile, audio_present: bool, video_size_kb: u64) -> Self {
        let audio = if audio_present {
            AudioPlan::Encode {
                codec: profile.audio_codec,
                flags: profile.audio_flags,
            }
        } else {
            AudioPlan::Drop
        };

        Self {
            video_codec: profile.video_codec,
            video_flags: profile.video_flags,
            audio,
            bitrate: format!("{}k", video_size_kb),
            container_flags: profile.container_flags,
        }
    }

    pub fn has_audio(&self) -> bool {
        matches!(self.audio, AudioPlan::Encode { .. })
    }
}

/// Direct transcode invocation: scale, codecs, bitrate, container flags
pub fn build_invocation(
    input: &Path,
    output: &Path,
    target: ImageSize,
    options: &EncodeOptions,
) -> Invocation {
    let mut invocation = Invocation::new(input, output).filter(Filter::Scale {
        width: target.width,
        height: target.height,
    });

    if options.has_audio() {
        invocation = invocation.map("0:v").map("0:a?");
    }

    invocation = invocation.option("c:v", options.video_codec);
    for (key, value) in options.video_flags {
        invocation = invocation.option(*key, *value);
    }
    invocation = invocation.option("b:v", options.bitrate.as_str());

    match &options.audio {
        AudioPlan::Encode { codec, flags } => {
            invocation = invocation.option("c:a", *codec);
            for (key, value) in *flags {
                invocation = invocation.option(*key, *value);
            }
        }
        AudioPlan::Drop => invocation = invocation.flag("an"),
    }

    for (key, value) in options.container_flags {
        invocation = invocation.option(*key, *value);
    }

    invocation.overwrite_output()
}

/// `<dir>/vid_<index>.<ext>`
pub fn video_output_path(output_dir: &Path, index: u64, format: VideoFormat) -> PathBuf {
    output_dir.join(format!("vid_{}.{}", index, format.extension()))
}

/// Progress of one video task, for logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoStage {
    Probing,
    PlanBuilt,
    Encoding,
    Verifying,
    Done,
}

impl fmt::Display for VideoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Probing => "probing",
            Self::PlanBuilt => "plan built",
            Self::Encoding => "encoding",
            Self::Verifying => "verifying",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// Applies the codec decision table through a `MediaEngine`
pub struct VideoProcessor {
    engine: Arc<dyn MediaEngine>,
    target: ImageSize,
    video_size_kb: u64,
    video_format: String,
}

impl VideoProcessor {
    pub fn new(
        engine: Arc<dyn MediaEngine>,
        target: ImageSize,
        video_size_kb: u64,
        video_format: impl Into<String>,
    ) -> Self {
        Self {
            engine,
            target,
            video_size_kb,
            video_format: video_format.into(),
        }
    }

    /// Convert one video into `output_dir`, returning the written path
    pub async fn process(
        &self,
        input_path: &Path,
        output_dir: &Path,
        index: &IndexSequence,
    ) -> Result<PathBuf> {
        let format: VideoFormat = self.video_format.parse()?;

        if !tokio::fs::try_exists(input_path).await.unwrap_or(false) {
            return Err(ConvertError::Validation(format!(
                "input file does not exist: {}",
                input_path.display()
            )));
        }
        tokio::fs::create_dir_all(output_dir).await?;

        let output_file = video_output_path(output_dir, index.next(), format);

        match format.profile() {
            Some(profile) => {
                self.transcode(input_path, &output_file, format, profile)
                    .await?
            }
            None => self.render_gif(input_path, &output_file).await?,
        }

        info!(
            "Successfully processed video: {} -> {}",
            input_path.display(),
            output_file.display()
        );
        Ok(output_file)
    }

    async fn transcode(
        &self,
        input_path: &Path,
        output_file: &Path,
        format: VideoFormat,
        profile: &'static CodecProfile,
    ) -> Result<()> {
        debug!("{}: {}", input_path.display(), VideoStage::Probing);
        let audio_present = match self.engine.probe(input_path).await {
            Ok(streams) => has_audio(&streams),
            Err(e) => {
                warn!(
                    "Stream probe failed for {}, assuming audio is present: {}",
                    input_path.display(),
                    e
                );
                true
            }
        };

        let options = EncodeOptions::new(profile, audio_present, self.video_size_kb);
        debug!(
            "{}: {} ({} / {:?}, b:v {})",
            input_path.display(),
            VideoStage::PlanBuilt,
            options.video_codec,
            options.audio,
            options.bitrate
        );

        debug!("{}: {}", input_path.display(), VideoStage::Encoding);
        let partial = partial_output(output_file, format)?;
        let invocation = build_invocation(input_path, &partial, self.target, &options);
        self.engine.run(&invocation).await?;
        persist(partial, output_file)?;

        if options.has_audio() {
            debug!("{}: {}", input_path.display(), VideoStage::Verifying);
            match self.engine.probe(output_file).await {
                Ok(streams) if has_audio(&streams) => {}
                Ok(_) => warn!("No audio stream in output {}", output_file.display()),
                Err(e) => warn!("Could not verify audio in {}: {}", output_file.display(), e),
            }
        }

        debug!("{}: {}", input_path.display(), VideoStage::Done);
        Ok(())
    }

    /// Scale → palette → paletteuse, with every intermediate inside a task-scoped directory
    async fn render_gif(&self, input_path: &Path, output_file: &Path) -> Result<()> {
        warn!(
            "GIF output carries no audio, dropping any audio from {}",
            input_path.display()
        );

        let work_dir = tempfile::Builder::new().prefix("gif_").tempdir()?;
        let scaled = work_dir.path().join("scaled.mp4");
        let palette = work_dir.path().join("palette.png");

        debug!("{}: gif stage 1/3 (scale)", input_path.display());
        let scale = Invocation::new(input_path, &scaled)
            .filter(Filter::Scale {
                width: self.target.width,
                height: self.target.height,
            })
            .flag("an")
            .overwrite_output();
        self.engine.run(&scale).await?;

        debug!("{}: gif stage 2/3 (palette)", input_path.display());
        let palettegen = Invocation::new(&scaled, &palette)
            .filter(Filter::Fps(GIF_FPS))
            .filter(Filter::PaletteGen)
            .overwrite_output();
        self.engine.run(&palettegen).await?;

        debug!("{}: gif stage 3/3 (render)", input_path.display());
        let partial = partial_output(output_file, VideoFormat::Gif)?;
        let render = Invocation::new(&scaled, partial.to_path_buf())
            .input(&palette)
            .filter(Filter::Fps(GIF_FPS))
            .filter(Filter::PaletteUse)
            .option("loop", "0")
            .overwrite_output();
        self.engine.run(&render).await?;
        persist(partial, output_file)?;

        work_dir.close()?;
        Ok(())
    }
}

/// Temporary sibling of `output_file`, removed on drop unless persisted
fn partial_output(output_file: &Path, format: VideoFormat) -> Result<TempPath> {
    let dir = output_file.parent().ok_or_else(|| {
        ConvertError::Validation(format!("No parent directory: {}", output_file.display()))
    })?;
    let temp = tempfile::Builder::new()
        .prefix(".partial_")
        .suffix(&format!(".{}", format.extension()))
        .tempfile_in(dir)?;
    Ok(temp.into_temp_path())
}

fn persist(partial: TempPath, output_file: &Path) -> Result<()> {
    partial
        .persist(output_file)
        .map_err(|e| ConvertError::Io(e.error))
}
