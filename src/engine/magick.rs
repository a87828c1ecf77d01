//! # ImageMagick Engine
//!
//! Implementazione di `ImageEngine` basata su ImageMagick.
//!
//! ## Tool Strategy
//! **Priorità Tool (decrescente):**
//! 1. **magick** (ImageMagick 7.x) - `magick` e `magick identify`
//! 2. **convert** + **identify** (ImageMagick 6.x/legacy)
//! 3. **Error**: `MissingDependency` se nessuno dei due è disponibile
//!
//! I buffer passano via stdin/stdout (`-` e `webp:-`), così nessun file
//! intermedio finisce su disco. Le dimensioni vengono lette dall'header con il
//! crate `image` quando il formato è supportato, con fallback su `identify`
//! (sempre per TIFF/DNG, dove il primo IFD è spesso solo l'anteprima).

use super::{
    command::ToolCommand, Gravity, ImageEngine, ImageMetadata, ImageSize, OutputCodec,
    ProcessRequest,
};
use crate::error::{ConvertError, Result};
use crate::platform::PlatformCommands;
use async_trait::async_trait;
use image::ImageFormat;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// Which ImageMagick generation is installed
#[derive(Debug, Clone)]
enum MagickTools {
    /// ImageMagick 7: one `magick` binary with subcommands
    Unified(PathBuf),
    /// ImageMagick 6: separate `convert` and `identify`
    Legacy { convert: PathBuf, identify: PathBuf },
}

/// ImageMagick-backed image engine
#[derive(Debug, Clone)]
pub struct MagickEngine {
    tools: MagickTools,
}

impl MagickEngine {
    /// Detect the installed ImageMagick flavour
    pub async fn detect() -> Result<Self> {
        let platform = PlatformCommands::instance();

        if platform.is_command_available("magick").await {
            debug!("Using ImageMagick 7 (magick)");
            return Ok(Self {
                tools: MagickTools::Unified(platform.tool_path("magick")),
            });
        }

        if platform.is_command_available("convert").await
            && platform.is_command_available("identify").await
        {
            debug!("Using ImageMagick 6 (convert/identify)");
            return Ok(Self {
                tools: MagickTools::Legacy {
                    convert: platform.tool_path("convert"),
                    identify: platform.tool_path("identify"),
                },
            });
        }

        Err(ConvertError::MissingDependency(
            "ImageMagick (magick, or convert + identify) is required for image processing".into(),
        ))
    }

    fn convert_command(&self) -> ToolCommand {
        match &self.tools {
            MagickTools::Unified(magick) => ToolCommand::new(magick.clone()),
            MagickTools::Legacy { convert, .. } => ToolCommand::new(convert.clone()),
        }
    }

    fn identify_command(&self) -> ToolCommand {
        match &self.tools {
            MagickTools::Unified(magick) => {
                let mut cmd = ToolCommand::new(magick.clone());
                cmd.arg("identify");
                cmd
            }
            MagickTools::Legacy { identify, .. } => ToolCommand::new(identify.clone()),
        }
    }

    async fn identify(&self, buffer: &[u8], format: &str) -> Result<String> {
        let mut cmd = self.identify_command();
        cmd.args(["-format", format, "-"]).stdin(buffer);
        Ok(cmd.execute().await?.stdout_lossy())
    }

    /// Argument list for one processing request; input on stdin, output on stdout
    fn process_args(request: &ProcessRequest) -> Vec<String> {
        let mut args = vec!["-".to_string(), "-auto-orient".to_string()];

        let (quality, codec) = match request {
            ProcessRequest::Crop {
                rect,
                gravity,
                quality,
                codec,
            } => {
                args.push("-crop".into());
                args.push(format!(
                    "{}x{}+{}+{}",
                    rect.crop_width, rect.crop_height, rect.left, rect.top
                ));
                args.push("+repage".into());
                // Pin the canvas to the planned size around the requested anchor
                args.push("-gravity".into());
                args.push(gravity_name(*gravity).into());
                args.push("-extent".into());
                args.push(format!("{}x{}", rect.crop_width, rect.crop_height));
                (*quality, *codec)
            }
            ProcessRequest::Resize {
                width,
                height,
                quality,
                codec,
            } => {
                args.push("-resize".into());
                args.push(format!("{}x{}!", width, height));
                (*quality, *codec)
            }
        };

        args.push("-quality".into());
        args.push(quality.to_string());
        args.push(format!("{}:-", codec.extension()));
        args
    }
}

fn gravity_name(gravity: Gravity) -> &'static str {
    match gravity {
        Gravity::Center => "center",
    }
}

/// Dimensions straight from the header, when the header describes the decoded pixels.
///
/// TIFF containers (DNG included) are left to `identify`: their first IFD is
/// often a preview, not the image ImageMagick actually decodes.
fn header_dimensions(buffer: &[u8]) -> Option<ImageSize> {
    let reader = image::io::Reader::new(Cursor::new(buffer))
        .with_guessed_format()
        .ok()?;
    if matches!(reader.format(), None | Some(ImageFormat::Tiff)) {
        return None;
    }
    let (width, height) = reader.into_dimensions().ok()?;
    Some(ImageSize::new(width, height))
}

/// Parse `identify -format "%w %h"` output; multi-frame inputs repeat the pattern
fn parse_dimensions(output: &str) -> Option<ImageSize> {
    let mut parts = output.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    Some(ImageSize::new(width, height))
}

/// Parse `%[EXIF:Orientation]`; anything outside 1..=8 counts as absent
fn parse_orientation(output: &str) -> Option<u8> {
    output
        .split_whitespace()
        .next()
        .and_then(|v| v.parse::<u8>().ok())
        .filter(|v| (1..=8).contains(v))
}

#[async_trait]
impl ImageEngine for MagickEngine {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        tokio::fs::read(path).await.map_err(|e| ConvertError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn size(&self, buffer: &[u8]) -> Result<ImageSize> {
        if let Some(size) = header_dimensions(buffer) {
            return Ok(size);
        }

        let output = self.identify(buffer, "%w %h ").await?;
        parse_dimensions(&output).ok_or_else(|| {
            ConvertError::engine("identify", format!("unexpected size output: {output:?}"))
        })
    }

    async fn metadata(&self, buffer: &[u8]) -> Result<ImageMetadata> {
        let output = self.identify(buffer, "%[EXIF:Orientation] ").await?;
        Ok(ImageMetadata {
            orientation: parse_orientation(&output),
        })
    }

    async fn process(&self, buffer: &[u8], request: &ProcessRequest) -> Result<Vec<u8>> {
        let mut cmd = self.convert_command();
        cmd.args(Self::process_args(request)).stdin(buffer);
        let output = cmd.execute().await?;

        if output.stdout.is_empty() {
            return Err(ConvertError::engine(
                "magick",
                format!("empty output for {request:?}"),
            ));
        }
        Ok(output.stdout)
    }

    async fn write(&self, path: &Path, buffer: &[u8]) -> Result<()> {
        let dir = path.parent().ok_or_else(|| {
            ConvertError::Validation(format!("No parent directory: {}", path.display()))
        })?;

        // Temp file in the destination directory, renamed into place once
        // complete. Dropping the future before the rename removes it.
        let (file, temp_path) = tempfile::Builder::new()
            .prefix(".partial_")
            .tempfile_in(dir)?
            .into_parts();
        let mut file = tokio::fs::File::from_std(file);
        file.write_all(buffer).await?;
        file.sync_all().await?;
        drop(file);

        temp_path.persist(path).map_err(|e| ConvertError::Io(e.error))?;
        Ok(())
    }
}
