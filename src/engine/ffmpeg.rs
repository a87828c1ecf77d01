//! # FFmpeg Engine
//!
//! Implementazione di `MediaEngine` basata su `ffmpeg` e `ffprobe`.
//!
//! ## Responsabilità:
//! - Probe degli stream con `ffprobe -show_streams` (output JSON)
//! - Traduzione di una `Invocation` nella command line di `ffmpeg`
//! - Esecuzione con kill-on-drop: se il task viene abortito il processo muore
//!
//! ## Filter chain:
//! - Una sola sorgente: `-vf scale=W:H,fps=10,palettegen`
//! - Con `paletteuse`: `-filter_complex "[0:v]fps=10[x];[x][1:v]paletteuse"`,
//!   la palette è il secondo input

use super::{command::ToolCommand, Filter, Invocation, MediaEngine, StreamDescriptor};
use crate::error::{ConvertError, Result};
use crate::platform::PlatformCommands;
use async_trait::async_trait;
use serde::Deserialize;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<StreamDescriptor>,
}

/// FFmpeg-backed media engine
#[derive(Debug, Clone)]
pub struct FfmpegEngine {
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl FfmpegEngine {
    /// Check both tools are installed
    pub async fn detect() -> Result<Self> {
        let platform = PlatformCommands::instance();

        for tool in ["ffmpeg", "ffprobe"] {
            if !platform.is_command_available(tool).await {
                return Err(ConvertError::MissingDependency(format!(
                    "{} is required for video processing",
                    tool
                )));
            }
        }

        Ok(Self {
            ffmpeg: platform.tool_path("ffmpeg"),
            ffprobe: platform.tool_path("ffprobe"),
        })
    }

    /// Render the ffmpeg argument list for an invocation; paths pass through unmodified
    pub fn build_args(invocation: &Invocation) -> Vec<OsString> {
        let mut args: Vec<OsString> =
            vec!["-hide_banner".into(), "-loglevel".into(), "error".into()];
        if invocation.overwrite {
            args.push("-y".into());
        }

        for input in &invocation.inputs {
            args.push("-i".into());
            args.push(input.as_os_str().to_owned());
        }

        if !invocation.filters.is_empty() {
            let chain: Vec<String> = invocation
                .filters
                .iter()
                .filter(|f| **f != Filter::PaletteUse)
                .map(Filter::render)
                .collect();

            if invocation.filters.contains(&Filter::PaletteUse) {
                let graph = if chain.is_empty() {
                    "[0:v][1:v]paletteuse".to_string()
                } else {
                    format!("[0:v]{}[x];[x][1:v]paletteuse", chain.join(","))
                };
                args.push("-filter_complex".into());
                args.push(graph.into());
            } else {
                args.push("-vf".into());
                args.push(chain.join(",").into());
            }
        }

        for map in &invocation.maps {
            args.push("-map".into());
            args.push(map.into());
        }

        for (key, value) in &invocation.options {
            args.push(format!("-{}", key).into());
            if let Some(value) = value {
                args.push(value.into());
            }
        }

        args.push(invocation.output.as_os_str().to_owned());
        args
    }
}

#[async_trait]
impl MediaEngine for FfmpegEngine {
    async fn probe(&self, path: &Path) -> Result<Vec<StreamDescriptor>> {
        let mut cmd = ToolCommand::new(self.ffprobe.clone());
        cmd.args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path);
        let output = cmd.execute().await?;

        let probe: ProbeOutput = serde_json::from_slice(&output.stdout)
            .map_err(|e| ConvertError::engine("ffprobe", format!("invalid JSON: {e}")))?;
        Ok(probe.streams)
    }

    async fn run(&self, invocation: &Invocation) -> Result<()> {
        let args = Self::build_args(invocation);
        debug!("compiled command: ffmpeg {:?}", args);

        let start_time = std::time::Instant::now();
        let mut cmd = ToolCommand::new(self.ffmpeg.clone());
        cmd.args(args);
        let output = cmd.execute().await?;
        if !output.stderr.is_empty() {
            debug!("ffmpeg stderr: {}", output.stderr);
        }

        debug!(
            "ffmpeg finished {} in {:.1}s",
            invocation.output.display(),
            start_time.elapsed().as_secs_f64()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(invocation: &Invocation) -> Vec<String> {
        FfmpegEngine::build_args(invocation)
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn simple_chain_uses_vf_and_options_in_order() {
        let invocation = Invocation::new("/in/a.mov", "/out/vid_0.mp4")
            .filter(Filter::Scale { width: 1080, height: 1920 })
            .map("0:v")
            .map("0:a?")
            .option("c:v", "libx264")
            .option("b:v", "2500k")
            .flag("an")
            .overwrite_output();

        let args = rendered(&invocation).join(" ");
        assert_eq!(
            args,
            "-hide_banner -loglevel error -y -i /in/a.mov -vf scale=1080:1920 -map 0:v -map 0:a? -c:v libx264 -b:v 2500k -an /out/vid_0.mp4"
        );
    }

    #[test]
    fn palettegen_stays_a_simple_chain() {
        let invocation = Invocation::new("scaled.mp4", "palette.png")
            .filter(Filter::Fps(10))
            .filter(Filter::PaletteGen);

        let args = rendered(&invocation);
        let vf = args.iter().position(|a| a == "-vf").unwrap();
        assert_eq!(args[vf + 1], "fps=10,palettegen");
        assert!(!args.contains(&"-y".to_string()));
    }

    #[test]
    fn paletteuse_builds_a_two_input_graph() {
        let invocation = Invocation::new("scaled.mp4", "out.gif")
            .input("palette.png")
            .filter(Filter::Fps(10))
            .filter(Filter::PaletteUse)
            .option("loop", "0");

        let args = rendered(&invocation);
        assert_eq!(args.iter().filter(|a| *a == "-i").count(), 2);
        let graph = args.iter().position(|a| a == "-filter_complex").unwrap();
        assert_eq!(args[graph + 1], "[0:v]fps=10[x];[x][1:v]paletteuse");
        assert_eq!(args.last().map(String::as_str), Some("out.gif"));
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_paths_reach_ffmpeg_untouched() {
        use std::os::unix::ffi::OsStrExt;

        let input = Path::new(std::ffi::OsStr::from_bytes(b"/in/clip_\xff.mov"));
        let invocation = Invocation::new(input, "/out/vid_0.mp4");

        let args = FfmpegEngine::build_args(&invocation);
        let position = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[position + 1].as_bytes(), b"/in/clip_\xff.mov");
    }
}
