//! # Platform-specific utilities
//!
//! Questo modulo centralizza la gestione cross-platform dei nomi dei tool
//! esterni (ImageMagick, FFmpeg) e la verifica della loro disponibilità.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::OnceLock;

/// Platform-specific command manager
pub struct PlatformCommands {
    commands: HashMap<&'static str, &'static str>,
    which_command: &'static str,
}

impl PlatformCommands {
    /// Get the singleton instance
    pub fn instance() -> &'static Self {
        static INSTANCE: OnceLock<PlatformCommands> = OnceLock::new();
        INSTANCE.get_or_init(Self::new)
    }

    fn new() -> Self {
        let tools = ["magick", "convert", "identify", "ffmpeg", "ffprobe"];
        let commands = if cfg!(windows) {
            tools
                .iter()
                .map(|tool| (*tool, Self::windows_name(tool)))
                .collect()
        } else {
            tools.iter().map(|tool| (*tool, *tool)).collect()
        };
        let which_command = if cfg!(windows) { "where" } else { "which" };

        Self {
            commands,
            which_command,
        }
    }

    fn windows_name(tool: &str) -> &'static str {
        match tool {
            "magick" => "magick.exe",
            "convert" => "convert.exe",
            "identify" => "identify.exe",
            "ffmpeg" => "ffmpeg.exe",
            _ => "ffprobe.exe",
        }
    }

    /// Get the platform-specific command name
    pub fn get_command<'a>(&self, base_name: &'a str) -> &'a str {
        self.commands.get(base_name).copied().unwrap_or(base_name)
    }

    /// Resolved program path for a tool
    pub fn tool_path(&self, base_name: &str) -> PathBuf {
        PathBuf::from(self.get_command(base_name))
    }

    /// Check if a command is available on the system
    pub async fn is_command_available(&self, base_name: &str) -> bool {
        let command_name = self.get_command(base_name);

        let result = tokio::process::Command::new(self.which_command)
            .arg(command_name)
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .status()
            .await;

        matches!(result, Ok(status) if status.success())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_commands() {
        let platform = PlatformCommands::instance();

        let ffmpeg = platform.get_command("ffmpeg");
        assert!(ffmpeg.starts_with("ffmpeg"));

        // Unknown tools pass through unchanged
        assert_eq!(platform.get_command("cwebp"), "cwebp");
    }

    #[tokio::test]
    async fn test_missing_command_is_unavailable() {
        let platform = PlatformCommands::instance();
        assert!(!platform.is_command_available("definitely_not_a_tool_xyz").await);
    }
}
