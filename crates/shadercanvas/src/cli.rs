use std::path::PathBuf;

use clap::{ArgAction, Parser};
use renderer::{CanvasConfig, KeyTrigger, ReloadPolicy, WindowMode, DEFAULT_WINDOW_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "shadercanvas",
    author,
    version,
    about = "Live fragment shader preview",
    long_about = "Renders a GLSL fragment shader over the whole window.\n\
                  Press R to recompile the shader from the same file, \
                  E to export the current frame as a PNG, and ESC to quit.",
    disable_help_flag = true
)]
pub struct Cli {
    /// Fragment shader to render; the built-in UV gradient is used when omitted.
    #[arg(value_name = "FILENAME")]
    pub shader: Option<PathBuf>,

    /// Window width in pixels.
    #[arg(
        short = 'w',
        long,
        value_name = "WIDTH",
        default_value_t = DEFAULT_WINDOW_SIZE.0,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub width: u32,

    /// Window height in pixels.
    #[arg(
        short = 'h',
        long,
        value_name = "HEIGHT",
        default_value_t = DEFAULT_WINDOW_SIZE.1,
        value_parser = clap::value_parser!(u32).range(1..)
    )]
    pub height: u32,

    /// Borderless fullscreen on the primary monitor; ignores --width and --height.
    #[arg(short = 'f', long)]
    pub fullscreen: bool,

    /// Exit when a reload fails instead of keeping the previous shader.
    #[arg(long)]
    pub strict_reload: bool,

    /// Repeat reload and export on every frame while the key is held.
    #[arg(long)]
    pub repeat_keys: bool,

    /// Directory receiving exported frames.
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub export_dir: PathBuf,

    /// Print help.
    #[arg(long, action = ArgAction::Help)]
    pub help: Option<bool>,
}

impl Cli {
    pub fn to_config(&self) -> CanvasConfig {
        let window = if self.fullscreen {
            WindowMode::Fullscreen
        } else {
            WindowMode::Windowed {
                width: self.width,
                height: self.height,
            }
        };
        let reload_policy = if self.strict_reload {
            ReloadPolicy::Fatal
        } else {
            ReloadPolicy::KeepPrevious
        };
        let key_trigger = if self.repeat_keys {
            KeyTrigger::Level
        } else {
            KeyTrigger::Edge
        };

        CanvasConfig {
            shader_path: self.shader.clone(),
            window,
            reload_policy,
            key_trigger,
            export_dir: self.export_dir.clone(),
            ..CanvasConfig::default()
        }
    }
}

pub fn parse() -> Cli {
    Cli::parse()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    fn parse_args(args: &[&str]) -> Result<Cli, clap::Error> {
        Cli::try_parse_from(std::iter::once("shadercanvas").chain(args.iter().copied()))
    }

    #[test]
    fn defaults_match_canvas_config() {
        let cli = parse_args(&[]).unwrap();
        let config = cli.to_config();
        assert_eq!(config.shader_path, None);
        assert_eq!(
            config.window,
            WindowMode::Windowed {
                width: 800,
                height: 600
            }
        );
        assert_eq!(config.reload_policy, ReloadPolicy::KeepPrevious);
        assert_eq!(config.key_trigger, KeyTrigger::Edge);
        assert_eq!(config.export_dir, PathBuf::from("."));
    }

    #[test]
    fn width_and_height_set_window_size() {
        let cli = parse_args(&["shader.frag", "-w", "1024", "-h", "768"]).unwrap();
        let config = cli.to_config();
        assert_eq!(config.shader_path, Some(PathBuf::from("shader.frag")));
        assert_eq!(
            config.window,
            WindowMode::Windowed {
                width: 1024,
                height: 768
            }
        );
    }

    #[test]
    fn fullscreen_ignores_requested_size() {
        let cli = parse_args(&["-w", "1024", "-f", "-h", "768"]).unwrap();
        assert_eq!(cli.to_config().window, WindowMode::Fullscreen);
    }

    #[test]
    fn options_may_precede_the_filename() {
        let cli = parse_args(&["-f", "demo.glsl"]).unwrap();
        assert_eq!(cli.shader, Some(PathBuf::from("demo.glsl")));
        assert!(cli.fullscreen);
    }

    #[test]
    fn second_filename_is_a_usage_error() {
        let err = parse_args(&["a.frag", "b.frag"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn zero_or_non_numeric_sizes_are_rejected() {
        assert_eq!(
            parse_args(&["-w", "0"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
        assert_eq!(
            parse_args(&["-h", "tall"]).unwrap_err().kind(),
            ErrorKind::ValueValidation
        );
    }

    #[test]
    fn long_help_is_reported_as_display_help() {
        let err = parse_args(&["--help"]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DisplayHelp);
    }

    #[test]
    fn reload_and_key_flags_map_to_policies() {
        let cli = parse_args(&["--strict-reload", "--repeat-keys", "--export-dir", "out"]).unwrap();
        let config = cli.to_config();
        assert_eq!(config.reload_policy, ReloadPolicy::Fatal);
        assert_eq!(config.key_trigger, KeyTrigger::Level);
        assert_eq!(config.export_dir, PathBuf::from("out"));
    }
}
