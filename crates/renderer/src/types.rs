use std::path::PathBuf;

/// Default window size when none is requested.
pub const DEFAULT_WINDOW_SIZE: (u32, u32) = (800, 600);

/// How the preview window is placed on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WindowMode {
    /// Decorated window with the given inner size in physical pixels.
    Windowed { width: u32, height: u32 },
    /// Borderless fullscreen on the primary monitor at its current mode.
    Fullscreen,
}

impl Default for WindowMode {
    fn default() -> Self {
        let (width, height) = DEFAULT_WINDOW_SIZE;
        Self::Windowed { width, height }
    }
}

/// What happens when a live reload fails to load, compile, or link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReloadPolicy {
    /// Report the diagnostic and keep drawing with the previous program.
    #[default]
    KeepPrevious,
    /// Report the diagnostic and terminate.
    Fatal,
}

/// How held keys turn into commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyTrigger {
    /// Fire once per key press.
    #[default]
    Edge,
    /// Fire on every frame while the key is held.
    Level,
}

/// Immutable configuration passed to the renderer at start-up.
///
/// `CanvasConfig` mirrors the CLI flags: which fragment shader to compile,
/// how the window is created, and how reload and export keys behave.
#[derive(Debug, Clone)]
pub struct CanvasConfig {
    /// Fragment shader file; `None` selects the built-in UV gradient.
    pub shader_path: Option<PathBuf>,
    /// Window placement and size.
    pub window: WindowMode,
    /// Failure handling for live reloads.
    pub reload_policy: ReloadPolicy,
    /// Edge or level triggering for the reload and export keys.
    pub key_trigger: KeyTrigger,
    /// Directory receiving exported frames.
    pub export_dir: PathBuf,
    /// Window title.
    pub title: String,
}

impl Default for CanvasConfig {
    fn default() -> Self {
        Self {
            shader_path: None,
            window: WindowMode::default(),
            reload_policy: ReloadPolicy::default(),
            key_trigger: KeyTrigger::default(),
            export_dir: PathBuf::from("."),
            title: "Shader Canvas".to_string(),
        }
    }
}
