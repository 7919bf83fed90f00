//! Renderer crate for ShaderCanvas, a live fragment-shader preview.
//!
//! The crate opens a window, draws one fragment shader over a full-screen
//! quad, and lets the user rebuild the shader from disk or export the current
//! frame as a PNG. The overall flow is:
//!
//! ```text
//!   CLI / shadercanvas
//!          │ CanvasConfig
//!          ▼
//!   Renderer::run ──▶ CanvasState ──▶ winit event loop ──▶ redraw
//!                                           │
//!              R ──▶ ReloadController ◀─────┤
//!              E ──▶ FrameExporter ◀────────┘
//! ```
//!
//! Shader text goes through [`compile::prepare_stage`] (naga parse and
//! validation) before wgpu creates modules and the pipeline, so GLSL errors
//! come back as readable [`Diagnostic`]s instead of device errors. The
//! [`ReloadController`] works against the [`ProgramBuilder`] trait, which keeps
//! the load → compile → link → swap cycle testable without a GPU.

mod gpu;
mod window;

pub mod compile;
pub mod export;
pub mod input;
pub mod reload;
pub mod runtime;
pub mod source;
pub mod types;

use anyhow::Result;

pub use compile::{Diagnostic, DiagnosticKind, StageKind};
pub use export::{FrameExporter, FRAME_PREFIX};
pub use reload::{ProgramBuilder, ReloadController, ReloadError, ReloadOutcome, ReloadState};
pub use source::{LoadError, ShaderSourceLoader};
pub use types::{CanvasConfig, KeyTrigger, ReloadPolicy, WindowMode, DEFAULT_WINDOW_SIZE};

/// High-level entry point that owns the chosen configuration.
pub struct Renderer {
    config: CanvasConfig,
}

impl Renderer {
    pub fn new(config: CanvasConfig) -> Self {
        Self { config }
    }

    /// Opens the canvas window and blocks until the user quits.
    ///
    /// Returns an error if the window or GPU cannot be initialised, if the
    /// startup shader fails to build, or if a reload fails under
    /// [`ReloadPolicy::Fatal`].
    pub fn run(&self) -> Result<()> {
        tracing::info!(
            shader = ?self.config.shader_path,
            window = ?self.config.window,
            reload_policy = ?self.config.reload_policy,
            key_trigger = ?self.config.key_trigger,
            "starting shader canvas"
        );
        window::run_canvas(&self.config)
    }
}
