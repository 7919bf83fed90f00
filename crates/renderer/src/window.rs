use anyhow::{anyhow, Context, Result};
use winit::dpi::PhysicalSize;
use winit::event::{Event, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::window::{Fullscreen, Window, WindowBuilder};

use crate::export::FrameExporter;
use crate::gpu::{GpuState, Program, RenderError};
use crate::input::{FrameCommands, InputState};
use crate::reload::{ReloadController, ReloadError, ReloadOutcome};
use crate::runtime::{FrameClock, TimeSample};
use crate::source::ShaderSourceLoader;
use crate::types::{CanvasConfig, KeyTrigger, WindowMode};

const INSTRUCTIONS: [&str; 3] = [
    "Press R to recompile the fragment shader from the same file.",
    "Press E to export the currently rendered frame.",
    "Press ESC to quit the application.",
];

/// Everything the event loop touches between redraws.
///
/// Field order is drop order: the program and GPU state go before the window
/// their surface was created from.
struct CanvasState {
    program: Program,
    gpu: GpuState,
    window: Window,
    controller: ReloadController,
    exporter: FrameExporter,
    input: InputState,
    clock: FrameClock,
    key_trigger: KeyTrigger,
}

impl CanvasState {
    fn new(window: Window, config: &CanvasConfig) -> Result<Self> {
        let gpu = GpuState::new(&window, window.inner_size())
            .context("failed to initialise GPU state")?;

        let loader = ShaderSourceLoader::new(config.shader_path.clone());
        let mut controller = ReloadController::new(loader, config.reload_policy);
        let program = controller
            .initial(&gpu.program_builder())
            .context("failed to build the initial shader program")?;

        let size = gpu.size();
        let mut exporter = FrameExporter::new(&config.export_dir, size.width, size.height);
        if !gpu.supports_capture() {
            exporter.disable("surface does not allow reading frames back");
        }

        Ok(Self {
            program,
            gpu,
            window,
            controller,
            exporter,
            input: InputState::default(),
            clock: FrameClock::new(),
            key_trigger: config.key_trigger,
        })
    }

    fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if self.gpu.resize(new_size) {
            self.exporter.resize(new_size.width, new_size.height);
        }
    }

    fn reload(&mut self) -> Result<(), ReloadError> {
        let builder = self.gpu.program_builder();
        match self.controller.reload(&builder, &mut self.program)? {
            ReloadOutcome::Swapped => {}
            ReloadOutcome::Retained(err) => {
                tracing::debug!(error = %err, "reload kept the previous program");
            }
        }
        Ok(())
    }

    /// Draws one frame, capturing and writing it when `commands.export` is set.
    fn draw(&mut self, commands: FrameCommands, time: TimeSample) -> Result<(), RenderError> {
        let export = commands.export && self.exporter.is_available();
        if commands.export && !export {
            tracing::debug!("export requested but export is disabled");
        }

        let capture = if export {
            self.exporter.frame_mut()
        } else {
            None
        };
        self.gpu.render(&self.program, time, capture)?;

        if export {
            match self.exporter.write(time.frame_index) {
                Ok(path) => tracing::info!(path = %path.display(), "exported frame"),
                Err(err) => tracing::warn!(error = %format!("{err:#}"), "failed to export frame"),
            }
        }
        Ok(())
    }
}

/// Opens the canvas window and runs until quit or a fatal error.
pub(crate) fn run_canvas(config: &CanvasConfig) -> Result<()> {
    let event_loop = EventLoop::new().context("failed to initialize event loop")?;

    let builder = WindowBuilder::new().with_title(config.title.as_str());
    let builder = match config.window {
        WindowMode::Windowed { width, height } => {
            builder.with_inner_size(PhysicalSize::new(width, height))
        }
        WindowMode::Fullscreen => {
            let monitor = event_loop.primary_monitor();
            if monitor.is_none() {
                tracing::warn!("no primary monitor reported; letting the platform choose");
            }
            builder.with_fullscreen(Some(Fullscreen::Borderless(monitor)))
        }
    };
    let window = builder
        .build(&event_loop)
        .context("failed to create canvas window")?;

    let mut state = CanvasState::new(window, config)?;
    for line in INSTRUCTIONS {
        println!("{line}");
    }
    state.window.request_redraw();

    let mut fatal: Option<anyhow::Error> = None;
    event_loop
        .run(|event, elwt| {
            elwt.set_control_flow(ControlFlow::Wait);

            match event {
                Event::WindowEvent { window_id, event } if window_id == state.window.id() => {
                    match event {
                        WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                            elwt.exit();
                        }
                        WindowEvent::KeyboardInput { event, .. } => {
                            state.input.handle_key_event(&event);
                        }
                        WindowEvent::Focused(false) => {
                            state.input.release_all();
                        }
                        WindowEvent::Resized(new_size) => {
                            state.resize(new_size);
                        }
                        WindowEvent::RedrawRequested => {
                            let commands = state.input.take_commands(state.key_trigger);
                            if commands.quit {
                                elwt.exit();
                                return;
                            }
                            if commands.reload {
                                if let Err(err) = state.reload() {
                                    fatal = Some(
                                        anyhow::Error::new(err).context("shader reload failed"),
                                    );
                                    elwt.exit();
                                    return;
                                }
                            }

                            let time = state.clock.sample();
                            match state.draw(commands, time) {
                                Ok(()) => {}
                                Err(RenderError::Capture(err)) => {
                                    tracing::warn!(error = %format!("{err:#}"), "failed to capture frame");
                                }
                                Err(RenderError::Surface(surface_err)) => match surface_err {
                                    wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                                        state.gpu.reconfigure();
                                    }
                                    wgpu::SurfaceError::OutOfMemory => {
                                        fatal = Some(anyhow!("surface out of memory"));
                                        elwt.exit();
                                        return;
                                    }
                                    wgpu::SurfaceError::Timeout => {
                                        tracing::warn!("surface timeout; retrying next frame");
                                    }
                                    other => {
                                        tracing::warn!("surface error: {other:?}; retrying next frame");
                                    }
                                },
                            }
                            state.clock.advance();
                        }
                        _ => {}
                    }
                }
                Event::AboutToWait => {
                    state.window.request_redraw();
                }
                _ => {}
            }
        })
        .map_err(|err| anyhow!("event loop error: {err}"))?;

    match fatal {
        Some(err) => Err(err),
        None => Ok(()),
    }
}
