//! GPU side of the canvas.
//!
//! - `context` owns the wgpu instance, device, and surface and reconfigures
//!   the swapchain on resize.
//! - `pipeline` turns GLSL stages into shader modules and links them into a
//!   render pipeline, collecting validation errors as diagnostics.
//! - `uniforms` mirrors the `Time` block and writes it through the queue.
//! - `state` glues these together: it draws the quad, presents, and copies
//!   frames back for export.

mod context;
mod pipeline;
mod state;
mod uniforms;

pub(crate) use pipeline::Program;
pub(crate) use state::{GpuState, RenderError};
