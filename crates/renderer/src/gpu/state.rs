use std::fmt;
use std::sync::mpsc;

use anyhow::{anyhow, Context, Result};
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;

use crate::compile::QUAD_VERTICES;
use crate::export::{ExportFrame, TexelOrder};
use crate::runtime::TimeSample;

use super::context::GpuContext;
use super::pipeline::{GpuProgramBuilder, Program, QUAD_VERTEX_COUNT};
use super::uniforms::TimeBinding;

/// Background colour behind the quad.
const CLEAR_COLOR: wgpu::Color = wgpu::Color::WHITE;

#[derive(Debug)]
pub(crate) enum RenderError {
    Surface(wgpu::SurfaceError),
    Capture(anyhow::Error),
}

impl From<wgpu::SurfaceError> for RenderError {
    fn from(value: wgpu::SurfaceError) -> Self {
        RenderError::Surface(value)
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::Surface(err) => write!(f, "surface error: {err:?}"),
            RenderError::Capture(err) => write!(f, "frame capture failed: {err:#}"),
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::Surface(err) => Some(err),
            RenderError::Capture(err) => Some(&**err),
        }
    }
}

/// Host-visible buffer the surface texture is copied into for export.
struct ReadbackBuffer {
    buffer: wgpu::Buffer,
    size: PhysicalSize<u32>,
    bytes_per_row: u32,
}

impl ReadbackBuffer {
    fn new(device: &wgpu::Device, size: PhysicalSize<u32>) -> Self {
        let bytes_per_row = padded_bytes_per_row(size.width);
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame readback buffer"),
            size: bytes_per_row as u64 * size.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        Self {
            buffer,
            size,
            bytes_per_row,
        }
    }
}

/// Row pitch for texture-to-buffer copies of 4-byte texels.
fn padded_bytes_per_row(width: u32) -> u32 {
    let unpadded = width * 4;
    let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
    unpadded.div_ceil(align) * align
}

/// A readback buffer can be reused only for a texture of the same size.
fn readback_is_stale(current: Option<PhysicalSize<u32>>, wanted: PhysicalSize<u32>) -> bool {
    current != Some(wanted)
}

/// Owns every GPU resource needed to draw the canvas.
pub(crate) struct GpuState {
    context: GpuContext,
    quad: wgpu::Buffer,
    time: TimeBinding,
    readback: Option<ReadbackBuffer>,
}

impl GpuState {
    pub(crate) fn new<T>(target: &T, initial_size: PhysicalSize<u32>) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle,
    {
        let context = GpuContext::new(target, initial_size)?;
        let quad = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("canvas quad"),
                contents: bytemuck::cast_slice(&QUAD_VERTICES),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let time = TimeBinding::new(&context.device);

        Ok(Self {
            context,
            quad,
            time,
            readback: None,
        })
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    /// Whether frames can be copied out of the surface at all.
    pub(crate) fn supports_capture(&self) -> bool {
        self.context.capture_order.is_some()
    }

    /// Compiler and linker bound to this device and surface format.
    pub(crate) fn program_builder(&self) -> GpuProgramBuilder<'_> {
        GpuProgramBuilder {
            device: &self.context.device,
            time_layout: &self.time.layout,
            surface_format: self.context.surface_format,
        }
    }

    /// Returns true when the surface took the new size.
    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) -> bool {
        let resized = self.context.resize(new_size);
        if resized {
            self.readback = None;
        }
        resized
    }

    pub(crate) fn reconfigure(&mut self) {
        self.context.reconfigure();
    }

    /// Clears, draws `program` over the quad, and presents.
    ///
    /// When `capture` is given the drawn frame is copied into it before
    /// presenting. A capture failure is reported after the frame is presented.
    pub(crate) fn render(
        &mut self,
        program: &Program,
        time: TimeSample,
        capture: Option<&mut ExportFrame>,
    ) -> Result<(), RenderError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        if program.uses_time {
            self.time.write(&self.context.queue, time.seconds);
        }

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("canvas pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&program.pipeline);
            if program.uses_time {
                render_pass.set_bind_group(0, &self.time.bind_group, &[]);
            }
            render_pass.set_vertex_buffer(0, self.quad.slice(..));
            render_pass.draw(0..QUAD_VERTEX_COUNT, 0..1);
        }

        let capture = match (capture, self.context.capture_order) {
            (Some(target), Some(order)) => {
                let readback = self.readback_for(frame.texture.size());
                encode_copy(&mut encoder, &frame.texture, readback);
                Some((target, order))
            }
            (Some(_), None) => {
                return Err(RenderError::Capture(anyhow!(
                    "surface does not support frame capture"
                )));
            }
            (None, _) => None,
        };

        self.context.queue.submit(std::iter::once(encoder.finish()));

        let captured = match capture {
            Some((target, order)) => self.read_back(target, order),
            None => Ok(()),
        };

        frame.present();
        tracing::trace!(
            frame = time.frame_index,
            width = self.context.size.width,
            height = self.context.size.height,
            "presented frame"
        );
        captured.map_err(RenderError::Capture)
    }

    fn readback_for(&mut self, extent: wgpu::Extent3d) -> &ReadbackBuffer {
        let size = PhysicalSize::new(extent.width, extent.height);
        if readback_is_stale(self.readback.as_ref().map(|readback| readback.size), size) {
            self.readback = None;
        }
        let device = &self.context.device;
        self.readback
            .get_or_insert_with(|| ReadbackBuffer::new(device, size))
    }

    /// Maps the readback buffer and converts it into `target`.
    fn read_back(&self, target: &mut ExportFrame, order: TexelOrder) -> Result<()> {
        let readback = self
            .readback
            .as_ref()
            .context("readback buffer missing after copy")?;
        if (target.width(), target.height()) != (readback.size.width, readback.size.height) {
            anyhow::bail!(
                "export buffer is {}x{} but the framebuffer is {}x{}",
                target.width(),
                target.height(),
                readback.size.width,
                readback.size.height
            );
        }

        let slice = readback.buffer.slice(..);
        let (sender, receiver) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = sender.send(result);
        });
        self.context
            .device
            .poll(wgpu::PollType::Wait)
            .context("failed to wait for frame readback")?;
        receiver
            .recv()
            .context("readback callback dropped")?
            .context("failed to map readback buffer")?;

        {
            let data = slice.get_mapped_range();
            target.fill_from_texels(&data, readback.bytes_per_row as usize, order);
        }
        readback.buffer.unmap();
        Ok(())
    }
}

fn encode_copy(
    encoder: &mut wgpu::CommandEncoder,
    texture: &wgpu::Texture,
    readback: &ReadbackBuffer,
) {
    encoder.copy_texture_to_buffer(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        wgpu::TexelCopyBufferInfo {
            buffer: &readback.buffer,
            layout: wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(readback.bytes_per_row),
                rows_per_image: Some(readback.size.height),
            },
        },
        wgpu::Extent3d {
            width: readback.size.width,
            height: readback.size.height,
            depth_or_array_layers: 1,
        },
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn readback_rows_meet_copy_alignment() {
        assert_eq!(padded_bytes_per_row(1), 256);
        assert_eq!(padded_bytes_per_row(64), 256);
        assert_eq!(padded_bytes_per_row(65), 512);
        assert_eq!(padded_bytes_per_row(800), 3328);
    }

    #[test]
    fn readback_buffer_is_replaced_only_on_size_change() {
        let size = PhysicalSize::new(800, 600);
        assert!(readback_is_stale(None, size));
        assert!(!readback_is_stale(Some(size), size));
        assert!(readback_is_stale(Some(PhysicalSize::new(800, 601)), size));
        assert!(readback_is_stale(Some(PhysicalSize::new(1024, 600)), size));
    }
}
