//! Still-frame export.
//!
//! [`FrameExporter`] owns the CPU-side [`ExportFrame`] and reallocates it on
//! every framebuffer resize. The GPU readback fills the frame row by row; the
//! exporter then writes it as an 8-bit RGB PNG named after the loop iteration.

use std::collections::TryReserveError;
use std::path::PathBuf;

use anyhow::{Context, Result};
use image::RgbImage;
use thiserror::Error;

/// File name prefix shared by every exported frame.
pub const FRAME_PREFIX: &str = "ShaderCanvas-frame";

const RGB_CHANNELS: usize = 3;

/// Bytes per RGB row, rounded up so each row starts on a 4-byte boundary.
pub fn padded_stride(width: u32) -> usize {
    (RGB_CHANNELS * width as usize).div_ceil(4) * 4
}

/// `ShaderCanvas-frame00042.png` for frame 42.
pub fn frame_file_name(frame_index: u64) -> String {
    format!("{FRAME_PREFIX}{frame_index:05}.png")
}

#[derive(Debug, Error)]
pub enum AllocationError {
    #[error("export buffer for {width}x{height} exceeds addressable memory")]
    TooLarge { width: u32, height: u32 },
    #[error("failed to reserve export buffer")]
    Reserve(#[from] TryReserveError),
}

/// Channel order of the 4-byte texels read back from the surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TexelOrder {
    Rgba,
    Bgra,
}

impl TexelOrder {
    /// Order for 8-bit surface formats; `None` when export cannot decode it.
    pub fn for_format(format: wgpu::TextureFormat) -> Option<Self> {
        match format {
            wgpu::TextureFormat::Rgba8Unorm | wgpu::TextureFormat::Rgba8UnormSrgb => {
                Some(Self::Rgba)
            }
            wgpu::TextureFormat::Bgra8Unorm | wgpu::TextureFormat::Bgra8UnormSrgb => {
                Some(Self::Bgra)
            }
            _ => None,
        }
    }
}

/// RGB pixel rows, top row first, each `stride` bytes long.
#[derive(Debug)]
pub struct ExportFrame {
    width: u32,
    height: u32,
    stride: usize,
    data: Vec<u8>,
}

impl ExportFrame {
    pub fn allocate(width: u32, height: u32) -> Result<Self, AllocationError> {
        let stride = padded_stride(width);
        let len = stride
            .checked_mul(height as usize)
            .ok_or(AllocationError::TooLarge { width, height })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)?;
        data.resize(len, 0);
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Copies 4-byte texel rows into the frame, dropping alpha.
    ///
    /// `bytes_per_row` is the source pitch, which may include GPU padding.
    pub fn fill_from_texels(&mut self, texels: &[u8], bytes_per_row: usize, order: TexelOrder) {
        let width = self.width as usize;
        for (row, dst) in self
            .data
            .chunks_exact_mut(self.stride)
            .enumerate()
            .take(self.height as usize)
        {
            let start = row * bytes_per_row;
            let Some(src) = texels.get(start..start + width * 4) else {
                tracing::warn!(row, "readback shorter than the export frame");
                return;
            };
            for (pixel, texel) in dst[..width * RGB_CHANNELS]
                .chunks_exact_mut(RGB_CHANNELS)
                .zip(src.chunks_exact(4))
            {
                match order {
                    TexelOrder::Rgba => pixel.copy_from_slice(&texel[..3]),
                    TexelOrder::Bgra => {
                        pixel[0] = texel[2];
                        pixel[1] = texel[1];
                        pixel[2] = texel[0];
                    }
                }
            }
        }
    }

    /// Drops the row padding and returns an image in display orientation.
    pub fn to_image(&self) -> Result<RgbImage> {
        let row_bytes = self.width as usize * RGB_CHANNELS;
        let mut packed = Vec::with_capacity(row_bytes * self.height as usize);
        for row in self.data.chunks_exact(self.stride).take(self.height as usize) {
            packed.extend_from_slice(&row[..row_bytes]);
        }
        RgbImage::from_raw(self.width, self.height, packed)
            .context("export frame does not match its dimensions")
    }
}

/// Owns the export buffer and writes numbered PNG files.
#[derive(Debug)]
pub struct FrameExporter {
    directory: PathBuf,
    frame: Option<ExportFrame>,
    disabled: bool,
}

impl FrameExporter {
    pub fn new(directory: impl Into<PathBuf>, width: u32, height: u32) -> Self {
        let mut exporter = Self {
            directory: directory.into(),
            frame: None,
            disabled: false,
        };
        exporter.resize(width, height);
        exporter
    }

    /// True while an export buffer exists. Once an allocation fails this
    /// stays false for the rest of the run.
    pub fn is_available(&self) -> bool {
        !self.disabled && self.frame.is_some()
    }

    /// Reallocates the buffer for a new framebuffer size.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.disabled || width == 0 || height == 0 {
            return;
        }
        match ExportFrame::allocate(width, height) {
            Ok(frame) => {
                tracing::debug!(width, height, stride = frame.stride(), "export buffer allocated");
                self.frame = Some(frame);
            }
            Err(err) => {
                self.disable(&err.to_string());
            }
        }
    }

    /// Turns export off for the rest of the run.
    pub fn disable(&mut self, reason: &str) {
        if !self.disabled {
            tracing::warn!(reason, "export functionality is disabled");
        }
        self.disabled = true;
        self.frame = None;
    }

    pub fn frame(&self) -> Option<&ExportFrame> {
        self.frame.as_ref().filter(|_| !self.disabled)
    }

    pub fn frame_mut(&mut self) -> Option<&mut ExportFrame> {
        if self.disabled {
            return None;
        }
        self.frame.as_mut()
    }

    /// Encodes the current frame as `<directory>/ShaderCanvas-frameNNNNN.png`.
    pub fn write(&self, frame_index: u64) -> Result<PathBuf> {
        let frame = self.frame().context("export buffer is not available")?;
        let path = self.directory.join(frame_file_name(frame_index));
        frame
            .to_image()?
            .save_with_format(&path, image::ImageFormat::Png)
            .with_context(|| format!("failed to write {}", path.display()))?;
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn stride_rounds_up_to_four_bytes() {
        assert_eq!(padded_stride(1), 4);
        assert_eq!(padded_stride(2), 8);
        assert_eq!(padded_stride(3), 12);
        assert_eq!(padded_stride(4), 12);
        assert_eq!(padded_stride(5), 16);
        assert_eq!(padded_stride(800), 2400);
        assert_eq!(padded_stride(801), 2404);
    }

    #[test]
    fn frame_names_are_zero_padded() {
        assert_eq!(frame_file_name(0), "ShaderCanvas-frame00000.png");
        assert_eq!(frame_file_name(42), "ShaderCanvas-frame00042.png");
        assert_eq!(frame_file_name(123456), "ShaderCanvas-frame123456.png");
    }

    #[test]
    fn buffer_size_follows_padded_stride() {
        let frame = ExportFrame::allocate(5, 3).unwrap();
        assert_eq!(frame.stride(), 16);
        assert_eq!(frame.data.len(), 48);
    }

    #[test]
    fn resize_reallocates_buffer() {
        let dir = TempDir::new().unwrap();
        let mut exporter = FrameExporter::new(dir.path(), 800, 600);
        assert!(exporter.is_available());
        assert_eq!(exporter.frame().unwrap().data.len(), 2400 * 600);

        exporter.resize(333, 200);
        let frame = exporter.frame().unwrap();
        assert_eq!((frame.width(), frame.height()), (333, 200));
        assert_eq!(frame.data.len(), padded_stride(333) * 200);
    }

    #[test]
    fn minimised_window_keeps_previous_buffer() {
        let dir = TempDir::new().unwrap();
        let mut exporter = FrameExporter::new(dir.path(), 16, 8);
        exporter.resize(0, 0);
        assert_eq!(exporter.frame().unwrap().width(), 16);
    }

    #[test]
    fn failed_allocation_disables_export_for_good() {
        let dir = TempDir::new().unwrap();
        let mut exporter = FrameExporter::new(dir.path(), u32::MAX, u32::MAX);
        assert!(!exporter.is_available());
        assert!(exporter.frame_mut().is_none());

        exporter.resize(64, 64);
        assert!(!exporter.is_available());
        assert!(exporter.write(0).is_err());
    }

    #[test]
    fn bgra_texels_become_rgb_rows() {
        let mut frame = ExportFrame::allocate(2, 2).unwrap();
        // Source pitch padded to 16 bytes per row.
        let mut texels = vec![0u8; 32];
        texels[0..4].copy_from_slice(&[10, 20, 30, 255]);
        texels[4..8].copy_from_slice(&[40, 50, 60, 255]);
        texels[16..20].copy_from_slice(&[70, 80, 90, 255]);
        texels[20..24].copy_from_slice(&[1, 2, 3, 255]);

        frame.fill_from_texels(&texels, 16, TexelOrder::Bgra);
        let image = frame.to_image().unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [30, 20, 10]);
        assert_eq!(image.get_pixel(1, 0).0, [60, 50, 40]);
        assert_eq!(image.get_pixel(0, 1).0, [90, 80, 70]);
        assert_eq!(image.get_pixel(1, 1).0, [3, 2, 1]);
    }

    #[test]
    fn exported_png_matches_framebuffer() {
        let dir = TempDir::new().unwrap();
        let mut exporter = FrameExporter::new(dir.path(), 3, 2);
        let bytes_per_row = 256;
        let mut texels = vec![0u8; bytes_per_row * 2];
        // Top row red, bottom row green.
        for x in 0..3 {
            texels[x * 4..x * 4 + 4].copy_from_slice(&[255, 0, 0, 255]);
            let bottom = bytes_per_row + x * 4;
            texels[bottom..bottom + 4].copy_from_slice(&[0, 255, 0, 255]);
        }
        exporter
            .frame_mut()
            .unwrap()
            .fill_from_texels(&texels, bytes_per_row, TexelOrder::Rgba);

        let path = exporter.write(7).unwrap();
        assert_eq!(path.file_name().unwrap(), "ShaderCanvas-frame00007.png");

        let decoded = image::open(&path).unwrap();
        assert_eq!(decoded.color(), image::ColorType::Rgb8);
        let decoded = decoded.to_rgb8();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [255, 0, 0]);
        assert_eq!(decoded.get_pixel(2, 1).0, [0, 255, 0]);
    }

    #[test]
    fn export_after_resize_uses_new_dimensions() {
        let dir = TempDir::new().unwrap();
        let mut exporter = FrameExporter::new(dir.path(), 4, 4);
        exporter.resize(7, 5);
        let path = exporter.write(1).unwrap();
        let decoded = image::open(path).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (7, 5));
    }

    #[test]
    fn surface_formats_map_to_texel_order() {
        assert_eq!(
            TexelOrder::for_format(wgpu::TextureFormat::Bgra8UnormSrgb),
            Some(TexelOrder::Bgra)
        );
        assert_eq!(
            TexelOrder::for_format(wgpu::TextureFormat::Rgba8Unorm),
            Some(TexelOrder::Rgba)
        );
        assert_eq!(TexelOrder::for_format(wgpu::TextureFormat::Rgb10a2Unorm), None);
    }
}
