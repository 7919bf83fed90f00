use bytemuck::{Pod, Zeroable};

/// CPU mirror of the `CanvasTime` std140 block (`float Time;`).
///
/// std140 rounds a block up to 16 bytes, hence the padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct TimeUniforms {
    pub time: f32,
    pub _padding: [f32; 3],
}

impl TimeUniforms {
    pub fn new(seconds: f32) -> Self {
        Self {
            time: seconds,
            _padding: [0.0; 3],
        }
    }
}

/// Uniform buffer, layout, and bind group for the time block at group 0.
pub(crate) struct TimeBinding {
    pub layout: wgpu::BindGroupLayout,
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

impl TimeBinding {
    pub fn new(device: &wgpu::Device) -> Self {
        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("time uniform layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("time uniform buffer"),
            size: std::mem::size_of::<TimeUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("time uniform bind group"),
            layout: &layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self {
            layout,
            buffer,
            bind_group,
        }
    }

    pub fn write(&self, queue: &wgpu::Queue, seconds: f32) {
        queue.write_buffer(&self.buffer, 0, bytemuck::bytes_of(&TimeUniforms::new(seconds)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::size_of;

    #[test]
    fn time_uniforms_follow_std140_layout() {
        assert_eq!(size_of::<TimeUniforms>(), 16);
        let bytes = bytemuck::bytes_of(&TimeUniforms::new(2.5)).to_vec();
        assert_eq!(&bytes[0..4], &2.5f32.to_ne_bytes());
        assert!(bytes[4..].iter().all(|&byte| byte == 0));
    }
}
