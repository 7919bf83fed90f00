use std::borrow::Cow;

use crate::compile::{prepare_stage, Diagnostic, StageKind, QUAD_VERTICES};
use crate::reload::ProgramBuilder;

const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];

/// Layout of the quad vertex buffer: one `vec2` position at location 0.
pub(crate) fn quad_vertex_layout() -> wgpu::VertexBufferLayout<'static> {
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &QUAD_ATTRIBUTES,
    }
}

pub(crate) const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;

/// A compiled shader module waiting to be linked.
pub(crate) struct CompiledStage {
    kind: StageKind,
    module: wgpu::ShaderModule,
    uses_time: bool,
}

/// A linked pipeline ready for drawing.
pub(crate) struct Program {
    pub pipeline: wgpu::RenderPipeline,
    /// Whether the time bind group must be set before drawing.
    pub uses_time: bool,
}

/// Compiles and links against one device and surface format.
pub(crate) struct GpuProgramBuilder<'a> {
    pub device: &'a wgpu::Device,
    pub time_layout: &'a wgpu::BindGroupLayout,
    pub surface_format: wgpu::TextureFormat,
}

impl GpuProgramBuilder<'_> {
    /// Runs `create` inside a validation scope and returns the captured error text.
    fn scoped<T>(&self, create: impl FnOnce() -> T) -> (T, Option<String>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = create();
        let error = pollster::block_on(self.device.pop_error_scope());
        (value, error.map(|err| err.to_string()))
    }
}

impl ProgramBuilder for GpuProgramBuilder<'_> {
    type Stage = CompiledStage;
    type Program = Program;

    fn compile(&self, source: &str, kind: StageKind) -> Result<CompiledStage, Diagnostic> {
        let prepared = prepare_stage(source, kind)?;
        let label = match kind {
            StageKind::Vertex => "canvas vertex",
            StageKind::Fragment => "canvas fragment",
        };
        let (module, error) = self.scoped(|| {
            self.device
                .create_shader_module(wgpu::ShaderModuleDescriptor {
                    label: Some(label),
                    source: wgpu::ShaderSource::Glsl {
                        shader: Cow::Owned(prepared.source),
                        stage: kind.naga_stage(),
                        defines: &[],
                    },
                })
        });
        if let Some(log) = error {
            return Err(Diagnostic::stage(kind, log));
        }

        Ok(CompiledStage {
            kind,
            module,
            uses_time: prepared.uses_time,
        })
    }

    fn link(&self, vertex: CompiledStage, fragment: CompiledStage) -> Result<Program, Diagnostic> {
        if vertex.kind != StageKind::Vertex || fragment.kind != StageKind::Fragment {
            return Err(Diagnostic::program(format!(
                "expected a vertex and a fragment stage, got {} and {}",
                vertex.kind, fragment.kind
            )));
        }

        let uses_time = vertex.uses_time || fragment.uses_time;
        let bind_group_layouts: &[&wgpu::BindGroupLayout] = if uses_time {
            std::slice::from_ref(&self.time_layout)
        } else {
            &[]
        };

        let (pipeline, error) = self.scoped(|| {
            let pipeline_layout =
                self.device
                    .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                        label: Some("canvas pipeline layout"),
                        bind_group_layouts,
                        push_constant_ranges: &[],
                    });

            self.device
                .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                    label: Some("canvas pipeline"),
                    layout: Some(&pipeline_layout),
                    vertex: wgpu::VertexState {
                        module: &vertex.module,
                        entry_point: Some("main"),
                        buffers: &[quad_vertex_layout()],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    },
                    primitive: wgpu::PrimitiveState {
                        topology: wgpu::PrimitiveTopology::TriangleList,
                        strip_index_format: None,
                        front_face: wgpu::FrontFace::Ccw,
                        cull_mode: None,
                        polygon_mode: wgpu::PolygonMode::Fill,
                        unclipped_depth: false,
                        conservative: false,
                    },
                    depth_stencil: None,
                    multisample: wgpu::MultisampleState::default(),
                    fragment: Some(wgpu::FragmentState {
                        module: &fragment.module,
                        entry_point: Some("main"),
                        targets: &[Some(wgpu::ColorTargetState {
                            format: self.surface_format,
                            blend: None,
                            write_mask: wgpu::ColorWrites::ALL,
                        })],
                        compilation_options: wgpu::PipelineCompilationOptions::default(),
                    }),
                    multiview: None,
                    cache: None,
                })
        });
        if let Some(log) = error {
            return Err(Diagnostic::program(log));
        }

        Ok(Program {
            pipeline,
            uses_time,
        })
    }
}
