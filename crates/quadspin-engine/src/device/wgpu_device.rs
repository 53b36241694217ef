use std::collections::HashMap;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::coords::Mat4;
use crate::paint::Color;

use super::api::{
    fan_indices, BufferId, LayoutId, ProgramId, QuadDevice, ShaderId, ShaderStage, Topology,
    UniformLocation, VertexLayout,
};
use super::wgsl::{self, StageRef};
use super::{DeviceError, Gpu, GpuFrame, GpuInit};

const MAT4_SIZE: u64 = std::mem::size_of::<Mat4>() as u64;

struct Shader {
    stage: ShaderStage,
    module: wgpu::ShaderModule,
    reflection: naga::Module,
    entry_point: String,
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    uniforms: Vec<String>,
    /// One 64-byte buffer per uniform, bound at `@binding(i)` of group 0.
    uniform_buffers: Vec<wgpu::Buffer>,
    bind_group: Option<wgpu::BindGroup>,
}

/// [`QuadDevice`] backed by wgpu and presenting to a window surface.
///
/// Handles index resource tables owned here; dropping the device drops every
/// resource it still holds.
pub struct WgpuDevice<'w> {
    window: &'w Window,
    gpu: Gpu<'w>,

    next_id: u32,
    buffers: HashMap<BufferId, wgpu::Buffer>,
    layouts: HashMap<LayoutId, (BufferId, VertexLayout)>,
    shaders: HashMap<ShaderId, Shader>,
    programs: HashMap<ProgramId, Program>,

    /// Index buffers for fan draws, keyed by vertex count.
    fan_index_buffers: HashMap<u32, (wgpu::Buffer, u32)>,

    frame: Option<GpuFrame>,
}

impl<'w> WgpuDevice<'w> {
    pub async fn new(window: &'w Window, init: GpuInit) -> Result<Self> {
        let gpu = Gpu::new(window, init).await?;
        Ok(Self {
            window,
            gpu,
            next_id: 0,
            buffers: HashMap::new(),
            layouts: HashMap::new(),
            shaders: HashMap::new(),
            programs: HashMap::new(),
            fan_index_buffers: HashMap::new(),
            frame: None,
        })
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.gpu.resize(new_size);
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// Records the first validation error raised while `f` runs.
    fn scoped<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        let device = self.gpu.device();
        let scope = device.push_error_scope(wgpu::ErrorFilter::Validation);
        let out = f(device);
        let err = pollster::block_on(scope.pop());
        (out, err)
    }

    /// Like [`scoped`](Self::scoped), mapping a captured error to
    /// [`DeviceError::Validation`].
    fn checked<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> Result<T, DeviceError> {
        let (out, err) = self.scoped(f);
        validation_result(err)?;
        Ok(out)
    }

    fn ensure_fan_indices(&mut self, vertex_count: u32) -> Result<(), DeviceError> {
        if self.fan_index_buffers.contains_key(&vertex_count) {
            return Ok(());
        }
        let indices = fan_indices(vertex_count);
        if indices.is_empty() {
            return Err(DeviceError::Validation(format!(
                "a fan needs at least 3 vertices, got {vertex_count}"
            )));
        }
        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("quadspin fan indices"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });
        self.fan_index_buffers
            .insert(vertex_count, (buffer, indices.len() as u32));
        Ok(())
    }

    fn build_pipeline(
        &self,
        vs: &Shader,
        fs: &Shader,
        layout: &VertexLayout,
        uniforms: &[String],
    ) -> (wgpu::RenderPipeline, Vec<wgpu::Buffer>, Option<wgpu::BindGroup>) {
        let device = self.gpu.device();

        let entries: Vec<wgpu::BindGroupLayoutEntry> = (0..uniforms.len() as u32)
            .map(|binding| wgpu::BindGroupLayoutEntry {
                binding,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(MAT4_SIZE),
                },
                count: None,
            })
            .collect();

        let bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("quadspin uniforms bgl"),
            entries: &entries,
        });

        let uniform_buffers: Vec<wgpu::Buffer> = uniforms
            .iter()
            .map(|name| {
                device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                    label: Some(name.as_str()),
                    contents: Mat4::IDENTITY.as_bytes(),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                })
            })
            .collect();

        let bind_group = (!uniform_buffers.is_empty()).then(|| {
            let entries: Vec<wgpu::BindGroupEntry> = uniform_buffers
                .iter()
                .enumerate()
                .map(|(i, buf)| wgpu::BindGroupEntry {
                    binding: i as u32,
                    resource: buf.as_entire_binding(),
                })
                .collect();
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("quadspin uniforms"),
                layout: &bgl,
                entries: &entries,
            })
        });

        let bind_group_layouts: Vec<&wgpu::BindGroupLayout> =
            if bind_group.is_some() { vec![&bgl] } else { vec![] };

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("quadspin pipeline layout"),
            bind_group_layouts: &bind_group_layouts,
            immediate_size: 0,
        });

        let attributes: Vec<wgpu::VertexAttribute> = layout
            .attributes
            .iter()
            .map(|a| wgpu::VertexAttribute {
                format: a.format.to_wgpu(),
                offset: a.offset,
                shader_location: a.location,
            })
            .collect();

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("quadspin pipeline"),
            layout: Some(&pipeline_layout),

            vertex: wgpu::VertexState {
                module: &vs.module,
                entry_point: Some(vs.entry_point.as_str()),
                compilation_options: Default::default(),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: layout.stride,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &attributes,
                }],
            },

            fragment: Some(wgpu::FragmentState {
                module: &fs.module,
                entry_point: Some(fs.entry_point.as_str()),
                compilation_options: Default::default(),
                targets: &[Some(wgpu::ColorTargetState {
                    format: self.gpu.surface_format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),

            // Fans are expanded to indexed lists at draw time.
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
            multiview_mask: None,
            cache: None,
        });

        (pipeline, uniform_buffers, bind_group)
    }
}

fn unknown(kind: &'static str, id: u32) -> DeviceError {
    DeviceError::UnknownHandle { kind, id }
}

/// Maps an error captured by a validation scope.
fn validation_result(err: Option<wgpu::Error>) -> Result<(), DeviceError> {
    match err {
        Some(e) => Err(DeviceError::Validation(e.to_string())),
        None => Ok(()),
    }
}

impl QuadDevice for WgpuDevice<'_> {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError> {
        if contents.is_empty() {
            return Err(DeviceError::Validation(format!("buffer `{label}` is empty")));
        }
        let buffer = self
            .gpu
            .device()
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::VERTEX,
            });
        let id = BufferId(self.next());
        self.buffers.insert(id, buffer);
        Ok(id)
    }

    fn create_vertex_layout(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<LayoutId, DeviceError> {
        if !self.buffers.contains_key(&buffer) {
            return Err(unknown("buffer", buffer.0));
        }
        layout.validate()?;
        let id = LayoutId(self.next());
        self.layouts.insert(id, (buffer, layout.clone()));
        Ok(id)
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> Result<ShaderId, DeviceError> {
        let fail = |log: String| DeviceError::Compile { stage, log };
        let reflection = wgsl::parse(source).map_err(fail)?;
        if !wgsl::declares_entry_point(&reflection, stage, entry_point) {
            return Err(fail(format!(
                "no `{} fn {entry_point}` declared",
                stage.wgsl_attribute()
            )));
        }

        let label = format!("quadspin {stage} shader");
        let (module, scope_err) = self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(label.as_str()),
                source: wgpu::ShaderSource::Wgsl(source.into()),
            })
        });

        let info = pollster::block_on(module.get_compilation_info());
        let mut log: Vec<String> = info
            .messages
            .iter()
            .filter(|m| matches!(m.message_type, wgpu::CompilationMessageType::Error))
            .map(|m| match &m.location {
                Some(loc) => format!("{}:{}: {}", loc.line_number, loc.line_position, m.message),
                None => m.message.clone(),
            })
            .collect();
        if log.is_empty() {
            if let Some(err) = scope_err {
                log.push(err.to_string());
            }
        }
        if !log.is_empty() {
            return Err(fail(log.join("\n")));
        }

        let id = ShaderId(self.next());
        self.shaders.insert(
            id,
            Shader {
                stage,
                module,
                reflection,
                entry_point: entry_point.to_string(),
            },
        );
        Ok(id)
    }

    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
        layout: LayoutId,
    ) -> Result<ProgramId, DeviceError> {
        let link = |log: String| DeviceError::Link { log };

        let vs = self
            .shaders
            .get(&vertex)
            .ok_or_else(|| link(format!("vertex shader #{} does not exist", vertex.0)))?;
        let fs = self
            .shaders
            .get(&fragment)
            .ok_or_else(|| link(format!("fragment shader #{} does not exist", fragment.0)))?;
        let (_, vertex_layout) = self
            .layouts
            .get(&layout)
            .ok_or_else(|| link(format!("vertex layout #{} does not exist", layout.0)))?;

        for (shader, expected) in [(vs, ShaderStage::Vertex), (fs, ShaderStage::Fragment)] {
            if shader.stage != expected {
                return Err(link(format!(
                    "shader `{}` is a {} stage, expected {expected}",
                    shader.entry_point, shader.stage
                )));
            }
        }
        wgsl::check_interface(
            StageRef {
                module: &vs.reflection,
                entry_point: &vs.entry_point,
            },
            StageRef {
                module: &fs.reflection,
                entry_point: &fs.entry_point,
            },
            vertex_layout,
        )
        .map_err(link)?;

        let mut uniforms = wgsl::uniform_names(&vs.reflection);
        for name in wgsl::uniform_names(&fs.reflection) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        let ((pipeline, uniform_buffers, bind_group), err) =
            self.scoped(|_| self.build_pipeline(vs, fs, vertex_layout, &uniforms));
        if let Some(err) = err {
            return Err(link(err.to_string()));
        }

        let id = ProgramId(self.next());
        self.programs.insert(
            id,
            Program {
                pipeline,
                uniforms,
                uniform_buffers,
                bind_group,
            },
        );
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(&program)?;
        let idx = p.uniforms.iter().position(|u| u == name)?;
        Some(UniformLocation(idx as u32))
    }

    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError> {
        if self.frame.is_some() {
            return Err(DeviceError::FrameInProgress);
        }

        let mut frame = match self.gpu.begin_frame() {
            Ok(f) => f,
            Err(err) => {
                let reason = err.to_string();
                let action = self.gpu.handle_surface_error(&err);
                return Err(DeviceError::Surface { reason, action });
            }
        };

        // Clear pass; dropped before any draw pass is recorded.
        {
            let _rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("quadspin clear"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &frame.view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear.to_wgpu()),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });
        }

        self.frame = Some(frame);
        Ok(())
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), DeviceError> {
        let p = self.programs.get(&program).ok_or(unknown("program", program.0))?;
        let buf = p
            .uniform_buffers
            .get(location.0 as usize)
            .ok_or(unknown("uniform", location.0))?;
        let queue = self.gpu.queue();
        self.checked(|_| queue.write_buffer(buf, 0, value.as_bytes()))
    }

    fn draw(
        &mut self,
        program: ProgramId,
        layout: LayoutId,
        topology: Topology,
        vertex_count: u32,
    ) -> Result<(), DeviceError> {
        if self.frame.is_none() {
            return Err(DeviceError::NoFrame);
        }
        if topology == Topology::TriangleFan {
            self.ensure_fan_indices(vertex_count)?;
        }

        let Self {
            frame,
            programs,
            layouts,
            buffers,
            fan_index_buffers,
            ..
        } = self;
        let Some(frame) = frame.as_mut() else {
            return Err(DeviceError::NoFrame);
        };
        let p = programs.get(&program).ok_or(unknown("program", program.0))?;
        let (buffer_id, _) = layouts.get(&layout).ok_or(unknown("layout", layout.0))?;
        let vbo = buffers.get(buffer_id).ok_or(unknown("buffer", buffer_id.0))?;

        let mut rpass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("quadspin draw"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        rpass.set_pipeline(&p.pipeline);
        if let Some(bg) = p.bind_group.as_ref() {
            rpass.set_bind_group(0, bg, &[]);
        }
        rpass.set_vertex_buffer(0, vbo.slice(..));

        match topology {
            Topology::TriangleList => rpass.draw(0..vertex_count, 0..1),
            Topology::TriangleFan => {
                let Some((ibo, index_count)) = fan_index_buffers.get(&vertex_count) else {
                    return Err(DeviceError::Validation(format!(
                        "no fan index buffer for {vertex_count} vertices"
                    )));
                };
                rpass.set_index_buffer(ibo.slice(..), wgpu::IndexFormat::Uint32);
                rpass.draw_indexed(0..*index_count, 0, 0..1);
            }
        }

        Ok(())
    }

    fn end_frame(&mut self) -> Option<DeviceError> {
        let Some(frame) = self.frame.take() else {
            return Some(DeviceError::NoFrame);
        };

        self.window.pre_present_notify();
        self.checked(|_| self.gpu.submit(frame)).err()
    }

    fn release_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        let buffer = self.buffers.remove(&id).ok_or(unknown("buffer", id.0))?;
        buffer.destroy();
        Ok(())
    }

    fn release_layout(&mut self, id: LayoutId) -> Result<(), DeviceError> {
        self.layouts.remove(&id).ok_or(unknown("layout", id.0))?;
        Ok(())
    }

    fn release_shader(&mut self, id: ShaderId) -> Result<(), DeviceError> {
        self.shaders.remove(&id).ok_or(unknown("shader", id.0))?;
        Ok(())
    }

    fn release_program(&mut self, id: ProgramId) -> Result<(), DeviceError> {
        let program = self.programs.remove(&id).ok_or(unknown("program", id.0))?;
        for buf in &program.uniform_buffers {
            buf.destroy();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captured_scope_error_becomes_validation_error() {
        let err = wgpu::Error::Validation {
            source: Box::new(std::fmt::Error),
            description: "write_buffer past the end of uniform buffer".to_string(),
        };
        match validation_result(Some(err)) {
            Err(DeviceError::Validation(msg)) => assert!(msg.contains("write_buffer"), "{msg}"),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(validation_result(None), Ok(()));
    }
}
