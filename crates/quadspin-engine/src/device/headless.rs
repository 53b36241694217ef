use std::collections::{HashMap, VecDeque};

use crate::coords::Mat4;
use crate::paint::Color;

use super::api::{
    BufferId, LayoutId, ProgramId, QuadDevice, ShaderId, ShaderStage, Topology, UniformLocation,
    VertexLayout,
};
use super::wgsl::{self, StageRef};
use super::DeviceError;

/// One call observed by a [`HeadlessDevice`], in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCall {
    CreateBuffer(BufferId),
    CreateLayout(LayoutId),
    CompileShader(ShaderId, ShaderStage),
    LinkProgram(ProgramId),
    BeginFrame(Color),
    SetUniform {
        program: ProgramId,
        location: UniformLocation,
        value: Mat4,
    },
    Draw {
        program: ProgramId,
        layout: LayoutId,
        topology: Topology,
        vertex_count: u32,
    },
    EndFrame,
    ReleaseBuffer(BufferId),
    ReleaseLayout(LayoutId),
    ReleaseShader(ShaderId),
    ReleaseProgram(ProgramId),
}

struct Shader {
    stage: ShaderStage,
    module: naga::Module,
    entry_point: String,
}

struct Program {
    uniforms: Vec<String>,
    values: HashMap<UniformLocation, Mat4>,
}

/// In-memory device that never touches a GPU.
///
/// Buffers keep their bytes, shaders are parsed and validated with naga, and
/// every call is recorded. Used for offline runs and tests.
#[derive(Default)]
pub struct HeadlessDevice {
    next_id: u32,
    buffers: HashMap<BufferId, Vec<u8>>,
    layouts: HashMap<LayoutId, (BufferId, VertexLayout)>,
    shaders: HashMap<ShaderId, Shader>,
    programs: HashMap<ProgramId, Program>,

    in_frame: bool,
    calls: Vec<DeviceCall>,

    /// Returned by the next `begin_frame` instead of starting a frame.
    acquire_failure: Option<DeviceError>,
    /// Deferred errors returned by `end_frame`, oldest first.
    pending: VecDeque<DeviceError>,
}

impl HeadlessDevice {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&mut self) -> u32 {
        self.next_id += 1;
        self.next_id
    }

    /// All recorded calls, oldest first.
    pub fn calls(&self) -> &[DeviceCall] {
        &self.calls
    }

    pub fn clear_calls(&mut self) {
        self.calls.clear();
    }

    /// Bytes uploaded to `id`, as the device stores them.
    pub fn buffer_contents(&self, id: BufferId) -> Option<&[u8]> {
        self.buffers.get(&id).map(Vec::as_slice)
    }

    /// Number of buffers, layouts, shaders and programs not yet released.
    pub fn live_handles(&self) -> usize {
        self.buffers.len() + self.layouts.len() + self.shaders.len() + self.programs.len()
    }

    /// Last value written to a uniform.
    pub fn uniform_value(&self, program: ProgramId, location: UniformLocation) -> Option<Mat4> {
        self.programs.get(&program)?.values.get(&location).copied()
    }

    /// Number of draw calls recorded so far.
    pub fn draw_count(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, DeviceCall::Draw { .. }))
            .count()
    }

    /// Makes the next `begin_frame` fail with `err`.
    pub fn fail_next_frame(&mut self, err: DeviceError) {
        self.acquire_failure = Some(err);
    }

    /// Queues an error for the next `end_frame` to report.
    pub fn inject_error(&mut self, err: DeviceError) {
        self.pending.push_back(err);
    }
}

fn unknown(kind: &'static str, id: u32) -> DeviceError {
    DeviceError::UnknownHandle { kind, id }
}

impl QuadDevice for HeadlessDevice {
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError> {
        if contents.is_empty() {
            return Err(DeviceError::Validation(format!("buffer `{label}` is empty")));
        }
        let id = BufferId(self.next());
        self.buffers.insert(id, contents.to_vec());
        self.calls.push(DeviceCall::CreateBuffer(id));
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
        self.calls.push(DeviceCall::CreateLayout(id));
        Ok(id)
    }

    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> Result<ShaderId, DeviceError> {
        let fail = |log: String| DeviceError::Compile { stage, log };

        if source.trim().is_empty() {
            return Err(fail("empty shader source".to_string()));
        }
        let module = wgsl::parse(source).map_err(fail)?;
        if !wgsl::declares_entry_point(&module, stage, entry_point) {
            return Err(fail(format!(
                "no `{} fn {entry_point}` declared",
                stage.wgsl_attribute()
            )));
        }

        let id = ShaderId(self.next());
        self.shaders.insert(
            id,
            Shader {
                stage,
                module,
                entry_point: entry_point.to_string(),
            },
        );
        self.calls.push(DeviceCall::CompileShader(id, stage));
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
        if vs.stage != ShaderStage::Vertex {
            return Err(link(format!("shader `{}` is not a vertex stage", vs.entry_point)));
        }
        if fs.stage != ShaderStage::Fragment {
            return Err(link(format!("shader `{}` is not a fragment stage", fs.entry_point)));
        }
        let (_, vertex_layout) = self
            .layouts
            .get(&layout)
            .ok_or_else(|| link(format!("vertex layout #{} does not exist", layout.0)))?;
        wgsl::check_interface(
            StageRef {
                module: &vs.module,
                entry_point: &vs.entry_point,
            },
            StageRef {
                module: &fs.module,
                entry_point: &fs.entry_point,
            },
            vertex_layout,
        )
        .map_err(link)?;

        let mut uniforms = wgsl::uniform_names(&vs.module);
        for name in wgsl::uniform_names(&fs.module) {
            if !uniforms.contains(&name) {
                uniforms.push(name);
            }
        }

        let id = ProgramId(self.next());
        self.programs.insert(
            id,
            Program {
                uniforms,
                values: HashMap::new(),
            },
        );
        self.calls.push(DeviceCall::LinkProgram(id));
        Ok(id)
    }

    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation> {
        let p = self.programs.get(&program)?;
        let idx = p.uniforms.iter().position(|u| u == name)?;
        Some(UniformLocation(idx as u32))
    }

    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError> {
        if self.in_frame {
            return Err(DeviceError::FrameInProgress);
        }
        if let Some(err) = self.acquire_failure.take() {
            return Err(err);
        }
        self.in_frame = true;
        self.calls.push(DeviceCall::BeginFrame(clear));
        Ok(())
    }

    fn set_uniform_mat4(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), DeviceError> {
        let p = self
            .programs
            .get_mut(&program)
            .ok_or(unknown("program", program.0))?;
        if location.0 as usize >= p.uniforms.len() {
            return Err(unknown("uniform", location.0));
        }
        p.values.insert(location, *value);
        self.calls.push(DeviceCall::SetUniform {
            program,
            location,
            value: *value,
        });
        Ok(())
    }

    fn draw(
        &mut self,
        program: ProgramId,
        layout: LayoutId,
        topology: Topology,
        vertex_count: u32,
    ) -> Result<(), DeviceError> {
        if !self.in_frame {
            return Err(DeviceError::NoFrame);
        }
        if !self.programs.contains_key(&program) {
            return Err(unknown("program", program.0));
        }
        let (buffer, vl) = self.layouts.get(&layout).ok_or(unknown("layout", layout.0))?;
        let bytes = self.buffers.get(buffer).ok_or(unknown("buffer", buffer.0))?;
        let needed = vl.stride * vertex_count as u64;
        if needed > bytes.len() as u64 {
            return Err(DeviceError::Validation(format!(
                "draw reads {needed} bytes but buffer #{} holds {}",
                buffer.0,
                bytes.len()
            )));
        }

        self.calls.push(DeviceCall::Draw {
            program,
            layout,
            topology,
            vertex_count,
        });
        Ok(())
    }

    fn end_frame(&mut self) -> Option<DeviceError> {
        if !self.in_frame {
            return Some(DeviceError::NoFrame);
        }
        self.in_frame = false;
        self.calls.push(DeviceCall::EndFrame);
        self.pending.pop_front()
    }

    fn release_buffer(&mut self, id: BufferId) -> Result<(), DeviceError> {
        self.buffers.remove(&id).ok_or(unknown("buffer", id.0))?;
        self.calls.push(DeviceCall::ReleaseBuffer(id));
        Ok(())
    }

    fn release_layout(&mut self, id: LayoutId) -> Result<(), DeviceError> {
        self.layouts.remove(&id).ok_or(unknown("layout", id.0))?;
        self.calls.push(DeviceCall::ReleaseLayout(id));
        Ok(())
    }

    fn release_shader(&mut self, id: ShaderId) -> Result<(), DeviceError> {
        self.shaders.remove(&id).ok_or(unknown("shader", id.0))?;
        self.calls.push(DeviceCall::ReleaseShader(id));
        Ok(())
    }

    fn release_program(&mut self, id: ProgramId) -> Result<(), DeviceError> {
        self.programs.remove(&id).ok_or(unknown("program", id.0))?;
        self.calls.push(DeviceCall::ReleaseProgram(id));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{AttributeFormat, VertexAttribute};

    const VS: &str = "@group(0) @binding(0) var<uniform> m: mat4x4<f32>;\n\
                      @vertex fn vs_main(@location(0) p: vec2<f32>) -> @builtin(position) vec4<f32> { return m * vec4<f32>(p, 0.0, 1.0); }";
    const FS: &str = "@fragment fn fs_main() -> @location(0) vec4<f32> { return vec4<f32>(1.0); }";

    fn layout() -> VertexLayout {
        VertexLayout {
            stride: 8,
            attributes: vec![VertexAttribute {
                location: 0,
                offset: 0,
                format: AttributeFormat::Float32x2,
            }],
        }
    }

    fn program(dev: &mut HeadlessDevice) -> (ProgramId, LayoutId) {
        let buf = dev.create_vertex_buffer("tri", &[0u8; 24]).unwrap();
        let layout = dev.create_vertex_layout(buf, &layout()).unwrap();
        let vs = dev.compile_shader(ShaderStage::Vertex, VS, "vs_main").unwrap();
        let fs = dev.compile_shader(ShaderStage::Fragment, FS, "fs_main").unwrap();
        (dev.link_program(vs, fs, layout).unwrap(), layout)
    }

    #[test]
    fn buffer_keeps_uploaded_bytes() {
        let mut dev = HeadlessDevice::new();
        let id = dev.create_vertex_buffer("b", &[1, 2, 3, 4]).unwrap();
        assert_eq!(dev.buffer_contents(id), Some(&[1u8, 2, 3, 4][..]));
    }

    #[test]
    fn layout_requires_existing_buffer() {
        let mut dev = HeadlessDevice::new();
        let err = dev.create_vertex_layout(BufferId(42), &layout()).unwrap_err();
        assert_eq!(err, DeviceError::UnknownHandle { kind: "buffer", id: 42 });
    }

    #[test]
    fn compile_rejects_missing_entry_point() {
        let mut dev = HeadlessDevice::new();
        let err = dev.compile_shader(ShaderStage::Vertex, FS, "fs_main").unwrap_err();
        assert!(matches!(err, DeviceError::Compile { stage: ShaderStage::Vertex, .. }));
        assert_eq!(dev.live_handles(), 0);
    }

    #[test]
    fn compile_rejects_balanced_but_invalid_source() {
        let mut dev = HeadlessDevice::new();
        let src = "@vertex fn vs_main() -> @builtin(position) vec4<f32> { return vec3<f32>(1.0); }";
        let err = dev.compile_shader(ShaderStage::Vertex, src, "vs_main").unwrap_err();
        assert!(matches!(err, DeviceError::Compile { stage: ShaderStage::Vertex, .. }));
        assert!(dev.calls().is_empty());
    }

    #[test]
    fn link_rejects_unfed_fragment_input() {
        let mut dev = HeadlessDevice::new();
        let buf = dev.create_vertex_buffer("tri", &[0u8; 24]).unwrap();
        let layout = dev.create_vertex_layout(buf, &layout()).unwrap();
        let vs = dev.compile_shader(ShaderStage::Vertex, VS, "vs_main").unwrap();
        let fs = dev
            .compile_shader(
                ShaderStage::Fragment,
                "@fragment fn fs_main(@location(0) c: vec4<f32>) -> @location(0) vec4<f32> { return c; }",
                "fs_main",
            )
            .unwrap();
        let err = dev.link_program(vs, fs, layout).unwrap_err();
        assert!(matches!(err, DeviceError::Link { .. }));
    }

    #[test]
    fn link_rejects_swapped_stages() {
        let mut dev = HeadlessDevice::new();
        let buf = dev.create_vertex_buffer("tri", &[0u8; 24]).unwrap();
        let layout = dev.create_vertex_layout(buf, &layout()).unwrap();
        let vs = dev.compile_shader(ShaderStage::Vertex, VS, "vs_main").unwrap();
        let err = dev.link_program(vs, vs, layout).unwrap_err();
        assert!(matches!(err, DeviceError::Link { .. }));
    }

    #[test]
    fn uniform_locations_follow_declaration_order() {
        let mut dev = HeadlessDevice::new();
        let (prog, _) = program(&mut dev);
        assert_eq!(dev.uniform_location(prog, "m"), Some(UniformLocation(0)));
        assert_eq!(dev.uniform_location(prog, "missing"), None);
    }

    #[test]
    fn draw_outside_frame_fails() {
        let mut dev = HeadlessDevice::new();
        let (prog, layout) = program(&mut dev);
        assert_eq!(
            dev.draw(prog, layout, Topology::TriangleList, 3),
            Err(DeviceError::NoFrame)
        );
    }

    #[test]
    fn draw_past_buffer_end_is_a_validation_error() {
        let mut dev = HeadlessDevice::new();
        let (prog, layout) = program(&mut dev);
        dev.begin_frame(Color::BLACK).unwrap();
        let err = dev.draw(prog, layout, Topology::TriangleList, 4).unwrap_err();
        assert!(matches!(err, DeviceError::Validation(_)));
        assert_eq!(dev.end_frame(), None);
    }

    #[test]
    fn injected_errors_surface_at_end_of_frame() {
        let mut dev = HeadlessDevice::new();
        dev.inject_error(DeviceError::Validation("bad write".into()));
        dev.begin_frame(Color::WHITE).unwrap();
        assert_eq!(dev.end_frame(), Some(DeviceError::Validation("bad write".into())));
        dev.begin_frame(Color::WHITE).unwrap();
        assert_eq!(dev.end_frame(), None);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut dev = HeadlessDevice::new();
        let id = dev.create_vertex_buffer("b", &[0]).unwrap();
        dev.release_buffer(id).unwrap();
        assert!(dev.release_buffer(id).is_err());
    }
}
