use crate::coords::Mat4;
use crate::device::{
    BufferId, DeviceError, LayoutId, ProgramId, QuadDevice, ShaderId, ShaderStage, Topology,
    UniformLocation,
};

use super::config::RendererConfig;
use super::diagnostics::{DiagnosticSink, LogSink};
use super::error::{Lifecycle, RenderError};
use super::vertex::Vertex;

const QUAD_VERTEX_COUNT: u32 = 4;

/// Device handles held while the renderer is ready.
#[derive(Debug, Copy, Clone)]
struct Resources {
    buffer: BufferId,
    layout: LayoutId,
    program: ProgramId,
    transform: UniformLocation,
}

enum State {
    Uninitialized,
    Ready(Resources),
    Released,
}

/// Handles acquired so far during `initialize`, released on failure.
#[derive(Default)]
struct Acquired {
    buffer: Option<BufferId>,
    layout: Option<LayoutId>,
    vertex: Option<ShaderId>,
    fragment: Option<ShaderId>,
    program: Option<ProgramId>,
}

/// Result of one accepted `advance_and_render` call.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// The frame was submitted; `errors` lists device errors seen on the way.
    Drawn { errors: Vec<DeviceError> },
    /// No frame could be acquired; nothing was drawn.
    Skipped(DeviceError),
}

impl FrameOutcome {
    pub fn is_clean(&self) -> bool {
        matches!(self, FrameOutcome::Drawn { errors } if errors.is_empty())
    }

    /// Whether any reported error means the device is unusable.
    pub fn is_fatal(&self) -> bool {
        match self {
            FrameOutcome::Drawn { errors } => errors.iter().any(DeviceError::is_fatal),
            FrameOutcome::Skipped(err) => err.is_fatal(),
        }
    }
}

/// Draws one rotating quad.
///
/// Lifecycle: `Uninitialized -> Ready -> Released`, no way back. Every operation
/// takes the device explicitly; calls made in the wrong state fail with
/// [`RenderError::InvalidState`] and touch nothing.
pub struct Renderer {
    size: (u32, u32),
    config: RendererConfig,
    angle: f64,
    frames: u64,
    state: State,
    diagnostics: Box<dyn DiagnosticSink>,
}

impl Renderer {
    /// Creates a renderer with the stock configuration.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_config(width, height, RendererConfig::default())
    }

    pub fn with_config(width: u32, height: u32, config: RendererConfig) -> Self {
        Self {
            size: (width, height),
            config,
            angle: 0.0,
            frames: 0,
            state: State::Uninitialized,
            diagnostics: Box::new(LogSink),
        }
    }

    /// Replaces the sink receiving per-frame device errors (default: [`LogSink`]).
    pub fn with_diagnostics(mut self, sink: impl DiagnosticSink + 'static) -> Self {
        self.diagnostics = Box::new(sink);
        self
    }

    /// Size supplied at construction. Not consumed by the draw path.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.config.vertices
    }

    /// Accumulated rotation in radians. Never wrapped.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Number of accepted `advance_and_render` calls.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn lifecycle(&self) -> Lifecycle {
        match self.state {
            State::Uninitialized => Lifecycle::Uninitialized,
            State::Ready(_) => Lifecycle::Ready,
            State::Released => Lifecycle::Released,
        }
    }

    fn invalid(&self, op: &'static str) -> RenderError {
        RenderError::InvalidState {
            op,
            state: self.lifecycle(),
        }
    }

    /// Uploads the quad, builds the program and caches the transform uniform.
    ///
    /// On failure every handle acquired so far is released and the renderer
    /// stays uninitialized.
    pub fn initialize<D: QuadDevice>(&mut self, device: &mut D) -> Result<(), RenderError> {
        if !matches!(self.state, State::Uninitialized) {
            return Err(self.invalid("initialize"));
        }

        let mut acquired = Acquired::default();
        match self.acquire(device, &mut acquired) {
            Ok(resources) => {
                // Stages are no longer needed once linked.
                for shader in [acquired.vertex, acquired.fragment].into_iter().flatten() {
                    if let Err(err) = device.release_shader(shader) {
                        self.diagnostics.report("initialize", &err);
                    }
                }
                log::debug!(
                    "renderer ready: buffer #{} layout #{} program #{}",
                    resources.buffer.raw(),
                    resources.layout.raw(),
                    resources.program.raw()
                );
                self.state = State::Ready(resources);
                Ok(())
            }
            Err(err) => {
                self.rollback(device, acquired);
                Err(err)
            }
        }
    }

    fn acquire<D: QuadDevice>(
        &self,
        device: &mut D,
        acquired: &mut Acquired,
    ) -> Result<Resources, RenderError> {
        let bytes: &[u8] = bytemuck::cast_slice(&self.config.vertices);
        let buffer = *acquired
            .buffer
            .insert(device.create_vertex_buffer("quadspin quad", bytes)?);
        let layout = *acquired
            .layout
            .insert(device.create_vertex_layout(buffer, &Vertex::layout())?);

        let shaders = &self.config.shaders;
        let vertex = *acquired.vertex.insert(device.compile_shader(
            ShaderStage::Vertex,
            &shaders.vertex,
            &shaders.vertex_entry,
        )?);
        let fragment = *acquired.fragment.insert(device.compile_shader(
            ShaderStage::Fragment,
            &shaders.fragment,
            &shaders.fragment_entry,
        )?);

        let program = *acquired
            .program
            .insert(device.link_program(vertex, fragment, layout)?);

        let transform = device
            .uniform_location(program, &self.config.uniform_name)
            .ok_or_else(|| RenderError::MissingUniform {
                name: self.config.uniform_name.to_string(),
            })?;

        Ok(Resources {
            buffer,
            layout,
            program,
            transform,
        })
    }

    fn rollback<D: QuadDevice>(&mut self, device: &mut D, acquired: Acquired) {
        let Acquired {
            buffer,
            layout,
            vertex,
            fragment,
            program,
        } = acquired;

        let results = [
            program.map(|id| device.release_program(id)),
            fragment.map(|id| device.release_shader(id)),
            vertex.map(|id| device.release_shader(id)),
            layout.map(|id| device.release_layout(id)),
            buffer.map(|id| device.release_buffer(id)),
        ];
        for err in results.into_iter().flatten().filter_map(Result::err) {
            self.diagnostics.report("initialize rollback", &err);
        }
    }

    /// Clears, advances the rotation, and draws the quad once.
    ///
    /// Device errors do not fail the call: they go to the diagnostics sink and
    /// are returned in the [`FrameOutcome`]. The angle advances on every
    /// accepted call, including frames the device could not acquire.
    pub fn advance_and_render<D: QuadDevice>(
        &mut self,
        device: &mut D,
        dt: f32,
    ) -> Result<FrameOutcome, RenderError> {
        let State::Ready(res) = self.state else {
            return Err(self.invalid("advance_and_render"));
        };

        let began = device.begin_frame(self.config.clear_color);

        self.angle = self.config.rotation.advance(self.angle, dt);
        self.frames += 1;

        if let Err(err) = began {
            self.diagnostics.report("begin_frame", &err);
            return Ok(FrameOutcome::Skipped(err));
        }

        let transform = Mat4::rotation_z(self.angle);

        let mut errors = Vec::new();
        if let Err(err) = device.set_uniform_mat4(res.program, res.transform, &transform) {
            errors.push(err);
        }
        if let Err(err) = device.draw(
            res.program,
            res.layout,
            Topology::TriangleFan,
            QUAD_VERTEX_COUNT,
        ) {
            errors.push(err);
        }
        if let Some(err) = device.end_frame() {
            errors.push(err);
        }

        for err in &errors {
            self.diagnostics.report("render", err);
        }

        Ok(FrameOutcome::Drawn { errors })
    }

    /// Releases the buffer, layout and program.
    ///
    /// Release failures are reported to the diagnostics sink; the renderer ends
    /// up released either way. A second call fails with `InvalidState`.
    pub fn shutdown<D: QuadDevice>(&mut self, device: &mut D) -> Result<(), RenderError> {
        let State::Ready(res) = self.state else {
            return Err(self.invalid("shutdown"));
        };
        self.state = State::Released;

        let results = [
            device.release_buffer(res.buffer),
            device.release_layout(res.layout),
            device.release_program(res.program),
        ];
        for err in results.into_iter().filter_map(Result::err) {
            self.diagnostics.report("shutdown", &err);
        }

        log::debug!("renderer released after {} frames", self.frames);
        Ok(())
    }
}
