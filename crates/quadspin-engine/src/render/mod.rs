//! Quad renderer.
//!
//! The renderer owns device handles but never a device: every operation takes
//! a [`QuadDevice`](crate::device::QuadDevice), so the same code drives wgpu or
//! the headless device.
//!
//! Convention:
//! - vertex positions are NDC, no projection
//! - the only uniform is a `mat4x4<f32>` rotation about +Z

mod config;
mod diagnostics;
mod error;
mod renderer;
mod vertex;

pub use config::{RendererConfig, RotationMode, ShaderSources, DEFAULT_ROTATION_STEP};
pub use diagnostics::{DiagnosticSink, LogSink, MemorySink};
pub use error::{Lifecycle, RenderError};
pub use renderer::{FrameOutcome, Renderer};
pub use vertex::{Vertex, QUAD_VERTICES};
