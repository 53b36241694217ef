//! GPU device + surface management.
//!
//! - `Gpu` creates the wgpu Instance/Adapter/Device/Queue and the window Surface
//! - `QuadDevice` is the capability the renderer draws through
//! - `WgpuDevice` implements it on top of `Gpu`; `HeadlessDevice` implements it
//!   in memory

mod api;
mod error;
mod frame;
mod gpu;
mod headless;
mod surface;
mod wgpu_device;
mod wgsl;

pub use api::{
    fan_indices, AttributeFormat, BufferId, LayoutId, ProgramId, QuadDevice, ShaderId,
    ShaderStage, Topology, UniformLocation, VertexAttribute, VertexLayout,
};
pub use error::{DeviceError, SurfaceErrorAction};
pub use frame::GpuFrame;
pub use gpu::{Gpu, GpuInit};
pub use headless::{DeviceCall, HeadlessDevice};
pub use wgpu_device::WgpuDevice;
