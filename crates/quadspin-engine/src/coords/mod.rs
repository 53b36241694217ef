//! Geometry types shared across the renderer.
//!
//! Clip space follows wgpu: +X right, +Y up, quad coordinates are already in NDC.

mod mat4;

pub use mat4::Mat4;
