//! Window + runtime loop.
//!
//! Owns the `winit` EventLoop and Window, and gives each window its own
//! `WgpuDevice`.

mod runtime;

pub use runtime::{Runtime, RuntimeConfig, RuntimeCtx};
