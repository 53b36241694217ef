use winit::window::{Window, WindowId};

use crate::device::WgpuDevice;
use crate::time::FrameTime;
use crate::window::RuntimeCtx;

/// Per-window handles and immutable window metadata.
pub struct WindowCtx<'a> {
    pub id: WindowId,
    pub window: &'a Window,
}

/// Per-frame context passed to [`App::on_frame`](super::App::on_frame).
///
/// Lifetimes:
/// - `'a` is the duration of the callback invocation
/// - `'w` is the window borrow carried by `WgpuDevice<'w>`
pub struct FrameCtx<'a, 'w> {
    pub window: WindowCtx<'a>,
    pub device: &'a mut WgpuDevice<'w>,
    pub time: FrameTime,
    pub runtime: &'a mut RuntimeCtx,
}
