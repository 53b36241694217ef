use winit::event::WindowEvent;
use winit::window::WindowId;

use crate::device::WgpuDevice;

use super::ctx::FrameCtx;

/// Control directive returned by app callbacks.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AppControl {
    Continue,
    Exit,
}

/// Application contract driven by [`Runtime`](crate::window::Runtime).
pub trait App {
    /// Called for every window event, before the runtime handles it.
    fn on_window_event(&mut self, window_id: WindowId, event: &WindowEvent) -> AppControl {
        let _ = (window_id, event);
        AppControl::Continue
    }

    /// Called once per redraw of each window.
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl;

    /// Called exactly once per window, before its device is dropped.
    ///
    /// Release GPU resources owned by the app here.
    fn on_close(&mut self, window_id: WindowId, device: &mut WgpuDevice<'_>) {
        let _ = (window_id, device);
    }
}
