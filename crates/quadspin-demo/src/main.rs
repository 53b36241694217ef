use anyhow::Result;
use winit::dpi::LogicalSize;
use winit::window::WindowId;

use quadspin_engine::core::{App, AppControl, FrameCtx};
use quadspin_engine::device::{GpuInit, WgpuDevice};
use quadspin_engine::logging::{init_logging, LoggingConfig};
use quadspin_engine::render::{Lifecycle, Renderer};
use quadspin_engine::window::{Runtime, RuntimeConfig};

const WIDTH: u32 = 800;
const HEIGHT: u32 = 600;

/// One window, one quad, one draw call per frame.
struct SpinningQuad {
    renderer: Renderer,
}

impl App for SpinningQuad {
    fn on_frame(&mut self, ctx: &mut FrameCtx<'_, '_>) -> AppControl {
        // The device only exists once the window is up, so initialize lazily.
        if self.renderer.lifecycle() == Lifecycle::Uninitialized {
            if let Err(err) = self.renderer.initialize(&mut *ctx.device) {
                log::error!("renderer initialization failed: {err}");
                return AppControl::Exit;
            }
            log::info!("renderer initialized ({WIDTH}x{HEIGHT})");
        }

        match self.renderer.advance_and_render(&mut *ctx.device, ctx.time.dt) {
            Ok(outcome) if outcome.is_fatal() => {
                log::error!("graphics device is unusable, exiting");
                AppControl::Exit
            }
            Ok(_) => AppControl::Continue,
            Err(err) => {
                log::error!("frame {} rejected: {err}", ctx.time.frame_index);
                AppControl::Exit
            }
        }
    }

    fn on_close(&mut self, _window_id: WindowId, device: &mut WgpuDevice<'_>) {
        if self.renderer.lifecycle() != Lifecycle::Ready {
            return;
        }
        if let Err(err) = self.renderer.shutdown(device) {
            log::warn!("renderer shutdown: {err}");
        }
        log::info!(
            "quad released after {} frames ({:.2} rad)",
            self.renderer.frames(),
            self.renderer.angle()
        );
    }
}

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let config = RuntimeConfig {
        title: "quadspin".to_string(),
        initial_size: LogicalSize::new(WIDTH as f64, HEIGHT as f64),
    };

    let app = SpinningQuad {
        renderer: Renderer::new(WIDTH, HEIGHT),
    };

    Runtime::run(config, GpuInit::default(), app)
}
