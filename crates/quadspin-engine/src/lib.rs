//! quadspin engine crate.
//!
//! Platform runtime, GPU device layer and the rotating-quad renderer.

pub mod core;
pub mod device;
pub mod logging;
pub mod time;
pub mod window;

pub mod coords;
pub mod paint;
pub mod pixels;
pub mod render;
