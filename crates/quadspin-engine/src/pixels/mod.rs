//! CPU-side pixel storage.
//!
//! Kept apart from the GPU path: nothing in `render` reads or writes these
//! buffers.

mod surface;

pub use surface::PixelSurface;
