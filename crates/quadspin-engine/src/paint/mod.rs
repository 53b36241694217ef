//! Color model shared by the renderer and its configuration.

pub mod color;

pub use color::Color;
