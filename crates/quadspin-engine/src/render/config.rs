use std::borrow::Cow;

use crate::paint::Color;

use super::vertex::{Vertex, QUAD_VERTICES};

/// Per-frame rotation step of the stock configuration, in radians.
pub const DEFAULT_ROTATION_STEP: f64 = 0.01;

/// How the rotation angle advances each frame.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RotationMode {
    /// Fixed step per rendered frame; speed follows the display refresh rate.
    PerFrame { step: f64 },
    /// Radians per second, scaled by the frame delta time.
    PerSecond { rate: f64 },
}

impl RotationMode {
    /// Returns the angle after one frame that took `dt` seconds.
    #[inline]
    pub fn advance(self, angle: f64, dt: f32) -> f64 {
        match self {
            RotationMode::PerFrame { step } => angle + step,
            RotationMode::PerSecond { rate } => angle + rate * dt.max(0.0) as f64,
        }
    }
}

impl Default for RotationMode {
    fn default() -> Self {
        RotationMode::PerFrame {
            step: DEFAULT_ROTATION_STEP,
        }
    }
}

/// WGSL sources for the two stages.
#[derive(Debug, Clone, PartialEq)]
pub struct ShaderSources {
    pub vertex: Cow<'static, str>,
    pub vertex_entry: Cow<'static, str>,
    pub fragment: Cow<'static, str>,
    pub fragment_entry: Cow<'static, str>,
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self {
            vertex: Cow::Borrowed(include_str!("shaders/quad_vs.wgsl")),
            vertex_entry: Cow::Borrowed("vs_main"),
            fragment: Cow::Borrowed(include_str!("shaders/quad_fs.wgsl")),
            fragment_entry: Cow::Borrowed("fs_main"),
        }
    }
}

/// Renderer configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    pub clear_color: Color,
    pub vertices: [Vertex; 4],
    pub shaders: ShaderSources,
    /// Name of the `mat4x4<f32>` uniform receiving the rotation.
    pub uniform_name: Cow<'static, str>,
    pub rotation: RotationMode,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            clear_color: Color::WHITE,
            vertices: QUAD_VERTICES,
            shaders: ShaderSources::default(),
            uniform_name: Cow::Borrowed("transform"),
            rotation: RotationMode::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn per_frame_ignores_delta_time() {
        let mode = RotationMode::default();
        assert_eq!(mode.advance(0.0, 0.5), DEFAULT_ROTATION_STEP);
        assert_eq!(mode.advance(0.0, 0.001), DEFAULT_ROTATION_STEP);
    }

    #[test]
    fn per_second_scales_with_delta_time() {
        let mode = RotationMode::PerSecond { rate: 2.0 };
        assert!((mode.advance(1.0, 0.25) - 1.5).abs() < 1e-9);
        assert_eq!(mode.advance(1.0, -1.0), 1.0);
    }

    #[test]
    fn default_sources_name_their_entry_points() {
        let s = ShaderSources::default();
        assert!(s.vertex.contains("fn vs_main"));
        assert!(s.fragment.contains("fn fs_main"));
        assert!(s.vertex.contains("var<uniform> transform"));
    }
}
