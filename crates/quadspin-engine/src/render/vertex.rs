use bytemuck::{Pod, Zeroable};

use crate::device::{AttributeFormat, VertexAttribute, VertexLayout};

/// Interleaved position + color vertex (24 bytes).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3], // NDC
    pub color: [f32; 3],    // linear RGB
}

impl Vertex {
    pub const STRIDE: u64 = std::mem::size_of::<Vertex>() as u64;

    #[inline]
    pub const fn new(position: [f32; 3], color: [f32; 3]) -> Self {
        Self { position, color }
    }

    /// Position at `@location(0)`, color at `@location(1)`.
    pub fn layout() -> VertexLayout {
        VertexLayout {
            stride: Self::STRIDE,
            attributes: vec![
                VertexAttribute {
                    location: 0,
                    offset: 0,
                    format: AttributeFormat::Float32x3,
                },
                VertexAttribute {
                    location: 1,
                    offset: std::mem::offset_of!(Vertex, color) as u64,
                    format: AttributeFormat::Float32x3,
                },
            ],
        }
    }
}

/// Corners of the quad in fan order, counter-clockwise from bottom-left.
pub const QUAD_VERTICES: [Vertex; 4] = [
    Vertex::new([-0.5, -0.5, 0.0], [1.0, 0.0, 0.0]),
    Vertex::new([0.5, -0.5, 0.0], [0.0, 1.0, 0.0]),
    Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0]),
    Vertex::new([-0.5, 0.5, 0.0], [1.0, 1.0, 0.0]),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_matches_struct() {
        let layout = Vertex::layout();
        assert_eq!(layout.stride, 24);
        assert_eq!(layout.attributes[0].offset, 0);
        assert_eq!(layout.attributes[1].offset, 12);
        assert_eq!(layout.validate(), Ok(()));
    }

    #[test]
    fn quad_bytes_are_tightly_packed() {
        let bytes: &[u8] = bytemuck::cast_slice(&QUAD_VERTICES);
        assert_eq!(bytes.len(), 4 * 24);
    }
}
