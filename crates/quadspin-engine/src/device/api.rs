use std::fmt;

use crate::coords::Mat4;
use crate::paint::Color;

use super::DeviceError;

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
        pub struct $name(pub(crate) u32);

        impl $name {
            /// Raw id, for diagnostics.
            #[inline]
            pub fn raw(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Vertex buffer owned by a device.
    BufferId
);
handle!(
    /// Vertex layout: a buffer plus its attribute description.
    LayoutId
);
handle!(
    /// Compiled shader stage.
    ShaderId
);
handle!(
    /// Linked vertex + fragment program.
    ProgramId
);
handle!(
    /// Location of a uniform inside a linked program.
    UniformLocation
);

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    /// WGSL attribute marking an entry point for this stage.
    pub fn wgsl_attribute(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "@vertex",
            ShaderStage::Fragment => "@fragment",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ShaderStage::Vertex => "vertex",
            ShaderStage::Fragment => "fragment",
        })
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum AttributeFormat {
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttributeFormat {
    pub fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Float32x4 => 16,
        }
    }

    pub(crate) fn to_wgpu(self) -> wgpu::VertexFormat {
        match self {
            AttributeFormat::Float32x2 => wgpu::VertexFormat::Float32x2,
            AttributeFormat::Float32x3 => wgpu::VertexFormat::Float32x3,
            AttributeFormat::Float32x4 => wgpu::VertexFormat::Float32x4,
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct VertexAttribute {
    /// Shader input location (`@location(n)`).
    pub location: u32,
    /// Byte offset inside one vertex.
    pub offset: u64,
    pub format: AttributeFormat,
}

/// Interleaved vertex layout.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct VertexLayout {
    pub stride: u64,
    pub attributes: Vec<VertexAttribute>,
}

impl VertexLayout {
    /// Checks that every attribute fits inside one stride and locations are unique.
    pub fn validate(&self) -> Result<(), DeviceError> {
        for (i, a) in self.attributes.iter().enumerate() {
            if a.offset + a.format.size() > self.stride {
                return Err(DeviceError::Validation(format!(
                    "attribute @location({}) ends at byte {} past stride {}",
                    a.location,
                    a.offset + a.format.size(),
                    self.stride
                )));
            }
            if self.attributes[..i].iter().any(|b| b.location == a.location) {
                return Err(DeviceError::Validation(format!(
                    "duplicate attribute @location({})",
                    a.location
                )));
            }
        }
        Ok(())
    }
}

/// How a run of vertices is assembled into triangles.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Topology {
    TriangleList,
    /// Triangles `(0, i, i + 1)` sharing the first vertex.
    TriangleFan,
}

/// Graphics capability consumed by the renderer.
///
/// Every call takes the device explicitly; nothing relies on a current-context
/// global. Handles are only meaningful to the device that issued them.
pub trait QuadDevice {
    /// Allocates a vertex buffer holding `contents`.
    fn create_vertex_buffer(&mut self, label: &str, contents: &[u8]) -> Result<BufferId, DeviceError>;

    /// Describes how `buffer` is read as vertex input.
    fn create_vertex_layout(
        &mut self,
        buffer: BufferId,
        layout: &VertexLayout,
    ) -> Result<LayoutId, DeviceError>;

    /// Compiles one WGSL stage. Fails with [`DeviceError::Compile`].
    fn compile_shader(
        &mut self,
        stage: ShaderStage,
        source: &str,
        entry_point: &str,
    ) -> Result<ShaderId, DeviceError>;

    /// Links a vertex and fragment stage against a vertex layout.
    /// Fails with [`DeviceError::Link`].
    fn link_program(
        &mut self,
        vertex: ShaderId,
        fragment: ShaderId,
        layout: LayoutId,
    ) -> Result<ProgramId, DeviceError>;

    /// Looks up a uniform declared by the program's stages.
    fn uniform_location(&self, program: ProgramId, name: &str) -> Option<UniformLocation>;

    /// Starts a frame and clears the color target.
    fn begin_frame(&mut self, clear: Color) -> Result<(), DeviceError>;

    fn set_uniform_mat4(
        &mut self,
        program: ProgramId,
        location: UniformLocation,
        value: &Mat4,
    ) -> Result<(), DeviceError>;

    fn draw(
        &mut self,
        program: ProgramId,
        layout: LayoutId,
        topology: Topology,
        vertex_count: u32,
    ) -> Result<(), DeviceError>;

    /// Finishes the frame and returns the first deferred device error, if any.
    fn end_frame(&mut self) -> Option<DeviceError>;

    fn release_buffer(&mut self, id: BufferId) -> Result<(), DeviceError>;
    fn release_layout(&mut self, id: LayoutId) -> Result<(), DeviceError>;
    fn release_shader(&mut self, id: ShaderId) -> Result<(), DeviceError>;
    fn release_program(&mut self, id: ProgramId) -> Result<(), DeviceError>;
}

/// Expands `vertex_count` fan vertices into triangle-list indices.
///
/// Fewer than three vertices produce no triangles.
pub fn fan_indices(vertex_count: u32) -> Vec<u32> {
    (1..vertex_count.saturating_sub(1))
        .flat_map(|i| [0, i, i + 1])
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quad_fan_is_two_triangles_sharing_vertex_zero() {
        assert_eq!(fan_indices(4), vec![0, 1, 2, 0, 2, 3]);
    }

    #[test]
    fn degenerate_fans_are_empty() {
        assert!(fan_indices(0).is_empty());
        assert!(fan_indices(2).is_empty());
        assert_eq!(fan_indices(3), vec![0, 1, 2]);
    }

    #[test]
    fn layout_rejects_attribute_past_stride() {
        let layout = VertexLayout {
            stride: 16,
            attributes: vec![VertexAttribute {
                location: 0,
                offset: 8,
                format: AttributeFormat::Float32x3,
            }],
        };
        assert!(matches!(layout.validate(), Err(DeviceError::Validation(_))));
    }

    #[test]
    fn layout_rejects_duplicate_locations() {
        let attr = VertexAttribute {
            location: 1,
            offset: 0,
            format: AttributeFormat::Float32x2,
        };
        let layout = VertexLayout {
            stride: 16,
            attributes: vec![attr, VertexAttribute { offset: 8, ..attr }],
        };
        assert!(layout.validate().is_err());
    }
}
