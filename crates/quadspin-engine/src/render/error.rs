use std::fmt;

use crate::device::{DeviceError, ShaderStage};

/// Renderer lifecycle.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum Lifecycle {
    Uninitialized,
    Ready,
    Released,
}

impl fmt::Display for Lifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Lifecycle::Uninitialized => "uninitialized",
            Lifecycle::Ready => "ready",
            Lifecycle::Released => "released",
        })
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RenderError {
    #[error("{stage} shader compilation failed: {log}")]
    ShaderCompile { stage: ShaderStage, log: String },

    #[error("shader program link failed: {log}")]
    ProgramLink { log: String },

    #[error("uniform `{name}` not found in linked program")]
    MissingUniform { name: String },

    /// Operation called in the wrong lifecycle state.
    #[error("`{op}` called while renderer is {state}")]
    InvalidState { op: &'static str, state: Lifecycle },

    #[error(transparent)]
    Device(DeviceError),
}

impl From<DeviceError> for RenderError {
    fn from(err: DeviceError) -> Self {
        match err {
            DeviceError::Compile { stage, log } => RenderError::ShaderCompile { stage, log },
            DeviceError::Link { log } => RenderError::ProgramLink { log },
            other => RenderError::Device(other),
        }
    }
}
