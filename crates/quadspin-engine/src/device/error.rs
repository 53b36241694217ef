use super::api::ShaderStage;

/// High-level response after a surface error.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum SurfaceErrorAction {
    /// Surface was reconfigured; rendering may resume next frame.
    Reconfigured,
    /// Transient error; skip the current frame.
    SkipFrame,
    /// Fatal error (commonly OOM); terminate gracefully.
    Fatal,
}

/// Failure reported by a [`QuadDevice`](super::QuadDevice) backend.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DeviceError {
    #[error("{stage} shader failed to compile: {log}")]
    Compile { stage: ShaderStage, log: String },

    #[error("program failed to link: {log}")]
    Link { log: String },

    #[error("surface unavailable ({reason}), action: {action:?}")]
    Surface {
        reason: String,
        action: SurfaceErrorAction,
    },

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown {kind} handle #{id}")]
    UnknownHandle { kind: &'static str, id: u32 },

    #[error("no frame in progress")]
    NoFrame,

    #[error("a frame is already in progress")]
    FrameInProgress,
}

impl DeviceError {
    /// Whether rendering cannot continue on this device.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DeviceError::Surface {
                action: SurfaceErrorAction::Fatal,
                ..
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_fatal_surface_errors_are_fatal() {
        let oom = DeviceError::Surface {
            reason: "out of memory".into(),
            action: SurfaceErrorAction::Fatal,
        };
        let lost = DeviceError::Surface {
            reason: "lost".into(),
            action: SurfaceErrorAction::Reconfigured,
        };
        assert!(oom.is_fatal());
        assert!(!lost.is_fatal());
        assert!(!DeviceError::Validation("bad uniform".into()).is_fatal());
        assert!(!DeviceError::NoFrame.is_fatal());
    }

    #[test]
    fn compile_error_names_the_stage() {
        let e = DeviceError::Compile {
            stage: ShaderStage::Fragment,
            log: "expected `;`".into(),
        };
        assert_eq!(e.to_string(), "fragment shader failed to compile: expected `;`");
    }
}
