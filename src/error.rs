use anyhow::Error;

pub type RenderResult<T> = Result<T, RenderError>;

/// Failure categories for a single-shot render. None of these are retried
/// inside the crate; the caller re-runs from scratch if it wants another
/// attempt.
#[derive(thiserror::Error, Debug)]
pub enum RenderError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("surface load error: {0}")]
    SurfaceLoad(String),

    #[error("phase not found: {0}")]
    PhaseNotFound(String),

    #[error("capture error: {0}")]
    Capture(String),

    #[error("encode error: {0}")]
    Encode(String),

    #[error(transparent)]
    Other(#[from] Error),
}

impl RenderError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn surface_load(msg: impl Into<String>) -> Self {
        Self::SurfaceLoad(msg.into())
    }

    pub fn phase_not_found(msg: impl Into<String>) -> Self {
        Self::PhaseNotFound(msg.into())
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::Capture(msg.into())
    }

    pub fn encode(msg: impl Into<String>) -> Self {
        Self::Encode(msg.into())
    }

    /// Stable process exit code per category, so callers can tell a bad
    /// timeline from a dead browser without parsing stderr.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Configuration(_) => 2,
            Self::SurfaceLoad(_) => 3,
            Self::PhaseNotFound(_) => 4,
            Self::Capture(_) => 5,
            Self::Encode(_) => 6,
            Self::Other(_) => 1,
        }
    }
}

/// Walk an error chain for the first `RenderError` and map it to an exit
/// code. Errors that never passed through the render taxonomy exit with 1.
pub fn exit_code(error: &Error) -> u8 {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RenderError>())
        .map(RenderError::exit_code)
        .unwrap_or(1)
}
