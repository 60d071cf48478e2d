// THEORY:
// Every failure the motion pipeline can surface is one variant of `MotionError`.
// The variants mirror where a failure originates: setup (configuration), the
// buffers crossing the diff-engine boundary (dimensions), the frame source
// (acquisition) and the engine itself. `is_fatal` is the single place the
// pipeline loop consults to decide whether a failure ends the session or only
// the current tick.

use crate::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum MotionError {
    /// The session cannot start with this configuration.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Two buffers that must share a geometry do not.
    #[error("dimension mismatch: expected {}x{}, got {}x{}", expected.0, expected.1, actual.0, actual.1)]
    DimensionMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },

    /// A byte buffer whose length does not describe `width * height` RGBA pixels.
    #[error("malformed pixel buffer: {length} bytes cannot hold {width}x{height} RGBA pixels")]
    MalformedBuffer { length: usize, width: u32, height: u32 },

    /// The frame source could not be opened or stopped delivering frames.
    #[error("frame acquisition unavailable: {0}")]
    AcquisitionUnavailable(String),

    /// A single frame from an open source could not be decoded.
    #[error("frame decode failed: {0}")]
    FrameDecode(String),

    /// A diff request was submitted while another one is still queued.
    #[error("diff engine is busy with an outstanding request")]
    EngineBusy,

    /// The engine task has shut down.
    #[error("diff engine is no longer running")]
    EngineUnavailable,

    /// The engine accepted a request but failed to produce its result.
    #[error("diff engine failed: {0}")]
    Engine(String),

    /// A renderer could not consume a motion frame.
    #[error("render failed: {0}")]
    Render(String),

    /// `commit_previous` or `abandon_request` without an outstanding request.
    #[error("no diff request is outstanding")]
    NoOutstandingRequest,

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl MotionError {
    /// Fatal errors stop the pipeline; everything else only drops the current tick.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MotionError::Configuration(_)
                | MotionError::AcquisitionUnavailable(_)
                | MotionError::EngineUnavailable
                | MotionError::Config(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, MotionError>;
