//! Error types for the tracking core.
//!
//! Configuration problems are rejected when a component is built; engine
//! failures surface through the session status. Per-frame dropouts are not
//! errors and never appear here.

use thiserror::Error;

/// Invalid configuration, rejected at construction time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("smoothing window must hold at least one sample")]
    EmptyWindow,

    #[error("EMA factor must be in (0, 1], got {0}")]
    InvalidEmaFactor(f64),

    #[error("zone stability threshold must be at least 1")]
    ZeroStabilityThreshold,

    #[error("grid size must be between 1 and {max}, got {size}")]
    InvalidGridSize { size: usize, max: usize },

    #[error("container bounds must have positive size, got {width}x{height}")]
    InvalidBounds { width: f64, height: f64 },

    #[error("screen size must be positive, got {width}x{height}")]
    InvalidScreen { width: f64, height: f64 },

    #[error("dwell time must be positive, got {0} ms")]
    NonPositiveDwell(f64),

    #[error("grace period must be non-negative, got {0} ms")]
    NegativeGrace(f64),

    #[error("drift thresholds must satisfy 0 < misaligned < critical, got {misaligned} / {critical}")]
    InvalidDriftThresholds { misaligned: f64, critical: f64 },

    #[error("misalignment duration must be positive, got {0} ms")]
    NonPositiveMisalignDuration(f64),

    #[error("stillness epsilon must be positive, got {0}")]
    NonPositiveStillEpsilon(f64),

    #[error("anchor decay must be in [0, 1), got {0}")]
    InvalidAnchorDecay(f64),

    #[error("compensation factor must be finite and non-negative, got {0}")]
    InvalidCompensation(f64),

    #[error("head landmarks need two distinct indices, got {0} and {1}")]
    InvalidLandmarkPair(usize, usize),

    #[error("calibration needs at least one click per point")]
    ZeroClicksPerPoint,

    #[error("calibration needs at least one point")]
    NoCalibrationPoints,

    #[error("calibration point ({x}, {y}) lies outside 0..=100 percent")]
    CalibrationPointOutOfRange { x: f64, y: f64 },

    #[error("target {0} does not fit the current grid")]
    TargetOutsideGrid(String),

    #[error("target {0} is already mounted")]
    DuplicateTarget(String),
}

/// Failures reported by the external gaze engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("camera access denied")]
    PermissionDenied,

    #[error("gaze engine failed to initialise: {0}")]
    InitFailed(String),

    #[error("gaze engine is not running")]
    NotRunning,
}

impl EngineError {
    /// Short keyword for IPC and logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::InitFailed(_) => "init-failed",
            Self::NotRunning => "not-running",
        }
    }
}
