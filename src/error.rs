//! Error types for the doorway counting pipeline.

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the doorway counting core.
#[derive(Debug, Error)]
pub enum Error {
    /// A frame was rejected because it contained a non-finite cell.
    #[error("invalid frame: {0}")]
    FrameInvalid(&'static str),

    /// A detection was requested before background calibration finished.
    ///
    /// The pipeline itself never constructs this variant: it simply holds
    /// frames back internally until calibration is ready. It exists so a
    /// host that pokes at calibration state directly has a typed way to
    /// report the same condition.
    #[error("background calibration is not yet complete")]
    CalibrationIncomplete,

    /// Configuration failed validation at construction time.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(&'static str),

    /// The frame source has not delivered a frame within the grace window.
    #[error("sensor stalled: no frame received for {0:?}")]
    SensorStalled(Duration),

    /// I/O failure loading or saving a persisted background file.
    #[error("background file I/O failed")]
    Io(#[from] std::io::Error),
}

/// Convenience alias for this crate's fallible operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
