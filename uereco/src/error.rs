//! Run-level error types.
//!
//! Any `Err` stops the run. Per-event problems are reported through
//! [`crate::reco::status::EventStatus`] instead.

use thiserror::Error;
use uecore::error::UeError;

pub type RecoResult<T> = Result<T, RecoError>;

#[derive(Error, Debug)]
pub enum RecoError {
    /// Reco module configured without inputs
    #[error("no input nodes are set for {0}")]
    NoInputs(String),

    /// Configuration value out of range
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Tower collection named by an input is absent from the event
    #[error("tower node {0} is missing")]
    MissingTowerNode(String),

    /// Geometry table needed by an input is absent from the run
    #[error("geometry node {0} is missing")]
    MissingGeometry(String),

    #[error(transparent)]
    Core(#[from] UeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
