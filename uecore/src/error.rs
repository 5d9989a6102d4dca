//! Error types for the core underlying-event library.

use thiserror::Error;

/// Result type for core operations
pub type UeResult<T> = Result<T, UeError>;

/// Errors raised by the core types
#[derive(Error, Debug, Clone, PartialEq)]
pub enum UeError {
    /// Source tag not present in the static source table
    #[error("unknown calorimeter source: {0}")]
    UnknownSource(String),

    /// Calorimeter id not recognised
    #[error("unknown calorimeter: {0}")]
    UnknownCalorimeter(String),

    /// Geometry table built with inconsistent dimensions
    #[error("geometry table for {calo} expects {expected} towers, got {actual}")]
    GeometrySizeMismatch { calo: String, expected: usize, actual: usize },

    /// Geometry table grid dimensions differ from the calorimeter's grid
    #[error("geometry table for {calo} has a {actual:?} (nphi, neta) grid, expected {expected:?}")]
    GeometryShapeMismatch { calo: String, expected: (usize, usize), actual: (usize, usize) },

    /// Geometry table stored under another calorimeter's key
    #[error("geometry table for {calo} is stored under {key}")]
    GeometryKeyMismatch { key: String, calo: String },

    /// Tower position outside the valid angular range
    #[error("geometry table for {calo} has tower {channel} with phi {phi} outside (-pi, pi]")]
    GeometryPhiOutOfRange { calo: String, channel: usize, phi: f64 },
}
