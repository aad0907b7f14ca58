//! Moon Tracker
//!
//! A crate for pointing a rotctld-compatible antenna rotor at the Moon.

use thiserror::Error;

pub mod moon;
pub mod rotor;
pub mod tracking;

pub use moon::{HorizontalPosition, ObserverLocation, PositionCalculator};
pub use rotor::{RotorClient, RotorEndpoint};
pub use tracking::{ParkPosition, PositionSource, TrackingController, TrackingState};

/// Result type alias for moon tracker operations.
pub type TrackerResult<T> = Result<T, TrackerError>;

/// Error types for moon tracker operations.
#[derive(Error, Debug, Clone)]
pub enum TrackerError {
    #[error("InvalidLocation: {0}")]
    InvalidLocation(String),
    #[error("EphemerisUnavailable: {0}")]
    EphemerisUnavailable(String),
    #[error("ConnectionError: {0}")]
    ConnectionError(String),
    #[error("ProtocolError: {0}")]
    ProtocolError(String),
    #[error("Timeout: {0}")]
    Timeout(String),
}
