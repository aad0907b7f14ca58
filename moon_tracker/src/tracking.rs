//! Tracking controller module.
//!
//! Ties the lunar position calculation to the rotor client: a two-state
//! (Idle/Tracking) controller driven by an external periodic scheduler.
//! The controller owns no timer of its own; correctness holds for any
//! caller-chosen tick interval.

use crate::{
    moon::{HorizontalPosition, PositionCalculator},
    rotor::RotorClient,
    TrackerResult,
};
use chrono::{DateTime, Utc};

/// Tracking state. Idle sends nothing; Tracking transmits the computed
/// Moon position on every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackingState {
    Idle,
    Tracking,
}

/// Source of target positions for the controller.
pub trait PositionSource {
    /// Returns the target's horizontal position at `timestamp`.
    fn position_at(&self, timestamp: DateTime<Utc>) -> TrackerResult<HorizontalPosition>;
}

impl PositionSource for PositionCalculator {
    fn position_at(&self, timestamp: DateTime<Utc>) -> TrackerResult<HorizontalPosition> {
        self.moon_position(timestamp)
    }
}

/// Safe position the rotor is sent to when not tracking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParkPosition {
    pub azimuth: f64,
    pub elevation: f64,
}

impl ParkPosition {
    /// Builds a park position from configured values, clamping azimuth into
    /// [0, 360] and elevation into [0, max_elevation]. Out-of-range values
    /// clamp to the bound; azimuth does not wrap modulo 360.
    pub fn clamped(azimuth: f64, elevation: f64, max_elevation: f64) -> Self {
        Self {
            azimuth: azimuth.clamp(0.0, 360.0),
            elevation: elevation.clamp(0.0, max_elevation.max(0.0)),
        }
    }
}

/// Two-state tracking controller.
///
/// All calls are expected on one logical sequence; the controller provides
/// no internal locking. Rotor calls are blocking for the duration of the
/// connect/write/(read) sequence, so a tick blocks the calling thread for
/// up to the rotor client's per-call timeout.
pub struct TrackingController<S: PositionSource> {
    source: S,
    rotor: RotorClient,
    park: ParkPosition,
    state: TrackingState,
    last_position: Option<HorizontalPosition>,
    below_horizon: bool,
}

impl<S: PositionSource> TrackingController<S> {
    pub fn new(source: S, rotor: RotorClient, park: ParkPosition) -> Self {
        Self {
            source,
            rotor,
            park,
            state: TrackingState::Idle,
            last_position: None,
            below_horizon: false,
        }
    }

    pub fn state(&self) -> TrackingState {
        self.state
    }

    /// The most recently computed Moon position, if any tick has run.
    pub fn last_position(&self) -> Option<HorizontalPosition> {
        self.last_position
    }

    /// True when the most recently computed elevation was at or below the
    /// horizon. The position is still transmitted while tracking; this flag
    /// lets the display layer render the condition distinctly.
    ///
    /// Like `last_position`, this describes the last successful compute: a
    /// failed tick leaves both untouched.
    pub fn below_horizon(&self) -> bool {
        self.below_horizon
    }

    pub fn park_position(&self) -> ParkPosition {
        self.park
    }

    /// Flips Idle <-> Tracking and returns the new state.
    ///
    /// Entering Tracking performs one immediate tick so the rotor moves now
    /// rather than on the next scheduled tick. Entering Idle performs one
    /// read-only compute so the displayed position stays current.
    pub fn toggle_tracking(&mut self, now: DateTime<Utc>) -> TrackerResult<TrackingState> {
        self.state = match self.state {
            TrackingState::Idle => TrackingState::Tracking,
            TrackingState::Tracking => TrackingState::Idle,
        };
        log::info!("tracking state -> {:?}", self.state);
        self.tick(now)?;
        Ok(self.state)
    }

    /// One scheduler step: recompute the Moon position and, when Tracking,
    /// transmit it to the rotor.
    ///
    /// The position is recomputed and cached even when Idle so displays
    /// stay live. A failure on one tick leaves the state machine untouched;
    /// the next tick is the retry.
    pub fn tick(&mut self, now: DateTime<Utc>) -> TrackerResult<HorizontalPosition> {
        let position = self.source.position_at(now)?;
        self.last_position = Some(position);
        self.below_horizon = position.elevation <= 0.0;
        if self.below_horizon {
            log::debug!("moon below horizon (el {:.2})", position.elevation);
        }

        if self.state == TrackingState::Tracking {
            self.rotor.set_position(position.azimuth, position.elevation)?;
        }

        Ok(position)
    }

    /// Sends the rotor to the configured park position.
    ///
    /// Manual override: the tracking state is left untouched, so an active
    /// track re-commands the Moon position on the next tick.
    pub fn park(&self) -> TrackerResult<()> {
        log::info!(
            "parking rotor at az={:.2} el={:.2}",
            self.park.azimuth,
            self.park.elevation
        );
        self.rotor.set_position(self.park.azimuth, self.park.elevation)
    }

    /// Reads the rotor's self-reported position, for display only. Stored
    /// tracking fields are not touched.
    pub fn read_rotor(&self) -> TrackerResult<HorizontalPosition> {
        self.rotor.get_position()
    }
}
