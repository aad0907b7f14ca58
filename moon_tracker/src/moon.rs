//! Lunar position module.
//!
//! This module computes the Moon's apparent topocentric position (azimuth
//! and elevation) for a fixed observer, using the JPL solar-system
//! ephemeris and Earth frame transformations provided by satkit.

use crate::{TrackerError, TrackerResult};
use chrono::{DateTime, Datelike, Timelike, Utc};
use satkit::{earth_orientation_params, frametransform, jplephem, ITRFCoord, Instant, SolarSystem};

/// Observer location on Earth.
#[derive(Debug, Clone, Copy)]
pub struct ObserverLocation {
    /// Latitude in degrees (-90 to 90)
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180)
    pub longitude: f64,
    /// Elevation in meters above sea level
    pub elevation_m: f64,
}

impl ObserverLocation {
    /// Creates an observer location from signed decimal degrees.
    ///
    /// # Errors
    /// Returns `InvalidLocation` if latitude, longitude, or elevation is
    /// outside its valid range (elevation has a -500 m sanity floor).
    pub fn new(latitude: f64, longitude: f64, elevation_m: f64) -> TrackerResult<Self> {
        if !latitude.is_finite() || !(-90.0..=90.0).contains(&latitude) {
            return Err(TrackerError::InvalidLocation(format!(
                "latitude {latitude} out of range [-90, 90]"
            )));
        }
        if !longitude.is_finite() || !(-180.0..=180.0).contains(&longitude) {
            return Err(TrackerError::InvalidLocation(format!(
                "longitude {longitude} out of range [-180, 180]"
            )));
        }
        if !elevation_m.is_finite() || elevation_m < -500.0 {
            return Err(TrackerError::InvalidLocation(format!(
                "elevation {elevation_m} m below -500 m sanity floor"
            )));
        }
        Ok(Self {
            latitude,
            longitude,
            elevation_m,
        })
    }

    /// Creates an observer location from coordinate strings.
    ///
    /// Accepts signed decimal degrees (`"-33.5"`) as well as the
    /// hemisphere-suffix form (`"47.468 N"`, `"9.732 E"`).
    pub fn from_strings(latitude: &str, longitude: &str, elevation_m: f64) -> TrackerResult<Self> {
        let lat = parse_coordinate(latitude, 'N', 'S')?;
        let lon = parse_coordinate(longitude, 'E', 'W')?;
        Self::new(lat, lon, elevation_m)
    }
}

/// Parses a coordinate string with an optional hemisphere suffix.
fn parse_coordinate(raw: &str, positive: char, negative: char) -> TrackerResult<f64> {
    let upper = raw.trim().to_ascii_uppercase();

    let (value_part, sign) = if let Some(stripped) = upper.strip_suffix(positive) {
        (stripped.trim_end(), 1.0)
    } else if let Some(stripped) = upper.strip_suffix(negative) {
        (stripped.trim_end(), -1.0)
    } else {
        (upper.as_str(), 1.0)
    };

    let value: f64 = value_part.parse().map_err(|_| {
        TrackerError::InvalidLocation(format!("cannot parse coordinate {raw:?}"))
    })?;

    if value_part != upper && value < 0.0 {
        return Err(TrackerError::InvalidLocation(format!(
            "coordinate {raw:?} combines a hemisphere letter with a signed value"
        )));
    }

    Ok(sign * value)
}

/// A position in the observer's horizontal coordinate frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HorizontalPosition {
    /// Azimuth in degrees, [0, 360), clockwise from true north
    pub azimuth: f64,
    /// Elevation in degrees, [-90, 90]; at or below 0 means below horizon
    pub elevation: f64,
}

/// Computes the Moon's apparent position for a fixed observer.
///
/// Construction probes the ephemeris once: missing JPL ephemeris files or
/// missing Earth-orientation data surface as `EphemerisUnavailable` and are
/// fatal, there is no degraded mode. After construction, `moon_position` is
/// a pure function of the timestamp.
pub struct PositionCalculator {
    location: ObserverLocation,
}

impl PositionCalculator {
    /// Builds a calculator bound to `location` and verifies the ephemeris
    /// is usable by computing one throwaway position for the current time.
    pub fn new(location: ObserverLocation) -> TrackerResult<Self> {
        let calculator = Self { location };
        calculator.moon_position(Utc::now())?;
        Ok(calculator)
    }

    /// The observer location this calculator is bound to.
    pub fn location(&self) -> ObserverLocation {
        self.location
    }

    /// Computes the Moon's apparent azimuth and elevation at `timestamp`,
    /// as seen from the configured observer location.
    ///
    /// The result includes lunar parallax and atmospheric refraction, and
    /// is rounded to two decimal places.
    pub fn moon_position(&self, timestamp: DateTime<Utc>) -> TrackerResult<HorizontalPosition> {
        let instant = to_instant(timestamp);

        // The frame transform panics rather than erroring when EOP data is
        // missing, so check availability up front.
        if earth_orientation_params::get(&instant).is_none() {
            return Err(TrackerError::EphemerisUnavailable(
                "Earth Orientation Parameters (EOP) data not available. Please run satkit::utils::update_datafiles() first.".to_string(),
            ));
        }

        // Geocentric Moon position in the GCRF frame (meters).
        let moon_gcrf = jplephem::geocentric_pos(SolarSystem::Moon, &instant).map_err(|e| {
            TrackerError::EphemerisUnavailable(format!("JPL ephemeris lookup failed: {e}"))
        })?;

        // Rotate into the Earth-fixed ITRF frame.
        let q_gcrf2itrf = frametransform::qgcrf2itrf(&instant);
        let moon_itrf = q_gcrf2itrf.to_rotation_matrix() * moon_gcrf;

        let observer = ITRFCoord::from_geodetic_deg(
            self.location.latitude,
            self.location.longitude,
            self.location.elevation_m,
        );

        // Observer -> Moon vector in ITRF. Subtracting the observer's own
        // Earth-fixed position is what makes the result topocentric: lunar
        // parallax (up to about a degree) falls out of the geometry.
        let rel_itrf = moon_itrf - observer.itrf;

        // Rotate the relative vector into the observer's ENU frame.
        let q_enu2itrf = observer.q_enu2itrf();
        let enu = q_enu2itrf.conjugate() * rel_itrf;

        let east = enu[0];
        let north = enu[1];
        let up = enu[2];

        let horizontal_range = (east * east + north * north).sqrt();

        // Elevation angle above the local horizontal plane.
        let elevation = up.atan2(horizontal_range).to_degrees();

        // Azimuth measured clockwise from true north.
        let azimuth = east.atan2(north).to_degrees();
        let azimuth = if azimuth < 0.0 {
            azimuth + 360.0
        } else {
            azimuth
        };

        // Geometric -> apparent elevation.
        let elevation = elevation + refraction_deg(elevation);

        // Rounding can push an azimuth of 359.996.. up to 360.00; wrap it
        // back so the [0, 360) contract holds.
        let mut azimuth = round2(azimuth);
        if azimuth >= 360.0 {
            azimuth -= 360.0;
        }
        let elevation = round2(elevation).clamp(-90.0, 90.0);

        log::debug!(
            "moon at {timestamp}: az={azimuth:.2} el={elevation:.2} (observer {:.4}/{:.4})",
            self.location.latitude,
            self.location.longitude
        );

        Ok(HorizontalPosition { azimuth, elevation })
    }
}

/// Converts a chrono UTC timestamp to a satkit Instant.
fn to_instant(timestamp: DateTime<Utc>) -> Instant {
    let naive = timestamp.naive_utc();
    Instant::from_datetime(
        naive.year(),
        naive.month() as i32,
        naive.day() as i32,
        naive.hour() as i32,
        naive.minute() as i32,
        naive.second() as f64 + naive.nanosecond() as f64 / 1e9,
    )
}

/// Atmospheric refraction at a standard atmosphere (Saemundsson's formula),
/// in degrees of elevation lift. Not applied well below the horizon, where
/// the formula diverges and pointing accuracy is moot anyway.
fn refraction_deg(elevation_deg: f64) -> f64 {
    if elevation_deg <= -1.0 {
        return 0.0;
    }
    let arg = (elevation_deg + 10.3 / (elevation_deg + 5.11)).to_radians();
    1.02 / arg.tan() / 60.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    /// Builds the Lauterach reference calculator, or skips the test when
    /// the satkit data files are not present on this machine.
    fn lauterach_calculator() -> Option<PositionCalculator> {
        let location = ObserverLocation::new(47.468, 9.732, 500.0).unwrap();
        match PositionCalculator::new(location) {
            Ok(calc) => Some(calc),
            Err(e) => {
                println!("skipping ephemeris-dependent test: {e}");
                None
            }
        }
    }

    #[test]
    fn parses_hemisphere_coordinates() {
        let loc = ObserverLocation::from_strings("47.468 N", "9.732 E", 500.0).unwrap();
        assert!((loc.latitude - 47.468).abs() < 1e-9);
        assert!((loc.longitude - 9.732).abs() < 1e-9);

        let loc = ObserverLocation::from_strings("33.9 s", "18.4 w", 0.0).unwrap();
        assert!((loc.latitude + 33.9).abs() < 1e-9);
        assert!((loc.longitude + 18.4).abs() < 1e-9);
    }

    #[test]
    fn parses_signed_decimal_coordinates() {
        let loc = ObserverLocation::from_strings("-47.468", "-9.732", 500.0).unwrap();
        assert!((loc.latitude + 47.468).abs() < 1e-9);
        assert!((loc.longitude + 9.732).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_coordinates() {
        let err = ObserverLocation::from_strings("forty-seven", "9.732 E", 500.0).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidLocation(_)));

        let err = ObserverLocation::from_strings("-47.468 N", "9.732 E", 500.0).unwrap_err();
        assert!(matches!(err, TrackerError::InvalidLocation(_)));
    }

    #[test]
    fn rejects_out_of_range_location() {
        assert!(matches!(
            ObserverLocation::new(91.0, 0.0, 0.0),
            Err(TrackerError::InvalidLocation(_))
        ));
        assert!(matches!(
            ObserverLocation::new(0.0, 181.0, 0.0),
            Err(TrackerError::InvalidLocation(_))
        ));
        assert!(matches!(
            ObserverLocation::new(0.0, 0.0, -600.0),
            Err(TrackerError::InvalidLocation(_))
        ));
    }

    #[test]
    fn refraction_lifts_near_horizon_only() {
        // About 0.48 degrees right at the horizon.
        let at_horizon = refraction_deg(0.0);
        assert!(at_horizon > 0.4 && at_horizon < 0.6, "got {at_horizon}");

        // Much smaller high in the sky.
        assert!(refraction_deg(45.0) < 0.02);

        // Not applied well below the horizon.
        assert_eq!(refraction_deg(-10.0), 0.0);
    }

    #[test]
    fn rounds_to_two_decimals() {
        assert_eq!(round2(169.44621), 169.45);
        assert_eq!(round2(-0.004), -0.0);
    }

    #[test]
    fn moon_position_is_deterministic_and_in_range() {
        let Some(calc) = lauterach_calculator() else {
            return;
        };

        let t = Utc.with_ymd_and_hms(2023, 7, 25, 16, 22, 0).unwrap();
        let a = calc.moon_position(t).unwrap();
        let b = calc.moon_position(t).unwrap();
        assert_eq!(a, b);

        assert!((0.0..360.0).contains(&a.azimuth), "az {}", a.azimuth);
        assert!((-90.0..=90.0).contains(&a.elevation), "el {}", a.elevation);
        // Two-decimal rounding policy.
        assert_eq!(a.azimuth, round2(a.azimuth));
        assert_eq!(a.elevation, round2(a.elevation));
    }

    #[test]
    fn moon_position_matches_reference_ephemeris() {
        let Some(calc) = lauterach_calculator() else {
            return;
        };

        // Reference: Moon from Lauterach (47.468 N, 9.732 E, 500 m) at
        // 2023-07-25T16:22:00Z, apparent position with refraction.
        let t = Utc.with_ymd_and_hms(2023, 7, 25, 16, 22, 0).unwrap();
        let pos = calc.moon_position(t).unwrap();

        assert!((pos.azimuth - 169.45).abs() < 0.1, "az {}", pos.azimuth);
        assert!((pos.elevation - 29.75).abs() < 0.1, "el {}", pos.elevation);
    }
}
