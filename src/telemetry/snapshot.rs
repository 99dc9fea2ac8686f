//! # Telemetry Snapshots
//!
//! Immutable views of the flight-controller state at one point in time.
//!
//! A snapshot is produced for every decoded HEARTBEAT and superseded by the
//! next one; callers never mutate a snapshot after reading it.

use chrono::{DateTime, Utc};
use mavlink::common::MavModeFlag;
use std::fmt;

/// Flight mode reported by the flight controller.
///
/// Derived from the HEARTBEAT `base_mode` flags so the mapping is
/// dialect-independent: any autopilot that sets `MAV_MODE_FLAG_AUTO_ENABLED`
/// is considered to be flying its mission, regardless of how the dialect
/// numbers its custom modes.
///
/// Only the transition *into* [`FlightMode::Auto`] is semantically meaningful
/// to the capture trigger; all other modes are passed through verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlightMode {
    /// Manual stick input enabled, autonomous navigation disabled
    Manual,
    /// Autonomous mission execution (mission running or resumed)
    Auto,
    /// Any other mode; carries the autopilot-specific custom mode verbatim
    Other(u32),
    /// Mode could not be decoded from the message. The capture trigger
    /// treats this as "mode unchanged" so malformed input never fires the
    /// shutter.
    Unknown,
}

impl FlightMode {
    /// Derives the flight mode from HEARTBEAT fields.
    ///
    /// # Arguments
    ///
    /// * `base_mode` - The HEARTBEAT base mode bitmask
    /// * `custom_mode` - The autopilot-specific custom mode word
    #[must_use]
    pub fn from_heartbeat(base_mode: MavModeFlag, custom_mode: u32) -> Self {
        if base_mode.contains(MavModeFlag::MAV_MODE_FLAG_AUTO_ENABLED) {
            FlightMode::Auto
        } else if base_mode.contains(MavModeFlag::MAV_MODE_FLAG_MANUAL_INPUT_ENABLED) {
            FlightMode::Manual
        } else {
            FlightMode::Other(custom_mode)
        }
    }

    /// Returns true if the controller is executing an autonomous mission.
    #[must_use]
    pub fn is_auto(&self) -> bool {
        matches!(self, FlightMode::Auto)
    }
}

impl fmt::Display for FlightMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FlightMode::Manual => write!(f, "MANUAL"),
            FlightMode::Auto => write!(f, "AUTO"),
            FlightMode::Other(mode) => write!(f, "OTHER({})", mode),
            FlightMode::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

/// Geographic position from GLOBAL_POSITION_INT, converted to degrees and
/// meters above home.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Latitude in degrees
    pub latitude: f64,
    /// Longitude in degrees
    pub longitude: f64,
    /// Altitude above home in meters
    pub relative_alt_m: f64,
}

impl Position {
    /// Converts the raw GLOBAL_POSITION_INT fields (degE7 / millimeters).
    #[must_use]
    pub fn from_global_position_int(lat: i32, lon: i32, relative_alt: i32) -> Self {
        Self {
            latitude: f64::from(lat) / 1e7,
            longitude: f64::from(lon) / 1e7,
            relative_alt_m: f64::from(relative_alt) / 1000.0,
        }
    }
}

/// One observation of the flight-controller state.
///
/// Immutable once read; superseded by the next snapshot. The position is
/// `None` until the first GLOBAL_POSITION_INT has been decoded on the link.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetrySnapshot {
    /// Flight mode at the time of the heartbeat
    pub flight_mode: FlightMode,
    /// Time the snapshot was produced (receiver clock)
    pub timestamp: DateTime<Utc>,
    /// Last known position, if any has been observed
    pub position: Option<Position>,
}

impl TelemetrySnapshot {
    /// Creates a snapshot for the given mode, stamped now, with no position.
    #[must_use]
    pub fn new(flight_mode: FlightMode) -> Self {
        Self {
            flight_mode,
            timestamp: Utc::now(),
            position: None,
        }
    }

    /// Attaches a position to the snapshot.
    #[must_use]
    pub fn with_position(mut self, position: Position) -> Self {
        self.position = Some(position);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auto_flag_maps_to_auto() {
        let base = MavModeFlag::MAV_MODE_FLAG_AUTO_ENABLED;
        assert_eq!(FlightMode::from_heartbeat(base, 3), FlightMode::Auto);
    }

    #[test]
    fn test_auto_flag_wins_over_manual_flag() {
        // Some autopilots keep manual input enabled while flying a mission;
        // mission execution takes precedence.
        let base = MavModeFlag::MAV_MODE_FLAG_AUTO_ENABLED
            | MavModeFlag::MAV_MODE_FLAG_MANUAL_INPUT_ENABLED;
        assert_eq!(FlightMode::from_heartbeat(base, 3), FlightMode::Auto);
    }

    #[test]
    fn test_manual_flag_maps_to_manual() {
        let base = MavModeFlag::MAV_MODE_FLAG_MANUAL_INPUT_ENABLED;
        assert_eq!(FlightMode::from_heartbeat(base, 0), FlightMode::Manual);
    }

    #[test]
    fn test_no_flags_passes_custom_mode_through() {
        let base = MavModeFlag::empty();
        assert_eq!(FlightMode::from_heartbeat(base, 4), FlightMode::Other(4));
    }

    #[test]
    fn test_is_auto() {
        assert!(FlightMode::Auto.is_auto());
        assert!(!FlightMode::Manual.is_auto());
        assert!(!FlightMode::Other(3).is_auto());
        assert!(!FlightMode::Unknown.is_auto());
    }

    #[test]
    fn test_display() {
        assert_eq!(FlightMode::Manual.to_string(), "MANUAL");
        assert_eq!(FlightMode::Auto.to_string(), "AUTO");
        assert_eq!(FlightMode::Other(17).to_string(), "OTHER(17)");
        assert_eq!(FlightMode::Unknown.to_string(), "UNKNOWN");
    }

    #[test]
    fn test_position_conversion() {
        let pos = Position::from_global_position_int(47_123_456_7, 8_765_432_1, 120_500);
        assert!((pos.latitude - 47.1234567).abs() < 1e-9);
        assert!((pos.longitude - 8.7654321).abs() < 1e-9);
        assert!((pos.relative_alt_m - 120.5).abs() < 1e-9);
    }

    #[test]
    fn test_snapshot_has_no_position_by_default() {
        let snapshot = TelemetrySnapshot::new(FlightMode::Manual);
        assert_eq!(snapshot.flight_mode, FlightMode::Manual);
        assert!(snapshot.position.is_none());
    }

    #[test]
    fn test_snapshot_with_position() {
        let pos = Position::from_global_position_int(0, 0, 1000);
        let snapshot = TelemetrySnapshot::new(FlightMode::Auto).with_position(pos);
        assert_eq!(snapshot.position, Some(pos));
    }
}
