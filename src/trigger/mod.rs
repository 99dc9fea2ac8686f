//! # Capture Trigger Module
//!
//! Converts a sequence of telemetry snapshots into a minimal sequence of
//! capture events.
//!
//! The trigger is edge-triggered, not level-triggered: entering AUTO fires
//! exactly one event, and sustained AUTO over many polls fires nothing
//! further until the mode leaves and re-enters AUTO. Debouncing raw
//! flight-mode transitions is the core correctness property of this module.
//!
//! The trigger is pure state: no I/O, no failure modes. Undecodable input
//! ([`FlightMode::Unknown`]) is treated as "mode unchanged" so it can never
//! fire a spurious capture.

use crate::telemetry::{FlightMode, TelemetrySnapshot};
use chrono::{DateTime, Utc};
use std::fmt;

/// Why a capture event was emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerReason {
    /// The flight mode transitioned into AUTO
    ModeEnterAuto,
}

impl fmt::Display for TriggerReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerReason::ModeEnterAuto => write!(f, "mode_enter_auto"),
        }
    }
}

/// A single capture decision.
///
/// Created by [`CaptureTrigger::observe`] when a transition condition is
/// satisfied; consumed exactly once by the session orchestrator and not
/// persisted beyond the run.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureEvent {
    /// Strictly increasing per session, starting at 1
    pub sequence_number: u64,
    /// The transition that fired this event
    pub trigger_reason: TriggerReason,
    /// When the trigger decided to capture
    pub requested_at: DateTime<Utc>,
}

/// Edge-triggered capture state machine.
///
/// # Examples
///
/// ```
/// use aeromap::telemetry::{FlightMode, TelemetrySnapshot};
/// use aeromap::trigger::CaptureTrigger;
///
/// let mut trigger = CaptureTrigger::new();
///
/// // No event while the mission has not entered AUTO.
/// assert!(trigger.observe(&TelemetrySnapshot::new(FlightMode::Manual)).is_none());
///
/// // Exactly one event on AUTO entry, none while AUTO is sustained.
/// assert!(trigger.observe(&TelemetrySnapshot::new(FlightMode::Auto)).is_some());
/// assert!(trigger.observe(&TelemetrySnapshot::new(FlightMode::Auto)).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct CaptureTrigger {
    /// Mode seen on the previous snapshot; `None` until the first one
    last_mode: Option<FlightMode>,
    /// True once the mission has been observed in AUTO at least once
    armed: bool,
    /// Sequence number the next event will carry
    next_sequence: u64,
}

impl Default for CaptureTrigger {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureTrigger {
    /// Creates a trigger in its start state.
    #[must_use]
    pub fn new() -> Self {
        Self {
            last_mode: None,
            armed: false,
            next_sequence: 1,
        }
    }

    /// Feeds one snapshot to the trigger.
    ///
    /// Emits a [`CaptureEvent`] exactly when the flight mode transitions
    /// into AUTO; `last_mode` is updated unconditionally on every decodable
    /// snapshot, so a return to AUTO after leaving it re-triggers exactly
    /// once per entry.
    pub fn observe(&mut self, snapshot: &TelemetrySnapshot) -> Option<CaptureEvent> {
        let mode = snapshot.flight_mode;

        // Fail-safe: an undecodable mode is treated as unchanged.
        if mode == FlightMode::Unknown {
            return None;
        }

        let entered_auto = mode.is_auto() && self.last_mode != Some(FlightMode::Auto);
        self.last_mode = Some(mode);

        if !entered_auto {
            return None;
        }

        self.armed = true;
        let event = CaptureEvent {
            sequence_number: self.next_sequence,
            trigger_reason: TriggerReason::ModeEnterAuto,
            requested_at: Utc::now(),
        };
        self.next_sequence += 1;
        Some(event)
    }

    /// True once the mission has entered AUTO at least once.
    #[must_use]
    pub fn armed(&self) -> bool {
        self.armed
    }

    /// The mode seen on the most recent decodable snapshot.
    #[must_use]
    pub fn last_mode(&self) -> Option<FlightMode> {
        self.last_mode
    }

    /// Number of capture events emitted so far this session.
    #[must_use]
    pub fn events_emitted(&self) -> u64 {
        self.next_sequence - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(mode: FlightMode) -> TelemetrySnapshot {
        TelemetrySnapshot::new(mode)
    }

    fn feed(trigger: &mut CaptureTrigger, modes: &[FlightMode]) -> Vec<Option<CaptureEvent>> {
        modes
            .iter()
            .map(|&mode| trigger.observe(&snapshot(mode)))
            .collect()
    }

    #[test]
    fn test_sustained_auto_emits_exactly_one_event() {
        // Constant AUTO over k polls must fire once, regardless of k.
        for k in 2..20 {
            let mut trigger = CaptureTrigger::new();
            let modes = vec![FlightMode::Auto; k];
            let events = feed(&mut trigger, &modes);
            let fired = events.iter().filter(|e| e.is_some()).count();
            assert_eq!(fired, 1, "expected one event for k={}", k);
            assert_eq!(trigger.events_emitted(), 1);
        }
    }

    #[test]
    fn test_reentry_emits_two_events_with_increasing_sequence() {
        let mut trigger = CaptureTrigger::new();
        let events = feed(
            &mut trigger,
            &[
                FlightMode::Auto,
                FlightMode::Manual,
                FlightMode::Auto,
            ],
        );

        let fired: Vec<_> = events.into_iter().flatten().collect();
        assert_eq!(fired.len(), 2);
        assert_eq!(fired[0].sequence_number, 1);
        assert_eq!(fired[1].sequence_number, 2);
        assert!(fired[0].sequence_number < fired[1].sequence_number);
    }

    #[test]
    fn test_mission_that_never_enters_auto_emits_nothing() {
        let mut trigger = CaptureTrigger::new();
        let events = feed(
            &mut trigger,
            &[
                FlightMode::Manual,
                FlightMode::Other(5),
                FlightMode::Manual,
                FlightMode::Other(6),
            ],
        );
        assert!(events.iter().all(Option::is_none));
        assert!(!trigger.armed());
        assert_eq!(trigger.events_emitted(), 0);
    }

    #[test]
    fn test_concrete_scenario_events_at_positions_three_and_seven() {
        // MANUAL, MANUAL, AUTO, AUTO, AUTO, MANUAL, AUTO
        // -> events at positions 3 and 7 (1-indexed), sequence numbers 1 and 2.
        let mut trigger = CaptureTrigger::new();
        let events = feed(
            &mut trigger,
            &[
                FlightMode::Manual,
                FlightMode::Manual,
                FlightMode::Auto,
                FlightMode::Auto,
                FlightMode::Auto,
                FlightMode::Manual,
                FlightMode::Auto,
            ],
        );

        for (index, event) in events.iter().enumerate() {
            match index + 1 {
                3 => assert_eq!(event.as_ref().unwrap().sequence_number, 1),
                7 => assert_eq!(event.as_ref().unwrap().sequence_number, 2),
                _ => assert!(event.is_none(), "unexpected event at position {}", index + 1),
            }
        }
    }

    #[test]
    fn test_first_snapshot_in_auto_triggers() {
        // A watcher connected mid-mission starts with last_mode = None;
        // the first AUTO snapshot is still an entry.
        let mut trigger = CaptureTrigger::new();
        assert!(trigger.observe(&snapshot(FlightMode::Auto)).is_some());
    }

    #[test]
    fn test_unknown_mode_is_treated_as_unchanged() {
        let mut trigger = CaptureTrigger::new();
        assert!(trigger.observe(&snapshot(FlightMode::Auto)).is_some());

        // Undecodable input must neither trigger nor count as leaving AUTO.
        assert!(trigger.observe(&snapshot(FlightMode::Unknown)).is_none());
        assert_eq!(trigger.last_mode(), Some(FlightMode::Auto));
        assert!(trigger.observe(&snapshot(FlightMode::Auto)).is_none());
    }

    #[test]
    fn test_unknown_before_first_auto_does_not_trigger() {
        let mut trigger = CaptureTrigger::new();
        assert!(trigger.observe(&snapshot(FlightMode::Unknown)).is_none());
        assert_eq!(trigger.last_mode(), None);
    }

    #[test]
    fn test_other_mode_counts_as_leaving_auto() {
        let mut trigger = CaptureTrigger::new();
        assert!(trigger.observe(&snapshot(FlightMode::Auto)).is_some());
        assert!(trigger.observe(&snapshot(FlightMode::Other(4))).is_none());
        assert!(trigger.observe(&snapshot(FlightMode::Auto)).is_some());
        assert_eq!(trigger.events_emitted(), 2);
    }

    #[test]
    fn test_armed_flag_latches() {
        let mut trigger = CaptureTrigger::new();
        assert!(!trigger.armed());
        trigger.observe(&snapshot(FlightMode::Auto));
        assert!(trigger.armed());
        trigger.observe(&snapshot(FlightMode::Manual));
        assert!(trigger.armed(), "armed latches once AUTO has been seen");
    }

    #[test]
    fn test_trigger_reason_display() {
        assert_eq!(TriggerReason::ModeEnterAuto.to_string(), "mode_enter_auto");
    }
}
