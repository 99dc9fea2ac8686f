//! # Capture Session Module
//!
//! The run loop that ties telemetry, trigger, and camera together for the
//! duration of one mission.
//!
//! This module handles:
//! - The fixed-interval poll loop (one telemetry poll per tick)
//! - Feeding snapshots to the capture trigger
//! - Synchronous capture + download when a capture event fires
//! - Best-effort capture: a failed photo never halts mission monitoring
//! - End-of-mission policy: stop signal, or link lost twice in a row

use crate::camera::{CameraDriver, CapturedImage};
use crate::error::Result;
use crate::telemetry::TelemetrySource;
use crate::trigger::{CaptureEvent, CaptureTrigger};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

/// Consecutive link losses that end the session.
///
/// A single loss is tolerated (the poll may race a reconnecting transport);
/// repeated loss is treated as end-of-mission rather than retried forever.
pub const MAX_CONSECUTIVE_LINK_LOSSES: u32 = 2;

/// Per-session settings, resolved from configuration.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Fixed tick interval of the poll loop
    pub poll_interval: Duration,
    /// Local capture directory images are downloaded into
    pub output_dir: PathBuf,
}

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// External stop signal (e.g. Ctrl+C)
    Stopped,
    /// Link lost on consecutive polls; treated as end-of-mission
    LinkLost,
}

/// What happened on one tick of the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No capture condition fired
    Idle,
    /// A capture event fired and the image was stored
    Captured,
    /// A capture event fired but capture or download failed; recovered
    CaptureFailed,
    /// Telemetry poll failed; carries the consecutive-loss count
    LinkLost(u32),
}

/// Outcome of a completed session.
#[derive(Debug)]
pub struct SessionSummary {
    /// Why the loop terminated
    pub end: SessionEnd,
    /// Total ticks completed
    pub ticks: u64,
    /// Every image stored this session, in capture order
    pub images: Vec<CapturedImage>,
}

/// Capture session orchestrator.
///
/// Owns the telemetry source, the trigger state, and the camera for one
/// mission run. Single logical thread of control: each tick performs one
/// telemetry poll and at most one capture + download pair before the next
/// tick begins, so nothing else ever touches the trigger state.
pub struct CaptureSession<T: TelemetrySource, C: CameraDriver> {
    telemetry: T,
    camera: C,
    trigger: CaptureTrigger,
    settings: SessionSettings,
    images: Vec<CapturedImage>,
    ticks: u64,
    consecutive_link_losses: u32,
}

impl<T: TelemetrySource, C: CameraDriver> CaptureSession<T, C> {
    /// Creates a session with the trigger in its start state.
    pub fn new(telemetry: T, camera: C, settings: SessionSettings) -> Self {
        Self {
            telemetry,
            camera,
            trigger: CaptureTrigger::new(),
            settings,
            images: Vec::new(),
            ticks: 0,
            consecutive_link_losses: 0,
        }
    }

    /// Ticks completed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Images stored so far, in capture order.
    #[must_use]
    pub fn images(&self) -> &[CapturedImage] {
        &self.images
    }

    /// Performs one tick: poll telemetry, feed the trigger, capture if a
    /// capture event fired.
    ///
    /// Capture failures are logged and absorbed here; only the telemetry
    /// outcome is reflected in the returned [`TickOutcome`] loss counter.
    pub async fn tick(&mut self) -> TickOutcome {
        self.ticks += 1;

        let snapshot = match self.telemetry.poll() {
            Ok(snapshot) => {
                self.consecutive_link_losses = 0;
                snapshot
            }
            Err(err) => {
                self.consecutive_link_losses += 1;
                warn!(
                    "Telemetry poll failed ({} consecutive): {}",
                    self.consecutive_link_losses, err
                );
                return TickOutcome::LinkLost(self.consecutive_link_losses);
            }
        };

        debug!("Tick {}: flight mode {}", self.ticks, snapshot.flight_mode);

        let Some(event) = self.trigger.observe(&snapshot) else {
            return TickOutcome::Idle;
        };

        info!(
            "Capture #{} triggered ({})",
            event.sequence_number, event.trigger_reason
        );

        // Best-effort: a missed photo must never halt mission monitoring.
        match self.capture_image(&event).await {
            Ok(image) => {
                info!(
                    "Capture #{} stored at {}",
                    event.sequence_number,
                    image.path.display()
                );
                self.images.push(image);
                TickOutcome::Captured
            }
            Err(err) => {
                warn!(
                    "Capture #{} failed ({}); mission monitoring continues",
                    event.sequence_number, err
                );
                TickOutcome::CaptureFailed
            }
        }
    }

    async fn capture_image(&mut self, event: &CaptureEvent) -> Result<CapturedImage> {
        let handle = self.camera.capture().await?;
        self.camera
            .download(&handle, &self.settings.output_dir, event.sequence_number)
            .await
    }

    /// Runs the poll loop until the stop signal fires or the link is lost
    /// twice in a row.
    ///
    /// The stop signal only prevents the next tick from starting; a capture
    /// or download already in flight runs to completion or timeout.
    pub async fn run(mut self, mut stop: watch::Receiver<bool>) -> SessionSummary {
        info!(
            "Capture session started (poll interval {:?}, capture dir {})",
            self.settings.poll_interval,
            self.settings.output_dir.display()
        );

        let mut ticker = interval(self.settings.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let end = loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let TickOutcome::LinkLost(losses) = self.tick().await {
                        if losses >= MAX_CONSECUTIVE_LINK_LOSSES {
                            error!(
                                "Link lost {} times in a row; treating as end of mission",
                                losses
                            );
                            break SessionEnd::LinkLost;
                        }
                    }
                }
                changed = stop.changed() => {
                    // A dropped sender counts as a stop request too.
                    if changed.is_err() || *stop.borrow() {
                        info!("Stop requested, ending session");
                        break SessionEnd::Stopped;
                    }
                }
            }
        };

        info!(
            "Capture session ended after {} ticks with {} images ({:?})",
            self.ticks,
            self.images.len(),
            end
        );

        SessionSummary {
            end,
            ticks: self.ticks,
            images: self.images,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CaptureHandle, SimulatedCamera};
    use crate::error::AeromapError;
    use crate::telemetry::watcher::MockTelemetrySource;
    use crate::telemetry::{FlightMode, TelemetrySnapshot};
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::path::Path;
    use std::sync::{Arc, Mutex};
    use tempfile::tempdir;

    /// Telemetry source scripted from a fixed list of poll results.
    fn scripted_telemetry(
        script: Vec<std::result::Result<FlightMode, ()>>,
    ) -> MockTelemetrySource {
        let queue = Arc::new(Mutex::new(VecDeque::from(script)));
        let mut source = MockTelemetrySource::new();
        source.expect_poll().returning(move || {
            match queue.lock().unwrap().pop_front() {
                Some(Ok(mode)) => Ok(TelemetrySnapshot::new(mode)),
                Some(Err(())) | None => Err(AeromapError::LinkLost),
            }
        });
        source
    }

    /// Camera that fails the shutter on selected capture attempts and
    /// otherwise behaves like the simulator.
    struct FlakyCamera {
        inner: SimulatedCamera,
        fail_on_attempts: Vec<u64>,
        attempts: u64,
    }

    impl FlakyCamera {
        fn new(fail_on_attempts: Vec<u64>) -> Self {
            Self {
                inner: SimulatedCamera::new(None),
                fail_on_attempts,
                attempts: 0,
            }
        }
    }

    #[async_trait]
    impl CameraDriver for FlakyCamera {
        async fn capture(&mut self) -> Result<CaptureHandle> {
            self.attempts += 1;
            if self.fail_on_attempts.contains(&self.attempts) {
                return Err(AeromapError::CaptureTimeout(
                    "injected shutter timeout".to_string(),
                ));
            }
            self.inner.capture().await
        }

        async fn download(
            &mut self,
            handle: &CaptureHandle,
            output_dir: &Path,
            sequence_number: u64,
        ) -> Result<CapturedImage> {
            self.inner.download(handle, output_dir, sequence_number).await
        }
    }

    fn settings(dir: &Path) -> SessionSettings {
        SessionSettings {
            poll_interval: Duration::from_millis(1),
            output_dir: dir.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn test_mission_scenario_captures_on_each_auto_entry() {
        // MANUAL, MANUAL, AUTO, AUTO, AUTO, MANUAL, AUTO -> captures on
        // ticks 3 and 7 with sequence numbers 1 and 2.
        let dir = tempdir().unwrap();
        let telemetry = scripted_telemetry(vec![
            Ok(FlightMode::Manual),
            Ok(FlightMode::Manual),
            Ok(FlightMode::Auto),
            Ok(FlightMode::Auto),
            Ok(FlightMode::Auto),
            Ok(FlightMode::Manual),
            Ok(FlightMode::Auto),
        ]);
        let mut session =
            CaptureSession::new(telemetry, SimulatedCamera::new(None), settings(dir.path()));

        let mut outcomes = Vec::new();
        for _ in 0..7 {
            outcomes.push(session.tick().await);
        }

        assert_eq!(
            outcomes,
            vec![
                TickOutcome::Idle,
                TickOutcome::Idle,
                TickOutcome::Captured,
                TickOutcome::Idle,
                TickOutcome::Idle,
                TickOutcome::Idle,
                TickOutcome::Captured,
            ]
        );
        let sequences: Vec<u64> = session.images().iter().map(|i| i.sequence_number).collect();
        assert_eq!(sequences, vec![1, 2]);
    }

    #[tokio::test]
    async fn test_capture_failure_does_not_end_the_run() {
        // Capture fires on tick 5 and times out; all 10 ticks still complete.
        let dir = tempdir().unwrap();
        let mut script = vec![Ok(FlightMode::Manual); 4];
        script.push(Ok(FlightMode::Auto));
        script.extend(vec![Ok(FlightMode::Auto); 5]);
        let telemetry = scripted_telemetry(script);
        let camera = FlakyCamera::new(vec![1]);
        let mut session = CaptureSession::new(telemetry, camera, settings(dir.path()));

        let mut outcomes = Vec::new();
        for _ in 0..10 {
            outcomes.push(session.tick().await);
        }

        assert_eq!(session.ticks(), 10);
        assert_eq!(outcomes[4], TickOutcome::CaptureFailed);
        assert!(outcomes[5..].iter().all(|o| *o == TickOutcome::Idle));
        assert!(session.images().is_empty());
    }

    #[tokio::test]
    async fn test_failed_capture_consumes_the_event() {
        // The event for an AUTO entry is consumed even when capture fails;
        // sustained AUTO afterwards must not retry it.
        let dir = tempdir().unwrap();
        let telemetry = scripted_telemetry(vec![
            Ok(FlightMode::Auto),
            Ok(FlightMode::Auto),
            Ok(FlightMode::Manual),
            Ok(FlightMode::Auto),
        ]);
        let camera = FlakyCamera::new(vec![1]);
        let mut session = CaptureSession::new(telemetry, camera, settings(dir.path()));

        assert_eq!(session.tick().await, TickOutcome::CaptureFailed);
        assert_eq!(session.tick().await, TickOutcome::Idle);
        assert_eq!(session.tick().await, TickOutcome::Idle);
        // The next AUTO entry gets the next sequence number.
        assert_eq!(session.tick().await, TickOutcome::Captured);
        assert_eq!(session.images()[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn test_single_link_loss_is_tolerated() {
        let dir = tempdir().unwrap();
        let telemetry = scripted_telemetry(vec![
            Ok(FlightMode::Manual),
            Err(()),
            Ok(FlightMode::Manual),
            Err(()),
            Ok(FlightMode::Manual),
        ]);
        let mut session =
            CaptureSession::new(telemetry, SimulatedCamera::new(None), settings(dir.path()));

        assert_eq!(session.tick().await, TickOutcome::Idle);
        assert_eq!(session.tick().await, TickOutcome::LinkLost(1));
        // A successful poll resets the loss counter.
        assert_eq!(session.tick().await, TickOutcome::Idle);
        assert_eq!(session.tick().await, TickOutcome::LinkLost(1));
        assert_eq!(session.tick().await, TickOutcome::Idle);
    }

    #[tokio::test]
    async fn test_run_ends_after_two_consecutive_link_losses() {
        let dir = tempdir().unwrap();
        let telemetry = scripted_telemetry(vec![Ok(FlightMode::Manual), Err(()), Err(())]);
        let session =
            CaptureSession::new(telemetry, SimulatedCamera::new(None), settings(dir.path()));

        let (_stop_tx, stop_rx) = watch::channel(false);
        let summary = session.run(stop_rx).await;

        assert_eq!(summary.end, SessionEnd::LinkLost);
        assert_eq!(summary.ticks, 3);
        assert!(summary.images.is_empty());
    }

    #[tokio::test]
    async fn test_run_stops_on_signal() {
        let dir = tempdir().unwrap();
        let polls = Arc::new(Mutex::new(0u64));
        let mut telemetry = MockTelemetrySource::new();
        let poll_counter = Arc::clone(&polls);
        telemetry.expect_poll().returning(move || {
            *poll_counter.lock().unwrap() += 1;
            Ok(TelemetrySnapshot::new(FlightMode::Manual))
        });
        let session =
            CaptureSession::new(telemetry, SimulatedCamera::new(None), settings(dir.path()));

        let (stop_tx, stop_rx) = watch::channel(false);
        let run = tokio::spawn(session.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(20)).await;
        stop_tx.send(true).unwrap();

        let summary = run.await.unwrap();
        assert_eq!(summary.end, SessionEnd::Stopped);
        assert!(summary.ticks >= 1);
    }

    #[tokio::test]
    async fn test_run_treats_dropped_stop_sender_as_stop() {
        let dir = tempdir().unwrap();
        let mut telemetry = MockTelemetrySource::new();
        telemetry
            .expect_poll()
            .returning(|| Ok(TelemetrySnapshot::new(FlightMode::Manual)));
        let session =
            CaptureSession::new(telemetry, SimulatedCamera::new(None), settings(dir.path()));

        let (stop_tx, stop_rx) = watch::channel(false);
        drop(stop_tx);
        let summary = session.run(stop_rx).await;
        assert_eq!(summary.end, SessionEnd::Stopped);
    }
}
