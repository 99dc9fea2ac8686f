//! # Telemetry Watcher
//!
//! Maintains a live or simulated link to the flight controller and provides
//! the latest flight mode on demand.
//!
//! A dedicated reader thread owns the blocking MAVLink receive loop and
//! forwards decoded snapshots over a channel, so [`TelemetryWatcher::poll`]
//! never blocks the session loop. The watcher does not reconnect on its own;
//! reconnection policy belongs to the session orchestrator.

use crate::error::{AeromapError, Result};
use crate::telemetry::snapshot::{FlightMode, Position, TelemetrySnapshot};
use mavlink::common::MavMessage;
use mavlink::{MavConnection, Message};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

/// Serial baud rates accepted for the hardware link
const SUPPORTED_BAUD_RATES: &[u32] = &[
    9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

/// How a flight-controller link is reached.
///
/// Selected via configuration, never guessed at runtime: a network endpoint
/// for SITL simulation, or a serial device plus baud rate for hardware.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionDescriptor {
    /// TCP endpoint of a SITL simulator (e.g. `tcp:127.0.0.1:5762`)
    Tcp {
        /// Host name or address
        host: String,
        /// TCP port
        port: u16,
    },
    /// Serial device of a hardware flight controller
    /// (e.g. `serial:/dev/ttyAMA0:57600`)
    Serial {
        /// Device path
        path: String,
        /// Baud rate
        baud: u32,
    },
}

impl ConnectionDescriptor {
    /// Parses a descriptor string from configuration.
    ///
    /// Accepted forms:
    /// - `tcp:HOST:PORT`
    /// - `serial:PATH:BAUD`
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Descriptor`] for an unknown scheme, a
    /// malformed port, or an unsupported baud rate.
    ///
    /// # Examples
    ///
    /// ```
    /// use aeromap::telemetry::ConnectionDescriptor;
    ///
    /// let descriptor = ConnectionDescriptor::parse("tcp:127.0.0.1:5762").unwrap();
    /// assert_eq!(
    ///     descriptor,
    ///     ConnectionDescriptor::Tcp { host: "127.0.0.1".to_string(), port: 5762 }
    /// );
    /// ```
    pub fn parse(descriptor: &str) -> Result<Self> {
        let (scheme, rest) = descriptor
            .split_once(':')
            .ok_or_else(|| AeromapError::Descriptor(descriptor.to_string()))?;

        match scheme {
            "tcp" => {
                let (host, port) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| AeromapError::Descriptor(descriptor.to_string()))?;
                let port: u16 = port.parse().map_err(|_| {
                    AeromapError::Descriptor(format!("invalid port in '{}'", descriptor))
                })?;
                if host.is_empty() {
                    return Err(AeromapError::Descriptor(descriptor.to_string()));
                }
                Ok(ConnectionDescriptor::Tcp {
                    host: host.to_string(),
                    port,
                })
            }
            "serial" => {
                let (path, baud) = rest
                    .rsplit_once(':')
                    .ok_or_else(|| AeromapError::Descriptor(descriptor.to_string()))?;
                let baud: u32 = baud.parse().map_err(|_| {
                    AeromapError::Descriptor(format!("invalid baud rate in '{}'", descriptor))
                })?;
                if path.is_empty() {
                    return Err(AeromapError::Descriptor(descriptor.to_string()));
                }
                if !SUPPORTED_BAUD_RATES.contains(&baud) {
                    return Err(AeromapError::Descriptor(format!(
                        "unsupported baud rate {} (supported: {:?})",
                        baud, SUPPORTED_BAUD_RATES
                    )));
                }
                Ok(ConnectionDescriptor::Serial {
                    path: path.to_string(),
                    baud,
                })
            }
            _ => Err(AeromapError::Descriptor(format!(
                "unknown scheme in '{}' (expected 'tcp' or 'serial')",
                descriptor
            ))),
        }
    }

    /// Renders the `mavlink` crate connection address for this descriptor.
    #[must_use]
    pub fn address(&self) -> String {
        match self {
            ConnectionDescriptor::Tcp { host, port } => format!("tcpout:{}:{}", host, port),
            ConnectionDescriptor::Serial { path, baud } => format!("serial:{}:{}", path, baud),
        }
    }
}

impl std::fmt::Display for ConnectionDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConnectionDescriptor::Tcp { host, port } => write!(f, "tcp:{}:{}", host, port),
            ConnectionDescriptor::Serial { path, baud } => write!(f, "serial:{}:{}", path, baud),
        }
    }
}

/// Source of telemetry snapshots for the session loop.
///
/// The seam between the session orchestrator and the live MAVLink link;
/// scripted implementations stand in for the link under test.
#[cfg_attr(test, mockall::automock)]
pub trait TelemetrySource: Send {
    /// Non-blocking read of the most recent telemetry state.
    ///
    /// Returns the last known snapshot if nothing new has arrived since the
    /// previous poll.
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::LinkLost`] once the link has dropped.
    fn poll(&mut self) -> Result<TelemetrySnapshot>;
}

/// Watches a flight-controller link and holds its latest telemetry state.
pub struct TelemetryWatcher {
    descriptor: ConnectionDescriptor,
    rx: Receiver<TelemetrySnapshot>,
    last: TelemetrySnapshot,
}

impl std::fmt::Debug for TelemetryWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryWatcher")
            .field("descriptor", &self.descriptor)
            .field("last", &self.last)
            .finish_non_exhaustive()
    }
}

impl TelemetryWatcher {
    /// Opens the link and blocks until the initial heartbeat is observed.
    ///
    /// Spawns the reader thread that owns the blocking MAVLink receive loop
    /// for the lifetime of the connection.
    ///
    /// # Arguments
    ///
    /// * `descriptor` - Where to reach the flight controller
    /// * `heartbeat_timeout` - Bounded wait for the first heartbeat
    ///
    /// # Errors
    ///
    /// Returns [`AeromapError::Io`] if the connection cannot be opened and
    /// [`AeromapError::LinkTimeout`] if no heartbeat arrives within the
    /// window.
    pub fn connect(
        descriptor: &ConnectionDescriptor,
        heartbeat_timeout: Duration,
    ) -> Result<Self> {
        let address = descriptor.address();
        tracing::info!("Connecting to flight controller at {}", descriptor);

        let connection = mavlink::connect::<MavMessage>(&address)?;

        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name("mavlink-reader".to_string())
            .spawn(move || reader_loop(connection, tx))?;

        tracing::info!("Waiting for heartbeat (up to {:?})...", heartbeat_timeout);
        let first = rx
            .recv_timeout(heartbeat_timeout)
            .map_err(|_| AeromapError::LinkTimeout(heartbeat_timeout))?;
        tracing::info!("Heartbeat received, flight mode {}", first.flight_mode);

        Ok(Self {
            descriptor: descriptor.clone(),
            rx,
            last: first,
        })
    }

    /// The descriptor this watcher was connected with.
    #[must_use]
    pub fn descriptor(&self) -> &ConnectionDescriptor {
        &self.descriptor
    }
}

impl TelemetrySource for TelemetryWatcher {
    fn poll(&mut self) -> Result<TelemetrySnapshot> {
        // Drain everything queued since the previous poll and keep the
        // newest snapshot; stale intermediate states are superseded.
        loop {
            match self.rx.try_recv() {
                Ok(snapshot) => self.last = snapshot,
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => return Err(AeromapError::LinkLost),
            }
        }
        Ok(self.last.clone())
    }
}

/// Blocking receive loop run on the reader thread.
///
/// Decodes HEARTBEAT into snapshots and folds the last seen
/// GLOBAL_POSITION_INT into each of them. Exits (dropping the sender, which
/// the watcher observes as link loss) when the transport reports an I/O
/// error.
fn reader_loop(
    connection: Box<dyn MavConnection<MavMessage> + Sync + Send>,
    tx: Sender<TelemetrySnapshot>,
) {
    let mut last_position: Option<Position> = None;

    loop {
        match connection.recv() {
            Ok((_header, message)) => match message {
                MavMessage::HEARTBEAT(data) => {
                    let mode = FlightMode::from_heartbeat(data.base_mode, data.custom_mode);
                    let mut snapshot = TelemetrySnapshot::new(mode);
                    if let Some(position) = last_position {
                        snapshot = snapshot.with_position(position);
                    }
                    if tx.send(snapshot).is_err() {
                        // Watcher dropped; nothing left to feed.
                        return;
                    }
                }
                MavMessage::GLOBAL_POSITION_INT(data) => {
                    last_position = Some(Position::from_global_position_int(
                        data.lat,
                        data.lon,
                        data.relative_alt,
                    ));
                }
                other => {
                    tracing::trace!("Ignoring MAVLink message id {}", other.message_id());
                }
            },
            Err(mavlink::error::MessageReadError::Io(err)) => {
                tracing::warn!("MAVLink link I/O error: {}", err);
                return;
            }
            Err(err) => {
                // Undecodable frame: skip it, the link itself is still up.
                tracing::debug!("Skipping malformed MAVLink frame: {}", err);
            }
        }
    }
}
