//! Telemetry sink: receive I/Q datagrams and append their payloads to a file.

use std::io::{ErrorKind, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use netsdr_codec::IqPacket;
use netsdr_transport::{TelemetrySocket, TransportError, MAX_DATAGRAM_SIZE};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::config::IdlePolicy;
use crate::error::{Result, SessionError};

/// Writable receiver flag, owned by the session.
#[derive(Debug, Clone, Default)]
pub(crate) struct ReceiverFlag(Arc<AtomicBool>);

impl ReceiverFlag {
    pub(crate) fn set(&self, on: bool) {
        self.0.store(on, Ordering::Release);
    }

    pub(crate) fn get(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    pub(crate) fn watch(&self) -> ReceiverWatch {
        ReceiverWatch(Arc::clone(&self.0))
    }
}

/// Read-only view of whether the receiver is streaming.
#[derive(Debug, Clone)]
pub struct ReceiverWatch(Arc<AtomicBool>);

impl ReceiverWatch {
    pub fn is_on(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Counters reported when the sink exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    /// Datagrams whose payload reached the output.
    pub packets: u64,
    /// Payload bytes written.
    pub bytes_written: u64,
    /// Datagrams shorter than the packet header.
    pub short_packets: u64,
    /// Datagrams from an address other than the device.
    pub foreign_packets: u64,
    /// Datagrams discarded because the receiver was off.
    pub idle_dropped: u64,
}

pub(crate) struct TelemetrySink<W> {
    socket: TelemetrySocket,
    output: W,
    receiver: ReceiverWatch,
    idle_policy: IdlePolicy,
    poll_interval: Duration,
    cancel: CancellationToken,
}

impl<W: Write + Send + 'static> TelemetrySink<W> {
    pub(crate) fn new(
        socket: TelemetrySocket,
        output: W,
        receiver: ReceiverWatch,
        idle_policy: IdlePolicy,
        poll_interval: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            socket,
            output,
            receiver,
            idle_policy,
            poll_interval,
            cancel,
        }
    }

    pub(crate) fn spawn(self) -> Result<JoinHandle<TelemetryStats>> {
        std::thread::Builder::new()
            .name("netsdr-telemetry".to_string())
            .spawn(move || {
                let mut sink = self;
                sink.run()
            })
            .map_err(|source| SessionError::Spawn {
                name: "telemetry sink",
                source,
            })
    }

    /// Receive until cancelled, the socket fails, or the output fails.
    ///
    /// The socket must carry a read timeout so cancellation is observed.
    pub(crate) fn run(&mut self) -> TelemetryStats {
        let mut stats = TelemetryStats::default();
        let mut buf = vec![0u8; MAX_DATAGRAM_SIZE];

        while !self.cancel.is_cancelled() {
            let on = self.receiver.is_on();
            if !on && self.idle_policy == IdlePolicy::Park {
                std::thread::sleep(self.poll_interval);
                continue;
            }

            let (len, source) = match self.socket.recv_from(&mut buf) {
                Ok(received) => received,
                Err(TransportError::Io(err))
                    if err.kind() == ErrorKind::Interrupted || netsdr_transport::is_timeout(&err) =>
                {
                    continue
                }
                Err(err) => {
                    if !self.cancel.is_cancelled() {
                        warn!(error = %err, "telemetry receive failed");
                    }
                    break;
                }
            };

            if !self.socket.accepts(&source) {
                stats.foreign_packets += 1;
                debug!(%source, "ignoring datagram from unexpected source");
                continue;
            }
            // Re-read: the receiver may have been stopped while we were blocked.
            if !self.receiver.is_on() {
                stats.idle_dropped += 1;
                continue;
            }

            let Some(packet) = IqPacket::parse(&buf[..len]) else {
                stats.short_packets += 1;
                debug!(len, "discarding datagram shorter than packet header");
                continue;
            };

            if let Err(err) = self
                .output
                .write_all(packet.payload())
                .and_then(|()| self.output.flush())
            {
                warn!(error = %err, "failed to write telemetry payload");
                break;
            }
            stats.packets += 1;
            stats.bytes_written += packet.payload().len() as u64;
            trace!(
                sequence = packet.sequence(),
                bytes = packet.payload().len(),
                "wrote telemetry payload"
            );
        }

        info!(
            packets = stats.packets,
            bytes = stats.bytes_written,
            "telemetry sink stopped"
        );
        stats
    }
}
