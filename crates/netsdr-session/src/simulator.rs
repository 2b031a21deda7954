//! Loopback stand-in for a NetSDR receiver.
//!
//! Accepts one control connection at a time, answers commands with ACK or
//! NAK, and streams telemetry datagrams while the receiver is running.

use std::io::{ErrorKind, Read, Write};
use std::net::{IpAddr, Ipv4Addr, SocketAddr, TcpListener, TcpStream, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::JoinHandle;
use std::time::Duration;

use bytes::{Buf, Bytes, BytesMut};
use netsdr_codec::command::COMMAND_HEADER_SIZE;
use netsdr_codec::message::encode_unsolicited;
use netsdr_codec::packet::encode_packet;
use netsdr_codec::response::{ACK_BYTES, NAK_BYTES};
use netsdr_codec::{decode_command, hex, DecodedCommand, MessageHeader, MAX_RESPONSE_LEN};
use netsdr_transport::{is_timeout, Result, TransportError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Configuration for a [`DeviceSimulator`].
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Address the control listener binds. Port 0 picks a free port.
    pub control_addr: SocketAddr,
    /// Where telemetry datagrams go while running.
    pub telemetry_target: Option<SocketAddr>,
    /// Delay between telemetry datagrams.
    pub packet_interval: Duration,
    /// I/Q payload bytes per datagram.
    pub payload_len: usize,
    /// Unsolicited message sent right after a client connects.
    pub greeting: Option<Bytes>,
    /// Control items answered with NAK even when well formed.
    pub nak_items: Vec<u16>,
    /// How often the simulator threads check for shutdown.
    pub poll_interval: Duration,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            control_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            telemetry_target: None,
            packet_interval: Duration::from_millis(10),
            payload_len: 16,
            greeting: None,
            nak_items: Vec::new(),
            poll_interval: Duration::from_millis(20),
        }
    }
}

#[derive(Debug, Default)]
struct DeviceState {
    running: bool,
    frequency: Option<u64>,
    received: Vec<Bytes>,
    telemetry_target: Option<SocketAddr>,
    client: Option<TcpStream>,
}

#[derive(Debug, Default)]
struct Shared {
    state: Mutex<DeviceState>,
    packets_sent: AtomicU64,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Write to the connected client, if any.
    fn send(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut state = self.lock();
        match state.client.as_mut() {
            Some(client) => client.write_all(bytes),
            None => Err(std::io::Error::from(ErrorKind::NotConnected)),
        }
    }
}

/// A simulated receiver running on background threads.
pub struct DeviceSimulator {
    control_addr: SocketAddr,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    threads: Vec<JoinHandle<()>>,
}

impl DeviceSimulator {
    /// Bind the control listener and start the simulator threads.
    pub fn start(config: SimulatorConfig) -> Result<Self> {
        let listener = TcpListener::bind(config.control_addr).map_err(|source| {
            TransportError::Bind {
                addr: config.control_addr,
                source,
            }
        })?;
        listener.set_nonblocking(true)?;
        let control_addr = listener.local_addr()?;

        let telemetry = UdpSocket::bind(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0))?;

        let shared = Arc::new(Shared::default());
        shared.lock().telemetry_target = config.telemetry_target;
        let cancel = CancellationToken::new();

        let mut simulator = Self {
            control_addr,
            shared,
            cancel,
            threads: Vec::with_capacity(2),
        };

        let control = ControlLoop {
            listener,
            shared: Arc::clone(&simulator.shared),
            cancel: simulator.cancel.clone(),
            greeting: config.greeting.clone(),
            nak_items: config.nak_items.clone(),
            poll_interval: config.poll_interval,
        };
        simulator.threads.push(
            std::thread::Builder::new()
                .name("netsdr-sim-control".to_string())
                .spawn(move || control.run())?,
        );

        let stream = TelemetryLoop {
            socket: telemetry,
            shared: Arc::clone(&simulator.shared),
            cancel: simulator.cancel.clone(),
            packet_interval: config.packet_interval,
            payload_len: config.payload_len,
        };
        // On failure, `simulator` drops here and joins the control thread.
        simulator.threads.push(
            std::thread::Builder::new()
                .name("netsdr-sim-telemetry".to_string())
                .spawn(move || stream.run())?,
        );

        info!(addr = %control_addr, "device simulator listening");
        Ok(simulator)
    }

    /// Bound control address.
    pub fn control_addr(&self) -> SocketAddr {
        self.control_addr
    }

    /// Whether the last receiver state command started the receiver.
    pub fn is_running(&self) -> bool {
        self.shared.lock().running
    }

    /// Last frequency set, in Hz.
    pub fn frequency(&self) -> Option<u64> {
        self.shared.lock().frequency
    }

    /// Every command received so far, in order.
    pub fn received(&self) -> Vec<Bytes> {
        self.shared.lock().received.clone()
    }

    /// Whether a control client is connected.
    pub fn has_client(&self) -> bool {
        self.shared.lock().client.is_some()
    }

    /// Telemetry datagrams sent so far.
    pub fn packets_sent(&self) -> u64 {
        self.shared.packets_sent.load(Ordering::Relaxed)
    }

    /// Redirect telemetry datagrams.
    pub fn set_telemetry_target(&self, target: SocketAddr) {
        self.shared.lock().telemetry_target = Some(target);
    }

    /// Send an unsolicited control item to the connected client.
    pub fn push(&self, item: u16, params: &[u8]) -> Result<()> {
        let message = encode_unsolicited(item, params);
        self.shared.send(&message)?;
        debug!(message = %hex(&message), "pushed unsolicited message");
        Ok(())
    }

    /// Stop the simulator and wait for its threads.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.cancel.cancel();
        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                warn!("device simulator thread panicked");
            }
        }
    }
}

impl Drop for DeviceSimulator {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for DeviceSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceSimulator")
            .field("control_addr", &self.control_addr)
            .field("stopped", &self.cancel.is_cancelled())
            .finish()
    }
}

struct ControlLoop {
    listener: TcpListener,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    greeting: Option<Bytes>,
    nak_items: Vec<u16>,
    poll_interval: Duration,
}

impl ControlLoop {
    fn run(self) {
        while !self.cancel.is_cancelled() {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    info!(%peer, "control client connected");
                    if let Err(err) = self.serve(stream) {
                        warn!(error = %err, "control client failed");
                    }
                    let mut state = self.shared.lock();
                    state.client = None;
                    state.running = false;
                    info!(%peer, "control client disconnected");
                }
                Err(err) if err.kind() == ErrorKind::WouldBlock => {
                    std::thread::sleep(self.poll_interval);
                }
                Err(err) => {
                    warn!(error = %err, "control accept failed");
                    std::thread::sleep(self.poll_interval);
                }
            }
        }
    }

    fn serve(&self, mut stream: TcpStream) -> std::io::Result<()> {
        stream.set_nonblocking(false)?;
        stream.set_nodelay(true)?;
        stream.set_read_timeout(Some(self.poll_interval))?;
        self.shared.lock().client = Some(stream.try_clone()?);

        if let Some(greeting) = &self.greeting {
            self.shared.send(greeting)?;
        }

        let mut pending = BytesMut::new();
        let mut buf = [0u8; MAX_RESPONSE_LEN];
        while !self.cancel.is_cancelled() {
            let read = match stream.read(&mut buf) {
                Ok(0) => return Ok(()),
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted || is_timeout(&err) => continue,
                Err(err) => return Err(err),
            };
            pending.extend_from_slice(&buf[..read]);
            self.drain(&mut pending)?;
        }
        Ok(())
    }

    /// Answer every complete command in `pending`.
    fn drain(&self, pending: &mut BytesMut) -> std::io::Result<()> {
        loop {
            if let Some((command, used)) = decode_command(&pending[..]) {
                let raw = pending.split_to(used).freeze();
                let reply = self.apply(command, raw);
                self.shared.send(&reply)?;
                continue;
            }
            // A length that cannot frame a command means the stream is garbage.
            let garbage = MessageHeader::parse(&pending[..])
                .is_some_and(|header| usize::from(header.length) < COMMAND_HEADER_SIZE);
            if garbage {
                debug!(bytes = %hex(&pending[..]), "discarding malformed command bytes");
                pending.advance(pending.len());
                self.shared.send(&nak())?;
                continue;
            }
            return Ok(());
        }
    }

    fn apply(&self, command: DecodedCommand, raw: Bytes) -> [u8; 3] {
        debug!(command = %hex(&raw), "device received command");
        let mut state = self.shared.lock();
        state.received.push(raw);

        match command {
            DecodedCommand::ReceiverState { run, .. }
                if !self.nak_items.contains(&netsdr_codec::RECEIVER_STATE_ITEM) =>
            {
                state.running = run;
                ack()
            }
            DecodedCommand::Frequency { hz, .. }
                if !self.nak_items.contains(&netsdr_codec::FREQUENCY_ITEM) =>
            {
                state.frequency = Some(hz);
                ack()
            }
            _ => nak(),
        }
    }
}

fn ack() -> [u8; 3] {
    [ACK_BYTES[0], ACK_BYTES[1], 0x00]
}

fn nak() -> [u8; 3] {
    [NAK_BYTES[0], NAK_BYTES[1], 0x00]
}

struct TelemetryLoop {
    socket: UdpSocket,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    packet_interval: Duration,
    payload_len: usize,
}

impl TelemetryLoop {
    fn run(self) {
        let mut sequence: u16 = 0;
        let mut payload = vec![0u8; self.payload_len];

        while !self.cancel.is_cancelled() {
            std::thread::sleep(self.packet_interval);
            let target = {
                let state = self.shared.lock();
                match (state.running, state.telemetry_target) {
                    (true, Some(target)) => target,
                    _ => continue,
                }
            };

            for (i, byte) in payload.iter_mut().enumerate() {
                *byte = (sequence as usize).wrapping_add(i) as u8;
            }
            let datagram = encode_packet(sequence, &payload);
            match self.socket.send_to(&datagram, target) {
                Ok(_) => {
                    self.shared.packets_sent.fetch_add(1, Ordering::Relaxed);
                    sequence = sequence.wrapping_add(1);
                }
                Err(err) => debug!(error = %err, %target, "telemetry send failed"),
            }
        }
    }
}
