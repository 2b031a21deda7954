use std::fs::File;
use std::io::BufWriter;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread::JoinHandle;

use netsdr_codec::{
    encode_frequency, encode_receiver_state, Command, FrequencyConfig, ReceiverConfig, Response,
};
use netsdr_transport::{ControlStream, TelemetrySocket};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::SessionConfig;
use crate::error::{Result, SessionError};
use crate::exchange::Exchange;
use crate::listener::{ControlListener, ListenerStats, UnsolicitedMessage};
use crate::telemetry::{ReceiverFlag, ReceiverWatch, TelemetrySink, TelemetryStats};

/// Observable state of a [`Session`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Disconnected,
    Connected { receiver_on: bool },
}

/// What the background loops reported when they were joined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub telemetry: TelemetryStats,
    pub listener: ListenerStats,
}

/// Everything owned by one connection.
struct Active {
    exchange: Exchange,
    receiver: ReceiverFlag,
    cancel: CancellationToken,
    listener: JoinHandle<ListenerStats>,
    telemetry: JoinHandle<TelemetryStats>,
    device: SocketAddr,
    telemetry_addr: SocketAddr,
    output_path: PathBuf,
}

enum State {
    Disconnected,
    Connected(Box<Active>),
}

/// A control and telemetry session with one NetSDR receiver.
///
/// Command operations take `&mut self`, so only one command is in flight
/// at a time.
pub struct Session {
    config: SessionConfig,
    state: State,
    pushes: Option<Sender<UnsolicitedMessage>>,
}

impl Session {
    /// A disconnected session with default configuration.
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            config,
            state: State::Disconnected,
            pushes: None,
        }
    }

    /// Also deliver device pushes to `sender`, from the next connect on.
    pub fn with_push_channel(mut self, sender: Sender<UnsolicitedMessage>) -> Self {
        self.pushes = Some(sender);
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn status(&self) -> SessionStatus {
        match &self.state {
            State::Disconnected => SessionStatus::Disconnected,
            State::Connected(active) => SessionStatus::Connected {
                receiver_on: active.receiver.get(),
            },
        }
    }

    pub fn is_connected(&self) -> bool {
        matches!(self.state, State::Connected(_))
    }

    pub fn is_receiver_on(&self) -> bool {
        matches!(
            self.status(),
            SessionStatus::Connected { receiver_on: true }
        )
    }

    /// Read-only view of the receiver flag, while connected.
    pub fn receiver_watch(&self) -> Option<ReceiverWatch> {
        match &self.state {
            State::Connected(active) => Some(active.receiver.watch()),
            State::Disconnected => None,
        }
    }

    /// Remote address of the control connection.
    pub fn device_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Connected(active) => Some(active.device),
            State::Disconnected => None,
        }
    }

    /// Local address the telemetry socket is bound to.
    pub fn telemetry_addr(&self) -> Option<SocketAddr> {
        match &self.state {
            State::Connected(active) => Some(active.telemetry_addr),
            State::Disconnected => None,
        }
    }

    /// File the current connection writes telemetry to.
    pub fn output_path(&self) -> Option<&Path> {
        match &self.state {
            State::Connected(active) => Some(&active.output_path),
            State::Disconnected => None,
        }
    }

    /// Open both channels and start the background loops.
    ///
    /// Any failure leaves the session disconnected with nothing left open.
    pub fn connect(&mut self, host: &str, control_port: u16, telemetry_port: u16) -> Result<()> {
        if self.is_connected() {
            warn!("already connected");
            return Err(SessionError::AlreadyConnected);
        }
        info!(host, control_port, telemetry_port, "connecting to receiver");

        let active = self.open(host, control_port, telemetry_port)?;
        info!(
            device = %active.device,
            telemetry = %active.telemetry_addr,
            output = %active.output_path.display(),
            "connected"
        );
        self.state = State::Connected(Box::new(active));
        Ok(())
    }

    fn open(&self, host: &str, control_port: u16, telemetry_port: u16) -> Result<Active> {
        let config = &self.config;

        let control = ControlStream::connect(host, control_port, Some(config.connect_timeout))?;
        control.set_write_timeout(Some(config.response_timeout))?;
        let device = control.peer_addr();

        let telemetry = bind_telemetry(config, telemetry_port, device)?;
        telemetry.set_read_timeout(Some(config.poll_interval))?;
        let telemetry_addr = telemetry.local_addr();

        let reader = control.try_clone()?;
        reader.set_read_timeout(Some(config.poll_interval))?;

        let output = File::create(&config.output_path).map_err(|source| SessionError::Output {
            path: config.output_path.clone(),
            source,
        })?;

        let cancel = CancellationToken::new();
        let receiver = ReceiverFlag::default();
        let (registrations_tx, registrations_rx) = mpsc::channel();

        let listener =
            ControlListener::new(reader, registrations_rx, self.pushes.clone(), cancel.clone())
                .spawn()?;

        let sink = TelemetrySink::new(
            telemetry,
            BufWriter::new(output),
            receiver.watch(),
            config.idle_policy,
            config.poll_interval,
            cancel.clone(),
        );
        let telemetry = match sink.spawn() {
            Ok(handle) => handle,
            Err(err) => {
                cancel.cancel();
                let _ = listener.join();
                return Err(err);
            }
        };

        Ok(Active {
            exchange: Exchange::new(control, registrations_tx, config.response_timeout),
            receiver,
            cancel,
            listener,
            telemetry,
            device,
            telemetry_addr,
            output_path: config.output_path.clone(),
        })
    }

    /// Stop both loops, wait for them, and close both channels.
    pub fn disconnect(&mut self) -> Result<SessionSummary> {
        let active = match std::mem::replace(&mut self.state, State::Disconnected) {
            State::Connected(active) => active,
            State::Disconnected => {
                warn!("not connected");
                return Err(SessionError::NotConnected);
            }
        };
        info!("disconnecting from receiver");

        let Active {
            exchange,
            receiver,
            cancel,
            listener,
            telemetry,
            ..
        } = *active;

        cancel.cancel();
        receiver.set(false);
        let summary = SessionSummary {
            listener: listener.join().unwrap_or_else(|_| {
                warn!("control listener panicked");
                ListenerStats::default()
            }),
            telemetry: telemetry.join().unwrap_or_else(|_| {
                warn!("telemetry sink panicked");
                TelemetryStats::default()
            }),
        };
        // The telemetry socket and output file closed with the sink thread.
        exchange.close();

        info!(
            packets = summary.telemetry.packets,
            bytes = summary.telemetry.bytes_written,
            pushes = summary.listener.pushes,
            "disconnected"
        );
        Ok(summary)
    }

    /// Start or stop the receiver.
    ///
    /// The receiver flag follows `start` once the command is written, before
    /// the device answers.
    pub fn toggle_receiver_state(&mut self, start: bool, cfg: &ReceiverConfig) -> Result<Response> {
        let active = self.active_mut()?;
        let command = encode_receiver_state(start, cfg)?;
        info!(
            start,
            capture_mode = cfg.capture_mode,
            "{} receiver",
            if start { "starting" } else { "stopping" }
        );

        let pending = active.exchange.dispatch(&command)?;
        active.receiver.set(start);
        let response = pending.wait()?;
        report(&response);
        Ok(response)
    }

    /// Tune the receiver.
    pub fn set_frequency(&mut self, hz: i64, cfg: &FrequencyConfig) -> Result<Response> {
        let active = self.active_mut()?;
        let command = encode_frequency(hz, cfg)?;
        info!(hz, channel = cfg.channel_id, "changing frequency");
        let response = active.exchange.dispatch(&command)?.wait()?;
        report(&response);
        Ok(response)
    }

    /// Send a pre-encoded command and wait for its response.
    pub fn send_command(&mut self, command: &Command) -> Result<Response> {
        let active = self.active_mut()?;
        let response = active.exchange.dispatch(command)?.wait()?;
        report(&response);
        Ok(response)
    }

    fn active_mut(&mut self) -> Result<&mut Active> {
        match &mut self.state {
            State::Connected(active) => Ok(active),
            State::Disconnected => {
                warn!("not connected");
                Err(SessionError::NotConnected)
            }
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.is_connected() {
            let _ = self.disconnect();
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("status", &self.status())
            .field("device", &self.device_addr())
            .field("config", &self.config)
            .finish()
    }
}

/// Bind the telemetry port, filtering on the address the control stream reached.
fn bind_telemetry(config: &SessionConfig, port: u16, device: SocketAddr) -> Result<TelemetrySocket> {
    let socket = TelemetrySocket::bind(port)?;
    Ok(if config.filter_telemetry_source {
        socket.with_device(device.ip())
    } else {
        socket
    })
}

fn report(response: &Response) {
    match response {
        Response::Ack => info!(response = %response, "command acknowledged"),
        Response::Nak => warn!(response = %response, "command is not supported"),
        Response::Raw(text) => info!(response = %text, "received response"),
        Response::Invalid => warn!("invalid response"),
    }
}
