//! Foreground half of the command/response exchange.
//!
//! The foreground never reads the control stream. It registers a reply slot
//! with the listener thread, writes the command, and waits on the slot. The
//! slot is registered *before* the write so the listener always knows about
//! it by the time the device answers.

use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, SyncSender};
use std::time::Duration;

use bytes::Bytes;
use netsdr_codec::{classify_response, Command, Response};
use netsdr_transport::ControlStream;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};

/// One-shot handoff of a response chunk from the listener to a waiter.
pub(crate) struct ReplySlot(SyncSender<Bytes>);

impl ReplySlot {
    pub(crate) fn new() -> (Self, Receiver<Bytes>) {
        let (tx, rx) = mpsc::sync_channel(1);
        (Self(tx), rx)
    }

    /// Deliver a chunk; hands it back if the waiter has gone away.
    pub(crate) fn deliver(self, chunk: Bytes) -> std::result::Result<(), Bytes> {
        self.0.try_send(chunk).map_err(|err| match err {
            mpsc::TrySendError::Full(chunk) | mpsc::TrySendError::Disconnected(chunk) => chunk,
        })
    }
}

/// Write half of the control stream plus the registration queue.
pub(crate) struct Exchange {
    writer: ControlStream,
    registrations: Sender<ReplySlot>,
    response_timeout: Duration,
}

impl Exchange {
    pub(crate) fn new(
        writer: ControlStream,
        registrations: Sender<ReplySlot>,
        response_timeout: Duration,
    ) -> Self {
        Self {
            writer,
            registrations,
            response_timeout,
        }
    }

    /// Write a command; the returned handle waits for its response.
    ///
    /// A failed write fails this call only. Nothing is retried. The command
    /// is written even when the listener has already exited; the call then
    /// reports [`SessionError::ListenerStopped`] since nothing can read the
    /// response.
    pub(crate) fn dispatch(&mut self, command: &Command) -> Result<PendingResponse> {
        let (slot, rx) = ReplySlot::new();
        let registered = self.registrations.send(slot).is_ok();

        info!(command = %command.to_hex(), "sending command");
        self.writer.send_all(command.as_bytes())?;

        if !registered {
            warn!("control listener has stopped; response cannot be read");
            return Err(SessionError::ListenerStopped);
        }

        Ok(PendingResponse {
            rx,
            timeout: self.response_timeout,
        })
    }

    /// Shut the control stream down in both directions.
    pub(crate) fn close(&self) {
        if let Err(err) = self.writer.shutdown() {
            debug!(error = %err, "control stream shutdown failed");
        }
    }
}

/// A dispatched command whose response has not been read yet.
#[derive(Debug)]
pub(crate) struct PendingResponse {
    rx: Receiver<Bytes>,
    timeout: Duration,
}

impl PendingResponse {
    /// Block until the listener hands over the response, then classify it.
    pub(crate) fn wait(self) -> Result<Response> {
        match self.rx.recv_timeout(self.timeout) {
            Ok(chunk) => Ok(classify_response(&chunk)),
            Err(RecvTimeoutError::Timeout) => Err(SessionError::ResponseTimeout(self.timeout)),
            Err(RecvTimeoutError::Disconnected) => Err(SessionError::ListenerStopped),
        }
    }
}
