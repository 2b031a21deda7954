//! The single reader of the control stream.
//!
//! Responses and device pushes share one ordered TCP stream. Exactly one
//! thread reads it and sorts every chunk:
//! - complete unsolicited control items at the front of a chunk are pushes
//! - pushes trailing a 3-byte ACK or NAK in the same read are pushes too
//! - what remains answers the oldest registered reply slot
//! - with no slot registered, the remainder is a push

use std::collections::VecDeque;
use std::io::{ErrorKind, Read};
use std::sync::mpsc::{Receiver, Sender};
use std::thread::JoinHandle;

use bytes::Bytes;
use netsdr_codec::response::{ACK_BYTES, MIN_RESPONSE_LEN, NAK_BYTES};
use netsdr_codec::{hex, unsolicited_len, MAX_RESPONSE_LEN};
use netsdr_transport::{is_timeout, ControlStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Result, SessionError};
use crate::exchange::ReplySlot;

/// A device-initiated message read from the control stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsolicitedMessage {
    bytes: Bytes,
}

impl UnsolicitedMessage {
    pub fn new(bytes: impl Into<Bytes>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Control item code, when the message is long enough to carry one.
    pub fn item(&self) -> Option<u16> {
        match self.bytes.get(2..4) {
            Some([lo, hi]) => Some(u16::from_le_bytes([*lo, *hi])),
            _ => None,
        }
    }

    /// Uppercase hex rendering, for logs.
    pub fn to_hex(&self) -> String {
        hex(&self.bytes)
    }
}

/// Counters reported when the listener exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Chunks handed to a waiting command.
    pub responses: u64,
    /// Chunks reported as device pushes.
    pub pushes: u64,
}

/// Where the pieces of one read went.
#[derive(Debug, Default)]
struct Routed {
    /// A waiting command received its response.
    response: bool,
    /// Pushes, in stream order.
    pushes: Vec<Bytes>,
}

/// Total length of the run of complete pushes at the start of `buf`.
fn leading_pushes_len(buf: &[u8]) -> usize {
    let mut offset = 0;
    while let Some(len) = unsolicited_len(&buf[offset..]) {
        offset += len;
    }
    offset
}

fn split_pushes(mut run: Bytes, out: &mut Vec<Bytes>) {
    while let Some(len) = unsolicited_len(&run) {
        out.push(run.split_to(len));
    }
}

fn is_ack_or_nak(chunk: &[u8]) -> bool {
    chunk.starts_with(&ACK_BYTES) || chunk.starts_with(&NAK_BYTES)
}

fn route(mut chunk: Bytes, pending: &mut VecDeque<ReplySlot>) -> Routed {
    let mut routed = Routed::default();
    let lead = leading_pushes_len(&chunk);
    split_pushes(chunk.split_to(lead), &mut routed.pushes);
    if chunk.is_empty() {
        return routed;
    }

    // An ACK or NAK has a fixed size; only whole pushes may follow it.
    let mut trailing = Vec::new();
    if is_ack_or_nak(&chunk) && chunk.len() > MIN_RESPONSE_LEN {
        let tail = &chunk[MIN_RESPONSE_LEN..];
        if leading_pushes_len(tail) == tail.len() {
            split_pushes(chunk.split_off(MIN_RESPONSE_LEN), &mut trailing);
        }
    }

    let mut reply = chunk;
    loop {
        let Some(slot) = pending.pop_front() else {
            routed.pushes.push(reply);
            break;
        };
        // A waiter that timed out has dropped its receiver; skip it.
        match slot.deliver(reply) {
            Ok(()) => {
                routed.response = true;
                break;
            }
            Err(returned) => reply = returned,
        }
    }
    routed.pushes.extend(trailing);
    routed
}

pub(crate) struct ControlListener {
    stream: ControlStream,
    registrations: Receiver<ReplySlot>,
    pushes: Option<Sender<UnsolicitedMessage>>,
    cancel: CancellationToken,
}

impl ControlListener {
    pub(crate) fn new(
        stream: ControlStream,
        registrations: Receiver<ReplySlot>,
        pushes: Option<Sender<UnsolicitedMessage>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            stream,
            registrations,
            pushes,
            cancel,
        }
    }

    pub(crate) fn spawn(self) -> Result<JoinHandle<ListenerStats>> {
        std::thread::Builder::new()
            .name("netsdr-control".to_string())
            .spawn(move || self.run())
            .map_err(|source| SessionError::Spawn {
                name: "control listener",
                source,
            })
    }

    /// Read until cancelled, the device closes the stream, or a read fails.
    ///
    /// The stream must carry a read timeout so cancellation is observed.
    fn run(mut self) -> ListenerStats {
        let mut stats = ListenerStats::default();
        let mut pending = VecDeque::new();
        let mut buf = [0u8; MAX_RESPONSE_LEN];

        loop {
            if self.cancel.is_cancelled() {
                info!("stopped listening for unsolicited messages");
                break;
            }

            let read = match self.stream.read(&mut buf) {
                Ok(0) => {
                    warn!("control stream closed by device");
                    break;
                }
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted || is_timeout(&err) => continue,
                Err(err) => {
                    if !self.cancel.is_cancelled() {
                        warn!(error = %err, "error while listening for unsolicited messages");
                    }
                    break;
                }
            };

            pending.extend(self.registrations.try_iter());
            let chunk = Bytes::copy_from_slice(&buf[..read]);
            let routed = route(chunk, &mut pending);
            if routed.response {
                stats.responses += 1;
                debug!(bytes = read, "handed response to waiting command");
            }
            for push in routed.pushes {
                stats.pushes += 1;
                self.report(UnsolicitedMessage::new(push));
            }
        }

        stats
    }

    fn report(&self, message: UnsolicitedMessage) {
        info!(
            message = %message.to_hex(),
            item = ?message.item(),
            "received unsolicited message"
        );
        if let Some(pushes) = &self.pushes {
            // Nobody listening is fine; logging already reported it.
            let _ = pushes.send(message);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::net::TcpListener;
    use std::sync::mpsc;
    use std::time::Duration;

    use netsdr_codec::message::encode_unsolicited;

    use super::*;

    const ACK: [u8; 3] = [0x60, 0x03, 0x00];

    #[test]
    fn pushes_bypass_pending_slots() {
        let (slot, rx) = ReplySlot::new();
        let mut pending = VecDeque::from([slot]);

        let push = encode_unsolicited(0x0018, &[0x80, 0x02]);
        let routed = route(push.clone(), &mut pending);
        assert!(!routed.response);
        assert_eq!(routed.pushes, vec![push]);
        assert_eq!(pending.len(), 1);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn response_goes_to_oldest_slot() {
        let (first, first_rx) = ReplySlot::new();
        let (second, second_rx) = ReplySlot::new();
        let mut pending = VecDeque::from([first, second]);

        let ack = Bytes::from_static(&ACK);
        let routed = route(ack.clone(), &mut pending);
        assert!(routed.response);
        assert!(routed.pushes.is_empty());
        assert_eq!(first_rx.try_recv().unwrap(), ack);
        assert!(second_rx.try_recv().is_err());
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn abandoned_slots_are_skipped() {
        let (stale, stale_rx) = ReplySlot::new();
        let (live, live_rx) = ReplySlot::new();
        drop(stale_rx);
        let mut pending = VecDeque::from([stale, live]);

        let nak = Bytes::from_static(&[0x02, 0x00, 0x00]);
        assert!(route(nak.clone(), &mut pending).response);
        assert_eq!(live_rx.try_recv().unwrap(), nak);
        assert!(pending.is_empty());
    }

    #[test]
    fn chunk_without_waiter_is_a_push() {
        let mut pending = VecDeque::new();
        let text = Bytes::from_static(b"hello");
        let routed = route(text.clone(), &mut pending);
        assert!(!routed.response);
        assert_eq!(routed.pushes, vec![text]);
    }

    #[test]
    fn push_and_reply_in_one_read_are_separated() {
        let (slot, rx) = ReplySlot::new();
        let mut pending = VecDeque::from([slot]);

        let push = encode_unsolicited(0x0018, &[0x80, 0x01]);
        let mut chunk = push.to_vec();
        chunk.extend_from_slice(&ACK);
        let routed = route(Bytes::from(chunk), &mut pending);

        assert!(routed.response);
        assert_eq!(routed.pushes, vec![push]);
        assert_eq!(rx.try_recv().unwrap().as_ref(), &ACK);
    }

    #[test]
    fn pushes_trailing_a_reply_are_separated() {
        let (slot, rx) = ReplySlot::new();
        let mut pending = VecDeque::from([slot]);

        let first = encode_unsolicited(0x0020, &[0x02]);
        let second = encode_unsolicited(0x0018, &[0x80, 0x01]);
        let mut chunk = ACK.to_vec();
        chunk.extend_from_slice(&first);
        chunk.extend_from_slice(&second);
        let routed = route(Bytes::from(chunk), &mut pending);

        assert!(routed.response);
        assert_eq!(routed.pushes, vec![first, second]);
        assert_eq!(rx.try_recv().unwrap().as_ref(), &ACK);
    }

    #[test]
    fn text_reply_is_not_split() {
        let (slot, rx) = ReplySlot::new();
        let mut pending = VecDeque::from([slot]);

        // Starts with unsolicited type bits but declares a length it lacks.
        let text = Bytes::from_static(b"E 1 overload");
        let routed = route(text.clone(), &mut pending);
        assert!(routed.response);
        assert!(routed.pushes.is_empty());
        assert_eq!(rx.try_recv().unwrap(), text);
    }

    #[test]
    fn unsolicited_message_accessors() {
        let message = UnsolicitedMessage::new(encode_unsolicited(0x0020, &[0x01]));
        assert_eq!(message.item(), Some(0x0020));
        assert_eq!(message.to_hex(), "0520200001");
        assert_eq!(UnsolicitedMessage::new(vec![0x01]).item(), None);
    }

    #[test]
    fn listener_routes_stream_and_stops_on_cancel() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let client = ControlStream::connect("127.0.0.1", port, None).unwrap();
        let (mut device, _) = server.accept().unwrap();

        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let (reg_tx, reg_rx) = mpsc::channel();
        let (push_tx, push_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let handle = ControlListener::new(client, reg_rx, Some(push_tx), cancel.clone())
            .spawn()
            .unwrap();

        let push = encode_unsolicited(0x0018, &[0x80, 0x01]);
        device.write_all(&push).unwrap();
        let received = push_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.as_bytes(), push.as_ref());

        let (slot, reply_rx) = ReplySlot::new();
        reg_tx.send(slot).unwrap();
        device.write_all(&ACK).unwrap();
        let reply = reply_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(reply.as_ref(), &ACK);

        cancel.cancel();
        let stats = handle.join().unwrap();
        assert_eq!(
            stats,
            ListenerStats {
                responses: 1,
                pushes: 1
            }
        );
    }

    #[test]
    fn listener_splits_push_sent_with_reply() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let client = ControlStream::connect("127.0.0.1", port, None).unwrap();
        let (mut device, _) = server.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let (reg_tx, reg_rx) = mpsc::channel();
        let (push_tx, push_rx) = mpsc::channel();
        let cancel = CancellationToken::new();
        let (slot, reply_rx) = ReplySlot::new();
        reg_tx.send(slot).unwrap();
        let handle = ControlListener::new(client, reg_rx, Some(push_tx), cancel.clone())
            .spawn()
            .unwrap();

        let push = encode_unsolicited(0x0018, &[0x80, 0x01]);
        let mut segment = push.to_vec();
        segment.extend_from_slice(&ACK);
        device.write_all(&segment).unwrap();

        let reply = reply_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(netsdr_codec::classify_response(&reply), netsdr_codec::Response::Ack);
        let received = push_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(received.as_bytes(), push.as_ref());

        cancel.cancel();
        let stats = handle.join().unwrap();
        assert_eq!(
            stats,
            ListenerStats {
                responses: 1,
                pushes: 1
            }
        );
    }

    #[test]
    fn listener_exits_when_device_closes() {
        let server = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = server.local_addr().unwrap().port();
        let client = ControlStream::connect("127.0.0.1", port, None).unwrap();
        let (device, _) = server.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();

        let (reg_tx, reg_rx) = mpsc::channel();
        let handle = ControlListener::new(client, reg_rx, None, CancellationToken::new())
            .spawn()
            .unwrap();

        drop(device);
        let stats = handle.join().unwrap();
        assert_eq!(stats, ListenerStats::default());

        // The registration queue died with the listener.
        let (slot, _rx) = ReplySlot::new();
        assert!(reg_tx.send(slot).is_err());
    }
}
