use std::net::{IpAddr, Ipv4Addr, SocketAddr, UdpSocket};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};

/// Largest payload a single UDP datagram can carry over IPv4.
pub const MAX_DATAGRAM_SIZE: usize = 65_507;

/// UDP endpoint receiving telemetry datagrams from the receiver.
///
/// The receiver streams to a fixed local port, so the socket binds that port
/// on all interfaces. It does not `connect()` the socket: the device sends
/// from a port of its own choosing, which a connected UDP socket would reject.
/// Source filtering is done by IP instead (see [`TelemetrySocket::accepts`]).
pub struct TelemetrySocket {
    socket: UdpSocket,
    local: SocketAddr,
    device: Option<IpAddr>,
}

impl TelemetrySocket {
    /// Bind the telemetry port on all interfaces, accepting any source.
    pub fn bind(port: u16) -> Result<Self> {
        Self::bind_addr(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port))
    }

    /// Bind an explicit local address, accepting any source.
    pub fn bind_addr(addr: SocketAddr) -> Result<Self> {
        let socket = UdpSocket::bind(addr).map_err(|source| TransportError::Bind { addr, source })?;
        let local = socket.local_addr()?;
        info!(%local, "listening for telemetry datagrams");
        Ok(Self {
            socket,
            local,
            device: None,
        })
    }

    /// Only accept datagrams sent from `device`.
    ///
    /// Pass the address the control stream actually reached, so both channels
    /// agree on which host is the receiver.
    pub fn with_device(mut self, device: IpAddr) -> Self {
        debug!(%device, "telemetry restricted to device address");
        self.device = Some(device);
        self
    }

    /// Receive one datagram (blocking, subject to the read timeout).
    pub fn recv_from(&self, buf: &mut [u8]) -> Result<(usize, SocketAddr)> {
        self.socket.recv_from(buf).map_err(Into::into)
    }

    /// Whether a datagram from `source` belongs to the device.
    ///
    /// Loopback sources are accepted for a loopback device regardless of
    /// the exact loopback address the kernel picked.
    pub fn accepts(&self, source: &SocketAddr) -> bool {
        match self.device {
            None => true,
            Some(device) if device.is_loopback() => source.ip().is_loopback(),
            Some(device) => source.ip() == device,
        }
    }

    /// Set read timeout on the underlying socket.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.socket.set_read_timeout(timeout).map_err(Into::into)
    }

    /// The bound local address (useful when binding port 0).
    pub fn local_addr(&self) -> SocketAddr {
        self.local
    }

    /// The device address datagrams are filtered on, if any.
    pub fn device(&self) -> Option<IpAddr> {
        self.device
    }
}

impl std::fmt::Debug for TelemetrySocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetrySocket")
            .field("local", &self.local)
            .field("device", &self.device)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loopback_target(socket: &TelemetrySocket) -> SocketAddr {
        SocketAddr::new(
            IpAddr::V4(Ipv4Addr::LOCALHOST),
            socket.local_addr().port(),
        )
    }

    #[test]
    fn receives_datagram_from_device() {
        let socket = TelemetrySocket::bind(0)
            .unwrap()
            .with_device(IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert!(socket.local_addr().port() != 0);

        let sender = UdpSocket::bind("127.0.0.1:0").unwrap();
        sender
            .send_to(&[0x04, 0x84, 0x00, 0x00, 0xAA, 0xBB], loopback_target(&socket))
            .unwrap();

        let mut buf = [0u8; MAX_DATAGRAM_SIZE];
        let (len, source) = socket.recv_from(&mut buf).unwrap();
        assert_eq!(&buf[..len], &[0x04, 0x84, 0x00, 0x00, 0xAA, 0xBB]);
        assert!(socket.accepts(&source));
    }

    #[test]
    fn source_filter_rejects_foreign_address() {
        let socket = TelemetrySocket::bind(0).unwrap();
        assert!(socket.accepts(&"10.1.2.3:5000".parse().unwrap()));

        let socket = socket.with_device("192.168.1.50".parse().unwrap());
        assert_eq!(socket.device(), Some("192.168.1.50".parse().unwrap()));
        assert!(socket.accepts(&"192.168.1.50:6000".parse().unwrap()));
        assert!(!socket.accepts(&"192.168.1.51:6000".parse().unwrap()));
    }

    #[test]
    fn read_timeout_is_reported_as_timeout() {
        let socket = TelemetrySocket::bind(0).unwrap();
        socket
            .set_read_timeout(Some(Duration::from_millis(20)))
            .unwrap();
        let mut buf = [0u8; 64];
        let err = socket.recv_from(&mut buf).unwrap_err();
        assert!(err.is_timeout());
    }

    #[test]
    fn binding_a_taken_port_fails() {
        let first = TelemetrySocket::bind_addr("127.0.0.1:0".parse().unwrap()).unwrap();
        let err = TelemetrySocket::bind_addr(first.local_addr()).unwrap_err();
        assert!(matches!(err, TransportError::Bind { .. }));
    }
}
