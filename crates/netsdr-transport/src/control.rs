use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};

/// A connected control stream to the receiver; implements `Read` and `Write`.
///
/// Commands are written on one handle while a clone obtained with
/// [`ControlStream::try_clone`] is read by a background thread.
pub struct ControlStream {
    inner: TcpStream,
    peer: SocketAddr,
}

impl ControlStream {
    /// Resolve `host` and connect to the first address that accepts.
    ///
    /// With `timeout` set, each address attempt is bounded by it.
    pub fn connect(host: &str, port: u16, timeout: Option<Duration>) -> Result<Self> {
        let addrs = resolve(host, port)?;

        let mut last_err = None;
        for addr in addrs {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(&addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    // Commands are tiny; do not let Nagle hold them back.
                    stream.set_nodelay(true)?;
                    debug!(%addr, "connected control stream");
                    return Ok(Self {
                        inner: stream,
                        peer: addr,
                    });
                }
                Err(source) => {
                    debug!(%addr, error = %source, "control connect attempt failed");
                    last_err = Some(TransportError::Connect { addr, source });
                }
            }
        }

        Err(last_err.unwrap_or_else(|| TransportError::Resolve {
            host: host.to_string(),
            port,
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
        }))
    }

    /// Write the whole buffer and flush (blocking).
    pub fn send_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut offset = 0usize;
        while offset < bytes.len() {
            match self.inner.write(&bytes[offset..]) {
                Ok(0) => return Err(TransportError::Shutdown),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TransportError::Io(err)),
            }
        }
        self.inner.flush().map_err(Into::into)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Try to clone this stream (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self {
            inner: cloned,
            peer: self.peer,
        })
    }

    /// Shut down both directions of the connection.
    ///
    /// Shutting down an already disconnected stream is not an error.
    pub fn shutdown(&self) -> Result<()> {
        match self.inner.shutdown(Shutdown::Both) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    /// Address of the connected device.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Local address of this end of the connection.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }
}

impl Read for ControlStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for ControlStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.inner.flush()
    }
}

impl std::fmt::Debug for ControlStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ControlStream")
            .field("peer", &self.peer)
            .finish()
    }
}

fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
    let addrs: Vec<SocketAddr> = (host, port)
        .to_socket_addrs()
        .map_err(|source| TransportError::Resolve {
            host: host.to_string(),
            port,
            source,
        })?
        .collect();
    if addrs.is_empty() {
        return Err(TransportError::Resolve {
            host: host.to_string(),
            port,
            source: std::io::Error::new(ErrorKind::NotFound, "no addresses resolved"),
        });
    }
    Ok(addrs)
}
