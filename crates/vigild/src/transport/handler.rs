//! Connection abstraction handed from the accept loop to session handlers.

use std::io::{self, Read, Write};
use std::net::TcpStream;

#[cfg(unix)]
use std::os::unix::net::UnixStream;

#[cfg(unix)]
use tracing::warn;

/// Handler invoked for each accepted connection, on its own thread.
pub trait ConnectionHandler: Send + Sync {
    /// Serves one connection to completion.
    fn handle(&self, stream: ConnectionStream);
}

/// An accepted client connection.
#[derive(Debug)]
pub enum ConnectionStream {
    /// TCP client connection.
    Tcp(TcpStream),
    /// Unix domain socket client connection.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl ConnectionStream {
    /// Clones the underlying socket so reads and writes can proceed on
    /// separate halves.
    pub fn try_clone(&self) -> io::Result<Self> {
        match self {
            Self::Tcp(stream) => stream.try_clone().map(Self::Tcp),
            #[cfg(unix)]
            Self::Unix(stream) => stream.try_clone().map(Self::Unix),
        }
    }

    /// Returns whether the connected peer is the daemon's trusted owner.
    ///
    /// Unix peers are owners when their credentials carry the daemon's own
    /// effective UID. TCP peers present no credentials and are never
    /// trusted.
    #[must_use]
    pub fn peer_is_owner(&self) -> bool {
        match self {
            Self::Tcp(_) => false,
            #[cfg(unix)]
            Self::Unix(stream) => unix_peer_is_owner(stream),
        }
    }
}

#[cfg(unix)]
fn unix_peer_is_owner(stream: &UnixStream) -> bool {
    use nix::sys::socket::{getsockopt, sockopt::PeerCredentials};
    use nix::unistd::Uid;

    match getsockopt(stream, PeerCredentials) {
        Ok(credentials) => Uid::from_raw(credentials.uid()) == Uid::effective(),
        Err(error) => {
            // Without credentials the peer is treated as untrusted.
            warn!(
                target: super::LISTENER_TARGET,
                %error,
                "failed to read peer credentials"
            );
            false
        }
    }
}

impl Read for ConnectionStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.read(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.read(buf),
        }
    }
}

impl Write for ConnectionStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Self::Tcp(stream) => stream.write(buf),
            #[cfg(unix)]
            Self::Unix(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Self::Tcp(stream) => stream.flush(),
            #[cfg(unix)]
            Self::Unix(stream) => stream.flush(),
        }
    }
}

/// Handler that drops every connection; used in listener tests.
#[cfg(test)]
pub(crate) struct NoopConnectionHandler;

#[cfg(test)]
impl ConnectionHandler for NoopConnectionHandler {
    fn handle(&self, _stream: ConnectionStream) {}
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn same_process_unix_peer_is_owner() {
        let (left, right) = UnixStream::pair().expect("socketpair");
        let stream = ConnectionStream::Unix(left);
        assert!(stream.peer_is_owner());
        drop(right);
    }
}
