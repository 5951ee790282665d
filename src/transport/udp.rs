//! Owned UDP transport: one ephemeral socket per peer.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::Transport;
use crate::error::{Error, Result};
use crate::util::bind_ephemeral_udp_socket;
use crate::v3::DEFAULT_MSG_MAX_SIZE;

/// A UDP socket bound to an ephemeral port, talking to one fixed peer.
pub struct UdpTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpTransport {
    /// Bind an ephemeral socket and connect it to `peer`.
    ///
    /// `connect` on a UDP socket only filters which peer's datagrams the
    /// kernel delivers to us; it performs no handshake.
    pub async fn connect(peer: SocketAddr) -> Result<Self> {
        let socket = bind_ephemeral_udp_socket(peer)
            .await
            .map_err(|source| Error::Io {
                target: Some(peer),
                source,
            })?;
        socket.connect(peer).await.map_err(|source| Error::Io {
            target: Some(peer),
            source,
        })?;
        Ok(Self { socket, peer })
    }
}

impl Transport for UdpTransport {
    async fn send(&self, data: &[u8]) -> Result<()> {
        self.socket.send(data).await.map_err(|source| Error::Io {
            target: Some(self.peer),
            source,
        })?;
        Ok(())
    }

    async fn recv(&self, timeout: Duration) -> Result<Bytes> {
        let mut buf = vec![0u8; DEFAULT_MSG_MAX_SIZE as usize];
        let n = tokio::time::timeout(timeout, self.socket.recv(&mut buf))
            .await
            .map_err(|_| Error::Timeout {
                target: Some(self.peer),
                elapsed: timeout,
                request_id: 0,
                retries: 0,
            })?
            .map_err(|source| Error::Io {
                target: Some(self.peer),
                source,
            })?;
        buf.truncate(n);
        Ok(Bytes::from(buf))
    }

    fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}
