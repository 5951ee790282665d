//! Transport layer abstraction.
//!
//! This crate's scope is the USM codec and session layer, not a general
//! client transport stack; this module provides just enough of a real
//! collaborator — the `sendOneRequest(packet, wait) -> response` contract —
//! for the session orchestrator to drive end to end: a single owned UDP
//! implementation, no shared-socket pooling, no TCP, no agent-side trait.

mod udp;

pub use udp::UdpTransport;

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;

use crate::error::Result;

/// Client-side transport abstraction.
///
/// Implementations own one logical conversation with a single peer; the
/// session orchestrator never needs more than `send`/`recv`, plus the one
/// combined `send_one_request` round trip.
pub trait Transport: Send + Sync {
    /// Send one datagram/frame to the peer.
    fn send(&self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Receive one datagram/frame from the peer, bounded by `timeout`.
    fn recv(&self, timeout: Duration) -> impl Future<Output = Result<Bytes>> + Send;

    /// The peer address this transport sends to and receives from.
    fn peer_addr(&self) -> SocketAddr;

    /// Perform one request/response round trip, retrying on timeout.
    ///
    /// Matches the `sendOneRequest(packet, wait_bool) -> response_packet`
    /// shape: `wait = false` fires the request and returns immediately with
    /// an empty response (used for the fire-and-forget case of a v2c/v3
    /// INFORM acknowledgement or trap send, which this crate does not
    /// otherwise implement); `wait = true` retries up to `retries`
    /// additional times on timeout before giving up.
    fn send_one_request(
        &self,
        data: Bytes,
        wait: bool,
        timeout: Duration,
        retries: u32,
    ) -> impl Future<Output = Result<Bytes>> + Send {
        async move {
            self.send(&data).await?;
            if !wait {
                return Ok(Bytes::new());
            }
            let mut attempt = 0;
            loop {
                match self.recv(timeout).await {
                    Ok(response) => return Ok(response),
                    Err(err) if attempt < retries => {
                        tracing::debug!(attempt, peer = %self.peer_addr(), "request timed out, retrying");
                        attempt += 1;
                        self.send(&data).await?;
                        let _ = &err;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
}
