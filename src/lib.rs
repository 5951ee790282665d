//! SNMPv3 User-based Security Model (USM) codec and session layer.
//!
//! This crate turns an in-memory SNMPv3 message into the exact byte
//! sequence RFC 3412/3414 define (and back), applying HMAC authentication
//! and optional DES-CBC/AES-128-CFB privacy, and drives the engine-discovery
//! handshake an agent requires before any authenticated exchange.
//!
//! See the [`v3`] module for the USM codec itself, [`session`] for the
//! request/response orchestrator built on top of it, and [`prelude`] for
//! the common imports most callers need.
//!
//! ```no_run
//! use std::time::Duration;
//! use snmp3_usm::prelude::*;
//!
//! # async fn run() -> Result<()> {
//! let transport = UdpTransport::connect("192.0.2.1:161".parse().unwrap()).await?;
//! let config = SessionConfig::new("authuser")
//!     .auth(AuthProtocol::Sha1, "authpassword1")
//!     .privacy(PrivProtocol::Aes128, "privpassword1")
//!     .timeout(Duration::from_secs(3));
//! let mut session = Session::new(transport, config)?;
//! let response = session.send(OpaquePdu::empty_get_request(1)).await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

pub mod ber;
pub mod error;
pub mod pdu;
pub mod prelude;
pub mod session;
pub mod transport;
mod util;
pub mod v3;
pub mod version;

pub use error::{Error, Result};
