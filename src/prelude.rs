//! Convenient imports for working with this crate.
//!
//! # Usage
//!
//! ```rust,no_run
//! use snmp3_usm::prelude::*;
//! ```
//!
//! This imports:
//! - Error handling: [`Error`], [`Result`]
//! - V3 protocols: [`AuthProtocol`], [`PrivProtocol`], [`MsgFlags`]
//! - Session orchestration: [`Session`], [`SessionConfig`]
//! - Transport: [`Transport`], [`UdpTransport`]

pub use crate::error::{Error, Result};
pub use crate::pdu::OpaquePdu;
pub use crate::session::{Session, SessionConfig};
pub use crate::transport::{Transport, UdpTransport};
pub use crate::v3::{AuthProtocol, MsgFlags, PrivProtocol};
pub use crate::version::Version;
