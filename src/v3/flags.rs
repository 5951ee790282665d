//! `msgFlags` (RFC 3412 §6.4): a single octet carrying three bits of
//! security-level and reportability information. The remaining five bits
//! are reserved and must be zero on send; on receive we mask them off
//! rather than reject, matching net-snmp's permissive posture.

use crate::error::{DecodeErrorKind, Error, Result};

const AUTH_BIT: u8 = 0x01;
const PRIV_BIT: u8 = 0x02;
const REPORTABLE_BIT: u8 = 0x04;
const KNOWN_BITS: u8 = AUTH_BIT | PRIV_BIT | REPORTABLE_BIT;

/// Security-level and reportability bits carried in `msgFlags`.
///
/// Valid combinations are `NoAuthNoPriv`, `AuthNoPriv`, and `AuthPriv`, any
/// of which may be OR-ed with `Reportable`. Privacy without authentication
/// is rejected at construction (RFC 3412 §6.4, last paragraph).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MsgFlags(u8);

impl MsgFlags {
    /// `0x00`: no authentication, no privacy, not reportable.
    pub const NO_AUTH_NO_PRIV: MsgFlags = MsgFlags(0);

    /// Build flags from the three named bits, rejecting priv-without-auth.
    pub fn new(auth: bool, priv_: bool, reportable: bool) -> Result<Self> {
        if priv_ && !auth {
            return Err(Error::decode(0, DecodeErrorKind::InvalidMsgFlags));
        }
        let mut byte = 0u8;
        if auth {
            byte |= AUTH_BIT;
        }
        if priv_ {
            byte |= PRIV_BIT;
        }
        if reportable {
            byte |= REPORTABLE_BIT;
        }
        Ok(Self(byte))
    }

    /// Parse a received `msgFlags` octet, masking off reserved bits.
    ///
    /// Rejects priv-without-auth, since that combination can never be
    /// produced by a conforming peer and would otherwise desync decryption.
    pub fn from_byte(byte: u8) -> Result<Self> {
        let masked = byte & KNOWN_BITS;
        let flags = Self(masked);
        if flags.has_priv() && !flags.has_auth() {
            return Err(Error::decode(0, DecodeErrorKind::InvalidMsgFlags));
        }
        Ok(flags)
    }

    /// The wire-form single byte.
    pub fn as_byte(self) -> u8 {
        self.0
    }

    /// Whether the authentication bit is set.
    pub fn has_auth(self) -> bool {
        self.0 & AUTH_BIT != 0
    }

    /// Whether the privacy bit is set.
    pub fn has_priv(self) -> bool {
        self.0 & PRIV_BIT != 0
    }

    /// Whether the reportable bit is set.
    pub fn reportable(self) -> bool {
        self.0 & REPORTABLE_BIT != 0
    }

    /// `AuthPriv`, optionally reportable.
    pub fn auth_priv(reportable: bool) -> Self {
        Self::new(true, true, reportable).expect("auth_priv always valid")
    }

    /// `AuthNoPriv`, optionally reportable.
    pub fn auth_no_priv(reportable: bool) -> Self {
        Self::new(true, false, reportable).expect("auth_no_priv always valid")
    }

    /// `NoAuthNoPriv`, optionally reportable.
    pub fn no_auth_no_priv(reportable: bool) -> Self {
        Self::new(false, false, reportable).expect("no_auth_no_priv always valid")
    }
}
