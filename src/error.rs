//! Error types for the USM codec and session layer.
//!
//! All errors are `#[non_exhaustive]` to allow adding new variants without
//! breaking changes. Variants map directly onto the error kinds from the
//! design: `ConfigInvalid`, `DiscoveryFailed`, `MarshalOverflow`,
//! `CryptoInit`, `DecryptShape`, `AuthMismatch`, `Transport`, plus the BER
//! decode/encode surface needed to get there.

use std::net::SocketAddr;
use std::time::Duration;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Authentication error kinds (SNMPv3 USM).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthErrorKind {
    /// No credentials configured for this operation.
    NoCredentials,
    /// No authentication key available (protocol selected but key not derived).
    NoAuthKey,
    /// HMAC verification failed.
    HmacMismatch,
    /// Authentication parameters wrong length on the wire.
    WrongMacLength { expected: usize, actual: usize },
    /// Could not locate auth params in message.
    AuthParamsNotFound,
}

impl std::fmt::Display for AuthErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoCredentials => write!(f, "no credentials configured"),
            Self::NoAuthKey => write!(f, "no authentication key available"),
            Self::HmacMismatch => write!(f, "HMAC verification failed"),
            Self::WrongMacLength { expected, actual } => {
                write!(f, "wrong MAC length: expected {}, got {}", expected, actual)
            }
            Self::AuthParamsNotFound => write!(f, "could not locate auth params in message"),
        }
    }
}

/// Cryptographic error kinds (privacy encrypt/decrypt).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CryptoErrorKind {
    /// No privacy key available.
    NoPrivKey,
    /// Invalid key length presented to a cipher constructor.
    InvalidKeyLength,
    /// Invalid IV length presented to a cipher constructor.
    InvalidIvLength,
    /// Unsupported privacy protocol (`NoPriv` with the priv flag set, etc.)
    UnsupportedProtocol,
    /// Invalid `msgPrivacyParameters` length.
    InvalidPrivParamsLength { expected: usize, actual: usize },
}

impl std::fmt::Display for CryptoErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoPrivKey => write!(f, "no privacy key available"),
            Self::InvalidKeyLength => write!(f, "invalid key length"),
            Self::InvalidIvLength => write!(f, "invalid IV length"),
            Self::UnsupportedProtocol => write!(f, "unsupported privacy protocol"),
            Self::InvalidPrivParamsLength { expected, actual } => write!(
                f,
                "invalid privParameters length: expected {}, got {}",
                expected, actual
            ),
        }
    }
}

/// BER decode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeErrorKind {
    /// Expected different tag.
    UnexpectedTag { expected: u8, actual: u8 },
    /// Data truncated unexpectedly.
    TruncatedData,
    /// Invalid BER length encoding.
    InvalidLength,
    /// Indefinite length not supported.
    IndefiniteLength,
    /// Integer value overflow.
    IntegerOverflow,
    /// Zero-length integer.
    ZeroLengthInteger,
    /// Unknown SNMP version.
    UnknownVersion(i32),
    /// Constructed OCTET STRING not supported.
    ConstructedOctetString,
    /// Invalid msgFlags (priv without auth).
    InvalidMsgFlags,
    /// Unknown security model.
    UnknownSecurityModel(i32),
    /// msgMaxSize below RFC 3412 minimum (484 octets).
    MsgMaxSizeTooSmall { value: i32, minimum: i32 },
    /// NULL with non-zero length.
    InvalidNull,
    /// Length field too long.
    LengthTooLong { octets: usize },
    /// Length exceeds maximum.
    LengthExceedsMax { length: usize, max: usize },
    /// Insufficient data for read.
    InsufficientData { needed: usize, available: usize },
    /// Engine ID outside the 5-32 byte range allowed by RFC 3414.
    InvalidEngineIdLength { length: usize },
    /// User name longer than 32 bytes.
    InvalidUserNameLength { length: usize },
}

impl std::fmt::Display for DecodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnexpectedTag { expected, actual } => {
                write!(f, "expected tag 0x{:02X}, got 0x{:02X}", expected, actual)
            }
            Self::TruncatedData => write!(f, "unexpected end of data"),
            Self::InvalidLength => write!(f, "invalid length encoding"),
            Self::IndefiniteLength => write!(f, "indefinite length encoding not supported"),
            Self::IntegerOverflow => write!(f, "integer overflow"),
            Self::ZeroLengthInteger => write!(f, "zero-length integer"),
            Self::UnknownVersion(v) => write!(f, "unknown SNMP version: {}", v),
            Self::ConstructedOctetString => {
                write!(f, "constructed OCTET STRING (0x24) not supported")
            }
            Self::InvalidMsgFlags => write!(f, "invalid msgFlags: privacy without authentication"),
            Self::UnknownSecurityModel(m) => write!(f, "unknown security model: {}", m),
            Self::MsgMaxSizeTooSmall { value, minimum } => {
                write!(f, "msgMaxSize {} below RFC 3412 minimum {}", value, minimum)
            }
            Self::InvalidNull => write!(f, "NULL with non-zero length"),
            Self::LengthTooLong { octets } => {
                write!(f, "length encoding too long ({} octets)", octets)
            }
            Self::LengthExceedsMax { length, max } => {
                write!(f, "length {} exceeds maximum {}", length, max)
            }
            Self::InsufficientData { needed, available } => {
                write!(f, "need {} bytes but only {} remaining", needed, available)
            }
            Self::InvalidEngineIdLength { length } => {
                write!(f, "engine ID length {} outside 5..=32", length)
            }
            Self::InvalidUserNameLength { length } => {
                write!(f, "user name length {} exceeds 32", length)
            }
        }
    }
}

/// BER encode error kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeErrorKind {
    /// Engine ID required (privacy/auth) but not yet discovered.
    EngineNotDiscovered,
    /// Privacy requested but no privacy key derived.
    NoPrivKey,
    /// Auth requested but no auth key derived.
    MissingAuthKey,
    /// Encoded message exceeds the BER length-octet limit this codec supports.
    LengthOverflow { size: usize, max: usize },
}

impl std::fmt::Display for EncodeErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EngineNotDiscovered => write!(f, "engine not discovered"),
            Self::NoPrivKey => write!(f, "privacy key not available"),
            Self::MissingAuthKey => write!(f, "auth key not available for encoding"),
            Self::LengthOverflow { size, max } => {
                write!(f, "encoded length {} exceeds maximum {}", size, max)
            }
        }
    }
}

/// Library error type.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// I/O error during communication.
    #[error("I/O error{}: {source}", target.map(|t| format!(" communicating with {}", t)).unwrap_or_default())]
    Io {
        target: Option<SocketAddr>,
        #[source]
        source: std::io::Error,
    },

    /// Request timed out (after retries if configured).
    #[error("timeout after {elapsed:?}{} (request_id={request_id}, retries={retries})", target.map(|t| format!(" waiting for {}", t)).unwrap_or_default())]
    Timeout {
        target: Option<SocketAddr>,
        elapsed: Duration,
        request_id: u32,
        retries: u32,
    },

    /// Configuration rejected before any I/O was attempted.
    #[error("invalid configuration: {reason}")]
    ConfigInvalid { reason: &'static str },

    /// Engine discovery round-trip failed.
    #[error("engine discovery failed: {reason}")]
    DiscoveryFailed {
        target: Option<SocketAddr>,
        reason: String,
    },

    /// USM authentication error (key, MAC, or message-shape related).
    #[error("authentication error: {kind}")]
    Auth { kind: AuthErrorKind },

    /// BER decoding error.
    #[error("decode error at offset {offset}: {kind}")]
    Decode {
        offset: usize,
        kind: DecodeErrorKind,
    },

    /// BER encoding error.
    #[error("encode error: {kind}")]
    Encode { kind: EncodeErrorKind },

    /// Encoded message length exceeds the BER/marshalling limit.
    #[error("marshal overflow: {size} bytes exceeds maximum {max}")]
    MarshalOverflow { size: usize, max: usize },

    /// A cipher constructor rejected a key/IV size. Indicates a coding bug,
    /// not a peer-supplied condition, since key/IV sizes are fixed by protocol.
    #[error("crypto init failed: {kind}")]
    CryptoInit { kind: CryptoErrorKind },

    /// DES ciphertext length was not a multiple of the block size.
    #[error("decrypt shape error: ciphertext length {length} not a multiple of block size {block_size}")]
    DecryptShape { length: usize, block_size: usize },

    /// MAC verification failed; caller should treat this like a dropped packet.
    #[error("authentication mismatch")]
    AuthMismatch { target: Option<SocketAddr> },

    /// Response msgID doesn't match the request.
    #[error("msgID mismatch: expected {expected}, got {actual}")]
    MsgIdMismatch { expected: u32, actual: u32 },
}

impl Error {
    /// Create a decode error.
    pub fn decode(offset: usize, kind: DecodeErrorKind) -> Self {
        Self::Decode { offset, kind }
    }

    /// Create an encode error.
    pub fn encode(kind: EncodeErrorKind) -> Self {
        Self::Encode { kind }
    }

    /// Create an authentication error.
    pub fn auth(kind: AuthErrorKind) -> Self {
        Self::Auth { kind }
    }

    /// Get the target address if this error has one.
    pub fn target(&self) -> Option<SocketAddr> {
        match self {
            Self::Io { target, .. } => *target,
            Self::Timeout { target, .. } => *target,
            Self::DiscoveryFailed { target, .. } => *target,
            Self::AuthMismatch { target } => *target,
            _ => None,
        }
    }
}
