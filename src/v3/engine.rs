//! Engine discovery (RFC 3414 §4, RFC 3412 §7.2 Report handling).

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Mutex;

use bytes::Bytes;

use crate::ber::{Decoder, EncodeBuf, tag};
use crate::error::{DecodeErrorKind, Error, Result};

/// Default max message size this implementation advertises (RFC 3412 §6,
/// the `rxBufSize` constant).
pub const DEFAULT_MSG_MAX_SIZE: i32 = 65507;

/// RFC 3414 §2.3: engine time rolls over after this many seconds.
pub const MAX_ENGINE_TIME: u32 = 2_147_483_647;

/// RFC 3414 §1.3.1: acceptable skew window for `AuthoritativeEngineTime`.
pub const TIME_WINDOW: u32 = 150;

/// Discovered engine state for one remote SNMP entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineState {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
}

impl EngineState {
    /// True if discovery has not yet populated the engine id.
    pub fn is_unknown(&self) -> bool {
        self.engine_id.is_empty()
    }
}

/// A keyed cache of discovered engine state by peer address, so repeated
/// sessions against the same agent can skip rediscovery.
#[derive(Debug, Default)]
pub struct EngineCache {
    entries: Mutex<HashMap<SocketAddr, EngineState>>,
}

impl EngineCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up cached state for `peer`, if any.
    pub fn get(&self, peer: SocketAddr) -> Option<EngineState> {
        self.entries.lock().expect("cache lock poisoned").get(&peer).cloned()
    }

    /// Insert or update cached state for `peer`.
    pub fn insert(&self, peer: SocketAddr, state: EngineState) {
        self.entries.lock().expect("cache lock poisoned").insert(peer, state);
    }
}

/// Build the empty-USM-params discovery probe: a NoAuthNoPriv, Reportable
/// GetRequest with no variable bindings (RFC 3414 §4 step 1).
///
/// `msg_id` should be unique per request as with any other outbound packet.
pub fn build_discovery_probe(msg_id: i32) -> Bytes {
    let mut buf = EncodeBuf::new();
    buf.push_sequence(|buf| {
        // ScopedPDU { ContextEngineID = "", ContextName = "", GetRequest { varbinds = () } }
        buf.push_sequence(|buf| {
            buf.push_constructed(tag::pdu::GET_REQUEST, |buf| {
                buf.push_sequence(|_| {}); // empty varbind list
                buf.push_integer(0); // error-index
                buf.push_integer(0); // error-status
                buf.push_integer(msg_id);
            });
            buf.push_octet_string(b""); // ContextName
            buf.push_octet_string(b""); // ContextEngineID
        });
        // empty USM security parameters, wrapped in an OCTET STRING
        buf.push_octet_string(&usm_empty_params());
        buf.push_integer(3); // msgSecurityModel = USM
        buf.push_octet_string(&[0x04]); // msgFlags = Reportable
        buf.push_integer(DEFAULT_MSG_MAX_SIZE);
        buf.push_integer_fixed4(msg_id); // msgID: fixed 4-byte INTEGER, not minimum-encoded (§4.5)
        buf.push_integer(3); // msgVersion = 3
    });
    buf.finish()
}

fn usm_empty_params() -> Vec<u8> {
    let mut buf = EncodeBuf::new();
    buf.push_sequence(|buf| {
        buf.push_octet_string(b""); // privParams
        buf.push_octet_string(b""); // authParams
        buf.push_octet_string(b""); // userName
        buf.push_unsigned32(tag::universal::INTEGER, 0); // engineTime
        buf.push_unsigned32(tag::universal::INTEGER, 0); // engineBoots
        buf.push_octet_string(b""); // engineID
    });
    buf.finish_vec()
}

/// Parse a discovery response (a Report PDU carrying the peer's USM
/// parameters) and return the discovered [`EngineState`].
///
/// This only extracts the security-parameters SEQUENCE; it does not
/// validate the PDU body, which is an external collaborator's concern.
pub fn parse_discovery_response(data: Bytes) -> Result<EngineState> {
    let mut dec = Decoder::new(data);
    let mut msg = dec.read_sequence()?;
    let _version = msg.read_integer()?;
    let mut header = msg.read_sequence()?;
    let _msg_id = header.read_integer()?;
    let _max_size = header.read_integer()?;
    let _flags = header.read_octet_string()?;
    let _sec_model = header.read_integer()?;

    let params_bytes = msg.read_octet_string()?;
    let mut params = Decoder::new(params_bytes);
    let mut usm = params.read_sequence()?;
    let engine_id = usm.read_octet_string()?.to_vec();
    let engine_boots = usm.read_unsigned32(tag::universal::INTEGER)?;
    let engine_time = usm.read_unsigned32(tag::universal::INTEGER)?;

    if engine_id.is_empty() {
        return Err(Error::decode(0, DecodeErrorKind::TruncatedData));
    }
    if !(5..=32).contains(&engine_id.len()) {
        return Err(Error::decode(
            0,
            DecodeErrorKind::InvalidEngineIdLength {
                length: engine_id.len(),
            },
        ));
    }

    Ok(EngineState {
        engine_id,
        engine_boots,
        engine_time,
    })
}

/// Variable-binding OIDs RFC 3414 §3.5 defines for each unauthenticated
/// Report condition. Only the last sub-identifier distinguishes them in
/// the standard MIB, but comparing full suffixes keeps this robust against
/// how the PDU body encoder represents the OID.
const USM_STATS_UNSUPPORTED_SEC_LEVELS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 1, 0];
const USM_STATS_NOT_IN_TIME_WINDOWS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 2, 0];
const USM_STATS_UNKNOWN_USER_NAMES: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 3, 0];
const USM_STATS_UNKNOWN_ENGINE_IDS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 4, 0];
const USM_STATS_WRONG_DIGESTS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 5, 0];
const USM_STATS_DECRYPTION_ERRORS: &[u32] = &[1, 3, 6, 1, 6, 3, 15, 1, 1, 6, 0];

/// Reports whose sole varbind OID is `oid` are classified against these
/// well-known USM statistics OIDs. Since OID parsing is out of scope here
/// (owned by the PDU body codec), these helpers take the already-decoded
/// OID arc sequence rather than raw bytes.
pub fn is_unsupported_sec_level_report(oid: &[u32]) -> bool {
    oid == USM_STATS_UNSUPPORTED_SEC_LEVELS
}

pub fn is_not_in_time_window_report(oid: &[u32]) -> bool {
    oid == USM_STATS_NOT_IN_TIME_WINDOWS
}

pub fn is_unknown_user_name_report(oid: &[u32]) -> bool {
    oid == USM_STATS_UNKNOWN_USER_NAMES
}

pub fn is_unknown_engine_id_report(oid: &[u32]) -> bool {
    oid == USM_STATS_UNKNOWN_ENGINE_IDS
}

pub fn is_wrong_digest_report(oid: &[u32]) -> bool {
    oid == USM_STATS_WRONG_DIGESTS
}

pub fn is_decryption_error_report(oid: &[u32]) -> bool {
    oid == USM_STATS_DECRYPTION_ERRORS
}
