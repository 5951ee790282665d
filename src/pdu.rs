//! Minimal PDU-body stand-in.
//!
//! The real PDU body encoder/decoder (GetRequest/GetBulk/varbind lists,
//! OID handling) is an external collaborator per this crate's scope — see
//! `marshalPDU`/`parseRawField` in the external interfaces. This module only
//! provides just enough to drive the engine-discovery probe and to
//! recognize a Report PDU shape, so the session orchestrator has something
//! concrete to call without pulling in MIB/OID machinery.

use bytes::Bytes;

use crate::ber::{Decoder, tag};
use crate::error::{DecodeErrorKind, Error, Result};

/// Pre-marshalled PDU body bytes, opaque to this crate.
///
/// Callers that own the real PDU codec pass already-encoded bytes in; this
/// crate only needs to place them inside the Scoped PDU and, on the way
/// back, hand the raw bytes onward unparsed.
#[derive(Debug, Clone)]
pub struct OpaquePdu(pub Bytes);

impl OpaquePdu {
    /// Wrap already-encoded PDU bytes (including their outer tag/length).
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Build a minimal empty GetRequest, used for the engine-discovery probe.
    pub fn empty_get_request(request_id: i32) -> Self {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_constructed(tag::pdu::GET_REQUEST, |buf| {
            buf.push_sequence(|_| {});
            buf.push_integer(0);
            buf.push_integer(0);
            buf.push_integer(request_id);
        });
        Self(buf.finish())
    }

    /// True if the outer tag is the Report PDU tag (0xA8).
    pub fn is_report(&self) -> bool {
        self.0.first().copied() == Some(tag::pdu::REPORT)
    }

    /// Outer tag byte, if present.
    pub fn tag(&self) -> Result<u8> {
        self.0
            .first()
            .copied()
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::TruncatedData))
    }
}

/// Read one opaque, already-tagged PDU value from `dec`, consuming exactly
/// its tag/length/content.
pub fn read_opaque_pdu(dec: &mut Decoder) -> Result<OpaquePdu> {
    let t = dec.read_tag()?;
    let len = dec.read_length()?;
    let content = dec.read_raw(len)?;
    let mut full = Vec::with_capacity(2 + content.len());
    full.push(t);
    full.extend(crate::ber::encode_length_wire(len));
    full.extend_from_slice(&content);
    Ok(OpaquePdu(Bytes::from(full)))
}
