//! BER length octet encoding/decoding (X.690 §8.1.3).
//!
//! Short form is used for lengths 0..=127 (a single octet). Long form is
//! used above that: one octet with the high bit set carrying the count of
//! subsequent length octets, followed by the length in big-endian.

use crate::error::{DecodeErrorKind, Error};

/// Maximum number of long-form length octets we will ever emit or accept.
///
/// `usize` on a 64-bit target never needs more than 8 octets; we cap at a
/// smaller number to reject obviously-hostile length prefixes early.
const MAX_LENGTH_OCTETS: usize = 8;

/// Encode a BER length for the reverse-buffer encoder.
///
/// Returns a stack array and the number of valid bytes; the valid bytes are
/// in the order `EncodeBuf` expects to push them (most-significant byte of
/// the long form last, so pushing `bytes[..count]` one at a time prepends
/// correctly when the whole buffer is reversed at the end).
pub fn encode_length(len: usize) -> ([u8; 9], usize) {
    let mut out = [0u8; 9];

    if len <= 0x7f {
        out[0] = len as u8;
        return (out, 1);
    }

    let be = len.to_be_bytes();
    let first_nonzero = be.iter().position(|&b| b != 0).unwrap_or(be.len() - 1);
    let content = &be[first_nonzero..];
    let n = content.len();

    // out[0] is pushed first (becomes the last byte before tag after reversal),
    // so content goes at out[0..n] and the long-form header octet at out[n].
    out[..n].copy_from_slice(content);
    out[n] = 0x80 | (n as u8);
    (out, n + 1)
}

/// Parse a BER length field.
///
/// Returns `(value, consumed_octets)`. Rejects indefinite length (0x80) and
/// reserved long form (0xFF): permissive on content, strict on the
/// wire-format escapes that have no meaning for SNMP's definite-length-only
/// encoding.
pub fn decode_length(buf: &[u8]) -> Result<(usize, usize), Error> {
    let first = *buf
        .first()
        .ok_or_else(|| Error::decode(0, DecodeErrorKind::TruncatedData))?;

    if first & 0x80 == 0 {
        return Ok((first as usize, 1));
    }

    if first == 0x80 {
        return Err(Error::decode(0, DecodeErrorKind::IndefiniteLength));
    }
    if first == 0xff {
        return Err(Error::decode(0, DecodeErrorKind::InvalidLength));
    }

    let octets = (first & 0x7f) as usize;
    if octets > MAX_LENGTH_OCTETS {
        return Err(Error::decode(0, DecodeErrorKind::LengthTooLong { octets }));
    }
    if buf.len() < 1 + octets {
        return Err(Error::decode(0, DecodeErrorKind::TruncatedData));
    }

    let mut value: usize = 0;
    for &b in &buf[1..1 + octets] {
        value = value
            .checked_shl(8)
            .and_then(|v| v.checked_add(b as usize))
            .ok_or_else(|| Error::decode(0, DecodeErrorKind::LengthExceedsMax {
                length: usize::MAX,
                max: usize::MAX,
            }))?;
    }

    Ok((value, 1 + octets))
}

/// Encode a BER length in wire order (header octet first for long form).
///
/// Unlike [`encode_length`], which returns bytes in the order `EncodeBuf`'s
/// reverse buffer expects to push them, this is for callers building TLVs
/// forward (content already known, tag+length prepended in the usual way).
pub fn encode_length_wire(len: usize) -> Vec<u8> {
    let (arr, n) = encode_length(len);
    if n == 1 {
        vec![arr[0]]
    } else {
        let mut out = Vec::with_capacity(n);
        out.push(arr[n - 1]);
        out.extend_from_slice(&arr[..n - 1]);
        out
    }
}
