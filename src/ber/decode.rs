//! BER decoding.
//!
//! A straightforward forward-reading cursor over a byte slice. Unlike
//! `EncodeBuf`, decoding has no reason to run backwards: each TLV is read in
//! wire order and the cursor simply advances past it.

use super::length::decode_length;
use super::tag;
use crate::error::{DecodeErrorKind, Error, Result};
use bytes::Bytes;

/// Cursor over BER-encoded bytes.
pub struct Decoder {
    data: Bytes,
    pos: usize,
}

impl Decoder {
    /// Create a decoder over the given bytes.
    pub fn new(data: Bytes) -> Self {
        Self { data, pos: 0 }
    }

    /// Bytes remaining to be parsed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Current absolute offset into the original buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// True when no bytes remain.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    fn err(&self, kind: DecodeErrorKind) -> Error {
        Error::decode(self.pos, kind)
    }

    fn take(&mut self, n: usize) -> Result<Bytes> {
        if self.remaining() < n {
            return Err(self.err(DecodeErrorKind::InsufficientData {
                needed: n,
                available: self.remaining(),
            }));
        }
        let start = self.pos;
        self.pos += n;
        Ok(self.data.slice(start..self.pos))
    }

    /// Read a single tag octet.
    pub fn read_tag(&mut self) -> Result<u8> {
        if self.is_empty() {
            return Err(self.err(DecodeErrorKind::TruncatedData));
        }
        let t = self.data[self.pos];
        self.pos += 1;
        Ok(t)
    }

    /// Peek the next tag octet without consuming it.
    pub fn peek_tag(&self) -> Result<u8> {
        self.data
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.err(DecodeErrorKind::TruncatedData))
    }

    /// Read a length field, returning the decoded value.
    pub fn read_length(&mut self) -> Result<usize> {
        let (value, consumed) = decode_length(&self.data[self.pos..]).map_err(|e| match e {
            Error::Decode { kind, .. } => self.err(kind),
            other => other,
        })?;
        self.pos += consumed;
        if self.remaining() < value {
            return Err(self.err(DecodeErrorKind::InsufficientData {
                needed: value,
                available: self.remaining(),
            }));
        }
        Ok(value)
    }

    /// Expect a specific tag, returning the content length.
    pub fn expect_tag(&mut self, expected: u8) -> Result<usize> {
        let actual = self.read_tag()?;
        if actual != expected {
            return Err(self.err(DecodeErrorKind::UnexpectedTag { expected, actual }));
        }
        self.read_length()
    }

    /// Read raw bytes of the given length, advancing the cursor past them.
    pub fn read_raw(&mut self, len: usize) -> Result<Bytes> {
        self.take(len)
    }

    /// Enter a SEQUENCE, returning a bounded sub-decoder over its content.
    pub fn read_sequence(&mut self) -> Result<Decoder> {
        let len = self.expect_tag(tag::universal::SEQUENCE)?;
        let content = self.take(len)?;
        Ok(Decoder::new(content))
    }

    /// Read an OCTET STRING's raw bytes.
    pub fn read_octet_string(&mut self) -> Result<Bytes> {
        let tag = self.read_tag()?;
        if tag == super::tag::universal::OCTET_STRING_CONSTRUCTED {
            return Err(self.err(DecodeErrorKind::ConstructedOctetString));
        }
        if tag != super::tag::universal::OCTET_STRING {
            return Err(self.err(DecodeErrorKind::UnexpectedTag {
                expected: super::tag::universal::OCTET_STRING,
                actual: tag,
            }));
        }
        let len = self.read_length()?;
        self.take(len)
    }

    /// Read a NULL, verifying it has zero length.
    pub fn read_null(&mut self) -> Result<()> {
        let len = self.expect_tag(tag::universal::NULL)?;
        if len != 0 {
            return Err(self.err(DecodeErrorKind::InvalidNull));
        }
        Ok(())
    }

    /// Read a signed INTEGER.
    pub fn read_integer(&mut self) -> Result<i32> {
        let len = self.expect_tag(tag::universal::INTEGER)?;
        if len == 0 {
            return Err(self.err(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 4 {
            return Err(self.err(DecodeErrorKind::IntegerOverflow));
        }
        let bytes = self.take(len)?;
        let negative = bytes[0] & 0x80 != 0;
        let mut acc: i32 = if negative { -1 } else { 0 };
        for &b in bytes.iter() {
            acc = acc
                .checked_shl(8)
                .ok_or_else(|| self.err(DecodeErrorKind::IntegerOverflow))?
                | b as i32;
        }
        Ok(acc)
    }

    /// Read an unsigned integer encoded with a specific tag (e.g. engine
    /// boots/time), accepting RFC 3414's variable-length minimal encoding.
    ///
    /// A leading `0x00` sign-guard byte is tolerated; more than 5 content
    /// bytes or a value that overflows `u32` is rejected.
    pub fn read_unsigned32(&mut self, expected_tag: u8) -> Result<u32> {
        let len = self.expect_tag(expected_tag)?;
        if len == 0 {
            return Err(self.err(DecodeErrorKind::ZeroLengthInteger));
        }
        if len > 5 {
            return Err(self.err(DecodeErrorKind::IntegerOverflow));
        }
        let bytes = self.take(len)?;
        let mut acc: u64 = 0;
        for &b in bytes.iter() {
            acc = (acc << 8) | b as u64;
        }
        u32::try_from(acc).map_err(|_| self.err(DecodeErrorKind::IntegerOverflow))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_integer() {
        for v in [0i32, 1, 127, 128, -1, -128, -129, i32::MAX, i32::MIN] {
            let mut buf = crate::ber::EncodeBuf::new();
            buf.push_integer(v);
            let bytes = buf.finish();
            let mut dec = Decoder::new(bytes);
            assert_eq!(dec.read_integer().unwrap(), v);
            assert!(dec.is_empty());
        }
    }

    #[test]
    fn roundtrip_octet_string() {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_octet_string(b"hello world");
        let bytes = buf.finish();
        let mut dec = Decoder::new(bytes);
        assert_eq!(&dec.read_octet_string().unwrap()[..], b"hello world");
    }

    #[test]
    fn roundtrip_sequence() {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_sequence(|buf| {
            buf.push_integer(2);
            buf.push_integer(1);
        });
        let bytes = buf.finish();
        let mut dec = Decoder::new(bytes);
        let mut seq = dec.read_sequence().unwrap();
        assert_eq!(seq.read_integer().unwrap(), 1);
        assert_eq!(seq.read_integer().unwrap(), 2);
        assert!(seq.is_empty());
    }

    #[test]
    fn unsigned32_accepts_minimal_encoding() {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_unsigned32(tag::universal::INTEGER, 300);
        let bytes = buf.finish();
        let mut dec = Decoder::new(bytes);
        assert_eq!(dec.read_unsigned32(tag::universal::INTEGER).unwrap(), 300);
    }

    #[test]
    fn unexpected_tag_reports_position() {
        let mut buf = crate::ber::EncodeBuf::new();
        buf.push_integer(1);
        let bytes = buf.finish();
        let mut dec = Decoder::new(bytes);
        let err = dec.read_octet_string().unwrap_err();
        match err {
            Error::Decode { offset, kind } => {
                assert_eq!(offset, 0);
                assert!(matches!(kind, DecodeErrorKind::UnexpectedTag { .. }));
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
    }

    #[test]
    fn truncated_length_is_rejected() {
        let mut dec = Decoder::new(Bytes::from_static(&[0x30, 0x05, 0x02, 0x01]));
        assert!(dec.read_sequence().is_err());
    }
}
