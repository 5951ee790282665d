//! The SNMPv3 message codec: marshals an in-memory message to the exact
//! byte sequence RFC 3412 §6 / RFC 3414 define, and parses it back.
//!
//! Both directions work on the full message — header, USM parameters,
//! Scoped PDU — in one pass; the authentication MAC itself is computed and
//! verified by [`super::auth`] over the buffers this module hands back.

use bytes::Bytes;

use super::flags::MsgFlags;
use super::privacy;
use super::privacy::PrivKey;
use super::usm::UsmSecurityParams;
use super::PrivProtocol;
use crate::ber::{Decoder, EncodeBuf, encode_length_wire, tag};
use crate::error::{AuthErrorKind, CryptoErrorKind, DecodeErrorKind, Error, Result};
use crate::pdu::{self, OpaquePdu};

const VERSION_V3: i32 = 3;

/// `msgSecurityModel` value for USM (RFC 3414 §5).
pub const SECURITY_MODEL_USM: i32 = 3;

/// RFC 3412 §6: the smallest `msgMaxSize` a conforming implementation may
/// advertise or accept.
pub const RFC3412_MIN_MSG_MAX_SIZE: i32 = 484;

/// Largest BER length this codec will emit; well above any realistic UDP
/// datagram, kept as a sanity backstop against runaway PDU bodies.
const MAX_MARSHAL_LEN: usize = 1 << 24;

/// The `(ContextEngineID, ContextName, PDU)` tuple, optionally encrypted on
/// the wire (RFC 3414 §3.2, step 7 / §8).
#[derive(Debug, Clone)]
pub struct ScopedPdu {
    pub context_engine_id: Vec<u8>,
    pub context_name: Vec<u8>,
    pub pdu: OpaquePdu,
}

/// Security parameters as read off the wire, before being folded into a
/// session's [`UsmSecurityParams`].
///
/// Kept distinct from `UsmSecurityParams` because a just-parsed message
/// carries no localized keys or salt counter — those are session state,
/// not wire state.
#[derive(Debug, Clone, Default)]
pub struct WireUsmParams {
    pub engine_id: Vec<u8>,
    pub engine_boots: u32,
    pub engine_time: u32,
    pub user_name: Vec<u8>,
    pub auth_params: Vec<u8>,
    pub priv_params: Vec<u8>,
}

/// A fully-populated SNMPv3 message ready to marshal.
///
/// `security_params` is a packet-level copy (see [`UsmSecurityParams::copy`])
/// already refreshed from the session and, for `AuthPriv`, already carrying
/// a freshly allocated salt in `priv_params` and a derived `priv_key`.
#[derive(Debug, Clone)]
pub struct V3Message {
    pub msg_id: i32,
    pub max_msg_size: i32,
    pub msg_flags: MsgFlags,
    pub security_params: UsmSecurityParams,
    pub scoped_pdu: ScopedPdu,
}

/// The marshalled bytes plus where the 12-byte MAC slot begins, if any.
///
/// `auth_offset` is an absolute byte offset into `bytes` at which 12
/// contiguous zero bytes sit, ready for [`super::auth::compute`] to fill in.
#[derive(Debug, Clone)]
pub struct Marshalled {
    pub bytes: Bytes,
    pub auth_offset: Option<usize>,
}

/// A parsed SNMPv3 message.
#[derive(Debug, Clone)]
pub struct Unmarshalled {
    pub version: i32,
    pub msg_id: i32,
    pub max_msg_size: i32,
    pub msg_flags: MsgFlags,
    pub security_params: WireUsmParams,
    pub scoped_pdu: ScopedPdu,
    /// Absolute offset of the 12-byte MAC slot in the *received* buffer
    /// (`raw`), if the auth flag was set.
    pub auth_offset: Option<usize>,
    /// The buffer exactly as received, before any in-place zeroing.
    pub raw: Bytes,
}

impl Unmarshalled {
    /// Build the scratch buffer authentication verification runs over: a
    /// copy of `raw` with the 12-byte MAC slot zeroed in place.
    ///
    /// Returns `None` if the message carries no auth parameters to zero.
    pub fn auth_scratch(&self) -> Option<Vec<u8>> {
        let offset = self.auth_offset?;
        let mut scratch = self.raw.to_vec();
        scratch[offset..offset + 12].fill(0);
        Some(scratch)
    }
}

fn header_len(content_len: usize) -> usize {
    1 + encode_length_wire(content_len).len()
}

fn tlv(tag_byte: u8, content: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(header_len(content.len()) + content.len());
    out.push(tag_byte);
    out.extend(encode_length_wire(content.len()));
    out.extend_from_slice(content);
    out
}

fn minimal_integer(value: i32) -> Vec<u8> {
    let mut buf = EncodeBuf::new();
    buf.push_integer(value);
    buf.finish_vec()
}

fn minimal_unsigned32(value: u32) -> Vec<u8> {
    let mut buf = EncodeBuf::new();
    buf.push_unsigned32(tag::universal::INTEGER, value);
    buf.finish_vec()
}

fn fixed_msg_id(value: i32) -> Vec<u8> {
    let mut buf = EncodeBuf::new();
    buf.push_integer_fixed4(value);
    buf.finish_vec()
}

fn scoped_pdu_plaintext(s: &ScopedPdu) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend(tlv(tag::universal::OCTET_STRING, &s.context_engine_id));
    content.extend(tlv(tag::universal::OCTET_STRING, &s.context_name));
    content.extend_from_slice(&s.pdu.0);
    tlv(tag::universal::SEQUENCE, &content)
}

/// Marshal a complete SNMPv3 message.
///
/// Encryption of the Scoped PDU (if `msg_flags` has the priv bit) happens
/// before the outer length headers are computed, since ciphertext length
/// feeds into them. The auth MAC slot, if present, is emitted pre-zeroed;
/// the caller authenticates afterward using the returned `auth_offset`.
pub fn marshal(msg: &V3Message) -> Result<Marshalled> {
    let sp = &msg.security_params;

    let plain = scoped_pdu_plaintext(&msg.scoped_pdu);
    let scoped_part: Vec<u8> = if msg.msg_flags.has_priv() {
        if sp.priv_protocol == PrivProtocol::NoPriv {
            return Err(Error::CryptoInit {
                kind: CryptoErrorKind::UnsupportedProtocol,
            });
        }
        let priv_key: &PrivKey = sp.priv_key.as_ref().ok_or(Error::CryptoInit {
            kind: CryptoErrorKind::NoPrivKey,
        })?;
        let wire_salt: [u8; 8] =
            sp.priv_params
                .as_slice()
                .try_into()
                .map_err(|_| Error::CryptoInit {
                    kind: CryptoErrorKind::InvalidPrivParamsLength {
                        expected: 8,
                        actual: sp.priv_params.len(),
                    },
                })?;
        let ciphertext = match sp.priv_protocol {
            PrivProtocol::Des => privacy::des_encrypt(priv_key, &wire_salt, &plain)?,
            PrivProtocol::Aes128 => {
                privacy::aes_encrypt(priv_key, sp.engine_boots, sp.engine_time, &wire_salt, &plain)?
            }
            PrivProtocol::NoPriv => unreachable!("checked above"),
        };
        tlv(tag::universal::OCTET_STRING, &ciphertext)
    } else {
        plain
    };

    let engine_id_tlv = tlv(tag::universal::OCTET_STRING, &sp.engine_id);
    let boots_tlv = minimal_unsigned32(sp.engine_boots);
    let time_tlv = minimal_unsigned32(sp.engine_time);
    let user_tlv = tlv(tag::universal::OCTET_STRING, &sp.user_name);

    let auth_content_len = if msg.msg_flags.has_auth() { 12 } else { 0 };
    let auth_tlv = tlv(tag::universal::OCTET_STRING, &vec![0u8; auth_content_len]);
    let auth_rel_offset_in_sp = engine_id_tlv.len()
        + boots_tlv.len()
        + time_tlv.len()
        + user_tlv.len()
        + header_len(auth_content_len);

    let priv_params_for_wire: &[u8] = if msg.msg_flags.has_priv() {
        &sp.priv_params
    } else {
        &[]
    };
    let priv_tlv = tlv(tag::universal::OCTET_STRING, priv_params_for_wire);

    let mut sp_content = Vec::new();
    sp_content.extend(engine_id_tlv);
    sp_content.extend(boots_tlv);
    sp_content.extend(time_tlv);
    sp_content.extend(user_tlv);
    sp_content.extend(&auth_tlv);
    sp_content.extend(priv_tlv);

    let auth_offset_in_sp_seq = header_len(sp_content.len()) + auth_rel_offset_in_sp;
    let sp_seq = tlv(tag::universal::SEQUENCE, &sp_content);

    let auth_offset_in_sp_octetstring = header_len(sp_seq.len()) + auth_offset_in_sp_seq;
    let sp_octetstring = tlv(tag::universal::OCTET_STRING, &sp_seq);

    let mut header_content = Vec::new();
    header_content.extend(fixed_msg_id(msg.msg_id));
    header_content.extend(minimal_integer(msg.max_msg_size));
    header_content.extend(tlv(
        tag::universal::OCTET_STRING,
        &[msg.msg_flags.as_byte()],
    ));
    header_content.extend(minimal_integer(SECURITY_MODEL_USM));
    let header_seq = tlv(tag::universal::SEQUENCE, &header_content);

    let version_tlv = minimal_integer(VERSION_V3);

    let mut top = Vec::with_capacity(
        version_tlv.len() + header_seq.len() + sp_octetstring.len() + scoped_part.len(),
    );
    top.extend(&version_tlv);
    top.extend(&header_seq);
    let sp_offset_in_top = top.len();
    top.extend(&sp_octetstring);
    top.extend(&scoped_part);

    let auth_offset = msg
        .msg_flags
        .has_auth()
        .then(|| header_len(top.len()) + sp_offset_in_top + auth_offset_in_sp_octetstring);

    if top.len() > MAX_MARSHAL_LEN {
        return Err(Error::MarshalOverflow {
            size: top.len(),
            max: MAX_MARSHAL_LEN,
        });
    }

    let out = tlv(tag::universal::SEQUENCE, &top);
    Ok(Marshalled {
        bytes: Bytes::from(out),
        auth_offset,
    })
}

fn parse_scoped_pdu_content(dec: &mut Decoder) -> Result<ScopedPdu> {
    let context_engine_id = dec.read_octet_string()?.to_vec();
    let context_name = dec.read_octet_string()?.to_vec();
    let pdu = pdu::read_opaque_pdu(dec)?;
    Ok(ScopedPdu {
        context_engine_id,
        context_name,
        pdu,
    })
}

/// Unmarshal a complete SNMPv3 message.
///
/// `params`, when present, supplies the privacy protocol and localized key
/// needed to decrypt an encrypted Scoped PDU; pass `None` only when the
/// message is known not to carry privacy (e.g. an engine-discovery report).
/// The MAC slot is *not* zeroed in `data` itself — call
/// [`Unmarshalled::auth_scratch`] to get the buffer authentication runs
/// over, so `data`/`raw` always reflects exactly what was received.
pub fn unmarshal(data: Bytes, params: Option<&UsmSecurityParams>) -> Result<Unmarshalled> {
    let mut dec = Decoder::new(data.clone());

    dec.expect_tag(tag::universal::SEQUENCE)?;
    let version = dec.read_integer()?;
    if version != VERSION_V3 {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::UnknownVersion(version),
        ));
    }

    dec.expect_tag(tag::universal::SEQUENCE)?;
    let msg_id = dec.read_integer()?;
    let max_msg_size = dec.read_integer()?;
    if max_msg_size < RFC3412_MIN_MSG_MAX_SIZE {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::MsgMaxSizeTooSmall {
                value: max_msg_size,
                minimum: RFC3412_MIN_MSG_MAX_SIZE,
            },
        ));
    }
    let flags_byte = dec.read_octet_string()?;
    if flags_byte.len() != 1 {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::InvalidMsgFlags,
        ));
    }
    let msg_flags = MsgFlags::from_byte(flags_byte[0])?;
    let security_model = dec.read_integer()?;
    if security_model != SECURITY_MODEL_USM {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::UnknownSecurityModel(security_model),
        ));
    }

    dec.expect_tag(tag::universal::OCTET_STRING)?;
    dec.expect_tag(tag::universal::SEQUENCE)?;

    let engine_id = dec.read_octet_string()?.to_vec();
    if !engine_id.is_empty() && !(5..=32).contains(&engine_id.len()) {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::InvalidEngineIdLength {
                length: engine_id.len(),
            },
        ));
    }
    let engine_boots = dec.read_unsigned32(tag::universal::INTEGER)?;
    let engine_time = dec.read_unsigned32(tag::universal::INTEGER)?;
    let user_name = dec.read_octet_string()?.to_vec();
    if user_name.len() > 32 {
        return Err(Error::decode(
            dec.position(),
            DecodeErrorKind::InvalidUserNameLength {
                length: user_name.len(),
            },
        ));
    }

    let auth_len = dec.expect_tag(tag::universal::OCTET_STRING)?;
    let auth_offset_candidate = dec.position();
    let auth_params = dec.read_raw(auth_len)?.to_vec();
    if msg_flags.has_auth() && auth_params.len() != 12 {
        return Err(Error::auth(AuthErrorKind::WrongMacLength {
            expected: 12,
            actual: auth_params.len(),
        }));
    }
    let auth_offset = msg_flags.has_auth().then_some(auth_offset_candidate);

    let priv_params = dec.read_octet_string()?.to_vec();
    if msg_flags.has_priv() && priv_params.len() != 8 {
        return Err(Error::CryptoInit {
            kind: CryptoErrorKind::InvalidPrivParamsLength {
                expected: 8,
                actual: priv_params.len(),
            },
        });
    }

    let next_tag = dec.peek_tag()?;
    let scoped_pdu = if msg_flags.has_priv() {
        if next_tag != tag::universal::OCTET_STRING {
            return Err(Error::decode(
                dec.position(),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::OCTET_STRING,
                    actual: next_tag,
                },
            ));
        }
        let ciphertext = dec.read_octet_string()?;
        let params = params.ok_or(Error::CryptoInit {
            kind: CryptoErrorKind::NoPrivKey,
        })?;
        let priv_key = params.priv_key.as_ref().ok_or(Error::CryptoInit {
            kind: CryptoErrorKind::NoPrivKey,
        })?;
        let wire_salt: [u8; 8] = priv_params
            .as_slice()
            .try_into()
            .map_err(|_| Error::CryptoInit {
                kind: CryptoErrorKind::InvalidPrivParamsLength {
                    expected: 8,
                    actual: priv_params.len(),
                },
            })?;
        let plaintext = match params.priv_protocol {
            PrivProtocol::Des => privacy::des_decrypt(priv_key, &wire_salt, &ciphertext)?,
            PrivProtocol::Aes128 => {
                privacy::aes_decrypt(priv_key, engine_boots, engine_time, &wire_salt, &ciphertext)?
            }
            PrivProtocol::NoPriv => {
                return Err(Error::CryptoInit {
                    kind: CryptoErrorKind::UnsupportedProtocol,
                });
            }
        };
        let mut pdec = Decoder::new(Bytes::from(plaintext));
        let mut scoped_dec = pdec.read_sequence()?;
        parse_scoped_pdu_content(&mut scoped_dec)?
    } else {
        if next_tag != tag::universal::SEQUENCE {
            return Err(Error::decode(
                dec.position(),
                DecodeErrorKind::UnexpectedTag {
                    expected: tag::universal::SEQUENCE,
                    actual: next_tag,
                },
            ));
        }
        let mut scoped_dec = dec.read_sequence()?;
        parse_scoped_pdu_content(&mut scoped_dec)?
    };

    Ok(Unmarshalled {
        version,
        msg_id,
        max_msg_size,
        msg_flags,
        security_params: WireUsmParams {
            engine_id,
            engine_boots,
            engine_time,
            user_name,
            auth_params,
            priv_params,
        },
        scoped_pdu,
        auth_offset,
        raw: data,
    })
}
