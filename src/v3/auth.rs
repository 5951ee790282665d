//! Key derivation and HMAC authentication (RFC 3414 §A.2, §6.3).

use super::AuthProtocol;
use crate::error::{AuthErrorKind, CryptoErrorKind, Error, Result};
use digest::Digest;
use hmac::{Hmac, Mac};
use md5::Md5;
use sha1::Sha1;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Number of bytes of the expanded passphrase stream, per RFC 3414 §A.2.1.
const EXPANSION_LEN: usize = 1_048_576;

/// A key derived from a passphrase and engine id, zeroized on drop.
///
/// Produced by [`derive_key`]. Length is 16 bytes for MD5, 20 for SHA1.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct LocalizedKey(Vec<u8>);

impl LocalizedKey {
    /// Borrow the raw key bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Key length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True if the key is empty (`NoAuth`).
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for LocalizedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalizedKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Expand `passphrase` to [`EXPANSION_LEN`] bytes by cycling it, returning
/// `H(expansion)`. RFC 3414 §A.2.1 step 1-2.
fn expand_and_digest(protocol: AuthProtocol, passphrase: &[u8]) -> Result<Vec<u8>> {
    if passphrase.is_empty() {
        return Err(Error::CryptoInit {
            kind: crate::error::CryptoErrorKind::InvalidKeyLength,
        });
    }
    match protocol {
        AuthProtocol::NoAuth => Ok(Vec::new()),
        AuthProtocol::Md5 => {
            let mut hasher = Md5::new();
            digest_expansion(&mut hasher, passphrase);
            Ok(hasher.finalize().to_vec())
        }
        AuthProtocol::Sha1 => {
            let mut hasher = Sha1::new();
            digest_expansion(&mut hasher, passphrase);
            Ok(hasher.finalize().to_vec())
        }
    }
}

/// Feed `EXPANSION_LEN` cycled bytes of `passphrase` into `hasher` in fixed
/// chunks, avoiding an actual 1 MiB allocation.
fn digest_expansion<D: Digest>(hasher: &mut D, passphrase: &[u8]) {
    let mut chunk = [0u8; 64];
    let mut produced = 0usize;
    let mut cursor = 0usize;
    while produced < EXPANSION_LEN {
        let take = (EXPANSION_LEN - produced).min(chunk.len());
        for slot in chunk.iter_mut().take(take) {
            *slot = passphrase[cursor % passphrase.len()];
            cursor += 1;
        }
        hasher.update(&chunk[..take]);
        produced += take;
    }
}

/// Localize a master digest against an engine id: `H(digest || engine_id || digest)`.
/// RFC 3414 §A.2.1 step 3 / §A.2.2 step 2.
fn localize(protocol: AuthProtocol, digest: &[u8], engine_id: &[u8]) -> Vec<u8> {
    match protocol {
        AuthProtocol::NoAuth => Vec::new(),
        AuthProtocol::Md5 => {
            let mut hasher = Md5::new();
            hasher.update(digest);
            hasher.update(engine_id);
            hasher.update(digest);
            hasher.finalize().to_vec()
        }
        AuthProtocol::Sha1 => {
            let mut hasher = Sha1::new();
            hasher.update(digest);
            hasher.update(engine_id);
            hasher.update(digest);
            hasher.finalize().to_vec()
        }
    }
}

/// Derive a localized key from a passphrase and engine id (RFC 3414 §A.2).
///
/// `protocol` selects MD5 or SHA1. Note that for the privacy key, the
/// *authentication* protocol's hash is always used regardless of the
/// configured privacy protocol — this is intentional, load-bearing RFC
/// behavior, not an oversight.
pub fn derive_key(protocol: AuthProtocol, passphrase: &[u8], engine_id: &[u8]) -> Result<LocalizedKey> {
    let digest = expand_and_digest(protocol, passphrase)?;
    Ok(LocalizedKey(localize(protocol, &digest, engine_id)))
}

type HmacMd5 = Hmac<Md5>;
type HmacSha1 = Hmac<Sha1>;

/// Compute the 12-byte truncated HMAC over `message`, using `key`.
///
/// `message` must already have its MAC slot zeroed (the caller — the
/// marshaller — is responsible for that since it owns the slot's offset).
pub fn compute(protocol: AuthProtocol, key: &LocalizedKey, message: &[u8]) -> Result<[u8; 12]> {
    if !protocol.is_auth() {
        return Err(Error::auth(AuthErrorKind::NoCredentials));
    }
    if key.is_empty() {
        return Err(Error::auth(AuthErrorKind::NoAuthKey));
    }
    let full = match protocol {
        AuthProtocol::Md5 => {
            let mut mac =
                HmacMd5::new_from_slice(key.as_bytes()).map_err(|_| Error::auth(AuthErrorKind::NoAuthKey))?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::Sha1 => {
            let mut mac = HmacSha1::new_from_slice(key.as_bytes())
                .map_err(|_| Error::auth(AuthErrorKind::NoAuthKey))?;
            mac.update(message);
            mac.finalize().into_bytes().to_vec()
        }
        AuthProtocol::NoAuth => unreachable!("checked above"),
    };
    let mut out = [0u8; 12];
    out.copy_from_slice(&full[..12]);
    Ok(out)
}

/// Verify a 12-byte MAC over `message` (MAC slot already zeroed) in
/// constant time.
pub fn verify(protocol: AuthProtocol, key: &LocalizedKey, message: &[u8], expected: &[u8]) -> Result<()> {
    if expected.len() != 12 {
        return Err(Error::auth(AuthErrorKind::WrongMacLength {
            expected: 12,
            actual: expected.len(),
        }));
    }
    let computed = compute(protocol, key, message)?;
    if computed.ct_eq(expected).into() {
        Ok(())
    } else {
        Err(Error::AuthMismatch { target: None })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::decode_hex;
    use proptest::prelude::*;

    #[test]
    fn s1_rfc3414_md5_appendix_a() {
        let engine_id = decode_hex("000000000000000000000002").unwrap();
        let key = derive_key(AuthProtocol::Md5, b"maplesyrup", &engine_id).unwrap();
        assert_eq!(
            key.as_bytes(),
            &decode_hex("526f5eed9fcce26f8964c2930787d82b").unwrap()[..]
        );
    }

    #[test]
    fn s2_rfc3414_sha1_appendix_a() {
        let engine_id = decode_hex("000000000000000000000002").unwrap();
        let key = derive_key(AuthProtocol::Sha1, b"maplesyrup", &engine_id).unwrap();
        assert_eq!(
            key.as_bytes(),
            &decode_hex("6695febc9288e36282235fc7151f128497b38f3f").unwrap()[..]
        );
    }

    #[test]
    fn derive_key_is_deterministic() {
        let engine_id = b"\x80\x00\x00\x00\x01";
        let k1 = derive_key(AuthProtocol::Sha1, b"testpassword", engine_id).unwrap();
        let k2 = derive_key(AuthProtocol::Sha1, b"testpassword", engine_id).unwrap();
        assert_eq!(k1.as_bytes(), k2.as_bytes());
        assert_eq!(k1.len(), 20);
    }

    #[test]
    fn mac_round_trip_and_tamper_detection() {
        let engine_id = b"\x80\x00\x00\x00\x01";
        let key = derive_key(AuthProtocol::Md5, b"testpassword", engine_id).unwrap();
        let mut message = vec![0u8; 40];
        message[10..22].fill(0); // MAC slot pre-zeroed
        let mac = compute(AuthProtocol::Md5, &key, &message).unwrap();
        message[10..22].copy_from_slice(&mac);

        let mut scratch = message.clone();
        scratch[10..22].fill(0);
        verify(AuthProtocol::Md5, &key, &scratch, &mac).unwrap();

        let mut tampered = message.clone();
        tampered[0] ^= 0x01;
        tampered[10..22].fill(0);
        assert!(verify(AuthProtocol::Md5, &key, &tampered, &mac).is_err());

        let mut bad_mac = mac;
        bad_mac[0] ^= 0x01;
        assert!(verify(AuthProtocol::Md5, &key, &scratch, &bad_mac).is_err());
    }

    proptest! {
        /// Verifying a message authenticated by `compute` always succeeds,
        /// and flipping any single bit of the message body always fails.
        #[test]
        fn mac_verify_round_trip_and_single_bit_flip(
            protocol in prop_oneof![Just(AuthProtocol::Md5), Just(AuthProtocol::Sha1)],
            passphrase in "[ -~]{8,40}",
            engine_id in proptest::collection::vec(any::<u8>(), 5..=32),
            mut message in proptest::collection::vec(any::<u8>(), 20..80),
            flip_index in 0usize..80,
        ) {
            let key = derive_key(protocol, passphrase.as_bytes(), &engine_id).unwrap();
            let slot = message.len().saturating_sub(12);
            message[slot..].fill(0);

            let mac = compute(protocol, &key, &message).unwrap();
            message[slot..].copy_from_slice(&mac);

            let mut scratch = message.clone();
            scratch[slot..].fill(0);
            prop_assert!(verify(protocol, &key, &scratch, &mac).is_ok());

            // Flip a bit in the body (everything before the MAC slot, which
            // `scratch` always zeroes regardless): a body flip changes the
            // hashed input and must be caught.
            let mut tampered = scratch.clone();
            let idx = flip_index % slot;
            tampered[idx] ^= 0x01;
            prop_assert!(verify(protocol, &key, &tampered, &mac).is_err());

            // Flip a bit of the MAC itself: the body is untouched but the
            // expected value no longer matches what was computed.
            let mut bad_mac = mac;
            bad_mac[flip_index % 12] ^= 0x01;
            prop_assert!(verify(protocol, &key, &scratch, &bad_mac).is_err());
        }

        /// `derive_key` is a pure function of its inputs.
        #[test]
        fn derive_key_deterministic_for_any_input(
            protocol in prop_oneof![Just(AuthProtocol::Md5), Just(AuthProtocol::Sha1)],
            passphrase in "[ -~]{8,40}",
            engine_id in proptest::collection::vec(any::<u8>(), 5..=32),
        ) {
            let a = derive_key(protocol, passphrase.as_bytes(), &engine_id).unwrap();
            let b = derive_key(protocol, passphrase.as_bytes(), &engine_id).unwrap();
            prop_assert_eq!(a.as_bytes(), b.as_bytes());
            prop_assert_eq!(a.len(), protocol.digest_len());
        }
    }
}
