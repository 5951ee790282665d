//! Privacy engine: DES-CBC and AES-128-CFB encryption of the Scoped PDU
//! (RFC 3414 §8, RFC 3826).

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use aes::Aes128;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit, StreamCipher};
use des::Des;
use getrandom::fill;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::PrivProtocol;
use crate::error::{CryptoErrorKind, Error, Result};

type DesCbcEnc = cbc::Encryptor<Des>;
type DesCbcDec = cbc::Decryptor<Des>;
type Aes128Cfb = cfb_mode::Encryptor<Aes128>;
type Aes128CfbDec = cfb_mode::Decryptor<Aes128>;

const DES_BLOCK: usize = 8;

/// The privacy-localized key, zeroized on drop.
///
/// Holds up to 16 bytes: for DES, bytes `0..8` are the cipher key and
/// `8..16` are the pre-IV; for AES, bytes `0..16` are the cipher key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct PrivKey(Vec<u8>);

impl PrivKey {
    /// Wrap localized key bytes. `bytes` must be at least
    /// `protocol.key_len()` long; only the first `key_len()` bytes are kept.
    pub fn new(protocol: PrivProtocol, bytes: &[u8]) -> Result<Self> {
        let needed = protocol.key_len();
        if bytes.len() < needed {
            return Err(Error::CryptoInit {
                kind: CryptoErrorKind::InvalidKeyLength,
            });
        }
        Ok(Self(bytes[..needed].to_vec()))
    }

    fn des_key(&self) -> &[u8] {
        &self.0[..8]
    }

    fn des_pre_iv(&self) -> &[u8] {
        &self.0[8..16]
    }

    fn aes_key(&self) -> &[u8] {
        &self.0[..16]
    }
}

impl std::fmt::Debug for PrivKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrivKey")
            .field("len", &self.0.len())
            .finish_non_exhaustive()
    }
}

/// Monotonic, randomly-seeded salt counters for a session (RFC 3414 §8.1.1.1).
///
/// `localDESSalt` wraps within 32 bits per boot (acceptable per the RFC);
/// `localAESSalt` is 64 bits and effectively never wraps.
pub struct SaltCounter {
    des: AtomicU32,
    aes: AtomicU64,
}

impl SaltCounter {
    /// Create a counter seeded from a cryptographic RNG.
    pub fn new() -> Result<Self> {
        let mut seed = [0u8; 12];
        fill(&mut seed).map_err(|_| Error::CryptoInit {
            kind: CryptoErrorKind::InvalidKeyLength,
        })?;
        let des = u32::from_be_bytes(seed[0..4].try_into().unwrap());
        let aes = u64::from_be_bytes(seed[4..12].try_into().unwrap());
        Ok(Self {
            des: AtomicU32::new(des),
            aes: AtomicU64::new(aes),
        })
    }

    /// Atomically advance and return the new DES salt value.
    pub fn allocate_des(&self) -> u32 {
        self.des.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Atomically advance and return the new AES salt value.
    pub fn allocate_aes(&self) -> u64 {
        self.aes.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }
}

impl std::fmt::Debug for SaltCounter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaltCounter").finish_non_exhaustive()
    }
}

/// Build the 8-byte `msgPrivacyParameters` for DES: `engineBoots ‖ salt`.
pub fn des_wire_salt(engine_boots: u32, salt: u32) -> [u8; 8] {
    let mut out = [0u8; 8];
    out[0..4].copy_from_slice(&engine_boots.to_be_bytes());
    out[4..8].copy_from_slice(&salt.to_be_bytes());
    out
}

/// Build the 8-byte `msgPrivacyParameters` for AES: `salt` (64-bit BE).
pub fn aes_wire_salt(salt: u64) -> [u8; 8] {
    salt.to_be_bytes()
}

fn des_iv(key: &PrivKey, wire_salt: &[u8; 8]) -> [u8; 8] {
    let mut iv = [0u8; 8];
    for i in 0..8 {
        iv[i] = key.des_pre_iv()[i] ^ wire_salt[i];
    }
    iv
}

fn aes_iv(engine_boots: u32, engine_time: u32, wire_salt: &[u8; 8]) -> [u8; 16] {
    let mut iv = [0u8; 16];
    iv[0..4].copy_from_slice(&engine_boots.to_be_bytes());
    iv[4..8].copy_from_slice(&engine_time.to_be_bytes());
    iv[8..16].copy_from_slice(wire_salt);
    iv
}

/// Encrypt a plaintext Scoped PDU under DES-CBC, zero-padding to a multiple
/// of 8 bytes. Returns ciphertext.
pub fn des_encrypt(key: &PrivKey, wire_salt: &[u8; 8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let iv = des_iv(key, wire_salt);
    let pad = (DES_BLOCK - (plaintext.len() % DES_BLOCK)) % DES_BLOCK;
    let mut buf = plaintext.to_vec();
    buf.resize(buf.len() + pad, 0);

    let cipher = DesCbcEnc::new_from_slices(key.des_key(), &iv)
        .map_err(|_| Error::CryptoInit {
            kind: CryptoErrorKind::InvalidIvLength,
        })?;
    cipher
        .encrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf, plaintext.len() + pad)
        .map_err(|_| Error::CryptoInit {
            kind: CryptoErrorKind::InvalidKeyLength,
        })?;
    Ok(buf)
}

/// Decrypt a DES-CBC Scoped PDU ciphertext. `ciphertext.len()` must be a
/// multiple of 8; the caller is responsible for trimming any trailing
/// zero padding back to the declared outer SEQUENCE length.
pub fn des_decrypt(key: &PrivKey, wire_salt: &[u8; 8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || !ciphertext.len().is_multiple_of(DES_BLOCK) {
        return Err(Error::DecryptShape {
            length: ciphertext.len(),
            block_size: DES_BLOCK,
        });
    }
    let iv = des_iv(key, wire_salt);
    let mut buf = ciphertext.to_vec();
    let cipher = DesCbcDec::new_from_slices(key.des_key(), &iv)
        .map_err(|_| Error::CryptoInit {
            kind: CryptoErrorKind::InvalidIvLength,
        })?;
    cipher
        .decrypt_padded_mut::<cbc::cipher::block_padding::NoPadding>(&mut buf)
        .map_err(|_| Error::DecryptShape {
            length: ciphertext.len(),
            block_size: DES_BLOCK,
        })?;
    Ok(buf)
}

/// Encrypt a plaintext Scoped PDU under AES-128-CFB. Stream cipher: output
/// length equals input length, no padding.
pub fn aes_encrypt(
    key: &PrivKey,
    engine_boots: u32,
    engine_time: u32,
    wire_salt: &[u8; 8],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let iv = aes_iv(engine_boots, engine_time, wire_salt);
    let mut buf = plaintext.to_vec();
    let mut cipher = Aes128Cfb::new_from_slices(key.aes_key(), &iv).map_err(|_| Error::CryptoInit {
        kind: CryptoErrorKind::InvalidIvLength,
    })?;
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

/// Decrypt an AES-128-CFB Scoped PDU ciphertext.
pub fn aes_decrypt(
    key: &PrivKey,
    engine_boots: u32,
    engine_time: u32,
    wire_salt: &[u8; 8],
    ciphertext: &[u8],
) -> Result<Vec<u8>> {
    let iv = aes_iv(engine_boots, engine_time, wire_salt);
    let mut buf = ciphertext.to_vec();
    let mut cipher = Aes128CfbDec::new_from_slices(key.aes_key(), &iv).map_err(|_| Error::CryptoInit {
        kind: CryptoErrorKind::InvalidIvLength,
    })?;
    cipher.apply_keystream(&mut buf);
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_des_wire_salt_and_iv() {
        let wire_salt = des_wire_salt(1, 1);
        assert_eq!(wire_salt, [0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01]);

        let key = PrivKey::new(PrivProtocol::Des, &[0xAAu8; 16]).unwrap();
        let iv = des_iv(&key, &wire_salt);
        let expected: Vec<u8> = key
            .des_pre_iv()
            .iter()
            .zip(wire_salt.iter())
            .map(|(a, b)| a ^ b)
            .collect();
        assert_eq!(&iv[..], &expected[..]);
    }

    #[test]
    fn s6_aes_iv_construction() {
        let wire_salt = aes_wire_salt(42);
        assert_eq!(
            wire_salt,
            [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x2A]
        );
        let iv = aes_iv(5, 7777, &wire_salt);
        assert_eq!(
            iv,
            [
                0x00, 0x00, 0x00, 0x05, 0x00, 0x00, 0x1E, 0x61, 0x00, 0x00, 0x00, 0x00, 0x00,
                0x00, 0x00, 0x2A
            ]
        );
    }

    #[test]
    fn des_round_trip() {
        let key = PrivKey::new(PrivProtocol::Des, &[0x11u8; 16]).unwrap();
        let wire_salt = des_wire_salt(3, 9);
        let plaintext = b"hello scoped pdu";
        let ciphertext = des_encrypt(&key, &wire_salt, plaintext).unwrap();
        assert!(ciphertext.len().is_multiple_of(DES_BLOCK));
        let decrypted = des_decrypt(&key, &wire_salt, &ciphertext).unwrap();
        assert_eq!(&decrypted[..plaintext.len()], &plaintext[..]);
    }

    #[test]
    fn des_round_trip_with_padding() {
        let key = PrivKey::new(PrivProtocol::Des, &[0x22u8; 16]).unwrap();
        let wire_salt = des_wire_salt(1, 2);
        let plaintext = b"odd length data!"; // 16 bytes, but test uneven too
        let odd = &plaintext[..13];
        let ciphertext = des_encrypt(&key, &wire_salt, odd).unwrap();
        assert_eq!(ciphertext.len(), 16); // padded to next multiple of 8
        let decrypted = des_decrypt(&key, &wire_salt, &ciphertext).unwrap();
        assert_eq!(&decrypted[..odd.len()], odd);
    }

    #[test]
    fn des_decrypt_rejects_non_block_multiple() {
        let key = PrivKey::new(PrivProtocol::Des, &[0x33u8; 16]).unwrap();
        let wire_salt = des_wire_salt(1, 1);
        let err = des_decrypt(&key, &wire_salt, &[1, 2, 3]).unwrap_err();
        assert!(matches!(err, Error::DecryptShape { .. }));
    }

    #[test]
    fn aes_round_trip() {
        let key = PrivKey::new(PrivProtocol::Aes128, &[0x44u8; 16]).unwrap();
        let wire_salt = aes_wire_salt(7);
        let plaintext = b"scoped pdu of arbitrary length, not block aligned";
        let ciphertext = aes_encrypt(&key, 2, 300, &wire_salt, plaintext).unwrap();
        assert_eq!(ciphertext.len(), plaintext.len());
        let decrypted = aes_decrypt(&key, 2, 300, &wire_salt, &ciphertext).unwrap();
        assert_eq!(&decrypted[..], &plaintext[..]);
    }

    #[test]
    fn salt_counter_is_monotonic() {
        let counter = SaltCounter::new().unwrap();
        let a = counter.allocate_des();
        let b = counter.allocate_des();
        assert_eq!(b, a.wrapping_add(1));

        let a64 = counter.allocate_aes();
        let b64 = counter.allocate_aes();
        assert_eq!(b64, a64.wrapping_add(1));
    }

    proptest::proptest! {
        /// DES-CBC decrypt inverts encrypt, modulo the declared outer length
        /// (the padding needed to reach a multiple of 8).
        #[test]
        fn des_encrypt_decrypt_round_trip(
            key_bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 16..=16),
            engine_boots in proptest::prelude::any::<u32>(),
            salt in proptest::prelude::any::<u32>(),
            // A Scoped PDU SEQUENCE is never empty; des_decrypt rejects a
            // zero-length ciphertext outright (see des_decrypt_rejects_non_block_multiple).
            plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 1..200),
        ) {
            let key = PrivKey::new(PrivProtocol::Des, &key_bytes).unwrap();
            let wire_salt = des_wire_salt(engine_boots, salt);
            let ciphertext = des_encrypt(&key, &wire_salt, &plaintext).unwrap();
            let decrypted = des_decrypt(&key, &wire_salt, &ciphertext).unwrap();
            proptest::prop_assert_eq!(&decrypted[..plaintext.len()], &plaintext[..]);
            proptest::prop_assert!(decrypted[plaintext.len()..].iter().all(|&b| b == 0));
        }

        /// AES-128-CFB decrypt inverts encrypt exactly (stream cipher, no
        /// padding).
        #[test]
        fn aes_encrypt_decrypt_round_trip(
            key_bytes in proptest::collection::vec(proptest::prelude::any::<u8>(), 16..=16),
            engine_boots in proptest::prelude::any::<u32>(),
            engine_time in proptest::prelude::any::<u32>(),
            salt in proptest::prelude::any::<u64>(),
            plaintext in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..200),
        ) {
            let key = PrivKey::new(PrivProtocol::Aes128, &key_bytes).unwrap();
            let wire_salt = aes_wire_salt(salt);
            let ciphertext = aes_encrypt(&key, engine_boots, engine_time, &wire_salt, &plaintext).unwrap();
            proptest::prop_assert_eq!(ciphertext.len(), plaintext.len());
            let decrypted = aes_decrypt(&key, engine_boots, engine_time, &wire_salt, &ciphertext).unwrap();
            proptest::prop_assert_eq!(decrypted, plaintext);
        }
    }
}
