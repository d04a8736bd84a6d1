//! WinZip-AES (method 99, strength 3) cipher (spec §4.2).
//!
//! PBKDF2-HMAC-SHA1 key derivation, AES-256-CTR with a little-endian 128-bit
//! counter, HMAC-SHA1 authentication truncated to 10 bytes, and a 2-byte
//! password verifier. Built on `aes`/`ctr`/`hmac`/`sha1`/`pbkdf2`, already
//! optional dependencies in the teacher's Cargo.toml under its `encryption`
//! feature and promoted to unconditional here since the spec treats AES as
//! core (DESIGN.md).
//!
//! Unlike the teacher's block-at-a-time hand rolled CTR, this uses `ctr`'s
//! `Ctr128LE<Aes256>` as a proper `StreamCipher`: it already tolerates
//! non-block-aligned `apply_keystream` calls across multiple invocations, so
//! no manual 16-byte buffering is needed on the encrypt side. The decrypt
//! side still buffers a tail, not for block alignment, but because the last
//! 10 bytes of any chunk might be the authentication tag rather than
//! ciphertext, and that can only be known once the stream ends.

use crate::error::{Result, ZipError};
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use ctr::Ctr128LE;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use sha1::Sha1;

type Aes256CtrLe = Ctr128LE<Aes256>;
type HmacSha1 = Hmac<Sha1>;

/// Salt size for AES-256 (spec §4.2).
pub const SALT_LEN: usize = 16;
/// Password-verifier size.
pub const VERIFIER_LEN: usize = 2;
/// Preamble = salt ‖ verifier.
pub const PREAMBLE_LEN: usize = SALT_LEN + VERIFIER_LEN;
/// Truncated HMAC-SHA1 authentication tag size.
pub const TAG_LEN: usize = 10;
/// PBKDF2 iteration count mandated by the WinZip AE-2 format.
const PBKDF2_ITERATIONS: u32 = 1000;
/// Derived key material: 32-byte AES key ‖ 32-byte HMAC key ‖ 2-byte verifier.
const DERIVED_KEY_LEN: usize = 32 + 32 + 2;

struct DerivedKeys {
    encryption_key: [u8; 32],
    hmac_key: [u8; 32],
    verifier: [u8; VERIFIER_LEN],
}

fn derive_keys(password: &[u8], salt: &[u8; SALT_LEN]) -> DerivedKeys {
    let mut dk = [0u8; DERIVED_KEY_LEN];
    pbkdf2_hmac::<Sha1>(password, salt, PBKDF2_ITERATIONS, &mut dk);
    DerivedKeys {
        encryption_key: dk[0..32].try_into().unwrap(),
        hmac_key: dk[32..64].try_into().unwrap(),
        verifier: [dk[64], dk[65]],
    }
}

/// Initial 128-bit little-endian counter value, `[1, 0, ..., 0]` (spec §4.2).
fn initial_counter() -> [u8; 16] {
    let mut counter = [0u8; 16];
    counter[0] = 1;
    counter
}

fn make_cipher(key: &[u8; 32]) -> Aes256CtrLe {
    Aes256CtrLe::new(key.into(), &initial_counter().into())
}

/// Write-side AES-CTR + HMAC-SHA1 stage.
pub struct AesEncryptStage {
    cipher: Aes256CtrLe,
    hmac: HmacSha1,
    salt: [u8; SALT_LEN],
    verifier: [u8; VERIFIER_LEN],
}

impl AesEncryptStage {
    /// Derive fresh keys from `password` and a random salt.
    pub fn new(password: &str) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        getrandom::getrandom(&mut salt)
            .map_err(|e| ZipError::BadFormat(format!("salt generation failed: {e}")))?;
        let keys = derive_keys(password.as_bytes(), &salt);
        let hmac = HmacSha1::new_from_slice(&keys.hmac_key).expect("HMAC accepts any key length");
        Ok(Self {
            cipher: make_cipher(&keys.encryption_key),
            hmac,
            salt,
            verifier: keys.verifier,
        })
    }

    /// The 18-byte preamble (salt ‖ verifier) to write before ciphertext.
    pub fn preamble(&self) -> [u8; PREAMBLE_LEN] {
        let mut out = [0u8; PREAMBLE_LEN];
        out[..SALT_LEN].copy_from_slice(&self.salt);
        out[SALT_LEN..].copy_from_slice(&self.verifier);
        out
    }

    /// Encrypt a chunk of plaintext in place, returning the ciphertext and
    /// folding it into the running HMAC.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut buf = plaintext.to_vec();
        self.cipher.apply_keystream(&mut buf);
        self.hmac.update(&buf);
        buf
    }

    /// Finalize and return the truncated 10-byte authentication tag.
    pub fn finish(self) -> Vec<u8> {
        self.hmac.finalize().into_bytes()[..TAG_LEN].to_vec()
    }
}

/// Read-side AES-CTR + HMAC-SHA1 stage. Buffers a tail of `TAG_LEN` bytes
/// since the final 10 bytes of the stream are the tag, not ciphertext.
pub struct AesDecryptStage {
    cipher: Aes256CtrLe,
    hmac: HmacSha1,
    tail: Vec<u8>,
}

impl AesDecryptStage {
    /// Derive keys from `password` and the parsed `salt`, and check the
    /// parsed password verifier against the derived one.
    pub fn new(password: &str, salt: &[u8; SALT_LEN], verifier: &[u8; VERIFIER_LEN]) -> Result<Self> {
        let keys = derive_keys(password.as_bytes(), salt);
        if keys.verifier != *verifier {
            return Err(ZipError::InvalidPassword);
        }
        let hmac = HmacSha1::new_from_slice(&keys.hmac_key).expect("HMAC accepts any key length");
        Ok(Self {
            cipher: make_cipher(&keys.encryption_key),
            hmac,
            tail: Vec::new(),
        })
    }

    /// Feed in the next chunk of ciphertext (the tag may still be in here,
    /// at the very end of the stream). Returns any plaintext that is now
    /// provably not part of the tag.
    pub fn append(&mut self, bytes: &[u8]) -> Vec<u8> {
        self.tail.extend_from_slice(bytes);
        if self.tail.len() <= TAG_LEN {
            return Vec::new();
        }
        let ready = self.tail.len() - TAG_LEN;
        let mut chunk: Vec<u8> = self.tail.drain(..ready).collect();
        self.hmac.update(&chunk);
        self.cipher.apply_keystream(&mut chunk);
        chunk
    }

    /// Verify the tag held back in `tail` against the running HMAC.
    pub fn flush(self) -> Result<()> {
        if self.tail.len() != TAG_LEN {
            return Err(ZipError::BadFormat("truncated AES ciphertext".into()));
        }
        let expected = self.hmac.finalize().into_bytes();
        if expected[..TAG_LEN] != self.tail[..] {
            return Err(ZipError::InvalidSignature);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let mut enc = AesEncryptStage::new("hunter2").unwrap();
        let preamble = enc.preamble();
        let ciphertext = enc.encrypt(b"top secret");
        let tag = enc.finish();

        let salt: [u8; SALT_LEN] = preamble[..SALT_LEN].try_into().unwrap();
        let verifier: [u8; VERIFIER_LEN] = preamble[SALT_LEN..].try_into().unwrap();
        let mut dec = AesDecryptStage::new("hunter2", &salt, &verifier).unwrap();
        let mut plaintext = dec.append(&ciphertext);
        plaintext.extend(dec.append(&tag));
        dec.flush().unwrap();
        assert_eq!(plaintext, b"top secret");
    }

    #[test]
    fn wrong_password_fails_verifier() {
        let mut enc = AesEncryptStage::new("hunter2").unwrap();
        let preamble = enc.preamble();
        let _ = enc.encrypt(b"top secret");
        let _ = enc.finish();

        let salt: [u8; SALT_LEN] = preamble[..SALT_LEN].try_into().unwrap();
        let verifier: [u8; VERIFIER_LEN] = preamble[SALT_LEN..].try_into().unwrap();
        let err = AesDecryptStage::new("hunter3", &salt, &verifier).unwrap_err();
        assert!(matches!(err, ZipError::InvalidPassword));
    }

    #[test]
    fn tampered_ciphertext_fails_tag() {
        let mut enc = AesEncryptStage::new("hunter2").unwrap();
        let preamble = enc.preamble();
        let mut ciphertext = enc.encrypt(b"top secret");
        let tag = enc.finish();
        ciphertext[0] ^= 0xFF;

        let salt: [u8; SALT_LEN] = preamble[..SALT_LEN].try_into().unwrap();
        let verifier: [u8; VERIFIER_LEN] = preamble[SALT_LEN..].try_into().unwrap();
        let mut dec = AesDecryptStage::new("hunter2", &salt, &verifier).unwrap();
        let _ = dec.append(&ciphertext);
        let _ = dec.append(&tag);
        assert!(matches!(dec.flush(), Err(ZipError::InvalidSignature)));
    }
}
