//! # Payload Sealing
//!
//! Authenticated encryption for binary frames.
//!
//! The remote endpoint expects encrypt-then-MAC with the tag in front:
//!
//! ```text
//! [HMAC-SHA256(mac_key, ciphertext) : 32] [IV : 16] [AES-256-CBC/PKCS#7 blocks : N]
//! ```
//!
//! The IV travels as the first block of the ciphertext and is covered by the MAC.
//! This layout is fixed by the peer and must be reproduced bit-exactly.

use crate::error::{constants, DispatchError, Result};
use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use tracing::trace;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

/// AES block size, and therefore IV length
pub const IV_LEN: usize = 16;

/// Length of the prepended authentication tag
pub const MAC_LEN: usize = 32;

/// Required length of the encryption key (AES-256)
pub const ENC_KEY_LEN: usize = 32;

/// Session secrets handed over by the login layer, already derived.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SessionKeys {
    enc_key: Vec<u8>,
    mac_key: Vec<u8>,
}

impl SessionKeys {
    pub fn new(enc_key: impl Into<Vec<u8>>, mac_key: impl Into<Vec<u8>>) -> Result<Self> {
        let keys = Self {
            enc_key: enc_key.into(),
            mac_key: mac_key.into(),
        };
        if keys.enc_key.len() != ENC_KEY_LEN {
            return Err(DispatchError::Crypto(format!(
                "{}: encryption key is {} bytes, expected {ENC_KEY_LEN}",
                constants::ERR_INVALID_KEY_LENGTH,
                keys.enc_key.len()
            )));
        }
        if keys.mac_key.is_empty() {
            return Err(DispatchError::Crypto(format!(
                "{}: MAC key is empty",
                constants::ERR_INVALID_KEY_LENGTH
            )));
        }
        Ok(keys)
    }

    pub fn enc_key(&self) -> &[u8] {
        &self.enc_key
    }

    pub fn mac_key(&self) -> &[u8] {
        &self.mac_key
    }

    /// Seal `plaintext` under these keys.
    pub fn seal(&self, iv: IvMode, plaintext: &[u8]) -> Result<Vec<u8>> {
        encrypt_with_iv(&self.enc_key, &self.mac_key, &iv.resolve(), plaintext)
    }

    /// Verify and decrypt a sealed payload.
    pub fn open(&self, sealed: &[u8]) -> Result<Vec<u8>> {
        open(&self.enc_key, &self.mac_key, sealed)
    }
}

impl std::fmt::Debug for SessionKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionKeys")
            .field("enc_key", &"<redacted>")
            .field("mac_key", &"<redacted>")
            .finish()
    }
}

/// Where the CBC initialization vector comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IvMode {
    /// Fresh random IV per message
    #[default]
    Random,
    /// Caller-supplied IV; output becomes deterministic
    Fixed([u8; IV_LEN]),
}

impl IvMode {
    /// All-zero IV
    pub const ZERO: IvMode = IvMode::Fixed([0u8; IV_LEN]);

    fn resolve(self) -> [u8; IV_LEN] {
        match self {
            IvMode::Random => generate_iv(),
            IvMode::Fixed(iv) => iv,
        }
    }
}

/// Generate a random IV
pub fn generate_iv() -> [u8; IV_LEN] {
    let mut iv = [0u8; IV_LEN];
    rand::rng().fill_bytes(&mut iv);
    iv
}

/// Seal `plaintext` with a random IV.
pub fn encrypt(enc_key: &[u8], mac_key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    encrypt_with_iv(enc_key, mac_key, &generate_iv(), plaintext)
}

/// Seal `plaintext` with the given IV: CBC-encrypt, MAC the ciphertext, prepend the MAC.
pub fn encrypt_with_iv(
    enc_key: &[u8],
    mac_key: &[u8],
    iv: &[u8; IV_LEN],
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let ciphertext = cbc_encrypt(enc_key, iv, plaintext)?;
    let tag = hmac_sha256(mac_key, &ciphertext)?;

    let mut sealed = Vec::with_capacity(MAC_LEN + ciphertext.len());
    sealed.extend_from_slice(&tag[..MAC_LEN]);
    sealed.extend_from_slice(&ciphertext);

    trace!(plaintext = plaintext.len(), sealed = sealed.len(), "Payload sealed");
    Ok(sealed)
}

/// Verify the MAC in front of `sealed` and decrypt the remainder.
pub fn open(enc_key: &[u8], mac_key: &[u8], sealed: &[u8]) -> Result<Vec<u8>> {
    if sealed.len() < MAC_LEN + IV_LEN {
        return Err(DispatchError::Crypto(constants::ERR_SEALED_TOO_SHORT.into()));
    }
    let (tag, ciphertext) = sealed.split_at(MAC_LEN);

    let mut mac = new_mac(mac_key)?;
    mac.update(ciphertext);
    mac.verify_slice(tag)
        .map_err(|_| DispatchError::Crypto(constants::ERR_MAC_MISMATCH.into()))?;

    cbc_decrypt(enc_key, ciphertext)
}

/// AES-256-CBC with PKCS#7 padding; the IV is written in front of the blocks.
pub fn cbc_encrypt(key: &[u8], iv: &[u8; IV_LEN], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = Aes256CbcEnc::new_from_slices(key, iv).map_err(|_| {
        DispatchError::Crypto(format!(
            "{}: {} bytes",
            constants::ERR_INVALID_KEY_LENGTH,
            key.len()
        ))
    })?;
    let blocks = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_LEN + blocks.len());
    out.extend_from_slice(iv);
    out.extend_from_slice(&blocks);
    Ok(out)
}

/// Inverse of [`cbc_encrypt`]: reads the IV from the first block.
pub fn cbc_decrypt(key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    if data.len() < IV_LEN || (data.len() - IV_LEN) % IV_LEN != 0 {
        return Err(DispatchError::Crypto(constants::ERR_BAD_PADDING.into()));
    }
    let (iv, blocks) = data.split_at(IV_LEN);
    let cipher = Aes256CbcDec::new_from_slices(key, iv).map_err(|_| {
        DispatchError::Crypto(format!(
            "{}: {} bytes",
            constants::ERR_INVALID_KEY_LENGTH,
            key.len()
        ))
    })?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(blocks)
        .map_err(|_| DispatchError::Crypto(constants::ERR_BAD_PADDING.into()))
}

/// HMAC-SHA256 of `data` under `key`.
pub fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<[u8; 32]> {
    let mut mac = new_mac(key)?;
    mac.update(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(&mac.finalize().into_bytes());
    Ok(out)
}

fn new_mac(key: &[u8]) -> Result<HmacSha256> {
    <HmacSha256 as Mac>::new_from_slice(key)
        .map_err(|_| DispatchError::Crypto(constants::ERR_INVALID_KEY_LENGTH.into()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENC: [u8; 32] = [7u8; 32];
    const MAC: [u8; 32] = [9u8; 32];

    #[test]
    fn test_layout_mac_then_iv_then_blocks() {
        let iv = [3u8; IV_LEN];
        let sealed = encrypt_with_iv(&ENC, &MAC, &iv, b"hello node").unwrap();

        // 10 bytes of plaintext pad to a single block
        assert_eq!(sealed.len(), MAC_LEN + IV_LEN + 16);
        assert_eq!(&sealed[MAC_LEN..MAC_LEN + IV_LEN], &iv);
        let expected = hmac_sha256(&MAC, &sealed[MAC_LEN..]).unwrap();
        assert_eq!(&sealed[..MAC_LEN], &expected);
    }

    #[test]
    fn test_fixed_iv_is_deterministic() {
        let a = encrypt_with_iv(&ENC, &MAC, &[0u8; IV_LEN], b"payload").unwrap();
        let b = encrypt_with_iv(&ENC, &MAC, &[0u8; IV_LEN], b"payload").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_random_iv_differs() {
        let a = encrypt(&ENC, &MAC, b"payload").unwrap();
        let b = encrypt(&ENC, &MAC, b"payload").unwrap();
        assert_ne!(a, b);
        assert_eq!(open(&ENC, &MAC, &a).unwrap(), b"payload");
        assert_eq!(open(&ENC, &MAC, &b).unwrap(), b"payload");
    }

    #[test]
    fn test_tampered_ciphertext_rejected() {
        let mut sealed = encrypt(&ENC, &MAC, b"payload").unwrap();
        let last = sealed.len() - 1;
        sealed[last] ^= 0x01;
        assert!(matches!(
            open(&ENC, &MAC, &sealed),
            Err(DispatchError::Crypto(ref m)) if m == constants::ERR_MAC_MISMATCH
        ));
    }

    #[test]
    fn test_short_key_rejected() {
        let err = encrypt(&[1u8; 15], &MAC, b"x").unwrap_err();
        assert!(matches!(err, DispatchError::Crypto(_)));
        assert!(SessionKeys::new(vec![1u8; 16], MAC.to_vec()).is_err());
    }

    #[test]
    fn test_short_sealed_rejected() {
        assert!(open(&ENC, &MAC, &[0u8; MAC_LEN + IV_LEN - 1]).is_err());
    }

    #[test]
    fn test_session_keys_debug_redacts() {
        let keys = SessionKeys::new(ENC.to_vec(), MAC.to_vec()).unwrap();
        let dbg = format!("{keys:?}");
        assert!(dbg.contains("redacted"));
        assert!(!dbg.contains("7, 7"));
    }
}
