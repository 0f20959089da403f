//! Symmetric encryption filter for wire frames.
//!
//! Frames stay line-delimited text on the wire, so an encrypted frame is
//! `base64(IV || AES-256-CBC ciphertext || HMAC-SHA256 tag)`. Independent
//! signing and encryption keys are derived from the user-supplied session
//! credential with HKDF-SHA256. The MAC covers IV plus ciphertext and is
//! verified before any decryption is attempted.
//!
//! Decryption failure is a value, not a panic: the transport maps it to a
//! fatal-session condition since later frames cannot be trusted to decode.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, Key, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use rand_core::{OsRng, RngCore};
use sha2::Sha256;

type AesCbcEnc = cbc::Encryptor<aes::Aes256>;
type AesCbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;
const TAG_SIZE: usize = 32;

/// Minimum decoded token: IV, one cipher block, tag.
const MIN_TOKEN_SIZE: usize = IV_SIZE + 16 + TAG_SIZE;

const HKDF_SALT: &[u8] = b"ledgerlink.frame.filter.v1";
const SIGN_INFO: &[u8] = b"frame signing key";
const ENC_INFO: &[u8] = b"frame encryption key";

/// Errors from decrypting an inbound frame.
#[derive(Debug, thiserror::Error)]
pub enum CryptError {
    #[error("token is not valid base64: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("token too short: {0} bytes (minimum {MIN_TOKEN_SIZE})")]
    TooShort(usize),

    #[error("signature verification failed")]
    BadSignature,

    #[error("ciphertext padding invalid")]
    BadPadding,

    #[error("plaintext is not valid UTF-8")]
    NotText(#[from] std::string::FromUtf8Error),
}

/// Stateless given its keys; cheap to clone across the read and write
/// halves of a connection.
#[derive(Clone)]
pub struct EncryptionFilter {
    sign_key: [u8; KEY_SIZE],
    enc_key: Key<aes::Aes256>,
}

impl EncryptionFilter {
    /// Derive a filter from a session credential.
    pub fn new(credential: &str) -> Self {
        let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), credential.as_bytes());

        let mut sign_key = [0u8; KEY_SIZE];
        // expand only fails for absurd output lengths, which these are not
        hk.expand(SIGN_INFO, &mut sign_key)
            .unwrap_or_else(|_| unreachable!("{KEY_SIZE} bytes is a valid hkdf output length"));

        let mut enc_key = [0u8; KEY_SIZE];
        hk.expand(ENC_INFO, &mut enc_key)
            .unwrap_or_else(|_| unreachable!("{KEY_SIZE} bytes is a valid hkdf output length"));

        Self { sign_key, enc_key: enc_key.into() }
    }

    /// Encrypt one frame payload to token text.
    pub fn encrypt(&self, plain: &str) -> String {
        let mut iv = [0u8; IV_SIZE];
        OsRng.fill_bytes(&mut iv);

        let ciphertext = AesCbcEnc::new(&self.enc_key, &iv.into())
            .encrypt_padded_vec_mut::<Pkcs7>(plain.as_bytes());

        let mut token = Vec::with_capacity(IV_SIZE + ciphertext.len() + TAG_SIZE);
        token.extend_from_slice(&iv);
        token.extend_from_slice(&ciphertext);

        let tag = self.mac(&token);
        token.extend_from_slice(&tag);

        BASE64.encode(token)
    }

    /// Verify and decrypt one token back to frame text.
    pub fn decrypt(&self, token: &str) -> Result<String, CryptError> {
        let data = BASE64.decode(token.trim())?;

        if data.len() < MIN_TOKEN_SIZE {
            return Err(CryptError::TooShort(data.len()));
        }

        let (signed, tag) = data.split_at(data.len() - TAG_SIZE);

        let mut hmac = <HmacSha256 as Mac>::new_from_slice(&self.sign_key)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        hmac.update(signed);
        hmac.verify_slice(tag).map_err(|_| CryptError::BadSignature)?;

        let iv: [u8; IV_SIZE] =
            signed[..IV_SIZE].try_into().map_err(|_| CryptError::TooShort(data.len()))?;

        let plain = AesCbcDec::new(&self.enc_key, &iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&signed[IV_SIZE..])
            .map_err(|_| CryptError::BadPadding)?;

        Ok(String::from_utf8(plain)?)
    }

    fn mac(&self, data: &[u8]) -> [u8; TAG_SIZE] {
        let mut hmac = <HmacSha256 as Mac>::new_from_slice(&self.sign_key)
            .unwrap_or_else(|_| unreachable!("hmac accepts any key length"));
        hmac.update(data);
        hmac.finalize().into_bytes().into()
    }
}

impl std::fmt::Debug for EncryptionFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // never print key material
        f.debug_struct("EncryptionFilter").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_then_decrypt() {
        let filter = EncryptionFilter::new("hunter2");
        let plain = "<Message>{\"v\":1}";

        let token = filter.encrypt(plain);
        assert_ne!(token, plain);

        let decrypted = filter.decrypt(&token).expect("decrypt");
        assert_eq!(decrypted, plain);
    }

    #[test]
    fn tokens_are_single_line_text() {
        let filter = EncryptionFilter::new("hunter2");
        let token = filter.encrypt("payload with\u{9}odd characters");
        assert!(!token.contains('\n'));
        assert!(token.is_ascii());
    }

    #[test]
    fn same_plaintext_yields_distinct_tokens() {
        let filter = EncryptionFilter::new("hunter2");
        assert_ne!(filter.encrypt("frame"), filter.encrypt("frame"));
    }

    #[test]
    fn wrong_credential_fails_verification() {
        let token = EncryptionFilter::new("hunter2").encrypt("frame");
        assert!(matches!(
            EncryptionFilter::new("HUNTER2").decrypt(&token),
            Err(CryptError::BadSignature)
        ));
    }

    #[test]
    fn tampered_token_fails_verification() {
        let filter = EncryptionFilter::new("hunter2");
        let token = filter.encrypt("frame");

        let mut data = BASE64.decode(&token).expect("decode");
        data[IV_SIZE] ^= 0x01;
        let tampered = BASE64.encode(data);

        assert!(matches!(filter.decrypt(&tampered), Err(CryptError::BadSignature)));
    }

    #[test]
    fn garbage_is_rejected_not_panicked() {
        let filter = EncryptionFilter::new("hunter2");
        assert!(filter.decrypt("not base64 at all!").is_err());
        assert!(matches!(filter.decrypt("AAAA"), Err(CryptError::TooShort(3))));
    }
}
