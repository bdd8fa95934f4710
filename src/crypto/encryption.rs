//! AES-256-GCM encryption with an HMAC-SHA256 envelope tag.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce, runs
//! AES-256-GCM, then computes HMAC-SHA256 over `iv || ciphertext` with a
//! separate authentication key.  `decrypt` checks that tag in constant
//! time and only then runs the cipher.
//!
//! `encrypt_untagged` / `decrypt_untagged` skip the HMAC and take a raw
//! key.  They exist for wrapping data that is authenticated elsewhere
//! and for reading legacy envelopes; nothing security-sensitive should
//! depend on them.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use super::envelope::{EncryptedEnvelope, IV_LEN, MIN_CIPHERTEXT_LEN, TAG_LEN};
use super::keys::{DerivedKey, KeyPurpose};
use super::memory::constant_time_eq;
use crate::errors::{GhostVaultError, Result};

type HmacSha256 = Hmac<Sha256>;

/// Encrypt `plaintext` and tag the result.
pub fn encrypt(
    plaintext: &[u8],
    enc_key: &DerivedKey,
    auth_key: &DerivedKey,
) -> Result<EncryptedEnvelope> {
    check_purposes(enc_key, auth_key)?;

    let (iv, ciphertext) = seal(plaintext, enc_key.as_bytes())?;
    let tag = compute_tag(auth_key, &iv, &ciphertext)?;

    Ok(EncryptedEnvelope {
        iv,
        ciphertext,
        auth_tag: Some(tag),
    })
}

/// Verify the envelope tag, then decrypt.
///
/// A missing or mismatching tag is an `Integrity` error and the cipher
/// never sees the ciphertext.  A cipher failure after a good tag means
/// the encryption key is wrong and is reported as `Crypto`.
pub fn decrypt(
    envelope: &EncryptedEnvelope,
    enc_key: &DerivedKey,
    auth_key: &DerivedKey,
) -> Result<Zeroizing<Vec<u8>>> {
    check_purposes(enc_key, auth_key)?;

    let tag = envelope.auth_tag.as_ref().ok_or(GhostVaultError::Integrity)?;
    verify_tag(auth_key, &envelope.iv, &envelope.ciphertext, tag)?;

    open(&envelope.iv, &envelope.ciphertext, enc_key.as_bytes()).map_err(|_| {
        GhostVaultError::Crypto("decryption failed after tag verification".into())
    })
}

/// Encrypt with an externally supplied 32-byte key and no HMAC tag.
pub fn encrypt_untagged(plaintext: &[u8], key: &[u8]) -> Result<EncryptedEnvelope> {
    let (iv, ciphertext) = seal(plaintext, key)?;
    Ok(EncryptedEnvelope {
        iv,
        ciphertext,
        auth_tag: None,
    })
}

/// Decrypt an envelope produced by `encrypt_untagged`.
///
/// The GCM tag inside the ciphertext is still checked; a failure there is
/// reported as `Integrity`.
pub fn decrypt_untagged(envelope: &EncryptedEnvelope, key: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if envelope.auth_tag.is_some() {
        return Err(GhostVaultError::Crypto(
            "envelope carries an HMAC tag; use the authenticated path".into(),
        ));
    }
    if key.len() != 32 {
        return Err(GhostVaultError::Crypto(format!(
            "invalid key length: expected 32, got {}",
            key.len()
        )));
    }

    open(&envelope.iv, &envelope.ciphertext, key).map_err(|_| GhostVaultError::Integrity)
}

/// Compute HMAC-SHA256 over `iv || ciphertext`.
pub fn compute_tag(auth_key: &DerivedKey, iv: &[u8], ciphertext: &[u8]) -> Result<[u8; TAG_LEN]> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(auth_key.as_bytes())
        .map_err(|e| GhostVaultError::Crypto(format!("invalid HMAC key: {e}")))?;

    mac.update(iv);
    mac.update(ciphertext);

    let mut tag = [0u8; TAG_LEN];
    tag.copy_from_slice(&mac.finalize().into_bytes());
    Ok(tag)
}

/// Recompute the tag and compare it to `expected` in constant time.
fn verify_tag(
    auth_key: &DerivedKey,
    iv: &[u8],
    ciphertext: &[u8],
    expected: &[u8; TAG_LEN],
) -> Result<()> {
    let mut actual = compute_tag(auth_key, iv, ciphertext)?;
    let matches = constant_time_eq(&actual, expected);
    actual.zeroize();

    if matches {
        Ok(())
    } else {
        Err(GhostVaultError::Integrity)
    }
}

/// AES-256-GCM encryption under a fresh random nonce.
fn seal(plaintext: &[u8], key: &[u8]) -> Result<([u8; IV_LEN], Vec<u8>)> {
    // Build the cipher from the raw key bytes.
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| GhostVaultError::Crypto(format!("invalid key length: {e}")))?;

    // Never reuse a nonce under the same key: draw a new one every call.
    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(&nonce, plaintext)
        .map_err(|e| GhostVaultError::Crypto(format!("encryption error: {e}")))?;

    let mut iv = [0u8; IV_LEN];
    iv.copy_from_slice(&nonce);
    Ok((iv, ciphertext))
}

/// AES-256-GCM decryption.  The error carries no detail.
fn open(
    iv: &[u8; IV_LEN],
    ciphertext: &[u8],
    key: &[u8],
) -> std::result::Result<Zeroizing<Vec<u8>>, aes_gcm::Error> {
    if ciphertext.len() < MIN_CIPHERTEXT_LEN {
        return Err(aes_gcm::Error);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| aes_gcm::Error)?;
    cipher
        .decrypt(Nonce::from_slice(iv), ciphertext)
        .map(Zeroizing::new)
}

fn check_purposes(enc_key: &DerivedKey, auth_key: &DerivedKey) -> Result<()> {
    if enc_key.purpose() != KeyPurpose::Encryption
        || auth_key.purpose() != KeyPurpose::Authentication
    {
        return Err(GhostVaultError::Crypto(
            "keys passed in the wrong roles (encryption/authentication)".into(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> (DerivedKey, DerivedKey) {
        (
            DerivedKey::new([0xABu8; 32], KeyPurpose::Encryption),
            DerivedKey::new([0xCDu8; 32], KeyPurpose::Authentication),
        )
    }

    #[test]
    fn tag_covers_iv_and_ciphertext() {
        let (enc, auth) = keys();
        let env = encrypt(b"payload", &enc, &auth).unwrap();
        let expected = compute_tag(&auth, &env.iv, &env.ciphertext).unwrap();
        assert_eq!(env.auth_tag, Some(expected));
    }

    #[test]
    fn swapped_key_roles_are_rejected() {
        let (enc, auth) = keys();
        let err = encrypt(b"x", &auth, &enc).unwrap_err();
        assert!(matches!(err, GhostVaultError::Crypto(_)));
    }

    #[test]
    fn missing_tag_is_an_integrity_error() {
        let (enc, auth) = keys();
        let mut env = encrypt(b"payload", &enc, &auth).unwrap();
        env.auth_tag = None;
        assert!(matches!(
            decrypt(&env, &enc, &auth),
            Err(GhostVaultError::Integrity)
        ));
    }

    #[test]
    fn wrong_encryption_key_after_good_tag_is_crypto_error() {
        let (enc, auth) = keys();
        let env = encrypt(b"payload", &enc, &auth).unwrap();
        let other = DerivedKey::new([0x01u8; 32], KeyPurpose::Encryption);
        assert!(matches!(
            decrypt(&env, &other, &auth),
            Err(GhostVaultError::Crypto(_))
        ));
    }

    #[test]
    fn untagged_roundtrip_and_key_length_check() {
        let key = [0x42u8; 32];
        let env = encrypt_untagged(b"wrapped", &key).unwrap();
        assert!(!env.is_authenticated());
        assert_eq!(decrypt_untagged(&env, &key).unwrap().as_slice(), b"wrapped");

        assert!(matches!(
            encrypt_untagged(b"x", &[0u8; 16]),
            Err(GhostVaultError::Crypto(_))
        ));
        assert!(matches!(
            decrypt_untagged(&env, &[0u8; 16]),
            Err(GhostVaultError::Crypto(_))
        ));
    }

    #[test]
    fn untagged_tamper_is_integrity_error() {
        let key = [0x42u8; 32];
        let mut env = encrypt_untagged(b"wrapped", &key).unwrap();
        env.ciphertext[0] ^= 0x01;
        assert!(matches!(
            decrypt_untagged(&env, &key),
            Err(GhostVaultError::Integrity)
        ));
    }

    #[test]
    fn untagged_path_refuses_tagged_envelope() {
        let (enc, auth) = keys();
        let env = encrypt(b"payload", &enc, &auth).unwrap();
        assert!(decrypt_untagged(&env, enc.as_bytes()).is_err());
    }
}
