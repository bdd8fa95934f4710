//! The encrypted envelope and its two wire encodings.
//!
//! Legacy layout (no version byte):
//!
//! ```text
//! [ IV: 12 bytes | ciphertext (includes 16-byte GCM tag) | HMAC-SHA256: 32 bytes, optional ]
//! ```
//!
//! Versioned layout, used for everything written now:
//!
//! ```text
//! [ version: 1 byte | IV: 12 bytes | ciphertext | HMAC-SHA256: 32 bytes iff version = 0x02 ]
//! ```
//!
//! The legacy layout does not say whether a tag is present.  `from_bytes`
//! decides by total length: anything long enough to hold IV, the minimum
//! ciphertext and a tag is read as tagged.  An untagged envelope whose
//! plaintext is 32 bytes or longer is therefore misread as tagged and will
//! fail verification.  This is kept as-is for compatibility with existing
//! data; use `from_untagged_bytes` when the caller knows there is no tag.

use crate::errors::{GhostVaultError, Result};

/// AES-GCM nonce size in bytes.
pub const IV_LEN: usize = 12;

/// HMAC-SHA256 tag size in bytes.
pub const TAG_LEN: usize = 32;

/// Smallest ciphertext AES-GCM can produce (its own 16-byte tag).
pub const MIN_CIPHERTEXT_LEN: usize = 16;

/// Version byte of a versioned envelope without an HMAC tag.
pub const VERSION_UNTAGGED: u8 = 0x01;

/// Version byte of a versioned envelope with an HMAC tag.
pub const VERSION_TAGGED: u8 = 0x02;

/// IV, ciphertext and optional MAC tag of one encryption.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    /// Random per-encryption nonce.
    pub iv: [u8; IV_LEN],
    /// AES-GCM output.
    pub ciphertext: Vec<u8>,
    /// HMAC-SHA256 over `iv || ciphertext`, present iff the authenticated
    /// path produced this envelope.
    pub auth_tag: Option<[u8; TAG_LEN]>,
}

impl EncryptedEnvelope {
    /// `true` if the envelope carries an HMAC tag.
    pub fn is_authenticated(&self) -> bool {
        self.auth_tag.is_some()
    }

    /// Serialize to the legacy layout `iv || ciphertext || tag?`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let tag_len = if self.auth_tag.is_some() { TAG_LEN } else { 0 };
        let mut out = Vec::with_capacity(IV_LEN + self.ciphertext.len() + tag_len);
        out.extend_from_slice(&self.iv);
        out.extend_from_slice(&self.ciphertext);
        if let Some(tag) = &self.auth_tag {
            out.extend_from_slice(tag);
        }
        out
    }

    /// Parse the legacy layout, guessing tag presence from the length.
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() >= IV_LEN + MIN_CIPHERTEXT_LEN + TAG_LEN {
            let (body, tag) = data.split_at(data.len() - TAG_LEN);
            let mut envelope = Self::from_untagged_bytes(body)?;
            let mut auth_tag = [0u8; TAG_LEN];
            auth_tag.copy_from_slice(tag);
            envelope.auth_tag = Some(auth_tag);
            Ok(envelope)
        } else {
            Self::from_untagged_bytes(data)
        }
    }

    /// Parse `iv || ciphertext` with no tag.
    pub fn from_untagged_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < IV_LEN + MIN_CIPHERTEXT_LEN {
            return Err(GhostVaultError::Crypto(format!(
                "envelope too short: {} bytes, need at least {}",
                data.len(),
                IV_LEN + MIN_CIPHERTEXT_LEN
            )));
        }

        let (iv_bytes, ciphertext) = data.split_at(IV_LEN);
        let mut iv = [0u8; IV_LEN];
        iv.copy_from_slice(iv_bytes);

        Ok(Self {
            iv,
            ciphertext: ciphertext.to_vec(),
            auth_tag: None,
        })
    }

    /// Serialize with a leading version byte.
    pub fn to_versioned_bytes(&self) -> Vec<u8> {
        let version = if self.auth_tag.is_some() {
            VERSION_TAGGED
        } else {
            VERSION_UNTAGGED
        };
        let body = self.to_bytes();
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(version);
        out.extend_from_slice(&body);
        out
    }

    /// Parse a versioned envelope; tag presence comes from the version byte.
    pub fn from_versioned_bytes(data: &[u8]) -> Result<Self> {
        let (&version, body) = data
            .split_first()
            .ok_or_else(|| GhostVaultError::Crypto("empty envelope".into()))?;

        match version {
            VERSION_UNTAGGED => Self::from_untagged_bytes(body),
            VERSION_TAGGED => {
                if body.len() < IV_LEN + MIN_CIPHERTEXT_LEN + TAG_LEN {
                    return Err(GhostVaultError::Crypto(format!(
                        "tagged envelope too short: {} bytes",
                        body.len()
                    )));
                }
                let (rest, tag) = body.split_at(body.len() - TAG_LEN);
                let mut envelope = Self::from_untagged_bytes(rest)?;
                let mut auth_tag = [0u8; TAG_LEN];
                auth_tag.copy_from_slice(tag);
                envelope.auth_tag = Some(auth_tag);
                Ok(envelope)
            }
            other => Err(GhostVaultError::Crypto(format!(
                "unsupported envelope version {other:#04x}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tagged: bool, ct_len: usize) -> EncryptedEnvelope {
        EncryptedEnvelope {
            iv: [0x11; IV_LEN],
            ciphertext: vec![0x22; ct_len],
            auth_tag: tagged.then_some([0x33; TAG_LEN]),
        }
    }

    #[test]
    fn legacy_layout_is_contiguous() {
        let bytes = sample(true, 20).to_bytes();
        assert_eq!(bytes.len(), IV_LEN + 20 + TAG_LEN);
        assert_eq!(&bytes[..IV_LEN], &[0x11; IV_LEN]);
        assert_eq!(&bytes[bytes.len() - TAG_LEN..], &[0x33; TAG_LEN]);
    }

    #[test]
    fn from_bytes_reads_tagged_envelope() {
        let env = sample(true, MIN_CIPHERTEXT_LEN);
        assert_eq!(EncryptedEnvelope::from_bytes(&env.to_bytes()).unwrap(), env);
    }

    #[test]
    fn from_bytes_reads_short_untagged_envelope() {
        let env = sample(false, MIN_CIPHERTEXT_LEN + 10);
        let parsed = EncryptedEnvelope::from_bytes(&env.to_bytes()).unwrap();
        assert!(!parsed.is_authenticated());
        assert_eq!(parsed, env);
    }

    #[test]
    fn from_bytes_misreads_long_untagged_envelope() {
        // Known limitation of the unversioned layout.
        let env = sample(false, MIN_CIPHERTEXT_LEN + TAG_LEN);
        let parsed = EncryptedEnvelope::from_bytes(&env.to_bytes()).unwrap();
        assert!(parsed.is_authenticated());

        let explicit = EncryptedEnvelope::from_untagged_bytes(&env.to_bytes()).unwrap();
        assert_eq!(explicit, env);
    }

    #[test]
    fn from_bytes_rejects_truncated_input() {
        let err = EncryptedEnvelope::from_bytes(&[0u8; IV_LEN + 3]).unwrap_err();
        assert!(matches!(err, GhostVaultError::Crypto(_)));
    }

    #[test]
    fn versioned_layout_keeps_tag_presence() {
        for env in [sample(false, 40), sample(true, 16), sample(true, 100)] {
            let bytes = env.to_versioned_bytes();
            assert_eq!(EncryptedEnvelope::from_versioned_bytes(&bytes).unwrap(), env);
        }
    }

    #[test]
    fn versioned_rejects_unknown_version_and_empty_input() {
        let mut bytes = sample(true, 16).to_versioned_bytes();
        bytes[0] = 0x7F;
        assert!(EncryptedEnvelope::from_versioned_bytes(&bytes).is_err());
        assert!(EncryptedEnvelope::from_versioned_bytes(&[]).is_err());
    }

    #[test]
    fn versioned_tagged_rejects_missing_tag() {
        let mut bytes = sample(false, 16).to_versioned_bytes();
        bytes[0] = VERSION_TAGGED;
        assert!(EncryptedEnvelope::from_versioned_bytes(&bytes).is_err());
    }
}
