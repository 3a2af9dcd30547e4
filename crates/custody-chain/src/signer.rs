//! Root signing capability
//!
//! The chain engine treats signing as an opaque capability: a [`ChainSigner`]
//! produces signature bytes over the root node message and a
//! [`SignatureVerifier`] checks them against the public key declared in the
//! root node. Ed25519 (via `ed25519-dalek`) is the shipped implementation.
//!
//! Keys are passed to the engine per call; nothing here is process-global.

use custody_core::{CustodyError, Result};
use ed25519_dalek::{Signature, Signer as _, SigningKey, VerifyingKey};
use rand::rngs::OsRng;
use std::fmt;

/// Ed25519 secret and public key length
pub const ED25519_KEY_LEN: usize = 32;

/// Something that can sign a chain's root node
pub trait ChainSigner: Send + Sync {
    /// Public key recorded as the root issuer's `pk`
    fn public_key(&self) -> Vec<u8>;

    /// Sign `message`
    fn sign(&self, message: &[u8]) -> Result<Vec<u8>>;
}

/// Something that can check a root signature
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` over `message` under `public_key`
    ///
    /// Any failure, including malformed keys or signatures, is a
    /// [`CustodyError::Signature`].
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()>;
}

/// Ed25519 root signer
#[derive(Clone)]
pub struct Ed25519Signer {
    key: SigningKey,
}

impl Ed25519Signer {
    /// Fresh key from the OS RNG
    pub fn generate() -> Self {
        Self {
            key: SigningKey::generate(&mut OsRng),
        }
    }

    /// Signer from a 32-byte secret key
    pub fn from_bytes(secret: &[u8; ED25519_KEY_LEN]) -> Self {
        Self {
            key: SigningKey::from_bytes(secret),
        }
    }

    /// Signer from a hex-encoded 32-byte secret key
    pub fn from_hex(secret_hex: &str) -> Result<Self> {
        let mut secret = [0u8; ED25519_KEY_LEN];
        hex::decode_to_slice(secret_hex.trim(), &mut secret)
            .map_err(|e| CustodyError::signature(format!("invalid signing key encoding: {e}")))?;
        Ok(Self::from_bytes(&secret))
    }

    /// Hex-encoded secret key
    ///
    /// # Security
    ///
    /// Handle with care - this is secret key material.
    pub fn to_hex(&self) -> String {
        hex::encode(self.key.to_bytes())
    }

    /// Hex-encoded public key
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().to_bytes())
    }
}

impl ChainSigner for Ed25519Signer {
    fn public_key(&self) -> Vec<u8> {
        self.key.verifying_key().to_bytes().to_vec()
    }

    fn sign(&self, message: &[u8]) -> Result<Vec<u8>> {
        Ok(self.key.sign(message).to_bytes().to_vec())
    }
}

impl fmt::Debug for Ed25519Signer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Don't expose the signing key in debug output
        f.debug_struct("Ed25519Signer")
            .field("signing_key", &"[REDACTED]")
            .field("verifying_key", &self.public_key_hex())
            .finish()
    }
}

/// Ed25519 root signature verifier
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<()> {
        let key_bytes: [u8; ED25519_KEY_LEN] = public_key.try_into().map_err(|_| {
            CustodyError::signature(format!(
                "issuer key must be {ED25519_KEY_LEN} bytes, got {}",
                public_key.len()
            ))
        })?;
        let key = VerifyingKey::from_bytes(&key_bytes)
            .map_err(|_| CustodyError::signature("issuer key is not a valid Ed25519 point"))?;
        let signature = Signature::from_slice(signature)
            .map_err(|_| CustodyError::signature("root signature is not 64 bytes"))?;
        key.verify_strict(message, &signature)
            .map_err(|_| CustodyError::signature("root signature does not verify under issuer key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let signer = Ed25519Signer::generate();
        let sig = signer.sign(b"root node").unwrap();
        assert_eq!(sig.len(), 64);
        assert!(Ed25519Verifier
            .verify(&signer.public_key(), b"root node", &sig)
            .is_ok());
    }

    #[test]
    fn test_wrong_message_or_key_fails() {
        let signer = Ed25519Signer::generate();
        let other = Ed25519Signer::generate();
        let sig = signer.sign(b"root node").unwrap();

        assert!(matches!(
            Ed25519Verifier.verify(&signer.public_key(), b"other", &sig),
            Err(CustodyError::Signature { .. })
        ));
        assert!(Ed25519Verifier
            .verify(&other.public_key(), b"root node", &sig)
            .is_err());
    }

    #[test]
    fn test_malformed_inputs_are_signature_errors() {
        let signer = Ed25519Signer::generate();
        let sig = signer.sign(b"m").unwrap();
        assert!(matches!(
            Ed25519Verifier.verify(&[], b"m", &sig),
            Err(CustodyError::Signature { .. })
        ));
        assert!(matches!(
            Ed25519Verifier.verify(&signer.public_key(), b"m", &sig[..10]),
            Err(CustodyError::Signature { .. })
        ));
    }

    #[test]
    fn test_hex_roundtrip_and_redacted_debug() {
        let signer = Ed25519Signer::from_bytes(&[5; ED25519_KEY_LEN]);
        let restored = Ed25519Signer::from_hex(&signer.to_hex()).unwrap();
        assert_eq!(restored.public_key(), signer.public_key());

        let debug = format!("{signer:?}");
        assert!(debug.contains("[REDACTED]"));
        assert!(!debug.contains(&signer.to_hex()));

        assert!(Ed25519Signer::from_hex("zz").is_err());
    }
}
