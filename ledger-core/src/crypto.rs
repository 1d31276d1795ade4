//! Cryptographic operations for signing identities
//!
//! This module provides:
//! - Ed25519 key pairs derived from 32-byte seeds
//! - Account id derivation from the public key
//! - SHA-256 hashing and the network id that domain-separates signatures

use crate::types::{AccountId, DecoratedSignature};
use crate::{Error, Result};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use sha2::{Digest, Sha256};

/// Ed25519 key pair for signing
#[derive(Debug)]
pub struct KeyPair {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        Self::from_seed(&rand::random::<[u8; 32]>())
    }

    /// Create from seed (32 bytes) - deterministic generation
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(seed);
        let verifying_key = signing_key.verifying_key();

        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Create from a hex-encoded 32-byte seed
    pub fn from_seed_hex(seed: &str) -> Result<Self> {
        let bytes = hex::decode(seed.trim())
            .map_err(|e| Error::InvalidSeed(format!("seed is not hex: {}", e)))?;
        let seed: [u8; 32] = bytes.try_into().map_err(|b: Vec<u8>| {
            Error::InvalidSeed(format!("seed must be 32 bytes, got {}", b.len()))
        })?;
        Ok(Self::from_seed(&seed))
    }

    /// Hex-encoded seed (USE WITH CAUTION - should be protected)
    pub fn seed_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }

    /// Get public key bytes
    pub fn public_key(&self) -> [u8; 32] {
        self.verifying_key.to_bytes()
    }

    /// Account id derived from the public key
    pub fn account_id(&self) -> AccountId {
        account_id_from_public_key(&self.public_key())
    }

    /// Signer hint: last four bytes of the public key
    pub fn hint(&self) -> [u8; 4] {
        let key = self.public_key();
        [key[28], key[29], key[30], key[31]]
    }

    /// Sign a message and tag the signature with this key's hint
    pub fn sign_decorated(&self, message: &[u8]) -> DecoratedSignature {
        let signature = self.signing_key.sign(message);
        DecoratedSignature {
            hint: self.hint(),
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Verify a decorated signature produced by this key
    pub fn verify(&self, message: &[u8], signature: &DecoratedSignature) -> Result<()> {
        if signature.hint != self.hint() {
            return Err(Error::InvalidEnvelope("signature hint does not match key".to_string()));
        }
        let bytes: [u8; 64] = signature
            .signature
            .as_slice()
            .try_into()
            .map_err(|_| Error::InvalidEnvelope("signature must be 64 bytes".to_string()))?;
        self.verifying_key
            .verify(message, &DalekSignature::from_bytes(&bytes))
            .map_err(|e| Error::InvalidEnvelope(format!("verification failed: {}", e)))
    }
}

/// Derive the account id for a public key
pub fn account_id_from_public_key(public_key: &[u8; 32]) -> AccountId {
    AccountId::new(format!("G{}", hex::encode_upper(public_key)))
}

/// Hash arbitrary bytes using SHA-256
pub fn hash_bytes(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Network identifier: SHA-256 of the network passphrase
///
/// Mixed into every transaction hash so an envelope signed for one network
/// is never valid on another.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetworkId([u8; 32]);

impl NetworkId {
    /// Derive from a passphrase
    pub fn from_passphrase(passphrase: &str) -> Self {
        Self(hash_bytes(passphrase.as_bytes()))
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keypair_from_seed() {
        let seed = [42u8; 32];
        let keypair1 = KeyPair::from_seed(&seed);
        let keypair2 = KeyPair::from_seed(&seed);

        // Same seed should produce same identity
        assert_eq!(keypair1.public_key(), keypair2.public_key());
        assert_eq!(keypair1.account_id(), keypair2.account_id());
    }

    #[test]
    fn test_seed_hex_roundtrip() {
        let keypair = KeyPair::generate();
        let restored = KeyPair::from_seed_hex(&keypair.seed_hex()).unwrap();
        assert_eq!(keypair.account_id(), restored.account_id());
    }

    #[test]
    fn test_invalid_seeds() {
        assert!(matches!(KeyPair::from_seed_hex("not-hex"), Err(Error::InvalidSeed(_))));
        assert!(matches!(KeyPair::from_seed_hex("abcd"), Err(Error::InvalidSeed(_))));
    }

    #[test]
    fn test_account_id_format() {
        let keypair = KeyPair::from_seed(&[7u8; 32]);
        let id = keypair.account_id();
        assert!(id.as_str().starts_with('G'));
        assert_eq!(id.as_str().len(), 65);
    }

    #[test]
    fn test_sign_and_verify() {
        let keypair = KeyPair::generate();
        let message = b"test message";

        let signature = keypair.sign_decorated(message);
        assert_eq!(signature.hint, keypair.hint());
        assert!(keypair.verify(message, &signature).is_ok());

        // Wrong message should fail
        assert!(keypair.verify(b"wrong message", &signature).is_err());

        // Wrong key should fail on the hint
        let other = KeyPair::generate();
        assert!(other.verify(message, &signature).is_err());
    }

    #[test]
    fn test_network_id_differs_per_passphrase() {
        let public = NetworkId::from_passphrase("Public Global Network");
        let test = NetworkId::from_passphrase("Test Network");
        assert_ne!(public, test);
        assert_eq!(public, NetworkId::from_passphrase("Public Global Network"));
    }
}
