//! Software RSA key store.
//!
//! Produces raw PKCS#1 v1.5 signatures over the digest. Useful for
//! development and tests; production deployments put an HSM-backed
//! [`SigningKeyStore`] behind the same trait.

use super::pipeline::{SigningKeyInfo, SigningKeyStore, SigningRequest};
use super::types::DigestAlgorithm;
use crate::error::{Error, Result};
use pkcs8::DecodePrivateKey;
use rsa::{Pkcs1v15Sign, RsaPrivateKey};
use std::collections::HashMap;

struct StoredKey {
    owner_id: String,
    active: bool,
    key: RsaPrivateKey,
}

/// In-memory RSA keys indexed by key id.
#[derive(Default)]
pub struct RsaKeyStore {
    keys: HashMap<String, StoredKey>,
}

impl RsaKeyStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already decoded key.
    pub fn insert(&mut self, key_id: impl Into<String>, owner_id: impl Into<String>, key: RsaPrivateKey) {
        self.keys.insert(
            key_id.into(),
            StoredKey {
                owner_id: owner_id.into(),
                active: true,
                key,
            },
        );
    }

    /// Register a PKCS#8 DER key.
    pub fn insert_pkcs8_der(&mut self, key_id: impl Into<String>, owner_id: impl Into<String>, der: &[u8]) -> Result<()> {
        let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| Error::Signer(format!("invalid PKCS#8 key: {}", e)))?;
        self.insert(key_id, owner_id, key);
        Ok(())
    }

    /// Register a PKCS#8 PEM key.
    pub fn insert_pkcs8_pem(&mut self, key_id: impl Into<String>, owner_id: impl Into<String>, pem: &str) -> Result<()> {
        let key = RsaPrivateKey::from_pkcs8_pem(pem).map_err(|e| Error::Signer(format!("invalid PKCS#8 key: {}", e)))?;
        self.insert(key_id, owner_id, key);
        Ok(())
    }

    /// Mark a key revoked. Returns false for unknown ids.
    pub fn revoke(&mut self, key_id: &str) -> bool {
        match self.keys.get_mut(key_id) {
            Some(stored) => {
                stored.active = false;
                true
            },
            None => false,
        }
    }
}

fn padding_for(algorithm: DigestAlgorithm) -> Pkcs1v15Sign {
    match algorithm {
        DigestAlgorithm::Sha1 => Pkcs1v15Sign::new::<sha1::Sha1>(),
        DigestAlgorithm::Sha256 => Pkcs1v15Sign::new::<sha2::Sha256>(),
        DigestAlgorithm::Sha384 => Pkcs1v15Sign::new::<sha2::Sha384>(),
        DigestAlgorithm::Sha512 => Pkcs1v15Sign::new::<sha2::Sha512>(),
    }
}

impl SigningKeyStore for RsaKeyStore {
    fn key_for_owner(&self, owner_id: &str) -> Result<SigningKeyInfo> {
        let mut inactive = None;
        for (key_id, stored) in &self.keys {
            if stored.owner_id != owner_id {
                continue;
            }
            if stored.active {
                return Ok(SigningKeyInfo {
                    key_id: key_id.clone(),
                    owner_id: owner_id.to_string(),
                    active: true,
                });
            }
            inactive = Some(key_id.clone());
        }
        match inactive {
            Some(key_id) => Err(Error::KeyInactive(key_id)),
            None => Err(Error::KeyNotFound(format!("no key for owner {}", owner_id))),
        }
    }

    fn sign(&self, key_id: &str, request: &SigningRequest) -> Result<Vec<u8>> {
        let stored = self
            .keys
            .get(key_id)
            .ok_or_else(|| Error::KeyNotFound(key_id.to_string()))?;
        if !stored.active {
            return Err(Error::KeyInactive(key_id.to_string()));
        }
        if request.digest.len() != request.algorithm.output_len() {
            return Err(Error::Signer(format!(
                "{}-byte digest does not match {}",
                request.digest.len(),
                request.algorithm.name()
            )));
        }
        stored
            .key
            .sign(padding_for(request.algorithm), &request.digest)
            .map_err(|e| Error::Signer(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signatures::digest_bytes;

    fn store() -> RsaKeyStore {
        let key = RsaPrivateKey::new(&mut rand::thread_rng(), 1024).unwrap();
        let mut store = RsaKeyStore::new();
        store.insert("k1", "alice", key);
        store
    }

    #[test]
    fn test_sign_and_verify() {
        let store = store();
        let digest = digest_bytes(b"document", DigestAlgorithm::Sha256);
        let request = SigningRequest {
            digest: digest.clone(),
            algorithm: DigestAlgorithm::Sha256,
        };
        let signature = store.sign("k1", &request).unwrap();
        assert_eq!(signature.len(), 128);

        let public = store.keys["k1"].key.to_public_key();
        public
            .verify(Pkcs1v15Sign::new::<sha2::Sha256>(), &digest, &signature)
            .unwrap();
    }

    #[test]
    fn test_owner_lookup_and_revocation() {
        let mut store = store();
        assert_eq!(store.key_for_owner("alice").unwrap().key_id, "k1");
        assert!(matches!(store.key_for_owner("bob"), Err(Error::KeyNotFound(_))));

        assert!(store.revoke("k1"));
        assert!(matches!(store.key_for_owner("alice"), Err(Error::KeyInactive(_))));
        let request = SigningRequest {
            digest: vec![0; 32],
            algorithm: DigestAlgorithm::Sha256,
        };
        assert!(matches!(store.sign("k1", &request), Err(Error::KeyInactive(_))));
        assert!(matches!(store.sign("nope", &request), Err(Error::KeyNotFound(_))));
    }
}
