//! Document envelope protocol.
//!
//! Two independent protections operate on an [`Operation`]'s payload:
//!
//! - **Signing**: RSA PKCS#1 v1.5 over the SHA-256 digest of the canonical
//!   byte form of the payload. The base58 signature is stored inside the
//!   payload itself, so it is excluded from its own digest.
//! - **Sealing**: the serialized payload is encrypted with AES-256-GCM and
//!   replaced by `base58(nonce || ciphertext)` in `encryptedData`.
//!
//! # Canonical form
//!
//! For each payload field in declaration order, except `signature`, the
//! string `"{name}:{value}"` is appended, where `name` is the JSON wire name.
//! Scalars render with `Display` (strings raw, booleans as `true`/`false`,
//! integers in decimal). Nested sections render as compact JSON with empty
//! fields omitted, or `null` when absent. The string
//! `"operationId:{operation_id}"` closes the sequence. There are no
//! separators between entries.
//!
//! # Key derivation
//!
//! The sealing key is the bare SHA-256 of the passphrase, without salt or
//! stretching. Existing sealed documents depend on this derivation; a
//! password-based KDF would be a breaking wire change.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::error::EnvelopeError;
use crate::model::{EnvelopeState, Operation, PayloadData};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Render a nested section for the canonical form.
fn render_section<T: Serialize>(section: &Option<T>) -> Result<String, EnvelopeError> {
    match section {
        Some(value) => serde_json::to_string(value).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        }),
        None => Ok("null".to_string()),
    }
}

/// Canonical byte form of a document, used as the signing digest input.
pub fn canonical_bytes(op: &Operation) -> Result<Vec<u8>, EnvelopeError> {
    let payload = op
        .payload_data
        .as_ref()
        .ok_or(EnvelopeError::MissingPayload)?;

    let entries = [
        format!("timestamp:{}", payload.timestamp),
        format!("error:{}", payload.error),
        format!("message:{}", payload.message),
        format!("dummy:{}", payload.dummy),
        format!("header:{}", render_section(&payload.header)?),
        format!("credentials:{}", render_section(&payload.credentials)?),
        format!("data:{}", render_section(&payload.storage_data)?),
        format!("metadata:{}", render_section(&payload.metadata)?),
        format!("origin:{}", render_section(&payload.origin)?),
        format!("operationId:{}", op.operation_id),
    ];

    Ok(entries.concat().into_bytes())
}

/// SHA-256 over [`canonical_bytes`].
pub fn digest(op: &Operation) -> Result<[u8; 32], EnvelopeError> {
    let bytes = canonical_bytes(op)?;
    Ok(Sha256::digest(&bytes).into())
}

fn passphrase_cipher(passphrase: &str) -> Result<Aes256Gcm, EnvelopeError> {
    let key = Sha256::digest(passphrase.as_bytes());
    Aes256Gcm::new_from_slice(&key).map_err(|e| EnvelopeError::Encryption {
        reason: e.to_string(),
    })
}

fn require_unsealed(op: &Operation) -> Result<(), EnvelopeError> {
    match op.state() {
        EnvelopeState::Sealed => Err(EnvelopeError::InvalidState {
            expected: "plain or signed".to_string(),
            actual: EnvelopeState::Sealed.to_string(),
        }),
        _ => Ok(()),
    }
}

impl Operation {
    /// Sign the payload and return the serialized document.
    ///
    /// Any previous signature is replaced.
    pub fn sign(&mut self, private_key: &RsaPrivateKey) -> Result<String, EnvelopeError> {
        require_unsealed(self)?;
        let hashed = digest(self)?;

        let signature = private_key
            .sign(Pkcs1v15Sign::new::<Sha256>(), &hashed)
            .map_err(|e| EnvelopeError::Signing {
                reason: e.to_string(),
            })?;

        let payload = self
            .payload_data
            .as_mut()
            .ok_or(EnvelopeError::MissingPayload)?;
        payload.signature = bs58::encode(signature).into_string();

        self.to_json()
    }

    /// Check the payload signature against `public_key`.
    pub fn verify(&self, public_key: &RsaPublicKey) -> Result<(), EnvelopeError> {
        require_unsealed(self)?;
        let payload = self
            .payload_data
            .as_ref()
            .ok_or(EnvelopeError::MissingPayload)?;

        let signature = bs58::decode(&payload.signature)
            .into_vec()
            .map_err(|e| EnvelopeError::Decode {
                field: "signature".to_string(),
                reason: e.to_string(),
            })?;

        let hashed = digest(self)?;
        public_key
            .verify(Pkcs1v15Sign::new::<Sha256>(), &hashed, &signature)
            .map_err(|_| EnvelopeError::SignatureInvalid)
    }

    /// Encrypt the payload under `passphrase` and return the serialized
    /// envelope. The cleartext payload is removed from the document.
    pub fn seal(&mut self, passphrase: &str) -> Result<String, EnvelopeError> {
        require_unsealed(self)?;
        let payload = self
            .payload_data
            .as_ref()
            .ok_or(EnvelopeError::MissingPayload)?;

        let plaintext = serde_json::to_vec(payload).map_err(|e| EnvelopeError::Serialization {
            reason: e.to_string(),
        })?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|e| EnvelopeError::Entropy {
                reason: e.to_string(),
            })?;

        let cipher = passphrase_cipher(passphrase)?;
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|e| EnvelopeError::Encryption {
                reason: e.to_string(),
            })?;

        let mut framed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        framed.extend_from_slice(&nonce);
        framed.extend_from_slice(&ciphertext);

        self.encrypted = true;
        self.encrypted_data = Some(bs58::encode(framed).into_string());
        self.payload_data = None;

        self.to_json()
    }

    /// Decrypt a sealed payload in place.
    ///
    /// The document is left untouched on any failure.
    pub fn open(&mut self, passphrase: &str) -> Result<(), EnvelopeError> {
        let state = self.state();
        if state != EnvelopeState::Sealed {
            return Err(EnvelopeError::InvalidState {
                expected: EnvelopeState::Sealed.to_string(),
                actual: state.to_string(),
            });
        }

        let encoded = self
            .encrypted_data
            .as_deref()
            .ok_or_else(|| EnvelopeError::Decode {
                field: "encryptedData".to_string(),
                reason: "missing".to_string(),
            })?;

        let framed = bs58::decode(encoded)
            .into_vec()
            .map_err(|e| EnvelopeError::Decode {
                field: "encryptedData".to_string(),
                reason: e.to_string(),
            })?;

        if framed.len() < NONCE_LEN {
            return Err(EnvelopeError::Decode {
                field: "encryptedData".to_string(),
                reason: format!("{} bytes is shorter than the nonce", framed.len()),
            });
        }
        let (nonce, ciphertext) = framed.split_at(NONCE_LEN);

        let cipher = passphrase_cipher(passphrase)?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| EnvelopeError::AuthenticationFailed)?;

        let payload: PayloadData =
            serde_json::from_slice(&plaintext).map_err(|e| EnvelopeError::Serialization {
                reason: e.to_string(),
            })?;

        self.payload_data = Some(payload);
        self.encrypted_data = None;
        self.encrypted = false;
        Ok(())
    }

    /// Parse a serialized envelope and open it.
    pub fn open_serialized(data: &str, passphrase: &str) -> Result<Operation, EnvelopeError> {
        let mut op = Operation::from_json(data)?;
        op.open(passphrase)?;
        Ok(op)
    }
}
