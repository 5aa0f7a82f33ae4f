//! Cryptographic primitives for Beacon.
//!
//! Provides two things:
//!   1. ECDSA P-256 signing and verification of announcement messages
//!   2. The node's self-signed TLS identity and its pin (certificate fingerprint)
//!
//! Signatures are DER-encoded and public keys are DER SubjectPublicKeyInfo, so a
//! P-256 public key is always 91 bytes and a signature 70–72 bytes.
//!
//! Private key material is wiped from memory when dropped.
//! There is no unsafe code in this module.

use base64::Engine;
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey};
use sha2::{Digest, Sha256};
use thiserror::Error;
use zeroize::Zeroizing;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("public key encoding failed: {0}")]
    KeyEncoding(String),
    #[error("invalid public key")]
    InvalidPublicKey,
    #[error("malformed signature")]
    MalformedSignature,
    #[error("signature does not verify")]
    BadSignature,
    #[error("certificate generation failed: {0}")]
    Certificate(String),
}

// ── Signing keypair ───────────────────────────────────────────────────────────

/// A per-run ECDSA P-256 keypair used to sign announcements.
///
/// A fresh keypair is generated each run; peers trust the pin, not the key.
pub struct SigningKeypair {
    secret: SigningKey,
    public_der: Vec<u8>,
}

impl SigningKeypair {
    /// Generate a new random keypair from the OS RNG.
    pub fn generate() -> Result<Self, CryptoError> {
        let secret = SigningKey::random(&mut rand::rngs::OsRng);
        let public_der = secret
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| CryptoError::KeyEncoding(e.to_string()))?
            .as_bytes()
            .to_vec();
        Ok(Self { secret, public_der })
    }

    /// DER SubjectPublicKeyInfo of the verifying key.
    pub fn public_key_der(&self) -> &[u8] {
        &self.public_der
    }

    /// Sign `message` (SHA-256 digest), returning the DER signature.
    pub fn sign(&self, message: &[u8]) -> Vec<u8> {
        let signature: Signature = self.secret.sign(message);
        signature.to_der().as_bytes().to_vec()
    }
}

/// Verify a DER signature over `message` against a DER SPKI public key.
pub fn verify(public_key_der: &[u8], message: &[u8], signature_der: &[u8]) -> Result<(), CryptoError> {
    let key =
        VerifyingKey::from_public_key_der(public_key_der).map_err(|_| CryptoError::InvalidPublicKey)?;
    let signature = Signature::from_der(signature_der).map_err(|_| CryptoError::MalformedSignature)?;
    key.verify(message, &signature)
        .map_err(|_| CryptoError::BadSignature)
}

// ── TLS identity ──────────────────────────────────────────────────────────────

/// Self-signed certificate and PKCS#8 private key for the inbound TLS listener.
pub struct TlsIdentity {
    cert_der: Vec<u8>,
    key_der: Zeroizing<Vec<u8>>,
}

impl TlsIdentity {
    /// Generate a self-signed certificate valid for `subject_alt_names`.
    pub fn self_signed(subject_alt_names: Vec<String>) -> Result<Self, CryptoError> {
        let rcgen::CertifiedKey { cert, key_pair } = rcgen::generate_simple_self_signed(subject_alt_names)
            .map_err(|e| CryptoError::Certificate(e.to_string()))?;
        Ok(Self {
            cert_der: cert.der().to_vec(),
            key_der: Zeroizing::new(key_pair.serialize_der()),
        })
    }

    pub fn cert_der(&self) -> &[u8] {
        &self.cert_der
    }

    pub fn key_der(&self) -> &[u8] {
        &self.key_der
    }

    /// Fingerprint of this certificate, see [`certificate_pin`].
    pub fn pin(&self) -> String {
        certificate_pin(&self.cert_der)
    }
}

/// The pin of a certificate: base64 of the SHA-256 digest of its DER encoding.
///
/// Mobile apps compare this against the certificate presented during the
/// TLS handshake before trusting the connection.
pub fn certificate_pin(cert_der: &[u8]) -> String {
    base64::engine::general_purpose::STANDARD.encode(Sha256::digest(cert_der))
}
