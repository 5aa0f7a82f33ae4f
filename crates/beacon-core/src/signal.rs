//! Signed announcement ("signal") construction and verification.
//!
//!   message = instance_name ‖ pin_text
//!   signal  = frame(sign(message), public_key, pin_text)
//!
//! The instance name is the string advertised as the discovery instance, so a
//! receiver can rebuild the signed message from the record alone.

use thiserror::Error;

use crate::crypto::{self, CryptoError, SigningKeypair};
use crate::wire::{sanitize_instance_name, Announcement, Framing, WireError};

#[derive(Debug, Error)]
pub enum SignalError {
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Build the advertised identity for a node.
///
/// `"{prefix}server -={node_name}=-"`, sanitized for use as an instance name.
pub fn instance_identity(prefix: &str, node_name: &str) -> String {
    sanitize_instance_name(&format!("{prefix}server -={node_name}=-"))
}

/// Wrap a certificate pin the way it is carried in the signal.
pub fn pin_text(pin: &str) -> String {
    format!("pin -={pin}=-")
}

/// An encoded announcement ready to be attached to a service descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signal {
    pub instance_name: String,
    pub framing: Framing,
    pub payload: Vec<u8>,
}

/// Signs and frames announcements with one keypair.
pub struct SignalEncoder {
    keypair: SigningKeypair,
    framing: Framing,
}

impl SignalEncoder {
    pub fn new(keypair: SigningKeypair, framing: Framing) -> Self {
        Self { keypair, framing }
    }

    /// Sign `identity ‖ pin` and frame the result.
    ///
    /// `identity` is sanitized first; sanitizing an already clean name is a
    /// no-op. Fails with [`WireError::EncodingOverflow`] when the framing
    /// cannot represent the field lengths.
    pub fn encode(&self, identity: &str, pin: &str) -> Result<Signal, WireError> {
        let instance_name = sanitize_instance_name(identity);

        let mut message = Vec::with_capacity(instance_name.len() + pin.len());
        message.extend_from_slice(instance_name.as_bytes());
        message.extend_from_slice(pin.as_bytes());

        let announcement = Announcement {
            signature: self.keypair.sign(&message),
            public_key: self.keypair.public_key_der().to_vec(),
            pin: pin.as_bytes().to_vec(),
        };
        let payload = announcement.encode(self.framing)?;

        Ok(Signal {
            instance_name,
            framing: self.framing,
            payload,
        })
    }
}

/// Decode `payload` and check its signature against `instance_name`.
///
/// Returns the decoded fields on success.
pub fn verify_signal(
    instance_name: &str,
    payload: &[u8],
    framing: Framing,
) -> Result<Announcement, SignalError> {
    let announcement = Announcement::decode(payload, framing)?;

    let mut message = Vec::with_capacity(instance_name.len() + announcement.pin.len());
    message.extend_from_slice(instance_name.as_bytes());
    message.extend_from_slice(&announcement.pin);

    crypto::verify(&announcement.public_key, &message, &announcement.signature)?;
    Ok(announcement)
}
