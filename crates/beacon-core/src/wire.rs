//! Beacon wire format — the announcement payload carried in discovery records.
//!
//! An announcement binds three byte fields: a DER ECDSA signature, a DER
//! SubjectPublicKeyInfo public key, and the textual certificate pin.
//!
//! Two framings exist:
//!
//!   Legacy          sig ‖ pubkey ‖ pin ‖ [hi(S), lo(S), hi(S+K), lo(S+K)]
//!   LengthPrefixed  u16be(S) ‖ sig ‖ u16be(K) ‖ pubkey ‖ u16be(P) ‖ pin
//!
//! Legacy is what deployed mobile apps parse. Its tail stores each end offset
//! as two whole bytes, `x / 16` then `x % 16`, so an offset above 4095 cannot be
//! represented. Encoding refuses such payloads instead of wrapping.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ── Constants ─────────────────────────────────────────────────────────────────

/// Discovery instance names must stay under the 63-byte DNS label limit.
pub const MAX_INSTANCE_NAME_LEN: usize = 62;

/// Largest end offset the legacy tail markers can express (255 * 16 + 15).
pub const LEGACY_MAX_OFFSET: usize = 4095;

/// Number of marker bytes at the end of a legacy payload.
pub const LEGACY_TAIL_LEN: usize = 4;

/// Largest field the length-prefixed framing can carry.
pub const PREFIXED_MAX_FIELD: usize = u16::MAX as usize;

// ── Errors ────────────────────────────────────────────────────────────────────

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WireError {
    #[error("{field} end offset {len} exceeds framing capacity {max}")]
    EncodingOverflow {
        field: &'static str,
        len: usize,
        max: usize,
    },
    #[error("payload truncated: needed {needed} bytes, have {available}")]
    Truncated { needed: usize, available: usize },
    #[error("length markers out of range: signature end {sig_end}, key end {key_end}, body {body_len}")]
    InvalidMarkers {
        sig_end: usize,
        key_end: usize,
        body_len: usize,
    },
}

// ── Instance names ────────────────────────────────────────────────────────────

/// Make a string usable as a discovery instance name.
///
/// Every '.' becomes ',' and the result is cut to at most
/// [`MAX_INSTANCE_NAME_LEN`] bytes on a character boundary.
pub fn sanitize_instance_name(name: &str) -> String {
    let mut out = name.replace('.', ",");
    if out.len() > MAX_INSTANCE_NAME_LEN {
        let mut cut = MAX_INSTANCE_NAME_LEN;
        while !out.is_char_boundary(cut) {
            cut -= 1;
        }
        out.truncate(cut);
    }
    out
}

// ── Framing ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Framing {
    /// Tail-marker framing understood by existing peers.
    #[default]
    Legacy,
    /// Explicit 2-byte big-endian length before each field.
    LengthPrefixed,
}

impl std::fmt::Display for Framing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Framing::Legacy => f.write_str("legacy"),
            Framing::LengthPrefixed => f.write_str("length_prefixed"),
        }
    }
}

impl std::str::FromStr for Framing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "legacy" => Ok(Framing::Legacy),
            "length_prefixed" => Ok(Framing::LengthPrefixed),
            other => Err(format!("unknown framing '{other}'")),
        }
    }
}

/// Split an offset into the legacy (x / 16, x % 16) byte pair.
pub fn split_marker(offset: usize) -> [u8; 2] {
    debug_assert!(offset <= LEGACY_MAX_OFFSET);
    [(offset / 16) as u8, (offset % 16) as u8]
}

/// Inverse of [`split_marker`].
pub fn join_marker(hi: u8, lo: u8) -> usize {
    hi as usize * 16 + lo as usize
}

// ── Announcement ──────────────────────────────────────────────────────────────

/// The three fields of an announcement, before framing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Announcement {
    /// DER-encoded ECDSA P-256 signature over `instance_name ‖ pin`.
    pub signature: Vec<u8>,
    /// DER-encoded SubjectPublicKeyInfo of the signing key.
    pub public_key: Vec<u8>,
    /// Pin text as UTF-8 bytes, e.g. `pin -=<fingerprint>=-`.
    pub pin: Vec<u8>,
}

impl Announcement {
    pub fn encode(&self, framing: Framing) -> Result<Vec<u8>, WireError> {
        match framing {
            Framing::Legacy => self.encode_legacy(),
            Framing::LengthPrefixed => self.encode_prefixed(),
        }
    }

    pub fn decode(bytes: &[u8], framing: Framing) -> Result<Self, WireError> {
        match framing {
            Framing::Legacy => Self::decode_legacy(bytes),
            Framing::LengthPrefixed => Self::decode_prefixed(bytes),
        }
    }

    fn encode_legacy(&self) -> Result<Vec<u8>, WireError> {
        let sig_end = self.signature.len();
        let key_end = sig_end + self.public_key.len();

        if sig_end > LEGACY_MAX_OFFSET {
            return Err(WireError::EncodingOverflow {
                field: "signature",
                len: sig_end,
                max: LEGACY_MAX_OFFSET,
            });
        }
        if key_end > LEGACY_MAX_OFFSET {
            return Err(WireError::EncodingOverflow {
                field: "public key",
                len: key_end,
                max: LEGACY_MAX_OFFSET,
            });
        }

        let mut out = Vec::with_capacity(key_end + self.pin.len() + LEGACY_TAIL_LEN);
        out.extend_from_slice(&self.signature);
        out.extend_from_slice(&self.public_key);
        out.extend_from_slice(&self.pin);

        out.extend_from_slice(&split_marker(sig_end));
        out.extend_from_slice(&split_marker(key_end));
        Ok(out)
    }

    fn decode_legacy(bytes: &[u8]) -> Result<Self, WireError> {
        if bytes.len() < LEGACY_TAIL_LEN {
            return Err(WireError::Truncated {
                needed: LEGACY_TAIL_LEN,
                available: bytes.len(),
            });
        }

        let body_len = bytes.len() - LEGACY_TAIL_LEN;
        let tail = &bytes[body_len..];
        let sig_end = join_marker(tail[0], tail[1]);
        let key_end = join_marker(tail[2], tail[3]);

        let lo_in_range = tail[1] < 16 && tail[3] < 16;
        if !lo_in_range || sig_end > key_end || key_end > body_len {
            return Err(WireError::InvalidMarkers {
                sig_end,
                key_end,
                body_len,
            });
        }

        Ok(Self {
            signature: bytes[..sig_end].to_vec(),
            public_key: bytes[sig_end..key_end].to_vec(),
            pin: bytes[key_end..body_len].to_vec(),
        })
    }

    fn encode_prefixed(&self) -> Result<Vec<u8>, WireError> {
        let fields: [(&'static str, &[u8]); 3] = [
            ("signature", &self.signature),
            ("public key", &self.public_key),
            ("pin", &self.pin),
        ];

        let total: usize = fields.iter().map(|(_, f)| 2 + f.len()).sum();
        let mut out = Vec::with_capacity(total);
        for (field, bytes) in fields {
            if bytes.len() > PREFIXED_MAX_FIELD {
                return Err(WireError::EncodingOverflow {
                    field,
                    len: bytes.len(),
                    max: PREFIXED_MAX_FIELD,
                });
            }
            out.extend_from_slice(&(bytes.len() as u16).to_be_bytes());
            out.extend_from_slice(bytes);
        }
        Ok(out)
    }

    fn decode_prefixed(bytes: &[u8]) -> Result<Self, WireError> {
        let mut rest = bytes;
        let signature = take_prefixed(&mut rest)?.to_vec();
        let public_key = take_prefixed(&mut rest)?.to_vec();
        let pin = take_prefixed(&mut rest)?.to_vec();
        Ok(Self {
            signature,
            public_key,
            pin,
        })
    }
}

/// Read one `u16be(len) ‖ field` record and advance `rest` past it.
fn take_prefixed<'a>(rest: &mut &'a [u8]) -> Result<&'a [u8], WireError> {
    let buf: &'a [u8] = *rest;
    if buf.len() < 2 {
        return Err(WireError::Truncated {
            needed: 2,
            available: buf.len(),
        });
    }
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if buf.len() < 2 + len {
        return Err(WireError::Truncated {
            needed: 2 + len,
            available: buf.len(),
        });
    }
    let (field, tail) = buf[2..].split_at(len);
    *rest = tail;
    Ok(field)
}
