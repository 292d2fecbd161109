//! NIP-19 npub encoding
//!
//! Participants are stored by their bech32 `npub` form and ranked by their
//! raw key. Anything that does not decode is skipped by callers.

use super::key::PublicKey;
use bech32::{Bech32, Hrp};
use thiserror::Error;

/// Human-readable prefix of an encoded public key
pub const NPUB_PREFIX: &str = "npub";

const NPUB_HRP: Hrp = Hrp::parse_unchecked(NPUB_PREFIX);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("expected npub prefix, got {0:?}")]
    WrongPrefix(String),

    #[error("bech32 decode error: {0}")]
    Decode(String),

    #[error("bech32 encode error: {0}")]
    Encode(String),

    #[error("expected a 32-byte key, got {0} bytes")]
    InvalidLength(usize),

    #[error("invalid hex key: {0}")]
    InvalidHex(String),
}

/// Decode an `npub1...` string into its raw key
pub fn decode_npub(encoded: &str) -> Result<PublicKey, CodecError> {
    let encoded = encoded.trim();
    if !encoded.starts_with(NPUB_PREFIX) {
        let prefix: String = encoded.chars().take(NPUB_PREFIX.len()).collect();
        return Err(CodecError::WrongPrefix(prefix));
    }

    let (hrp, data) = bech32::decode(encoded).map_err(|e| CodecError::Decode(e.to_string()))?;
    if hrp != NPUB_HRP {
        return Err(CodecError::WrongPrefix(hrp.to_string()));
    }

    PublicKey::from_slice(&data)
}

/// Encode a raw key as `npub1...`
pub fn encode_npub(key: &PublicKey) -> Result<String, CodecError> {
    bech32::encode::<Bech32>(NPUB_HRP, key.as_bytes()).map_err(|e| CodecError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    // NIP-19 reference vector
    const NPUB: &str = "npub10elfcs4fr0l0r8af98jlmgdh9c8tcxjvz9qkw038js35mp4dma8qzvjptg";
    const HEX: &str = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";

    #[test]
    fn test_decode_reference_vector() {
        let key = decode_npub(NPUB).unwrap();
        assert_eq!(key.to_hex(), HEX);
    }

    #[test]
    fn test_encode_reference_vector() {
        let key = PublicKey::from_hex(HEX).unwrap();
        assert_eq!(encode_npub(&key).unwrap(), NPUB);
    }

    #[test]
    fn test_rejects_other_prefixes() {
        let err = decode_npub("nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5").unwrap_err();
        assert!(matches!(err, CodecError::WrongPrefix(_)));
        assert!(matches!(decode_npub(""), Err(CodecError::WrongPrefix(_))));
    }

    #[test]
    fn test_rejects_bad_checksum() {
        let mut corrupted = NPUB.to_string();
        corrupted.pop();
        corrupted.push('q');
        assert!(matches!(decode_npub(&corrupted), Err(CodecError::Decode(_))));
    }
}
