//! Raw participant keys

use super::codec::CodecError;
use std::fmt;

/// Length of a raw x-only public key
pub const KEY_LEN: usize = 32;

/// A participant's raw 32-byte public key.
///
/// Ordering is lexical over the bytes, which is the same order as the
/// lowercase hex form.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; KEY_LEN]);

impl PublicKey {
    pub const fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, CodecError> {
        let raw: [u8; KEY_LEN] = bytes
            .try_into()
            .map_err(|_| CodecError::InvalidLength(bytes.len()))?;
        Ok(Self(raw))
    }

    /// Parse the 64-character hex form used on the wire
    pub fn from_hex(value: &str) -> Result<Self, CodecError> {
        if value.len() != KEY_LEN * 2 {
            return Err(CodecError::InvalidLength(value.len() / 2));
        }
        let bytes = hex::decode(value).map_err(|e| CodecError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_round_trip() {
        let hex = "7e7e9c42a91bfef19fa929e5fda1b72e0ebc1a4c1141673e2794234d86addf4e";
        let key = PublicKey::from_hex(hex).unwrap();
        assert_eq!(key.to_hex(), hex);
        assert_eq!(key.as_bytes()[0], 0x7e);
    }

    #[test]
    fn test_rejects_malformed_hex() {
        assert!(matches!(PublicKey::from_hex("abcd"), Err(CodecError::InvalidLength(2))));
        let not_hex = "zz".repeat(32);
        assert!(matches!(PublicKey::from_hex(&not_hex), Err(CodecError::InvalidHex(_))));
    }

    #[test]
    fn test_ordering_is_bytewise() {
        let low = PublicKey::from_bytes([0u8; KEY_LEN]);
        let mut high_bytes = [0u8; KEY_LEN];
        high_bytes[0] = 1;
        let high = PublicKey::from_bytes(high_bytes);
        assert!(low < high);
    }
}
