use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub const SIGNATURE_LENGTH: usize = 64;
pub const ADDRESS_LENGTH: usize = 32;
pub const BLOCK_HASH_LENGTH: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("invalid base58: {0}")]
    Base58(String),

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("expected {expected} bytes, got {actual}")]
    Length { expected: usize, actual: usize },
}

fn decode_base58(s: &str, expected: usize) -> Result<Vec<u8>, ParseError> {
    let bytes = bs58::decode(s)
        .into_vec()
        .map_err(|err| ParseError::Base58(err.to_string()))?;
    if bytes.len() != expected {
        return Err(ParseError::Length {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(bytes)
}

/// Transaction identifier on the remote ledger, kept in its base58 text form.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    pub fn from_bytes(bytes: [u8; SIGNATURE_LENGTH]) -> Self {
        Signature(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix for log lines.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl FromStr for Signature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58(s, SIGNATURE_LENGTH)?;
        Ok(Signature(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Account address whose transaction history is crawled.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    pub fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Address(bs58::encode(bytes).into_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Address {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_base58(s, ADDRESS_LENGTH)?;
        Ok(Address(s.to_string()))
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Block identifier, stored as `0x`-prefixed lowercase hex.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct BlockHash(pub [u8; BLOCK_HASH_LENGTH]);

impl BlockHash {
    /// Decode the base58 form the remote ledger reports.
    pub fn from_base58(s: &str) -> Result<Self, ParseError> {
        let bytes = decode_base58(s, BLOCK_HASH_LENGTH)?;
        let mut inner = [0u8; BLOCK_HASH_LENGTH];
        inner.copy_from_slice(&bytes);
        Ok(BlockHash(inner))
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl FromStr for BlockHash {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut inner = [0u8; BLOCK_HASH_LENGTH];
        hex::decode_to_slice(digits, &mut inner).map_err(|err| ParseError::Hex(err.to_string()))?;
        Ok(BlockHash(inner))
    }
}

impl fmt::Display for BlockHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for BlockHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for BlockHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Staleness tier requested from the remote per call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Recent,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Recent => "recent",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip_through_text() {
        let sig = Signature::from_bytes([7u8; SIGNATURE_LENGTH]);
        let parsed: Signature = sig.as_str().parse().unwrap();
        assert_eq!(parsed, sig);
    }

    #[test]
    fn test_signature_rejects_wrong_length() {
        let short = bs58::encode([1u8; 10]).into_string();
        assert_eq!(
            short.parse::<Signature>().unwrap_err(),
            ParseError::Length {
                expected: SIGNATURE_LENGTH,
                actual: 10
            }
        );
    }

    #[test]
    fn test_parse_error_messages() {
        let err = ParseError::Length {
            expected: SIGNATURE_LENGTH,
            actual: 10,
        };
        assert_eq!(err.to_string(), "expected 64 bytes, got 10");
        let boxed: Box<dyn std::error::Error + Send + Sync> = Box::new(err);
        assert_eq!(boxed.to_string(), "expected 64 bytes, got 10");
        assert_eq!(ParseError::Hex("odd length".into()).to_string(), "invalid hex: odd length");
    }

    #[test]
    fn test_signature_rejects_non_base58() {
        assert!(matches!(
            "0OIl".parse::<Signature>(),
            Err(ParseError::Base58(_))
        ));
    }

    #[test]
    fn test_block_hash_from_base58_is_hex_encoded() {
        let raw = [0xabu8; BLOCK_HASH_LENGTH];
        let encoded = bs58::encode(raw).into_string();
        let hash = BlockHash::from_base58(&encoded).unwrap();
        assert_eq!(hash.to_string(), format!("0x{}", "ab".repeat(32)));
        assert_eq!(hash.to_base58(), encoded);
    }

    #[test]
    fn test_block_hash_parse_accepts_prefixed_hex() {
        let text = format!("0x{}", "01".repeat(32));
        let hash: BlockHash = text.parse().unwrap();
        assert_eq!(hash.0, [1u8; BLOCK_HASH_LENGTH]);
        assert_eq!(serde_json::to_string(&hash).unwrap(), format!("\"{text}\""));
    }

    #[test]
    fn test_commitment_wire_names() {
        assert_eq!(
            serde_json::to_string(&Commitment::Confirmed).unwrap(),
            "\"confirmed\""
        );
        assert_eq!(Commitment::Recent.as_str(), "recent");
    }
}
