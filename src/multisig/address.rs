//! Account identities
//!
//! Owners, recipients and wallets are all identified by a 20-byte
//! address written as `0x`-prefixed lowercase hex.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Length of an address in bytes
pub const ADDRESS_LEN: usize = 20;

/// Errors from parsing an address
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressError {
    #[error("Invalid address length: expected 40 hex characters, got {0}")]
    InvalidLength(usize),
    #[error("Invalid hex in address: {0}")]
    InvalidHex(String),
}

/// A 20-byte account identity
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Address([u8; ADDRESS_LEN]);

impl Address {
    /// The all-zero address, never a valid owner
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Create an address from raw bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LEN]) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the address
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] {
        &self.0
    }

    /// Check for the zero address
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_LEN]
    }

    /// Derive an address from arbitrary seed data.
    ///
    /// Takes the last 20 bytes of SHA-256(seed).
    pub fn derive(seed: &[u8]) -> Self {
        let hash = Sha256::digest(seed);
        let mut bytes = [0u8; ADDRESS_LEN];
        bytes.copy_from_slice(&hash[hash.len() - ADDRESS_LEN..]);
        Self(bytes)
    }

    /// Address of a wallet deployed by `deployer` with the given deploy nonce
    pub fn for_deployment(deployer: &Address, nonce: u64) -> Self {
        let mut seed = Vec::with_capacity(ADDRESS_LEN + 8);
        seed.extend_from_slice(deployer.as_bytes());
        seed.extend_from_slice(&nonce.to_be_bytes());
        Self::derive(&seed)
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let digits = s
            .strip_prefix("0x")
            .or_else(|| s.strip_prefix("0X"))
            .unwrap_or(s);

        if digits.len() != ADDRESS_LEN * 2 {
            return Err(AddressError::InvalidLength(digits.len()));
        }

        let mut bytes = [0u8; ADDRESS_LEN];
        hex::decode_to_slice(digits, &mut bytes)
            .map_err(|e| AddressError::InvalidHex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let addr: Address = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse().unwrap();
        assert_eq!(
            addr.to_string(),
            "0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266"
        );

        // Prefix is optional
        let bare: Address = "f39fd6e51aad88f6f4ce6ab8827279cfffb92266".parse().unwrap();
        assert_eq!(addr, bare);
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(
            "0x1234".parse::<Address>(),
            Err(AddressError::InvalidLength(4))
        );
        assert!(matches!(
            "0xzz9fd6e51aad88f6f4ce6ab8827279cfffb92266".parse::<Address>(),
            Err(AddressError::InvalidHex(_))
        ));
    }

    #[test]
    fn test_zero_address() {
        assert!(Address::ZERO.is_zero());
        let parsed: Address = "0x0000000000000000000000000000000000000000"
            .parse()
            .unwrap();
        assert!(parsed.is_zero());
        assert!(!Address::derive(b"seed").is_zero());
    }

    #[test]
    fn test_deployment_addresses_are_distinct() {
        let deployer = Address::derive(b"deployer");
        let first = Address::for_deployment(&deployer, 0);
        let second = Address::for_deployment(&deployer, 1);

        assert_ne!(first, second);
        assert_eq!(first, Address::for_deployment(&deployer, 0));
    }

    #[test]
    fn test_serde_as_string() {
        let addr = Address::derive(b"owner");
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));

        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
        assert!(serde_json::from_str::<Address>("\"nope\"").is_err());
    }
}
