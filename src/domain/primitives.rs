//! Domain primitives: TimeMs, Address, Token, TxId.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Virtual time in milliseconds since the session started.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct TimeMs(pub i64);

impl TimeMs {
    pub fn new(ms: i64) -> Self {
        TimeMs(ms)
    }

    pub fn as_ms(&self) -> i64 {
        self.0
    }

    /// Saturating offset into the future.
    pub fn plus(&self, ms: i64) -> Self {
        TimeMs(self.0.saturating_add(ms))
    }
}

/// Wallet address supplied by the identity collaborator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Address(pub String);

impl Address {
    pub fn new(addr: String) -> Self {
        Address(addr)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Token symbols known to the simulated account.
///
/// `Ifx` is the primary asset, `World` the secondary asset and `Usd` the
/// quote currency. Only the first two have pool reserves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Token {
    Ifx,
    World,
    Usd,
}

impl Token {
    pub const ALL: [Token; 3] = [Token::Ifx, Token::World, Token::Usd];

    pub fn as_str(&self) -> &'static str {
        match self {
            Token::Ifx => "IFX",
            Token::World => "WORLD",
            Token::Usd => "USD",
        }
    }

    /// Whether the token has a reserve in the constant-product pool.
    pub fn is_pool_asset(&self) -> bool {
        matches!(self, Token::Ifx | Token::World)
    }
}

impl std::fmt::Display for Token {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown token symbol: {0}")]
pub struct TokenParseError(pub String);

impl FromStr for Token {
    type Err = TokenParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "IFX" => Ok(Token::Ifx),
            "WORLD" => Ok(Token::World),
            "USD" => Ok(Token::Usd),
            _ => Err(TokenParseError(s.to_string())),
        }
    }
}

/// Opaque transaction identifier shared by a pending record and its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TxId(pub uuid::Uuid);

impl TxId {
    /// Build an id from 16 random bytes (UUID v4 layout).
    pub fn from_random_bytes(bytes: [u8; 16]) -> Self {
        TxId(uuid::Builder::from_random_bytes(bytes).into_uuid())
    }

    pub fn parse_str(s: &str) -> Result<Self, uuid::Error> {
        uuid::Uuid::parse_str(s).map(TxId)
    }
}

impl std::fmt::Display for TxId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parse_is_case_insensitive() {
        assert_eq!("ifx".parse::<Token>().unwrap(), Token::Ifx);
        assert_eq!(" World ".parse::<Token>().unwrap(), Token::World);
        assert_eq!("USD".parse::<Token>().unwrap(), Token::Usd);
        assert!("BTC".parse::<Token>().is_err());
    }

    #[test]
    fn test_token_serialization() {
        let json = serde_json::to_string(&Token::World).unwrap();
        assert_eq!(json, "\"WORLD\"");
        let back: Token = serde_json::from_str("\"IFX\"").unwrap();
        assert_eq!(back, Token::Ifx);
    }

    #[test]
    fn test_pool_assets() {
        assert!(Token::Ifx.is_pool_asset());
        assert!(Token::World.is_pool_asset());
        assert!(!Token::Usd.is_pool_asset());
    }

    #[test]
    fn test_tx_id_is_v4() {
        let id = TxId::from_random_bytes([7u8; 16]);
        assert_eq!(id.0.get_version_num(), 4);
        assert_eq!(id, TxId::from_random_bytes([7u8; 16]));
        assert_eq!(TxId::parse_str(&id.to_string()).unwrap(), id);
        assert!(TxId::parse_str("not-an-id").is_err());
    }

    #[test]
    fn test_timems_plus_saturates() {
        assert_eq!(TimeMs::new(1000).plus(500), TimeMs::new(1500));
        assert_eq!(TimeMs::new(i64::MAX).plus(1), TimeMs::new(i64::MAX));
    }
}
