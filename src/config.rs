//! Client configuration - passed in from the host

use crate::units::DEFAULT_DECIMALS;
use alloy_primitives::{address, Address};
use std::str::FromStr;
use thiserror::Error;

/// Ledger contract the client binds to unless told otherwise.
pub const DEFAULT_CONTRACT: Address = address!("f39Fd6e51aad88F6F4ce6aB8827279cffFb92266");

pub const ENV_CONTRACT: &str = "LEDGERLINK_CONTRACT";
pub const ENV_DECIMALS: &str = "LEDGERLINK_DECIMALS";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid contract address {0:?}")]
    Contract(String),
    #[error("invalid decimals {0:?} (expected 0-77)")]
    Decimals(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub contract: Address,
    /// Scale between display units and base units: 1 display unit is
    /// `10^decimals` base units.
    pub decimals: u8,
}

impl Default for ClientConfig {
    fn default() -> Self { Self { contract: DEFAULT_CONTRACT, decimals: DEFAULT_DECIMALS } }
}

impl ClientConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_contract(mut self, contract: Address) -> Self { self.contract = contract; self }
    pub fn with_decimals(mut self, decimals: u8) -> Self { self.decimals = decimals; self }

    /// Defaults overridden by `LEDGERLINK_CONTRACT` / `LEDGERLINK_DECIMALS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(raw) = lookup(ENV_CONTRACT).filter(|s| !s.trim().is_empty()) {
            config.contract = parse_contract(&raw)?;
        }
        if let Some(raw) = lookup(ENV_DECIMALS).filter(|s| !s.trim().is_empty()) {
            config.decimals = parse_decimals(&raw)?;
        }
        Ok(config)
    }
}

pub fn parse_contract(raw: &str) -> Result<Address, ConfigError> {
    Address::from_str(raw.trim()).map_err(|_| ConfigError::Contract(raw.to_string()))
}

/// U256 holds at most 10^77, so larger scales cannot be represented.
pub const MAX_DECIMALS: u8 = 77;

pub fn check_decimals(decimals: u8) -> Result<u8, ConfigError> {
    if decimals > MAX_DECIMALS {
        return Err(ConfigError::Decimals(decimals.to_string()));
    }
    Ok(decimals)
}

pub fn parse_decimals(raw: &str) -> Result<u8, ConfigError> {
    let decimals = raw.trim().parse::<u8>().map_err(|_| ConfigError::Decimals(raw.to_string()))?;
    check_decimals(decimals)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_match_deployment() {
        let config = ClientConfig::default();
        assert_eq!(config.contract.to_checksum(None), "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(config.decimals, 18);
    }

    #[test]
    fn lookup_overrides_defaults() {
        let vars: HashMap<&str, &str> = HashMap::from([
            (ENV_CONTRACT, "0x5fbdb2315678afecb367f032d93f642f64180aa3"),
            (ENV_DECIMALS, "6"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.decimals, 6);
        assert_eq!(config.contract, parse_contract("0x5FbDB2315678afecb367f032d93F642f64180aa3").unwrap());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(ClientConfig::from_lookup(|k| (k == ENV_DECIMALS).then(|| "99".into())), Err(ConfigError::Decimals(_))));
        assert!(matches!(ClientConfig::from_lookup(|k| (k == ENV_CONTRACT).then(|| "0x12".into())), Err(ConfigError::Contract(_))));
    }

    #[test]
    fn decimals_stop_at_u256_range() {
        assert_eq!(check_decimals(0), Ok(0));
        assert_eq!(check_decimals(77), Ok(77));
        assert!(matches!(check_decimals(78), Err(ConfigError::Decimals(d)) if d == "78"));
        assert!(matches!(parse_decimals("255"), Err(ConfigError::Decimals(_))));
        assert!(matches!(parse_decimals("-1"), Err(ConfigError::Decimals(_))));
    }
}
