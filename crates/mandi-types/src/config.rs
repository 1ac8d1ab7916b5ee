//! Configuration for the settlement engine.
//!
//! Constructed once at startup and handed by reference into every
//! component; nothing here is re-read or re-created mid-flight.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::constants;

/// Grants funded to a freshly registered wallet by the custodian.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FundingConfig {
    /// Gas-coin transfer so the new wallet can pay transaction fees.
    pub gas_grant: Decimal,
    /// Token mint in marketplace units.
    pub token_grant: Decimal,
}

impl Default for FundingConfig {
    fn default() -> Self {
        Self {
            gas_grant: Decimal::new(constants::DEFAULT_GAS_GRANT_CENTIS, 2),
            token_grant: Decimal::new(constants::DEFAULT_TOKEN_GRANT_UNITS, 0),
        }
    }
}

/// Settlement engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// How long to wait for a submitted transaction to confirm before
    /// giving up locally. The transaction may still land afterwards.
    pub confirmation_timeout_ms: u64,
    /// Attempts for a ledger call that fails transiently. Rejections are
    /// never auto-retried.
    pub submit_retries: u32,
    /// Linear backoff between retry attempts.
    pub retry_backoff_ms: u64,
    /// New-wallet funding grants.
    pub funding: FundingConfig,
}

impl EngineConfig {
    #[must_use]
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }

    #[must_use]
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_ms: constants::DEFAULT_CONFIRMATION_TIMEOUT_MS,
            submit_retries: constants::DEFAULT_SUBMIT_RETRIES,
            retry_backoff_ms: constants::DEFAULT_RETRY_BACKOFF_MS,
            funding: FundingConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_constants() {
        let cfg = EngineConfig::default();
        assert_eq!(cfg.confirmation_timeout_ms, 30_000);
        assert_eq!(cfg.submit_retries, 3);
        assert_eq!(cfg.funding.gas_grant, Decimal::new(5, 2)); // 0.05
        assert_eq!(cfg.funding.token_grant, Decimal::new(10_000, 0));
    }

    #[test]
    fn duration_accessors() {
        let cfg = EngineConfig {
            confirmation_timeout_ms: 1500,
            retry_backoff_ms: 20,
            ..EngineConfig::default()
        };
        assert_eq!(cfg.confirmation_timeout(), Duration::from_millis(1500));
        assert_eq!(cfg.retry_backoff(), Duration::from_millis(20));
    }

    #[test]
    fn config_serde_roundtrip() {
        let cfg = EngineConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.submit_retries, cfg.submit_retries);
        assert_eq!(back.funding.token_grant, cfg.funding.token_grant);
    }
}
