//! System-wide constants for the MandiSettle engine.

/// Decimal places of the ledger's smallest unit. Display amounts are a
/// fixed-point scaling of base units by this factor.
pub const BASE_UNIT_SCALE: u32 = 18;

/// Default wait for a submitted transaction to confirm, in milliseconds.
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 30_000;

/// Default number of attempts for a transient-failing ledger call.
pub const DEFAULT_SUBMIT_RETRIES: u32 = 3;

/// Default backoff between retry attempts, in milliseconds.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 250;

/// Interval between confirmation polls, in milliseconds.
pub const CONFIRMATION_POLL_INTERVAL_MS: u64 = 10;

/// Token grant minted to a newly registered wallet (marketplace units).
pub const DEFAULT_TOKEN_GRANT_UNITS: i64 = 10_000;

/// Gas-coin grant transferred to a newly registered wallet, expressed in
/// hundredths of a coin (0.05).
pub const DEFAULT_GAS_GRANT_CENTIS: i64 = 5;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "MandiSettle";
