//! System-wide constants for the Dealbook marketplace core.

/// Decimal places kept on every monetary amount.
pub const AMOUNT_SCALE: u32 = 2;

/// Largest monetary amount accepted on an offer or withdrawal, in whole
/// currency units.
pub const MAX_AMOUNT_UNITS: i64 = 1_000_000_000_000;

/// Default platform commission rate, in basis points (2%).
pub const DEFAULT_COMMISSION_BPS: i64 = 200;

/// Version tag of the commission policy shipped by default.
pub const DEFAULT_COMMISSION_POLICY_VERSION: u32 = 1;

/// Commit attempts before a version conflict surfaces as
/// `ConcurrencyConflict`.
pub const DEFAULT_MAX_COMMIT_RETRIES: u32 = 8;

/// Maximum length of a free-text reason (withdrawal, dispute, notes).
pub const DEFAULT_MAX_REASON_LEN: usize = 2000;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Engine name.
pub const ENGINE_NAME: &str = "Dealbook";
