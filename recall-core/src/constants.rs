//! Outreach Constants
//!
//! Centralized defaults for the outreach engine. Configuration structs in the
//! downstream crates fall back to these values when no environment override
//! is present.

// ============================================================================
// Scheduling
// ============================================================================

/// Minimum interval between two single-shot sends to the same patient/campaign
pub const DEFAULT_COOLDOWN_DAYS: i64 = 7;

/// Trigger window used when a campaign carries no recognised trigger
pub const DEFAULT_TRIGGER_WINDOW_DAYS: i64 = 60;

/// Interval between sequence processing ticks (15 minutes)
pub const SEQUENCE_TICK_INTERVAL_SECS: u64 = 15 * 60;

/// Lease applied to a claimed sequence state while a tick works on it
pub const DEFAULT_CLAIM_LEASE_SECS: i64 = 10 * 60;

// ============================================================================
// Messaging
// ============================================================================

/// Credential cache time-to-live (1 hour)
pub const CREDENTIAL_CACHE_TTL_SECS: i64 = 3600;

/// Provider HTTP timeout
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 30;

/// Prefix for synthetic SMS ids returned when no provider is wired up
pub const SIMULATED_SMS_PREFIX: &str = "mock_sms_";

/// Prefix for synthetic email ids returned when no provider is wired up
pub const SIMULATED_EMAIL_PREFIX: &str = "mock_email_";

/// Subject used for outreach email when the campaign does not define one
pub const DEFAULT_EMAIL_SUBJECT: &str = "Your dental benefits are expiring soon";

// ============================================================================
// Audit
// ============================================================================

/// Attempts made to persist one outreach log row before giving up
pub const LOG_WRITE_MAX_ATTEMPTS: u32 = 3;

/// Initial backoff between log write attempts
pub const LOG_WRITE_INITIAL_BACKOFF_MS: u64 = 50;
