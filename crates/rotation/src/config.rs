use std::time::Duration;

use sentinel_core::env::env_or;

/// Default cap on concurrent sessions per user.
const DEFAULT_MAX_SESSIONS: usize = 5;
/// Default lifetime of a registered rotation token, in days.
const DEFAULT_REGISTRATION_TTL_DAYS: i64 = 7;
/// Default credential issuer timeout, in seconds.
const DEFAULT_ISSUER_TIMEOUT_SECS: u64 = 10;
/// Default interval between expired-token sweeps, in seconds.
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 3600;

/// Rotation policy settings.
#[derive(Debug, Clone)]
pub struct RotationConfig {
    /// Maximum concurrently valid sessions per user. Always at least 1.
    pub max_sessions: usize,
    /// Lifetime of a token stored by `register_token`.
    pub registration_ttl: chrono::Duration,
    /// Upper bound on a single credential issuer call.
    pub issuer_timeout: Duration,
    /// How often the background sweeper purges expired rows.
    pub purge_interval: Duration,
    /// Trigger a best-effort purge after every successful rotation.
    pub purge_on_rotate: bool,
}

impl Default for RotationConfig {
    fn default() -> Self {
        Self {
            max_sessions: DEFAULT_MAX_SESSIONS,
            registration_ttl: chrono::Duration::days(DEFAULT_REGISTRATION_TTL_DAYS),
            issuer_timeout: Duration::from_secs(DEFAULT_ISSUER_TIMEOUT_SECS),
            purge_interval: Duration::from_secs(DEFAULT_PURGE_INTERVAL_SECS),
            purge_on_rotate: true,
        }
    }
}

impl RotationConfig {
    /// Load rotation settings from environment variables.
    ///
    /// | Env Var                      | Default |
    /// |------------------------------|---------|
    /// | `MAX_SESSIONS_PER_USER`      | `5`     |
    /// | `ROTATION_TOKEN_TTL_DAYS`    | `7`     |
    /// | `ISSUER_TIMEOUT_SECS`        | `10`    |
    /// | `TOKEN_PURGE_INTERVAL_SECS`  | `3600`  |
    /// | `PURGE_ON_ROTATE`            | `true`  |
    ///
    /// # Panics
    ///
    /// Panics if a variable is set but does not parse, or if
    /// `MAX_SESSIONS_PER_USER` is `0`.
    pub fn from_env() -> Self {
        let max_sessions: usize = env_or("MAX_SESSIONS_PER_USER", DEFAULT_MAX_SESSIONS);
        assert!(max_sessions > 0, "MAX_SESSIONS_PER_USER must be at least 1");

        let ttl_days: i64 = env_or("ROTATION_TOKEN_TTL_DAYS", DEFAULT_REGISTRATION_TTL_DAYS);
        let issuer_timeout_secs: u64 = env_or("ISSUER_TIMEOUT_SECS", DEFAULT_ISSUER_TIMEOUT_SECS);
        let purge_interval_secs: u64 =
            env_or("TOKEN_PURGE_INTERVAL_SECS", DEFAULT_PURGE_INTERVAL_SECS);
        let purge_on_rotate = env_or("PURGE_ON_ROTATE", true);

        Self {
            max_sessions,
            registration_ttl: chrono::Duration::days(ttl_days),
            issuer_timeout: Duration::from_secs(issuer_timeout_secs),
            purge_interval: Duration::from_secs(purge_interval_secs),
            purge_on_rotate,
        }
    }
}
