use sentinel_core::env::{env_list, env_or};
use sentinel_rotation::issuer::JwtConfig;
use sentinel_rotation::RotationConfig;

/// Where rotation-token records are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerBackend {
    /// PostgreSQL via `DATABASE_URL`.
    Postgres,
    /// Process memory. Records are lost on restart; for local development.
    Memory,
}

impl std::str::FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" => Ok(LedgerBackend::Postgres),
            "memory" => Ok(LedgerBackend::Memory),
            other => Err(format!("unknown ledger backend '{other}'")),
        }
    }
}

/// Process-wide settings, read once at startup.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Browser origins allowed by CORS.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// How long in-flight requests get to finish after a shutdown signal.
    pub shutdown_timeout_secs: u64,
    pub ledger_backend: LedgerBackend,
    pub jwt: JwtConfig,
    pub rotation: RotationConfig,
}

impl ServerConfig {
    /// | Env Var                 | Default                 |
    /// |-------------------------|-------------------------|
    /// | `HOST`                  | `0.0.0.0`               |
    /// | `PORT`                  | `3000`                  |
    /// | `CORS_ORIGINS`          | `http://localhost:5173` |
    /// | `REQUEST_TIMEOUT_SECS`  | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS` | `30`                    |
    /// | `LEDGER_BACKEND`        | `postgres`              |
    ///
    /// JWT and rotation settings come from [`JwtConfig::from_env`] and
    /// [`RotationConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            host: env_or("HOST", "0.0.0.0".to_string()),
            port: env_or("PORT", 3000),
            cors_origins: env_list("CORS_ORIGINS", "http://localhost:5173"),
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 30),
            ledger_backend: env_or("LEDGER_BACKEND", LedgerBackend::Postgres),
            jwt: JwtConfig::from_env(),
            rotation: RotationConfig::from_env(),
        }
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
