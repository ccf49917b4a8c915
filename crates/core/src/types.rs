use chrono::{DateTime, Utc};

/// Ledger primary key (`BIGSERIAL`). User ids share the type.
pub type DbId = i64;

pub type Timestamp = DateTime<Utc>;
