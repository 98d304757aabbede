use std::collections::BTreeMap;

/// All engine-owned primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Users are owned by the hosted auth backend and identified by UUID.
pub type UserId = uuid::Uuid;

/// Named event parameters substituted into catalog templates.
///
/// A `BTreeMap` keeps rendering and targeting snapshots deterministic.
pub type EventParams = BTreeMap<String, String>;
