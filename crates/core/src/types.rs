/// Session primary keys are random UUIDs assigned at insert and never reused.
pub type SessionId = uuid::Uuid;

/// User primary keys are random UUIDs.
pub type UserId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
