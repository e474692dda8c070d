use chrono::SubsecRound;
use uuid::Uuid;

/// Engine-issued identifiers (flows, steps, signatures, templates, audit
/// entries) are UUID v7 so they sort by creation time.
pub type EntityId = Uuid;

/// Identity-provider user id. Opaque to the engine.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a fresh time-ordered id.
pub fn new_id() -> EntityId {
    Uuid::now_v7()
}

/// Current time at microsecond precision, matching `TIMESTAMPTZ` storage so
/// hashed audit content survives a database round trip unchanged.
pub fn now() -> Timestamp {
    chrono::Utc::now().trunc_subsecs(6)
}
