//! Shared helpers for event stamping.

/// Milliseconds since UNIX epoch, used for bridge event timestamps.
#[inline]
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Fresh id for events and subscriptions.
#[inline]
pub(crate) fn gen_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}
