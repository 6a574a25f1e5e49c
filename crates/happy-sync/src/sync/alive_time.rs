use std::time::{SystemTime, UNIX_EPOCH};

/// Heartbeats older than this are dropped rather than moving `activeAt` back.
const MAX_ALIVE_AGE_MS: i64 = 10 * 60 * 1000;

pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or_default()
}

/// Cap `t` to `now`; `None` when it falls outside the accepted window.
pub fn clamp_alive_time(t: i64, now: i64) -> Option<i64> {
    if t > now {
        return Some(now);
    }
    if t < now.saturating_sub(MAX_ALIVE_AGE_MS) {
        return None;
    }
    Some(t)
}
