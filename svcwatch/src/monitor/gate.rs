use chrono::{DateTime, Duration, Utc};
use svcwatch_shared::run_state::ServiceState;

/// True when a probe is due. A service never checked before counts as last
/// checked at the epoch, so its first poll always fires.
pub fn should_check(state: &ServiceState, interval_seconds: u64, now: DateTime<Utc>) -> bool {
    if interval_seconds == 0 {
        return true;
    }

    let last_checked = state.last_checked.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
    let Some(interval) = i64::try_from(interval_seconds)
        .ok()
        .and_then(Duration::try_seconds)
    else {
        // longer than chrono can represent: never due again
        return false;
    };

    now.signed_duration_since(last_checked) >= interval
}
