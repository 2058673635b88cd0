//! Operation identifiers and recovery point timestamps
//!
//! Both come from process-wide clocks that never repeat a value, so two
//! operations (or points) started in the same tick still get distinct keys.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use lazarus_core::types::RecoveryType;
use std::sync::{Mutex, PoisonError};
use uuid::Uuid;

static LAST_OPERATION: Mutex<Option<DateTime<Utc>>> = Mutex::new(None);
static LAST_POINT: Mutex<Option<DateTime<Utc>>> = Mutex::new(None);

/// Next value of a clock truncated to `digits` subsecond digits, strictly
/// greater than the previous one
fn advance(clock: &Mutex<Option<DateTime<Utc>>>, digits: u16, step: Duration) -> DateTime<Utc> {
    let mut last = clock.lock().unwrap_or_else(PoisonError::into_inner);
    let now = Utc::now().trunc_subsecs(digits);
    let next = match *last {
        Some(previous) if now <= previous => previous + step,
        _ => now,
    };
    *last = Some(next);
    next
}

/// `<type>_<yyyymmddTHHMMSS.mmm>_<8 hex>`
pub fn next_operation_id(recovery_type: RecoveryType) -> String {
    let timestamp = advance(&LAST_OPERATION, 3, Duration::milliseconds(1));
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}_{}_{}",
        recovery_type,
        timestamp.format("%Y%m%dT%H%M%S%.3f"),
        &suffix[..8]
    )
}

/// Creation instant for a new recovery point (microsecond resolution)
pub fn next_point_timestamp() -> DateTime<Utc> {
    advance(&LAST_POINT, 6, Duration::microseconds(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_operation_id_format() {
        let id = next_operation_id(RecoveryType::EmergencyStop);
        let parts: Vec<&str> = id.rsplitn(3, '_').collect();
        assert_eq!(parts[0].len(), 8);
        assert_eq!(parts[1].len(), "20260101T120000.123".len());
        assert!(id.starts_with("emergency_stop_"));
    }

    #[test]
    fn test_operation_ids_are_unique_and_ordered() {
        let ids: Vec<String> = (0..200)
            .map(|_| next_operation_id(RecoveryType::Rollback))
            .collect();
        let unique: HashSet<&String> = ids.iter().collect();
        assert_eq!(unique.len(), ids.len());

        let stamps: Vec<&str> = ids.iter().map(|id| &id["rollback_".len().."rollback_".len() + 19]).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_point_timestamps_strictly_increase() {
        let a = next_point_timestamp();
        let b = next_point_timestamp();
        assert!(b > a);
    }
}
