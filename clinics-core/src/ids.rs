//! Identifier generation and clock sources
//!
//! Both are injected into [`crate::Registry`] so tests can pin time.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use uuid::{Uuid, Version};

/// Produces globally unique, time-ordered 128-bit identifiers.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self) -> Uuid;
}

/// UUIDv7 generator (millisecond timestamp prefix, monotonic within process).
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Generator;

impl IdGenerator for UuidV7Generator {
    fn next_id(&self) -> Uuid {
        Uuid::now_v7()
    }
}

/// Whether `id` is a time-ordered (version 7) identifier.
pub fn is_time_ordered(id: &Uuid) -> bool {
    id.get_version() == Some(Version::SortRand)
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that returns a settable instant.
#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn v7_ids_sort_by_creation() {
        let ids = UuidV7Generator;
        let a = ids.next_id();
        let b = ids.next_id();
        assert!(is_time_ordered(&a));
        assert!(a < b);
    }

    #[test]
    fn v4_is_not_time_ordered() {
        assert!(!is_time_ordered(&Uuid::new_v4()));
    }

    #[test]
    fn fixed_clock_can_move() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let clock = FixedClock::new(start);
        assert_eq!(clock.now(), start);

        let later = Utc.with_ymd_and_hms(2025, 1, 2, 12, 0, 0).unwrap();
        clock.set(later);
        assert_eq!(clock.now(), later);
    }
}
