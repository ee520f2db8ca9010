use chrono::{DateTime, FixedOffset, Utc};

/// Injectable time source. Handlers format timestamps with the offset the
/// clock carries, so a fixed test clock reproduces wire-exact RFC 3339
/// strings.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<FixedOffset>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Utc::now().fixed_offset()
    }
}

/// Clock pinned to a single instant, for tests.
pub struct FixedClock(pub DateTime<FixedOffset>);

impl FixedClock {
    pub fn at_rfc3339(timestamp: &str) -> Self {
        Self(
            DateTime::parse_from_rfc3339(timestamp)
                .unwrap_or_else(|e| panic!("invalid fixed clock timestamp {timestamp}: {e}")),
        )
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
