//! Issuance timestamps
//!
//! The engine reads time through [`Clock`] so tests can pin `iat`.

/// Source of the `iat` stamped on new nodes
pub trait Clock: Send + Sync {
    /// Current time in unix seconds
    fn now_unix(&self) -> i64;
}

/// Wall clock (UTC)
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_unix(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}

/// Clock that always reports the same instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_unix(&self) -> i64 {
        self.0
    }
}
