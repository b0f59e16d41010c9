use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Polled while an external process runs; the first `false` cancels the run.
pub trait Sentinel {
    fn is_happy(&self) -> bool;
}

impl<F> Sentinel for F
where
    F: Fn() -> bool,
{
    fn is_happy(&self) -> bool {
        (self)()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AlwaysHappy;

impl Sentinel for AlwaysHappy {
    fn is_happy(&self) -> bool {
        true
    }
}

/// Shared stop flag; clones observe the same cancellation.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag {
    cancelled: Arc<AtomicBool>,
}

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }
}

impl Sentinel for CancellationFlag {
    fn is_happy(&self) -> bool {
        !self.is_cancelled()
    }
}

/// Turns unhappy once the deadline passes. `at: None` never expires.
#[derive(Debug, Clone, Copy)]
pub struct Deadline {
    at: Option<Instant>,
}

impl Deadline {
    pub fn at(at: Instant) -> Self {
        Self { at: Some(at) }
    }

    /// A timeout too large to represent as an `Instant` never expires.
    pub fn after(timeout: Duration) -> Self {
        Self {
            at: Instant::now().checked_add(timeout),
        }
    }

    pub fn remaining(&self) -> Duration {
        match self.at {
            Some(at) => at.saturating_duration_since(Instant::now()),
            None => Duration::MAX,
        }
    }
}

impl Sentinel for Deadline {
    fn is_happy(&self) -> bool {
        match self.at {
            Some(at) => Instant::now() < at,
            None => true,
        }
    }
}
