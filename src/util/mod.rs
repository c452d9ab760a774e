pub mod compiler;
pub mod error;
pub mod os;

/// Monotonic clock shared by the item store, cron and protocol layers.
/// Spec timestamps (`created_at`, `last_access_time`, `locked_until`) are all
/// seconds since this instant, never wall-clock time — see SPEC_FULL.md §11.
#[derive(Debug, Clone, Copy)]
pub struct Clock {
    epoch: std::time::Instant,
}

impl Clock {
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
    /// Seconds elapsed since the clock was created.
    pub fn now(&self) -> u64 {
        self.epoch.elapsed().as_secs()
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}
