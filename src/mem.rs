//! The allocator shim (spec §4.1).
//!
//! Gibson's single reactor thread means this never needs to be atomic; it's a
//! plain `Cell`-backed counter, not a `GlobalAlloc` override. It tracks
//! *logical* item bytes (payload + fixed per-item overhead), not every heap
//! allocation the process makes — scratch buffers (`m_buffer`, the LZF
//! staging buffer) are deliberately excluded, per DESIGN NOTES §9, so that
//! eviction decisions track cached data rather than incidental churn.

use crate::util::compiler;
use std::cell::Cell;

/// Fixed overhead charged per live item, approximating the cost of the
/// `Item` record itself (encoding tag, timestamps, ttl, lock) alongside its
/// payload. Not load-bearing for correctness, only for the eviction trigger.
pub const ITEM_OVERHEAD: usize = 48;

#[derive(Debug, Default)]
pub struct AllocShim {
    used: Cell<usize>,
    peak: Cell<usize>,
}

impl AllocShim {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn used(&self) -> usize {
        self.used.get()
    }

    pub fn peak(&self) -> usize {
        self.peak.get()
    }

    /// Account for a new item's payload entering the cache.
    pub fn alloc(&self, bytes: usize) {
        let total = bytes + ITEM_OVERHEAD;
        let used = self.used.get().checked_add(total).unwrap_or_else(|| {
            compiler::cold();
            on_oom();
        });
        self.used.set(used);
        if used > self.peak.get() {
            self.peak.set(used);
        }
    }

    /// Account for an item's payload being replaced in place (SET on an
    /// existing key): free the old size, charge the new one.
    pub fn realloc(&self, old_bytes: usize, new_bytes: usize) {
        self.free(old_bytes);
        self.alloc(new_bytes);
    }

    /// Account for an item leaving the cache (DEL, TTL expiry, eviction).
    pub fn free(&self, bytes: usize) {
        let total = bytes + ITEM_OVERHEAD;
        self.used.set(self.used.get().saturating_sub(total));
    }
}

/// The OOM handler: log diagnostics and abort. Callers never observe a
/// partial allocation failure (spec §4.1, §7) — there is no `Result` to
/// propagate here by design.
#[cold]
#[inline(never)]
fn on_oom() -> ! {
    log::error!("out of memory: allocator shim counter overflowed, aborting");
    std::process::abort()
}
