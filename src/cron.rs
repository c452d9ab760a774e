//! Maintenance cron (spec §4.7). Grounded on the teacher's
//! `services/bgsave.rs` `bgsave_scheduler` — a `tokio::select!` between
//! `time::sleep_until` and a termination signal, looping — retargeted
//! from a single periodic disk flush onto Gibson's four sub-tasks (TTL
//! sweep, pressure eviction, stats log, idle-reap), each gated by its own
//! "every N ticks" counter the way spec §4.7's `CRON_EVERY(N)` helper
//! gates sub-tasks off one base tick.

use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time;

use crate::server::Server;
use crate::store;

const TTL_SWEEP_EVERY_MS: u64 = 15_000;
const PRESSURE_EVICT_EVERY_MS: u64 = 5_000;
const STATS_LOG_EVERY_MS: u64 = 15_000;

/// Drives the periodic maintenance loop at `cron_period` (spec §4.7)
/// until a shutdown signal arrives, then runs the destructor path.
pub async fn run(server: Server, shutdown_tx: broadcast::Sender<()>) {
    let cron_period = Duration::from_millis(server.inner().borrow().config.cron_period);
    let mut shutdown_rx = shutdown_tx.subscribe();

    let mut since_ttl_sweep = Duration::ZERO;
    let mut since_pressure_evict = Duration::ZERO;
    let mut since_stats_log = Duration::ZERO;

    loop {
        tokio::select! {
            biased;
            _ = shutdown_rx.recv() => break,
            _ = time::sleep(cron_period) => {}
        }

        if server.is_shutting_down() {
            break;
        }

        since_ttl_sweep += cron_period;
        since_pressure_evict += cron_period;
        since_stats_log += cron_period;

        if since_ttl_sweep.as_millis() as u64 >= TTL_SWEEP_EVERY_MS {
            since_ttl_sweep = Duration::ZERO;
            ttl_sweep(&server);
        }
        if since_pressure_evict.as_millis() as u64 >= PRESSURE_EVICT_EVERY_MS {
            since_pressure_evict = Duration::ZERO;
            pressure_evict(&server);
        }
        if since_stats_log.as_millis() as u64 >= STATS_LOG_EVERY_MS {
            since_stats_log = Duration::ZERO;
            stats_log(&server);
            idle_reap(&server);
        }
    }

    teardown(&server, &shutdown_tx);
}

/// Every 15s: delete any item whose TTL has lapsed (spec §4.7, testable
/// property 5).
fn ttl_sweep(server: &Server) {
    let mut inner = server.inner().borrow_mut();
    let now = inner.clock.now();
    let expired: Vec<Vec<u8>> = inner
        .trie
        .keys()
        .into_iter()
        .filter(|k| inner.trie.get(k).is_some_and(|item| item.is_expired(now)))
        .collect();
    let n = expired.len();
    for key in expired {
        if let Some(item) = inner.trie.remove(&key) {
            store::dispose(item, &inner.shim);
        }
    }
    if n > 0 {
        log::debug!("ttl sweep: expired {n} item(s)");
    }
}

/// Every 5s, only if `mem_used > max_memory`: delete items idle for at
/// least `gc_ratio` seconds — an approximate LRU (spec §4.7, testable
/// property 8).
fn pressure_evict(server: &Server) {
    let mut inner = server.inner().borrow_mut();
    if inner.shim.used() <= inner.config.max_memory as usize {
        return;
    }
    let now = inner.clock.now();
    let gc_ratio = inner.config.gc_ratio;
    let evictable: Vec<Vec<u8>> = inner
        .trie
        .keys()
        .into_iter()
        .filter(|k| {
            inner
                .trie
                .get(k)
                .is_some_and(|item| now.saturating_sub(item.last_access_time) >= gc_ratio)
        })
        .collect();
    let n = evictable.len();
    for key in evictable {
        if let Some(item) = inner.trie.remove(&key) {
            store::dispose(item, &inner.shim);
        }
        if inner.shim.used() <= inner.config.max_memory as usize {
            break;
        }
    }
    if n > 0 {
        log::info!(
            "pressure eviction: reclaimed toward {} of {} byte budget",
            inner.shim.used(),
            inner.config.max_memory
        );
    }
}

/// Every 15s: a one-line summary (spec §4.7).
fn stats_log(server: &Server) {
    let inner = server.inner().borrow();
    let nitems = inner.trie.len();
    let memused = inner.shim.used();
    let avg = if nitems > 0 { memused / nitems } else { 0 };
    log::info!(
        "stats: nitems={nitems} memused={memused} mempeak={} nclients={} avg_item_size={avg}",
        inner.shim.peak(),
        inner.stats.nclients,
    );
}

/// Piggybacked on the stats-log timer (spec §4.7: "also piggybacked on
/// the same timer"): closes any connection silent for longer than
/// `max_idletime` by flipping its close channel, which the connection
/// task (`dbnet/connection.rs`) observes on its next `select!` iteration.
/// Does not remove the entry from `clients` itself — the connection task
/// deregisters on its own way out (spec §3: a client is "destroyed on
/// close/error/timeout", one path, one place that mutates the set).
fn idle_reap(server: &Server) {
    let inner = server.inner().borrow();
    let now = inner.clock.now();
    let max_idletime = inner.config.max_idletime;
    let mut n = 0;
    for client in &inner.clients {
        if now.saturating_sub(client.last_seen.get()) > max_idletime {
            let _ = client.close.send(true);
            n += 1;
        }
    }
    if n > 0 {
        log::info!("idle reap: closing {n} connection(s) idle past {max_idletime}s");
    }
}


/// Runs when a SIGTERM has set the shutdown flag (spec §4.7): broadcast
/// termination to every connection task, drop the trie, and let the
/// process exit after `main` joins this task.
fn teardown(server: &Server, shutdown_tx: &broadcast::Sender<()>) {
    log::info!("shutting down: tearing down connections and freeing the trie");
    let _ = shutdown_tx.send(());
    let mut inner = server.inner().borrow_mut();
    inner.trie = crate::trie::Trie::new();
}
