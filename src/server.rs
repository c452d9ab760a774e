//! The process-wide server state (spec §3: "Server... owning the trie
//! root, the client set, the reactor, the allocator shim, statistics
//! counters, and configuration snapshot"). Rearchitected away from the
//! teacher's global-registry singleton (`registry/mod.rs`'s static
//! `GLOBAL_STATE`) into an explicit value threaded through handlers, per
//! DESIGN NOTES §9 — signal handling only flips a `Cell<bool>` on this
//! struct, never touching the trie directly.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tokio::sync::watch;

use crate::config::Config;
use crate::mem::AllocShim;
use crate::store::Item;
use crate::trie::Trie;
use crate::util::Clock;

/// Snapshot counters surfaced by the cron's stats log and available for a
/// future `STATS` opcode (spec §4.7).
#[derive(Debug, Default, Clone, Copy)]
pub struct Stats {
    pub nclients: usize,
}

/// One entry in the server's client set (spec §3's `Client`), as much of
/// it as the cron's idle-reap (spec §4.7) needs to see: when it was last
/// heard from, and a channel to tell its connection task to close.
pub struct ClientRecord {
    pub id: u64,
    pub last_seen: Rc<Cell<u64>>,
    pub close: watch::Sender<bool>,
}

/// Everything the reactor and cron share, wrapped once in `Rc<RefCell<_>>`
/// since Gibson's single reactor thread means this is never touched
/// concurrently — no `Arc`, no `Mutex`, no `parking_lot` (spec §5).
pub struct Inner {
    pub trie: Trie<Item>,
    pub shim: AllocShim,
    pub clock: Clock,
    pub config: Config,
    pub stats: Stats,
    pub shutdown: Cell<bool>,
    pub clients: Vec<ClientRecord>,
    next_client_id: u64,
}

#[derive(Clone)]
pub struct Server {
    inner: Rc<RefCell<Inner>>,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Inner {
                trie: Trie::new(),
                shim: AllocShim::new(),
                clock: Clock::new(),
                config,
                stats: Stats::default(),
                shutdown: Cell::new(false),
                clients: Vec::new(),
                next_client_id: 0,
            })),
        }
    }

    pub fn inner(&self) -> &Rc<RefCell<Inner>> {
        &self.inner
    }

    pub fn is_shutting_down(&self) -> bool {
        self.inner.borrow().shutdown.get()
    }

    pub fn request_shutdown(&self) {
        self.inner.borrow().shutdown.set(true);
    }

    /// Registers a newly accepted connection in the client set (spec §3),
    /// returning its id (for later `deregister_client`) and the receiving
    /// half of its close channel, which the cron's idle-reap (spec §4.7)
    /// signals when `now - last_seen > max_idletime`.
    pub fn register_client(&self, last_seen: Rc<Cell<u64>>) -> (u64, watch::Receiver<bool>) {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_client_id;
        inner.next_client_id += 1;
        let (close_tx, close_rx) = watch::channel(false);
        inner.clients.push(ClientRecord { id, last_seen, close: close_tx });
        inner.stats.nclients += 1;
        (id, close_rx)
    }

    /// Removes a connection from the client set once its task has ended,
    /// whatever the reason (spec §3: "a client is... destroyed on
    /// close/error/timeout").
    pub fn deregister_client(&self, id: u64) {
        let mut inner = self.inner.borrow_mut();
        if let Some(pos) = inner.clients.iter().position(|c| c.id == id) {
            inner.clients.swap_remove(pos);
        }
        inner.stats.nclients = inner.stats.nclients.saturating_sub(1);
    }
}
