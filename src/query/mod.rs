//! The query processor (spec §4.5). Grounded on the teacher's
//! `actions/mod.rs` + one-file-per-action layout (`actions/get.rs`,
//! `actions/set.rs`, ...), with `ActionResult`/`ensure_length` narrowed
//! down to Gibson's `HandlerResult`/`Reply` — Gibson has one table and a
//! fixed, already-typed `Request` rather than a generic token iterator, so
//! there's no `ActionIter`/`conwrite!` macro layer to carry over.

mod count;
mod get;
mod inc_dec;
mod keys;
mod lock;
mod meta;
mod multi;
mod set;

use crate::mem::AllocShim;
use crate::protocol::{Reply, Request};
use crate::store::Item;
use crate::trie::Trie;
use crate::util::Clock;

/// Everything a handler needs: the trie, the allocator shim, the clock,
/// and the config-derived limits that bound what a SET may create. Built
/// fresh per dispatch rather than stashed on `Server` so handlers stay
/// plain functions, the way the teacher's `action!`-wrapped functions take
/// `&Corestore` rather than reaching for a global.
pub struct Context<'a> {
    pub trie: &'a mut Trie<Item>,
    pub shim: &'a AllocShim,
    pub clock: &'a Clock,
    pub compression_threshold: usize,
    pub max_item_ttl: u64,
}

/// Routes a decoded `Request` to its handler and returns the reply to
/// send. Every handler returns exactly one `Reply` (spec §4.5: "every
/// handler emits exactly one reply frame").
pub fn dispatch(req: Request, ctx: &mut Context) -> Reply {
    match req {
        Request::Set { key, value, ttl } => set::set(ctx, &key, &value, ttl),
        Request::Ttl { key, seconds } => set::set_ttl(ctx, &key, seconds),
        Request::Get { key } => get::get(ctx, &key),
        Request::Del { key } => get::del(ctx, &key),
        Request::Inc { key } => inc_dec::inc(ctx, &key),
        Request::Dec { key } => inc_dec::dec(ctx, &key),
        Request::Lock { key, seconds } => lock::lock(ctx, &key, seconds),
        Request::Unlock { key } => lock::unlock(ctx, &key),
        Request::Count { key } => count::count(ctx, &key),
        Request::Meta { key, field } => meta::meta(ctx, &key, field),
        Request::Keys { prefix } => keys::keys(ctx, &prefix),

        Request::MSet { prefix, value, ttl } => multi::mset(ctx, &prefix, &value, ttl),
        Request::MTtl { prefix, seconds } => multi::mttl(ctx, &prefix, seconds),
        Request::MGet { prefix } => multi::mget(ctx, &prefix),
        Request::MDel { prefix } => multi::mdel(ctx, &prefix),
        Request::MInc { prefix } => multi::minc(ctx, &prefix),
        Request::MDec { prefix } => multi::mdec(ctx, &prefix),
        Request::MLock { prefix, seconds } => multi::mlock(ctx, &prefix, seconds),
        Request::MUnlock { prefix } => multi::munlock(ctx, &prefix),
        Request::MCount { prefix } => multi::mcount(ctx, &prefix),
    }
}

/// Looks up `key`, expiring it first if its TTL has lapsed (spec §4.4:
/// "an expired item is deleted on access"). Shared by every single-key
/// read/write handler.
pub(crate) fn resolve_live<'a>(ctx: &'a mut Context, key: &[u8]) -> Option<&'a mut Item> {
    let now = ctx.clock.now();
    let expired = ctx.trie.get(key).is_some_and(|item| item.is_expired(now));
    if expired {
        if let Some(item) = ctx.trie.remove(key) {
            crate::store::dispose(item, ctx.shim);
        }
        return None;
    }
    ctx.trie.get_mut(key)
}
