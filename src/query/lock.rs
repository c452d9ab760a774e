use super::Context;
use crate::protocol::Reply;

/// LOCK(key, seconds) (spec §4.5, testable property 6). Locking an
/// already-locked key simply extends it — the spec only states the
/// predicate, not a "double lock" rejection, so LOCK always succeeds
/// against a live key.
pub fn lock(ctx: &mut Context, key: &[u8], seconds: u64) -> Reply {
    let now = ctx.clock.now();
    match super::resolve_live(ctx, key) {
        Some(item) => {
            item.lock(seconds, now);
            Reply::Ok
        }
        None => Reply::NotFound,
    }
}

/// UNLOCK(key). Unlocking an unlocked key is a harmless no-op success.
pub fn unlock(ctx: &mut Context, key: &[u8]) -> Reply {
    match super::resolve_live(ctx, key) {
        Some(item) => {
            item.unlock();
            Reply::Ok
        }
        None => Reply::NotFound,
    }
}
