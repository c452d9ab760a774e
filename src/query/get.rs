use super::Context;
use crate::protocol::Reply;

/// GET(key) (spec §4.5). Reads are always permitted even on a locked item.
pub fn get(ctx: &mut Context, key: &[u8]) -> Reply {
    match super::resolve_live(ctx, key) {
        Some(item) => {
            let now = ctx.clock.now();
            item.touch(now);
            Reply::Val {
                encoding: item.encoding().tag(),
                value: item.render(),
            }
        }
        None => Reply::NotFound,
    }
}

/// DEL(key) (spec §3: "destroyed by DEL"). Like every mutating op, a
/// locked item refuses with LOCKED (spec §4.4).
pub fn del(ctx: &mut Context, key: &[u8]) -> Reply {
    let now = ctx.clock.now();
    match super::resolve_live(ctx, key) {
        Some(item) if item.is_locked(now) => Reply::Locked,
        Some(_) => {
            if let Some(item) = ctx.trie.remove(key) {
                crate::store::dispose(item, ctx.shim);
            }
            Reply::Ok
        }
        None => Reply::NotFound,
    }
}
