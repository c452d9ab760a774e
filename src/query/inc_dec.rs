use super::Context;
use crate::protocol::Reply;
use crate::store::StoreError;

/// INC(key) / DEC(key) (spec §4.5). A non-numeric target replies NAN
/// rather than dropping the connection — this is a semantic error, not a
/// protocol one (spec §7).
pub fn inc(ctx: &mut Context, key: &[u8]) -> Reply {
    adjust(ctx, key, 1)
}

pub fn dec(ctx: &mut Context, key: &[u8]) -> Reply {
    adjust(ctx, key, -1)
}

fn adjust(ctx: &mut Context, key: &[u8], delta: i64) -> Reply {
    let now = ctx.clock.now();
    match super::resolve_live(ctx, key) {
        None => Reply::NotFound,
        Some(item) if item.is_locked(now) => Reply::Locked,
        Some(item) => match item.numeric_adjust(delta, now) {
            Ok(_) => Reply::Val {
                encoding: item.encoding().tag(),
                value: item.render(),
            },
            Err(StoreError::NotANumber) => Reply::Nan,
        },
    }
}
