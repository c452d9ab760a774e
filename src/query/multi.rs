//! Multi-key operations (spec §4.5): each resolves its prefix once, then
//! replays the corresponding single-key body over every live descendant.
//! Per DESIGN NOTES §9's open question on atomicity, this is deliberately
//! best-effort: a locked or otherwise-failing member is skipped rather
//! than aborting or reporting which members failed.

use super::Context;
use crate::protocol::{KvalEntry, Reply};
use crate::store::StoreError;

/// Collects the keys live under `prefix` into a scratch `Vec` before any
/// mutation starts (spec §4.5: "temporarily collect their target markers
/// into scratch lists... because structural edits to the trie during
/// traversal would invalidate iteration").
fn collect_keys(ctx: &Context, prefix: &[u8]) -> Vec<Vec<u8>> {
    let now = ctx.clock.now();
    ctx.trie
        .find_prefix(prefix)
        .into_iter()
        .filter(|(_, item)| !item.is_expired(now))
        .map(|(key, _)| key)
        .collect()
}

pub fn mset(ctx: &mut Context, prefix: &[u8], value: &[u8], ttl: u64) -> Reply {
    for key in collect_keys(ctx, prefix) {
        super::set::set(ctx, &key, value, ttl);
    }
    Reply::Ok
}

pub fn mttl(ctx: &mut Context, prefix: &[u8], seconds: u64) -> Reply {
    for key in collect_keys(ctx, prefix) {
        super::set::set_ttl(ctx, &key, seconds);
    }
    Reply::Ok
}

pub fn mget(ctx: &mut Context, prefix: &[u8]) -> Reply {
    let now = ctx.clock.now();
    let mut entries = Vec::new();
    for key in collect_keys(ctx, prefix) {
        if let Some(item) = super::resolve_live(ctx, &key) {
            item.touch(now);
            entries.push(KvalEntry {
                key,
                encoding: item.encoding().tag(),
                value: item.render(),
            });
        }
    }
    Reply::Kval(entries)
}

pub fn mdel(ctx: &mut Context, prefix: &[u8]) -> Reply {
    for key in collect_keys(ctx, prefix) {
        super::get::del(ctx, &key);
    }
    Reply::Ok
}

pub fn minc(ctx: &mut Context, prefix: &[u8]) -> Reply {
    madjust(ctx, prefix, 1)
}

pub fn mdec(ctx: &mut Context, prefix: &[u8]) -> Reply {
    madjust(ctx, prefix, -1)
}

fn madjust(ctx: &mut Context, prefix: &[u8], delta: i64) -> Reply {
    let now = ctx.clock.now();
    let mut entries = Vec::new();
    for key in collect_keys(ctx, prefix) {
        let Some(item) = super::resolve_live(ctx, &key) else {
            continue;
        };
        if item.is_locked(now) {
            continue;
        }
        match item.numeric_adjust(delta, now) {
            Ok(_) => entries.push(KvalEntry {
                key,
                encoding: item.encoding().tag(),
                value: item.render(),
            }),
            Err(StoreError::NotANumber) => continue,
        }
    }
    Reply::Kval(entries)
}

pub fn mlock(ctx: &mut Context, prefix: &[u8], seconds: u64) -> Reply {
    for key in collect_keys(ctx, prefix) {
        super::lock::lock(ctx, &key, seconds);
    }
    Reply::Ok
}

pub fn munlock(ctx: &mut Context, prefix: &[u8]) -> Reply {
    for key in collect_keys(ctx, prefix) {
        super::lock::unlock(ctx, &key);
    }
    Reply::Ok
}

pub fn mcount(ctx: &mut Context, prefix: &[u8]) -> Reply {
    let n = collect_keys(ctx, prefix).len() as u64;
    Reply::Val {
        encoding: 1, // Encoding::Number
        value: n.to_string().into_bytes(),
    }
}
