use super::Context;
use crate::protocol::Reply;
use crate::store::Item;

/// SET(ttl?, key, value) (spec §3, §4.5). A SET on a locked key fails with
/// LOCKED; creating a brand new key is never blocked since there's
/// nothing to lock yet.
pub fn set(ctx: &mut Context, key: &[u8], value: &[u8], ttl: u64) -> Reply {
    let now = ctx.clock.now();
    let ttl = clamp_ttl(ttl, ctx.max_item_ttl);

    if let Some(existing) = ctx.trie.get_mut(key) {
        if existing.is_locked(now) {
            return Reply::Locked;
        }
        let old_size = existing.size();
        existing.set(value, ttl, now, ctx.compression_threshold);
        let new_size = existing.size();
        ctx.shim.realloc(old_size, new_size);
        return Reply::Ok;
    }

    let item = Item::new(value, ttl, now, ctx.compression_threshold);
    ctx.shim.alloc(item.size());
    ctx.trie.insert(key, item);
    Reply::Ok
}

/// TTL(key, seconds): rewrites the expiry without touching the payload.
pub fn set_ttl(ctx: &mut Context, key: &[u8], seconds: u64) -> Reply {
    let now = ctx.clock.now();
    let max_ttl = ctx.max_item_ttl;
    match super::resolve_live(ctx, key) {
        Some(item) if item.is_locked(now) => Reply::Locked,
        Some(item) => {
            item.set_ttl(clamp_ttl(seconds, max_ttl));
            Reply::Ok
        }
        None => Reply::NotFound,
    }
}

fn clamp_ttl(ttl: u64, max_item_ttl: u64) -> u64 {
    if max_item_ttl > 0 && ttl > max_item_ttl {
        max_item_ttl
    } else {
        ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::AllocShim;
    use crate::query::lock;
    use crate::trie::Trie;
    use crate::util::Clock;

    fn ctx<'a>(trie: &'a mut Trie<Item>, shim: &'a AllocShim, clock: &'a Clock) -> Context<'a> {
        Context {
            trie,
            shim,
            clock,
            compression_threshold: 64,
            max_item_ttl: 0,
        }
    }

    #[test]
    fn set_on_new_key_charges_the_allocator() {
        let mut trie = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = ctx(&mut trie, &shim, &clock);
        assert_eq!(set(&mut c, b"foo", b"bar", 0), Reply::Ok);
        assert!(shim.used() > 0);
    }

    #[test]
    fn set_on_existing_key_nets_the_delta() {
        let mut trie = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = ctx(&mut trie, &shim, &clock);
        set(&mut c, b"foo", b"a_longer_value", 0);
        let after_first = shim.used();
        set(&mut c, b"foo", b"x", 0);
        assert!(shim.used() < after_first);
    }

    #[test]
    fn set_on_locked_key_fails() {
        let mut trie = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = ctx(&mut trie, &shim, &clock);
        set(&mut c, b"foo", b"bar", 0);
        lock::lock(&mut c, b"foo", 60);
        assert_eq!(set(&mut c, b"foo", b"new", 0), Reply::Locked);
    }

    #[test]
    fn max_item_ttl_clamps_requested_ttl() {
        let mut trie = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = Context {
            trie: &mut trie,
            shim: &shim,
            clock: &clock,
            compression_threshold: 64,
            max_item_ttl: 10,
        };
        set(&mut c, b"foo", b"bar", 1000);
        let item = c.trie.get(b"foo").unwrap();
        assert_eq!(item.ttl, 10);
    }
}
