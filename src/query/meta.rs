use super::Context;
use crate::protocol::{MetaField, Reply};

/// META(key, field) (spec §4.5): per-item introspection. Always reports
/// through the NUMBER encoding family since every field is a plain
/// integer, except `Encoding` which reports the raw tag.
pub fn meta(ctx: &mut Context, key: &[u8], field: MetaField) -> Reply {
    let now = ctx.clock.now();
    match super::resolve_live(ctx, key) {
        None => Reply::NotFound,
        Some(item) => {
            let value = match field {
                MetaField::Size => item.size() as u64,
                MetaField::Encoding => item.encoding().tag() as u64,
                MetaField::Ttl => item.ttl,
                MetaField::LockRemaining => item.lock_remaining(now),
                MetaField::LastAccessAge => now.saturating_sub(item.last_access_time),
            };
            Reply::Val {
                encoding: 1, // Encoding::Number
                value: value.to_string().into_bytes(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::AllocShim;
    use crate::query::set;
    use crate::store::Item;
    use crate::trie::Trie;
    use crate::util::Clock;

    #[test]
    fn meta_size_reports_payload_length() {
        let mut trie: Trie<Item> = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = Context {
            trie: &mut trie,
            shim: &shim,
            clock: &clock,
            compression_threshold: 64,
            max_item_ttl: 0,
        };
        set::set(&mut c, b"foo", b"hello", 0);
        assert_eq!(
            meta(&mut c, b"foo", MetaField::Size),
            Reply::Val { encoding: 1, value: b"5".to_vec() }
        );
    }

    #[test]
    fn meta_on_missing_key_is_not_found() {
        let mut trie: Trie<Item> = Trie::new();
        let shim = AllocShim::new();
        let clock = Clock::new();
        let mut c = Context {
            trie: &mut trie,
            shim: &shim,
            clock: &clock,
            compression_threshold: 64,
            max_item_ttl: 0,
        };
        assert_eq!(meta(&mut c, b"nope", MetaField::Size), Reply::NotFound);
    }
}
