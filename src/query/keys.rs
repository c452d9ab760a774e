use super::Context;
use crate::protocol::{KvalEntry, Reply};

/// KEYS(prefix) (spec §4.5, testable property 3): every live key under
/// `prefix`, reconstructed by the trie's own edge-label concatenation, in
/// lexicographic order. Expired items are skipped rather than evicted
/// here — a read-only scan shouldn't mutate the trie it's walking; the
/// cron's TTL sweep (`cron.rs`) is the one place that reclaims them.
pub fn keys(ctx: &mut Context, prefix: &[u8]) -> Reply {
    let now = ctx.clock.now();
    let mut matches: Vec<_> = ctx
        .trie
        .find_prefix(prefix)
        .into_iter()
        .filter(|(_, item)| !item.is_expired(now))
        .map(|(key, item)| KvalEntry {
            key,
            encoding: item.encoding().tag(),
            value: Vec::new(),
        })
        .collect();
    matches.sort_by(|a, b| a.key.cmp(&b.key));
    Reply::Kval(matches)
}
