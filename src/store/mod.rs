//! The item model and its encoding policy (spec §3, §4.4). Grounded on the
//! shape of the teacher's `corestore` layer (`Corestore` owning a map of
//! typed values with its own disposal bookkeeping) but flattened down to
//! Gibson's single encoding-tagged `Item` rather than a multi-model
//! keyspace/table hierarchy — Gibson has one table, the trie itself.

use crate::lzf;
use crate::mem::AllocShim;

/// How an item's payload is physically represented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Plain = 0,
    Number = 1,
    Compressed = 2,
}

impl Encoding {
    pub fn tag(self) -> u8 {
        self as u8
    }
}

#[derive(Debug)]
enum Payload {
    Plain(Vec<u8>),
    Number(i64),
    /// Compressed bytes alongside the original (uncompressed) length,
    /// needed both for reply framing and for exact-size decompression.
    Compressed { bytes: Vec<u8>, original_len: usize },
}

/// A stored value plus its metadata (spec §3's `Item`). Owns no reference
/// back to its trie node — the trie is the only thing that knows where an
/// item lives.
#[derive(Debug)]
pub struct Item {
    payload: Payload,
    /// Monotonic seconds (via `util::Clock`) at which this item was last
    /// written by a SET/INC/DEC-family op.
    pub created_at: u64,
    /// Monotonic seconds of the most recent read or write.
    pub last_access_time: u64,
    /// Seconds; 0 means "never expires".
    pub ttl: u64,
    /// Monotonic seconds at which a write lock expires; 0 means unlocked.
    pub locked_until: u64,
}

/// Why a SET-family operation could not construct an item, or why a
/// numeric op couldn't find a number to operate on. Mirrors the teacher's
/// `ActionError` being the thing query handlers (`query/` in this repo)
/// translate into a reply code.
#[derive(Debug, PartialEq, Eq)]
pub enum StoreError {
    /// INC/DEC target isn't numeric and isn't a re-encodable numeric string.
    NotANumber,
}

impl Item {
    /// Builds a new item per the SET encoding policy (spec §3): numeric
    /// strings become NUMBER; large, compressible payloads become
    /// COMPRESSED; everything else stays PLAIN.
    pub fn new(value: &[u8], ttl: u64, now: u64, compression_threshold: usize) -> Self {
        let payload = Self::encode(value, compression_threshold);
        Self {
            payload,
            created_at: now,
            last_access_time: now,
            ttl,
            locked_until: 0,
        }
    }

    fn encode(value: &[u8], compression_threshold: usize) -> Payload {
        if let Some(n) = parse_i64(value) {
            return Payload::Number(n);
        }
        if value.len() >= compression_threshold {
            let mut out = vec![0u8; value.len()];
            if let Ok(clen) = lzf::compress(value, &mut out) {
                if clen < value.len() {
                    out.truncate(clen);
                    return Payload::Compressed {
                        bytes: out,
                        original_len: value.len(),
                    };
                }
            }
        }
        Payload::Plain(value.to_vec())
    }

    /// Replaces this item's payload in place, as a SET on an existing key
    /// does. Callers recompute the allocator-shim delta themselves via
    /// `size()` before and after (see `query::set::set`).
    pub fn set(&mut self, value: &[u8], ttl: u64, now: u64, compression_threshold: usize) {
        self.payload = Self::encode(value, compression_threshold);
        self.created_at = now;
        self.last_access_time = now;
        self.ttl = ttl;
        self.locked_until = 0;
    }

    pub fn encoding(&self) -> Encoding {
        match &self.payload {
            Payload::Plain(_) => Encoding::Plain,
            Payload::Number(_) => Encoding::Number,
            Payload::Compressed { .. } => Encoding::Compressed,
        }
    }

    /// Logical size in bytes (spec §3's `size`): stored-buffer length for
    /// PLAIN/COMPRESSED (the *compressed* length — this is what the
    /// allocator shim charges), or the decimal width of a NUMBER.
    pub fn size(&self) -> usize {
        match &self.payload {
            Payload::Plain(b) => b.len(),
            Payload::Number(n) => decimal_len(*n),
            Payload::Compressed { bytes, .. } => bytes.len(),
        }
    }

    /// Renders this item's value for a reply frame, decompressing into a
    /// fresh buffer if needed (spec §4.4: "transparently decompressed...
    /// the stored form is never returned directly").
    pub fn render(&self) -> Vec<u8> {
        match &self.payload {
            Payload::Plain(b) => b.clone(),
            Payload::Number(n) => n.to_string().into_bytes(),
            Payload::Compressed { bytes, original_len } => {
                let mut out = vec![0u8; *original_len];
                let written = lzf::decompress(bytes, &mut out)
                    .expect("stored compressed payload must decompress cleanly");
                out.truncate(written);
                out
            }
        }
    }

    pub fn is_expired(&self, now: u64) -> bool {
        self.ttl > 0 && now.saturating_sub(self.created_at) >= self.ttl
    }

    pub fn is_locked(&self, now: u64) -> bool {
        self.locked_until > now
    }

    pub fn touch(&mut self, now: u64) {
        self.last_access_time = now;
    }

    pub fn lock(&mut self, seconds: u64, now: u64) {
        self.locked_until = now + seconds;
    }

    pub fn unlock(&mut self) {
        self.locked_until = 0;
    }

    pub fn set_ttl(&mut self, ttl: u64) {
        self.ttl = ttl;
    }

    /// `locked_until` minus `now`, floored at 0 — the "lock-remaining"
    /// field for META (spec §4.5).
    pub fn lock_remaining(&self, now: u64) -> u64 {
        self.locked_until.saturating_sub(now)
    }

    /// INC/DEC (spec §4.5): adjusts an existing NUMBER in place, or
    /// re-encodes a numeric-looking PLAIN payload to NUMBER first. Fails
    /// with `NotANumber` for anything else. `delta` is +1 or -1 from the
    /// query layer's INC/DEC handlers.
    pub fn numeric_adjust(&mut self, delta: i64, now: u64) -> Result<i64, StoreError> {
        let current = match &self.payload {
            Payload::Number(n) => *n,
            Payload::Plain(b) => parse_i64(b).ok_or(StoreError::NotANumber)?,
            Payload::Compressed { .. } => return Err(StoreError::NotANumber),
        };
        let next = current.wrapping_add(delta);
        self.payload = Payload::Number(next);
        self.last_access_time = now;
        Ok(next)
    }
}

fn parse_i64(bytes: &[u8]) -> Option<i64> {
    let s = std::str::from_utf8(bytes).ok()?;
    if s.is_empty() {
        return None;
    }
    s.parse::<i64>().ok()
}

fn decimal_len(n: i64) -> usize {
    n.to_string().len()
}

/// Destroys an item, crediting its logical size back to the allocator
/// shim. Centralized here (rather than left to callers) so every deletion
/// path — DEL, TTL sweep, pressure eviction, MDEL — updates memory
/// accounting identically (spec §4.4).
pub fn dispose(item: Item, shim: &AllocShim) {
    shim.free(item.size());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_encode_as_number() {
        let item = Item::new(b"42", 0, 0, 64);
        assert_eq!(item.encoding(), Encoding::Number);
        assert_eq!(item.render(), b"42");
    }

    #[test]
    fn negative_numbers_encode_as_number() {
        let item = Item::new(b"-17", 0, 0, 64);
        assert_eq!(item.encoding(), Encoding::Number);
        assert_eq!(item.render(), b"-17");
    }

    #[test]
    fn short_plain_values_stay_plain() {
        let item = Item::new(b"hello world", 0, 0, 64);
        assert_eq!(item.encoding(), Encoding::Plain);
        assert_eq!(item.render(), b"hello world");
    }

    #[test]
    fn large_compressible_values_compress() {
        let value = vec![0u8; 5000];
        let item = Item::new(&value, 0, 0, 16);
        assert_eq!(item.encoding(), Encoding::Compressed);
        assert_eq!(item.render(), value);
        assert!(item.size() < value.len());
    }

    #[test]
    fn large_incompressible_values_stay_plain() {
        let value: Vec<u8> = (0..2000).map(|i| ((i * 2654435761u32) % 256) as u8).collect();
        let item = Item::new(&value, 0, 0, 16);
        // random-like data may or may not compress depending on luck of the
        // hash table, but round-trip must hold either way
        assert_eq!(item.render(), value);
    }

    #[test]
    fn ttl_expiry_predicate() {
        let item = Item::new(b"x", 10, 100, 64);
        assert!(!item.is_expired(109));
        assert!(item.is_expired(110));
    }

    #[test]
    fn zero_ttl_never_expires() {
        let item = Item::new(b"x", 0, 100, 64);
        assert!(!item.is_expired(u64::MAX));
    }

    #[test]
    fn lock_predicate_and_remaining() {
        let mut item = Item::new(b"x", 0, 100, 64);
        item.lock(60, 100);
        assert!(item.is_locked(150));
        assert!(!item.is_locked(160));
        assert_eq!(item.lock_remaining(130), 30);
        item.unlock();
        assert!(!item.is_locked(100));
    }

    #[test]
    fn numeric_adjust_on_number_encoding() {
        let mut item = Item::new(b"41", 0, 0, 64);
        let next = item.numeric_adjust(1, 0).unwrap();
        assert_eq!(next, 42);
        assert_eq!(item.render(), b"42");
    }

    #[test]
    fn numeric_adjust_reencodes_plain_numeric_string() {
        // a plain value here would only arise if encoding policy were
        // bypassed; exercise numeric_adjust's own re-encode path directly
        let mut item = Item::new(b"hi", 0, 0, 64);
        assert_eq!(item.numeric_adjust(1, 0), Err(StoreError::NotANumber));
    }

    #[test]
    fn numeric_adjust_wraps_on_overflow() {
        let mut item = Item::new(&i64::MAX.to_string().into_bytes(), 0, 0, 64);
        let next = item.numeric_adjust(1, 0).unwrap();
        assert_eq!(next, i64::MIN);
    }
}
