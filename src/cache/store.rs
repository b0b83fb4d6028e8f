//! Backing Store Module
//!
//! The minimal key-value protocol the cache layer needs from its store:
//! TTL writes, deletes, atomic increments and cursor-based scans. Any
//! Redis-compatible server satisfies it; `MemoryStore` implements it in
//! process.

use async_trait::async_trait;

use crate::error::Result;

// == Scan Page ==
/// One round-trip of a cursor scan.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanPage {
    /// Cursor for the next call; `0` once the iteration is complete
    pub cursor: u64,
    /// Keys from this batch that matched the pattern
    pub keys: Vec<String>,
}

// == Store Trait ==
/// Abstract backing store interface.
///
/// All keys passed in are already namespaced and validated. Implementations
/// must be safe to call concurrently and must never block the whole store
/// for longer than one bounded batch.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Returns the raw bytes for `key`, or `None` if missing or expired.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Batched `get`; results line up with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Creates or overwrites `key` with a TTL in seconds.
    async fn set_ex(&self, key: &str, value: &[u8], ttl: u64) -> Result<()>;

    /// Writes every entry with the same TTL, all or nothing.
    async fn mset_ex(&self, entries: &[(String, Vec<u8>)], ttl: u64) -> Result<()>;

    /// Deletes the given keys and returns how many existed.
    async fn delete(&self, keys: &[String]) -> Result<usize>;

    /// Atomically adds `amount` to the integer at `key` (missing counts as 0).
    async fn incr_by(&self, key: &str, amount: i64) -> Result<i64>;

    /// Examines roughly `count` keys starting at `cursor` and returns the
    /// ones matching the glob `pattern`. Start with cursor `0`.
    async fn scan(&self, cursor: u64, pattern: &str, count: usize) -> Result<ScanPage>;

    /// Checks whether a live entry exists for `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Liveness probe.
    async fn ping(&self) -> Result<()>;

    /// Store-reported memory usage in bytes.
    async fn used_memory(&self) -> Result<u64>;
}

// == Glob Matching ==
/// Redis-style glob match: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, key: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let key: Vec<char> = key.chars().collect();
    match_from(&pattern, &key)
}

fn match_from(pattern: &[char], key: &[char]) -> bool {
    let (mut p, mut k) = (0, 0);
    // Position to resume from after the most recent `*`
    let mut backtrack: Option<(usize, usize)> = None;

    while k < key.len() {
        if p < pattern.len() {
            match pattern[p] {
                '*' => {
                    backtrack = Some((p, k));
                    p += 1;
                    continue;
                }
                '?' => {
                    p += 1;
                    k += 1;
                    continue;
                }
                '[' => {
                    if let Some((matched, next)) = match_class(pattern, p, key[k]) {
                        if matched {
                            p = next;
                            k += 1;
                            continue;
                        }
                    } else if key[k] == '[' {
                        // Unterminated class, treat `[` literally
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
                '\\' if p + 1 < pattern.len() => {
                    if pattern[p + 1] == key[k] {
                        p += 2;
                        k += 1;
                        continue;
                    }
                }
                c => {
                    if c == key[k] {
                        p += 1;
                        k += 1;
                        continue;
                    }
                }
            }
        }

        match backtrack {
            Some((star_p, star_k)) => {
                backtrack = Some((star_p, star_k + 1));
                p = star_p + 1;
                k = star_k + 1;
            }
            None => return false,
        }
    }

    pattern[p..].iter().all(|c| *c == '*')
}

/// Matches `c` against the class starting at `pattern[start] == '['`.
/// Returns whether it matched and the index just past the closing `]`.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = pattern.get(i) == Some(&'^');
    if negate {
        i += 1;
    }

    let mut matched = false;
    while i < pattern.len() && pattern[i] != ']' {
        if pattern[i] == '\\' && i + 1 < pattern.len() {
            matched |= pattern[i + 1] == c;
            i += 2;
        } else if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let (lo, hi) = (pattern[i], pattern[i + 2]);
            matched |= (lo.min(hi)..=lo.max(hi)).contains(&c);
            i += 3;
        } else {
            matched |= pattern[i] == c;
            i += 1;
        }
    }

    if i >= pattern.len() {
        return None;
    }
    Some((matched != negate, i + 1))
}
