//! Per-peer warning rate limiting (§7, tier 1): the collector logs a lot of
//! the same complaint ("short packet from X", "no template for Y") under a
//! misbehaving or misconfigured exporter, and unbounded logging at UDP
//! line rate is itself a denial-of-service surface. A token bucket per
//! `(peer, reason)` caps that to a steady trickle instead of silencing it
//! outright.

use std::collections::HashMap;
use std::hash::Hash;
use std::num::NonZeroUsize;
use std::time::Instant;

use lru::LruCache;

/// One bucket: `burst` tokens available up front, refilled at `per_sec`
/// tokens/second, capped at `burst`.
#[derive(Debug, Clone, Copy)]
struct TokenBucket {
    tokens: f64,
    burst: f64,
    per_sec: f64,
    last: Instant,
}

impl TokenBucket {
    fn new(burst: u32, per_sec: u32, now: Instant) -> Self {
        TokenBucket {
            tokens: burst as f64,
            burst: burst as f64,
            per_sec: per_sec as f64,
            last: now,
        }
    }

    fn allow(&mut self, now: Instant) -> bool {
        let elapsed = now.saturating_duration_since(self.last).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.per_sec).min(self.burst);
        self.last = now;
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Bounded map of token buckets keyed by whatever identifies a warning
/// class for a peer (e.g. `(SocketAddr, &'static str)`). Bounded the same
/// way the peer/template caches are (§4.D) so a peer-flood can't grow this
/// without limit either.
pub struct RateLimiter<K: Eq + Hash> {
    buckets: LruCache<K, TokenBucket>,
    burst: u32,
    per_sec: u32,
    suppressed: HashMap<K, u64>,
}

impl<K: Eq + Hash + Clone> RateLimiter<K> {
    pub fn new(capacity: usize, burst: u32, per_sec: u32) -> Self {
        RateLimiter {
            buckets: LruCache::new(NonZeroUsize::new(capacity.max(1)).unwrap()),
            burst,
            per_sec,
            suppressed: HashMap::new(),
        }
    }

    /// Returns `true` if this key's warning should be logged now. When it
    /// returns `false` the caller should simply drop the message; the
    /// count of drops is tracked internally and can be surfaced later via
    /// `take_suppressed`.
    pub fn allow(&mut self, key: K, now: Instant) -> bool {
        let allowed = match self.buckets.get_mut(&key) {
            Some(bucket) => bucket.allow(now),
            None => {
                let mut bucket = TokenBucket::new(self.burst, self.per_sec, now);
                let allowed = bucket.allow(now);
                self.buckets.put(key.clone(), bucket);
                allowed
            }
        };
        if !allowed {
            *self.suppressed.entry(key).or_insert(0) += 1;
        }
        allowed
    }

    /// Drains and returns the suppressed-message counts accumulated since
    /// the last call, for an occasional "N warnings suppressed" summary
    /// line.
    pub fn take_suppressed(&mut self) -> HashMap<K, u64> {
        std::mem::take(&mut self.suppressed)
    }
}
