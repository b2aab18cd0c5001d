//! Rate limiting utilities

use std::collections::HashMap;
use std::time::{Duration, Instant};

use crate::{ClientId, SessionId};

/// Token-bucket rate limiter keyed by IPC client.
///
/// Each client has one bucket for control traffic and one bucket per session
/// it feeds frames to, so a collaborator driving several sessions gets the
/// full frame budget for each of them.
#[derive(Debug)]
pub struct RateLimiter {
    max_tokens: u32,
    refill_interval: Duration,
    buckets: HashMap<BucketKey, ClientBucket>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum BucketKey {
    Control(ClientId),
    Feed(ClientId, SessionId),
}

impl BucketKey {
    fn client(&self) -> &ClientId {
        match self {
            BucketKey::Control(client_id) | BucketKey::Feed(client_id, _) => client_id,
        }
    }
}

#[derive(Debug)]
struct ClientBucket {
    tokens: u32,
    last_refill: Instant,
}

impl RateLimiter {
    /// Create a new rate limiter
    ///
    /// # Arguments
    /// * `max_requests` - Maximum requests allowed per interval
    /// * `interval` - Time interval for the limit
    pub fn new(max_requests: u32, interval: Duration) -> Self {
        Self {
            max_tokens: max_requests,
            refill_interval: interval,
            buckets: HashMap::new(),
        }
    }

    /// Returns `true` if the request is allowed, `false` if rate limited
    pub fn check(&mut self, client_id: &ClientId) -> bool {
        self.check_at(BucketKey::Control(client_id.clone()), Instant::now())
    }

    /// Like [`check`](Self::check), but draws from the bucket for one session's
    /// frame feed
    pub fn check_feed(&mut self, client_id: &ClientId, session_id: &SessionId) -> bool {
        self.check_at(
            BucketKey::Feed(client_id.clone(), session_id.clone()),
            Instant::now(),
        )
    }

    fn check_at(&mut self, key: BucketKey, now: Instant) -> bool {
        let bucket = self.buckets.entry(key).or_insert(ClientBucket {
            tokens: self.max_tokens,
            last_refill: now,
        });

        let elapsed = now.duration_since(bucket.last_refill);
        if elapsed >= self.refill_interval {
            let intervals = (elapsed.as_millis() / self.refill_interval.as_millis().max(1)) as u32;
            bucket.tokens = bucket
                .tokens
                .saturating_add(intervals.saturating_mul(self.max_tokens))
                .min(self.max_tokens);
            bucket.last_refill = now;
        }

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Remove a client's rate limit state, including its feed buckets
    pub fn remove_client(&mut self, client_id: &ClientId) {
        self.buckets.retain(|key, _| key.client() != client_id);
    }

    /// Drop every client's feed bucket for a session that has been stopped
    pub fn remove_session(&mut self, session_id: &SessionId) {
        self.buckets
            .retain(|key, _| !matches!(key, BucketKey::Feed(_, s) if s == session_id));
    }
}
