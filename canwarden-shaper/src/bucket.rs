//! The token bucket backing each rate-limited identifier.

/// Continuous-refill token bucket.
///
/// Tokens accrue at `refill_rate` per second up to `capacity`, computed
/// lazily at admission time — no timer, no background task. One token is
/// spent per admitted frame; an empty bucket denies.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenBucket {
    capacity: f64,
    tokens: f64,
    refill_rate: f64,
    last_refill: f64,
}

impl TokenBucket {
    /// A bucket that starts full, so a configured burst is available
    /// immediately.
    pub fn new(rate: f64, burst: u32, now: f64) -> Self {
        let capacity = f64::from(burst);
        TokenBucket {
            capacity,
            tokens: capacity,
            refill_rate: rate,
            last_refill: now,
        }
    }

    /// Refill for the elapsed time, then try to take one token.
    ///
    /// A clock that moves backwards must not mint tokens, so negative
    /// elapsed time is clamped to zero (the refill timestamp still
    /// advances to `now`).
    pub fn admit(&mut self, now: f64) -> bool {
        let elapsed = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Currently available tokens (diagnostics only).
    pub fn tokens(&self) -> f64 {
        self.tokens
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}
