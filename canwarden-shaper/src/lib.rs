//! The shaping pipeline: applies a compiled [`Policy`] to individual
//! observations in real time.
//!
//! For each observation the [`Shaper`] makes a three-step decision, in a
//! fixed order that is a design choice, not an accident:
//!
//! 1. **drop** — an identifier in the drop set is discarded
//!    unconditionally, bypassing remap and rate limiting. Drop dominates
//!    remap so a blocked message can never resurface under a new
//!    identifier.
//! 2. **remap** — a remap source is rewritten to its target identifier.
//! 3. **rate limit** — the token bucket of the *resulting* (possibly
//!    remapped) identifier is consulted, because rate limiting should
//!    apply to the identifier that will actually appear on the output
//!    bus. Identifiers with no limit entry admit unconditionally.
//!
//! Deny means drop: CAN has no flow-control primitive a shaping layer
//! could exploit, so there is no queueing and no backpressure buffering.

mod bucket;

pub use bucket::TokenBucket;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use log::debug;

use canwarden_policy::Policy;
use canwarden_types::format_id;

/// Why an observation was dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropCause {
    /// Identifier is in the policy's unconditional drop set.
    Blocked,
    /// The identifier's token bucket was empty.
    RateLimited,
}

/// The shaping decision for one observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// Forward the frame under `id` — already rewritten when the original
    /// identifier was a remap source.
    Admit { id: u32 },
    Drop(DropCause),
}

/// Counters over the life of one shaper.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShaperStats {
    pub admitted: u64,
    pub dropped_blocked: u64,
    pub dropped_rate: u64,
    /// Admitted frames whose identifier was rewritten.
    pub remapped: u64,
}

/// Per-session shaping state derived from one immutable [`Policy`].
///
/// Owns one [`TokenBucket`] per rate-limited identifier. Cheap to build;
/// a policy reload constructs a fresh `Shaper` (buckets start full) rather
/// than patching bucket state in place.
#[derive(Debug)]
pub struct Shaper {
    policy: Arc<Policy>,
    buckets: HashMap<u32, TokenBucket>,
    stats: ShaperStats,
}

impl Shaper {
    /// Build the pipeline from a compiled policy at time `now` (seconds,
    /// same clock the observations carry).
    pub fn new(policy: Arc<Policy>, now: f64) -> Self {
        let buckets = policy
            .limits
            .iter()
            .map(|(&id, limit)| (id, TokenBucket::new(limit.rate, limit.burst, now)))
            .collect();
        Shaper {
            policy,
            buckets,
            stats: ShaperStats::default(),
        }
    }

    /// Decide the fate of one observation identified by `id` at time `now`.
    pub fn decide(&mut self, id: u32, now: f64) -> Verdict {
        if self.policy.drop.contains(&id) {
            self.stats.dropped_blocked += 1;
            return Verdict::Drop(DropCause::Blocked);
        }

        let (out_id, remapped) = match self.policy.remap.get(&id) {
            Some(&to) => (to, true),
            None => (id, false),
        };

        if let Some(bucket) = self.buckets.get_mut(&out_id) {
            if !bucket.admit(now) {
                debug!("rate limit exceeded for ID {}", format_id(out_id));
                self.stats.dropped_rate += 1;
                return Verdict::Drop(DropCause::RateLimited);
            }
        }

        self.stats.admitted += 1;
        if remapped {
            self.stats.remapped += 1;
        }
        Verdict::Admit { id: out_id }
    }

    pub fn stats(&self) -> ShaperStats {
        self.stats
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }
}

/// Atomic publication point for policy reloads.
///
/// Readers take a cheap [`Arc`] snapshot and keep using it for as long as
/// they like; a reload stores a whole new policy, so an in-flight reader
/// sees either the fully-old or the fully-new table, never a mix. A failed
/// reload simply never calls [`store`](Self::store), leaving the previous
/// policy in effect.
#[derive(Debug, Default)]
pub struct PolicyHandle {
    current: RwLock<Arc<Policy>>,
}

impl PolicyHandle {
    pub fn new(policy: Policy) -> Self {
        PolicyHandle {
            current: RwLock::new(Arc::new(policy)),
        }
    }

    /// The current policy. The snapshot stays valid across later reloads.
    pub fn snapshot(&self) -> Arc<Policy> {
        self.current
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    /// Publish a new policy, replacing the old one for future snapshots.
    pub fn store(&self, policy: Policy) {
        *self
            .current
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Arc::new(policy);
    }
}
