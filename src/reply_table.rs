//! Opponent-reply table: which moves have paid off from a given position.
//!
//! Keyed by the Zobrist hash of the position the reply was played from.
//! Each position keeps a handful of replies with a running mean of the
//! reward they earned for the seat that played them. Positions are evicted
//! least-recently-used once the table is full.

use std::num::NonZeroUsize;

use lru::LruCache;

use crate::constants::{REPLY_TABLE_PER_STATE, REPLY_TABLE_STATES};
use crate::moves::Move;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReplyStats {
    pub reply: Move,
    /// Saturates at `u16::MAX`, after which the mean keeps moving at that rate.
    pub visits: u16,
    pub mean: f64,
}

pub struct ReplyTable {
    cache: LruCache<u64, Vec<ReplyStats>>,
    per_state: usize,
}

impl Default for ReplyTable {
    fn default() -> Self {
        Self::new(REPLY_TABLE_STATES, REPLY_TABLE_PER_STATE)
    }
}

impl ReplyTable {
    pub fn new(states: usize, per_state: usize) -> Self {
        let capacity = NonZeroUsize::new(states).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: LruCache::new(capacity),
            per_state: per_state.max(1),
        }
    }

    /// Replies recorded for a position, marking it recently used.
    pub fn get(&mut self, hash: u64) -> Option<&[ReplyStats]> {
        self.cache.get(&hash).map(Vec::as_slice)
    }

    /// Like [`get`](Self::get) but leaves the eviction order alone.
    pub fn peek(&self, hash: u64) -> Option<&[ReplyStats]> {
        self.cache.peek(&hash).map(Vec::as_slice)
    }

    /// Highest-mean reply for a position.
    pub fn best_reply(&self, hash: u64) -> Option<Move> {
        self.peek(hash)?
            .iter()
            .max_by(|a, b| a.mean.total_cmp(&b.mean))
            .map(|s| s.reply)
    }

    /// Fold `reward` into the running mean for `reply` at this position.
    pub fn update(&mut self, hash: u64, reply: Move, reward: f64) {
        let per_state = self.per_state;
        let entries = self.cache.get_or_insert_mut(hash, Vec::new);
        match entries.iter_mut().find(|s| s.reply == reply) {
            Some(stats) => {
                stats.visits = stats.visits.saturating_add(1);
                stats.mean += (reward - stats.mean) / f64::from(stats.visits);
            }
            None => entries.push(ReplyStats {
                reply,
                visits: 1,
                mean: reward,
            }),
        }
        if entries.len() > per_state {
            entries.sort_by(|a, b| b.mean.total_cmp(&a.mean));
            entries.truncate(per_state);
        }
    }

    /// Number of positions held.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }
}
