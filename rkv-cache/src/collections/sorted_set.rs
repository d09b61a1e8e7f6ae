use std::ops::Bound;
use std::sync::Arc;

use rkv_client::{format_score, Commands, Executor};
use rkv_common::RkvResult;

use super::{Binding, Keyed};
use crate::codec::{Codec, JsonCodec};

/// Bounds for `SortedSet::count_in_range`.
#[derive(Debug, Clone, PartialEq)]
pub enum Range {
    /// Inclusive score bounds; infinities map to `-inf` / `+inf`.
    Numeric(f64, f64),
    /// Score bounds with explicit exclusivity. `Unbounded` is `-inf` below
    /// and `+inf` above.
    Score(Bound<f64>, Bound<f64>),
    /// Lexicographic bounds in store syntax (`[a`, `(b`, `-`, `+`),
    /// passed through verbatim.
    Lexicographic(String, String),
}

/// Sorted set over a remote zset. Rank order is ascending score, ties
/// broken by member bytes.
pub struct SortedSet<E: Executor, C: Codec = JsonCodec> {
    binding: Binding<E, C>,
}

impl<E: Executor, C: Codec + Clone> Clone for SortedSet<E, C> {
    fn clone(&self) -> Self {
        SortedSet {
            binding: self.binding.clone(),
        }
    }
}

impl<E: Executor, C: Codec> SortedSet<E, C> {
    pub fn new(executor: Arc<E>, codec: C, key: impl Into<String>) -> Self {
        SortedSet {
            binding: Binding::new(executor, codec, key),
        }
    }

    pub fn rebind(self, key: impl Into<String>) -> Self {
        SortedSet {
            binding: self.binding.rebind(key),
        }
    }

    /// Inserts or rescores `member`. Returns true when it was new.
    pub fn add(&self, member: &str, score: f64) -> RkvResult<bool> {
        Ok(self.add_all(&[(member, score)])? > 0)
    }

    /// Returns the number of members that were new.
    pub fn add_all(&self, members: &[(&str, f64)]) -> RkvResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.binding.execute(|conn, key| conn.zadd(key, members))
    }

    pub fn cardinality(&self) -> RkvResult<u64> {
        self.binding.execute(|conn, key| conn.zcard(key))
    }

    /// Adds `delta` to the member's score (creating it at 0). Returns the
    /// new score.
    pub fn increment_score(&self, member: &str, delta: f64) -> RkvResult<f64> {
        self.binding
            .execute(|conn, key| conn.zincrby(key, delta, member))
    }

    pub fn range_by_rank(&self, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        self.binding
            .execute(|conn, key| conn.zrange(key, start, stop))
    }

    pub fn reverse_range_by_rank(&self, start: i64, stop: i64) -> RkvResult<Vec<String>> {
        self.binding
            .execute(|conn, key| conn.zrevrange(key, start, stop))
    }

    /// Zero-based rank; `None` when absent.
    pub fn rank(&self, member: &str) -> RkvResult<Option<u64>> {
        self.binding.execute(|conn, key| conn.zrank(key, member))
    }

    /// Returns the number of members removed.
    pub fn remove(&self, members: &[&str]) -> RkvResult<u64> {
        if members.is_empty() {
            return Ok(0);
        }
        self.binding.execute(|conn, key| conn.zrem(key, members))
    }

    pub fn score(&self, member: &str) -> RkvResult<Option<f64>> {
        self.binding.execute(|conn, key| conn.zscore(key, member))
    }

    pub fn count_in_range(&self, range: &Range) -> RkvResult<u64> {
        self.binding.execute(|conn, key| match range {
            Range::Numeric(low, high) => {
                conn.zcount(key, &format_score(*low), &format_score(*high))
            }
            Range::Score(low, high) => conn.zcount(
                key,
                &score_bound(*low, f64::NEG_INFINITY),
                &score_bound(*high, f64::INFINITY),
            ),
            Range::Lexicographic(low, high) => conn.zlexcount(key, low, high),
        })
    }
}

// Store syntax for one score bound: `1.5`, `(1.5`, `-inf`, `+inf`.
fn score_bound(bound: Bound<f64>, unbounded: f64) -> String {
    match bound {
        Bound::Included(score) => format_score(score),
        Bound::Excluded(score) => format!("({}", format_score(score)),
        Bound::Unbounded => format_score(unbounded),
    }
}

impl<E: Executor, C: Codec> Keyed for SortedSet<E, C> {
    fn key(&self) -> &str {
        self.binding.key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_bounds_use_store_syntax() {
        assert_eq!(score_bound(Bound::Included(1.5), f64::NEG_INFINITY), "1.5");
        assert_eq!(score_bound(Bound::Excluded(2.0), f64::INFINITY), "(2");
        assert_eq!(score_bound(Bound::Unbounded, f64::NEG_INFINITY), "-inf");
        assert_eq!(score_bound(Bound::Unbounded, f64::INFINITY), "+inf");
    }
}
