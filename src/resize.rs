//! Resize engine for dynamic tables.
//!
//! Shrinking is checked after every removal. Growth is driven by observed
//! lookup cost instead of insertion volume: only a sample of `find` calls is
//! measured, and the table grows once enough sampled lookups walked long
//! chains while the count sat above the high watermark. Bursts of inserts
//! that are removed again before anyone looks them up never pay for a
//! rehash.
//!
//! While a cursor is open the heuristics defer instead of rehashing; the
//! rehash itself asserts that no cursor is open.

use crate::capability::{Arena, Capability};
use crate::error::{Result, TableError};
use crate::node::Bucket;
use crate::policy::{ResizePolicy, Watermarks};
use crate::table::{Buckets, ChainedTable};
use slotmap::Key;

/// Adaptive state carried only by dynamic tables.
#[derive(Debug)]
pub(crate) struct DynamicState {
    pub(crate) policy: ResizePolicy,
    pub(crate) min_bucket_count: usize,
    pub(crate) watermarks: Watermarks,
    pub(crate) expensive_lookups: usize,
    pub(crate) lookup_samples: usize,
}

impl DynamicState {
    pub(crate) fn new(policy: ResizePolicy, min_bucket_count: usize) -> Self {
        Self {
            policy,
            min_bucket_count,
            watermarks: policy.watermarks(min_bucket_count),
            expensive_lookups: 0,
            lookup_samples: 0,
        }
    }
}

/// Empty bucket array of `n` slots, failing instead of aborting when the
/// allocator refuses.
pub(crate) fn alloc_buckets<K: Key>(n: usize) -> Result<Vec<Bucket<K>>> {
    if n == 0 {
        return Err(TableError::ZeroBuckets);
    }
    let mut buckets = Vec::new();
    buckets
        .try_reserve_exact(n)
        .map_err(|source| TableError::Alloc { buckets: n, source })?;
    buckets.resize(n, Bucket::EMPTY);
    Ok(buckets)
}

impl<'s, K, C> ChainedTable<'s, K, C>
where
    K: Key,
    C: Capability<K>,
{
    /// Rehash a dynamic table into `buckets` slots (raised to the floor).
    ///
    /// Panics while a cursor is open.
    pub fn resize<A>(&mut self, arena: &mut A, buckets: usize) -> Result<()>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let Some(state) = &self.dynamic else {
            return Err(TableError::StaticResize);
        };
        if buckets == 0 {
            return Err(TableError::ZeroBuckets);
        }
        let target = buckets.max(state.min_bucket_count);
        self.rehash(arena, target, "explicit resize")
    }

    /// Advance the sampling counter; true when this lookup should be
    /// measured.
    pub(crate) fn sample_lookup(&mut self) -> bool {
        let Some(state) = self.dynamic.as_mut() else {
            return false;
        };
        state.lookup_samples += 1;
        if state.lookup_samples < state.policy.sample_interval {
            return false;
        }
        state.lookup_samples = 0;
        true
    }

    /// Account for a sampled lookup that walked `walked` nodes.
    pub(crate) fn maybe_grow<A>(&mut self, arena: &mut A, walked: usize)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let count = self.count;
        let Some(state) = self.dynamic.as_mut() else {
            return;
        };
        if count <= state.watermarks.high || walked <= state.policy.expensive_chain_len {
            return;
        }
        let limit = state.policy.expensive_lookup_limit;
        state.expensive_lookups = (state.expensive_lookups + 1).min(limit);
        if state.expensive_lookups < limit {
            return;
        }
        let target = (count / state.policy.target_load).max(state.min_bucket_count);
        let buckets = self.buckets.as_slice().len();
        if target <= buckets {
            // Chains are long but the load does not call for more buckets.
            state.expensive_lookups = 0;
            return;
        }
        if self.inhibit.is_inhibited() {
            // Counter stays saturated; the next expensive sample after the
            // cursors close grows the table.
            log::trace!("grow deferred: {} open cursor(s)", self.inhibit.depth());
            return;
        }
        state.expensive_lookups = 0;
        if let Err(err) = self.rehash(arena, target, "grow") {
            log::warn!("keeping {} buckets: {err}", self.bucket_count());
        }
    }

    /// Shrink check run after every removal.
    pub(crate) fn maybe_shrink<A>(&mut self, arena: &mut A)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let Some(state) = &self.dynamic else {
            return;
        };
        let buckets = self.buckets.as_slice().len();
        if self.count >= state.watermarks.low || buckets <= state.min_bucket_count {
            return;
        }
        let target = (buckets / state.policy.shrink_divisor).max(state.min_bucket_count);
        if self.inhibit.is_inhibited() {
            log::trace!("shrink deferred: {} open cursor(s)", self.inhibit.depth());
            return;
        }
        if let Err(err) = self.rehash(arena, target, "shrink") {
            log::warn!("keeping {buckets} buckets: {err}");
        }
    }

    /// Relink every node into a fresh array of `new_count` buckets using
    /// `Capability::hash`. On allocation failure the table is untouched.
    fn rehash<A>(&mut self, arena: &mut A, new_count: usize, reason: &str) -> Result<()>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        assert!(
            !self.inhibit.is_inhibited(),
            "rehash while {} cursor(s) are open",
            self.inhibit.depth()
        );
        if self.dynamic.is_none() {
            return Err(TableError::StaticResize);
        }
        let mut fresh = alloc_buckets(new_count)?;
        for slot in self.buckets.as_slice() {
            let mut cur = slot.head;
            while let Some(node) = cur {
                let rec = Self::record(&*arena, node);
                cur = C::link(rec).next;
                let hash = self.capability.hash(rec);
                Self::push_front(&mut fresh, hash, arena, node);
            }
        }
        let old_count = self.bucket_count();
        self.buckets = Buckets::Dynamic(fresh);
        if let Some(state) = self.dynamic.as_mut() {
            state.watermarks = state.policy.watermarks(new_count);
        }
        log::debug!(
            "{reason}: rehashed {} nodes from {old_count} to {new_count} buckets",
            self.count
        );
        Ok(())
    }
}
