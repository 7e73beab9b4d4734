//! ChainedTable: intrusive chained hash table over caller-owned records.

use crate::capability::{dangling, Arena, Capability};
use crate::error::{Result, TableError};
use crate::lease::ResizeInhibit;
use crate::node::{Back, Bucket, Link};
use crate::policy::{ResizePolicy, Watermarks};
use crate::resize::{alloc_buckets, DynamicState};
use slotmap::Key;

/// Whether a table owns a growable bucket array.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Caller storage of fixed length; never resizes.
    Static,
    /// Table-owned storage that grows and shrinks.
    Dynamic,
}

pub(crate) enum Buckets<'s, K> {
    Static(&'s mut [Bucket<K>]),
    Dynamic(Vec<Bucket<K>>),
}

impl<'s, K> Buckets<'s, K> {
    #[inline]
    pub(crate) fn as_slice(&self) -> &[Bucket<K>] {
        match self {
            Buckets::Static(s) => s,
            Buckets::Dynamic(v) => v,
        }
    }

    #[inline]
    pub(crate) fn as_mut_slice(&mut self) -> &mut [Bucket<K>] {
        match self {
            Buckets::Static(s) => s,
            Buckets::Dynamic(v) => v,
        }
    }
}

#[inline]
pub(crate) fn bucket_index(hash: u64, buckets: usize) -> usize {
    (hash % buckets as u64) as usize
}

/// Chained hash table whose nodes are links embedded in arena records.
///
/// The table never allocates per record. Every operation that touches links
/// takes the arena holding the records; callers pass the same hash they
/// would get from the capability, so the hot paths never call back into
/// `Capability::hash`.
pub struct ChainedTable<'s, K, C> {
    pub(crate) capability: C,
    pub(crate) buckets: Buckets<'s, K>,
    pub(crate) count: usize,
    // None for static tables.
    pub(crate) dynamic: Option<DynamicState>,
    pub(crate) inhibit: ResizeInhibit,
}

impl<'s, K, C> ChainedTable<'s, K, C>
where
    K: Key,
    C: Capability<K>,
{
    /// Fixed-capacity table over caller storage. The storage is cleared and
    /// its length becomes the bucket count.
    pub fn new_static(capability: C, storage: &'s mut [Bucket<K>]) -> Result<Self> {
        if storage.is_empty() {
            return Err(TableError::ZeroBuckets);
        }
        storage.fill(Bucket::EMPTY);
        Ok(Self {
            capability,
            buckets: Buckets::Static(storage),
            count: 0,
            dynamic: None,
            inhibit: ResizeInhibit::new(),
        })
    }

    /// Growable table that never drops below `min_capacity` buckets.
    pub fn new_dynamic(capability: C, min_capacity: usize) -> Result<Self> {
        Self::with_policy(capability, min_capacity, ResizePolicy::default())
    }

    pub fn with_policy(capability: C, min_capacity: usize, policy: ResizePolicy) -> Result<Self> {
        policy.validate()?;
        let buckets = alloc_buckets(min_capacity)?;
        Ok(Self {
            capability,
            buckets: Buckets::Dynamic(buckets),
            count: 0,
            dynamic: Some(DynamicState::new(policy, min_capacity)),
            inhibit: ResizeInhibit::new(),
        })
    }

    #[inline]
    pub(crate) fn record<'a, A>(arena: &'a A, node: K) -> &'a C::Record
    where
        A: Arena<K, C::Record> + ?Sized,
        C::Record: 'a,
    {
        arena.record(node).unwrap_or_else(|| dangling(node))
    }

    #[inline]
    pub(crate) fn link<'a, A>(arena: &'a A, node: K) -> &'a Link<K>
    where
        A: Arena<K, C::Record> + ?Sized,
        C::Record: 'a,
    {
        C::link(Self::record(arena, node))
    }

    #[inline]
    pub(crate) fn link_mut<'a, A>(arena: &'a mut A, node: K) -> &'a mut Link<K>
    where
        A: Arena<K, C::Record> + ?Sized,
        C::Record: 'a,
    {
        C::link_mut(arena.record_mut(node).unwrap_or_else(|| dangling(node)))
    }

    /// Prepend `node` to the chain `hash` selects in `buckets`.
    pub(crate) fn push_front<A>(buckets: &mut [Bucket<K>], hash: u64, arena: &mut A, node: K)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let idx = bucket_index(hash, buckets.len());
        let slot = &mut buckets[idx];
        let head = slot.head.replace(node);
        if let Some(h) = head {
            Self::link_mut(arena, h).back = Back::Node(node);
        }
        let link = Self::link_mut(arena, node);
        link.back = Back::Head;
        link.next = head;
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.as_slice().len()
    }

    pub fn mode(&self) -> Mode {
        match self.buckets {
            Buckets::Static(_) => Mode::Static,
            Buckets::Dynamic(_) => Mode::Dynamic,
        }
    }

    /// Bucket floor of a dynamic table.
    pub fn min_bucket_count(&self) -> Option<usize> {
        self.dynamic.as_ref().map(|s| s.min_bucket_count)
    }

    pub fn watermarks(&self) -> Option<Watermarks> {
        self.dynamic.as_ref().map(|s| s.watermarks)
    }

    pub fn policy(&self) -> Option<&ResizePolicy> {
        self.dynamic.as_ref().map(|s| &s.policy)
    }

    /// Number of cursors currently holding off resizes.
    pub fn open_cursors(&self) -> usize {
        self.inhibit.depth()
    }

    pub fn capability(&self) -> &C {
        &self.capability
    }

    pub fn capability_mut(&mut self) -> &mut C {
        &mut self.capability
    }

    /// Link `node` at the head of the chain for `hash`.
    ///
    /// Duplicates are not detected: a later `find` returns the most
    /// recently added match. Panics if the node's link is already in use.
    pub fn add<A>(&mut self, arena: &mut A, hash: u64, node: K)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        assert!(
            !Self::link(&*arena, node).is_linked(),
            "node {node:?} is already linked into a chain"
        );
        Self::push_front(self.buckets.as_mut_slice(), hash, arena, node);
        self.count += 1;
    }

    /// Unlink `node`, which must have been added with `hash`. May shrink a
    /// dynamic table.
    pub fn remove<A>(&mut self, arena: &mut A, hash: u64, node: K)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        self.unlink(arena, hash, node);
        self.maybe_shrink(arena);
    }

    /// Like [`remove`](Self::remove), recomputing the hash through the
    /// capability.
    pub fn remove_node<A>(&mut self, arena: &mut A, node: K)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let hash = self.capability.hash(Self::record(&*arena, node));
        self.remove(arena, hash, node);
    }

    fn unlink<A>(&mut self, arena: &mut A, hash: u64, node: K)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let Link { back, next } = *Self::link(&*arena, node);
        match back {
            Back::Detached => panic!("node {node:?} is not linked"),
            Back::Head => {
                let buckets = self.buckets.as_mut_slice();
                let idx = bucket_index(hash, buckets.len());
                let slot = &mut buckets[idx];
                assert_eq!(
                    slot.head,
                    Some(node),
                    "hash {hash:#x} does not lead to the bucket of node {node:?}"
                );
                slot.head = next;
            }
            Back::Node(prev) => Self::link_mut(arena, prev).next = next,
        }
        if let Some(n) = next {
            Self::link_mut(arena, n).back = back;
        }
        Self::link_mut(arena, node).detach();
        self.count -= 1;
    }

    /// First node in the chain for `hash` matching `query`.
    ///
    /// On dynamic tables a sample of calls measures the chain walk and may
    /// grow the table.
    pub fn find<A>(&mut self, arena: &mut A, hash: u64, query: &C::Query) -> Option<K>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let (found, walked) = self.scan(&*arena, hash, query);
        if self.sample_lookup() {
            self.maybe_grow(arena, walked);
        }
        found
    }

    /// Lookup through shared borrows. Never samples or resizes.
    pub fn get<A>(&self, arena: &A, hash: u64, query: &C::Query) -> Option<K>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        self.scan(arena, hash, query).0
    }

    pub fn contains<A>(&self, arena: &A, hash: u64, query: &C::Query) -> bool
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        self.get(arena, hash, query).is_some()
    }

    /// Walk one chain; returns the hit and the number of nodes visited.
    fn scan<A>(&self, arena: &A, hash: u64, query: &C::Query) -> (Option<K>, usize)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let buckets = self.buckets.as_slice();
        let mut cur = buckets[bucket_index(hash, buckets.len())].head;
        let mut walked = 0;
        while let Some(node) = cur {
            walked += 1;
            let rec = Self::record(arena, node);
            if self.capability.matches(query, rec) {
                return (Some(node), walked);
            }
            cur = C::link(rec).next;
        }
        (None, walked)
    }

    /// Release the table. Panics if a cursor is still open.
    ///
    /// Nodes still linked keep their link state, and so does every record
    /// left linked when a table is simply dropped: adding such a record to
    /// another table panics as already linked. Use
    /// [`finalize_destroy`](Self::finalize_destroy) to detach them, or reset
    /// each record's link to [`Link::new`] before reuse.
    pub fn finalize(self) {
        assert!(
            !self.inhibit.is_inhibited(),
            "finalize with {} open cursor(s)",
            self.inhibit.depth()
        );
        if self.count > 0 {
            log::debug!("finalizing table with {} linked nodes", self.count);
        }
    }

    /// Detach every node and hand it to `dispose`, then finalize.
    ///
    /// The table is consumed, so `dispose` cannot call back into it; it may
    /// free the record from the arena.
    pub fn finalize_destroy<A, F>(mut self, arena: &mut A, mut dispose: F)
    where
        A: Arena<K, C::Record> + ?Sized,
        F: FnMut(&mut A, K),
    {
        assert!(
            !self.inhibit.is_inhibited(),
            "finalize with {} open cursor(s)",
            self.inhibit.depth()
        );
        for slot in self.buckets.as_mut_slice() {
            let mut cur = slot.head.take();
            while let Some(node) = cur {
                let link = Self::link_mut(arena, node);
                cur = link.next;
                link.detach();
                self.count -= 1;
                dispose(&mut *arena, node);
            }
        }
        debug_assert_eq!(self.count, 0);
        self.finalize();
    }

    /// Check every structural invariant; panics on the first violation.
    #[cfg(test)]
    pub(crate) fn assert_consistent<A>(&self, arena: &A)
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let buckets = self.buckets.as_slice();
        let mut seen = 0;
        for (i, slot) in buckets.iter().enumerate() {
            let mut back = Back::Head;
            let mut cur = slot.head;
            while let Some(node) = cur {
                let rec = Self::record(arena, node);
                let link = C::link(rec);
                assert_eq!(link.back, back, "broken back link at {node:?}");
                assert_eq!(
                    bucket_index(self.capability.hash(rec), buckets.len()),
                    i,
                    "node {node:?} sits in the wrong bucket"
                );
                seen += 1;
                back = Back::Node(node);
                cur = link.next;
            }
        }
        assert_eq!(seen, self.count, "count does not match chain lengths");
        if let Some(state) = &self.dynamic {
            assert!(buckets.len() >= state.min_bucket_count);
            assert_eq!(state.watermarks, state.policy.watermarks(buckets.len()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::{DefaultKey, SlotMap};

    #[derive(Debug)]
    struct Pair {
        key: u64,
        link: Link<DefaultKey>,
    }

    fn pair(key: u64) -> Pair {
        Pair {
            key,
            link: Link::new(),
        }
    }

    /// Hashes keys modulo `modulus`; small moduli force collisions.
    struct ByKey {
        modulus: u64,
    }

    impl Capability<DefaultKey> for ByKey {
        type Record = Pair;
        type Query = u64;

        fn link(record: &Pair) -> &Link<DefaultKey> {
            &record.link
        }
        fn link_mut(record: &mut Pair) -> &mut Link<DefaultKey> {
            &mut record.link
        }
        fn matches(&self, query: &u64, record: &Pair) -> bool {
            record.key == *query
        }
        fn hash(&self, record: &Pair) -> u64 {
            record.key % self.modulus
        }
    }

    const WIDE: ByKey = ByKey { modulus: u64::MAX };

    #[test]
    fn add_find_remove() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 8).unwrap();
        let a = arena.insert(pair(1));
        let b = arena.insert(pair(2));
        t.add(&mut arena, 1, a);
        t.add(&mut arena, 2, b);
        assert_eq!(t.len(), 2);
        assert_eq!(t.find(&mut arena, 1, &1), Some(a));
        assert_eq!(t.find(&mut arena, 2, &2), Some(b));
        assert_eq!(t.find(&mut arena, 3, &3), None);

        t.remove(&mut arena, 1, a);
        assert_eq!(t.len(), 1);
        assert!(!arena[a].link.is_linked());
        assert_eq!(t.find(&mut arena, 1, &1), None);
        assert_eq!(t.get(&arena, 2, &2), Some(b));
        t.assert_consistent(&arena);
    }

    #[test]
    fn chain_is_most_recent_first() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut storage = [Bucket::EMPTY; 1];
        let mut t = ChainedTable::new_static(WIDE, &mut storage).unwrap();
        let nodes: Vec<_> = (0..4).map(|k| arena.insert(pair(k))).collect();
        for (k, &n) in nodes.iter().enumerate() {
            t.add(&mut arena, k as u64, n);
        }
        let order: Vec<_> = t.iter(&arena).map(|(n, _)| n).collect();
        let mut expected = nodes.clone();
        expected.reverse();
        assert_eq!(order, expected);
    }

    #[test]
    fn duplicates_are_kept_and_newest_wins() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        let old = arena.insert(pair(7));
        let new = arena.insert(pair(7));
        t.add(&mut arena, 7, old);
        t.add(&mut arena, 7, new);
        assert_eq!(t.len(), 2);
        assert_eq!(t.find(&mut arena, 7, &7), Some(new));
        t.remove(&mut arena, 7, new);
        assert_eq!(t.find(&mut arena, 7, &7), Some(old));
    }

    #[test]
    fn unlink_middle_head_and_tail() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let cap = ByKey { modulus: 1 };
        let mut storage = [Bucket::EMPTY; 3];
        let mut t = ChainedTable::new_static(cap, &mut storage).unwrap();
        let n: Vec<_> = (0..5).map(|k| arena.insert(pair(k))).collect();
        for &k in &n {
            t.add(&mut arena, 0, k);
        }
        // chain: 4 3 2 1 0
        t.remove(&mut arena, 0, n[2]);
        t.assert_consistent(&arena);
        t.remove(&mut arena, 0, n[4]);
        t.assert_consistent(&arena);
        t.remove(&mut arena, 0, n[0]);
        t.assert_consistent(&arena);
        let left: Vec<_> = t.iter(&arena).map(|(k, _)| k).collect();
        assert_eq!(left, vec![n[3], n[1]]);
    }

    #[test]
    fn remove_node_uses_capability_hash() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(ByKey { modulus: 5 }, 8).unwrap();
        let a = arena.insert(pair(12));
        t.add(&mut arena, 12 % 5, a);
        t.remove_node(&mut arena, a);
        assert!(t.is_empty());
        t.assert_consistent(&arena);
    }

    #[test]
    #[should_panic(expected = "already linked")]
    fn double_add_panics() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        let a = arena.insert(pair(1));
        t.add(&mut arena, 1, a);
        t.add(&mut arena, 1, a);
    }

    #[test]
    #[should_panic(expected = "not linked")]
    fn remove_detached_panics() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        let a = arena.insert(pair(1));
        t.remove(&mut arena, 1, a);
    }

    #[test]
    #[should_panic(expected = "does not lead to the bucket")]
    fn remove_with_wrong_hash_panics() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut storage = [Bucket::EMPTY; 4];
        let mut t = ChainedTable::new_static(WIDE, &mut storage).unwrap();
        let a = arena.insert(pair(1));
        t.add(&mut arena, 1, a);
        t.remove(&mut arena, 2, a);
    }

    #[test]
    #[should_panic(expected = "missing from the arena")]
    fn freed_record_is_detected() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut storage = [Bucket::EMPTY; 1];
        let mut t = ChainedTable::new_static(WIDE, &mut storage).unwrap();
        let a = arena.insert(pair(1));
        let b = arena.insert(pair(2));
        t.add(&mut arena, 1, a);
        t.add(&mut arena, 2, b);
        arena.remove(a);
        let _ = t.get(&arena, 1, &1);
    }

    #[test]
    fn static_storage_is_cleared_and_sized() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let stale = arena.insert(pair(0));
        let mut storage = [Bucket { head: Some(stale) }; 3];
        let t = ChainedTable::new_static(WIDE, &mut storage).unwrap();
        assert_eq!(t.mode(), Mode::Static);
        assert_eq!(t.bucket_count(), 3);
        assert_eq!(t.min_bucket_count(), None);
        assert_eq!(t.watermarks(), None);
        assert_eq!(t.iter(&arena).count(), 0);
    }

    #[test]
    fn zero_capacity_rejected() {
        let mut storage: [Bucket<DefaultKey>; 0] = [];
        assert!(matches!(
            ChainedTable::new_static(WIDE, &mut storage),
            Err(TableError::ZeroBuckets)
        ));
        assert!(matches!(
            ChainedTable::<DefaultKey, ByKey>::new_dynamic(WIDE, 0),
            Err(TableError::ZeroBuckets)
        ));
    }

    #[test]
    fn finalize_destroy_hands_back_every_node() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(ByKey { modulus: 3 }, 4).unwrap();
        for k in 0..10 {
            let n = arena.insert(pair(k));
            t.add(&mut arena, k % 3, n);
        }
        let mut disposed = Vec::new();
        t.finalize_destroy(&mut arena, |arena, node| {
            assert!(!arena[node].link.is_linked());
            disposed.push(arena.remove(node).unwrap().key);
        });
        disposed.sort_unstable();
        assert_eq!(disposed, (0..10).collect::<Vec<_>>());
        assert!(arena.is_empty());
    }

    #[test]
    #[should_panic(expected = "open cursor")]
    fn finalize_with_open_cursor_panics() {
        let t = ChainedTable::<DefaultKey, _>::new_dynamic(WIDE, 4).unwrap();
        let _c = t.cursor();
        t.finalize();
    }

    #[test]
    #[should_panic(expected = "open cursor")]
    fn finalize_destroy_with_open_cursor_panics() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        let a = arena.insert(pair(1));
        t.add(&mut arena, 1, a);
        let _c = t.cursor();
        // A dispose call would panic with a different message.
        t.finalize_destroy(&mut arena, |_, _| unreachable!("dispose ran"));
    }

    #[test]
    fn finalize_leaves_links_stale() {
        let mut arena: SlotMap<DefaultKey, Pair> = SlotMap::new();
        let mut t = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        let a = arena.insert(pair(1));
        t.add(&mut arena, 1, a);
        t.finalize();
        assert!(arena[a].link.is_linked());

        arena[a].link = Link::new();
        let mut other = ChainedTable::new_dynamic(WIDE, 4).unwrap();
        other.add(&mut arena, 1, a);
        assert_eq!(other.get(&arena, 1, &1), Some(a));
    }

    #[test]
    fn capability_context_is_reachable() {
        let mut t = ChainedTable::<DefaultKey, _>::new_dynamic(ByKey { modulus: 3 }, 4).unwrap();
        assert_eq!(t.capability().modulus, 3);
        t.capability_mut().modulus = 9;
        assert_eq!(t.capability().modulus, 9);
    }
}
