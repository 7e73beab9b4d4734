//! Capability contract and arena access.
//!
//! A table knows nothing about record layout. It reaches a record's link
//! through [`Capability::link`]/[`Capability::link_mut`] and asks the
//! capability to hash records and match them against queries. Records
//! themselves live in a caller-owned [`Arena`].

use crate::node::Link;
use slotmap::{DenseSlotMap, Key, SlotMap};

/// Binds a table to a record type, one of its embedded links, and a
/// key-matching/hashing scheme.
///
/// The capability value is the per-table user context: it is stored in the
/// table and passed as `&self` to [`matches`](Self::matches) and
/// [`hash`](Self::hash).
///
/// `hash` must agree with the hash callers pass to `add`/`remove`/`find`.
/// It is only invoked when the table rehashes (and by `remove_node`).
pub trait Capability<K: Key> {
    type Record;
    type Query: ?Sized;

    /// The link this index uses inside `record`.
    fn link(record: &Self::Record) -> &Link<K>;

    fn link_mut(record: &mut Self::Record) -> &mut Link<K>;

    /// Whether `record` is a hit for `query`.
    fn matches(&self, query: &Self::Query, record: &Self::Record) -> bool;

    /// Hash of the record's key.
    fn hash(&self, record: &Self::Record) -> u64;
}

/// Caller-owned record storage addressed by generational keys.
///
/// The table reads and rewrites links through this trait; it never inserts
/// or removes records.
pub trait Arena<K: Key, R> {
    fn record(&self, node: K) -> Option<&R>;
    fn record_mut(&mut self, node: K) -> Option<&mut R>;
}

impl<K: Key, R> Arena<K, R> for SlotMap<K, R> {
    #[inline]
    fn record(&self, node: K) -> Option<&R> {
        self.get(node)
    }

    #[inline]
    fn record_mut(&mut self, node: K) -> Option<&mut R> {
        self.get_mut(node)
    }
}

impl<K: Key, R> Arena<K, R> for DenseSlotMap<K, R> {
    #[inline]
    fn record(&self, node: K) -> Option<&R> {
        self.get(node)
    }

    #[inline]
    fn record_mut(&mut self, node: K) -> Option<&mut R> {
        self.get_mut(node)
    }
}

#[cold]
#[inline(never)]
pub(crate) fn dangling<K: core::fmt::Debug>(node: K) -> ! {
    panic!("linked node {node:?} is missing from the arena; remove it from every table before freeing it")
}
