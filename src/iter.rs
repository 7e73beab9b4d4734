//! Cursor-based iteration.
//!
//! A [`Cursor`] walks buckets in index order and each chain head to tail.
//! It holds a resize-inhibit lease until it reaches the end or is dropped,
//! so the bucket array it indexes into stays put. The cursor does not borrow
//! the table: between `advance` calls the caller may remove (or re-add) the
//! node it was just handed, since the cursor already remembers the next one.
//! Touching any other node's membership during the walk is not allowed.

use core::iter::FusedIterator;

use crate::capability::{Arena, Capability};
use crate::lease::Lease;
use crate::table::ChainedTable;
use slotmap::Key;

/// Position of an open walk over one table.
#[derive(Debug)]
pub struct Cursor<K> {
    lease: Option<Lease>,
    bucket: usize,
    next: Option<K>,
}

impl<K> Cursor<K> {
    /// Whether the cursor still holds its lease (has not reached the end).
    pub fn is_open(&self) -> bool {
        self.lease.is_some()
    }

    /// Abandon the walk early, releasing the lease.
    pub fn close(self) {}
}

impl<'s, K, C> ChainedTable<'s, K, C>
where
    K: Key,
    C: Capability<K>,
{
    /// Open a walk. No resize starts until the cursor ends or is dropped.
    pub fn cursor(&self) -> Cursor<K> {
        Cursor {
            lease: Some(self.inhibit.lease()),
            bucket: 0,
            next: None,
        }
    }

    /// Next node of the walk, or `None` once every bucket is done (which
    /// also releases the cursor's lease).
    pub fn advance<A>(&self, arena: &A, cursor: &mut Cursor<K>) -> Option<K>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        let lease = cursor.lease.as_ref()?;
        assert!(
            self.inhibit.issued(lease),
            "cursor advanced on a table that did not open it"
        );
        let buckets = self.buckets.as_slice();
        loop {
            if let Some(node) = cursor.next {
                let link = Self::link(arena, node);
                assert!(
                    link.is_linked(),
                    "node {node:?} was unlinked ahead of an open cursor"
                );
                cursor.next = link.next;
                return Some(node);
            }
            if cursor.bucket == buckets.len() {
                cursor.lease = None;
                return None;
            }
            cursor.next = buckets[cursor.bucket].head;
            cursor.bucket += 1;
        }
    }

    /// Read-only walk yielding each node with its record.
    pub fn iter<'t, A>(&'t self, arena: &'t A) -> Iter<'t, 's, K, C, A>
    where
        A: Arena<K, C::Record> + ?Sized,
    {
        Iter {
            table: self,
            arena,
            cursor: self.cursor(),
        }
    }
}

/// Borrowing iterator returned by [`ChainedTable::iter`].
pub struct Iter<'t, 's, K, C, A: ?Sized> {
    table: &'t ChainedTable<'s, K, C>,
    arena: &'t A,
    cursor: Cursor<K>,
}

impl<'t, 's, K, C, A> Iterator for Iter<'t, 's, K, C, A>
where
    K: Key,
    C: Capability<K>,
    C::Record: 't,
    A: Arena<K, C::Record> + ?Sized,
{
    type Item = (K, &'t C::Record);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.table.advance(self.arena, &mut self.cursor)?;
        Some((node, ChainedTable::<K, C>::record(self.arena, node)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.cursor.is_open() {
            (0, Some(self.table.len()))
        } else {
            (0, Some(0))
        }
    }
}

impl<'t, 's, K, C, A> FusedIterator for Iter<'t, 's, K, C, A>
where
    K: Key,
    C: Capability<K>,
    C::Record: 't,
    A: Arena<K, C::Record> + ?Sized,
{
}
