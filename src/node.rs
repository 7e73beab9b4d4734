//! Intrusive link and bucket slot.

use slotmap::Key;

/// What sits before a node in its chain.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub(crate) enum Back<K> {
    /// Not linked into any chain.
    Detached,
    /// First node of its bucket.
    Head,
    /// Linked after `K`.
    Node(K),
}

/// Sibling links embedded in a caller record, one per index the record
/// participates in. Carries no key, hash or value.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Link<K> {
    pub(crate) back: Back<K>,
    pub(crate) next: Option<K>,
}

impl<K: Key> Link<K> {
    /// A detached link.
    pub const fn new() -> Self {
        Self {
            back: Back::Detached,
            next: None,
        }
    }

    /// Whether this link currently sits in some chain.
    #[inline]
    pub fn is_linked(&self) -> bool {
        self.back != Back::Detached
    }

    /// Next node in the chain, if any.
    #[inline]
    pub fn next(&self) -> Option<K> {
        self.next
    }

    #[inline]
    pub(crate) fn detach(&mut self) {
        *self = Self::new();
    }
}

impl<K: Key> Default for Link<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// One slot of the bucket array: the head of a chain, or empty.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Bucket<K> {
    pub(crate) head: Option<K>,
}

impl<K: Key> Bucket<K> {
    /// An empty slot, usable for static storage: `[Bucket::EMPTY; 64]`.
    pub const EMPTY: Self = Bucket { head: None };

    /// First node of the chain.
    #[inline]
    pub fn head(&self) -> Option<K> {
        self.head
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }
}

impl<K: Key> Default for Bucket<K> {
    fn default() -> Self {
        Self::EMPTY
    }
}
