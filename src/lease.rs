//! Resize-inhibit counter and its leases.
//!
//! Single-threaded counter that keeps a table from rehashing while cursors
//! walk it. Each open cursor holds a `Lease`; dropping the lease gives the
//! unit back. Unlike a borrow, a lease does not tie up the table, so the
//! caller can keep mutating while a walk is in progress.

use core::cell::Cell;
use std::rc::Rc;

/// Per-table inhibit counter. Embed in the table and hand out leases with
/// `self.inhibit.lease()`.
#[derive(Debug, Default)]
pub(crate) struct ResizeInhibit {
    // Rc keeps the counter and every lease !Send + !Sync.
    depth: Rc<Cell<usize>>,
}

impl ResizeInhibit {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Take one unit of inhibition.
    #[inline]
    pub(crate) fn lease(&self) -> Lease {
        let d = self.depth.get();
        self.depth.set(d + 1);
        Lease {
            depth: Rc::clone(&self.depth),
        }
    }

    /// Number of outstanding leases.
    #[inline]
    pub(crate) fn depth(&self) -> usize {
        self.depth.get()
    }

    #[inline]
    pub(crate) fn is_inhibited(&self) -> bool {
        self.depth() > 0
    }

    /// Whether `lease` was handed out by this counter.
    #[inline]
    pub(crate) fn issued(&self, lease: &Lease) -> bool {
        Rc::ptr_eq(&self.depth, &lease.depth)
    }
}

/// RAII unit of inhibition returned by `ResizeInhibit::lease`.
#[derive(Debug)]
pub(crate) struct Lease {
    depth: Rc<Cell<usize>>,
}

impl Drop for Lease {
    fn drop(&mut self) {
        let d = self.depth.get();
        debug_assert!(d > 0);
        self.depth.set(d - 1);
    }
}

#[cfg(test)]
mod tests {
    use super::ResizeInhibit;

    #[test]
    fn lease_and_release() {
        let r = ResizeInhibit::new();
        assert!(!r.is_inhibited());
        {
            let _l = r.lease();
            assert!(r.is_inhibited());
        }
        assert!(!r.is_inhibited());
    }

    #[test]
    fn leases_nest() {
        let r = ResizeInhibit::new();
        let l1 = r.lease();
        let l2 = r.lease();
        assert_eq!(r.depth(), 2);
        drop(l1);
        assert_eq!(r.depth(), 1);
        drop(l2);
        assert_eq!(r.depth(), 0);
    }

    #[test]
    fn lease_identifies_its_counter() {
        let a = ResizeInhibit::new();
        let b = ResizeInhibit::new();
        let la = a.lease();
        assert!(a.issued(&la));
        assert!(!b.issued(&la));
    }
}
