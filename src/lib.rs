//! chained-index: an intrusive, chained hash table whose nodes are links
//! embedded in records the caller keeps in a generational arena.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: let arbitrary records sit in one or more hash indices without
//!   the index allocating anything per record.
//! - Layers:
//!   - `Link<K>`/`Bucket<K>`: the intrusive sibling links embedded in each
//!     record, and the bucket slots holding chain heads.
//!   - `Capability<K>`: caller-implemented trait that picks the link a
//!     table uses inside a record and supplies match/hash. The capability
//!     value is the per-table user context.
//!   - `ChainedTable<'s, K, C>`: bucket array, live count, adaptive resize
//!     state; add/remove/find.
//!   - Resize engine: shrink after removals, grow after sampled expensive
//!     lookups, explicit `resize`.
//!   - `Cursor<K>`: iteration protocol holding a resize-inhibit lease.
//!
//! Constraints
//! - Single-threaded: `!Send`/`!Sync` (the inhibit counter is an `Rc`).
//! - No per-record allocation: a table owns only its bucket array, and a
//!   static table borrows even that from the caller.
//! - Nodes are arena keys, not addresses. A stale key reached through a
//!   chain panics instead of reading freed memory.
//! - Duplicate keys are accepted; `find` returns the newest match.
//!
//! Multi-index pattern
//! - A record embeds one `Link` per index. Two capability types that select
//!   two different link fields of the same record type give two independent
//!   tables over the same arena.
//!
//! Hash contract
//! - Callers pass the hash to `add`/`remove`/`find` so the hot paths never
//!   call `Capability::hash`. The capability hash is consulted only when a
//!   dynamic table rehashes (and by `remove_node`), so both must agree.
//!
//! Resize policy
//! - Growth is driven by lookup cost, not insertion volume: a burst of
//!   inserts never rehashes until lookups actually get slow. Shrinking is
//!   checked after every removal. Constants live in `ResizePolicy`.
//! - Static tables never resize.
//!
//! Iteration and mutation
//! - A cursor does not borrow the table. While it is open the caller may
//!   remove or re-add the node it was just handed; resizes are held off
//!   until every cursor ends or is dropped.
//!
//! Failure model
//! - Allocation failure and bad configuration are `TableError`s.
//! - Precondition violations (double linking, foreign cursors, rehash or
//!   finalize with cursors open) panic.
//!
//! Notes and non-goals
//! - No hashing algorithm, no thread safety, no serialization, no stable
//!   iteration order across resizes.

mod capability;
mod error;
mod iter;
mod lease;
mod node;
mod policy;
mod resize;
mod table;
mod table_proptest;

// Public surface
pub use capability::{Arena, Capability};
pub use error::{Result, TableError};
pub use iter::{Cursor, Iter};
pub use node::{Bucket, Link};
pub use policy::{ResizePolicy, Watermarks};
pub use table::{ChainedTable, Mode};
