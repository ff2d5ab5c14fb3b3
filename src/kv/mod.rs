//! The sharded, encrypted key-value store (spec.md §4.3): composite keys (`key`), the row/key byte
//! encoding they and values share (`sequence`), and the `redb`-backed store itself (`store`).

pub mod key;
pub mod sequence;
pub mod store;

pub use key::CompositeKey;
pub use store::{Store, WriteBatch, DEFAULT_SHARD};
