//! Persistent state layout (§6): agent records, session records, and an
//! append-only per-session turn list, behind the `Store` trait from
//! `voxbridge-core`.

pub mod memory;
#[cfg(feature = "scylla-backend")]
pub mod scylla_store;

pub use memory::InMemoryStore;
#[cfg(feature = "scylla-backend")]
pub use scylla_store::ScyllaStore;
