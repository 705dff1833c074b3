//! Cache Store — persists a `RepoSnapshot` per repo; detects
//! corruption; falls back to rebuild.

pub mod persistence;
pub mod snapshot;

pub use persistence::CacheStore;
pub use snapshot::RepoSnapshot;
