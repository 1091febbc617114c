//! Signer trust: the in-memory key store, signed keyset distribution, and the
//! on-disk snapshot format.

pub mod keyset;
pub mod persistence;
pub mod store;

pub use keyset::{Keyset, KeysetKey, KeysetMerge};
pub use persistence::{MigrationResult, TrustStoreEntry, TrustStorePersistence, TrustStoreSnapshot};
pub use store::{TrustStore, TrustedKey};
