//! Snapshot-store error types.
//!
//! Defined centrally so the session can classify failures without string
//! matching: stale-version rejections are benign skips, everything else
//! arms the retry-on-next-tick path.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PersistenceError {
    /// The snapshot could not be turned into its wire form.
    #[error("snapshot serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The backing store failed to read or write.
    #[error("snapshot store io error: {0}")]
    Io(#[from] std::io::Error),

    /// A newer snapshot has already been persisted; last writer wins.
    #[error("stale snapshot version {attempted} (latest persisted {latest})")]
    StaleVersion { attempted: u64, latest: u64 },

    /// The backing store cannot be reached at all.
    #[error("snapshot store unavailable: {0}")]
    Unavailable(String),
}

impl PersistenceError {
    /// Stale-version rejections mean a newer snapshot already won; they must
    /// not trigger the retry path.
    pub fn is_stale(&self) -> bool {
        matches!(self, PersistenceError::StaleVersion { .. })
    }
}
