use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum PianoPIRError {
    // Configuration
    #[error("Database must hold at least one word.")]
    InvalidDatabaseSize,
    #[error("Number of primary hints and backup hints per chunk must be non-zero.")]
    InvalidHintCapacity,
    #[error("Expected {expected} database chunks, found {found}.")]
    UnexpectedChunkCount { expected: u64, found: u64 },
    #[error("Database chunk {chunk_id} must have {expected} words, found {found}.")]
    InvalidChunkLength { chunk_id: u64, expected: u64, found: u64 },

    // Query selection
    #[error("Index {index} is out of range for a database of {db_size} words.")]
    IndexOutOfRange { index: u64, db_size: u64 },
    #[error("Index {0} was already retrieved, it is served from local cache.")]
    IndexAlreadyCached(u64),
    #[error("Every database index is already present in local cache.")]
    AllIndicesCached,
    #[error("No live primary hint covers index {index}, hint budget is undersized.")]
    HintMiss { index: u64 },
    #[error("Pending query found in internal client state.")]
    PendingQueryExists,
    #[error("No matching pending query in internal client state.")]
    PendingQueryDoesNotExist,

    // Hint refresh
    #[error("Backup hints of chunk {chunk_id} are exhausted, after retrieving index {index}. Hints must be rebuilt.")]
    BackupHintsExhausted { chunk_id: u64, index: u64 },

    // Protocol contract
    #[error("Punctured offset vector must have {expected} entries, found {found}.")]
    MalformedOffsetVector { expected: u64, found: u64 },
    #[error("Offset {offset} at position {position} is not within chunk of size {chunk_size}.")]
    OffsetOutOfRange { position: u64, offset: u64, chunk_size: u64 },
    #[error("Response vector must have {expected} parities, found {found}.")]
    InvalidResponseVector { expected: u64, found: u64 },

    // Wire
    #[error("Deserialization failed with: {0}")]
    FailedToDeserialize(String),
}

impl PianoPIRError {
    /// Hint miss and backup exhaustion happen with small probability even when everything works as intended.
    /// Both are cured by rebuilding hints, see [`crate::client::Client::rebuild_hints`].
    pub fn is_recoverable_by_rebuilding_hints(&self) -> bool {
        matches!(self, Self::HintMiss { .. } | Self::BackupHintsExhausted { .. })
    }
}
