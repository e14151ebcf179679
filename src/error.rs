use thiserror::Error;

/// Failure reported by a [`ListStore`](crate::store::ListStore) backend.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Store is closed")]
    Closed,

    #[error("Backend error: {0}")]
    Backend(String),
}

#[derive(Error, Debug)]
pub enum QuedError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The popped record could not be decoded. It has already left the list,
    /// so `raw` is the only remaining copy.
    #[error("Deserialization error: {source} ({} bytes)", .raw.len())]
    Deserialization {
        #[source]
        source: serde_json::Error,
        raw: Vec<u8>,
    },

    #[error("Queue is closed")]
    Closed,
}

impl QuedError {
    /// Whether repeating the same call may succeed without any change on the
    /// caller's side.
    pub fn is_retryable(&self) -> bool {
        matches!(self, QuedError::Store(StoreError::Connection(_)))
    }

    /// Raw bytes of a message that failed to decode, if this is such an error.
    pub fn raw_message(&self) -> Option<&[u8]> {
        match self {
            QuedError::Deserialization { raw, .. } => Some(raw),
            _ => None,
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            StoreError::Connection(err.to_string())
        } else {
            StoreError::Backend(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, QuedError>;
