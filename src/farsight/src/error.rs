//! Error taxonomy for remote reads.

/// Failure of the transport itself, as opposed to a single bad address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChannelError {
    #[error("target process is gone")]
    ProcessGone,

    #[error("transport failure: {0}")]
    Transport(String),
}

/// Errors produced while reading or decoding foreign memory
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("invalid address {address:#x}: {reason}")]
    Access { address: u64, reason: String },

    #[error("declared count {count} exceeds sanity ceiling {ceiling}")]
    Range { count: usize, ceiling: usize },

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error("inconsistent remote data: {0}")]
    Decode(String),

    #[error("layout table: {0}")]
    Layout(String),
}

impl ReadError {
    pub fn access(address: u64, reason: impl Into<String>) -> Self {
        ReadError::Access {
            address,
            reason: reason.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        ReadError::Decode(message.into())
    }

    /// True when the target process has disappeared and every registry
    /// built on it must be torn down.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ReadError::Channel(ChannelError::ProcessGone))
    }
}

/// Failure to bring up a session
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Read(#[from] ReadError),

    #[error("failed to spawn {name} worker: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = ReadError> = std::result::Result<T, E>;
