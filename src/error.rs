use thiserror::Error;

/// Errors produced while configuring an agent or moving its value table in and out of storage
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("no snapshot stored under `{0}`")]
    NotFound(String),

    #[error("storage failure for `{id}`: {source}")]
    Io {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid storage identifier `{0}`")]
    InvalidIdentifier(String),

    #[error("failed to encode snapshot: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("unsupported snapshot version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },

    #[error("action {action} is outside the configured action set of size {num_actions}")]
    ActionOutOfRange { action: usize, num_actions: usize },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(id: &str, source: std::io::Error) -> Self {
        Self::Io {
            id: id.to_string(),
            source,
        }
    }
}
