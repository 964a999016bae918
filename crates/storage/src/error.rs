use std::path::PathBuf;

use shared::domain::SubjectId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The id is in neither live queue; the store was left untouched.
    #[error("subject {0} is not live")]
    NotLive(SubjectId),
    #[error("subject id counter is exhausted")]
    IdsExhausted,
    #[error("failed to {action} '{}'", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode store snapshot")]
    Encode(#[source] serde_json::Error),
    #[error("store file '{}' is not a valid snapshot", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }
}
