use thiserror::Error;

/// Failure taxonomy for the sync engine.
///
/// `Config` and `Schema` are fatal to the call that raised them. `Transport`
/// is fatal to a single remote call but is caught at the record boundary
/// during batch sync. `NotFound` drives delete-detection instead of being
/// treated as a failure. `Translation` degrades the affected sub-result to
/// empty rather than aborting the record.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("remote field schema could not be classified: {0}")]
    Schema(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("remote record not found: {0}")]
    NotFound(String),

    #[error("rich-text or attachment translation failed: {0}")]
    Translation(String),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.status().map(|s| s.as_u16()) == Some(404) {
            Error::NotFound(err.to_string())
        } else {
            Error::Transport(err.to_string())
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
