use reqwest::StatusCode;
use std::io;
use std::path::PathBuf;

/// An error that can be returned as a result of
/// [`Fetcher::download`](crate::Fetcher::download) operation.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Missing {field}: credentials have to be provided before any request is made")]
    MissingCredential { field: &'static str },

    #[error("Could not make a successful request to the remote server")]
    Request(#[from] reqwest::Error),

    #[error("Server responded with a retryable status: {status}")]
    RetryableStatus { status: StatusCode },

    #[error("Server responded with an unexpected status: {status}")]
    UnexpectedStatus { status: StatusCode },

    #[error("Giving up after {attempts} attempt(s)")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: Box<FetchError>,
    },

    #[error("Server returned an empty payload")]
    EmptyPayload,

    #[error("Not enough disk space in {dir:?} for {required} bytes")]
    InsufficientSpace { dir: PathBuf, required: u64 },

    #[error("No free file name left for the snapshot {path:?}")]
    NameCollision { path: PathBuf },

    #[error("{context}")]
    FromIo { context: String, source: io::Error },
}

impl FetchError {
    /// Configuration errors are never softened: they won't go away on the next run.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, FetchError::MissingCredential { .. })
    }

    /// The error that caused the last attempt to fail, looking through [`FetchError::RetriesExhausted`].
    pub fn root_cause(&self) -> &FetchError {
        match self {
            FetchError::RetriesExhausted { source, .. } => source.root_cause(),
            err => err,
        }
    }
}

/// A trait for attaching context string to io-like errors.
///
/// `.map_err(|err| FetchError::FromIo { context: "...", source: err })` would
/// otherwise be repeated for each file operation.
pub(crate) trait ErrContext<T> {
    fn context(self, context: String) -> Result<T, FetchError>;
}

impl<T, E: Into<io::Error>> ErrContext<T> for Result<T, E> {
    fn context(self, context: String) -> Result<T, FetchError> {
        self.map_err(|err| FetchError::FromIo {
            context,
            source: err.into(),
        })
    }
}
