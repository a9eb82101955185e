use thiserror::Error;

/// Errors that can occur while ingesting a document or talking to MoySklad.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ProvodkaError {
    /// Upload rejected before any work was done (empty buffer, wrong
    /// extension, size over the configured limit).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The uploaded byte buffer is not a readable ZIP archive.
    #[error("corrupt archive: {0}")]
    CorruptArchive(String),

    /// A required XML file or field could not be located after trying all
    /// known fallback paths, or a numeric field did not parse.
    #[error("parsing error: {0}")]
    Parsing(String),

    /// MoySklad returned a non-2xx response or the request failed on the
    /// network level.
    #[error("MoySklad API error: {0}")]
    RemoteApi(String),

    /// MoySklad answered HTTP 429. No automatic retry is performed; the
    /// caller decides.
    #[error("MoySklad rate limit hit: {0}")]
    RateLimited(String),

    /// Local filesystem failure during extraction or temp file handling.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Machine-readable error class carried by a failed [`ProcessingResult`].
///
/// [`ProcessingResult`]: crate::core::ProcessingResult
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    Validation,
    CorruptArchive,
    Parsing,
    RemoteApi,
    RateLimited,
    Io,
}

impl ProvodkaError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::CorruptArchive(_) => ErrorKind::CorruptArchive,
            Self::Parsing(_) => ErrorKind::Parsing,
            Self::RemoteApi(_) => ErrorKind::RemoteApi,
            Self::RateLimited(_) => ErrorKind::RateLimited,
            Self::Io(_) => ErrorKind::Io,
        }
    }
}

impl From<zip::result::ZipError> for ProvodkaError {
    fn from(e: zip::result::ZipError) -> Self {
        match e {
            zip::result::ZipError::Io(io) => Self::Io(io),
            other => Self::CorruptArchive(other.to_string()),
        }
    }
}
