#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The batch owning the request was superseded.
    #[error("request aborted")]
    Aborted,
    #[error("request to {url} failed")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("malformed feature info response: {0}")]
    Parse(String),
    #[error("invalid service url {url}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

impl FetchError {
    pub fn is_aborted(&self) -> bool {
        matches!(self, FetchError::Aborted)
    }
}
