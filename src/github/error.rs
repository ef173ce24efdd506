use thiserror::Error;

#[derive(Debug, Error)]
pub enum GithubError {
    #[error("JWT error: {0}")]
    Jwt(String),

    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    #[error("request to GitHub timed out")]
    Timeout,

    /// Non-success status from GitHub. The body is kept verbatim for diagnosis.
    #[error("{context}: {status} {body}")]
    Upstream {
        context: &'static str,
        status: u16,
        body: String,
    },

    #[error("invalid response from GitHub: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for GithubError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            GithubError::Timeout
        } else {
            GithubError::Network(err)
        }
    }
}
