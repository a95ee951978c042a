use thiserror::Error;

/// Errors returned by the Kroger API client.
#[derive(Debug, Error)]
pub enum KrogerError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// A retryable HTTP status (429 or 5xx) survived the whole retry budget.
    #[error("status {status} persisted after retries: {url}")]
    RetryableStatus { status: u16, url: String },

    /// The token endpoint rejected the credentials (a 4xx other than 429).
    /// Fatal for the run: retrying cannot fix bad credentials.
    #[error("credential exchange rejected with status {status}: {body}")]
    CredentialRejected { status: u16, body: String },

    /// A base URL override could not be parsed.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },
}
