/// Registry errors, as seen after the retry policy has run.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("not found in registry: {0}")]
    NotFound(String),

    #[error("registry conflict: {0} is already stored with different contents")]
    Conflict(String),

    /// Permanent 4xx other than 404 and 409.
    #[error("registry rejected the request (HTTP {status}): {reason}")]
    Rejected { status: u16, reason: String },

    /// Transient failures exhausted the attempt budget, or the response was malformed.
    #[error("registry unavailable after {attempts} attempt(s): {reason}")]
    Unavailable { attempts: u32, reason: String },

    #[error("registry client configuration error: {0}")]
    Config(String),
}
