/// Core protocol errors.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("invalid DID format: {0}")]
    InvalidDid(String),

    #[error("invalid claim id: {0}")]
    InvalidClaimId(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("config file error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error("config encode error: {0}")]
    ConfigEncode(#[from] toml::ser::Error),
}
