use reqwest::StatusCode;
use thiserror::Error;

/// Failures of the OAuth flow. The user has to log in (again).
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Not authenticated, authorization flow has to be started")]
    NotAuthenticated,

    #[error("OAuth state mismatch, the callback was not issued by this server")]
    StateMismatch,

    #[error("Authorization denied by provider: {0}")]
    Denied(String),

    #[error("Token exchange rejected by provider ({status}): {body}")]
    ExchangeRejected { status: StatusCode, body: String },

    #[error("Token refresh rejected by provider ({status}): {body}")]
    RefreshRejected { status: StatusCode, body: String },

    #[error("Token endpoint returned an unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Token request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("OAuth client error: {0}")]
    Client(#[from] rspotify::ClientError),

    #[error("Token cache error: {0}")]
    Cache(String),
}

/// Failures while talking to the streaming API. The user may retry.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("API request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("API request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Malformed API response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Template file not found: {name}")]
pub struct TemplateNotFoundError {
    pub name: String,
}

/// A single malformed record. Recovered locally, never shown to the user.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("record is null")]
    Null,

    #[error("invalid record shape: {0}")]
    Shape(String),
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("Authentication error: {0}")]
    Auth(#[from] AuthError),

    #[error("Spotify API error: {0}")]
    Api(#[from] ApiError),

    #[error(transparent)]
    Template(#[from] TemplateNotFoundError),

    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<std::env::VarError> for Error {
    fn from(err: std::env::VarError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

impl From<url::ParseError> for Error {
    fn from(err: url::ParseError) -> Self {
        Error::ConfigurationError(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
