use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub(crate) enum PostError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    FlairNotFound(#[from] FlairNotFoundError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
}

impl PostError {
    pub(crate) fn exit_code(&self) -> i32 {
        match self {
            PostError::Platform(_) => 1,
            PostError::Config(_) => 2,
            PostError::Validation(_) => 3,
            PostError::FlairNotFound(_) => 4,
        }
    }
}

#[derive(Error, Debug)]
pub(crate) enum ConfigError {
    #[error("Please include a {role} file with {short} or {long}")]
    MissingFlag {
        role: &'static str,
        short: &'static str,
        long: &'static str,
    },
    #[error("cannot read {}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("invalid JSON in {}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("{} must contain a JSON object", .path.display())]
    NotAnObject { path: PathBuf },
    #[error("environment variable {0} is not set")]
    MissingEnv(&'static str),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub(crate) enum ValidationError {
    #[error("Error in {}: {key} is missing.", .file.display())]
    MissingKey { file: PathBuf, key: &'static str },
    #[error("Error in {}: {key} must be a string.", .file.display())]
    NotAString { file: PathBuf, key: &'static str },
    #[error("Error in {}: {name:?} is not a subreddit name.", .file.display())]
    BadSubreddit { file: PathBuf, name: String },
}

#[derive(Error, Debug, PartialEq, Eq)]
#[error(
    "Flair {requested} was not found in subreddit flairs. Subreddit flairs include: {}",
    .available.join(", ")
)]
pub(crate) struct FlairNotFoundError {
    pub requested: String,
    pub available: Vec<String>,
}

#[derive(Error, Debug)]
pub(crate) enum PlatformError {
    #[error("{context} failed")]
    Transport {
        context: &'static str,
        source: reqwest::Error,
    },
    #[error("Got response {status}: {body}")]
    Http {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("reddit rejected the request: {0}")]
    Api(String),
}
