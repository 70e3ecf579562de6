use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whatever a transport fails with. Passed to the caller untouched.
pub type TransportError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("couldn't read config file: {0}")]
    ConfigRead(#[from] std::io::Error),

    #[error("couldn't parse config file: {0}")]
    ConfigFormat(#[from] toml::de::Error),

    #[error(transparent)]
    Capture(#[from] CaptureError),

    #[error("remote execution failed: {0}")]
    Remote(#[source] TransportError),

    #[error("couldn't decode action result: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Building a captured function failed. Always reported by the call that
/// tried to build the dataset.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("required binding `{0}` was not captured")]
    MissingBinding(String),

    #[error("value bound to `{name}` can't be captured: {source}")]
    Uncapturable {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("dataset element can't be captured: {0}")]
    Element(#[source] serde_json::Error),
}

/// Raised by shipped functions while an executor runs them.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("binding `{0}` is missing from the function environment")]
    Unbound(String),

    #[error("binding `{name}` has an unexpected shape: {source}")]
    BadBinding {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("element doesn't match the shipped function's types: {0}")]
    Element(#[source] serde_json::Error),

    #[error("element assigned to partition {index}, but there are only {partitions}")]
    OutOfRange { index: usize, partitions: usize },

    #[error("malformed descriptor: {0}")]
    Malformed(String),
}

pub(crate) fn require_positive(what: &str, n: usize) -> Result<usize> {
    if n == 0 {
        return Err(Error::Config(format!("{what} must be positive")));
    }
    Ok(n)
}
