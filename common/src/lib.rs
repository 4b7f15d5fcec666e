use aws_sdk_s3::primitives::ByteStreamError;
use aws_smithy_runtime_api::client::result::CreateUnhandledError;
use aws_smithy_runtime_api::client::result::SdkError;
use aws_smithy_runtime_api::http::Response;
use thiserror::Error;
use url::ParseError;

pub mod config;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Cannot connect to warehouse: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("Step '{step}' failed: {source}")]
    Statement {
        step: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Load error: {0}")]
    Load(String),

    #[error("AWS SDK error: {0}")]
    AwsSdk(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("ByteStream error: {0}")]
    ByteStream(#[from] ByteStreamError),

    #[error("Invalid Uri: {0}")]
    InvalidUri(String),

    #[error("Plan order violation: {0}")]
    PlanOrder(String),
}

impl Error {
    /// Wraps a driver error with the name of the plan step that raised it.
    pub fn statement(step: impl Into<String>, source: sqlx::Error) -> Self {
        Error::Statement {
            step: step.into(),
            source,
        }
    }
}

/// Transport, timeout and other non-service SDK failures.
impl<E: std::fmt::Debug + CreateUnhandledError> From<SdkError<E, Response>> for Error {
    fn from(err: SdkError<E, Response>) -> Self {
        Error::AwsSdk(format!("{:?}", err))
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidUri(format!("URL parse error: {}", err))
    }
}
