#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Resource unavailable")]
    ResourceUnavailable,
    #[error("Service not found")]
    ServiceNotFound,
    #[error("Channel not found")]
    ChannelNotFound,
    #[error("Middleware error: {0}")]
    Middleware(String),
    #[error("std::io error: {0}")]
    IoError(std::io::Error),
    #[error("JSON error: {0}")]
    JsonError(serde_json::Error),
    #[error("YAML error: {0}")]
    YamlError(serde_yaml::Error),
    #[error(transparent)]
    AnyhowError(#[from] anyhow::Error),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::JsonError(err)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        Self::YamlError(err)
    }
}
