//! Crate-level error type.
//!
//! Domain modules own their error enums; this type is what the pipeline
//! entry points, configuration and CLI surface to callers.

use crate::classification::ClassificationError;
use crate::logic::LogicError;
use crate::reasoner::ClassifierError;
use crate::store::StoreError;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Logic(#[from] LogicError),

    #[error(transparent)]
    Classifier(#[from] ClassifierError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Any(#[from] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
    pub fn wrap(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Any(Box::new(err))
    }

    pub fn msg(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Message(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_convert_transparently() {
        let err: Error = LogicError::AlreadyBuilt.into();
        assert_eq!(err.to_string(), LogicError::AlreadyBuilt.to_string());
        assert!(matches!(err, Error::Logic(LogicError::AlreadyBuilt)));
    }

    #[test]
    fn wrap_keeps_source_message() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk gone");
        let err = Error::wrap(io);
        assert_eq!(err.to_string(), "disk gone");
        assert!(matches!(Error::msg(std::fmt::Error), Error::Message(_)));
    }
}
