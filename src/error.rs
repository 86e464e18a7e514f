use thiserror::Error;

use std::fmt;
use std::io::Error as IOError;

/// Errors surfaced to the caller. Per-candidate failures never end up here,
/// they are dropped inside the pipeline.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct LprError(LprErrorKind);

#[derive(Debug, Error)]
pub enum LprErrorKind {
    /// empty or corrupt image buffer
    #[error("invalid input image: {0}")]
    Input(String),
    #[error("failed to load {model} model: {reason}")]
    ModelLoad { model: ModelName, reason: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    IOError(#[from] IOError),
    #[error(transparent)]
    Toml(#[from] toml::de::Error),
    #[error(transparent)]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelName {
    Judge,
    Classifier,
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelName::Judge => f.write_str("plate judge"),
            ModelName::Classifier => f.write_str("character classifier"),
        }
    }
}

impl LprError {
    pub fn kind(&self) -> &LprErrorKind {
        &self.0
    }

    pub(crate) fn input(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::Input(msg.into()))
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Self(LprErrorKind::Config(msg.into()))
    }

    pub(crate) fn model(model: ModelName, reason: impl Into<String>) -> Self {
        Self(LprErrorKind::ModelLoad { model, reason: reason.into() })
    }

    pub fn is_input(&self) -> bool {
        matches!(self.0, LprErrorKind::Input(_))
    }

    pub fn is_model_load(&self) -> bool {
        matches!(self.0, LprErrorKind::ModelLoad { .. })
    }
}

impl<T> From<T> for LprError
where T: Into<LprErrorKind>
{
    fn from(e: T) -> Self {
        Self(e.into())
    }
}
