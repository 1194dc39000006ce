use pixel_strip::StripError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScalesError {
    /// Malformed topology or settings. Fatal at construction.
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("unknown effect: {0}")]
    UnknownEffect(String),
    #[error("unknown preset: {0}")]
    UnknownPreset(i64),
    #[error("invalid value for parameter '{parameter}': {reason}")]
    InvalidParameterValue { parameter: String, reason: String },
    /// Request is missing a required field or is otherwise malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("driver error: {0}")]
    Driver(#[from] StripError),
    /// The render task ended without reporting a result.
    #[error("render task failed: {0}")]
    RenderTask(String),
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScalesError>;

impl ScalesError {
    pub fn invalid(parameter: impl Into<String>, reason: impl Into<String>) -> Self {
        ScalesError::InvalidParameterValue {
            parameter: parameter.into(),
            reason: reason.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ScalesError::BadRequest(message.into())
    }

    /// Status code a request surface should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ScalesError::UnknownEffect(_) | ScalesError::UnknownPreset(_) => 404,
            ScalesError::InvalidParameterValue { .. }
            | ScalesError::BadRequest(_)
            | ScalesError::Json(_) => 400,
            _ => 500,
        }
    }
}
