use thiserror::Error;

pub type OdmResult<T> = Result<T, OdmError>;

/// Errors surfaced by the mapper itself, plus pass-throughs from the
/// driver and from BSON (de)serialization.
#[derive(Debug, Error)]
pub enum OdmError {
    #[error("validation failed for field `{field}`: {message}")]
    Validation { field: String, message: String },

    #[error("no document found matching the filter")]
    NotFound,

    #[error("filter not set")]
    EmptyFilter,

    #[error("cannot delete an unsaved document")]
    Unsaved,

    #[error("environment variable `{0}` is not set")]
    MissingEnv(String),

    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    #[error(transparent)]
    Serialize(#[from] mongodb::bson::ser::Error),

    #[error(transparent)]
    Deserialize(#[from] mongodb::bson::de::Error),
}

impl OdmError {
    pub(crate) fn validation(field: &str, message: impl Into<String>) -> OdmError {
        OdmError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }
}
