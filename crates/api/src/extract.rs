//! Request body parsing into validated commands.
//!
//! Handlers never see raw request bodies. A body type implements
//! [`Validate`], and the [`ValidatedJson`] extractor deserializes it and
//! converts it into its validated command, rejecting with a 400 before the
//! handler runs.

use axum::{
    Json,
    extract::{
        FromRequest, Request,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
};
use serde::de::DeserializeOwned;
use thiserror::Error;

use shopkeep_core::QuantityError;

use crate::error::AppError;

/// Reasons a request body is rejected.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The body is not JSON of the expected shape.
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    /// A query string or path segment could not be parsed.
    #[error("malformed request parameters: {0}")]
    MalformedParams(String),

    /// A required field is absent or null.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// An id is not a positive integer.
    #[error("{field} must be a positive integer (got {got})")]
    InvalidId { field: &'static str, got: i64 },

    /// A quantity is out of range.
    #[error("{0}")]
    InvalidQuantity(#[from] QuantityError),

    /// A text field is empty or whitespace.
    #[error("{0} cannot be empty")]
    Blank(&'static str),

    /// A text field is longer than allowed.
    #[error("{field} must be at most {max} characters (got {got})")]
    TooLong {
        field: &'static str,
        max: usize,
        got: usize,
    },
}

impl From<JsonRejection> for ValidationError {
    fn from(rejection: JsonRejection) -> Self {
        Self::MalformedBody(rejection.body_text())
    }
}

impl From<QueryRejection> for ValidationError {
    fn from(rejection: QueryRejection) -> Self {
        Self::MalformedParams(rejection.body_text())
    }
}

impl From<PathRejection> for ValidationError {
    fn from(rejection: PathRejection) -> Self {
        Self::MalformedParams(rejection.body_text())
    }
}

/// A request body that converts into a validated command.
pub trait Validate {
    /// The validated command.
    type Output;

    /// Check every field and build the command.
    ///
    /// # Errors
    ///
    /// Returns the first field that fails validation.
    fn validate(self) -> Result<Self::Output, ValidationError>;
}

/// JSON body extractor yielding the validated command of `T`.
pub struct ValidatedJson<T: Validate>(pub T::Output);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: Validate + DeserializeOwned,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<T>::from_request(req, state)
            .await
            .map_err(ValidationError::from)?;
        Ok(Self(body.validate()?))
    }
}

/// Require a positive id field.
pub(crate) fn positive_id(field: &'static str, value: Option<i64>) -> Result<i64, ValidationError> {
    match value {
        None => Err(ValidationError::MissingField(field)),
        Some(id) if id < 1 => Err(ValidationError::InvalidId { field, got: id }),
        Some(id) => Ok(id),
    }
}
