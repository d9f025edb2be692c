use std::fmt::{Display, Formatter};

use thiserror::Error;

use crate::error::ConvertError;

pub type StatusResult<T> = Result<T, StatusError>;

/// Status codes of the public network entry points.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum StatusCode {
    GeneralError,
    NotImplemented,
    NotFound,
    OutOfBounds,
}

/// The error half of a status: a code and a human readable message.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{code}: {message}")]
pub struct StatusError {
    pub code: StatusCode,
    pub message: String,
}

impl StatusError {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        StatusError {
            code,
            message: message.into(),
        }
    }

    pub fn general(message: impl Into<String>) -> Self {
        StatusError::new(StatusCode::GeneralError, message)
    }
}

impl From<ConvertError> for StatusError {
    fn from(error: ConvertError) -> Self {
        let code = match &error {
            ConvertError::NotImplemented(_) => StatusCode::NotImplemented,
            ConvertError::LayerNotFound(_) | ConvertError::DataNotFound(_) => StatusCode::NotFound,
            ConvertError::OutputOutOfBounds { .. } => StatusCode::OutOfBounds,
            _ => StatusCode::GeneralError,
        };
        StatusError::new(code, error.to_string())
    }
}

impl StatusCode {
    pub fn name(self) -> &'static str {
        match self {
            StatusCode::GeneralError => "GENERAL_ERROR",
            StatusCode::NotImplemented => "NOT_IMPLEMENTED",
            StatusCode::NotFound => "NOT_FOUND",
            StatusCode::OutOfBounds => "OUT_OF_BOUNDS",
        }
    }
}

impl Display for StatusCode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod test {
    use crate::error::ConvertError;
    use crate::status::{StatusCode, StatusError};

    #[test]
    fn convert_errors_mapped() {
        let code = |e: ConvertError| StatusError::from(e).code;
        assert_eq!(code(ConvertError::NotImplemented("Reshape".to_owned())), StatusCode::NotImplemented);
        assert_eq!(code(ConvertError::LayerNotFound("a".to_owned())), StatusCode::NotFound);
        assert_eq!(code(ConvertError::DataNotFound("a".to_owned())), StatusCode::NotFound);
        let out_of_bounds = ConvertError::OutputOutOfBounds {
            layer: "a".to_owned(),
            index: 2,
            count: 1,
        };
        assert_eq!(code(out_of_bounds), StatusCode::OutOfBounds);
        assert_eq!(code(ConvertError::DuplicateLayer("a".to_owned())), StatusCode::GeneralError);
    }

    #[test]
    fn message_carries_code_name() {
        let e = StatusError::from(ConvertError::DataNotFound("x".to_owned()));
        assert_eq!(e.to_string(), "NOT_FOUND: Cannot find data with name: x");
    }
}
