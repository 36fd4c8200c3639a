use crate::error::{AvError, Result};
use serde::ser::{Serialize, SerializeStruct, Serializer};

/// Uniform result of an orchestrator command
///
/// Serializes as `{"ok":true,"result":...}` or
/// `{"ok":false,"code":...,"message":"..."}`.
#[derive(Debug)]
pub enum Outcome<T> {
    Success(T),
    Failure(AvError),
}

impl<T> Outcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// The failure, if any
    pub fn error(&self) -> Option<&AvError> {
        match self {
            Self::Success(_) => None,
            Self::Failure(e) => Some(e),
        }
    }

    pub fn into_result(self) -> Result<T> {
        match self {
            Self::Success(value) => Ok(value),
            Self::Failure(e) => Err(e),
        }
    }
}

impl<T> From<Result<T>> for Outcome<T> {
    fn from(result: Result<T>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => Self::Failure(e),
        }
    }
}

impl<T: Serialize> Serialize for Outcome<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Success(value) => {
                let mut s = serializer.serialize_struct("Outcome", 2)?;
                s.serialize_field("ok", &true)?;
                s.serialize_field("result", value)?;
                s.end()
            }
            Self::Failure(e) => {
                let mut s = serializer.serialize_struct("Outcome", 3)?;
                s.serialize_field("ok", &false)?;
                s.serialize_field("code", &e.code())?;
                s.serialize_field("message", &e.to_string())?;
                s.end()
            }
        }
    }
}
