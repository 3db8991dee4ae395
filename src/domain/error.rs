//! Domain error types for the analytics core.
//!
//! Every public entry point returns `Result<T, AnalyticsError>`. Callers that
//! need to show the failure to a user convert it into a [`Failure`], which
//! carries a machine-readable kind and one message per supported locale.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors surfaced by the analytics core.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    #[error("Insufficient data for {operation}: need at least {required}, got {actual}")]
    InsufficientData {
        operation: String,
        required: usize,
        actual: usize,
    },

    #[error("Recommendation not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Store operation failed: {0}")]
    Store(#[from] anyhow::Error),
}

impl AnalyticsError {
    pub fn insufficient(operation: impl Into<String>, required: usize, actual: usize) -> Self {
        Self::InsufficientData {
            operation: operation.into(),
            required,
            actual,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InsufficientData { .. } => ErrorKind::InsufficientData,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Store(_) => ErrorKind::Store,
        }
    }

    /// User-facing text in English and Arabic.
    pub fn localized(&self) -> LocalizedMessage {
        match self {
            Self::InsufficientData {
                operation,
                required,
                actual,
            } => LocalizedMessage {
                en: format!(
                    "Not enough data to run {operation} (need {required}, have {actual})."
                ),
                ar: format!(
                    "لا توجد بيانات كافية لإجراء {operation} (المطلوب {required}، المتوفر {actual})."
                ),
            },
            Self::NotFound(id) => LocalizedMessage {
                en: format!("The recommendation {id} could not be found."),
                ar: format!("تعذر العثور على التوصية {id}."),
            },
            Self::Validation(detail) => LocalizedMessage {
                en: format!("The provided data is invalid: {detail}"),
                ar: format!("البيانات المدخلة غير صالحة: {detail}"),
            },
            Self::Store(_) => LocalizedMessage {
                en: "The data store is unavailable. Please try again later.".to_string(),
                ar: "مخزن البيانات غير متاح حالياً. يرجى المحاولة لاحقاً.".to_string(),
            },
        }
    }
}

/// Machine-readable error category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InsufficientData,
    NotFound,
    Validation,
    Store,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientData => write!(f, "insufficient_data"),
            Self::NotFound => write!(f, "not_found"),
            Self::Validation => write!(f, "validation"),
            Self::Store => write!(f, "store"),
        }
    }
}

/// A message rendered once per supported locale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalizedMessage {
    pub en: String,
    pub ar: String,
}

/// Structured failure handed back to the application layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: LocalizedMessage,
}

impl From<&AnalyticsError> for Failure {
    fn from(err: &AnalyticsError) -> Self {
        Self {
            kind: err.kind(),
            message: err.localized(),
        }
    }
}

impl From<AnalyticsError> for Failure {
    fn from(err: AnalyticsError) -> Self {
        Failure::from(&err)
    }
}

pub type AnalyticsResult<T> = Result<T, AnalyticsError>;
