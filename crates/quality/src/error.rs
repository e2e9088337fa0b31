//! Errors surfaced by QC components.

use qcflow_core::StatusCode;
use qcflow_storage::StoreError;

/// Result type for QC components.
pub type Result<T> = std::result::Result<T, QcError>;

/// Errors that can occur while running a QC stage.
#[derive(Debug, thiserror::Error)]
pub enum QcError {
    /// Required input field missing or empty
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Store operation failed
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Notification channel failed
    #[error("Publish failure: {0}")]
    PublishFailure(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// Check name not configured
    #[error("Unknown check: {0}")]
    UnknownCheck(String),

    /// Run record could not be created
    #[error("Run could not be started (status {0})")]
    StartFailed(StatusCode),
}

impl QcError {
    /// Status code reported in place of this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            QcError::InvalidInput(_) | QcError::UnknownCheck(_) | QcError::Config(_) => {
                StatusCode::BAD_REQUEST
            }
            QcError::Store(e) => e.status_code(),
            QcError::PublishFailure(_) => StatusCode::BAD_GATEWAY,
            QcError::StartFailed(status) => *status,
        }
    }
}

/// Extract a required, non-blank text field.
pub(crate) fn required<'a>(value: Option<&'a String>, field: &str) -> Result<&'a str> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v.as_str()),
        _ => Err(QcError::InvalidInput(format!("{} is required", field))),
    }
}

/// Extract a required field of any type.
pub(crate) fn present<T: Copy>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| QcError::InvalidInput(format!("{} is required", field)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_blank() {
        let blank = "  ".to_string();
        assert!(required(None, "GroupID").is_err());
        assert!(required(Some(&blank), "GroupID").is_err());
        let ok = "G1".to_string();
        assert_eq!(required(Some(&ok), "GroupID").unwrap(), "G1");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(
            QcError::InvalidInput("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            QcError::PublishFailure("x".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            QcError::Store(StoreError::Unavailable("down".into())).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
