use crate::services::store::StoreError;
use service_core::error::AppError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BillError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error("Failed to generate a unique invoice number")]
    NumberingExhausted,
}

impl BillError {
    pub fn invalid(message: impl Into<String>) -> Self {
        BillError::InvalidInput(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        BillError::NotFound(message.into())
    }

    /// Label used on the `bill_errors_total` counter.
    pub fn kind(&self) -> &'static str {
        match self {
            BillError::InvalidInput(_) => "invalid_input",
            BillError::NotFound(_) => "not_found",
            BillError::Storage(_) => "storage",
            BillError::NumberingExhausted => "numbering_exhausted",
        }
    }
}

impl From<BillError> for AppError {
    fn from(err: BillError) -> Self {
        match err {
            BillError::InvalidInput(msg) => AppError::BadRequest(anyhow::anyhow!(msg)),
            BillError::NotFound(msg) => AppError::NotFound(anyhow::anyhow!(msg)),
            BillError::Storage(e) => e.into(),
            BillError::NumberingExhausted => {
                AppError::DatabaseError(anyhow::anyhow!(BillError::NumberingExhausted.to_string()))
            }
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::DatabaseError(anyhow::Error::new(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn maps_onto_http_errors() {
        let cases = [
            (BillError::invalid("Customer is required"), StatusCode::BAD_REQUEST),
            (BillError::not_found("Customer not found"), StatusCode::NOT_FOUND),
            (BillError::NumberingExhausted, StatusCode::INTERNAL_SERVER_ERROR),
            (
                BillError::Storage(StoreError::Backend("disk full".into())),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status_code(), status);
        }
    }

    #[test]
    fn storage_message_passes_through_verbatim() {
        let err = BillError::Storage(StoreError::ForeignKeyViolation {
            constraint: Some("bill_items_service_id_fkey".into()),
            message: "violates foreign key constraint \"bill_items_service_id_fkey\"".into(),
        });
        assert_eq!(
            AppError::from(err).message(),
            "violates foreign key constraint \"bill_items_service_id_fkey\""
        );
    }

    #[test]
    fn exhaustion_message_is_stable() {
        assert_eq!(
            AppError::from(BillError::NumberingExhausted).message(),
            "Failed to generate a unique invoice number"
        );
    }
}
