use actix_web::{
    error::ResponseError,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use esim_engine::{
    adapters::PaymentGatewayError,
    api::PaymentFlowError,
    catalog::CatalogSyncError,
    traits::StorageError,
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Could not initialize server. {0}")]
    InitializeError(String),
    #[error("An error occurred on the backend of the server. {0}")]
    BackendError(String),
    #[error("Could not read request body: {0}")]
    InvalidRequestBody(String),
    #[error("An I/O error happened in the server. {0}")]
    IOError(#[from] std::io::Error),
    #[error("Invalid server configuration. {0}")]
    ConfigurationError(String),
    #[error("UnspecifiedError. {0}")]
    Unspecified(String),
    #[error("Missing or invalid admin token")]
    Unauthorized,
    #[error("The webhook signature is invalid")]
    InvalidWebhookSignature,
    #[error("The data was not found. {0}")]
    NoRecordFound(String),
    #[error("The payment gateway rejected the request. {0}")]
    PaymentGatewayError(String),
    #[error("A catalog sync is already in progress. Try again when it has finished.")]
    SyncInProgress,
}

impl ResponseError for ServerError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequestBody(_) => StatusCode::BAD_REQUEST,
            Self::InvalidWebhookSignature => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NoRecordFound(_) => StatusCode::NOT_FOUND,
            Self::PaymentGatewayError(_) => StatusCode::BAD_GATEWAY,
            Self::SyncInProgress => StatusCode::CONFLICT,
            Self::InitializeError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::BackendError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::IOError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ConfigurationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Unspecified(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::json())
            .body(serde_json::json!({ "error": self.to_string() }).to_string())
    }
}

impl From<StorageError> for ServerError {
    fn from(e: StorageError) -> Self {
        Self::BackendError(format!("Database error: {e}"))
    }
}

impl From<CatalogSyncError> for ServerError {
    fn from(e: CatalogSyncError) -> Self {
        match e {
            CatalogSyncError::AlreadyRunning => Self::SyncInProgress,
            CatalogSyncError::Storage(e) => e.into(),
        }
    }
}

impl From<PaymentFlowError> for ServerError {
    fn from(e: PaymentFlowError) -> Self {
        match e {
            PaymentFlowError::InvalidSignature => Self::InvalidWebhookSignature,
            PaymentFlowError::Gateway(PaymentGatewayError::Registry(e)) => Self::NoRecordFound(e.to_string()),
            PaymentFlowError::Gateway(e) => Self::PaymentGatewayError(e.to_string()),
            PaymentFlowError::Storage(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod test {
    use esim_engine::adapters::RegistryError;

    use super::*;

    #[test]
    fn payment_flow_errors() {
        assert_eq!(ServerError::from(PaymentFlowError::InvalidSignature).status_code(), StatusCode::BAD_REQUEST);
        let unknown = PaymentFlowError::Gateway(RegistryError::NotRegistered("paypal".into()).into());
        assert_eq!(ServerError::from(unknown).status_code(), StatusCode::NOT_FOUND);
        let storage = PaymentFlowError::Storage(StorageError::DatabaseError("locked".into()));
        assert_eq!(ServerError::from(storage).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn catalog_sync_errors() {
        assert_eq!(ServerError::from(CatalogSyncError::AlreadyRunning).status_code(), StatusCode::CONFLICT);
        let storage = CatalogSyncError::Storage(StorageError::DatabaseError("locked".into()));
        assert_eq!(ServerError::from(storage).status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
