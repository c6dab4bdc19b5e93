use esim_engine::{adapters::PaymentGatewayError, adapters::ProviderError, notifications::NotificationError};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum VendorApiError {
    #[error("Could not initialize client: {0}")]
    Initialization(String),
    #[error("Could not reach the vendor API: {0}")]
    Network(String),
    #[error("The request timed out: {0}")]
    Timeout(String),
    #[error("Query failed. Error {status}. {message}")]
    QueryError { status: u16, message: String },
    #[error("Could not deserialize JSON: {0}")]
    JsonError(String),
    #[error("Authentication failed: {0}")]
    Authentication(String),
}

impl VendorApiError {
    /// Network failures, timeouts, rate limiting and server errors are worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) => true,
            Self::QueryError { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for VendorApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout(e.to_string())
        } else if e.is_decode() {
            Self::JsonError(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

impl From<VendorApiError> for ProviderError {
    fn from(e: VendorApiError) -> Self {
        match e {
            VendorApiError::JsonError(s) => ProviderError::InvalidData(s),
            e if e.is_transient() => ProviderError::Transient(e.to_string()),
            e => ProviderError::Terminal(e.to_string()),
        }
    }
}

impl From<VendorApiError> for PaymentGatewayError {
    fn from(e: VendorApiError) -> Self {
        match e {
            VendorApiError::QueryError { status, message } => PaymentGatewayError::Rejected { status, message },
            VendorApiError::JsonError(s) => PaymentGatewayError::InvalidResponse(s),
            e => PaymentGatewayError::Network(e.to_string()),
        }
    }
}

impl From<VendorApiError> for NotificationError {
    fn from(e: VendorApiError) -> Self {
        match e {
            VendorApiError::QueryError { status, message } => NotificationError::Rejected { status, message },
            e => NotificationError::Transport(e.to_string()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn provider_error_mapping() {
        let e = ProviderError::from(VendorApiError::QueryError { status: 503, message: "busy".into() });
        assert!(e.is_transient());
        let e = ProviderError::from(VendorApiError::QueryError { status: 429, message: "slow down".into() });
        assert!(e.is_transient());
        let e = ProviderError::from(VendorApiError::QueryError { status: 401, message: "bad key".into() });
        assert!(matches!(e, ProviderError::Terminal(_)));
        let e = ProviderError::from(VendorApiError::JsonError("eof".into()));
        assert!(matches!(e, ProviderError::InvalidData(_)));
        assert!(ProviderError::from(VendorApiError::Network("reset".into())).is_transient());
    }
}
