use shared::PaymentStatus;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must be greater than zero")]
    InvalidAmount,
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("forbidden: {0}")]
    Forbidden(&'static str),
    #[error("invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },
    #[error(transparent)]
    Store(StoreError),
}

impl PaymentError {
    /// Routine rejections caused by the request rather than by the service.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, PaymentError::Store(_))
    }
}

impl From<StoreError> for PaymentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Missing(entity) => PaymentError::NotFound(entity),
            other => PaymentError::Store(other),
        }
    }
}
