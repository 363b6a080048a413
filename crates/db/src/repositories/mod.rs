use thiserror::Error;

use challan_core::errors::StoreError;

pub mod challan;
pub mod memory;

pub use challan::SqlChallanStore;
pub use memory::InMemoryChallanStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("serial number `{0}` is already registered")]
    DuplicateSerialNumber(String),
    #[error("quantity must be a positive integer, got {0}")]
    InvalidQuantity(i64),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(error) => StoreError::Unavailable(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
            RepositoryError::DuplicateSerialNumber(serial) => {
                StoreError::DuplicateSerialNumber(serial)
            }
            RepositoryError::InvalidQuantity(quantity) => StoreError::InvalidQuantity(quantity),
        }
    }
}
