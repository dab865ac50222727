//! Error types for the object pool

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PoolError {
    #[error("factory failed to create a pooled object: {0}")]
    Factory(#[from] Box<dyn std::error::Error + Send + Sync>),

    #[error("validation interval must be greater than zero")]
    ZeroValidationInterval,
}

impl PoolError {
    /// Wraps any error as a factory failure.
    pub fn factory<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        PoolError::Factory(Box::new(err))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
