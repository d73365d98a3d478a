use thiserror::Error;

use crate::net::core::NetError;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("malformed net: {0}")]
    MalformedNet(#[from] NetError),
    #[error("no firing-time distribution supplied for transition `{0}`")]
    MissingDistribution(String),
    #[error("distribution for `{transition}` produced invalid delay {delay}")]
    InvalidDelay { transition: String, delay: f64 },
    #[error("invariant violation: {0}")]
    InvariantViolation(String),
}

impl SimError {
    pub(crate) fn invariant(message: impl Into<String>) -> Self {
        SimError::InvariantViolation(message.into())
    }
}
