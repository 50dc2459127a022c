use thiserror::Error;

use crate::step::Step;

/// Errors surfaced by the consultation flow
#[derive(Error, Debug)]
pub enum ConsultError {
    #[error("event {event} is not allowed in step {step:?}")]
    InvalidTransition { step: Step, event: &'static str },

    #[error("{0}")]
    Validation(String),

    #[error("another chat exchange is already in flight")]
    ExchangeInFlight,

    #[error("no chat reply is in progress")]
    NoReplyInProgress,

    #[error("session not found: {0}")]
    SessionNotFound(String),

    #[error("model request failed: {0}")]
    Provider(String),

    #[error("{0} environment variable is not set")]
    MissingCredential(&'static str),

    #[error("photo could not be read: {0}")]
    PhotoRead(String),
}

pub type Result<T> = std::result::Result<T, ConsultError>;
