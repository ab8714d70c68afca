use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::engine::{Alert, EngineError};
use crate::psk::CredentialKind;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum Error {
    #[error("Engine context allocation failed")]
    ContextAllocationFailed,

    #[error("No peer record for session after connect")]
    PeerLookupFailed,

    #[error("Handshake failed: {0}")]
    HandshakeFailed(EngineError),

    #[error("Handshake not completed within {0:?}")]
    TimedOut(Duration),

    #[error("Transport failure: {0}")]
    TransportFailure(io::ErrorKind),

    #[error("Credential lookup failed: {0}")]
    Credential(#[from] CredentialError),

    #[error("Payload too large {0} (max {1})")]
    PayloadTooLarge(usize, usize),

    #[error("Engine error: {0}")]
    Engine(EngineError),

    #[error("Invalid config: {0}")]
    InvalidConfig(&'static str),

    #[error("Invalid PSK params: {0}")]
    InvalidParams(String),
}

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Unknown PSK identity")]
    UnknownIdentity,

    #[error("Buffer too small {available} (need {needed})")]
    BufferTooSmall { needed: usize, available: usize },

    #[error("Unsupported credential request {0:?}")]
    Unsupported(CredentialKind),
}

impl CredentialError {
    /// The alert the engine should raise towards the peer.
    pub fn alert(&self) -> Alert {
        match self {
            CredentialError::UnknownIdentity => Alert::IllegalParameter,
            CredentialError::BufferTooSmall { .. } => Alert::InternalError,
            CredentialError::Unsupported(_) => Alert::InternalError,
        }
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::TransportFailure(e.kind())
    }
}
