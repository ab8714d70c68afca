//! The DTLS engine as seen from the adapter.
//!
//! The engine owns the record layer, handshake state and retransmissions.
//! It never touches a socket. Instead, every engine entry point is handed an
//! [`EngineHandler`] which it calls back synchronously to put records on the
//! wire, deliver decrypted application data, and look up credentials.

use std::fmt;
use std::io;

use crate::endpoint::Session;
use crate::psk::CredentialKind;

/// Opaque negative result code reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EngineError(pub i32);

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "code {}", self.0)
    }
}

/// Handshake state of a peer inside the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Init,
    Handshaking,
    Connected,
    Closing,
    Closed,
}

/// Fatal alerts the adapter asks the engine to raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alert {
    IllegalParameter,
    InternalError,
}

impl Alert {
    /// Alert description code (RFC 5246, section 7.2).
    pub fn code(&self) -> u8 {
        match self {
            Alert::IllegalParameter => 47,
            Alert::InternalError => 80,
        }
    }
}

/// Non-data events an engine may report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Connected,
    Renegotiate,
    Alert(u8),
}

/// Callbacks the engine invokes from inside its entry points.
pub trait EngineHandler {
    /// Put one record on the wire towards `session`.
    ///
    /// `Ok(0)` never happens, a send that moves no bytes is an error.
    fn write(&mut self, session: &Session, record: &[u8]) -> io::Result<usize>;

    /// Deliver decrypted application data from `session`.
    fn read(&mut self, session: &Session, data: &[u8]);

    /// Fill `out` with the requested credential and return its length.
    fn credential(
        &mut self,
        session: &Session,
        kind: CredentialKind,
        peer_identity: Option<&[u8]>,
        out: &mut [u8],
    ) -> Result<usize, Alert>;

    fn event(&mut self, session: &Session, event: EngineEvent) {
        trace!("Engine event {:?} for {}", event, session);
    }
}

/// One engine context holding the peers of one adapter.
pub trait Engine {
    /// Handle to a peer record inside the context.
    type Peer: Copy + fmt::Debug;

    /// Largest plaintext accepted by [`Engine::write`].
    const MAX_RECORD_SIZE: usize;

    /// Start a client handshake towards `session`.
    fn connect(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
    ) -> Result<usize, EngineError>;

    fn peer(&self, session: &Session) -> Option<Self::Peer>;

    fn reset_peer(&mut self, handler: &mut dyn EngineHandler, peer: Self::Peer);

    fn peer_state(&self, peer: Self::Peer) -> PeerState;

    /// Feed one received datagram. Returns the number of bytes consumed.
    fn handle_message(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
        data: &[u8],
    ) -> Result<usize, EngineError>;

    /// Encrypt and send application data.
    fn write(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
        data: &[u8],
    ) -> Result<usize, EngineError>;
}

/// Creates engine contexts.
pub trait EngineProvider {
    type Engine: Engine;

    /// Process wide engine setup. Called once by [`crate::Tdsec::init`].
    fn init(&self) {}

    /// A fresh context, or `None` if it cannot be allocated.
    fn new_context(&self) -> Option<Self::Engine>;
}
