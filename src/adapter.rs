//! The session adapter.
//!
//! Owns one socket and one engine context. Application calls go straight to
//! the engine, the engine calls back into [`Io`] which talks to the socket,
//! the PSK table, and the application [`Handler`].

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use crate::endpoint::{Endpoint, Session};
use crate::engine::{Alert, Engine, EngineError, EngineHandler, EngineEvent};
use crate::netif::Translator;
use crate::psk::{CredentialKind, PskTable};
use crate::socket::DatagramSocket;
use crate::{Config, Error};

/// Receives decrypted application data.
///
/// Called exactly once per message the engine delivers, before the
/// [`Adapter::read`] that fed the datagram returns. The adapter is locked
/// during the call, so the handler must not call back into it.
pub trait Handler<S> {
    fn on_message(&mut self, sock: &S, data: &[u8], remote: &Endpoint);
}

impl<S, F> Handler<S> for F
where
    F: FnMut(&S, &[u8], &Endpoint),
{
    fn on_message(&mut self, sock: &S, data: &[u8], remote: &Endpoint) {
        self(sock, data, remote)
    }
}

/// Bridges a datagram socket to a DTLS engine context.
///
/// All operations take `&self`. Engine calls are serialized by an internal
/// lock which [`Adapter::connect`] releases while it waits, so a receiving
/// thread can keep feeding [`Adapter::read`] during a handshake.
pub struct Adapter<S, E, H> {
    config: Arc<Config>,
    translator: Translator,
    sock: S,
    inner: Mutex<Inner<E, H>>,
}

struct Inner<E, H> {
    engine: E,
    handler: H,
}

impl<S, E, H> Adapter<S, E, H>
where
    S: DatagramSocket,
    E: Engine,
    H: Handler<S>,
{
    pub(crate) fn new(config: Arc<Config>, sock: S, engine: E, handler: H) -> Self {
        debug!("Create adapter, max record size {}", E::MAX_RECORD_SIZE);

        Adapter {
            translator: config.translator(),
            config,
            sock,
            inner: Mutex::new(Inner { engine, handler }),
        }
    }

    pub fn socket(&self) -> &S {
        &self.sock
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    /// Feed one received datagram to the engine.
    ///
    /// Handshake replies go out through the socket and decrypted data goes
    /// to the handler, both before this returns. Returns the number of bytes
    /// the engine consumed.
    pub fn read(&self, data: &[u8], remote: &Endpoint) -> Result<usize, Error> {
        let session = self.translator.to_session(remote);
        trace!("Read {} bytes from {}", data.len(), remote);

        let (res, transport) =
            self.with_engine(|engine, io| engine.handle_message(io, &session, data));

        engine_result(res, transport)
    }

    /// Encrypt and send application data to `remote`.
    pub fn send(&self, data: &[u8], remote: &Endpoint) -> Result<usize, Error> {
        if data.len() > E::MAX_RECORD_SIZE {
            debug!(
                "Payload of {} exceeds max record size {}",
                data.len(),
                E::MAX_RECORD_SIZE
            );
            return Err(Error::PayloadTooLarge(data.len(), E::MAX_RECORD_SIZE));
        }

        let session = self.translator.to_session(remote);
        trace!("Send {} bytes to {}", data.len(), remote);

        let (res, transport) = self.with_engine(|engine, io| engine.write(io, &session, data));

        engine_result(res, transport)
    }

    /// Block on the socket for one datagram and feed it to [`Adapter::read`].
    ///
    /// Returns the datagram size and its origin.
    pub fn recv(&self, buf: &mut [u8]) -> Result<(usize, Endpoint), Error> {
        let (n, remote) = self.sock.recv_from(buf).map_err(|e| {
            debug!("Socket receive failed: {}", e);
            Error::from(e)
        })?;

        self.read(&buf[..n], &remote)?;

        Ok((n, remote))
    }

    /// Run `f` with the engine and a callback shim for it.
    ///
    /// Also returns the first socket error the shim saw during `f`.
    pub(crate) fn with_engine<R>(
        &self,
        f: impl FnOnce(&mut E, &mut Io<'_, S, H>) -> R,
    ) -> (R, Option<io::ErrorKind>) {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Inner { engine, handler } = &mut *guard;

        let mut io = Io {
            sock: &self.sock,
            handler,
            translator: &self.translator,
            psk: self.config.psk(),
            transport_error: None,
        };

        let r = f(engine, &mut io);
        (r, io.transport_error)
    }
}

impl<S, E, H> fmt::Debug for Adapter<S, E, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter")
            .field("config", &self.config)
            .field("translator", &self.translator)
            .finish()
    }
}

/// Map an engine result, preferring a socket failure seen during the call.
pub(crate) fn engine_result(
    res: Result<usize, EngineError>,
    transport: Option<io::ErrorKind>,
) -> Result<usize, Error> {
    match (res, transport) {
        (Ok(n), _) => Ok(n),
        (Err(_), Some(kind)) => Err(Error::TransportFailure(kind)),
        (Err(e), None) => Err(Error::Engine(e)),
    }
}

/// Engine callbacks for the duration of one engine call.
pub(crate) struct Io<'a, S, H> {
    sock: &'a S,
    handler: &'a mut H,
    translator: &'a Translator,
    psk: &'a PskTable,
    transport_error: Option<io::ErrorKind>,
}

impl<'a, S, H> EngineHandler for Io<'a, S, H>
where
    S: DatagramSocket,
    H: Handler<S>,
{
    fn write(&mut self, session: &Session, record: &[u8]) -> io::Result<usize> {
        let remote = self.translator.to_endpoint(session);
        trace!("Send record to {} size {}", remote, record.len());

        let res = match self.sock.send_to(record, &remote) {
            Ok(0) => Err(io::Error::from(io::ErrorKind::WriteZero)),
            r => r,
        };

        if let Err(e) = &res {
            debug!("Failed to send record to {}: {}", remote, e);
            self.transport_error.get_or_insert(e.kind());
        }

        res
    }

    fn read(&mut self, session: &Session, data: &[u8]) {
        let remote = self.translator.to_endpoint(session);
        trace!("Deliver {} bytes from {}", data.len(), remote);
        self.handler.on_message(self.sock, data, &remote);
    }

    fn credential(
        &mut self,
        session: &Session,
        kind: CredentialKind,
        peer_identity: Option<&[u8]>,
        out: &mut [u8],
    ) -> Result<usize, Alert> {
        self.psk.resolve(kind, peer_identity, out).map_err(|e| {
            debug!("Credential {:?} for {} failed: {}", kind, session, e);
            e.alert()
        })
    }

    fn event(&mut self, session: &Session, event: EngineEvent) {
        debug!("Engine event {:?} for {}", event, session);
    }
}
