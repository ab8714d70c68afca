//! Shared helpers for adapter integration tests.
//!
//! `PlainEngine` speaks a toy plaintext protocol so the adapter can be driven
//! end to end without any cryptography:
//!
//! * `HELLO id`   client -> server, server looks up the key for `id`
//! * `FINISHED`   server -> client, both sides are then connected
//! * `ALERT code` either way, the receiving peer is closed
//! * `DATA bytes` application data, only accepted when connected

#![allow(unused)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tdsec::{
    Adapter, Clock, Config, CredentialKind, DatagramSocket, Endpoint, Engine, EngineError,
    EngineEvent, EngineHandler, EngineProvider, Error, Handler, PeerState, Session,
};

pub const HELLO: u8 = 1;
pub const FINISHED: u8 = 2;
pub const ALERT: u8 = 3;
pub const DATA: u8 = 4;

/// Engine refuses to connect a session it already has a peer for.
pub const ERR_PEER_EXISTS: i32 = -3;
/// Record could not be sent.
pub const ERR_SEND: i32 = -5;
/// Application data before the peer is connected.
pub const ERR_NOT_CONNECTED: i32 = -2;

#[derive(Debug, Default)]
pub struct Stats {
    pub connects: AtomicUsize,
    pub resets: AtomicUsize,
    pub writes: AtomicUsize,
}

impl Stats {
    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

pub struct PlainEngine {
    peers: Vec<Option<(Session, PeerState)>>,
    stats: Arc<Stats>,
    forget_peers: bool,
}

impl PlainEngine {
    fn find(&self, session: &Session) -> Option<usize> {
        self.peers
            .iter()
            .position(|p| matches!(p, Some((s, _)) if s == session))
    }

    fn set_state(&mut self, session: &Session, state: PeerState) {
        if self.forget_peers {
            return;
        }
        match self.find(session) {
            Some(i) => self.peers[i] = Some((*session, state)),
            None => self.peers.push(Some((*session, state))),
        }
    }

    fn send(
        handler: &mut dyn EngineHandler,
        session: &Session,
        kind: u8,
        payload: &[u8],
    ) -> Result<usize, EngineError> {
        let mut record = vec![kind];
        record.extend_from_slice(payload);
        handler.write(session, &record).map_err(|_| EngineError(ERR_SEND))
    }
}

impl Engine for PlainEngine {
    type Peer = usize;
    const MAX_RECORD_SIZE: usize = 256;

    fn connect(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
    ) -> Result<usize, EngineError> {
        self.stats.connects.fetch_add(1, Ordering::SeqCst);

        if self.find(session).is_some() {
            return Err(EngineError(ERR_PEER_EXISTS));
        }

        let mut id = [0u8; 32];
        let n = handler
            .credential(session, CredentialKind::ClientIdentity, None, &mut id)
            .map_err(|alert| EngineError(-(alert.code() as i32)))?;

        self.set_state(session, PeerState::Handshaking);
        Self::send(handler, session, HELLO, &id[..n])?;

        Ok(0)
    }

    fn peer(&self, session: &Session) -> Option<usize> {
        self.find(session)
    }

    fn reset_peer(&mut self, _handler: &mut dyn EngineHandler, peer: usize) {
        self.stats.resets.fetch_add(1, Ordering::SeqCst);
        if let Some(p) = self.peers.get_mut(peer) {
            *p = None;
        }
    }

    fn peer_state(&self, peer: usize) -> PeerState {
        match self.peers.get(peer) {
            Some(Some((_, state))) => *state,
            _ => PeerState::Closed,
        }
    }

    fn handle_message(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
        data: &[u8],
    ) -> Result<usize, EngineError> {
        let Some((&kind, payload)) = data.split_first() else {
            return Err(EngineError(-1));
        };

        match kind {
            HELLO => {
                let mut hint = [0u8; 8];
                let n = handler
                    .credential(session, CredentialKind::Hint, None, &mut hint)
                    .unwrap_or(0);
                assert_eq!(n, 0);

                let mut key = [0u8; 64];
                match handler.credential(session, CredentialKind::Key, Some(payload), &mut key) {
                    Ok(_) => {
                        self.set_state(session, PeerState::Connected);
                        Self::send(handler, session, FINISHED, &[])?;
                        handler.event(session, EngineEvent::Connected);
                    }
                    Err(alert) => {
                        Self::send(handler, session, ALERT, &[alert.code()])?;
                        return Err(EngineError(-(alert.code() as i32)));
                    }
                }
            }
            FINISHED => {
                if self.find(session).is_some() {
                    self.set_state(session, PeerState::Connected);
                    handler.event(session, EngineEvent::Connected);
                }
            }
            ALERT => {
                if self.find(session).is_some() {
                    self.set_state(session, PeerState::Closed);
                }
                handler.event(session, EngineEvent::Alert(payload.first().copied().unwrap_or(0)));
            }
            DATA => {
                let connected = self
                    .find(session)
                    .map(|i| self.peer_state(i) == PeerState::Connected)
                    .unwrap_or(false);
                if !connected {
                    return Err(EngineError(ERR_NOT_CONNECTED));
                }
                handler.read(session, payload);
            }
            _ => return Err(EngineError(-1)),
        }

        Ok(data.len())
    }

    fn write(
        &mut self,
        handler: &mut dyn EngineHandler,
        session: &Session,
        data: &[u8],
    ) -> Result<usize, EngineError> {
        self.stats.writes.fetch_add(1, Ordering::SeqCst);

        let connected = self
            .find(session)
            .map(|i| self.peer_state(i) == PeerState::Connected)
            .unwrap_or(false);
        if !connected {
            return Err(EngineError(ERR_NOT_CONNECTED));
        }

        Self::send(handler, session, DATA, data)?;
        Ok(data.len())
    }
}

#[derive(Default)]
pub struct PlainProvider {
    pub stats: Arc<Stats>,
    pub fail_alloc: bool,
    pub forget_peers: bool,
    pub inits: AtomicUsize,
}

impl EngineProvider for PlainProvider {
    type Engine = PlainEngine;

    fn init(&self) {
        self.inits.fetch_add(1, Ordering::SeqCst);
    }

    fn new_context(&self) -> Option<PlainEngine> {
        if self.fail_alloc {
            return None;
        }
        Some(PlainEngine {
            peers: Vec::new(),
            stats: self.stats.clone(),
            forget_peers: self.forget_peers,
        })
    }
}

/// In-memory datagram network. Datagrams to unbound endpoints vanish.
#[derive(Default)]
pub struct Hub {
    queues: Mutex<HashMap<([u8; 16], u16), VecDeque<(Vec<u8>, Endpoint)>>>,
    cond: Condvar,
}

impl Hub {
    pub fn new() -> Arc<Hub> {
        Arc::new(Hub::default())
    }

    pub fn bind(self: &Arc<Self>, port: u16) -> MemSocket {
        let local = endpoint(port);
        self.queues
            .lock()
            .unwrap()
            .insert((local.octets(), local.port()), VecDeque::new());
        MemSocket {
            local,
            hub: self.clone(),
            fail_send: AtomicBool::new(false),
            sent: AtomicUsize::new(0),
        }
    }
}

pub struct MemSocket {
    pub local: Endpoint,
    hub: Arc<Hub>,
    pub fail_send: AtomicBool,
    pub sent: AtomicUsize,
}

impl MemSocket {
    pub fn sent(&self) -> usize {
        self.sent.load(Ordering::SeqCst)
    }
}

impl DatagramSocket for MemSocket {
    fn send_to(&self, buf: &[u8], remote: &Endpoint) -> io::Result<usize> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::NetworkUnreachable.into());
        }

        self.sent.fetch_add(1, Ordering::SeqCst);

        let mut queues = self.hub.queues.lock().unwrap();
        if let Some(q) = queues.get_mut(&(remote.octets(), remote.port())) {
            q.push_back((buf.to_vec(), self.local));
            self.hub.cond.notify_all();
        }

        Ok(buf.len())
    }

    fn recv_from(&self, buf: &mut [u8]) -> io::Result<(usize, Endpoint)> {
        let key = (self.local.octets(), self.local.port());
        let mut queues = self.hub.queues.lock().unwrap();

        loop {
            if let Some((data, from)) = queues.get_mut(&key).and_then(|q| q.pop_front()) {
                let n = data.len().min(buf.len());
                buf[..n].copy_from_slice(&data[..n]);
                return Ok((n, from));
            }

            let (q, timeout) = self
                .hub
                .cond
                .wait_timeout(queues, Duration::from_millis(50))
                .unwrap();
            queues = q;

            if timeout.timed_out() && queues.get(&key).map_or(true, |q| q.is_empty()) {
                return Err(io::ErrorKind::WouldBlock.into());
            }
        }
    }
}

pub fn endpoint(port: u16) -> Endpoint {
    Endpoint::new(format!("fd00::{:x}", port).parse().unwrap(), port, 0)
}

/// Collects delivered application data.
#[derive(Clone, Default)]
pub struct Collect(pub Arc<Mutex<Vec<(Vec<u8>, Endpoint)>>>);

impl Collect {
    pub fn messages(&self) -> Vec<(Vec<u8>, Endpoint)> {
        self.0.lock().unwrap().clone()
    }
}

impl Handler<MemSocket> for Collect {
    fn on_message(&mut self, _sock: &MemSocket, data: &[u8], remote: &Endpoint) {
        self.0.lock().unwrap().push((data.to_vec(), *remote));
    }
}

pub type TestAdapter = Adapter<MemSocket, PlainEngine, Collect>;

/// Clock that only moves when slept on.
#[derive(Clone)]
pub struct ManualClock {
    start: Instant,
    offset: Arc<Mutex<Duration>>,
    sleeps: Arc<AtomicUsize>,
}

impl ManualClock {
    pub fn new() -> Self {
        ManualClock {
            start: Instant::now(),
            offset: Arc::default(),
            sleeps: Arc::default(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        *self.offset.lock().unwrap()
    }

    pub fn sleeps(&self) -> usize {
        self.sleeps.load(Ordering::SeqCst)
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + *self.offset.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) {
        self.sleeps.fetch_add(1, Ordering::SeqCst);
        *self.offset.lock().unwrap() += duration;
    }
}

/// Feed everything arriving on the adapter's socket into `read` until
/// `stop` is set. Returns the errors `read` reported.
pub fn spawn_receiver(adapter: Arc<TestAdapter>, stop: Arc<AtomicBool>) -> JoinHandle<Vec<Error>> {
    thread::spawn(move || {
        let mut errors = Vec::new();
        let mut buf = vec![0u8; 2048];
        while !stop.load(Ordering::SeqCst) {
            match adapter.recv(&mut buf) {
                Ok(_) => {}
                Err(Error::TransportFailure(io::ErrorKind::WouldBlock)) => {}
                Err(e) => errors.push(e),
            }
        }
        errors
    })
}

/// Server side config knowing two clients.
pub fn server_config() -> Config {
    Config::builder()
        .psk("client1", "secretkey123")
        .psk("client2", "otherkey")
        .poll_interval(Duration::from_millis(10))
        .handshake_timeout(Duration::from_secs(2))
        .build()
        .expect("Failed to build config")
}

pub fn client_config(identity: &str, key: &str) -> Config {
    Config::builder()
        .psk(identity, key)
        .poll_interval(Duration::from_millis(10))
        .handshake_timeout(Duration::from_secs(2))
        .build()
        .expect("Failed to build config")
}

/// A running server on `port` with its receive thread.
pub struct Server {
    pub adapter: Arc<TestAdapter>,
    pub received: Collect,
    pub provider: Arc<PlainProvider>,
    stop: Arc<AtomicBool>,
    thread: Option<JoinHandle<Vec<Error>>>,
}

impl Server {
    pub fn start(hub: &Arc<Hub>, port: u16) -> Server {
        let provider = Arc::new(PlainProvider::default());
        let received = Collect::default();
        let tdsec = tdsec::Tdsec::init(server_config(), SharedProvider(provider.clone()));
        let adapter = Arc::new(
            tdsec
                .create(hub.bind(port), received.clone())
                .expect("create server"),
        );
        let stop = Arc::new(AtomicBool::new(false));
        let thread = Some(spawn_receiver(adapter.clone(), stop.clone()));

        Server {
            adapter,
            received,
            provider,
            stop,
            thread,
        }
    }

    pub fn endpoint(&self) -> Endpoint {
        self.adapter.socket().local
    }

    /// Stop the receive thread and return the errors it saw.
    pub fn stop(mut self) -> Vec<Error> {
        self.stop.store(true, Ordering::SeqCst);
        self.thread
            .take()
            .map(|t| t.join().expect("receiver panicked"))
            .unwrap_or_default()
    }
}

/// Lets a test keep a handle on the provider it passed to `Tdsec::init`.
pub struct SharedProvider(pub Arc<PlainProvider>);

impl EngineProvider for SharedProvider {
    type Engine = PlainEngine;

    fn init(&self) {
        self.0.init()
    }

    fn new_context(&self) -> Option<PlainEngine> {
        self.0.new_context()
    }
}

/// Poll `f` for up to a second.
pub fn eventually(mut f: impl FnMut() -> bool) -> bool {
    let until = Instant::now() + Duration::from_secs(1);
    while Instant::now() < until {
        if f() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    f()
}
