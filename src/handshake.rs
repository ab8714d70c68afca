// Client handshake driver:
//
// 1. Idle: translate the remote and ask the engine to connect.
// 2. If that fails and the engine still holds a peer for the session (left
//    over from an earlier attempt), reset the peer and connect once more.
// 3. Handshaking: look the peer up and check its state every poll interval
//    until it is connected or the handshake timeout has passed.
//
// The engine makes progress on the handshake while the driver sleeps, fed by
// whoever is receiving on the socket and calling `Adapter::read`.

use crate::adapter::{Adapter, Handler};
use crate::endpoint::Endpoint;
use crate::engine::{Engine, PeerState};
use crate::socket::DatagramSocket;
use crate::timer::PollSchedule;
use crate::Error;

/// States of one `connect` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum HandshakeState {
    Idle,
    Handshaking,
    Connected,
    Failed,
    TimedOut,
}

impl<S, E, H> Adapter<S, E, H>
where
    S: DatagramSocket,
    E: Engine,
    H: Handler<S>,
{
    /// Establish a DTLS session with `remote` in the client role.
    ///
    /// Blocks the calling thread until the engine reports the peer connected
    /// or the configured handshake timeout passes. A remote that is already
    /// connected returns immediately without a new handshake.
    pub fn connect(&self, remote: &Endpoint) -> Result<(), Error> {
        let session = self.translator().to_session(remote);
        let mut state = HandshakeState::Idle;
        debug!("Connect to {} ({:?})", remote, state);

        let (started, transport) = self.with_engine(|engine, io| {
            if let Some(peer) = engine.peer(&session) {
                if engine.peer_state(peer) == PeerState::Connected {
                    return Ok(None);
                }
            }

            let mut res = engine.connect(io, &session);

            if let Err(e) = res {
                if let Some(stale) = engine.peer(&session) {
                    warn!("Connect to {} failed ({}), reset stale peer {:?}", remote, e, stale);
                    engine.reset_peer(io, stale);
                    res = engine.connect(io, &session);
                }
            }

            if let Err(e) = res {
                return Err(Error::HandshakeFailed(e));
            }

            engine.peer(&session).map(Some).ok_or(Error::PeerLookupFailed)
        });

        let peer = match started {
            Ok(Some(peer)) => peer,
            Ok(None) => {
                debug!("Already connected to {}", remote);
                return Ok(());
            }
            Err(e) => {
                state = HandshakeState::Failed;
                debug!("Connect to {} {:?}: {} (transport {:?})", remote, state, e, transport);
                return Err(e);
            }
        };

        state = HandshakeState::Handshaking;
        trace!("Connect to {} {:?}", remote, state);

        let clock = self.config().clock();
        let mut schedule = PollSchedule::new(
            clock.now(),
            self.config().poll_interval(),
            self.config().handshake_timeout(),
        );

        loop {
            let (peer_state, _) = self.with_engine(|engine, _| engine.peer_state(peer));

            if peer_state == PeerState::Connected {
                state = HandshakeState::Connected;
                debug!(
                    "Connect to {} {:?} after {} polls",
                    remote,
                    state,
                    schedule.polls()
                );
                return Ok(());
            }

            if schedule.expired(clock.now()) {
                state = HandshakeState::TimedOut;
                debug!("Connect to {} {:?} in {:?}", remote, state, peer_state);
                return Err(Error::TimedOut(schedule.ceiling()));
            }

            schedule.attempt();
            clock.sleep(schedule.interval());
        }
    }
}
