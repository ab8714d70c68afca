//! tdsec bridges a connectionless datagram socket to a DTLS engine.
//!
//! The engine is sans-IO and callback driven: it is handed an
//! [`EngineHandler`] on every call and uses it to put records on the wire,
//! deliver decrypted application data and look up pre-shared keys. The
//! [`Adapter`] implements those callbacks on top of a [`DatagramSocket`] and
//! offers `connect`, `read` and `send` to the application.
//!
//! ```text
//! application -> Adapter::{connect, read, send} -> Engine
//!                                                   |
//!              Handler <- Adapter callbacks <-------+
//!                          |            |
//!                    DatagramSocket   PskTable
//! ```
//!
//! Setup happens once through [`Tdsec::init`], which also performs the
//! engine's global initialization. Every socket then gets its own adapter
//! from [`Tdsec::create`].

#![forbid(unsafe_code)]
#![warn(clippy::all)]

#[macro_use]
extern crate log;

use std::sync::Arc;

mod adapter;
pub use adapter::{Adapter, Handler};

mod config;
pub use config::{Config, ConfigBuilder};

mod endpoint;
pub use endpoint::{AddressFamily, Endpoint, Session, SESSION_SIZE};

mod engine;
pub use engine::{Alert, Engine, EngineError, EngineEvent, EngineHandler, EngineProvider, PeerState};

mod error;
pub use error::{CredentialError, Error};

mod handshake;

mod netif;
pub use netif::{FixedNetif, NetifPolicy, NetifResolver, Translator};

mod psk;
pub use psk::{CredentialKind, PskEntry, PskTable};

mod socket;
pub use socket::DatagramSocket;

mod timer;
pub use timer::{Clock, PollSchedule, SystemClock};

/// Process wide context. Creates adapters.
pub struct Tdsec<P> {
    config: Arc<Config>,
    provider: P,
}

impl<P: EngineProvider> Tdsec<P> {
    /// Initialize the engine and take ownership of the configuration.
    pub fn init(config: Config, provider: P) -> Self {
        provider.init();
        debug!("Init {:?}", config);

        Tdsec {
            config: Arc::new(config),
            provider,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Create an adapter for `sock` with a fresh engine context.
    ///
    /// `handler` receives every decrypted application message.
    pub fn create<S, H>(&self, sock: S, handler: H) -> Result<Adapter<S, P::Engine, H>, Error>
    where
        S: DatagramSocket,
        H: Handler<S>,
    {
        let engine = self.provider.new_context().ok_or_else(|| {
            warn!("Engine context allocation failed");
            Error::ContextAllocationFailed
        })?;

        Ok(Adapter::new(self.config.clone(), sock, engine, handler))
    }
}
