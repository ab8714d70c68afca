//! Endpoint <-> session translation.

use std::fmt;
use std::sync::Arc;

use crate::endpoint::{Endpoint, Session};

/// Source of the currently active network interface.
///
/// Consulted once per translation.
pub trait NetifResolver: Send + Sync {
    fn active_netif(&self) -> u16;
}

impl<F> NetifResolver for F
where
    F: Fn() -> u16 + Send + Sync,
{
    fn active_netif(&self) -> u16 {
        self()
    }
}

/// Always resolves to the same interface.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixedNetif(pub u16);

impl NetifResolver for FixedNetif {
    fn active_netif(&self) -> u16 {
        self.0
    }
}

/// How the interface field is treated when translating.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NetifPolicy {
    /// Both directions take the interface from the resolver. The interface
    /// of the input is not carried over. This matches the deployed adapter.
    #[default]
    Active,
    /// The interface round-trips. A zero (any) interface on the way in is
    /// replaced by the resolver's answer.
    Preserve,
}

/// Stateless mapping between socket endpoints and engine sessions.
#[derive(Clone)]
pub struct Translator {
    policy: NetifPolicy,
    resolver: Arc<dyn NetifResolver>,
}

impl Translator {
    pub fn new(policy: NetifPolicy, resolver: Arc<dyn NetifResolver>) -> Self {
        Translator { policy, resolver }
    }

    pub fn policy(&self) -> NetifPolicy {
        self.policy
    }

    pub fn to_session(&self, ep: &Endpoint) -> Session {
        let ifindex = match self.policy {
            NetifPolicy::Preserve if ep.netif() != 0 => ep.netif(),
            _ => self.resolver.active_netif(),
        };
        Session::new(ep.octets(), ep.port(), ifindex)
    }

    pub fn to_endpoint(&self, session: &Session) -> Endpoint {
        let netif = match self.policy {
            NetifPolicy::Active => self.resolver.active_netif(),
            NetifPolicy::Preserve => session.ifindex,
        };
        Endpoint::from_octets(session.addr, session.port, netif)
    }
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("policy", &self.policy)
            .finish()
    }
}
