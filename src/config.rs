use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::netif::{FixedNetif, NetifPolicy, NetifResolver, Translator};
use crate::psk::{PskEntry, PskTable};
use crate::timer::{Clock, SystemClock};
use crate::Error;

/// Adapter configuration
#[derive(Clone)]
pub struct Config {
    poll_interval: Duration,
    handshake_timeout: Duration,
    netif_policy: NetifPolicy,
    netif_resolver: Arc<dyn NetifResolver>,
    psk: Arc<PskTable>,
    clock: Arc<dyn Clock>,
}

impl Config {
    /// Create a new configuration builder.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder {
            poll_interval: Duration::from_millis(500),
            handshake_timeout: Duration::from_secs(5),
            netif_policy: NetifPolicy::default(),
            netif_resolver: None,
            psk: PskTable::new(),
            clock: None,
        }
    }

    /// Interval between peer state checks while connecting.
    #[inline(always)]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How long `connect` waits for the handshake to complete.
    #[inline(always)]
    pub fn handshake_timeout(&self) -> Duration {
        self.handshake_timeout
    }

    #[inline(always)]
    pub fn netif_policy(&self) -> NetifPolicy {
        self.netif_policy
    }

    /// Pre-shared keys, in the order they were added.
    #[inline(always)]
    pub fn psk(&self) -> &PskTable {
        &self.psk
    }

    #[inline(always)]
    pub fn clock(&self) -> &dyn Clock {
        &*self.clock
    }

    /// Endpoint translator using the configured interface policy.
    pub fn translator(&self) -> Translator {
        Translator::new(self.netif_policy, self.netif_resolver.clone())
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("poll_interval", &self.poll_interval)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("netif_policy", &self.netif_policy)
            .field("psk", &self.psk.len())
            .finish()
    }
}

/// Builder for adapter configuration.
pub struct ConfigBuilder {
    poll_interval: Duration,
    handshake_timeout: Duration,
    netif_policy: NetifPolicy,
    netif_resolver: Option<Arc<dyn NetifResolver>>,
    psk: PskTable,
    clock: Option<Arc<dyn Clock>>,
}

impl ConfigBuilder {
    /// Set the interval between peer state checks while connecting.
    ///
    /// Defaults to 500 milliseconds.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set how long `connect` waits for the handshake to complete.
    ///
    /// Defaults to 5 seconds.
    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = timeout;
        self
    }

    /// Set how the interface of an endpoint is translated.
    ///
    /// Defaults to [`NetifPolicy::Active`].
    pub fn netif_policy(mut self, policy: NetifPolicy) -> Self {
        self.netif_policy = policy;
        self
    }

    /// Set the source of the active network interface.
    ///
    /// Defaults to interface 0.
    pub fn netif_resolver(mut self, resolver: impl NetifResolver + 'static) -> Self {
        let resolver: Arc<dyn NetifResolver> = Arc::new(resolver);
        self.netif_resolver = Some(resolver);
        self
    }

    /// Append one pre-shared key.
    ///
    /// The first key added is the identity used in the client role.
    pub fn psk(mut self, identity: impl Into<Vec<u8>>, key: impl Into<Vec<u8>>) -> Self {
        self.psk.push(PskEntry::new(identity, key));
        self
    }

    /// Append all entries of a table, keeping their order.
    pub fn psk_table(mut self, table: PskTable) -> Self {
        for entry in table.entries() {
            self.psk.push(entry.clone());
        }
        self
    }

    /// Set the time source for the connect poll loop.
    ///
    /// Defaults to [`SystemClock`].
    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(clock);
        self.clock = Some(clock);
        self
    }

    /// Build the configuration.
    ///
    /// Returns `Error::InvalidConfig` if the poll interval is zero or the
    /// handshake timeout is shorter than one poll interval.
    pub fn build(self) -> Result<Config, Error> {
        if self.poll_interval.is_zero() {
            return Err(Error::InvalidConfig("poll interval is zero"));
        }

        if self.handshake_timeout < self.poll_interval {
            return Err(Error::InvalidConfig(
                "handshake timeout shorter than poll interval",
            ));
        }

        if self.psk.is_empty() {
            warn!("No PSK configured, handshakes will fail credential lookup");
        }

        Ok(Config {
            poll_interval: self.poll_interval,
            handshake_timeout: self.handshake_timeout,
            netif_policy: self.netif_policy,
            netif_resolver: self
                .netif_resolver
                .unwrap_or_else(|| Arc::new(FixedNetif::default())),
            psk: Arc::new(self.psk),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config::builder()
            .build()
            .expect("Default config should always validate")
    }
}
