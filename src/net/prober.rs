//! Tiered connectivity diagnosis: adapter, carrier, then remote reachability.

use ::tracing::debug;

use super::{
    probe, select_active_adapter, IfFlags, InterfaceProvider, ProbeError, ProbeOptions,
    SystemInterfaces,
};

/// Why the local link is unusable.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ::thiserror::Error)]
pub enum LinkError {
    /// No interface is up, addressed and named like an Ethernet or WLAN
    /// adapter.
    #[error("no valid active network adapter")]
    NoInterface,
    /// The interface flags could not be queried.
    #[error("failed to query interface flags")]
    SocketError,
    /// The adapter is up but reports no carrier.
    #[error("network adapter has no carrier")]
    NotRunning,
}

impl LinkError {
    /// The numeric status reported to the scripting layer. Zero is reserved
    /// for a working link.
    pub fn code(self) -> i32 {
        match self {
            Self::NoInterface => 4,
            Self::SocketError | Self::NotRunning => 3,
        }
    }
}

/// Name fragments of the adapters which may carry the box's uplink.
pub const DEFAULT_ADAPTER_PATTERNS: &[&str] = &["eth", "wlan"];

/// Diagnoses network connectivity.
///
/// Every check starts from scratch: interfaces are re-enumerated each time and
/// nothing is cached. Probes are blocking and not deduplicated, so overlapping
/// callers each pay their own timeout.
///
/// # Example
///
/// ```no_run
/// use ::stbcore::net::{Prober, ProbeError, DEFAULT_CONNECT_TIMEOUT_SECS};
///
/// let prober = Prober::new();
/// match prober.check_internet_access("https://www.example.com", DEFAULT_CONNECT_TIMEOUT_SECS) {
///     Ok(()) => println!("online"),
///     Err(ProbeError::LinkDown(link)) => println!("cable unplugged? {link}"),
///     Err(err) => println!("offline: {err}"),
/// }
/// ```
#[derive(Clone, Debug)]
pub struct Prober<P = SystemInterfaces> {
    provider: P,
    adapter_patterns: Vec<String>,
    use_system_proxy: bool,
}

impl Default for Prober {
    fn default() -> Self {
        Self::new()
    }
}

impl Prober {
    /// A prober for the host's real interfaces.
    pub fn new() -> Self {
        Self::with_provider(SystemInterfaces)
    }
}

impl<P> Prober<P>
where
    P: InterfaceProvider,
{
    /// A prober which takes its interface information from `provider`.
    pub fn with_provider(provider: P) -> Self {
        Self {
            provider,
            adapter_patterns: DEFAULT_ADAPTER_PATTERNS
                .iter()
                .map(|&p| p.to_owned())
                .collect(),
            use_system_proxy: true,
        }
    }

    /// Set the name fragments which identify candidate adapters.
    ///
    /// Defaults to [`DEFAULT_ADAPTER_PATTERNS`] if not set.
    pub fn with_adapter_patterns<I, S>(self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            adapter_patterns: patterns.into_iter().map(Into::into).collect(),
            ..self
        }
    }

    /// Whether the reachability probe honours proxy settings from the
    /// environment.
    ///
    /// Defaults to `true` if not set.
    pub fn with_system_proxy(self, use_system_proxy: bool) -> Self {
        Self {
            use_system_proxy,
            ..self
        }
    }

    pub fn adapter_patterns(&self) -> &[String] {
        &self.adapter_patterns
    }

    /// The name of the adapter the box is using, if any.
    pub fn active_adapter(&self) -> Option<String> {
        let interfaces = match self.provider.interfaces() {
            Ok(interfaces) => interfaces,
            Err(e) => {
                debug!(error = %e, "Failed to get network interfaces");
                return None;
            }
        };

        let adapter = select_active_adapter(&interfaces, self.adapter_patterns.as_slice())?;
        debug!(interface = %adapter.name, "Active network interface");
        Some(adapter.name.clone())
    }

    /// Checks that the active adapter exists and has a carrier.
    pub fn check_link_status(&self) -> Result<(), LinkError> {
        let Some(interface) = self.active_adapter() else {
            debug!("No valid active network adapter");
            return Err(LinkError::NoInterface);
        };

        let flags = self.provider.interface_flags(&interface).map_err(|e| {
            debug!(%interface, error = %e, "Failed to get interface flags");
            LinkError::SocketError
        })?;

        if flags.contains(IfFlags::RUNNING) {
            Ok(())
        } else {
            debug!(%interface, ?flags, "Network adapter not running");
            Err(LinkError::NotRunning)
        }
    }

    /// Checks that `host` can be reached over HTTP(S).
    ///
    /// The link is checked first, and the remote probe is skipped when it is
    /// down: a local negative answer is cheap, a remote one costs up to
    /// `connect_timeout_secs`.
    pub fn check_internet_access(
        &self,
        host: &str,
        connect_timeout_secs: u64,
    ) -> Result<(), ProbeError> {
        self.check_link_status().map_err(|link| {
            debug!(error = %link, "No active link");
            ProbeError::LinkDown(link)
        })?;

        probe(
            host,
            &ProbeOptions {
                connect_timeout_secs,
                use_system_proxy: self.use_system_proxy,
            },
        )
    }
}
