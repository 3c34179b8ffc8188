//! Classified HTTP(S) reachability probe.

use ::reqwest::{blocking::Client, redirect, tls, Proxy, Url};
use ::std::{error::Error as StdError, time::Duration};
use ::tracing::debug;

use super::{proxy::SystemProxy, LinkError};

/// Connect timeout used when the caller has no preference.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;

/// Why a reachability probe failed.
///
/// Transport errors are classified at the point of detection. Callers only
/// ever see this closed set, never raw socket or resolver errors.
#[derive(Clone, Debug, PartialEq, Eq, ::thiserror::Error)]
pub enum ProbeError {
    /// The probe was skipped because the local link is not usable.
    #[error("no active link: {0}")]
    LinkDown(#[from] LinkError),
    /// The host name could not be resolved.
    #[error("failed to resolve host")]
    DnsFailure,
    /// The host could not be reached (refused, unreachable, timed out, TLS
    /// handshake failure, ...).
    #[error("failed to connect: {reason}")]
    ConnectFailure { reason: String },
}

impl ProbeError {
    /// The numeric status reported to the scripting layer: 1 for resolution
    /// failures, 2 for connection failures, or the link status code if the
    /// probe never ran.
    pub fn code(&self) -> i32 {
        match self {
            Self::LinkDown(link) => link.code(),
            Self::DnsFailure => 1,
            Self::ConnectFailure { .. } => 2,
        }
    }
}

/// Options for the HTTP client used by [`probe`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Connect timeout in whole seconds.
    pub connect_timeout_secs: u64,
    /// Honour `HTTP_PROXY` / `HTTPS_PROXY` / `ALL_PROXY` from the environment.
    pub use_system_proxy: bool,
}

impl Default for ProbeOptions {
    fn default() -> Self {
        Self {
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            use_system_proxy: true,
        }
    }
}

/// Issues a single `HEAD` request to `host` and classifies the outcome.
///
/// Only transport-level reachability is asserted: any HTTP response, whatever
/// its status, counts as success. Redirects are not followed and the response
/// body is never read. TLS is pinned to version 1.2 or later.
///
/// There is no retry. The first classified failure is returned.
pub fn probe(host: &str, options: &ProbeOptions) -> Result<(), ProbeError> {
    let proxies = if options.use_system_proxy {
        SystemProxy::from_env()
    } else {
        SystemProxy::default()
    };
    probe_through(host, options, &proxies)
}

/// [`probe`] with the proxy settings given explicitly.
pub(crate) fn probe_through(
    host: &str,
    options: &ProbeOptions,
    proxies: &SystemProxy,
) -> Result<(), ProbeError> {
    let proxy = Url::parse(host)
        .ok()
        .and_then(|url| proxies.for_url(&url).map(str::to_owned));
    debug!(
        host,
        timeout = options.connect_timeout_secs,
        proxy = proxy.as_deref(),
        "Checking internet access"
    );

    let mut builder = Client::builder()
        .min_tls_version(tls::Version::TLS_1_2)
        .connect_timeout(Duration::from_secs(options.connect_timeout_secs))
        .timeout(None::<Duration>)
        .redirect(redirect::Policy::none())
        .no_proxy();
    if let Some(url) = &proxy {
        let proxy = Proxy::all(url.as_str()).map_err(|e| {
            debug!(proxy = %url, error = %e, "Invalid proxy");
            connect_failure(&e)
        })?;
        builder = builder.proxy(proxy);
    }

    let client = builder.build().map_err(|e| {
        debug!(error = %e, "Failed to construct HTTP client");
        connect_failure(&e)
    })?;

    match client.head(host).send() {
        Ok(response) => {
            debug!(host, status = %response.status(), "Internet access check succeeded");
            Ok(())
        }
        Err(e) => {
            let err = classify(&e, proxy.is_some());
            debug!(host, error = %err, "Internet access check failed");
            Err(err)
        }
    }
}

/// Maps a transport error onto [`ProbeError`].
///
/// Behind a proxy the target is resolved by the proxy, so a local resolution
/// failure can only concern the proxy itself and counts as a connect failure.
pub(crate) fn classify(err: &::reqwest::Error, via_proxy: bool) -> ProbeError {
    if is_resolution_failure(err) && !via_proxy {
        ProbeError::DnsFailure
    } else {
        connect_failure(err)
    }
}

fn connect_failure(err: &::reqwest::Error) -> ProbeError {
    ProbeError::ConnectFailure {
        reason: describe(err),
    }
}

/// Resolution failures surface from the connector as a `dns error` wrapping
/// the resolver's `io::Error`. Neither has a dedicated type to match on, so
/// the source chain is inspected by message.
fn is_resolution_failure(err: &(dyn StdError + 'static)) -> bool {
    sources(err).any(|source| {
        let msg = source.to_string();
        msg.starts_with("dns error") || msg.contains("failed to lookup address")
    })
}

/// Renders the full source chain of an error on one line.
fn describe(err: &(dyn StdError + 'static)) -> String {
    sources(err)
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(": ")
}

fn sources<'a>(
    err: &'a (dyn StdError + 'static),
) -> impl Iterator<Item = &'a (dyn StdError + 'static)> {
    ::std::iter::successors(Some(err), |&err| err.source())
}

#[cfg(test)]
mod tests {
    use super::*;

    use ::pretty_assertions::assert_eq;
    use ::std::{
        io::{Read, Write},
        net::{SocketAddr, TcpListener},
        thread::{self, JoinHandle},
        time::Instant,
    };

    fn offline_options(connect_timeout_secs: u64) -> ProbeOptions {
        ProbeOptions {
            connect_timeout_secs,
            use_system_proxy: false,
        }
    }

    /// Accepts a single connection, answers it with `response` and returns
    /// the start of whatever the client sent.
    fn serve_once(response: &'static [u8]) -> (SocketAddr, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 1024];
            let len = stream.read(&mut buf).unwrap_or(0);
            let _ = stream.write_all(response);
            String::from_utf8_lossy(&buf[..len]).into_owned()
        });
        (addr, server)
    }

    fn via(proxy: &str) -> SystemProxy {
        SystemProxy {
            http: Some(proxy.to_owned()),
            https: Some(proxy.to_owned()),
            ..Default::default()
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ProbeError::DnsFailure.code(), 1);
        assert_eq!(
            ProbeError::ConnectFailure {
                reason: "refused".into()
            }
            .code(),
            2
        );
        assert_eq!(ProbeError::LinkDown(LinkError::NoInterface).code(), 4);
        assert_eq!(ProbeError::LinkDown(LinkError::NotRunning).code(), 3);
    }

    /// `.invalid` is reserved and guaranteed never to resolve.
    #[test]
    fn test_unresolvable_host() {
        assert_eq!(
            probe("http://stbcore-probe.invalid/", &offline_options(3)),
            Err(ProbeError::DnsFailure)
        );
    }

    #[test]
    fn test_connection_refused() {
        // Bind then drop to find a local port with nothing listening on it.
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();

        let result = probe(&format!("http://127.0.0.1:{port}/"), &offline_options(3));

        match result {
            Err(ProbeError::ConnectFailure { reason }) => assert!(!reason.is_empty()),
            other => panic!("expected connect failure, got {other:?}"),
        }
    }

    /// Any HTTP response counts as reachable, even an error status.
    #[test]
    fn test_http_status_is_ignored() {
        let (addr, server) = serve_once(
            b"HTTP/1.1 503 Service Unavailable\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );

        assert_eq!(probe(&format!("http://{addr}/"), &offline_options(3)), Ok(()));
        assert!(server.join().unwrap().starts_with("HEAD / HTTP/1.1"));
    }

    /// A non-routable address must fail within the connect timeout (plus some
    /// slack), whether the stack reports it as unreachable or times out.
    #[test]
    fn test_non_routable_address() {
        let start = Instant::now();

        let result = probe("http://10.255.255.1/", &offline_options(1));

        assert!(
            matches!(result, Err(ProbeError::ConnectFailure { .. })),
            "unexpected result: {result:?}"
        );
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_malformed_url() {
        assert!(matches!(
            probe("not a url", &offline_options(1)),
            Err(ProbeError::ConnectFailure { .. })
        ));
    }

    /// Behind a proxy only the proxy's name is resolved locally, so failing to
    /// resolve it is a connect failure, not a DNS failure of the target.
    #[test]
    fn test_unresolvable_proxy_is_connect_failure() {
        let result = probe_through(
            "http://www.example.com/",
            &offline_options(3),
            &via("http://stbcore-proxy.invalid:3128"),
        );

        match result {
            Err(ProbeError::ConnectFailure { reason }) => assert!(!reason.is_empty()),
            other => panic!("expected connect failure, got {other:?}"),
        }
    }

    /// A target excluded by `NO_PROXY` is resolved locally again.
    #[test]
    fn test_no_proxy_target_is_resolved_locally() {
        let proxies = SystemProxy {
            no_proxy: vec!["invalid".to_owned()],
            ..via("http://stbcore-proxy.invalid:3128")
        };

        assert_eq!(
            probe_through("http://stbcore-probe.invalid/", &offline_options(3), &proxies),
            Err(ProbeError::DnsFailure)
        );
    }

    /// The request goes to the proxy, which resolves the target on the box's
    /// behalf. An unresolvable target is therefore no local DNS failure.
    #[test]
    fn test_request_goes_through_proxy() {
        let (addr, proxy) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");

        let result = probe_through(
            "http://stbcore-probe.invalid/",
            &offline_options(3),
            &via(&format!("http://{addr}")),
        );

        assert_eq!(result, Ok(()));
        assert!(proxy
            .join()
            .unwrap()
            .starts_with("HEAD http://stbcore-probe.invalid/ HTTP/1.1"));
    }

    /// A peer which does not speak TLS on an `https` URL fails the handshake.
    #[test]
    fn test_tls_handshake_failure() {
        let (addr, server) =
            serve_once(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");

        let result = probe(&format!("https://{addr}/"), &offline_options(3));

        assert!(
            matches!(result, Err(ProbeError::ConnectFailure { .. })),
            "unexpected result: {result:?}"
        );
        // The first bytes of a TLS client hello: handshake record, TLS 1.x.
        let hello = server.join().unwrap();
        assert_eq!(hello.as_bytes().first(), Some(&0x16));
    }

    #[test]
    #[ignore = "Requires internet access: cargo test test_https_host_reachable -- --ignored"]
    fn test_https_host_reachable() {
        assert_eq!(
            probe("https://www.example.com/", &offline_options(DEFAULT_CONNECT_TIMEOUT_SECS)),
            Ok(())
        );
    }
}
