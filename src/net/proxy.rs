//! Proxy selection from the conventional environment variables.

use ::reqwest::Url;
use ::std::{env, net::IpAddr};

/// Proxy settings as read from `HTTP_PROXY`, `HTTPS_PROXY`, `ALL_PROXY` and
/// `NO_PROXY` (upper case preferred, lower case accepted).
///
/// The probe selects the proxy for its target itself instead of leaving it to
/// the HTTP client, so it knows whether a resolution failure concerned the
/// target or the proxy.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct SystemProxy {
    pub(crate) http: Option<String>,
    pub(crate) https: Option<String>,
    pub(crate) all: Option<String>,
    pub(crate) no_proxy: Vec<String>,
}

impl SystemProxy {
    /// Reads the proxy settings of the current process.
    pub(crate) fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Reads the proxy settings through `lookup`, which maps a variable name to
    /// its value.
    pub(crate) fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&name.to_ascii_uppercase())
                .or_else(|| lookup(&name.to_ascii_lowercase()))
                .map(|value| value.trim().to_owned())
                .filter(|value| !value.is_empty())
        };

        Self {
            http: var("http_proxy"),
            https: var("https_proxy"),
            all: var("all_proxy"),
            no_proxy: var("no_proxy")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|entry| !entry.is_empty())
                        .map(str::to_ascii_lowercase)
                        .collect()
                })
                .unwrap_or_default(),
        }
    }

    /// The proxy a request to `url` goes through, if any.
    pub(crate) fn for_url(&self, url: &Url) -> Option<&str> {
        let scheme_proxy = match url.scheme() {
            "http" => self.http.as_deref(),
            "https" => self.https.as_deref(),
            _ => None,
        };
        let proxy = scheme_proxy.or(self.all.as_deref())?;

        let host = url.host_str()?;
        if self.bypasses(host) {
            None
        } else {
            Some(proxy)
        }
    }

    /// Returns `true` if `host` matches a `NO_PROXY` entry.
    ///
    /// Entries are `*`, domain names (matching the domain and its subdomains,
    /// with or without a leading dot), IP addresses and CIDR networks.
    fn bypasses(&self, host: &str) -> bool {
        let host = host
            .trim_start_matches('[')
            .trim_end_matches(']')
            .to_ascii_lowercase();
        let ip = host.parse::<IpAddr>().ok();

        self.no_proxy.iter().any(|entry| {
            if entry == "*" {
                return true;
            }
            if let Some(ip) = ip {
                return ip_matches(ip, entry);
            }
            let domain = entry.trim_start_matches('.');
            host == domain || host.ends_with(&format!(".{domain}"))
        })
    }
}

fn ip_matches(ip: IpAddr, entry: &str) -> bool {
    let Some((network, prefix)) = entry.split_once('/') else {
        return entry.parse::<IpAddr>().map_or(false, |addr| addr == ip);
    };
    let (Ok(network), Ok(prefix)) = (network.parse::<IpAddr>(), prefix.parse::<u32>()) else {
        return false;
    };

    match (ip, network) {
        (IpAddr::V4(ip), IpAddr::V4(network)) if prefix <= 32 => {
            let mask = u32::MAX.checked_shl(32 - prefix).unwrap_or(0);
            u32::from(ip) & mask == u32::from(network) & mask
        }
        (IpAddr::V6(ip), IpAddr::V6(network)) if prefix <= 128 => {
            let mask = u128::MAX.checked_shl(128 - prefix).unwrap_or(0);
            u128::from(ip) & mask == u128::from(network) & mask
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ::pretty_assertions::assert_eq;
    use ::std::collections::HashMap;

    fn proxy(vars: &[(&str, &str)]) -> SystemProxy {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|&(k, v)| (k.to_owned(), v.to_owned()))
            .collect();
        SystemProxy::from_lookup(|name| vars.get(name).cloned())
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_no_variables() {
        let proxy = proxy(&[]);
        assert_eq!(proxy, SystemProxy::default());
        assert_eq!(proxy.for_url(&url("https://www.example.com/")), None);
    }

    #[test]
    fn test_scheme_specific_before_all() {
        let proxy = proxy(&[
            ("HTTP_PROXY", "http://web-proxy:3128"),
            ("ALL_PROXY", "socks5://fallback:1080"),
        ]);

        assert_eq!(
            proxy.for_url(&url("http://www.example.com/")),
            Some("http://web-proxy:3128")
        );
        assert_eq!(
            proxy.for_url(&url("https://www.example.com/")),
            Some("socks5://fallback:1080")
        );
    }

    #[test]
    fn test_lower_case_and_blank_values() {
        let proxy = proxy(&[("https_proxy", "http://lower:8080"), ("HTTP_PROXY", "  ")]);

        assert_eq!(proxy.http, None);
        assert_eq!(
            proxy.for_url(&url("https://www.example.com/")),
            Some("http://lower:8080")
        );
    }

    #[test]
    fn test_no_proxy_domains() {
        let proxy = proxy(&[
            ("ALL_PROXY", "http://proxy:3128"),
            ("NO_PROXY", "example.com, .internal ,"),
        ]);

        assert_eq!(proxy.for_url(&url("http://example.com/")), None);
        assert_eq!(proxy.for_url(&url("http://www.Example.com/")), None);
        assert_eq!(proxy.for_url(&url("http://box.internal/")), None);
        assert_eq!(
            proxy.for_url(&url("http://notexample.com/")),
            Some("http://proxy:3128")
        );
    }

    #[test]
    fn test_no_proxy_addresses() {
        let proxy = proxy(&[
            ("ALL_PROXY", "http://proxy:3128"),
            ("NO_PROXY", "127.0.0.1,10.0.0.0/8,::1"),
        ]);

        assert_eq!(proxy.for_url(&url("http://127.0.0.1:8080/")), None);
        assert_eq!(proxy.for_url(&url("http://10.255.255.1/")), None);
        assert_eq!(proxy.for_url(&url("http://[::1]/")), None);
        assert_eq!(
            proxy.for_url(&url("http://192.168.1.1/")),
            Some("http://proxy:3128")
        );
    }

    #[test]
    fn test_no_proxy_wildcard() {
        let proxy = proxy(&[("ALL_PROXY", "http://proxy:3128"), ("no_proxy", "*")]);
        assert_eq!(proxy.for_url(&url("https://www.example.com/")), None);
    }
}
