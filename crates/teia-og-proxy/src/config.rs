//! Proxy configuration loaded from environment variables.

use std::net::Ipv6Addr;
use std::time::Duration;

use anyhow::{Context, bail};

/// Proxy configuration.
///
/// Read once at startup and shared read-only by every request.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address (e.g., "0.0.0.0:8787").
    pub bind_addr: String,

    /// Hostname of the upstream origin that serves the real site.
    pub target_hostname: String,

    /// Explicit port for the upstream origin, if any.
    pub target_port: Option<u16>,

    /// Scheme for origin requests. `None` keeps the inbound scheme.
    pub target_scheme: Option<String>,

    /// GraphQL endpoint for holder and token metadata.
    pub metadata_api_url: String,

    /// Gateway prefix that replaces `ipfs://` in image URIs.
    pub ipfs_gateway: String,

    /// Handle emitted as `twitter:creator`.
    pub twitter_creator: String,

    /// Scheme assumed for inbound requests without `X-Forwarded-Proto`.
    pub public_scheme: String,

    /// Connect timeout for upstream and metadata calls. `None` waits forever.
    pub connect_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8787".to_string(),
            target_hostname: "teia.art".to_string(),
            target_port: None,
            target_scheme: None,
            metadata_api_url: "https://api.hicdex.com/v1/graphql".to_string(),
            ipfs_gateway: "https://cache.teia.rocks/ipfs/".to_string(),
            twitter_creator: "@TeiaCommunity".to_string(),
            public_scheme: "https".to_string(),
            connect_timeout: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `PROXY_BIND_ADDR`: Server bind address (default: "0.0.0.0:8787")
    /// - `PROXY_TARGET_HOSTNAME`: Origin host, optionally `host:port` (default: "teia.art")
    /// - `PROXY_TARGET_SCHEME`: "http" or "https" for origin requests (default: inbound scheme)
    /// - `PROXY_METADATA_API`: GraphQL endpoint (default: "https://api.hicdex.com/v1/graphql")
    /// - `PROXY_IPFS_GATEWAY`: Gateway prefix for `ipfs://` URIs (default: "https://cache.teia.rocks/ipfs/")
    /// - `PROXY_TWITTER_CREATOR`: `twitter:creator` handle (default: "@TeiaCommunity")
    /// - `PROXY_PUBLIC_SCHEME`: "http" or "https" (default: "https")
    /// - `PROXY_CONNECT_TIMEOUT_SECS`: Connect timeout in seconds (default: none)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let bind_addr = std::env::var("PROXY_BIND_ADDR").unwrap_or(defaults.bind_addr);

        let target = std::env::var("PROXY_TARGET_HOSTNAME").unwrap_or(defaults.target_hostname);
        let (target_hostname, target_port) = parse_target(&target)?;

        let target_scheme = match std::env::var("PROXY_TARGET_SCHEME") {
            Ok(raw) if !raw.trim().is_empty() => Some(parse_scheme("PROXY_TARGET_SCHEME", &raw)?),
            _ => None,
        };

        let metadata_api_url = std::env::var("PROXY_METADATA_API")
            .unwrap_or(defaults.metadata_api_url)
            .trim_end_matches('/')
            .to_string();

        let ipfs_gateway = std::env::var("PROXY_IPFS_GATEWAY").unwrap_or(defaults.ipfs_gateway);

        let twitter_creator =
            std::env::var("PROXY_TWITTER_CREATOR").unwrap_or(defaults.twitter_creator);

        let public_scheme = match std::env::var("PROXY_PUBLIC_SCHEME") {
            Ok(raw) => parse_scheme("PROXY_PUBLIC_SCHEME", &raw)?,
            Err(_) => defaults.public_scheme,
        };

        let connect_timeout = match std::env::var("PROXY_CONNECT_TIMEOUT_SECS") {
            Ok(raw) if !raw.trim().is_empty() => {
                let secs: u64 = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid PROXY_CONNECT_TIMEOUT_SECS '{raw}'"))?;
                Some(Duration::from_secs(secs))
            }
            _ => None,
        };

        tracing::info!(
            bind_addr = %bind_addr,
            target_hostname = %target_hostname,
            target_port = ?target_port,
            target_scheme = ?target_scheme,
            metadata_api_url = %metadata_api_url,
            ipfs_gateway = %ipfs_gateway,
            public_scheme = %public_scheme,
            "proxy configuration loaded"
        );

        Ok(Self {
            bind_addr,
            target_hostname,
            target_port,
            target_scheme,
            metadata_api_url,
            ipfs_gateway,
            twitter_creator,
            public_scheme,
            connect_timeout,
        })
    }
}

fn parse_scheme(var: &str, raw: &str) -> anyhow::Result<String> {
    let scheme = raw.trim().to_lowercase();
    if scheme != "http" && scheme != "https" {
        bail!("{var} must be http or https, got '{raw}'");
    }
    Ok(scheme)
}

/// Split `host[:port]` into its parts.
///
/// IPv6 literals are accepted bare (`::1`, no port) or bracketed
/// (`[::1]:8080`); the returned host keeps the brackets.
fn parse_target(raw: &str) -> anyhow::Result<(String, Option<u16>)> {
    let raw = raw.trim();

    if raw.parse::<Ipv6Addr>().is_ok() {
        return Ok((format!("[{raw}]"), None));
    }

    let (host, port) = if let Some(rest) = raw.strip_prefix('[') {
        let (addr, after) = rest
            .split_once(']')
            .with_context(|| format!("unclosed '[' in PROXY_TARGET_HOSTNAME '{raw}'"))?;
        addr.parse::<Ipv6Addr>()
            .with_context(|| format!("invalid IPv6 address in PROXY_TARGET_HOSTNAME '{raw}'"))?;
        let port = match after {
            "" => None,
            _ => {
                let port = after
                    .strip_prefix(':')
                    .with_context(|| format!("expected ':' after ']' in PROXY_TARGET_HOSTNAME '{raw}'"))?;
                Some(parse_port(raw, port)?)
            }
        };
        (&raw[..addr.len() + 2], port)
    } else {
        match raw.split_once(':') {
            Some((_, port)) if port.contains(':') => {
                bail!("IPv6 PROXY_TARGET_HOSTNAME '{raw}' must be bracketed to carry a port")
            }
            Some((host, port)) => (host, Some(parse_port(raw, port)?)),
            None => (raw, None),
        }
    };

    if host.is_empty() {
        bail!("PROXY_TARGET_HOSTNAME must not be empty");
    }

    Ok((host.to_string(), port))
}

fn parse_port(raw: &str, port: &str) -> anyhow::Result<u16> {
    port.parse()
        .with_context(|| format!("invalid port in PROXY_TARGET_HOSTNAME '{raw}'"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Mutex to serialize config tests that manipulate env vars.
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const ENV_KEYS: &[&str] = &[
        "PROXY_BIND_ADDR",
        "PROXY_TARGET_HOSTNAME",
        "PROXY_TARGET_SCHEME",
        "PROXY_METADATA_API",
        "PROXY_IPFS_GATEWAY",
        "PROXY_TWITTER_CREATOR",
        "PROXY_PUBLIC_SCHEME",
        "PROXY_CONNECT_TIMEOUT_SECS",
    ];

    /// Helper to run config tests with isolated env vars.
    fn with_env_vars<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());

        let saved: Vec<_> = ENV_KEYS
            .iter()
            .map(|k| (*k, std::env::var(k).ok()))
            .collect();

        // SAFETY: Serialized by mutex; only test code touches these vars.
        unsafe {
            for k in ENV_KEYS {
                std::env::remove_var(k);
            }
            for (k, v) in vars {
                std::env::set_var(k, v);
            }
        }

        f();

        // SAFETY: Restoring original env state.
        unsafe {
            for (k, v) in &saved {
                match v {
                    Some(val) => std::env::set_var(k, val),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn config_defaults() {
        with_env_vars(&[], || {
            let config = Config::from_env().unwrap();
            assert_eq!(config.bind_addr, "0.0.0.0:8787");
            assert_eq!(config.target_hostname, "teia.art");
            assert_eq!(config.target_port, None);
            assert_eq!(config.target_scheme, None);
            assert_eq!(config.metadata_api_url, "https://api.hicdex.com/v1/graphql");
            assert_eq!(config.ipfs_gateway, "https://cache.teia.rocks/ipfs/");
            assert_eq!(config.twitter_creator, "@TeiaCommunity");
            assert_eq!(config.public_scheme, "https");
            assert!(config.connect_timeout.is_none());
        });
    }

    #[test]
    fn config_custom_values() {
        with_env_vars(
            &[
                ("PROXY_BIND_ADDR", "127.0.0.1:9090"),
                ("PROXY_TARGET_HOSTNAME", "origin.internal:8080"),
                ("PROXY_TARGET_SCHEME", "http"),
                ("PROXY_METADATA_API", "http://graphql.local/v1/graphql/"),
                ("PROXY_IPFS_GATEWAY", "https://ipfs.io/ipfs/"),
                ("PROXY_TWITTER_CREATOR", "@someone"),
                ("PROXY_PUBLIC_SCHEME", "HTTP"),
                ("PROXY_CONNECT_TIMEOUT_SECS", "3"),
            ],
            || {
                let config = Config::from_env().unwrap();
                assert_eq!(config.bind_addr, "127.0.0.1:9090");
                assert_eq!(config.target_hostname, "origin.internal");
                assert_eq!(config.target_port, Some(8080));
                assert_eq!(config.target_scheme.as_deref(), Some("http"));
                assert_eq!(config.metadata_api_url, "http://graphql.local/v1/graphql");
                assert_eq!(config.ipfs_gateway, "https://ipfs.io/ipfs/");
                assert_eq!(config.twitter_creator, "@someone");
                assert_eq!(config.public_scheme, "http");
                assert_eq!(config.connect_timeout, Some(Duration::from_secs(3)));
            },
        );
    }

    #[test]
    fn config_rejects_bad_port() {
        with_env_vars(&[("PROXY_TARGET_HOSTNAME", "teia.art:http")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_rejects_unknown_scheme() {
        with_env_vars(&[("PROXY_PUBLIC_SCHEME", "ftp")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_rejects_unknown_target_scheme() {
        with_env_vars(&[("PROXY_TARGET_SCHEME", "ws")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_rejects_bad_timeout() {
        with_env_vars(&[("PROXY_CONNECT_TIMEOUT_SECS", "soon")], || {
            assert!(Config::from_env().is_err());
        });
    }

    #[test]
    fn config_blank_timeout_is_none() {
        with_env_vars(&[("PROXY_CONNECT_TIMEOUT_SECS", "  ")], || {
            let config = Config::from_env().unwrap();
            assert!(config.connect_timeout.is_none());
        });
    }

    #[test]
    fn parse_target_variants() {
        assert_eq!(
            parse_target("teia.art").unwrap(),
            ("teia.art".to_string(), None)
        );
        assert_eq!(
            parse_target("127.0.0.1:3000").unwrap(),
            ("127.0.0.1".to_string(), Some(3000))
        );
        assert!(parse_target(":3000").is_err());
        assert!(parse_target("").is_err());
    }

    #[test]
    fn parse_target_ipv6() {
        assert_eq!(
            parse_target("::1").unwrap(),
            ("[::1]".to_string(), None)
        );
        assert_eq!(
            parse_target("[::1]").unwrap(),
            ("[::1]".to_string(), None)
        );
        assert_eq!(
            parse_target("[2001:db8::2]:8080").unwrap(),
            ("[2001:db8::2]".to_string(), Some(8080))
        );
        assert!(parse_target("[::1").is_err());
        assert!(parse_target("[::1]8080").is_err());
        assert!(parse_target("[not-an-ip]:80").is_err());
        assert!(parse_target("fe80::1:zz").is_err());
    }

    #[test]
    fn bracketed_ipv6_target_is_a_valid_url_host() {
        let (host, port) = parse_target("[::1]:3000").unwrap();
        let mut url = reqwest::Url::parse("https://teia.art/tz/x").unwrap();
        url.set_host(Some(&host)).unwrap();
        url.set_port(port).unwrap();
        assert_eq!(url.as_str(), "https://[::1]:3000/tz/x");
    }
}
