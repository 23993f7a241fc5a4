use crate::config::ScrapeConfig;
use async_trait::async_trait;
use std::net::IpAddr;
use std::sync::Arc;
use url::Url;

fn is_ip_private(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_loopback()
                || v4.is_private()
                || v4.is_link_local()
                || v4.is_unspecified()
                || v4.is_broadcast()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback()
                || v6.is_unspecified()
                || (v6.segments()[0] & 0xfe00) == 0xfc00
                || (v6.segments()[0] & 0xffc0) == 0xfe80
        }
    }
}

/// Resolves host names for the private-address check.
#[async_trait]
pub trait HostLookup: Send + Sync {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>>;
}

/// System resolver through tokio.
pub struct SystemLookup;

#[async_trait]
impl HostLookup for SystemLookup {
    async fn lookup(&self, host: &str) -> std::io::Result<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((host, 80)).await?;
        Ok(addrs.map(|addr| addr.ip()).collect())
    }
}

/// Which URLs the fetcher is allowed to request.
#[derive(Clone)]
pub struct UrlPolicy {
    allowed_schemes: Vec<String>,
    blocked_hosts: Vec<String>,
    block_private_ips: bool,
    lookup: Arc<dyn HostLookup>,
}

impl From<&ScrapeConfig> for UrlPolicy {
    fn from(config: &ScrapeConfig) -> Self {
        Self {
            allowed_schemes: config.allowed_schemes.clone(),
            blocked_hosts: config.blocked_hosts.iter().map(|h| h.to_lowercase()).collect(),
            block_private_ips: config.block_private_ips,
            lookup: Arc::new(SystemLookup),
        }
    }
}

impl UrlPolicy {
    #[cfg(test)]
    pub fn with_lookup(mut self, lookup: Arc<dyn HostLookup>) -> Self {
        self.lookup = lookup;
        self
    }

    async fn is_private_host(&self, host: &str) -> bool {
        let bare = host.trim_start_matches('[').trim_end_matches(']');
        if let Ok(ip) = bare.parse::<IpAddr>() {
            return is_ip_private(&ip);
        }

        match self.lookup.lookup(host).await {
            Ok(addrs) => addrs.iter().any(is_ip_private),
            // unresolvable hosts fail at fetch time anyway
            Err(_) => false,
        }
    }

    pub async fn permits(&self, url: &Url) -> bool {
        if !self.allowed_schemes.iter().any(|s| s == url.scheme()) {
            log::warn!("URL scheme '{}' not allowed", url.scheme());
            return false;
        }

        let host = match url.host_str() {
            Some(h) if !h.is_empty() => h.to_lowercase(),
            _ => {
                log::warn!("{url}: no host");
                return false;
            }
        };

        if self.blocked_hosts.iter().any(|h| *h == host) {
            log::warn!("Host '{}' is blocked", host);
            return false;
        }

        if self.block_private_ips && self.is_private_host(&host).await {
            log::warn!("Host '{}' resolves to private IP (blocked by SSRF policy)", host);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(block_private_ips: bool) -> UrlPolicy {
        UrlPolicy::from(&ScrapeConfig {
            blocked_hosts: vec!["Blocked.Example".to_string()],
            block_private_ips,
            ..Default::default()
        })
    }

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn test_private_ranges() {
        for ip in ["127.0.0.1", "10.1.2.3", "172.16.0.1", "192.168.1.1", "169.254.0.1", "0.0.0.0", "::1", "fd00::1", "fe80::1"] {
            assert!(is_ip_private(&ip.parse().unwrap()), "{ip} should be private");
        }
        for ip in ["8.8.8.8", "1.1.1.1", "2606:4700:4700::1111"] {
            assert!(!is_ip_private(&ip.parse().unwrap()), "{ip} should be public");
        }
    }

    #[tokio::test]
    async fn test_scheme_and_host_rules() {
        let policy = policy(true);
        assert!(!policy.permits(&url("ftp://93.184.216.34/file")).await);
        assert!(!policy.permits(&url("https://blocked.example/")).await);
        assert!(!policy.permits(&url("http://127.0.0.1:8080/")).await);
        assert!(!policy.permits(&url("http://[::1]/")).await);
        assert!(policy.permits(&url("https://93.184.216.34/")).await);
    }

    struct FixedLookup(Vec<IpAddr>);

    #[async_trait]
    impl HostLookup for FixedLookup {
        async fn lookup(&self, _host: &str) -> std::io::Result<Vec<IpAddr>> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_names_resolving_to_private_addresses() {
        let internal = policy(true).with_lookup(Arc::new(FixedLookup(vec![
            "93.184.216.34".parse().unwrap(),
            "10.0.0.7".parse().unwrap(),
        ])));
        assert!(!internal.permits(&url("https://intranet.example/")).await);

        let public = policy(true).with_lookup(Arc::new(FixedLookup(vec!["93.184.216.34".parse().unwrap()])));
        assert!(public.permits(&url("https://public.example/")).await);
    }

    #[tokio::test]
    async fn test_private_allowed_when_disabled() {
        assert!(policy(false).permits(&url("http://127.0.0.1:8080/")).await);
    }
}
