//! Hosts observed while classifying upgcxcode URLs, and the rewrites built on
//! top of them.

use rustc_hash::FxHashSet;
use url::Url;

use crate::{
    config::ResolverConfig,
    error::ResolverError,
    random::{RandomSource, pick},
};

/// Insertion-ordered, grow-only set of hostnames.
#[derive(Debug, Clone, Default)]
pub struct HostSet {
    order: Vec<String>,
    seen: FxHashSet<String>,
}

impl HostSet {
    /// Adds `host` unless it is empty or already known.
    pub fn insert(&mut self, host: &str) -> bool {
        if host.is_empty() || self.seen.contains(host) {
            return false;
        }
        self.seen.insert(host.to_owned());
        self.order.push(host.to_owned());
        true
    }

    pub fn contains(&self, host: &str) -> bool {
        self.seen.contains(host)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Mirror and bcache hosts seen during the session. All upgcxcode hosts are
/// interchangeable, so any of them can serve any upgcxcode path.
#[derive(Debug, Clone, Default)]
pub struct HostPool {
    pub mirror: HostSet,
    pub bcache: HostSet,
}

impl HostPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Best known host: a mirror if any, else a bcache host, else the
    /// configured fallback mirror.
    pub fn pick_host<'a>(
        &'a self,
        source: &mut dyn RandomSource,
        config: &'a ResolverConfig,
    ) -> &'a str {
        pick(source, self.mirror.as_slice())
            .or_else(|| pick(source, self.bcache.as_slice()))
            .map_or(config.fallback_host.as_str(), String::as_str)
    }
}

/// Forces `https` on the default port.
pub fn normalize_https(url: &mut Url) -> Result<(), ResolverError> {
    url.set_scheme("https")
        .map_err(|_| ResolverError::invalid_url(url.as_str(), "cannot switch scheme to https"))?;
    url.set_port(Some(443))
        .map_err(|_| ResolverError::invalid_url(url.as_str(), "cannot set port"))?;
    Ok(())
}

pub fn set_host(url: &mut Url, host: &str) -> Result<(), ResolverError> {
    url.set_host(Some(host))
        .map_err(|e| ResolverError::invalid_url(url.as_str(), format!("cannot set host `{host}`: {e}")))
}

/// Moves an upgcxcode URL onto the best known host.
pub fn replace_host(
    url: &str,
    pool: &HostPool,
    source: &mut dyn RandomSource,
    config: &ResolverConfig,
) -> Result<String, ResolverError> {
    let mut parsed =
        Url::parse(url).map_err(|e| ResolverError::invalid_url(url, e.to_string()))?;
    normalize_https(&mut parsed)?;
    set_host(&mut parsed, pool.pick_host(source, config))?;
    Ok(parsed.into())
}

/// Tunnels `url` through the proxy endpoint as its `url` query parameter.
pub fn proxy_wrap(url: &str, config: &ResolverConfig) -> Result<String, ResolverError> {
    let endpoint = format!("https://{}/", config.proxy_host);
    let mut proxy = Url::parse(&endpoint).map_err(|e| ResolverError::invalid_url(endpoint, e.to_string()))?;
    proxy.query_pairs_mut().append_pair("url", url);
    Ok(proxy.into())
}
