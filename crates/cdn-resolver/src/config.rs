use serde::{Deserialize, Serialize};
use url::Host;

use crate::error::ResolverError;

/// Endpoint that tunnels IP-direct and non-upgcxcode mcdn URLs.
pub const DEFAULT_PROXY_HOST: &str = "proxy-tf-all-ws.bilivideo.com";

/// Last-resort mirror used when no mirror or bcache host has been observed yet.
pub const DEFAULT_FALLBACK_HOST: &str = "upos-sz-mirrorali.bilivideo.com";

/// Dummy host written into peer-assisted URLs while they wait for host
/// substitution. It only exists to collapse duplicates and must never be
/// returned to a caller.
pub const DEFAULT_PLACEHOLDER_HOST: &str =
    "cdn-resolver.placeholder-host-do-not-resolve.invalid";

pub const DEFAULT_CACHE_CAPACITY: usize = 200;

/// Configurable options for the resolver
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Maximum number of request keys kept in the policy cache
    pub cache_capacity: usize,

    /// Host of the proxy endpoint used for IP-direct URLs
    pub proxy_host: String,

    /// Mirror host used when the host pool is still empty
    pub fallback_host: String,

    /// Sentinel host used for de-duplication of peer-assisted URLs
    pub placeholder_host: String,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            proxy_host: DEFAULT_PROXY_HOST.to_owned(),
            fallback_host: DEFAULT_FALLBACK_HOST.to_owned(),
            placeholder_host: DEFAULT_PLACEHOLDER_HOST.to_owned(),
        }
    }
}

impl ResolverConfig {
    pub fn builder() -> ResolverConfigBuilder {
        ResolverConfigBuilder::new()
    }

    pub fn validate(&self) -> Result<(), ResolverError> {
        if self.cache_capacity == 0 {
            return Err(ResolverError::configuration(
                "cache_capacity must be greater than zero",
            ));
        }

        for (name, host) in [
            ("proxy_host", &self.proxy_host),
            ("fallback_host", &self.fallback_host),
            ("placeholder_host", &self.placeholder_host),
        ] {
            if let Err(e) = Host::parse(host) {
                return Err(ResolverError::configuration(format!(
                    "{name} `{host}` is not a valid host: {e}"
                )));
            }
        }

        if self.placeholder_host == self.fallback_host {
            return Err(ResolverError::configuration(
                "placeholder_host must differ from fallback_host",
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResolverConfigBuilder {
    config: ResolverConfig,
}

impl ResolverConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn proxy_host(mut self, host: impl Into<String>) -> Self {
        self.config.proxy_host = host.into();
        self
    }

    pub fn fallback_host(mut self, host: impl Into<String>) -> Self {
        self.config.fallback_host = host.into();
        self
    }

    pub fn placeholder_host(mut self, host: impl Into<String>) -> Self {
        self.config.placeholder_host = host.into();
        self
    }

    pub fn build(self) -> ResolverConfig {
        self.config
    }
}
