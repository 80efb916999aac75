use tracing::{error, warn};
use url::Url;

use crate::{
    classify::{Tier, TierBuckets},
    config::ResolverConfig,
    error::ResolverError,
    host_pool::{HostPool, proxy_wrap, replace_host},
    random::{RandomSource, pick},
};

/// How every URL of one candidate group gets rewritten.
///
/// Derived once from the group's buckets and never mutated afterwards. Host
/// substitution still reads the live [`HostPool`], so hosts learned from later
/// groups improve earlier policies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplacementPolicy {
    tier: Option<Tier>,
    candidates: Vec<String>,
    buckets: TierBuckets,
}

impl ReplacementPolicy {
    pub fn from_buckets(buckets: TierBuckets) -> Self {
        let tier = buckets.best_tier();
        let candidates = tier
            .map(|tier| buckets.get(tier).to_vec())
            .unwrap_or_default();
        Self {
            tier,
            candidates,
            buckets,
        }
    }

    /// Selected tier, `None` when nothing in the group was classifiable.
    pub fn tier(&self) -> Option<Tier> {
        self.tier
    }

    /// URLs of the selected tier, in their classified form.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    pub fn buckets(&self) -> &TierBuckets {
        &self.buckets
    }

    pub fn label(&self) -> &'static str {
        match self.tier {
            Some(Tier::Mirror) => "mirror",
            Some(Tier::Bcache) => "bcache",
            Some(Tier::McdnUpgcxcode) => "mcdn upgcxcode -> host replacement",
            Some(Tier::LegacyAltDomain) => {
                "legacy alt domain -> source param or host replacement"
            }
            Some(Tier::IpDirect) => "ip direct -> proxy-wrapped",
            None => "none",
        }
    }

    /// Picks the replacement for `incoming`. Never fails: any rewrite error
    /// leaves `incoming` untouched.
    pub fn select(
        &self,
        incoming: &str,
        pool: &HostPool,
        source: &mut dyn RandomSource,
        config: &ResolverConfig,
    ) -> String {
        match self.try_select(incoming, pool, source, config) {
            Ok(url) => url,
            Err(e) => {
                warn!(url = incoming, error = %e, "Replacement failed, keeping the original URL");
                incoming.to_owned()
            }
        }
    }

    fn try_select(
        &self,
        incoming: &str,
        pool: &HostPool,
        source: &mut dyn RandomSource,
        config: &ResolverConfig,
    ) -> Result<String, ResolverError> {
        let Some(tier) = self.tier else {
            error!(url = incoming, "No replacement CDN URL available");
            return Ok(incoming.to_owned());
        };
        let Some(picked) = pick(source, &self.candidates) else {
            return Ok(incoming.to_owned());
        };

        match tier {
            Tier::Mirror | Tier::Bcache => Ok(picked.clone()),
            Tier::McdnUpgcxcode => replace_host(picked, pool, source, config),
            Tier::LegacyAltDomain => {
                let url = Url::parse(picked)
                    .map_err(|e| ResolverError::invalid_url(picked.as_str(), e.to_string()))?;
                // no usable source param during classification
                if url.host_str() == Some(config.placeholder_host.as_str()) {
                    replace_host(picked, pool, source, config)
                } else {
                    Ok(picked.clone())
                }
            }
            Tier::IpDirect => proxy_wrap(picked, config),
        }
    }
}
