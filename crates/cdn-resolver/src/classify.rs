//! Candidate classification into delivery tiers.

use std::fmt;

use serde::Serialize;
use url::Url;

use crate::{
    config::ResolverConfig,
    error::CandidateError,
    host_pool::{normalize_https, set_host},
    manifest::CandidateSet,
    patterns::{
        LEGACY_SOURCE_PARAM, QUALITY_TAG_PARAM, QUALITY_TAG_PEER_ASSISTED, is_ip_direct_shape,
        is_legacy_alt_domain_shape, is_mirror_shape, is_peer_assisted_host, is_upgcxcode_path,
    },
};

/// Delivery tier of a candidate URL, declared from best to worst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    /// Operator-run mirror.
    Mirror,
    /// Self-hosted point of presence.
    Bcache,
    /// Peer-assisted upgcxcode URL, fixed by swapping its host.
    McdnUpgcxcode,
    /// Legacy broker URL, fixed through its source parameter or a host swap.
    LegacyAltDomain,
    /// Bare IP or mcdn resource URL, only usable through the proxy.
    IpDirect,
}

impl Tier {
    pub const PRIORITY: [Tier; 5] = [
        Tier::Mirror,
        Tier::Bcache,
        Tier::McdnUpgcxcode,
        Tier::LegacyAltDomain,
        Tier::IpDirect,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Mirror => "mirror",
            Tier::Bcache => "bcache",
            Tier::McdnUpgcxcode => "mcdn-upgcxcode",
            Tier::LegacyAltDomain => "legacy-alt-domain",
            Tier::IpDirect => "ip-direct",
        }
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host worth remembering for later host substitution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ObservedHost {
    Mirror(String),
    Bcache(String),
}

/// A candidate filed under its tier, in the form it will be served.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classified {
    pub tier: Tier,
    pub url: String,
    pub observed: Option<ObservedHost>,
}

impl Classified {
    fn new(tier: Tier, url: impl Into<String>) -> Self {
        Self {
            tier,
            url: url.into(),
            observed: None,
        }
    }

    fn observing(mut self, host: ObservedHost) -> Self {
        self.observed = Some(host);
        self
    }
}

/// Classifies one candidate. Rules are tried in order and the first match wins.
pub fn classify_candidate(
    candidate: &str,
    config: &ResolverConfig,
) -> Result<Classified, CandidateError> {
    if is_upgcxcode_path(candidate) {
        let mut url = parse(candidate)?;
        let host = match url.host_str() {
            Some(host) if !host.is_empty() => host.to_owned(),
            _ => return Err(CandidateError::malformed(candidate, "missing host")),
        };

        if is_mirror_shape(candidate) {
            // Mirror-named hosts can still be peer-assisted:
            // upos-sz-mirrorcoso1.bilivideo.com with os=mcdn, or upos-*-302*
            if !has_peer_assisted_tag(&url) && !is_peer_assisted_host(&host) {
                normalize(&mut url, candidate)?;
                return Ok(Classified::new(Tier::Mirror, url).observing(ObservedHost::Mirror(host)));
            }
            return to_placeholder(url, candidate, config)
                .map(|url| Classified::new(Tier::McdnUpgcxcode, url));
        }

        if is_peer_assisted_host(&host) {
            return to_placeholder(url, candidate, config)
                .map(|url| Classified::new(Tier::McdnUpgcxcode, url));
        }

        // cn-sccd-cu-01-01.bilivideo.com style self-hosted cache
        return Ok(Classified::new(Tier::Bcache, candidate).observing(ObservedHost::Bcache(host)));
    }

    if is_ip_direct_shape(candidate) {
        return Ok(Classified::new(Tier::IpDirect, candidate));
    }

    if is_legacy_alt_domain_shape(candidate) {
        let mut url = parse(candidate)?;
        normalize(&mut url, candidate)?;

        let source_host = url
            .query_pairs()
            .find(|(key, _)| key == LEGACY_SOURCE_PARAM)
            .map(|(_, value)| value.into_owned())
            .filter(|value| !value.is_empty());

        let replaced = source_host
            .as_deref()
            .is_some_and(|host| set_host(&mut url, host).is_ok());
        if !replaced {
            set_host(&mut url, &config.placeholder_host)
                .map_err(|e| CandidateError::malformed(candidate, e))?;
        }
        return Ok(Classified::new(Tier::LegacyAltDomain, url));
    }

    Err(CandidateError::Unrecognized(candidate.to_owned()))
}

fn parse(candidate: &str) -> Result<Url, CandidateError> {
    Url::parse(candidate).map_err(|e| CandidateError::malformed(candidate, e))
}

fn normalize(url: &mut Url, candidate: &str) -> Result<(), CandidateError> {
    normalize_https(url).map_err(|e| CandidateError::malformed(candidate, e))
}

fn has_peer_assisted_tag(url: &Url) -> bool {
    url.query_pairs()
        .find(|(key, _)| key == QUALITY_TAG_PARAM)
        .is_some_and(|(_, value)| value == QUALITY_TAG_PEER_ASSISTED)
}

// The original host is replaced later anyway; a fixed placeholder collapses
// otherwise identical URLs.
fn to_placeholder(
    mut url: Url,
    candidate: &str,
    config: &ResolverConfig,
) -> Result<Url, CandidateError> {
    normalize(&mut url, candidate)?;
    set_host(&mut url, &config.placeholder_host)
        .map_err(|e| CandidateError::malformed(candidate, e))?;
    Ok(url)
}

/// Classified URLs of one candidate group, one deduplicated bucket per tier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TierBuckets {
    buckets: [Vec<String>; 5],
}

impl TierBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tier: Tier, url: impl Into<String>) -> bool {
        let url = url.into();
        let bucket = &mut self.buckets[tier.slot()];
        if bucket.contains(&url) {
            return false;
        }
        bucket.push(url);
        true
    }

    pub fn get(&self, tier: Tier) -> &[String] {
        &self.buckets[tier.slot()]
    }

    /// Highest-priority tier with at least one URL.
    pub fn best_tier(&self) -> Option<Tier> {
        Tier::PRIORITY
            .into_iter()
            .find(|tier| !self.get(*tier).is_empty())
    }

    pub fn len(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Tier, &[String])> {
        Tier::PRIORITY
            .into_iter()
            .map(|tier| (tier, self.get(tier)))
    }
}

/// Outcome of classifying a whole candidate group.
#[derive(Debug, Clone, Default)]
pub struct GroupClassification {
    pub buckets: TierBuckets,
    pub observed: Vec<ObservedHost>,
    pub skipped: Vec<CandidateError>,
}

/// Classifies every candidate independently; a bad candidate only drops itself.
pub fn classify_group(candidates: &CandidateSet, config: &ResolverConfig) -> GroupClassification {
    let mut group = GroupClassification::default();
    for candidate in candidates.iter() {
        match classify_candidate(candidate, config) {
            Ok(Classified {
                tier,
                url,
                observed,
            }) => {
                group.buckets.insert(tier, url);
                group.observed.extend(observed);
            }
            Err(e) => group.skipped.push(e),
        }
    }
    group
}
