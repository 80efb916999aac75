//! The resolver ties everything together: it ingests play info into cached
//! policies and answers single URL replacement queries.
//!
//! There is exactly one resolver per page session. The interception layer owns
//! it and calls [`CdnResolver::ingest`] whenever play info becomes visible and
//! [`CdnResolver::resolve`] for every outgoing media request. Neither call
//! fails: bad input degrades to "no replacement".

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::{
    cache::{PolicyCache, request_key},
    classify::{ObservedHost, Tier, TierBuckets, classify_candidate, classify_group},
    config::ResolverConfig,
    error::{CandidateError, ResolverError},
    host_pool::HostPool,
    manifest::{CandidateSet, PlayInfo},
    patterns::is_playurl_api,
    policy::ReplacementPolicy,
    random::{RandomSource, ThreadRandom},
};

/// Where a resolved URL came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Policy of an ingested candidate group.
    Cached,
    /// Single URL classification, nothing ingested for this request yet.
    Fallback,
    /// Returned untouched.
    Passthrough,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    pub url: String,
    pub tier: Option<Tier>,
    pub source: ResolutionSource,
}

impl Resolution {
    /// A URL handed back untouched.
    pub fn passthrough(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            tier: None,
            source: ResolutionSource::Passthrough,
        }
    }
}

/// Counters describing one ingest call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    /// Candidate groups whose policy was (re)derived.
    pub groups: usize,
    /// Groups left alone because every member key was already cached.
    pub skipped_groups: usize,
    /// Candidates dropped as malformed or unrecognized.
    pub skipped_candidates: usize,
    /// Cache entries written.
    pub keys_written: usize,
}

pub struct CdnResolver {
    config: ResolverConfig,
    hosts: HostPool,
    cache: PolicyCache,
    random: Box<dyn RandomSource>,
}

impl CdnResolver {
    pub fn new(config: ResolverConfig) -> Result<Self, ResolverError> {
        Self::with_random(config, ThreadRandom)
    }

    /// Creates a resolver drawing its picks from `random`.
    pub fn with_random(
        config: ResolverConfig,
        random: impl RandomSource + 'static,
    ) -> Result<Self, ResolverError> {
        config.validate()?;
        let cache = PolicyCache::new(config.cache_capacity)?;
        Ok(Self {
            config,
            hosts: HostPool::new(),
            cache,
            random: Box::new(random),
        })
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn host_pool(&self) -> &HostPool {
        &self.hosts
    }

    pub fn cache(&self) -> &PolicyCache {
        &self.cache
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Policy cached for `url`, without refreshing its recency.
    pub fn policy_for(&self, url: &str) -> Option<Arc<ReplacementPolicy>> {
        let parsed = parse_request_url(url).ok()?;
        self.cache.peek(&request_key(&parsed)).cloned()
    }

    /// Ingests decoded play info.
    ///
    /// Without `overwrite`, groups already cached are left alone, so a
    /// less reliable source (the inline page global) cannot clobber what a
    /// more reliable one (the playurl API response) produced.
    pub fn ingest(&mut self, manifest: &Value, meta: &str, overwrite: bool) -> IngestReport {
        match PlayInfo::from_value(manifest) {
            Ok(info) => self.ingest_play_info(&info, meta, overwrite),
            Err(e) => {
                warn!(meta, error = %e, "Invalid play info data, nothing ingested");
                IngestReport::default()
            }
        }
    }

    /// Ingests a raw response body.
    pub fn ingest_json(&mut self, body: &str, meta: &str, overwrite: bool) -> IngestReport {
        match PlayInfo::from_json_str(body) {
            Ok(info) => self.ingest_play_info(&info, meta, overwrite),
            Err(e) => {
                error!(meta, error = %e, "Failed to parse play info body");
                IngestReport::default()
            }
        }
    }

    /// Ingests an intercepted network response. Only bodies of the playurl
    /// API carry play info; they are authoritative and overwrite what the
    /// page provided. Returns `None` for any other request URL.
    pub fn ingest_response(&mut self, request_url: &str, body: &str) -> Option<IngestReport> {
        if !is_playurl_api(request_url) {
            debug!(url = request_url, "Not a playurl response, ignoring");
            return None;
        }
        Some(self.ingest_json(body, "playurl XHR API", true))
    }

    pub fn ingest_play_info(&mut self, info: &PlayInfo, meta: &str, overwrite: bool) -> IngestReport {
        let mut report = IngestReport::default();
        for entry in &info.entries {
            debug!(track = %entry.track, index = entry.index, "Processing track entry");
            self.ingest_group(&entry.candidates, overwrite, &mut report);
        }

        info!(
            meta,
            layout = %info.layout,
            groups = report.groups,
            skipped_groups = report.skipped_groups,
            keys = report.keys_written,
            "CDN URLs extracted"
        );
        report
    }

    fn ingest_group(&mut self, candidates: &CandidateSet, overwrite: bool, report: &mut IngestReport) {
        let mut keys: Vec<String> = candidates
            .iter()
            .filter_map(|candidate| Url::parse(candidate).ok())
            .map(|url| request_key(&url))
            .collect();
        keys.sort_unstable();
        keys.dedup();

        if keys.is_empty() {
            debug!(?candidates, "No parseable candidate in group, skipping");
            report.skipped_candidates += candidates.len();
            return;
        }

        // Hosts are recorded even for groups already cached, so earlier
        // policies pick up better hosts from repeated play info.
        let group = classify_group(candidates, &self.config);
        for host in &group.observed {
            match host {
                ObservedHost::Mirror(host) => self.hosts.mirror.insert(host),
                ObservedHost::Bcache(host) => self.hosts.bcache.insert(host),
            };
        }

        if !overwrite && keys.iter().all(|key| self.cache.contains(key)) {
            debug!(keys = keys.len(), "Candidate group already cached, skipping");
            report.skipped_groups += 1;
            return;
        }

        for skipped in &group.skipped {
            log_skipped(skipped);
        }
        report.skipped_candidates += group.skipped.len();

        let policy = Arc::new(ReplacementPolicy::from_buckets(group.buckets));
        match policy.tier() {
            Some(tier) => info!(
                tier = %tier,
                replacement = policy.label(),
                candidates = ?policy.candidates(),
                "Found {} {} type CDN URLs, future replacement will be chosen from these",
                policy.candidates().len(),
                tier
            ),
            None => error!(?candidates, "Failed to get replacement CDN URL"),
        }

        for key in keys {
            self.cache.insert(key, Arc::clone(&policy));
            report.keys_written += 1;
        }
        report.groups += 1;
    }

    /// Returns the URL to request instead of `url`. Never fails.
    pub fn resolve(&mut self, url: &str, meta: &str) -> String {
        self.resolve_detailed(url, meta).url
    }

    pub fn resolve_detailed(&mut self, url: &str, meta: &str) -> Resolution {
        let parsed = match parse_request_url(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(meta, url, error = %e, "Cannot parse request URL, leaving it untouched");
                return Resolution::passthrough(url);
            }
        };
        let key = request_key(&parsed);

        if let Some(policy) = self.cache.get(&key) {
            let replaced =
                policy.select(parsed.as_str(), &self.hosts, self.random.as_mut(), &self.config);
            debug!(meta, key = %key, from = parsed.as_str(), to = %replaced, "Replaced CDN URL");
            return Resolution {
                url: replaced,
                tier: policy.tier(),
                source: ResolutionSource::Cached,
            };
        }

        warn!(
            meta,
            url = parsed.as_str(),
            key = %key,
            "No matching CDN URL group found, using single URL replacement"
        );
        self.resolve_single(parsed.as_str(), meta)
    }

    // Same rules as group classification, with no siblings to compare
    // against. Nothing is cached and the host pool is left alone.
    fn resolve_single(&mut self, url: &str, meta: &str) -> Resolution {
        match classify_candidate(url, &self.config) {
            Ok(classified) => {
                let mut buckets = TierBuckets::new();
                buckets.insert(classified.tier, classified.url);
                let policy = ReplacementPolicy::from_buckets(buckets);
                Resolution {
                    url: policy.select(url, &self.hosts, self.random.as_mut(), &self.config),
                    tier: policy.tier(),
                    source: ResolutionSource::Fallback,
                }
            }
            Err(e) => {
                error!(meta, url, error = %e, "Basic P2P replacement failed");
                Resolution::passthrough(url)
            }
        }
    }
}

impl Default for CdnResolver {
    fn default() -> Self {
        Self {
            config: ResolverConfig::default(),
            hosts: HostPool::new(),
            cache: PolicyCache::default(),
            random: Box::new(ThreadRandom),
        }
    }
}

impl std::fmt::Debug for CdnResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CdnResolver")
            .field("config", &self.config)
            .field("hosts", &self.hosts)
            .field("cache", &self.cache)
            .finish_non_exhaustive()
    }
}

/// Parses an intercepted request URL. Protocol-relative URLs are taken as https.
pub fn parse_request_url(url: &str) -> Result<Url, ResolverError> {
    let parsed = if url.starts_with("//") {
        Url::parse(&format!("https:{url}"))
    } else {
        Url::parse(url)
    };
    parsed.map_err(|e| ResolverError::invalid_url(url, e.to_string()))
}

fn log_skipped(skipped: &CandidateError) {
    match skipped {
        CandidateError::Unrecognized(url) => error!(url = %url, "Unrecognized CDN URL pattern"),
        CandidateError::Malformed { url, reason } => {
            debug!(url = %url, reason = %reason, "Failed to process CDN URL, skipping")
        }
    }
}
