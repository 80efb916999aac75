//! URL shape matchers.
//!
//! Every function here is a total predicate: malformed input yields `false`.

use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Path marker of segment delivery endpoints. Any host serving it is interchangeable.
pub const UPGCXCODE_MARKER: &str = "/upgcxcode/";

/// Legacy peer-assisted broker domain.
pub const LEGACY_BROKER_DOMAIN: &str = "szbdyd.com";

/// Query parameter of legacy broker URLs carrying the real origin host.
pub const LEGACY_SOURCE_PARAM: &str = "xy_usource";

/// Quality-tag query parameter; `os=mcdn` marks a mirror-named peer-assisted variant.
pub const QUALITY_TAG_PARAM: &str = "os";
pub const QUALITY_TAG_PEER_ASSISTED: &str = "mcdn";

/// Substrings identifying known peer-assisted CDN brokers.
pub const PEER_ASSISTED_KEYWORDS: &[&str] = &[
    "302ppio",
    "302kodo",
    ".mcdn.bilivideo",
    LEGACY_BROKER_DOMAIN,
    ".nexusedgeio.com",
    // qiniu pcdn
    ".ahdohpiechei.com",
];

/// Hosts the player talks to that never serve media segments.
const NON_VIDEO_KEYWORDS: &[&str] = &["bilibili.com", "hdslb.com", "bvc.bilivideo.com"];

const PLAYURL_API: &str = "api.bilibili.com/x/player/wbi/playurl";

// `upos-<region>-<name>` mirrors. The name must not start with `302`, checked
// on the capture since the regex crate has no lookahead.
static UPOS_MIRROR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://upos-[A-Za-z0-9_]+-([A-Za-z0-9_]+)\.(?:bilivideo|akamaized)\.(?:com|net)/upgcxcode",
    )
    .unwrap()
});

static TF_MIRROR_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^https?://(?:upos|proxy)-tf-[^/]+\.(?:bilivideo|akamaized)\.(?:com|net)/upgcxcode")
        .unwrap()
});

static IP_DIRECT_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^https?://(?:(?:[0-9]{1,3}\.){3}[0-9]{1,3}|[^/]+\.mcdn\.bilivideo\.(?:com|cn|net))(?::[0-9]{1,5})?/v[0-9]/resource",
    )
    .unwrap()
});

#[inline]
pub fn is_upgcxcode_path(url: &str) -> bool {
    url.contains(UPGCXCODE_MARKER)
}

/// Regional mirror host serving an upgcxcode path, excluding the numeric
/// `302` redirect naming used by peer-assisted brokers.
pub fn is_mirror_shape(url: &str) -> bool {
    if let Some(caps) = UPOS_MIRROR_REGEX.captures(url) {
        let name = caps.get(1).map_or("", |m| m.as_str());
        if !name.starts_with("302") {
            return true;
        }
    }
    TF_MIRROR_REGEX.is_match(url)
}

pub fn is_peer_assisted_host(hostname: &str) -> bool {
    if PEER_ASSISTED_KEYWORDS
        .iter()
        .any(|keyword| hostname.contains(keyword))
    {
        return true;
    }
    // upos-sz-302ppio.bilivideo.com -> *.nexusedgeio.com
    // upos-sz-302kodo.bilivideo.com -> *.ahdohpiechei.com
    hostname
        .split('.')
        .next()
        .is_some_and(|label| label.contains("302"))
}

pub fn is_legacy_alt_domain_shape(url: &str) -> bool {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.contains(LEGACY_BROKER_DOMAIN)))
        .unwrap_or(false)
}

/// Bare IPv4 or `*.mcdn.bilivideo.*` host serving the `/v<n>/resource` path.
#[inline]
pub fn is_ip_direct_shape(url: &str) -> bool {
    IP_DIRECT_REGEX.is_match(url)
}

/// Urls the interception layer should leave alone: site pages, static assets
/// and live-stream endpoints.
pub fn is_known_non_video_url(url: &str) -> bool {
    NON_VIDEO_KEYWORDS.iter().any(|keyword| url.contains(keyword))
}

/// Player URL API whose responses carry authoritative play info.
#[inline]
pub fn is_playurl_api(url: &str) -> bool {
    url.contains(PLAYURL_API)
}

/// `blob:` sources are produced from already intercepted fetches.
#[inline]
pub fn is_blob_url(url: &str) -> bool {
    url.starts_with("blob:")
}
