//! End-to-end behaviour of the resolver: ingest play info, then resolve
//! intercepted URLs.

use std::sync::Arc;

use cdn_resolver::{
    CdnResolver, RandomSource, ResolutionSource, ResolverConfig, Tier, config::DEFAULT_FALLBACK_HOST,
};
use serde_json::{Value, json};
use url::Url;

/// Always takes the first candidate.
struct FirstPick;

impl RandomSource for FirstPick {
    fn pick_index(&mut self, _len: usize) -> usize {
        0
    }
}

const MIRROR: &str = "http://upos-sz-mirrorcos.bilivideo.com/upgcxcode/12/34/5678-1-30080.m4s?e=ig8e&deadline=1700000000";
const MIRROR_2: &str = "https://upos-sz-mirrorhw.bilivideo.com/upgcxcode/12/34/5678-1-30080.m4s?e=ig8e&deadline=1700000000";
const BCACHE: &str = "https://cn-sccd-cu-01-01.bilivideo.com/upgcxcode/12/34/5678-1-30080.m4s?e=ig8e&deadline=1700000000";
const REDIRECT_P2P: &str = "https://upos-sz-302ppio.bilivideo.com/upgcxcode/12/34/5678-1-30080.m4s?e=ig8e&deadline=1700000000";
const MCDN: &str = "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/upgcxcode/99/88/7777-1-30280.m4s?e=ig8e";
const IP_DIRECT: &str = "https://123.45.67.89:4483/v1/resource/5678-1-30080.m4s?e=ig8e&deadline=1700000000";

fn resolver() -> CdnResolver {
    CdnResolver::with_random(ResolverConfig::default(), FirstPick).unwrap()
}

fn video_manifest(groups: &[&[&str]]) -> Value {
    let video: Vec<Value> = groups
        .iter()
        .map(|urls| {
            json!({
                "id": 80,
                "baseUrl": urls[0],
                "base_url": urls[0],
                "backupUrl": &urls[1..],
                "backup_url": &urls[1..],
            })
        })
        .collect();
    json!({ "code": 0, "data": { "dash": { "video": video, "audio": [] } } })
}

fn host_of(url: &str) -> String {
    Url::parse(url).unwrap().host_str().unwrap().to_owned()
}

#[test]
fn mirror_wins_for_every_member_of_the_group() {
    let mut resolver = resolver();
    let report = resolver.ingest(&video_manifest(&[&[MIRROR, IP_DIRECT]]), "test", false);
    assert_eq!(report.groups, 1);
    assert_eq!(report.keys_written, 2);

    let expected = MIRROR.replacen("http://", "https://", 1);
    let a = resolver.resolve_detailed(MIRROR, "test");
    assert_eq!(a.url, expected);
    assert_eq!(a.tier, Some(Tier::Mirror));
    assert_eq!(a.source, ResolutionSource::Cached);

    assert_eq!(resolver.resolve(IP_DIRECT, "test"), expected);
}

#[test]
fn peer_assisted_original_is_never_returned_when_a_better_tier_exists() {
    let mut resolver = resolver();
    resolver.ingest(&video_manifest(&[&[REDIRECT_P2P, BCACHE]]), "test", false);

    let out = resolver.resolve_detailed(REDIRECT_P2P, "test");
    assert_eq!(out.tier, Some(Tier::Bcache));
    assert_eq!(out.url, BCACHE);
    assert_ne!(out.url, REDIRECT_P2P);
}

#[test]
fn mcdn_group_borrows_hosts_from_earlier_groups() {
    let mut resolver = resolver();
    resolver.ingest(&video_manifest(&[&[MIRROR_2]]), "first", false);
    resolver.ingest(&video_manifest(&[&[MCDN]]), "second", false);

    let out = resolver.resolve_detailed(MCDN, "test");
    assert_eq!(out.tier, Some(Tier::McdnUpgcxcode));
    assert_eq!(host_of(&out.url), "upos-sz-mirrorhw.bilivideo.com");
    assert_eq!(
        out.url,
        "https://upos-sz-mirrorhw.bilivideo.com/upgcxcode/99/88/7777-1-30280.m4s?e=ig8e"
    );
}

#[test]
fn later_hosts_improve_earlier_policies() {
    let mut resolver = resolver();
    resolver.ingest(&video_manifest(&[&[MCDN]]), "first", false);
    assert_eq!(host_of(&resolver.resolve(MCDN, "test")), DEFAULT_FALLBACK_HOST);

    resolver.ingest(&video_manifest(&[&[BCACHE]]), "second", false);
    assert_eq!(
        host_of(&resolver.resolve(MCDN, "test")),
        "cn-sccd-cu-01-01.bilivideo.com"
    );

    resolver.ingest(&video_manifest(&[&[MIRROR_2]]), "third", false);
    assert_eq!(
        host_of(&resolver.resolve(MCDN, "test")),
        "upos-sz-mirrorhw.bilivideo.com"
    );
}

#[test]
fn cached_groups_still_contribute_hosts() {
    let mut resolver = resolver();
    resolver.ingest(&video_manifest(&[&[BCACHE], &[MCDN]]), "window.__playinfo__", false);
    let cached = resolver.policy_for(BCACHE).unwrap();

    // same request key as BCACHE, now listing a mirror
    let report = resolver.ingest(&video_manifest(&[&[MIRROR_2]]), "window.__playinfo__", false);
    assert_eq!(report.groups, 0);
    assert_eq!(report.skipped_groups, 1);
    assert_eq!(report.keys_written, 0);
    assert!(Arc::ptr_eq(&cached, &resolver.policy_for(BCACHE).unwrap()));

    assert!(resolver.host_pool().mirror.contains("upos-sz-mirrorhw.bilivideo.com"));
    assert_eq!(
        host_of(&resolver.resolve(MCDN, "test")),
        "upos-sz-mirrorhw.bilivideo.com"
    );
}

#[test]
fn hostless_candidates_never_enter_the_host_pool() {
    let mut resolver = resolver();
    let report = resolver.ingest(
        &video_manifest(&[&["file:///upgcxcode/99/88/7777-1-30280.m4s?e=ig8e"]]),
        "test",
        false,
    );
    assert_eq!(report.skipped_candidates, 1);
    assert!(resolver.host_pool().bcache.is_empty());

    resolver.ingest(&video_manifest(&[&[MCDN]]), "test", false);
    assert_eq!(host_of(&resolver.resolve(MCDN, "test")), DEFAULT_FALLBACK_HOST);
}

#[test]
fn only_playurl_responses_are_ingested() {
    let mut resolver = resolver();
    let body = video_manifest(&[&[MIRROR_2, REDIRECT_P2P]]).to_string();

    assert_eq!(
        resolver.ingest_response("https://api.bilibili.com/x/web-interface/nav", &body),
        None
    );
    assert_eq!(resolver.cache_len(), 0);

    let report = resolver
        .ingest_response(
            "https://api.bilibili.com/x/player/wbi/playurl?bvid=BV1xx411c7mD&cid=1",
            &body,
        )
        .unwrap();
    assert_eq!(report.groups, 1);
    assert_eq!(resolver.resolve(REDIRECT_P2P, "test"), MIRROR_2);
}

#[test]
fn ip_direct_before_any_ingest_is_proxy_wrapped() {
    let mut resolver = resolver();
    let out = resolver.resolve_detailed(IP_DIRECT, "xhr");
    assert_eq!(out.source, ResolutionSource::Fallback);
    assert_eq!(out.tier, Some(Tier::IpDirect));

    let wrapped = Url::parse(&out.url).unwrap();
    assert_eq!(wrapped.host_str(), Some("proxy-tf-all-ws.bilivideo.com"));
    let original = wrapped
        .query_pairs()
        .find(|(k, _)| k == "url")
        .map(|(_, v)| v.into_owned());
    assert_eq!(original.as_deref(), Some(IP_DIRECT));
    assert_eq!(resolver.cache_len(), 0);
}

#[test]
fn fallback_replaces_peer_assisted_hosts_without_touching_state() {
    let mut resolver = resolver();

    let out = resolver.resolve_detailed(REDIRECT_P2P, "fetch");
    assert_eq!(out.source, ResolutionSource::Fallback);
    assert_eq!(host_of(&out.url), DEFAULT_FALLBACK_HOST);

    let out = resolver.resolve_detailed(MIRROR, "fetch");
    assert_eq!(out.url, MIRROR.replacen("http://", "https://", 1));
    assert!(resolver.host_pool().mirror.is_empty());
    assert_eq!(resolver.cache_len(), 0);
}

#[test]
fn unrecognized_urls_pass_through() {
    let mut resolver = resolver();
    let url = "https://example.com/video.mp4";
    let out = resolver.resolve_detailed(url, "media.src");
    assert_eq!(out.url, url);
    assert_eq!(out.tier, None);
    assert_eq!(out.source, ResolutionSource::Passthrough);
}

#[test]
fn protocol_relative_requests_hit_the_cache() {
    let mut resolver = resolver();
    resolver.ingest(&video_manifest(&[&[MIRROR_2, REDIRECT_P2P]]), "test", false);

    let relative = REDIRECT_P2P.trim_start_matches("https:");
    let out = resolver.resolve_detailed(relative, "media.src");
    assert_eq!(out.source, ResolutionSource::Cached);
    assert_eq!(out.url, MIRROR_2);
}

#[test]
fn second_ingest_without_overwrite_changes_nothing() {
    let mut resolver = resolver();
    let manifest = video_manifest(&[&[MIRROR, IP_DIRECT], &[MCDN]]);

    let first = resolver.ingest(&manifest, "window.__playinfo__", false);
    assert_eq!(first.groups, 2);
    let before = resolver.policy_for(MIRROR).unwrap();
    let len = resolver.cache_len();

    let second = resolver.ingest(&manifest, "window.__playinfo__", false);
    assert_eq!(second.groups, 0);
    assert_eq!(second.skipped_groups, 2);
    assert_eq!(second.keys_written, 0);
    assert_eq!(resolver.cache_len(), len);
    assert!(Arc::ptr_eq(&before, &resolver.policy_for(MIRROR).unwrap()));
}

#[test]
fn overwrite_replaces_previous_policies() {
    let mut resolver = resolver();
    let shared_key_bcache = BCACHE;
    let shared_key_mirror = MIRROR_2;

    resolver.ingest(&video_manifest(&[&[shared_key_bcache]]), "window.__playinfo__", false);
    let before = resolver.policy_for(shared_key_bcache).unwrap();
    assert_eq!(before.tier(), Some(Tier::Bcache));

    // a stale observation must not replace the cached group
    resolver.ingest(&video_manifest(&[&[shared_key_mirror]]), "window.__playinfo__", false);
    assert!(Arc::ptr_eq(&before, &resolver.policy_for(shared_key_bcache).unwrap()));

    let report = resolver.ingest(&video_manifest(&[&[shared_key_mirror]]), "playurl XHR API", true);
    assert_eq!(report.groups, 1);
    let after = resolver.policy_for(shared_key_bcache).unwrap();
    assert!(!Arc::ptr_eq(&before, &after));
    assert_eq!(after.tier(), Some(Tier::Mirror));
    assert_eq!(resolver.resolve(shared_key_bcache, "test"), MIRROR_2);
}

#[test]
fn cache_never_exceeds_capacity() {
    let config = ResolverConfig::builder().cache_capacity(4).build();
    let mut resolver = CdnResolver::with_random(config, FirstPick).unwrap();

    let urls: Vec<String> = (0..10)
        .map(|i| format!("https://cn-a.bilivideo.com/upgcxcode/{i}/seg.m4s"))
        .collect();
    for url in &urls {
        resolver.ingest(&video_manifest(&[&[url.as_str()]]), "test", false);
        assert!(resolver.cache_len() <= 4);
    }

    assert_eq!(resolver.cache_len(), 4);
    assert_eq!(resolver.cache().evictions(), 6);
    assert!(resolver.policy_for(&urls[0]).is_none());
    assert!(resolver.policy_for(&urls[9]).is_some());
}

#[test]
fn resolving_refreshes_recency() {
    let config = ResolverConfig::builder().cache_capacity(2).build();
    let mut resolver = CdnResolver::with_random(config, FirstPick).unwrap();
    let a = "https://cn-a.bilivideo.com/upgcxcode/1/a.m4s";
    let b = "https://cn-a.bilivideo.com/upgcxcode/1/b.m4s";
    let c = "https://cn-a.bilivideo.com/upgcxcode/1/c.m4s";

    resolver.ingest(&video_manifest(&[&[a], &[b]]), "test", false);
    resolver.resolve(a, "test");
    resolver.ingest(&video_manifest(&[&[c]]), "test", false);

    assert!(resolver.policy_for(a).is_some());
    assert!(resolver.policy_for(b).is_none());
}

#[test]
fn bangumi_layout_and_legacy_broker_urls() {
    let mut resolver = resolver();
    let legacy = "http://xy1x2x.szbdyd.com:8000/upgcx/1.m4s?xy_usource=upos-sz-mirrorali.bilivideo.com";
    let manifest = json!({
        "code": 0,
        "result": {
            "video_info": {
                "dash": {
                    "audio": [{ "base_url": legacy, "backup_url": [IP_DIRECT] }]
                }
            }
        }
    });

    let report = resolver.ingest(&manifest, "bangumi", false);
    assert_eq!(report.groups, 1);

    let out = resolver.resolve_detailed(IP_DIRECT, "test");
    assert_eq!(out.tier, Some(Tier::LegacyAltDomain));
    assert_eq!(
        out.url,
        "https://upos-sz-mirrorali.bilivideo.com/upgcx/1.m4s?xy_usource=upos-sz-mirrorali.bilivideo.com"
    );
}

#[test]
fn unclassifiable_group_is_identity() {
    let mut resolver = resolver();
    let url = "https://example.com/file.m4s?x=1";
    let report = resolver.ingest(&video_manifest(&[&[url]]), "test", false);
    assert_eq!(report.groups, 1);
    assert_eq!(report.skipped_candidates, 1);

    let out = resolver.resolve_detailed(url, "test");
    assert_eq!(out.source, ResolutionSource::Cached);
    assert_eq!(out.tier, None);
    assert_eq!(out.url, url);
}

#[test]
fn raw_response_bodies_are_ingested() {
    let mut resolver = resolver();
    let body = video_manifest(&[&[MIRROR_2, MCDN]]).to_string();
    let report = resolver.ingest_json(&body, "playurl XHR API", true);
    assert_eq!(report.groups, 1);
    assert_eq!(resolver.resolve(MCDN, "test"), MIRROR_2);

    let report = resolver.ingest_json("{\"code\":-404,", "playurl XHR API", true);
    assert_eq!(report.groups, 0);
}
