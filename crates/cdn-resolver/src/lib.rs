//! CDN URL resolution for intercepted media requests.
//!
//! Play info lists several interchangeable URLs for every DASH segment. Some
//! point at operator mirrors, others at peer-assisted CDNs. The resolver
//! classifies them into [`Tier`]s, remembers the best option for every
//! request key and rewrites outgoing requests accordingly.
//!
//! ```
//! use cdn_resolver::{CdnResolver, ResolverConfig};
//! use serde_json::json;
//!
//! let mut resolver = CdnResolver::new(ResolverConfig::default()).unwrap();
//! resolver.ingest(
//!     &json!({ "data": { "dash": { "video": [{
//!         "baseUrl": "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/upgcxcode/12/34/1234-1-30080.m4s?e=1",
//!         "backupUrl": ["https://upos-sz-mirrorcos.bilivideo.com/upgcxcode/12/34/1234-1-30080.m4s?e=1"]
//!     }] } } }),
//!     "window.__playinfo__",
//!     false,
//! );
//!
//! let url = resolver.resolve(
//!     "https://xy1x2x3x4xy.mcdn.bilivideo.cn:4483/upgcxcode/12/34/1234-1-30080.m4s?e=1",
//!     "fetch",
//! );
//! assert_eq!(url, "https://upos-sz-mirrorcos.bilivideo.com/upgcxcode/12/34/1234-1-30080.m4s?e=1");
//! ```

pub mod cache;
pub mod classify;
pub mod config;
pub mod error;
pub mod host_pool;
pub mod manifest;
pub mod patterns;
pub mod policy;
pub mod random;
pub mod resolver;

pub use cache::{PolicyCache, request_key};
pub use classify::{Classified, ObservedHost, Tier, TierBuckets, classify_candidate};
pub use config::ResolverConfig;
pub use error::{CandidateError, ManifestError, ResolverError};
pub use host_pool::HostPool;
pub use manifest::{CandidateSet, Layout, MediaEntry, PlayInfo, TrackKind};
pub use policy::ReplacementPolicy;
pub use random::{RandomSource, SeededRandom, ThreadRandom};
pub use resolver::{CdnResolver, IngestReport, Resolution, ResolutionSource};
