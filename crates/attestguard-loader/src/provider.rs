//! `chainloop://` strategy: remote lookup through a policy provider, cached per process.

use crate::fetch::{Fetched, Fetcher, LoadContext, ResourceKind};
use crate::http::build_client;
use crate::reference::{PolicyRef, ProviderRef};
use attestguard_domain::PinnedDigest;
use attestguard_types::{LoadError, PolicyError};
use parking_lot::Mutex;
use reqwest::Url;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// A document returned by a provider.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteRecord {
    pub body: Vec<u8>,
    /// Digest as reported by the provider (`sha256:<hex>`), informational only.
    pub digest: Option<String>,
    pub org: Option<String>,
}

/// Remote lookup service behind the provider scheme.
pub trait RemoteLookup: Send + Sync {
    fn lookup(
        &self,
        resource: ResourceKind,
        target: &ProviderRef,
        digest: Option<&PinnedDigest>,
    ) -> Result<RemoteRecord, PolicyError>;
}

/// Loaded provider documents keyed by resource kind and raw reference string.
///
/// Entries are immutable once stored and never evicted. Share one instance (via
/// `Arc`) between every fetcher that should see the same cache.
#[derive(Debug, Default)]
pub struct ProviderCache {
    entries: Mutex<HashMap<(ResourceKind, String), Fetched>>,
}

impl ProviderCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource: ResourceKind, raw: &str) -> Option<Fetched> {
        self.entries
            .lock()
            .get(&(resource, raw.to_string()))
            .cloned()
    }

    /// Store `fetched` unless an entry already exists; returns the stored value.
    pub fn insert(&self, resource: ResourceKind, raw: &str, fetched: Fetched) -> Fetched {
        self.entries
            .lock()
            .entry((resource, raw.to_string()))
            .or_insert(fetched)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct ProviderFetcher {
    lookup: Arc<dyn RemoteLookup>,
    cache: Arc<ProviderCache>,
}

impl ProviderFetcher {
    pub fn new(lookup: Arc<dyn RemoteLookup>, cache: Arc<ProviderCache>) -> Self {
        Self { lookup, cache }
    }

    pub fn cache(&self) -> &Arc<ProviderCache> {
        &self.cache
    }
}

impl Fetcher for ProviderFetcher {
    fn fetch(&self, reference: &PolicyRef, ctx: &LoadContext) -> Result<Fetched, PolicyError> {
        if let Some(hit) = self.cache.get(ctx.resource, reference.raw()) {
            debug!(reference = %reference, resource = %ctx.resource, "provider cache hit");
            return Ok(hit);
        }

        let target = ProviderRef::parse(reference)?;
        debug!(
            reference = %reference,
            resource = %ctx.resource,
            provider = target.provider.as_deref().unwrap_or("default"),
            "provider lookup"
        );
        let record = self.lookup.lookup(ctx.resource, &target, reference.digest())?;

        let fetched = Fetched {
            bytes: record.body,
            uri: reference.uri(),
            org: record.org.or(target.org),
            base_dir: None,
        };
        // The lock is not held across the lookup; a concurrent miss keeps the first value.
        Ok(self.cache.insert(ctx.resource, reference.raw(), fetched))
    }
}

/// One named provider endpoint.
#[derive(Clone, Debug)]
pub struct ProviderEndpoint {
    pub url: String,
    pub token: Option<String>,
}

/// HTTP client for provider endpoints.
///
/// `GET {url}/{policies|groups}/{name}?organization={org}&digest={digest}` with a
/// bearer token; the response carries the raw document body.
pub struct HttpLookup {
    client: Client,
    endpoints: BTreeMap<String, ProviderEndpoint>,
    default: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderResponse {
    #[serde(default)]
    digest: Option<String>,
    #[serde(default)]
    org_name: Option<String>,
    raw: RawDocument,
}

#[derive(Debug, Deserialize)]
struct RawDocument {
    body: String,
}

impl HttpLookup {
    pub fn new(
        endpoints: BTreeMap<String, ProviderEndpoint>,
        default: Option<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, PolicyError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoints,
            default,
        })
    }

    fn endpoint(&self, target: &ProviderRef) -> Result<&ProviderEndpoint, PolicyError> {
        let name = target
            .provider
            .as_deref()
            .or(self.default.as_deref())
            .unwrap_or_default();
        self.endpoints
            .get(name)
            .ok_or_else(|| PolicyError::load(&target.name, LoadError::NoProvider(name.to_string())))
    }
}

impl RemoteLookup for HttpLookup {
    fn lookup(
        &self,
        resource: ResourceKind,
        target: &ProviderRef,
        digest: Option<&PinnedDigest>,
    ) -> Result<RemoteRecord, PolicyError> {
        let endpoint = self.endpoint(target)?;
        let collection = match resource {
            ResourceKind::Policy => "policies",
            ResourceKind::Group => "groups",
        };
        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(org) = &target.org {
            query.push(("organization", org.clone()));
        }
        if let Some(d) = digest {
            query.push(("digest", d.to_string()));
        }

        let target_url = provider_url(&endpoint.url, collection, &target.name, &query)?;
        let url = target_url.to_string();
        let mut request = self.client.get(target_url);
        if let Some(token) = &endpoint.token {
            request = request.bearer_auth(token);
        }

        let remote_err = |e: reqwest::Error| PolicyError::load(&url, LoadError::Remote(e.to_string()));
        let response: ProviderResponse = request
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(remote_err)?
            .json()
            .map_err(remote_err)?;

        Ok(RemoteRecord {
            body: response.raw.body.into_bytes(),
            digest: response.digest,
            org: response.org_name,
        })
    }
}

/// `{base}/{collection}/{name}?{query}`. The name is a single path segment and
/// is percent-encoded as one.
fn provider_url(
    base: &str,
    collection: &str,
    name: &str,
    query: &[(&str, String)],
) -> Result<Url, PolicyError> {
    let mut url = Url::parse(base).map_err(|e| PolicyError::reference(base, e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| PolicyError::reference(base, "provider url cannot have a path"))?
        .pop_if_empty()
        .push(collection)
        .push(name);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingLookup {
        calls: AtomicUsize,
    }

    impl RemoteLookup for CountingLookup {
        fn lookup(
            &self,
            _resource: ResourceKind,
            target: &ProviderRef,
            _digest: Option<&PinnedDigest>,
        ) -> Result<RemoteRecord, PolicyError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(RemoteRecord {
                body: format!("{}#{n}", target.name).into_bytes(),
                digest: None,
                org: Some("acme".to_string()),
            })
        }
    }

    #[test]
    fn second_fetch_is_served_from_cache() {
        let lookup = Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
        });
        let cache = Arc::new(ProviderCache::new());
        let fetcher = ProviderFetcher::new(lookup.clone(), cache.clone());
        let reference = PolicyRef::parse("chainloop://sbom-present").expect("ref");

        let first = fetcher
            .fetch(&reference, &LoadContext::policy())
            .expect("first");
        let second = fetcher
            .fetch(&reference, &LoadContext::policy())
            .expect("second");

        assert_eq!(first, second);
        assert_eq!(first.bytes, b"sbom-present#0");
        assert_eq!(first.org.as_deref(), Some("acme"));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_is_scoped_by_resource_kind_and_instance() {
        let lookup = Arc::new(CountingLookup {
            calls: AtomicUsize::new(0),
        });
        let fetcher = ProviderFetcher::new(lookup.clone(), Arc::new(ProviderCache::new()));
        let reference = PolicyRef::parse("chainloop://shared-name").expect("ref");

        fetcher
            .fetch(&reference, &LoadContext::policy())
            .expect("policy");
        fetcher
            .fetch(&reference, &LoadContext::group())
            .expect("group");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 2);

        let other = ProviderFetcher::new(lookup.clone(), Arc::new(ProviderCache::new()));
        other
            .fetch(&reference, &LoadContext::policy())
            .expect("fresh cache");
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn insert_keeps_first_value() {
        let cache = ProviderCache::new();
        let a = Fetched {
            bytes: b"a".to_vec(),
            uri: "chainloop://x".to_string(),
            org: None,
            base_dir: None,
        };
        let b = Fetched {
            bytes: b"b".to_vec(),
            ..a.clone()
        };
        cache.insert(ResourceKind::Policy, "x", a.clone());
        assert_eq!(cache.insert(ResourceKind::Policy, "x", b), a);
    }

    #[test]
    fn unknown_provider_is_reported() {
        let lookup = HttpLookup::new(BTreeMap::new(), None, None).expect("client");
        let target = ProviderRef {
            provider: Some("nope".to_string()),
            org: None,
            name: "p".to_string(),
        };
        let err = lookup
            .lookup(ResourceKind::Policy, &target, None)
            .expect_err("no endpoint");
        assert!(err.to_string().contains("no policy provider configured"));
    }

    #[test]
    fn provider_url_encodes_name_as_one_segment() {
        let query = vec![("organization", "acme".to_string())];
        let url = provider_url("https://policies.example.com/v1/", "policies", "a b?c#d", &query)
            .expect("url");
        assert_eq!(
            url.as_str(),
            "https://policies.example.com/v1/policies/a%20b%3Fc%23d?organization=acme"
        );

        let bare = provider_url("https://policies.example.com", "groups", "../etc", &[]).expect("url");
        assert_eq!(bare.as_str(), "https://policies.example.com/groups/..%2Fetc");
    }
}
