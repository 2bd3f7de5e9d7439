//! Reference resolution: scheme dispatch, digest pinning, decoding, source hydration.

use crate::decode::{decode_group, decode_policy, validate_embedded};
use crate::fetch::{Fetched, Fetcher, LoadContext};
use crate::file::FileFetcher;
use crate::http::HttpFetcher;
use crate::provider::ProviderFetcher;
use crate::reference::{PolicyRef, Scheme};
use attestguard_domain::{detect_policy_kind, verify_digest};
use attestguard_types::{
    LoadError, Policy, PolicyAttachment, PolicyError, PolicyGroup, PolicyGroupAttachment,
    PolicySource, ResourceRef,
};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// A policy ready for evaluation.
#[derive(Clone, Debug)]
pub struct LoadedPolicy {
    pub policy: Policy,
    /// Provenance of the loaded document. `None` for embedded policies.
    pub reference: Option<ResourceRef>,
    /// Executable scripts in declaration order.
    pub sources: Vec<PolicySource>,
}

impl LoadedPolicy {
    pub fn name(&self) -> &str {
        &self.policy.metadata.name
    }
}

#[derive(Clone, Debug)]
pub struct LoadedGroup {
    pub group: PolicyGroup,
    pub reference: ResourceRef,
    /// Directory nested `file://` references resolve against.
    pub base_dir: Option<Utf8PathBuf>,
}

impl LoadedGroup {
    pub fn name(&self) -> &str {
        &self.group.metadata.name
    }
}

/// Owns one strategy per scheme and picks between them with [`Scheme`].
pub struct Resolver {
    file: FileFetcher,
    http: HttpFetcher,
    provider: Option<ProviderFetcher>,
}

impl Resolver {
    pub fn new(http: HttpFetcher, provider: Option<ProviderFetcher>) -> Self {
        Self {
            file: FileFetcher,
            http,
            provider,
        }
    }

    /// File and HTTP(S) only; provider references fail with `NoProvider`.
    pub fn local() -> Result<Self, PolicyError> {
        Ok(Self::new(HttpFetcher::with_defaults()?, None))
    }

    fn fetcher_for(&self, reference: &PolicyRef) -> Result<&dyn Fetcher, PolicyError> {
        let fetcher: &dyn Fetcher = match reference.scheme() {
            Scheme::File => &self.file,
            Scheme::Http | Scheme::Https => &self.http,
            Scheme::Chainloop => self.provider.as_ref().ok_or_else(|| {
                PolicyError::load(
                    reference.uri(),
                    LoadError::NoProvider(reference.raw().to_string()),
                )
            })?,
        };
        Ok(fetcher)
    }

    /// Fetch raw bytes and check them against the pinned digest, if any.
    ///
    /// Returns the fetched document and its `sha256:<hex>` digest.
    pub fn fetch(
        &self,
        reference: &PolicyRef,
        ctx: &LoadContext,
    ) -> Result<(Fetched, String), PolicyError> {
        let fetched = self.fetcher_for(reference)?.fetch(reference, ctx)?;
        let digest = verify_digest(reference.digest(), &fetched.bytes)
            .map_err(|e| PolicyError::load(&fetched.uri, e))?;
        debug!(
            uri = %fetched.uri,
            %digest,
            pinned = reference.digest().is_some(),
            "loaded document"
        );
        Ok((fetched, digest))
    }

    /// Resolve an attachment into a policy with its sources.
    ///
    /// `ctx.base_dir` is where the attachment was declared; relative `file://`
    /// references and relative script paths of embedded policies resolve against it.
    pub fn resolve_policy(
        &self,
        attachment: &PolicyAttachment,
        ctx: &LoadContext,
    ) -> Result<LoadedPolicy, PolicyError> {
        match (&attachment.reference, &attachment.embedded) {
            (Some(_), Some(_)) => Err(PolicyError::spec(
                attachment.label(),
                "attachment has both ref and embedded",
            )),
            (None, None) => Err(PolicyError::spec(
                attachment.label(),
                "attachment has neither ref nor embedded",
            )),
            (None, Some(policy)) => {
                let origin = attachment.label();
                validate_embedded(policy, &origin)?;
                let root = SourceRoot::Local(ctx.base_dir.as_deref());
                let sources = hydrate_sources(policy, &origin, root)?;
                Ok(LoadedPolicy {
                    policy: policy.as_ref().clone(),
                    reference: None,
                    sources,
                })
            }
            (Some(raw), None) => {
                let reference = PolicyRef::parse(raw)?;
                let (fetched, digest) = self.fetch(&reference, ctx)?;
                let policy = decode_policy(&fetched.bytes, &fetched.uri)?;

                let root = match reference.scheme() {
                    Scheme::File => SourceRoot::Local(fetched.base_dir.as_deref()),
                    _ => SourceRoot::Remote,
                };
                let sources = hydrate_sources(&policy, &fetched.uri, root)?;
                let resource = ResourceRef {
                    name: policy.metadata.name.clone(),
                    uri: fetched.uri,
                    digest: Some(digest),
                    org_name: fetched.org,
                };
                Ok(LoadedPolicy {
                    policy,
                    reference: Some(resource),
                    sources,
                })
            }
        }
    }

    /// Load the group named by a group attachment.
    pub fn resolve_group(
        &self,
        attachment: &PolicyGroupAttachment,
        base_dir: Option<&Utf8Path>,
    ) -> Result<LoadedGroup, PolicyError> {
        if attachment.reference.trim().is_empty() {
            return Err(PolicyError::reference(
                &attachment.reference,
                "group attachment has no ref",
            ));
        }
        let reference = PolicyRef::parse(&attachment.reference)?;
        let ctx = LoadContext::group().with_base_dir(base_dir.map(Utf8Path::to_path_buf));
        let (fetched, digest) = self.fetch(&reference, &ctx)?;
        let group = decode_group(&fetched.bytes, &fetched.uri)?;

        let resource = ResourceRef {
            name: group.metadata.name.clone(),
            uri: fetched.uri,
            digest: Some(digest),
            org_name: fetched.org,
        };
        Ok(LoadedGroup {
            group,
            reference: resource,
            base_dir: fetched.base_dir,
        })
    }
}

enum SourceRoot<'a> {
    /// Scripts with a `path` are read from disk, relative to the directory if given.
    Local(Option<&'a Utf8Path>),
    /// Documents from remote locations must embed their scripts.
    Remote,
}

fn hydrate_sources(
    policy: &Policy,
    origin: &str,
    root: SourceRoot<'_>,
) -> Result<Vec<PolicySource>, PolicyError> {
    let scripts = policy.spec.scripts();
    if scripts.is_empty() {
        return Err(PolicyError::spec(origin, "policy declares no source"));
    }

    let mut sources = Vec::with_capacity(scripts.len());
    for script in scripts {
        let body = match (&script.embedded, &script.path) {
            (Some(text), _) => text.clone().into_bytes(),
            (None, Some(path)) => read_script(path, origin, &root)?,
            (None, None) => return Err(PolicyError::spec(origin, "policy script has no source")),
        };
        sources.push(PolicySource {
            material_kind: script.kind.filter(|k| !k.is_empty()),
            kind: detect_policy_kind(&body),
            body,
        });
    }
    Ok(sources)
}

fn read_script(path: &str, origin: &str, root: &SourceRoot<'_>) -> Result<Vec<u8>, PolicyError> {
    let SourceRoot::Local(base) = root else {
        return Err(PolicyError::spec(
            origin,
            format!("remote policy references local source {path:?}"),
        ));
    };
    let path = Utf8Path::new(path);
    let full = match base {
        Some(dir) if path.is_relative() => dir.join(path),
        _ => path.to_path_buf(),
    };
    std::fs::read(&full).map_err(|e| PolicyError::load(format!("file://{full}"), LoadError::Io(e)))
}
