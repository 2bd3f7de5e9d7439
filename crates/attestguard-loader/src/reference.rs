//! Reference syntax: `[scheme://]path[@sha256:<hex>]`.

use attestguard_domain::PinnedDigest;
use attestguard_types::{PolicyError, ids};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Scheme {
    File,
    Http,
    Https,
    Chainloop,
}

impl Scheme {
    /// Map a scheme string to a scheme. The empty scheme is the provider scheme.
    pub fn parse(s: &str) -> Option<Scheme> {
        match s {
            ids::SCHEME_FILE => Some(Scheme::File),
            ids::SCHEME_HTTP => Some(Scheme::Http),
            ids::SCHEME_HTTPS => Some(Scheme::Https),
            ids::SCHEME_CHAINLOOP | "" => Some(Scheme::Chainloop),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scheme::File => ids::SCHEME_FILE,
            Scheme::Http => ids::SCHEME_HTTP,
            Scheme::Https => ids::SCHEME_HTTPS,
            Scheme::Chainloop => ids::SCHEME_CHAINLOOP,
        }
    }
}

/// A parsed policy or group reference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PolicyRef {
    raw: String,
    scheme: Scheme,
    path: String,
    digest: Option<PinnedDigest>,
}

impl PolicyRef {
    pub fn parse(raw: &str) -> Result<Self, PolicyError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(PolicyError::reference(raw, "reference is empty"));
        }

        let (location, digest) = split_digest(trimmed)
            .map_err(|reason| PolicyError::reference(raw, reason))?;

        let (scheme_str, path) = match location.split_once("://") {
            Some((s, p)) => (s, p),
            None => ("", location),
        };
        let scheme = Scheme::parse(&scheme_str.to_ascii_lowercase()).ok_or_else(|| {
            PolicyError::reference(raw, format!("unsupported scheme {scheme_str:?}"))
        })?;
        if path.trim().is_empty() {
            return Err(PolicyError::reference(raw, "reference has no path"));
        }

        Ok(Self {
            raw: trimmed.to_string(),
            scheme,
            path: path.to_string(),
            digest,
        })
    }

    /// The reference exactly as written (trimmed). Used as the provider cache key.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Scheme-specific part, without scheme and digest.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn digest(&self) -> Option<&PinnedDigest> {
        self.digest.as_ref()
    }

    /// Canonical URI without the digest suffix.
    pub fn uri(&self) -> String {
        format!("{}://{}", self.scheme.as_str(), self.path)
    }
}

impl fmt::Display for PolicyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Strip a trailing `@sha256:<hex>`. An `@` that is not followed by a digest
/// (for example URL userinfo) stays part of the location.
fn split_digest(s: &str) -> Result<(&str, Option<PinnedDigest>), String> {
    match s.rsplit_once('@') {
        Some((location, suffix)) if suffix.starts_with(&format!("{}:", ids::DIGEST_SHA256)) => {
            let digest = PinnedDigest::parse(suffix)?;
            Ok((location, Some(digest)))
        }
        _ => Ok((s, None)),
    }
}

/// Provider form: `[provider:]org/name` or `name`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderRef {
    pub provider: Option<String>,
    pub org: Option<String>,
    pub name: String,
}

impl ProviderRef {
    pub fn parse(reference: &PolicyRef) -> Result<Self, PolicyError> {
        let path = reference.path().trim_matches('/');

        let (provider, rest) = match path.split_once(':') {
            Some((p, rest)) if !p.contains('/') => (Some(p), rest),
            _ => (None, path),
        };
        let (org, name) = match rest.rsplit_once('/') {
            Some((o, n)) => (Some(o), n),
            None => (None, rest),
        };

        if name.is_empty() || org.is_some_and(|o| o.is_empty() || o.contains('/')) {
            return Err(PolicyError::reference(
                reference.raw(),
                "expected chainloop://[provider:][org/]name",
            ));
        }
        if provider.is_some_and(str::is_empty) {
            return Err(PolicyError::reference(reference.raw(), "empty provider name"));
        }

        Ok(Self {
            provider: provider.map(str::to_string),
            org: org.map(str::to_string),
            name: name.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attestguard_types::ErrorKind;

    const HEX: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn parses_schemes() {
        let r = PolicyRef::parse("file://policies/sbom.yaml").expect("file");
        assert_eq!(r.scheme(), Scheme::File);
        assert_eq!(r.path(), "policies/sbom.yaml");

        let r = PolicyRef::parse("https://example.com/p.yaml").expect("https");
        assert_eq!(r.scheme(), Scheme::Https);
        assert_eq!(r.uri(), "https://example.com/p.yaml");

        let r = PolicyRef::parse("sbom-present").expect("bare");
        assert_eq!(r.scheme(), Scheme::Chainloop);
        assert_eq!(r.uri(), "chainloop://sbom-present");
    }

    #[test]
    fn strips_and_keeps_digest() {
        let raw = format!("chainloop://sbom-present@sha256:{HEX}");
        let r = PolicyRef::parse(&raw).expect("pinned");
        assert_eq!(r.path(), "sbom-present");
        assert_eq!(r.digest().map(PinnedDigest::hex), Some(HEX));
        assert_eq!(r.raw(), raw);

        let r = PolicyRef::parse("https://user@example.com/p.yaml").expect("userinfo");
        assert!(r.digest().is_none());
        assert_eq!(r.path(), "user@example.com/p.yaml");
    }

    #[test]
    fn rejects_bad_references() {
        for bad in ["", "   ", "ftp://x", "file://", "file://x@sha256:nothex"] {
            let err = PolicyRef::parse(bad).expect_err(bad);
            assert_eq!(err.kind(), ErrorKind::Reference, "{bad}");
        }
    }

    #[test]
    fn parses_provider_forms() {
        let r = PolicyRef::parse("chainloop://builtin:acme/sbom-present").expect("full");
        let p = ProviderRef::parse(&r).expect("provider");
        assert_eq!(p.provider.as_deref(), Some("builtin"));
        assert_eq!(p.org.as_deref(), Some("acme"));
        assert_eq!(p.name, "sbom-present");

        let r = PolicyRef::parse("chainloop://acme/sbom-present").expect("org");
        let p = ProviderRef::parse(&r).expect("org form");
        assert_eq!(p.provider, None);
        assert_eq!(p.org.as_deref(), Some("acme"));

        let r = PolicyRef::parse("chainloop://sbom-present").expect("name");
        assert_eq!(ProviderRef::parse(&r).expect("name form").name, "sbom-present");

        let r = PolicyRef::parse("chainloop://a/b/c").expect("too deep");
        assert!(ProviderRef::parse(&r).is_err());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn parse_never_panics(text in "\\PC{0,64}") {
                let _ = PolicyRef::parse(&text).map(|r| ProviderRef::parse(&r));
            }

            /// A pinned digest is always stripped from the path and kept verbatim.
            #[test]
            fn digest_suffix_round_trips(
                path in "[a-z][a-z0-9/_-]{0,30}",
                hex in "[0-9a-f]{64}",
            ) {
                let raw = format!("file://{path}@sha256:{hex}");
                let r = PolicyRef::parse(&raw).expect("pinned reference");
                prop_assert_eq!(r.path(), path.as_str());
                prop_assert_eq!(r.digest().map(PinnedDigest::hex), Some(hex.as_str()));
            }
        }
    }
}
