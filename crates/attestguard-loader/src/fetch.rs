//! Scheme strategies: each one turns a reference into raw bytes.

use crate::reference::PolicyRef;
use attestguard_types::PolicyError;
use camino::Utf8PathBuf;
use std::fmt;

/// Which document type is being fetched. Providers serve them from separate endpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Policy,
    Group,
}

impl ResourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Policy => "policy",
            ResourceKind::Group => "group",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a fetch happens from.
#[derive(Clone, Debug)]
pub struct LoadContext {
    pub resource: ResourceKind,
    /// Directory relative `file://` references resolve against.
    pub base_dir: Option<Utf8PathBuf>,
}

impl LoadContext {
    pub fn policy() -> Self {
        Self {
            resource: ResourceKind::Policy,
            base_dir: None,
        }
    }

    pub fn group() -> Self {
        Self {
            resource: ResourceKind::Group,
            base_dir: None,
        }
    }

    pub fn with_base_dir(mut self, base_dir: Option<Utf8PathBuf>) -> Self {
        self.base_dir = base_dir;
        self
    }
}

/// Raw bytes plus where they came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// Canonical URI of the fetched document, without digest.
    pub uri: String,
    pub org: Option<String>,
    /// Directory of the fetched file, for resolving nested relative references.
    pub base_dir: Option<Utf8PathBuf>,
}

/// One implementation per reference scheme.
pub trait Fetcher: Send + Sync {
    fn fetch(&self, reference: &PolicyRef, ctx: &LoadContext) -> Result<Fetched, PolicyError>;
}
