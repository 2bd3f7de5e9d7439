use crate::fetch::{Fetched, Fetcher, LoadContext};
use crate::reference::PolicyRef;
use attestguard_types::{LoadError, PolicyError};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

/// `file://` strategy. Relative paths resolve against the caller's base directory.
#[derive(Clone, Debug, Default)]
pub struct FileFetcher;

impl FileFetcher {
    fn resolve_path(reference: &PolicyRef, ctx: &LoadContext) -> Utf8PathBuf {
        let path = Utf8Path::new(reference.path());
        match &ctx.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }
}

impl Fetcher for FileFetcher {
    fn fetch(&self, reference: &PolicyRef, ctx: &LoadContext) -> Result<Fetched, PolicyError> {
        let path = Self::resolve_path(reference, ctx);
        let uri = format!("file://{path}");
        debug!(%uri, resource = %ctx.resource, "reading local document");

        let bytes = std::fs::read(&path).map_err(|e| PolicyError::load(&uri, LoadError::Io(e)))?;
        let base_dir = path
            .parent()
            .filter(|p| !p.as_str().is_empty())
            .map(Utf8Path::to_path_buf);

        Ok(Fetched {
            bytes,
            uri,
            org: None,
            base_dir,
        })
    }
}
