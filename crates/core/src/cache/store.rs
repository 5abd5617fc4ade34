//! A local, content-addressed store of `ctx://` artifacts.
//!
//! Entries live at `<cache_dir>/<sha256-hex>/`. Installation is atomic: a
//! new entry is built in a scratch directory and only becomes visible via a
//! single rename, so a reader never observes a half-written entry and a
//! crash mid-install never leaves one behind. An install onto an existing
//! entry replaces it outright, per the install contract; because entries
//! are content-addressed, two concurrent writers for the same `uri` are
//! expected to produce byte-equivalent directories, so which one's rename
//! lands last is immaterial to the result.

use crate::errors::{CtxPackError, Result};
use crate::identity::hex_from_uri;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// Who and where sealed a cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provenance {
    pub host: String,
    pub user: String,
    pub timestamp: String,
}

/// The manifest stored alongside every cached artifact, recording the
/// contract that produced it and its provenance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheManifest {
    pub uri: String,
    pub contract: Value,
    pub provenance: Provenance,
}

/// A local directory of content-addressed cache entries.
#[derive(Debug, Clone)]
pub struct LocalCacheStore {
    root: PathBuf,
}

impl LocalCacheStore {
    /// Open (creating if necessary) a cache store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory an entry for `hex_digest` would live at, whether or
    /// not it has been installed yet.
    pub fn entry_path(&self, hex_digest: &str) -> PathBuf {
        self.root.join(hex_digest)
    }

    /// Whether a complete entry already exists for `uri`.
    pub fn contains(&self, uri: &str) -> Result<bool> {
        let hex = hex_from_uri(uri)?;
        Ok(self.entry_path(hex).join("manifest.json").is_file())
    }

    /// Resolve `uri` to its entry directory if the entry exists locally.
    pub fn lookup(&self, uri: &str) -> Result<Option<PathBuf>> {
        if self.contains(uri)? {
            Ok(Some(self.entry_path(hex_from_uri(uri)?)))
        } else {
            Ok(None)
        }
    }

    /// Read the manifest for an installed entry.
    pub fn read_manifest(&self, uri: &str) -> Result<CacheManifest> {
        let hex = hex_from_uri(uri)?;
        let path = self.entry_path(hex).join("manifest.json");
        let bytes = std::fs::read(&path).map_err(|_| CtxPackError::ManifestNotFound {
            uri: uri.to_string(),
        })?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Allocate a scratch directory under the cache root for building a new
    /// entry before installing it. Kept inside `root` so the final install
    /// is a same-filesystem rename, never a cross-device copy.
    pub fn new_scratch_dir(&self) -> Result<TempDir> {
        Ok(tempfile::Builder::new()
            .prefix(".ctxpack-scratch-")
            .tempdir_in(&self.root)?)
    }

    /// Atomically install a scratch directory as the entry for `uri`.
    ///
    /// `scratch` must already contain a `manifest.json` whose `uri` field
    /// equals `uri` — this is the Identity Engine's own check replayed at
    /// install time, so a bug upstream can never seal a mislabeled entry.
    /// If an entry for this digest already exists, it is replaced: a
    /// `rename` can't land directly on top of a non-empty directory, so the
    /// existing entry is removed first and the scratch directory renamed
    /// into its place. The entry is still only ever observed fully present
    /// or fully absent, never partially written.
    pub fn install_from_scratch(&self, uri: &str, scratch: TempDir) -> Result<PathBuf> {
        let hex = hex_from_uri(uri)?;
        let manifest_path = scratch.path().join("manifest.json");
        let bytes = std::fs::read(&manifest_path).map_err(|_| CtxPackError::IdentityMismatch {
            expected: uri.to_string(),
            found: "<no manifest.json in scratch directory>".to_string(),
        })?;
        let manifest: Value = serde_json::from_slice(&bytes)?;
        let found = manifest.get("uri").and_then(Value::as_str).unwrap_or("");
        if found != uri {
            return Err(CtxPackError::IdentityMismatch {
                expected: uri.to_string(),
                found: found.to_string(),
            });
        }

        let dest = self.entry_path(hex);
        let scratch_path = scratch.into_path();

        if dest.is_dir() {
            debug!(%uri, "replacing already-installed entry");
            if let Err(source) = std::fs::remove_dir_all(&dest) {
                std::fs::remove_dir_all(&scratch_path).ok();
                return Err(CtxPackError::Io { source });
            }
        }

        match std::fs::rename(&scratch_path, &dest) {
            Ok(()) => {
                info!(%uri, path = %dest.display(), "installed cache entry");
                Ok(dest)
            }
            Err(source) => {
                std::fs::remove_dir_all(&scratch_path).ok();
                Err(CtxPackError::Io { source })
            }
        }
    }

    /// Build and install a new entry in one step: copy `folder`'s contents
    /// into a fresh scratch directory, write `manifest.json` there, then
    /// install atomically. Used by `seed` and by `pull` once a fetched
    /// artifact has been extracted and verified.
    pub fn install_from_folder(
        &self,
        uri: &str,
        folder: &Path,
        manifest: &CacheManifest,
    ) -> Result<PathBuf> {
        let scratch = self.new_scratch_dir()?;
        copy_dir_contents(folder, scratch.path())?;
        let manifest_bytes = serde_json::to_vec_pretty(manifest)?;
        std::fs::write(scratch.path().join("manifest.json"), manifest_bytes)?;
        self.install_from_scratch(uri, scratch)
    }
}

fn copy_dir_contents(src: &Path, dest: &Path) -> Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dest.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            std::fs::create_dir_all(&target)?;
            copy_dir_contents(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn manifest(uri: &str) -> CacheManifest {
        CacheManifest {
            uri: uri.to_string(),
            contract: serde_json::json!({"transforms": []}),
            provenance: Provenance {
                host: "localhost".to_string(),
                user: "rozetyp".to_string(),
                timestamp: "2026-01-01T00:00:00+00:00".to_string(),
            },
        }
    }

    #[test]
    fn lookup_misses_before_install() {
        let root = tempdir().unwrap();
        let store = LocalCacheStore::new(root.path()).unwrap();
        let uri = "ctx://sha256:aaaa";
        assert_eq!(store.lookup(uri).unwrap(), None);
    }

    #[test]
    fn install_from_folder_then_lookup_hits() {
        let root = tempdir().unwrap();
        let store = LocalCacheStore::new(root.path()).unwrap();

        let payload = tempdir().unwrap();
        std::fs::write(payload.path().join("out.bin"), b"data").unwrap();

        let uri = "ctx://sha256:bbbb";
        let installed = store
            .install_from_folder(uri, payload.path(), &manifest(uri))
            .unwrap();

        assert_eq!(store.lookup(uri).unwrap(), Some(installed.clone()));
        assert!(installed.join("out.bin").is_file());
        assert_eq!(store.read_manifest(uri).unwrap().uri, uri);
    }

    #[test]
    fn install_rejects_identity_mismatch() {
        let root = tempdir().unwrap();
        let store = LocalCacheStore::new(root.path()).unwrap();
        let scratch = store.new_scratch_dir().unwrap();

        let wrong_manifest = manifest("ctx://sha256:wrongdigest");
        std::fs::write(
            scratch.path().join("manifest.json"),
            serde_json::to_vec(&wrong_manifest).unwrap(),
        )
        .unwrap();

        let result = store.install_from_scratch("ctx://sha256:cccc", scratch);
        assert!(matches!(result, Err(CtxPackError::IdentityMismatch { .. })));
    }

    #[test]
    fn install_is_idempotent_for_concurrent_writers() {
        let root = tempdir().unwrap();
        let store = LocalCacheStore::new(root.path()).unwrap();
        let uri = "ctx://sha256:dddd";

        let first = tempdir().unwrap();
        std::fs::write(first.path().join("a.bin"), b"x").unwrap();
        store
            .install_from_folder(uri, first.path(), &manifest(uri))
            .unwrap();

        let second = tempdir().unwrap();
        std::fs::write(second.path().join("a.bin"), b"x").unwrap();
        let path = store
            .install_from_folder(uri, second.path(), &manifest(uri))
            .unwrap();

        assert!(path.join("a.bin").is_file());
    }

    #[test]
    fn install_replaces_an_existing_entry() {
        let root = tempdir().unwrap();
        let store = LocalCacheStore::new(root.path()).unwrap();
        let uri = "ctx://sha256:eeee";

        let first = tempdir().unwrap();
        std::fs::write(first.path().join("old.bin"), b"old").unwrap();
        store
            .install_from_folder(uri, first.path(), &manifest(uri))
            .unwrap();

        let second = tempdir().unwrap();
        std::fs::write(second.path().join("new.bin"), b"new").unwrap();
        let path = store
            .install_from_folder(uri, second.path(), &manifest(uri))
            .unwrap();

        // The second install replaces the first outright: the old file is
        // gone, not merged alongside the new one.
        assert!(path.join("new.bin").is_file());
        assert!(!path.join("old.bin").exists());
    }
}
