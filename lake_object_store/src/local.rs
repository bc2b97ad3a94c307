//! Local file system object stores.
//!
//! `LocalFileSystemStore` maps a bucket to the `<root>/<bucket>` directory, so
//! an object keyed `bronze/...` in bucket `lake` lands at
//! `<root>/lake/bronze/...`.
//!
//! `TemporaryFileSystemStore` does the same inside a temporary directory that is
//! removed when the store is dropped. It is meant for tests and local runs.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use object_store::{ObjectStore, local::LocalFileSystem};
use snafu::ResultExt;
use tempfile::TempDir;

use crate::{CreationSnafu, LocalDirectorySnafu, Result};

pub struct LocalFileSystemStore {
    bucket_path: PathBuf,
    inner: LocalFileSystem,
}

impl LocalFileSystemStore {
    pub fn new(root_path: impl AsRef<Path>, bucket: &str) -> Result<Self> {
        let bucket_path = root_path.as_ref().join(bucket);

        std::fs::create_dir_all(&bucket_path).context(LocalDirectorySnafu {
            path: bucket_path.display().to_string(),
        })?;

        let bucket_path = std::fs::canonicalize(&bucket_path).context(LocalDirectorySnafu {
            path: bucket_path.display().to_string(),
        })?;

        let inner = LocalFileSystem::new_with_prefix(&bucket_path).context(CreationSnafu {
            store_type: "local file system",
        })?;

        Ok(Self { bucket_path, inner })
    }

    pub fn bucket_path(&self) -> &Path {
        &self.bucket_path
    }

    pub fn into_object_store(self) -> Arc<dyn ObjectStore> {
        Arc::new(self.inner)
    }
}

pub struct TemporaryFileSystemStore {
    temp_dir: TempDir,
    store: Arc<dyn ObjectStore>,
    bucket_path: PathBuf,
}

impl TemporaryFileSystemStore {
    pub fn new(bucket: &str) -> Result<Self> {
        let temp_dir = TempDir::new().context(LocalDirectorySnafu {
            path: std::env::temp_dir().display().to_string(),
        })?;

        let local = LocalFileSystemStore::new(temp_dir.path(), bucket)?;
        let bucket_path = local.bucket_path().to_path_buf();

        Ok(Self {
            temp_dir,
            store: local.into_object_store(),
            bucket_path,
        })
    }

    pub fn root_path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn bucket_path(&self) -> &Path {
        &self.bucket_path
    }

    pub fn object_store(&self) -> Arc<dyn ObjectStore> {
        self.store.clone()
    }
}
