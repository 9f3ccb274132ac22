//! Purpose: Local client over a file-backed registry in a data directory.
//! Exports: `LocalClient`.
//! Role: Mirrors `RemoteClient` so the CLI can target either transparently.
//! Invariants: Every call opens the store fresh; no state is cached between calls.
#![allow(clippy::result_large_err)]

use crate::core::error::Error;
use crate::core::registrar::Registrar;
use crate::core::star::{NewStar, RangeRequest, StarRecord};
use crate::core::store::FileStore;
use crate::data_paths::default_data_dir;
use std::path::{Path, PathBuf};

pub type ApiResult<T> = Result<T, Error>;

#[derive(Clone, Debug)]
pub struct LocalClient {
    data_dir: PathBuf,
}

impl LocalClient {
    pub fn new() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }

    pub fn with_data_dir(mut self, data_dir: impl Into<PathBuf>) -> Self {
        self.data_dir = data_dir.into();
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn registrar(&self) -> ApiResult<Registrar<FileStore>> {
        Ok(Registrar::new(FileStore::open(&self.data_dir)?))
    }

    pub fn register(&self, star: NewStar) -> ApiResult<StarRecord> {
        self.registrar()?.register(star)
    }

    pub fn star_range(&self, request: &RangeRequest) -> ApiResult<Vec<StarRecord>> {
        self.registrar()?.star_range(request)
    }
}

impl Default for LocalClient {
    fn default() -> Self {
        Self::new()
    }
}
