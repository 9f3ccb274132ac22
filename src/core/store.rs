// Storage seam for star claims plus the memory- and file-backed implementations.
// FileStore keeps a JSON ledger next to a lock file; writers hold an exclusive
// advisory lock across read-modify-write and replace the ledger via rename.
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use fs2::FileExt;
use libc::{EACCES, EPERM};
use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::ledger::Ledger;
use crate::core::range::{RangeAddress, ScanPlan};
use crate::core::star::{StarEntry, StarRecord, WalletKey};

pub const LEDGER_FILE: &str = "stars.json";
pub const LOCK_FILE: &str = "stars.lock";

/// Persistence operations the registrar drives.
///
/// `ensure_wallet` must check and create under one critical section so that two
/// concurrent callers never produce two wallets for the same address.
pub trait StarStore: Send + Sync {
    fn ensure_wallet(&self, address: &str) -> Result<WalletKey, Error>;

    fn insert_star(&self, entry: StarEntry) -> Result<(), Error>;

    fn max_star_id(&self) -> Result<Option<u64>, Error>;

    fn query_stars_in_id_range(&self, plan: ScanPlan) -> Result<Vec<StarRecord>, Error>;

    /// Resolves and executes a range read. Stores that can should override this
    /// to run the max-id lookup and the scan against one snapshot.
    fn read_range(&self, address: RangeAddress) -> Result<Vec<StarRecord>, Error> {
        let newest = if address.needs_newest() {
            self.max_star_id()?
        } else {
            None
        };
        match crate::core::range::resolve(address, newest) {
            Some(plan) => self.query_stars_in_id_range(plan),
            None => Ok(Vec::new()),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    ledger: Mutex<Ledger>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn ledger(&self) -> Result<MutexGuard<'_, Ledger>, Error> {
        self.ledger
            .lock()
            .map_err(|_| Error::new(ErrorKind::Internal).with_message("ledger mutex poisoned"))
    }
}

impl StarStore for MemoryStore {
    fn ensure_wallet(&self, address: &str) -> Result<WalletKey, Error> {
        let (key, created) = self.ledger()?.ensure_wallet(address);
        if created {
            info!(address, wallet = key.0, "wallet created");
        }
        Ok(key)
    }

    fn insert_star(&self, entry: StarEntry) -> Result<(), Error> {
        self.ledger()?.insert_star(entry)
    }

    fn max_star_id(&self) -> Result<Option<u64>, Error> {
        Ok(self.ledger()?.max_star_id())
    }

    fn query_stars_in_id_range(&self, plan: ScanPlan) -> Result<Vec<StarRecord>, Error> {
        Ok(self.ledger()?.query(plan))
    }

    fn read_range(&self, address: RangeAddress) -> Result<Vec<StarRecord>, Error> {
        Ok(self.ledger()?.scan(address))
    }
}

#[derive(Clone, Debug)]
pub struct FileStore {
    ledger_path: PathBuf,
    lock_path: PathBuf,
}

impl FileStore {
    /// Opens (creating if needed) the store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).map_err(|err| {
            Error::new(map_io_error_kind(&err))
                .with_message("failed to create data directory")
                .with_path(&dir)
                .with_source(err)
        })?;
        Ok(Self {
            ledger_path: dir.join(LEDGER_FILE),
            lock_path: dir.join(LOCK_FILE),
        })
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    fn lock(&self, exclusive: bool) -> Result<LedgerLock, Error> {
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&self.lock_path)
            .map_err(|err| {
                Error::new(map_io_error_kind(&err))
                    .with_message("failed to open lock file")
                    .with_path(&self.lock_path)
                    .with_source(err)
            })?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.map_err(|err| {
            Error::new(lock_error_kind(&err))
                .with_message("failed to lock ledger")
                .with_path(&self.lock_path)
                .with_source(err)
        })?;
        Ok(LedgerLock { file })
    }

    fn load(&self) -> Result<Ledger, Error> {
        let text = match fs::read_to_string(&self.ledger_path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Ledger::new()),
            Err(err) => {
                return Err(Error::new(map_io_error_kind(&err))
                    .with_message("failed to read ledger")
                    .with_path(&self.ledger_path)
                    .with_source(err));
            }
        };
        let mut ledger: Ledger = serde_json::from_str(&text).map_err(|err| {
            Error::new(ErrorKind::Corrupt)
                .with_message("ledger is not valid json")
                .with_path(&self.ledger_path)
                .with_source(err)
        })?;
        ledger
            .reindex()
            .map_err(|err| err.with_path(&self.ledger_path))?;
        debug!(
            wallets = ledger.wallet_count(),
            stars = ledger.star_count(),
            "ledger loaded"
        );
        Ok(ledger)
    }

    fn save(&self, ledger: &Ledger) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(ledger).map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to encode ledger")
                .with_source(err)
        })?;
        let tmp_path = self.ledger_path.with_extension("json.tmp");
        let io_err = |err: io::Error, message: &str, path: &Path| {
            Error::new(map_io_error_kind(&err))
                .with_message(message)
                .with_path(path)
                .with_source(err)
        };
        let mut tmp = File::create(&tmp_path)
            .map_err(|err| io_err(err, "failed to create ledger temp file", &tmp_path))?;
        tmp.write_all(&bytes)
            .map_err(|err| io_err(err, "failed to write ledger", &tmp_path))?;
        tmp.sync_all()
            .map_err(|err| io_err(err, "failed to sync ledger", &tmp_path))?;
        fs::rename(&tmp_path, &self.ledger_path)
            .map_err(|err| io_err(err, "failed to replace ledger", &self.ledger_path))?;
        Ok(())
    }

    fn read<T>(&self, f: impl FnOnce(&Ledger) -> T) -> Result<T, Error> {
        let _lock = self.lock(false)?;
        let ledger = self.load()?;
        Ok(f(&ledger))
    }

    /// Runs `f` under the exclusive lock; the ledger is written back only when
    /// `f` reports a change.
    fn update<T>(&self, f: impl FnOnce(&mut Ledger) -> Result<(T, bool), Error>) -> Result<T, Error> {
        let _lock = self.lock(true)?;
        let mut ledger = self.load()?;
        let (value, changed) = f(&mut ledger)?;
        if changed {
            self.save(&ledger)?;
        }
        Ok(value)
    }
}

impl StarStore for FileStore {
    fn ensure_wallet(&self, address: &str) -> Result<WalletKey, Error> {
        let (key, created) = self.update(|ledger| {
            let (key, created) = ledger.ensure_wallet(address);
            Ok(((key, created), created))
        })?;
        if created {
            info!(address, wallet = key.0, "wallet created");
        }
        Ok(key)
    }

    fn insert_star(&self, entry: StarEntry) -> Result<(), Error> {
        self.update(|ledger| ledger.insert_star(entry).map(|()| ((), true)))
    }

    fn max_star_id(&self) -> Result<Option<u64>, Error> {
        self.read(Ledger::max_star_id)
    }

    fn query_stars_in_id_range(&self, plan: ScanPlan) -> Result<Vec<StarRecord>, Error> {
        self.read(|ledger| ledger.query(plan))
    }

    fn read_range(&self, address: RangeAddress) -> Result<Vec<StarRecord>, Error> {
        self.read(|ledger| ledger.scan(address))
    }
}

struct LedgerLock {
    file: File,
}

impl Drop for LedgerLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

fn lock_error_kind(err: &io::Error) -> ErrorKind {
    let errno = err.raw_os_error().unwrap_or_default();
    if errno == EACCES || errno == EPERM {
        return ErrorKind::Permission;
    }
    match err.kind() {
        io::ErrorKind::WouldBlock => ErrorKind::Busy,
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}

fn map_io_error_kind(err: &io::Error) -> ErrorKind {
    match err.kind() {
        io::ErrorKind::PermissionDenied => ErrorKind::Permission,
        _ => ErrorKind::Io,
    }
}
