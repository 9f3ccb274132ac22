//! Purpose: Append-only in-process ledger of wallets and star entries.
//! Exports: `Ledger`.
//! Role: Storage semantics shared by the memory and file stores.
//! Invariants: Wallet addresses are unique; `ensure_wallet` never creates a second row.
//! Invariants: Star ids are unique; every entry references an existing wallet.
//! Invariants: Range scans never panic on inverted plans; they yield nothing.
//! Invariants: A deserialized ledger must be `reindex`ed before wallet lookups.
use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::core::error::{Error, ErrorKind};
use crate::core::range::{self, RangeAddress, ScanDirection, ScanPlan};
use crate::core::star::{StarEntry, StarRecord, WalletKey, WalletRecord};

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Ledger {
    #[serde(default)]
    wallets: Vec<WalletRecord>,
    #[serde(default)]
    stars: BTreeMap<u64, StarEntry>,
    // Derived from `wallets`; rebuilt by `reindex`.
    #[serde(skip)]
    by_address: HashMap<String, WalletKey>,
}

impl PartialEq for Ledger {
    fn eq(&self, other: &Self) -> bool {
        self.wallets == other.wallets && self.stars == other.stars
    }
}

impl Eq for Ledger {}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn wallet_count(&self) -> usize {
        self.wallets.len()
    }

    pub fn star_count(&self) -> usize {
        self.stars.len()
    }

    pub fn wallet(&self, key: WalletKey) -> Option<&WalletRecord> {
        let index = usize::try_from(key.0.checked_sub(1)?).ok()?;
        self.wallets.get(index).filter(|wallet| wallet.key == key)
    }

    pub fn find_wallet(&self, address: &str) -> Option<WalletKey> {
        self.by_address.get(address).copied()
    }

    /// Returns the wallet key for `address`, creating the wallet when absent.
    /// The flag reports whether a row was created.
    pub fn ensure_wallet(&mut self, address: &str) -> (WalletKey, bool) {
        if let Some(key) = self.find_wallet(address) {
            return (key, false);
        }
        let key = WalletKey(self.wallets.len() as u64 + 1);
        self.wallets.push(WalletRecord {
            key,
            address: address.to_string(),
        });
        self.by_address.insert(address.to_string(), key);
        (key, true)
    }

    pub fn insert_star(&mut self, entry: StarEntry) -> Result<(), Error> {
        if self.wallet(entry.wallet).is_none() {
            return Err(Error::new(ErrorKind::NotFound)
                .with_message("owner wallet not found")
                .with_star_id(entry.id));
        }
        if self.stars.contains_key(&entry.id) {
            return Err(Error::new(ErrorKind::AlreadyExists)
                .with_message("token id already registered")
                .with_star_id(entry.id));
        }
        if let Some(newest) = self.max_star_id() {
            if entry.id < newest {
                warn!(
                    token_id = entry.id,
                    newest, "token id inserted below current maximum; relative ranges will skew"
                );
            }
        }
        self.stars.insert(entry.id, entry);
        Ok(())
    }

    pub fn max_star_id(&self) -> Option<u64> {
        self.stars.keys().next_back().copied()
    }

    /// Entries inside the plan's inclusive bounds, joined with their owner address,
    /// in the plan's direction.
    pub fn query(&self, plan: ScanPlan) -> Vec<StarRecord> {
        if plan.is_inverted() {
            return Vec::new();
        }
        let entries = self.stars.range(plan.low..=plan.high).map(|(_, entry)| entry);
        let joined = |entry: &StarEntry| {
            self.wallet(entry.wallet)
                .map(|wallet| entry.clone().into_record(wallet.address.clone()))
        };
        match plan.direction {
            ScanDirection::Ascending => entries.filter_map(joined).collect(),
            ScanDirection::Descending => entries.rev().filter_map(joined).collect(),
        }
    }

    /// Resolves and executes `address` against one consistent view of the ledger.
    pub fn scan(&self, address: RangeAddress) -> Vec<StarRecord> {
        let newest = if address.needs_newest() {
            self.max_star_id()
        } else {
            None
        };
        match range::resolve(address, newest) {
            Some(plan) => self.query(plan),
            None => Vec::new(),
        }
    }

    /// Structural checks for a ledger loaded from disk. On success the
    /// address index is rebuilt; on failure the ledger is left untouched.
    pub fn reindex(&mut self) -> Result<(), Error> {
        let mut by_address = HashMap::with_capacity(self.wallets.len());
        for (index, wallet) in self.wallets.iter().enumerate() {
            if wallet.key.0 != index as u64 + 1 {
                return Err(Error::new(ErrorKind::Corrupt).with_message("wallet keys out of sequence"));
            }
            if by_address.insert(wallet.address.clone(), wallet.key).is_some() {
                return Err(Error::new(ErrorKind::Corrupt).with_message("duplicate wallet address"));
            }
        }
        for (id, entry) in &self.stars {
            if *id != entry.id {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message("star entry keyed under wrong id")
                    .with_star_id(*id));
            }
            if self.wallet(entry.wallet).is_none() {
                return Err(Error::new(ErrorKind::Corrupt)
                    .with_message("star references missing wallet")
                    .with_star_id(*id));
            }
        }
        self.by_address = by_address;
        Ok(())
    }
}
