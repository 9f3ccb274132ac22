//! Purpose: Define the stable public Rust API boundary for starnotary.
//! Exports: Record types, registrar, stores, local and remote clients.
//! Role: Public, additive-only surface used by the CLI, the server and tests.
//! Invariants: Callers reach storage only through `StarStore` implementations.

mod client;
mod remote;

#[doc(hidden)]
pub use crate::core::error::to_exit_code;
pub use crate::core::error::{Error, ErrorKind};
pub use crate::core::range::{RangeAddress, ScanDirection, ScanPlan};
pub use crate::core::registrar::Registrar;
pub use crate::core::star::{NewStar, RangeRequest, StarRecord, WalletKey};
pub use crate::core::store::{FileStore, MemoryStore, StarStore};
pub use crate::core::validate::Rule;
pub use crate::data_paths::default_data_dir;
pub use client::LocalClient;
pub use remote::RemoteClient;
