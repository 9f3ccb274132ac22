//! Purpose: Record types for star ownership claims and their owning wallets.
//! Exports: `StarRecord`, `StarEntry`, `WalletRecord`, `WalletKey`, `NewStar`, `RangeRequest`.
//! Role: Shared vocabulary between validation, range resolution, storage and transports.
//! Invariants: Records are created once and never mutated; token ids are externally assigned.
//! Invariants: `StarRecord` always carries the owner address, never the wallet surrogate key.
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Opaque surrogate key joining stars to their owning wallet.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletKey(pub u64);

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct WalletRecord {
    pub key: WalletKey,
    pub address: String,
}

/// A star as it is persisted: the owner is referenced by wallet key.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StarEntry {
    pub id: u64,
    pub name: String,
    pub coordinates: String,
    #[serde(default)]
    pub price: Option<String>,
    pub is_for_sale: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub wallet: WalletKey,
}

impl StarEntry {
    pub fn into_record(self, owner: impl Into<String>) -> StarRecord {
        StarRecord {
            token_id: self.id.to_string(),
            name: self.name,
            coordinates: self.coordinates,
            price: self.price,
            is_for_sale: self.is_for_sale,
            date: self.date,
            owner: owner.into(),
        }
    }
}

/// A star as clients see it, joined with its owner address.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct StarRecord {
    pub token_id: String,
    pub name: String,
    pub coordinates: String,
    #[serde(default)]
    pub price: Option<String>,
    pub is_for_sale: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub date: OffsetDateTime,
    pub owner: String,
}

/// Write request for a new claim. Fields are raw client text until validated.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NewStar {
    pub owner: String,
    pub token_id: String,
    pub coordinates: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<String>,
    #[serde(default)]
    pub is_for_sale: bool,
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub date: Option<OffsetDateTime>,
}

impl NewStar {
    pub fn new(
        owner: impl Into<String>,
        token_id: impl Into<String>,
        coordinates: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            token_id: token_id.into(),
            coordinates: coordinates.into(),
            name: name.into(),
            price: None,
            is_for_sale: false,
            date: None,
        }
    }

    pub fn for_sale(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self.is_for_sale = true;
        self
    }

    pub fn with_price(mut self, price: impl Into<String>) -> Self {
        self.price = Some(price.into());
        self
    }

    pub fn with_date(mut self, date: OffsetDateTime) -> Self {
        self.date = Some(date);
        self
    }
}

/// Read request. Bounds stay as raw client text until validated.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum RangeRequest {
    /// `start`/`end` window; offsets from the newest record unless `oldest_first`.
    Window {
        start: String,
        end: String,
        oldest_first: bool,
    },
    /// Literal first/last token ids, always ascending.
    Ids { first_id: String, last_id: String },
}

impl RangeRequest {
    pub fn window(start: impl Into<String>, end: impl Into<String>) -> Self {
        RangeRequest::Window {
            start: start.into(),
            end: end.into(),
            oldest_first: false,
        }
    }

    pub fn ids(first_id: impl Into<String>, last_id: impl Into<String>) -> Self {
        RangeRequest::Ids {
            first_id: first_id.into(),
            last_id: last_id.into(),
        }
    }

    /// Switches a window request to absolute ascending addressing; no-op for `Ids`.
    pub fn oldest_first(mut self, enabled: bool) -> Self {
        if let RangeRequest::Window { oldest_first, .. } = &mut self {
            *oldest_first = enabled;
        }
        self
    }
}
