//! Purpose: Sequence the write path and the range read path over a `StarStore`.
//! Exports: `Registrar`.
//! Role: Thin orchestration; grammar lives in `validate`, arithmetic in `range`.
//! Invariants: Writes run validate -> ensure wallet -> insert, each step gating the next.
//! Invariants: No retries and no compensation; a wallet created before a failed insert stays.
//! Invariants: Wallet ensure failures surface as server faults, never as client faults.
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::core::error::{Error, ErrorKind};
use crate::core::range::RangeAddress;
use crate::core::star::{NewStar, RangeRequest, StarEntry, StarRecord};
use crate::core::store::StarStore;
use crate::core::validate::{self, Rule};

#[derive(Clone, Debug)]
pub struct Registrar<S> {
    store: S,
}

impl<S: StarStore> Registrar<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn register(&self, star: NewStar) -> Result<StarRecord, Error> {
        if let Err(err) = validate::validate_new_star(&star) {
            debug!(token_id = %star.token_id, error = %err, "star rejected");
            return Err(err);
        }
        let id = validate::parse_positive(&star.token_id, Rule::TokenId)?;

        let wallet = self.store.ensure_wallet(&star.owner).map_err(|err| {
            if err.kind().is_client_fault() {
                err.with_kind(ErrorKind::Internal)
            } else {
                err
            }
        })?;

        let entry = StarEntry {
            id,
            name: star.name,
            coordinates: star.coordinates,
            price: star.price,
            is_for_sale: star.is_for_sale,
            date: star.date.unwrap_or_else(OffsetDateTime::now_utc),
            wallet,
        };
        self.store.insert_star(entry.clone())?;
        info!(token_id = id, owner = %star.owner, "star registered");
        Ok(entry.into_record(star.owner))
    }

    pub fn star_range(&self, request: &RangeRequest) -> Result<Vec<StarRecord>, Error> {
        let address = RangeAddress::from_request(request)?;
        let stars = self.store.read_range(address)?;
        debug!(?address, count = stars.len(), "star range read");
        Ok(stars)
    }
}
