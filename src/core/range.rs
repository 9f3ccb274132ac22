//! Purpose: Resolve client range requests into absolute token-id scans without I/O.
//! Exports: `RangeAddress`, `ScanDirection`, `ScanPlan`, `resolve`.
//! Role: Pure planning layer; storage executes the resulting `ScanPlan`.
//! Invariants: Token ids are allocated in strictly increasing order and never reused,
//! so the newest record always holds the largest id.
//! Invariants: Relative offsets are 1-based; offset 1 is the newest record.
//! Invariants: Inverted windows (`start > end`) resolve to inverted plans, never errors.
use crate::core::error::Error;
use crate::core::star::RangeRequest;
use crate::core::validate::{self, Rule};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RangeAddress {
    /// Literal inclusive id bounds, scanned oldest first.
    Absolute { first: u64, last: u64 },
    /// Offsets counted back from the newest record, scanned newest first.
    Relative { start: u64, end: u64 },
}

impl RangeAddress {
    /// Validates both bounds, then picks the addressing mode.
    pub fn from_request(request: &RangeRequest) -> Result<Self, Error> {
        validate::validate_range(request)?;
        match request {
            RangeRequest::Window {
                start,
                end,
                oldest_first,
            } => {
                let start = validate::parse_positive(start, Rule::Range)?;
                let end = validate::parse_positive(end, Rule::Range)?;
                if *oldest_first {
                    Ok(RangeAddress::Absolute {
                        first: start,
                        last: end,
                    })
                } else {
                    Ok(RangeAddress::Relative { start, end })
                }
            }
            RangeRequest::Ids { first_id, last_id } => Ok(RangeAddress::Absolute {
                first: validate::parse_positive(first_id, Rule::Range)?,
                last: validate::parse_positive(last_id, Rule::Range)?,
            }),
        }
    }

    /// Whether resolving this address requires the current maximum id.
    pub fn needs_newest(self) -> bool {
        matches!(self, RangeAddress::Relative { .. })
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ScanDirection {
    Ascending,
    Descending,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScanPlan {
    pub low: u64,
    pub high: u64,
    pub direction: ScanDirection,
}

impl ScanPlan {
    pub fn is_inverted(&self) -> bool {
        self.low > self.high
    }

    pub fn contains(&self, id: u64) -> bool {
        self.low <= id && id <= self.high
    }
}

/// Maps an address onto an inclusive id interval.
///
/// Relative addresses need the current maximum id; `None` means the store is empty
/// and the result is `None` (an empty read, not a failure). Offsets reaching past
/// the oldest id saturate at zero, which no stored id can match.
pub fn resolve(address: RangeAddress, newest: Option<u64>) -> Option<ScanPlan> {
    match address {
        RangeAddress::Absolute { first, last } => Some(ScanPlan {
            low: first,
            high: last,
            direction: ScanDirection::Ascending,
        }),
        RangeAddress::Relative { start, end } => {
            let newest = newest?;
            Some(ScanPlan {
                low: newest.saturating_sub(end.saturating_sub(1)),
                high: newest.saturating_sub(start.saturating_sub(1)),
                direction: ScanDirection::Descending,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RangeAddress, ScanDirection, ScanPlan, resolve};
    use crate::core::error::ErrorKind;
    use crate::core::star::RangeRequest;

    fn plan(low: u64, high: u64, direction: ScanDirection) -> Option<ScanPlan> {
        Some(ScanPlan {
            low,
            high,
            direction,
        })
    }

    #[test]
    fn relative_window_counts_back_from_newest() {
        let address = RangeAddress::Relative { start: 1, end: 5 };
        assert_eq!(
            resolve(address, Some(100)),
            plan(96, 100, ScanDirection::Descending)
        );
    }

    #[test]
    fn relative_window_on_empty_store_is_empty() {
        let address = RangeAddress::Relative { start: 1, end: 5 };
        assert_eq!(resolve(address, None), None);
    }

    #[test]
    fn relative_single_record_window() {
        let address = RangeAddress::Relative { start: 3, end: 3 };
        assert_eq!(
            resolve(address, Some(100)),
            plan(98, 98, ScanDirection::Descending)
        );
    }

    #[test]
    fn relative_window_past_oldest_saturates() {
        let address = RangeAddress::Relative { start: 5, end: 50 };
        assert_eq!(
            resolve(address, Some(10)),
            plan(0, 6, ScanDirection::Descending)
        );
        let address = RangeAddress::Relative { start: 20, end: 30 };
        assert_eq!(
            resolve(address, Some(10)),
            plan(0, 0, ScanDirection::Descending)
        );
    }

    #[test]
    fn relative_inverted_window_is_kept_inverted() {
        let address = RangeAddress::Relative { start: 5, end: 1 };
        let resolved = resolve(address, Some(100)).expect("plan");
        assert_eq!(resolved, ScanPlan {
            low: 100,
            high: 96,
            direction: ScanDirection::Descending,
        });
        assert!(resolved.is_inverted());
        assert!(!resolved.contains(98));
    }

    #[test]
    fn absolute_window_is_used_verbatim() {
        let address = RangeAddress::Absolute { first: 10, last: 20 };
        assert_eq!(resolve(address, None), plan(10, 20, ScanDirection::Ascending));
        assert_eq!(
            resolve(address, Some(5)),
            plan(10, 20, ScanDirection::Ascending)
        );
    }

    #[test]
    fn requests_select_addressing_mode() {
        let relative = RangeAddress::from_request(&RangeRequest::window("1", "5")).expect("ok");
        assert_eq!(relative, RangeAddress::Relative { start: 1, end: 5 });
        assert!(relative.needs_newest());

        let absolute =
            RangeAddress::from_request(&RangeRequest::window("10", "20").oldest_first(true))
                .expect("ok");
        assert_eq!(absolute, RangeAddress::Absolute { first: 10, last: 20 });
        assert!(!absolute.needs_newest());

        let ids = RangeAddress::from_request(&RangeRequest::ids("3", "7")).expect("ok");
        assert_eq!(ids, RangeAddress::Absolute { first: 3, last: 7 });
    }

    #[test]
    fn malformed_bounds_are_invalid_range() {
        let err = RangeAddress::from_request(&RangeRequest::window("0", "5")).expect_err("err");
        assert_eq!(err.kind(), ErrorKind::Usage);
        assert_eq!(err.message(), Some("invalid range"));

        let err = RangeAddress::from_request(&RangeRequest::ids("1", "99999999999999999999"))
            .expect_err("err");
        assert_eq!(err.message(), Some("invalid range"));
    }
}
