// Field grammar checks for star claims and range requests.
// Each rule is an independent pure predicate; composition is first-failure-wins.
// Rejections are `Usage` errors whose message is the rule's literal text.
use crate::core::error::{Error, ErrorKind};
use crate::core::star::{NewStar, RangeRequest};

const NAME_MIN_LEN: usize = 4;
const NAME_MAX_LEN: usize = 32;
const PRICE_INTEGER_MAX_DIGITS: usize = 12;
const PRICE_FRACTION_MAX_DIGITS: usize = 18;
const RIGHT_ASCENSION_MAX_HOURS: u8 = 24;
const DECLINATION_MAX_DEGREES: u8 = 90;
const SEXAGESIMAL_MAX: u8 = 60;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Rule {
    TokenId,
    Owner,
    Coordinates,
    Name,
    Price,
    Range,
}

impl Rule {
    pub fn message(self) -> &'static str {
        match self {
            Rule::TokenId => "invalid token id",
            Rule::Owner => "invalid owner",
            Rule::Coordinates => "invalid coordinates",
            Rule::Name => "invalid name",
            Rule::Price => "invalid price",
            Rule::Range => "invalid range",
        }
    }

    pub fn reject(self) -> Error {
        Error::new(ErrorKind::Usage).with_message(self.message())
    }
}

fn check(rule: Rule, ok: bool) -> Result<(), Error> {
    if ok { Ok(()) } else { Err(rule.reject()) }
}

/// Validates a write request in fixed order: id, owner, coordinates, name, then
/// price only when the star is offered for sale.
pub fn validate_new_star(star: &NewStar) -> Result<(), Error> {
    check(Rule::TokenId, is_token_id(&star.token_id))?;
    check(Rule::Owner, is_owner(&star.owner))?;
    check(Rule::Coordinates, is_coordinates(&star.coordinates))?;
    check(Rule::Name, is_name(&star.name))?;
    if star.is_for_sale {
        check(Rule::Price, star.price.as_deref().is_some_and(is_price))?;
    }
    Ok(())
}

/// Checks both bounds independently. `start <= end` is deliberately not enforced.
pub fn validate_range(request: &RangeRequest) -> Result<(), Error> {
    let (low, high) = match request {
        RangeRequest::Window { start, end, .. } => (start, end),
        RangeRequest::Ids { first_id, last_id } => (first_id, last_id),
    };
    check(Rule::Range, is_token_id(low))?;
    check(Rule::Range, is_token_id(high))?;
    Ok(())
}

/// Parses a value that already passed the positive-integer grammar. Values that
/// do not fit in `u64` are reported against `rule`.
pub fn parse_positive(value: &str, rule: Rule) -> Result<u64, Error> {
    if !is_token_id(value) {
        return Err(rule.reject());
    }
    value
        .parse::<u64>()
        .map_err(|err| rule.reject().with_source(err))
}

/// One or more decimal digits with no leading zero.
pub fn is_token_id(value: &str) -> bool {
    match value.as_bytes().split_first() {
        Some((first, rest)) => matches!(first, b'1'..=b'9') && rest.iter().all(u8::is_ascii_digit),
        None => false,
    }
}

/// Wallet addresses are opaque; only presence and the absence of whitespace are checked.
pub fn is_owner(value: &str) -> bool {
    !value.is_empty() && !value.chars().any(char::is_whitespace)
}

/// `HHMMSS.ss` + sign + `DDMMSS.ss`.
pub fn is_coordinates(value: &str) -> bool {
    let bytes = value.as_bytes();
    if bytes.len() != 19 {
        return false;
    }
    let (ascension, rest) = bytes.split_at(9);
    let (sign, declination) = rest.split_at(1);
    if !matches!(sign[0], b'+' | b'-') {
        return false;
    }
    let ascension_ok = Sexagesimal::parse(ascension).is_some_and(|ra| {
        ra.lead < RIGHT_ASCENSION_MAX_HOURS || (ra.lead == RIGHT_ASCENSION_MAX_HOURS && ra.is_whole())
    });
    let declination_ok =
        Sexagesimal::parse(declination).is_some_and(|dec| dec.lead <= DECLINATION_MAX_DEGREES);
    ascension_ok && declination_ok
}

/// Lowercase ASCII words joined by single spaces, 4 to 32 bytes overall.
pub fn is_name(value: &str) -> bool {
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&value.len()) {
        return false;
    }
    value
        .split(' ')
        .all(|word| !word.is_empty() && word.bytes().all(|b| b.is_ascii_lowercase()))
}

/// Canonical decimal: no leading zero, no trailing fractional zero, at most one `.`.
pub fn is_price(value: &str) -> bool {
    let mut segments = value.split('.');
    let integer = segments.next().unwrap_or_default();
    let fraction = segments.next();
    if segments.next().is_some() {
        return false;
    }
    let integer_ok = integer.len() <= PRICE_INTEGER_MAX_DIGITS && is_token_id(integer);
    let fraction_ok = fraction.is_none_or(|fraction| {
        fraction.len() <= PRICE_FRACTION_MAX_DIGITS
            && fraction.bytes().all(|b| b.is_ascii_digit())
            && matches!(fraction.as_bytes().last(), Some(b'1'..=b'9'))
    });
    integer_ok && fraction_ok
}

/// One half of a coordinate pair: lead unit, minutes, seconds and hundredths.
#[derive(Clone, Copy, Debug)]
struct Sexagesimal {
    lead: u8,
    minutes: u8,
    seconds: u8,
    hundredths: u8,
}

impl Sexagesimal {
    fn parse(part: &[u8]) -> Option<Self> {
        if part.len() != 9 || part[6] != b'.' {
            return None;
        }
        let lead = two_digits(&part[0..2])?;
        let minutes = two_digits(&part[2..4])?;
        let seconds = two_digits(&part[4..6])?;
        let hundredths = two_digits(&part[7..9])?;
        if minutes > SEXAGESIMAL_MAX || seconds > SEXAGESIMAL_MAX {
            return None;
        }
        Some(Self {
            lead,
            minutes,
            seconds,
            hundredths,
        })
    }

    fn is_whole(self) -> bool {
        self.minutes == 0 && self.seconds == 0 && self.hundredths == 0
    }
}

fn two_digits(pair: &[u8]) -> Option<u8> {
    match pair {
        [tens @ b'0'..=b'9', ones @ b'0'..=b'9'] => Some((tens - b'0') * 10 + (ones - b'0')),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn star() -> NewStar {
        NewStar::new("0xabc", "42", "123045.12+455530.00", "polaris prime")
    }

    fn rejection(result: Result<(), Error>) -> String {
        let err = result.expect_err("expected rejection");
        assert_eq!(err.kind(), ErrorKind::Usage);
        err.message().unwrap_or_default().to_string()
    }

    #[test]
    fn token_id_grammar() {
        for ok in ["1", "9", "10", "42", "1234567890123456789012345"] {
            assert!(is_token_id(ok), "{ok}");
        }
        for bad in ["0", "01", "", "-5", "12a", "+3", " 1", "1 "] {
            assert!(!is_token_id(bad), "{bad}");
        }
    }

    #[test]
    fn coordinates_accept_well_formed_pairs() {
        for ok in [
            "123045.12+455530.00",
            "000000.00-000000.00",
            "235959.99+895959.99",
            "236060.00+906060.00",
            "240000.00+900000.00",
            "066060.60-600060.99",
        ] {
            assert!(is_coordinates(ok), "{ok}");
        }
    }

    #[test]
    fn coordinates_reject_malformed_pairs() {
        for bad in [
            "243045.12+455530.00",
            "240000.01+000000.00",
            "246000.00+000000.00",
            "250000.00+000000.00",
            "123045.1+455530.00",
            "123045.12+455530.0",
            "126145.12+455530.00",
            "123061.12+455530.00",
            "123045.12+915530.00",
            "123045.12*455530.00",
            "123045,12+455530.00",
            "123045.12+455530.000",
            "1230451.2+455530.00",
            "",
        ] {
            assert!(!is_coordinates(bad), "{bad}");
        }
    }

    #[test]
    fn name_grammar() {
        for ok in ["polaris prime", "vega", "a b c", "abcdefghijklmnopqrstuvwxyzabcdef"] {
            assert!(is_name(ok), "{ok}");
        }
        for bad in [
            "Polaris",
            "ab",
            "abc",
            "a b c d e f g h i j k l m n o p q",
            "abcdefghijklmnopqrstuvwxyzabcdefg",
            "polaris  prime",
            " polaris",
            "polaris ",
            "polaris7",
            "polaris-prime",
            "étoile",
        ] {
            assert!(!is_name(bad), "{bad}");
        }
    }

    #[test]
    fn price_grammar() {
        for ok in ["100", "100.05", "1.5", "999999999999", "1.000000000000000001"] {
            assert!(is_price(ok), "{ok}");
        }
        for bad in [
            "100.50",
            "0.5",
            "100.",
            ".5",
            "0",
            "",
            "1.2.3",
            "1000000000000",
            "1.0000000000000000001",
            "1.5a",
            "-1",
        ] {
            assert!(!is_price(bad), "{bad}");
        }
    }

    #[test]
    fn new_star_reports_first_failing_rule() {
        assert!(validate_new_star(&star()).is_ok());

        let mut bad = star();
        bad.token_id = "0".to_string();
        bad.name = "Bad".to_string();
        assert_eq!(rejection(validate_new_star(&bad)), "invalid token id");

        let mut bad = star();
        bad.owner = String::new();
        assert_eq!(rejection(validate_new_star(&bad)), "invalid owner");

        let mut bad = star();
        bad.coordinates = "123045.1+455530.00".to_string();
        bad.name = "Bad".to_string();
        assert_eq!(rejection(validate_new_star(&bad)), "invalid coordinates");

        let mut bad = star();
        bad.name = "polaris  prime".to_string();
        assert_eq!(rejection(validate_new_star(&bad)), "invalid name");

        let bad = star().for_sale("100.50");
        assert_eq!(rejection(validate_new_star(&bad)), "invalid price");
    }

    #[test]
    fn price_is_only_checked_when_for_sale() {
        assert!(validate_new_star(&star().with_price("garbage")).is_ok());
        assert!(validate_new_star(&star().for_sale("100.05")).is_ok());

        let mut missing = star();
        missing.is_for_sale = true;
        assert_eq!(rejection(validate_new_star(&missing)), "invalid price");
    }

    #[test]
    fn range_bounds_are_checked_independently() {
        assert!(validate_range(&RangeRequest::window("1", "5")).is_ok());
        assert!(validate_range(&RangeRequest::window("9", "2")).is_ok());
        assert!(validate_range(&RangeRequest::ids("10", "20")).is_ok());
        assert_eq!(
            rejection(validate_range(&RangeRequest::window("0", "5"))),
            "invalid range"
        );
        assert_eq!(
            rejection(validate_range(&RangeRequest::window("1", ""))),
            "invalid range"
        );
        assert_eq!(
            rejection(validate_range(&RangeRequest::ids("01", "3"))),
            "invalid range"
        );
    }

    #[test]
    fn parse_positive_rejects_overflow() {
        assert_eq!(parse_positive("18446744073709551615", Rule::Range).expect("max"), u64::MAX);
        let err = parse_positive("18446744073709551616", Rule::TokenId).expect_err("overflow");
        assert_eq!(err.message(), Some("invalid token id"));
    }
}
