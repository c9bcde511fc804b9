// Tracking IDs look like `20240115-42`: submission date, then the ticket id.
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static TRACKING_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\d{8}-\d+$").unwrap()
});

pub fn encode(submitted_on: NaiveDate, ticket_id: i32) -> String {
    format!("{}-{}", submitted_on.format("%Y%m%d"), ticket_id)
}

pub fn validate_format(tracking_id: &str) -> bool {
    TRACKING_ID_RE.is_match(tracking_id)
}

/// Splits a well-formed tracking ID back into its date and ticket id.
pub fn parse(tracking_id: &str) -> Option<(NaiveDate, i32)> {
    if !validate_format(tracking_id) {
        return None;
    }

    let (date, id) = tracking_id.split_once('-')?;
    let date = NaiveDate::parse_from_str(date, "%Y%m%d").ok()?;
    let id = id.parse::<i32>().ok()?;
    Some((date, id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_matches_documented_example() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        assert_eq!(encode(date, 42), "20240115-42");
    }

    #[test]
    fn test_encoded_ids_are_valid_and_keep_the_ticket_id() {
        let dates = [
            NaiveDate::from_ymd_opt(1999, 12, 31).unwrap(),
            NaiveDate::from_ymd_opt(2024, 2, 29).unwrap(),
            NaiveDate::from_ymd_opt(2031, 7, 4).unwrap(),
        ];

        for date in dates {
            for id in [1, 9, 10, 4096, i32::MAX] {
                let tracking_id = encode(date, id);
                assert!(validate_format(&tracking_id), "{} should be valid", tracking_id);

                let suffix = tracking_id.split('-').nth(1).unwrap();
                assert_eq!(suffix.parse::<i32>().unwrap(), id);
                assert_eq!(parse(&tracking_id), Some((date, id)));
            }
        }
    }

    #[test]
    fn test_validate_format_rejects_malformed_ids() {
        for bad in ["", "2024011-42", "20240115-", "20240115_42", "x20240115-42", "20240115-42a", "20240115--42"] {
            assert!(!validate_format(bad), "{} should be rejected", bad);
        }
    }

    #[test]
    fn test_parse_rejects_impossible_dates() {
        assert!(validate_format("20241340-7"));
        assert_eq!(parse("20241340-7"), None);
    }
}
