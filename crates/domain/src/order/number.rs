//! Human-readable order numbers: `YYYYMMDD` followed by a 4-digit daily sequence.

use chrono::NaiveDate;

use super::OrderError;

const SEQUENCE_DIGITS: usize = 4;
const MAX_SEQUENCE: u32 = 9999;

/// Returns the `YYYYMMDD` prefix for a calendar day.
pub fn order_number_prefix(date: NaiveDate) -> String {
    date.format("%Y%m%d").to_string()
}

/// Returns true if `s` has the `^[0-9]{12}$` shape.
pub fn is_valid_order_number(s: &str) -> bool {
    s.len() == 8 + SEQUENCE_DIGITS && s.bytes().all(|b| b.is_ascii_digit())
}

/// Computes the next order number for `date`.
///
/// `last` is the greatest existing number carrying the same prefix, if any.
/// The sequence starts at `0001` each day.
pub fn next_order_number(date: NaiveDate, last: Option<&str>) -> Result<String, OrderError> {
    let prefix = order_number_prefix(date);

    let last_sequence = match last {
        None => 0,
        Some(number) => {
            let suffix = number
                .strip_prefix(prefix.as_str())
                .filter(|_| is_valid_order_number(number))
                .ok_or_else(|| OrderError::InvalidOrderNumber(number.to_string()))?;
            suffix
                .parse::<u32>()
                .map_err(|_| OrderError::InvalidOrderNumber(number.to_string()))?
        }
    };

    if last_sequence >= MAX_SEQUENCE {
        return Err(OrderError::SequenceExhausted { prefix });
    }

    Ok(format!(
        "{prefix}{:0width$}",
        last_sequence + 1,
        width = SEQUENCE_DIGITS
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn first_order_of_the_day() {
        assert_eq!(
            next_order_number(day(2024, 12, 25), None).unwrap(),
            "202412250001"
        );
    }

    #[test]
    fn increments_within_a_day() {
        assert_eq!(
            next_order_number(day(2024, 12, 25), Some("202412250001")).unwrap(),
            "202412250002"
        );
        assert_eq!(
            next_order_number(day(2024, 12, 25), Some("202412250099")).unwrap(),
            "202412250100"
        );
    }

    #[test]
    fn restarts_the_next_day() {
        assert_eq!(
            next_order_number(day(2024, 12, 26), None).unwrap(),
            "202412260001"
        );
    }

    #[test]
    fn rejects_foreign_prefix() {
        assert!(matches!(
            next_order_number(day(2024, 12, 26), Some("202412250004")),
            Err(OrderError::InvalidOrderNumber(_))
        ));
    }

    #[test]
    fn rejects_exhausted_sequence() {
        assert!(matches!(
            next_order_number(day(2024, 12, 25), Some("202412259999")),
            Err(OrderError::SequenceExhausted { .. })
        ));
    }

    #[test]
    fn validates_shape() {
        assert!(is_valid_order_number("202412250001"));
        assert!(!is_valid_order_number("20241225001"));
        assert!(!is_valid_order_number("2024122500a1"));
    }
}
