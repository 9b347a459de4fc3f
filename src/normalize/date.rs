//! Australian date parsing.

use chrono::NaiveDate;

use super::NormalizeError;

const FORMATS: &[&str] = &["%d %B %Y", "%d %b %Y", "%d/%m/%Y"];

/// Parse a day-first Australian date into `YYYY-MM-DD`.
pub fn format_date(date: &str) -> Result<String, NormalizeError> {
    let date = date.trim();
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date, fmt).ok())
        .map(|d| d.format("%Y-%m-%d").to_string())
        .ok_or_else(|| NormalizeError::InvalidDate(date.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_long_month() {
        assert_eq!(format_date("12 March 2024").unwrap(), "2024-03-12");
    }

    #[test]
    fn test_short_month() {
        assert_eq!(format_date("1 Mar 2024").unwrap(), "2024-03-01");
    }

    #[test]
    fn test_slashes_are_day_first() {
        assert_eq!(format_date("12/03/2024").unwrap(), "2024-03-12");
    }

    #[test]
    fn test_invalid() {
        assert!(format_date("2024-03-12").is_err());
        assert!(format_date("31/02/2024").is_err());
    }
}
