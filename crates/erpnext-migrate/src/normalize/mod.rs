//! Field normalizers.
//!
//! Every function here is total: any input, including empty strings, maps to
//! a canonical value or a well-defined default/rejection. Nothing panics and
//! nothing returns an error.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Shortest and longest accepted phone numbers, in digits (E.164 bound).
pub const PHONE_MIN_DIGITS: usize = 7;
pub const PHONE_MAX_DIGITS: usize = 15;

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9\-]*[a-z0-9])?)*\.[a-z]{2,}$")
        .expect("valid email regex")
});

static COMPANY_RE: Lazy<Regex> = Lazy::new(|| {
    let keywords = COMPANY_KEYWORDS.join("|");
    Regex::new(&format!(r"(?i)\b(?:{})\b", keywords)).expect("valid company regex")
});

/// Legal-entity and institution words that mark a customer as a company.
pub const COMPANY_KEYWORDS: &[&str] = &[
    "ltd",
    "limited",
    "inc",
    "incorporated",
    "plc",
    "llc",
    "llp",
    "corp",
    "corporation",
    "gmbh",
    "srl",
    "company",
    "group",
    "academy",
    "school",
    "university",
    "college",
    "council",
    "trust",
];

/// Trimmed text.
pub fn clean_text(value: &str) -> String {
    value.trim().to_string()
}

/// Parse a loosely formatted price: `"$1,486.00"` becomes `1486.0`.
///
/// Everything but digits and periods is dropped. When several periods remain
/// only the last one is the decimal point. Unparseable input is `0.0`.
pub fn clean_price(value: &str) -> f64 {
    let cleaned: String = value
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let canonical = match cleaned.rfind('.') {
        Some(last) if cleaned[..last].contains('.') => {
            let integer: String = cleaned[..last].chars().filter(|c| *c != '.').collect();
            format!("{}{}", integer, &cleaned[last..])
        }
        _ => cleaned,
    };

    canonical
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Parse a plain number with optional thousands separators; `0.0` on failure.
pub fn clean_float(value: &str) -> f64 {
    value
        .trim()
        .replace(',', "")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .unwrap_or(0.0)
}

/// Whole quantity: `"3"`, `"3.0"` and `" 2.7 "` give 3, 3 and 2. Anything
/// unparseable is 0.
pub fn clean_int(value: &str) -> i64 {
    let v = clean_float(value).trunc();
    if v.abs() < i64::MAX as f64 {
        v as i64
    } else {
        0
    }
}

/// Day-first formats are tried before the US month-first one.
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y", "%m/%d/%Y", "%d.%m.%Y"];

/// Parse a spreadsheet date; `None` when no known format matches.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let trimmed = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

/// Reduce a phone number to digits with an optional leading `+`.
///
/// Returns an empty string when the digit count falls outside
/// [`PHONE_MIN_DIGITS`]..=[`PHONE_MAX_DIGITS`].
pub fn clean_phone(value: &str) -> String {
    let trimmed = value.trim();
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if !(PHONE_MIN_DIGITS..=PHONE_MAX_DIGITS).contains(&digits.len()) {
        return String::new();
    }
    if trimmed.starts_with('+') {
        format!("+{}", digits)
    } else {
        digits
    }
}

/// Whether the value has the `local@domain.tld` shape.
pub fn is_valid_email(value: &str) -> bool {
    EMAIL_RE.is_match(&value.trim().to_lowercase())
}

/// Trimmed, lowercased email, or `None` when the shape is wrong.
pub fn clean_email(value: &str) -> Option<String> {
    let email = value.trim().to_lowercase();
    EMAIL_RE.is_match(&email).then_some(email)
}

/// Whether a name looks like a company rather than a person.
///
/// Keywords only match as whole words: "ltd" does not match inside "Altdorf".
pub fn is_company(name: &str) -> bool {
    COMPANY_RE.is_match(name)
}

/// Cut to at most `max` characters on a char boundary.
pub fn truncate_chars(value: &str, max: usize) -> String {
    value.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_price_currency() {
        assert_eq!(clean_price("$1,486.00"), 1486.00);
        assert_eq!(clean_price("£ 99.95"), 99.95);
        assert_eq!(clean_price("1486"), 1486.0);
    }

    #[test]
    fn test_clean_price_last_dot_wins() {
        assert_eq!(clean_price("1.234.56"), 1234.56);
        assert_eq!(clean_price("1.234.567.89"), 1234567.89);
        assert_eq!(clean_price("12.."), 12.0);
    }

    #[test]
    fn test_clean_price_defaults_to_zero() {
        assert_eq!(clean_price(""), 0.0);
        assert_eq!(clean_price("abc"), 0.0);
        assert_eq!(clean_price("."), 0.0);
        assert_eq!(clean_price("..."), 0.0);
        assert_eq!(clean_price("N/A"), 0.0);
    }

    #[test]
    fn test_clean_price_idempotent_on_canonical_values() {
        for raw in ["$1,486.00", "1.234.56", "0.5", "7", "£12,000.99", ""] {
            let once = clean_price(raw);
            let twice = clean_price(&once.to_string());
            assert_eq!(once, twice, "not idempotent for {:?}", raw);
        }
    }

    #[test]
    fn test_clean_float() {
        assert_eq!(clean_float("1,250.5"), 1250.5);
        assert_eq!(clean_float(" 12 "), 12.0);
        assert_eq!(clean_float("twelve"), 0.0);
        assert_eq!(clean_float("inf"), 0.0);
        assert_eq!(clean_float(""), 0.0);
    }

    #[test]
    fn test_clean_phone() {
        assert_eq!(clean_phone("+1 (555) 123-4567"), "+15551234567");
        assert_eq!(clean_phone("07700 900123"), "07700900123");
        assert_eq!(clean_phone("tel: 020 7946 0958"), "02079460958");
    }

    #[test]
    fn test_clean_phone_only_leading_plus_kept() {
        assert_eq!(clean_phone("44+20+7946+0958"), "442079460958");
        assert_eq!(clean_phone("  +44 20 7946 0958 "), "+442079460958");
    }

    #[test]
    fn test_clean_phone_length_bounds() {
        assert_eq!(clean_phone("123456"), "");
        assert_eq!(clean_phone("1234567"), "1234567");
        assert_eq!(clean_phone("+123456789012345"), "+123456789012345");
        assert_eq!(clean_phone("+1234567890123456"), "");
        assert_eq!(clean_phone(""), "");
        assert_eq!(clean_phone("n/a"), "");
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("jane.doe@example.co.uk"));
        assert!(is_valid_email(" Sales+Booths@Example.COM "));
        assert!(!is_valid_email("jane.doe@example"));
        assert!(!is_valid_email("jane.doe@example.c"));
        assert!(!is_valid_email("@example.com"));
        assert!(!is_valid_email("jane doe@example.com"));
        assert!(!is_valid_email("jane@@example.com"));
        assert!(!is_valid_email("jane@example.123"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_clean_email_lowercases() {
        assert_eq!(
            clean_email(" Jane.Doe@Example.COM "),
            Some("jane.doe@example.com".to_string())
        );
        assert_eq!(clean_email("not-an-email"), None);
    }

    #[test]
    fn test_is_company() {
        assert!(is_company("ABC Ltd"));
        assert!(is_company("ABC Ltd."));
        assert!(is_company("Northfield Academy Trust"));
        assert!(is_company("ACME CORP"));
        assert!(is_company("Müller GmbH"));
        assert!(!is_company("Altdorf"));
        assert!(!is_company("Vincent Price"));
        assert!(!is_company("Schoolhouse Rock"));
        assert!(!is_company(""));
    }

    #[test]
    fn test_clean_int() {
        assert_eq!(clean_int("3"), 3);
        assert_eq!(clean_int(" 2.7 "), 2);
        assert_eq!(clean_int("1,200"), 1200);
        assert_eq!(clean_int("two"), 0);
        assert_eq!(clean_int(""), 0);
    }

    #[test]
    fn test_parse_date_formats() {
        let christmas = NaiveDate::from_ymd_opt(2024, 12, 25);
        assert_eq!(parse_date("2024-12-25"), christmas);
        assert_eq!(parse_date(" 25/12/2024 "), christmas);
        assert_eq!(parse_date("25-12-2024"), christmas);
        assert_eq!(parse_date("12/25/2024"), christmas);
        assert_eq!(parse_date("25.12.2024"), christmas);
        // day first when both readings are valid
        assert_eq!(parse_date("03/04/2024"), NaiveDate::from_ymd_opt(2024, 4, 3));
        assert_eq!(parse_date("next week"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("Acoustic Booth", 8), "Acoustic");
        assert_eq!(truncate_chars("café", 3), "caf");
        assert_eq!(truncate_chars("short", 140), "short");
    }
}
