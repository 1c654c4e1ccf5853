//! Caller Input Parsers
//!
//! Closed-vocabulary matching for the scripted dialogue. All matching is
//! case-insensitive. Digits match as exact tokens; keywords match as
//! substrings in either language. Rules are checked in a fixed priority
//! order and the first match wins: per answer value, the numeric token is
//! tried first, then the English keywords, then the Spanish keywords.
//! Unparseable input yields `None`; the caller is simply asked again.

use crate::session::{HealthRating, LimitationLevel};

/// True if `input` contains `token` as a standalone alphanumeric word.
fn has_token(input: &str, token: &str) -> bool {
    input
        .split(|c: char| !c.is_alphanumeric())
        .any(|word| word.eq_ignore_ascii_case(token))
}

fn contains_any(input: &str, phrases: &[&str]) -> bool {
    phrases.iter().any(|p| input.contains(p))
}

fn matches_option(input: &str, digit: &str, english: &[&str], spanish: &[&str]) -> bool {
    has_token(input, digit) || contains_any(input, english) || contains_any(input, spanish)
}

/// Affirmative match for the greeting prompt ("say continue or press 1").
pub fn is_affirmative(input: &str) -> bool {
    let input = input.to_lowercase();
    has_token(&input, "1") || contains_any(&input, &["continue", "yes", "one"]) || contains_any(&input, &["continuar", "sí"])
}

/// Affirmative match for the assessment intro, which also accepts "ok".
pub fn is_acknowledgement(input: &str) -> bool {
    let lowered = input.to_lowercase();
    is_affirmative(input) || contains_any(&lowered, &["ok", "okay"])
}

/// Affirmative match for the SMS opt-in prompt.
pub fn is_opt_in(input: &str) -> bool {
    let input = input.to_lowercase();
    has_token(&input, "1")
        || contains_any(&input, &["yes", "one", "okay", "ok", "sure"])
        || contains_any(&input, &["sí"])
}

/// Parses a general-health rating. Options are checked from Excellent down to
/// Poor; the first matching option wins.
pub fn parse_health_rating(input: &str) -> Option<HealthRating> {
    let input = input.to_lowercase();
    if matches_option(&input, "1", &["excellent", "one"], &["excelente"]) {
        Some(HealthRating::Excellent)
    } else if matches_option(&input, "2", &["very good", "two"], &["muy buena", "muy bien"]) {
        Some(HealthRating::VeryGood)
    } else if matches_option(&input, "3", &["good", "three"], &["buena", "bien"]) {
        Some(HealthRating::Good)
    } else if matches_option(&input, "4", &["fair", "four"], &["regular"]) {
        Some(HealthRating::Fair)
    } else if matches_option(&input, "5", &["poor", "five"], &["mala", "mal"]) {
        Some(HealthRating::Poor)
    } else {
        None
    }
}

/// Parses a limitation level. Priority order is fixed: limited-a-lot, then
/// limited-a-little, then not-limited; the first matching option wins, which
/// resolves utterances mentioning more than one option.
pub fn parse_limitation(input: &str) -> Option<LimitationLevel> {
    let input = input.to_lowercase();
    if matches_option(&input, "1", &["limited a lot", "a lot", "one"], &["muy limitado"]) {
        Some(LimitationLevel::LimitedALot)
    } else if matches_option(
        &input,
        "2",
        &["limited a little", "a little", "two"],
        &["poco limitado"],
    ) {
        Some(LimitationLevel::LimitedALittle)
    } else if matches_option(
        &input,
        "3",
        &["not limited", "not at all", "no", "three"],
        &["sin limitación"],
    ) {
        Some(LimitationLevel::NotLimited)
    } else {
        None
    }
}

/// Extracts a dialable number from free-form input: keeps digits and a
/// leading `+`, accepts the result only if at least 10 digits remain.
pub fn extract_phone_digits(input: &str) -> Option<String> {
    let mut filtered = String::new();
    for c in input.chars() {
        if c.is_ascii_digit() {
            filtered.push(c);
        } else if c == '+' && filtered.is_empty() {
            filtered.push(c);
        }
    }
    let digit_count = filtered.chars().filter(char::is_ascii_digit).count();
    (digit_count >= 10).then_some(filtered)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affirmatives_in_both_languages() {
        assert!(is_affirmative("Continue"));
        assert!(is_affirmative("yes please"));
        assert!(is_affirmative("continuar"));
        assert!(is_affirmative("sí"));
        assert!(is_affirmative("1"));
        assert!(is_affirmative("press 1 now"));
        assert!(!is_affirmative("what is this about"));
        // "1" must match as a token, not inside a larger number.
        assert!(!is_affirmative("my number is 21"));
    }

    #[test]
    fn intro_accepts_ok() {
        assert!(is_acknowledgement("ok"));
        assert!(is_acknowledgement("okay sure"));
        assert!(!is_acknowledgement("hmm"));
    }

    #[test]
    fn opt_in_keywords() {
        assert!(is_opt_in("yes"));
        assert!(is_opt_in("sure"));
        assert!(is_opt_in("sí"));
        assert!(is_opt_in("1"));
        assert!(!is_opt_in("no thanks"));
    }

    #[test]
    fn rating_digit_and_keywords_agree() {
        assert_eq!(parse_health_rating("3"), Some(HealthRating::Good));
        assert_eq!(parse_health_rating("good"), Some(HealthRating::Good));
        assert_eq!(parse_health_rating("buena"), Some(HealthRating::Good));
        assert_eq!(parse_health_rating("bien"), Some(HealthRating::Good));
    }

    #[test]
    fn rating_substring_match_is_case_insensitive() {
        assert_eq!(
            parse_health_rating("Excellent, I guess"),
            Some(HealthRating::Excellent)
        );
        assert_eq!(parse_health_rating("MUY BUENA"), Some(HealthRating::VeryGood));
        assert_eq!(parse_health_rating("it's fair"), Some(HealthRating::Fair));
        assert_eq!(parse_health_rating("5"), Some(HealthRating::Poor));
    }

    #[test]
    fn rating_very_good_beats_good() {
        assert_eq!(parse_health_rating("very good"), Some(HealthRating::VeryGood));
    }

    #[test]
    fn rating_rejects_noise() {
        assert_eq!(parse_health_rating("meh"), None);
        assert_eq!(parse_health_rating(""), None);
    }

    #[test]
    fn limitation_equivalences() {
        assert_eq!(parse_limitation("a lot"), Some(LimitationLevel::LimitedALot));
        assert_eq!(
            parse_limitation("muy limitado"),
            Some(LimitationLevel::LimitedALot)
        );
        assert_eq!(
            parse_limitation("limited a little"),
            Some(LimitationLevel::LimitedALittle)
        );
        assert_eq!(parse_limitation("2"), Some(LimitationLevel::LimitedALittle));
        assert_eq!(parse_limitation("not at all"), Some(LimitationLevel::NotLimited));
        assert_eq!(
            parse_limitation("sin limitación"),
            Some(LimitationLevel::NotLimited)
        );
    }

    #[test]
    fn limitation_priority_order_documented() {
        // Mentions both "limited a little" and "not limited"; the fixed
        // priority (a lot, then a little, then not limited) picks a-little.
        assert_eq!(
            parse_limitation("not limited, well, maybe limited a little"),
            Some(LimitationLevel::LimitedALittle)
        );
        // "limited a lot" wins over anything later in the order.
        assert_eq!(
            parse_limitation("not limited... actually limited a lot"),
            Some(LimitationLevel::LimitedALot)
        );
    }

    #[test]
    fn limitation_rejects_noise() {
        assert_eq!(parse_limitation("every day"), None);
    }

    #[test]
    fn phone_extraction_accepts_ten_digits() {
        assert_eq!(
            extract_phone_digits("my number is (555) 123-4567").as_deref(),
            Some("5551234567")
        );
        assert_eq!(
            extract_phone_digits("+1 555 123 4567").as_deref(),
            Some("+15551234567")
        );
    }

    #[test]
    fn phone_extraction_rejects_short_numbers() {
        assert_eq!(extract_phone_digits("call me at 555-1234"), None);
        assert_eq!(extract_phone_digits("no number here"), None);
        // A '+' alone contributes no digits.
        assert_eq!(extract_phone_digits("+555 1234"), None);
    }
}
