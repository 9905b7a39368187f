//! Value checks a presentation layer applies on top of the controller's
//! required-field validation.

use std::sync::LazyLock;

use regex::Regex;

use super::codec::{FieldValue, ValueMap};

static EMAIL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));
static PHONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\d\s\-+()]+$").expect("phone pattern is valid"));
static HTML_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

const MIN_PHONE_DIGITS: usize = 10;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd)]
pub enum PasswordStrength {
    Weak,
    Medium,
    Strong,
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Digits, spaces, `-+()` only, with at least ten digits.
pub fn is_valid_phone(phone: &str) -> bool {
    PHONE.is_match(phone) && digits(phone).len() >= MIN_PHONE_DIGITS
}

pub fn password_strength(password: &str) -> PasswordStrength {
    if password.is_empty() {
        return PasswordStrength::Weak;
    }

    let length = password.chars().count();
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let score = [
        length >= 6,
        length >= 10,
        has_lower && has_upper,
        password.chars().any(|c| c.is_ascii_digit()),
        password.chars().any(|c| !c.is_ascii_alphanumeric()),
    ]
    .into_iter()
    .filter(|passed| *passed)
    .count();

    match score {
        0..=2 => PasswordStrength::Weak,
        3 => PasswordStrength::Medium,
        _ => PasswordStrength::Strong,
    }
}

/// Formats 11-digit numbers starting with 7 as `+7 (XXX) XXX-XX-XX`; anything
/// else is returned unchanged.
pub fn format_phone_number(phone: &str) -> String {
    let cleaned = digits(phone);
    if cleaned.len() == 11 && cleaned.starts_with('7') {
        return format!(
            "+7 ({}) {}-{}-{}",
            &cleaned[1..4],
            &cleaned[4..7],
            &cleaned[7..9],
            &cleaned[9..]
        );
    }
    phone.to_string()
}

pub fn strip_tags(value: &str) -> String {
    HTML_TAG.replace_all(value, "").into_owned()
}

/// Names from `required` whose value is absent or blank, in the given order.
pub fn missing_required_fields<'a>(
    values: &ValueMap,
    required: impl IntoIterator<Item = &'a str>,
) -> Vec<&'a str> {
    required
        .into_iter()
        .filter(|name| values.get(*name).is_none_or(FieldValue::is_blank))
        .collect()
}

fn digits(value: &str) -> String {
    value.chars().filter(char::is_ascii_digit).collect()
}
